//! Collecting a streamed chat completion into one assistant message.

use super::types::{ChatRequest, Message, Provider, ProviderError, Result, ToolCall};
use std::time::Duration;
use tracing::debug;

/// Runs a chat request to completion and returns the assembled assistant message.
///
/// Incremental text is forwarded to `on_chunk` as it arrives. Tool calls are
/// kept from whichever chunk carries them. The whole exchange is a single
/// attempt bounded by `timeout`; expiry yields [`ProviderError::Timeout`].
pub async fn complete<F>(
    provider: &dyn Provider,
    request: ChatRequest,
    timeout: Duration,
    mut on_chunk: F,
) -> Result<Message>
where
    F: FnMut(&str) + Send,
{
    let mut content = String::new();
    let mut tool_calls: Option<Vec<ToolCall>> = None;
    let mut chunk_count = 0usize;

    let call = provider.chat(
        request,
        Box::new(|response| {
            chunk_count += 1;
            if !response.done && !response.content.is_empty() {
                on_chunk(&response.content);
            }
            content.push_str(&response.content);
            if response.message.tool_calls.is_some() {
                tool_calls = response.message.tool_calls;
            }
        }),
    );

    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;

    if chunk_count == 0 {
        return Err(ProviderError::Other("No response from LLM".to_string()));
    }
    debug!(chunk_count, has_tool_calls = tool_calls.is_some(), "Collected chat completion");

    Ok(match tool_calls {
        Some(calls) if !calls.is_empty() => Message::assistant_tool_calls(content, calls),
        _ => Message::assistant(content),
    })
}
