//! OpenAI-compatible provider implementation.
//!
//! Talks to `/chat/completions` (server-sent events) and `/embeddings` of any
//! endpoint that follows the OpenAI wire format.

use super::types::*;
use crate::config::LlmConfig;
use async_trait::async_trait;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// OpenAI-compatible HTTP API provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new provider for the given endpoint and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self::new(config.base_url.clone(), api_key)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(ProviderError::Api(format!("{}: {}", status, error_text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let wire_request = WireChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            stream: true,
            tools: request.tools.clone(),
        };

        let response = self.post("chat/completions", &wire_request).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        let mut assembler = StreamAssembler::new(request.model);

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                let line_str = String::from_utf8_lossy(&line);

                if let Some(response) = assembler.feed_line(line_str.trim())? {
                    callback(response);
                }
                if assembler.is_finished() {
                    return Ok(());
                }
            }
        }

        // Stream closed without a `[DONE]` marker; flush what we have.
        let leftover = String::from_utf8_lossy(&buffer).to_string();
        if let Some(response) = assembler.feed_line(leftover.trim())? {
            callback(response);
        }
        if !assembler.is_finished() {
            callback(assembler.finish());
        }

        Ok(())
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let embed_request = EmbedRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        let response = self.post("embeddings", &embed_request).await?;
        let embed_response = response.json::<EmbedResponse>().await?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }
}

/// Folds server-sent event lines into [`ChatResponse`] chunks.
///
/// Text deltas are forwarded immediately. Tool-call fragments arrive spread over
/// many events keyed by `index`; they are accumulated and attached to the final
/// `done` chunk.
struct StreamAssembler {
    model: String,
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finished: bool,
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl StreamAssembler {
    fn new(model: String) -> Self {
        Self {
            model,
            content: String::new(),
            tool_calls: BTreeMap::new(),
            finished: false,
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn feed_line(&mut self, line: &str) -> Result<Option<ChatResponse>> {
        if self.finished {
            return Ok(None);
        }
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Ok(Some(self.finish()));
        }

        let event: WireStreamChunk = serde_json::from_str(data)?;
        if let Some(error) = event.error {
            return Err(ProviderError::Api(error.message));
        }
        if let Some(model) = event.model {
            self.model = model;
        }

        let mut text = String::new();
        for choice in event.choices {
            if let Some(content) = choice.delta.content {
                text.push_str(&content);
            }
            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let partial = self.tool_calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    partial.id = Some(id);
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial.arguments.push_str(&arguments);
                    }
                }
            }
        }

        if text.is_empty() {
            return Ok(None);
        }
        self.content.push_str(&text);

        Ok(Some(ChatResponse {
            model: self.model.clone(),
            content: text.clone(),
            done: false,
            message: Message::assistant(text),
        }))
    }

    fn finish(&mut self) -> ChatResponse {
        self.finished = true;

        let tool_calls: Vec<ToolCall> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(|partial| {
                let arguments = if partial.arguments.trim().is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&partial.arguments).unwrap_or_else(|e| {
                        warn!(tool = %partial.name, error = %e, "Tool arguments are not valid JSON");
                        serde_json::Value::String(partial.arguments.clone())
                    })
                };
                ToolCall::new(partial.id, partial.name, arguments)
            })
            .collect();

        debug!(tool_call_count = tool_calls.len(), "Stream finished");

        let mut message = Message::assistant(self.content.clone());
        if !tool_calls.is_empty() {
            message.tool_calls = Some(tool_calls);
        }

        ChatResponse {
            model: self.model.clone(),
            content: String::new(),
            done: true,
            message,
        }
    }
}

// OpenAI-specific request/response types (internal)

#[derive(Debug, Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls: message.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: WireFunctionCall {
                            name: call.function.name.clone(),
                            arguments: match &call.function.arguments {
                                serde_json::Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect()
            }),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(events: &[&str]) -> String {
        events
            .iter()
            .map(|e| format!("data: {}\n\n", e))
            .collect::<String>()
    }

    async fn collect_chat(provider: &OpenAiProvider, request: ChatRequest) -> Result<Vec<ChatResponse>> {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        provider
            .chat(request, Box::new(move |r| sink.lock().unwrap().push(r)))
            .await?;
        let collected = chunks.lock().unwrap().clone();
        Ok(collected)
    }

    #[test]
    fn test_assembler_accumulates_tool_call_fragments() {
        let mut assembler = StreamAssembler::new("m".to_string());
        let first = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"calculator","arguments":"{\"inp"}}]}}]}"#;
        let second = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ut\":\"7 * 10\"}"}}]}}]}"#;

        assert!(assembler.feed_line(first).unwrap().is_none());
        assert!(assembler.feed_line(second).unwrap().is_none());
        let done = assembler.feed_line("data: [DONE]").unwrap().unwrap();

        assert!(done.done);
        let calls = done.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(calls[0].function.name, "calculator");
        assert_eq!(calls[0].function.arguments["input"], "7 * 10");
    }

    #[test]
    fn test_assembler_ignores_comments_and_blank_lines() {
        let mut assembler = StreamAssembler::new("m".to_string());
        assert!(assembler.feed_line("").unwrap().is_none());
        assert!(assembler.feed_line(": keep-alive").unwrap().is_none());
        assert!(!assembler.is_finished());
    }

    #[test]
    fn test_wire_message_serializes_arguments_as_string() {
        let call = ToolCall::new(Some("call_9".into()), "calculator", serde_json::json!({"input": "1+1"}));
        let message = Message::assistant_tool_calls("", vec![call]);
        let wire = serde_json::to_value(WireMessage::from(&message)).unwrap();

        assert_eq!(wire["role"], "assistant");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"input":"1+1"}"#);
    }

    #[tokio::test]
    async fn test_chat_streams_text() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"model":"gpt-4o","choices":[{"delta":{"role":"assistant","content":"Hel"}}]}"#,
            r#"{"model":"gpt-4o","choices":[{"delta":{"content":"lo"}}]}"#,
            "[DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "test-key");
        let chunks = collect_chat(&provider, ChatRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap();

        let streamed: String = chunks.iter().filter(|c| !c.done).map(|c| c.content.as_str()).collect();
        assert_eq!(streamed, "Hello");
        let last = chunks.last().unwrap();
        assert!(last.done);
        assert_eq!(last.message.content, "Hello");
        assert!(last.message.tool_calls.is_none());
    }

    #[tokio::test]
    async fn test_chat_reports_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "k");
        let err = collect_chat(&provider, ChatRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api(ref msg) if msg.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn test_embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.25, -0.5, 1.0]}],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(format!("{}/", server.uri()), "k");
        let embedding = provider.embed("hello", "text-embedding-3-small").await.unwrap();
        assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_without_data_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(server.uri(), "k");
        assert!(matches!(
            provider.embed("hello", "m").await,
            Err(ProviderError::Other(_))
        ));
    }
}
