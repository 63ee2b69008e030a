use async_trait::async_trait;
use colloquy_plugin::{Result, Tool, ToolError};

/// Hands a weather description back to the model so it can propose activities.
///
/// The tool does no reasoning of its own; the model decides what fits the weather.
#[derive(Debug, Default)]
pub struct SuggestActivityTool;

impl SuggestActivityTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for SuggestActivityTool {
    fn name(&self) -> &str {
        "suggest-activity"
    }

    fn description(&self) -> &str {
        "Suggests an outdoor activity based on the current weather conditions."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let weather = input.trim();
        if weather.is_empty() {
            return Err(ToolError::InvalidInput("weather description is empty".into()));
        }
        Ok(format!("Request for activity suggestions based on: {}", weather))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_weather_description() {
        let observation = SuggestActivityTool::new()
            .call("The weather in Paris: clear sky, temperature: 21°C.")
            .await
            .unwrap();
        assert_eq!(
            observation,
            "Request for activity suggestions based on: The weather in Paris: clear sky, temperature: 21°C."
        );
    }

    #[tokio::test]
    async fn test_empty_description_rejected() {
        assert!(SuggestActivityTool::new().call("").await.is_err());
    }
}
