use async_trait::async_trait;
use colloquy_core::config::ToolsConfig;
use colloquy_plugin::{Result, Tool};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Current weather for a city from the OpenWeather API.
///
/// Lookup failures are not tool errors: the model receives an observation
/// saying the data could not be retrieved and can tell the user so.
pub struct WeatherTool {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    name: String,
    weather: Vec<WeatherCondition>,
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

impl WeatherTool {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Bounds each lookup; an expired request is reported like any other failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the tool from configuration, reading the API key from the
    /// environment variable named by `weather_api_key_env`.
    ///
    /// A missing key is not fatal; requests will fail and be reported as
    /// unavailable weather data.
    pub fn from_config(config: &ToolsConfig) -> Self {
        let api_key = std::env::var(&config.weather_api_key_env).unwrap_or_else(|_| {
            warn!(variable = %config.weather_api_key_env, "Weather API key is not set");
            String::new()
        });
        Self::new(&config.weather_base_url, api_key)
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    async fn fetch(&self, city: &str) -> std::result::Result<String, reqwest::Error> {
        let url = format!("{}/weather", self.base_url);
        let response: WeatherResponse = self
            .http_client
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let description = response
            .weather
            .first()
            .map(|w| w.description.as_str())
            .unwrap_or("unknown conditions");

        Ok(format!(
            "The weather in {}: {}, temperature: {}°C.",
            response.name, description, response.main.temp
        ))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get-weather"
    }

    fn description(&self) -> &str {
        "Provides current weather information for a specified city."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["input"],
            "properties": {
                "input": {
                    "type": "string",
                    "description": "Name of the city, e.g. 'Paris' or 'London,UK'"
                }
            }
        })
    }

    async fn call(&self, input: &str) -> Result<String> {
        let city = input.trim();
        match self.fetch(city).await {
            Ok(report) => {
                debug!(city, "Fetched weather");
                Ok(report)
            }
            Err(e) => {
                warn!(city, error = %e, "Weather lookup failed");
                Ok(format!("Unable to retrieve weather data for \"{}\".", city))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_formats_weather_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London"))
            .and(query_param("appid", "secret"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "London",
                "weather": [{"main": "Clouds", "description": "broken clouds"}],
                "main": {"temp": 14.5, "humidity": 80}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = WeatherTool::new(server.uri(), "secret");
        let report = tool.call(" London ").await.unwrap();
        assert_eq!(report, "The weather in London: broken clouds, temperature: 14.5°C.");
    }

    #[tokio::test]
    async fn test_failure_becomes_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let tool = WeatherTool::new(server.uri(), "secret");
        let report = tool.call("Atlantis").await.unwrap();
        assert_eq!(report, "Unable to retrieve weather data for \"Atlantis\".");
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "name": "Oslo",
                        "weather": [{"description": "snow"}],
                        "main": {"temp": -3.0}
                    }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let tool = WeatherTool::new(server.uri(), "secret").with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let report = tool.call("Oslo").await.unwrap();
        assert_eq!(report, "Unable to retrieve weather data for \"Oslo\".");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_malformed_body_becomes_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let tool = WeatherTool::new(format!("{}/", server.uri()), "secret");
        let report = tool.call("Paris").await.unwrap();
        assert_eq!(report, "Unable to retrieve weather data for \"Paris\".");
    }
}
