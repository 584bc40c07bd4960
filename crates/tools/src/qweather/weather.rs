//! 7-day forecast by coordinates.

use async_trait::async_trait;
use parallax_core::RunCancellationToken;
use parallax_core::error::ToolError;
use parallax_core::tool::Tool;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{API_KEY_HEADER, QWEATHER_API_KEY_ENV, check_envelope};
use crate::http;

pub const WEATHER_BASE_URL: &str = "https://devapi.qweather.com";
pub const NO_RESULTS: &str = "No q-weather search results were found";

const DESCRIPTION: &str = r#"Use the q-weather API to get a 7-day weather forecast for a city.
Input is a JSON object: {"longitude": 116.41, "latitude": 39.92, "city": "city name"}
Returns a JSON list with one entry per day: fxDate, sunrise, sunset, tempMax, tempMin,
textDay, textNight, windDirDay, windScaleDay, windDirNight, windScaleNight, humidity,
precip, pressure, vis, uvIndex and cityName."#;

#[derive(Debug, Clone, Default)]
pub struct WeatherOptions {
    api_key: Option<String>,
    unit: Option<String>,
    lang: Option<String>,
    base_url: Option<String>,
}

impl WeatherOptions {
    /// Use this key instead of `QWEATHER_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// `m` for metric (the default) or `i` for imperial.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

pub struct WeatherTool {
    api_key: String,
    unit: String,
    lang: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new(options: WeatherOptions) -> Result<Self, ToolError> {
        let api_key = http::resolve_api_key(
            options.api_key,
            http::env_key(QWEATHER_API_KEY_ENV),
            QWEATHER_API_KEY_ENV,
        )?;
        let base_url = options.base_url.as_deref().unwrap_or(WEATHER_BASE_URL);

        Ok(Self {
            api_key,
            unit: options.unit.filter(|u| !u.is_empty()).unwrap_or_else(|| "m".into()),
            lang: options.lang.filter(|l| !l.is_empty()),
            endpoint: format!("{}/v7/weather/7d", base_url.trim_end_matches('/')),
            client: http::client()?,
        })
    }

    async fn forecast(&self, request: ForecastRequest) -> Result<String, ToolError> {
        let location = format!("{:.2},{:.2}", request.longitude, request.latitude);
        debug!(%location, city = %request.city, "q-weather forecast");

        let mut query = vec![("location", location.as_str()), ("unit", self.unit.as_str())];
        if let Some(lang) = &self.lang {
            query.push(("lang", lang.as_str()));
        }

        let http_request = self
            .client
            .get(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&query);
        let body = http::fetch_text(http_request, "q-weather").await?;
        check_envelope("q-weather", &body)?;

        let response: ForecastResponse = serde_json::from_str(&body)
            .map_err(|e| ToolError::ExecutionFailed(format!("unexpected q-weather response: {e}")))?;

        let days: Vec<DailyForecast> = response
            .daily
            .unwrap_or_default()
            .into_iter()
            .map(|day| DailyForecast {
                city_name: request.city.clone(),
                ..day
            })
            .collect();
        if days.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }

        serde_json::to_string(&days).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "q-weather"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn call(&self, input: &str, cancel: &RunCancellationToken) -> Result<String, ToolError> {
        let request: ForecastRequest = serde_json::from_str(http::strip_fences(input))
            .map_err(|e| ToolError::InvalidInput(format!("q-weather input: {e}")))?;
        http::cancellable(cancel, self.forecast(request)).await
    }
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    longitude: f64,
    latitude: f64,
    #[serde(default)]
    city: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    daily: Option<Vec<DailyForecast>>,
}

/// One day of the forecast, as returned to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DailyForecast {
    fx_date: String,
    sunrise: String,
    sunset: String,
    temp_max: String,
    temp_min: String,
    text_day: String,
    text_night: String,
    wind_dir_day: String,
    wind_scale_day: String,
    wind_dir_night: String,
    wind_scale_night: String,
    humidity: String,
    precip: String,
    pressure: String,
    vis: String,
    uv_index: String,
    city_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(server: &MockServer, options: WeatherOptions) -> WeatherTool {
        WeatherTool::new(options.api_key("qw-test").base_url(server.uri())).unwrap()
    }

    fn day(date: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "fxDate": date, "sunrise": "05:30", "sunset": "19:10",
            "tempMax": "31", "tempMin": "22", "textDay": text, "textNight": "Clear",
            "iconDay": "100", "windDirDay": "S", "windScaleDay": "1-3",
            "windDirNight": "SW", "windScaleNight": "1-3", "humidity": "60",
            "precip": "0.0", "pressure": "1002", "vis": "25", "uvIndex": "9"
        })
    }

    #[tokio::test]
    async fn returns_daily_forecast_with_city_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/weather/7d"))
            .and(header("X-QW-Api-Key", "qw-test"))
            .and(query_param("location", "116.41,39.92"))
            .and(query_param("unit", "m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "daily": [day("2025-07-01", "Sunny"), day("2025-07-02", "Cloudy")]
            })))
            .mount(&server)
            .await;

        let out = tool(&server, WeatherOptions::default())
            .call(
                r#"{"longitude": 116.4074, "latitude": 39.9042, "city": "Beijing"}"#,
                &RunCancellationToken::new(),
            )
            .await
            .unwrap();

        let days: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0]["fxDate"], "2025-07-01");
        assert_eq!(days[0]["textDay"], "Sunny");
        assert_eq!(days[1]["cityName"], "Beijing");
        assert_eq!(days[0]["uvIndex"], "9");
        assert!(days[0].get("iconDay").is_none());
    }

    #[tokio::test]
    async fn fenced_input_unit_and_lang_are_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("unit", "i"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200", "daily": [day("2025-07-01", "Sunny")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = tool(&server, WeatherOptions::default().unit("i").lang("en"))
            .call(
                "```json\n{\"longitude\": -74.0, \"latitude\": 40.7, \"city\": \"New York\"}\n```",
                &RunCancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(out.contains("New York"));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let server = MockServer::start().await;
        let err = tool(&server, WeatherOptions::default())
            .call("Beijing", &RunCancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_daily_is_an_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": "200"})))
            .mount(&server)
            .await;

        let out = tool(&server, WeatherOptions::default())
            .call(r#"{"longitude": 1, "latitude": 2}"#, &RunCancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, NO_RESULTS);
    }

    #[tokio::test]
    async fn api_error_is_a_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": "402"})))
            .mount(&server)
            .await;

        let err = tool(&server, WeatherOptions::default())
            .call(r#"{"longitude": 1, "latitude": 2}"#, &RunCancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Api { status: 402, .. }));
    }
}
