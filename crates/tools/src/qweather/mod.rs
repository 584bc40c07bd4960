//! QWeather tools: a 7-day forecast by coordinates and a city lookup that
//! produces those coordinates.
//!
//! Both tools share one API key, sent as the `X-QW-Api-Key` header.

pub mod geo;
pub mod weather;

use parallax_core::error::ToolError;
use serde::Deserialize;

pub use geo::{GeoOptions, GeoTool};
pub use weather::{WeatherOptions, WeatherTool};

pub const QWEATHER_API_KEY_ENV: &str = "QWEATHER_API_KEY";

const API_KEY_HEADER: &str = "X-QW-Api-Key";

/// The error object QWeather returns instead of data.
#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

/// Fields every QWeather response carries.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<ApiProblem>,
}

/// Turn an error object or a non-"200" code into a [`ToolError`].
fn check_envelope(api: &str, body: &str) -> Result<(), ToolError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ToolError::ExecutionFailed(format!("unexpected {api} response: {e}")))?;

    if let Some(problem) = envelope.error {
        return Err(ToolError::Api {
            status: problem.status.unwrap_or(200),
            message: format!("{api}: {}: {}", problem.title, problem.detail),
        });
    }

    match envelope.code.as_deref() {
        Some("200") => Ok(()),
        code => Err(ToolError::Api {
            status: code.and_then(|c| c.parse().ok()).unwrap_or(0),
            message: format!("{api} returned {body}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope() {
        assert!(check_envelope("q-geo", r#"{"code":"200","location":[]}"#).is_ok());
    }

    #[test]
    fn error_object_wins() {
        let body = r#"{"error":{"status":401,"type":"x","title":"Unauthorized","detail":"bad key"}}"#;
        let err = check_envelope("q-weather", body).unwrap_err();
        match err {
            ToolError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "q-weather: Unauthorized: bad key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn non_200_code_is_an_error() {
        let err = check_envelope("q-geo", r#"{"code":"404"}"#).unwrap_err();
        assert!(matches!(err, ToolError::Api { status: 404, .. }));
    }
}
