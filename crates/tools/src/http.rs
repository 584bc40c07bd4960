//! Shared HTTP plumbing for the API-backed tools.

use parallax_core::RunCancellationToken;
use parallax_core::error::ToolError;
use std::future::Future;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn client() -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("parallax/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ToolError::ExecutionFailed(format!("HTTP client: {e}")))
}

/// Pick the explicit key, else the environment value. Empty keys count as missing.
pub(crate) fn resolve_api_key(
    explicit: Option<String>,
    from_env: Option<String>,
    env_var: &str,
) -> Result<String, ToolError> {
    explicit
        .or(from_env)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ToolError::MissingApiKey(format!("set it in the {env_var} environment variable"))
        })
}

/// Read an environment variable, treating unset and empty alike.
pub(crate) fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &RunCancellationToken,
    fut: impl Future<Output = Result<T, ToolError>>,
) -> Result<T, ToolError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ToolError::Cancelled),
        result = fut => result,
    }
}

/// Send a request and return the body of a 200 response.
pub(crate) async fn fetch_text(request: reqwest::RequestBuilder, api: &str) -> Result<String, ToolError> {
    let response = request
        .send()
        .await
        .map_err(|e| ToolError::Request(format!("{api}: {e}")))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ToolError::Request(format!("{api}: {e}")))?;

    if status != 200 {
        return Err(ToolError::Api {
            status,
            message: format!("{api} returned {body}"),
        });
    }
    Ok(body)
}

/// Models often wrap JSON input in code fences or a `json` tag.
pub(crate) fn strip_fences(input: &str) -> &str {
    let trimmed = input.trim().trim_matches('`').trim();
    trimmed
        .strip_prefix("json")
        .or_else(|| trimmed.strip_prefix("JSON"))
        .unwrap_or(trimmed)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins() {
        let key = resolve_api_key(Some("a".into()), Some("b".into()), "X_KEY").unwrap();
        assert_eq!(key, "a");
    }

    #[test]
    fn env_key_is_the_fallback() {
        assert_eq!(resolve_api_key(None, Some("b".into()), "X_KEY").unwrap(), "b");
    }

    #[test]
    fn missing_or_blank_key_names_the_variable() {
        for explicit in [None, Some("  ".to_string())] {
            let err = resolve_api_key(explicit, None, "X_KEY").unwrap_err();
            assert!(matches!(err, ToolError::MissingApiKey(ref m) if m.contains("X_KEY")));
        }
    }

    #[test]
    fn fences_and_tags_are_stripped() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_fences("JSON {}"), "{}");
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_work() {
        let cancel = RunCancellationToken::new();
        cancel.cancel();
        let result: Result<(), ToolError> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(ToolError::Cancelled)));
    }
}
