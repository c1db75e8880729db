//! Error types for Datahub API calls

use thiserror::Error;

/// Result type for Datahub client operations
pub type Result<T> = std::result::Result<T, DatahubError>;

/// Error codes Datahub returns when the addressed object does not exist
pub const NOT_FOUND_CODES: &[&str] = &["NoSuchProject", "NoSuchTopic", "NoSuchSubscription"];

/// Errors that can occur while calling Datahub
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatahubError {
    /// The service answered with an error document
    #[error("{code}: {message} (status {status}, request id {request_id})")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Access keys are missing or unusable
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The worker pool queue is at capacity
    #[error("async task queue is full ({capacity} pending tasks)")]
    QueueFull { capacity: usize },

    /// The worker pool has been shut down or cannot start
    #[error("async worker pool is not running: {0}")]
    PoolClosed(String),
}

impl DatahubError {
    /// Build an API error without a request id
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
            request_id: "-".to_string(),
        }
    }

    /// The Datahub error code, if the service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the addressed project, topic or subscription does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                NOT_FOUND_CODES.contains(&code.as_str())
                    || (*status == 404 && code.starts_with("NoSuch"))
            }
            _ => false,
        }
    }

    /// Whether the error code is one of `codes`
    pub fn is_expected(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|code| codes.contains(&code))
    }
}

/// Format a Datahub error for display
///
/// Known error codes are mapped to short operator-facing hints; everything
/// else is truncated to keep raw service output out of the terminal.
pub fn format_datahub_error(error: &DatahubError) -> String {
    if error.is_not_found() {
        return "Resource not found.".to_string();
    }

    match error {
        DatahubError::Api { code, status, .. } => match code.as_str() {
            "Unauthorized" | "AuthFailed" | "NoPermission" => {
                "Authentication failed. Check ALICLOUD_ACCESS_KEY and ALICLOUD_SECRET_KEY.".to_string()
            }
            "LimitExceeded" => "Rate limit exceeded. Please try again later.".to_string(),
            "ProjectAlreadyExist" | "TopicAlreadyExist" | "ObjectAlreadyExist" => {
                "Resource conflict. The resource already exists.".to_string()
            }
            "InvalidParameter" | "InvalidSchema" | "ValidationFailed" => {
                "Invalid request. Check your parameters.".to_string()
            }
            "InvalidStatus" => "The resource is busy. Please try again.".to_string(),
            _ if *status >= 500 => {
                "Datahub service temporarily unavailable. Please try again.".to_string()
            }
            _ => truncate(&error.to_string()),
        },
        DatahubError::Transport(_) => {
            "Request failed. Check your network connection and endpoint.".to_string()
        }
        other => truncate(&other.to_string()),
    }
}

fn truncate(message: &str) -> String {
    let sanitized = message
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < message.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_codes() {
        assert!(DatahubError::api(404, "NoSuchTopic", "gone").is_not_found());
        assert!(DatahubError::api(400, "NoSuchProject", "gone").is_not_found());
        assert!(DatahubError::api(404, "NoSuchShard", "gone").is_not_found());
        assert!(!DatahubError::api(403, "AuthFailed", "denied").is_not_found());
        assert!(!DatahubError::Decode("bad".into()).is_not_found());
    }

    #[test]
    fn test_is_expected() {
        let err = DatahubError::api(400, "InvalidStatus", "busy");
        assert!(err.is_expected(&["AuthFailed", "InvalidStatus"]));
        assert!(!err.is_expected(&["AuthFailed"]));
        assert!(!DatahubError::Decode("x".into()).is_expected(&["AuthFailed"]));
    }

    #[test]
    fn test_format_known_codes() {
        let msg = format_datahub_error(&DatahubError::api(401, "Unauthorized", "sig mismatch"));
        assert!(msg.contains("Authentication failed"));

        let msg = format_datahub_error(&DatahubError::api(503, "ServiceUnavailable", "down"));
        assert!(msg.contains("temporarily unavailable"));

        let msg = format_datahub_error(&DatahubError::api(404, "NoSuchTopic", "x"));
        assert_eq!(msg, "Resource not found.");
    }

    #[test]
    fn test_format_truncates_unknown() {
        let long = "x".repeat(200);
        let msg = format_datahub_error(&DatahubError::Decode(long));
        assert!(msg.ends_with("..."));
        assert!(msg.len() <= 83);
    }
}
