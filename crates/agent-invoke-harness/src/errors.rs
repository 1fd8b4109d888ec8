use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Errors returned by an Agent Service adapter before they are translated for
/// the public API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with an application-level failure (exception
    /// frame, non-success HTTP status, etc.).
    #[error("service error ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
    Service {
        code: Option<String>,
        message: String,
        status_code: Option<u16>,
    },
    /// Connection or stream I/O failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Response shape or event framing was invalid.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ServiceError {
    /// Creates a service-level error.
    pub fn service(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Service {
            code: code.map(Into::into),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns the service error code (exception name), if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            Self::Transport { .. } | Self::Protocol { .. } => None,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Service { message, .. }
            | Self::Transport { message }
            | Self::Protocol { message } => message,
        }
    }
}

/// Actionable category assigned to a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    InvalidAliasId,
    InvalidAgentId,
    Throttled,
    FileValidation,
    Validation,
    AccessDenied,
    ResourceNotFound,
    DeadlineExceeded,
    NetworkTimeout,
    Cancelled,
    Other,
}

impl ServiceErrorKind {
    /// Pattern-matches a service error against the known categories.
    ///
    /// Codes are matched before messages; the first matching category wins.
    pub fn classify(err: &ServiceError) -> Self {
        match err {
            ServiceError::Service {
                code,
                message,
                status_code,
            } => {
                let haystack = format!("{} {message}", code.as_deref().unwrap_or_default());
                let lower = haystack.to_ascii_lowercase();
                if haystack.contains("InvalidAgentAliasId") {
                    Self::InvalidAliasId
                } else if haystack.contains("InvalidAgentId") {
                    Self::InvalidAgentId
                } else if haystack.contains("ThrottlingException") || *status_code == Some(429) {
                    Self::Throttled
                } else if haystack.contains("ValidationException") && lower.contains("file") {
                    Self::FileValidation
                } else if haystack.contains("ValidationException") {
                    Self::Validation
                } else if haystack.contains("AccessDeniedException") || *status_code == Some(403)
                {
                    Self::AccessDenied
                } else if haystack.contains("ResourceNotFoundException")
                    || *status_code == Some(404)
                {
                    Self::ResourceNotFound
                } else if lower.contains("deadline exceeded") || lower.contains("timeout") {
                    Self::DeadlineExceeded
                } else {
                    Self::Other
                }
            }
            ServiceError::Transport { message } => {
                let lower = message.to_ascii_lowercase();
                let timed_out = lower.contains("timed out") || lower.contains("timeout");
                if timed_out && lower.contains("connect") {
                    Self::NetworkTimeout
                } else if timed_out || lower.contains("deadline exceeded") {
                    Self::DeadlineExceeded
                } else if lower.contains("canceled") || lower.contains("cancelled") {
                    Self::Cancelled
                } else {
                    Self::Other
                }
            }
            ServiceError::Protocol { .. } => Self::Other,
        }
    }

    /// Returns the user-facing message for this category.
    pub fn hint(self) -> &'static str {
        match self {
            Self::InvalidAliasId => {
                "agent alias ID not found or not accessible with your credentials"
            }
            Self::InvalidAgentId => "agent ID not found or not accessible with your credentials",
            Self::Throttled => "request was throttled - please reduce request rate and try again",
            Self::FileValidation => "file validation error - check file sizes and formats",
            Self::Validation => "validation error - please check your input parameters",
            Self::AccessDenied => "access denied - check your permissions for the agent service",
            Self::ResourceNotFound => {
                "resource not found - verify your agent ID and alias ID are correct"
            }
            Self::DeadlineExceeded => "operation timed out - try increasing the timeout value",
            Self::NetworkTimeout => {
                "network connection timed out - check your internet connection"
            }
            Self::Cancelled => "operation canceled by user",
            Self::Other => "agent service error",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hint())
    }
}

/// Why a run was aborted before it produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    /// The configured run timeout elapsed.
    #[error("operation timed out after {0:?} - try increasing the timeout value")]
    DeadlineExceeded(Duration),
    /// The caller (for example an interrupt signal) aborted the run.
    #[error("operation canceled by user")]
    Interrupted,
}

/// Top-level error type for the public harness API.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Connection or credential configuration could not be resolved.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid run options, reported before any network call.
    #[error("{0}")]
    Validation(String),
    /// The running total of upload file sizes crossed the upload ceiling.
    #[error(
        "total upload file size exceeds 10MB limit (got {:.2}MB)",
        megabytes(.total_bytes)
    )]
    UploadTooLarge { total_bytes: u64 },
    /// A local file operation failed.
    #[error("{context} '{}'", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Agent Service failure, rewritten into an actionable category.
    #[error("{kind}")]
    Service {
        kind: ServiceErrorKind,
        #[source]
        source: ServiceError,
    },
    /// The run was aborted by its deadline or by the caller.
    #[error(transparent)]
    Cancelled(CancelReason),
    /// Writing rendered output to its destination failed.
    #[error("failed to write output")]
    Output(#[source] std::io::Error),
    /// The structured document could not be serialized.
    #[error("failed to marshal response to JSON")]
    Serialize(#[from] serde_json::Error),
}

impl HarnessError {
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns the service error category when this is a service failure.
    pub fn service_kind(&self) -> Option<ServiceErrorKind> {
        match self {
            Self::Service { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<CancelReason> for HarnessError {
    fn from(value: CancelReason) -> Self {
        HarnessError::Cancelled(value)
    }
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

/// Rewrites an adapter error into the public error, keeping it as the source.
pub fn translate_service_error(err: ServiceError) -> HarnessError {
    HarnessError::Service {
        kind: ServiceErrorKind::classify(&err),
        source: err,
    }
}

/// A failed operation together with the data it produced before failing.
///
/// Used by the stream reducer (partial fold) and the file materializer
/// (paths already written).
#[derive(Debug)]
pub struct PartialFailure<T> {
    /// Output accumulated before the failure.
    pub partial: T,
    /// The failure itself.
    pub error: HarnessError,
}

impl<T> PartialFailure<T> {
    pub(crate) fn new(partial: T, error: HarnessError) -> Self {
        Self { partial, error }
    }

    /// Discards the partial output and keeps only the error.
    pub fn into_error(self) -> HarnessError {
        self.error
    }
}

impl<T> fmt::Display for PartialFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T: fmt::Debug> std::error::Error for PartialFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(code: &str, message: &str) -> ServiceError {
        ServiceError::service(Some(code), message, None)
    }

    #[test]
    fn classifies_known_service_codes() {
        let cases = [
            ("InvalidAgentAliasId", "alias", ServiceErrorKind::InvalidAliasId),
            ("InvalidAgentId", "agent", ServiceErrorKind::InvalidAgentId),
            ("ThrottlingException", "slow down", ServiceErrorKind::Throttled),
            ("ValidationException", "bad input", ServiceErrorKind::Validation),
            ("AccessDeniedException", "nope", ServiceErrorKind::AccessDenied),
            (
                "ResourceNotFoundException",
                "missing",
                ServiceErrorKind::ResourceNotFound,
            ),
        ];
        for (code, message, expected) in cases {
            assert_eq!(
                ServiceErrorKind::classify(&service(code, message)),
                expected,
                "{code}"
            );
        }
    }

    #[test]
    fn file_validation_wins_over_generic_validation() {
        let err = service("ValidationException", "File size exceeds limit");
        assert_eq!(
            ServiceErrorKind::classify(&err),
            ServiceErrorKind::FileValidation
        );
    }

    #[test]
    fn status_codes_fill_in_for_missing_codes() {
        let err = ServiceError::service(None::<String>, "too many requests", Some(429));
        assert_eq!(ServiceErrorKind::classify(&err), ServiceErrorKind::Throttled);
    }

    #[test]
    fn transport_timeouts_are_split_by_phase() {
        let connect = ServiceError::transport("error trying to connect: operation timed out");
        let read = ServiceError::transport("stream read failed: operation timed out");
        let cancelled = ServiceError::transport("request canceled");
        assert_eq!(
            ServiceErrorKind::classify(&connect),
            ServiceErrorKind::NetworkTimeout
        );
        assert_eq!(
            ServiceErrorKind::classify(&read),
            ServiceErrorKind::DeadlineExceeded
        );
        assert_eq!(
            ServiceErrorKind::classify(&cancelled),
            ServiceErrorKind::Cancelled
        );
    }

    #[test]
    fn translation_keeps_cause_as_source() {
        let err = translate_service_error(service("AccessDeniedException", "not authorized"));
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::AccessDenied));
        assert!(err.to_string().starts_with("access denied"));
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("not authorized"));
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_message() {
        let err = translate_service_error(ServiceError::protocol("garbled frame"));
        assert_eq!(err.to_string(), "agent service error");
    }

    #[test]
    fn upload_limit_message_reports_megabytes() {
        let err = HarnessError::UploadTooLarge {
            total_bytes: 10 * 1024 * 1024 + 1,
        };
        assert_eq!(
            err.to_string(),
            "total upload file size exceeds 10MB limit (got 10.00MB)"
        );
    }
}
