//! Maps concrete failures onto a closed set of error kinds.
//!
//! Presentation (the text shown to chat users) lives in the channel adapter;
//! this module only decides which kind a failure belongs to.

use std::fmt;

use crate::provider::ProviderError;
use crate::tools::ToolError;

/// Closed set of failure categories surfaced to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The API answered in a shape this client does not understand.
    Incompatible,
    /// A required endpoint, model or capability is not available.
    Unavailable,
    Authentication,
    RateLimited,
    Timeout,
    Connection,
    /// The bot may not post in the target channel.
    Permission,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Incompatible => "incompatible",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::Permission => "permission",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            ProviderError::Http(e) if e.is_connect() => ErrorKind::Connection,
            ProviderError::Http(e) if e.is_decode() => ErrorKind::Incompatible,
            ProviderError::Http(_) => ErrorKind::Internal,
            ProviderError::Api { status, .. } if *status >= 500 => ErrorKind::Unavailable,
            ProviderError::Api { .. } => ErrorKind::Incompatible,
            ProviderError::Unauthorized(_) => ErrorKind::Authentication,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::Timeout => ErrorKind::Timeout,
            ProviderError::Connection(_) => ErrorKind::Connection,
            ProviderError::NotFound(_) => ErrorKind::Unavailable,
            ProviderError::Parse(_) => ErrorKind::Incompatible,
        }
    }
}

/// Failure of a whole turn (tool failures are recorded, not raised).
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("model request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("attachment '{filename}' could not be read: {source}")]
    Attachment {
        filename: String,
        #[source]
        source: ProviderError,
    },
}

impl TurnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TurnError::Provider(e) => e.kind(),
            TurnError::Attachment { source, .. } => source.kind(),
        }
    }
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Provider(e) => e.kind(),
            ToolError::UnknownTool { .. }
            | ToolError::InvalidArguments { .. }
            | ToolError::Decode(_) => ErrorKind::Incompatible,
            ToolError::Io(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_kinds() {
        assert_eq!(
            ProviderError::Unauthorized("bad key".into()).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ProviderError::RateLimited { retry_after_ms: 1000 }.kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(ProviderError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            ProviderError::Connection("refused".into()).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            ProviderError::NotFound("model".into()).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            ProviderError::Parse("missing field".into()).kind(),
            ErrorKind::Incompatible
        );
        assert_eq!(
            ProviderError::Api { status: 503, message: String::new() }.kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            ProviderError::Api { status: 400, message: String::new() }.kind(),
            ErrorKind::Incompatible
        );
    }

    #[test]
    fn turn_error_uses_provider_kind() {
        let err = TurnError::from(ProviderError::Timeout);
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err = TurnError::Attachment {
            filename: "cat.png".into(),
            source: ProviderError::Unauthorized(String::new()),
        };
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn unknown_tool_is_incompatible() {
        let err = ToolError::UnknownTool {
            name: "launch_rocket".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Incompatible);
    }
}
