use thiserror::Error;

/// Crate-wide error type.
///
/// Errors are internal plumbing: the public load/save surface never lets
/// one escape to the embedding page. Anything that fails there degrades to
/// "consent not recorded this time" plus a `tracing` diagnostic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsentError {
    #[error("Invalid logging endpoint: {url}")]
    InvalidEndpoint { url: String },
    #[error("Record encoding failed: {message}")]
    EncodeFailed { message: String },
    #[error("Transport error: {message}")]
    Transport { message: String },
    #[error("Logging endpoint returned status {status}")]
    UnexpectedStatus { status: u16 },
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl ConsentError {
    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>) -> Self {
        Self::InvalidEndpoint { url: url.into() }
    }

    /// Create an encode failure error.
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// True for any non-2xx endpoint response.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors() {
        let err = ConsentError::invalid_endpoint("not a url");
        assert_eq!(
            err,
            ConsentError::InvalidEndpoint {
                url: "not a url".to_string()
            }
        );

        let err = ConsentError::UnexpectedStatus { status: 500 };
        assert!(err.is_status());
        assert!(!ConsentError::transport("reset").is_status());
    }

    #[test]
    fn test_display_messages() {
        let err = ConsentError::UnexpectedStatus { status: 404 };
        assert_eq!(err.to_string(), "Logging endpoint returned status 404");
    }
}
