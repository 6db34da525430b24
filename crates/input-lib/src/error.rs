//! Error types shared by the input plugins

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while building or gathering an input.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Username or password missing from the plugin configuration.
    #[error("a username and password must be provided in the input configuration")]
    MissingCredentials,

    /// Transport-level failure (connect, timeout, TLS handshake).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("unexpected response from API: status={status}, body={body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Response body was not the expected JSON shape.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A sample carried a timestamp that does not match the expected format.
    #[error("invalid sample timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A history call returned no samples where at least one is required.
    #[error("no {0} samples returned for volume")]
    EmptyHistory(&'static str),

    /// TLS material could not be loaded.
    #[error("invalid TLS configuration: {0}")]
    Tls(String),

    /// The bearer token file could not be read.
    #[error("failed to read bearer token from {}: {source}", .path.display())]
    TokenRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Plugin table could not be turned into a plugin configuration.
    #[error("invalid input configuration: {0}")]
    Config(String),

    /// No factory registered under this name.
    #[error("unknown input plugin: {0}")]
    UnknownInput(String),

    /// Some resource kinds failed while others succeeded.
    #[error("{}", PartialGatherDisplay(.0))]
    PartialGather(Vec<KindFailure>),
}

/// A single resource kind that failed during a fan-out gather.
#[derive(Debug)]
pub struct KindFailure {
    pub kind: String,
    pub error: InputError,
}

struct PartialGatherDisplay<'a>(&'a [KindFailure]);

impl fmt::Display for PartialGatherDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} resource kind(s) failed to gather", self.0.len())?;
        for failure in self.0 {
            write!(f, "; {}: {}", failure.kind, failure.error)?;
        }
        Ok(())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, InputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_mentions_status() {
        let err = InputError::UnexpectedStatus {
            status: 401,
            body: "denied".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_partial_gather_lists_every_kind() {
        let err = InputError::PartialGather(vec![
            KindFailure {
                kind: "pods".to_string(),
                error: InputError::UnexpectedStatus {
                    status: 403,
                    body: String::new(),
                },
            },
            KindFailure {
                kind: "nodes".to_string(),
                error: InputError::Config("boom".to_string()),
            },
        ]);

        let message = err.to_string();
        assert!(message.starts_with("2 resource kind(s) failed"));
        assert!(message.contains("pods: unexpected response"));
        assert!(message.contains("nodes: invalid input configuration: boom"));
    }
}
