//! Error types for the VMware snapshot monitor crate.

use std::fmt;

/// Categorised error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmwareErrorKind {
    /// Endpoint unreachable, connection reset or timed out
    TransportError,
    /// Login rejected, malformed, or no session key returned
    AuthenticationError,
    /// SOAP fault embedded in the response body
    ProtocolFault,
    /// Non-success HTTP status without a parseable fault
    UnexpectedStatus(u16),
    /// Response body could not be parsed at all
    MalformedResponse,
    /// Local configuration is unusable
    ConfigError,
}

impl VmwareErrorKind {
    /// Short category label for reporting.
    pub fn category(&self) -> &'static str {
        match self {
            VmwareErrorKind::TransportError => "transport",
            VmwareErrorKind::AuthenticationError => "authentication",
            VmwareErrorKind::ProtocolFault => "protocol-fault",
            VmwareErrorKind::UnexpectedStatus(_) => "unexpected-status",
            VmwareErrorKind::MalformedResponse => "malformed-response",
            VmwareErrorKind::ConfigError => "config",
        }
    }
}

impl fmt::Display for VmwareErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmwareErrorKind::UnexpectedStatus(code) => write!(f, "UnexpectedStatus({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct VmwareError {
    pub kind: VmwareErrorKind,
    pub message: String,
}

impl VmwareError {
    pub fn new(kind: VmwareErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::TransportError, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::AuthenticationError, msg)
    }

    pub fn fault(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ProtocolFault, msg)
    }

    pub fn status(code: u16, msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::UnexpectedStatus(code), msg)
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::MalformedResponse, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(VmwareErrorKind::ConfigError, msg)
    }
}

impl From<reqwest::Error> for VmwareError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::transport(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::transport(format!("Connection failed: {e}"))
        } else {
            Self::transport(format!("HTTP error: {e}"))
        }
    }
}

impl From<url::ParseError> for VmwareError {
    fn from(e: url::ParseError) -> Self {
        Self::config(format!("Invalid endpoint URL: {e}"))
    }
}

/// Convenience alias.
pub type VmwareResult<T> = Result<T, VmwareError>;
