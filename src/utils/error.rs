//! Customized unified error type.

use std::fmt;
use std::io;

/// Customized error type for Taglog. Most call sites produce the `Msg`
/// variant through `logged_err!`; the named variants are the error kinds the
/// log system's control flow must tell apart.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TaglogError {
    /// Catch-all message error.
    Msg(String),

    /// A peer endpoint vanished; it may reappear under a new address.
    BrokenPromise,

    /// The log server was stopped by a newer epoch.
    LogServerStopped,

    /// A local replica set can no longer satisfy its replication policy.
    MasterLogFailed,

    /// Recruitment for a new epoch failed or timed out.
    MasterRecoveryFailed,

    /// A peek was requested below every surviving generation.
    WorkerRemoved,

    /// Cooperative cancellation.
    Cancelled,

    /// A bounded-window RPC did not complete in time.
    Timeout,
}

impl TaglogError {
    /// Makes a message-variant error out of anything printable.
    pub fn msg(e: impl ToString) -> Self {
        TaglogError::Msg(e.to_string())
    }
}

impl fmt::Display for TaglogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaglogError::Msg(s) => write!(f, "{}", s), // do not display literal quotes
            TaglogError::BrokenPromise => write!(f, "broken promise"),
            TaglogError::LogServerStopped => write!(f, "log server stopped"),
            TaglogError::MasterLogFailed => write!(f, "master log failed"),
            TaglogError::MasterRecoveryFailed => write!(f, "master recovery failed"),
            TaglogError::WorkerRemoved => write!(f, "worker removed"),
            TaglogError::Cancelled => write!(f, "cancelled"),
            TaglogError::Timeout => write!(f, "timed out"),
        }
    }
}

// Helper macro for saving boiler-plate `impl From<T>`s for transparent
// conversion from various common error types to `TaglogError`.
macro_rules! impl_from_error {
    ($error:ty) => {
        impl From<$error> for TaglogError {
            fn from(e: $error) -> Self {
                // just store the source error's string representation
                TaglogError::Msg(e.to_string())
            }
        }
    };
}

impl_from_error!(io::Error);
impl_from_error!(rmp_serde::encode::Error);
impl_from_error!(rmp_serde::decode::Error);
impl_from_error!(toml::ser::Error);
impl_from_error!(toml::de::Error);
impl_from_error!(tokio::task::JoinError);

impl<T> From<tokio::sync::watch::error::SendError<T>> for TaglogError {
    fn from(e: tokio::sync::watch::error::SendError<T>) -> Self {
        TaglogError::Msg(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for TaglogError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> Self {
        TaglogError::Msg(e.to_string())
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = TaglogError::Msg("what the heck?".into());
        assert_eq!(format!("{}", e), String::from("what the heck?"));
        assert_eq!(
            format!("{}", TaglogError::BrokenPromise),
            String::from("broken promise")
        );
    }

    #[test]
    fn from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "oh no!");
        let e = TaglogError::from(io_error);
        assert!(matches!(e, TaglogError::Msg(s) if s.contains("oh no!")));
    }
}
