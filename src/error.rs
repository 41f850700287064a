//! Error types for the receiver binding.
//!
//! All fallible operations return [`Result<T>`], which uses [`Error`] as the
//! error type. Lifecycle and configuration failures are surfaced to the
//! caller synchronously; per-event decode failures and unresolved references
//! are logged and dropped at the dispatch boundary so one malformed event
//! never takes down the session.

use crate::session::SessionState;

/// The error type for all session, decode, and sink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport could not be established (native open returned non-zero
    /// or the rtl_tcp connection failed).
    #[error("failed to open {transport} transport (native error {code})")]
    Open {
        /// Which transport was being opened: "device", "pipe", or "rtltcp".
        transport: &'static str,
        code: i32,
    },

    /// The native engine rejected a configuration setter.
    #[error("engine rejected {parameter} (native error {code})")]
    Configuration {
        /// The parameter that failed, e.g. "frequency" or "gain".
        parameter: &'static str,
        code: i32,
    },

    /// An operation was attempted outside its required lifecycle state.
    /// This is a caller contract violation, not a retry case.
    #[error("{operation} not allowed while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A sample buffer or sink input was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// One field or one event could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    /// A STREAM/PACKET/LOT event referenced a (service, component) pair the
    /// current registry generation does not know about.
    #[error("no registry entry for service {service} component {component}")]
    UnresolvedReference { service: u16, component: u8 },

    /// An underlying I/O error from one of the file sinks.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_configuration() {
        let e = Error::Configuration {
            parameter: "frequency",
            code: -5,
        };
        assert_eq!(e.to_string(), "engine rejected frequency (native error -5)");
    }

    #[test]
    fn display_invalid_state() {
        let e = Error::InvalidState {
            operation: "start",
            state: SessionState::Closed,
        };
        assert_eq!(e.to_string(), "start not allowed while session is closed");
    }

    #[test]
    fn display_unresolved_reference() {
        let e = Error::UnresolvedReference {
            service: 5,
            component: 0,
        };
        assert_eq!(
            e.to_string(),
            "no registry entry for service 5 component 0"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
