//! Error types for the booking-intent controller.

use carepath_core::error::CarepathError;

/// Errors surfaced by the conversation session and its sub-protocols.
///
/// Transport failures during an ordinary turn never show up here: the session
/// turns them into an assistant message instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("a reply is still pending for the previous message")]
    TurnInFlight,
    #[error("the assistant is offline")]
    Disconnected,
    #[error("a clarification is waiting for an answer")]
    ClarificationPending,
    #[error("a clarification exchange is already open")]
    ClarificationAlreadyOpen,
    #[error("no clarification exchange is waiting for an answer")]
    NoClarification,
    #[error("{0}")]
    ClarificationInvalid(String),
    #[error("{0}")]
    ClarificationFailed(String),
    #[error("session has ended")]
    SessionEnded,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed backend payload: {0}")]
    MalformedPayload(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("handoff error: {0}")]
    Handoff(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// Session state is unusable; the only unrecoverable variant.
    #[error("session state lock poisoned: {0}")]
    LockPoisoned(String),
}

impl ChatError {
    /// Whether the surface must stop instead of reporting and carrying on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::LockPoisoned(_))
    }
}

impl From<CarepathError> for ChatError {
    fn from(err: CarepathError) -> Self {
        match err {
            CarepathError::Transport(msg) => ChatError::Transport(msg),
            CarepathError::MalformedPayload(msg) => ChatError::MalformedPayload(msg),
            CarepathError::Handoff(msg) => ChatError::Handoff(msg),
            CarepathError::Config(msg) => ChatError::Config(msg),
            // I/O and serde failures only come from the handoff slot.
            other => ChatError::Handoff(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(500).to_string(),
            "message exceeds maximum length of 500 characters"
        );
        assert_eq!(
            ChatError::TurnInFlight.to_string(),
            "a reply is still pending for the previous message"
        );
        assert_eq!(ChatError::Disconnected.to_string(), "the assistant is offline");
        assert_eq!(
            ChatError::ClarificationInvalid("too short".into()).to_string(),
            "too short"
        );
        assert_eq!(ChatError::SessionEnded.to_string(), "session has ended");
    }

    #[test]
    fn test_chat_error_from_carepath_error() {
        let err: ChatError = CarepathError::Transport("HTTP 502".into()).into();
        assert!(matches!(err, ChatError::Transport(ref m) if m == "HTTP 502"));

        let err: ChatError = CarepathError::MalformedPayload("slot".into()).into();
        assert!(matches!(err, ChatError::MalformedPayload(_)));

        let err: ChatError = CarepathError::Handoff("gone".into()).into();
        assert!(matches!(err, ChatError::Handoff(_)));

        let err: ChatError = CarepathError::Config("bad".into()).into();
        assert!(matches!(err, ChatError::Config(ref m) if m == "bad"));
    }

    #[test]
    fn test_slot_io_and_serde_errors_are_recoverable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only data dir");
        let err: ChatError = CarepathError::Io(io).into();
        match err {
            ChatError::Handoff(ref msg) => assert!(msg.contains("read-only data dir")),
            ref other => panic!("Expected Handoff, got {:?}", other),
        }
        assert!(!err.is_fatal());

        let serde = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ChatError = CarepathError::from(serde).into();
        assert!(matches!(err, ChatError::Handoff(_)));
        assert!(!err.is_fatal());

        assert!(ChatError::LockPoisoned("boom".into()).is_fatal());
    }

    #[test]
    fn test_chat_error_debug() {
        let debug = format!("{:?}", ChatError::Validation("reason".into()));
        assert!(debug.contains("Validation"));
    }
}
