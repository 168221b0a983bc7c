//! Single-shot clarification exchange.
//!
//! Lifecycle:
//! Idle -> AwaitingUserElaboration -> Submitting -> Idle (success)
//! Submitting -> AwaitingUserElaboration (transport failure, retry allowed)
//! any state -> Idle (cancel)
//!
//! This type only tracks state and validates input. The session performs the
//! network call between [`ClarificationProtocol::begin_submit`] and
//! [`ClarificationProtocol::complete`] / [`ClarificationProtocol::fail`].

use crate::backend::ClarificationRequest;
use crate::error::ChatError;

/// Shortest accepted elaboration, in characters after trimming.
pub const MIN_ELABORATION_CHARS: usize = 5;

pub const EMPTY_ELABORATION_ERROR: &str = "Please provide more details about your symptoms.";
pub const SHORT_ELABORATION_ERROR: &str =
    "Please provide more detailed information (at least 5 characters).";
pub const CLARIFICATION_FAILED_ERROR: &str =
    "I'm sorry, I had trouble processing your clarification. Please try again.";

/// Where the exchange currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClarificationState {
    #[default]
    Idle,
    AwaitingUserElaboration,
    Submitting,
}

/// The open exchange: what the user originally said and what the backend asked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClarificationExchange {
    pub original_message: String,
    pub questions: Vec<String>,
    pub user_id: String,
}

/// Validate an elaboration, returning its trimmed form.
pub fn validate_elaboration(text: &str) -> Result<String, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::ClarificationInvalid(
            EMPTY_ELABORATION_ERROR.to_string(),
        ));
    }
    if trimmed.chars().count() < MIN_ELABORATION_CHARS {
        return Err(ChatError::ClarificationInvalid(
            SHORT_ELABORATION_ERROR.to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// A validated submit waiting on the network.
///
/// `generation` ties the eventual answer to the exchange that produced it, so
/// an answer arriving after a cancel is recognised as stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSubmit {
    pub request: ClarificationRequest,
    pub generation: u64,
}

/// State holder for at most one clarification exchange.
#[derive(Debug, Default)]
pub struct ClarificationProtocol {
    state: ClarificationState,
    exchange: Option<ClarificationExchange>,
    inline_error: Option<String>,
    generation: u64,
}

impl ClarificationProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClarificationState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != ClarificationState::Idle
    }

    pub fn exchange(&self) -> Option<&ClarificationExchange> {
        self.exchange.as_ref()
    }

    /// Error to display next to the elaboration input, if any.
    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    /// Open a new exchange. Fails while another one is open.
    pub fn open(&mut self, exchange: ClarificationExchange) -> Result<(), ChatError> {
        if self.is_open() {
            return Err(ChatError::ClarificationAlreadyOpen);
        }
        tracing::debug!(
            questions = exchange.questions.len(),
            "Clarification exchange opened"
        );
        self.exchange = Some(exchange);
        self.inline_error = None;
        self.generation += 1;
        self.state = ClarificationState::AwaitingUserElaboration;
        Ok(())
    }

    /// Validate `elaboration` and move to `Submitting`.
    ///
    /// On validation failure the state is unchanged and the message is kept
    /// as the inline error; no request is produced.
    pub fn begin_submit(&mut self, elaboration: &str) -> Result<PendingSubmit, ChatError> {
        if self.state != ClarificationState::AwaitingUserElaboration {
            return Err(ChatError::NoClarification);
        }
        let exchange = self.exchange.as_ref().ok_or(ChatError::NoClarification)?;

        let elaboration = match validate_elaboration(elaboration) {
            Ok(text) => text,
            Err(e) => {
                self.inline_error = Some(e.to_string());
                return Err(e);
            }
        };

        let request = ClarificationRequest {
            user_id: exchange.user_id.clone(),
            original_message: exchange.original_message.clone(),
            clarification_response: elaboration,
        };
        self.inline_error = None;
        self.state = ClarificationState::Submitting;
        Ok(PendingSubmit {
            request,
            generation: self.generation,
        })
    }

    /// Whether `generation` is the submit currently in flight.
    pub fn is_current(&self, generation: u64) -> bool {
        self.state == ClarificationState::Submitting && self.generation == generation
    }

    /// The submit succeeded: close the exchange.
    ///
    /// Returns `false` when the submit is stale (the exchange was cancelled
    /// or replaced meanwhile); its answer must then be dropped.
    pub fn complete(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        tracing::debug!("Clarification exchange completed");
        self.reset();
        true
    }

    /// The submit failed in transport: back to awaiting input, ready for retry.
    pub fn fail(&mut self, generation: u64) -> ChatError {
        if self.is_current(generation) {
            self.state = ClarificationState::AwaitingUserElaboration;
            self.inline_error = Some(CLARIFICATION_FAILED_ERROR.to_string());
        }
        ChatError::ClarificationFailed(CLARIFICATION_FAILED_ERROR.to_string())
    }

    /// Abandon the exchange without a trace, at any point.
    pub fn cancel(&mut self) -> Result<(), ChatError> {
        if !self.is_open() {
            return Err(ChatError::NoClarification);
        }
        tracing::debug!(state = ?self.state, "Clarification exchange cancelled");
        self.reset();
        Ok(())
    }

    /// Drop any exchange regardless of state.
    pub(crate) fn reset(&mut self) {
        self.state = ClarificationState::Idle;
        self.exchange = None;
        self.inline_error = None;
    }
}
