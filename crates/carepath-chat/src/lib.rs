//! Conversational booking-intent controller for CarePath.
//!
//! Routes each user turn to the general chat or booking conversation
//! endpoint, derives pickers (locations, dates, time slots, doctors) from
//! free-text replies, runs the single-shot clarification exchange, and keeps
//! the session's message log strictly ordered.

pub mod backend;
pub mod booking;
pub mod clarification;
pub mod error;
pub mod extractor;
pub mod handoff;
pub mod resolver;
pub mod router;
pub mod session;

pub use backend::{BackendCall, ChatBackend, ChatRequest, ClarificationRequest, HttpBackend, MockBackend};
pub use booking::{parse_time_slot, BookingConfirmation, BookingRequest};
pub use clarification::{ClarificationExchange, ClarificationProtocol, ClarificationState};
pub use error::ChatError;
pub use extractor::{extract_locations, extract_time_slots};
pub use handoff::{FileHandoff, HandoffSlot, MemoryHandoff, HANDOFF_KEY};
pub use resolver::{Affordance, DatePicker, IntentUiResolver};
pub use router::{route_for, Endpoint};
pub use session::{
    ClarificationOutcome, ConversationSession, Pacing, SessionSettings, SessionStage,
    SessionStats, TurnOutcome,
};
