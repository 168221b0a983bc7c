//! Endpoint routing for outgoing user utterances.

use carepath_core::types::intents;

/// Fixed reply shown when the general chat endpoint cannot be reached.
pub const GENERAL_CHAT_APOLOGY: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again later.";

/// Fixed reply shown when the booking endpoint cannot be reached.
pub const BOOKING_APOLOGY: &str =
    "I'm sorry, I'm having trouble with the booking process right now. Please try again later.";

/// Backend capability a user utterance is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GeneralChat,
    BookingConversation,
}

impl Endpoint {
    /// Intent tag and text of the message synthesized when this endpoint fails.
    pub fn fallback_reply(&self) -> (&'static str, &'static str) {
        match self {
            Endpoint::GeneralChat => (intents::ERROR, GENERAL_CHAT_APOLOGY),
            Endpoint::BookingConversation => (intents::BOOKING_ERROR, BOOKING_APOLOGY),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::GeneralChat => "general_chat",
            Endpoint::BookingConversation => "booking_conversation",
        }
    }
}

/// Choose the endpoint for the next user utterance from the intent of the
/// most recent assistant message.
///
/// Any `booking_` intent keeps the user inside the booking conversation;
/// everything else, including no prior intent, goes to general chat.
pub fn route_for(last_assistant_intent: Option<&str>) -> Endpoint {
    match last_assistant_intent {
        Some(intent) if intent.starts_with(intents::BOOKING_PREFIX) => {
            Endpoint::BookingConversation
        }
        _ => Endpoint::GeneralChat,
    }
}
