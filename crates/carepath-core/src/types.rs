use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Intent tags
// =============================================================================

/// Intent tags the controller branches on or synthesizes itself.
///
/// The backend may send any other tag; those are carried through opaquely.
pub mod intents {
    /// Prefix shared by every intent emitted during a booking conversation.
    pub const BOOKING_PREFIX: &str = "booking_";

    pub const GREETING: &str = "greeting";
    pub const ERROR: &str = "error";
    pub const BOOKING_ERROR: &str = "booking_error";
    pub const BOOKING_LOCATION_SELECTION: &str = "booking_location_selection";
    pub const BOOKING_DATE_SELECTION: &str = "booking_date_selection";
    pub const BOOKING_TIME_SELECTION: &str = "booking_time_selection";
    pub const APPOINTMENT_BOOKING: &str = "appointment_booking";
}

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Backend-reported confidence in its analysis of the user's input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Parse a backend confidence tag. Unknown or absent tags yield `Medium`.
    pub fn parse_or_default(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => ConfidenceLevel::Low,
            Some("high") => ConfidenceLevel::High,
            _ => ConfidenceLevel::Medium,
        }
    }
}

/// Reachability of the AI service as last observed by a health probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

// =============================================================================
// Doctor recommendation
// =============================================================================

/// A doctor suggested by the backend.
///
/// Only `name` is mandatory on the wire. The aliases accept the field names
/// used by both the AI service and the doctor directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRecommendation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, alias = "speciality")]
    pub specialty: String,
    #[serde(
        default,
        alias = "experience",
        alias = "yearsOfExperience",
        skip_serializing_if = "Option::is_none"
    )]
    pub experience_years: Option<u32>,
    #[serde(default, alias = "feesPerHour", skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl DoctorRecommendation {
    pub fn new(name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            specialty: specialty.into(),
            experience_years: None,
            fee_rate: None,
            location: None,
            rating: None,
        }
    }

    /// One-line human summary; absent optional fields are simply omitted.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if !self.specialty.is_empty() {
            parts.push(self.specialty.clone());
        }
        if let Some(years) = self.experience_years {
            parts.push(format!("{} years experience", years));
        }
        if let Some(fee) = self.fee_rate {
            parts.push(format!("${}/hour", fee));
        }
        if let Some(ref location) = self.location {
            parts.push(location.clone());
        }
        if let Some(rating) = self.rating {
            parts.push(format!("rating {}", rating));
        }
        parts.join(" | ")
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Identifier of a message within one session.
///
/// The greeting carries the fixed id `"welcome"`; every later message gets the
/// next sequence number. `Welcome` orders before any `Seq`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageId {
    Welcome,
    Seq(u64),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Welcome => f.write_str("welcome"),
            MessageId::Seq(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageId::Welcome => serializer.serialize_str("welcome"),
            MessageId::Seq(n) => serializer.serialize_u64(*n),
        }
    }
}

/// Extra content attached to the answer of a clarification submit.
///
/// Never triggers another clarification exchange; it is display content only.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationFollowUp {
    pub requires_further_clarification: bool,
    pub additional_questions: Vec<String>,
    pub processed_message: Option<String>,
}

/// Content of an assistant message, with every backend default already applied.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub text: String,
    pub intent: Option<String>,
    pub doctors: Vec<DoctorRecommendation>,
    pub requires_clarification: bool,
    pub clarification_questions: Vec<String>,
    pub confidence_level: ConfidenceLevel,
    pub fallback_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<ClarificationFollowUp>,
}

impl AssistantReply {
    /// A locally produced reply (greeting, error, confirmation).
    pub fn synthesized(text: impl Into<String>, intent: &str) -> Self {
        Self {
            text: text.into(),
            intent: Some(intent.to_string()),
            doctors: Vec::new(),
            requires_clarification: false,
            clarification_questions: Vec::new(),
            confidence_level: ConfidenceLevel::default(),
            fallback_level: "unknown".to_string(),
            follow_up: None,
        }
    }

    /// Whether this reply should open a clarification exchange.
    pub fn needs_clarification(&self) -> bool {
        self.requires_clarification && !self.clarification_questions.is_empty()
    }
}

/// Sender-discriminated message payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "sender", rename_all = "snake_case")]
pub enum MessageBody {
    User { text: String },
    Assistant(AssistantReply),
}

/// A single entry in the conversation log. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    pub fn sender(&self) -> Sender {
        match self.body {
            MessageBody::User { .. } => Sender::User,
            MessageBody::Assistant(_) => Sender::Assistant,
        }
    }

    pub fn text(&self) -> &str {
        match &self.body {
            MessageBody::User { text } => text,
            MessageBody::Assistant(reply) => &reply.text,
        }
    }

    /// Intent tag; always `None` for user messages.
    pub fn intent(&self) -> Option<&str> {
        match &self.body {
            MessageBody::User { .. } => None,
            MessageBody::Assistant(reply) => reply.intent.as_deref(),
        }
    }

    pub fn doctors(&self) -> &[DoctorRecommendation] {
        match &self.body {
            MessageBody::User { .. } => &[],
            MessageBody::Assistant(reply) => &reply.doctors,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantReply> {
        match &self.body {
            MessageBody::User { .. } => None,
            MessageBody::Assistant(reply) => Some(reply),
        }
    }
}
