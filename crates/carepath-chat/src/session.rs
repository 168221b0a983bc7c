//! Conversation session: the message log and the turn algorithm.
//!
//! One session is live per chat surface. It is created when the surface
//! mounts ([`ConversationSession::start`]) and torn down when it goes away
//! ([`ConversationSession::end`]). Every mutation of the log goes through the
//! methods here.
//!
//! The state lock is never held across a network await. A turn marks itself
//! in flight, releases the lock, awaits the backend and the typing pacing,
//! then re-acquires the lock to append. Replies that land on an ended session
//! are dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use uuid::Uuid;

use carepath_core::config::CarepathConfig;
use carepath_core::types::{
    intents, AssistantReply, Connectivity, DoctorRecommendation, Message, MessageBody, MessageId,
};

use crate::backend::{ChatBackend, ChatRequest};
use crate::clarification::{
    ClarificationExchange, ClarificationProtocol, ClarificationState,
};
use crate::error::ChatError;
use crate::handoff::HandoffSlot;
use crate::resolver::{Affordance, IntentUiResolver};
use crate::router::{route_for, Endpoint};

/// Greeting shown when a session starts or is cleared.
pub const WELCOME_TEXT: &str = "Welcome to your AI Health Assistant! I'm here to help you find the right healthcare providers based on your symptoms and medical needs.\n\nYou can ask me about:\n• Symptom analysis and doctor recommendations\n• Finding specialists by medical field\n• Booking appointments\n• General health questions\n\nHow can I assist you today?";

/// Confirmation appended when the user hands a doctor off to booking.
pub fn booking_handoff_text(doctor_name: &str) -> String {
    format!(
        "Perfect! I'm taking you to book an appointment with {}. You can come back to chat anytime!",
        doctor_name
    )
}

// =============================================================================
// Stage, stats, pacing
// =============================================================================

/// Interaction stage of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStage {
    Greeting,
    AwaitingUserInput,
    AwaitingBackendReply,
    ClarificationOpen,
    Ended,
}

/// Counters shown alongside the conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStats {
    /// User messages sent.
    pub message_count: usize,
    pub doctors_recommended_count: usize,
    pub session_start: DateTime<Local>,
}

impl SessionStats {
    fn new(now: DateTime<Local>) -> Self {
        Self {
            message_count: 0,
            doctors_recommended_count: 0,
            session_start: now,
        }
    }

    /// Elapsed session time: `<1m`, `{m}m`, or `{h}h {m}m`.
    pub fn duration_label(&self, now: DateTime<Local>) -> String {
        let minutes = (now - self.session_start).num_minutes();
        if minutes < 1 {
            "<1m".to_string()
        } else if minutes < 60 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        }
    }
}

/// Minimum visible duration of the typing indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    per_char: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(per_char_ms: u64, max_ms: u64) -> Self {
        Self {
            per_char: Duration::from_millis(per_char_ms),
            max: Duration::from_millis(max_ms),
        }
    }

    /// No artificial delay at all.
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Indicator time for a user utterance: proportional to its length, capped.
    pub fn typing_delay(&self, text: &str) -> Duration {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        self.per_char.saturating_mul(chars).min(self.max)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(50, 2000)
    }
}

/// Per-session knobs, usually taken from [`CarepathConfig`].
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub user_id: String,
    pub max_message_length: usize,
    pub pacing: Pacing,
    pub resolver: IntentUiResolver,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_id: "user123".to_string(),
            max_message_length: 500,
            pacing: Pacing::default(),
            resolver: IntentUiResolver::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &CarepathConfig) -> Self {
        Self {
            user_id: config.general.user_id.clone(),
            max_message_length: config.chat.max_message_length,
            pacing: Pacing::new(config.chat.typing_ms_per_char, config.chat.typing_max_ms),
            resolver: IntentUiResolver::new(
                config.chat.booking_window_days,
                config.chat.quick_date_offsets.clone(),
            ),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a user turn that was accepted.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// The assistant reply was appended; `affordance` is the control offered with it.
    Replied {
        message_id: MessageId,
        affordance: Affordance,
    },
    /// The reply was appended and a clarification exchange is now open.
    ClarificationRequested {
        message_id: MessageId,
        questions: Vec<String>,
    },
    /// The backend was unreachable; an apology was appended instead.
    Failed { message_id: MessageId },
    /// The session ended while the turn was in flight; nothing was appended.
    Discarded,
}

/// Result of a clarification submit that reached the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum ClarificationOutcome {
    Answered {
        message_id: MessageId,
        affordance: Affordance,
    },
    /// The exchange was cancelled or the session ended meanwhile.
    Discarded,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug)]
struct SessionState {
    messages: Vec<Message>,
    next_seq: u64,
    connectivity: Connectivity,
    stats: SessionStats,
    stage: SessionStage,
    clarification: ClarificationProtocol,
}

impl SessionState {
    fn new() -> Self {
        let mut state = Self {
            messages: Vec::new(),
            next_seq: 1,
            connectivity: Connectivity::Unknown,
            stats: SessionStats::new(Local::now()),
            stage: SessionStage::Greeting,
            clarification: ClarificationProtocol::new(),
        };
        state.greet();
        state
    }

    fn greet(&mut self) {
        self.messages.push(Message {
            id: MessageId::Welcome,
            timestamp: Local::now(),
            body: MessageBody::Assistant(AssistantReply::synthesized(
                WELCOME_TEXT,
                intents::GREETING,
            )),
        });
    }

    fn append(&mut self, body: MessageBody) -> MessageId {
        let id = MessageId::Seq(self.next_seq);
        self.next_seq += 1;
        self.messages.push(Message {
            id,
            timestamp: Local::now(),
            body,
        });
        id
    }

    fn append_reply(&mut self, reply: AssistantReply) -> MessageId {
        self.stats.doctors_recommended_count += reply.doctors.len();
        self.append(MessageBody::Assistant(reply))
    }

    fn last_assistant_intent(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find_map(|m| m.as_assistant())
            .and_then(|reply| reply.intent.as_deref())
    }

    fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }
}

/// The live conversation of one chat surface.
pub struct ConversationSession {
    id: Uuid,
    backend: Arc<dyn ChatBackend>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
}

impl ConversationSession {
    /// Mount a session: the log starts with the greeting.
    pub fn start(backend: Arc<dyn ChatBackend>, settings: SessionSettings) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, user_id = %settings.user_id, "Chat session started");
        Self {
            id,
            backend,
            settings,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, ChatError> {
        self.state
            .lock()
            .map_err(|e| ChatError::LockPoisoned(e.to_string()))
    }

    // ---- Connectivity ----

    /// Probe the AI service and record the result.
    pub async fn check_connection(&self) -> Result<Connectivity, ChatError> {
        let connectivity = match self.backend.health().await {
            Ok(()) => Connectivity::Connected,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Health probe failed");
                Connectivity::Disconnected
            }
        };

        let mut state = self.lock()?;
        if state.stage != SessionStage::Ended {
            state.connectivity = connectivity;
        }
        tracing::debug!(session_id = %self.id, connectivity = ?connectivity, "Connectivity updated");
        Ok(connectivity)
    }

    pub fn connectivity(&self) -> Result<Connectivity, ChatError> {
        Ok(self.lock()?.connectivity)
    }

    // ---- User turns ----

    /// Send a user utterance through the capability gate: refused while the
    /// last probe reported the service unreachable.
    pub async fn send(&self, text: &str) -> Result<TurnOutcome, ChatError> {
        if self.connectivity()? == Connectivity::Disconnected {
            return Err(ChatError::Disconnected);
        }
        self.submit(text).await
    }

    /// Run one user turn: append the utterance, call the routed endpoint,
    /// pace, append the reply.
    ///
    /// Input errors and stage conflicts are returned before anything is
    /// appended or sent. A transport failure is not an error here: it yields
    /// [`TurnOutcome::Failed`] with an apology in the log.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.settings.max_message_length {
            return Err(ChatError::MessageTooLong(self.settings.max_message_length));
        }

        let endpoint = {
            let mut state = self.lock()?;
            match state.stage {
                SessionStage::Ended => return Err(ChatError::SessionEnded),
                SessionStage::AwaitingBackendReply => return Err(ChatError::TurnInFlight),
                SessionStage::ClarificationOpen => return Err(ChatError::ClarificationPending),
                SessionStage::Greeting | SessionStage::AwaitingUserInput => {}
            }
            let endpoint = route_for(state.last_assistant_intent());
            state.append(MessageBody::User {
                text: text.to_string(),
            });
            state.stats.message_count += 1;
            state.stage = SessionStage::AwaitingBackendReply;
            endpoint
        };

        tracing::debug!(
            session_id = %self.id,
            endpoint = endpoint.as_str(),
            chars = text.chars().count(),
            "Dispatching user turn"
        );

        let request = ChatRequest {
            message: text.to_string(),
            user_id: self.settings.user_id.clone(),
        };
        let started = tokio::time::Instant::now();
        let result = match endpoint {
            Endpoint::GeneralChat => self.backend.general_chat(&request).await,
            Endpoint::BookingConversation => self.backend.booking_turn(&request).await,
        };

        match result {
            Ok(reply) => {
                let remaining = self
                    .settings
                    .pacing
                    .typing_delay(text)
                    .saturating_sub(started.elapsed());
                if !remaining.is_zero() {
                    tokio::time::sleep(remaining).await;
                }
                self.finish_turn(reply, text)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    endpoint = endpoint.as_str(),
                    error = %e,
                    "Backend turn failed"
                );
                self.fail_turn(endpoint)
            }
        }
    }

    fn finish_turn(&self, reply: AssistantReply, user_text: &str) -> Result<TurnOutcome, ChatError> {
        let mut state = self.lock()?;
        if state.stage == SessionStage::Ended {
            tracing::debug!(session_id = %self.id, "Reply arrived after session ended, dropped");
            return Ok(TurnOutcome::Discarded);
        }

        // Open before appending so a refused open cannot strand the turn.
        let opened = if reply.needs_clarification() {
            let questions = reply.clarification_questions.clone();
            match state.clarification.open(ClarificationExchange {
                original_message: user_text.to_string(),
                questions: questions.clone(),
                user_id: self.settings.user_id.clone(),
            }) {
                Ok(()) => Some(questions),
                Err(e) => {
                    tracing::warn!(session_id = %self.id, error = %e, "Clarification not opened, reply kept as ordinary");
                    None
                }
            }
        } else {
            None
        };
        let message_id = state.append_reply(reply);

        if let Some(questions) = opened {
            state.stage = SessionStage::ClarificationOpen;
            tracing::info!(
                session_id = %self.id,
                questions = questions.len(),
                "Backend requested clarification"
            );
            return Ok(TurnOutcome::ClarificationRequested {
                message_id,
                questions,
            });
        }

        state.stage = SessionStage::AwaitingUserInput;
        let affordance = match state.message(message_id) {
            Some(message) => self
                .settings
                .resolver
                .resolve(message, Local::now().date_naive()),
            None => Affordance::NoAffordance,
        };
        Ok(TurnOutcome::Replied {
            message_id,
            affordance,
        })
    }

    fn fail_turn(&self, endpoint: Endpoint) -> Result<TurnOutcome, ChatError> {
        let mut state = self.lock()?;
        if state.stage == SessionStage::Ended {
            return Ok(TurnOutcome::Discarded);
        }
        let (intent, text) = endpoint.fallback_reply();
        let message_id = state.append_reply(AssistantReply::synthesized(text, intent));
        state.stage = SessionStage::AwaitingUserInput;
        Ok(TurnOutcome::Failed { message_id })
    }

    // ---- Clarification ----

    /// Submit the user's elaboration for the open clarification exchange.
    ///
    /// Validation failures leave the exchange open with an inline error and
    /// make no request. A transport failure keeps it open for retry.
    pub async fn submit_clarification(
        &self,
        elaboration: &str,
    ) -> Result<ClarificationOutcome, ChatError> {
        let pending = {
            let mut state = self.lock()?;
            if state.stage == SessionStage::Ended {
                return Err(ChatError::SessionEnded);
            }
            state.clarification.begin_submit(elaboration)?
        };

        let result = self.backend.clarify(&pending.request).await;

        let mut state = self.lock()?;
        if state.stage == SessionStage::Ended {
            return Ok(ClarificationOutcome::Discarded);
        }
        match result {
            Ok(reply) => {
                if !state.clarification.complete(pending.generation) {
                    tracing::debug!(session_id = %self.id, "Stale clarification answer dropped");
                    return Ok(ClarificationOutcome::Discarded);
                }
                let message_id = state.append_reply(reply);
                state.stage = SessionStage::AwaitingUserInput;
                let affordance = match state.message(message_id) {
                    Some(message) => self
                        .settings
                        .resolver
                        .resolve(message, Local::now().date_naive()),
                    None => Affordance::NoAffordance,
                };
                Ok(ClarificationOutcome::Answered {
                    message_id,
                    affordance,
                })
            }
            Err(e) => {
                if !state.clarification.is_current(pending.generation) {
                    return Ok(ClarificationOutcome::Discarded);
                }
                tracing::warn!(session_id = %self.id, error = %e, "Clarification submit failed");
                Err(state.clarification.fail(pending.generation))
            }
        }
    }

    /// Abandon the open clarification exchange. Nothing is appended.
    pub fn cancel_clarification(&self) -> Result<(), ChatError> {
        let mut state = self.lock()?;
        state.clarification.cancel()?;
        if state.stage == SessionStage::ClarificationOpen {
            state.stage = SessionStage::AwaitingUserInput;
        }
        Ok(())
    }

    pub fn clarification_state(&self) -> Result<ClarificationState, ChatError> {
        Ok(self.lock()?.clarification.state())
    }

    pub fn clarification(&self) -> Result<Option<ClarificationExchange>, ChatError> {
        Ok(self.lock()?.clarification.exchange().cloned())
    }

    pub fn clarification_error(&self) -> Result<Option<String>, ChatError> {
        Ok(self
            .lock()?
            .clarification
            .inline_error()
            .map(str::to_string))
    }

    // ---- Booking handoff ----

    /// Put `doctor` in the handoff slot and append the confirmation message.
    pub fn book_with(
        &self,
        doctor: &DoctorRecommendation,
        slot: &dyn HandoffSlot,
    ) -> Result<MessageId, ChatError> {
        let mut state = self.lock()?;
        match state.stage {
            SessionStage::Ended => return Err(ChatError::SessionEnded),
            SessionStage::AwaitingBackendReply => return Err(ChatError::TurnInFlight),
            _ => {}
        }
        slot.put(doctor)?;
        let message_id = state.append(MessageBody::Assistant(AssistantReply::synthesized(
            booking_handoff_text(&doctor.name),
            intents::APPOINTMENT_BOOKING,
        )));
        tracing::info!(session_id = %self.id, doctor = %doctor.name, "Doctor handed off to booking");
        Ok(message_id)
    }

    // ---- Lifecycle ----

    /// Reset the log to the greeting and zero the stats.
    pub fn clear(&self) -> Result<(), ChatError> {
        let mut state = self.lock()?;
        match state.stage {
            SessionStage::Ended => return Err(ChatError::SessionEnded),
            SessionStage::AwaitingBackendReply => return Err(ChatError::TurnInFlight),
            _ => {}
        }
        state.clarification.reset();
        state.messages.clear();
        state.greet();
        state.stats = SessionStats::new(Local::now());
        state.stage = SessionStage::Greeting;
        tracing::info!(session_id = %self.id, "Chat cleared");
        Ok(())
    }

    /// Tear the session down. Replies still in flight will be dropped.
    pub fn end(&self) -> Result<(), ChatError> {
        let mut state = self.lock()?;
        state.clarification.reset();
        state.stage = SessionStage::Ended;
        tracing::info!(
            session_id = %self.id,
            messages = state.messages.len(),
            "Chat session ended"
        );
        Ok(())
    }

    // ---- Views ----

    pub fn stage(&self) -> Result<SessionStage, ChatError> {
        Ok(self.lock()?.stage)
    }

    /// Whether the typing indicator should show.
    pub fn is_typing(&self) -> Result<bool, ChatError> {
        Ok(self.stage()? == SessionStage::AwaitingBackendReply)
    }

    pub fn stats(&self) -> Result<SessionStats, ChatError> {
        Ok(self.lock()?.stats.clone())
    }

    /// Snapshot of the log in insertion order.
    pub fn messages(&self) -> Result<Vec<Message>, ChatError> {
        Ok(self.lock()?.messages.clone())
    }

    /// Control offered with message `id`, if that message exists.
    pub fn affordance_for(
        &self,
        id: MessageId,
        today: NaiveDate,
    ) -> Result<Option<Affordance>, ChatError> {
        let state = self.lock()?;
        Ok(state
            .message(id)
            .map(|m| self.settings.resolver.resolve(m, today)))
    }

    /// Control offered with the newest message. User messages offer none.
    pub fn latest_affordance(&self, today: NaiveDate) -> Result<Affordance, ChatError> {
        let state = self.lock()?;
        Ok(state
            .messages
            .last()
            .map(|m| self.settings.resolver.resolve(m, today))
            .unwrap_or(Affordance::NoAffordance))
    }

    /// Doctors attached to the newest assistant message that has any.
    pub fn latest_doctors(&self) -> Result<Vec<DoctorRecommendation>, ChatError> {
        let state = self.lock()?;
        Ok(state
            .messages
            .iter()
            .rev()
            .map(|m| m.doctors())
            .find(|doctors| !doctors.is_empty())
            .map(<[DoctorRecommendation]>::to_vec)
            .unwrap_or_default())
    }
}
