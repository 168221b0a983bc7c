//! Transport contract with the AI and booking services.
//!
//! Wire payloads are loosely shaped: any field may be missing or null. They
//! are converted into [`AssistantReply`] exactly once, here, with the
//! documented defaults applied, so nothing downstream re-checks presence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use carepath_core::config::BackendConfig;
use carepath_core::error::{CarepathError, Result};
use carepath_core::types::{
    AssistantReply, ClarificationFollowUp, ConfidenceLevel, DoctorRecommendation,
};

use crate::booking::{BookingConfirmation, BookingRequest};

// =============================================================================
// Requests
// =============================================================================

/// Body of a general chat or booking conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
}

/// Body of a clarification submit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationRequest {
    pub user_id: String,
    pub original_message: String,
    pub clarification_response: String,
}

// =============================================================================
// Wire payloads
// =============================================================================

/// Reply to a general chat or booking conversation turn, as sent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReplyPayload {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub recommended_doctors: Option<Vec<DoctorRecommendation>>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub requires_clarification: Option<bool>,
    #[serde(default)]
    pub clarification_questions: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default)]
    pub fallback_level: Option<String>,
}

impl ChatReplyPayload {
    pub fn into_reply(self) -> AssistantReply {
        if self.success == Some(false) {
            tracing::debug!(intent = ?self.intent, "Backend flagged reply as unsuccessful");
        }
        AssistantReply {
            text: self.reply.unwrap_or_default(),
            intent: self.intent,
            doctors: self.recommended_doctors.unwrap_or_default(),
            requires_clarification: self.requires_clarification.unwrap_or(false),
            clarification_questions: self.clarification_questions.unwrap_or_default(),
            confidence_level: ConfidenceLevel::parse_or_default(self.confidence_level.as_deref()),
            fallback_level: self.fallback_level.unwrap_or_else(|| "unknown".to_string()),
            follow_up: None,
        }
    }
}

/// Reply to a clarification submit, as sent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationReplyPayload {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub recommended_doctors: Option<Vec<DoctorRecommendation>>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub requires_further_clarification: Option<bool>,
    #[serde(default)]
    pub additional_questions: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_level: Option<String>,
    #[serde(default)]
    pub fallback_level: Option<String>,
    #[serde(default)]
    pub processed_message: Option<String>,
}

impl ClarificationReplyPayload {
    /// Convert into a reply that never requests another clarification; any
    /// further questions travel as display content in `follow_up`.
    pub fn into_reply(self) -> AssistantReply {
        AssistantReply {
            text: self.reply.unwrap_or_default(),
            intent: self.intent,
            doctors: self.recommended_doctors.unwrap_or_default(),
            requires_clarification: false,
            clarification_questions: Vec::new(),
            confidence_level: ConfidenceLevel::parse_or_default(self.confidence_level.as_deref()),
            fallback_level: self
                .fallback_level
                .unwrap_or_else(|| "clarification".to_string()),
            follow_up: Some(ClarificationFollowUp {
                requires_further_clarification: self
                    .requires_further_clarification
                    .unwrap_or(false),
                additional_questions: self.additional_questions.unwrap_or_default(),
                processed_message: self.processed_message,
            }),
        }
    }
}

// =============================================================================
// Contract
// =============================================================================

/// Remote capabilities the conversation controller depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Health probe. `Ok` means the AI service is reachable.
    async fn health(&self) -> Result<()>;
    async fn general_chat(&self, request: &ChatRequest) -> Result<AssistantReply>;
    async fn booking_turn(&self, request: &ChatRequest) -> Result<AssistantReply>;
    async fn clarify(&self, request: &ClarificationRequest) -> Result<AssistantReply>;
    async fn book_appointment(&self, request: &BookingRequest) -> Result<BookingConfirmation>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// [`ChatBackend`] over HTTP/JSON.
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CarepathError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CarepathError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CarepathError::Transport(format!("HTTP {} from {}", status, url)));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CarepathError::MalformedPayload(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.config.chat_base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CarepathError::Transport(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CarepathError::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )))
        }
    }

    async fn general_chat(&self, request: &ChatRequest) -> Result<AssistantReply> {
        let url = format!("{}/chat", self.config.chat_base_url);
        let payload: ChatReplyPayload = self.post_json(&url, request).await?;
        Ok(payload.into_reply())
    }

    async fn booking_turn(&self, request: &ChatRequest) -> Result<AssistantReply> {
        let url = format!("{}/conversation", self.config.booking_base_url);
        let payload: ChatReplyPayload = self.post_json(&url, request).await?;
        Ok(payload.into_reply())
    }

    async fn clarify(&self, request: &ClarificationRequest) -> Result<AssistantReply> {
        let url = format!("{}/clarification", self.config.booking_base_url);
        let payload: ClarificationReplyPayload = self.post_json(&url, request).await?;
        Ok(payload.into_reply())
    }

    async fn book_appointment(&self, request: &BookingRequest) -> Result<BookingConfirmation> {
        let url = format!("{}/book", self.config.appointments_base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| CarepathError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CarepathError::Transport(e.to_string()))?;

        if !status.is_success() {
            // Rejections usually carry a JSON reason; anything else is just the status.
            let reason = serde_json::from_str::<BookingConfirmation>(&body)
                .ok()
                .and_then(|c| c.message)
                .unwrap_or_else(|| format!("HTTP {} from {}", status, url));
            return Err(CarepathError::Transport(reason));
        }

        let confirmation: BookingConfirmation = serde_json::from_str(&body)
            .map_err(|e| CarepathError::MalformedPayload(format!("{}: {}", url, e)))?;
        if confirmation.is_success() {
            Ok(confirmation)
        } else {
            Err(CarepathError::Transport(
                confirmation
                    .message
                    .unwrap_or_else(|| "Booking failed".to_string()),
            ))
        }
    }
}

// =============================================================================
// Scripted backend
// =============================================================================

/// A request observed by [`MockBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Health,
    GeneralChat(String),
    BookingTurn(String),
    Clarify {
        original_message: String,
        clarification_response: String,
    },
    Book(BookingRequest),
}

/// In-process backend that replays scripted JSON payloads.
///
/// Payloads go through the same ingestion as [`HttpBackend`]. Turn replies
/// are shared between the general chat and booking endpoints in push order.
/// An exhausted script behaves like an unreachable service.
pub struct MockBackend {
    healthy: AtomicBool,
    latency: Duration,
    replies: Mutex<VecDeque<std::result::Result<serde_json::Value, String>>>,
    clarifications: Mutex<VecDeque<std::result::Result<serde_json::Value, String>>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            latency: Duration::ZERO,
            replies: Mutex::new(VecDeque::new()),
            clarifications: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every turn and clarification call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn push_reply(&self, payload: serde_json::Value) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(payload));
        }
    }

    pub fn push_failure(&self, reason: &str) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(reason.to_string()));
        }
    }

    pub fn push_clarification(&self, payload: serde_json::Value) {
        if let Ok(mut q) = self.clarifications.lock() {
            q.push_back(Ok(payload));
        }
    }

    pub fn push_clarification_failure(&self, reason: &str) {
        if let Ok(mut q) = self.clarifications.lock() {
            q.push_back(Err(reason.to_string()));
        }
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of requests seen so far, health probes included.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    async fn next<P: DeserializeOwned>(
        &self,
        queue: &Mutex<VecDeque<std::result::Result<serde_json::Value, String>>>,
    ) -> Result<P> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = queue
            .lock()
            .map_err(|e| CarepathError::Transport(format!("script lock poisoned: {}", e)))?
            .pop_front();
        match scripted {
            Some(Ok(value)) => Ok(serde_json::from_value(value)?),
            Some(Err(reason)) => Err(CarepathError::Transport(reason)),
            None => Err(CarepathError::Transport("no scripted reply".to_string())),
        }
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn health(&self) -> Result<()> {
        self.record(BackendCall::Health);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CarepathError::Transport("connection refused".to_string()))
        }
    }

    async fn general_chat(&self, request: &ChatRequest) -> Result<AssistantReply> {
        self.record(BackendCall::GeneralChat(request.message.clone()));
        let payload: ChatReplyPayload = self.next(&self.replies).await?;
        Ok(payload.into_reply())
    }

    async fn booking_turn(&self, request: &ChatRequest) -> Result<AssistantReply> {
        self.record(BackendCall::BookingTurn(request.message.clone()));
        let payload: ChatReplyPayload = self.next(&self.replies).await?;
        Ok(payload.into_reply())
    }

    async fn clarify(&self, request: &ClarificationRequest) -> Result<AssistantReply> {
        self.record(BackendCall::Clarify {
            original_message: request.original_message.clone(),
            clarification_response: request.clarification_response.clone(),
        });
        let payload: ClarificationReplyPayload = self.next(&self.clarifications).await?;
        Ok(payload.into_reply())
    }

    async fn book_appointment(&self, request: &BookingRequest) -> Result<BookingConfirmation> {
        self.record(BackendCall::Book(request.clone()));
        Ok(BookingConfirmation {
            status: "success".to_string(),
            message: Some("Appointment booked successfully".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ---- Ingestion defaults ----

    #[test]
    fn test_chat_payload_defaults() {
        let payload: ChatReplyPayload = serde_json::from_value(json!({})).unwrap();
        let reply = payload.into_reply();
        assert_eq!(reply.text, "");
        assert!(reply.intent.is_none());
        assert!(reply.doctors.is_empty());
        assert!(!reply.requires_clarification);
        assert!(reply.clarification_questions.is_empty());
        assert_eq!(reply.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(reply.fallback_level, "unknown");
        assert!(reply.follow_up.is_none());
    }

    #[test]
    fn test_chat_payload_nulls_use_defaults() {
        let payload: ChatReplyPayload = serde_json::from_value(json!({
            "reply": "ok",
            "recommendedDoctors": null,
            "clarificationQuestions": null,
            "confidenceLevel": null
        }))
        .unwrap();
        let reply = payload.into_reply();
        assert!(reply.doctors.is_empty());
        assert!(reply.clarification_questions.is_empty());
        assert_eq!(reply.confidence_level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_chat_payload_full() {
        let payload: ChatReplyPayload = serde_json::from_value(json!({
            "reply": "Please describe more",
            "intent": "symptom_unclear",
            "recommendedDoctors": [{"name": "Dr. Ada", "speciality": "Cardiology"}],
            "success": true,
            "requiresClarification": true,
            "clarificationQuestions": ["Where is the pain?"],
            "confidenceLevel": "low",
            "fallbackLevel": "dynamic",
            "entities": {"ignored": true}
        }))
        .unwrap();
        let reply = payload.into_reply();
        assert_eq!(reply.intent.as_deref(), Some("symptom_unclear"));
        assert_eq!(reply.doctors[0].specialty, "Cardiology");
        assert!(reply.needs_clarification());
        assert_eq!(reply.confidence_level, ConfidenceLevel::Low);
        assert_eq!(reply.fallback_level, "dynamic");
    }

    #[test]
    fn test_clarification_payload_defaults() {
        let payload: ClarificationReplyPayload = serde_json::from_value(json!({
            "reply": "Thanks, that helps."
        }))
        .unwrap();
        let reply = payload.into_reply();
        assert_eq!(reply.fallback_level, "clarification");
        assert_eq!(reply.confidence_level, ConfidenceLevel::Medium);
        let follow_up = reply.follow_up.unwrap();
        assert!(!follow_up.requires_further_clarification);
        assert!(follow_up.additional_questions.is_empty());
        assert!(follow_up.processed_message.is_none());
    }

    #[test]
    fn test_clarification_payload_never_requests_clarification() {
        let payload: ClarificationReplyPayload = serde_json::from_value(json!({
            "reply": "Still unclear",
            "requiresFurtherClarification": true,
            "additionalQuestions": ["Since when?"],
            "processedMessage": "headache. it throbs on the left"
        }))
        .unwrap();
        let reply = payload.into_reply();
        assert!(!reply.requires_clarification);
        assert!(!reply.needs_clarification());
        let follow_up = reply.follow_up.unwrap();
        assert!(follow_up.requires_further_clarification);
        assert_eq!(follow_up.additional_questions, vec!["Since when?"]);
        assert_eq!(
            follow_up.processed_message.as_deref(),
            Some("headache. it throbs on the left")
        );
    }

    #[test]
    fn test_request_wire_format() {
        let chat = serde_json::to_value(ChatRequest {
            message: "I have a headache".into(),
            user_id: "u1".into(),
        })
        .unwrap();
        assert_eq!(chat, json!({"message": "I have a headache", "userId": "u1"}));

        let clar = serde_json::to_value(ClarificationRequest {
            user_id: "u1".into(),
            original_message: "pain".into(),
            clarification_response: "left knee".into(),
        })
        .unwrap();
        assert_eq!(
            clar,
            json!({"userId": "u1", "originalMessage": "pain", "clarificationResponse": "left knee"})
        );
    }

    // ---- MockBackend ----

    #[tokio::test]
    async fn test_mock_replays_in_order_and_records_calls() {
        let mock = MockBackend::new();
        mock.push_reply(json!({"reply": "one", "intent": "general_chat"}));
        mock.push_failure("boom");

        let req = ChatRequest {
            message: "hi".into(),
            user_id: "u".into(),
        };
        assert_eq!(mock.general_chat(&req).await.unwrap().text, "one");
        assert!(matches!(
            mock.booking_turn(&req).await,
            Err(CarepathError::Transport(_))
        ));
        assert!(mock.general_chat(&req).await.is_err());

        assert_eq!(
            mock.calls(),
            vec![
                BackendCall::GeneralChat("hi".into()),
                BackendCall::BookingTurn("hi".into()),
                BackendCall::GeneralChat("hi".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_health_toggle() {
        let mock = MockBackend::new();
        assert!(mock.health().await.is_ok());
        mock.set_healthy(false);
        assert!(mock.health().await.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_http_backend_unreachable_is_transport_error() {
        let config = BackendConfig {
            timeout_secs: 1,
            ..BackendConfig::with_host("http://127.0.0.1:9")
        };
        let backend = HttpBackend::new(config).unwrap();
        assert!(matches!(
            backend.health().await,
            Err(CarepathError::Transport(_))
        ));
    }
}
