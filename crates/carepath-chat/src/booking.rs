//! Booking submission boundary.
//!
//! Values picked during the conversation (a time-slot string taken from
//! assistant text, a date, a doctor from the handoff slot) are checked here
//! before any appointment request leaves the process. A malformed value is
//! rejected, never repaired.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use carepath_core::types::DoctorRecommendation;

use crate::error::ChatError;

/// Separator between start and end of a time-slot string.
const SLOT_SEPARATOR: &str = " - ";

/// Split a slot such as `09:00 AM - 10:00 AM` into its start and end times.
///
/// Both halves must be 12-hour clock times and the start must precede the end.
/// The returned strings are the trimmed halves as written.
pub fn parse_time_slot(slot: &str) -> Result<(String, String), ChatError> {
    let mut parts = slot.split(SLOT_SEPARATOR);
    let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ChatError::MalformedPayload(format!(
            "invalid time slot format: {}",
            slot
        )));
    };
    let (start, end) = (start.trim(), end.trim());

    let start_time = parse_clock(start)?;
    let end_time = parse_clock(end)?;
    if start_time >= end_time {
        return Err(ChatError::MalformedPayload(format!(
            "time slot ends before it starts: {}",
            slot
        )));
    }

    Ok((start.to_string(), end.to_string()))
}

fn parse_clock(value: &str) -> Result<NaiveTime, ChatError> {
    NaiveTime::parse_from_str(value, "%I:%M %p")
        .map_err(|_| ChatError::MalformedPayload(format!("invalid clock time: {}", value)))
}

/// Appointment creation request sent to the appointments service.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason_for_visit: String,
    pub additional_notes: String,
    pub status: String,
}

impl BookingRequest {
    /// Build a request from the user's selections, validating every field.
    pub fn from_selection(
        doctor: &DoctorRecommendation,
        patient_id: i64,
        date: NaiveDate,
        time_slot: &str,
        reason: &str,
        notes: &str,
    ) -> Result<Self, ChatError> {
        let doctor_id = doctor.id.ok_or_else(|| {
            ChatError::MalformedPayload(format!("doctor '{}' has no id", doctor.name))
        })?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ChatError::Validation(
                "Please enter a reason for visit".to_string(),
            ));
        }

        let (start_time, end_time) = parse_time_slot(time_slot)?;

        Ok(Self {
            doctor_id,
            patient_id,
            appointment_date: date,
            start_time,
            end_time,
            reason_for_visit: reason.to_string(),
            additional_notes: notes.trim().to_string(),
            status: "CONFIRMED".to_string(),
        })
    }
}

/// Response of the appointments service.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BookingConfirmation {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl BookingConfirmation {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
