//! Maps an assistant message to the interactive control offered with it.

use chrono::{Duration, NaiveDate};

use carepath_core::types::{intents, DoctorRecommendation, Message};

use crate::error::ChatError;
use crate::extractor::{extract_locations, extract_time_slots};

/// Date picker bounds and quick-pick offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePicker {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub quick_offsets: Vec<i64>,
}

impl DatePicker {
    /// Date `offset` days after `min_date`.
    pub fn quick_date(&self, offset: i64) -> NaiveDate {
        self.min_date + Duration::days(offset)
    }

    /// Parse a `YYYY-MM-DD` date and check it lies within the picker bounds.
    pub fn validate(&self, input: &str) -> Result<NaiveDate, ChatError> {
        let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map_err(|_| ChatError::Validation(format!("'{}' is not a YYYY-MM-DD date", input)))?;
        if date < self.min_date || date > self.max_date {
            return Err(ChatError::Validation(format!(
                "date must be between {} and {}",
                self.min_date, self.max_date
            )));
        }
        Ok(date)
    }

    /// Validate `input` and return the text to re-submit as a user utterance.
    pub fn choose(&self, input: &str) -> Result<String, ChatError> {
        self.validate(input).map(format_date)
    }
}

/// Interactive control attached to an assistant message. At most one.
#[derive(Clone, Debug, PartialEq)]
pub enum Affordance {
    NoAffordance,
    LocationPicker(Vec<String>),
    DatePicker(DatePicker),
    TimeSlotPicker(Vec<String>),
    DoctorList(Vec<DoctorRecommendation>),
}

impl Affordance {
    /// Text re-submitted as a user utterance when option `index` is picked.
    ///
    /// For a date picker `index` selects one of the quick offsets. Doctor
    /// lists hand off to booking instead, so they yield nothing here.
    pub fn selection(&self, index: usize) -> Option<String> {
        match self {
            Affordance::LocationPicker(options) | Affordance::TimeSlotPicker(options) => {
                options.get(index).cloned()
            }
            Affordance::DatePicker(picker) => picker
                .quick_offsets
                .get(index)
                .map(|offset| format_date(picker.quick_date(*offset))),
            Affordance::DoctorList(_) | Affordance::NoAffordance => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Affordance::NoAffordance)
    }
}

/// Resolves affordances using the configured booking window.
#[derive(Clone, Debug)]
pub struct IntentUiResolver {
    booking_window_days: i64,
    quick_offsets: Vec<i64>,
}

impl Default for IntentUiResolver {
    fn default() -> Self {
        Self::new(90, vec![1, 2, 7])
    }
}

impl IntentUiResolver {
    pub fn new(booking_window_days: i64, quick_offsets: Vec<i64>) -> Self {
        Self {
            booking_window_days,
            quick_offsets,
        }
    }

    /// Date picker spanning `today` to the end of the booking window.
    pub fn date_picker(&self, today: NaiveDate) -> DatePicker {
        DatePicker {
            min_date: today,
            max_date: today + Duration::days(self.booking_window_days),
            quick_offsets: self.quick_offsets.clone(),
        }
    }

    /// Decide which control to present for `message`.
    ///
    /// Rules are checked in priority order: location, date, time slot, then
    /// doctor list. An empty extraction yields `NoAffordance`.
    pub fn resolve(&self, message: &Message, today: NaiveDate) -> Affordance {
        let Some(reply) = message.as_assistant() else {
            return Affordance::NoAffordance;
        };

        match reply.intent.as_deref() {
            Some(intents::BOOKING_LOCATION_SELECTION) => {
                let locations = extract_locations(&reply.text);
                if locations.is_empty() {
                    Affordance::NoAffordance
                } else {
                    Affordance::LocationPicker(locations)
                }
            }
            Some(intents::BOOKING_DATE_SELECTION) => {
                Affordance::DatePicker(self.date_picker(today))
            }
            Some(intents::BOOKING_TIME_SELECTION) => {
                let slots = extract_time_slots(&reply.text);
                if slots.is_empty() {
                    Affordance::NoAffordance
                } else {
                    Affordance::TimeSlotPicker(slots)
                }
            }
            _ if !reply.doctors.is_empty() => Affordance::DoctorList(reply.doctors.clone()),
            _ => Affordance::NoAffordance,
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepath_core::types::{AssistantReply, MessageBody, MessageId};
    use chrono::Local;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn assistant(intent: &str, text: &str, doctors: Vec<DoctorRecommendation>) -> Message {
        let mut reply = AssistantReply::synthesized(text, intent);
        reply.doctors = doctors;
        Message {
            id: MessageId::Seq(2),
            timestamp: Local::now(),
            body: MessageBody::Assistant(reply),
        }
    }

    fn resolver() -> IntentUiResolver {
        IntentUiResolver::default()
    }

    #[test]
    fn test_location_picker() {
        let msg = assistant(
            "booking_location_selection",
            "1. New York\n2. Boston\n3. Chicago",
            vec![],
        );
        assert_eq!(
            resolver().resolve(&msg, today()),
            Affordance::LocationPicker(vec![
                "New York".into(),
                "Boston".into(),
                "Chicago".into()
            ])
        );
    }

    #[test]
    fn test_location_intent_without_locations() {
        let msg = assistant("booking_location_selection", "Where would you like to go?", vec![]);
        assert!(resolver().resolve(&msg, today()).is_none());
    }

    #[test]
    fn test_time_slot_picker() {
        let msg = assistant(
            "booking_time_selection",
            "1. 09:00 AM - 10:00 AM\n2. 02:00 PM - 03:00 PM",
            vec![],
        );
        assert_eq!(
            resolver().resolve(&msg, today()),
            Affordance::TimeSlotPicker(vec![
                "09:00 AM - 10:00 AM".into(),
                "02:00 PM - 03:00 PM".into()
            ])
        );
    }

    #[test]
    fn test_time_intent_without_slots() {
        let msg = assistant("booking_time_selection", "No slots left that day.", vec![]);
        assert!(resolver().resolve(&msg, today()).is_none());
    }

    #[test]
    fn test_date_picker_bounds() {
        let msg = assistant("booking_date_selection", "Pick a date", vec![]);
        match resolver().resolve(&msg, today()) {
            Affordance::DatePicker(picker) => {
                assert_eq!(picker.min_date, today());
                assert_eq!(picker.max_date, NaiveDate::from_ymd_opt(2026, 6, 8).unwrap());
                assert_eq!(picker.quick_offsets, vec![1, 2, 7]);
            }
            other => panic!("Expected DatePicker, got {:?}", other),
        }
    }

    #[test]
    fn test_booking_intent_wins_over_doctors() {
        let msg = assistant(
            "booking_date_selection",
            "Pick a date",
            vec![DoctorRecommendation::new("Dr. Ada", "Cardiology")],
        );
        assert!(matches!(
            resolver().resolve(&msg, today()),
            Affordance::DatePicker(_)
        ));
    }

    #[test]
    fn test_doctor_list_for_other_intents() {
        let doctors = vec![
            DoctorRecommendation::new("Dr. Ada", "Cardiology"),
            DoctorRecommendation::new("Dr. Lee", "Cardiology"),
        ];
        let msg = assistant("symptom_check", "These doctors can help.", doctors.clone());
        assert_eq!(
            resolver().resolve(&msg, today()),
            Affordance::DoctorList(doctors)
        );
    }

    #[test]
    fn test_no_affordance_for_plain_reply() {
        let msg = assistant("general_chat", "Drink water and rest.", vec![]);
        assert!(resolver().resolve(&msg, today()).is_none());
    }

    #[test]
    fn test_user_message_has_no_affordance() {
        let msg = Message {
            id: MessageId::Seq(1),
            timestamp: Local::now(),
            body: MessageBody::User {
                text: "1. New York".into(),
            },
        };
        assert!(resolver().resolve(&msg, today()).is_none());
    }

    // ---- Selections ----

    #[test]
    fn test_selection_emits_listed_text() {
        let picker = Affordance::LocationPicker(vec!["Boston".into(), "Chicago".into()]);
        assert_eq!(picker.selection(1).as_deref(), Some("Chicago"));
        assert_eq!(picker.selection(2), None);
    }

    #[test]
    fn test_quick_date_selection() {
        let msg = assistant("booking_date_selection", "Pick a date", vec![]);
        let affordance = resolver().resolve(&msg, today());
        assert_eq!(affordance.selection(0).as_deref(), Some("2026-03-11"));
        assert_eq!(affordance.selection(1).as_deref(), Some("2026-03-12"));
        assert_eq!(affordance.selection(2).as_deref(), Some("2026-03-17"));
        assert_eq!(affordance.selection(3), None);
    }

    #[test]
    fn test_doctor_list_selection_is_none() {
        let list = Affordance::DoctorList(vec![DoctorRecommendation::new("Dr. Ada", "GP")]);
        assert_eq!(list.selection(0), None);
    }

    #[test]
    fn test_date_picker_choose() {
        let picker = DatePicker {
            min_date: today(),
            max_date: today() + Duration::days(90),
            quick_offsets: vec![1],
        };
        assert_eq!(picker.choose("2026-03-10").unwrap(), "2026-03-10");
        assert_eq!(picker.choose(" 2026-06-08 ").unwrap(), "2026-06-08");
        assert!(matches!(picker.choose("2026-03-09"), Err(ChatError::Validation(_))));
        assert!(matches!(picker.choose("2026-06-09"), Err(ChatError::Validation(_))));
        assert!(matches!(picker.choose("next tuesday"), Err(ChatError::Validation(_))));
        assert_eq!(
            picker.validate("2026-04-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
        );
    }
}
