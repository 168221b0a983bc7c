//! Entity extraction from assistant reply text.
//!
//! The booking backend lists choices as bulleted or numbered items. These
//! functions recover those choices best-effort: items that do not fit the
//! expected shape are skipped, never reported. Both extractors are pure and
//! total.
//!
//! The booking service escapes its line breaks, so a reply can arrive as one
//! line with literal `\n` sequences between the items.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Compiled patterns (compiled once, reused across calls)
// =============================================================================

/// Line-leading bullet glyph or small `N.` marker followed by a run of
/// letters and spaces that fills the rest of the line.
static LOCATION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[•◦▪‣]|\d{1,3}\.)[ \t]*(\p{Alphabetic}[\p{Alphabetic} \t]*?)[ \t\r]*$")
        .expect("Invalid location regex")
});

/// `N.` marker anywhere in the text (not glued to a preceding digit)
/// followed by an `H:MM AM - H:MM PM` range.
static TIME_SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\D)\d{1,3}\.[ \t]*((?:1[0-2]|0?[1-9]):[0-5]\d [AP]M - (?:1[0-2]|0?[1-9]):[0-5]\d [AP]M)\b",
    )
    .expect("Invalid time slot regex")
});

/// Candidates this short are stray punctuation or list debris.
const MIN_LOCATION_CHARS: usize = 3;

/// Turn escaped `\n` sequences into real line breaks.
fn unescape_breaks(text: &str) -> Cow<'_, str> {
    if text.contains("\\n") {
        Cow::Owned(text.replace("\\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Extract location choices from a reply, in first-seen order.
///
/// Duplicates are kept; the backend does not repeat itself.
pub fn extract_locations(text: &str) -> Vec<String> {
    let text = unescape_breaks(text);
    LOCATION_LINE_RE
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|candidate| candidate.chars().count() >= MIN_LOCATION_CHARS)
        .collect()
}

/// Extract time-slot choices such as `09:00 AM - 10:00 AM`, in first-seen order.
///
/// The slot string is returned exactly as written, minus its list marker.
pub fn extract_time_slots(text: &str) -> Vec<String> {
    let text = unescape_breaks(text);
    TIME_SLOT_RE
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Locations ----

    #[test]
    fn test_numbered_locations() {
        let text = "1. New York\n2. Boston\n3. Chicago";
        assert_eq!(extract_locations(text), vec!["New York", "Boston", "Chicago"]);
    }

    #[test]
    fn test_bulleted_locations() {
        let text = "Please choose a location:\n• Downtown\n• Uptown\n• Riverside";
        assert_eq!(extract_locations(text), vec!["Downtown", "Uptown", "Riverside"]);
    }

    #[test]
    fn test_locations_with_surrounding_prose() {
        let text = "Great! Dr. Smith practices at these locations:\n\n1. New York\n2. San Francisco\n\nWhich one works best for you?";
        assert_eq!(extract_locations(text), vec!["New York", "San Francisco"]);
    }

    #[test]
    fn test_locations_trailing_whitespace_and_crlf() {
        let text = "1. Boston  \r\n2. Chicago\t\r\n";
        assert_eq!(extract_locations(text), vec!["Boston", "Chicago"]);
    }

    #[test]
    fn test_short_candidates_discarded() {
        let text = "1. NY\n2. LA\n3. Austin";
        assert_eq!(extract_locations(text), vec!["Austin"]);
    }

    #[test]
    fn test_location_lines_with_digits_or_punctuation_skipped() {
        let text = "1. Clinic 42\n2. Main St.\n3. Denver";
        assert_eq!(extract_locations(text), vec!["Denver"]);
    }

    #[test]
    fn test_duplicates_preserved() {
        let text = "1. Boston\n2. Boston";
        assert_eq!(extract_locations(text), vec!["Boston", "Boston"]);
    }

    #[test]
    fn test_unicode_letters_accepted() {
        let text = "• São Paulo\n• Zürich";
        assert_eq!(extract_locations(text), vec!["São Paulo", "Zürich"]);
    }

    #[test]
    fn test_locations_from_escaped_booking_reply() {
        let text = "Great! We have doctors in these locations:\\n1. New York\\n2. Boston\\n3. Chicago\\nPlease type a city.";
        assert_eq!(extract_locations(text), vec!["New York", "Boston", "Chicago"]);
    }

    #[test]
    fn test_no_locations_in_plain_text() {
        assert!(extract_locations("Which city would you like?").is_empty());
        assert!(extract_locations("").is_empty());
    }

    #[test]
    fn test_time_slot_lines_are_not_locations() {
        let text = "1. 09:00 AM - 10:00 AM\n2. 02:00 PM - 03:00 PM";
        assert!(extract_locations(text).is_empty());
    }

    #[test]
    fn test_recovers_rendered_list_in_order() {
        let cities = ["Portland", "Salt Lake City", "Miami", "El Paso", "Boise"];
        let numbered: String = cities
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}\n", i + 1, c))
            .collect();
        let bulleted: String = cities.iter().map(|c| format!("• {}\n", c)).collect();

        assert_eq!(extract_locations(&numbered), cities);
        assert_eq!(extract_locations(&bulleted), cities);
    }

    // ---- Time slots ----

    #[test]
    fn test_numbered_time_slots() {
        let text = "1. 09:00 AM - 10:00 AM\n2. 02:00 PM - 03:00 PM";
        assert_eq!(
            extract_time_slots(text),
            vec!["09:00 AM - 10:00 AM", "02:00 PM - 03:00 PM"]
        );
    }

    #[test]
    fn test_time_slots_single_digit_hour_and_lowercase() {
        let text = "Available:\n1. 9:30 am - 10:30 am\n2. 12:00 PM - 1:00 PM";
        assert_eq!(
            extract_time_slots(text),
            vec!["9:30 am - 10:30 am", "12:00 PM - 1:00 PM"]
        );
    }

    #[test]
    fn test_time_slot_with_trailing_note() {
        let text = "1. 11:00 AM - 12:00 PM (last slot)";
        assert_eq!(extract_time_slots(text), vec!["11:00 AM - 12:00 PM"]);
    }

    #[test]
    fn test_malformed_time_slots_skipped() {
        let text = "1. 13:00 PM - 14:00 PM\n2. 9:5 AM - 10:00 AM\n3. 09:00 AM-10:00 AM\n4. 10:00 AM - 11:00 AM";
        assert_eq!(extract_time_slots(text), vec!["10:00 AM - 11:00 AM"]);
    }

    #[test]
    fn test_time_slots_require_marker() {
        assert!(extract_time_slots("09:00 AM - 10:00 AM").is_empty());
        assert!(extract_time_slots("• 09:00 AM - 10:00 AM").is_empty());
    }

    #[test]
    fn test_time_slots_from_escaped_booking_reply() {
        // Exactly as the booking service sends it: one line, escaped breaks.
        let text = "Perfect! Date selected: April 2, 2026\\n\\nPlease select your preferred time slot:\\n1. 09:00 AM - 10:00 AM\\n2. 10:00 AM - 11:00 AM\\n3. 02:00 PM - 03:00 PM\\n\\nJust type the number or the time.";
        assert_eq!(
            extract_time_slots(text),
            vec!["09:00 AM - 10:00 AM", "10:00 AM - 11:00 AM", "02:00 PM - 03:00 PM"]
        );
    }

    #[test]
    fn test_inline_time_slots() {
        let text = "Available: 1. 09:00 AM - 10:00 AM 2. 02:00 PM - 03:00 PM";
        assert_eq!(
            extract_time_slots(text),
            vec!["09:00 AM - 10:00 AM", "02:00 PM - 03:00 PM"]
        );
    }

    #[test]
    fn test_time_slot_marker_glued_to_digits_skipped() {
        assert!(extract_time_slots("Fee 1250. 09:00 AM - 10:00 AM").is_empty());
    }

    #[test]
    fn test_no_time_slots_in_location_list() {
        assert!(extract_time_slots("1. New York\n2. Boston").is_empty());
    }

    // ---- Determinism ----

    #[test]
    fn test_extractors_are_idempotent() {
        let samples = [
            "1. New York\n2. Boston\n3. Chicago",
            "1. 09:00 AM - 10:00 AM\n2. 02:00 PM - 03:00 PM",
            "• A\n• Bb\n• Ccc\n12. Dallas\n1.\n",
            "",
        ];
        for text in samples {
            assert_eq!(extract_locations(text), extract_locations(text));
            assert_eq!(extract_time_slots(text), extract_time_slots(text));
        }
    }
}
