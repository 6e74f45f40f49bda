//! Draw history
//!
//! Immutable records of completed sessions, newest first. Records are
//! created once by the engine at session completion and never mutated;
//! the only removal is a bulk clear. Loading tolerates the pre-2.0
//! on-disk format (winners stored as bare name strings) by discarding
//! the stored history instead of upgrading it.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::DrawMode;
use crate::roster::Participant;

/// Per-round breakdown kept on tournament records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub name: String,
    pub winners: Vec<Participant>,
}

/// Summary of one completed draw session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Creation timestamp in epoch milliseconds
    pub id: i64,
    /// Human-readable creation time, local timezone
    pub date: String,
    pub mode: DrawMode,
    pub prize_name: String,
    /// Final winner set, in draw order
    pub winners: Vec<Participant>,
    /// Non-excluded roster count at completion time
    pub total_participants: usize,
    /// Tournament only: every configured round with its winners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<Vec<RoundResult>>,
    /// Full roster at completion time, for later auditing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants_snapshot: Option<Vec<Participant>>,
}

impl HistoryRecord {
    /// Stamp a new record with the current time.
    pub fn new(
        mode: DrawMode,
        prize_name: String,
        winners: Vec<Participant>,
        total_participants: usize,
        rounds: Option<Vec<RoundResult>>,
        participants_snapshot: Option<Vec<Participant>>,
    ) -> Self {
        Self {
            id: Utc::now().timestamp_millis(),
            date: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            mode,
            prize_name,
            winners,
            total_participants,
            rounds,
            participants_snapshot,
        }
    }
}

/// Decode a stored history document.
///
/// A document whose first record stores winners as bare strings is the
/// pre-2.0 format and is discarded wholesale; a document that fails to
/// decode for any other reason likewise degrades to an empty history.
/// Never panics on malformed input.
pub fn parse_history(value: Value) -> Vec<HistoryRecord> {
    if is_legacy_history(&value) {
        warn!("stored history uses the legacy string-winner format, discarding it");
        return Vec::new();
    }
    match serde_json::from_value(value) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "stored history failed to decode, starting empty");
            Vec::new()
        }
    }
}

fn is_legacy_history(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|records| records.first())
        .and_then(|record| record.get("winners"))
        .and_then(Value::as_array)
        .and_then(|winners| winners.first())
        .is_some_and(Value::is_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn participant(id: i64, name: &str) -> Participant {
        Participant {
            id,
            name: name.to_string(),
            weight: 1,
            excluded: false,
        }
    }

    #[test]
    fn test_new_record_is_stamped() {
        let record = HistoryRecord::new(
            DrawMode::Classic,
            "Grand Prize".to_string(),
            vec![participant(1, "Alice")],
            7,
            None,
            None,
        );
        assert!(record.id > 0);
        assert!(!record.date.is_empty());
        assert_eq!(record.winners.len(), 1);
        assert_eq!(record.total_participants, 7);
    }

    #[test]
    fn test_record_document_shape() {
        let record = HistoryRecord::new(
            DrawMode::Tournament,
            String::new(),
            vec![participant(1, "Alice")],
            5,
            Some(vec![RoundResult {
                name: "Final".to_string(),
                winners: vec![participant(1, "Alice")],
            }]),
            None,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["mode"], "tournament");
        assert!(json.get("totalParticipants").is_some());
        assert!(json.get("rounds").is_some());
        // Absent optionals are omitted, not null.
        assert!(json.get("participantsSnapshot").is_none());
    }

    #[test]
    fn test_parse_round_trips_current_format() {
        let records = vec![HistoryRecord::new(
            DrawMode::Classic,
            "Prize".to_string(),
            vec![participant(1, "Alice"), participant(2, "Bob")],
            9,
            None,
            Some(vec![participant(1, "Alice")]),
        )];
        let value = serde_json::to_value(&records).unwrap();
        let parsed = parse_history(value);
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_parse_discards_legacy_string_winners() {
        let legacy = json!([{
            "id": 1,
            "date": "2024-01-01 10:00",
            "mode": "classic",
            "prizeName": "old",
            "winners": ["Alice", "Bob"],
            "totalParticipants": 5
        }]);
        assert!(parse_history(legacy).is_empty());
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        assert!(parse_history(json!("nonsense")).is_empty());
        assert!(parse_history(json!([{"winners": 5}])).is_empty());
        assert!(parse_history(json!(null)).is_empty());
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_history(json!([])).is_empty());
    }
}
