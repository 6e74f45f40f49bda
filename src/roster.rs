//! Participant roster
//!
//! Authoritative list of entrants and their exclusion status. The roster
//! is owned by the draw engine and mutated only through it; this module
//! holds the list itself plus the id assignment and counting logic.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::import::{ImportReport, ImportedEntry};

/// One entrant in the draw.
///
/// `weight` is carried and persisted but does not influence selection;
/// sampling is uniform. `excluded` participants never enter an eligible
/// pool until restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub excluded: bool,
}

fn default_weight() -> u32 {
    1
}

/// Participant list with stable ids.
///
/// Ids are epoch milliseconds plus a small random jitter, re-rolled on
/// collision, so entries created in the same millisecond during a bulk
/// import still get distinct ids.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Participant>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Participant] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of entries currently allowed into an eligible pool.
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|p| !p.excluded).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.entries.iter().filter(|p| p.excluded).count()
    }

    pub fn get(&self, id: i64) -> Option<&Participant> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Append a new participant. A name that trims to empty is a no-op;
    /// a zero weight is coerced to 1. Returns the assigned id.
    pub fn add(&mut self, name: &str, weight: u32) -> Option<i64> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let id = self.fresh_id();
        self.entries.push(Participant {
            id,
            name: name.to_string(),
            weight: weight.max(1),
            excluded: false,
        });
        info!(id = id, name = %name, "added participant");
        Some(id)
    }

    /// Remove by id; absent ids are a no-op.
    pub fn remove(&mut self, id: i64) {
        self.entries.retain(|p| p.id != id);
    }

    /// Flip the exclusion flag for the matching entry.
    pub fn toggle_excluded(&mut self, id: i64) {
        if let Some(p) = self.entries.iter_mut().find(|p| p.id == id) {
            p.excluded = !p.excluded;
            debug!(id = id, excluded = p.excluded, "toggled exclusion");
        }
    }

    /// Mark every id in `ids` as excluded (the auto-exclude side effect).
    pub fn exclude_all(&mut self, ids: &[i64]) {
        for p in self.entries.iter_mut() {
            if ids.contains(&p.id) {
                p.excluded = true;
            }
        }
    }

    /// Clear the exclusion flag on every entry.
    pub fn restore_all(&mut self) {
        for p in self.entries.iter_mut() {
            p.excluded = false;
        }
        info!(count = self.entries.len(), "restored all participants");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a batch of parsed entries. Duplicate names (case- and
    /// whitespace-insensitive, against both the existing roster and
    /// earlier rows of the same batch) are imported anyway but counted.
    /// Rows whose name trims to empty are dropped and counted.
    pub fn bulk_import(&mut self, batch: Vec<ImportedEntry>) -> ImportReport {
        let mut report = ImportReport::default();
        let mut seen: Vec<String> = self.entries.iter().map(|p| normalize_name(&p.name)).collect();

        for entry in batch {
            let name = entry.name.trim();
            if name.is_empty() {
                report.skipped += 1;
                continue;
            }
            let key = normalize_name(name);
            if seen.contains(&key) {
                report.duplicates += 1;
            }
            seen.push(key);

            let id = self.fresh_id();
            self.entries.push(Participant {
                id,
                name: name.to_string(),
                weight: entry.weight.max(1),
                excluded: entry.excluded,
            });
            report.imported += 1;
        }

        info!(
            imported = report.imported,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "bulk import applied"
        );
        report
    }

    /// Clone of the full list, used for history records and persistence.
    pub fn snapshot(&self) -> Vec<Participant> {
        self.entries.clone()
    }

    fn fresh_id(&self) -> i64 {
        let mut rng = rand::rng();
        let mut id = Utc::now().timestamp_millis() + rng.random_range(0..1_000);
        while self.entries.iter().any(|p| p.id == id) {
            id += 1 + rng.random_range(0..7);
        }
        id
    }
}

/// Case- and whitespace-insensitive comparison key for duplicate checks.
fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ImportedEntry {
        ImportedEntry {
            name: name.to_string(),
            weight: 1,
            excluded: false,
        }
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let mut roster = Roster::new();
        let a = roster.add("Alice", 1).unwrap();
        let b = roster.add("Bob", 1).unwrap();
        let c = roster.add("Carol", 1).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_add_empty_name_is_noop() {
        let mut roster = Roster::new();
        assert!(roster.add("   ", 1).is_none());
        assert!(roster.add("", 3).is_none());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_add_trims_name_and_clamps_weight() {
        let mut roster = Roster::new();
        let id = roster.add("  Alice  ", 0).unwrap();
        let p = roster.get(id).unwrap();
        assert_eq!(p.name, "Alice");
        assert_eq!(p.weight, 1);
        assert!(!p.excluded);
    }

    #[test]
    fn test_remove_absent_id_is_noop() {
        let mut roster = Roster::new();
        roster.add("Alice", 1);
        roster.remove(-42);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_toggle_and_restore_all() {
        let mut roster = Roster::new();
        let a = roster.add("Alice", 1).unwrap();
        let b = roster.add("Bob", 1).unwrap();

        roster.toggle_excluded(a);
        assert!(roster.get(a).unwrap().excluded);
        assert_eq!(roster.active_count(), 1);
        assert_eq!(roster.excluded_count(), 1);

        roster.toggle_excluded(a);
        assert!(!roster.get(a).unwrap().excluded);

        roster.toggle_excluded(a);
        roster.toggle_excluded(b);
        roster.restore_all();
        assert_eq!(roster.active_count(), 2);
    }

    #[test]
    fn test_exclude_all_only_touches_listed_ids() {
        let mut roster = Roster::new();
        let a = roster.add("Alice", 1).unwrap();
        let b = roster.add("Bob", 1).unwrap();
        roster.exclude_all(&[a]);
        assert!(roster.get(a).unwrap().excluded);
        assert!(!roster.get(b).unwrap().excluded);
    }

    #[test]
    fn test_bulk_import_counts_duplicates_and_skips() {
        let mut roster = Roster::new();
        roster.add("Alice", 1);

        let batch = vec![
            entry("alice"),  // duplicate of roster entry
            entry("Bob"),
            entry("B o b"),  // whitespace-insensitive dup of Bob
            entry("  "),     // dropped
            entry("Carol"),
        ];
        let report = roster.bulk_import(batch);

        assert_eq!(report.imported, 4);
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.skipped, 1);
        // Duplicates are imported, not merged.
        assert_eq!(roster.len(), 5);
    }

    #[test]
    fn test_bulk_import_preserves_weight_and_exclusion() {
        let mut roster = Roster::new();
        let batch = vec![ImportedEntry {
            name: "Dave".to_string(),
            weight: 3,
            excluded: true,
        }];
        roster.bulk_import(batch);
        let p = &roster.entries()[0];
        assert_eq!(p.weight, 3);
        assert!(p.excluded);
    }

    #[test]
    fn test_participant_json_defaults() {
        // Hand-edited documents may omit weight/excluded.
        let p: Participant = serde_json::from_str(r#"{"id": 7, "name": "Eve"}"#).unwrap();
        assert_eq!(p.weight, 1);
        assert!(!p.excluded);
    }
}
