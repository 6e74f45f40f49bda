//! Bulk participant import
//!
//! Parses the two supported import formats into rows the roster can
//! append: a JSON array of `{name, weight?, excluded?}` objects, or
//! delimited text (CSV / TSV / whitespace columns) with one participant
//! per line. Parsing is lenient per row; only a document that is
//! unusable as a whole is an error, and in that case the roster is
//! never touched.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::debug;

use crate::constants::import::HEADER_ALIASES;

/// One parsed row, not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedEntry {
    pub name: String,
    pub weight: u32,
    pub excluded: bool,
}

/// Outcome counts for one bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows appended to the roster
    pub imported: usize,
    /// Rows whose name matched an existing or earlier name (imported anyway)
    pub duplicates: usize,
    /// Rows dropped for an empty name
    pub skipped: usize,
}

/// Parse either supported format, auto-detected from the leading
/// character after trimming (and a BOM, if present).
pub fn parse(input: &str) -> Result<Vec<ImportedEntry>> {
    let trimmed = input.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_json(trimmed)
    } else {
        Ok(parse_delimited(trimmed))
    }
}

fn parse_json(input: &str) -> Result<Vec<ImportedEntry>> {
    let value: Value = serde_json::from_str(input).context("import document is not valid JSON")?;
    let Some(rows) = value.as_array() else {
        bail!("import document must be a JSON array of participants");
    };

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        // Rows without a usable name come through with an empty name and
        // are dropped (and counted) when the roster applies the batch.
        let name = row.get("name").and_then(Value::as_str).unwrap_or_default();
        let weight = row
            .get("weight")
            .and_then(Value::as_u64)
            .map(|w| w as u32)
            .filter(|w| *w > 0)
            .unwrap_or(1);
        let excluded = row.get("excluded").and_then(Value::as_bool).unwrap_or(false);
        entries.push(ImportedEntry {
            name: name.to_string(),
            weight,
            excluded,
        });
    }
    Ok(entries)
}

fn parse_delimited(input: &str) -> Vec<ImportedEntry> {
    let mut entries = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line
            .split([',', '\t'])
            .flat_map(str::split_whitespace)
            .map(str::trim)
            .filter(|f| !f.is_empty());
        let Some(name) = fields.next() else {
            continue;
        };
        if HEADER_ALIASES.iter().any(|alias| name.eq_ignore_ascii_case(alias)) {
            debug!(line = %line, "skipping header row");
            continue;
        }
        // Optional second column: positive integer weight, default 1.
        let weight = fields
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .filter(|w| *w > 0)
            .unwrap_or(1);
        entries.push(ImportedEntry {
            name: name.to_string(),
            weight,
            excluded: false,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let entries = parse(r#"[{"name": "Alice", "weight": 2}, {"name": "Bob"}]"#).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Alice");
        assert_eq!(entries[0].weight, 2);
        assert_eq!(entries[1].weight, 1);
        assert!(!entries[1].excluded);
    }

    #[test]
    fn test_parse_json_excluded_flag() {
        let entries = parse(r#"[{"name": "Carol", "excluded": true}]"#).unwrap();
        assert!(entries[0].excluded);
    }

    #[test]
    fn test_parse_json_row_without_name_kept_empty() {
        // The roster drops and counts these; the parser keeps the row.
        let entries = parse(r#"[{"weight": 3}]"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].name.is_empty());
    }

    #[test]
    fn test_parse_json_invalid_is_error() {
        assert!(parse("[{oops").is_err());
        assert!(parse(r#"{"name": "not an array"}"#).is_err());
    }

    #[test]
    fn test_parse_json_zero_weight_coerced() {
        let entries = parse(r#"[{"name": "Dave", "weight": 0}]"#).unwrap();
        assert_eq!(entries[0].weight, 1);
    }

    #[test]
    fn test_parse_delimited_mixed_separators() {
        let input = "Alice,2\nBob\t3\nCarol 4\nDave";
        let entries = parse(input).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].weight, 2);
        assert_eq!(entries[1].weight, 3);
        assert_eq!(entries[2].weight, 4);
        assert_eq!(entries[3].weight, 1);
    }

    #[test]
    fn test_parse_delimited_skips_headers_and_blanks() {
        let input = "name,weight\n\nAlice,1\n姓名\nBob";
        let entries = parse(input).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_parse_delimited_bad_weight_defaults() {
        let entries = parse("Alice,heavy\nBob,0\nCarol,-2").unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.weight == 1));
    }

    #[test]
    fn test_parse_strips_bom() {
        let entries = parse("\u{feff}Alice").unwrap();
        assert_eq!(entries[0].name, "Alice");
    }
}
