//! Blacklist backup and restore.
//!
//! The backup document is plain JSON meant to survive app reinstalls and
//! be shared between devices. Field order and the four-space indent are
//! kept stable so repeated exports of the same list are byte-identical.

use chrono::{DateTime, Local};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreenError};
use crate::lists::{ListBackend, ListStore};

const APP_NAME: &str = "Stop Démarchage";
const BACKUP_VERSION: &str = "3.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub app: String,
    pub version: String,
    pub date_backup: String,
    pub total_blocked: usize,
    pub blocked_numbers: Vec<BlockedNumber>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedNumber {
    pub number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Union of the current blacklist and the backup.
    Merge,
    /// The backup becomes the blacklist; current entries are dropped.
    Replace,
}

/// Serializes the current blacklist. Entries come out sorted ascending
/// so the output is deterministic for a given list.
pub fn create_backup(lists: &ListStore, at: DateTime<Local>) -> Result<String> {
    let mut numbers: Vec<String> = lists.blacklist().map(str::to_string).collect();
    numbers.sort();

    let document = BackupDocument {
        app: APP_NAME.to_string(),
        version: BACKUP_VERSION.to_string(),
        date_backup: at.format("%Y-%m-%d %H:%M:%S").to_string(),
        total_blocked: numbers.len(),
        blocked_numbers: numbers.into_iter().map(|number| BlockedNumber { number }).collect(),
    };

    to_pretty_json(&document)
}

/// Suggested file name for a backup taken at `at`.
pub fn backup_file_name(at: DateTime<Local>) -> String {
    format!("StopDemarchage_backup_{}.json", at.format("%Y-%m-%d_%H-%M"))
}

/// Parses and validates a backup document. A file from another
/// application or damaged in transit is rejected as malformed, never a
/// crash.
pub fn parse_backup(json: &str) -> Result<BackupDocument> {
    let document: BackupDocument = serde_json::from_str(json)
        .map_err(|e| ScreenError::MalformedInput(format!("corrupted backup file: {e}")))?;
    if document.app != APP_NAME {
        return Err(ScreenError::MalformedInput(format!(
            "backup belongs to another application: '{}'",
            document.app
        )));
    }
    Ok(document)
}

/// Restores a backup into the blacklist. Returns how many entries were
/// imported (new entries in MERGE mode, all entries in REPLACE mode).
pub fn restore_backup(
    json: &str,
    mode: RestoreMode,
    lists: &mut ListStore,
    backend: &dyn ListBackend,
) -> Result<usize> {
    let document = parse_backup(json)?;
    let entries: Vec<String> = document.blocked_numbers.into_iter().map(|b| b.number).collect();
    let total = entries.len();

    let imported = match mode {
        RestoreMode::Merge => lists.merge_blacklist(entries, backend)?,
        RestoreMode::Replace => {
            lists.replace_blacklist(entries, backend)?;
            total
        }
    };
    info!("restored {imported} blocked numbers ({mode:?})");
    Ok(imported)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| ScreenError::Persistence(format!("backup serialization failed: {e}")))?;
    String::from_utf8(out).map_err(|e| ScreenError::Persistence(format!("backup encoding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::Country;
    use crate::lists::testing::MemoryBackend;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 26, 14, 30, 0).unwrap()
    }

    fn store_with(numbers: &[&str]) -> (ListStore, MemoryBackend) {
        let backend = MemoryBackend::default();
        let mut lists = ListStore::new(Country::Fr);
        for n in numbers {
            lists.add_blocked(n, &backend).unwrap();
        }
        (lists, backend)
    }

    #[test]
    fn backup_has_stable_shape_and_order() {
        let (lists, _) = store_with(&["0899123456", "0612345678"]);
        let json = create_backup(&lists, fixed_time()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["app"], "Stop Démarchage");
        assert_eq!(value["version"], "3.0.0");
        assert_eq!(value["date_backup"], "2026-08-26 14:30:00");
        assert_eq!(value["total_blocked"], 2);
        let numbers: Vec<&str> = value["blocked_numbers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["number"].as_str().unwrap())
            .collect();
        let mut sorted = numbers.clone();
        sorted.sort();
        assert_eq!(numbers, sorted);
        // Field order pinned for byte-stable exports.
        assert!(json.find("\"app\"").unwrap() < json.find("\"version\"").unwrap());
        assert!(json.find("\"version\"").unwrap() < json.find("\"date_backup\"").unwrap());
        assert!(json.contains("    \"app\""));
    }

    #[test]
    fn round_trip_preserves_the_set() {
        let (lists, _) = store_with(&["0899123456", "0612345678", "0948000000"]);
        let json = create_backup(&lists, fixed_time()).unwrap();

        let backend = MemoryBackend::default();
        let mut restored = ListStore::new(Country::Fr);
        let imported = restore_backup(&json, RestoreMode::Replace, &mut restored, &backend).unwrap();
        assert_eq!(imported, 3);
        let a: Vec<&str> = lists.blacklist().collect();
        let b: Vec<&str> = restored.blacklist().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let (exported, _) = store_with(&["0899123456"]);
        let json = create_backup(&exported, fixed_time()).unwrap();

        let backend = MemoryBackend::default();
        let mut lists = ListStore::new(Country::Fr);
        lists.add_blocked("0612345678", &backend).unwrap();
        let imported = restore_backup(&json, RestoreMode::Merge, &mut lists, &backend).unwrap();
        assert_eq!(imported, 1);
        assert_eq!(lists.blacklist().count(), 2);
    }

    #[test]
    fn replace_drops_existing_entries() {
        let (exported, _) = store_with(&["0899123456"]);
        let json = create_backup(&exported, fixed_time()).unwrap();

        let backend = MemoryBackend::default();
        let mut lists = ListStore::new(Country::Fr);
        lists.add_blocked("0612345678", &backend).unwrap();
        restore_backup(&json, RestoreMode::Replace, &mut lists, &backend).unwrap();
        assert_eq!(lists.blacklist().count(), 1);
        assert!(lists.is_blacklisted("0899123456"));
        assert!(!lists.is_blacklisted("0612345678"));
    }

    #[test]
    fn foreign_app_backup_rejected() {
        let json = r#"{"app":"Autre App","version":"1.0","date_backup":"2026-01-01 00:00:00","total_blocked":0,"blocked_numbers":[]}"#;
        let err = parse_backup(json).unwrap_err();
        assert!(matches!(err, ScreenError::MalformedInput(_)));
    }

    #[test]
    fn corrupted_json_is_malformed_input_not_a_panic() {
        for bad in ["", "{", "[1,2,3]", "{\"app\":42}"] {
            let err = parse_backup(bad).unwrap_err();
            assert!(matches!(err, ScreenError::MalformedInput(_)), "input {bad:?}");
        }
    }

    #[test]
    fn file_name_embeds_the_timestamp() {
        assert_eq!(
            backup_file_name(fixed_time()),
            "StopDemarchage_backup_2026-08-26_14-30.json"
        );
    }
}
