//! Segment label → integer code mapping.
//!
//! Two policies:
//! - `PerBuild`: codes are the rank of each label among the distinct labels
//!   present in the rows being built. The same label can get a different
//!   code in another run or another scope.
//! - `Persisted`: an append-only dictionary stored in `category_codes`.
//!   Unseen labels get the next free code; existing codes never change.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{repository, DatabaseError};

/// Label used for rows without a segment value.
pub const UNKNOWN_SEGMENT: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
    PerBuild,
    #[default]
    Persisted,
}

/// Append-only category dictionary.
#[derive(Debug, Clone, Default)]
pub struct CategoryDictionary {
    codes: BTreeMap<String, i64>,
    pending: Vec<(String, i64)>,
}

impl CategoryDictionary {
    pub fn load(conn: &Connection) -> Result<Self, DatabaseError> {
        Ok(Self {
            codes: repository::load_category_codes(conn)?,
            pending: Vec::new(),
        })
    }

    pub fn get(&self, label: &str) -> Option<i64> {
        self.codes.get(label).copied()
    }

    /// Existing code, or a fresh one recorded for the next `save_new`.
    pub fn code_for(&mut self, label: &str) -> i64 {
        if let Some(code) = self.get(label) {
            return code;
        }
        let code = self.codes.values().max().map_or(0, |max| max + 1);
        self.codes.insert(label.to_string(), code);
        self.pending.push((label.to_string(), code));
        code
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes assigned since load that are not stored yet.
    pub fn unsaved(&self) -> &[(String, i64)] {
        &self.pending
    }

    /// Store every code assigned since load. Returns how many were written.
    pub fn save_new(&mut self, conn: &Connection, created_at: &NaiveDateTime) -> Result<usize, DatabaseError> {
        let tx = conn.unchecked_transaction()?;
        for (label, code) in &self.pending {
            repository::insert_category_code(&tx, label, *code, created_at)?;
        }
        tx.commit()?;

        let written = self.pending.len();
        if written > 0 {
            tracing::info!(added = written, total = self.codes.len(), "Category dictionary extended");
        }
        self.pending.clear();
        Ok(written)
    }
}

/// Source of segment codes for one matrix build.
pub enum SegmentEncoder<'a> {
    PerBuild,
    Persisted(&'a mut CategoryDictionary),
}

impl SegmentEncoder<'_> {
    pub fn policy(&self) -> CategoryPolicy {
        match self {
            Self::PerBuild => CategoryPolicy::PerBuild,
            Self::Persisted(_) => CategoryPolicy::Persisted,
        }
    }

    /// Codes for the distinct labels present in one build.
    pub fn codes_for(&mut self, labels: &BTreeSet<&str>) -> BTreeMap<String, i64> {
        match self {
            Self::PerBuild => labels
                .iter()
                .enumerate()
                .map(|(code, label)| (label.to_string(), code as i64))
                .collect(),
            Self::Persisted(dictionary) => labels
                .iter()
                .map(|label| (label.to_string(), dictionary.code_for(label)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn ts() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn per_build_codes_follow_sorted_labels() {
        let labels: BTreeSet<&str> = ["Neurology", "Cardiology", "Unknown"].into_iter().collect();
        let codes = SegmentEncoder::PerBuild.codes_for(&labels);
        assert_eq!(codes["Cardiology"], 0);
        assert_eq!(codes["Neurology"], 1);
        assert_eq!(codes["Unknown"], 2);
    }

    #[test]
    fn per_build_codes_shift_with_population() {
        let with_cardio: BTreeSet<&str> = ["Cardiology", "Neurology"].into_iter().collect();
        let without: BTreeSet<&str> = ["Neurology"].into_iter().collect();
        let a = SegmentEncoder::PerBuild.codes_for(&with_cardio);
        let b = SegmentEncoder::PerBuild.codes_for(&without);
        assert_ne!(a["Neurology"], b["Neurology"]);
    }

    #[test]
    fn persisted_codes_are_stable_across_builds() {
        let conn = open_memory_database().unwrap();

        let mut dict = CategoryDictionary::load(&conn).unwrap();
        let first: BTreeSet<&str> = ["Neurology", "Oncology"].into_iter().collect();
        let codes = SegmentEncoder::Persisted(&mut dict).codes_for(&first);
        assert_eq!(codes["Neurology"], 0);
        assert_eq!(codes["Oncology"], 1);
        assert_eq!(dict.save_new(&conn, &ts()).unwrap(), 2);

        // A new run with an extra label earlier in sort order
        let mut reloaded = CategoryDictionary::load(&conn).unwrap();
        let second: BTreeSet<&str> = ["Cardiology", "Neurology"].into_iter().collect();
        let codes = SegmentEncoder::Persisted(&mut reloaded).codes_for(&second);
        assert_eq!(codes["Neurology"], 0);
        assert_eq!(codes["Cardiology"], 2);
        assert_eq!(reloaded.unsaved(), &[("Cardiology".to_string(), 2)]);
        assert_eq!(reloaded.save_new(&conn, &ts()).unwrap(), 1);
        assert_eq!(CategoryDictionary::load(&conn).unwrap().len(), 3);
    }

    #[test]
    fn save_without_additions_writes_nothing() {
        let conn = open_memory_database().unwrap();
        let mut dict = CategoryDictionary::load(&conn).unwrap();
        assert!(dict.is_empty());
        assert_eq!(dict.save_new(&conn, &ts()).unwrap(), 0);
    }

    #[test]
    fn policy_reported() {
        let mut dict = CategoryDictionary::default();
        assert_eq!(SegmentEncoder::PerBuild.policy(), CategoryPolicy::PerBuild);
        assert_eq!(SegmentEncoder::Persisted(&mut dict).policy(), CategoryPolicy::Persisted);
    }
}
