//! Raw-note collaborator: registers note files as documents and reads their
//! text back for extraction.
//!
//! Notes are JSON files named `<subject_id>_note_<YYYYMMDD>.json` carrying
//! the note body in a `"text"` field.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Deserialize;

use super::batch_extraction::{document_id_for_location, NoteSource, SourceError};
use crate::db::repository;
use crate::models::{Document, DocumentRef};

const NOTE_MARKER: &str = "_note_";

/// Subject and collection date recovered from a note file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFileMeta {
    pub subject_id: String,
    pub collection_date: NaiveDate,
}

/// Parse `<subject>_note_<date>.json`.
///
/// Without the `_note_` marker the last `_`-separated part is taken as the
/// date. Dates may be `YYYYMMDD` or `YYYY-MM-DD`; anything else falls back
/// to `today`.
pub fn parse_note_filename(file_name: &str, today: NaiveDate) -> NoteFileMeta {
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);

    let (subject, date_part) = match stem.rsplit_once(NOTE_MARKER) {
        Some((subject, date)) => (subject, Some(date)),
        None => match stem.rsplit_once('_') {
            Some((subject, date)) => (subject, Some(date)),
            None => (stem, None),
        },
    };

    let collection_date = date_part
        .and_then(|raw| {
            NaiveDate::parse_from_str(raw, "%Y%m%d")
                .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
                .ok()
        })
        .unwrap_or(today);

    let subject_id = if subject.is_empty() { stem } else { subject };

    NoteFileMeta {
        subject_id: subject_id.to_string(),
        collection_date,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub inserted: u32,
    pub skipped: u32,
}

/// Register every `*.json` file directly under `notes_dir` as a document.
/// Already registered locations are skipped, so re-running is harmless.
pub fn register_notes(
    conn: &Connection,
    notes_dir: &Path,
    data_type: &str,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<RegistrationReport, SourceError> {
    let io_err = |source| SourceError::Io {
        location: notes_dir.display().to_string(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(notes_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut report = RegistrationReport::default();
    for path in paths {
        let location = path.display().to_string();
        let document_id = document_id_for_location(&location);

        if repository::document_exists(conn, &document_id)? {
            report.skipped += 1;
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = parse_note_filename(&file_name, today);

        repository::insert_document(
            conn,
            &Document {
                document_id,
                subject_id: meta.subject_id,
                data_type: data_type.to_string(),
                location,
                collection_date: meta.collection_date,
                ingested_at: now,
            },
        )?;
        report.inserted += 1;
    }

    tracing::info!(
        notes_dir = %notes_dir.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Note registration complete"
    );

    Ok(report)
}

#[derive(Deserialize)]
struct NotePayload {
    #[serde(default)]
    text: Option<String>,
}

/// Reads note text from the local filesystem.
pub struct FsNoteSource;

impl FsNoteSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FsNoteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteSource for FsNoteSource {
    /// A payload without a `text` string reads as an empty note.
    fn load_text(&self, document: &DocumentRef) -> Result<String, SourceError> {
        let raw = std::fs::read_to_string(&document.location).map_err(|source| SourceError::Io {
            location: document.location.clone(),
            source,
        })?;

        let payload: NotePayload =
            serde_json::from_str(&raw).map_err(|e| SourceError::Payload {
                location: document.location.clone(),
                reason: e.to_string(),
            })?;

        Ok(payload.text.unwrap_or_default())
    }
}
