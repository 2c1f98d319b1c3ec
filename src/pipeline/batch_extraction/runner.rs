//! ExtractionRunner: selects unfeatured documents and drives each through
//! load → extract → normalize → validate → persist.
//!
//! Per-document state machine: Pending → Extracting → Normalized | Failed,
//! with Skipped for notes that carry no text. A failure is recorded against
//! its document and the batch moves on. Failed documents keep zero features,
//! so the next run selects them again. Skipped documents and empty results
//! are marked terminal in the store and never selected again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::error::PipelineError;
use super::normalizer::normalize;
use super::traits::{FeatureStore, NoteExtractor, NoteSource};
use super::validation::validate_features;
use crate::db::repository;
use crate::models::{DocumentRef, DocumentState, ExtractionResult};
use crate::pipeline::extractor::ExtractorError;

/// Batch-level knobs.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub data_type: String,
    pub batch_size: usize,
    pub workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            data_type: "clinical_note".to_string(),
            batch_size: 200,
            workers: 4,
        }
    }
}

/// Terminal result for one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Normalized {
        inserted: u32,
        already_present: u32,
        warnings: usize,
        /// The extractor output could not be used; nothing was persisted.
        unparseable: bool,
    },
    Skipped,
    Failed { error: String },
}

impl DocumentOutcome {
    pub fn state(&self) -> DocumentState {
        match self {
            Self::Normalized { .. } => DocumentState::Normalized,
            Self::Skipped => DocumentState::Skipped,
            Self::Failed { .. } => DocumentState::Failed,
        }
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub selected: u32,
    pub normalized: u32,
    pub skipped: u32,
    pub failed: u32,
    pub features_inserted: u32,
    pub features_already_present: u32,
    pub validation_warnings: u32,
    /// Outcome per document, in selection order.
    pub outcomes: Vec<(String, DocumentOutcome)>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self::default()
    }

    fn record(&mut self, document_id: String, outcome: DocumentOutcome) {
        match &outcome {
            DocumentOutcome::Normalized {
                inserted,
                already_present,
                warnings,
                ..
            } => {
                self.normalized += 1;
                self.features_inserted += inserted;
                self.features_already_present += already_present;
                self.validation_warnings += *warnings as u32;
            }
            DocumentOutcome::Skipped => self.skipped += 1,
            DocumentOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push((document_id, outcome));
    }

    pub fn outcome_of(&self, document_id: &str) -> Option<&DocumentOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == document_id)
            .map(|(_, outcome)| outcome)
    }
}

pub struct ExtractionRunner<'a> {
    store: &'a dyn FeatureStore,
    source: &'a dyn NoteSource,
    extractor: &'a dyn NoteExtractor,
    config: RunnerConfig,
}

impl<'a> ExtractionRunner<'a> {
    pub fn new(
        store: &'a dyn FeatureStore,
        source: &'a dyn NoteSource,
        extractor: &'a dyn NoteExtractor,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            source,
            extractor,
            config,
        }
    }

    /// Select up to `batch_size` unfeatured documents and process them.
    ///
    /// Only work selection can fail the call; per-document errors land in
    /// the report.
    pub fn run_batch(&self) -> Result<BatchReport, PipelineError> {
        let start = Instant::now();

        let documents = self
            .store
            .list_unfeatured_documents(&self.config.data_type, self.config.batch_size)?;

        if documents.is_empty() {
            tracing::info!(data_type = %self.config.data_type, "No unfeatured documents");
            return Ok(BatchReport::empty());
        }

        tracing::info!(
            selected = documents.len(),
            workers = self.config.workers,
            "Starting extraction batch"
        );

        let outcomes = self.process_all(&documents);

        let mut report = BatchReport::empty();
        report.selected = documents.len() as u32;
        for (doc, outcome) in documents.into_iter().zip(outcomes) {
            report.record(doc.document_id, outcome);
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            normalized = report.normalized,
            skipped = report.skipped,
            failed = report.failed,
            features_inserted = report.features_inserted,
            duration_ms = report.duration_ms,
            "Extraction batch complete"
        );

        Ok(report)
    }

    /// Bounded worker pool over the selected documents. Each worker finishes
    /// a document's whole sequence before taking the next one. Outcomes are
    /// returned in input order.
    fn process_all(&self, documents: &[DocumentRef]) -> Vec<DocumentOutcome> {
        let workers = self.config.workers.clamp(1, documents.len().max(1));
        if workers == 1 {
            return documents.iter().map(|d| self.process_document(d)).collect();
        }

        let cursor = AtomicUsize::new(0);
        let mut indexed: Vec<(usize, DocumentOutcome)> = Vec::with_capacity(documents.len());

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let idx = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(doc) = documents.get(idx) else {
                                break;
                            };
                            done.push((idx, self.process_document(doc)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => indexed.extend(done),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });

        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Run one document to a terminal state.
    pub fn process_document(&self, doc: &DocumentRef) -> DocumentOutcome {
        let document_id = doc.document_id.as_str();

        let text = match self.source.load_text(doc) {
            Ok(text) => text,
            Err(e) => return self.fail(document_id, e.to_string()),
        };

        if text.trim().is_empty() {
            tracing::info!(document_id, state = %DocumentState::Skipped, "Empty note, skipping");
            if let Err(e) = self.store.mark_terminal(document_id, DocumentState::Skipped) {
                return self.fail(document_id, e.to_string());
            }
            return DocumentOutcome::Skipped;
        }

        tracing::debug!(document_id, state = %DocumentState::Extracting, "Extracting");

        let (result, unparseable) = match self.extractor.extract(&text) {
            Ok(result) => (result, false),
            Err(ExtractorError::Malformed(reason)) => {
                tracing::warn!(
                    document_id,
                    reason = %reason,
                    "Unparseable extractor output, substituting empty result"
                );
                (ExtractionResult::empty(), true)
            }
            Err(e) => return self.fail(document_id, e.to_string()),
        };

        let provenance = self.extractor.provenance();
        let records = normalize(document_id, &result, &provenance, repository::utc_now());

        if records.is_empty() {
            tracing::info!(document_id, "No usable features extracted, skipping persistence");
            if let Err(e) = self.store.mark_terminal(document_id, DocumentState::Normalized) {
                return self.fail(document_id, e.to_string());
            }
            return DocumentOutcome::Normalized {
                inserted: 0,
                already_present: 0,
                warnings: 0,
                unparseable,
            };
        }

        let warnings = validate_features(document_id, &records);

        match self.store.put_all(&records) {
            Ok(summary) => {
                tracing::debug!(
                    document_id,
                    state = %DocumentState::Normalized,
                    inserted = summary.inserted,
                    already_present = summary.already_present,
                    "Features persisted"
                );
                DocumentOutcome::Normalized {
                    inserted: summary.inserted,
                    already_present: summary.already_present,
                    warnings: warnings.len(),
                    unparseable,
                }
            }
            Err(e) => self.fail(document_id, e.to_string()),
        }
    }

    fn fail(&self, document_id: &str, error: String) -> DocumentOutcome {
        tracing::error!(
            document_id,
            state = %DocumentState::Failed,
            error = %error,
            "Document extraction failed"
        );
        DocumentOutcome::Failed { error }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::db::repository::test_support::seed_document;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{ExtractionProvenance, SymptomScore};
    use crate::pipeline::batch_extraction::error::SourceError;
    use crate::pipeline::batch_extraction::store::SqliteFeatureStore;

    /// In-memory note texts keyed by document id.
    struct MapSource(HashMap<String, String>);

    impl NoteSource for MapSource {
        fn load_text(&self, document: &DocumentRef) -> Result<String, SourceError> {
            self.0
                .get(&document.document_id)
                .cloned()
                .ok_or_else(|| SourceError::Payload {
                    location: document.location.clone(),
                    reason: "missing".into(),
                })
        }
    }

    /// Mock extractor: scripted responses keyed by note text, records calls.
    struct ScriptedExtractor {
        responses: HashMap<String, Result<ExtractionResult, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExtractor {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn ok(mut self, text: &str, result: ExtractionResult) -> Self {
            self.responses.insert(text.to_string(), Ok(result));
            self
        }

        fn malformed(mut self, text: &str) -> Self {
            self.responses.insert(text.to_string(), Err("malformed".into()));
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl NoteExtractor for ScriptedExtractor {
        fn extract(&self, note_text: &str) -> Result<ExtractionResult, ExtractorError> {
            self.calls.lock().unwrap().push(note_text.to_string());
            match self.responses.get(note_text) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err(_)) => Err(ExtractorError::Malformed("not json".into())),
                None => Err(ExtractorError::Timeout(30)),
            }
        }

        fn provenance(&self) -> ExtractionProvenance {
            ExtractionProvenance::new("scripted", "v1")
        }
    }

    fn fever() -> ExtractionResult {
        ExtractionResult {
            age: Some("45".into()),
            symptoms: vec![SymptomScore { name: "Fever".into(), severity: 0.8 }],
            risk_score: Some(0.3),
            medical_department: Some("Infectious Diseases".into()),
            ..Default::default()
        }
    }

    fn setup(notes: &[(&str, &str)]) -> (SqliteFeatureStore, MapSource) {
        let conn = open_memory_database().unwrap();
        let mut texts = HashMap::new();
        for (id, text) in notes {
            seed_document(&conn, id);
            texts.insert(id.to_string(), text.to_string());
        }
        (SqliteFeatureStore::new(conn), MapSource(texts))
    }

    fn config(workers: usize) -> RunnerConfig {
        RunnerConfig {
            workers,
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_and_persists() {
        let (store, source) = setup(&[("D1", "fever note")]);
        let extractor = ScriptedExtractor::new().ok("fever note", fever());
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));

        let report = runner.run_batch().unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(report.normalized, 1);
        assert_eq!(report.features_inserted, 4);
        assert_eq!(store.list_by_subject("D1").unwrap().len(), 4);
        assert_eq!(report.outcome_of("D1").unwrap().state(), DocumentState::Normalized);
    }

    #[test]
    fn whitespace_note_is_skipped_without_calling_extractor() {
        let (store, source) = setup(&[("D1", "  \n\t ")]);
        let extractor = ScriptedExtractor::new();
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));

        let report = runner.run_batch().unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(extractor.call_count(), 0);
        assert!(store.list_by_subject("D1").unwrap().is_empty());
    }

    #[test]
    fn malformed_output_becomes_empty_result() {
        let (store, source) = setup(&[("D1", "garbled")]);
        let extractor = ScriptedExtractor::new().malformed("garbled");
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));

        let report = runner.run_batch().unwrap();
        assert_eq!(report.failed, 0);
        assert!(matches!(
            report.outcome_of("D1"),
            Some(DocumentOutcome::Normalized { inserted: 0, unparseable: true, .. })
        ));
    }

    #[test]
    fn transport_failure_is_isolated() {
        let (store, source) = setup(&[("D1", "fever note"), ("D2", "unknown note")]);
        let extractor = ScriptedExtractor::new().ok("fever note", fever());
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));

        let report = runner.run_batch().unwrap();
        assert_eq!(report.normalized, 1);
        assert_eq!(report.failed, 1);
        assert!(matches!(report.outcome_of("D2"), Some(DocumentOutcome::Failed { .. })));

        // Failed document is selected again on the next run
        let pending = store.list_unfeatured_documents("clinical_note", 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].document_id, "D2");
    }

    #[test]
    fn source_failure_marks_failed() {
        let (store, _) = setup(&[("D1", "fever note")]);
        let source = MapSource(HashMap::new());
        let extractor = ScriptedExtractor::new();
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));

        let report = runner.run_batch().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(extractor.call_count(), 0);
    }

    #[test]
    fn conflict_fails_only_that_document() {
        let (store, source) = setup(&[("D1", "fever note"), ("D2", "fever note")]);
        let extractor = ScriptedExtractor::new().ok("fever note", fever());

        // Plant a differing record under one of D1's future ids
        let planted = normalize(
            "D1",
            &fever(),
            &ExtractionProvenance::new("other", "v0"),
            repository::utc_now(),
        );
        store.put(&planted[0]).unwrap();

        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));
        let outcome = runner.process_document(&DocumentRef {
            document_id: "D1".into(),
            location: "/notes/D1.json".into(),
        });
        assert!(matches!(outcome, DocumentOutcome::Failed { ref error } if error.contains("Conflicting")));
        assert_eq!(store.list_by_subject("D1").unwrap().len(), 1);

        let report = runner.run_batch().unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(report.normalized, 1);
    }

    #[test]
    fn reprocessing_is_idempotent() {
        let (store, source) = setup(&[("D1", "fever note")]);
        let extractor = ScriptedExtractor::new().ok("fever note", fever());
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));
        let doc = DocumentRef {
            document_id: "D1".into(),
            location: "/notes/D1.json".into(),
        };

        runner.process_document(&doc);
        let second = runner.process_document(&doc);
        assert!(matches!(
            second,
            DocumentOutcome::Normalized { inserted: 0, already_present: 4, .. }
        ));
        assert_eq!(store.list_by_subject("D1").unwrap().len(), 4);
    }

    #[test]
    fn worker_pool_keeps_selection_order() {
        let ids: Vec<String> = (0..12).map(|i| format!("D{i:02}")).collect();
        let notes: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "fever note")).collect();
        let (store, source) = setup(&notes);
        let extractor = ScriptedExtractor::new().ok("fever note", fever());
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(4));

        let report = runner.run_batch().unwrap();
        assert_eq!(report.normalized, 12);
        assert_eq!(extractor.call_count(), 12);
        let order: Vec<_> = report.outcomes.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(order, ids);
        assert_eq!(store.list_featured_documents().unwrap().len(), 12);
    }

    #[test]
    fn batch_size_limits_selection() {
        let (store, source) = setup(&[("D1", "a"), ("D2", "b"), ("D3", "c")]);
        let extractor = ScriptedExtractor::new();
        let runner = ExtractionRunner::new(
            &store,
            &source,
            &extractor,
            RunnerConfig {
                batch_size: 2,
                workers: 1,
                ..Default::default()
            },
        );
        assert_eq!(runner.run_batch().unwrap().selected, 2);
    }

    #[test]
    fn featureless_outcomes_do_not_block_later_documents() {
        let (store, source) = setup(&[
            ("A", "   "),
            ("B", "garbled"),
            ("C", "nothing useful"),
            ("D", "fever note"),
        ]);
        let extractor = ScriptedExtractor::new()
            .malformed("garbled")
            .ok("nothing useful", ExtractionResult::empty())
            .ok("fever note", fever());
        let runner = ExtractionRunner::new(
            &store,
            &source,
            &extractor,
            RunnerConfig {
                batch_size: 2,
                workers: 1,
                ..Default::default()
            },
        );

        let first = runner.run_batch().unwrap();
        assert_eq!(first.skipped, 1);
        assert_eq!(first.normalized, 1);

        let second = runner.run_batch().unwrap();
        let selected: Vec<_> = second.outcomes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(selected, vec!["C", "D"]);
        assert_eq!(store.list_by_subject("D").unwrap().len(), 4);

        let third = runner.run_batch().unwrap();
        assert_eq!(third.selected, 0);
        // "garbled" and "nothing useful" were each extracted exactly once
        assert_eq!(extractor.call_count(), 3);
    }

    #[test]
    fn failed_documents_are_not_marked_terminal() {
        let (store, source) = setup(&[("D1", "unknown note")]);
        let extractor = ScriptedExtractor::new();
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(1));

        assert_eq!(runner.run_batch().unwrap().failed, 1);
        assert_eq!(runner.run_batch().unwrap().failed, 1);
        assert_eq!(extractor.call_count(), 2);
    }

    #[test]
    fn empty_selection_returns_empty_report() {
        let (store, source) = setup(&[]);
        let extractor = ScriptedExtractor::new();
        let runner = ExtractionRunner::new(&store, &source, &extractor, config(2));
        let report = runner.run_batch().unwrap();
        assert_eq!(report.selected, 0);
        assert!(report.outcomes.is_empty());
    }
}
