//! Batch extraction: input path → records → one persisted artifact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use pharmai_shared::{
    BatchDefaults, Collection, CollectionEntry, DocumentRecord, PharmaiError, Result,
};

use crate::assembler::{self, ArtifactMeta};

/// Status string recorded for a successfully extracted document.
pub const STATUS_OK: &str = "OK";

/// Configuration for [`process_path`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// A `.txt` file or a directory of them.
    pub input: PathBuf,
    /// Where the artifact is written.
    pub output_dir: PathBuf,
    /// Artifact name for directory inputs.
    pub collection_file_name: String,
    /// Document cap for directory inputs (0 = all).
    pub limit: usize,
    /// Documents extracted concurrently.
    pub concurrency: usize,
    /// Log a progress line every this many documents (0 = never).
    pub progress_interval: usize,
}

impl BatchConfig {
    /// Build a config for `input` from merged runtime defaults.
    pub fn new(input: impl Into<PathBuf>, defaults: &BatchDefaults) -> Self {
        Self {
            input: input.into(),
            output_dir: defaults.output_dir.clone(),
            collection_file_name: defaults.collection_file_name.clone(),
            limit: defaults.limit,
            concurrency: defaults.concurrency,
            progress_interval: defaults.progress_interval,
        }
    }
}

/// Shape of the persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One input file, one bare record.
    Single,
    /// A directory, one keyed collection.
    Collection,
}

/// Result of [`process_path`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Per-document status: `"OK"` or `"Error: <description>"`.
    pub statuses: BTreeMap<String, String>,
    /// Documents extracted successfully.
    pub processed: usize,
    /// Documents that failed, sorted by name.
    pub failed: Vec<String>,
    /// The written artifact.
    pub artifact: ArtifactMeta,
    pub mode: BatchMode,
    pub elapsed: Duration,
}

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the document list is known.
    fn started(&self, total: usize);
    /// Called after each document is extracted or fails.
    fn document_done(&self, name: &str, ok: bool, current: usize, total: usize);
    /// Called when the artifact has been written.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total: usize) {}
    fn document_done(&self, _name: &str, _ok: bool, _current: usize, _total: usize) {}
    fn done(&self, _report: &BatchReport) {}
}

/// Extract a single file or every `.txt` file in a directory and persist the result.
///
/// A single file is written as `<output_dir>/<stem>.json`; a read failure
/// is returned as an error. A directory is always written as one collection
/// at `<output_dir>/<collection_file_name>`, with unreadable documents kept
/// as error entries.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub async fn process_path(
    config: &BatchConfig,
    progress: &dyn ProgressReporter,
) -> Result<BatchReport> {
    let start = Instant::now();
    let input = &config.input;

    if !input.exists() {
        return Err(PharmaiError::invalid_input(format!(
            "input path does not exist: {}",
            input.display()
        )));
    }

    let mut report = if input.is_file() {
        process_file(config, progress).await?
    } else if input.is_dir() {
        process_dir(config, progress).await?
    } else {
        return Err(PharmaiError::invalid_input(format!(
            "input is neither a file nor a directory: {}",
            input.display()
        )));
    };
    report.elapsed = start.elapsed();

    info!(
        processed = report.processed,
        failed = report.failed.len(),
        artifact = %report.artifact.path.display(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "batch complete"
    );
    if !report.failed.is_empty() {
        warn!(failed = ?report.failed, "some documents could not be extracted");
    }

    progress.done(&report);
    Ok(report)
}

async fn process_file(config: &BatchConfig, progress: &dyn ProgressReporter) -> Result<BatchReport> {
    let input = config.input.clone();
    if !has_txt_extension(&input) {
        return Err(PharmaiError::invalid_input(format!(
            "expected a .txt file: {}",
            input.display()
        )));
    }

    let name = file_name(&input);
    progress.started(1);

    let record = extract_blocking(input.clone()).await?;
    progress.document_done(&name, true, 1, 1);

    let target = assembler::single_output_path(&config.output_dir, &input)?;
    let artifact = assembler::write_json_atomic(&target, &record)?;

    Ok(BatchReport {
        statuses: BTreeMap::from([(name, STATUS_OK.to_string())]),
        processed: 1,
        failed: Vec::new(),
        artifact,
        mode: BatchMode::Single,
        elapsed: Duration::ZERO,
    })
}

async fn process_dir(config: &BatchConfig, progress: &dyn ProgressReporter) -> Result<BatchReport> {
    let documents = list_documents(&config.input, config.limit)?;
    let total = documents.len();
    info!(total, concurrency = config.concurrency, "processing directory");
    progress.started(total);

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut handles = Vec::with_capacity(total);

    for path in documents {
        let name = file_name(&path);
        let sem = semaphore.clone();
        handles.push((
            name,
            tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| PharmaiError::Extraction(e.to_string()))?;
                extract_blocking(path).await
            }),
        ));
    }

    let mut entries: BTreeMap<String, CollectionEntry> = BTreeMap::new();
    let mut statuses = BTreeMap::new();
    let mut failed = Vec::new();

    for (i, (name, handle)) in handles.into_iter().enumerate() {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(PharmaiError::Extraction(e.to_string())),
        };

        let ok = outcome.is_ok();
        match outcome {
            Ok(record) => {
                debug!(document = %name, present = record.present_count(), "extracted");
                statuses.insert(name.clone(), STATUS_OK.to_string());
                entries.insert(name.clone(), CollectionEntry::Record(record));
            }
            Err(e) => {
                warn!(document = %name, error = %e, "extraction failed");
                statuses.insert(name.clone(), format!("Error: {e}"));
                entries.insert(
                    name.clone(),
                    CollectionEntry::Failed {
                        error: e.to_string(),
                    },
                );
                failed.push(name.clone());
            }
        }

        let current = i + 1;
        progress.document_done(&name, ok, current, total);
        if config.progress_interval > 0 && current % config.progress_interval == 0 {
            info!(current, total, "progress");
        }
    }

    let target = config.output_dir.join(&config.collection_file_name);
    let artifact = assembler::write_json_atomic(&target, &Collection::Batch(entries))?;

    Ok(BatchReport {
        statuses,
        processed: total - failed.len(),
        failed,
        artifact,
        mode: BatchMode::Collection,
        elapsed: Duration::ZERO,
    })
}

/// Run the CPU-bound extraction on the blocking pool.
async fn extract_blocking(path: PathBuf) -> Result<DocumentRecord> {
    tokio::task::spawn_blocking(move || pharmai_extractor::extract_file(&path))
        .await
        .map_err(|e| PharmaiError::Extraction(e.to_string()))?
}

/// Regular `.txt` files in `dir`, sorted by name, capped at `limit` when non-zero.
fn list_documents(dir: &Path, limit: usize) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PharmaiError::io(dir, e))?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PharmaiError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && has_txt_extension(&path) {
            documents.push(path);
        }
    }
    documents.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

    if limit > 0 {
        documents.truncate(limit);
    }
    Ok(documents)
}

fn has_txt_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pharmai_shared::SectionId;

    use super::*;

    const FIXTURE: &str = "../../../fixtures/txt/PARACETAMOL_1_g_COMPRIMIDOS.txt";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pharmai-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_config(input: &Path, output_dir: &Path) -> BatchConfig {
        BatchConfig {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            collection_file_name: "medicamentos.json".into(),
            limit: 0,
            concurrency: 2,
            progress_interval: 2,
        }
    }

    fn doc(body: &str) -> String {
        format!("4.1. Indicaciones terapéuticas\n{body}\n4.2. Posología y forma de administración\nUna vez al día.\n")
    }

    #[derive(Default)]
    struct CountingProgress {
        started: AtomicUsize,
        documents: AtomicUsize,
        done: AtomicUsize,
    }

    impl ProgressReporter for CountingProgress {
        fn started(&self, total: usize) {
            self.started.store(total, Ordering::SeqCst);
        }
        fn document_done(&self, _name: &str, _ok: bool, _current: usize, _total: usize) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }
        fn done(&self, _report: &BatchReport) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn single_file_writes_stem_json() {
        let out = temp_dir();
        let config = make_config(Path::new(FIXTURE), &out);

        let report = process_path(&config, &SilentProgress).await.unwrap();
        assert_eq!(report.mode, BatchMode::Single);
        assert_eq!(report.processed, 1);
        assert_eq!(
            report.statuses.get("PARACETAMOL_1_g_COMPRIMIDOS.txt").map(String::as_str),
            Some(STATUS_OK)
        );
        assert_eq!(report.artifact.path, out.join("PARACETAMOL_1_g_COMPRIMIDOS.json"));

        let written = assembler::load_collection(&report.artifact.path).unwrap();
        let Collection::Single(record) = written else {
            panic!("expected a single record");
        };
        assert_eq!(record.get(SectionId::AtcCode), Some("N02BE01"));

        let _ = std::fs::remove_dir_all(&out);
    }

    #[tokio::test]
    async fn single_file_must_be_txt() {
        let tmp = temp_dir();
        let input = tmp.join("ficha.pdf");
        std::fs::write(&input, "x").unwrap();

        let err = process_path(&make_config(&input, &tmp), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PharmaiError::InvalidInput { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn single_file_read_failure_is_fatal() {
        let tmp = temp_dir();
        let input = tmp.join("ROTO.TXT");
        std::fs::write(&input, [0xffu8, 0xfe, 0x00]).unwrap();

        let err = process_path(&make_config(&input, &tmp.join("out")), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PharmaiError::Io { .. }));
        assert!(!tmp.join("out").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_input_is_invalid() {
        let tmp = temp_dir();
        let config = make_config(&tmp.join("nope"), &tmp);
        let err = process_path(&config, &SilentProgress).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn directory_isolates_undecodable_document() {
        let tmp = temp_dir();
        let input = tmp.join("txt");
        std::fs::create_dir_all(&input).unwrap();
        for i in 1..=5 {
            let path = input.join(format!("doc{i}.txt"));
            if i == 3 {
                std::fs::write(&path, [0x34u8, 0x2e, 0x31, 0x0a, 0xc3, 0x28]).unwrap();
            } else {
                std::fs::write(&path, doc(&format!("Indicación {i}."))).unwrap();
            }
        }
        let out = tmp.join("out");
        let progress = CountingProgress::default();

        let report = process_path(&make_config(&input, &out), &progress).await.unwrap();
        assert_eq!(report.mode, BatchMode::Collection);
        assert_eq!(report.processed, 4);
        assert_eq!(report.failed, vec!["doc3.txt".to_string()]);
        assert!(report.statuses["doc3.txt"].starts_with("Error: "));
        assert_eq!(report.statuses["doc4.txt"], STATUS_OK);
        assert_eq!(progress.started.load(Ordering::SeqCst), 5);
        assert_eq!(progress.documents.load(Ordering::SeqCst), 5);
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);

        let Collection::Batch(entries) = assembler::load_collection(&out.join("medicamentos.json")).unwrap()
        else {
            panic!("expected a batch collection");
        };
        assert_eq!(entries.len(), 5);
        assert!(matches!(entries["doc3.txt"], CollectionEntry::Failed { .. }));
        let CollectionEntry::Record(record) = &entries["doc5.txt"] else {
            panic!("doc5 should have extracted");
        };
        assert_eq!(record.get(SectionId::Indications), Some("indicación 5."));
        assert_eq!(record.get(SectionId::Dosage), Some("una vez al día."));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn directory_respects_limit_and_order() {
        let tmp = temp_dir();
        let input = tmp.join("txt");
        std::fs::create_dir_all(input.join("sub.txt")).unwrap();
        for name in ["c.txt", "a.txt", "b.TXT", "notes.md"] {
            std::fs::write(input.join(name), doc(name)).unwrap();
        }
        let mut config = make_config(&input, &tmp.join("out"));
        config.limit = 2;

        let report = process_path(&config, &SilentProgress).await.unwrap();
        let names: Vec<&str> = report.statuses.keys().map(String::as_str).collect();
        assert_eq!(names, ["a.txt", "b.TXT"]);
        assert_eq!(report.processed, 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn directory_with_one_document_is_still_a_collection() {
        let tmp = temp_dir();
        let input = tmp.join("txt");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("solo.txt"), doc("Única.")).unwrap();

        let report = process_path(&make_config(&input, &tmp.join("out")), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.mode, BatchMode::Collection);
        let written = assembler::load_collection(&report.artifact.path).unwrap();
        assert!(matches!(written, Collection::Batch(ref e) if e.len() == 1));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn empty_directory_writes_empty_collection() {
        let tmp = temp_dir();
        let input = tmp.join("txt");
        std::fs::create_dir_all(&input).unwrap();

        let report = process_path(&make_config(&input, &tmp.join("out")), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.processed, 0);
        let content = std::fs::read_to_string(&report.artifact.path).unwrap();
        assert_eq!(content.trim(), "{}");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn batch_config_from_defaults() {
        let defaults = BatchDefaults::from(&pharmai_shared::AppConfig::default());
        let config = BatchConfig::new("data/txt", &defaults);
        assert_eq!(config.input, PathBuf::from("data/txt"));
        assert_eq!(config.collection_file_name, "medicamentos.json");
        assert_eq!(config.concurrency, 4);
    }
}
