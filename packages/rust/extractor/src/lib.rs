//! Section extraction for Spanish drug label text files.
//!
//! A document is scanned line by line against the [`SectionCatalog`] and the
//! captured text is passed through the cleaner. Use [`scan_lines`] to inspect
//! the raw, uncleaned capture.

mod catalog;
mod scanner;

use std::path::Path;

use tracing::{debug, instrument};

use pharmai_shared::{DocumentRecord, PharmaiError, Result, SectionId};

pub use catalog::{CaptureMode, RegionRule, SectionCatalog, SectionRule};
pub use scanner::{RawSections, ScanState, Scanner, find_atc_code, scan_lines};

/// Extract and clean a record from a sequence of lines.
pub fn extract_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> DocumentRecord {
    let raw = scan_lines(lines);
    let found: Vec<SectionId> = raw.found().collect();
    debug!(sections = found.len(), ?found, "scan complete");

    let record = pharmai_cleaner::clean_record(raw.into_record());
    if let Some(atc) = record.get(SectionId::AtcCode) {
        debug!(atc, "atc code");
    }
    record
}

/// Extract and clean a record from a whole document.
pub fn extract_text(text: &str) -> DocumentRecord {
    extract_lines(text.lines())
}

/// Read a UTF-8 text file and extract its record.
///
/// Unreadable or undecodable files fail with [`PharmaiError::Io`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn extract_file(path: &Path) -> Result<DocumentRecord> {
    let text = std::fs::read_to_string(path).map_err(|e| PharmaiError::io(path, e))?;
    Ok(extract_text(&text))
}
