//! Line-by-line section scanner.
//!
//! The scanner walks a document once, keeping a single [`ScanState`] that
//! says where the current line belongs. Region states are checked before
//! heading detection so that a numbered subsection can only be closed by the
//! heading that follows it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use pharmai_shared::{DocumentRecord, SectionId};

use crate::catalog::{CaptureMode, SectionCatalog};

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `ATC` with optional colon followed by the code, anywhere in the line,
/// including glued to the preceding word (`CódigoATC:`).
static ATC_INLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ATC:?\s*([A-Z0-9]{4,7})\b").expect("valid regex"));

/// A line that is nothing but a code.
static ATC_BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9]{4,7})$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where the line being scanned belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Before the first heading, or after a section that has ended.
    Idle,
    /// Ordinary capture into a section.
    Capturing(SectionId),
    /// Inside a region that only its closing heading can end.
    InRegion(SectionId),
    /// Looking for the ATC code.
    AwaitingAtc,
}

/// Raw lines accumulated per section, before cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSections {
    lines: BTreeMap<SectionId, Vec<String>>,
}

impl RawSections {
    /// Lines captured for `id`, in document order.
    pub fn lines(&self, id: SectionId) -> &[String] {
        self.lines.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every captured line in catalog order.
    pub fn all_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.values().flatten().map(String::as_str)
    }

    /// Sections that captured anything.
    pub fn found(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.lines.keys().copied()
    }

    /// Join each section's lines and build an uncleaned record.
    pub fn into_record(self) -> DocumentRecord {
        let mut record = DocumentRecord::empty();
        for (id, lines) in self.lines {
            let joined = lines.join("\n");
            record.set(id, Some(joined.trim().to_string()));
        }
        record
    }

    fn push(&mut self, id: SectionId, line: &str) {
        self.lines.entry(id).or_default().push(line.to_string());
    }

    fn replace(&mut self, id: SectionId, line: &str) {
        self.lines.insert(id, vec![line.to_string()]);
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Single-document scanner over a [`SectionCatalog`].
#[derive(Debug)]
pub struct Scanner<'c> {
    catalog: &'c SectionCatalog,
    state: ScanState,
    sections: RawSections,
}

impl<'c> Scanner<'c> {
    pub fn new(catalog: &'c SectionCatalog) -> Self {
        Self {
            catalog,
            state: ScanState::Idle,
            sections: RawSections::default(),
        }
    }

    /// Current state, mostly useful in tests.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Consume one raw line.
    pub fn feed(&mut self, raw: &str) {
        let line = raw.trim();
        let catalog = self.catalog;

        if let ScanState::InRegion(id) = self.state {
            self.continue_region(id, line);
            return;
        }

        if let Some(rule) = catalog.match_heading(line) {
            self.state = match rule.mode {
                CaptureMode::Ordinary => ScanState::Capturing(rule.id),
                CaptureMode::Region(_) => ScanState::InRegion(rule.id),
                CaptureMode::AtcCode => ScanState::AwaitingAtc,
            };
            trace!(section = %rule.id, "heading");
            return;
        }

        match self.state {
            ScanState::AwaitingAtc => {
                if let Some(code) = find_atc_code(line) {
                    self.sections.replace(SectionId::AtcCode, code);
                    self.state = ScanState::Idle;
                }
            }
            ScanState::Capturing(id) if !line.is_empty() => self.sections.push(id, line),
            _ => {}
        }
    }

    /// Finish the scan and hand back what was captured.
    pub fn finish(self) -> RawSections {
        self.sections
    }

    fn continue_region(&mut self, id: SectionId, line: &str) {
        let catalog = self.catalog;
        let Some(region) = catalog.region(id) else {
            self.state = ScanState::Idle;
            return;
        };

        if region.closes_on(line) {
            self.state = match region.then() {
                Some(next) => ScanState::InRegion(next),
                None => ScanState::Idle,
            };
            return;
        }

        if !line.is_empty() && !region.repeats_own_number(line) {
            self.sections.push(id, line);
        }
    }
}

/// Find an ATC code on a line, either after an `ATC` label or as the whole line.
pub fn find_atc_code(line: &str) -> Option<&str> {
    if let Some(caps) = ATC_INLINE_RE.captures(line) {
        return caps.get(1).map(|m| m.as_str());
    }
    ATC_BARE_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Scan a whole document against the standard catalog.
pub fn scan_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> RawSections {
    let mut scanner = Scanner::new(SectionCatalog::standard());
    for line in lines {
        scanner.feed(line);
    }
    scanner.finish()
}
