//! Cleanup pipeline for extracted section text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The sequence is repeated until the value stops changing, because removing
//! one artifact can expose another (a cross-reference sitting between `2` and
//! `de 3` leaves a page footer behind).

use std::sync::LazyLock;

use regex::Regex;

use pharmai_shared::SectionId;

/// Run the full cleanup pipeline on one field value.
///
/// Terminates: after the first round case folding and the date rewrite are
/// stable, and every other pass only removes text.
pub(crate) fn run_pipeline(section: SectionId, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut current = run_round(section, text);
    loop {
        let next = run_round(section, &current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// One pass of every cleanup step, in order.
fn run_round(section: SectionId, text: &str) -> String {
    let mut result = text.to_string();

    if section == SectionId::RevisionDate {
        result = simplify_revision_date(&result);
    }
    if section != SectionId::AtcCode {
        result = result.to_lowercase();
    }
    result = collapse_line_breaks(&result);
    result = replace_special_characters(&result);
    result = remove_page_numbering(&result);
    result = remove_section_references(&result);
    if section == SectionId::AdverseReactions {
        result = remove_pharmacovigilance_notice(&result);
    }

    normalize_whitespace(&result)
}

// ---------------------------------------------------------------------------
// Pass 1: Revision date
// ---------------------------------------------------------------------------

const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Cut the AEMPS availability notice and spell out a bare `MM/YYYY` date.
fn simplify_revision_date(text: &str) -> String {
    static EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)la información detallada").expect("valid regex")
    });
    static LOOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)la\s+informaci[oó]n\s+detallada").expect("valid regex")
    });
    static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\d{1,2})/(\d{4})$").expect("valid regex")
    });

    let text = text.trim();
    let cut = EXACT_RE
        .find(text)
        .or_else(|| LOOSE_RE.find(text))
        .map(|m| m.start())
        .unwrap_or(text.len());
    let text = text[..cut].trim();

    let Some(caps) = MONTH_YEAR_RE.captures(text) else {
        return text.to_string();
    };

    let month = &caps[1];
    let year = &caps[2];
    let name = month
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| MONTH_NAMES.get(i).copied())
        .unwrap_or(month);

    format!("{name} {year}")
}

// ---------------------------------------------------------------------------
// Pass 2: Line breaks
// ---------------------------------------------------------------------------

/// Replace any run of `\n` / `\r` with a single space.
fn collapse_line_breaks(text: &str) -> String {
    static BREAKS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\n\r]+").expect("valid regex"));

    BREAKS_RE.replace_all(text, " ").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Special characters
// ---------------------------------------------------------------------------

/// Bullets, pipes and box-drawing bars left behind by PDF conversion.
const LAYOUT_GLYPHS: [char; 8] = [
    '\u{F06D}', '\u{2502}', '\u{2551}', '|', '\u{FFE8}', '\u{066D}', '\u{2022}', '\u{25CF}',
];

/// Blank out layout glyphs and anything outside Latin-1 / Latin Extended-A.
fn replace_special_characters(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| {
            if LAYOUT_GLYPHS.contains(&c) || !is_latin(c) {
                ' '
            } else {
                c
            }
        })
        .collect();

    normalize_whitespace(&replaced)
}

fn is_latin(c: char) -> bool {
    c.is_ascii() || ('\u{00A0}'..='\u{017F}').contains(&c)
}

// ---------------------------------------------------------------------------
// Pass 4: Page numbering
// ---------------------------------------------------------------------------

/// Remove `N de M` page footers.
fn remove_page_numbering(text: &str) -> String {
    static PAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\b\d+\s+de\s+\d+\b").expect("valid regex"));

    normalize_whitespace(&PAGE_RE.replace_all(text, ""))
}

// ---------------------------------------------------------------------------
// Pass 5: Cross-references
// ---------------------------------------------------------------------------

/// Remove `(ver sección 4.4)` style references, including lists like
/// `ver sección 4.3, 4.4 y 5.2`.
fn remove_section_references(text: &str) -> String {
    static REF_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\(?\bver\s+secci[oó]n\s+(?:\d+\.\d+(?:\s*(?:,|y|e)\s*\d+\.\d+)*)+\.?\)?\.?",
        )
        .expect("valid regex")
    });

    normalize_whitespace(&REF_RE.replace_all(text, ""))
}

// ---------------------------------------------------------------------------
// Pass 6: Pharmacovigilance notice
// ---------------------------------------------------------------------------

const PHARMACOVIGILANCE_NOTICE: &str = "se invita a los profesionales sanitarios a notificar \
    las sospechas de reacciones adversas a través del sistema español de farmacovigilancia \
    de medicamentos de uso humano: https://www.notificaram.es";

/// Remove the standard AEMPS adverse-reaction reporting sentence.
fn remove_pharmacovigilance_notice(text: &str) -> String {
    static NOTICE_RE: LazyLock<Regex> = LazyLock::new(|| {
        let words: Vec<String> = PHARMACOVIGILANCE_NOTICE
            .split_whitespace()
            .map(regex::escape)
            .collect();
        Regex::new(&format!(r"(?i)\s*{}\.?\s*", words.join(r"\s+"))).expect("valid regex")
    });

    normalize_whitespace(&NOTICE_RE.replace_all(text, " "))
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

/// Collapse whitespace runs to single spaces and trim.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
