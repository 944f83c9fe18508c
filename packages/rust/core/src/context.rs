//! Renders ranked retrieval results into the context block handed to the
//! answer generator.

use tracing::warn;

use pharmai_shared::{RetrievalConfig, RetrievedFragment};

/// Suffix appended to truncated fragment text.
const ELLIPSIS: &str = "...";

/// Limits applied by [`format_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Fragments considered, taken from the front of the ranked list.
    pub max_fragments: usize,
    /// Characters of text kept per fragment before truncation.
    pub max_fragment_chars: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for ContextOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            max_fragments: config.max_fragments,
            max_fragment_chars: config.max_fragment_chars,
        }
    }
}

/// Format ranked fragments as numbered `Result N:` blocks separated by blank lines.
///
/// Only the first `max_fragments` entries are looked at. Entries missing a
/// source, category or text are skipped with a warning and do not consume a
/// result number.
pub fn format_context(fragments: &[RetrievedFragment], options: &ContextOptions) -> String {
    let mut blocks = Vec::new();

    for (position, fragment) in fragments.iter().take(options.max_fragments).enumerate() {
        let (Some(source), Some(category), Some(text)) = (
            fragment.source_entity.as_deref(),
            fragment.category.as_deref(),
            fragment.text.as_deref(),
        ) else {
            warn!(position, "skipping fragment with missing fields");
            continue;
        };

        let text = truncate_chars(text, options.max_fragment_chars);
        blocks.push(format!(
            "Result {}:\nSource: {source}\nCategory: {category}\nText: {text}",
            blocks.len() + 1
        ));
    }

    blocks.join("\n\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}
