//! Retrieval plumbing around the external embedder and vector index.
//!
//! Extracted records are flattened into [`Fragment`]s for indexing. At query
//! time a [`Retriever`] embeds the question, asks the index for the nearest
//! fragment positions and maps them back to fragments.

use tracing::{debug, instrument};

use pharmai_shared::{Collection, DocumentRecord, Fragment, Result, RetrievedFragment};

use crate::context::{ContextOptions, format_context};

/// Source name used for a record stored without a filename.
pub const UNKNOWN_SOURCE: &str = "unknown";

// ---------------------------------------------------------------------------
// Fragment export
// ---------------------------------------------------------------------------

/// Flatten every successful record of a collection into fragments.
///
/// Error entries are skipped. Fragments follow collection order, then
/// catalog order within a record.
pub fn fragments_from_collection(collection: &Collection) -> Vec<Fragment> {
    collection
        .records()
        .into_iter()
        .flat_map(|(name, record)| {
            let source = name.map(source_entity).unwrap_or(UNKNOWN_SOURCE);
            fragments_from_record(source, record)
        })
        .collect()
}

/// Fragments for one record: one per present retrievable section.
pub fn fragments_from_record(source: &str, record: &DocumentRecord) -> Vec<Fragment> {
    record
        .iter()
        .filter(|(id, _)| id.is_retrievable())
        .filter_map(|(id, value)| {
            let text = value?.trim();
            (!text.is_empty()).then(|| Fragment {
                source_entity: source.to_string(),
                category: id,
                text: text.to_string(),
            })
        })
        .collect()
}

/// Document filename without its `.txt` extension.
fn source_entity(name: &str) -> &str {
    let split = name.len().saturating_sub(4);
    match name.get(split..) {
        Some(ext) if ext.eq_ignore_ascii_case(".txt") => &name[..split],
        _ => name,
    }
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Turns text into a fixed-length vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Nearest-neighbour search over the embedded fragments.
pub trait VectorSearch: Send + Sync {
    /// Up to `k` `(fragment index, distance)` pairs, best first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Query-time composition of an embedder, an index and the indexed fragments.
pub struct Retriever<E, S> {
    embedder: E,
    index: S,
    fragments: Vec<Fragment>,
    top_k: usize,
}

impl<E: Embedder, S: VectorSearch> Retriever<E, S> {
    /// `fragments` must be in the order they were embedded into `index`.
    pub fn new(embedder: E, index: S, fragments: Vec<Fragment>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            fragments,
            top_k,
        }
    }

    /// Fragments closest to `query`, best first.
    ///
    /// Indices the search returns beyond the fragment list are dropped.
    #[instrument(skip_all, fields(top_k = self.top_k))]
    pub fn retrieve(&self, query: &str) -> Result<Vec<RetrievedFragment>> {
        let vector = self.embedder.embed(query)?;
        let hits = self.index.search(&vector, self.top_k)?;

        let results: Vec<RetrievedFragment> = hits
            .into_iter()
            .filter_map(|(idx, distance)| {
                self.fragments
                    .get(idx)
                    .map(|fragment| RetrievedFragment::from_fragment(fragment, distance))
            })
            .collect();

        debug!(hits = results.len(), "retrieved fragments");
        Ok(results)
    }

    /// Retrieve and render the context block in one step.
    pub fn context(&self, query: &str, options: &ContextOptions) -> Result<String> {
        let results = self.retrieve(query)?;
        Ok(format_context(&results, options))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pharmai_shared::{CollectionEntry, PharmaiError, SectionId};

    use super::*;

    struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }
    }

    /// Returns fixed hits regardless of the query.
    struct FixedSearch(Vec<(usize, f32)>);

    impl VectorSearch for FixedSearch {
        fn search(&self, _query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
            Ok(self.0.iter().copied().take(k).collect())
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(PharmaiError::validation("model not loaded"))
        }
    }

    fn record(pairs: &[(SectionId, &str)]) -> DocumentRecord {
        let mut record = DocumentRecord::empty();
        for (id, value) in pairs {
            record.set(*id, Some((*value).to_string()));
        }
        record
    }

    fn sample_collection() -> Collection {
        let mut entries = BTreeMap::new();
        entries.insert(
            "IBUPROFENO_600.txt".to_string(),
            CollectionEntry::Record(record(&[
                (SectionId::Dosage, "400 mg cada 8 horas."),
                (SectionId::AtcCode, "M01AE01"),
                (SectionId::RevisionDate, "enero 2020"),
            ])),
        );
        entries.insert(
            "ROTO.txt".to_string(),
            CollectionEntry::Failed {
                error: "invalid utf-8".into(),
            },
        );
        entries.insert(
            "ASPIRINA.TXT".to_string(),
            CollectionEntry::Record(record(&[
                (SectionId::Indications, "dolor."),
                (SectionId::Overdose, "tinnitus."),
            ])),
        );
        Collection::Batch(entries)
    }

    #[test]
    fn collection_fragments_skip_metadata_and_errors() {
        let fragments = fragments_from_collection(&sample_collection());
        let summary: Vec<(&str, SectionId)> = fragments
            .iter()
            .map(|f| (f.source_entity.as_str(), f.category))
            .collect();
        assert_eq!(
            summary,
            [
                ("ASPIRINA", SectionId::Indications),
                ("ASPIRINA", SectionId::Overdose),
                ("IBUPROFENO_600", SectionId::Dosage),
            ]
        );
    }

    #[test]
    fn single_record_uses_unknown_source() {
        let collection = Collection::Single(record(&[(SectionId::Warnings, "alcohol.")]));
        let fragments = fragments_from_collection(&collection);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].source_entity, UNKNOWN_SOURCE);
    }

    #[test]
    fn source_entity_strips_only_txt() {
        assert_eq!(source_entity("A.txt"), "A");
        assert_eq!(source_entity("A.Txt"), "A");
        assert_eq!(source_entity("A.json"), "A.json");
        assert_eq!(source_entity("txt"), "txt");
        assert_eq!(source_entity("ñ.txt"), "ñ");
    }

    #[test]
    fn retriever_maps_hits_and_drops_out_of_range() {
        let fragments = fragments_from_collection(&sample_collection());
        let retriever = Retriever::new(
            LengthEmbedder,
            FixedSearch(vec![(2, 0.1), (99, 0.2), (0, 0.3)]),
            fragments,
            5,
        );

        let results = retriever.retrieve("¿dosis de ibuprofeno?").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source_entity.as_deref(), Some("IBUPROFENO_600"));
        assert_eq!(results[0].relevance_score, Some(0.1));
        assert_eq!(results[1].category.as_deref(), Some("indications"));
    }

    #[test]
    fn retriever_respects_top_k() {
        let fragments = fragments_from_collection(&sample_collection());
        let retriever = Retriever::new(
            LengthEmbedder,
            FixedSearch(vec![(0, 0.1), (1, 0.2), (2, 0.3)]),
            fragments,
            1,
        );
        assert_eq!(retriever.retrieve("q").unwrap().len(), 1);
    }

    #[test]
    fn retriever_context_renders_blocks() {
        let fragments = fragments_from_collection(&sample_collection());
        let retriever = Retriever::new(LengthEmbedder, FixedSearch(vec![(1, 0.5)]), fragments, 5);
        let context = retriever
            .context("sobredosis", &ContextOptions::default())
            .unwrap();
        assert_eq!(
            context,
            "Result 1:\nSource: ASPIRINA\nCategory: overdose\nText: tinnitus."
        );
    }

    #[test]
    fn embedder_errors_propagate() {
        let retriever = Retriever::new(FailingEmbedder, FixedSearch(vec![]), Vec::new(), 5);
        assert!(retriever.retrieve("q").is_err());
    }
}
