//! Core domain types for PharmAI label records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SectionId
// ---------------------------------------------------------------------------

/// Identifier of a regulatory label subsection.
///
/// Variants are declared in catalog order; the derived `Ord` is what keeps
/// serialized records in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    Indications,
    Dosage,
    Contraindications,
    Warnings,
    Interactions,
    FertilityPregnancy,
    DrivingEffects,
    AdverseReactions,
    Overdose,
    AtcCode,
    Pharmacokinetics,
    Excipients,
    Incompatibilities,
    StoragePrecautions,
    RevisionDate,
}

impl SectionId {
    /// Every section, in catalog order.
    pub const ALL: [SectionId; 15] = [
        SectionId::Indications,
        SectionId::Dosage,
        SectionId::Contraindications,
        SectionId::Warnings,
        SectionId::Interactions,
        SectionId::FertilityPregnancy,
        SectionId::DrivingEffects,
        SectionId::AdverseReactions,
        SectionId::Overdose,
        SectionId::AtcCode,
        SectionId::Pharmacokinetics,
        SectionId::Excipients,
        SectionId::Incompatibilities,
        SectionId::StoragePrecautions,
        SectionId::RevisionDate,
    ];

    /// The stable key used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indications => "indications",
            Self::Dosage => "dosage",
            Self::Contraindications => "contraindications",
            Self::Warnings => "warnings",
            Self::Interactions => "interactions",
            Self::FertilityPregnancy => "fertility_pregnancy",
            Self::DrivingEffects => "driving_effects",
            Self::AdverseReactions => "adverse_reactions",
            Self::Overdose => "overdose",
            Self::AtcCode => "atc_code",
            Self::Pharmacokinetics => "pharmacokinetics",
            Self::Excipients => "excipients",
            Self::Incompatibilities => "incompatibilities",
            Self::StoragePrecautions => "storage_precautions",
            Self::RevisionDate => "revision_date",
        }
    }

    /// Whether this section carries prose worth indexing for retrieval.
    ///
    /// The ATC code and revision date are metadata, not answerable content.
    pub fn is_retrievable(&self) -> bool {
        !matches!(self, Self::AtcCode | Self::RevisionDate)
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocumentRecord
// ---------------------------------------------------------------------------

type SectionMap = BTreeMap<SectionId, Option<String>>;

/// Structured content of one label document.
///
/// Every [`SectionId`] is always present as a key. Missing content is `None`
/// (serialized as `null`), never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SectionMap", into = "SectionMap")]
pub struct DocumentRecord {
    sections: SectionMap,
}

impl DocumentRecord {
    /// A record with every section absent.
    pub fn empty() -> Self {
        Self {
            sections: SectionId::ALL.iter().map(|id| (*id, None)).collect(),
        }
    }

    /// Content of a section, if present.
    pub fn get(&self, id: SectionId) -> Option<&str> {
        self.sections.get(&id).and_then(|v| v.as_deref())
    }

    /// Set a section's content. Empty strings are stored as absent.
    pub fn set(&mut self, id: SectionId, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        self.sections.insert(id, value);
    }

    /// Iterate sections in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (SectionId, Option<&str>)> {
        self.sections.iter().map(|(id, v)| (*id, v.as_deref()))
    }

    /// Number of sections that carry content.
    pub fn present_count(&self) -> usize {
        self.sections.values().filter(|v| v.is_some()).count()
    }

    /// Transform every present value, re-applying the empty-means-absent rule.
    pub fn map_present(self, mut f: impl FnMut(SectionId, String) -> String) -> Self {
        let mut out = Self::empty();
        for (id, value) in self.sections {
            out.set(id, value.map(|v| f(id, v)));
        }
        out
    }
}

impl Default for DocumentRecord {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<DocumentRecord> for SectionMap {
    fn from(record: DocumentRecord) -> Self {
        record.sections
    }
}

impl TryFrom<SectionMap> for DocumentRecord {
    type Error = String;

    fn try_from(sections: SectionMap) -> std::result::Result<Self, Self::Error> {
        let missing: Vec<&str> = SectionId::ALL
            .iter()
            .filter(|id| !sections.contains_key(id))
            .map(|id| id.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!("record is missing sections: {}", missing.join(", ")));
        }

        let mut record = Self::empty();
        for (id, value) in sections {
            record.set(id, value);
        }
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// One entry of a multi-document collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionEntry {
    /// Successfully extracted document.
    Record(DocumentRecord),
    /// The document could not be read or extracted.
    Failed { error: String },
}

/// The persisted output of one extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Collection {
    /// A single-file run: the bare record.
    Single(DocumentRecord),
    /// A directory run: records keyed by original filename.
    Batch(BTreeMap<String, CollectionEntry>),
}

impl Collection {
    /// Successful records with the name they were stored under.
    ///
    /// A single-record collection has no filename, so `None` is yielded.
    pub fn records(&self) -> Vec<(Option<&str>, &DocumentRecord)> {
        match self {
            Self::Single(record) => vec![(None, record)],
            Self::Batch(entries) => entries
                .iter()
                .filter_map(|(name, entry)| match entry {
                    CollectionEntry::Record(record) => Some((Some(name.as_str()), record)),
                    CollectionEntry::Failed { .. } => None,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

/// An indexable snippet of extracted text, exported for the external embedder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// The medicine the text belongs to (document name without extension).
    pub source_entity: String,
    /// The label section the text came from.
    pub category: SectionId,
    /// The cleaned section text.
    pub text: String,
}

/// A fragment returned by the external search, ranked by relevance.
///
/// Fields are optional because the producer is outside our control; the
/// context formatter skips fragments that lack any required field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrievedFragment {
    #[serde(default)]
    pub source_entity: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl RetrievedFragment {
    /// Wrap an owned fragment with the score assigned by the search.
    pub fn from_fragment(fragment: &Fragment, score: f32) -> Self {
        Self {
            source_entity: Some(fragment.source_entity.clone()),
            category: Some(fragment.category.to_string()),
            text: Some(fragment.text.clone()),
            relevance_score: Some(score),
        }
    }
}
