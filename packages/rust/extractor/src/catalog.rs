//! The section catalog: heading patterns and capture rules per label section.
//!
//! Headings are numbered regulatory subsections (`4.1`, `6.2`, `10.`).
//! Every pattern is anchored at the start of the trimmed line and matched
//! case-insensitively; the period after the leading number is optional.

use std::sync::LazyLock;

use regex::Regex;

use pharmai_shared::SectionId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How content is captured once a section's heading has been seen.
#[derive(Debug)]
pub enum CaptureMode {
    /// Lines belong to the section until any other heading appears.
    Ordinary,
    /// Lines belong to the section until a specific closing heading appears.
    Region(RegionRule),
    /// The next ATC code found is the section's value.
    AtcCode,
}

/// Boundary rule for a section whose end is marked by a different heading.
#[derive(Debug)]
pub struct RegionRule {
    closing: Regex,
    own_prefix: &'static str,
    then: Option<SectionId>,
}

impl RegionRule {
    /// Whether `line` is the heading that ends this region.
    pub fn closes_on(&self, line: &str) -> bool {
        self.closing.is_match(line)
    }

    /// Whether `line` repeats the region's own subsection number.
    ///
    /// Such lines are dropped instead of captured.
    pub fn repeats_own_number(&self, line: &str) -> bool {
        line.starts_with(self.own_prefix)
    }

    /// The region entered when this one closes, if any.
    pub fn then(&self) -> Option<SectionId> {
        self.then
    }
}

/// One catalog entry.
#[derive(Debug)]
pub struct SectionRule {
    pub id: SectionId,
    heading: Regex,
    pub mode: CaptureMode,
}

impl SectionRule {
    /// Whether `line` is this section's heading.
    pub fn matches(&self, line: &str) -> bool {
        self.heading.is_match(line)
    }
}

/// Ordered, immutable table of section rules.
#[derive(Debug)]
pub struct SectionCatalog {
    rules: Vec<SectionRule>,
}

// ---------------------------------------------------------------------------
// Standard catalog (compiled once)
// ---------------------------------------------------------------------------

static STANDARD: LazyLock<SectionCatalog> = LazyLock::new(SectionCatalog::build_standard);

impl SectionCatalog {
    /// The catalog for Spanish summary-of-product-characteristics documents.
    pub fn standard() -> &'static SectionCatalog {
        &STANDARD
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[SectionRule] {
        &self.rules
    }

    /// First rule whose heading matches `line`.
    pub fn match_heading(&self, line: &str) -> Option<&SectionRule> {
        self.rules.iter().find(|rule| rule.matches(line))
    }

    /// The region rule for `id`, if that section is region-captured.
    pub fn region(&self, id: SectionId) -> Option<&RegionRule> {
        self.rules
            .iter()
            .find(|rule| rule.id == id)
            .and_then(|rule| match &rule.mode {
                CaptureMode::Region(region) => Some(region),
                _ => None,
            })
    }

    fn build_standard() -> Self {
        use SectionId::*;

        let rules = vec![
            ordinary(Indications, r"4\.1", r"indicaciones\s+terap[eé]uticas"),
            ordinary(
                Dosage,
                r"4\.2",
                r"posolog[ií]a\s+y\s+forma\s+de\s+administraci[oó]n",
            ),
            ordinary(Contraindications, r"4\.3", r"contraindicaciones"),
            ordinary(
                Warnings,
                r"4\.4",
                r"advertencias\s+y\s+precauciones\s+especiales\s+de\s+empleo",
            ),
            ordinary(
                Interactions,
                r"4\.5",
                r"interacci[oó]n\s+con\s+otros\s+medicamentos",
            ),
            ordinary(
                FertilityPregnancy,
                r"4\.6",
                r"fertilidad,\s+embarazo\s+y\s+lactancia",
            ),
            ordinary(
                DrivingEffects,
                r"4\.7",
                r"efectos\s+sobre\s+la\s+capacidad\s+para\s+conducir",
            ),
            ordinary(AdverseReactions, r"4\.8", r"reacciones\s+adversas"),
            region(
                Overdose,
                r"4\.9",
                r"sobredosis",
                "4.9",
                closing(r"5\s*\.?\s*propiedades\s+farmacol[oó]gicas"),
                None,
            ),
            SectionRule {
                id: AtcCode,
                heading: heading(r"5\.1", r"propiedades\s+farmacodin[aá]micas"),
                mode: CaptureMode::AtcCode,
            },
            region(
                Pharmacokinetics,
                r"5\.2",
                r"propiedades\s+farmacocin[eé]ticas",
                "5.2",
                closing(r"6\s*\.?\s*datos\s+farmac[eé]uticos"),
                None,
            ),
            region(
                Excipients,
                r"6\.1",
                r"lista\s+de\s+excipientes",
                "6.1",
                closing(r"6\s*\.?\s*2\s*\.?\s*incompatibilidades"),
                Some(Incompatibilities),
            ),
            region(
                Incompatibilities,
                r"6\.2",
                r"incompatibilidades",
                "6.2",
                closing(r"6\s*\.?\s*3\s*\.?\s*per[ií]odo\s+de\s+validez"),
                None,
            ),
            region(
                StoragePrecautions,
                r"6\.4",
                r"precauciones\s+especiales\s+de\s+conservaci[oó]n",
                "6.4",
                closing(r"6\s*\.?\s*5\s*\.?\s*naturaleza\s+y\s+contenido\s+del\s+envase"),
                None,
            ),
            ordinary(
                RevisionDate,
                r"10",
                r"fecha\s+de\s+la\s+revisi[oó]n\s+del\s+texto",
            ),
        ];

        Self { rules }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn heading(number: &str, title: &str) -> Regex {
    Regex::new(&format!(r"(?i)^{number}\.?\s*{title}")).expect("valid regex")
}

fn closing(pattern: &str) -> Regex {
    Regex::new(&format!(r"(?i)^{pattern}")).expect("valid regex")
}

fn ordinary(id: SectionId, number: &str, title: &str) -> SectionRule {
    SectionRule {
        id,
        heading: heading(number, title),
        mode: CaptureMode::Ordinary,
    }
}

fn region(
    id: SectionId,
    number: &str,
    title: &str,
    own_prefix: &'static str,
    closing: Regex,
    then: Option<SectionId>,
) -> SectionRule {
    SectionRule {
        id,
        heading: heading(number, title),
        mode: CaptureMode::Region(RegionRule {
            closing,
            own_prefix,
            then,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
