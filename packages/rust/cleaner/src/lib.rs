//! Field-level text normalization for extracted label sections.
//!
//! Raw section text comes out of PDF-to-text conversion full of page footers,
//! box-drawing glyphs, cross-references and regulatory boilerplate. The
//! cleanup pipeline in [`cleanup`] strips all of that and returns a single
//! lowercased, whitespace-normalized line per field.

mod cleanup;

use tracing::{debug, instrument};

use pharmai_shared::{DocumentRecord, SectionId};

/// Clean a single field value.
///
/// The transformation is deterministic and idempotent: cleaning an already
/// cleaned value returns it unchanged. Empty input is returned as-is.
pub fn clean_field(section: SectionId, value: &str) -> String {
    cleanup::run_pipeline(section, value)
}

/// Clean every present field of a record.
///
/// Fields that clean down to nothing become absent.
#[instrument(skip_all, fields(present = record.present_count()))]
pub fn clean_record(record: DocumentRecord) -> DocumentRecord {
    let cleaned = record.map_present(|section, value| clean_field(section, &value));
    debug!(present = cleaned.present_count(), "record cleaned");
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHARMACOVIGILANCE: &str = "Se invita a los profesionales sanitarios a notificar las \
        sospechas de reacciones adversas a través del Sistema Español de Farmacovigilancia de \
        Medicamentos de Uso Humano: https://www.notificaram.es";

    /// Cross-references nested `depth` deep, each hiding a `9 … de 9` footer
    /// that only appears once the reference inside it is gone.
    fn nested_footer_sample(depth: usize) -> String {
        let mut inner = String::from("(ver sección 4.1)");
        for _ in 0..depth {
            inner = format!("(ver 9 {inner} de 9 sección 4.1)");
        }
        format!("dosis 9 {inner} de 9 fin")
    }

    #[test]
    fn nested_footers_are_removed_at_any_depth() {
        for depth in [1, 5, 9] {
            let cleaned = clean_field(SectionId::Dosage, &nested_footer_sample(depth));
            assert_eq!(cleaned, "dosis fin", "depth {depth}");
        }
    }

    #[test]
    fn clean_field_is_idempotent_for_every_section() {
        let mut samples: Vec<String> = [
            "",
            "   ",
            "4 de 12\nTexto con │ barras | y • viñetas (ver sección 4.4).",
            "03/2021\nLa información detallada de este medicamento está disponible",
            "Código ATC: N02BE01\r\nGrupo farmacoterapéutico",
            "Dolor leve 2 (ver sección 4.2) de 3 moderado",
            "dosis 4.2 de 3 ver sección 4.4",
            "ÁCIDO ACETILSALICÍLICO 500 mg \u{F06D} comprimidos ● ٭",
        ]
        .map(String::from)
        .to_vec();
        samples.push(nested_footer_sample(5));
        samples.push(nested_footer_sample(9));

        for section in SectionId::ALL {
            for sample in &samples {
                let once = clean_field(section, sample);
                let twice = clean_field(section, &once);
                assert_eq!(once, twice, "not idempotent for {section} on {sample:?}");
            }
        }
    }

    #[test]
    fn clean_field_empty_is_noop() {
        for section in SectionId::ALL {
            assert_eq!(clean_field(section, ""), "");
        }
    }

    #[test]
    fn atc_code_keeps_case() {
        assert_eq!(clean_field(SectionId::AtcCode, "N02BA01"), "N02BA01");
        assert_eq!(clean_field(SectionId::Indications, "N02BA01"), "n02ba01");
    }

    #[test]
    fn revision_date_rewrites_month_year() {
        let raw = "03/2021 La información detallada y actualizada de este medicamento está \
                   disponible en la página web de la Agencia Española de Medicamentos";
        assert_eq!(clean_field(SectionId::RevisionDate, raw), "marzo 2021");
    }

    #[test]
    fn adverse_reactions_boilerplate_only_removed_in_its_section() {
        let raw = format!("Náuseas y vómitos.\n{PHARMACOVIGILANCE}");
        assert_eq!(
            clean_field(SectionId::AdverseReactions, &raw),
            "náuseas y vómitos."
        );
        assert!(clean_field(SectionId::Warnings, &raw).contains("notificaram"));
    }

    #[test]
    fn clean_record_drops_fields_that_clean_to_nothing() {
        let mut record = DocumentRecord::empty();
        record.set(SectionId::Overdose, Some("3 de 10".into()));
        record.set(SectionId::Dosage, Some("Adultos: 1 comprimido".into()));
        record.set(SectionId::AtcCode, Some("N02BE01".into()));

        let cleaned = clean_record(record);
        assert_eq!(cleaned.get(SectionId::Overdose), None);
        assert_eq!(cleaned.get(SectionId::Dosage), Some("adultos: 1 comprimido"));
        assert_eq!(cleaned.get(SectionId::AtcCode), Some("N02BE01"));
        assert_eq!(cleaned.iter().count(), SectionId::ALL.len());
    }
}
