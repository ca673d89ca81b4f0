use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::fields::FieldDefinitionProvider;
use crate::model::{FormatVariant, LegacyReport, ParsedFields, QualityVerdict, Status};

use super::Scorer;

const COMPLETENESS_SHARE: f64 = 0.7;
const STRUCTURE_SHARE: f64 = 0.3;
const NUMBERED_MARKERS: [&str; 6] = ["1.", "2.", "3.", "4.", "5.", "6."];
const HEADING_MARKERS: [&str; 1] = ["###"];

pub struct LegacyScorer {
    definitions: Arc<FieldDefinitionProvider>,
}

impl LegacyScorer {
    pub fn new(definitions: Arc<FieldDefinitionProvider>) -> Self {
        Self { definitions }
    }

    pub fn score_parsed(&self, parsed: &ParsedFields, raw_text: &str) -> LegacyReport {
        let format = parsed.variant();
        let table = self.definitions.get_fields(format);

        let mut detail_breakdown = BTreeMap::new();
        let mut completeness = 0_u32;
        for name in format.field_names() {
            let has_content = parsed
                .get(name)
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false);
            if has_content {
                completeness += table.weight(name);
            }
            detail_breakdown.insert(name.to_string(), has_content);
        }
        let field_completeness = completeness.min(100);
        let structure_adherence = structure_adherence(format, raw_text);

        let total_score = (COMPLETENESS_SHARE * f64::from(field_completeness)
            + STRUCTURE_SHARE * f64::from(structure_adherence))
        .floor() as u32;

        let mut warnings = Vec::new();
        let missing = parsed.missing_fields();
        if !missing.is_empty() {
            warnings.push(format!("Missing fields: {}", missing.join(", ")));
        }
        if total_score < 40 {
            warnings.push("Overall quality below threshold".to_string());
        }

        debug!(
            format = %format,
            field_completeness,
            structure_adherence,
            total_score,
            "legacy score computed"
        );

        LegacyReport {
            format,
            total_score,
            field_completeness,
            structure_adherence,
            status: Status::from_score(f64::from(total_score) / 100.0),
            detail_breakdown,
            warnings,
        }
    }
}

impl Scorer for LegacyScorer {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn score(&self, parsed: &ParsedFields, raw_text: &str) -> QualityVerdict {
        QualityVerdict::Legacy(self.score_parsed(parsed, raw_text))
    }
}

fn structure_markers(format: FormatVariant) -> &'static [&'static str] {
    match format {
        FormatVariant::SyntexSystem => &HEADING_MARKERS,
        FormatVariant::Sigma | FormatVariant::Human => &NUMBERED_MARKERS,
    }
}

pub fn structure_adherence(format: FormatVariant, raw_text: &str) -> u32 {
    let markers = structure_markers(format);
    let share = 100 / markers.len() as u32;
    let found = markers
        .iter()
        .filter(|marker| raw_text.contains(*marker))
        .count() as u32;
    (found * share).min(100)
}
