use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::model::{FormatVariant, ParsedFields, QualityVerdict};
use crate::parser::ResponseParser;
use crate::scorer::Scorer;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    #[serde(skip)]
    pub format: FormatVariant,
    #[serde(flatten)]
    pub verdict: QualityVerdict,
    pub is_complete: bool,
    pub missing_fields: Vec<String>,
    #[serde(rename = "parsed_fields")]
    pub fields: BTreeMap<String, Option<String>>,
}

pub struct ResponseAnalyzer {
    parser: ResponseParser,
    scorer: Box<dyn Scorer>,
}

impl ResponseAnalyzer {
    pub fn new(scorer: Box<dyn Scorer>) -> Result<Self> {
        Ok(Self {
            parser: ResponseParser::new()?,
            scorer,
        })
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn analyze(
        &self,
        text: &str,
        format_hint: Option<&str>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let parsed = self.parser.parse(text)?;
        Ok(self.score_parsed(&parsed, text, format_hint))
    }

    pub fn analyze_strict(
        &self,
        text: &str,
        format_hint: Option<&str>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let parsed = self.parser.parse(text)?;
        self.parser.validate(&parsed, true)?;
        Ok(self.score_parsed(&parsed, text, format_hint))
    }

    fn score_parsed(
        &self,
        parsed: &ParsedFields,
        text: &str,
        format_hint: Option<&str>,
    ) -> AnalysisOutcome {
        let format = parsed.variant();
        let mut verdict = self.scorer.score(parsed, text);
        if let Some(warning) = format_hint.and_then(|hint| hint_warning(hint, format)) {
            warn!(hint = ?format_hint, detected = %format, "format hint ignored");
            verdict.warnings_mut().push(warning);
        }

        let outcome = AnalysisOutcome {
            format,
            verdict,
            is_complete: parsed.is_complete(),
            missing_fields: parsed.missing_fields(),
            fields: parsed.to_field_map(),
        };
        info!(
            format = %outcome.format,
            scorer = self.scorer.name(),
            total_score_100 = outcome.verdict.total_score_100(),
            status = %outcome.verdict.status(),
            missing = outcome.missing_fields.len(),
            "response analyzed"
        );
        outcome
    }
}

fn hint_warning(hint: &str, detected: FormatVariant) -> Option<String> {
    match hint.parse::<FormatVariant>() {
        Ok(expected) if expected == detected => None,
        Ok(expected) => Some(format!(
            "Format hint {expected} does not match detected format {detected}"
        )),
        Err(_) => Some(format!("Unknown format hint: {hint}")),
    }
}
