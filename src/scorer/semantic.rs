use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::coherence::CoherenceAnalyzer;
use crate::fields::FieldDefinitionProvider;
use crate::model::{FieldScore, FieldSpec, FormatVariant, ParsedFields, QualityReport, QualityVerdict, Status};
use crate::semantic::SimilarityProvider;

use super::Scorer;

pub const PRESENCE_WEIGHT: f64 = 0.20;
pub const SIMILARITY_WEIGHT: f64 = 0.35;
pub const COHERENCE_WEIGHT: f64 = 0.25;
pub const DEPTH_WEIGHT: f64 = 0.15;
pub const STRUCTURE_WEIGHT: f64 = 0.05;

const NEUTRAL_SIMILARITY: f64 = 0.5;
const NEUTRAL_KEYWORD_SCORE: f64 = 0.25;
const LOW_SIMILARITY: f64 = 0.3;
const LOW_DEPTH: f64 = 0.3;
const LOW_COHERENCE: f64 = 0.3;
const LOW_TOTAL: f64 = 0.4;
const TIER_LEVELS: [&str; 4] = ["TIER-1", "TIER-2", "TIER-3", "TIER-4"];

pub struct SemanticScorer {
    similarity: Arc<dyn SimilarityProvider>,
    definitions: Arc<FieldDefinitionProvider>,
    coherence: CoherenceAnalyzer,
}

impl SemanticScorer {
    pub fn new(
        similarity: Arc<dyn SimilarityProvider>,
        definitions: Arc<FieldDefinitionProvider>,
    ) -> Self {
        Self {
            coherence: CoherenceAnalyzer::new(Arc::clone(&similarity)),
            similarity,
            definitions,
        }
    }

    pub fn score_fields(
        &self,
        fields: &BTreeMap<String, String>,
        format: FormatVariant,
    ) -> QualityReport {
        let table = self.definitions.get_fields(format);

        let mut field_scores = BTreeMap::new();
        for name in format.field_names() {
            let value = fields.get(*name).map(String::as_str).unwrap_or("");
            let score = match table.get(name) {
                Some(spec) => self.score_field(name, value, spec),
                None => {
                    warn!(field = %name, format = %format, "no definition for field");
                    let mut score = FieldScore::empty(name);
                    score.warnings.push(format!("No definition for field: {name}"));
                    score
                }
            };
            field_scores.insert(name.to_string(), score);
        }

        let coherence = self.coherence.score(fields, format);
        for score in field_scores.values_mut() {
            score.coherence = coherence.average_coherence;
            score.total = weighted_total(score);
            score.status = Status::from_score(score.total);
        }

        let total_score = if field_scores.is_empty() {
            0.0
        } else {
            field_scores.values().map(|score| score.total).sum::<f64>() / field_scores.len() as f64
        };

        let mut warnings = coherence.warnings.clone();
        warnings.extend(coherence.incoherent_pairs());
        if coherence.pairs_analyzed == 0 {
            warnings.push("No coherence pairs could be evaluated".to_string());
        }
        if coherence.average_coherence < LOW_COHERENCE {
            warnings.push("Low cross-field coherence".to_string());
        }
        if total_score < LOW_TOTAL {
            warnings.push("Overall quality below threshold".to_string());
        }

        let report = QualityReport {
            format,
            total_score,
            total_score_100: (total_score * 100.0).floor().clamp(0.0, 100.0) as u32,
            status: Status::from_score(total_score),
            coherence_score: coherence.average_coherence,
            coherence_pairs: coherence.pairs,
            field_scores,
            warnings,
        };
        debug!(
            format = %format,
            total_score_100 = report.total_score_100,
            status = %report.status,
            "semantic score computed"
        );
        report
    }

    fn score_field(&self, name: &str, value: &str, spec: &FieldSpec) -> FieldScore {
        let text = value.trim();
        let mut score = FieldScore::empty(name);

        score.presence = if text.is_empty() { 0.0 } else { 1.0 };
        score.similarity = self.similarity_score(text, spec, &mut score.warnings);
        score.depth = self.depth_score(text, spec);
        score.structure = structure_score(text);

        if score.presence == 0.0 {
            score.warnings.push("Field is empty".to_string());
        }
        if score.similarity < LOW_SIMILARITY {
            score.warnings.push("Low semantic match to field definition".to_string());
        }
        if score.depth < LOW_DEPTH {
            score.warnings.push("Content lacks depth".to_string());
        }
        if !text.is_empty() {
            score.warnings.extend(advisory_warnings(text, spec));
        }

        score.total = weighted_total(&score);
        score.status = Status::from_score(score.total);
        score
    }

    fn similarity_score(&self, text: &str, spec: &FieldSpec, warnings: &mut Vec<String>) -> f64 {
        if text.is_empty() {
            return 0.0;
        }

        let references = [spec.description.as_str(), spec.ideal_response.as_str()]
            .into_iter()
            .filter(|reference| !reference.trim().is_empty())
            .collect::<Vec<&str>>();
        if references.is_empty() {
            return NEUTRAL_SIMILARITY;
        }

        let mut scores = Vec::with_capacity(references.len());
        for reference in references {
            match self.similarity.similarity(text, reference) {
                Ok(value) => scores.push(value),
                Err(err) => {
                    warn!(field = %spec.name, error = %err, "similarity degraded to neutral");
                    let warning = format!("Similarity unavailable: {err}");
                    if !warnings.contains(&warning) {
                        warnings.push(warning);
                    }
                }
            }
        }

        if scores.is_empty() {
            NEUTRAL_SIMILARITY
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    fn depth_score(&self, text: &str, spec: &FieldSpec) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let length = length_score(text.chars().count(), spec.min_length, spec.ideal_length);
        let keywords = if spec.keywords.is_empty() {
            NEUTRAL_KEYWORD_SCORE
        } else {
            self.similarity.keyword_coverage(text, &spec.keywords) * 0.5
        };
        (length + keywords).min(1.0)
    }
}

impl Scorer for SemanticScorer {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn score(&self, parsed: &ParsedFields, _raw_text: &str) -> QualityVerdict {
        QualityVerdict::Semantic(self.score_fields(parsed.values(), parsed.variant()))
    }
}

pub fn weighted_total(score: &FieldScore) -> f64 {
    score.presence * PRESENCE_WEIGHT
        + score.similarity * SIMILARITY_WEIGHT
        + score.coherence * COHERENCE_WEIGHT
        + score.depth * DEPTH_WEIGHT
        + score.structure * STRUCTURE_WEIGHT
}

// 0 to 0.3 up to min_length, then 0.3 to 0.5 up to ideal_length.
pub fn length_score(length: usize, min_length: usize, ideal_length: usize) -> f64 {
    if length == 0 {
        0.0
    } else if length >= ideal_length {
        0.5
    } else if length >= min_length {
        0.3 + 0.2 * (length - min_length) as f64 / (ideal_length - min_length) as f64
    } else {
        0.3 * length as f64 / min_length as f64
    }
}

pub fn structure_score(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut score = 0.5;
    if text.contains("###") || text.contains("**") {
        score += 0.2;
    }
    if text.contains("\n\n") || text.split('\n').count() > 2 {
        score += 0.15;
    }
    if text.contains(':') || text.contains('-') {
        score += 0.15;
    }
    f64::min(score, 1.0)
}

fn advisory_warnings(text: &str, spec: &FieldSpec) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut warnings = Vec::new();

    let anti = spec
        .anti_keywords
        .iter()
        .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
        .map(String::as_str)
        .collect::<Vec<&str>>();
    if !anti.is_empty() {
        warnings.push(format!("Contains anti-keywords: {}", anti.join(", ")));
    }

    if spec.requires_tiers {
        let normalized = lowered.replace("tier ", "tier-");
        let missing = TIER_LEVELS
            .iter()
            .filter(|tier| !normalized.contains(&tier.to_lowercase()))
            .copied()
            .collect::<Vec<&str>>();
        if !missing.is_empty() {
            warnings.push(format!("Missing tier levels: {}", missing.join(", ")));
        }
    }

    warnings
}
