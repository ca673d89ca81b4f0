use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{FormatVariant, PairCoherence};
use crate::semantic::SimilarityProvider;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoherencePair {
    pub field_a: &'static str,
    pub field_b: &'static str,
    pub min_expected: f64,
}

const SYNTEX_SYSTEM_PAIRS: [CoherencePair; 3] = [
    CoherencePair {
        field_a: "driftkorper",
        field_b: "kalibrierung",
        min_expected: 0.3,
    },
    CoherencePair {
        field_a: "kalibrierung",
        field_b: "stromung",
        min_expected: 0.3,
    },
    CoherencePair {
        field_a: "driftkorper",
        field_b: "stromung",
        min_expected: 0.25,
    },
];

const HUMAN_PAIRS: [CoherencePair; 3] = [
    CoherencePair {
        field_a: "drift",
        field_b: "hintergrund_muster",
        min_expected: 0.3,
    },
    CoherencePair {
        field_a: "druckfaktoren",
        field_b: "wirkung",
        min_expected: 0.3,
    },
    CoherencePair {
        field_a: "tiefe",
        field_b: "klartext",
        min_expected: 0.25,
    },
];

const SIGMA_PAIRS: [CoherencePair; 2] = [
    CoherencePair {
        field_a: "sigma_drift",
        field_b: "sigma_mechanismus",
        min_expected: 0.3,
    },
    CoherencePair {
        field_a: "sigma_strome",
        field_b: "sigma_frequenz",
        min_expected: 0.25,
    },
];

pub fn coherence_pairs(format: FormatVariant) -> &'static [CoherencePair] {
    match format {
        FormatVariant::Sigma => &SIGMA_PAIRS,
        FormatVariant::SyntexSystem => &SYNTEX_SYSTEM_PAIRS,
        FormatVariant::Human => &HUMAN_PAIRS,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoherenceResult {
    pub format: FormatVariant,
    pub pairs_analyzed: usize,
    pub average_coherence: f64,
    pub pairs: Vec<PairCoherence>,
    pub warnings: Vec<String>,
}

impl CoherenceResult {
    pub fn incoherent_pairs(&self) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|pair| !pair.passed)
            .map(|pair| format!("Low coherence: {} = {:.3}", pair.pair, pair.similarity))
            .collect()
    }
}

pub struct CoherenceAnalyzer {
    provider: Arc<dyn SimilarityProvider>,
}

impl CoherenceAnalyzer {
    pub fn new(provider: Arc<dyn SimilarityProvider>) -> Self {
        Self { provider }
    }

    pub fn score(&self, fields: &BTreeMap<String, String>, format: FormatVariant) -> CoherenceResult {
        let mut pairs = Vec::new();
        let mut warnings = Vec::new();
        let mut total = 0.0_f64;

        for pair in coherence_pairs(format) {
            let (Some(left), Some(right)) = (
                non_empty(fields, pair.field_a),
                non_empty(fields, pair.field_b),
            ) else {
                continue;
            };

            let label = format!("{} <-> {}", pair.field_a, pair.field_b);
            match self.provider.similarity(left, right) {
                Ok(similarity) => {
                    total += similarity;
                    pairs.push(PairCoherence {
                        pair: label,
                        similarity,
                        min_expected: pair.min_expected,
                        passed: similarity >= pair.min_expected,
                    });
                }
                Err(err) => {
                    warn!(pair = %label, error = %err, "coherence pair skipped");
                    warnings.push(format!("Coherence unavailable for {label}: {err}"));
                }
            }
        }

        let average_coherence = if pairs.is_empty() {
            0.0
        } else {
            total / pairs.len() as f64
        };
        debug!(format = %format, pairs = pairs.len(), average_coherence, "coherence analyzed");

        CoherenceResult {
            format,
            pairs_analyzed: pairs.len(),
            average_coherence,
            pairs,
            warnings,
        }
    }
}

fn non_empty<'a>(fields: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::testing::{local_provider, ConstantSimilarity, UnavailableSimilarity};

    fn fields(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn pairs_reference_only_fields_of_their_variant() {
        for format in FormatVariant::ALL {
            for pair in coherence_pairs(format) {
                assert!(format.owns_field(pair.field_a), "{format}: {}", pair.field_a);
                assert!(format.owns_field(pair.field_b), "{format}: {}", pair.field_b);
            }
        }
    }

    #[test]
    fn pairs_with_missing_member_are_skipped_not_penalized() {
        let analyzer = CoherenceAnalyzer::new(Arc::new(ConstantSimilarity(0.6)));
        let result = analyzer.score(
            &fields(&[("driftkorper", "Struktur"), ("kalibrierung", "Anpassung"), ("stromung", "  ")]),
            FormatVariant::SyntexSystem,
        );
        assert_eq!(result.pairs_analyzed, 1);
        assert!((result.average_coherence - 0.6).abs() < 1e-12);
        assert!(result.pairs[0].passed);
        assert_eq!(result.pairs[0].pair, "driftkorper <-> kalibrierung");
    }

    #[test]
    fn no_evaluable_pairs_yields_zero() {
        let analyzer = CoherenceAnalyzer::new(Arc::new(ConstantSimilarity(0.9)));
        let result = analyzer.score(&fields(&[("drift", "steigt")]), FormatVariant::Human);
        assert_eq!(result.pairs_analyzed, 0);
        assert_eq!(result.average_coherence, 0.0);
    }

    #[test]
    fn failing_pairs_are_flagged_against_their_minimum() {
        let analyzer = CoherenceAnalyzer::new(Arc::new(ConstantSimilarity(0.28)));
        let result = analyzer.score(
            &fields(&[("driftkorper", "a"), ("kalibrierung", "b"), ("stromung", "c")]),
            FormatVariant::SyntexSystem,
        );
        let passed = result.pairs.iter().map(|pair| pair.passed).collect::<Vec<bool>>();
        assert_eq!(passed, vec![false, false, true]);
        assert_eq!(result.incoherent_pairs().len(), 2);
    }

    #[test]
    fn unavailable_provider_skips_pairs_with_warnings() {
        let analyzer = CoherenceAnalyzer::new(Arc::new(UnavailableSimilarity));
        let result = analyzer.score(
            &fields(&[("sigma_drift", "a"), ("sigma_mechanismus", "b")]),
            FormatVariant::Sigma,
        );
        assert_eq!(result.pairs_analyzed, 0);
        assert_eq!(result.average_coherence, 0.0);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn topically_coherent_fields_beat_unrelated_fields() {
        let analyzer = CoherenceAnalyzer::new(Arc::new(local_provider()));
        let coherent = fields(&[
            (
                "driftkorper",
                "Die Struktur des Systems zeigt eine hierarchische Organisation der Systemebenen.",
            ),
            (
                "kalibrierung",
                "Das System passt die Struktur der Systemebenen durch Feedback an.",
            ),
            (
                "stromung",
                "Informationsflüsse verbinden die Systemebenen und die Struktur des Systems.",
            ),
        ]);
        let unrelated = fields(&[
            ("driftkorper", "Pizza ist ein beliebtes italienisches Gericht mit Tomaten und Käse."),
            ("kalibrierung", "Der Aktienmarkt reagiert auf politische Entscheidungen."),
            ("stromung", "Elefanten leben in Afrika und Asien in großen Herden."),
        ]);

        let coherent_score = analyzer.score(&coherent, FormatVariant::SyntexSystem);
        let unrelated_score = analyzer.score(&unrelated, FormatVariant::SyntexSystem);
        assert_eq!(coherent_score.pairs_analyzed, 3);
        assert!(
            coherent_score.average_coherence > unrelated_score.average_coherence,
            "coherent {} <= unrelated {}",
            coherent_score.average_coherence,
            unrelated_score.average_coherence
        );
    }
}
