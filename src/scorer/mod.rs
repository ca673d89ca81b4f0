use std::sync::Arc;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::fields::FieldDefinitionProvider;
use crate::model::{ParsedFields, QualityVerdict};
use crate::semantic::SimilarityProvider;

mod legacy;
mod semantic;

pub use legacy::LegacyScorer;
pub use semantic::SemanticScorer;

pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, parsed: &ParsedFields, raw_text: &str) -> QualityVerdict;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ScorerMode {
    Auto,
    Semantic,
    Legacy,
}

pub fn select_scorer(
    mode: ScorerMode,
    similarity: Arc<dyn SimilarityProvider>,
    definitions: Arc<FieldDefinitionProvider>,
) -> Box<dyn Scorer> {
    let use_semantic = match mode {
        ScorerMode::Legacy => false,
        ScorerMode::Semantic => {
            if !similarity.is_available() {
                warn!("semantic scorer requested but similarity is unavailable; neutral similarity will be used");
            }
            true
        }
        ScorerMode::Auto => {
            let available = similarity.is_available();
            if !available {
                warn!("similarity provider unavailable; falling back to legacy scorer");
            }
            available
        }
    };

    let scorer: Box<dyn Scorer> = if use_semantic {
        Box::new(SemanticScorer::new(similarity, definitions))
    } else {
        Box::new(LegacyScorer::new(definitions))
    };
    info!(scorer = scorer.name(), "scorer selected");
    scorer
}
