pub mod analyze;
pub mod batch;
pub mod fields;
pub mod validate;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::analysis::ResponseAnalyzer;
use crate::cli::EngineArgs;
use crate::fields::{DefinitionStore, FieldDefinitionProvider};
use crate::scorer::{Scorer, select_scorer};
use crate::semantic::{LazySimilarityProvider, SimilarityProvider, resolve_model_config};

pub struct Engine {
    pub args: EngineArgs,
    pub similarity: Arc<dyn SimilarityProvider>,
    pub definitions: Arc<FieldDefinitionProvider>,
}

impl Engine {
    pub fn from_args(args: &EngineArgs) -> Self {
        let config = resolve_model_config(
            &args.embedding_model,
            &args.embedding_backend,
            args.embedding_dim,
        );
        let similarity = LazySimilarityProvider::new(config, args.similarity_timeout_ms);
        info!(
            model_id = %similarity.config().model_id,
            backend = %similarity.config().backend,
            dimensions = similarity.config().dimensions,
            timeout_ms = args.similarity_timeout_ms,
            "similarity provider configured"
        );

        let store = args.definitions_root.as_ref().map(|root| {
            info!(root = %root.display(), language = %args.language, "using definition store");
            DefinitionStore::new(root, &args.language)
        });

        Self {
            args: args.clone(),
            similarity: Arc::new(similarity),
            definitions: Arc::new(FieldDefinitionProvider::new(store)),
        }
    }

    pub fn scorer(&self) -> Box<dyn Scorer> {
        select_scorer(
            self.args.scorer,
            Arc::clone(&self.similarity),
            Arc::clone(&self.definitions),
        )
    }

    pub fn analyzer(&self) -> Result<ResponseAnalyzer> {
        ResponseAnalyzer::new(self.scorer())
    }
}
