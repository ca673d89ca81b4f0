use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, OnceLock, RwLock};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::SimilarityError;

pub const DEFAULT_MODEL_ID: &str = "multilingual-hash-v1";
pub const DEFAULT_MODEL_NAME: &str = "paraphrase-multilingual-MiniLM-L12-v2";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_BACKEND: &str = "local-hash-v1";
pub const DISABLED_BACKEND: &str = "none";
pub const DEFAULT_SIMILARITY_TIMEOUT_MS: u64 = 2000;

const MIN_EMBEDDING_DIM: usize = 8;
const EMBEDDING_CACHE_CAPACITY: usize = 4096;
const STEM_PREFIX_CHARS: usize = 5;

pub trait SimilarityProvider: Send + Sync {
    fn similarity(&self, left: &str, right: &str) -> Result<f64, SimilarityError>;

    fn keyword_coverage(&self, text: &str, keywords: &BTreeSet<String>) -> f64 {
        keyword_coverage(text, keywords)
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str, backend: &str, dimensions: usize) -> SemanticModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };
    let backend = match backend.trim() {
        "" => DEFAULT_BACKEND,
        value => value,
    };

    let model_name = if resolved_id == DEFAULT_MODEL_ID {
        DEFAULT_MODEL_NAME
    } else {
        resolved_id
    };

    SemanticModelConfig {
        model_id: resolved_id.to_string(),
        model_name: model_name.to_string(),
        dimensions,
        backend: backend.to_string(),
    }
}

pub trait Embedder: Send + Sync {
    fn embed(&self, payload: &str) -> Vec<f32>;
}

#[derive(Debug)]
pub struct LocalEmbeddingModel {
    config: SemanticModelConfig,
}

impl LocalEmbeddingModel {
    pub fn load(config: &SemanticModelConfig) -> Result<Self, String> {
        if config.backend == DISABLED_BACKEND {
            return Err("embedding backend disabled".to_string());
        }
        if config.backend != DEFAULT_BACKEND {
            return Err(format!("unsupported embedding backend '{}'", config.backend));
        }
        if config.dimensions < MIN_EMBEDDING_DIM {
            return Err(format!(
                "embedding dimension {} is below the minimum of {MIN_EMBEDDING_DIM}",
                config.dimensions
            ));
        }
        Ok(Self {
            config: config.clone(),
        })
    }
}

impl Embedder for LocalEmbeddingModel {
    fn embed(&self, payload: &str) -> Vec<f32> {
        embed_text_local(payload, self.config.dimensions)
    }
}

// The model loads on first use and a load failure sticks.
pub struct LazySimilarityProvider {
    config: SemanticModelConfig,
    timeout: Option<Duration>,
    model: OnceLock<Result<Arc<dyn Embedder>, String>>,
    cache: RwLock<HashMap<String, Arc<Vec<f32>>>>,
}

impl LazySimilarityProvider {
    pub fn new(config: SemanticModelConfig, timeout_ms: u64) -> Self {
        Self {
            config,
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            model: OnceLock::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SemanticModelConfig {
        &self.config
    }

    fn model(&self) -> Result<Arc<dyn Embedder>, SimilarityError> {
        self.model
            .get_or_init(|| {
                info!(
                    model_id = %self.config.model_id,
                    model_name = %self.config.model_name,
                    backend = %self.config.backend,
                    dimensions = self.config.dimensions,
                    "loading embedding model"
                );
                match LocalEmbeddingModel::load(&self.config) {
                    Ok(model) => Ok(Arc::new(model) as Arc<dyn Embedder>),
                    Err(reason) => {
                        warn!(reason = %reason, "embedding model unavailable; similarity degrades to neutral");
                        Err(reason)
                    }
                }
            })
            .clone()
            .map_err(SimilarityError::Unavailable)
    }

    fn embedding(
        &self,
        model: &Arc<dyn Embedder>,
        text: &str,
    ) -> Result<Arc<Vec<f32>>, SimilarityError> {
        let key = embedding_text_hash(text);
        {
            let cache = self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(hit) = cache.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }

        let vector = Arc::new(self.embed_with_timeout(model, text)?);

        let mut cache = self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cache.len() >= EMBEDDING_CACHE_CAPACITY {
            debug!(entries = cache.len(), "embedding cache full; clearing");
            cache.clear();
        }
        cache.insert(key, Arc::clone(&vector));
        Ok(vector)
    }

    fn embed_with_timeout(
        &self,
        model: &Arc<dyn Embedder>,
        text: &str,
    ) -> Result<Vec<f32>, SimilarityError> {
        let Some(timeout) = self.timeout else {
            return Ok(model.embed(text));
        };

        let (sender, receiver) = mpsc::channel();
        let worker_model = Arc::clone(model);
        let payload = text.to_string();
        thread::Builder::new()
            .name("similarity-embed".to_string())
            .spawn(move || {
                let _ = sender.send(worker_model.embed(&payload));
            })
            .map_err(|err| {
                SimilarityError::Backend(format!("failed to spawn embedding worker: {err}"))
            })?;

        receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(timeout_ms, "embedding timed out; treating provider as unavailable for this call");
                SimilarityError::Timeout { timeout_ms }
            }
            RecvTimeoutError::Disconnected => {
                SimilarityError::Backend("embedding worker exited without a result".to_string())
            }
        })
    }
}

impl SimilarityProvider for LazySimilarityProvider {
    fn similarity(&self, left: &str, right: &str) -> Result<f64, SimilarityError> {
        let model = self.model()?;
        if left.trim().is_empty() || right.trim().is_empty() {
            return Ok(0.0);
        }

        let left_vector = self.embedding(&model, left)?;
        let right_vector = self.embedding(&model, right)?;
        Ok(cosine_similarity(&left_vector, &right_vector).clamp(0.0, 1.0))
    }

    fn is_available(&self) -> bool {
        self.model().is_ok()
    }
}

pub fn keyword_coverage(text: &str, keywords: &BTreeSet<String>) -> f64 {
    if keywords.is_empty() || text.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let found = keywords
        .iter()
        .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
        .count();
    found as f64 / keywords.len() as f64
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn embedding_text_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(MIN_EMBEDDING_DIM);
    let mut vector = vec![0_f32; dims];
    let mut tokens = tokenize_payload(payload);

    if tokens.is_empty() {
        return vector;
    }

    for token in tokens.drain(..) {
        let hash = stable_hash(&token);
        let index = (hash as usize) % dims;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn tokenize_payload(payload: &str) -> Vec<String> {
    let normalized = normalize_whitespace(payload);
    if normalized.is_empty() {
        return Vec::new();
    }

    let words = normalized
        .split(' ')
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    if words.is_empty() {
        return Vec::new();
    }

    // German compounds share their head: "systemebenen" and "systems" both feed "s:syste".
    let mut features = Vec::<String>::with_capacity(words.len() * 3);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if word.chars().count() >= STEM_PREFIX_CHARS {
            let stem = word.chars().take(STEM_PREFIX_CHARS).collect::<String>();
            features.push(format!("s:{stem}"));
        }
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{local_provider, slow_provider};
    use super::*;

    fn keywords(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn resolve_model_config_defaults_blank_ids() {
        let config = resolve_model_config("  ", "", 64);
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.backend, DEFAULT_BACKEND);
        assert_eq!(config.dimensions, 64);

        let custom = resolve_model_config("team-model", DEFAULT_BACKEND, 128);
        assert_eq!(custom.model_id, "team-model");
        assert_eq!(custom.model_name, "team-model");
    }

    #[test]
    fn local_embedding_is_normalized_and_deterministic() {
        let first = embed_text_local("Die Strömung verbindet alle Ebenen", 64);
        let second = embed_text_local("Die Strömung verbindet alle Ebenen", 64);
        assert_eq!(first, second);

        let norm = first
            .iter()
            .map(|value| f64::from(*value) * f64::from(*value))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "unexpected norm: {norm}");
    }

    #[test]
    fn related_texts_score_higher_than_unrelated_texts() {
        let provider = local_provider();
        let anchor = "Der Driftkörper analysiert die Struktur des Systems";
        let related = "Die Struktur des Systems zeigt tiefe Ebenen";
        let unrelated = "Ich mag Pizza und Bier";

        let related_score = provider.similarity(anchor, related).expect("provider loads");
        let unrelated_score = provider.similarity(anchor, unrelated).expect("provider loads");
        assert!(
            related_score > unrelated_score,
            "related {related_score} <= unrelated {unrelated_score}"
        );
        assert!((0.0..=1.0).contains(&related_score));
    }

    #[test]
    fn empty_text_has_zero_similarity() {
        let provider = local_provider();
        assert_eq!(provider.similarity("", "Struktur").expect("provider loads"), 0.0);
    }

    #[test]
    fn keyword_coverage_is_case_insensitive_fraction() {
        let set = keywords(&["Fluss", "energie", "kreislauf", "transfer"]);
        let coverage = keyword_coverage("Der FLUSS trägt Energie weiter", &set);
        assert!((coverage - 0.5).abs() < f64::EPSILON);
        assert_eq!(keyword_coverage("", &set), 0.0);
        assert_eq!(keyword_coverage("Fluss", &BTreeSet::new()), 0.0);
    }

    #[test]
    fn disabled_backend_is_cached_as_unavailable() {
        let provider = LazySimilarityProvider::new(
            resolve_model_config("", DISABLED_BACKEND, DEFAULT_EMBEDDING_DIM),
            50,
        );
        assert!(!provider.is_available());
        assert!(matches!(
            provider.similarity("a", "b"),
            Err(SimilarityError::Unavailable(_))
        ));
        assert!(!provider.is_available());
    }

    #[test]
    fn tiny_dimension_fails_to_load() {
        let provider =
            LazySimilarityProvider::new(resolve_model_config("", DEFAULT_BACKEND, 2), 0);
        assert!(!provider.is_available());
    }

    #[test]
    fn timeout_bounded_provider_still_answers_fast_calls() {
        let provider = LazySimilarityProvider::new(
            resolve_model_config("", DEFAULT_BACKEND, DEFAULT_EMBEDDING_DIM),
            DEFAULT_SIMILARITY_TIMEOUT_MS,
        );
        let score = provider
            .similarity("Energie fließt im Kreislauf", "Energie fließt im Kreislauf")
            .expect("fast call should finish within the budget");
        assert!((score - 1.0).abs() < 1e-5, "unexpected self similarity: {score}");
    }

    #[test]
    fn slow_embedding_past_budget_times_out_and_is_not_cached() {
        let provider = slow_provider(Duration::from_millis(200), 1);
        let result = provider.similarity("Energie fließt", "Struktur trägt");
        assert!(
            matches!(result, Err(SimilarityError::Timeout { timeout_ms: 1 })),
            "unexpected result: {result:?}"
        );
        assert!(provider.is_available());
        let cache = provider.cache.read().expect("cache lock");
        assert!(cache.is_empty());
    }

    #[test]
    fn slow_embedding_within_budget_answers() {
        let provider = slow_provider(Duration::from_millis(1), DEFAULT_SIMILARITY_TIMEOUT_MS);
        let score = provider
            .similarity("Energie fließt", "Energie fließt")
            .expect("finishes within the budget");
        assert!((score - 1.0).abs() < 1e-5, "unexpected self similarity: {score}");
    }
}
