use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{FieldSpec, FormatVariant};

mod fallback;
mod store;

pub use fallback::embedded_fields;
pub use store::{DefinitionStore, WEIGHT_TOLERANCE, WEIGHT_TOTAL};

pub const DEFAULT_DEFINITION_FORMAT: FormatVariant = FormatVariant::SyntexSystem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionSource {
    Store { path: PathBuf },
    Embedded,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldTable {
    pub format: FormatVariant,
    pub source: DefinitionSource,
    pub fields: Vec<FieldSpec>,
}

impl FieldTable {
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn weight(&self, name: &str) -> u32 {
        self.get(name).map(|field| field.weight).unwrap_or(0)
    }

    pub fn weight_total(&self) -> u32 {
        self.fields.iter().map(|field| field.weight).sum()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

pub struct FieldDefinitionProvider {
    store: Option<DefinitionStore>,
    cache: RwLock<HashMap<FormatVariant, Arc<FieldTable>>>,
}

impl FieldDefinitionProvider {
    pub fn new(store: Option<DefinitionStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn embedded_only() -> Self {
        Self::new(None)
    }

    pub fn get_fields(&self, format: FormatVariant) -> Arc<FieldTable> {
        {
            let cache = self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(table) = cache.get(&format) {
                return Arc::clone(table);
            }
        }

        let table = Arc::new(self.resolve(format));
        let mut cache = self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(cache.entry(format).or_insert(table))
    }

    pub fn get_fields_named(&self, format_name: &str) -> (Arc<FieldTable>, Option<String>) {
        match format_name.parse::<FormatVariant>() {
            Ok(format) => (self.get_fields(format), None),
            Err(_) => {
                let warning = format!(
                    "Unknown format: {format_name}; using {DEFAULT_DEFINITION_FORMAT} definitions"
                );
                warn!(format = %format_name, fallback = %DEFAULT_DEFINITION_FORMAT, "unknown format requested");
                (self.get_fields(DEFAULT_DEFINITION_FORMAT), Some(warning))
            }
        }
    }

    pub fn invalidate(&self, format: FormatVariant) {
        let mut cache = self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cache.remove(&format).is_some() {
            debug!(format = %format, "field definition cache invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        for format in FormatVariant::ALL {
            self.invalidate(format);
        }
    }

    fn resolve(&self, format: FormatVariant) -> FieldTable {
        if let Some(store) = &self.store {
            match store.load(format) {
                Ok(fields) => {
                    let path = store.path_for(format);
                    debug!(format = %format, path = %path.display(), fields = fields.len(), "loaded field definitions from store");
                    return FieldTable {
                        format,
                        source: DefinitionSource::Store { path },
                        fields,
                    };
                }
                Err(err) => {
                    warn!(format = %format, error = %err, "definition store unusable; using embedded definitions");
                }
            }
        }

        FieldTable {
            format,
            source: DefinitionSource::Embedded,
            fields: embedded_fields(format),
        }
    }
}
