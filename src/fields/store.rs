use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::DefinitionError;
use crate::model::{FieldSpec, FormatVariant};

const DEFAULT_LANGUAGE: &str = "de";
pub const WEIGHT_TOTAL: u32 = 100;
pub const WEIGHT_TOLERANCE: u32 = 1;

#[derive(Debug, Clone)]
pub struct DefinitionStore {
    root: PathBuf,
    language: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreDocument {
    Wrapped { fields: BTreeMap<String, RawFieldDefinition> },
    Bare(BTreeMap<String, RawFieldDefinition>),
}

#[derive(Debug, Deserialize)]
struct RawFieldDefinition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    ideal_response: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    anti_keywords: Vec<String>,
    #[serde(default = "default_min_length")]
    min_length: usize,
    #[serde(default = "default_ideal_length")]
    ideal_length: usize,
    #[serde(default = "default_weight")]
    weight: u32,
    #[serde(default)]
    requires_tiers: bool,
}

fn default_min_length() -> usize {
    50
}

fn default_ideal_length() -> usize {
    200
}

fn default_weight() -> u32 {
    20
}

impl DefinitionStore {
    pub fn new(root: impl Into<PathBuf>, language: &str) -> Self {
        let language = match language.trim() {
            "" => DEFAULT_LANGUAGE,
            value => value,
        };
        Self {
            root: root.into(),
            language: language.to_ascii_lowercase(),
        }
    }

    pub fn path_for(&self, format: FormatVariant) -> PathBuf {
        self.root
            .join(format!("{}.{}.json", format.slug(), self.language))
    }

    pub fn load(&self, format: FormatVariant) -> Result<Vec<FieldSpec>, DefinitionError> {
        let path = self.path_for(format);
        let raw = fs::read(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                DefinitionError::Missing { path: path.clone() }
            } else {
                DefinitionError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let document: StoreDocument =
            serde_json::from_slice(&raw).map_err(|source| DefinitionError::Malformed {
                path: path.clone(),
                source,
            })?;
        let entries = match document {
            StoreDocument::Wrapped { fields } => fields,
            StoreDocument::Bare(fields) => fields,
        };

        build_table(format, entries).map_err(|reason| DefinitionError::Invalid { path, reason })
    }
}

fn build_table(
    format: FormatVariant,
    mut entries: BTreeMap<String, RawFieldDefinition>,
) -> Result<Vec<FieldSpec>, String> {
    if entries.is_empty() {
        return Err("no field definitions".to_string());
    }

    let unknown = entries
        .keys()
        .filter(|name| !format.owns_field(name))
        .cloned()
        .collect::<Vec<String>>();
    if !unknown.is_empty() {
        return Err(format!(
            "fields not part of {format}: {}",
            unknown.join(", ")
        ));
    }

    let mut fields = Vec::with_capacity(entries.len());
    for name in format.field_names() {
        let Some(raw) = entries.remove(*name) else {
            continue;
        };
        if raw.weight == 0 {
            return Err(format!("field {name} has zero weight"));
        }
        if raw.ideal_length < raw.min_length {
            return Err(format!(
                "field {name} has ideal_length {} below min_length {}",
                raw.ideal_length, raw.min_length
            ));
        }
        fields.push(FieldSpec {
            name: name.to_string(),
            description: raw.description.trim().to_string(),
            ideal_response: raw.ideal_response.trim().to_string(),
            keywords: normalize_terms(raw.keywords),
            anti_keywords: normalize_terms(raw.anti_keywords),
            min_length: raw.min_length,
            ideal_length: raw.ideal_length,
            weight: raw.weight,
            requires_tiers: raw.requires_tiers,
        });
    }

    let total = fields.iter().map(|field| field.weight).sum::<u32>();
    if total.abs_diff(WEIGHT_TOTAL) > WEIGHT_TOLERANCE {
        return Err(format!("weights sum to {total}, expected {WEIGHT_TOTAL}"));
    }

    Ok(fields)
}

fn normalize_terms(values: Vec<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
