use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

pub const SIGMA_FIELD_NAMES: [&str; 6] = [
    "sigma_drift",
    "sigma_mechanismus",
    "sigma_frequenz",
    "sigma_dichte",
    "sigma_strome",
    "sigma_extrakt",
];

pub const SYNTEX_SYSTEM_FIELD_NAMES: [&str; 3] = ["driftkorper", "kalibrierung", "stromung"];

pub const HUMAN_FIELD_NAMES: [&str; 6] = [
    "drift",
    "hintergrund_muster",
    "druckfaktoren",
    "tiefe",
    "wirkung",
    "klartext",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormatVariant {
    Sigma,
    SyntexSystem,
    Human,
}

impl FormatVariant {
    pub const ALL: [FormatVariant; 3] = [Self::Sigma, Self::SyntexSystem, Self::Human];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sigma => "SIGMA",
            Self::SyntexSystem => "SYNTEX_SYSTEM",
            Self::Human => "HUMAN",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Sigma => "sigma",
            Self::SyntexSystem => "syntex_system",
            Self::Human => "human",
        }
    }

    pub fn field_names(self) -> &'static [&'static str] {
        match self {
            Self::Sigma => &SIGMA_FIELD_NAMES,
            Self::SyntexSystem => &SYNTEX_SYSTEM_FIELD_NAMES,
            Self::Human => &HUMAN_FIELD_NAMES,
        }
    }

    pub fn owns_field(self, name: &str) -> bool {
        self.field_names().contains(&name)
    }
}

impl fmt::Display for FormatVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "sigma" => Ok(Self::Sigma),
            "syntex_system" | "syntexsystem" | "system" => Ok(Self::SyntexSystem),
            "human" | "human_readable" => Ok(Self::Human),
            _ => Err(format!(
                "unknown format variant: {value} (expected one of {})",
                Self::ALL.map(Self::as_str).join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
    pub ideal_response: String,
    pub keywords: BTreeSet<String>,
    pub anti_keywords: BTreeSet<String>,
    pub min_length: usize,
    pub ideal_length: usize,
    pub weight: u32,
    pub requires_tiers: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Failed,
    Unstable,
    Ok,
    Excellent,
}

impl Status {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::Excellent
        } else if score >= 0.60 {
            Self::Ok
        } else if score >= 0.40 {
            Self::Unstable
        } else {
            Self::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "FAILED",
            Self::Unstable => "UNSTABLE",
            Self::Ok => "OK",
            Self::Excellent => "EXCELLENT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A name missing from `values` means the marker never appeared in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFields {
    variant: FormatVariant,
    values: BTreeMap<String, String>,
}

impl ParsedFields {
    pub fn new(variant: FormatVariant) -> Self {
        Self {
            variant,
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, value: String) -> bool {
        if !self.variant.owns_field(name) {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }

    pub fn variant(&self) -> FormatVariant {
        self.variant
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn missing_fields(&self) -> Vec<String> {
        self.variant
            .field_names()
            .iter()
            .filter(|name| {
                self.get(name)
                    .map(|value| value.trim().is_empty())
                    .unwrap_or(true)
            })
            .map(|name| name.to_string())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn to_field_map(&self) -> BTreeMap<String, Option<String>> {
        self.variant
            .field_names()
            .iter()
            .map(|name| (name.to_string(), self.get(name).map(str::to_string)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldScore {
    pub field: String,
    #[serde(serialize_with = "round3")]
    pub presence: f64,
    #[serde(serialize_with = "round3")]
    pub similarity: f64,
    #[serde(serialize_with = "round3")]
    pub coherence: f64,
    #[serde(serialize_with = "round3")]
    pub depth: f64,
    #[serde(serialize_with = "round3")]
    pub structure: f64,
    #[serde(serialize_with = "round3")]
    pub total: f64,
    pub status: Status,
    pub warnings: Vec<String>,
}

impl FieldScore {
    pub fn empty(field: &str) -> Self {
        Self {
            field: field.to_string(),
            presence: 0.0,
            similarity: 0.0,
            coherence: 0.0,
            depth: 0.0,
            structure: 0.0,
            total: 0.0,
            status: Status::Failed,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairCoherence {
    pub pair: String,
    #[serde(serialize_with = "round3")]
    pub similarity: f64,
    pub min_expected: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub format: FormatVariant,
    #[serde(serialize_with = "round3")]
    pub total_score: f64,
    pub total_score_100: u32,
    pub status: Status,
    #[serde(rename = "coherence", serialize_with = "round3")]
    pub coherence_score: f64,
    pub coherence_pairs: Vec<PairCoherence>,
    #[serde(rename = "fields", serialize_with = "in_field_order")]
    pub field_scores: BTreeMap<String, FieldScore>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyReport {
    pub format: FormatVariant,
    pub total_score: u32,
    pub field_completeness: u32,
    pub structure_adherence: u32,
    pub status: Status,
    #[serde(serialize_with = "in_field_order")]
    pub detail_breakdown: BTreeMap<String, bool>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scorer", rename_all = "snake_case")]
pub enum QualityVerdict {
    Semantic(QualityReport),
    Legacy(LegacyReport),
}

impl QualityVerdict {
    pub fn total_score_100(&self) -> u32 {
        match self {
            Self::Semantic(report) => report.total_score_100,
            Self::Legacy(report) => report.total_score,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Semantic(report) => report.status,
            Self::Legacy(report) => report.status,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Semantic(report) => &report.warnings,
            Self::Legacy(report) => &report.warnings,
        }
    }

    pub fn warnings_mut(&mut self) -> &mut Vec<String> {
        match self {
            Self::Semantic(report) => &mut report.warnings,
            Self::Legacy(report) => &mut report.warnings,
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

fn round3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 3))
}

fn field_position(name: &str) -> usize {
    FormatVariant::ALL
        .iter()
        .find_map(|format| format.field_names().iter().position(|field| *field == name))
        .unwrap_or(usize::MAX)
}

// Keys in the variant's field order; unknown names trail alphabetically.
fn in_field_order<S: Serializer, V: Serialize>(
    map: &BTreeMap<String, V>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut entries = map.iter().collect::<Vec<(&String, &V)>>();
    entries.sort_by_key(|(name, _)| field_position(name));
    serializer.collect_map(entries)
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub file: String,
    pub sha256: String,
    pub format: FormatVariant,
    pub total_score_100: u32,
    pub status: Status,
    pub drift: f64,
    pub is_complete: bool,
    pub missing_fields: Vec<String>,
    pub verdict: QualityVerdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub generated_at: String,
    pub scorer: String,
    pub input_directory: String,
    pub file_count: usize,
    pub analyzed_count: usize,
    pub skipped_count: usize,
    pub average_quality_100: f64,
    pub average_drift: f64,
    pub status_counts: BTreeMap<Status, usize>,
    pub format_counts: BTreeMap<FormatVariant, usize>,
    pub duration_ms: u128,
    pub items: Vec<BatchItem>,
    pub skipped: Vec<SkippedItem>,
    pub warnings: Vec<String>,
}
