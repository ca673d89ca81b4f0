use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::scorer::ScorerMode;
use crate::semantic::{
    DEFAULT_BACKEND, DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_ID, DEFAULT_SIMILARITY_TIMEOUT_MS,
};

#[derive(Parser, Debug)]
#[command(
    name = "syntx-quality",
    version,
    about = "Format detection, field extraction and quality scoring for generated responses"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Analyze(AnalyzeArgs),
    Validate(ValidateArgs),
    Fields(FieldsArgs),
    Batch(BatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(long, value_enum, default_value_t = ScorerMode::Auto)]
    pub scorer: ScorerMode,

    #[arg(long, env = "SYNTX_FIELD_DEFINITIONS")]
    pub definitions_root: Option<PathBuf>,

    #[arg(long, default_value = "de")]
    pub language: String,

    #[arg(long, env = "SYNTX_EMBEDDING_MODEL", default_value = DEFAULT_MODEL_ID)]
    pub embedding_model: String,

    #[arg(long, default_value = DEFAULT_BACKEND)]
    pub embedding_backend: String,

    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIM)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = DEFAULT_SIMILARITY_TIMEOUT_MS)]
    pub similarity_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub expect_format: Option<String>,

    #[arg(long, default_value_t = false)]
    pub strict: bool,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value_t = false)]
    pub strict: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FieldsArgs {
    #[arg(long)]
    pub format: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "txt")]
    pub extension: String,

    #[arg(long, default_value_t = 4)]
    pub jobs: usize,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub reload_definitions: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}
