use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ValidateArgs;
use crate::model::{FormatVariant, ParsedFields};
use crate::parser::ResponseParser;
use crate::util::{print_json_pretty, read_input};

#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    pub format: FormatVariant,
    pub is_complete: bool,
    pub present_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub fields: BTreeMap<String, Option<String>>,
}

impl ValidationSummary {
    fn from_parsed(parsed: &ParsedFields) -> Self {
        let missing_fields = parsed.missing_fields();
        let present_fields = parsed
            .variant()
            .field_names()
            .iter()
            .filter(|name| !missing_fields.iter().any(|missing| missing == *name))
            .map(|name| name.to_string())
            .collect();
        Self {
            format: parsed.variant(),
            is_complete: missing_fields.is_empty(),
            present_fields,
            missing_fields,
            fields: parsed.to_field_map(),
        }
    }
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let text = read_input(&args.input)?;
    let summary = validate_text(&text, args.strict)
        .with_context(|| format!("failed to validate {}", args.input.display()))?;

    if args.json {
        print_json_pretty(&summary)?;
    }
    Ok(())
}

pub fn validate_text(text: &str, strict: bool) -> Result<ValidationSummary> {
    let parser = ResponseParser::new()?;
    let parsed = parser.parse(text)?;
    let summary = ValidationSummary::from_parsed(&parsed);

    if summary.is_complete {
        info!(format = %summary.format, fields = summary.present_fields.len(), "response is complete");
    } else {
        warn!(
            format = %summary.format,
            missing = %summary.missing_fields.join(", "),
            "response is missing fields"
        );
    }

    parser.validate(&parsed, strict)?;
    Ok(summary)
}
