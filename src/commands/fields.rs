use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::FieldsArgs;
use crate::commands::Engine;
use crate::fields::{FieldTable, WEIGHT_TOLERANCE, WEIGHT_TOTAL};
use crate::util::print_json_pretty;

#[derive(Debug, Serialize)]
struct FieldsOutput<'a> {
    requested: &'a str,
    weight_total: u32,
    warnings: Vec<String>,
    #[serde(flatten)]
    table: &'a FieldTable,
}

pub fn run(args: FieldsArgs) -> Result<()> {
    let engine = Engine::from_args(&args.engine);
    let (table, warning) = engine.definitions.get_fields_named(&args.format);

    let weight_total = table.weight_total();
    if weight_total.abs_diff(WEIGHT_TOTAL) > WEIGHT_TOLERANCE {
        warn!(format = %table.format, weight_total, expected = WEIGHT_TOTAL, "field weights off the expected total");
    }

    if args.json {
        let output = FieldsOutput {
            requested: &args.format,
            weight_total,
            warnings: warning.into_iter().collect(),
            table: &table,
        };
        print_json_pretty(&output)?;
    } else {
        info!(fields = %table.field_names().join(", "), "field order");
        for field in &table.fields {
            info!(
                field = %field.name,
                weight = field.weight,
                min_length = field.min_length,
                ideal_length = field.ideal_length,
                keywords = field.keywords.len(),
                requires_tiers = field.requires_tiers,
                "field definition"
            );
        }
    }

    info!(
        requested = %args.format,
        format = %table.format,
        source = ?table.source,
        fields = table.fields.len(),
        weight_total,
        "field definitions resolved"
    );
    Ok(())
}
