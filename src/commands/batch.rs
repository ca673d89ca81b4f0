use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::analysis::ResponseAnalyzer;
use crate::cli::BatchArgs;
use crate::commands::Engine;
use crate::fields::FieldDefinitionProvider;
use crate::model::{BatchItem, BatchManifest, SkippedItem, round_to};
use crate::util::{now_utc_string, sha256_bytes, utc_compact_string, write_json_pretty};

enum FileOutcome {
    Analyzed(BatchItem),
    Skipped(SkippedItem),
}

pub fn run(args: BatchArgs) -> Result<()> {
    let engine = Engine::from_args(&args.engine);
    let analyzer = engine.analyzer()?;
    let reload = args.reload_definitions.then_some(engine.definitions.as_ref());
    let manifest =
        build_manifest(&analyzer, &args.input_dir, &args.extension, args.jobs, reload)?;

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.input_dir
            .join("manifests")
            .join(format!("{}.json", manifest.run_id))
    });
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote batch manifest");
    info!(
        analyzed = manifest.analyzed_count,
        skipped = manifest.skipped_count,
        average_quality_100 = manifest.average_quality_100,
        average_drift = manifest.average_drift,
        "batch completed"
    );

    Ok(())
}

pub fn build_manifest(
    analyzer: &ResponseAnalyzer,
    input_dir: &Path,
    extension: &str,
    jobs: usize,
    reload: Option<&FieldDefinitionProvider>,
) -> Result<BatchManifest> {
    let started = Utc::now();
    let clock = Instant::now();

    let paths = discover_inputs(input_dir, extension)?;
    if paths.is_empty() {
        bail!("no .{} files found in {}", extension, input_dir.display());
    }

    let jobs = jobs.clamp(1, paths.len());
    let chunk_size = paths.len().div_ceil(jobs);
    info!(
        files = paths.len(),
        jobs,
        scorer = analyzer.scorer_name(),
        reload_definitions = reload.is_some(),
        "batch started"
    );

    let outcomes = thread::scope(|scope| {
        let handles = paths
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|path| {
                            if let Some(definitions) = reload {
                                definitions.invalidate_all();
                            }
                            analyze_file(analyzer, input_dir, path)
                        })
                        .collect::<Vec<FileOutcome>>()
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("batch worker panicked"))
            })
            .collect::<Result<Vec<Vec<FileOutcome>>>>()
    })?;

    let mut items = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            FileOutcome::Analyzed(item) => items.push(item),
            FileOutcome::Skipped(item) => skipped.push(item),
        }
    }

    let mut status_counts = BTreeMap::new();
    let mut format_counts = BTreeMap::new();
    for item in &items {
        *status_counts.entry(item.status).or_insert(0) += 1;
        *format_counts.entry(item.format).or_insert(0) += 1;
    }

    let (average_quality_100, average_drift) = if items.is_empty() {
        (0.0, 0.0)
    } else {
        let count = items.len() as f64;
        let quality = items
            .iter()
            .map(|item| f64::from(item.total_score_100))
            .sum::<f64>();
        let drift = items.iter().map(|item| item.drift).sum::<f64>();
        (round_to(quality / count, 2), round_to(drift / count, 3))
    };

    let mut warnings = Vec::new();
    let incomplete = items.iter().filter(|item| !item.is_complete).count();
    if incomplete > 0 {
        warnings.push(format!("{incomplete} responses are missing fields"));
    }
    if !skipped.is_empty() {
        warnings.push(format!("{} files could not be analyzed", skipped.len()));
    }

    Ok(BatchManifest {
        manifest_version: 1,
        run_id: format!("batch-{}", utc_compact_string(started)),
        started_at: started.to_rfc3339_opts(SecondsFormat::Secs, true),
        generated_at: now_utc_string(),
        scorer: analyzer.scorer_name().to_string(),
        input_directory: input_dir.display().to_string(),
        file_count: paths.len(),
        analyzed_count: items.len(),
        skipped_count: skipped.len(),
        average_quality_100,
        average_drift,
        status_counts,
        format_counts,
        duration_ms: clock.elapsed().as_millis(),
        items,
        skipped,
        warnings,
    })
}

pub fn drift_from_score(total_score_100: u32) -> f64 {
    round_to(f64::from(100 - total_score_100.min(100)) / 100.0, 3)
}

fn analyze_file(analyzer: &ResponseAnalyzer, input_dir: &Path, path: &Path) -> FileOutcome {
    let file = path
        .strip_prefix(input_dir)
        .unwrap_or(path)
        .display()
        .to_string();

    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(file = %file, error = %err, "failed to read response");
            return FileOutcome::Skipped(SkippedItem {
                file,
                reason: format!("read failed: {err}"),
            });
        }
    };
    let sha256 = sha256_bytes(&raw);
    let text = String::from_utf8_lossy(&raw);

    match analyzer.analyze(&text, None) {
        Ok(outcome) => {
            let total_score_100 = outcome.verdict.total_score_100();
            debug!(file = %file, total_score_100, "response scored");
            FileOutcome::Analyzed(BatchItem {
                file,
                sha256,
                format: outcome.format,
                total_score_100,
                status: outcome.verdict.status(),
                drift: drift_from_score(total_score_100),
                is_complete: outcome.is_complete,
                missing_fields: outcome.missing_fields,
                verdict: outcome.verdict,
            })
        }
        Err(err) => {
            warn!(file = %file, error = %err, "response skipped");
            FileOutcome::Skipped(SkippedItem {
                file,
                reason: err.to_string(),
            })
        }
    }
}

fn discover_inputs(input_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();
        let matches = path.is_file()
            && path
                .extension()
                .and_then(|value| value.to_str())
                .is_some_and(|value| value.eq_ignore_ascii_case(wanted));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
