use anyhow::{Context, Result};
use tracing::info;

use crate::cli::AnalyzeArgs;
use crate::commands::Engine;
use crate::util::{print_json_pretty, read_input, write_json_pretty};

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let text = read_input(&args.input)?;
    let engine = Engine::from_args(&args.engine);
    let analyzer = engine.analyzer()?;
    let hint = args.expect_format.as_deref();

    let outcome = if args.strict {
        analyzer.analyze_strict(&text, hint)
    } else {
        analyzer.analyze(&text, hint)
    }
    .with_context(|| format!("failed to analyze {}", args.input.display()))?;

    match args.output {
        Some(path) => {
            write_json_pretty(&path, &outcome)?;
            info!(path = %path.display(), "wrote analysis report");
        }
        None => print_json_pretty(&outcome)?,
    }

    info!(
        scorer = analyzer.scorer_name(),
        format = %outcome.format,
        total_score_100 = outcome.verdict.total_score_100(),
        status = %outcome.verdict.status(),
        "analysis completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::cli::EngineArgs;
    use crate::scorer::ScorerMode;
    use crate::semantic::{DEFAULT_BACKEND, DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_ID};

    fn engine_args(scorer: ScorerMode) -> EngineArgs {
        EngineArgs {
            scorer,
            definitions_root: None,
            language: "de".to_string(),
            embedding_model: DEFAULT_MODEL_ID.to_string(),
            embedding_backend: DEFAULT_BACKEND.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            similarity_timeout_ms: 0,
        }
    }

    fn args(input: PathBuf, output: PathBuf, strict: bool) -> AnalyzeArgs {
        AnalyzeArgs {
            input,
            expect_format: Some("human".to_string()),
            strict,
            output: Some(output),
            engine: engine_args(ScorerMode::Legacy),
        }
    }

    #[test]
    fn writes_report_for_complete_response() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("response.txt");
        let output = dir.path().join("reports").join("response.json");
        fs::write(
            &input,
            "1. DRIFT: steigt\n2. HINTERGRUND-MUSTER: stabil\n3. DRUCKFAKTOREN: gering\n4. TIEFE: mittel\n5. WIRKUNG: spürbar\n6. KLARTEXT: klar",
        )
        .expect("write");

        run(args(input, output.clone(), true)).expect("analysis succeeds");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).expect("report written"))
                .expect("valid json");
        assert_eq!(value["scorer"], "legacy");
        assert_eq!(value["format"], "HUMAN");
        assert_eq!(value["is_complete"], true);
        assert_eq!(value["total_score"], 98);
    }

    #[test]
    fn strict_mode_rejects_incomplete_response() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("response.txt");
        let output = dir.path().join("response.json");
        fs::write(&input, "1. DRIFT: steigt").expect("write");

        let error = run(args(input, output.clone(), true)).expect_err("missing fields");
        assert!(format!("{error:#}").contains("missing required HUMAN fields"));
        assert!(!output.exists());
    }

    #[test]
    fn empty_response_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("empty.txt");
        fs::write(&input, "\n").expect("write");

        let error = run(args(input, dir.path().join("out.json"), false)).expect_err("empty");
        assert!(format!("{error:#}").contains("parse error"));
    }
}
