//! `ca-cli`'s library half: argument parsing plus the `analyze`/`clean`
//! subcommand bodies, kept separate from `main.rs` so integration tests can
//! drive [`run`] without spawning a process.

pub mod clap_args;

use ca_cancel::{CancellationToken, CancellationTokenSource};
use ca_config::Config;
use ca_error::{AnalysisError, ConfigError};
use clap_args::{AnalyzeArgs, Cli, CleanArgs, Commands};
use std::process::ExitCode;

/// §6: 0 success, 1 configuration/I/O error, 2 parse-failure ratio above a
/// configured threshold.
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_CONFIG_OR_IO_ERROR: u8 = 1;
pub const EXIT_PARSE_FAILURE_RATIO: u8 = 2;

pub fn run(cli: Cli) -> ExitCode {
    ca_common::logging::init(cli.log_format, cli.verbose);

    let cts = CancellationTokenSource::new();
    let token = cts.token();

    let result = match cli.command {
        Commands::Analyze(args) => analyze(&args, &token),
        Commands::Clean(args) => clean(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(EXIT_CONFIG_OR_IO_ERROR)
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<Config, AnalysisError> {
    Config::load(path).map_err(|err| match err {
        AnalysisError::Config(_) => err,
        other => AnalysisError::Config(ConfigError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::other(other.to_string()),
        }),
    })
}

fn analyze(args: &AnalyzeArgs, token: &CancellationToken) -> Result<u8, AnalysisError> {
    let config = load_config(&args.config)?;

    tracing::info!(target_project = %config.target_project.display(), "starting analysis");

    let report = ca_engine::run(&config, token).map_err(|err| match err {
        ca_engine::EngineError::Analysis(analysis_err) => analysis_err,
        other => AnalysisError::Io {
            path: config.results_dir(),
            source: std::io::Error::other(other.to_string()),
        },
    })?;

    tracing::info!(
        files = report.total_files,
        tables = report.table_access_info.len(),
        contexts = report.modification_contexts.len(),
        "analysis complete"
    );

    if !report.degradations.is_empty() {
        for (kind, count) in report.degradations.counts_by_kind() {
            tracing::warn!(kind = %kind, count, "degraded files");
        }
    }

    if let Some(threshold) = args.max_parse_failure_ratio {
        let ratio = report
            .degradations
            .parse_failure_ratio(report.total_files);
        if ratio > threshold {
            tracing::error!(ratio, threshold, "parse-failure ratio exceeds configured threshold");
            return Ok(EXIT_PARSE_FAILURE_RATIO);
        }
    }

    Ok(EXIT_SUCCESS)
}

fn clean(args: &CleanArgs) -> Result<u8, AnalysisError> {
    let config = load_config(&args.config)?;
    ca_common::stdfs::remove_dir_all(config.output_dir())?;
    tracing::info!(target_project = %config.target_project.display(), "cleaned .applycrypto");
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_config(dir: &std::path::Path) -> std::path::PathBuf {
        let config_path = dir.join("config.json");
        let config_json = serde_json::json!({
            "schema_version": 2,
            "target_project": dir,
            "source_file_types": [".java", ".xml"],
            "framework_type": "spring_mvc",
            "sql_wrapping_type": "mybatis",
            "modification_type": "ControllerOrService",
            "access_tables": [{"table_name": "users", "columns": []}],
            "max_tokens_per_batch": 20000,
        });
        fs::write(&config_path, config_json.to_string()).unwrap();
        config_path
    }

    #[test]
    fn analyze_runs_pipeline_and_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.java"), "public class A {}").unwrap();
        let config_path = sample_config(dir.path());

        let cts = CancellationTokenSource::new();
        let code = analyze(
            &AnalyzeArgs { config: config_path, max_parse_failure_ratio: None },
            &cts.token(),
        )
        .unwrap();
        assert_eq!(code, EXIT_SUCCESS);
        assert!(dir.path().join(".applycrypto/results/table_access_info.json").exists());
    }

    #[test]
    fn clean_removes_applycrypto_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = sample_config(dir.path());
        fs::create_dir_all(dir.path().join(".applycrypto/cache")).unwrap();
        fs::create_dir_all(dir.path().join(".applycrypto/results")).unwrap();

        let code = clean(&CleanArgs { config: config_path }).unwrap();
        assert_eq!(code, EXIT_SUCCESS);
        assert!(!dir.path().join(".applycrypto").exists());
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
