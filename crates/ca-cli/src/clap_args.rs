//! Argument parsing: two subcommands, `analyze` (run the full pipeline) and
//! `clean` (drop the `.applycrypto` cache/results directory).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ca-cli",
    version = env!("CARGO_PKG_VERSION"),
    about = "Traces sensitive-column access through a Java/MyBatis/JDBC/JPA call graph and batches the affected files into LLM-sized modification contexts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit JSON-formatted log lines instead of human-readable text.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: ca_common::logging::LogFormat,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the collector/parser/call-graph/SQL/batcher pipeline and write
    /// result artifacts under `<target_project>/.applycrypto/results/`.
    Analyze(AnalyzeArgs),

    /// Remove the `.applycrypto` cache and results directories for a project.
    Clean(CleanArgs),
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the run's JSON config file (§6 Config shape).
    pub config: PathBuf,

    /// Abort with exit code 2 if the parse-failure ratio exceeds this
    /// fraction of collected files (§6's "exit code 2: parse-failure ratio
    /// above threshold (if configured)"). Unset means the check is skipped.
    #[arg(long)]
    pub max_parse_failure_ratio: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct CleanArgs {
    /// Path to the run's JSON config file, used only to locate
    /// `target_project`.
    pub config: PathBuf,
}
