//! Error taxonomy shared by every stage of the analysis pipeline.
//!
//! Mirrors §7 of the design: parser/analyzer errors are meant to stay local
//! to the record they degrade, while [`AnalysisError`] is the aggregate type
//! returned by crate boundaries that can genuinely abort a run (config
//! loading, cache corruption, output writes).

use std::fmt;
use std::path::PathBuf;

pub use ca_cancel::{Cancellable, CancellationToken, CancellationTokenSource, CancelledError};

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// The taxonomy from the design's error-handling section.
///
/// `Config` and `Io` on an output path are fatal; `Parse`, `Resolution`, and
/// `Budget` are recorded against the affected record and do not abort a run
/// on their own, but are still representable here so a caller that wants to
/// surface them (e.g. the CLI's degraded-file summary) can do so uniformly.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {file}: {reason}")]
    Parse { file: PathBuf, reason: String },

    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("{file} exceeds the token budget ({tokens} > {max_tokens})")]
    Budget {
        file: PathBuf,
        tokens: usize,
        max_tokens: usize,
    },

    #[error("cancelled")]
    Cancelled,
}

impl From<CancelledError> for AnalysisError {
    fn from(_: CancelledError) -> Self {
        AnalysisError::Cancelled
    }
}

/// Configuration load/validation failures. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown {field} value {value:?}; expected one of {expected:?}")]
    UnknownVariant {
        field: &'static str,
        value: String,
        expected: &'static [&'static str],
    },

    #[error("missing required config field: {0}")]
    MissingField(&'static str),

    #[error("invalid target_project path {0}: not a directory")]
    InvalidTargetProject(PathBuf),

    #[error(
        "config schema_version {found} is newer than the highest version this build understands ({max})"
    )]
    UnsupportedSchemaVersion { found: u32, max: u32 },
}

/// A marked, file-scoped degradation. Not an `Error` impl on its own — callers
/// collect these into a summary rather than propagating them, per §7's
/// "propagation policy stays local" rule.
#[derive(Debug, Clone)]
pub struct Degradation {
    pub file: PathBuf,
    pub kind: DegradationKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DegradationKind {
    Parse,
    Resolution,
    Budget,
}

impl fmt::Display for DegradationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DegradationKind::Parse => "parse",
            DegradationKind::Resolution => "resolution",
            DegradationKind::Budget => "budget",
        };
        f.write_str(s)
    }
}

/// Accumulates [`Degradation`]s across a run and renders the §7 "summary
/// listing degraded files grouped by error kind with counts" on demand.
#[derive(Debug, Default, Clone)]
pub struct DegradationLog {
    entries: Vec<Degradation>,
}

impl DegradationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: PathBuf, kind: DegradationKind, message: impl Into<String>) {
        self.entries.push(Degradation {
            file,
            kind,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[Degradation] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Count of entries per [`DegradationKind`], in a stable kind order.
    pub fn counts_by_kind(&self) -> Vec<(DegradationKind, usize)> {
        let kinds = [
            DegradationKind::Parse,
            DegradationKind::Resolution,
            DegradationKind::Budget,
        ];
        kinds
            .into_iter()
            .map(|kind| (kind, self.entries.iter().filter(|e| e.kind == kind).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Ratio of distinct degraded files over `total_files` — used by the CLI
    /// to decide on exit code 2 (§6) when a configured threshold is crossed.
    pub fn parse_failure_ratio(&self, total_files: usize) -> f64 {
        if total_files == 0 {
            return 0.0;
        }
        let degraded: std::collections::HashSet<&PathBuf> = self
            .entries
            .iter()
            .filter(|e| e.kind == DegradationKind::Parse)
            .map(|e| &e.file)
            .collect();
        degraded.len() as f64 / total_files as f64
    }
}

/// Extension trait for attaching file-path context to an I/O `Result`,
/// converting it into an [`AnalysisError::Io`].
pub trait ErrContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> AnalysisResult<T>;
}

impl<T> ErrContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> AnalysisResult<T> {
        self.map_err(|source| AnalysisError::Io {
            path: path.into(),
            source,
        })
    }
}
