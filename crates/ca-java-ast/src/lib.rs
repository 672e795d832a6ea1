//! Java source → structured class/method model (§4.3).
//!
//! Every file goes through `tree-sitter`/`tree-sitter-java` first; only a
//! parse timeout drops to the regex-based fallback in [`fallback`]. A
//! syntax-error tree (tree-sitter recovers and keeps going) is still walked
//! normally — partial, error-recovered output beats discarding a whole file
//! over one bad brace.

mod comments;
mod fallback;
mod treesitter;

pub use comments::strip_comments;

use ca_common::model::ClassInfo;
use ca_error::AnalysisResult;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Parsed(Vec<ClassInfo>),
    Degraded {
        classes: Vec<ClassInfo>,
        error: String,
    },
}

impl ParseOutcome {
    pub fn classes(&self) -> &[ClassInfo] {
        match self {
            ParseOutcome::Parsed(classes) => classes,
            ParseOutcome::Degraded { classes, .. } => classes,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ParseOutcome::Degraded { .. })
    }
}

pub struct JavaAstParser {
    timeout: Duration,
}

impl Default for JavaAstParser {
    fn default() -> Self {
        JavaAstParser {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl JavaAstParser {
    pub fn new(timeout: Duration) -> Self {
        JavaAstParser { timeout }
    }

    pub fn parse_file(&self, path: &Path) -> AnalysisResult<ParseOutcome> {
        let bytes = ca_common::stdfs::read(path)?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        Ok(self.parse_source(path, &source))
    }

    pub fn parse_source(&self, path: &Path, source: &str) -> ParseOutcome {
        match treesitter::parse_source(source, self.timeout) {
            Ok(tree) => ParseOutcome::Parsed(treesitter::extract_classes(&tree, source, path)),
            Err(treesitter::TimedOut) => {
                tracing::warn!("tree-sitter parse of {} timed out after {:?}", path.display(), self.timeout);
                let stripped = comments::strip_comments(source);
                let classes = fallback::parse_fallback(path, &stripped);
                ParseOutcome::Degraded {
                    classes,
                    error: format!("parse timed out after {:?}", self.timeout),
                }
            }
        }
    }
}

/// A record of every class seen in a tree, indexed by qualified name — the
/// shape `CallGraphBuilder` and `InheritGraphBuilder` both consume.
#[derive(Debug, Default)]
pub struct ParsedProject {
    pub file_to_classes: std::collections::BTreeMap<PathBuf, Vec<ClassInfo>>,
}

impl ParsedProject {
    pub fn insert(&mut self, path: PathBuf, classes: Vec<ClassInfo>) {
        self.file_to_classes.insert(path, classes);
    }

    pub fn all_classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.file_to_classes.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_class() {
        let parser = JavaAstParser::default();
        let outcome = parser.parse_source(
            Path::new("A.java"),
            "public class A { public void m() {} }",
        );
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.classes().len(), 1);
        assert_eq!(outcome.classes()[0].name, "A");
    }
}
