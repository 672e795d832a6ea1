//! Recursive, deterministic source-file discovery (§4.1).
//!
//! Filtering order mirrors the original collector precisely: directory
//! exclude, then hidden-file exclude, then extension whitelist, then glob
//! exclude — each stage short-circuits before the next runs, so a hidden
//! file under an excluded directory is never even extension-checked.

use ca_common::model::SourceFile;
use ca_config::Config;
use ca_error::{AnalysisError, AnalysisResult};
use glob::Pattern;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "target",
    "build",
    "out",
    "bin",
    ".idea",
    ".vscode",
    ".settings",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    ".gradle",
    ".mvn",
];

pub struct SourceFileCollector {
    project_path: PathBuf,
    source_file_types: Vec<String>,
    excluded_dirs: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    seen: RefCell<HashSet<PathBuf>>,
}

impl SourceFileCollector {
    pub fn new(config: &Config) -> AnalysisResult<Self> {
        let project_path = config.target_project.clone();
        if !project_path.is_dir() {
            return Err(AnalysisError::Io {
                path: project_path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "target_project is not an accessible directory",
                ),
            });
        }

        let mut excluded_dirs: HashSet<String> =
            DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect();
        excluded_dirs.extend(config.exclude_dirs.iter().cloned());

        let mut exclude_patterns = Vec::with_capacity(config.exclude_files.len());
        for raw in &config.exclude_files {
            match Pattern::new(raw) {
                Ok(pattern) => exclude_patterns.push(pattern),
                Err(err) => {
                    tracing::warn!("ignoring malformed exclude_files pattern {raw:?}: {err}");
                }
            }
        }

        Ok(SourceFileCollector {
            project_path,
            source_file_types: config.source_file_types.clone(),
            excluded_dirs,
            exclude_patterns,
            seen: RefCell::new(HashSet::new()),
        })
    }

    /// Number of distinct files yielded by `collect()` so far.
    pub fn collected_count(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn reset(&self) {
        self.seen.borrow_mut().clear();
    }

    pub fn collect(&self) -> impl Iterator<Item = SourceFile> + '_ {
        let excluded_dirs = &self.excluded_dirs;
        WalkDir::new(&self.project_path)
            .into_iter()
            .filter_entry(move |entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                if entry.depth() == 0 {
                    return true;
                }
                match entry.file_name().to_str() {
                    Some(name) => {
                        !excluded_dirs.contains(name) && !(name.starts_with('.') && name != ".")
                    }
                    None => true,
                }
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !is_hidden(entry.path()))
            .filter(|entry| self.should_collect(entry.path()))
            .filter_map(move |entry| {
                let canonical = canonicalize_or_absolute(entry.path());
                let mut seen = self.seen.borrow_mut();
                if seen.contains(&canonical) {
                    return None;
                }
                seen.insert(canonical.clone());
                drop(seen);
                extract_metadata(entry.path(), &canonical, &self.project_path)
            })
    }

    fn should_collect(&self, path: &Path) -> bool {
        if !self.exclude_patterns.is_empty() {
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let relative = path
                .strip_prefix(&self.project_path)
                .unwrap_or(path)
                .to_string_lossy();

            for pattern in &self.exclude_patterns {
                if pattern.matches(filename) || pattern.matches(&relative) {
                    return false;
                }
            }
        }

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
            .to_lowercase();

        self.source_file_types
            .iter()
            .any(|allowed| allowed.to_lowercase() == extension)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn canonicalize_or_absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

/// Permission errors reading file metadata are swallowed here (§4.1's
/// "permission errors cause that subtree to be skipped silently"), returning
/// `None` rather than propagating — the walk continues past this entry.
fn extract_metadata(
    original: &Path,
    canonical: &Path,
    project_path: &Path,
) -> Option<SourceFile> {
    let metadata = match std::fs::metadata(original) {
        Ok(metadata) => metadata,
        Err(_) => return None,
    };

    let relative_path = canonical
        .strip_prefix(project_path)
        .map(PathBuf::from)
        .unwrap_or_else(|_| canonical.to_path_buf());

    let filename = original
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let modified_time_millis = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0);

    Some(SourceFile {
        absolute_path: canonical.to_path_buf(),
        relative_path,
        filename,
        extension,
        size: metadata.len(),
        modified_time_millis,
        tags: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(dir: &Path, source_file_types: Vec<&str>) -> Config {
        let config_json = serde_json::json!({
            "schema_version": 2,
            "target_project": dir,
            "source_file_types": source_file_types,
            "framework_type": "spring_mvc",
            "sql_wrapping_type": "mybatis",
            "modification_type": "ControllerOrService",
            "access_tables": [{"table_name": "users", "columns": []}],
            "max_tokens_per_batch": 20000,
        });
        Config::from_json_str(&config_json.to_string()).unwrap()
    }

    #[test]
    fn collects_only_whitelisted_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let config = config_for(dir.path(), vec![".java"]);
        let collector = SourceFileCollector::new(&config).unwrap();
        let files: Vec<_> = collector.collect().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "A.java");
        assert_eq!(collector.collected_count(), 1);
    }

    #[test]
    fn skips_default_excluded_dirs_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("target/classes")).unwrap();
        fs::write(dir.path().join("target/classes/A.class.java"), "x").unwrap();
        fs::write(dir.path().join(".hidden.java"), "x").unwrap();
        fs::write(dir.path().join("B.java"), "class B {}").unwrap();

        let config = config_for(dir.path(), vec![".java"]);
        let collector = SourceFileCollector::new(&config).unwrap();
        let files: Vec<_> = collector.collect().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "B.java");
    }

    #[test]
    fn glob_exclude_matches_filename_or_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("test")).unwrap();
        fs::write(dir.path().join("test/ATest.java"), "x").unwrap();
        fs::write(dir.path().join("B.java"), "class B {}").unwrap();

        let mut config = config_for(dir.path(), vec![".java"]);
        config.exclude_files = vec!["test/**".to_string()];
        // glob::Pattern needs `**` to cross separators; rebuild collector.
        let collector = SourceFileCollector::new(&config).unwrap();
        let files: Vec<_> = collector.collect().collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "B.java");
    }
}
