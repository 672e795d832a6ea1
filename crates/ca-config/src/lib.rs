//! Typed configuration for one analysis run (§6 "Config").
//!
//! Config is loaded from a JSON file on disk. Older config files (identified
//! by a lower `schema_version`) are forward-migrated to the current shape
//! before validation, tolerating version skew in on-disk manifests without a
//! separate loader crate, since config is this pipeline's only versioned
//! input format.

mod migrate;
mod validate;

use ca_error::{AnalysisResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The schema version this build understands. Bumped whenever a field is
/// added, renamed, or removed in a way [`migrate::migrate`] needs to handle.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameworkType {
    #[serde(rename = "spring_mvc")]
    SpringMvc,
    /// Declared per §4.6 ("other framework strategies are declared but out
    /// of scope... beyond the plug-in shape") — accepted at config-load time
    /// so callers can wire their own endpoint/layer strategy in, but
    /// `CallGraphBuilder` has no built-in detector for it.
    #[serde(rename = "anyframe_jdbc")]
    AnyframeJdbc,
    #[serde(rename = "anyframe_banka")]
    AnyframeBanka,
}

impl FrameworkType {
    const VARIANTS: &'static [&'static str] = &["spring_mvc", "anyframe_jdbc", "anyframe_banka"];

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "spring_mvc" => Ok(FrameworkType::SpringMvc),
            "anyframe_jdbc" => Ok(FrameworkType::AnyframeJdbc),
            "anyframe_banka" => Ok(FrameworkType::AnyframeBanka),
            other => Err(ConfigError::UnknownVariant {
                field: "framework_type",
                value: other.to_string(),
                expected: Self::VARIANTS,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlWrappingType {
    #[serde(rename = "mybatis")]
    MyBatis,
    #[serde(rename = "jdbc")]
    Jdbc,
    #[serde(rename = "jpa")]
    Jpa,
    #[serde(rename = "mybatis_ccs")]
    MyBatisCcs,
    #[serde(rename = "mybatis_ccs_batch")]
    MyBatisCcsBatch,
}

impl SqlWrappingType {
    const VARIANTS: &'static [&'static str] = &[
        "mybatis",
        "jdbc",
        "jpa",
        "mybatis_ccs",
        "mybatis_ccs_batch",
    ];

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "mybatis" => Ok(SqlWrappingType::MyBatis),
            "jdbc" => Ok(SqlWrappingType::Jdbc),
            "jpa" => Ok(SqlWrappingType::Jpa),
            "mybatis_ccs" => Ok(SqlWrappingType::MyBatisCcs),
            "mybatis_ccs_batch" => Ok(SqlWrappingType::MyBatisCcsBatch),
            other => Err(ConfigError::UnknownVariant {
                field: "sql_wrapping_type",
                value: other.to_string(),
                expected: Self::VARIANTS,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationType {
    ControllerOrService,
    ServiceImplOrBiz,
    TypeHandler,
}

impl ModificationType {
    const VARIANTS: &'static [&'static str] = &[
        "ControllerOrService",
        "ServiceImplOrBiz",
        "TypeHandler",
    ];

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "ControllerOrService" => Ok(ModificationType::ControllerOrService),
            "ServiceImplOrBiz" => Ok(ModificationType::ServiceImplOrBiz),
            "TypeHandler" => Ok(ModificationType::TypeHandler),
            other => Err(ConfigError::UnknownVariant {
                field: "modification_type",
                value: other.to_string(),
                expected: Self::VARIANTS,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(default)]
    pub crypto_code: Option<String>,
    #[serde(default)]
    pub new_column: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// The as-parsed-from-JSON shape, permissive on string fields so
/// [`migrate::migrate`] and [`validate`] can report precise errors instead of
/// serde rejecting the whole document on the first bad enum variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub schema_version: u32,
    pub target_project: PathBuf,
    pub source_file_types: Vec<String>,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub exclude_files: Vec<String>,
    pub framework_type: String,
    pub sql_wrapping_type: String,
    pub modification_type: String,
    pub access_tables: Vec<TableConfig>,
    pub max_tokens_per_batch: usize,
    #[serde(default)]
    pub llm_provider: Option<LlmProviderConfig>,
    /// Introduced at schema_version 2; absent in v1 documents, filled in by
    /// [`migrate::migrate`].
    #[serde(default)]
    pub context_file_token_budget: Option<usize>,
}

/// Validated, fully-typed configuration — the shape every downstream crate
/// consumes.
#[derive(Debug, Clone)]
pub struct Config {
    pub target_project: PathBuf,
    pub source_file_types: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub framework_type: FrameworkType,
    pub sql_wrapping_type: SqlWrappingType,
    pub modification_type: ModificationType,
    pub access_tables: Vec<TableConfig>,
    pub max_tokens_per_batch: usize,
    pub llm_provider: Option<LlmProviderConfig>,
    /// Secondary budget for `context_files` (§4.8's "e.g. 80k tokens").
    pub context_file_token_budget: usize,
}

const DEFAULT_CONTEXT_FILE_TOKEN_BUDGET: usize = 80_000;

impl Config {
    pub fn from_json_str(contents: &str) -> AnalysisResult<Self> {
        let raw: RawConfig = serde_json::from_str(contents)
            .map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<string>"),
                source,
            })?;
        Self::from_raw(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let contents = ca_common::stdfs::read_to_string(path)?;
        let raw: RawConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> AnalysisResult<Self> {
        let raw = migrate::migrate(raw)?;
        validate::validate(&raw)?;

        Ok(Config {
            framework_type: FrameworkType::parse(&raw.framework_type)?,
            sql_wrapping_type: SqlWrappingType::parse(&raw.sql_wrapping_type)?,
            modification_type: ModificationType::parse(&raw.modification_type)?,
            target_project: raw.target_project,
            source_file_types: raw.source_file_types,
            exclude_dirs: raw.exclude_dirs,
            exclude_files: raw.exclude_files,
            access_tables: raw.access_tables,
            max_tokens_per_batch: raw.max_tokens_per_batch,
            llm_provider: raw.llm_provider,
            context_file_token_budget: raw
                .context_file_token_budget
                .unwrap_or(DEFAULT_CONTEXT_FILE_TOKEN_BUDGET),
        })
    }

    /// Directory holding cache + result artifacts (§6).
    pub fn output_dir(&self) -> PathBuf {
        self.target_project.join(".applycrypto")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.output_dir().join("cache")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.output_dir().join("results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn sample(target_project: &std::path::Path, schema_version: &str) -> String {
        format!(
            indoc! {r#"
            {{
              {schema_version}
              "target_project": {target_project},
              "source_file_types": [".java", ".xml"],
              "framework_type": "spring_mvc",
              "sql_wrapping_type": "mybatis",
              "modification_type": "ControllerOrService",
              "access_tables": [
                {{"table_name": "users", "columns": [{{"name": "email"}}]}}
              ],
              "max_tokens_per_batch": 20000
            }}
            "#},
            schema_version = schema_version,
            target_project = serde_json::to_string(target_project).unwrap(),
        )
    }

    #[test]
    fn loads_current_schema() {
        let dir = tempfile::tempdir().unwrap();
        let json = sample(dir.path(), r#""schema_version": 2,"#);
        let config = Config::from_json_str(&json).unwrap();
        assert_eq!(config.framework_type, FrameworkType::SpringMvc);
        assert_eq!(config.context_file_token_budget, DEFAULT_CONTEXT_FILE_TOKEN_BUDGET);
        assert_eq!(config.access_tables.len(), 1);
    }

    #[test]
    fn migrates_unversioned_document() {
        // No schema_version at all: defaults to 0, must be migrated forward.
        let dir = tempfile::tempdir().unwrap();
        let json = sample(dir.path(), "");
        let config = Config::from_json_str(&json).unwrap();
        assert_eq!(config.max_tokens_per_batch, 20000);
    }

    #[test]
    fn unknown_framework_type_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let json = sample(dir.path(), "").replace("spring_mvc", "struts2");
        let err = Config::from_json_str(&json).unwrap_err();
        match err {
            ca_error::AnalysisError::Config(ConfigError::UnknownVariant { field, .. }) => {
                assert_eq!(field, "framework_type");
            }
            other => panic!("expected UnknownVariant config error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_schema_version_from_the_future() {
        let dir = tempfile::tempdir().unwrap();
        let json = sample(dir.path(), r#""schema_version": 99,"#);
        let err = Config::from_json_str(&json).unwrap_err();
        assert!(matches!(
            err,
            ca_error::AnalysisError::Config(ConfigError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn missing_target_project_is_config_error() {
        let json = sample(std::path::Path::new("/nonexistent/project/path"), "");
        let err = Config::from_json_str(&json).unwrap_err();
        assert!(matches!(
            err,
            ca_error::AnalysisError::Config(ConfigError::InvalidTargetProject(_))
        ));
    }
}
