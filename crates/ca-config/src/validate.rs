//! Structural checks that run after migration but before the raw string
//! fields are parsed into their typed enums (§6's config validation step).

use crate::RawConfig;
use ca_error::{AnalysisResult, ConfigError};

pub(crate) fn validate(raw: &RawConfig) -> AnalysisResult<()> {
    if raw.target_project.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("target_project").into());
    }
    if !raw.target_project.is_dir() {
        return Err(ConfigError::InvalidTargetProject(raw.target_project.clone()).into());
    }
    if raw.source_file_types.is_empty() {
        return Err(ConfigError::MissingField("source_file_types").into());
    }
    if raw.access_tables.is_empty() {
        return Err(ConfigError::MissingField("access_tables").into());
    }
    if raw.max_tokens_per_batch == 0 {
        return Err(ConfigError::MissingField("max_tokens_per_batch").into());
    }
    for table in &raw.access_tables {
        if table.table_name.trim().is_empty() {
            return Err(ConfigError::MissingField("access_tables[].table_name").into());
        }
    }
    Ok(())
}
