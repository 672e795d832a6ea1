//! Forward migration of older config documents to [`CURRENT_SCHEMA_VERSION`].
//!
//! Each step only ever fills in a default for a field introduced after that
//! version; it never rewrites a field that was already present, so a
//! document that is already current passes through untouched.

use crate::{RawConfig, CURRENT_SCHEMA_VERSION, DEFAULT_CONTEXT_FILE_TOKEN_BUDGET};
use ca_error::{AnalysisResult, ConfigError};

pub(crate) fn migrate(mut raw: RawConfig) -> AnalysisResult<RawConfig> {
    if raw.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(ConfigError::UnsupportedSchemaVersion {
            found: raw.schema_version,
            max: CURRENT_SCHEMA_VERSION,
        }
        .into());
    }

    if raw.schema_version < 2 {
        // v1 documents predate `context_file_token_budget`.
        if raw.context_file_token_budget.is_none() {
            raw.context_file_token_budget = Some(DEFAULT_CONTEXT_FILE_TOKEN_BUDGET);
        }
    }

    raw.schema_version = CURRENT_SCHEMA_VERSION;
    Ok(raw)
}
