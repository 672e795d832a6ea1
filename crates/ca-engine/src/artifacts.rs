//! Result artifacts written under `<target_project>/.applycrypto/results/`
//! (§6): one JSON file per pipeline stage, the headline being
//! `table_access_info.json`.

use ca_common::model::{
    CallRelation, Endpoint, ModificationContext, SourceFile, SqlExtractionOutput, TableAccessInfo,
};
use ca_error::{AnalysisError, AnalysisResult};
use serde::Serialize;
use std::path::Path;

/// `call_graph.json`'s shape: `{nodes, edges, endpoints, call_trees}` (§6).
#[derive(Debug, Serialize)]
pub struct CallGraphArtifact<'a> {
    pub nodes: Vec<&'a str>,
    pub edges: &'a [CallRelation],
    pub endpoints: &'a [Endpoint],
    pub call_trees: Vec<CallTreeEntry>,
}

#[derive(Debug, Serialize)]
pub struct CallTreeEntry {
    pub chain: Vec<String>,
    pub is_circular: bool,
}

pub fn write_all(
    results_dir: &Path,
    source_files: &[SourceFile],
    call_graph: &CallGraphArtifact,
    sql_extraction_results: &[SqlExtractionOutput],
    table_access_info: &[TableAccessInfo],
    modification_contexts: &[ModificationContext],
) -> AnalysisResult<()> {
    ca_common::stdfs::create_dir_all(results_dir)?;

    write_json(&results_dir.join("source_files.json"), source_files)?;
    write_json(&results_dir.join("call_graph.json"), call_graph)?;
    write_json(&results_dir.join("sql_extraction_results.json"), sql_extraction_results)?;
    write_json(&results_dir.join("table_access_info.json"), table_access_info)?;
    write_json(&results_dir.join("modification_contexts.json"), modification_contexts)?;

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AnalysisResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| AnalysisError::Parse {
        file: path.to_path_buf(),
        reason: source.to_string(),
    })?;
    ca_common::stdfs::write_atomic(path, &bytes)
}
