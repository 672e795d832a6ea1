//! Pipeline wiring (§2's data-flow diagram, §5's concurrency model): ties
//! `SourceFileCollector` → `{JavaAstParser, XmlMapperParser, SqlExtractor}` →
//! `CallGraphBuilder` → `TableAccessAnalyzer` → `ContextBatcher` into one
//! [`run`] entry point, backed by a scoped worker pool for the
//! independent-per-file parsing stage and a single-writer `CacheStore`.

pub mod artifacts;
mod error;
mod worker;

pub use error::{EngineError, EngineResult};

use ca_cache::CacheStore;
use ca_callgraph::CallGraphBuilder;
use ca_cancel::CancellationToken;
use ca_collector::SourceFileCollector;
use ca_common::model::{ModificationContext, SourceFile, SqlExtractionOutput, TableAccessInfo};
use ca_config::Config;
use ca_context_batch::{ContextBatcher, HeuristicTokenCounter, PromptCostModel};
use ca_error::DegradationLog;
use ca_java_ast::JavaAstParser;
use ca_sql_extract::SqlWrappingStrategy;
use ca_xml_mapper::XmlMapperParser;
use std::time::Duration;

/// §4.3/§5: a file whose parse runs past this is treated as a parse failure,
/// not awaited indefinitely.
const PER_FILE_PARSE_TIMEOUT: Duration = Duration::from_secs(30);

static TOKEN_COUNTER: HeuristicTokenCounter = HeuristicTokenCounter;

/// Everything one `analyze` invocation produces — the in-memory mirror of
/// the JSON artifacts written under `.applycrypto/results/` (§6), plus the
/// degradation log the CLI uses to decide its exit code (§6's exit code 2).
pub struct PipelineReport {
    pub source_files: Vec<SourceFile>,
    pub sql_extraction_results: Vec<SqlExtractionOutput>,
    pub table_access_info: Vec<TableAccessInfo>,
    pub modification_contexts: Vec<ModificationContext>,
    pub degradations: DegradationLog,
    pub total_files: usize,
}

/// Runs the full pipeline against `config.target_project` and persists the
/// result artifacts. `token` is checked between the parallel parsing stage
/// and each subsequent single-threaded stage (§5); a cancellation observed
/// mid-run discards whatever this invocation produced rather than writing
/// partial artifacts.
pub fn run(config: &Config, token: &CancellationToken) -> EngineResult<PipelineReport> {
    let collector = SourceFileCollector::new(config)?;
    let files: Vec<SourceFile> = collector.collect().collect();
    let total_files = files.len();

    let cache = CacheStore::new(config.cache_dir());
    let java_parser = JavaAstParser::new(PER_FILE_PARSE_TIMEOUT);
    let xml_parser = XmlMapperParser::new();
    let sql_strategy = SqlWrappingStrategy::from_config(config.sql_wrapping_type);

    let worker::ParseResults { outcomes, degradations } =
        worker::parse_project(files, &java_parser, &xml_parser, sql_strategy, &cache, token);

    token.check_cancellation()?;

    let (mut source_files, classes, sql_extraction_results) = worker::split_outcomes(outcomes);

    let graph = CallGraphBuilder::new(classes.clone()).build();
    let chains = graph.build_call_chains();

    token.check_cancellation()?;

    let table_access_info = ca_table_access::analyze(
        &sql_extraction_results,
        &chains,
        &graph.method_files,
        &config.access_tables,
    );
    ca_table_access::tag_source_files(&table_access_info, &mut source_files);

    token.check_cancellation()?;

    let cost_model = PromptCostModel::new(&TOKEN_COUNTER, "");
    let batcher = ContextBatcher::new(config, &classes, cost_model);
    let mut modification_contexts = Vec::new();
    for info in &table_access_info {
        let contexts = batcher.generate(info, |path| ca_common::stdfs::read_to_string(path).ok());
        modification_contexts.extend(contexts);
    }

    let node_names: Vec<&str> = graph.method_files.keys().map(String::as_str).collect();
    let call_graph_artifact = artifacts::CallGraphArtifact {
        nodes: node_names,
        edges: &graph.relations,
        endpoints: graph.get_endpoints(),
        call_trees: chains
            .iter()
            .map(|chain| artifacts::CallTreeEntry {
                chain: chain.chain.clone(),
                is_circular: chain.is_circular,
            })
            .collect(),
    };

    artifacts::write_all(
        &config.results_dir(),
        &source_files,
        &call_graph_artifact,
        &sql_extraction_results,
        &table_access_info,
        &modification_contexts,
    )?;

    Ok(PipelineReport {
        source_files,
        sql_extraction_results,
        table_access_info,
        modification_contexts,
        degradations,
        total_files,
    })
}
