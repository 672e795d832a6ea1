//! Parallel per-file parsing stage (§5): one `std::thread`-backed scoped pool
//! sized by `num_cpus::get()`, a cancellation check between files, and a
//! stable-sorted collection step so downstream stages are deterministic
//! regardless of which thread finished which file first.

use ca_cache::{CacheKey, CacheStore};
use ca_cancel::CancellationToken;
use ca_common::model::{ClassInfo, SourceFile, SqlExtractionOutput};
use ca_error::{DegradationKind, DegradationLog};
use ca_java_ast::{JavaAstParser, ParseOutcome};
use ca_sql_extract::SqlWrappingStrategy;
use ca_xml_mapper::XmlMapperParser;

/// Bumped whenever `ClassInfo`'s shape or the tree-sitter walk changes in a
/// way that would make a cached pre-bump entry misleading.
const JAVA_AST_SCHEMA_VERSION: u32 = 1;

/// Bumped whenever `SqlExtractionOutput`'s shape changes. The configured
/// `sql_wrapping_type` is folded into the low digit so switching strategies
/// between runs against the same project tree can never serve a stale
/// extraction produced by a different strategy (§3's "changed parser version
/// invalidates the whole cache", applied per-strategy rather than globally
/// since strategy is itself a config axis, not a parser bump).
const SQL_EXTRACT_SCHEMA_BASE: u32 = 10;

fn sql_schema_version(strategy: SqlWrappingStrategy) -> u32 {
    let discriminant = match strategy {
        SqlWrappingStrategy::MyBatis => 1,
        SqlWrappingStrategy::Jdbc => 2,
        SqlWrappingStrategy::Jpa => 3,
    };
    SQL_EXTRACT_SCHEMA_BASE + discriminant
}

pub struct FileOutcome {
    pub file: SourceFile,
    pub classes: Vec<ClassInfo>,
    pub sql: SqlExtractionOutput,
}

pub struct ParseResults {
    pub outcomes: Vec<FileOutcome>,
    pub degradations: DegradationLog,
}

/// Parses and extracts SQL from every collected file, splitting the work
/// across `num_cpus::get()` threads. In-flight files are allowed to finish
/// once cancellation is observed (§5's "in-flight file parsing is allowed to
/// complete"); files not yet started are skipped and nothing is cached for
/// them.
pub fn parse_project(
    mut files: Vec<SourceFile>,
    parser: &JavaAstParser,
    xml_parser: &XmlMapperParser,
    sql_strategy: SqlWrappingStrategy,
    cache: &CacheStore,
    token: &CancellationToken,
) -> ParseResults {
    files.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));

    let thread_count = num_cpus::get().max(1).min(files.len().max(1));
    let chunk_size = files.len().div_ceil(thread_count).max(1);
    let chunks: Vec<Vec<SourceFile>> = files
        .chunks(chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    let mut per_chunk_outcomes: Vec<Vec<FileOutcome>> = Vec::with_capacity(chunks.len());
    let mut per_chunk_logs: Vec<DegradationLog> = Vec::with_capacity(chunks.len());

    std::thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move || {
                    process_chunk(chunk, parser, xml_parser, sql_strategy, cache, token)
                })
            })
            .collect();

        for handle in handles {
            let (outcomes, log) = handle.join().unwrap_or_else(|_| (Vec::new(), DegradationLog::new()));
            per_chunk_outcomes.push(outcomes);
            per_chunk_logs.push(log);
        }
    });

    let mut outcomes: Vec<FileOutcome> = per_chunk_outcomes.into_iter().flatten().collect();
    outcomes.sort_by(|a, b| a.file.absolute_path.cmp(&b.file.absolute_path));

    let mut degradations = DegradationLog::new();
    for log in per_chunk_logs {
        for entry in log.entries() {
            degradations.record(entry.file.clone(), entry.kind, entry.message.clone());
        }
    }

    ParseResults { outcomes, degradations }
}

fn process_chunk(
    chunk: Vec<SourceFile>,
    parser: &JavaAstParser,
    xml_parser: &XmlMapperParser,
    sql_strategy: SqlWrappingStrategy,
    cache: &CacheStore,
    token: &CancellationToken,
) -> (Vec<FileOutcome>, DegradationLog) {
    let mut outcomes = Vec::with_capacity(chunk.len());
    let mut log = DegradationLog::new();

    for file in chunk {
        if token.is_cancelled() {
            break;
        }
        if let Some(outcome) = process_one(file, parser, xml_parser, sql_strategy, cache, &mut log) {
            outcomes.push(outcome);
        }
    }

    (outcomes, log)
}

fn process_one(
    file: SourceFile,
    parser: &JavaAstParser,
    xml_parser: &XmlMapperParser,
    sql_strategy: SqlWrappingStrategy,
    cache: &CacheStore,
    log: &mut DegradationLog,
) -> Option<FileOutcome> {
    let bytes = match ca_common::stdfs::read(&file.absolute_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log.record(file.absolute_path.clone(), DegradationKind::Parse, err.to_string());
            return None;
        }
    };
    let source = String::from_utf8_lossy(&bytes).into_owned();

    let is_java = file.extension.eq_ignore_ascii_case(".java");

    let classes = if is_java {
        let key = CacheKey::new(&bytes, JAVA_AST_SCHEMA_VERSION);
        if let Ok(Some(cached)) = cache.get::<Vec<ClassInfo>>(&key) {
            cached
        } else {
            let outcome = parser.parse_source(&file.absolute_path, &source);
            if let ParseOutcome::Degraded { error, .. } = &outcome {
                log.record(file.absolute_path.clone(), DegradationKind::Parse, error.clone());
            }
            let classes = outcome.classes().to_vec();
            let _ = cache.put(&key, &classes);
            classes
        }
    } else {
        Vec::new()
    };

    let sql_key = CacheKey::new(&bytes, sql_schema_version(sql_strategy));
    let sql = if let Ok(Some(cached)) = cache.get::<SqlExtractionOutput>(&sql_key) {
        cached
    } else {
        let output = sql_strategy.extract(&file.absolute_path, &source, &classes, xml_parser, log);
        let _ = cache.put(&sql_key, &output);
        output
    };

    Some(FileOutcome { file, classes, sql })
}

/// Flattens parsed outcomes into the shapes downstream stages need: the
/// stable-sorted file list, the full class list (for the call graph), and
/// the per-file SQL extraction outputs.
pub fn split_outcomes(
    outcomes: Vec<FileOutcome>,
) -> (Vec<SourceFile>, Vec<ClassInfo>, Vec<SqlExtractionOutput>) {
    let mut files = Vec::with_capacity(outcomes.len());
    let mut classes = Vec::new();
    let mut sql_outputs = Vec::new();

    for outcome in outcomes {
        classes.extend(outcome.classes);
        if !outcome.sql.sql_queries.is_empty() {
            sql_outputs.push(outcome.sql);
        }
        files.push(outcome.file);
    }

    (files, classes, sql_outputs)
}
