//! MyBatis mapper XML parsing and static dynamic-SQL flattening (§4.4).
//!
//! A parse error (malformed XML) degrades the file rather than aborting a
//! run: the caller gets `Ok(SqlExtractionOutput { sql_queries: vec![], .. })`
//! plus a `DegradationLog` entry, mirroring the rest of the pipeline's
//! "a bad file contributes nothing, not a hard failure" policy (§7).

pub mod dom;
pub mod extract;
pub mod resolver;

use ca_common::model::{MyBatisMeta, QueryType, SqlExtractionOutput, SqlQuery, SqlQueryMeta};
use ca_error::{DegradationKind, DegradationLog};
use dom::XmlNode;
use resolver::DynamicSqlResolver;
use std::path::Path;

pub use extract::{extract_columns, extract_tables};

const STATEMENT_TAGS: &[(&str, QueryType)] = &[
    ("select", QueryType::Select),
    ("insert", QueryType::Insert),
    ("update", QueryType::Update),
    ("delete", QueryType::Delete),
];

pub struct XmlMapperParser;

impl XmlMapperParser {
    pub fn new() -> Self {
        XmlMapperParser
    }

    /// Parses one mapper XML file's source. On a DOM parse failure, records a
    /// `Parse` degradation against `file` and returns an empty extraction
    /// rather than propagating the error — XML mappers are numerous and one
    /// malformed file shouldn't abort the rest of the run.
    pub fn parse(&self, file: &Path, source: &str, log: &mut DegradationLog) -> SqlExtractionOutput {
        let root = match dom::parse_document(source) {
            Ok(root) => root,
            Err(err) => {
                log.record(file.to_path_buf(), DegradationKind::Parse, err.to_string());
                return SqlExtractionOutput {
                    file: file.to_path_buf(),
                    sql_queries: Vec::new(),
                };
            }
        };

        let namespace = root.attr("namespace").unwrap_or_default().to_string();
        let resolver = DynamicSqlResolver::new(&root);

        let sql_queries = root
            .child_elements()
            .filter_map(|statement| build_query(statement, &namespace, &resolver))
            .collect();

        SqlExtractionOutput {
            file: file.to_path_buf(),
            sql_queries,
        }
    }
}

impl Default for XmlMapperParser {
    fn default() -> Self {
        Self::new()
    }
}

fn build_query(statement: &XmlNode, namespace: &str, resolver: &DynamicSqlResolver) -> Option<SqlQuery> {
    let (_, query_type) = STATEMENT_TAGS
        .iter()
        .find(|(tag, _)| *tag == statement.local_tag())?;
    let id = statement.attr("id")?.to_string();
    let sql = resolver.resolve(statement);

    Some(SqlQuery {
        id,
        query_type: *query_type,
        sql,
        meta: SqlQueryMeta::MyBatis(MyBatisMeta {
            namespace: namespace.to_string(),
            parameter_type: statement.attr("parameterType").map(str::to_string),
            result_type: statement.attr("resultType").map(str::to_string),
            resolved_dynamic: true,
        }),
    })
}
