//! Joins extracted SQL against the call graph and configured target tables
//! (§4.7): for every target table actually touched, the union of files that
//! reach it, partitioned by layer, plus the call stack reaching each SQL
//! statement.

use ca_callgraph::CallChain;
use ca_common::model::{
    ColumnAccess, QueryCallStacks, QueryType, SourceFile, SqlExtractionOutput, SqlQuery, SqlQueryMeta,
    TableAccessInfo,
};
use ca_config::TableConfig;
use ca_xml_mapper::{extract_columns, extract_tables};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

/// `namespace`'s last dot segment is the Mapper-interface class name
/// (`com.mybatis.dao.EmployeeMapper` → `EmployeeMapper`).
fn mapper_class_of(namespace: &str) -> &str {
    namespace.rsplit('.').next().unwrap_or(namespace)
}

/// The layer a query's source file belongs to, so that file always lands in
/// `layer_files` alongside `access_files` (invariant: every `access_files`
/// path appears in exactly one `layer_files` entry). A MyBatis mapper XML
/// has no parsed Java node of its own, so it can't be classified by its
/// sink's `method_files` entry — it's paired with its Mapper interface and
/// belongs in the same Repository bucket. Any other extraction file (JDBC,
/// JPA) is the Java file that declares the sink, so it's classified the same
/// way as the sink's own class.
fn layer_for_sql_file(sql_file: &PathBuf, sink: &str) -> String {
    if sql_file.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml")) {
        ca_callgraph::LAYER_REPOSITORY.to_string()
    } else {
        let class_name = sink.rsplit_once('.').map(|(class, _)| class).unwrap_or(sink);
        ca_callgraph::classify_layer(class_name).to_string()
    }
}

struct RetainedQuery<'a> {
    table_name: String,
    query: &'a SqlQuery,
    sink: String,
    sql_file: PathBuf,
}

pub fn analyze(
    extractions: &[SqlExtractionOutput],
    chains: &[CallChain],
    method_files: &HashMap<String, PathBuf>,
    targets: &[TableConfig],
) -> Vec<TableAccessInfo> {
    let target_by_upper: HashMap<String, &TableConfig> =
        targets.iter().map(|t| (t.table_name.to_uppercase(), t)).collect();

    let mut retained: Vec<RetainedQuery> = Vec::new();
    let mut mybatis_dedup: HashSet<(PathBuf, String, String)> = HashSet::new();

    for extraction in extractions {
        for query in &extraction.sql_queries {
            let tables = extract_tables(&query.sql);
            let matched: Vec<&TableConfig> = tables
                .iter()
                .filter_map(|t| target_by_upper.get(t.as_str()).copied())
                .collect();
            if matched.is_empty() {
                continue;
            }

            let sink = match &query.meta {
                SqlQueryMeta::MyBatis(meta) => {
                    let mapper_class = mapper_class_of(&meta.namespace).to_string();
                    let key = (extraction.file.clone(), mapper_class.clone(), query.id.clone());
                    if !mybatis_dedup.insert(key) {
                        continue;
                    }
                    format!("{mapper_class}.{}", query.id)
                }
                SqlQueryMeta::Method { signature } => signature.clone(),
            };

            for table in matched {
                retained.push(RetainedQuery {
                    table_name: table.table_name.clone(),
                    query,
                    sink: sink.clone(),
                    sql_file: extraction.file.clone(),
                });
            }
        }
    }

    let mut by_table: BTreeMap<String, Vec<&RetainedQuery>> = BTreeMap::new();
    for retained_query in &retained {
        by_table.entry(retained_query.table_name.clone()).or_default().push(retained_query);
    }

    let mut out = Vec::new();
    for (table_name, queries) in by_table {
        let config = targets.iter().find(|t| t.table_name == table_name);
        out.push(build_table_access_info(&table_name, &queries, chains, method_files, config));
    }
    out
}

fn build_table_access_info(
    table_name: &str,
    queries: &[&RetainedQuery],
    chains: &[CallChain],
    method_files: &HashMap<String, PathBuf>,
    config: Option<&TableConfig>,
) -> TableAccessInfo {
    let mut access_files: BTreeSet<PathBuf> = BTreeSet::new();
    let mut layer_files: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut sql_queries = Vec::new();
    let mut discovered_columns: BTreeSet<String> = BTreeSet::new();
    let mut type_counts: HashMap<QueryType, usize> = HashMap::new();

    for retained in queries {
        access_files.insert(retained.sql_file.clone());
        let sql_file_layer = layer_for_sql_file(&retained.sql_file, &retained.sink);
        layer_files.entry(sql_file_layer).or_default().insert(retained.sql_file.clone());
        discovered_columns.extend(extract_columns(&retained.query.sql));
        *type_counts.entry(retained.query.query_type).or_default() += 1;

        let mut call_stacks: BTreeSet<Vec<String>> = BTreeSet::new();
        for chain in chains {
            let Some(sink_idx) = chain.chain.iter().position(|n| *n == retained.sink) else {
                continue;
            };
            let stack = chain.chain[..=sink_idx].to_vec();
            for (name, layer) in stack.iter().zip(chain.layers.iter()) {
                if let Some(file) = method_files.get(name) {
                    access_files.insert(file.clone());
                    layer_files.entry(layer.clone()).or_default().insert(file.clone());
                }
            }
            call_stacks.insert(stack);
        }

        if call_stacks.is_empty() {
            // §4.9: a sink no endpoint's DFS reaches is still kept as a
            // "headless" stack rooted at the sink itself, so the file still
            // surfaces in this table's layer partitions.
            let class_name = retained.sink.rsplit_once('.').map(|(class, _)| class).unwrap_or(&retained.sink);
            if let Some(file) = method_files.get(&retained.sink) {
                access_files.insert(file.clone());
                let layer = ca_callgraph::classify_layer(class_name).to_string();
                layer_files.entry(layer).or_default().insert(file.clone());
            }
            call_stacks.insert(vec![retained.sink.clone()]);
        }

        sql_queries.push(QueryCallStacks {
            id: retained.query.id.clone(),
            sql: retained.query.sql.clone(),
            query_type: retained.query.query_type,
            call_stacks: call_stacks.into_iter().collect(),
        });
    }

    let columns = merge_columns(config, &discovered_columns);
    let query_type = majority_query_type(&type_counts);
    let layer = dominant_layer(&layer_files);

    TableAccessInfo {
        table_name: table_name.to_string(),
        columns,
        access_files: access_files.into_iter().collect(),
        query_type,
        layer,
        layer_files: layer_files
            .into_iter()
            .map(|(layer, files)| (layer, files.into_iter().collect()))
            .collect(),
        sql_queries,
    }
}

fn merge_columns(config: Option<&TableConfig>, discovered: &BTreeSet<String>) -> Vec<ColumnAccess> {
    let mut out = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    if let Some(config) = config {
        for column in &config.columns {
            let upper = column.name.to_uppercase();
            seen.insert(upper);
            out.push(ColumnAccess {
                name: column.name.clone(),
                new_column: column.new_column.unwrap_or(false),
                crypto_code: column.crypto_code.clone(),
            });
        }
    }

    for discovered_column in discovered {
        if seen.insert(discovered_column.clone()) {
            out.push(ColumnAccess {
                name: discovered_column.clone(),
                new_column: true,
                crypto_code: None,
            });
        }
    }

    out
}

/// Majority vote with an INSERT > UPDATE > DELETE > SELECT tie-break (§4.7).
fn majority_query_type(counts: &HashMap<QueryType, usize>) -> QueryType {
    counts
        .iter()
        .max_by_key(|(query_type, count)| (**count, std::cmp::Reverse(query_type.tie_break_rank())))
        .map(|(query_type, _)| *query_type)
        .unwrap_or(QueryType::Select)
}

fn dominant_layer(layer_files: &BTreeMap<String, BTreeSet<PathBuf>>) -> String {
    layer_files
        .iter()
        .max_by_key(|(name, files)| (files.len(), std::cmp::Reverse((*name).clone())))
        .map(|(name, _)| name.clone())
        .unwrap_or_default()
}

/// Tags every `SourceFile` whose absolute path appears in any
/// `TableAccessInfo.access_files` with that table's name (§4.7 step 4).
pub fn tag_source_files(infos: &[TableAccessInfo], files: &mut [SourceFile]) {
    let mut tags_by_path: HashMap<&PathBuf, Vec<&str>> = HashMap::new();
    for info in infos {
        for path in &info.access_files {
            tags_by_path.entry(path).or_default().push(&info.table_name);
        }
    }
    for file in files {
        if let Some(tags) = tags_by_path.get(&file.absolute_path) {
            for tag in tags {
                file.tag(*tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_callgraph::CallChain;
    use ca_common::model::MyBatisMeta;
    use ca_config::ColumnConfig;

    fn chain(path: &[&str], layers: &[&str]) -> CallChain {
        CallChain {
            chain: path.iter().map(|s| s.to_string()).collect(),
            layers: layers.iter().map(|s| s.to_string()).collect(),
            is_circular: false,
        }
    }

    /// Property 4 (§8): the flattened union of `layer_files` must equal
    /// `access_files` as a set.
    fn assert_layer_files_closure(info: &TableAccessInfo) {
        let flattened: BTreeSet<&PathBuf> = info.layer_files.values().flatten().collect();
        let access: BTreeSet<&PathBuf> = info.access_files.iter().collect();
        assert_eq!(flattened, access, "layer_files union must equal access_files for table {}", info.table_name);
    }

    fn mybatis_query(id: &str, sql: &str, namespace: &str) -> SqlQuery {
        SqlQuery {
            id: id.to_string(),
            query_type: QueryType::Select,
            sql: sql.to_string(),
            meta: SqlQueryMeta::MyBatis(MyBatisMeta {
                namespace: namespace.to_string(),
                parameter_type: None,
                result_type: None,
                resolved_dynamic: false,
            }),
        }
    }

    #[test]
    fn joins_mybatis_query_to_call_stack_for_target_table() {
        let extractions = vec![SqlExtractionOutput {
            file: PathBuf::from("UserMapper.xml"),
            sql_queries: vec![mybatis_query(
                "findById",
                "SELECT id, name, email FROM users WHERE id = #{id}",
                "com.mybatis.dao.UserMapper",
            )],
        }];
        let chains = vec![chain(
            &["UserController.getUser", "UserService.findById", "UserMapper.findById"],
            &["Controller", "Service", "Repository"],
        )];
        let targets = vec![TableConfig {
            table_name: "users".into(),
            columns: vec![ColumnConfig { name: "email".into(), crypto_code: Some("AES256".into()), new_column: None }],
        }];
        let method_files: HashMap<String, PathBuf> = [
            ("UserController.getUser", "UserController.java"),
            ("UserService.findById", "UserService.java"),
            ("UserMapper.findById", "UserMapper.java"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), PathBuf::from(v)))
        .collect();

        let infos = analyze(&extractions, &chains, &method_files, &targets);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].table_name, "users");
        assert_eq!(infos[0].sql_queries[0].call_stacks, vec![vec![
            "UserController.getUser".to_string(),
            "UserService.findById".to_string(),
            "UserMapper.findById".to_string(),
        ]]);
        assert!(infos[0].columns.iter().any(|c| c.name == "email" && c.crypto_code.as_deref() == Some("AES256")));
        assert!(infos[0].columns.iter().any(|c| c.name == "ID" && c.new_column));
        assert_layer_files_closure(&infos[0]);
        assert!(infos[0].access_files.contains(&PathBuf::from("UserMapper.xml")));
        assert!(infos[0].layer_files.get("Repository").is_some_and(|files| files.contains(&PathBuf::from("UserMapper.xml"))));
    }

    #[test]
    fn queries_touching_no_target_table_are_discarded() {
        let extractions = vec![SqlExtractionOutput {
            file: PathBuf::from("OrderMapper.xml"),
            sql_queries: vec![mybatis_query("find", "SELECT id FROM orders", "OrderMapper")],
        }];
        let targets = vec![TableConfig { table_name: "users".into(), columns: vec![] }];
        assert!(analyze(&extractions, &[], &HashMap::new(), &targets).is_empty());
    }

    #[test]
    fn duplicate_mybatis_query_across_re_extracted_outputs_is_deduped() {
        let query = mybatis_query("find", "SELECT id FROM users", "UserMapper");
        let extractions = vec![
            SqlExtractionOutput { file: PathBuf::from("UserMapper.xml"), sql_queries: vec![query.clone()] },
            SqlExtractionOutput { file: PathBuf::from("UserMapper.xml"), sql_queries: vec![query] },
        ];
        let targets = vec![TableConfig { table_name: "users".into(), columns: vec![] }];
        let infos = analyze(&extractions, &[], &HashMap::new(), &targets);
        assert_eq!(infos[0].sql_queries.len(), 1);
    }

    #[test]
    fn jdbc_query_source_file_lands_in_its_sink_class_layer() {
        let query = SqlQuery {
            id: "UserDAO.findById".into(),
            query_type: QueryType::Select,
            sql: "SELECT id FROM users WHERE id = ?".into(),
            meta: SqlQueryMeta::Method { signature: "UserDAO.findById".into() },
        };
        let extractions = vec![SqlExtractionOutput { file: PathBuf::from("UserDAO.java"), sql_queries: vec![query] }];
        let targets = vec![TableConfig { table_name: "users".into(), columns: vec![] }];
        let method_files: HashMap<String, PathBuf> =
            [("UserDAO.findById", "UserDAO.java")].into_iter().map(|(k, v)| (k.to_string(), PathBuf::from(v))).collect();

        let infos = analyze(&extractions, &[], &method_files, &targets);
        assert_eq!(infos.len(), 1);
        assert!(infos[0].layer_files.get("Repository").is_some_and(|files| files.contains(&PathBuf::from("UserDAO.java"))));
        assert_layer_files_closure(&infos[0]);
    }

    #[test]
    fn majority_query_type_ties_break_toward_insert() {
        let mut counts = HashMap::new();
        counts.insert(QueryType::Select, 2);
        counts.insert(QueryType::Insert, 2);
        assert_eq!(majority_query_type(&counts), QueryType::Insert);
    }

    #[test]
    fn sink_unreached_by_any_endpoint_gets_a_headless_call_stack() {
        let extractions = vec![SqlExtractionOutput {
            file: PathBuf::from("UserMapper.xml"),
            sql_queries: vec![mybatis_query(
                "findById",
                "SELECT id FROM users WHERE id = #{id}",
                "com.mybatis.dao.UserMapper",
            )],
        }];
        let targets = vec![TableConfig { table_name: "users".into(), columns: vec![] }];
        let method_files: HashMap<String, PathBuf> =
            [("UserMapper.findById", "UserMapper.java")].into_iter().map(|(k, v)| (k.to_string(), PathBuf::from(v))).collect();

        // No call chains at all: the sink is never reached by a DFS from any endpoint.
        let infos = analyze(&extractions, &[], &method_files, &targets);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].sql_queries[0].call_stacks, vec![vec!["UserMapper.findById".to_string()]]);
        assert!(infos[0].access_files.contains(&PathBuf::from("UserMapper.java")));
        assert!(infos[0].access_files.contains(&PathBuf::from("UserMapper.xml")));
        assert!(infos[0].layer_files.get("Repository").is_some_and(|files| files.contains(&PathBuf::from("UserMapper.java"))));
        assert!(infos[0].layer_files.get("Repository").is_some_and(|files| files.contains(&PathBuf::from("UserMapper.xml"))));
        assert_layer_files_closure(&infos[0]);
    }

    #[test]
    fn tags_source_files_matching_access_files() {
        let info = TableAccessInfo {
            table_name: "users".into(),
            columns: vec![],
            access_files: vec![PathBuf::from("/p/User.java")],
            query_type: QueryType::Select,
            layer: "Controller".into(),
            layer_files: BTreeMap::new(),
            sql_queries: vec![],
        };
        let mut files = vec![SourceFile {
            absolute_path: PathBuf::from("/p/User.java"),
            relative_path: PathBuf::from("User.java"),
            filename: "User.java".into(),
            extension: ".java".into(),
            size: 1,
            modified_time_millis: 0,
            tags: BTreeSet::new(),
        }];
        tag_source_files(&[info], &mut files);
        assert!(files[0].tags.contains("users"));
    }
}
