//! Spring Data JPA `@Query` extraction (§4.5): one `SqlQuery` per annotated
//! repository method, keyed by the method's qualified name.

use ca_common::model::{ClassInfo, MethodInfo, QueryType, SqlExtractionOutput, SqlQuery, SqlQueryMeta};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn query_annotation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"@Query\s*\([^)]*?"((?:[^"\\]|\\.)*)""#).expect("valid regex"))
}

fn keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE)\b").expect("valid regex"))
}

pub fn extract(file: &Path, classes: &[ClassInfo]) -> SqlExtractionOutput {
    let mut sql_queries = Vec::new();
    for class in classes {
        collect_from_class(class, &mut sql_queries);
    }
    SqlExtractionOutput {
        file: file.to_path_buf(),
        sql_queries,
    }
}

fn collect_from_class(class: &ClassInfo, out: &mut Vec<SqlQuery>) {
    for method in &class.methods {
        if let Some(query) = extract_from_method(class, method) {
            out.push(query);
        }
    }
    for inner in &class.inner_classes {
        collect_from_class(inner, out);
    }
}

fn extract_from_method(class: &ClassInfo, method: &MethodInfo) -> Option<SqlQuery> {
    let annotation = method
        .annotations
        .iter()
        .find(|a| a.trim_start().starts_with("@Query"))?;
    let caps = query_annotation_pattern().captures(annotation)?;
    let sql = caps[1].replace("\\\"", "\"").replace("\\\\", "\\");
    if sql.trim().is_empty() {
        return None;
    }

    Some(SqlQuery {
        id: format!("{}.{}", class.name, method.name),
        query_type: query_type_of(&sql),
        sql,
        meta: SqlQueryMeta::Method {
            signature: format!("{}.{}", class.name, method.name),
        },
    })
}

/// JPQL/native `@Query` bodies default to `SELECT` when no keyword is
/// found — the vast majority of `@Query` usage is read-only finders.
fn query_type_of(sql: &str) -> QueryType {
    match keyword_pattern()
        .captures(sql)
        .map(|caps| caps[1].to_uppercase())
        .as_deref()
    {
        Some("INSERT") => QueryType::Insert,
        Some("UPDATE") => QueryType::Update,
        Some("DELETE") => QueryType::Delete,
        _ => QueryType::Select,
    }
}
