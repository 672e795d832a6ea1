//! JDBC-template SQL extraction (§4.5): scans each method body for calls to
//! `JdbcTemplate`-shaped methods and recovers the SQL text passed as the
//! first argument, either an inline string-literal concatenation chain or a
//! previously-assigned local `String` variable.

use ca_common::model::{ClassInfo, MethodInfo, QueryType, SqlExtractionOutput, SqlQuery, SqlQueryMeta};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// Method names a `JdbcTemplate`/`NamedParameterJdbcTemplate`-style receiver
/// exposes that take a SQL string as (or near) their first argument. Matched
/// on the call's method name alone — §4.5 calls this "method name heuristics
/// plus argument-position", not a receiver-type check, since the receiver's
/// declared type isn't always resolvable from local context.
const JDBC_CALL_NAMES: &[&str] = &[
    "query",
    "queryForObject",
    "queryForList",
    "queryForMap",
    "queryForRowSet",
    "update",
    "batchUpdate",
    "execute",
];

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"String\s+(\w+)\s*=\s*((?:"(?:[^"\\]|\\.)*"\s*\+?\s*)+);"#).expect("valid regex")
    })
}

fn inline_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let names = JDBC_CALL_NAMES.join("|");
        Regex::new(&format!(
            r#"\.(?:{names})\s*\(\s*((?:"(?:[^"\\]|\\.)*"\s*\+\s*)*"(?:[^"\\]|\\.)*")"#
        ))
        .expect("valid regex")
    })
}

fn var_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let names = JDBC_CALL_NAMES.join("|");
        Regex::new(&format!(r#"\.(?:{names})\s*\(\s*([A-Za-z_]\w*)\s*[,)]"#)).expect("valid regex")
    })
}

fn literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid regex"))
}

fn keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE)\b").expect("valid regex"))
}

pub fn extract(file: &Path, source: &str, classes: &[ClassInfo]) -> SqlExtractionOutput {
    let lines: Vec<&str> = source.lines().collect();
    let mut sql_queries = Vec::new();
    for class in classes {
        collect_from_class(class, &lines, &mut sql_queries);
    }
    SqlExtractionOutput {
        file: file.to_path_buf(),
        sql_queries,
    }
}

fn collect_from_class(class: &ClassInfo, lines: &[&str], out: &mut Vec<SqlQuery>) {
    for method in &class.methods {
        if let Some(query) = extract_from_method(class, method, lines) {
            out.push(query);
        }
    }
    for inner in &class.inner_classes {
        collect_from_class(inner, lines, out);
    }
}

fn extract_from_method(class: &ClassInfo, method: &MethodInfo, lines: &[&str]) -> Option<SqlQuery> {
    let body = method_body_text(method, lines);

    let mut assigned = HashMap::new();
    for caps in assignment_pattern().captures_iter(&body) {
        let name = caps[1].to_string();
        let text = join_literals(&caps[2]);
        assigned.insert(name, text);
    }

    let sql = inline_call_pattern()
        .captures(&body)
        .map(|caps| join_literals(&caps[1]))
        .or_else(|| {
            var_call_pattern()
                .captures(&body)
                .and_then(|caps| assigned.get(&caps[1]).cloned())
        })?;

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

fn method_body_text(method: &MethodInfo, lines: &[&str]) -> String {
    let start = method.line_number.saturating_sub(1) as usize;
    let end = (method.end_line_number as usize).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

/// Joins a `"..." + "..." + "..."` chain's literal contents with a single
/// space, matching the original's textual concatenation (no attempt to
/// resolve non-literal operands in the chain).
fn join_literals(chain: &str) -> String {
    literal_pattern()
        .captures_iter(chain)
        .map(|caps| caps[1].replace("\\\"", "\"").replace("\\\\", "\\"))
        .collect::<Vec<_>>()
        .join(" ")
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use ca_java_ast::JavaAstParser;
    use std::path::PathBuf;
    use std::time::Duration;

    fn classes_for(source: &str) -> Vec<ClassInfo> {
        let parser = JavaAstParser::new(Duration::from_secs(5));
        parser
            .parse_source(&PathBuf::from("Dao.java"), source)
            .classes()
            .to_vec()
    }

    #[test]
    fn extracts_inline_concatenated_sql() {
        let source = indoc::indoc! {r#"
            public class UserDao {
                public User findById(Long id) {
                    return jdbcTemplate.queryForObject(
                        "SELECT id, name " + "FROM users WHERE id = ?",
                        rowMapper, id);
                }
            }
        "#};
        let classes = classes_for(source);
        let output = extract(&PathBuf::from("UserDao.java"), source, &classes);
        assert_eq!(output.sql_queries.len(), 1);
        let query = &output.sql_queries[0];
        assert_eq!(query.id, "UserDao.findById");
        assert_eq!(query.query_type, QueryType::Select);
        assert!(query.sql.contains("FROM users WHERE id = ?"));
    }

    #[test]
    fn resolves_sql_built_in_a_local_variable() {
        let source = indoc::indoc! {r#"
            public class UserDao {
                public void updateName(Long id, String name) {
                    String sql = "UPDATE users " + "SET name = ? WHERE id = ?";
                    jdbcTemplate.update(sql, name, id);
                }
            }
        "#};
        let classes = classes_for(source);
        let output = extract(&PathBuf::from("UserDao.java"), source, &classes);
        assert_eq!(output.sql_queries.len(), 1);
        assert_eq!(output.sql_queries[0].query_type, QueryType::Update);
        assert!(output.sql_queries[0].sql.contains("SET name = ? WHERE id = ?"));
    }

    #[test]
    fn methods_with_no_jdbc_call_yield_nothing() {
        let source = "public class Helper { public int add(int a, int b) { return a + b; } }";
        let classes = classes_for(source);
        let output = extract(&PathBuf::from("Helper.java"), source, &classes);
        assert!(output.sql_queries.is_empty());
    }
}
