//! Table and column name extraction from flattened SQL text (§4.4). No
//! original-source file covers this exactly — it's implemented straight from
//! a fixed regex family, run against upper-cased,
//! whitespace-normalized SQL.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Words that `FROM`/`JOIN`/`INTO`/`UPDATE` clauses commonly precede without
/// actually naming a table (subquery keywords, common CTE-adjacent nouns).
const RESERVED_WORDS: &[&str] = &[
    "SELECT", "WHERE", "DUAL", "VALUES", "SET", "AS", "ON", "AND", "OR", "GROUP", "ORDER", "BY",
    "HAVING", "LIMIT", "UNION", "ALL", "DISTINCT", "INNER", "OUTER", "LEFT", "RIGHT", "JOIN",
    "FOR", "UPDATE",
];

fn table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:FROM|JOIN|INTO|UPDATE)\s+([A-Z_][A-Z0-9_]*(?:\s*,\s*[A-Z_][A-Z0-9_]*)*)")
            .expect("valid regex")
    })
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[#$]\{[^}]*\}").expect("valid regex"))
}

fn select_projection_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)SELECT\s+(.+?)\s+FROM").expect("valid regex")
    })
}

fn insert_columns_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"INSERT\s+INTO\s+[A-Z_][A-Z0-9_]*\s*\(([^)]+)\)").expect("valid regex")
    })
}

fn update_set_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\bSET\s+(.+?)(?:\bWHERE\b|$)").expect("valid regex"))
}

/// Upper-cases and collapses whitespace, matching the normalization the
/// table/column regex family assumes.
fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn extract_tables(sql: &str) -> BTreeSet<String> {
    let normalized = normalize(sql);
    let mut tables = BTreeSet::new();
    for caps in table_pattern().captures_iter(&normalized) {
        for name in caps[1].split(',') {
            let name = name.trim();
            if !name.is_empty() && !RESERVED_WORDS.contains(&name) {
                tables.insert(name.to_string());
            }
        }
    }
    tables
}

pub fn extract_columns(sql: &str) -> BTreeSet<String> {
    let normalized = normalize(sql);
    let stripped = placeholder_pattern().replace_all(&normalized, "?");
    let mut columns = BTreeSet::new();

    if let Some(caps) = select_projection_pattern().captures(&stripped) {
        columns.extend(split_projection(&caps[1]));
    }
    if let Some(caps) = insert_columns_pattern().captures(&stripped) {
        columns.extend(split_projection(&caps[1]));
    }
    if let Some(caps) = update_set_pattern().captures(&stripped) {
        for assignment in caps[1].split(',') {
            if let Some((lhs, _)) = assignment.split_once('=') {
                let name = lhs.trim();
                if !name.is_empty() {
                    columns.insert(name.to_string());
                }
            }
        }
    }
    columns
}

/// Splits a SELECT projection list or INSERT column list on top-level commas,
/// stripping `table.` qualifiers and `AS alias` suffixes, and dropping `*`.
fn split_projection(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|raw| {
            let item = raw.trim();
            if item.is_empty() || item == "*" {
                return None;
            }
            let without_alias = item
                .split_whitespace()
                .take_while(|w| *w != "AS")
                .collect::<Vec<_>>()
                .join(" ");
            let column = without_alias.rsplit('.').next().unwrap_or(&without_alias);
            let column = column.trim();
            if column.is_empty() || column == "?" {
                None
            } else {
                Some(column.to_string())
            }
        })
        .collect()
}
