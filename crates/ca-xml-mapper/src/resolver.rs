//! Static flattening of MyBatis dynamic-SQL tags (§4.4). Ported rule for
//! rule from the original resolver: this never evaluates `<if>` conditions
//! — it takes the superset of tokens a statement could produce — and always
//! takes the first `<when>` (or `<otherwise>`) of a `<choose>`.

use crate::dom::XmlNode;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

pub struct DynamicSqlResolver<'a> {
    sql_fragments: BTreeMap<String, &'a XmlNode>,
}

impl<'a> DynamicSqlResolver<'a> {
    /// Indexes every `<sql id="...">` fragment reachable from `root`,
    /// anywhere in the document (not just direct children) — mirrors the
    /// original's `root.iter()` full-document scan.
    pub fn new(root: &'a XmlNode) -> Self {
        let mut sql_fragments = BTreeMap::new();
        for node in root.descendants() {
            if node.local_tag() == "sql" {
                if let Some(id) = node.attr("id") {
                    sql_fragments.insert(id.to_string(), node);
                }
            }
        }
        DynamicSqlResolver { sql_fragments }
    }

    pub fn resolve(&self, statement: &XmlNode) -> String {
        let mut active_includes = HashSet::new();
        let flattened = self.process_element(statement, &mut active_includes);
        collapse_whitespace(&flattened)
    }

    fn process_element(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        let mut parts = String::new();
        for child in &element.children {
            match child {
                crate::dom::XmlChild::Text(text) => parts.push_str(text),
                crate::dom::XmlChild::Element(el) => {
                    parts.push_str(&self.process_child(el, active_includes))
                }
            }
        }
        parts
    }

    fn process_child(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        match element.local_tag() {
            "include" => self.process_include(element, active_includes),
            "if" => self.process_element(element, active_includes),
            "choose" => self.process_choose(element, active_includes),
            "foreach" => self.process_foreach(element, active_includes),
            "where" => self.process_where(element, active_includes),
            "set" => self.process_set(element, active_includes),
            "trim" => self.process_trim(element, active_includes),
            _ => self.process_element(element, active_includes),
        }
    }

    fn process_include(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        let Some(refid) = element.attr("refid") else {
            return String::new();
        };
        let Some(fragment) = self.sql_fragments.get(refid) else {
            return format!(" /* MISSING INCLUDE: {refid} */ ");
        };
        if active_includes.contains(refid) {
            tracing::warn!("circular <include refid=\"{refid}\"> detected, skipping");
            return String::new();
        }
        active_includes.insert(refid.to_string());
        let resolved = self.process_element(fragment, active_includes);
        active_includes.remove(refid);
        resolved
    }

    fn process_choose(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        if let Some(when) = element.child_elements().find(|c| c.local_tag() == "when") {
            return self.process_element(when, active_includes);
        }
        if let Some(otherwise) = element.child_elements().find(|c| c.local_tag() == "otherwise") {
            return self.process_element(otherwise, active_includes);
        }
        String::new()
    }

    fn process_foreach(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        let open = element.attr("open").unwrap_or("");
        let close = element.attr("close").unwrap_or("");
        let body = self.process_element(element, active_includes);
        format!(" {open} {body} {close} ")
    }

    fn process_where(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        let content = self.process_element(element, active_includes);
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let cleaned = leading_and_or().replace(trimmed, "");
        format!(" WHERE {cleaned} ")
    }

    fn process_set(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        let content = self.process_element(element, active_includes);
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let cleaned = trailing_comma().replace(trimmed, "");
        format!(" SET {cleaned} ")
    }

    fn process_trim(&self, element: &XmlNode, active_includes: &mut HashSet<String>) -> String {
        let prefix = element.attr("prefix").unwrap_or("");
        let suffix = element.attr("suffix").unwrap_or("");
        let prefix_overrides = element.attr("prefixOverrides").unwrap_or("");
        let suffix_overrides = element.attr("suffixOverrides").unwrap_or("");

        let content = self.process_element(element, active_includes);
        let mut content = content.trim().to_string();
        if content.is_empty() {
            return String::new();
        }

        if !prefix_overrides.is_empty() {
            for token in prefix_overrides.split('|').map(str::trim) {
                if token.is_empty() {
                    continue;
                }
                if let Some(stripped) = strip_prefix_ci(&content, token) {
                    content = stripped.trim_start().to_string();
                    break;
                }
            }
        }

        if !suffix_overrides.is_empty() {
            for token in suffix_overrides.split('|').map(str::trim) {
                if token.is_empty() {
                    continue;
                }
                if let Some(stripped) = strip_suffix_ci(&content, token) {
                    content = stripped.trim_end().to_string();
                    break;
                }
            }
        }

        format!(" {prefix} {content} {suffix} ")
    }
}

fn strip_prefix_ci(content: &str, token: &str) -> Option<String> {
    if content.len() < token.len() {
        return None;
    }
    let (head, tail) = content.split_at(token.len());
    if head.eq_ignore_ascii_case(token) {
        Some(tail.to_string())
    } else {
        None
    }
}

fn strip_suffix_ci(content: &str, token: &str) -> Option<String> {
    if content.len() < token.len() {
        return None;
    }
    let (head, tail) = content.split_at(content.len() - token.len());
    if tail.eq_ignore_ascii_case(token) {
        Some(head.to_string())
    } else {
        None
    }
}

fn leading_and_or() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(AND|OR)\s+").expect("valid regex"))
}

fn trailing_comma() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r",\s*$").expect("valid regex"))
}

fn collapse_whitespace(s: &str) -> String {
    let collapsed: Vec<&str> = s.split_whitespace().collect();
    collapsed.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    fn select_node(xml: &str) -> (crate::dom::XmlNode, String) {
        let root = parse_document(xml).unwrap();
        (root, String::new())
    }

    #[test]
    fn include_splices_fragment_by_refid() {
        let xml = r#"<mapper>
            <sql id="cols">id, name</sql>
            <select id="find">SELECT <include refid="cols"/> FROM users</select>
        </mapper>"#;
        let (root, _) = select_node(xml);
        let resolver = DynamicSqlResolver::new(&root);
        let select = root.child_elements().find(|c| c.local_tag() == "select").unwrap();
        assert_eq!(resolver.resolve(select), "SELECT id, name FROM users");
    }

    #[test]
    fn missing_include_leaves_a_marker_and_continues() {
        let xml = r#"<mapper>
            <select id="find">SELECT <include refid="nope"/> FROM users</select>
        </mapper>"#;
        let (root, _) = select_node(xml);
        let resolver = DynamicSqlResolver::new(&root);
        let select = root.child_elements().next().unwrap();
        let resolved = resolver.resolve(select);
        assert!(resolved.contains("MISSING INCLUDE: nope"));
        assert!(resolved.contains("FROM users"));
    }

    #[test]
    fn choose_takes_first_when_ignoring_later_ones() {
        let xml = r#"<mapper>
            <select id="find">SELECT * FROM users <where>
                <choose>
                    <when test="a">AND a = 1</when>
                    <when test="b">AND b = 2</when>
                    <otherwise>AND 1=1</otherwise>
                </choose>
            </where></select>
        </mapper>"#;
        let (root, _) = select_node(xml);
        let resolver = DynamicSqlResolver::new(&root);
        let select = root.child_elements().next().unwrap();
        let resolved = resolver.resolve(select);
        assert!(resolved.contains("WHERE a = 1"));
        assert!(!resolved.contains("b = 2"));
    }

    #[test]
    fn where_strips_leading_and_or() {
        let xml = r#"<mapper><select id="find">SELECT * FROM users <where> AND name = #{n} </where></select></mapper>"#;
        let (root, _) = select_node(xml);
        let resolver = DynamicSqlResolver::new(&root);
        let select = root.child_elements().next().unwrap();
        let resolved = resolver.resolve(select);
        assert_eq!(resolved, "SELECT * FROM users WHERE name = #{n}");
    }

    #[test]
    fn trim_strips_only_first_matching_prefix_override() {
        let xml = r#"<mapper><select id="find">
            <trim prefix="WHERE" prefixOverrides="AND |OR ">AND OR name = #{n}</trim>
        </select></mapper>"#;
        let (root, _) = select_node(xml);
        let resolver = DynamicSqlResolver::new(&root);
        let select = root.child_elements().next().unwrap();
        let resolved = resolver.resolve(select);
        // Only the first "AND " is stripped; the "OR " that follows stays.
        assert_eq!(resolved, "WHERE OR name = #{n}");
    }

    #[test]
    fn foreach_wraps_body_with_open_and_close() {
        let xml = r#"<mapper><select id="find">SELECT * FROM users WHERE id IN
            <foreach collection="ids" item="id" open="(" close=")" separator=",">#{id}</foreach>
        </select></mapper>"#;
        let (root, _) = select_node(xml);
        let resolver = DynamicSqlResolver::new(&root);
        let select = root.child_elements().next().unwrap();
        let resolved = resolver.resolve(select);
        assert_eq!(resolved, "SELECT * FROM users WHERE id IN ( #{id} )");
    }
}
