//! Regex-based best-effort parser used when tree-sitter cannot produce a
//! tree at all (parse timeout). Recovers class/interface names, `extends`/
//! `implements` targets, and method signatures; never attempts call-site
//! resolution — a file degraded this far contributes opaque leaves to the
//! call graph (§4.3/§9), not resolved edges.

use ca_common::model::{AccessModifier, ClassInfo, MethodInfo};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:public|private|protected)?\s*(?:static\s+|final\s+|abstract\s+)*(class|interface|enum)\s+(\w+)(?:\s+extends\s+([\w.]+))?(?:\s+implements\s+([\w.,\s]+))?\s*\{",
        )
        .expect("valid regex")
    })
}

fn method_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:public|private|protected)?\s*(?:static\s+|final\s+|abstract\s+|synchronized\s+)*([\w<>\[\],\s]+?)\s+(\w+)\s*\(([^)]*)\)\s*(?:throws\s+[\w.,\s]+)?\s*[\{;]",
        )
        .expect("valid regex")
    })
}

fn package_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").expect("valid regex"))
}

pub fn parse_fallback(file_path: &Path, source: &str) -> Vec<ClassInfo> {
    let package = package_pattern()
        .captures(source)
        .map(|caps| caps[1].to_string());

    class_pattern()
        .captures_iter(source)
        .map(|caps| {
            let is_interface = &caps[1] == "interface";
            let name = caps[2].to_string();
            let superclass = caps.get(3).map(|m| m.as_str().to_string());
            let interfaces = caps
                .get(4)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            ClassInfo {
                name: name.clone(),
                package: package.clone(),
                superclass,
                interfaces,
                file_path: file_path.to_path_buf(),
                access_modifier: AccessModifier::Public,
                annotations: Vec::new(),
                imports: Vec::new(),
                fields: Vec::new(),
                methods: find_methods(source, file_path, &name),
                inner_classes: Vec::new(),
                is_interface,
            }
        })
        .collect()
}

fn find_methods(source: &str, file_path: &Path, class_name: &str) -> Vec<MethodInfo> {
    method_pattern()
        .captures_iter(source)
        .filter(|caps| &caps[1] != "class" && &caps[1] != "interface" && &caps[1] != "enum")
        .enumerate()
        .map(|(_, caps)| {
            let line = source[..caps.get(0).unwrap().start()].matches('\n').count() as u32 + 1;
            MethodInfo {
                name: caps[2].to_string(),
                return_type: caps[1].trim().to_string(),
                parameters: Vec::new(),
                access_modifier: AccessModifier::Public,
                class_name: class_name.to_string(),
                file_path: file_path.to_path_buf(),
                is_static: false,
                is_abstract: false,
                annotations: Vec::new(),
                exceptions: Vec::new(),
                line_number: line,
                end_line_number: line,
                method_calls: Vec::new(),
                local_variables: Vec::new(),
            }
        })
        .collect()
}
