//! Tree-sitter-backed extraction of `ClassInfo`/`MethodInfo`/`CallSite` from
//! a parsed Java file (§4.3). A plain recursive descent over the tree
//! (rather than one flat `Query` per field) so nested classes and their
//! methods/fields stay attached to the right parent — `tree-sitter-java`
//! doesn't expose parent-scoped query matches, so the walk tracks context by
//! hand the way the corpus's own tree-sitter analyzers do (modifiers
//! resolved by walking a node's direct children and matching `kind()`).

use ca_common::model::{
    AccessModifier, CallSite, ClassInfo, FieldInfo, LocalVariable, MethodInfo, Parameter,
};
use std::path::Path;
use std::time::Duration;
use tree_sitter::{Node, Parser, Tree};

pub struct TimedOut;

pub fn parse_source(source: &str, timeout: Duration) -> Result<Tree, TimedOut> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .expect("tree-sitter-java grammar failed to load");
    parser.set_timeout_micros(timeout.as_micros() as u64);
    parser.parse(source, None).ok_or(TimedOut)
}

pub fn extract_classes(tree: &Tree, source: &str, file_path: &Path) -> Vec<ClassInfo> {
    let bytes = source.as_bytes();
    let root = tree.root_node();
    let package = extract_package(root, bytes);
    let imports = extract_imports(root, bytes);

    let mut classes = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if let Some(mut class) = extract_type_declaration(child, bytes, file_path, package.as_deref()) {
            class.imports = imports.clone();
            classes.push(class);
        }
    }
    classes
}

fn extract_package(root: Node, source: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    root.children(&mut cursor)
        .find(|n| n.kind() == "package_declaration")
        .and_then(|n| n.named_child(0))
        .and_then(|n| n.utf8_text(source).ok())
        .map(|s| s.to_string())
}

fn extract_imports(root: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = root.walk();
    root.children(&mut cursor)
        .filter(|n| n.kind() == "import_declaration")
        .filter_map(|n| n.utf8_text(source).ok())
        .map(|text| {
            text.trim_start_matches("import")
                .trim_start()
                .trim_start_matches("static")
                .trim()
                .trim_end_matches(';')
                .trim()
                .to_string()
        })
        .collect()
}

const TYPE_DECL_KINDS: &[&str] = &["class_declaration", "interface_declaration", "enum_declaration"];

fn extract_type_declaration(
    node: Node,
    source: &[u8],
    file_path: &Path,
    package: Option<&str>,
) -> Option<ClassInfo> {
    if !TYPE_DECL_KINDS.contains(&node.kind()) {
        return None;
    }

    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("")
        .to_string();

    let is_interface = node.kind() == "interface_declaration";
    let superclass = node
        .child_by_field_name("superclass")
        .and_then(|n| n.named_child(0))
        .and_then(|n| n.utf8_text(source).ok())
        .map(|s| s.to_string());

    let interfaces = node
        .child_by_field_name("interfaces")
        .map(|interfaces_node| collect_type_identifiers(interfaces_node, source))
        .unwrap_or_default();

    let (access_modifier, annotations) = extract_modifiers(node, source);

    let mut fields = Vec::new();
    let mut methods = Vec::new();
    let mut inner_classes = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "field_declaration" => fields.extend(extract_fields(member, source)),
                "method_declaration" | "constructor_declaration" => {
                    methods.push(extract_method(member, source, file_path, &name));
                }
                kind if TYPE_DECL_KINDS.contains(&kind) => {
                    if let Some(inner) = extract_type_declaration(member, source, file_path, package) {
                        inner_classes.push(inner);
                    }
                }
                _ => {}
            }
        }
    }

    Some(ClassInfo {
        name,
        package: package.map(|s| s.to_string()),
        superclass,
        interfaces,
        file_path: file_path.to_path_buf(),
        access_modifier,
        annotations,
        imports: Vec::new(),
        fields,
        methods,
        inner_classes,
        is_interface,
    })
}

fn collect_type_identifiers(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "type_identifier" || n.kind() == "scoped_type_identifier" {
            if let Ok(text) = n.utf8_text(source) {
                out.push(text.to_string());
            }
            continue;
        }
        let mut cursor = n.walk();
        for child in n.children(&mut cursor) {
            stack.push(child);
        }
    }
    out
}

/// Walks a declaration node's direct children looking for a `modifiers`
/// node, returning the access level (defaulting to package-private) and the
/// list of annotation texts found alongside it.
fn extract_modifiers(node: Node, source: &[u8]) -> (AccessModifier, Vec<String>) {
    let mut access = AccessModifier::Package;
    let mut annotations = Vec::new();

    let mut cursor = node.walk();
    if let Some(modifiers) = node.children(&mut cursor).find(|n| n.kind() == "modifiers") {
        let mut mod_cursor = modifiers.walk();
        for child in modifiers.children(&mut mod_cursor) {
            match child.kind() {
                "public" => access = AccessModifier::Public,
                "private" => access = AccessModifier::Private,
                "protected" => access = AccessModifier::Protected,
                "annotation" | "marker_annotation" => {
                    if let Ok(text) = child.utf8_text(source) {
                        annotations.push(text.trim().to_string());
                    }
                }
                _ => {}
            }
        }
    }

    // Interface methods/fields are implicitly public when no explicit
    // modifier says otherwise.
    if node.parent().map(|p| p.kind() == "interface_body").unwrap_or(false)
        && access == AccessModifier::Package
    {
        access = AccessModifier::Public;
    }

    (access, annotations)
}

fn extract_fields(node: Node, source: &[u8]) -> Vec<FieldInfo> {
    let (_, annotations) = extract_modifiers(node, source);
    let field_type = node
        .child_by_field_name("type")
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("")
        .to_string();

    let mut out = Vec::new();
    let mut cursor = node.walk();
    for declarator in node
        .children(&mut cursor)
        .filter(|n| n.kind() == "variable_declarator")
    {
        let name = declarator
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("")
            .to_string();
        let has_initializer = declarator.child_by_field_name("value").is_some();
        out.push(FieldInfo {
            name,
            field_type: field_type.clone(),
            annotations: annotations.clone(),
            has_initializer,
        });
    }
    out
}

fn extract_method(node: Node, source: &[u8], file_path: &Path, class_name: &str) -> MethodInfo {
    let is_constructor = node.kind() == "constructor_declaration";
    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("")
        .to_string();

    let return_type = if is_constructor {
        class_name.to_string()
    } else {
        node.child_by_field_name("type")
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("void")
            .to_string()
    };

    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| extract_parameters(params, source))
        .unwrap_or_default();

    let (access_modifier, annotations) = extract_modifiers(node, source);
    let mut is_static = false;
    let mut is_abstract = false;
    let mut cursor = node.walk();
    if let Some(modifiers) = node.children(&mut cursor).find(|n| n.kind() == "modifiers") {
        let mut mod_cursor = modifiers.walk();
        for child in modifiers.children(&mut mod_cursor) {
            match child.kind() {
                "static" => is_static = true,
                "abstract" => is_abstract = true,
                _ => {}
            }
        }
    }
    // A method declaration with no body (interface method, abstract method)
    // has no `body` field at all.
    if node.child_by_field_name("body").is_none() && !is_constructor {
        is_abstract = true;
    }

    let exceptions = node
        .child_by_field_name("throws")
        .map(|n| collect_type_identifiers(n, source))
        .unwrap_or_default();

    let method_calls = node
        .child_by_field_name("body")
        .map(|body| extract_call_sites(body, source))
        .unwrap_or_default();
    let local_variables = node
        .child_by_field_name("body")
        .map(|body| extract_local_variables(body, source))
        .unwrap_or_default();

    MethodInfo {
        name,
        return_type,
        parameters,
        access_modifier,
        class_name: class_name.to_string(),
        file_path: file_path.to_path_buf(),
        is_static,
        is_abstract,
        annotations,
        exceptions,
        line_number: node.start_position().row as u32 + 1,
        end_line_number: node.end_position().row as u32 + 1,
        method_calls,
        local_variables,
    }
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<Parameter> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let is_varargs = child.kind() == "spread_parameter";
        if child.kind() != "formal_parameter" && !is_varargs {
            continue;
        }
        // `spread_parameter` wraps a `formal_parameter`-shaped node with the
        // same `name`/`type` fields in recent grammars.
        let name = child
            .child_by_field_name("name")
            .or_else(|| child.named_child(child.named_child_count().saturating_sub(1)))
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("")
            .to_string();
        let param_type = child
            .child_by_field_name("type")
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("")
            .to_string();
        out.push(Parameter {
            name,
            param_type,
            is_varargs,
        });
    }
    out
}

/// Collects `Type name = ...;` declarations (plus enhanced-for loop variables)
/// anywhere in a method body, for call-site receiver-type resolution. Not
/// scope-aware — a name declared in one branch is visible to resolution
/// everywhere in the method, which only risks picking the wrong overload when
/// two local variables share a name and differ in type, a rare pattern.
fn extract_local_variables(body: Node, source: &[u8]) -> Vec<LocalVariable> {
    let mut out = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "local_variable_declaration" => {
                let var_type = node
                    .child_by_field_name("type")
                    .and_then(|n| n.utf8_text(source).ok())
                    .unwrap_or("")
                    .to_string();
                let mut cursor = node.walk();
                for declarator in node
                    .children(&mut cursor)
                    .filter(|n| n.kind() == "variable_declarator")
                {
                    if let Some(name) = declarator
                        .child_by_field_name("name")
                        .and_then(|n| n.utf8_text(source).ok())
                    {
                        out.push(LocalVariable {
                            name: name.to_string(),
                            var_type: var_type.clone(),
                        });
                    }
                }
            }
            "enhanced_for_statement" => {
                if let (Some(type_node), Some(name_node)) = (
                    node.child_by_field_name("type"),
                    node.child_by_field_name("name"),
                ) {
                    if let (Ok(var_type), Ok(name)) =
                        (type_node.utf8_text(source), name_node.utf8_text(source))
                    {
                        out.push(LocalVariable {
                            name: name.to_string(),
                            var_type: var_type.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    out
}

fn extract_call_sites(body: Node, source: &[u8]) -> Vec<CallSite> {
    let mut out = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if node.kind() == "method_invocation" {
            let method_name = node
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source).ok())
                .unwrap_or("")
                .to_string();
            let receiver = node
                .child_by_field_name("object")
                .and_then(|n| n.utf8_text(source).ok())
                .map(|s| s.to_string());
            let arg_count = node
                .child_by_field_name("arguments")
                .map(|args| args.named_child_count() as u32)
                .unwrap_or(0);
            out.push(CallSite {
                receiver,
                method_name,
                line: node.start_position().row as u32 + 1,
                arg_count,
            });
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    // Depth-first stack traversal visits children in reverse order; restore
    // source order so line numbers read top-to-bottom for callers that log
    // or diff this list.
    out.sort_by_key(|site| site.line);
    out
}
