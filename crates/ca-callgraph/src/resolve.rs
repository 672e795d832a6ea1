//! Call-site dispatch resolution (§4.6 construction, the five cases).

use ca_common::model::{CallSite, ClassInfo, MethodInfo};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Classes indexed by simple name, flattening nested classes into the same
/// flat space the rest of the codebase's "Class.method" qualified names
/// assume. A simple-name collision across files keeps the first class seen
/// (stable file-iteration order) — tolerated, not an error (§4.6 calls this
/// out as the index's known limitation).
pub struct ClassIndex {
    pub classes: Vec<ClassInfo>,
    by_simple_name: HashMap<String, Vec<usize>>,
}

impl ClassIndex {
    pub fn build(classes: Vec<ClassInfo>) -> Self {
        let classes = flatten(classes);
        let mut by_simple_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, class) in classes.iter().enumerate() {
            by_simple_name.entry(class.name.clone()).or_default().push(idx);
        }
        ClassIndex { classes, by_simple_name }
    }

    pub fn find_class(&self, simple_name: &str) -> Option<usize> {
        self.by_simple_name.get(simple_name).and_then(|v| v.first().copied())
    }

    /// `class_idx`'s ancestor chain by simple-name `superclass` lookups,
    /// stopping at `Object`, a missing class, or a cycle.
    fn ancestor_indices(&self, class_idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut visited = std::collections::HashSet::new();
        visited.insert(class_idx);
        let mut current = &self.classes[class_idx];
        while let Some(superclass) = current.superclass.as_deref() {
            let simple = superclass.rsplit('.').next().unwrap_or(superclass);
            if simple == "Object" {
                break;
            }
            let Some(parent_idx) = self.find_class(simple) else { break };
            if visited.contains(&parent_idx) {
                break;
            }
            out.push(parent_idx);
            visited.insert(parent_idx);
            current = &self.classes[parent_idx];
        }
        out
    }

    /// Finds `method_name` in `class_idx` or an ancestor, preferring the
    /// arity-matching overload; falls back to any arity if none matches.
    fn find_method(&self, class_idx: usize, method_name: &str, arg_count: u32) -> Option<(usize, usize)> {
        let mut candidate: Option<(usize, usize)> = None;
        for idx in std::iter::once(class_idx).chain(self.ancestor_indices(class_idx)) {
            let class = &self.classes[idx];
            for (method_idx, method) in class.methods.iter().enumerate() {
                if method.name != method_name {
                    continue;
                }
                if method.parameters.len() as u32 == arg_count {
                    return Some((idx, method_idx));
                }
                candidate.get_or_insert((idx, method_idx));
            }
        }
        candidate
    }

    fn field_type(&self, class_idx: usize, field_name: &str) -> Option<String> {
        for idx in std::iter::once(class_idx).chain(self.ancestor_indices(class_idx)) {
            if let Some(field) = self.classes[idx].fields.iter().find(|f| f.name == field_name) {
                return Some(field.field_type.clone());
            }
        }
        None
    }
}

fn flatten(classes: Vec<ClassInfo>) -> Vec<ClassInfo> {
    let mut out = Vec::new();
    for mut class in classes {
        let inner = std::mem::take(&mut class.inner_classes);
        out.push(class);
        out.extend(flatten(inner));
    }
    out
}

fn base_type_name(ty: &str) -> String {
    let ty = ty.trim();
    let ty = ty.split('<').next().unwrap_or(ty).trim();
    let ty = ty.trim_end_matches("[]").trim();
    ty.rsplit('.').next().unwrap_or(ty).to_string()
}

fn constructed_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"new\s+([A-Za-z_]\w*)").expect("valid regex"))
}

/// `impl_candidates("IFooSVC") == ["IFooSVCImpl", "FooSVCImpl"]` — the two
/// conventions §4.6 names: a bare `Impl` suffix, or a leading `I` stripped
/// before adding `Impl`.
fn impl_candidates(iface_name: &str) -> Vec<String> {
    let mut out = vec![format!("{iface_name}Impl")];
    if let Some(stripped) = iface_name.strip_prefix('I') {
        if stripped.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
            out.push(format!("{stripped}Impl"));
        }
    }
    out
}

pub enum Resolution {
    Resolved {
        qualified_name: String,
        file_path: PathBuf,
    },
    /// An interface method resolved through heuristic Impl pairing: the edge
    /// targets `qualified_name` (the Impl, authoritative for descent), and
    /// `alias` records the interface declaration as equivalent (§4.6 case 5,
    /// S3).
    ResolvedWithAlias {
        qualified_name: String,
        file_path: PathBuf,
        alias: String,
    },
    Unresolved {
        textual_signature: String,
    },
}

/// Resolves one call site made from `caller_class_idx`/`caller_method`.
pub fn resolve_call_site(
    index: &ClassIndex,
    caller_class_idx: usize,
    caller_method: &MethodInfo,
    call: &CallSite,
) -> Resolution {
    let target_class_idx = match call.receiver.as_deref() {
        None | Some("this") => Some(caller_class_idx),
        Some(receiver) => resolve_receiver_type(index, caller_class_idx, caller_method, receiver),
    };

    let Some(target_class_idx) = target_class_idx else {
        let receiver_prefix = call.receiver.as_deref().map(|r| format!("{r}.")).unwrap_or_default();
        return Resolution::Unresolved {
            textual_signature: format!("{receiver_prefix}{}", call.method_name),
        };
    };

    let Some((found_class_idx, found_method_idx)) =
        index.find_method(target_class_idx, &call.method_name, call.arg_count)
    else {
        let class_name = &index.classes[target_class_idx].name;
        return Resolution::Unresolved {
            textual_signature: format!("{class_name}.{}", call.method_name),
        };
    };

    let found_class = &index.classes[found_class_idx];
    let found_method = &found_class.methods[found_method_idx];
    let qualified = format!("{}.{}", found_class.name, found_method.name);

    if !found_class.is_interface {
        return Resolution::Resolved {
            qualified_name: qualified,
            file_path: found_method.file_path.clone(),
        };
    }

    for candidate in impl_candidates(&found_class.name) {
        let Some(impl_class_idx) = index.find_class(&candidate) else { continue };
        if let Some((impl_found_idx, impl_method_idx)) =
            index.find_method(impl_class_idx, &call.method_name, call.arg_count)
        {
            let impl_class = &index.classes[impl_found_idx];
            let impl_method = &impl_class.methods[impl_method_idx];
            return Resolution::ResolvedWithAlias {
                qualified_name: format!("{}.{}", impl_class.name, impl_method.name),
                file_path: impl_method.file_path.clone(),
                alias: qualified,
            };
        }
    }

    Resolution::Resolved {
        qualified_name: qualified,
        file_path: found_method.file_path.clone(),
    }
}

/// Classifies a non-`this` receiver string into a target class, in order:
/// a tracked local variable, a field (own class or an ancestor's), a `new
/// Type(...)` constructor expression, or the receiver text itself treated as
/// a simple (static-call) type name.
fn resolve_receiver_type(
    index: &ClassIndex,
    caller_class_idx: usize,
    caller_method: &MethodInfo,
    receiver: &str,
) -> Option<usize> {
    if let Some(local) = caller_method.local_variables.iter().find(|v| v.name == receiver) {
        if let Some(idx) = index.find_class(&base_type_name(&local.var_type)) {
            return Some(idx);
        }
    }
    if let Some(field_type) = index.field_type(caller_class_idx, receiver) {
        if let Some(idx) = index.find_class(&base_type_name(&field_type)) {
            return Some(idx);
        }
    }
    if let Some(caps) = constructed_type_pattern().captures(receiver) {
        if let Some(idx) = index.find_class(&caps[1]) {
            return Some(idx);
        }
    }
    index.find_class(receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_java_ast::JavaAstParser;
    use std::path::PathBuf;
    use std::time::Duration;

    fn classes_for(files: &[(&str, &str)]) -> Vec<ClassInfo> {
        let parser = JavaAstParser::new(Duration::from_secs(5));
        let mut out = Vec::new();
        for (name, source) in files {
            out.extend(parser.parse_source(&PathBuf::from(name), source).classes().to_vec());
        }
        out
    }

    #[test]
    fn resolves_field_receiver_call() {
        let classes = classes_for(&[
            (
                "UserService.java",
                "public class UserService { private UserDAO dao; public User find(Long id) { return dao.findById(id); } }",
            ),
            ("UserDAO.java", "public class UserDAO { public User findById(Long id) { return null; } }"),
        ]);
        let index = ClassIndex::build(classes);
        let service_idx = index.find_class("UserService").unwrap();
        let call = index.classes[service_idx].methods[0].method_calls[0].clone();
        match resolve_call_site(&index, service_idx, &index.classes[service_idx].methods[0], &call) {
            Resolution::Resolved { qualified_name, .. } => assert_eq!(qualified_name, "UserDAO.findById"),
            _ => panic!("expected resolved"),
        }
    }

    #[test]
    fn resolves_local_variable_receiver_call() {
        let classes = classes_for(&[
            (
                "Caller.java",
                "public class Caller { public void go() { Worker w = new Worker(); w.run(); } }",
            ),
            ("Worker.java", "public class Worker { public void run() {} }"),
        ]);
        let index = ClassIndex::build(classes);
        let caller_idx = index.find_class("Caller").unwrap();
        let method = &index.classes[caller_idx].methods[0];
        let call = method.method_calls.iter().find(|c| c.method_name == "run").unwrap().clone();
        match resolve_call_site(&index, caller_idx, method, &call) {
            Resolution::Resolved { qualified_name, .. } => assert_eq!(qualified_name, "Worker.run"),
            _ => panic!("expected resolved"),
        }
    }

    #[test]
    fn interface_pairs_with_impl_and_records_alias() {
        let classes = classes_for(&[
            ("CTLFoo.java", "public class CTLFoo { private IFooSVC svc; public void call() { svc.doIt(); } }"),
            ("IFooSVC.java", "public interface IFooSVC { void doIt(); }"),
            ("FooSVCImpl.java", "public class FooSVCImpl implements IFooSVC { public void doIt() {} }"),
        ]);
        let index = ClassIndex::build(classes);
        let caller_idx = index.find_class("CTLFoo").unwrap();
        let method = &index.classes[caller_idx].methods[0];
        let call = method.method_calls[0].clone();
        match resolve_call_site(&index, caller_idx, method, &call) {
            Resolution::ResolvedWithAlias { qualified_name, alias, .. } => {
                assert_eq!(qualified_name, "FooSVCImpl.doIt");
                assert_eq!(alias, "IFooSVC.doIt");
            }
            _ => panic!("expected resolved-with-alias"),
        }
    }

    #[test]
    fn unresolved_call_keeps_a_textual_signature() {
        let classes = classes_for(&[(
            "Lonely.java",
            "public class Lonely { public void go() { Unknown.doStuff(); } }",
        )]);
        let index = ClassIndex::build(classes);
        let caller_idx = index.find_class("Lonely").unwrap();
        let method = &index.classes[caller_idx].methods[0];
        let call = method.method_calls[0].clone();
        match resolve_call_site(&index, caller_idx, method, &call) {
            Resolution::Unresolved { textual_signature } => assert_eq!(textual_signature, "Unknown.doStuff"),
            _ => panic!("expected unresolved"),
        }
    }

    #[test]
    fn unqualified_call_prefers_arity_match_over_first_overload() {
        let classes = classes_for(&[(
            "Overload.java",
            indoc::indoc! {r#"
                public class Overload {
                    public void entry() { helper(1); }
                    private void helper() {}
                    private void helper(int x) {}
                }
            "#},
        )]);
        let index = ClassIndex::build(classes);
        let idx = index.find_class("Overload").unwrap();
        let entry = index.classes[idx].methods.iter().find(|m| m.name == "entry").unwrap();
        let call = entry.method_calls[0].clone();
        assert_eq!(call.arg_count, 1);
        match resolve_call_site(&index, idx, entry, &call) {
            Resolution::Resolved { qualified_name, .. } => assert_eq!(qualified_name, "Overload.helper"),
            _ => panic!("expected resolved"),
        }
    }
}
