//! Call-graph construction (§4.6): dispatch resolution, endpoint detection,
//! layer classification, call-chain materialization, and circular-reference
//! detection, wired into one [`CallGraphBuilder`].

mod chains;
mod cycles;
mod endpoints;
mod inherit;
mod layer;
mod resolve;

pub use chains::{CallChain, MAX_CHAIN_DEPTH};
pub use cycles::Cycle;
pub use endpoints::detect_endpoints;
pub use inherit::InheritForest;
pub use layer::{
    classify_layer, sub_label, LAYER_CONTROLLER, LAYER_REPOSITORY, LAYER_SERVICE, LAYER_UNKNOWN,
    LAYER_VALUE_OBJECT,
};
pub use resolve::{ClassIndex, Resolution};

use ca_common::model::{CallRelation, ClassInfo, Endpoint, InheritNode};
use std::path::PathBuf;

/// The "callee could not be resolved to a known class/method" sentinel
/// prefix `CallRelation::callee` carries for an unresolved call site — kept
/// as a prefix (rather than an `Option`) so `CallRelation` stays a flat,
/// directly-serializable edge.
pub const UNRESOLVED_PREFIX: &str = "<unresolved>";

pub struct CallGraph {
    pub relations: Vec<CallRelation>,
    pub aliases: std::collections::BTreeMap<String, String>,
    pub endpoints: Vec<Endpoint>,
    pub layers: std::collections::HashMap<String, &'static str>,
    /// `Class.method` qualified name → declaring file, for every method seen
    /// while building the graph. `ca-table-access` uses this to turn a call
    /// stack's qualified-name list back into the file paths `access_files`
    /// and `layer_files` are keyed on.
    pub method_files: std::collections::HashMap<String, PathBuf>,
}

impl CallGraph {
    pub fn get_endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn get_call_relations(&self) -> &[CallRelation] {
        &self.relations
    }

    pub fn layer_of(&self, class_name: &str) -> &'static str {
        self.layers.get(class_name).copied().unwrap_or(layer::LAYER_UNKNOWN)
    }

    pub fn build_call_chains(&self) -> Vec<CallChain> {
        let layers = &self.layers;
        chains::build_call_chains(&self.relations, &self.endpoints, |class_name| {
            layers.get(class_name).copied().unwrap_or(layer::LAYER_UNKNOWN).to_string()
        })
    }

    pub fn detect_circular_references(&self) -> Vec<Cycle> {
        cycles::detect_cycles(&self.relations)
    }
}

pub struct CallGraphBuilder {
    classes: Vec<ClassInfo>,
}

impl CallGraphBuilder {
    pub fn new(classes: Vec<ClassInfo>) -> Self {
        CallGraphBuilder { classes }
    }

    pub fn build(self) -> CallGraph {
        let endpoints = endpoints::detect_endpoints(&self.classes);

        let mut layers = std::collections::HashMap::new();
        for class in flatten_for_layers(&self.classes) {
            layers.insert(class.name.clone(), layer::classify_layer(&class.name));
        }

        let index = resolve::ClassIndex::build(self.classes);
        let mut relations = Vec::new();
        let mut aliases = std::collections::BTreeMap::new();
        let mut method_files = std::collections::HashMap::new();

        for (class_idx, class) in index.classes.iter().enumerate() {
            for method in &class.methods {
                let caller_qualified = format!("{}.{}", class.name, method.name);
                method_files.insert(caller_qualified.clone(), method.file_path.clone());
                for call in &method.method_calls {
                    match resolve::resolve_call_site(&index, class_idx, method, call) {
                        Resolution::Resolved { qualified_name, file_path } => {
                            relations.push(CallRelation {
                                caller: caller_qualified.clone(),
                                callee: qualified_name,
                                caller_file: method.file_path.clone(),
                                callee_file: Some(file_path),
                                line: Some(call.line),
                            });
                        }
                        Resolution::ResolvedWithAlias { qualified_name, file_path, alias } => {
                            aliases.insert(alias.clone(), qualified_name.clone());
                            relations.push(CallRelation {
                                caller: caller_qualified.clone(),
                                callee: qualified_name,
                                caller_file: method.file_path.clone(),
                                callee_file: Some(file_path),
                                line: Some(call.line),
                            });
                        }
                        Resolution::Unresolved { textual_signature } => {
                            relations.push(CallRelation {
                                caller: caller_qualified.clone(),
                                callee: format!("{UNRESOLVED_PREFIX}.{textual_signature}"),
                                caller_file: method.file_path.clone(),
                                callee_file: None,
                                line: Some(call.line),
                            });
                        }
                    }
                }
            }
        }

        CallGraph { relations, aliases, endpoints, layers, method_files }
    }
}

fn flatten_for_layers(classes: &[ClassInfo]) -> Vec<&ClassInfo> {
    let mut out = Vec::new();
    for class in classes {
        out.push(class);
        out.extend(flatten_for_layers(&class.inner_classes));
    }
    out
}

/// Projects a full class list down to [`InheritNode`]s, the thin shape
/// `InheritForest` walks ancestor chains over.
pub fn inherit_nodes(classes: &[ClassInfo]) -> Vec<InheritNode> {
    flatten_for_layers(classes)
        .into_iter()
        .map(|class| InheritNode {
            name: class.name.clone(),
            package: class.package.clone(),
            superclass: class.superclass.clone(),
            interfaces: class.interfaces.clone(),
            file_path: class.file_path.clone(),
        })
        .collect()
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
    fn builds_endpoint_reachable_call_chain_through_a_dao() {
        let classes = classes_for(&[
            (
                "UserController.java",
                indoc::indoc! {r#"
                    @RestController
                    public class UserController {
                        private UserService service;
                        @GetMapping("/users/{id}")
                        public User getUser(Long id) { return service.find(id); }
                    }
                "#},
            ),
            (
                "UserService.java",
                "public class UserService { private UserDAO dao; public User find(Long id) { return dao.findById(id); } }",
            ),
            ("UserDAO.java", "public class UserDAO { public User findById(Long id) { return null; } }"),
        ]);

        let graph = CallGraphBuilder::new(classes).build();
        assert_eq!(graph.get_endpoints().len(), 1);

        let chains = graph.build_call_chains();
        assert_eq!(chains.len(), 1);
        assert_eq!(
            chains[0].chain,
            vec!["UserController.getUser", "UserService.find", "UserDAO.findById"]
        );
        assert!(!chains[0].is_circular);
    }

    #[test]
    fn interface_call_produces_an_alias_and_detects_no_false_cycle() {
        let classes = classes_for(&[
            (
                "CTLFoo.java",
                indoc::indoc! {r#"
                    @RestController
                    public class CTLFoo {
                        private IFooSVC svc;
                        @GetMapping("/foo")
                        public void call() { svc.doIt(); }
                    }
                "#},
            ),
            ("IFooSVC.java", "public interface IFooSVC { void doIt(); }"),
            ("FooSVCImpl.java", "public class FooSVCImpl implements IFooSVC { public void doIt() {} }"),
        ]);

        let graph = CallGraphBuilder::new(classes).build();
        assert_eq!(graph.aliases.get("IFooSVC.doIt"), Some(&"FooSVCImpl.doIt".to_string()));
        assert!(graph.detect_circular_references().is_empty());
    }

    #[test]
    fn detects_a_circular_reference_between_services() {
        let classes = classes_for(&[
            ("A.java", "public class A { private B b; public void go() { b.go(); } }"),
            ("B.java", "public class B { private A a; public void go() { a.go(); } }"),
        ]);
        let graph = CallGraphBuilder::new(classes).build();
        let cycles = graph.detect_circular_references();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members.len(), 2);
    }
}
