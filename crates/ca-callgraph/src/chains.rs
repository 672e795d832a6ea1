//! Depth-capped, cycle-guarded call-chain materialization from an endpoint
//! down through resolved call edges (§4.6's `build_call_chains`).

use ca_common::model::{CallRelation, Endpoint};
use std::collections::HashMap;

/// Root-to-leaf (or root-to-cycle-reentry) walk of one call path out of an
/// endpoint, each element `Class.method` qualified and paired with its
/// classified layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallChain {
    pub chain: Vec<String>,
    pub layers: Vec<String>,
    pub is_circular: bool,
}

/// Descent stops at this depth even on an acyclic graph — matches the
/// original generator's recursion guard against pathologically long chains.
pub const MAX_CHAIN_DEPTH: usize = 64;

pub fn build_call_chains(
    relations: &[CallRelation],
    endpoints: &[Endpoint],
    layer_of: impl Fn(&str) -> String,
) -> Vec<CallChain> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for relation in relations {
        if relation.callee.starts_with("<unresolved") {
            continue;
        }
        adjacency.entry(relation.caller.as_str()).or_default().push(relation.callee.as_str());
    }

    let mut out = Vec::new();
    for endpoint in endpoints {
        let root = format!("{}.{}", endpoint.class_name, endpoint.method_name);
        let mut visited_path = vec![root.clone()];
        walk(&root, &adjacency, &layer_of, &mut visited_path, &mut out);
    }
    out
}

fn walk<'a>(
    current: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    layer_of: &impl Fn(&str) -> String,
    path: &mut Vec<String>,
    out: &mut Vec<CallChain>,
) {
    let Some(callees) = adjacency.get(current) else {
        out.push(finalize(path, false, layer_of));
        return;
    };

    if callees.is_empty() {
        out.push(finalize(path, false, layer_of));
        return;
    }

    if path.len() >= MAX_CHAIN_DEPTH {
        out.push(finalize(path, false, layer_of));
        return;
    }

    let mut extended_any = false;
    for callee in callees {
        if path.iter().any(|n| n == callee) {
            path.push((*callee).to_string());
            out.push(finalize(path, true, layer_of));
            path.pop();
            extended_any = true;
            continue;
        }
        path.push((*callee).to_string());
        walk(callee, adjacency, layer_of, path, out);
        path.pop();
        extended_any = true;
    }

    if !extended_any {
        out.push(finalize(path, false, layer_of));
    }
}

fn finalize(path: &[String], is_circular: bool, layer_of: &impl Fn(&str) -> String) -> CallChain {
    CallChain {
        chain: path.to_vec(),
        layers: path
            .iter()
            .map(|qualified| {
                let class_name = qualified.rsplit_once('.').map(|(class, _)| class).unwrap_or(qualified);
                layer_of(class_name)
            })
            .collect(),
        is_circular,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_common::model::HttpMethod;
    use std::path::PathBuf;

    fn relation(caller: &str, callee: &str) -> CallRelation {
        CallRelation {
            caller: caller.to_string(),
            callee: callee.to_string(),
            caller_file: PathBuf::from("C.java"),
            callee_file: Some(PathBuf::from("C.java")),
            line: Some(1),
        }
    }

    fn endpoint(class_name: &str, method_name: &str) -> Endpoint {
        Endpoint {
            path: "/x".into(),
            http_method: HttpMethod::Get,
            method_signature: format!("{method_name}(0)"),
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_path: PathBuf::from("C.java"),
        }
    }

    #[test]
    fn builds_a_linear_chain_to_a_leaf() {
        let relations = vec![relation("Ctl.get", "Svc.find"), relation("Svc.find", "Dao.query")];
        let endpoints = vec![endpoint("Ctl", "get")];
        let chains = build_call_chains(&relations, &endpoints, |_| String::new());
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].chain, vec!["Ctl.get", "Svc.find", "Dao.query"]);
        assert!(!chains[0].is_circular);
    }

    #[test]
    fn marks_cycle_reentry_and_stops_descending() {
        let relations = vec![relation("A.go", "B.go"), relation("B.go", "A.go")];
        let endpoints = vec![endpoint("A", "go")];
        let chains = build_call_chains(&relations, &endpoints, |_| String::new());
        assert_eq!(chains.len(), 1);
        assert!(chains[0].is_circular);
        assert_eq!(chains[0].chain, vec!["A.go", "B.go", "A.go"]);
    }

    #[test]
    fn branching_callees_produce_one_chain_each() {
        let relations = vec![relation("A.go", "B.go"), relation("A.go", "C.go")];
        let endpoints = vec![endpoint("A", "go")];
        let chains = build_call_chains(&relations, &endpoints, |_| String::new());
        assert_eq!(chains.len(), 2);
    }
}
