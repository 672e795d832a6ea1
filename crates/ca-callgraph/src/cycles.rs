//! Circular-reference detection over resolved call edges (§4.6): a strongly
//! connected component larger than one node, or a direct self-loop, is a
//! cycle.

use ca_common::model::CallRelation;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// One detected cycle, qualified-name nodes in SCC-discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub members: Vec<String>,
}

pub fn detect_cycles(relations: &[CallRelation]) -> Vec<Cycle> {
    let mut graph = DiGraph::<String, ()>::new();
    let mut node_of: HashMap<&str, NodeIndex> = HashMap::new();

    for relation in relations {
        if relation.callee.starts_with("<unresolved") {
            continue;
        }
        let caller_idx = *node_of
            .entry(relation.caller.as_str())
            .or_insert_with(|| graph.add_node(relation.caller.clone()));
        let callee_idx = *node_of
            .entry(relation.callee.as_str())
            .or_insert_with(|| graph.add_node(relation.callee.clone()));
        graph.add_edge(caller_idx, callee_idx, ());
    }

    tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || is_self_loop(&graph, scc[0]))
        .map(|scc| Cycle {
            members: scc.into_iter().map(|idx| graph[idx].clone()).collect(),
        })
        .collect()
}

fn is_self_loop(graph: &DiGraph<String, ()>, node: NodeIndex) -> bool {
    graph.neighbors(node).any(|n| n == node)
}
