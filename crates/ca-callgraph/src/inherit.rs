//! Inheritance forest and ancestor walk, ported from `get_class_inherit_graph.py`
//! / `inherit_graph_builder.py`: classes are keyed by simple name (last
//! declaration wins on a collision), and the ancestor walk stops at a
//! missing superclass, `Object`, or a name already visited in this walk.

use ca_common::model::InheritNode;
use std::collections::{HashMap, HashSet};

pub struct InheritForest {
    by_simple_name: HashMap<String, InheritNode>,
}

impl InheritForest {
    pub fn build(nodes: impl IntoIterator<Item = InheritNode>) -> Self {
        let mut by_simple_name = HashMap::new();
        for node in nodes {
            by_simple_name.insert(node.name.clone(), node);
        }
        InheritForest { by_simple_name }
    }

    pub fn get(&self, simple_name: &str) -> Option<&InheritNode> {
        self.by_simple_name.get(simple_name)
    }

    /// Walks `node`'s `superclass` chain, simple name first, stopping at a
    /// missing class, `"Object"`, or a cycle. Does not include `node` itself.
    pub fn ancestors(&self, simple_name: &str) -> Vec<&InheritNode> {
        let mut out = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(simple_name);

        let Some(mut current) = self.by_simple_name.get(simple_name) else {
            return out;
        };

        while let Some(superclass) = current.superclass.as_deref() {
            let simple_super = superclass.rsplit('.').next().unwrap_or(superclass);
            if simple_super == "Object" || visited.contains(simple_super) {
                break;
            }
            let Some(parent) = self.by_simple_name.get(simple_super) else {
                break;
            };
            out.push(parent);
            visited.insert(simple_super);
            current = parent;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn node(name: &str, superclass: Option<&str>) -> InheritNode {
        InheritNode {
            name: name.to_string(),
            package: None,
            superclass: superclass.map(str::to_string),
            interfaces: Vec::new(),
            file_path: PathBuf::from(format!("{name}.java")),
        }
    }

    #[test]
    fn walks_ancestor_chain_stopping_at_object() {
        let forest = InheritForest::build(vec![
            node("Base", Some("Object")),
            node("Middle", Some("Base")),
            node("Leaf", Some("Middle")),
        ]);
        let ancestors: Vec<&str> = forest.ancestors("Leaf").into_iter().map(|n| n.name.as_str()).collect();
        assert_eq!(ancestors, vec!["Middle", "Base"]);
    }

    #[test]
    fn cycle_guard_stops_infinite_walk() {
        let forest = InheritForest::build(vec![node("A", Some("B")), node("B", Some("A"))]);
        let ancestors: Vec<&str> = forest.ancestors("A").into_iter().map(|n| n.name.as_str()).collect();
        assert_eq!(ancestors, vec!["B"]);
    }

    #[test]
    fn missing_superclass_stops_the_walk() {
        let forest = InheritForest::build(vec![node("Orphan", Some("Unknown"))]);
        assert!(forest.ancestors("Orphan").is_empty());
    }
}
