//! Containment inference (network -> subnet -> resource) from node
//! attributes.
//!
//! The resolver runs three passes in order:
//! 1. index top-level containers by id and natural-key attributes
//! 2. attach second-level containers to the first network reference that
//!    resolves
//! 3. attach every other node to the first container reference that resolves
//!
//! Candidates are tried in attribute declaration order and the first hit
//! wins, even when a later candidate would be more specific. Explicit
//! parents are never overwritten, and unresolvable references leave the
//! node at the top level.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::config::HierarchyConfig;
use crate::ir::Graph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    pub top_level: usize,
    pub second_level: usize,
    pub explicit: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Top,
    Second,
    Leaf,
}

fn level_of(kind: &str, config: &HierarchyConfig) -> Level {
    let matches = |kinds: &[String]| kinds.iter().any(|k| k.eq_ignore_ascii_case(kind.trim()));
    if matches(&config.top_kinds) {
        Level::Top
    } else if matches(&config.second_kinds) {
        Level::Second
    } else {
        Level::Leaf
    }
}

pub fn resolve(mut graph: Graph, config: &HierarchyConfig) -> (Graph, HierarchyReport) {
    let mut report = HierarchyReport::default();
    let levels: Vec<Level> = graph
        .nodes
        .iter()
        .map(|node| level_of(&node.kind, config))
        .collect();

    // Pass 1: top-level containers.
    let mut top_index: HashMap<String, String> = HashMap::new();
    for (node, level) in graph.nodes.iter().zip(&levels) {
        if *level != Level::Top {
            continue;
        }
        report.top_level += 1;
        index_container(&mut top_index, &node.id, &node.attributes, &config.top_key_attributes);
    }

    // Pass 2: second-level containers attach to networks.
    let mut second_index: HashMap<String, String> = HashMap::new();
    for (node, level) in graph.nodes.iter_mut().zip(&levels) {
        if *level != Level::Second {
            continue;
        }
        report.second_level += 1;
        index_container(
            &mut second_index,
            &node.id,
            &node.attributes,
            &config.second_key_attributes,
        );
        if node.parent_id.is_some() {
            report.explicit += 1;
            continue;
        }
        match first_match(&node.attributes, &config.network_ref_attributes, &top_index, &node.id) {
            Some(parent) => {
                node.parent_id = Some(parent);
                report.resolved += 1;
            }
            None => report.unresolved += 1,
        }
    }

    // Pass 3: everything else attaches to a second-level container.
    for (node, level) in graph.nodes.iter_mut().zip(&levels) {
        if *level != Level::Leaf {
            continue;
        }
        if node.parent_id.is_some() {
            report.explicit += 1;
            continue;
        }
        match first_match(&node.attributes, &config.container_attributes, &second_index, &node.id) {
            Some(parent) => {
                node.parent_id = Some(parent);
                report.resolved += 1;
            }
            None => report.unresolved += 1,
        }
    }

    tracing::debug!(
        top = report.top_level,
        second = report.second_level,
        resolved = report.resolved,
        unresolved = report.unresolved,
        explicit = report.explicit,
        "resolved hierarchy"
    );
    (graph, report)
}

fn index_container(
    index: &mut HashMap<String, String>,
    id: &str,
    attributes: &Map<String, Value>,
    key_attributes: &[String],
) {
    index.entry(id.to_string()).or_insert_with(|| id.to_string());
    for name in key_attributes {
        let Some(value) = attributes.get(name) else {
            continue;
        };
        for reference in references(value) {
            index
                .entry(reference.to_string())
                .or_insert_with(|| id.to_string());
        }
    }
}

/// Walks the node's attributes in declaration order and returns the first
/// reference that resolves in `index` to something other than `own_id`.
fn first_match(
    attributes: &Map<String, Value>,
    names: &[String],
    index: &HashMap<String, String>,
    own_id: &str,
) -> Option<String> {
    for (name, value) in attributes {
        if !names.iter().any(|candidate| candidate == name) {
            continue;
        }
        for reference in references(value) {
            if let Some(parent) = lookup(index, reference).filter(|parent| *parent != own_id) {
                return Some(parent.clone());
            }
        }
    }
    None
}

fn references(value: &Value) -> Vec<&str> {
    let raw: Vec<&str> = match value {
        Value::String(s) => vec![s.trim()],
        Value::Array(items) => items.iter().flat_map(references).collect(),
        Value::Object(map) => map
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .filter(|reference| !reference.is_empty())
        .collect()
}

fn lookup<'i>(index: &'i HashMap<String, String>, reference: &str) -> Option<&'i String> {
    if let Some(hit) = index.get(reference) {
        return Some(hit);
    }
    // ARNs and self-links: fall back to the last path segment.
    let tail = reference.rsplit(['/', ':']).next()?;
    if tail.is_empty() || tail == reference {
        return None;
    }
    index.get(tail)
}

/// Forest overlay built from the stored `parent_id`s.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    roots: Vec<String>,
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
    depth: HashMap<String, usize>,
}

impl Hierarchy {
    /// Parents that are missing from the graph, or that close a cycle, are
    /// treated as roots here; the stored value on the node is untouched.
    pub fn build(graph: &Graph) -> Self {
        let mut parents: HashMap<&str, &str> = HashMap::new();
        for node in &graph.nodes {
            let Some(parent) = node.parent_id.as_deref() else {
                continue;
            };
            if parent == node.id || !graph.contains(parent) {
                tracing::debug!(node = %node.id, parent, "parent not in graph; treating as root");
                continue;
            }
            parents.insert(node.id.as_str(), parent);
        }

        // 0 = unvisited, 1 = on the current walk, 2 = done
        let mut state: HashMap<&str, u8> = HashMap::new();
        for node in &graph.nodes {
            let mut walk = Vec::new();
            let mut current = node.id.as_str();
            loop {
                match state.get(current).copied().unwrap_or(0) {
                    2 => break,
                    1 => {
                        tracing::warn!(node = current, "parent cycle; cutting at this node");
                        parents.remove(current);
                        break;
                    }
                    _ => {
                        state.insert(current, 1);
                        walk.push(current);
                        match parents.get(current) {
                            Some(parent) => current = *parent,
                            None => break,
                        }
                    }
                }
            }
            for id in walk {
                state.insert(id, 2);
            }
        }

        let mut hierarchy = Hierarchy::default();
        for node in &graph.nodes {
            match parents.get(node.id.as_str()) {
                Some(parent) => {
                    hierarchy
                        .children
                        .entry(parent.to_string())
                        .or_default()
                        .push(node.id.clone());
                    hierarchy
                        .parents
                        .insert(node.id.clone(), parent.to_string());
                }
                None => hierarchy.roots.push(node.id.clone()),
            }
        }

        let mut frontier: Vec<(String, usize)> =
            hierarchy.roots.iter().map(|id| (id.clone(), 0)).collect();
        while let Some((id, depth)) = frontier.pop() {
            if let Some(children) = hierarchy.children.get(&id) {
                frontier.extend(children.iter().map(|child| (child.clone(), depth + 1)));
            }
            hierarchy.depth.insert(id, depth);
        }

        hierarchy
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn depth(&self, id: &str) -> Option<usize> {
        self.depth.get(id).copied()
    }
}
