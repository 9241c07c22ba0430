//! Path and impact-set emphasis over the materialized node/edge set.
//!
//! Highlighting is a pure function of the baseline: every call starts by
//! clearing emphasis, so switching or clearing modes never leaves residue.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::HighlightConfig;
use crate::frame::{RenderEdge, RenderNode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum HighlightState {
    #[default]
    None,
    /// Consecutive entries define the highlighted edges.
    Path { nodes: Vec<String> },
    Impact {
        nodes: Vec<String>,
        #[serde(default)]
        depth: u32,
    },
}

impl HighlightState {
    pub fn is_none(&self) -> bool {
        matches!(self, HighlightState::None)
    }

    /// Rewrites ids through `visible` (hidden members to their collapsed
    /// cluster). Path entries that collapse onto the same id fold together;
    /// impact entries are deduplicated.
    pub fn map_ids<F>(&self, visible: F) -> HighlightState
    where
        F: Fn(&str) -> String,
    {
        match self {
            HighlightState::None => HighlightState::None,
            HighlightState::Path { nodes } => {
                let mut mapped: Vec<String> = Vec::with_capacity(nodes.len());
                for id in nodes {
                    let id = visible(id);
                    if mapped.last() != Some(&id) {
                        mapped.push(id);
                    }
                }
                HighlightState::Path { nodes: mapped }
            }
            HighlightState::Impact { nodes, depth } => {
                let mut seen = HashSet::new();
                let mapped = nodes
                    .iter()
                    .map(|id| visible(id))
                    .filter(|id| seen.insert(id.clone()))
                    .collect();
                HighlightState::Impact {
                    nodes: mapped,
                    depth: *depth,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmphasisRole {
    Path,
    Impact,
    Dimmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Emphasis {
    pub role: EmphasisRole,
    pub opacity: f32,
    pub stroke_width: f32,
    pub glow: bool,
}

pub fn apply_highlight(
    nodes: &[RenderNode],
    edges: &[RenderEdge],
    state: &HighlightState,
    config: &HighlightConfig,
) -> (Vec<RenderNode>, Vec<RenderEdge>) {
    let mut nodes: Vec<RenderNode> = nodes.to_vec();
    let mut edges: Vec<RenderEdge> = edges.to_vec();
    for node in &mut nodes {
        node.emphasis = None;
    }
    for edge in &mut edges {
        edge.emphasis = None;
    }

    match state {
        HighlightState::None => {}
        HighlightState::Path { nodes: path } => {
            let emphasis = Emphasis {
                role: EmphasisRole::Path,
                opacity: 1.0,
                stroke_width: config.path_stroke_width,
                glow: config.glow,
            };
            let members: HashSet<&str> = path.iter().map(String::as_str).collect();
            let steps: HashSet<(&str, &str)> = path
                .windows(2)
                .flat_map(|pair| {
                    let (a, b) = (pair[0].as_str(), pair[1].as_str());
                    [(a, b), (b, a)]
                })
                .collect();
            for node in &mut nodes {
                if members.contains(node.id.as_str()) {
                    node.emphasis = Some(emphasis);
                }
            }
            for edge in &mut edges {
                if steps.contains(&(edge.source.as_str(), edge.target.as_str())) {
                    edge.emphasis = Some(emphasis);
                }
            }
        }
        HighlightState::Impact { nodes: impacted, .. } => {
            let impacted: HashSet<&str> = impacted.iter().map(String::as_str).collect();
            for node in &mut nodes {
                node.emphasis = Some(if impacted.contains(node.id.as_str()) {
                    Emphasis {
                        role: EmphasisRole::Impact,
                        opacity: 1.0,
                        stroke_width: config.impact_stroke_width,
                        glow: false,
                    }
                } else {
                    Emphasis {
                        role: EmphasisRole::Dimmed,
                        opacity: config.dim_opacity,
                        stroke_width: config.base_stroke_width,
                        glow: false,
                    }
                });
            }
        }
    }

    (nodes, edges)
}

/// Nodes reachable downstream from `seeds` within `depth` hops, seeds first,
/// then in breadth-first order.
pub fn impact_closure<'a, I>(edges: I, seeds: &[String], depth: u32) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (source, target) in edges {
        adjacency.entry(source).or_default().push(target);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
    for seed in seeds {
        if seen.insert(seed.as_str()) {
            order.push(seed.clone());
            queue.push_back((seed.as_str(), 0));
        }
    }
    while let Some((id, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        for &next in adjacency.get(id).into_iter().flatten() {
            if seen.insert(next) {
                order.push(next.to_string());
                queue.push_back((next, hops + 1));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Point;
    use crate::lod::Tier;

    fn node(id: &str) -> RenderNode {
        RenderNode {
            id: id.to_string(),
            kind: "x".to_string(),
            label: id.to_string(),
            severity: None,
            position: Point::default(),
            parent_id: None,
            cluster_membership: None,
            cluster: None,
            tier: Tier::Full,
            emphasis: None,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> RenderEdge {
        RenderEdge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            kind: None,
            merged: 1,
            emphasis: None,
        }
    }

    fn abcd() -> (Vec<RenderNode>, Vec<RenderEdge>) {
        let nodes = ["A", "B", "C", "D"].into_iter().map(node).collect();
        let edges = vec![edge("ab", "A", "B"), edge("bc", "B", "C"), edge("cd", "C", "D")];
        (nodes, edges)
    }

    fn path(ids: &[&str]) -> HighlightState {
        HighlightState::Path {
            nodes: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn path_emphasizes_only_consecutive_edges() {
        let (nodes, edges) = abcd();
        let (nodes, edges) =
            apply_highlight(&nodes, &edges, &path(&["A", "B", "D"]), &HighlightConfig::default());
        let emphasized: Vec<&str> = edges
            .iter()
            .filter(|e| e.emphasis.is_some())
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(emphasized, vec!["ab"]);
        let lit: Vec<&str> = nodes
            .iter()
            .filter(|n| n.emphasis.is_some())
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(lit, vec!["A", "B", "D"]);
    }

    #[test]
    fn path_matches_edges_in_either_direction() {
        let (nodes, edges) = abcd();
        let (_, edges) =
            apply_highlight(&nodes, &edges, &path(&["C", "B"]), &HighlightConfig::default());
        assert!(edges.iter().find(|e| e.id == "bc").unwrap().emphasis.is_some());
    }

    #[test]
    fn impact_set_dims_everything_else() {
        let (nodes, edges) = abcd();
        let state = HighlightState::Impact {
            nodes: vec!["B".to_string()],
            depth: 1,
        };
        let config = HighlightConfig::default();
        let (nodes, edges) = apply_highlight(&nodes, &edges, &state, &config);
        let b = nodes[1].emphasis.unwrap();
        assert_eq!(b.role, EmphasisRole::Impact);
        assert_eq!(b.opacity, 1.0);
        let a = nodes[0].emphasis.unwrap();
        assert_eq!(a.role, EmphasisRole::Dimmed);
        assert_eq!(a.opacity, config.dim_opacity);
        assert!(edges.iter().all(|e| e.emphasis.is_none()));
    }

    #[test]
    fn clearing_restores_the_baseline() {
        let (nodes, edges) = abcd();
        let config = HighlightConfig::default();
        let (lit_nodes, lit_edges) = apply_highlight(&nodes, &edges, &path(&["A", "B"]), &config);
        let impact = HighlightState::Impact {
            nodes: vec!["C".to_string()],
            depth: 0,
        };
        let (lit_nodes, lit_edges) = apply_highlight(&lit_nodes, &lit_edges, &impact, &config);
        let (cleared_nodes, cleared_edges) =
            apply_highlight(&lit_nodes, &lit_edges, &HighlightState::None, &config);
        assert_eq!(cleared_nodes, nodes);
        assert_eq!(cleared_edges, edges);
    }

    #[test]
    fn map_ids_folds_collapsed_path_steps() {
        let state = path(&["a", "m1", "m2", "b"]);
        let mapped = state.map_ids(|id| {
            if id.starts_with('m') {
                "cluster:m".to_string()
            } else {
                id.to_string()
            }
        });
        assert_eq!(mapped, path(&["a", "cluster:m", "b"]));
    }

    #[test]
    fn impact_closure_respects_depth() {
        let edges = [("a", "b"), ("b", "c"), ("c", "d"), ("x", "a")];
        let seeds = vec!["a".to_string()];
        assert_eq!(impact_closure(edges, &seeds, 0), vec!["a"]);
        assert_eq!(impact_closure(edges, &seeds, 2), vec!["a", "b", "c"]);
        assert_eq!(impact_closure(edges, &seeds, 10), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn highlight_state_uses_mode_tag() {
        let json = r#"{"mode":"impact","nodes":["a"],"depth":2}"#;
        let state: HighlightState = serde_json::from_str(json).unwrap();
        assert_eq!(
            state,
            HighlightState::Impact {
                nodes: vec!["a".to_string()],
                depth: 2
            }
        );
    }
}
