use std::collections::HashMap;

use crate::frame::RenderEdge;
use crate::ir::Edge;

/// Redirects edge endpoints to their visible representative. Edges whose
/// endpoints resolve to nothing are dropped, edges that collapse onto a
/// single node are suppressed, and redirected edges landing on the same pair
/// are merged into the first one. Edges between visible nodes pass through
/// untouched, parallels included.
pub fn rewrite_edges<'a, F>(edges: &[Edge], representative: F) -> Vec<RenderEdge>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out: Vec<RenderEdge> = Vec::with_capacity(edges.len());
    let mut seen: HashMap<(&'a str, &'a str), usize> = HashMap::new();

    for edge in edges {
        let (Some(source), Some(target)) =
            (representative(&edge.source), representative(&edge.target))
        else {
            continue;
        };
        if source == target {
            continue;
        }
        let redirected = source != edge.source || target != edge.target;
        if redirected {
            if let Some(&slot) = seen.get(&(source, target)) {
                out[slot].merged += 1;
                continue;
            }
            seen.insert((source, target), out.len());
        }
        out.push(RenderEdge {
            id: edge.id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            label: if redirected { None } else { edge.label.clone() },
            kind: edge.kind.clone(),
            merged: 1,
            emphasis: None,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse_bc(id: &str) -> Option<&'static str> {
        match id {
            "a" => Some("a"),
            "b" | "c" => Some("cluster:x"),
            "d" => Some("d"),
            _ => None,
        }
    }

    #[test]
    fn redirects_and_merges_into_cluster() {
        let edges = vec![
            Edge::new("e1", "a", "b"),
            Edge::new("e2", "a", "c"),
            Edge::new("e3", "c", "d"),
        ];
        let out = rewrite_edges(&edges, collapse_bc);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "e1");
        assert_eq!(out[0].target, "cluster:x");
        assert_eq!(out[0].merged, 2);
        assert_eq!(out[1].source, "cluster:x");
        assert_eq!(out[1].target, "d");
    }

    #[test]
    fn parallel_edges_between_visible_nodes_stay_distinct() {
        let mut net = Edge::new("net", "a", "d");
        net.kind = Some("network".to_string());
        let mut iam = Edge::new("iam", "a", "d");
        iam.kind = Some("iam".to_string());
        let out = rewrite_edges(&[net, iam], collapse_bc);
        let ids: Vec<(&str, usize)> = out.iter().map(|e| (e.id.as_str(), e.merged)).collect();
        assert_eq!(ids, vec![("net", 1), ("iam", 1)]);
        assert_eq!(out[1].kind.as_deref(), Some("iam"));
    }

    #[test]
    fn suppresses_edges_inside_one_cluster() {
        let edges = vec![Edge::new("e1", "b", "c")];
        assert!(rewrite_edges(&edges, collapse_bc).is_empty());
    }

    #[test]
    fn drops_edges_to_unknown_nodes() {
        let edges = vec![Edge::new("e1", "a", "ghost"), Edge::new("e2", "a", "d")];
        let out = rewrite_edges(&edges, collapse_bc);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "e2");
    }
}
