//! Sanitizes a [`RawGraph`] into a [`Graph`]: trimmed unique ids, parsed
//! severities, default grid positions, and only edges between known nodes.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::NormalizeConfig;
use crate::ir::{Edge, Graph, Point, RawGraph, ResourceNode, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub nodes: usize,
    pub edges: usize,
    pub empty_ids: usize,
    pub duplicate_ids: usize,
    pub unknown_severities: usize,
    pub placed: usize,
    pub duplicate_edge_ids: usize,
    pub dangling_edges: usize,
    pub self_loops: usize,
}

impl NormalizeReport {
    pub fn dropped_nodes(&self) -> usize {
        self.empty_ids + self.duplicate_ids
    }

    pub fn dropped_edges(&self) -> usize {
        self.duplicate_edge_ids + self.dangling_edges + self.self_loops
    }
}

pub fn normalize(raw: &RawGraph, config: &NormalizeConfig) -> (Graph, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(raw.nodes.len());
    let mut nodes: Vec<ResourceNode> = Vec::with_capacity(raw.nodes.len());
    let mut unplaced: Vec<usize> = Vec::new();

    for raw_node in &raw.nodes {
        let id = raw_node.id.trim();
        if id.is_empty() {
            report.empty_ids += 1;
            continue;
        }
        if !seen.insert(id) {
            report.duplicate_ids += 1;
            tracing::warn!(id, "duplicate node id dropped");
            continue;
        }

        let severity = match raw_node.severity.as_deref() {
            Some(token) => {
                let parsed = Severity::from_token(token);
                if parsed.is_none() {
                    report.unknown_severities += 1;
                }
                parsed
            }
            None => None,
        };
        let label = raw_node
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(id);
        let parent_id = raw_node
            .parent_id
            .as_deref()
            .map(str::trim)
            .filter(|parent| !parent.is_empty() && *parent != id)
            .map(str::to_string);

        let position = raw_node.position.filter(Point::is_finite);
        if position.is_none() {
            unplaced.push(nodes.len());
        }
        nodes.push(ResourceNode {
            id: id.to_string(),
            kind: raw_node.kind.trim().to_string(),
            display_name: label.to_string(),
            severity,
            attributes: raw_node.attributes.clone(),
            position: position.unwrap_or_default(),
            parent_id,
        });
    }
    if report.empty_ids > 0 {
        tracing::warn!(count = report.empty_ids, "nodes without an id dropped");
    }

    let columns = grid_columns(nodes.len());
    for idx in &unplaced {
        nodes[*idx].position = grid_position(*idx, columns, config.grid_spacing);
    }
    report.placed = unplaced.len();

    let mut edge_ids: HashSet<String> = HashSet::with_capacity(raw.edges.len());
    let mut edges: Vec<Edge> = Vec::with_capacity(raw.edges.len());
    for (index, raw_edge) in raw.edges.iter().enumerate() {
        let source = raw_edge.source.trim();
        let target = raw_edge.target.trim();
        if !seen.contains(source) || !seen.contains(target) {
            report.dangling_edges += 1;
            continue;
        }
        if source == target {
            report.self_loops += 1;
            continue;
        }
        let id = raw_edge
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{source}->{target}#{index}"));
        if !edge_ids.insert(id.clone()) {
            report.duplicate_edge_ids += 1;
            continue;
        }
        edges.push(Edge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            label: raw_edge.label.clone(),
            kind: raw_edge.kind.clone(),
        });
    }
    if report.dropped_edges() > 0 {
        tracing::warn!(
            dangling = report.dangling_edges,
            self_loops = report.self_loops,
            duplicates = report.duplicate_edge_ids,
            "edges dropped"
        );
    }

    report.nodes = nodes.len();
    report.edges = edges.len();
    let graph = Graph::from_parts(nodes, edges);
    tracing::debug!(
        version = %graph.version,
        nodes = report.nodes,
        edges = report.edges,
        placed = report.placed,
        "normalized graph"
    );
    (graph, report)
}

fn grid_columns(count: usize) -> usize {
    let mut columns = 1;
    while columns * columns < count {
        columns += 1;
    }
    columns
}

fn grid_position(index: usize, columns: usize, spacing: f32) -> Point {
    let column = index % columns;
    let row = index / columns;
    Point::new(column as f32 * spacing, row as f32 * spacing)
}
