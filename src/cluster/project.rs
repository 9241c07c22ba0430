use std::collections::{HashMap, HashSet};

use super::{CLUSTER_KIND, ClusterNode, ClusterSummary, Clustering, ring_positions, rewrite_edges};
use crate::frame::{RenderEdge, RenderNode};
use crate::hierarchy::Hierarchy;
use crate::ir::{Graph, Point, ResourceNode};
use crate::lod::Tier;
use crate::view::ViewState;

/// The visible node/edge set for one `(graph, clustering, view)` triple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    hidden: HashMap<String, String>,
}

impl Projection {
    /// The id that stands in for `id` on screen: the collapsed cluster that
    /// hides it, or `id` itself.
    pub fn visible_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.hidden.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden.contains_key(id)
    }
}

fn representative<'a>(
    graph: &'a Graph,
    clustering: &'a Clustering,
    view: &ViewState,
    id: &str,
) -> Option<&'a str> {
    if let Some(cluster) = clustering.cluster_of(id) {
        if !view.is_expanded(&cluster.id) {
            return Some(cluster.id.as_str());
        }
    }
    graph.node(id).map(|node| node.id.as_str())
}

pub fn project(
    graph: &Graph,
    hierarchy: &Hierarchy,
    clustering: &Clustering,
    view: &ViewState,
    expand_radius: f32,
) -> Projection {
    let mut projection = Projection::default();
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut rings: HashMap<&str, Vec<Point>> = HashMap::new();

    for node in &graph.nodes {
        let parent = hierarchy
            .parent_of(&node.id)
            .and_then(|parent| representative(graph, clustering, view, parent))
            .filter(|parent| *parent != node.id)
            .map(str::to_string);

        let Some(cluster) = clustering.cluster_of(&node.id) else {
            let position = view.position_or(&node.id, node.position);
            projection
                .nodes
                .push(resource_node(node, position, parent, None));
            continue;
        };

        let expanded = view.is_expanded(&cluster.id);
        if emitted.insert(cluster.id.as_str()) {
            let cluster_parent = cluster
                .parent_id
                .as_deref()
                .and_then(|scope| representative(graph, clustering, view, scope))
                .filter(|scope| *scope != cluster.id)
                .map(str::to_string);
            projection
                .nodes
                .push(cluster_node(cluster, expanded, view, cluster_parent));
        }

        if !expanded {
            projection
                .hidden
                .insert(node.id.clone(), cluster.id.clone());
            continue;
        }

        let position = match view.positions.get(&node.id) {
            Some(position) => *position,
            None => {
                let ring = rings.entry(cluster.id.as_str()).or_insert_with(|| {
                    let center = view.position_or(&cluster.id, cluster.position);
                    ring_positions(center, expand_radius, cluster.member_ids.len())
                });
                cluster
                    .member_ids
                    .iter()
                    .position(|member| *member == node.id)
                    .and_then(|slot| ring.get(slot).copied())
                    .unwrap_or(cluster.position)
            }
        };
        projection
            .nodes
            .push(resource_node(node, position, parent, Some(cluster.id.clone())));
    }

    projection.edges = rewrite_edges(&graph.edges, |id| {
        representative(graph, clustering, view, id)
    });

    tracing::debug!(
        nodes = projection.nodes.len(),
        edges = projection.edges.len(),
        hidden = projection.hidden.len(),
        "projected view"
    );
    projection
}

fn resource_node(
    node: &ResourceNode,
    position: Point,
    parent_id: Option<String>,
    cluster_membership: Option<String>,
) -> RenderNode {
    RenderNode {
        id: node.id.clone(),
        kind: node.kind.clone(),
        label: node.display_name.clone(),
        severity: node.severity,
        position,
        parent_id,
        cluster_membership,
        cluster: None,
        tier: Tier::Full,
        emphasis: None,
    }
}

fn cluster_node(
    cluster: &ClusterNode,
    expanded: bool,
    view: &ViewState,
    parent_id: Option<String>,
) -> RenderNode {
    RenderNode {
        id: cluster.id.clone(),
        kind: CLUSTER_KIND.to_string(),
        label: cluster.label.clone(),
        severity: cluster.severity_counts.highest(),
        position: view.position_or(&cluster.id, cluster.position),
        parent_id,
        cluster_membership: None,
        cluster: Some(ClusterSummary {
            key: cluster.cluster_key.clone(),
            member_count: cluster.member_ids.len(),
            expanded,
            severity_counts: cluster.severity_counts,
        }),
        tier: Tier::Full,
        emphasis: None,
    }
}
