//! Cluster engine: folds sibling nodes sharing a grouping key into synthetic
//! cluster nodes, bounded by a size band.
//!
//! - groups are formed per hierarchy scope, keyed by `(parent, key)`
//! - groups below `min_size` pass through ungrouped
//! - groups above `max_size` are cut into sequential chunks of `max_size`
//! - a cluster starts at the centroid of its members

mod edges;
mod key;
mod layout;
mod project;

pub use edges::rewrite_edges;
pub use key::*;
pub use layout::{centroid, ring_positions};
pub use project::{Projection, project};

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

use crate::config::ClusterConfig;
use crate::ir::{Graph, GraphVersion, Point, ResourceNode, Severity};

pub const CLUSTER_ID_PREFIX: &str = "cluster:";
pub const CLUSTER_KIND: &str = "cluster";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Option<Severity>) {
        match severity {
            Some(Severity::Low) => self.low += 1,
            Some(Severity::Medium) => self.medium += 1,
            Some(Severity::High) => self.high += 1,
            Some(Severity::Critical) => self.critical += 1,
            None => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical + self.unknown
    }

    pub fn highest(&self) -> Option<Severity> {
        if self.critical > 0 {
            Some(Severity::Critical)
        } else if self.high > 0 {
            Some(Severity::High)
        } else if self.medium > 0 {
            Some(Severity::Medium)
        } else if self.low > 0 {
            Some(Severity::Low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    pub id: String,
    pub cluster_key: String,
    pub label: String,
    /// Hierarchy scope the members share.
    pub parent_id: Option<String>,
    pub chunk: Option<usize>,
    pub member_ids: Vec<String>,
    pub is_expanded: bool,
    pub severity_counts: SeverityCounts,
    pub position: Point,
}

/// What the renderer needs to draw a cluster node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub key: String,
    pub member_count: usize,
    pub expanded: bool,
    pub severity_counts: SeverityCounts,
}

/// Result of one clustering pass: the clusters plus the reverse membership
/// index. Every graph node is either in exactly one cluster or listed in
/// `ungrouped`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    pub clusters: Vec<ClusterNode>,
    pub ungrouped: Vec<String>,
    pub group_by: GroupBy,
    pub version: GraphVersion,
    membership: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl Clustering {
    /// Every node ungrouped.
    pub fn passthrough(graph: &Graph, group_by: GroupBy) -> Self {
        Self {
            clusters: Vec::new(),
            ungrouped: graph.nodes.iter().map(|node| node.id.clone()).collect(),
            group_by,
            version: graph.version,
            membership: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn get(&self, cluster_id: &str) -> Option<&ClusterNode> {
        self.by_id.get(cluster_id).map(|idx| &self.clusters[*idx])
    }

    pub fn cluster_of(&self, node_id: &str) -> Option<&ClusterNode> {
        self.membership.get(node_id).map(|idx| &self.clusters[*idx])
    }

    pub fn is_cluster(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

struct Group<'g> {
    scope: Option<&'g str>,
    key: String,
    members: Vec<&'g ResourceNode>,
}

pub fn cluster(graph: &Graph, options: &ClusterConfig, custom: Option<&CustomKeyFn>) -> Clustering {
    if graph.is_empty()
        || !options.band_is_valid()
        || (options.group_by == GroupBy::Custom && custom.is_none())
    {
        return Clustering::passthrough(graph, options.group_by);
    }

    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut slots: HashMap<(Option<&str>, String), usize> = HashMap::new();
    for node in &graph.nodes {
        let Some(key) = group_key(node, options.group_by, custom) else {
            continue;
        };
        let scope = node
            .parent_id
            .as_deref()
            .filter(|parent| *parent != node.id && graph.contains(parent));
        let slot = *slots.entry((scope, key.clone())).or_insert_with(|| {
            groups.push(Group {
                scope,
                key,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(node);
    }

    let mut clustering = Clustering {
        group_by: options.group_by,
        version: graph.version,
        ..Default::default()
    };

    for group in &groups {
        if group.members.len() < options.min_size {
            continue;
        }
        if group.members.len() <= options.max_size {
            push_cluster(&mut clustering, graph, group, &group.members, None);
            continue;
        }
        for (chunk, members) in group.members.chunks(options.max_size).enumerate() {
            push_cluster(&mut clustering, graph, group, members, Some(chunk));
        }
    }

    clustering.ungrouped = graph
        .nodes
        .iter()
        .filter(|node| !clustering.membership.contains_key(&node.id))
        .map(|node| node.id.clone())
        .collect();

    tracing::debug!(
        group_by = ?options.group_by,
        clusters = clustering.clusters.len(),
        ungrouped = clustering.ungrouped.len(),
        "clustered graph"
    );
    clustering
}

fn push_cluster(
    clustering: &mut Clustering,
    graph: &Graph,
    group: &Group<'_>,
    members: &[&ResourceNode],
    chunk: Option<usize>,
) {
    let mut id = String::from(CLUSTER_ID_PREFIX);
    if let Some(scope) = group.scope {
        let _ = write!(id, "{scope}/");
    }
    id.push_str(&group.key);
    let label = match chunk {
        Some(chunk) => {
            let _ = write!(id, "-{chunk}");
            format!("{}-{chunk}", group.key)
        }
        None => group.key.clone(),
    };
    if graph.contains(&id) {
        tracing::warn!(cluster = %id, "cluster id shadows a resource id");
    }

    let mut severity_counts = SeverityCounts::default();
    for member in members {
        severity_counts.add(member.severity);
    }

    let index = clustering.clusters.len();
    for member in members {
        clustering.membership.insert(member.id.clone(), index);
    }
    clustering.by_id.insert(id.clone(), index);
    clustering.clusters.push(ClusterNode {
        id,
        cluster_key: group.key.clone(),
        label,
        parent_id: group.scope.map(str::to_string),
        chunk,
        member_ids: members.iter().map(|member| member.id.clone()).collect(),
        is_expanded: false,
        severity_counts,
        position: centroid(members.iter().map(|member| member.position)),
    });
}
