//! Renderable output model handed to the rendering shell.

use crate::cluster::ClusterSummary;
use crate::highlight::Emphasis;
use crate::ir::{GraphVersion, Point, Severity};
use crate::lod::Tier;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub severity: Option<Severity>,
    pub position: Point,
    /// Visible representative of the hierarchy parent, if any.
    pub parent_id: Option<String>,
    /// Set on members of an expanded cluster.
    pub cluster_membership: Option<String>,
    /// Set on synthetic cluster nodes.
    pub cluster: Option<ClusterSummary>,
    pub tier: Tier,
    pub emphasis: Option<Emphasis>,
}

impl RenderNode {
    pub fn is_cluster(&self) -> bool {
        self.cluster.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub kind: Option<String>,
    /// Number of original edges folded into this one by cluster rewriting.
    pub merged: usize,
    pub emphasis: Option<Emphasis>,
}

/// One composed picture: the materialized prefix with LOD and highlight
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub version: GraphVersion,
    pub generation: u64,
    pub tier: Tier,
    pub visible_nodes: Vec<RenderNode>,
    pub visible_edges: Vec<RenderEdge>,
    pub progress_percent: f32,
    pub total_nodes: usize,
}

impl Frame {
    pub fn empty() -> Self {
        Self {
            version: GraphVersion::default(),
            generation: 0,
            tier: Tier::Full,
            visible_nodes: Vec::new(),
            visible_edges: Vec::new(),
            progress_percent: 100.0,
            total_nodes: 0,
        }
    }

    pub fn node(&self, id: &str) -> Option<&RenderNode> {
        self.visible_nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&RenderEdge> {
        self.visible_edges.iter().find(|edge| edge.id == id)
    }
}
