use crate::cluster::ClusterSummary;
use crate::config::LodConfig;
use crate::frame::Frame;
use crate::highlight::Emphasis;
use crate::ir::Severity;
use crate::lod::{Tier, tier_label};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDump {
    pub version: String,
    pub generation: u64,
    pub tier: Tier,
    pub total_nodes: usize,
    pub visible_nodes: Vec<NodeDump>,
    pub visible_edges: Vec<EdgeDump>,
    pub progress_percent: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub position: [f32; 2],
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_membership: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emphasis: Option<Emphasis>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub merged: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emphasis: Option<Emphasis>,
}

impl FrameDump {
    /// Labels are presented per node tier: truncated when compact, absent
    /// for points.
    pub fn from_frame(frame: &Frame, lod: &LodConfig) -> Self {
        let visible_nodes = frame
            .visible_nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                kind: node.kind.clone(),
                label: tier_label(&node.label, node.tier, lod),
                severity: node.severity,
                position: [node.position.x, node.position.y],
                tier: node.tier,
                parent_id: node.parent_id.clone(),
                cluster_membership: node.cluster_membership.clone(),
                cluster: node.cluster.clone(),
                emphasis: node.emphasis,
            })
            .collect();

        let visible_edges = frame
            .visible_edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                label: edge.label.clone(),
                kind: edge.kind.clone(),
                merged: edge.merged,
                emphasis: edge.emphasis,
            })
            .collect();

        FrameDump {
            version: frame.version.to_string(),
            generation: frame.generation,
            tier: frame.tier,
            total_nodes: frame.total_nodes,
            visible_nodes,
            visible_edges,
            progress_percent: frame.progress_percent,
        }
    }
}

pub fn frame_to_json(frame: &Frame, lod: &LodConfig) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&FrameDump::from_frame(frame, lod))?)
}

pub fn write_frame_dump(path: &Path, frame: &Frame, lod: &LodConfig) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = FrameDump::from_frame(frame, lod);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
