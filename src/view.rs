//! Session view state kept outside the pipeline stages.
//!
//! Everything the shell would otherwise hold in widget state (expanded
//! clusters, positions members were laid out at, selection, hover) lives in
//! [`ViewState`], which is serializable and handed to the pure stages.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::cluster::{Clustering, ring_positions};
use crate::ir::Point;

pub const MIN_ZOOM: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f32,
    pub offset: Point,
}

impl Viewport {
    pub fn new(zoom: f32, offset: Point) -> Self {
        Self {
            zoom: sanitize_zoom(zoom),
            offset,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Point::default(),
        }
    }
}

pub fn sanitize_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() && zoom > MIN_ZOOM {
        zoom
    } else {
        MIN_ZOOM
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    pub expanded: BTreeSet<String>,
    /// Positions assigned during a session (ring layout on expansion, user
    /// drags). Survive collapse so a later expansion reuses them.
    pub positions: BTreeMap<String, Point>,
    pub selected: Option<String>,
    pub hovered: Option<String>,
}

impl ViewState {
    pub fn is_expanded(&self, cluster_id: &str) -> bool {
        self.expanded.contains(cluster_id)
    }

    pub fn position_or(&self, id: &str, fallback: Point) -> Point {
        self.positions.get(id).copied().unwrap_or(fallback)
    }

    /// Marks the cluster expanded and lays out members that have no stored
    /// position on a ring around the cluster. Returns false if nothing
    /// changed.
    pub fn expand(&mut self, clustering: &Clustering, cluster_id: &str, radius: f32) -> bool {
        let Some(cluster) = clustering.get(cluster_id) else {
            return false;
        };
        if self.expanded.contains(&cluster.id) {
            return false;
        }
        let center = self.position_or(&cluster.id, cluster.position);
        let ring = ring_positions(center, radius, cluster.member_ids.len());
        for (member, position) in cluster.member_ids.iter().zip(ring) {
            self.positions.entry(member.clone()).or_insert(position);
        }
        self.expanded.insert(cluster.id.clone())
    }

    pub fn collapse(&mut self, cluster_id: &str) -> bool {
        self.expanded.remove(cluster_id)
    }

    pub fn toggle(&mut self, clustering: &Clustering, cluster_id: &str, radius: f32) -> bool {
        if self.is_expanded(cluster_id) {
            self.collapse(cluster_id)
        } else {
            self.expand(clustering, cluster_id, radius)
        }
    }

    pub fn expand_all(&mut self, clustering: &Clustering, radius: f32) -> usize {
        clustering
            .clusters
            .iter()
            .filter(|cluster| self.expand(clustering, &cluster.id, radius))
            .count()
    }

    pub fn collapse_all(&mut self) -> usize {
        let count = self.expanded.len();
        self.expanded.clear();
        count
    }

    pub fn move_node(&mut self, id: &str, position: Point) {
        if position.is_finite() {
            self.positions.insert(id.to_string(), position);
        }
    }

    /// Drops expansion flags for clusters that no longer exist.
    pub fn retain_clusters(&mut self, clustering: &Clustering) {
        self.expanded.retain(|id| clustering.is_cluster(id));
    }
}
