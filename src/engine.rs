//! Stateful driver tying the pipeline stages to a rendering shell.
//!
//! Heavy stages (normalize, hierarchy, cluster) run only when the graph
//! version or the grouping criterion changes. View changes re-project and
//! retarget the materializer. LOD and highlighting are applied per frame.

use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::cluster::{self, Clustering, CustomKeyFn, GroupBy, Projection};
use crate::config::EngineConfig;
use crate::error::{ConfigWarning, InputError};
use crate::frame::Frame;
use crate::hierarchy::{self, Hierarchy, HierarchyReport};
use crate::highlight::{HighlightState, apply_highlight, impact_closure};
use crate::ir::{Graph, GraphVersion, Point, RawGraph, ResourceNode};
use crate::lod::{LodTracker, Tier, node_tier, select_tier};
use crate::normalize::{NormalizeReport, normalize};
use crate::progressive::{Materializer, Schedule};
use crate::view::{ViewState, Viewport};

static NO_CLUSTERS: Lazy<Clustering> = Lazy::new(Clustering::default);

/// Stage outputs for one graph version. The clustering slot is emptied when
/// the grouping criterion changes and rebuilt on demand.
#[derive(Debug, Clone, Default)]
struct PipelineCache {
    version: Option<GraphVersion>,
    /// Input as delivered, kept so a normalize config change can start over.
    raw: RawGraph,
    /// Normalized graph before hierarchy inference, kept so a hierarchy
    /// config change can re-resolve from scratch.
    normalized: Graph,
    graph: Graph,
    hierarchy: Hierarchy,
    normalize_report: NormalizeReport,
    hierarchy_report: HierarchyReport,
    clustering: Option<Clustering>,
}

pub struct Engine {
    config: EngineConfig,
    custom_key: Option<Arc<CustomKeyFn>>,
    warnings: Vec<ConfigWarning>,
    cache: PipelineCache,
    projection: Projection,
    view: ViewState,
    viewport: Viewport,
    lod: LodTracker,
    highlight: HighlightState,
    priority: Vec<String>,
    materializer: Materializer,
    frame: Arc<Frame>,
    dirty: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("version", &self.cache.version)
            .field("nodes", &self.cache.graph.len())
            .field("clusters", &self.clustering().len())
            .field("group_by", &self.config.cluster.group_by)
            .field("custom_key", &self.custom_key.is_some())
            .field("revealed", &self.materializer.revealed_batches())
            .finish()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut engine = Self {
            materializer: Materializer::new(config.progressive),
            config,
            custom_key: None,
            warnings: Vec::new(),
            cache: PipelineCache::default(),
            projection: Projection::default(),
            view: ViewState::default(),
            viewport: Viewport::default(),
            lod: LodTracker::default(),
            highlight: HighlightState::None,
            priority: Vec::new(),
            frame: Arc::new(Frame::empty()),
            dirty: true,
        };
        engine.revalidate();
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies a new configuration and rebuilds every stage from the raw
    /// input.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.materializer.set_config(config.progressive);
        self.config = config;
        self.revalidate();
        if self.cache.version.is_none() {
            return;
        }
        let (graph, normalize_report) = normalize(&self.cache.raw, &self.config.normalize);
        self.cache.version = Some(graph.version);
        self.cache.normalized = graph;
        self.cache.normalize_report = normalize_report;
        self.rebuild(true);
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    fn revalidate(&mut self) {
        let warnings = self.config.validate(self.custom_key.is_some());
        for warning in &warnings {
            if !self.warnings.contains(warning) {
                tracing::warn!("{warning}");
            }
        }
        self.warnings = warnings;
    }

    pub fn set_graph_json(&mut self, input: &str) -> Result<bool, InputError> {
        let raw = RawGraph::from_json(input)?;
        Ok(self.set_graph(&raw))
    }

    /// Normalizes and loads a graph. Returns false when the normalized graph
    /// has the same version as the loaded one; nothing is recomputed then.
    pub fn set_graph(&mut self, raw: &RawGraph) -> bool {
        let (graph, normalize_report) = normalize(raw, &self.config.normalize);
        if self.cache.version == Some(graph.version) {
            tracing::debug!(version = %graph.version, "graph unchanged; keeping pipeline cache");
            return false;
        }
        self.cache = PipelineCache {
            version: Some(graph.version),
            raw: raw.clone(),
            normalized: graph,
            normalize_report,
            ..Default::default()
        };
        self.rebuild(true);
        true
    }

    /// Re-runs hierarchy inference and clustering on the loaded graph.
    fn rebuild(&mut self, restart: bool) {
        if self.cache.version.is_none() {
            return;
        }
        let (graph, hierarchy_report) =
            hierarchy::resolve(self.cache.normalized.clone(), &self.config.hierarchy);
        self.cache.hierarchy = Hierarchy::build(&graph);
        self.cache.hierarchy_report = hierarchy_report;
        self.cache.graph = graph;
        self.cache.clustering = None;
        self.ensure_clustering();
        let clustering = self.cache.clustering.as_ref().unwrap_or(&NO_CLUSTERS);
        self.view.retain_clusters(clustering);
        self.reproject(restart);
    }

    fn ensure_clustering(&mut self) {
        if self.cache.clustering.is_some() {
            return;
        }
        let clustering = cluster::cluster(
            &self.cache.graph,
            &self.config.cluster,
            self.custom_key.as_deref(),
        );
        self.cache.clustering = Some(clustering);
    }

    fn reproject(&mut self, restart: bool) {
        self.ensure_clustering();
        let clustering = self.cache.clustering.as_ref().unwrap_or(&NO_CLUSTERS);
        self.projection = cluster::project(
            &self.cache.graph,
            &self.cache.hierarchy,
            clustering,
            &self.view,
            self.config.cluster.expand_radius,
        );
        let nodes = self.projection.nodes.clone();
        let edges = self.projection.edges.clone();
        let priority = self.visible_priority();
        if restart {
            self.materializer.restart(nodes, edges, &priority);
        } else {
            self.materializer.retarget(nodes, edges, &priority);
        }
        self.dirty = true;
    }

    fn visible_priority(&self) -> Vec<String> {
        self.priority
            .iter()
            .map(|id| self.projection.visible_id(id).to_string())
            .collect()
    }

    pub fn graph(&self) -> &Graph {
        &self.cache.graph
    }

    pub fn version(&self) -> Option<GraphVersion> {
        self.cache.version
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.cache.hierarchy
    }

    pub fn normalize_report(&self) -> &NormalizeReport {
        &self.cache.normalize_report
    }

    pub fn hierarchy_report(&self) -> &HierarchyReport {
        &self.cache.hierarchy_report
    }

    pub fn clustering(&self) -> &Clustering {
        self.cache.clustering.as_ref().unwrap_or(&NO_CLUSTERS)
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    /// Restores a saved view (expanded clusters, positions, selection).
    pub fn set_view_state(&mut self, view: ViewState) {
        self.view = view;
        let clustering = self.cache.clustering.as_ref().unwrap_or(&NO_CLUSTERS);
        self.view.retain_clusters(clustering);
        self.reproject(false);
    }

    /// Node ids revealed in the first batch of the next restart.
    pub fn set_priority_ids(&mut self, ids: Vec<String>) {
        self.priority = ids;
    }

    pub fn set_grouping_criterion(&mut self, group_by: GroupBy) {
        if self.config.cluster.group_by == group_by {
            return;
        }
        self.config.cluster.group_by = group_by;
        self.revalidate();
        self.regroup();
    }

    pub fn set_custom_grouping<F>(&mut self, key: F)
    where
        F: Fn(&ResourceNode) -> Option<String> + Send + Sync + 'static,
    {
        self.custom_key = Some(Arc::new(key));
        self.revalidate();
        if self.config.cluster.group_by == GroupBy::Custom {
            self.regroup();
        }
    }

    fn regroup(&mut self) {
        self.cache.clustering = None;
        self.view.collapse_all();
        if self.cache.version.is_some() {
            self.reproject(false);
        }
    }

    pub fn toggle_cluster(&mut self, cluster_id: &str) -> bool {
        let radius = self.config.cluster.expand_radius;
        let Some(clustering) = self.cache.clustering.as_ref() else {
            return false;
        };
        if !self.view.toggle(clustering, cluster_id, radius) {
            return false;
        }
        self.reproject(false);
        true
    }

    pub fn expand_all(&mut self) -> usize {
        let radius = self.config.cluster.expand_radius;
        let Some(clustering) = self.cache.clustering.as_ref() else {
            return 0;
        };
        let count = self.view.expand_all(clustering, radius);
        if count > 0 {
            self.reproject(false);
        }
        count
    }

    pub fn collapse_all(&mut self) -> usize {
        let count = self.view.collapse_all();
        if count > 0 {
            self.reproject(false);
        }
        count
    }

    pub fn select(&mut self, id: Option<&str>) {
        self.view.selected = id.map(str::to_string);
        self.dirty = true;
    }

    pub fn hover(&mut self, id: Option<&str>) {
        self.view.hovered = id.map(str::to_string);
        self.dirty = true;
    }

    pub fn move_node(&mut self, id: &str, position: Point) {
        if !self.cache.graph.contains(id) && !self.clustering().is_cluster(id) {
            return;
        }
        self.view.move_node(id, position);
        self.reproject(false);
    }

    pub fn set_highlight_path(&mut self, ids: Vec<String>) {
        self.highlight = HighlightState::Path { nodes: ids };
        self.dirty = true;
    }

    pub fn set_impact_set(&mut self, ids: Vec<String>, depth: u32) {
        self.highlight = HighlightState::Impact { nodes: ids, depth };
        self.dirty = true;
    }

    /// Highlights everything downstream of `seeds` within `depth` hops.
    pub fn set_impact_from(&mut self, seeds: &[String], depth: u32) {
        let edges = self
            .cache
            .graph
            .edges
            .iter()
            .map(|edge| (edge.source.as_str(), edge.target.as_str()));
        let impacted = impact_closure(edges, seeds, depth);
        self.set_impact_set(impacted, depth);
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = HighlightState::None;
        self.dirty = true;
    }

    pub fn highlight(&self) -> &HighlightState {
        &self.highlight
    }

    /// Returns the new tier when the viewport change crosses a LOD band
    /// relative to the last published frame.
    pub fn set_viewport(&mut self, zoom: f32, offset: Point) -> Option<Tier> {
        self.viewport = Viewport::new(zoom, offset);
        let changed = self.lod.update(
            self.viewport.zoom,
            self.materializer.total_nodes(),
            &self.config.lod,
        );
        if changed.is_some() {
            self.dirty = true;
        }
        changed
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn skip_progressive_load(&mut self) {
        self.materializer.skip_to_end();
        self.dirty = true;
    }

    pub fn tick(&mut self) -> bool {
        let revealed = self.materializer.tick();
        self.dirty |= revealed;
        revealed
    }

    pub fn start_progressive(&mut self) -> Schedule {
        self.materializer.start()
    }

    pub fn on_timer(&mut self, generation: u64) -> Schedule {
        self.materializer.on_timer(generation)
    }

    pub fn on_paint(&mut self, generation: u64) -> Schedule {
        let before = self.materializer.revealed_batches();
        let next = self.materializer.on_paint(generation);
        if self.materializer.revealed_batches() != before {
            self.dirty = true;
        }
        next
    }

    pub fn progress_percent(&self) -> f32 {
        self.materializer.progress_percent()
    }

    pub fn is_loading(&self) -> bool {
        !self.materializer.is_complete()
    }

    /// The current frame. Recomposed only when something it depends on
    /// changed since the last call.
    pub fn frame(&mut self) -> Arc<Frame> {
        if self.dirty {
            self.frame = Arc::new(self.compose());
            self.lod.record(self.frame.tier);
            self.dirty = false;
        }
        Arc::clone(&self.frame)
    }

    fn compose(&self) -> Frame {
        let highlight = self
            .highlight
            .map_ids(|id| self.projection.visible_id(id).to_string());
        let (mut nodes, edges) = apply_highlight(
            self.materializer.visible_nodes(),
            self.materializer.visible_edges(),
            &highlight,
            &self.config.highlight,
        );
        let tier = select_tier(
            self.viewport.zoom,
            self.materializer.total_nodes(),
            &self.config.lod,
        );
        for node in &mut nodes {
            node.tier = node_tier(tier, node, &self.view);
        }
        Frame {
            version: self.cache.version.unwrap_or_default(),
            generation: self.materializer.generation(),
            tier,
            visible_nodes: nodes,
            visible_edges: edges,
            progress_percent: self.materializer.progress_percent(),
            total_nodes: self.materializer.total_nodes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use crate::highlight::EmphasisRole;
    use crate::ir::{RawEdge, RawNode};

    fn raw_node(id: &str, kind: &str) -> RawNode {
        RawNode {
            id: id.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    fn raw_edge(source: &str, target: &str) -> RawEdge {
        RawEdge {
            source: source.to_string(),
            target: target.to_string(),
            ..Default::default()
        }
    }

    fn buckets_and_lambda() -> RawGraph {
        let mut nodes: Vec<RawNode> = (0..12)
            .map(|i| raw_node(&format!("b{i}"), "aws_s3_bucket"))
            .collect();
        nodes.push(raw_node("fn", "aws_lambda_function"));
        let edges = vec![raw_edge("fn", "b0"), raw_edge("fn", "b1")];
        RawGraph { nodes, edges }
    }

    fn loaded() -> Engine {
        let mut engine = Engine::default();
        engine.set_graph(&buckets_and_lambda());
        engine.skip_progressive_load();
        engine
    }

    #[test]
    fn empty_engine_yields_complete_empty_frame() {
        let mut engine = Engine::default();
        let frame = engine.frame();
        assert!(frame.visible_nodes.is_empty());
        assert_eq!(frame.progress_percent, 100.0);
    }

    #[test]
    fn loading_clusters_and_collapses_edges() {
        let mut engine = loaded();
        let frame = engine.frame();
        let ids: Vec<&str> = frame.visible_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["cluster:aws_s3_bucket", "fn"]);
        assert_eq!(frame.visible_edges.len(), 1);
        assert_eq!(frame.visible_edges[0].merged, 2);
        assert_eq!(frame.progress_percent, 100.0);
    }

    #[test]
    fn same_graph_is_not_recomputed() {
        let mut engine = loaded();
        let before = engine.frame();
        assert!(!engine.set_graph(&buckets_and_lambda()));
        let after = engine.frame();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn toggle_cluster_shows_members() {
        let mut engine = loaded();
        assert!(engine.toggle_cluster("cluster:aws_s3_bucket"));
        let frame = engine.frame();
        assert_eq!(frame.visible_nodes.len(), 14);
        assert_eq!(frame.visible_edges.len(), 2);
        assert!(engine.toggle_cluster("cluster:aws_s3_bucket"));
        assert_eq!(engine.frame().visible_nodes.len(), 2);
        assert!(!engine.toggle_cluster("cluster:missing"));
    }

    #[test]
    fn grouping_change_rebuilds_clusters() {
        let mut engine = loaded();
        engine.expand_all();
        engine.set_grouping_criterion(GroupBy::Provider);
        assert!(engine.view_state().expanded.is_empty());
        let clustering = engine.clustering();
        assert_eq!(clustering.len(), 1);
        assert_eq!(clustering.clusters[0].cluster_key, "aws");
        assert_eq!(clustering.clusters[0].member_ids.len(), 13);
    }

    #[test]
    fn custom_grouping_without_function_warns_and_passes_through() {
        let mut engine = loaded();
        engine.set_grouping_criterion(GroupBy::Custom);
        assert!(engine.warnings().contains(&ConfigWarning::CustomKeyMissing));
        assert!(engine.clustering().is_empty());
        engine.set_custom_grouping(|node| Some(node.kind.clone()));
        assert!(engine.warnings().is_empty());
        assert_eq!(engine.clustering().len(), 1);
    }

    #[test]
    fn highlight_path_through_collapsed_cluster() {
        let mut engine = loaded();
        engine.set_highlight_path(vec!["fn".to_string(), "b0".to_string()]);
        let frame = engine.frame();
        let edge = &frame.visible_edges[0];
        assert_eq!(edge.emphasis.map(|e| e.role), Some(EmphasisRole::Path));
        engine.clear_highlight();
        let frame = engine.frame();
        assert!(frame.visible_nodes.iter().all(|n| n.emphasis.is_none()));
        assert!(frame.visible_edges.iter().all(|e| e.emphasis.is_none()));
    }

    #[test]
    fn impact_from_follows_downstream_edges() {
        let mut engine = loaded();
        engine.toggle_cluster("cluster:aws_s3_bucket");
        engine.set_impact_from(&["fn".to_string()], 1);
        let frame = engine.frame();
        let impacted: Vec<&str> = frame
            .visible_nodes
            .iter()
            .filter(|n| n.emphasis.is_some_and(|e| e.role == EmphasisRole::Impact))
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(impacted, vec!["b0", "b1", "fn"]);
    }

    #[test]
    fn progressive_reveal_resets_on_new_graph() {
        let mut engine = Engine::new(EngineConfig {
            cluster: ClusterConfig {
                min_size: 1000,
                ..Default::default()
            },
            progressive: crate::config::ProgressiveConfig {
                batch_size: 5,
                ..Default::default()
            },
            ..Default::default()
        });
        engine.set_graph(&buckets_and_lambda());
        assert_eq!(engine.frame().progress_percent, 0.0);
        assert!(engine.tick());
        assert_eq!(engine.frame().visible_nodes.len(), 5);
        let mut other = buckets_and_lambda();
        other.nodes.push(raw_node("extra", "aws_sqs_queue"));
        assert!(engine.set_graph(&other));
        assert_eq!(engine.frame().progress_percent, 0.0);
        assert!(engine.frame().visible_nodes.is_empty());
    }

    #[test]
    fn viewport_reports_tier_changes() {
        let mut engine = Engine::new(EngineConfig {
            cluster: ClusterConfig {
                min_size: 1000,
                ..Default::default()
            },
            ..Default::default()
        });
        let nodes = (0..150).map(|i| raw_node(&format!("n{i}"), "x")).collect();
        engine.set_graph(&RawGraph {
            nodes,
            edges: Vec::new(),
        });
        assert_eq!(engine.set_viewport(0.1, Point::default()), Some(Tier::Point));
        assert_eq!(engine.set_viewport(0.12, Point::default()), None);
        engine.select(Some("n3"));
        let frame = engine.frame();
        assert_eq!(frame.tier, Tier::Point);
        engine.skip_progressive_load();
        let frame = engine.frame();
        assert_eq!(frame.node("n3").map(|n| n.tier), Some(Tier::Full));
        assert_eq!(frame.node("n4").map(|n| n.tier), Some(Tier::Point));
    }

    fn spread(count: usize) -> RawGraph {
        RawGraph {
            nodes: (0..count).map(|i| raw_node(&format!("n{i}"), "x")).collect(),
            edges: Vec::new(),
        }
    }

    fn unclustered() -> EngineConfig {
        EngineConfig {
            cluster: ClusterConfig {
                min_size: 1000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn tier_tracks_node_count_across_graph_swaps() {
        let mut engine = Engine::new(unclustered());
        engine.set_graph(&spread(50));
        engine.skip_progressive_load();
        assert_eq!(engine.set_viewport(0.1, Point::default()), Some(Tier::Full));
        assert_eq!(engine.frame().tier, Tier::Full);

        engine.set_graph(&spread(150));
        engine.skip_progressive_load();
        assert_eq!(engine.frame().tier, Tier::Point);

        assert_eq!(engine.set_viewport(2.0, Point::default()), Some(Tier::Full));
        assert_eq!(engine.frame().tier, Tier::Full);

        engine.set_graph(&spread(50));
        assert_eq!(engine.set_viewport(0.1, Point::default()), None);
        assert_eq!(engine.frame().tier, Tier::Full);
    }

    #[test]
    fn set_config_reapplies_normalize_settings() {
        let mut engine = Engine::new(unclustered());
        engine.set_graph(&spread(4));
        engine.skip_progressive_load();
        assert_eq!(engine.frame().node("n3").map(|n| n.position), Some(Point::new(160.0, 160.0)));

        let mut config = unclustered();
        config.normalize.grid_spacing = 10.0;
        engine.set_config(config);
        engine.skip_progressive_load();
        assert_eq!(engine.frame().node("n3").map(|n| n.position), Some(Point::new(10.0, 10.0)));
        assert_eq!(engine.graph().node("n1").map(|n| n.position), Some(Point::new(10.0, 0.0)));
    }
}
