//! Batched reveal of a large node/edge set.
//!
//! Items are stored once in reveal order, so the visible set is always a
//! prefix of each array. Reveals are driven either by the host scheduler
//! (`start` / `on_timer` / `on_paint`, each request tagged with a
//! generation) or synchronously through `tick`.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::ProgressiveConfig;
use crate::frame::{RenderEdge, RenderNode};

/// What the host should schedule next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Schedule {
    Timer {
        generation: u64,
        #[serde(rename = "delayMs")]
        delay_ms: u32,
    },
    PaintFrame {
        generation: u64,
    },
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingTimer,
    AwaitingPaint,
}

#[derive(Debug, Clone)]
pub struct Materializer {
    config: ProgressiveConfig,
    nodes: Arc<[RenderNode]>,
    edges: Arc<[RenderEdge]>,
    /// Visible node count after `i + 1` batches.
    node_cuts: Vec<usize>,
    edge_cuts: Vec<usize>,
    revealed: usize,
    generation: u64,
    phase: Phase,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(ProgressiveConfig::default())
    }
}

impl Materializer {
    pub fn new(config: ProgressiveConfig) -> Self {
        Self {
            config,
            nodes: Arc::from(Vec::new()),
            edges: Arc::from(Vec::new()),
            node_cuts: Vec::new(),
            edge_cuts: Vec::new(),
            revealed: 0,
            generation: 0,
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &ProgressiveConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ProgressiveConfig) {
        self.config = config;
    }

    /// Replaces the item set and resets progress to zero. Outstanding
    /// scheduler callbacks become stale.
    pub fn restart(&mut self, nodes: Vec<RenderNode>, edges: Vec<RenderEdge>, priority: &[String]) {
        self.generation += 1;
        self.phase = Phase::Idle;
        self.revealed = 0;
        self.load(nodes, edges, priority);
        tracing::debug!(
            generation = self.generation,
            nodes = self.nodes.len(),
            batches = self.total_batches(),
            "progressive reveal restarted"
        );
    }

    /// Replaces the item set after a view change while keeping how far the
    /// reveal has got. A finished reveal stays finished.
    pub fn retarget(&mut self, nodes: Vec<RenderNode>, edges: Vec<RenderEdge>, priority: &[String]) {
        let finished = self.is_complete();
        let revealed = self.revealed;
        self.load(nodes, edges, priority);
        self.revealed = if finished {
            self.total_batches()
        } else {
            revealed.min(self.total_batches())
        };
        if self.is_complete() {
            self.phase = Phase::Idle;
        }
    }

    fn load(&mut self, nodes: Vec<RenderNode>, edges: Vec<RenderEdge>, priority: &[String]) {
        let (nodes, node_cuts) = order_nodes(nodes, priority, self.config.batch_size);
        let (edges, edge_cuts) = order_edges(&nodes, &node_cuts, edges);
        self.nodes = Arc::from(nodes);
        self.edges = Arc::from(edges);
        self.node_cuts = node_cuts;
        self.edge_cuts = edge_cuts;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn total_batches(&self) -> usize {
        self.node_cuts.len()
    }

    pub fn revealed_batches(&self) -> usize {
        self.revealed
    }

    pub fn is_complete(&self) -> bool {
        self.revealed >= self.total_batches()
    }

    pub fn progress_percent(&self) -> f32 {
        let total = self.total_batches();
        if total == 0 || self.revealed >= total {
            return 100.0;
        }
        self.revealed as f32 / total as f32 * 100.0
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn visible_nodes(&self) -> &[RenderNode] {
        &self.nodes[..cut(&self.node_cuts, self.revealed)]
    }

    pub fn visible_edges(&self) -> &[RenderEdge] {
        &self.edges[..cut(&self.edge_cuts, self.revealed)]
    }

    /// Requests the first timer. Does nothing once everything is visible.
    pub fn start(&mut self) -> Schedule {
        if self.is_complete() {
            self.phase = Phase::Idle;
            return Schedule::Idle;
        }
        self.phase = Phase::AwaitingTimer;
        self.timer()
    }

    pub fn on_timer(&mut self, generation: u64) -> Schedule {
        if generation != self.generation || self.phase != Phase::AwaitingTimer {
            tracing::trace!(generation, current = self.generation, "stale timer ignored");
            return Schedule::Idle;
        }
        self.phase = Phase::AwaitingPaint;
        Schedule::PaintFrame {
            generation: self.generation,
        }
    }

    /// Reveals one batch once the previous one could paint.
    pub fn on_paint(&mut self, generation: u64) -> Schedule {
        if generation != self.generation || self.phase != Phase::AwaitingPaint {
            tracing::trace!(generation, current = self.generation, "stale paint ignored");
            return Schedule::Idle;
        }
        self.reveal_next();
        if self.is_complete() {
            self.phase = Phase::Idle;
            return Schedule::Idle;
        }
        self.phase = Phase::AwaitingTimer;
        self.timer()
    }

    /// Reveals one batch without going through the scheduler. Returns false
    /// once everything is visible.
    pub fn tick(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.reveal_next();
        if self.is_complete() {
            self.phase = Phase::Idle;
        }
        true
    }

    pub fn skip_to_end(&mut self) {
        self.revealed = self.total_batches();
        self.phase = Phase::Idle;
    }

    fn reveal_next(&mut self) {
        self.revealed = (self.revealed + 1).min(self.total_batches());
        tracing::trace!(
            batch = self.revealed,
            of = self.total_batches(),
            nodes = self.visible_nodes().len(),
            "revealed batch"
        );
    }

    fn timer(&self) -> Schedule {
        Schedule::Timer {
            generation: self.generation,
            delay_ms: self.config.tick_interval_ms,
        }
    }
}

fn cut(cuts: &[usize], revealed: usize) -> usize {
    match revealed {
        0 => 0,
        n => cuts.get(n - 1).or(cuts.last()).copied().unwrap_or(0),
    }
}

/// Puts priority nodes first and returns the cumulative batch boundaries.
fn order_nodes(
    nodes: Vec<RenderNode>,
    priority: &[String],
    batch_size: usize,
) -> (Vec<RenderNode>, Vec<usize>) {
    let total = nodes.len();
    if total == 0 {
        return (nodes, Vec::new());
    }

    let mut slots: Vec<Option<RenderNode>> = nodes.into_iter().map(Some).collect();
    let index: HashMap<&str, usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(idx, node)| node.as_ref().map(|node| (node.id.as_str(), idx)))
        .collect();
    let picks: Vec<usize> = {
        let mut seen = HashSet::new();
        priority
            .iter()
            .filter_map(|id| index.get(id.as_str()).copied())
            .filter(|idx| seen.insert(*idx))
            .collect()
    };

    let mut ordered: Vec<RenderNode> = Vec::with_capacity(total);
    for idx in &picks {
        if let Some(node) = slots[*idx].take() {
            ordered.push(node);
        }
    }
    let prioritized = ordered.len();
    ordered.extend(slots.into_iter().flatten());

    if batch_size == 0 {
        return (ordered, vec![total]);
    }
    let mut cuts = Vec::new();
    let mut end = prioritized.max(batch_size).min(total);
    cuts.push(end);
    while end < total {
        end = (end + batch_size).min(total);
        cuts.push(end);
    }
    (ordered, cuts)
}

/// Orders edges by the batch in which their later endpoint appears. Edges
/// with an endpoint outside the node set never become visible.
fn order_edges(
    nodes: &[RenderNode],
    node_cuts: &[usize],
    edges: Vec<RenderEdge>,
) -> (Vec<RenderEdge>, Vec<usize>) {
    let mut batch_of: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    let mut batch = 0;
    for (idx, node) in nodes.iter().enumerate() {
        while node_cuts.get(batch).is_some_and(|end| idx >= *end) {
            batch += 1;
        }
        batch_of.insert(node.id.as_str(), batch);
    }

    let mut keyed: Vec<(usize, RenderEdge)> = edges
        .into_iter()
        .filter_map(|edge| {
            let source = batch_of.get(edge.source.as_str())?;
            let target = batch_of.get(edge.target.as_str())?;
            Some(((*source).max(*target), edge))
        })
        .collect();
    keyed.sort_by_key(|(batch, _)| *batch);

    let mut cuts = vec![0; node_cuts.len()];
    for (batch, _) in &keyed {
        cuts[*batch] += 1;
    }
    for idx in 1..cuts.len() {
        cuts[idx] += cuts[idx - 1];
    }
    (keyed.into_iter().map(|(_, edge)| edge).collect(), cuts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Point;
    use crate::lod::Tier;

    fn node(id: String) -> RenderNode {
        RenderNode {
            label: id.clone(),
            id,
            kind: "x".to_string(),
            severity: None,
            position: Point::default(),
            parent_id: None,
            cluster_membership: None,
            cluster: None,
            tier: Tier::Full,
            emphasis: None,
        }
    }

    fn edge(source: &str, target: &str) -> RenderEdge {
        RenderEdge {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            kind: None,
            merged: 1,
            emphasis: None,
        }
    }

    fn nodes(count: usize) -> Vec<RenderNode> {
        (0..count).map(|i| node(format!("n{i}"))).collect()
    }

    fn materializer(batch_size: usize) -> Materializer {
        Materializer::new(ProgressiveConfig {
            batch_size,
            ..Default::default()
        })
    }

    #[test]
    fn reveals_in_three_ticks() {
        let mut m = materializer(100);
        m.restart(nodes(250), vec![edge("n0", "n249")], &[]);
        let mut progress = vec![m.progress_percent().round()];
        while m.tick() {
            progress.push(m.progress_percent().round());
        }
        assert_eq!(progress, vec![0.0, 33.0, 67.0, 100.0]);
        assert_eq!(m.total_batches(), 3);
        assert_eq!(m.visible_nodes().len(), 250);
    }

    #[test]
    fn edges_wait_for_both_endpoints() {
        let mut m = materializer(100);
        m.restart(
            nodes(250),
            vec![edge("n0", "n249"), edge("n0", "n1"), edge("n150", "n120")],
            &[],
        );
        m.tick();
        let ids: Vec<&str> = m.visible_edges().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["n0->n1"]);
        m.tick();
        assert_eq!(m.visible_edges().len(), 2);
        m.tick();
        assert_eq!(m.visible_edges().len(), 3);
    }

    #[test]
    fn priority_nodes_come_first() {
        let mut m = materializer(100);
        let priority = vec!["n200".to_string(), "ghost".to_string(), "n5".to_string()];
        m.restart(nodes(250), Vec::new(), &priority);
        m.tick();
        let visible = m.visible_nodes();
        assert_eq!(visible.len(), 100);
        assert_eq!(visible[0].id, "n200");
        assert_eq!(visible[1].id, "n5");
        assert_eq!(visible[2].id, "n0");
    }

    #[test]
    fn oversized_priority_fills_the_first_batch() {
        let mut m = materializer(2);
        let priority: Vec<String> = (0..5).map(|i| format!("n{i}")).collect();
        m.restart(nodes(6), Vec::new(), &priority);
        m.tick();
        assert_eq!(m.visible_nodes().len(), 5);
        assert_eq!(m.total_batches(), 2);
    }

    #[test]
    fn zero_batch_size_reveals_everything_at_once() {
        let mut m = materializer(0);
        m.restart(nodes(30), Vec::new(), &[]);
        assert_eq!(m.total_batches(), 1);
        assert!(m.tick());
        assert_eq!(m.progress_percent(), 100.0);
    }

    #[test]
    fn empty_input_is_complete() {
        let mut m = materializer(100);
        m.restart(Vec::new(), Vec::new(), &[]);
        assert!(m.is_complete());
        assert_eq!(m.progress_percent(), 100.0);
        assert_eq!(m.start(), Schedule::Idle);
        assert!(!m.tick());
    }

    #[test]
    fn scheduler_callbacks_alternate_timer_and_paint() {
        let mut m = materializer(100);
        m.restart(nodes(250), Vec::new(), &[]);
        let generation = m.generation();
        assert_eq!(
            m.start(),
            Schedule::Timer {
                generation,
                delay_ms: 16
            }
        );
        assert_eq!(m.on_paint(generation), Schedule::Idle);
        assert_eq!(m.revealed_batches(), 0);
        assert_eq!(m.on_timer(generation), Schedule::PaintFrame { generation });
        assert!(matches!(m.on_paint(generation), Schedule::Timer { .. }));
        assert_eq!(m.revealed_batches(), 1);
        m.on_timer(generation);
        m.on_paint(generation);
        m.on_timer(generation);
        assert_eq!(m.on_paint(generation), Schedule::Idle);
        assert!(m.is_complete());
    }

    #[test]
    fn restart_invalidates_pending_callbacks() {
        let mut m = materializer(10);
        m.restart(nodes(50), Vec::new(), &[]);
        let old = m.generation();
        m.start();
        m.on_timer(old);
        m.restart(nodes(40), Vec::new(), &[]);
        assert_eq!(m.on_paint(old), Schedule::Idle);
        assert_eq!(m.revealed_batches(), 0);
        assert_eq!(m.progress_percent(), 0.0);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut m = materializer(7);
        m.restart(nodes(100), Vec::new(), &[]);
        let mut last = m.progress_percent();
        let mut last_visible = 0;
        while m.tick() {
            assert!(m.progress_percent() > last);
            assert!(m.visible_nodes().len() > last_visible);
            last = m.progress_percent();
            last_visible = m.visible_nodes().len();
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn retarget_keeps_progress() {
        let mut m = materializer(10);
        m.restart(nodes(50), Vec::new(), &[]);
        m.tick();
        m.tick();
        let generation = m.generation();
        m.retarget(nodes(45), Vec::new(), &[]);
        assert_eq!(m.revealed_batches(), 2);
        assert_eq!(m.generation(), generation);
        m.skip_to_end();
        m.retarget(nodes(60), Vec::new(), &[]);
        assert!(m.is_complete());
        assert_eq!(m.visible_nodes().len(), 60);
    }
}
