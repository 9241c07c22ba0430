//! Level of detail: picks how much of each node to draw from zoom and graph
//! size alone.

use serde::{Deserialize, Serialize};

use crate::config::LodConfig;
use crate::frame::RenderNode;
use crate::highlight::EmphasisRole;
use crate::view::{ViewState, sanitize_zoom};

/// Render fidelity, ordered from least to most detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Severity-colored marker, no label.
    Point,
    /// Icon plus truncated label.
    Compact,
    #[default]
    Full,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Point => "point",
            Tier::Compact => "compact",
            Tier::Full => "full",
        }
    }
}

/// How much the zoom bands stretch for a graph of `node_count` nodes. Larger
/// graphs need a higher zoom before switching to `full`.
pub fn band_scale(node_count: usize, config: &LodConfig) -> f32 {
    if config.min_nodes == 0 || node_count <= config.min_nodes {
        return 1.0;
    }
    let ratio = node_count as f32 / config.min_nodes as f32;
    (1.0 + config.growth.max(0.0) * ratio.log2()).min(config.max_scale.max(1.0))
}

pub fn select_tier(zoom: f32, node_count: usize, config: &LodConfig) -> Tier {
    if node_count < config.min_nodes {
        return Tier::Full;
    }
    let zoom = sanitize_zoom(zoom);
    let scale = band_scale(node_count, config);
    if zoom < config.point_below * scale {
        Tier::Point
    } else if zoom < config.full_at * scale {
        Tier::Compact
    } else {
        Tier::Full
    }
}

/// Nodes the user is focused on always render in full.
pub fn node_tier(base: Tier, node: &RenderNode, view: &ViewState) -> Tier {
    let focused = view.selected.as_deref() == Some(node.id.as_str())
        || view.hovered.as_deref() == Some(node.id.as_str())
        || node
            .emphasis
            .as_ref()
            .is_some_and(|emphasis| emphasis.role == EmphasisRole::Path);
    if focused { Tier::Full } else { base }
}

pub fn tier_label(label: &str, tier: Tier, config: &LodConfig) -> Option<String> {
    match tier {
        Tier::Point => None,
        Tier::Compact => Some(truncate_label(label, config.compact_label_chars)),
        Tier::Full => Some(label.to_string()),
    }
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = label.chars().take(keep).collect();
    out.push('…');
    out
}

/// Remembers the last tier so the shell only re-renders on a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct LodTracker {
    current: Option<Tier>,
}

impl LodTracker {
    pub fn current(&self) -> Option<Tier> {
        self.current
    }

    pub fn update(&mut self, zoom: f32, node_count: usize, config: &LodConfig) -> Option<Tier> {
        let tier = select_tier(zoom, node_count, config);
        if self.current == Some(tier) {
            return None;
        }
        self.current = Some(tier);
        Some(tier)
    }

    /// Syncs with the tier of the frame that was actually published.
    pub fn record(&mut self, tier: Tier) {
        self.current = Some(tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::Emphasis;
    use crate::ir::Point;

    #[test]
    fn small_graphs_are_always_full() {
        let config = LodConfig::default();
        assert_eq!(select_tier(0.01, 99, &config), Tier::Full);
        assert_eq!(select_tier(0.01, 0, &config), Tier::Full);
    }

    #[test]
    fn tiers_follow_zoom_bands() {
        let config = LodConfig::default();
        assert_eq!(select_tier(0.2, 100, &config), Tier::Point);
        assert_eq!(select_tier(0.5, 100, &config), Tier::Compact);
        assert_eq!(select_tier(1.0, 100, &config), Tier::Full);
    }

    #[test]
    fn bands_widen_with_graph_size() {
        let config = LodConfig::default();
        assert!((band_scale(400, &config) - 2.0).abs() < 1e-5);
        assert_eq!(select_tier(1.0, 100, &config), Tier::Full);
        assert_eq!(select_tier(1.0, 400, &config), Tier::Compact);
        assert_eq!(select_tier(1.9, 400, &config), Tier::Full);
        assert_eq!(band_scale(1_000_000, &config), config.max_scale);
    }

    #[test]
    fn tier_is_monotonic_in_zoom() {
        let config = LodConfig::default();
        for count in [100, 250, 1000, 20_000] {
            let mut last = Tier::Point;
            for step in 1..400 {
                let tier = select_tier(step as f32 * 0.01, count, &config);
                assert!(tier >= last, "{count} nodes at zoom step {step}");
                last = tier;
            }
        }
    }

    #[test]
    fn tracker_reports_only_changes() {
        let config = LodConfig::default();
        let mut tracker = LodTracker::default();
        assert_eq!(tracker.update(0.1, 500, &config), Some(Tier::Point));
        assert_eq!(tracker.update(0.15, 500, &config), None);
        assert_eq!(tracker.update(5.0, 500, &config), Some(Tier::Full));
        assert_eq!(tracker.current(), Some(Tier::Full));
    }

    #[test]
    fn focused_nodes_override_to_full() {
        let mut node = RenderNode {
            id: "a".to_string(),
            kind: "x".to_string(),
            label: "a".to_string(),
            severity: None,
            position: Point::default(),
            parent_id: None,
            cluster_membership: None,
            cluster: None,
            tier: Tier::Point,
            emphasis: None,
        };
        let mut view = ViewState::default();
        assert_eq!(node_tier(Tier::Point, &node, &view), Tier::Point);
        view.hovered = Some("a".to_string());
        assert_eq!(node_tier(Tier::Point, &node, &view), Tier::Full);
        view.hovered = None;
        node.emphasis = Some(Emphasis {
            role: EmphasisRole::Path,
            opacity: 1.0,
            stroke_width: 3.0,
            glow: true,
        });
        assert_eq!(node_tier(Tier::Compact, &node, &view), Tier::Full);
    }

    #[test]
    fn labels_truncate_on_char_boundaries() {
        assert_eq!(truncate_label("short", 14), "short");
        assert_eq!(truncate_label("aws_iam_role_policy_attachment", 8), "aws_iam…");
        assert_eq!(truncate_label("ünïcödé-label", 4), "ünï…");
        let config = LodConfig::default();
        assert_eq!(tier_label("x", Tier::Point, &config), None);
    }
}
