use crate::cluster::GroupBy;
use crate::error::ConfigWarning;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

const TOP_KINDS: [&str; 7] = [
    "network",
    "vpc",
    "aws_vpc",
    "google_compute_network",
    "azurerm_virtual_network",
    "vnet",
    "AWS::EC2::VPC",
];

const TOP_KEY_ATTRIBUTES: [&str; 5] = ["vpc_id", "network_id", "self_link", "arn", "name"];

const SECOND_KINDS: [&str; 6] = [
    "subnet",
    "aws_subnet",
    "google_compute_subnetwork",
    "azurerm_subnet",
    "subnetwork",
    "AWS::EC2::Subnet",
];

const SECOND_KEY_ATTRIBUTES: [&str; 4] = ["subnet_id", "self_link", "arn", "name"];

const NETWORK_REF_ATTRIBUTES: [&str; 5] =
    ["vpc_id", "network_id", "network", "virtual_network_name", "vpc"];

const CONTAINER_ATTRIBUTES: [&str; 6] = [
    "subnet_id",
    "subnet_ids",
    "subnetwork",
    "subnet",
    "subnets",
    "subnet_refs",
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub grid_spacing: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { grid_spacing: 160.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    pub top_kinds: Vec<String>,
    pub top_key_attributes: Vec<String>,
    pub second_kinds: Vec<String>,
    pub second_key_attributes: Vec<String>,
    pub network_ref_attributes: Vec<String>,
    pub container_attributes: Vec<String>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            top_kinds: owned(&TOP_KINDS),
            top_key_attributes: owned(&TOP_KEY_ATTRIBUTES),
            second_kinds: owned(&SECOND_KINDS),
            second_key_attributes: owned(&SECOND_KEY_ATTRIBUTES),
            network_ref_attributes: owned(&NETWORK_REF_ATTRIBUTES),
            container_attributes: owned(&CONTAINER_ATTRIBUTES),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub group_by: GroupBy,
    pub min_size: usize,
    pub max_size: usize,
    /// Radius of the ring members are placed on when a cluster expands.
    pub expand_radius: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            group_by: GroupBy::Type,
            min_size: 5,
            max_size: 50,
            expand_radius: 120.0,
        }
    }
}

impl ClusterConfig {
    pub fn band_is_valid(&self) -> bool {
        self.max_size > 0 && self.max_size >= self.min_size
    }

    pub fn validate(&self, has_custom_key: bool) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.max_size == 0 {
            warnings.push(ConfigWarning::ClusterMaxZero);
        } else if self.max_size < self.min_size {
            warnings.push(ConfigWarning::ClusterBandInverted {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if self.min_size < 2 {
            warnings.push(ConfigWarning::ClusterMinTooSmall(self.min_size));
        }
        if self.group_by == GroupBy::Custom && !has_custom_key {
            warnings.push(ConfigWarning::CustomKeyMissing);
        }
        warnings
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressiveConfig {
    pub batch_size: usize,
    /// Delay requested from the host timer before each paint callback.
    pub tick_interval_ms: u32,
}

impl Default for ProgressiveConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            tick_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LodConfig {
    /// Graphs smaller than this always render at full fidelity.
    pub min_nodes: usize,
    pub point_below: f32,
    pub full_at: f32,
    pub growth: f32,
    pub max_scale: f32,
    pub compact_label_chars: usize,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            min_nodes: 100,
            point_below: 0.35,
            full_at: 0.9,
            growth: 0.5,
            max_scale: 3.0,
            compact_label_chars: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HighlightConfig {
    pub dim_opacity: f32,
    pub base_stroke_width: f32,
    pub path_stroke_width: f32,
    pub impact_stroke_width: f32,
    pub glow: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            dim_opacity: 0.25,
            base_stroke_width: 1.0,
            path_stroke_width: 3.0,
            impact_stroke_width: 2.5,
            glow: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub normalize: NormalizeConfig,
    pub hierarchy: HierarchyConfig,
    pub cluster: ClusterConfig,
    pub progressive: ProgressiveConfig,
    pub lod: LodConfig,
    pub highlight: HighlightConfig,
}

impl EngineConfig {
    pub fn validate(&self, has_custom_key: bool) -> Vec<ConfigWarning> {
        let mut warnings = self.cluster.validate(has_custom_key);
        if self.progressive.batch_size == 0 {
            warnings.push(ConfigWarning::BatchSizeZero);
        }
        if self.lod.min_nodes == 0 {
            warnings.push(ConfigWarning::LodMinNodesZero);
        }
        if self.lod.point_below >= self.lod.full_at {
            warnings.push(ConfigWarning::LodBandsInverted {
                point: self.lod.point_below,
                full: self.lod.full_at,
            });
        }
        warnings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub padding: f32,
    pub node_radius: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            padding: 40.0,
            node_radius: 18.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub engine: EngineConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::light();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            engine: EngineConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    node_fill: Option<String>,
    node_border: Option<String>,
    text_color: Option<String>,
    line_color: Option<String>,
    cluster_fill: Option<String>,
    cluster_border: Option<String>,
    path_color: Option<String>,
    impact_color: Option<String>,
    severity_low: Option<String>,
    severity_medium: Option<String>,
    severity_high: Option<String>,
    severity_critical: Option<String>,
    severity_unknown: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeConfigFile {
    grid_spacing: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HierarchyConfigFile {
    top_kinds: Option<Vec<String>>,
    top_key_attributes: Option<Vec<String>>,
    second_kinds: Option<Vec<String>>,
    second_key_attributes: Option<Vec<String>>,
    network_ref_attributes: Option<Vec<String>>,
    container_attributes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterConfigFile {
    group_by: Option<GroupBy>,
    #[serde(alias = "minClusterSize")]
    min_size: Option<usize>,
    #[serde(alias = "maxClusterSize")]
    max_size: Option<usize>,
    expand_radius: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressiveConfigFile {
    batch_size: Option<usize>,
    tick_interval_ms: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LodConfigFile {
    min_nodes: Option<usize>,
    point_below: Option<f32>,
    full_at: Option<f32>,
    growth: Option<f32>,
    max_scale: Option<f32>,
    compact_label_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighlightConfigFile {
    dim_opacity: Option<f32>,
    base_stroke_width: Option<f32>,
    path_stroke_width: Option<f32>,
    impact_stroke_width: Option<f32>,
    glow: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    padding: Option<f32>,
    node_radius: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    normalize: Option<NormalizeConfigFile>,
    hierarchy: Option<HierarchyConfigFile>,
    cluster: Option<ClusterConfigFile>,
    progressive: Option<ProgressiveConfigFile>,
    lod: Option<LodConfigFile>,
    highlight: Option<HighlightConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses a JSON or JSON5 document and overlays it on the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = Config::default();

    if let Some(theme) = parsed.theme.as_deref().and_then(Theme::from_name) {
        config.render.background = theme.background.clone();
        config.theme = theme;
    }
    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
        config.render.background = config.theme.background.clone();
    }

    if let Some(file) = parsed.normalize {
        if let Some(v) = file.grid_spacing {
            config.engine.normalize.grid_spacing = v;
        }
    }

    if let Some(file) = parsed.hierarchy {
        let hierarchy = &mut config.engine.hierarchy;
        if let Some(v) = file.top_kinds {
            hierarchy.top_kinds = v;
        }
        if let Some(v) = file.top_key_attributes {
            hierarchy.top_key_attributes = v;
        }
        if let Some(v) = file.second_kinds {
            hierarchy.second_kinds = v;
        }
        if let Some(v) = file.second_key_attributes {
            hierarchy.second_key_attributes = v;
        }
        if let Some(v) = file.network_ref_attributes {
            hierarchy.network_ref_attributes = v;
        }
        if let Some(v) = file.container_attributes {
            hierarchy.container_attributes = v;
        }
    }

    if let Some(file) = parsed.cluster {
        let cluster = &mut config.engine.cluster;
        if let Some(v) = file.group_by {
            cluster.group_by = v;
        }
        if let Some(v) = file.min_size {
            cluster.min_size = v;
        }
        if let Some(v) = file.max_size {
            cluster.max_size = v;
        }
        if let Some(v) = file.expand_radius {
            cluster.expand_radius = v;
        }
    }

    if let Some(file) = parsed.progressive {
        if let Some(v) = file.batch_size {
            config.engine.progressive.batch_size = v;
        }
        if let Some(v) = file.tick_interval_ms {
            config.engine.progressive.tick_interval_ms = v;
        }
    }

    if let Some(file) = parsed.lod {
        let lod = &mut config.engine.lod;
        if let Some(v) = file.min_nodes {
            lod.min_nodes = v;
        }
        if let Some(v) = file.point_below {
            lod.point_below = v;
        }
        if let Some(v) = file.full_at {
            lod.full_at = v;
        }
        if let Some(v) = file.growth {
            lod.growth = v;
        }
        if let Some(v) = file.max_scale {
            lod.max_scale = v;
        }
        if let Some(v) = file.compact_label_chars {
            lod.compact_label_chars = v;
        }
    }

    if let Some(file) = parsed.highlight {
        let highlight = &mut config.engine.highlight;
        if let Some(v) = file.dim_opacity {
            highlight.dim_opacity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = file.base_stroke_width {
            highlight.base_stroke_width = v;
        }
        if let Some(v) = file.path_stroke_width {
            highlight.path_stroke_width = v;
        }
        if let Some(v) = file.impact_stroke_width {
            highlight.impact_stroke_width = v;
        }
        if let Some(v) = file.glow {
            highlight.glow = v;
        }
    }

    if let Some(file) = parsed.render {
        if let Some(v) = file.width {
            config.render.width = v;
        }
        if let Some(v) = file.height {
            config.render.height = v;
        }
        if let Some(v) = file.padding {
            config.render.padding = v;
        }
        if let Some(v) = file.node_radius {
            config.render.node_radius = v;
        }
    }

    Ok(config)
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    if let Some(v) = vars.font_size {
        theme.font_size = v;
    }
    if let Some(v) = vars.background {
        theme.background = v;
    }
    if let Some(v) = vars.node_fill {
        theme.node_fill = v;
    }
    if let Some(v) = vars.node_border {
        theme.node_border = v;
    }
    if let Some(v) = vars.text_color {
        theme.text_color = v;
    }
    if let Some(v) = vars.line_color {
        theme.line_color = v;
    }
    if let Some(v) = vars.cluster_fill {
        theme.cluster_fill = v;
    }
    if let Some(v) = vars.cluster_border {
        theme.cluster_border = v;
    }
    if let Some(v) = vars.path_color {
        theme.path_color = v;
    }
    if let Some(v) = vars.impact_color {
        theme.impact_color = v;
    }
    if let Some(v) = vars.severity_low {
        theme.severity_low = v;
    }
    if let Some(v) = vars.severity_medium {
        theme.severity_medium = v;
    }
    if let Some(v) = vars.severity_high {
        theme.severity_high = v;
    }
    if let Some(v) = vars.severity_critical {
        theme.severity_critical = v;
    }
    if let Some(v) = vars.severity_unknown {
        theme.severity_unknown = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json5_overlay_keeps_unset_defaults() {
        let config = parse_config(
            r#"{
                // comments are allowed
                theme: "dark",
                cluster: { groupBy: "provider", maxClusterSize: 20 },
                progressive: { batchSize: 250 },
            }"#,
        )
        .unwrap();
        assert_eq!(config.engine.cluster.group_by, GroupBy::Provider);
        assert_eq!(config.engine.cluster.max_size, 20);
        assert_eq!(config.engine.cluster.min_size, 5);
        assert_eq!(config.engine.progressive.batch_size, 250);
        assert_eq!(config.theme.background, Theme::dark().background);
        assert_eq!(config.render.background, Theme::dark().background);
    }

    #[test]
    fn plain_json_is_accepted() {
        let config = parse_config(r#"{"lod": {"minNodes": 50}}"#).unwrap();
        assert_eq!(config.engine.lod.min_nodes, 50);
    }

    #[test]
    fn inverted_cluster_band_is_reported() {
        let cluster = ClusterConfig {
            min_size: 10,
            max_size: 4,
            ..Default::default()
        };
        assert!(!cluster.band_is_valid());
        assert_eq!(
            cluster.validate(false),
            vec![ConfigWarning::ClusterBandInverted { min: 10, max: 4 }]
        );
    }

    #[test]
    fn default_engine_config_has_no_warnings() {
        assert!(EngineConfig::default().validate(false).is_empty());
    }

    #[test]
    fn custom_grouping_without_key_is_reported() {
        let mut config = EngineConfig::default();
        config.cluster.group_by = GroupBy::Custom;
        assert!(config.validate(false).contains(&ConfigWarning::CustomKeyMissing));
        assert!(config.validate(true).is_empty());
    }
}
