use serde::{Deserialize, Serialize};

use crate::ir::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub node_fill: String,
    pub node_border: String,
    pub text_color: String,
    pub line_color: String,
    pub cluster_fill: String,
    pub cluster_border: String,
    pub path_color: String,
    pub impact_color: String,
    pub severity_low: String,
    pub severity_medium: String,
    pub severity_high: String,
    pub severity_critical: String,
    pub severity_unknown: String,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            background: "#FFFFFF".to_string(),
            node_fill: "#F8FAFF".to_string(),
            node_border: "#C7D2E5".to_string(),
            text_color: "#1C2430".to_string(),
            line_color: "#7A8AA6".to_string(),
            cluster_fill: "#EEF2F8".to_string(),
            cluster_border: "#8FA3C7".to_string(),
            path_color: "#2563EB".to_string(),
            impact_color: "#F59E0B".to_string(),
            severity_low: "#22C55E".to_string(),
            severity_medium: "#EAB308".to_string(),
            severity_high: "#F97316".to_string(),
            severity_critical: "#DC2626".to_string(),
            severity_unknown: "#94A3B8".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            background: "#0F172A".to_string(),
            node_fill: "#1E293B".to_string(),
            node_border: "#334155".to_string(),
            text_color: "#E2E8F0".to_string(),
            line_color: "#64748B".to_string(),
            cluster_fill: "#172033".to_string(),
            cluster_border: "#475569".to_string(),
            path_color: "#60A5FA".to_string(),
            impact_color: "#FBBF24".to_string(),
            severity_low: "#4ADE80".to_string(),
            severity_medium: "#FACC15".to_string(),
            severity_high: "#FB923C".to_string(),
            severity_critical: "#F87171".to_string(),
            severity_unknown: "#64748B".to_string(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" | "light" => Some(Self::light()),
            "dark" => Some(Self::dark()),
            _ => None,
        }
    }

    pub fn severity_color(&self, severity: Option<Severity>) -> &str {
        match severity {
            Some(Severity::Low) => &self.severity_low,
            Some(Severity::Medium) => &self.severity_medium,
            Some(Severity::High) => &self.severity_high,
            Some(Severity::Critical) => &self.severity_critical,
            None => &self.severity_unknown,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}
