use crate::config::{LodConfig, RenderConfig};
use crate::frame::{Frame, RenderEdge, RenderNode};
use crate::highlight::{Emphasis, EmphasisRole};
use crate::ir::Point;
use crate::lod::{Tier, tier_label};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::Path;

const POINT_RADIUS: f32 = 4.0;

/// Maps graph coordinates onto the output canvas, fitting the frame's
/// bounding box inside the padding.
struct Fit {
    scale: f32,
    dx: f32,
    dy: f32,
}

impl Fit {
    fn new(nodes: &[RenderNode], config: &RenderConfig) -> Self {
        let Some(first) = nodes.first() else {
            return Fit {
                scale: 1.0,
                dx: config.width / 2.0,
                dy: config.height / 2.0,
            };
        };
        let (mut min_x, mut min_y) = (first.position.x, first.position.y);
        let (mut max_x, mut max_y) = (min_x, min_y);
        for node in nodes {
            min_x = min_x.min(node.position.x);
            min_y = min_y.min(node.position.y);
            max_x = max_x.max(node.position.x);
            max_y = max_y.max(node.position.y);
        }
        let inner_w = (config.width - 2.0 * config.padding).max(1.0);
        let inner_h = (config.height - 2.0 * config.padding).max(1.0);
        let span_w = max_x - min_x;
        let span_h = max_y - min_y;
        let scale = match (span_w > 0.0, span_h > 0.0) {
            (true, true) => (inner_w / span_w).min(inner_h / span_h),
            (true, false) => inner_w / span_w,
            (false, true) => inner_h / span_h,
            (false, false) => 1.0,
        }
        .min(1.0);
        let dx = config.width / 2.0 - (min_x + span_w / 2.0) * scale;
        let dy = config.height / 2.0 - (min_y + span_h / 2.0) * scale;
        Fit { scale, dx, dy }
    }

    fn apply(&self, point: Point) -> (f32, f32) {
        (point.x * self.scale + self.dx, point.y * self.scale + self.dy)
    }
}

pub fn render_svg(frame: &Frame, theme: &Theme, config: &RenderConfig, lod: &LodConfig) -> String {
    let mut svg = String::new();
    let width = config.width.max(200.0);
    let height = config.height.max(200.0);
    let fit = Fit::new(&frame.visible_nodes, config);

    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    );
    svg.push_str("<defs>");
    svg.push_str("<filter id=\"glow\" x=\"-50%\" y=\"-50%\" width=\"200%\" height=\"200%\"><feGaussianBlur stdDeviation=\"3\" result=\"blur\"/><feMerge><feMergeNode in=\"blur\"/><feMergeNode in=\"SourceGraphic\"/></feMerge></filter>");
    let _ = write!(
        svg,
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    );
    svg.push_str("</defs>");

    let positions: HashMap<&str, (f32, f32)> = frame
        .visible_nodes
        .iter()
        .map(|node| (node.id.as_str(), fit.apply(node.position)))
        .collect();

    for edge in &frame.visible_edges {
        let (Some(from), Some(to)) = (
            positions.get(edge.source.as_str()),
            positions.get(edge.target.as_str()),
        ) else {
            continue;
        };
        render_edge(&mut svg, edge, *from, *to, theme);
    }

    for node in &frame.visible_nodes {
        let Some(center) = positions.get(node.id.as_str()) else {
            continue;
        };
        render_node(&mut svg, node, *center, theme, config, lod);
    }

    if frame.progress_percent < 100.0 {
        let _ = write!(
            svg,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">loading {:.0}%</text>",
            config.padding / 2.0,
            height - config.padding / 2.0,
            theme.font_family,
            theme.font_size,
            theme.text_color,
            frame.progress_percent
        );
    }

    svg.push_str("</svg>");
    svg
}

fn render_edge(svg: &mut String, edge: &RenderEdge, from: (f32, f32), to: (f32, f32), theme: &Theme) {
    let base_width = 1.2 + (edge.merged.min(5) as f32 - 1.0) * 0.6;
    let (stroke, stroke_width, glow) = match edge.emphasis {
        Some(Emphasis {
            role: EmphasisRole::Path,
            stroke_width,
            glow,
            ..
        }) => (theme.path_color.as_str(), stroke_width, glow),
        _ => (theme.line_color.as_str(), base_width, false),
    };
    let _ = write!(
        svg,
        "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{:.2}\" marker-end=\"url(#arrow)\"{} />",
        from.0,
        from.1,
        to.0,
        to.1,
        stroke,
        stroke_width,
        if glow { " filter=\"url(#glow)\"" } else { "" }
    );
}

fn render_node(
    svg: &mut String,
    node: &RenderNode,
    (x, y): (f32, f32),
    theme: &Theme,
    config: &RenderConfig,
    lod: &LodConfig,
) {
    let severity = theme.severity_color(node.severity);
    let opacity = node.emphasis.map(|e| e.opacity).unwrap_or(1.0);
    let (outline, outline_width, glow) = match node.emphasis {
        Some(e) if e.role == EmphasisRole::Path => (theme.path_color.as_str(), e.stroke_width, e.glow),
        Some(e) if e.role == EmphasisRole::Impact => (theme.impact_color.as_str(), e.stroke_width, e.glow),
        _ if node.severity.is_some() => (severity, 1.5, false),
        _ => (theme.node_border.as_str(), 1.5, false),
    };
    let filter = if glow { " filter=\"url(#glow)\"" } else { "" };

    let _ = write!(svg, "<g opacity=\"{opacity:.2}\"{filter}>");
    match node.tier {
        Tier::Point => {
            let _ = write!(
                svg,
                "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{POINT_RADIUS}\" fill=\"{severity}\"/>"
            );
        }
        Tier::Compact | Tier::Full if node.is_cluster() => {
            let r = config.node_radius * 1.4;
            let _ = write!(
                svg,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{:.2}\" stroke-dasharray=\"6 4\"/>",
                x - r,
                y - r,
                r * 2.0,
                r * 2.0,
                theme.cluster_fill,
                if node.emphasis.is_some() { outline } else { theme.cluster_border.as_str() },
                outline_width
            );
            if let Some(summary) = &node.cluster {
                let _ = write!(
                    svg,
                    "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}</text>",
                    y + theme.font_size * 0.35,
                    theme.font_family,
                    theme.font_size,
                    theme.text_color,
                    summary.member_count
                );
            }
            render_label(svg, node, x, y + r, theme, lod);
        }
        Tier::Compact => {
            let r = config.node_radius * 0.6;
            let _ = write!(
                svg,
                "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{r:.2}\" fill=\"{}\" stroke=\"{outline}\" stroke-width=\"{outline_width:.2}\"/>",
                theme.node_fill
            );
            render_label(svg, node, x, y + r, theme, lod);
        }
        Tier::Full => {
            let r = config.node_radius;
            let _ = write!(
                svg,
                "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{r:.2}\" fill=\"{}\" stroke=\"{outline}\" stroke-width=\"{outline_width:.2}\"/>",
                theme.node_fill
            );
            let _ = write!(
                svg,
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{POINT_RADIUS}\" fill=\"{severity}\"/>",
                x + r * 0.7,
                y - r * 0.7
            );
            render_label(svg, node, x, y + r, theme, lod);
            let _ = write!(
                svg,
                "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{:.1}\" fill=\"{}\">{}</text>",
                y + r + theme.font_size * 2.3,
                theme.font_family,
                theme.font_size * 0.8,
                theme.line_color,
                escape_xml(&node.kind)
            );
        }
    }
    svg.push_str("</g>");
}

fn render_label(svg: &mut String, node: &RenderNode, x: f32, top: f32, theme: &Theme, lod: &LodConfig) {
    let Some(label) = tier_label(&node.label, node.tier, lod) else {
        return;
    };
    let _ = write!(
        svg,
        "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        top + theme.font_size * 1.2,
        theme.font_family,
        theme.font_size,
        theme.text_color,
        escape_xml(&label)
    );
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
