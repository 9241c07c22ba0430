use crate::cluster::GroupBy;
use crate::config::{Config, load_config};
use crate::dump::{frame_to_json, write_frame_dump};
use crate::engine::Engine;
use crate::ir::{Point, RawGraph};
#[cfg(feature = "png")]
use crate::render::write_output_png;
use crate::render::{render_svg, write_output_svg};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dgr",
    version,
    about = "Cluster, reveal and highlight large infrastructure dependency graphs"
)]
pub struct Args {
    /// Input graph JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for json/svg if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Grouping criterion for clusters
    #[arg(long = "group-by", value_enum)]
    pub group_by: Option<GroupBy>,

    #[arg(long = "min-cluster-size")]
    pub min_cluster_size: Option<usize>,

    #[arg(long = "max-cluster-size")]
    pub max_cluster_size: Option<usize>,

    /// Cluster id to expand (repeatable)
    #[arg(long = "expand")]
    pub expand: Vec<String>,

    #[arg(long = "expand-all")]
    pub expand_all: bool,

    /// Viewport zoom used for LOD selection
    #[arg(long = "zoom", default_value_t = 1.0)]
    pub zoom: f32,

    /// Comma-separated node ids to highlight as a path
    #[arg(long = "path", value_delimiter = ',', conflicts_with_all = ["impact", "impact_from"])]
    pub path: Vec<String>,

    /// Comma-separated node ids to highlight as an impact set
    #[arg(long = "impact", value_delimiter = ',', conflicts_with = "impact_from")]
    pub impact: Vec<String>,

    /// Comma-separated seed ids; highlights everything downstream
    #[arg(long = "impact-from", value_delimiter = ',')]
    pub impact_from: Vec<String>,

    /// Impact depth in hops
    #[arg(long = "depth", default_value_t = 1)]
    pub depth: u32,

    /// Reveal only this many progressive batches instead of everything
    #[arg(long = "ticks")]
    pub ticks: Option<usize>,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let input = read_input(args.input.as_deref())?;
    let raw = RawGraph::from_json(&input)?;

    let mut engine = Engine::new(config.engine.clone());
    engine.set_graph(&raw);
    let report = engine.normalize_report();
    tracing::info!(
        nodes = report.nodes,
        edges = report.edges,
        clusters = engine.clustering().len(),
        "graph loaded"
    );

    if args.expand_all {
        engine.expand_all();
    }
    for cluster_id in &args.expand {
        if !engine.toggle_cluster(cluster_id) {
            tracing::warn!(cluster = %cluster_id, "unknown or already expanded cluster");
        }
    }

    match args.ticks {
        Some(ticks) => {
            for _ in 0..ticks {
                if !engine.tick() {
                    break;
                }
            }
        }
        None => engine.skip_progressive_load(),
    }

    if !args.path.is_empty() {
        engine.set_highlight_path(args.path.clone());
    } else if !args.impact.is_empty() {
        engine.set_impact_set(args.impact.clone(), args.depth);
    } else if !args.impact_from.is_empty() {
        engine.set_impact_from(&args.impact_from, args.depth);
    }
    engine.set_viewport(args.zoom, Point::default());

    let frame = engine.frame();
    match args.output_format {
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_frame_dump(path, &frame, &config.engine.lod)?,
            None => println!("{}", frame_to_json(&frame, &config.engine.lod)?),
        },
        OutputFormat::Svg => {
            let svg = render_svg(&frame, &config.theme, &config.render, &config.engine.lod);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&frame, &config, &output)?;
        }
    }

    Ok(())
}

#[cfg(feature = "png")]
fn write_png(frame: &crate::frame::Frame, config: &Config, output: &Path) -> Result<()> {
    let svg = render_svg(frame, &config.theme, &config.render, &config.engine.lod);
    write_output_png(&svg, output, &config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(_frame: &crate::frame::Frame, _config: &Config, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_overrides(config: &mut Config, args: &Args) {
    let cluster = &mut config.engine.cluster;
    if let Some(group_by) = args.group_by {
        cluster.group_by = group_by;
    }
    if let Some(min) = args.min_cluster_size {
        cluster.min_size = min;
    }
    if let Some(max) = args.max_cluster_size {
        cluster.max_size = max;
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_highlight_and_cluster_flags() {
        let args = Args::try_parse_from([
            "dgr",
            "-i",
            "graph.json",
            "--group-by",
            "provider",
            "--max-cluster-size",
            "20",
            "--path",
            "a,b,c",
            "--expand",
            "cluster:aws",
            "--expand",
            "cluster:google",
        ])
        .unwrap();
        assert_eq!(args.group_by, Some(GroupBy::Provider));
        assert_eq!(args.path, vec!["a", "b", "c"]);
        assert_eq!(args.expand.len(), 2);
        assert_eq!(args.output_format, OutputFormat::Json);

        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.engine.cluster.group_by, GroupBy::Provider);
        assert_eq!(config.engine.cluster.max_size, 20);
        assert_eq!(config.engine.cluster.min_size, 5);
    }

    #[test]
    fn path_conflicts_with_impact() {
        let parsed = Args::try_parse_from(["dgr", "--path", "a,b", "--impact", "c"]);
        assert!(parsed.is_err());
    }
}
