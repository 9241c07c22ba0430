#[cfg(feature = "cli")]
pub mod cli;
pub mod cluster;
pub mod config;
pub mod dump;
pub mod engine;
pub mod error;
pub mod frame;
pub mod hierarchy;
pub mod highlight;
pub mod ir;
pub mod lod;
pub mod normalize;
pub mod progressive;
pub mod render;
pub mod theme;
pub mod view;

#[cfg(feature = "cli")]
pub use cli::run;
pub use cluster::{Clustering, GroupBy};
pub use config::{Config, EngineConfig};
pub use engine::Engine;
pub use error::{ConfigWarning, InputError};
pub use frame::{Frame, RenderEdge, RenderNode};
pub use highlight::HighlightState;
pub use ir::{Graph, RawGraph};
pub use lod::Tier;
pub use view::ViewState;

/// Loads `input` (graph JSON), reveals everything and returns the resulting
/// frame as JSON.
pub fn frame_json(input: &str, config: EngineConfig) -> anyhow::Result<String> {
    let mut engine = Engine::new(config);
    engine.set_graph_json(input)?;
    engine.skip_progressive_load();
    let lod = engine.config().lod;
    dump::frame_to_json(&engine.frame(), &lod)
}
