use driftgraph::config::{LodConfig, parse_config};
use driftgraph::dump::frame_to_json;
use driftgraph::ir::Point;
use driftgraph::{Engine, EngineConfig, GroupBy};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighlightOptions {
    #[serde(default)]
    nodes: Vec<String>,
    depth: Option<u32>,
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn build_engine_config(config_json: Option<String>) -> Result<EngineConfig, String> {
    match config_json {
        Some(raw) => parse_config(&raw)
            .map(|config| config.engine)
            .map_err(|error| error.to_string()),
        None => Ok(EngineConfig::default()),
    }
}

/// Engine handle for a JS rendering shell. Frames cross the boundary as JSON
/// strings; scheduler requests as JSON objects with a `kind` tag.
#[wasm_bindgen]
pub struct DriftGraph {
    engine: Engine,
    lod: LodConfig,
}

#[wasm_bindgen]
impl DriftGraph {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<DriftGraph, JsValue> {
        let config = build_engine_config(config_json).map_err(to_js)?;
        Ok(DriftGraph {
            lod: config.lod,
            engine: Engine::new(config),
        })
    }

    #[wasm_bindgen(js_name = setGraph)]
    pub fn set_graph(&mut self, graph_json: &str) -> Result<bool, JsValue> {
        self.engine.set_graph_json(graph_json).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setGroupingCriterion)]
    pub fn set_grouping_criterion(&mut self, criterion: &str) -> Result<(), JsValue> {
        let group_by = GroupBy::from_token(criterion)
            .ok_or_else(|| to_js(format!("unknown grouping criterion: {criterion}")))?;
        self.engine.set_grouping_criterion(group_by);
        Ok(())
    }

    #[wasm_bindgen(js_name = toggleCluster)]
    pub fn toggle_cluster(&mut self, cluster_id: &str) -> bool {
        self.engine.toggle_cluster(cluster_id)
    }

    #[wasm_bindgen(js_name = expandAll)]
    pub fn expand_all(&mut self) -> usize {
        self.engine.expand_all()
    }

    #[wasm_bindgen(js_name = collapseAll)]
    pub fn collapse_all(&mut self) -> usize {
        self.engine.collapse_all()
    }

    pub fn select(&mut self, id: Option<String>) {
        self.engine.select(id.as_deref());
    }

    pub fn hover(&mut self, id: Option<String>) {
        self.engine.hover(id.as_deref());
    }

    #[wasm_bindgen(js_name = moveNode)]
    pub fn move_node(&mut self, id: &str, x: f32, y: f32) {
        self.engine.move_node(id, Point::new(x, y));
    }

    #[wasm_bindgen(js_name = setHighlightPath)]
    pub fn set_highlight_path(&mut self, options_json: &str) -> Result<(), JsValue> {
        let options: HighlightOptions = serde_json::from_str(options_json).map_err(to_js)?;
        self.engine.set_highlight_path(options.nodes);
        Ok(())
    }

    #[wasm_bindgen(js_name = setImpactSet)]
    pub fn set_impact_set(&mut self, options_json: &str) -> Result<(), JsValue> {
        let options: HighlightOptions = serde_json::from_str(options_json).map_err(to_js)?;
        self.engine
            .set_impact_set(options.nodes, options.depth.unwrap_or(1));
        Ok(())
    }

    #[wasm_bindgen(js_name = clearHighlight)]
    pub fn clear_highlight(&mut self) {
        self.engine.clear_highlight();
    }

    #[wasm_bindgen(js_name = skipProgressiveLoad)]
    pub fn skip_progressive_load(&mut self) {
        self.engine.skip_progressive_load();
    }

    #[wasm_bindgen(js_name = startProgressive)]
    pub fn start_progressive(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.start_progressive()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = onTimer)]
    pub fn on_timer(&mut self, generation: u64) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.on_timer(generation)).map_err(to_js)
    }

    #[wasm_bindgen(js_name = onPaint)]
    pub fn on_paint(&mut self, generation: u64) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.on_paint(generation)).map_err(to_js)
    }

    pub fn tick(&mut self) -> bool {
        self.engine.tick()
    }

    /// Returns the new tier name when the zoom crosses a LOD band.
    #[wasm_bindgen(js_name = setViewport)]
    pub fn set_viewport(&mut self, zoom: f32, x: f32, y: f32) -> Option<String> {
        self.engine
            .set_viewport(zoom, Point::new(x, y))
            .map(|tier| tier.as_str().to_string())
    }

    pub fn frame(&mut self) -> Result<String, JsValue> {
        let frame = self.engine.frame();
        frame_to_json(&frame, &self.lod).map_err(to_js)
    }
}
