use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub id: String,
    pub kind: String,
    pub display_name: String,
    pub severity: Option<Severity>,
    /// Open metadata; insertion order is the declaration order used by
    /// hierarchy inference.
    pub attributes: Map<String, Value>,
    pub position: Point,
    pub parent_id: Option<String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            kind: kind.into(),
            severity: None,
            attributes: Map::new(),
            position: Point::default(),
            parent_id: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent_id = Some(parent.to_string());
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Point::new(x, y);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub kind: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            kind: None,
        }
    }
}

/// Identity of a normalized node/edge set. Equal versions mean the pipeline
/// output would be identical, so recomputation can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct GraphVersion(pub u64);

impl fmt::Display for GraphVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<ResourceNode>,
    pub edges: Vec<Edge>,
    pub version: GraphVersion,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the id index and version. Does not validate; see
    /// [`crate::normalize::normalize`] for the sanitizing entry point.
    pub fn from_parts(nodes: Vec<ResourceNode>, edges: Vec<Edge>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(idx);
        }
        let version = fingerprint(&nodes, &edges);
        Self {
            nodes,
            edges,
            version,
            index,
        }
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.index.get(id).map(|idx| &self.nodes[*idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ResourceNode> {
        self.index.get(id).map(|idx| &mut self.nodes[*idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn fingerprint(nodes: &[ResourceNode], edges: &[Edge]) -> GraphVersion {
    let mut hasher = DefaultHasher::new();
    nodes.len().hash(&mut hasher);
    for node in nodes {
        node.id.hash(&mut hasher);
        node.kind.hash(&mut hasher);
        node.display_name.hash(&mut hasher);
        node.severity.hash(&mut hasher);
        node.parent_id.hash(&mut hasher);
        for (key, value) in &node.attributes {
            key.hash(&mut hasher);
            value.to_string().hash(&mut hasher);
        }
    }
    edges.len().hash(&mut hasher);
    for edge in edges {
        edge.id.hash(&mut hasher);
        edge.source.hash(&mut hasher);
        edge.target.hash(&mut hasher);
        edge.kind.hash(&mut hasher);
    }
    GraphVersion(hasher.finish())
}

/// Graph as delivered by the data layer, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

impl RawGraph {
    pub fn from_json(input: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(input)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "displayName", alias = "name")]
    pub label: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}
