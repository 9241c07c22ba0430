use thiserror::Error;

/// Failure to decode the raw graph handed over by the data layer.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Non-fatal configuration findings. Reported once when a configuration is
/// applied; the engine degrades instead of failing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigWarning {
    #[error("maxClusterSize ({max}) is smaller than minClusterSize ({min}); groups stay ungrouped")]
    ClusterBandInverted { min: usize, max: usize },
    #[error("maxClusterSize is 0; groups stay ungrouped")]
    ClusterMaxZero,
    #[error("minClusterSize {0} lets single nodes form clusters")]
    ClusterMinTooSmall(usize),
    #[error("custom grouping selected without a key function; groups stay ungrouped")]
    CustomKeyMissing,
    #[error("progressive batch size is 0; everything is revealed in one batch")]
    BatchSizeZero,
    #[error("lod pointBelow ({point}) is not below fullAt ({full}); compact tier is unreachable")]
    LodBandsInverted { point: f32, full: f32 },
    #[error("lod minNodes is 0; LOD applies to every graph")]
    LodMinNodesZero,
}
