//! Error types.
//!
//! Out-of-range numeric settings are clamped where they are used and never
//! show up here; these cover structural problems only.
use std::path::PathBuf;

use thiserror::Error;

/// A terrain configuration that cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("at least one detail level is required")]
    NoDetailLevels,

    #[error("detail level {index} uses LOD {lod}, only 0..{supported} are supported")]
    UnsupportedLod { index: usize, lod: usize, supported: usize },

    #[error("detail level {index} distance {distance} must be positive and greater than the previous level")]
    NonIncreasingThreshold { index: usize, distance: f32 },

    #[error("collider LOD index {index} is out of range for {levels} detail levels")]
    ColliderIndexOutOfRange { index: usize, levels: usize },

    #[error("chunk size index {index} is out of range, {supported} sizes are supported")]
    ChunkSizeIndexOutOfRange { index: usize, supported: usize },
}

/// Why a background task produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum WorkQueueError {
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Anything that can stop a streaming session from starting.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    WorkQueue(#[from] WorkQueueError),
}
