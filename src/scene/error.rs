use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or write the scene document as a whole.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write scene {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed scene {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode scene: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single node of the tree that cannot become a body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("`{field}` has the wrong type")]
    InvalidType { field: String },
    #[error("unknown body type `{0}`")]
    UnknownType(String),
    #[error("`{field}` = {value} out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        expected: &'static str,
    },
    #[error("ring inner radius {inner} must be positive and below outer radius {outer}")]
    InvalidRing { inner: f32, outer: f32 },
}
