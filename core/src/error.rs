//! Crate-level error type.

use crate::tensor::TensorError;
use crate::volume::Vec3;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SampleError>;

#[derive(Debug, Error)]
pub enum SampleError {
    /// `out_type` names neither a boundary nor an affinity target.
    #[error("invalid output type: {0:?}")]
    InvalidOutputType(String),
    /// The sample has no location valid for every provider (or no output channel).
    #[error("{section}: no candidate locations to draw from")]
    NoCandidates { section: String },
    #[error("sample collection is empty")]
    EmptyCollection,
    #[error("{section}: no volume configured for input channel `{channel}`")]
    MissingChannel { section: String, channel: String },
    #[error("unknown {kind} volume id {id}")]
    UnknownVolume { kind: &'static str, id: u32 },
    #[error("unknown output channel `{0}`")]
    UnknownChannel(String),
    #[error("no patch given for output channel `{0}`")]
    MissingOutput(String),
    #[error("deviation {dev:?} outside [{low:?}, {high:?}]")]
    DeviationOutOfRange { dev: Vec3, low: Vec3, high: Vec3 },
    #[error("all {total} patches have already been written")]
    PatchesExhausted { total: usize },
    /// A tensor does not have the layout a transform requires.
    #[error("shape violation: {0}")]
    ShapeViolation(String),
    #[error("dtype mismatch: configured {configured}, sampler built for {built}")]
    DTypeMismatch {
        configured: &'static str,
        built: &'static str,
    },
    #[error("no network patch shapes configured")]
    MissingNetwork,
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write request log: {0}")]
    Log(#[source] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}
