use crate::grid::Region;
use crate::matching_pipeline::PipelineState;
use thiserror::Error;

/// Errors produced by the index, the grid and the matching pipeline.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// An operation was called in a pipeline state that does not allow it.
    #[error("cannot {operation} while the pipeline is {state}")]
    InvalidProcessingState {
        operation: &'static str,
        state: PipelineState,
    },

    /// A grid cell does not fit inside the image it was cut from.
    #[error("region {region} cannot be cropped from a {width}x{height} image")]
    RegionMismatch {
        region: Region,
        width: usize,
        height: usize,
    },

    /// The grid size must be at least one pixel.
    #[error("invalid grid size {0}, cells must be at least one pixel wide")]
    InvalidSkipSize(usize),

    /// The feature extractor failed for a region or for the library.
    #[error("feature extraction failed: {0}")]
    Extraction(String),

    /// The asset catalog could not resolve or decode an asset.
    #[error("asset fetch failed: {0}")]
    AssetFetch(String),

    /// A descriptor has a NaN or infinite component and cannot be compared.
    #[error("descriptor has non-finite components")]
    NonFiniteDescriptor,

    /// The requested tile size does not fit in a `usize`.
    #[error("tile for region {region} at quality {quality} is too large")]
    TileSizeOverflow { region: Region, quality: usize },

    /// A matching worker died before it resolved this cell.
    #[error("matching worker stopped: {0}")]
    WorkerStopped(String),

    /// Matching was requested against an index with no candidates in it.
    #[error("the candidate library is empty")]
    EmptyLibrary,

    /// An index snapshot could not be encoded or decoded.
    #[error("malformed index snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MosaicError>;
