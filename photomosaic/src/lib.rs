//! # Photomosaic Library
//!
//! The `photomosaic` library picks, for every cell of a grid laid over a reference photo,
//! the library image whose colors match that cell best. The chosen images can then be
//! composited into a photomosaic by the caller.
//!
//! ## Overview of Modules
//!
//! - **`matching_pipeline`**: Orchestrates the workflow. Indexes the candidate library once,
//!   then resolves grid cells concurrently and streams an [`ImageChoice`] per cell back
//!   through a single callback.
//!
//! - **`spatial_index`**: A binary space-partitioning tree over 27-value color descriptors
//!   with branch-and-bound nearest-neighbour search and a membership set.
//!
//! - **`axis_cycle`**: The level-dependent rule selecting which descriptor component the
//!   index compares at each tree depth.
//!
//! - **`feature_vector`**: The 3x3 grid of average RGB values describing an image or region.
//!
//! - **`grid`**: Splits the reference photo into cells and deals cells out to workers.
//!
//! - **`photo`**: Defines a basic `Photo` struct for storing pixel data (RGBA format) along
//!   with cropping and scaling.
//!
//! - **`collaborators`**: The asynchronous feature-extraction and asset-catalog interfaces
//!   the pipeline is driven by.
//!
//! - **`image_choice`**: The per-cell result type.
//!
//! - **`error`**: The [`MosaicError`] type shared by all modules.

pub mod axis_cycle;
pub mod collaborators;
pub mod error;
pub mod feature_vector;
pub mod grid;
pub mod image_choice;
pub mod matching_pipeline;
pub mod photo;
pub mod spatial_index;

pub use collaborators::{AssetCatalog, FeatureExtractor};
pub use error::{MosaicError, Result};
pub use feature_vector::FeatureVector;
pub use grid::{GridCell, Region};
pub use image_choice::ImageChoice;
pub use matching_pipeline::{
    CellFailure, MatchingPipeline, PipelineConfig, PipelineState, PreprocessReport, SelectionReport,
};
pub use photo::Photo;
pub use spatial_index::{NearestMatch, SpatialIndex};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
