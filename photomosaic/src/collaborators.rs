//! Interfaces to the services the pipeline depends on but does not implement:
//! descriptor extraction over the candidate library and fetching/decoding of
//! library assets. Both are asynchronous; implementations are free to do I/O or
//! offload decoding to blocking threads.

use crate::error::Result;
use crate::feature_vector::FeatureVector;
use crate::photo::Photo;
use std::future::Future;

/// Computes [`FeatureVector`]s for image regions and for the whole candidate library.
pub trait FeatureExtractor<K>: Send + Sync {
    /// Computes the descriptor of one region of the reference image.
    fn extract(&self, region: &Photo) -> impl Future<Output = Result<FeatureVector>> + Send;

    /// Enumerates the entire candidate library and returns one descriptor per asset.
    fn preprocess_library(&self) -> impl Future<Output = Result<Vec<(K, FeatureVector)>>> + Send;
}

/// Resolves library assets to decoded images.
pub trait AssetCatalog<K>: Send + Sync {
    /// A resolved asset, ready to be decoded.
    type Handle: Send;

    /// Looks up the asset behind `asset`.
    fn fetch_asset(&self, asset: &K) -> Result<Self::Handle>;

    /// Decodes the asset, scaled to `target_width` x `target_height` pixels.
    fn request_image(
        &self,
        handle: Self::Handle,
        target_width: usize,
        target_height: usize,
    ) -> impl Future<Output = Result<Photo>> + Send;
}
