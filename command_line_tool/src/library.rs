use anyhow::{bail, Context};
use image::imageops::FilterType;
use photomosaic::{AssetCatalog, FeatureExtractor, FeatureVector, MosaicError, Photo};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File extensions the `image` crate can decode with its default features.
const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff"];

/// A candidate library made of every image file below a directory.
///
/// Acts as both the feature extractor and the asset catalog for the pipeline;
/// assets are identified by their file path.
#[derive(Clone)]
pub struct DirectoryLibrary {
    files: Arc<BTreeSet<PathBuf>>,
}

impl DirectoryLibrary {
    /// Recursively collects the image files below `root`.
    pub fn scan(root: &Path) -> anyhow::Result<Self> {
        let mut files = BTreeSet::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.with_context(|| format!("Could not scan library {}", root.display()))?;
            if entry.file_type().is_file() && is_image(entry.path()) {
                files.insert(entry.into_path());
            }
        }
        if files.is_empty() {
            bail!("No images found in library {}", root.display());
        }
        Ok(DirectoryLibrary {
            files: Arc::new(files),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Decodes an image file into an RGBA [`Photo`].
pub fn read_photo(path: &Path) -> anyhow::Result<Photo> {
    let img = image::open(path).with_context(|| format!("Could not load image {}", path.display()))?;
    Ok(to_photo(img))
}

fn to_photo(img: image::DynamicImage) -> Photo {
    let rgba = img.to_rgba8();
    Photo {
        width: rgba.width() as usize,
        height: rgba.height() as usize,
        img_data: rgba.into_raw(),
    }
}

impl FeatureExtractor<PathBuf> for DirectoryLibrary {
    async fn extract(&self, region: &Photo) -> photomosaic::Result<FeatureVector> {
        Ok(FeatureVector::from_photo(region))
    }

    async fn preprocess_library(&self) -> photomosaic::Result<Vec<(PathBuf, FeatureVector)>> {
        let mut decoding = JoinSet::new();
        for path in self.files.iter().cloned() {
            decoding.spawn_blocking(move || {
                let descriptor = read_photo(&path).map(|photo| FeatureVector::from_photo(&photo));
                (path, descriptor)
            });
        }

        let mut described = Vec::with_capacity(self.files.len());
        while let Some(joined) = decoding.join_next().await {
            let (path, descriptor) = joined.map_err(|err| MosaicError::Extraction(err.to_string()))?;
            match descriptor {
                Ok(vector) => described.push((path, vector)),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable library image"),
            }
        }

        // Decoding finishes in any order; sort so the index shape is reproducible.
        described.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(described = described.len(), "library descriptors computed");
        Ok(described)
    }
}

impl AssetCatalog<PathBuf> for DirectoryLibrary {
    type Handle = PathBuf;

    fn fetch_asset(&self, asset: &PathBuf) -> photomosaic::Result<PathBuf> {
        if self.files.contains(asset) {
            Ok(asset.clone())
        } else {
            Err(MosaicError::AssetFetch(format!("{} is not in the library", asset.display())))
        }
    }

    async fn request_image(
        &self,
        handle: PathBuf,
        target_width: usize,
        target_height: usize,
    ) -> photomosaic::Result<Photo> {
        tokio::task::spawn_blocking(move || {
            let img = image::open(&handle)
                .map_err(|err| MosaicError::AssetFetch(format!("{}: {err}", handle.display())))?;
            let resized = img.resize_exact(target_width as u32, target_height as u32, FilterType::Triangle);
            Ok(to_photo(resized))
        })
        .await
        .map_err(|err| MosaicError::AssetFetch(err.to_string()))?
    }
}
