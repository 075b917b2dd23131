use crate::collaborators::{AssetCatalog, FeatureExtractor};
use crate::error::{MosaicError, Result};
use crate::grid::{partition, worker_slice, GridCell};
use crate::image_choice::ImageChoice;
use crate::photo::Photo;
use crate::spatial_index::SpatialIndex;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Number of concurrent matching workers used when no other count is configured.
pub const DEFAULT_WORKER_COUNT: usize = 32;

/// Lifecycle of a [`MatchingPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No index has been built yet.
    NotStarted,
    /// The candidate library is being indexed.
    Preprocessing,
    /// The index is built and tiles can be selected.
    Ready,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::NotStarted => "not started",
            PipelineState::Preprocessing => "preprocessing",
            PipelineState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Tuning knobs for a [`MatchingPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Size of the worker pool grid cells are dealt out to. Always at least 1.
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

impl PipelineConfig {
    /// Sets the worker pool size; zero is raised to one.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }
}

/// Summary of a finished [`MatchingPipeline::preprocess`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessReport {
    /// Number of library descriptors inserted into the index.
    pub indexed: usize,
    /// Number of library descriptors left out because they had non-finite components.
    pub rejected: usize,
    /// Longest root-to-leaf path of the built index.
    pub depth: usize,
}

/// A grid cell that could not be resolved to a library image.
#[derive(Debug)]
pub struct CellFailure {
    pub cell: GridCell,
    pub error: MosaicError,
}

/// Summary of a finished [`MatchingPipeline::select`] run.
#[derive(Debug, Default)]
pub struct SelectionReport {
    /// Number of grid cells scheduled.
    pub cells: usize,
    /// Number of [`ImageChoice`]s handed to the callback.
    pub delivered: usize,
    /// Cells that were skipped, with the reason.
    pub failures: Vec<CellFailure>,
}

struct Shared<K> {
    state: PipelineState,
    index: Option<Arc<SpatialIndex<K>>>,
}

/// Drops the pipeline back to `NotStarted` if a preprocess run ends without publishing an index,
/// whether it failed or its future was dropped.
struct PreprocessGuard<'a, K> {
    shared: &'a Mutex<Shared<K>>,
    armed: bool,
}

impl<K> Drop for PreprocessGuard<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.state = PipelineState::NotStarted;
            shared.index = None;
        }
    }
}

/// Selects a library image for every cell of a grid laid over a reference photo.
///
/// The pipeline runs in two phases:
/// 1. [`preprocess`](MatchingPipeline::preprocess) asks the [`FeatureExtractor`] for the
///    descriptor of every library asset and builds a [`SpatialIndex`] from them.
/// 2. [`select`](MatchingPipeline::select) cuts the reference photo into square cells and
///    resolves each one on a pool of tokio tasks: crop, extract, look up the nearest
///    library descriptor, decode the asset through the [`AssetCatalog`].
///
/// The index is published as an `Arc<SpatialIndex>` once built and never mutated again,
/// so the workers search it concurrently without locking. Results from all workers are
/// funnelled through one channel and handed to the caller's callback from the task that
/// called `select`, one at a time.
pub struct MatchingPipeline<K, E, C> {
    reference: Arc<Photo>,
    extractor: Arc<E>,
    catalog: Arc<C>,
    config: PipelineConfig,
    shared: Mutex<Shared<K>>,
}

impl<K, E, C> MatchingPipeline<K, E, C>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    E: FeatureExtractor<K> + 'static,
    C: AssetCatalog<K> + 'static,
{
    /// Creates a pipeline for `reference` with the default configuration.
    pub fn new(reference: Photo, extractor: E, catalog: C) -> Self {
        Self::with_config(reference, extractor, catalog, PipelineConfig::default())
    }

    pub fn with_config(reference: Photo, extractor: E, catalog: C, config: PipelineConfig) -> Self {
        MatchingPipeline {
            reference: Arc::new(reference),
            extractor: Arc::new(extractor),
            catalog: Arc::new(catalog),
            config: config.with_worker_count(config.worker_count),
            shared: Mutex::new(Shared {
                state: PipelineState::NotStarted,
                index: None,
            }),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub fn reference(&self) -> &Photo {
        &self.reference
    }

    /// The index built by the last successful preprocess run, if any.
    pub fn index(&self) -> Option<Arc<SpatialIndex<K>>> {
        self.lock().index.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared<K>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Indexes the whole candidate library, then calls `on_complete`.
    ///
    /// Any previous index is discarded first, so calling this again from `Ready`
    /// rebuilds from scratch. If the library cannot be enumerated the pipeline
    /// returns to `NotStarted`.
    ///
    /// # Errors
    /// [`MosaicError::InvalidProcessingState`] if another preprocess run is in progress,
    /// or the extractor's error if the library could not be enumerated.
    pub async fn preprocess<F>(&self, on_complete: F) -> Result<PreprocessReport>
    where
        F: FnOnce(PreprocessReport) + Send,
    {
        {
            let mut shared = self.lock();
            if shared.state == PipelineState::Preprocessing {
                return Err(MosaicError::InvalidProcessingState {
                    operation: "preprocess",
                    state: shared.state,
                });
            }
            shared.state = PipelineState::Preprocessing;
            shared.index = None;
        }
        let mut guard = PreprocessGuard {
            shared: &self.shared,
            armed: true,
        };

        info!("indexing candidate library");
        let library = self.extractor.preprocess_library().await?;

        let mut index = SpatialIndex::new();
        let mut rejected = 0;
        for (asset, vector) in library {
            if let Err(err) = index.insert(asset, vector) {
                warn!(error = %err, "leaving library asset out of the index");
                rejected += 1;
            }
        }
        let report = PreprocessReport {
            indexed: index.len(),
            rejected,
            depth: index.depth(),
        };
        debug!(
            indexed = report.indexed,
            rejected = report.rejected,
            depth = report.depth,
            "spatial index built"
        );

        {
            let mut shared = self.lock();
            shared.index = Some(Arc::new(index));
            shared.state = PipelineState::Ready;
        }
        guard.armed = false;

        info!(indexed = report.indexed, "candidate library ready");
        on_complete(report);
        Ok(report)
    }

    /// Resolves every cell of a `grid_size` pixel grid to its closest library image.
    ///
    /// Each resolved cell is passed to `on_match` as an [`ImageChoice`]. Deliveries never
    /// overlap, but they arrive in whatever order the workers finish. `quality` scales the
    /// decoded tile: images are requested at the cell size times `quality` (zero counts
    /// as one).
    ///
    /// A cell that fails to crop, extract or decode is logged, listed in the returned
    /// report and skipped; the other cells are unaffected. If a worker task dies, the
    /// cells it had not finished are listed as [`MosaicError::WorkerStopped`], so
    /// `delivered + failures.len()` always equals `cells`.
    ///
    /// # Errors
    /// - [`MosaicError::InvalidProcessingState`] unless the pipeline is `Ready`.
    /// - [`MosaicError::InvalidSkipSize`] if `grid_size` is zero.
    /// - [`MosaicError::EmptyLibrary`] if the index holds no candidates.
    pub async fn select<F>(&self, grid_size: usize, quality: usize, mut on_match: F) -> Result<SelectionReport>
    where
        F: FnMut(ImageChoice<K>) + Send,
    {
        let index = {
            let shared = self.lock();
            match (shared.state, &shared.index) {
                (PipelineState::Ready, Some(index)) => Arc::clone(index),
                (state, _) => {
                    return Err(MosaicError::InvalidProcessingState {
                        operation: "select",
                        state,
                    })
                }
            }
        };
        let cells = Arc::new(partition(self.reference.width, self.reference.height, grid_size)?);
        if index.is_empty() {
            return Err(MosaicError::EmptyLibrary);
        }

        let quality = quality.max(1);
        let worker_count = self.config.worker_count;
        info!(
            cells = cells.len(),
            grid_size,
            quality,
            workers = worker_count,
            "selecting library images"
        );

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        // Workers past the last cell would have nothing to do.
        for worker in 0..worker_count.min(cells.len()) {
            let sender = sender.clone();
            let cells = Arc::clone(&cells);
            let index = Arc::clone(&index);
            let reference = Arc::clone(&self.reference);
            let extractor = Arc::clone(&self.extractor);
            let catalog = Arc::clone(&self.catalog);

            workers.spawn(async move {
                let mut resolved = 0usize;
                for i in worker_slice(cells.len(), worker_count, worker) {
                    let cell = cells[i];
                    let outcome = resolve_cell(&reference, extractor.as_ref(), catalog.as_ref(), &index, cell, quality)
                        .await
                        .map_err(|error| CellFailure { cell, error });
                    if sender.send((i, outcome)).is_err() {
                        break;
                    }
                    resolved += 1;
                }
                debug!(worker, resolved, "matching worker finished");
            });
        }
        drop(sender);

        let mut report = SelectionReport {
            cells: cells.len(),
            ..SelectionReport::default()
        };
        let mut answered = vec![false; cells.len()];
        while let Some((i, outcome)) = receiver.recv().await {
            answered[i] = true;
            match outcome {
                Ok(choice) => {
                    on_match(choice);
                    report.delivered += 1;
                }
                Err(failure) => {
                    warn!(
                        row = failure.cell.row,
                        col = failure.cell.col,
                        error = %failure.error,
                        "skipping grid cell"
                    );
                    report.failures.push(failure);
                }
            }
        }

        let mut stopped = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(%err, "matching worker stopped before finishing its cells");
                stopped.get_or_insert_with(|| err.to_string());
            }
        }

        // Cells a dead worker never got to are reported rather than dropped.
        if let Some(reason) = stopped {
            for (i, _) in answered.iter().enumerate().filter(|(_, answered)| !**answered) {
                report.failures.push(CellFailure {
                    cell: cells[i],
                    error: MosaicError::WorkerStopped(reason.clone()),
                });
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failures.len(),
            "selection finished"
        );
        Ok(report)
    }
}

/// Crops, describes, matches and decodes a single grid cell.
async fn resolve_cell<K, E, C>(
    reference: &Photo,
    extractor: &E,
    catalog: &C,
    index: &SpatialIndex<K>,
    cell: GridCell,
    quality: usize,
) -> Result<ImageChoice<K>>
where
    K: Clone + Eq + Hash,
    E: FeatureExtractor<K>,
    C: AssetCatalog<K>,
{
    let region = reference.crop(&cell.region)?;
    let vector = extractor.extract(&region).await?;
    if !vector.is_finite() {
        return Err(MosaicError::NonFiniteDescriptor);
    }
    let found = index.nearest_match(&vector).ok_or(MosaicError::EmptyLibrary)?;

    let (target_width, target_height) = cell
        .region
        .width
        .checked_mul(quality)
        .zip(cell.region.height.checked_mul(quality))
        .ok_or(MosaicError::TileSizeOverflow {
            region: cell.region,
            quality,
        })?;

    let handle = catalog.fetch_asset(&found.asset)?;
    let image = catalog.request_image(handle, target_width, target_height).await?;

    Ok(ImageChoice {
        row: cell.row,
        col: cell.col,
        asset: found.asset,
        image,
        region: cell.region,
        score: found.score,
    })
}
