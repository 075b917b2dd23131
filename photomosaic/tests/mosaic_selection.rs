//! End-to-end selection against an in-memory library keyed by file name.

use photomosaic::{
    AssetCatalog, FeatureExtractor, FeatureVector, MatchingPipeline, MosaicError, Photo, PipelineConfig,
    PipelineState, Region, Result, SpatialIndex,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

struct Library {
    images: BTreeMap<String, Photo>,
}

impl Library {
    fn new(entries: &[(&str, (u8, u8, u8))]) -> Self {
        Library {
            images: entries
                .iter()
                .map(|&(name, color)| (name.to_string(), Photo::filled(16, 12, color)))
                .collect(),
        }
    }
}

impl FeatureExtractor<String> for Library {
    async fn extract(&self, region: &Photo) -> Result<FeatureVector> {
        Ok(FeatureVector::from_photo(region))
    }

    async fn preprocess_library(&self) -> Result<Vec<(String, FeatureVector)>> {
        Ok(self
            .images
            .iter()
            .map(|(name, photo)| (name.clone(), FeatureVector::from_photo(photo)))
            .collect())
    }
}

struct Catalog(Library);

impl AssetCatalog<String> for Catalog {
    type Handle = Photo;

    fn fetch_asset(&self, asset: &String) -> Result<Photo> {
        self.0
            .images
            .get(asset)
            .cloned()
            .ok_or_else(|| MosaicError::AssetFetch(asset.clone()))
    }

    async fn request_image(&self, handle: Photo, target_width: usize, target_height: usize) -> Result<Photo> {
        Ok(handle.get_scaled(target_width, target_height))
    }
}

const ENTRIES: [(&str, (u8, u8, u8)); 4] = [
    ("dusk.png", (40, 20, 90)),
    ("lawn.png", (30, 160, 40)),
    ("snow.png", (250, 250, 250)),
    ("brick.png", (180, 60, 40)),
];

fn reference() -> Photo {
    let mut photo = Photo::filled(100, 100, (250, 250, 250));
    for y in 0..50 {
        for x in 0..100 {
            photo.set_rgb(x, y, if x < 50 { (180, 60, 40) } else { (30, 160, 40) });
        }
    }
    for y in 50..100 {
        for x in 0..50 {
            photo.set_rgb(x, y, (45, 25, 95));
        }
    }
    photo
}

fn pipeline(workers: usize) -> MatchingPipeline<String, Library, Catalog> {
    MatchingPipeline::with_config(
        reference(),
        Library::new(&ENTRIES),
        Catalog(Library::new(&ENTRIES)),
        PipelineConfig::default().with_worker_count(workers),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_cells_for_a_fifty_pixel_grid() {
    let pipeline = pipeline(32);
    assert_eq!(pipeline.state(), PipelineState::NotStarted);
    pipeline.preprocess(|_| {}).await.unwrap();

    let mut choices = Vec::new();
    let report = pipeline.select(50, 2, |choice| choices.push(choice)).await.unwrap();
    choices.sort_by_key(|c| (c.row, c.col));

    assert_eq!(report.delivered, 4);
    let summary: Vec<(usize, usize, Region, &str)> = choices
        .iter()
        .map(|c| (c.row, c.col, c.region, c.asset.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, 0, Region::new(0, 0, 50, 50), "brick.png"),
            (0, 1, Region::new(50, 0, 50, 50), "lawn.png"),
            (1, 0, Region::new(0, 50, 50, 50), "dusk.png"),
            (1, 1, Region::new(50, 50, 50, 50), "snow.png"),
        ]
    );
    assert_eq!(choices[0].score, 0.0);
    assert!(choices[2].score > 0.0);
    assert!(choices.iter().all(|c| (c.image.width, c.image.height) == (100, 100)));
    assert_eq!(choices[3].image.get_rgb(99, 99), (250, 250, 250));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_and_full_pool_agree() {
    let serial = pipeline(1);
    let pooled = pipeline(32);
    serial.preprocess(|_| {}).await.unwrap();
    pooled.preprocess(|_| {}).await.unwrap();

    let mut a = Vec::new();
    let mut b = Vec::new();
    serial.select(9, 1, |c| a.push((c.row, c.col, c.asset))).await.unwrap();
    pooled.select(9, 1, |c| b.push((c.row, c.col, c.asset))).await.unwrap();
    a.sort();
    b.sort();
    assert_eq!(a.len(), 121);
    assert_eq!(a, b);
}

#[tokio::test]
async fn built_index_can_be_persisted_and_reused() {
    let pipeline = pipeline(4);
    pipeline.preprocess(|_| {}).await.unwrap();
    let index = pipeline.index().unwrap();

    let restored: SpatialIndex<String> = SpatialIndex::deserialize(&index.serialize().unwrap()).unwrap();
    for name in ENTRIES.map(|(name, _)| name.to_string()) {
        assert!(restored.is_member(&name));
    }
    let query = FeatureVector::from_photo(&Photo::filled(5, 5, (31, 161, 41)));
    assert_eq!(restored.nearest_match(&query).unwrap().asset, "lawn.png");
    assert_eq!(restored.nearest_match(&query), index.nearest_match(&query));
}
