use crate::grid::Region;
use crate::photo::Photo;

/// The library image chosen for one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageChoice<K> {
    /// Grid row of the cell.
    pub row: usize,
    /// Grid column of the cell.
    pub col: usize,
    /// The chosen library asset.
    pub asset: K,
    /// The asset decoded at the cell's size times the requested quality.
    pub image: Photo,
    /// The pixels of the reference image the asset replaces.
    pub region: Region,
    /// Squared descriptor distance between the cell and the asset, lower is better.
    pub score: f32,
}
