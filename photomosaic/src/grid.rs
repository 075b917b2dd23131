use crate::error::{MosaicError, Result};
use std::fmt;

/// A rectangle of pixels inside an image, given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Region { x, y, width, height }
    }

    /// A region with zero width or height covers no pixels.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// One tile position of the mosaic grid laid over the reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    /// Row-major position in the grid, `row * cols + col`.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// The pixels of the reference image this cell stands for.
    pub region: Region,
}

/// Splits a `image_width` x `image_height` image into square cells of `grid_size` pixels.
///
/// The grid has `floor(image_height / grid_size)` rows and `floor(image_width / grid_size)`
/// columns; leftover pixels on the right and bottom are not covered. Cell regions are
/// clipped to the image bounds and cells that end up empty are skipped.
///
/// # Errors
/// Returns [`MosaicError::InvalidSkipSize`] if `grid_size` is zero.
///
/// # Examples
/// ```
/// use photomosaic::grid::{partition, Region};
/// let cells = partition(100, 100, 50).unwrap();
/// assert_eq!(cells.len(), 4);
/// assert_eq!(cells[1].region, Region::new(50, 0, 50, 50));
/// assert_eq!((cells[2].row, cells[2].col), (1, 0));
/// ```
pub fn partition(image_width: usize, image_height: usize, grid_size: usize) -> Result<Vec<GridCell>> {
    if grid_size == 0 {
        return Err(MosaicError::InvalidSkipSize(grid_size));
    }

    let rows = image_height / grid_size;
    let cols = image_width / grid_size;

    let cells = (0..rows * cols)
        .filter_map(|index| {
            let row = index / cols;
            let col = index % cols;
            let x = col * grid_size;
            let y = row * grid_size;
            let region = Region::new(
                x,
                y,
                grid_size.min(image_width.saturating_sub(x)),
                grid_size.min(image_height.saturating_sub(y)),
            );
            (!region.is_degenerate()).then_some(GridCell { index, row, col, region })
        })
        .collect();

    Ok(cells)
}

/// Positions in `0..cell_count` handled by `worker` when cells are dealt out
/// round-robin over `worker_count` workers, i.e. every `i` with `i % worker_count == worker`.
///
/// # Examples
/// ```
/// use photomosaic::grid::worker_slice;
/// let slice: Vec<usize> = worker_slice(10, 4, 1).collect();
/// assert_eq!(slice, vec![1, 5, 9]);
/// ```
pub fn worker_slice(cell_count: usize, worker_count: usize, worker: usize) -> impl Iterator<Item = usize> {
    (worker..cell_count).step_by(worker_count.max(1))
}
