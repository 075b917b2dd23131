use crate::axis_cycle::{axis, Axis, CELLS, CHANNELS, DIMENSIONS};
use crate::photo::Photo;
use serde::{Deserialize, Serialize};

/// A 27-value color descriptor for an image or image region.
///
/// The region is divided into a 3x3 grid and each grid cell stores the average
/// `(R, G, B)` of the pixels it covers, normalized to `0.0..=1.0`. Cells are stored
/// row-major, so cell `4` is the center of the region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    cells: [[f32; CHANNELS]; CELLS],
}

impl FeatureVector {
    /// Creates a descriptor from nine `[R, G, B]` triples in row-major cell order.
    pub fn new(cells: [[f32; CHANNELS]; CELLS]) -> Self {
        FeatureVector { cells }
    }

    /// Creates a descriptor whose nine cells all hold the same color.
    pub fn uniform(rgb: [f32; CHANNELS]) -> Self {
        FeatureVector { cells: [rgb; CELLS] }
    }

    /// Creates a descriptor from 27 values laid out as `cell * 3 + channel`.
    pub fn from_flat(values: [f32; DIMENSIONS]) -> Self {
        let mut cells = [[0.0; CHANNELS]; CELLS];
        for (i, value) in values.into_iter().enumerate() {
            cells[i / CHANNELS][i % CHANNELS] = value;
        }
        FeatureVector { cells }
    }

    /// Computes the descriptor of a whole photo by averaging each of its 3x3 blocks.
    ///
    /// Block edges are `floor(k * size / 3)`. A photo narrower or shorter than three
    /// pixels reuses its edge pixels so every block samples at least one pixel; an
    /// empty photo yields the all-zero descriptor.
    pub fn from_photo(photo: &Photo) -> Self {
        let mut cells = [[0.0; CHANNELS]; CELLS];
        if photo.width == 0 || photo.height == 0 {
            return FeatureVector { cells };
        }

        for (cell, rgb) in cells.iter_mut().enumerate() {
            let (x0, x1) = block_span(cell % 3, photo.width);
            let (y0, y1) = block_span(cell / 3, photo.height);

            let mut totals = [0u64; CHANNELS];
            let mut pixel_count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    let (r, g, b) = photo.get_rgb(x, y);
                    totals[0] += r as u64;
                    totals[1] += g as u64;
                    totals[2] += b as u64;
                    pixel_count += 1;
                }
            }

            for (value, total) in rgb.iter_mut().zip(totals) {
                *value = total as f32 / (pixel_count as f32 * 255.0);
            }
        }

        FeatureVector { cells }
    }

    /// Returns the `[R, G, B]` triple of grid cell `cell`.
    pub fn cell(&self, cell: usize) -> [f32; CHANNELS] {
        self.cells[cell]
    }

    /// Returns all nine cells in row-major order.
    pub fn cells(&self) -> &[[f32; CHANNELS]; CELLS] {
        &self.cells
    }

    /// Returns the component addressed by `axis`.
    pub fn at(&self, axis: Axis) -> f32 {
        self.cells[axis.cell][axis.channel]
    }

    /// Returns the component compared at tree depth `level`.
    pub fn at_level(&self, level: usize) -> f32 {
        self.at(axis(level))
    }

    /// Iterates the 27 components in flat `cell * 3 + channel` order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.cells.iter().flatten().copied()
    }

    /// Whether every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.values().all(f32::is_finite)
    }

    /// Sum of squared channel differences over all 27 components.
    ///
    /// This is the one metric used by the spatial index, both for ranking candidates
    /// and, restricted to a single axis, for pruning.
    pub fn squared_distance(&self, other: &FeatureVector) -> f32 {
        self.values()
            .zip(other.values())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Half-open pixel span of block `k` (of 3) along an edge of `size` pixels.
fn block_span(k: usize, size: usize) -> (usize, usize) {
    let start = (k * size / 3).min(size - 1);
    let end = ((k + 1) * size / 3).clamp(start + 1, size);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_photo_has_uniform_descriptor() {
        let photo = Photo::filled(30, 12, (255, 0, 51));
        let fv = FeatureVector::from_photo(&photo);
        assert_eq!(fv, FeatureVector::uniform([1.0, 0.0, 0.2]));
    }

    #[test]
    fn blocks_follow_row_major_layout() {
        let mut photo = Photo::filled(6, 6, (0, 0, 0));
        // Bottom-right block (cell 8) is pixels x in 4..6, y in 4..6.
        for y in 4..6 {
            for x in 4..6 {
                photo.set_rgb(x, y, (255, 255, 255));
            }
        }
        let fv = FeatureVector::from_photo(&photo);
        assert_eq!(fv.cell(8), [1.0, 1.0, 1.0]);
        for cell in 0..8 {
            assert_eq!(fv.cell(cell), [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn tiny_photos_still_fill_every_cell() {
        let photo = Photo::filled(1, 2, (255, 255, 255));
        let fv = FeatureVector::from_photo(&photo);
        assert!(fv.cells().iter().all(|rgb| *rgb == [1.0, 1.0, 1.0]));
        assert_eq!(FeatureVector::from_photo(&Photo::default()), FeatureVector::default());
    }

    #[test]
    fn level_access_follows_the_axis_cycle() {
        let values: [f32; DIMENSIONS] = std::array::from_fn(|i| i as f32);
        let fv = FeatureVector::from_flat(values);
        assert_eq!(fv.at_level(0), 0.0);
        // level 3 -> cell 3, channel 1
        assert_eq!(fv.at_level(3), 10.0);
        // level 9 -> cell 0, channel 1
        assert_eq!(fv.at_level(9), 1.0);
    }

    #[test]
    fn non_finite_components_are_detected() {
        assert!(FeatureVector::uniform([0.1, 0.2, 0.3]).is_finite());
        let mut values = [0.5f32; DIMENSIONS];
        values[13] = f32::NAN;
        assert!(!FeatureVector::from_flat(values).is_finite());
        values[13] = f32::INFINITY;
        assert!(!FeatureVector::from_flat(values).is_finite());
    }

    #[test]
    fn squared_distance_sums_every_component() {
        let a = FeatureVector::uniform([0.0, 0.0, 0.0]);
        let b = FeatureVector::uniform([0.5, 0.0, 0.0]);
        assert_eq!(a.squared_distance(&a), 0.0);
        assert!((a.squared_distance(&b) - 9.0 * 0.25).abs() < 1e-6);
    }
}
