//! The level-dependent axis rule shared by index insertion and search.
//!
//! A [`FeatureVector`](crate::feature_vector::FeatureVector) has 27 components laid out
//! as 9 grid cells with 3 color channels each. At tree depth `level` the index compares
//! a single component, chosen by
//!
//! ```text
//! cell    = level mod 9
//! channel = (level + level / 3 + level / 9) mod 3
//! ```
//!
//! The channel term shifts by one every third level and again every ninth, so the first
//! 27 levels visit every `(cell, channel)` pair exactly once and the cycle then repeats.

/// Number of grid cells in a feature vector (a 3x3 layout).
pub const CELLS: usize = 9;

/// Number of color channels per cell.
pub const CHANNELS: usize = 3;

/// Total number of scalar components in a feature vector.
pub const DIMENSIONS: usize = CELLS * CHANNELS;

/// Number of tree levels after which the axis sequence repeats.
pub const AXIS_PERIOD: usize = 27;

/// One scalar component of a feature vector, addressed by grid cell and color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Axis {
    /// Grid cell index in `0..9`, row-major over the 3x3 layout.
    pub cell: usize,
    /// Color channel in `0..3` (red, green, blue).
    pub channel: usize,
}

impl Axis {
    /// Position of this component in the flattened 27-value layout.
    pub fn flat_index(&self) -> usize {
        self.cell * CHANNELS + self.channel
    }
}

/// Returns the axis compared at tree depth `level`.
///
/// # Examples
/// ```
/// use photomosaic::axis_cycle::{axis, Axis};
/// assert_eq!(axis(0), Axis { cell: 0, channel: 0 });
/// assert_eq!(axis(3), Axis { cell: 3, channel: 1 });
/// assert_eq!(axis(9), Axis { cell: 0, channel: 1 });
/// assert_eq!(axis(4), axis(4 + 27));
/// ```
pub fn axis(level: usize) -> Axis {
    Axis {
        cell: level % CELLS,
        channel: (level + level / 3 + level / 9) % CHANNELS,
    }
}
