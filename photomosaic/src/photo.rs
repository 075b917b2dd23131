use crate::error::{MosaicError, Result};
use crate::grid::Region;

/// A basic representation of an image with RGBA pixel data.
/// Each pixel occupies 4 bytes: R, G, B, and A (alpha).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Photo {
    /// Pixel data stored in a 1D `Vec<u8>`, in RGBA format (4 bytes per pixel).
    pub img_data: Vec<u8>,
    /// The width (in pixels) of the image.
    pub width: usize,
    /// The height (in pixels) of the image.
    pub height: usize,
}

impl Photo {
    /// Creates a `Photo` of the given size where every pixel has the color `(r, g, b)`
    /// and full opacity.
    ///
    /// # Examples
    /// ```
    /// use photomosaic::photo::Photo;
    /// let photo = Photo::filled(4, 2, (10, 20, 30));
    /// assert_eq!(photo.img_data.len(), 4 * 2 * 4);
    /// assert_eq!(photo.get_rgb(3, 1), (10, 20, 30));
    /// ```
    pub fn filled(width: usize, height: usize, rgb: (u8, u8, u8)) -> Photo {
        let (r, g, b) = rgb;
        Photo {
            img_data: [r, g, b, 255].repeat(width * height),
            width,
            height,
        }
    }

    /// Returns the `(R, G, B)` components at the pixel coordinate `(x, y)`.
    ///
    /// If `(x, y)` is out of bounds, this method returns `(0, 0, 255)`, effectively a blue pixel.
    pub fn get_rgb(&self, x: usize, y: usize) -> (u8, u8, u8) {
        if x >= self.width || y >= self.height {
            (0, 0, 255)
        } else {
            let index = (y * self.width + x) * 4;
            (
                self.img_data[index],
                self.img_data[index + 1],
                self.img_data[index + 2],
            )
        }
    }

    /// Sets the pixel at `(x, y)` to `(r, g, b)` with full opacity. Out of bounds writes are ignored.
    pub fn set_rgb(&mut self, x: usize, y: usize, rgb: (u8, u8, u8)) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = (y * self.width + x) * 4;
        self.img_data[index] = rgb.0;
        self.img_data[index + 1] = rgb.1;
        self.img_data[index + 2] = rgb.2;
        self.img_data[index + 3] = 255;
    }

    /// Copies the pixels covered by `region` into a new `Photo`.
    ///
    /// # Errors
    /// Returns [`MosaicError::RegionMismatch`] if the region is empty or reaches past
    /// the right or bottom edge of the image.
    pub fn crop(&self, region: &Region) -> Result<Photo> {
        if region.is_degenerate()
            || region.x + region.width > self.width
            || region.y + region.height > self.height
            || self.img_data.len() < self.width * self.height * 4
        {
            return Err(MosaicError::RegionMismatch {
                region: *region,
                width: self.width,
                height: self.height,
            });
        }

        let row_bytes = region.width * 4;
        let mut img_data = Vec::with_capacity(row_bytes * region.height);
        for y in region.y..region.y + region.height {
            let start = (y * self.width + region.x) * 4;
            img_data.extend_from_slice(&self.img_data[start..start + row_bytes]);
        }

        Ok(Photo {
            img_data,
            width: region.width,
            height: region.height,
        })
    }

    /// Produces a new `Photo` of exactly `new_width` x `new_height` pixels.
    ///
    /// Each pixel of the result is the average of the block of source pixels it covers.
    /// When enlarging, blocks shrink to a single source pixel so the image is sampled
    /// rather than averaged. An empty source produces a transparent black image.
    pub fn get_scaled(&self, new_width: usize, new_height: usize) -> Photo {
        let mut new_img_data = vec![0u8; new_width * new_height * 4];
        if self.width == 0 || self.height == 0 {
            return Photo {
                img_data: new_img_data,
                width: new_width,
                height: new_height,
            };
        }

        for new_y in 0..new_height {
            let orig_y_start = new_y * self.height / new_height;
            let orig_y_end = ((new_y + 1) * self.height / new_height).max(orig_y_start + 1);
            for new_x in 0..new_width {
                let orig_x_start = new_x * self.width / new_width;
                let orig_x_end = ((new_x + 1) * self.width / new_width).max(orig_x_start + 1);

                let mut totals = [0u32; 4];
                let mut pixel_count: u32 = 0;
                for orig_y in orig_y_start..orig_y_end.min(self.height) {
                    for orig_x in orig_x_start..orig_x_end.min(self.width) {
                        let orig_index = (orig_y * self.width + orig_x) * 4;
                        for (channel, total) in totals.iter_mut().enumerate() {
                            *total += self.img_data[orig_index + channel] as u32;
                        }
                        pixel_count += 1;
                    }
                }

                let new_index = (new_y * new_width + new_x) * 4;
                for (channel, total) in totals.iter().enumerate() {
                    new_img_data[new_index + channel] = (total / pixel_count.max(1)) as u8;
                }
            }
        }

        Photo {
            img_data: new_img_data,
            width: new_width,
            height: new_height,
        }
    }
}
