use image::RgbaImage;
use rayon::prelude::*;

/// The RGBA raster every draw lands on.
#[derive(Debug, Clone)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major order.
    pixels: Vec<u8>,
    /// Bumped on every mutation so hosts know when to re-upload.
    revision: u64,
}

impl Surface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
            revision: 0,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.revision += 1;
    }

    /// Draw the top-left `src_side × src_side` square of `src` into the
    /// screen square at `(x, y)` with side `size`, sampling nearest
    /// neighbour and blending with opacity `alpha`.
    ///
    /// A destination pixel is covered when its centre lies inside the square.
    pub fn blit_scaled(&mut self, src: &RgbaImage, src_side: u32, x: f64, y: f64, size: f64, alpha: f32) {
        let src_side = src_side.min(src.width()).min(src.height());
        if src_side == 0 || !(size > 0.0) || !(alpha > 0.0) {
            return;
        }
        let Some((cols, rows)) = self.covered(x, y, size) else {
            return;
        };
        let ratio = src_side as f64 / size;
        let sample = |origin: f64, p: u32| {
            (((p as f64 + 0.5 - origin) * ratio).floor().max(0.0) as u32).min(src_side - 1)
        };
        let stride = self.width as usize * 4;
        let alpha = alpha.min(1.0);
        self.pixels[rows.start as usize * stride..rows.end as usize * stride]
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(r, row)| {
                let sy = sample(y, rows.start + r as u32);
                for px in cols.clone() {
                    let sx = sample(x, px);
                    let i = px as usize * 4;
                    blend(&mut row[i..i + 4], src.get_pixel(sx, sy).0, alpha);
                }
            });
        self.revision += 1;
    }

    /// Draw `src` unscaled with its top-left corner at `(x, y)`, clipped to
    /// the surface.
    pub fn put_image(&mut self, src: &RgbaImage, x: i64, y: i64) {
        let (w, h) = (self.width as i64, self.height as i64);
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + src.width() as i64).min(w);
        let y1 = (y + src.height() as i64).min(h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = self.width as usize * 4;
        self.pixels[y0 as usize * stride..y1 as usize * stride]
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(r, row)| {
                let sy = (y0 + r as i64 - y) as u32;
                for px in x0..x1 {
                    let sx = (px - x) as u32;
                    let i = px as usize * 4;
                    blend(&mut row[i..i + 4], src.get_pixel(sx, sy).0, 1.0);
                }
            });
        self.revision += 1;
    }

    /// Snapshot as an owned image.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Columns and rows whose pixel centres fall inside the square.
    fn covered(&self, x: f64, y: f64, size: f64) -> Option<(std::ops::Range<u32>, std::ops::Range<u32>)> {
        let span = |origin: f64, limit: u32| {
            let start = (origin - 0.5).ceil().max(0.0);
            let end = (origin + size - 0.5).ceil().min(limit as f64);
            (start < end).then(|| start as u32..end as u32)
        };
        Some((span(x, self.width)?, span(y, self.height)?))
    }
}

/// Source-over compositing of `src` (scaled by `alpha`) onto `dst`.
#[inline]
fn blend(dst: &mut [u8], src: [u8; 4], alpha: f32) {
    let sa = src[3] as f32 / 255.0 * alpha;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        dst.copy_from_slice(&src);
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src[c] as f32 * sa;
        let d = dst[c] as f32 * da * (1.0 - sa);
        dst[c] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn new_surface_is_transparent() {
        let surface = Surface::new(4, 4);
        assert_eq!(surface.pixels().len(), 4 * 4 * 4);
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn scaled_blit_covers_exactly_its_square() {
        let mut surface = Surface::new(8, 8);
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        surface.blit_scaled(&red, 2, 2.0, 1.0, 3.0, 1.0);

        assert_eq!(surface.pixel(2, 1), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(4, 3), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(5, 1), [0, 0, 0, 0]);
        assert_eq!(surface.pixel(2, 4), [0, 0, 0, 0]);
        assert_eq!(surface.pixel(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn nearest_neighbour_picks_the_right_source_texel() {
        let mut src = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        src.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let mut surface = Surface::new(4, 4);
        surface.blit_scaled(&src, 2, 0.0, 0.0, 4.0, 1.0);
        assert_eq!(surface.pixel(3, 1), [0, 255, 0, 255]);
        assert_eq!(surface.pixel(1, 1), [0, 0, 255, 255]);
        assert_eq!(surface.pixel(3, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn half_alpha_blends_over_existing_pixels() {
        let mut surface = Surface::new(1, 1);
        let black = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let white = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        surface.put_image(&black, 0, 0);
        surface.blit_scaled(&white, 1, 0.0, 0.0, 1.0, 0.5);
        let [r, g, b, a] = surface.pixel(0, 0);
        assert_eq!(a, 255);
        assert!((127..=128).contains(&r) && r == g && g == b);
    }

    #[test]
    fn put_image_clips_at_every_edge() {
        let mut surface = Surface::new(4, 4);
        let green = RgbaImage::from_pixel(3, 3, Rgba([0, 255, 0, 255]));
        surface.put_image(&green, -1, 2);
        assert_eq!(surface.pixel(0, 2), [0, 255, 0, 255]);
        assert_eq!(surface.pixel(1, 3), [0, 255, 0, 255]);
        assert_eq!(surface.pixel(2, 2), [0, 0, 0, 0]);
        surface.put_image(&green, 10, 10);
        surface.put_image(&green, -3, 0);
        assert_eq!(surface.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn transparent_source_pixels_leave_the_destination() {
        let mut surface = Surface::new(2, 1);
        surface.put_image(&RgbaImage::from_pixel(2, 1, Rgba([9, 9, 9, 255])), 0, 0);
        surface.put_image(&RgbaImage::from_pixel(2, 1, Rgba([200, 0, 0, 0])), 0, 0);
        assert_eq!(surface.pixel(1, 0), [9, 9, 9, 255]);
    }

    #[test]
    fn revision_tracks_mutations() {
        let mut surface = Surface::new(2, 2);
        let before = surface.revision();
        surface.clear();
        surface.put_image(&RgbaImage::new(1, 1), 0, 0);
        assert_eq!(surface.revision(), before + 2);
    }
}
