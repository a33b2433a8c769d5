// Image viewport module
// Fits the image into the window buffer, letterboxing the unused area

use crate::image_loader::ImageData;
use log::debug;

/// Opaque dark grey in BGRA
const BACKGROUND: [u8; 4] = [0x20, 0x20, 0x20, 0xff];

/// A borrowed BGRA pixel source
#[derive(Debug, Clone, Copy)]
struct Level<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

/// Displays one image. Created when an image is opened, destroyed when it is closed.
#[derive(Debug)]
pub struct ImageViewport {
    image: ImageData,
    /// Largest edge of any pixel source the viewport samples from
    roi_size: u32,
}

impl ImageViewport {
    pub fn create(image: ImageData, roi_size: u32) -> Self {
        debug!(
            "Viewport for {} ({}x{}), ROI {}",
            image.label, image.width, image.height, roi_size
        );
        Self { image, roi_size }
    }

    pub fn destroy(self) {
        debug!("Viewport for {} destroyed", self.image.label);
    }

    #[cfg(test)]
    pub fn image(&self) -> &ImageData {
        &self.image
    }

    /// Where the image lands inside a `width` x `height` canvas: (x, y, w, h)
    pub fn placement(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let scale = (width as f32 / self.image.width as f32)
            .min(height as f32 / self.image.height as f32);
        let w = ((self.image.width as f32 * scale).round() as u32).clamp(1, width.max(1));
        let h = ((self.image.height as f32 * scale).round() as u32).clamp(1, height.max(1));
        ((width - w) / 2, (height - h) / 2, w, h)
    }

    /// Pick the smallest level that still covers `target_w` pixels, within the ROI
    fn level(&self, target_w: u32) -> Level<'_> {
        let base = Level {
            width: self.image.width,
            height: self.image.height,
            data: &self.image.bgra_data,
        };
        let levels = std::iter::once(base).chain(self.image.mipmaps.iter().map(|m| Level {
            width: m.width,
            height: m.height,
            data: &m.data,
        }));

        let mut chosen = base;
        for level in levels {
            let within_roi = level.width.max(level.height) <= self.roi_size;
            let oversized = chosen.width.max(chosen.height) > self.roi_size;
            if oversized || (within_roi && level.width >= target_w) {
                chosen = level;
            }
        }
        chosen
    }

    /// Render into a BGRA canvas of `width` x `height` pixels
    pub fn render(&self, canvas: &mut [u8], width: u32, height: u32) {
        for pixel in canvas.chunks_exact_mut(4) {
            pixel.copy_from_slice(&BACKGROUND);
        }
        if width == 0 || height == 0 {
            return;
        }

        let (off_x, off_y, dst_w, dst_h) = self.placement(width, height);
        let src = self.level(dst_w);

        // Fixed-point source steps for nearest-neighbour sampling
        let step_x = ((src.width as u64) << 16) / dst_w as u64;
        let step_y = ((src.height as u64) << 16) / dst_h as u64;
        let x_lut: Vec<usize> = (0..dst_w)
            .map(|x| ((((x as u64 * step_x) >> 16) as u32).min(src.width - 1) * 4) as usize)
            .collect();

        for y in 0..dst_h {
            let src_y = (((y as u64 * step_y) >> 16) as u32).min(src.height - 1);
            let src_row = (src_y * src.width * 4) as usize;
            let dst_row = (((off_y + y) * width + off_x) * 4) as usize;

            for (x, &src_x) in x_lut.iter().enumerate() {
                let s = src_row + src_x;
                let d = dst_row + x * 4;
                if s + 4 <= src.data.len() && d + 4 <= canvas.len() {
                    canvas[d..d + 4].copy_from_slice(&src.data[s..s + 4]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> ImageData {
        let pixels = rgba.repeat((width * height) as usize);
        ImageData::from_rgba("solid", width, height, pixels)
    }

    #[test]
    fn wide_image_is_letterboxed_vertically() {
        let viewport = ImageViewport::create(solid(200, 100, [255, 0, 0, 255]), 4096);
        assert_eq!(viewport.placement(100, 100), (0, 25, 100, 50));

        let mut canvas = vec![0u8; 100 * 100 * 4];
        viewport.render(&mut canvas, 100, 100);

        let at = |x: usize, y: usize| &canvas[(y * 100 + x) * 4..(y * 100 + x) * 4 + 4];
        assert_eq!(at(50, 10), &BACKGROUND);
        assert_eq!(at(50, 50), &[0, 0, 255, 255]);
        assert_eq!(at(50, 90), &BACKGROUND);
    }

    #[test]
    fn roi_limits_sampled_level() {
        let viewport = ImageViewport::create(solid(256, 256, [1, 2, 3, 255]), 128);
        let level = viewport.level(256);
        assert_eq!((level.width, level.height), (128, 128));

        let unlimited = ImageViewport::create(solid(256, 256, [1, 2, 3, 255]), 4096);
        assert_eq!(unlimited.level(256).width, 256);
        assert_eq!(unlimited.level(60).width, 64);
    }
}
