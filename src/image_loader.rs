// Image loading module
// Decodes the image to show and prepares a BGRA pixel buffer plus a mipmap chain

use crate::cli::ImageSource;
use anyhow::{Context, Result};
use image::DynamicImage;
use std::fs;
use std::io::Cursor;

/// Decoded image ready for the viewport
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Short name shown in the window title
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// BGRA pixel data (4 bytes per pixel), the byte order of ARGB8888 shm buffers
    pub bgra_data: Vec<u8>,
    /// Progressively half-sized versions of the image
    pub mipmaps: Vec<MipmapLevel>,
}

/// A single mipmap level
#[derive(Debug, Clone)]
pub struct MipmapLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Build from already decoded RGBA pixels
    pub fn from_rgba(label: impl Into<String>, width: u32, height: u32, mut pixels: Vec<u8>) -> Self {
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        let mipmaps = generate_mipmaps(width, height, &pixels);
        Self {
            label: label.into(),
            width,
            height,
            bgra_data: pixels,
            mipmaps,
        }
    }
}

/// Load and decode the image named by the command line
pub fn load_image(source: &ImageSource) -> Result<ImageData> {
    let (label, img) = match source {
        ImageSource::Stdin(data) => ("stdin".to_string(), load_from_bytes(data)?),
        ImageSource::File(path) => {
            let data = fs::read(path)
                .with_context(|| format!("Failed to read image file: {}", path.display()))?;
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (label, load_from_bytes(&data)?)
        }
    };

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData::from_rgba(label, width, height, rgba.into_raw()))
}

/// Halve the image with a 2x2 box filter until it gets small
fn generate_mipmaps(width: u32, height: u32, data: &[u8]) -> Vec<MipmapLevel> {
    let mut mipmaps: Vec<MipmapLevel> = Vec::new();
    let (mut src_w, mut src_h) = (width, height);

    while src_w >= 64 && src_h >= 64 && mipmaps.len() < 8 {
        let src = mipmaps.last().map_or(data, |level| &level.data[..]);
        let (dst_w, dst_h) = (src_w / 2, src_h / 2);
        let mut dst = vec![0u8; (dst_w * dst_h * 4) as usize];

        for y in 0..dst_h {
            for x in 0..dst_w {
                let mut sum = [0u32; 4];
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let idx = (((y * 2 + dy) * src_w + x * 2 + dx) * 4) as usize;
                    for (acc, byte) in sum.iter_mut().zip(&src[idx..idx + 4]) {
                        *acc += *byte as u32;
                    }
                }
                let dst_idx = ((y * dst_w + x) * 4) as usize;
                for (out, acc) in dst[dst_idx..dst_idx + 4].iter_mut().zip(sum) {
                    *out = (acc / 4) as u8;
                }
            }
        }

        mipmaps.push(MipmapLevel {
            width: dst_w,
            height: dst_h,
            data: dst,
        });
        src_w = dst_w;
        src_h = dst_h;
    }

    mipmaps
}

/// Decode raw bytes, sniffing the format from the content
fn load_from_bytes(data: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(data).context("Failed to detect image format")?;
    image::load(Cursor::new(data), format).context("Failed to decode image")
}
