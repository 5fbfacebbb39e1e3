use anyhow::{Context, Result};
use image::{imageops, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::core::types::{Color, Region};

/// Copy the part of `img` covered by `region`.
///
/// The region is clamped to the image; `None` when nothing of it is inside.
pub fn crop_region(img: &RgbaImage, region: &Region) -> Option<RgbaImage> {
    let (x, y, w, h) = region.clamped_to(img.width(), img.height())?;
    Some(imageops::crop_imm(img, x, y, w, h).to_image())
}

/// Paint every region of `img` with a solid color, clamped to the image bounds.
pub fn fill_regions(img: &mut RgbaImage, regions: &[Region], color: Color) {
    let pixel = color.rgba();
    for region in regions {
        let Some((x, y, w, h)) = region.clamped_to(img.width(), img.height()) else {
            continue;
        };
        for py in y..y + h {
            for px in x..x + w {
                img.put_pixel(px, py, pixel);
            }
        }
    }
}

/// Encode an image to PNG bytes
pub fn encode_png_sync(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    img.write_to(&mut cursor, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png_bytes)
}

/// Asynchronously encode an image to PNG bytes using spawn_blocking.
///
/// PNG encoding is CPU-intensive and can block the async runtime if done synchronously.
pub async fn encode_png_async(img: RgbaImage) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_png_sync(&img))
        .await
        .context("Failed to spawn blocking task for PNG encoding")?
}
