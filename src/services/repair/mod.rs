// Text removal capability

use async_trait::async_trait;
use image::RgbaImage;
use tracing::debug;

use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::types::{Color, Region};
use crate::utils::image_ops::fill_regions;

/// Image with the source text removed
#[derive(Debug, Clone)]
pub struct RepairOutput {
    pub image: RgbaImage,
    /// Text-free copy kept for later partial re-rendering
    pub clean_background: Option<RgbaImage>,
}

#[async_trait]
pub trait Repairer: Send + Sync {
    async fn repair(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        fill_color: Color,
    ) -> ServiceResult<RepairOutput>;
}

/// Paints every region with the fill color. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatFillRepairer;

impl FlatFillRepairer {
    pub fn fill(image: &RgbaImage, regions: &[Region], fill_color: Color) -> RgbaImage {
        let mut filled = image.clone();
        fill_regions(&mut filled, regions, fill_color);
        filled
    }
}

#[async_trait]
impl Repairer for FlatFillRepairer {
    async fn repair(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        fill_color: Color,
    ) -> ServiceResult<RepairOutput> {
        let image = image.clone();
        let regions = regions.to_vec();
        let filled = tokio::task::spawn_blocking(move || Self::fill(&image, &regions, fill_color))
            .await
            .map_err(|e| ServiceError::transient("repair/solid", format!("fill task failed: {e}")))?;

        debug!("Flat-filled {}x{} image", filled.width(), filled.height());
        Ok(RepairOutput {
            clean_background: Some(filled.clone()),
            image: filled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn test_flat_fill_paints_only_regions() {
        let image = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let region = Region::new(5, 5, 10, 10).unwrap();

        let output = FlatFillRepairer
            .repair(&image, &[region], Color::WHITE)
            .await
            .unwrap();

        assert_eq!(output.image.get_pixel(7, 7), &Rgba([255, 255, 255, 255]));
        assert_eq!(output.image.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(output.clean_background.as_ref(), Some(&output.image));
        assert_eq!(image.get_pixel(7, 7), &Rgba([0, 0, 0, 255]));
    }
}
