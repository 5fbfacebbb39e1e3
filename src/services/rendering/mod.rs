// Text rendering capability

use async_trait::async_trait;
use image::RgbaImage;

use crate::core::errors::ServiceResult;
use crate::core::types::{Region, RegionTranslation, Style};

/// Draws translations into their regions.
///
/// The three slices are index-aligned. Implementations draw in place and
/// must not change the image dimensions.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        image: &mut RgbaImage,
        translations: &[RegionTranslation],
        regions: &[Region],
        styles: &[Style],
    ) -> ServiceResult<()>;
}
