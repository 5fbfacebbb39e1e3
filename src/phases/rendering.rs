// Render stage: draw translations into their regions

use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::types::{Region, RegionTranslation, Style};
use crate::services::rendering::Renderer;

pub struct RenderingPhase {
    renderer: Arc<dyn Renderer>,
}

impl RenderingPhase {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }

    /// Render in place. A renderer that resizes the image is rejected.
    #[instrument(skip_all, fields(regions = regions.len()))]
    pub async fn execute(
        &self,
        image: &mut RgbaImage,
        translations: &[RegionTranslation],
        regions: &[Region],
        styles: &[Style],
    ) -> ServiceResult<()> {
        let dimensions = image.dimensions();
        self.renderer
            .render(image, translations, regions, styles)
            .await?;

        if image.dimensions() != dimensions {
            return Err(ServiceError::configuration(
                "render",
                format!(
                    "renderer changed image size from {:?} to {:?}",
                    dimensions,
                    image.dimensions()
                ),
            ));
        }
        debug!("Rendered {} regions", regions.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ResizingRenderer, StampRenderer};

    #[tokio::test]
    async fn test_resizing_renderer_is_rejected() {
        let phase = RenderingPhase::new(Arc::new(ResizingRenderer));
        let mut image = RgbaImage::new(8, 8);
        let err = phase.execute(&mut image, &[], &[], &[]).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let phase = RenderingPhase::new(Arc::new(StampRenderer));
        let regions = [Region::new(1, 1, 6, 6).unwrap()];
        let translations = [RegionTranslation::new("hello")];
        let styles = [Style::default()];

        let mut first = RgbaImage::new(8, 8);
        let mut second = RgbaImage::new(8, 8);
        phase.execute(&mut first, &translations, &regions, &styles).await.unwrap();
        phase.execute(&mut second, &translations, &regions, &styles).await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, RgbaImage::new(8, 8));
    }
}
