// Text recognition capability

pub mod vision;

use async_trait::async_trait;
use image::RgbaImage;

use crate::core::backends::RecognizerBackend;
use crate::core::errors::ServiceResult;
use crate::core::params::Credentials;
use crate::core::types::Region;

pub use vision::VisionRecognizer;

#[derive(Debug, Clone, Copy)]
pub struct RecognitionRequest<'a> {
    pub backend: RecognizerBackend,
    pub source_language: &'a str,
    pub credentials: &'a Credentials,
    pub json_response: bool,
}

/// Reads the text inside regions of an image.
///
/// Returns one string per region, in region order. A region with no
/// readable text yields an empty string.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        request: &RecognitionRequest<'_>,
    ) -> ServiceResult<Vec<String>>;
}
