// Remote recognizer backed by an OpenAI-compatible vision model

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::RgbaImage;
use std::sync::Arc;
use tracing::debug;

use crate::core::backends::BackendKind;
use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::types::Region;
use crate::services::ocr::{RecognitionRequest, Recognizer};
use crate::services::translation::api_client::{extract_json_field, ChatClient, ChatMessage, Endpoint};
use crate::utils::image_ops::{crop_region, encode_png_async};

const EXTRACTED_TEXT_FIELD: &str = "extracted_text";

const VISION_PROMPT: &str = "You are an OCR assistant. Extract all text from the image I send you. \
Recognize every piece of text in the image and return only the text, without explanations.";

const VISION_JSON_PROMPT: &str = "You are an OCR assistant. Extract all text from the image I send you. \
Keep special characters such as braces, quotes and backslashes in the output, escaping them where needed. \
Return only a JSON object in exactly this format:\n{\n  \"extracted_text\": \"[all recognized text]\"\n}";

pub struct VisionRecognizer {
    client: Arc<ChatClient>,
}

impl VisionRecognizer {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }

    fn endpoint<'a>(service: &str, request: &'a RecognitionRequest<'a>) -> ServiceResult<Endpoint<'a>> {
        let credentials = request.credentials;
        let required = |value: &'a Option<String>, what: &str| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ServiceError::configuration(service, format!("{what} is required")))
        };

        Ok(Endpoint {
            base_url: required(&credentials.base_url, "base URL")?,
            api_key: Some(required(&credentials.api_key, "API key")?),
            model: required(&credentials.model, "model name")?,
        })
    }

    async fn recognize_one(
        &self,
        service: &str,
        endpoint: Endpoint<'_>,
        crop: RgbaImage,
        json_response: bool,
    ) -> ServiceResult<String> {
        let png = encode_png_async(crop)
            .await
            .map_err(|e| ServiceError::transient(service, format!("failed to encode crop: {e}")))?;
        let data_url = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png));

        let prompt = if json_response { VISION_JSON_PROMPT } else { VISION_PROMPT };
        let messages = [ChatMessage::user_with_image(data_url, prompt)];
        let content = self
            .client
            .complete(service, endpoint, &messages, json_response)
            .await?;

        if json_response {
            Ok(extract_json_field(&content, EXTRACTED_TEXT_FIELD).unwrap_or(content))
        } else {
            Ok(content)
        }
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    async fn recognize(
        &self,
        image: &RgbaImage,
        regions: &[Region],
        request: &RecognitionRequest<'_>,
    ) -> ServiceResult<Vec<String>> {
        let service = request.backend.service_key();
        let endpoint = Self::endpoint(&service, request)?;

        let mut texts = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(crop) = crop_region(image, region) else {
                debug!("{}: region {:?} lies outside the image", service, region.as_array());
                texts.push(String::new());
                continue;
            };
            texts.push(
                self.recognize_one(&service, endpoint, crop, request.json_response)
                    .await?,
            );
        }
        Ok(texts)
    }
}
