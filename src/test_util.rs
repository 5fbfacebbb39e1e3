// Scripted capability providers for unit tests

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::params::RetryPolicy;
use crate::core::types::{Color, Region, RegionTranslation, Style};
use crate::services::detection::Detector;
use crate::services::ocr::{RecognitionRequest, Recognizer};
use crate::services::rendering::Renderer;
use crate::services::repair::{RepairOutput, Repairer};
use crate::services::translation::{TranslationRequest, Translator};

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(10),
    }
}

pub fn regions(n: i32) -> Vec<Region> {
    (0..n)
        .map(|i| Region::new(i * 10, 0, i * 10 + 8, 8).unwrap())
        .collect()
}

/// Detector returning the same regions every time
pub struct FixedDetector {
    regions: Vec<Region>,
    calls: AtomicUsize,
    last_threshold: Mutex<Option<f32>>,
}

impl FixedDetector {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            calls: AtomicUsize::new(0),
            last_threshold: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_threshold(&self) -> Option<f32> {
        *self.last_threshold.lock()
    }
}

#[async_trait]
impl Detector for FixedDetector {
    async fn detect(&self, _image: &RgbaImage, confidence_threshold: f32) -> Vec<Region> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_threshold.lock() = Some(confidence_threshold);
        self.regions.clone()
    }
}

enum Script {
    Texts(Vec<String>),
    Transient,
    Configuration,
}

/// Recognizer answering from a script. Region `i` of a call reads
/// `texts[i]`, or the last scripted text when the script is shorter.
pub struct ScriptedRecognizer {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(texts: Vec<&str>) -> Self {
        Self {
            script: Script::Texts(texts.into_iter().map(str::to_string).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_transient() -> Self {
        Self {
            script: Script::Transient,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_configuration() -> Self {
        Self {
            script: Script::Configuration,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        _image: &RgbaImage,
        regions: &[Region],
        request: &RecognitionRequest<'_>,
    ) -> ServiceResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let service = format!("ocr/{}", request.backend);
        match &self.script {
            Script::Texts(texts) => Ok((0..regions.len())
                .map(|i| texts.get(i).or(texts.last()).cloned().unwrap_or_default())
                .collect()),
            Script::Transient => Err(ServiceError::transient(service, "connection reset")),
            Script::Configuration => Err(ServiceError::configuration(service, "API key is required")),
        }
    }
}

enum TranslatorMode {
    Echo,
    Delayed,
    /// Echoes plain requests, fails any request carrying a prompt
    FailingPrompted,
    Transient,
    Configuration,
}

/// Translator producing `t:<text>` and recording what it was sent
pub struct ScriptedTranslator {
    mode: TranslatorMode,
    sent: Mutex<Vec<String>>,
}

impl ScriptedTranslator {
    fn with_mode(mode: TranslatorMode) -> Self {
        Self {
            mode,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::with_mode(TranslatorMode::Echo)
    }

    /// Sleeps for the number of milliseconds in the text before answering
    pub fn with_delays() -> Self {
        Self::with_mode(TranslatorMode::Delayed)
    }

    pub fn failing_prompted() -> Self {
        Self::with_mode(TranslatorMode::FailingPrompted)
    }

    pub fn failing_transient() -> Self {
        Self::with_mode(TranslatorMode::Transient)
    }

    pub fn failing_configuration() -> Self {
        Self::with_mode(TranslatorMode::Configuration)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, text: &str, request: &TranslationRequest<'_>) -> ServiceResult<String> {
        self.sent.lock().push(text.to_string());
        let service = format!("translation/{}", request.backend);
        match self.mode {
            TranslatorMode::Echo => Ok(format!("t:{text}")),
            TranslatorMode::Delayed => {
                let millis = text.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(format!("t:{text}"))
            }
            TranslatorMode::FailingPrompted if request.prompt.is_some() => {
                Err(ServiceError::transient(service, "HTTP 502"))
            }
            TranslatorMode::FailingPrompted => Ok(format!("t:{text}")),
            TranslatorMode::Transient => Err(ServiceError::transient(service, "HTTP 503")),
            TranslatorMode::Configuration => {
                Err(ServiceError::configuration(service, "authentication failed"))
            }
        }
    }
}

/// Repairer that always fails
pub struct FailingRepairer {
    configuration: bool,
    calls: AtomicUsize,
}

impl FailingRepairer {
    pub fn transient() -> Self {
        Self {
            configuration: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn configuration() -> Self {
        Self {
            configuration: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repairer for FailingRepairer {
    async fn repair(
        &self,
        _image: &RgbaImage,
        _regions: &[Region],
        _fill_color: Color,
    ) -> ServiceResult<RepairOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.configuration {
            Err(ServiceError::configuration("repair/lama", "model file not configured"))
        } else {
            Err(ServiceError::transient("repair/lama", "inpainting worker crashed"))
        }
    }
}

/// Deterministic renderer: paints one column per character of each
/// translation in the region's text color.
pub struct StampRenderer;

#[async_trait]
impl Renderer for StampRenderer {
    async fn render(
        &self,
        image: &mut RgbaImage,
        translations: &[RegionTranslation],
        regions: &[Region],
        styles: &[Style],
    ) -> ServiceResult<()> {
        for ((translation, region), style) in translations.iter().zip(regions).zip(styles) {
            let Some((x, y, w, h)) = region.clamped_to(image.width(), image.height()) else {
                continue;
            };
            let columns = (translation.text.chars().count() as u32).min(w);
            let pixel: Rgba<u8> = style.text_color.rgba();
            for px in x..x + columns {
                for py in y..y + h {
                    image.put_pixel(px, py, pixel);
                }
            }
        }
        Ok(())
    }
}

/// Renderer that breaks the size contract
pub struct ResizingRenderer;

#[async_trait]
impl Renderer for ResizingRenderer {
    async fn render(
        &self,
        image: &mut RgbaImage,
        _translations: &[RegionTranslation],
        _regions: &[Region],
        _styles: &[Style],
    ) -> ServiceResult<()> {
        *image = RgbaImage::new(image.width() + 1, image.height());
        Ok(())
    }
}
