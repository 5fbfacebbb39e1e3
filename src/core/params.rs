// Immutable per-run parameters

use std::fmt;
use std::time::Duration;

use crate::core::backends::{
    RecognizerBackend, RepairMethod, Selection, TranslatorBackend,
};
use crate::core::config::Config;
use crate::core::types::{Color, Region, Style};

/// Opaque backend credentials. Never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "[set]" } else { "[unset]" };
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("secret_key", &mask(&self.secret_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Everything a run needs to know, fixed when the run starts.
///
/// The orchestrator holds it behind an `Arc`; only a `before_run`
/// extension may swap in a replacement.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub source_language: String,
    pub target_language: String,
    pub confidence_threshold: f32,

    pub recognizer: Selection<RecognizerBackend>,
    pub translator: Selection<TranslatorBackend>,
    pub repair: Selection<RepairMethod>,
    pub recognition_credentials: Credentials,
    pub translation_credentials: Credentials,

    /// Replaces the built-in translation prompt
    pub prompt_override: Option<String>,
    /// When set, each region also gets a secondary annotation translation
    pub annotation_prompt: Option<String>,
    /// Ask chat backends for a JSON object and extract its text field
    pub json_response: bool,

    /// Requests per minute, 0 = unlimited
    pub rpm_recognition: u32,
    pub rpm_translation: u32,
    pub retry: RetryPolicy,
    pub degrade_on_failure: bool,
    /// Upper bound on in-flight per-region translation calls
    pub translation_concurrency: usize,

    pub skip_recognize: bool,
    pub skip_translate: bool,
    /// Regions supplied by the caller; detection is bypassed when set
    pub provided_regions: Option<Vec<Region>>,

    pub fill_color: Color,
    pub default_style: Style,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            source_language: "japan".to_string(),
            target_language: "en".to_string(),
            confidence_threshold: 0.6,
            recognizer: Selection::Auto,
            translator: Selection::Auto,
            repair: Selection::Auto,
            recognition_credentials: Credentials::default(),
            translation_credentials: Credentials::default(),
            prompt_override: None,
            annotation_prompt: None,
            json_response: false,
            rpm_recognition: 0,
            rpm_translation: 0,
            retry: RetryPolicy::default(),
            degrade_on_failure: true,
            translation_concurrency: 1,
            skip_recognize: false,
            skip_translate: false,
            provided_regions: None,
            fill_color: Color::WHITE,
            default_style: Style::default(),
        }
    }
}

impl RunParameters {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_language: config.backends.source_language.clone(),
            target_language: config.backends.target_language.clone(),
            confidence_threshold: config.detection.confidence_threshold,
            recognizer: config.backends.recognizer,
            translator: config.backends.translator,
            repair: config.backends.repair,
            recognition_credentials: config.credentials.recognition.clone(),
            translation_credentials: config.credentials.translation.clone(),
            rpm_recognition: config.rate_limit.rpm_recognition,
            rpm_translation: config.rate_limit.rpm_translation,
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                delay: config.retry.delay,
            },
            degrade_on_failure: config.fallback.degrade_on_failure,
            translation_concurrency: config.fallback.translation_concurrency,
            fill_color: config.style.fill_color,
            default_style: config.style.default_style.clone(),
            ..Self::default()
        }
    }

    pub fn recognizer_backend(&self) -> RecognizerBackend {
        self.recognizer
            .resolve_or(RecognizerBackend::for_language(&self.source_language))
    }

    pub fn translator_backend(&self) -> TranslatorBackend {
        self.translator.resolve_or(TranslatorBackend::DEFAULT)
    }

    pub fn repair_method(&self) -> RepairMethod {
        self.repair.resolve_or(RepairMethod::FlatFill)
    }

    /// One-line description for logs, without credentials
    pub fn summary(&self) -> String {
        format!(
            "{}->{}, ocr={} ({}), translator={} ({}), repair={} ({}), rpm=[ocr:{}, translation:{}], retries={}, degrade={}, skip=[recognize:{}, translate:{}], provided_regions={}",
            self.source_language,
            self.target_language,
            self.recognizer,
            self.recognizer_backend(),
            self.translator,
            self.translator_backend(),
            self.repair,
            self.repair_method(),
            self.rpm_recognition,
            self.rpm_translation,
            self.retry.max_attempts,
            self.degrade_on_failure,
            self.skip_recognize,
            self.skip_translate,
            self.provided_regions.as_ref().map(|r| r.len().to_string()).unwrap_or_else(|| "none".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_selection_follows_source_language() {
        let mut params = RunParameters::default();
        assert_eq!(params.recognizer_backend(), RecognizerBackend::MangaOcr);

        params.source_language = "korean".to_string();
        assert_eq!(params.recognizer_backend(), RecognizerBackend::PaddleOcr);

        params.recognizer = Selection::Explicit(RecognizerBackend::AiVision);
        assert_eq!(params.recognizer_backend(), RecognizerBackend::AiVision);
        assert_eq!(params.repair_method(), RepairMethod::FlatFill);
        assert_eq!(params.translator_backend(), TranslatorBackend::SiliconFlow);
    }

    #[test]
    fn test_credentials_are_redacted() {
        let params = RunParameters {
            translation_credentials: Credentials {
                api_key: Some("sk-very-secret".to_string()),
                ..Credentials::default()
            },
            ..RunParameters::default()
        };
        let rendered = format!("{:?} {}", params, params.summary());
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[set]"));
    }
}
