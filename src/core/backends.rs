// Closed sets of backend names for each swappable capability

use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::core::errors::ConfigError;

/// Common surface of the backend enums.
pub trait BackendKind:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Capability name used in errors, logs and service keys
    const CAPABILITY: &'static str;

    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self>;

    /// Remote backends call an external service and are rate limited.
    fn is_remote(&self) -> bool;

    /// Key of the rate-limit window shared by all calls to this backend.
    fn service_key(&self) -> String {
        format!("{}/{}", Self::CAPABILITY, self.name())
    }
}

fn parse_backend<B: BackendKind>(s: &str) -> Result<B, ConfigError> {
    B::from_name(&s.trim().to_lowercase()).ok_or_else(|| ConfigError::UnknownBackend {
        capability: B::CAPABILITY,
        name: s.to_string(),
    })
}

/// Text recognition engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    MangaOcr,
    PaddleOcr,
    BaiduOcr,
    AiVision,
}

impl RecognizerBackend {
    /// Preferred local engine for a source language.
    ///
    /// Remote engines are never chosen here; they must be requested by name.
    pub fn for_language(source_language: &str) -> Self {
        match source_language.trim().to_lowercase().as_str() {
            "japan" | "ja" | "japanese" => RecognizerBackend::MangaOcr,
            "en" | "korean" | "chinese" | "chinese_cht" | "french" | "german" | "russian"
            | "italian" | "spanish" => RecognizerBackend::PaddleOcr,
            _ => RecognizerBackend::MangaOcr,
        }
    }
}

impl BackendKind for RecognizerBackend {
    const CAPABILITY: &'static str = "ocr";

    fn name(&self) -> &'static str {
        match self {
            RecognizerBackend::MangaOcr => "manga_ocr",
            RecognizerBackend::PaddleOcr => "paddle_ocr",
            RecognizerBackend::BaiduOcr => "baidu_ocr",
            RecognizerBackend::AiVision => "ai_vision",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "manga_ocr" | "mangaocr" => Some(RecognizerBackend::MangaOcr),
            "paddle_ocr" | "paddleocr" => Some(RecognizerBackend::PaddleOcr),
            "baidu_ocr" => Some(RecognizerBackend::BaiduOcr),
            "ai_vision" | "ai_vision_ocr" => Some(RecognizerBackend::AiVision),
            _ => None,
        }
    }

    fn is_remote(&self) -> bool {
        matches!(self, RecognizerBackend::BaiduOcr | RecognizerBackend::AiVision)
    }
}

/// Translation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslatorBackend {
    SiliconFlow,
    DeepSeek,
    Volcano,
    CustomOpenAi,
    Caiyun,
    BaiduTranslate,
    YoudaoTranslate,
    Ollama,
    Sakura,
    Mock,
}

impl TranslatorBackend {
    /// Provider used when the selection is `auto`
    pub const DEFAULT: TranslatorBackend = TranslatorBackend::SiliconFlow;

    /// Endpoint for providers that speak the OpenAI chat-completions protocol.
    /// `CustomOpenAi` has none: the caller must supply a base URL.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            TranslatorBackend::SiliconFlow => Some("https://api.siliconflow.cn/v1"),
            TranslatorBackend::DeepSeek => Some("https://api.deepseek.com/v1"),
            TranslatorBackend::Volcano => Some("https://ark.cn-beijing.volces.com/api/v3"),
            TranslatorBackend::Ollama => Some("http://localhost:11434/v1"),
            TranslatorBackend::Sakura => Some("http://localhost:8080/v1"),
            _ => None,
        }
    }

    pub fn is_chat_compatible(&self) -> bool {
        matches!(
            self,
            TranslatorBackend::SiliconFlow
                | TranslatorBackend::DeepSeek
                | TranslatorBackend::Volcano
                | TranslatorBackend::CustomOpenAi
                | TranslatorBackend::Ollama
                | TranslatorBackend::Sakura
        )
    }

    pub fn requires_api_key(&self) -> bool {
        self.is_remote()
    }
}

impl BackendKind for TranslatorBackend {
    const CAPABILITY: &'static str = "translation";

    fn name(&self) -> &'static str {
        match self {
            TranslatorBackend::SiliconFlow => "siliconflow",
            TranslatorBackend::DeepSeek => "deepseek",
            TranslatorBackend::Volcano => "volcano",
            TranslatorBackend::CustomOpenAi => "custom_openai",
            TranslatorBackend::Caiyun => "caiyun",
            TranslatorBackend::BaiduTranslate => "baidu_translate",
            TranslatorBackend::YoudaoTranslate => "youdao_translate",
            TranslatorBackend::Ollama => "ollama",
            TranslatorBackend::Sakura => "sakura",
            TranslatorBackend::Mock => "mock",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "siliconflow" => Some(TranslatorBackend::SiliconFlow),
            "deepseek" => Some(TranslatorBackend::DeepSeek),
            "volcano" => Some(TranslatorBackend::Volcano),
            "custom_openai" => Some(TranslatorBackend::CustomOpenAi),
            "caiyun" => Some(TranslatorBackend::Caiyun),
            "baidu_translate" => Some(TranslatorBackend::BaiduTranslate),
            "youdao_translate" => Some(TranslatorBackend::YoudaoTranslate),
            "ollama" => Some(TranslatorBackend::Ollama),
            "sakura" => Some(TranslatorBackend::Sakura),
            "mock" => Some(TranslatorBackend::Mock),
            _ => None,
        }
    }

    fn is_remote(&self) -> bool {
        !matches!(
            self,
            TranslatorBackend::Ollama | TranslatorBackend::Sakura | TranslatorBackend::Mock
        )
    }
}

/// Text removal methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMethod {
    /// Paint each region with the fill color
    FlatFill,
    /// Learned inpainting; only used when requested by name
    Lama,
}

impl BackendKind for RepairMethod {
    const CAPABILITY: &'static str = "repair";

    fn name(&self) -> &'static str {
        match self {
            RepairMethod::FlatFill => "solid",
            RepairMethod::Lama => "lama",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "solid" | "flat_fill" => Some(RepairMethod::FlatFill),
            "lama" => Some(RepairMethod::Lama),
            _ => None,
        }
    }

    fn is_remote(&self) -> bool {
        false
    }
}

macro_rules! backend_string_impls {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_backend(s)
            }
        }
    )*};
}

backend_string_impls!(RecognizerBackend, TranslatorBackend, RepairMethod);

/// A run parameter naming a backend: `auto` or an explicit name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<B> {
    Auto,
    Explicit(B),
}

impl<B> Default for Selection<B> {
    fn default() -> Self {
        Selection::Auto
    }
}

impl<B: BackendKind> Selection<B> {
    pub fn resolve_or(&self, auto: B) -> B {
        match self {
            Selection::Auto => auto,
            Selection::Explicit(backend) => *backend,
        }
    }
}

impl<B: BackendKind> FromStr for Selection<B> {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Selection::Auto);
        }
        parse_backend(trimmed).map(Selection::Explicit)
    }
}

impl<B: BackendKind> fmt::Display for Selection<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Auto => f.write_str("auto"),
            Selection::Explicit(backend) => write!(f, "{backend}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_mapping_prefers_local_engines() {
        assert_eq!(RecognizerBackend::for_language("japan"), RecognizerBackend::MangaOcr);
        assert_eq!(RecognizerBackend::for_language("korean"), RecognizerBackend::PaddleOcr);
        assert_eq!(RecognizerBackend::for_language("en"), RecognizerBackend::PaddleOcr);
        assert_eq!(RecognizerBackend::for_language("klingon"), RecognizerBackend::MangaOcr);
        assert!(!RecognizerBackend::for_language("chinese").is_remote());
    }

    #[test]
    fn test_unknown_backend_is_configuration_error() {
        let err = "teleport".parse::<TranslatorBackend>().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownBackend { capability: "translation", .. }
        ));

        let err = "bogus".parse::<Selection<RepairMethod>>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend { capability: "repair", .. }));
    }

    #[test]
    fn test_selection_parsing() {
        let auto: Selection<RecognizerBackend> = "AUTO".parse().unwrap();
        assert_eq!(auto, Selection::Auto);
        assert_eq!(auto.resolve_or(RecognizerBackend::PaddleOcr), RecognizerBackend::PaddleOcr);

        let explicit: Selection<RepairMethod> = "lama".parse().unwrap();
        assert_eq!(explicit, Selection::Explicit(RepairMethod::Lama));
        assert_eq!(explicit.to_string(), "lama");
    }

    #[test]
    fn test_service_keys_are_per_backend() {
        assert_eq!(TranslatorBackend::DeepSeek.service_key(), "translation/deepseek");
        assert_eq!(RecognizerBackend::AiVision.service_key(), "ocr/ai_vision");
        assert!(TranslatorBackend::Caiyun.is_remote());
        assert!(!TranslatorBackend::Ollama.requires_api_key());
    }
}
