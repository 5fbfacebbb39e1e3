use crate::core::backends::{RecognizerBackend, RepairMethod, Selection, TranslatorBackend};
use crate::core::errors::ConfigError;
use crate::core::params::Credentials;
use crate::core::types::{Color, FontSize, Outline, Style, TextDirection};
use std::collections::HashMap;
use std::env;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: Level,
}

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
}

/// Backend selection and languages
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub source_language: String,
    pub target_language: String,
    pub recognizer: Selection<RecognizerBackend>,
    pub translator: Selection<TranslatorBackend>,
    pub repair: Selection<RepairMethod>,
}

/// Credentials per capability
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    pub recognition: Credentials,
    pub translation: Credentials,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute for remote recognition, 0 = unlimited
    pub rpm_recognition: u32,
    /// Requests per minute for remote translation, 0 = unlimited
    pub rpm_translation: u32,
    pub window: Duration,
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Degradation and concurrency behaviour
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub degrade_on_failure: bool,
    pub translation_concurrency: usize,
}

/// Rendering defaults
#[derive(Debug, Clone)]
pub struct StyleConfig {
    pub default_style: Style,
    pub fill_color: Color,
}

/// Enabled state for extensions that the host does not set explicitly
#[derive(Debug, Clone, Default)]
pub struct ExtensionDefaults {
    pub states: HashMap<String, bool>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub detection: DetectionConfig,
    pub backends: BackendConfig,
    pub credentials: CredentialsConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub fallback: FallbackConfig,
    pub style: StyleConfig,
    pub extensions: ExtensionDefaults,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let flag = |key: &str, default: bool| {
            var(key)
                .and_then(|s| match s.to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Some(true),
                    "0" | "false" | "no" | "off" => Some(false),
                    _ => None,
                })
                .unwrap_or(default)
        };

        // Parse log level
        let log_level = var("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let credentials = |prefix: &str| Credentials {
            api_key: var(&format!("{prefix}_API_KEY")),
            secret_key: var(&format!("{prefix}_SECRET_KEY")),
            model: var(&format!("{prefix}_MODEL")),
            base_url: var(&format!("{prefix}_BASE_URL")),
        };

        let defaults = Style::default();
        let default_style = Style {
            font: var("DEFAULT_FONT").unwrap_or(defaults.font),
            font_size: parse_or("DEFAULT_FONT_SIZE", var("DEFAULT_FONT_SIZE"), defaults.font_size)?,
            direction: parse_or(
                "DEFAULT_TEXT_DIRECTION",
                var("DEFAULT_TEXT_DIRECTION"),
                defaults.direction,
            )?,
            text_color: parse_or("DEFAULT_TEXT_COLOR", var("DEFAULT_TEXT_COLOR"), defaults.text_color)?,
            rotation_degrees: var("DEFAULT_ROTATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rotation_degrees),
            outline: Outline {
                enabled: flag("DEFAULT_STROKE_ENABLED", defaults.outline.enabled),
                color: parse_or(
                    "DEFAULT_STROKE_COLOR",
                    var("DEFAULT_STROKE_COLOR"),
                    defaults.outline.color,
                )?,
                width: number_or(
                    "DEFAULT_STROKE_WIDTH",
                    var("DEFAULT_STROKE_WIDTH"),
                    defaults.outline.width,
                )?,
            },
            offset: defaults.offset,
        };

        let mut extension_states = HashMap::new();
        for (key, enabled) in [("EXTENSIONS_ENABLED", true), ("EXTENSIONS_DISABLED", false)] {
            for id in var(key).unwrap_or_default().split(',') {
                let id = id.trim();
                if !id.is_empty() {
                    extension_states.insert(id.to_string(), enabled);
                }
            }
        }

        Ok(Self {
            logging: LoggingConfig { log_level },
            detection: DetectionConfig {
                confidence_threshold: var("CONFIDENCE_THRESHOLD")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.6),
            },
            backends: BackendConfig {
                source_language: var("SOURCE_LANGUAGE").unwrap_or_else(|| "japan".to_string()),
                target_language: var("TARGET_LANGUAGE").unwrap_or_else(|| "en".to_string()),
                recognizer: parse_or("OCR_BACKEND", var("OCR_BACKEND"), Selection::Auto)?,
                translator: parse_or(
                    "TRANSLATION_BACKEND",
                    var("TRANSLATION_BACKEND"),
                    Selection::Auto,
                )?,
                repair: parse_or("REPAIR_METHOD", var("REPAIR_METHOD"), Selection::Auto)?,
            },
            credentials: CredentialsConfig {
                recognition: credentials("OCR"),
                translation: credentials("TRANSLATION"),
            },
            rate_limit: RateLimitConfig {
                rpm_recognition: number_or("RPM_OCR", var("RPM_OCR"), 0)?,
                rpm_translation: number_or("RPM_TRANSLATION", var("RPM_TRANSLATION"), 0)?,
                window: Duration::from_secs(number_or(
                    "RATE_LIMIT_WINDOW_SECONDS",
                    var("RATE_LIMIT_WINDOW_SECONDS"),
                    60,
                )?),
            },
            retry: RetryConfig {
                max_attempts: number_or("MAX_RETRIES", var("MAX_RETRIES"), 3)?,
                delay: Duration::from_millis(number_or(
                    "RETRY_DELAY_MS",
                    var("RETRY_DELAY_MS"),
                    1000,
                )?),
            },
            fallback: FallbackConfig {
                degrade_on_failure: flag("DEGRADE_ON_FAILURE", true),
                translation_concurrency: number_or(
                    "TRANSLATION_CONCURRENCY",
                    var("TRANSLATION_CONCURRENCY"),
                    1,
                )?,
            },
            style: StyleConfig {
                default_style,
                fill_color: parse_or("FILL_COLOR", var("FILL_COLOR"), Color::WHITE)?,
            },
            extensions: ExtensionDefaults {
                states: extension_states,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.detection.confidence_threshold,
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy);
        }

        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::EnvVarError(
                "RATE_LIMIT_WINDOW_SECONDS must be > 0".to_string(),
            ));
        }

        if self.fallback.translation_concurrency == 0 {
            return Err(ConfigError::EnvVarError(
                "TRANSLATION_CONCURRENCY must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn log_level(&self) -> Level {
        self.logging.log_level
    }

    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit.window
    }

    pub fn extension_defaults(&self) -> &HashMap<String, bool> {
        &self.extensions.states
    }
}

// Unsigned integers parse at their target width, so out-of-range values are rejected
fn number_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::EnvVarError(format!("{key}={raw}: {e}"))),
    }
}

// Unset keeps the default, a present but malformed value is an error
fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ConfigError>,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| match e {
            ConfigError::UnknownBackend { .. } => e,
            other => ConfigError::EnvVarError(format!("{key}: {other}")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        config.validate().unwrap();

        assert_eq!(config.log_level(), Level::INFO);
        assert_eq!(config.rate_limit.rpm_translation, 0);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert!(config.fallback.degrade_on_failure);
        assert_eq!(config.style.default_style.font_size, FontSize::Fixed(30));
        assert_eq!(config.style.default_style.direction, TextDirection::Vertical);
        assert_eq!(config.style.fill_color, Color::WHITE);
        assert_eq!(config.backends.recognizer, Selection::Auto);
    }

    #[test]
    fn test_out_of_range_numbers_are_rejected() {
        let err = config_from(&[("RPM_OCR", "4294967296")]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarError(ref msg) if msg.starts_with("RPM_OCR")));

        assert!(config_from(&[("MAX_RETRIES", "-1")]).is_err());
        assert!(config_from(&[("TRANSLATION_CONCURRENCY", "many")]).is_err());

        let config = config_from(&[("RPM_OCR", "4294967295")]).unwrap();
        assert_eq!(config.rate_limit.rpm_recognition, u32::MAX);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OCR_BACKEND", "ai_vision"),
            ("TRANSLATION_BACKEND", "deepseek"),
            ("RPM_TRANSLATION", "20"),
            ("TRANSLATION_API_KEY", "sk-test"),
            ("DEFAULT_FONT_SIZE", "auto"),
            ("DEFAULT_STROKE_ENABLED", "true"),
            ("EXTENSIONS_ENABLED", "text_affixer, other"),
            ("EXTENSIONS_DISABLED", "noisy"),
        ])
        .unwrap();

        assert_eq!(
            config.backends.recognizer,
            Selection::Explicit(RecognizerBackend::AiVision)
        );
        assert_eq!(
            config.backends.translator,
            Selection::Explicit(TranslatorBackend::DeepSeek)
        );
        assert_eq!(config.rate_limit.rpm_translation, 20);
        assert_eq!(config.credentials.translation.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.style.default_style.font_size, FontSize::Auto);
        assert!(config.style.default_style.outline.enabled);
        assert_eq!(config.extension_defaults().get("text_affixer"), Some(&true));
        assert_eq!(config.extension_defaults().get("noisy"), Some(&false));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = config_from(&[("REPAIR_METHOD", "magic")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend { capability: "repair", .. }));

        let err = config_from(&[("FILL_COLOR", "white-ish")]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarError(msg) if msg.contains("FILL_COLOR")));
    }

    #[test]
    fn test_validation() {
        let config = config_from(&[("CONFIDENCE_THRESHOLD", "1.5")]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfidenceThreshold(_))
        ));

        let config = config_from(&[("MAX_RETRIES", "0")]).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRetryPolicy)));
    }
}
