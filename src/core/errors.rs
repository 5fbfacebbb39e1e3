// Error types for the translation pipeline
//
// Using thiserror for ergonomic error definitions with:
// - Type-safe error matching
// - Source error chaining
// - Stable reason codes for callers

use thiserror::Error;

use crate::core::types::Stage;

/// Configuration errors. Never retried, always surfaced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown {capability} backend: {name}")]
    UnknownBackend { capability: &'static str, name: String },

    #[error("{capability} backend {backend} is not installed")]
    BackendUnavailable {
        capability: &'static str,
        backend: String,
    },

    #[error("Missing credential for {backend}: {field}")]
    MissingCredential { backend: String, field: &'static str },

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("Retry policy must allow at least one attempt")]
    InvalidRetryPolicy,

    #[error("Invalid color value: {0}")]
    InvalidColor(String),

    #[error("Invalid style value: {0}")]
    InvalidStyle(String),

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

/// Errors raised by capability backends.
///
/// The split drives the retry policy: `Configuration` ends the retry loop
/// immediately, `Transient` is retried until attempts run out.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("{service}: configuration error: {message}")]
    Configuration { service: String, message: String },

    #[error("{service}: request failed: {message}")]
    Transient { service: String, message: String },
}

/// Message fragments that mark a failure as a credential or endpoint problem.
const CONFIGURATION_MARKERS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "appid",
    "appkey",
    "authentication",
    "unauthorized",
    "base url",
];

impl ServiceError {
    pub fn configuration(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Classify a free-form backend failure message.
    pub fn classify(service: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if CONFIGURATION_MARKERS.iter().any(|m| lowered.contains(m)) {
            Self::configuration(service, message)
        } else {
            Self::transient(service, message)
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn service(&self) -> &str {
        match self {
            Self::Configuration { service, .. } | Self::Transient { service, .. } => service,
        }
    }
}

/// Extension management errors. Callback failures never reach this type;
/// they are logged and the boundary value is kept unchanged.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension {0} is already installed")]
    AlreadyInstalled(String),

    #[error("Extension {id} setup failed: {source}")]
    SetupFailed {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors that escape a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: ServiceError,
    },

    #[error("Image decoding failed: {0}")]
    ImageDecode(#[from] image::ImageError),
}

impl PipelineError {
    /// Stable machine-readable code for hosts that map errors to responses.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Configuration(ConfigError::MissingCredential { .. }) => "missing_credential",
            Self::Configuration(ConfigError::UnknownBackend { .. }) => "unknown_backend",
            Self::Configuration(ConfigError::BackendUnavailable { .. }) => "backend_unavailable",
            Self::Configuration(ConfigError::InvalidBaseUrl(_)) => "invalid_base_url",
            Self::Configuration(_) => "invalid_configuration",
            Self::StageFailed {
                source: ServiceError::Configuration { .. },
                ..
            } => "service_configuration",
            Self::StageFailed { .. } => "service_unavailable",
            Self::ImageDecode(_) => "invalid_image",
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ServiceResult<T> = Result<T, ServiceError>;

// Attach the failing stage to backend errors
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageContext<T> for ServiceResult<T> {
    fn in_stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError::StageFailed { stage, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_credential_failures() {
        let err = ServiceError::classify("translation/siliconflow", "Invalid API key provided");
        assert!(err.is_configuration());

        let err = ServiceError::classify("ocr/baidu_ocr", "missing appid");
        assert!(err.is_configuration());

        let err = ServiceError::classify("translation/custom_openai", "Base URL is required");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_classify_transient_failures() {
        let err = ServiceError::classify("translation/deepseek", "connection reset by peer");
        assert!(!err.is_configuration());
        assert_eq!(err.service(), "translation/deepseek");
    }

    #[test]
    fn test_reason_codes() {
        let err = PipelineError::from(ConfigError::MissingCredential {
            backend: "siliconflow".to_string(),
            field: "api_key",
        });
        assert_eq!(err.reason_code(), "missing_credential");

        let err: Result<(), _> =
            Err::<(), _>(ServiceError::transient("translation/deepseek", "timeout"))
                .in_stage(Stage::Translate);
        assert_eq!(err.unwrap_err().reason_code(), "service_unavailable");
    }
}
