// Translation capability: trait, request shape and built-in providers

pub mod api_client;
pub mod chat;

use async_trait::async_trait;

use crate::core::backends::TranslatorBackend;
use crate::core::errors::ServiceResult;
use crate::core::params::Credentials;

pub use api_client::{extract_json_field, validate_base_url, ChatClient, ChatMessage, Endpoint};
pub use chat::ChatTranslator;

/// Everything a translator needs besides the text itself
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub backend: TranslatorBackend,
    pub source_language: &'a str,
    pub target_language: &'a str,
    pub credentials: &'a Credentials,
    /// System prompt replacing the built-in one
    pub prompt: Option<&'a str>,
    pub json_response: bool,
}

/// Translates one region's text.
///
/// Callers never pass blank text; implementations may assume it is non-empty.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, request: &TranslationRequest<'_>) -> ServiceResult<String>;
}

/// Offline translator producing `[<target>] <text>`
#[derive(Debug, Default, Clone, Copy)]
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, request: &TranslationRequest<'_>) -> ServiceResult<String> {
        Ok(format!("[{}] {}", request.target_language, text))
    }
}
