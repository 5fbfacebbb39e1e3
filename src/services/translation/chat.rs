// Translator for providers speaking the OpenAI chat-completions protocol

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::backends::{BackendKind, TranslatorBackend};
use crate::core::errors::{ServiceError, ServiceResult};
use crate::services::translation::api_client::{extract_json_field, ChatClient, ChatMessage, Endpoint};
use crate::services::translation::{TranslationRequest, Translator};

const TRANSLATED_TEXT_FIELD: &str = "translated_text";

fn default_prompt(target_language: &str) -> String {
    format!(
        "You are a professional comic translator. Translate the user-provided text into {target_language}. \
         Keep it short enough to fit a speech bubble and return only the translation, \
         without explanations or quotes."
    )
}

fn default_json_prompt(target_language: &str) -> String {
    format!(
        "You are a professional translation engine. Translate the user-provided text into {target_language}. \
         Keep special characters such as braces, quotes and backslashes in the output, \
         but do not treat them as JSON syntax. \
         Return only a JSON object in exactly this format:\n\
         {{\n  \"{TRANSLATED_TEXT_FIELD}\": \"[translated text]\"\n}}"
    )
}

pub struct ChatTranslator {
    client: Arc<ChatClient>,
}

impl ChatTranslator {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }

    /// Fill in the provider defaults and check what the request must carry.
    fn endpoint<'a>(
        service: &str,
        request: &'a TranslationRequest<'a>,
    ) -> ServiceResult<Endpoint<'a>> {
        let backend = request.backend;
        if !backend.is_chat_compatible() {
            return Err(ServiceError::configuration(
                service,
                format!("{backend} does not provide a chat-completions API"),
            ));
        }

        let credentials = request.credentials;
        let base_url = credentials
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or(backend.default_base_url())
            .ok_or_else(|| ServiceError::configuration(service, "base URL is required"))?;

        let api_key = credentials.api_key.as_deref().filter(|key| !key.trim().is_empty());
        if backend.requires_api_key() && api_key.is_none() {
            return Err(ServiceError::configuration(service, "API key is required"));
        }

        let model = credentials
            .model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| ServiceError::configuration(service, "model name is required"))?;

        Ok(Endpoint {
            base_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str, request: &TranslationRequest<'_>) -> ServiceResult<String> {
        let service = request.backend.service_key();
        let endpoint = Self::endpoint(&service, request)?;

        let prompt = match request.prompt {
            Some(prompt) => {
                if request.json_response && !prompt.contains(TRANSLATED_TEXT_FIELD) {
                    warn!("{}: JSON response requested but prompt does not mention {}", service, TRANSLATED_TEXT_FIELD);
                }
                prompt.to_string()
            }
            None if request.json_response => default_json_prompt(request.target_language),
            None => default_prompt(request.target_language),
        };

        let messages = [ChatMessage::system(prompt), ChatMessage::user(text)];
        let content = self
            .client
            .complete(&service, endpoint, &messages, request.json_response)
            .await?;

        if !request.json_response {
            return Ok(content);
        }

        match extract_json_field(&content, TRANSLATED_TEXT_FIELD) {
            Some(extracted) => Ok(extracted),
            None => {
                debug!("{}: no {} field in reply, using cleaned text", service, TRANSLATED_TEXT_FIELD);
                Ok(strip_json_syntax(&content))
            }
        }
    }
}

/// Last resort for JSON-mode replies: drop JSON punctuation and the field name.
fn strip_json_syntax(content: &str) -> String {
    let without_field = content.replace(&format!("{TRANSLATED_TEXT_FIELD}:"), "");
    let cleaned: String = without_field
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '"' | '[' | ']'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::Credentials;

    fn request<'a>(backend: TranslatorBackend, credentials: &'a Credentials) -> TranslationRequest<'a> {
        TranslationRequest {
            backend,
            source_language: "japan",
            target_language: "English",
            credentials,
            prompt: None,
            json_response: false,
        }
    }

    #[test]
    fn test_remote_provider_needs_api_key() {
        let credentials = Credentials {
            model: Some("deepseek-chat".to_string()),
            ..Credentials::default()
        };
        let req = request(TranslatorBackend::DeepSeek, &credentials);
        let err = ChatTranslator::endpoint("translation/deepseek", &req).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_custom_provider_needs_base_url() {
        let credentials = Credentials {
            api_key: Some("sk-test".to_string()),
            model: Some("gpt-4o-mini".to_string()),
            ..Credentials::default()
        };
        let req = request(TranslatorBackend::CustomOpenAi, &credentials);
        let err = ChatTranslator::endpoint("translation/custom_openai", &req).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("base URL"));
    }

    #[test]
    fn test_local_provider_uses_default_url_without_key() {
        let credentials = Credentials {
            model: Some("qwen2.5:7b".to_string()),
            ..Credentials::default()
        };
        let req = request(TranslatorBackend::Ollama, &credentials);
        let endpoint = ChatTranslator::endpoint("translation/ollama", &req).unwrap();
        assert_eq!(endpoint.base_url, "http://localhost:11434/v1");
        assert!(endpoint.api_key.is_none());
    }

    #[test]
    fn test_non_chat_backend_is_rejected() {
        let credentials = Credentials::default();
        let req = request(TranslatorBackend::Caiyun, &credentials);
        assert!(ChatTranslator::endpoint("translation/caiyun", &req)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_strip_json_syntax() {
        assert_eq!(strip_json_syntax("{ translated_text: \"Hi  there\" }"), "Hi there");
    }

    #[test]
    fn test_json_prompt_names_the_field() {
        assert!(default_json_prompt("English").contains("\"translated_text\""));
    }
}
