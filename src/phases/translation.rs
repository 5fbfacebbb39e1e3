// Translate stage: one translator call per region, results kept in region order

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::core::backends::TranslatorBackend;
use crate::core::errors::{ServiceError, ServiceResult};
use crate::core::params::RunParameters;
use crate::core::types::{Degradation, Fallback, RegionTranslation, Stage, StageOutcome};
use crate::services::capabilities::Bound;
use crate::services::dispatch::Dispatcher;
use crate::services::translation::{TranslationRequest, Translator};

/// One region's translation plus a swallowed annotation failure, if any
#[derive(Default)]
struct Translated {
    translation: RegionTranslation,
    annotation_error: Option<ServiceError>,
}

pub struct TranslationPhase {
    dispatcher: Dispatcher,
}

impl TranslationPhase {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Translate every recognized text.
    ///
    /// Blank texts are never sent and translate to blank. Up to
    /// `translation_concurrency` calls are in flight; output order always
    /// follows region order. With degradation allowed, a region whose call
    /// fails transiently keeps its source text, and a failed annotation call
    /// only drops the annotation.
    #[instrument(skip_all, fields(backend = %bound.backend, regions = texts.len()))]
    pub async fn execute(
        &self,
        texts: &[String],
        params: &RunParameters,
        bound: &Bound<TranslatorBackend, dyn Translator>,
    ) -> ServiceResult<StageOutcome<Vec<RegionTranslation>>> {
        let concurrency = params.translation_concurrency.max(1);
        let results: Vec<ServiceResult<Translated>> = stream::iter(texts)
            .map(|text| self.translate_region(text, params, bound))
            .buffered(concurrency)
            .collect()
            .await;

        let mut translations = Vec::with_capacity(texts.len());
        let mut degradations = Vec::new();
        for (index, (result, source)) in results.into_iter().zip(texts).enumerate() {
            match result {
                Ok(Translated {
                    translation,
                    annotation_error,
                }) => {
                    if let Some(err) = annotation_error {
                        warn!("Annotation failed for region {}, keeping translation only: {}", index, err);
                        degradations.push(Degradation {
                            stage: Stage::Translate,
                            fallback: Fallback::NoAnnotation { region: index },
                            reason: err.to_string(),
                        });
                    }
                    translations.push(translation);
                }
                Err(err) if err.is_configuration() || !params.degrade_on_failure => {
                    return Err(err);
                }
                Err(err) => {
                    warn!("Translation failed for region {}, keeping source text: {}", index, err);
                    degradations.push(Degradation {
                        stage: Stage::Translate,
                        fallback: Fallback::SourceText,
                        reason: err.to_string(),
                    });
                    translations.push(RegionTranslation::new(source.clone()));
                }
            }
        }

        debug!(
            "Translated {} regions ({} degraded)",
            translations.len(),
            degradations.len()
        );

        if degradations.is_empty() {
            Ok(StageOutcome::Succeeded(translations))
        } else {
            Ok(StageOutcome::Degraded {
                value: translations,
                degradations,
            })
        }
    }

    async fn translate_region(
        &self,
        text: &str,
        params: &RunParameters,
        bound: &Bound<TranslatorBackend, dyn Translator>,
    ) -> ServiceResult<Translated> {
        if text.trim().is_empty() {
            return Ok(Translated::default());
        }

        let request = TranslationRequest {
            backend: bound.backend,
            source_language: &params.source_language,
            target_language: &params.target_language,
            credentials: &params.translation_credentials,
            prompt: params.prompt_override.as_deref(),
            json_response: params.json_response,
        };
        let translated = self.send(text, params, bound, &request).await?;

        let mut annotation_error = None;
        let annotation = match params.annotation_prompt.as_deref() {
            Some(prompt) => {
                let request = TranslationRequest {
                    prompt: Some(prompt),
                    ..request
                };
                match self.send(text, params, bound, &request).await {
                    Ok(annotation) => Some(annotation),
                    Err(err) if err.is_configuration() || !params.degrade_on_failure => {
                        return Err(err);
                    }
                    Err(err) => {
                        annotation_error = Some(err);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Translated {
            translation: RegionTranslation {
                text: translated,
                annotation,
            },
            annotation_error,
        })
    }

    async fn send(
        &self,
        text: &str,
        params: &RunParameters,
        bound: &Bound<TranslatorBackend, dyn Translator>,
        request: &TranslationRequest<'_>,
    ) -> Result<String, ServiceError> {
        let provider = bound.provider.as_ref();
        self.dispatcher
            .call(bound.backend, params.rpm_translation, params.retry, || {
                provider.translate(text, request)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::RateLimiter;
    use crate::services::translation::MockTranslator;
    use crate::test_util::{fast_retry, ScriptedTranslator};
    use crate::utils::Metrics;
    use std::sync::Arc;

    fn phase() -> TranslationPhase {
        TranslationPhase::new(Dispatcher::new(RateLimiter::new(), Metrics::new()))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_blank_text_is_not_sent() {
        let translator = Arc::new(ScriptedTranslator::echo());
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::Mock,
            provider: translator.clone(),
        };

        let outcome = phase()
            .execute(&texts(&["こんにちは", "  ", ""]), &RunParameters::default(), &bound)
            .await
            .unwrap();

        let (translations, _) = outcome.into_parts();
        assert_eq!(translations.len(), 3);
        assert_eq!(translations[1].text, "");
        assert_eq!(translator.sent(), vec!["こんにちは".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_translation_preserves_order() {
        let translator = Arc::new(ScriptedTranslator::with_delays());
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::Mock,
            provider: translator,
        };
        let params = RunParameters {
            translation_concurrency: 4,
            ..RunParameters::default()
        };

        let outcome = phase()
            .execute(&texts(&["30", "1", "20", "5"]), &params, &bound)
            .await
            .unwrap();

        let order: Vec<String> = outcome.into_parts().0.into_iter().map(|t| t.text).collect();
        assert_eq!(order, vec!["t:30", "t:1", "t:20", "t:5"]);
    }

    #[tokio::test]
    async fn test_annotation_only_with_prompt() {
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::Mock,
            provider: Arc::new(MockTranslator),
        };

        let plain = phase()
            .execute(&texts(&["hi"]), &RunParameters::default(), &bound)
            .await
            .unwrap()
            .into_parts()
            .0;
        assert!(plain[0].annotation.is_none());

        let params = RunParameters {
            annotation_prompt: Some("Explain the vocabulary".to_string()),
            ..RunParameters::default()
        };
        let annotated = phase()
            .execute(&texts(&["hi"]), &params, &bound)
            .await
            .unwrap()
            .into_parts()
            .0;
        assert_eq!(annotated[0].annotation.as_deref(), Some("[en] hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_falls_back_to_source_text() {
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::DeepSeek,
            provider: Arc::new(ScriptedTranslator::failing_transient()),
        };
        let params = RunParameters {
            retry: fast_retry(2),
            ..RunParameters::default()
        };

        let outcome = phase()
            .execute(&texts(&["元気", ""]), &params, &bound)
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        let (translations, degradations) = outcome.into_parts();
        assert_eq!(translations[0].text, "元気");
        assert_eq!(translations[1].text, "");
        assert_eq!(degradations.len(), 1);
        assert_eq!(degradations[0].fallback, Fallback::SourceText);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_propagates_without_degradation() {
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::DeepSeek,
            provider: Arc::new(ScriptedTranslator::failing_transient()),
        };
        let params = RunParameters {
            retry: fast_retry(1),
            degrade_on_failure: false,
            ..RunParameters::default()
        };

        assert!(phase().execute(&texts(&["元気"]), &params, &bound).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_annotation_failure_keeps_translation() {
        let translator = Arc::new(ScriptedTranslator::failing_prompted());
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::DeepSeek,
            provider: translator.clone(),
        };
        let params = RunParameters {
            retry: fast_retry(2),
            annotation_prompt: Some("explain".to_string()),
            ..RunParameters::default()
        };

        let outcome = phase()
            .execute(&texts(&["一", "二"]), &params, &bound)
            .await
            .unwrap();

        let (translations, degradations) = outcome.into_parts();
        assert_eq!(translations[0].text, "t:一");
        assert_eq!(translations[1].text, "t:二");
        assert!(translations.iter().all(|t| t.annotation.is_none()));
        assert_eq!(degradations.len(), 2);
        assert_eq!(degradations[1].fallback, Fallback::NoAnnotation { region: 1 });
        // one main call plus two annotation attempts per region
        assert_eq!(translator.sent().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_annotation_failure_propagates_without_degradation() {
        let bound: Bound<TranslatorBackend, dyn Translator> = Bound {
            backend: TranslatorBackend::DeepSeek,
            provider: Arc::new(ScriptedTranslator::failing_prompted()),
        };
        let params = RunParameters {
            retry: fast_retry(1),
            annotation_prompt: Some("explain".to_string()),
            degrade_on_failure: false,
            ..RunParameters::default()
        };

        assert!(phase().execute(&texts(&["一"]), &params, &bound).await.is_err());
    }
}
