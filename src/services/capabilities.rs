// Installed capability providers and per-run backend resolution

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::backends::{BackendKind, RecognizerBackend, RepairMethod, TranslatorBackend};
use crate::core::errors::ConfigError;
use crate::core::params::RunParameters;
use crate::services::detection::Detector;
use crate::services::ocr::{Recognizer, VisionRecognizer};
use crate::services::rendering::Renderer;
use crate::services::repair::{FlatFillRepairer, Repairer};
use crate::services::translation::{ChatClient, ChatTranslator, MockTranslator, Translator};

/// A selected backend together with the provider that serves it
pub struct Bound<B, P: ?Sized> {
    pub backend: B,
    pub provider: Arc<P>,
}

impl<B: Copy, P: ?Sized> Clone for Bound<B, P> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend,
            provider: Arc::clone(&self.provider),
        }
    }
}

/// Providers chosen for one run. Skipped stages resolve to `None`.
#[derive(Clone)]
pub struct ResolvedBackends {
    pub recognizer: Option<Bound<RecognizerBackend, dyn Recognizer>>,
    pub translator: Option<Bound<TranslatorBackend, dyn Translator>>,
    pub repairer: Bound<RepairMethod, dyn Repairer>,
}

/// Everything the orchestrator can call, keyed by backend name
pub struct Capabilities {
    detector: Arc<dyn Detector>,
    renderer: Arc<dyn Renderer>,
    recognizers: HashMap<RecognizerBackend, Arc<dyn Recognizer>>,
    translators: HashMap<TranslatorBackend, Arc<dyn Translator>>,
    repairers: HashMap<RepairMethod, Arc<dyn Repairer>>,
    flat_fill: Arc<dyn Repairer>,
}

impl Capabilities {
    /// Start a builder. Flat-fill repair and the mock translator come preinstalled.
    pub fn builder(detector: Arc<dyn Detector>, renderer: Arc<dyn Renderer>) -> CapabilitiesBuilder {
        let flat_fill: Arc<dyn Repairer> = Arc::new(FlatFillRepairer);
        let mut builder = CapabilitiesBuilder {
            capabilities: Capabilities {
                detector,
                renderer,
                recognizers: HashMap::new(),
                translators: HashMap::new(),
                repairers: HashMap::new(),
                flat_fill: Arc::clone(&flat_fill),
            },
        };
        builder.capabilities.repairers.insert(RepairMethod::FlatFill, flat_fill);
        builder
            .capabilities
            .translators
            .insert(TranslatorBackend::Mock, Arc::new(MockTranslator));
        builder
    }

    pub fn detector(&self) -> &Arc<dyn Detector> {
        &self.detector
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// The built-in flat-fill repairer used as the repair fallback
    pub fn flat_fill(&self) -> &Arc<dyn Repairer> {
        &self.flat_fill
    }

    pub fn has_recognizer(&self, backend: RecognizerBackend) -> bool {
        self.recognizers.contains_key(&backend)
    }

    pub fn has_translator(&self, backend: TranslatorBackend) -> bool {
        self.translators.contains_key(&backend)
    }

    /// Map the run's selections to installed providers.
    ///
    /// Stages the parameters skip are not resolved, so a missing provider for
    /// a skipped stage is not an error.
    pub fn resolve(&self, params: &RunParameters) -> Result<ResolvedBackends, ConfigError> {
        let recognizer = if params.skip_recognize {
            None
        } else {
            Some(bind(&self.recognizers, params.recognizer_backend())?)
        };

        let translator = if params.skip_translate {
            None
        } else {
            Some(bind(&self.translators, params.translator_backend())?)
        };

        let repairer = bind(&self.repairers, params.repair_method())?;

        debug!(
            "Resolved backends: ocr={:?}, translation={:?}, repair={}",
            recognizer.as_ref().map(|b| b.backend),
            translator.as_ref().map(|b| b.backend),
            repairer.backend
        );

        Ok(ResolvedBackends {
            recognizer,
            translator,
            repairer,
        })
    }
}

fn bind<B: BackendKind, P: ?Sized>(
    installed: &HashMap<B, Arc<P>>,
    backend: B,
) -> Result<Bound<B, P>, ConfigError> {
    installed
        .get(&backend)
        .map(|provider| Bound {
            backend,
            provider: Arc::clone(provider),
        })
        .ok_or_else(|| ConfigError::BackendUnavailable {
            capability: B::CAPABILITY,
            backend: backend.to_string(),
        })
}

pub struct CapabilitiesBuilder {
    capabilities: Capabilities,
}

impl CapabilitiesBuilder {
    pub fn recognizer(mut self, backend: RecognizerBackend, provider: Arc<dyn Recognizer>) -> Self {
        self.capabilities.recognizers.insert(backend, provider);
        self
    }

    pub fn translator(mut self, backend: TranslatorBackend, provider: Arc<dyn Translator>) -> Self {
        self.capabilities.translators.insert(backend, provider);
        self
    }

    pub fn repairer(mut self, method: RepairMethod, provider: Arc<dyn Repairer>) -> Self {
        self.capabilities.repairers.insert(method, provider);
        self
    }

    /// Install the HTTP providers: a chat translator for every
    /// OpenAI-compatible translation backend and the vision recognizer.
    pub fn with_chat_backends(mut self, client: Arc<ChatClient>) -> Self {
        let translator: Arc<dyn Translator> = Arc::new(ChatTranslator::new(Arc::clone(&client)));
        for backend in [
            TranslatorBackend::SiliconFlow,
            TranslatorBackend::DeepSeek,
            TranslatorBackend::Volcano,
            TranslatorBackend::CustomOpenAi,
            TranslatorBackend::Ollama,
            TranslatorBackend::Sakura,
        ] {
            debug_assert!(backend.is_chat_compatible());
            self.capabilities
                .translators
                .insert(backend, Arc::clone(&translator));
        }
        self.capabilities
            .recognizers
            .insert(RecognizerBackend::AiVision, Arc::new(VisionRecognizer::new(client)));
        self
    }

    pub fn build(self) -> Capabilities {
        self.capabilities
    }
}
