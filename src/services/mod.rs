pub mod capabilities;
pub mod detection;
pub mod dispatch;
pub mod ocr;
pub mod rendering;
pub mod repair;
pub mod translation;

// Re-export commonly used services
pub use capabilities::{Bound, Capabilities, CapabilitiesBuilder, ResolvedBackends};
pub use detection::{normalize_detections, Detector, RawDetection};
pub use dispatch::Dispatcher;
pub use ocr::{RecognitionRequest, Recognizer, VisionRecognizer};
pub use rendering::Renderer;
pub use repair::{FlatFillRepairer, RepairOutput, Repairer};
pub use translation::{
    ChatClient, ChatTranslator, MockTranslator, TranslationRequest, Translator,
};
