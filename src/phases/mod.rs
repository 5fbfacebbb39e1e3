// Stage implementations driven by the orchestrator

pub mod detection;
pub mod recognition;
pub mod rendering;
pub mod repair;
pub mod translation;

pub use detection::DetectionPhase;
pub use recognition::RecognitionPhase;
pub use rendering::RenderingPhase;
pub use repair::RepairPhase;
pub use translation::TranslationPhase;
