// Run orchestration: the stage state machine and its helpers

pub mod cancel;
pub mod invariants;
pub mod pipeline;

pub use cancel::CancelSignal;
pub use invariants::align_to_regions;
pub use pipeline::PipelineOrchestrator;
