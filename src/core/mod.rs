pub mod backends;
pub mod config;
pub mod errors;
pub mod params;
pub mod types;

// Re-export commonly used items for convenience
pub use backends::{BackendKind, RecognizerBackend, RepairMethod, Selection, TranslatorBackend};
pub use config::Config;
pub use errors::{ConfigError, ExtensionError, PipelineError, ServiceError};
pub use params::{Credentials, RetryPolicy, RunParameters};
pub use types::{
    Color, Degradation, Fallback, FontSize, Outline, PipelineResult, Region, RegionTranslation,
    RunOutcome, Stage, StageData, StageOutcome, Style, TextDirection,
};
