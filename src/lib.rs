// Library exports for the image translation pipeline
//
// A run goes detect -> recognize -> translate -> repair -> render, with
// extension boundaries around every stage

// Core modules
pub mod core;
pub mod extensions;
pub mod middleware;
pub mod orchestration;
pub mod phases;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_util;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ConfigError, ExtensionError, PipelineError, ServiceError},
    params::{Credentials, RetryPolicy, RunParameters},
    types::{
        Color, Degradation, Fallback, PipelineResult, Region, RegionTranslation, RunOutcome,
        Stage, Style,
    },
};

pub use extensions::{Boundary, Extension, ExtensionRegistry, HookOutcome, StagePatch, TextAffixer};

pub use middleware::RateLimiter;

pub use orchestration::{CancelSignal, PipelineOrchestrator};

pub use services::{Capabilities, ChatClient, Dispatcher};

pub use utils::{init_tracing, Metrics};
