// Extension points around every pipeline stage

pub mod affixer;
pub mod boundary;
pub mod extension;
pub mod registry;

pub use affixer::{TextAffixer, TEXT_AFFIXER_ID};
pub use boundary::{Boundary, HookContext, HookOutcome, StagePatch};
pub use extension::{
    ConfigField, ConfigKind, Extension, ExtensionConfig, ExtensionMetadata, Registrar,
};
pub use registry::{ExtensionInfo, ExtensionRegistry, HookFn};
