// Text affixer: wraps every translated region in a configurable prefix and suffix

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::core::types::RegionTranslation;
use crate::extensions::boundary::{Boundary, HookContext, HookOutcome, StagePatch};
use crate::extensions::extension::{
    ConfigField, ConfigKind, Extension, ExtensionConfig, ExtensionMetadata, Registrar,
};

pub const TEXT_AFFIXER_ID: &str = "text_affixer";

#[derive(Debug, Clone, Default, PartialEq)]
struct AffixSettings {
    prefix: String,
    suffix: String,
    apply_to_annotation: bool,
}

/// Adds a prefix and suffix to non-blank translations after the translate stage.
#[derive(Default)]
pub struct TextAffixer {
    settings: RwLock<AffixSettings>,
}

impl TextAffixer {
    pub fn new() -> Self {
        Self::default()
    }

    fn affix(&self, ctx: &HookContext<'_>) -> anyhow::Result<HookOutcome> {
        let settings = self.settings.read().clone();
        if settings.prefix.is_empty() && settings.suffix.is_empty() {
            return Ok(HookOutcome::Unchanged);
        }

        let wrap = |text: &str| {
            if text.trim().is_empty() {
                text.to_string()
            } else {
                format!("{}{}{}", settings.prefix, text, settings.suffix)
            }
        };

        let translations: Vec<RegionTranslation> = ctx
            .data
            .translations
            .iter()
            .map(|t| RegionTranslation {
                text: wrap(&t.text),
                annotation: if settings.apply_to_annotation {
                    t.annotation.as_deref().map(wrap)
                } else {
                    t.annotation.clone()
                },
            })
            .collect();

        debug!(
            "Affixing {} translations with {:?}/{:?}",
            translations.len(),
            settings.prefix,
            settings.suffix
        );
        Ok(HookOutcome::Replace(
            StagePatch::new().with_translations(translations),
        ))
    }
}

impl Extension for TextAffixer {
    fn metadata(&self) -> ExtensionMetadata {
        ExtensionMetadata {
            id: TEXT_AFFIXER_ID.to_string(),
            name: "Text Affixer".to_string(),
            version: "1.0".to_string(),
            author: "manga-pipeline".to_string(),
            description: "Adds a custom prefix or suffix to every translated region.".to_string(),
            enabled_by_default: false,
        }
    }

    fn config_spec(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::new("text_prefix", "Prefix", ConfigKind::Text, json!(""))
                .describe("Inserted before each translation"),
            ConfigField::new("text_suffix", "Suffix", ConfigKind::Text, json!(""))
                .describe("Appended after each translation"),
            ConfigField::new(
                "apply_to_annotation",
                "Apply to annotations",
                ConfigKind::Boolean,
                json!(false),
            )
            .describe("Also wrap the secondary annotation text"),
        ]
    }

    fn load_config(&self, config: ExtensionConfig) {
        *self.settings.write() = AffixSettings {
            prefix: config.text("text_prefix").to_string(),
            suffix: config.text("text_suffix").to_string(),
            apply_to_annotation: config.flag("apply_to_annotation"),
        };
    }

    fn register(self: Arc<Self>, registrar: &mut Registrar) {
        registrar.on(Boundary::AfterTranslation, move |ctx| self.affix(ctx));
    }
}
