use image::RgbaImage;
use std::fmt;
use std::str::FromStr;

use crate::core::params::RunParameters;
use crate::core::types::{Region, RegionTranslation, Stage, StageData, Style};

/// Named points in a run where extensions are invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Boundary {
    BeforeRun,
    BeforeDetection,
    AfterDetection,
    BeforeRecognition,
    AfterRecognition,
    BeforeTranslation,
    AfterTranslation,
    BeforeRepair,
    AfterRepair,
    BeforeRender,
    AfterRender,
    AfterRun,
}

impl Boundary {
    pub const ALL: [Boundary; 12] = [
        Boundary::BeforeRun,
        Boundary::BeforeDetection,
        Boundary::AfterDetection,
        Boundary::BeforeRecognition,
        Boundary::AfterRecognition,
        Boundary::BeforeTranslation,
        Boundary::AfterTranslation,
        Boundary::BeforeRepair,
        Boundary::AfterRepair,
        Boundary::BeforeRender,
        Boundary::AfterRender,
        Boundary::AfterRun,
    ];

    /// Boundary fired before a stage does its work
    pub fn entry(stage: Stage) -> Boundary {
        match stage {
            Stage::Start => Boundary::BeforeRun,
            Stage::Detect => Boundary::BeforeDetection,
            Stage::Recognize => Boundary::BeforeRecognition,
            Stage::Translate => Boundary::BeforeTranslation,
            Stage::Repair => Boundary::BeforeRepair,
            Stage::Render => Boundary::BeforeRender,
            Stage::Done => Boundary::AfterRun,
        }
    }

    /// Boundary fired after a stage finished (or was skipped)
    pub fn exit(stage: Stage) -> Boundary {
        match stage {
            Stage::Start => Boundary::BeforeRun,
            Stage::Detect => Boundary::AfterDetection,
            Stage::Recognize => Boundary::AfterRecognition,
            Stage::Translate => Boundary::AfterTranslation,
            Stage::Repair => Boundary::AfterRepair,
            Stage::Render => Boundary::AfterRender,
            Stage::Done => Boundary::AfterRun,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Boundary::BeforeRun => "before_run",
            Boundary::BeforeDetection => "before_detection",
            Boundary::AfterDetection => "after_detection",
            Boundary::BeforeRecognition => "before_recognition",
            Boundary::AfterRecognition => "after_recognition",
            Boundary::BeforeTranslation => "before_translation",
            Boundary::AfterTranslation => "after_translation",
            Boundary::BeforeRepair => "before_repair",
            Boundary::AfterRepair => "after_repair",
            Boundary::BeforeRender => "before_render",
            Boundary::AfterRender => "after_render",
            Boundary::AfterRun => "after_run",
        }
    }

    /// Only `before_run` may swap the run parameters.
    pub fn accepts_params(&self) -> bool {
        matches!(self, Boundary::BeforeRun)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Boundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Boundary::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| format!("unknown boundary: {s}"))
    }
}

/// What a callback sees: the boundary, the current values and the run parameters
pub struct HookContext<'a> {
    pub boundary: Boundary,
    pub data: &'a StageData,
    pub params: &'a RunParameters,
}

/// Replacement values from one callback.
///
/// Every field is optional; an unset field keeps the current value. This is
/// how a callback returns only part of a stage's output.
#[derive(Debug, Clone, Default)]
pub struct StagePatch {
    pub image: Option<RgbaImage>,
    pub clean_background: Option<RgbaImage>,
    pub regions: Option<Vec<Region>>,
    pub texts: Option<Vec<String>>,
    pub translations: Option<Vec<RegionTranslation>>,
    pub styles: Option<Vec<Style>>,
    /// Honored at `before_run` only
    pub params: Option<RunParameters>,
}

impl StagePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: RgbaImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn with_texts(mut self, texts: Vec<String>) -> Self {
        self.texts = Some(texts);
        self
    }

    pub fn with_translations(mut self, translations: Vec<RegionTranslation>) -> Self {
        self.translations = Some(translations);
        self
    }

    pub fn with_styles(mut self, styles: Vec<Style>) -> Self {
        self.styles = Some(styles);
        self
    }

    pub fn with_params(mut self, params: RunParameters) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
            && self.clean_background.is_none()
            && self.regions.is_none()
            && self.texts.is_none()
            && self.translations.is_none()
            && self.styles.is_none()
            && self.params.is_none()
    }

    /// Move the data fields into `data`. Returns the params replacement, if any.
    pub(crate) fn apply_to(self, data: &mut StageData) -> Option<RunParameters> {
        if let Some(image) = self.image {
            data.image = image;
        }
        if let Some(background) = self.clean_background {
            data.clean_background = Some(background);
        }
        if let Some(regions) = self.regions {
            data.regions = regions;
        }
        if let Some(texts) = self.texts {
            data.texts = texts;
        }
        if let Some(translations) = self.translations {
            data.translations = translations;
        }
        if let Some(styles) = self.styles {
            data.styles = styles;
        }
        self.params
    }
}

/// Callback result
#[derive(Debug)]
pub enum HookOutcome {
    Unchanged,
    Replace(StagePatch),
}
