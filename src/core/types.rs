// Shared data types for a single pipeline run

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::ConfigError;

/// Axis-aligned text region in image pixel coordinates.
///
/// Always satisfies `x1 < x2` and `y1 < y2`; the only constructors check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct Region {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl Region {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// Returns `(x, y, w, h)` in unsigned pixel space, or `None` when the
    /// region lies entirely outside the image.
    pub fn clamped_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x1.clamp(0, width as i32) as u32;
        let y1 = self.y1.clamp(0, height as i32) as u32;
        let x2 = self.x2.clamp(0, width as i32) as u32;
        let y2 = self.y2.clamp(0, height as i32) as u32;
        (x1 < x2 && y1 < y2).then(|| (x1, y1, x2 - x1, y2 - y1))
    }
}

impl TryFrom<[i32; 4]> for Region {
    type Error = String;

    fn try_from([x1, y1, x2, y2]: [i32; 4]) -> Result<Self, Self::Error> {
        Region::new(x1, y1, x2, y2)
            .ok_or_else(|| format!("degenerate region [{x1}, {y1}, {x2}, {y2}]"))
    }
}

impl From<Region> for [i32; 4] {
    fn from(region: Region) -> Self {
        region.as_array()
    }
}

/// RGBA color, written as `#RRGGBB` or `#RRGGBBAA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub fn rgba(&self) -> Rgba<u8> {
        Rgba(self.0)
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ConfigError::InvalidColor(s.to_string());
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{r:02X}{g:02X}{b:02X}")
        } else {
            write!(f, "#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    /// Renderer picks the largest size that fits the region
    Auto,
    Fixed(u32),
}

impl FromStr for FontSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(FontSize::Auto),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .map(FontSize::Fixed)
                .ok_or_else(|| ConfigError::InvalidStyle(format!("font size {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Horizontal,
    Vertical,
}

impl FromStr for TextDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "horizontal" => Ok(TextDirection::Horizontal),
            "vertical" => Ok(TextDirection::Vertical),
            _ => Err(ConfigError::InvalidStyle(format!("text direction {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub enabled: bool,
    pub color: Color,
    pub width: u32,
}

/// Per-region rendering style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub font: String,
    pub font_size: FontSize,
    pub direction: TextDirection,
    pub text_color: Color,
    pub rotation_degrees: f32,
    pub outline: Outline,
    /// Pixel offset applied to the text anchor
    pub offset: (i32, i32),
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font: "fonts/msyh.ttc".to_string(),
            font_size: FontSize::Fixed(30),
            direction: TextDirection::Vertical,
            text_color: Color([0x23, 0x18, 0x16, 255]),
            rotation_degrees: 0.0,
            outline: Outline {
                enabled: false,
                color: Color::WHITE,
                width: 1,
            },
            offset: (0, 0),
        }
    }
}

/// Translation for one region, with an optional secondary annotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTranslation {
    pub text: String,
    pub annotation: Option<String>,
}

impl RegionTranslation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotation: None,
        }
    }
}

/// Pipeline states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Start,
    Detect,
    Recognize,
    Translate,
    Repair,
    Render,
    Done,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Start,
        Stage::Detect,
        Stage::Recognize,
        Stage::Translate,
        Stage::Repair,
        Stage::Render,
        Stage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Detect => "detect",
            Stage::Recognize => "recognize",
            Stage::Translate => "translate",
            Stage::Repair => "repair",
            Stage::Render => "render",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working set threaded through every boundary of a run.
///
/// After normalization `texts`, `translations` and `styles` always have
/// `regions.len()` entries and entry `i` of each belongs to region `i`.
#[derive(Debug, Clone)]
pub struct StageData {
    pub image: RgbaImage,
    pub clean_background: Option<RgbaImage>,
    pub regions: Vec<Region>,
    pub texts: Vec<String>,
    pub translations: Vec<RegionTranslation>,
    pub styles: Vec<Style>,
}

impl StageData {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            clean_background: None,
            regions: Vec::new(),
            texts: Vec::new(),
            translations: Vec::new(),
            styles: Vec::new(),
        }
    }
}

/// What a stage fell back to after its configured backend failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Region text left empty after recognition failed
    EmptyText { region: usize },
    /// Recognized text used in place of its translation
    SourceText,
    /// Translation kept, secondary annotation dropped
    NoAnnotation { region: usize },
    /// Flat color fill used in place of the configured repair backend
    FlatFill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub stage: Stage,
    pub fallback: Fallback,
    pub reason: String,
}

/// Result of one stage: either the backend's value or a fallback value
#[derive(Debug)]
pub enum StageOutcome<T> {
    Succeeded(T),
    Degraded {
        value: T,
        degradations: Vec<Degradation>,
    },
}

impl<T> StageOutcome<T> {
    pub fn into_parts(self) -> (T, Vec<Degradation>) {
        match self {
            StageOutcome::Succeeded(value) => (value, Vec::new()),
            StageOutcome::Degraded {
                value,
                degradations,
            } => (value, degradations),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }
}

/// Final output of a completed run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub image: RgbaImage,
    /// Repaired image without rendered text; base for partial re-rendering
    pub clean_background: Option<RgbaImage>,
    pub texts: Vec<String>,
    pub translations: Vec<RegionTranslation>,
    pub regions: Vec<Region>,
    pub styles: Vec<Style>,
    pub degradations: Vec<Degradation>,
}

impl PipelineResult {
    /// Result for an image with no regions: the input image and empty arrays.
    pub fn empty(image: RgbaImage) -> Self {
        Self {
            image,
            clean_background: None,
            texts: Vec::new(),
            translations: Vec::new(),
            regions: Vec::new(),
            styles: Vec::new(),
            degradations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Replace the style of one region. Returns false for an out-of-range index.
    pub fn set_style(&mut self, index: usize, style: Style) -> bool {
        match self.styles.get_mut(index) {
            Some(slot) => {
                *slot = style;
                true
            }
            None => false,
        }
    }

    /// Replace the translated text of one region, keeping its annotation.
    pub fn set_translation(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.translations.get_mut(index) {
            Some(slot) => {
                slot.text = text.into();
                true
            }
            None => false,
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(PipelineResult),
    /// Cancellation was observed before `before` started
    Cancelled { before: Stage },
}

impl RunOutcome {
    pub fn completed(self) -> Option<PipelineResult> {
        match self {
            RunOutcome::Completed(result) => Some(result),
            RunOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }
}
