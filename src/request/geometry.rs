//! Page geometry and print parameters.
//!
//! [`PdfOptions`] is what callers send; [`PdfParams`] is what the render
//! engine receives once page size, orientation, margins and scale have
//! been resolved.
//!
//! # Page Sizes (inches, portrait)
//!
//! | Preset | Width | Height |
//! |--------|-------|--------|
//! | A4 | 8.27 | 11.69 |
//! | A3 | 11.69 | 16.54 |
//! | Letter | 8.5 | 11 |
//! | Legal | 8.5 | 14 |
//! | Tabloid | 11 | 17 |
//! | Custom | from `custom_dimensions` | |
//!
//! Unknown presets fall back to A4.

use serde::{Deserialize, Serialize};

/// Smallest scale the engine accepts.
pub const MIN_SCALE: f64 = 0.1;

/// Largest scale the engine accepts.
pub const MAX_SCALE: f64 = 2.0;

/// Scale used when none (or an invalid one) is given.
pub const DEFAULT_SCALE: f64 = 1.0;

/// Margin applied to remote pages when the caller gives none.
pub const DEFAULT_URL_MARGIN: f64 = 0.4;

/// Named paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageSize {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
    Tabloid,
    /// Use [`PdfOptions::custom_dimensions`].
    Custom,
}

impl PageSize {
    /// Look up a preset by name (case-insensitive). Unknown names map to A4.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "a3" => PageSize::A3,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            "tabloid" => PageSize::Tabloid,
            "custom" => PageSize::Custom,
            _ => PageSize::A4,
        }
    }

    /// Portrait dimensions of the preset. `Custom` reports A4.
    pub fn dimensions(self) -> PageDimensions {
        let (width, height) = match self {
            PageSize::A4 | PageSize::Custom => (8.27, 11.69),
            PageSize::A3 => (11.69, 16.54),
            PageSize::Letter => (8.5, 11.0),
            PageSize::Legal => (8.5, 14.0),
            PageSize::Tabloid => (11.0, 17.0),
        };
        PageDimensions { width, height }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::A3 => "A3",
            PageSize::Letter => "Letter",
            PageSize::Legal => "Legal",
            PageSize::Tabloid => "Tabloid",
            PageSize::Custom => "Custom",
        }
    }
}

impl From<String> for PageSize {
    fn from(name: String) -> Self {
        PageSize::parse(&name)
    }
}

impl From<PageSize> for String {
    fn from(size: PageSize) -> Self {
        size.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Width and height in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Margins {
    /// Same margin on every side.
    pub fn uniform(inches: f64) -> Self {
        Self {
            top: inches,
            bottom: inches,
            left: inches,
            right: inches,
        }
    }

    /// Zero margins.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Caller-facing print options.
///
/// Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    pub page_size: PageSize,

    /// Required for [`PageSize::Custom`]; ignored otherwise.
    pub custom_dimensions: Option<PageDimensions>,

    pub orientation: Orientation,

    /// `None` picks the default for the content kind.
    pub margins: Option<Margins>,

    pub print_background: bool,

    /// Valid range is 0.1 to 2.0; anything else prints at 1.0.
    pub scale: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            custom_dimensions: None,
            orientation: Orientation::Portrait,
            margins: None,
            print_background: true,
            scale: DEFAULT_SCALE,
        }
    }
}

impl PdfOptions {
    /// Paper dimensions after preset lookup and orientation swap.
    pub fn paper(&self) -> PageDimensions {
        let mut dims = match (self.page_size, self.custom_dimensions) {
            (PageSize::Custom, Some(custom)) if custom.width > 0.0 && custom.height > 0.0 => {
                custom
            }
            (size, _) => size.dimensions(),
        };

        if self.orientation == Orientation::Landscape {
            std::mem::swap(&mut dims.width, &mut dims.height);
        }
        dims
    }

    /// Scale the engine should print at.
    pub fn effective_scale(&self) -> f64 {
        clamp_scale(self.scale)
    }

    /// Resolve into engine parameters, using `default_margins` when the
    /// caller gave none.
    pub fn resolve(&self, default_margins: Margins) -> PdfParams {
        let paper = self.paper();
        PdfParams {
            paper_width: paper.width,
            paper_height: paper.height,
            margins: self.margins.unwrap_or(default_margins),
            print_background: self.print_background,
            scale: self.effective_scale(),
        }
    }
}

/// Out-of-range or non-finite values reset to [`DEFAULT_SCALE`].
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_finite() && (MIN_SCALE..=MAX_SCALE).contains(&scale) {
        scale
    } else {
        DEFAULT_SCALE
    }
}

/// Fully resolved print parameters handed to the render engine.
///
/// Orientation has already been applied to the paper dimensions, so the
/// engine always prints portrait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfParams {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margins: Margins,
    pub print_background: bool,
    pub scale: f64,
}

// ============================================================================
// Unit Tests
// ============================================================================
