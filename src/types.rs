//! Deck data model shared by the resolver, the playback engine and the converter.
//!
//! Two boundaries live here:
//! - Resolver → consumers (in-memory): `Presentation` whose `AssetRef`s were
//!   validated against the filesystem
//! - Presentation → Engine: `SlideRules`, the navigation-relevant projection
//!   of a slide, also rebuilt from converted artifacts

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Slide behaviour
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideMode {
    /// Play every segment once, then move on.
    #[default]
    Once,
    /// Repeat the segments until the presenter navigates away.
    Loop,
    /// Repeat until advanced, then finish the running iteration before moving on.
    LoopUntilAdvanced,
}

impl SlideMode {
    pub fn loops(self) -> bool {
        !matches!(self, SlideMode::Once)
    }

    pub fn tag(self) -> &'static str {
        match self {
            SlideMode::Once => "once",
            SlideMode::Loop => "loop",
            SlideMode::LoopUntilAdvanced => "loop-until-advanced",
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationHints {
    /// Slide entered by `advance` instead of the next one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to: Option<usize>,
    /// Slide entered by `retreat` instead of the previous one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_to: Option<usize>,
    /// Hold a `once` slide on its last frame instead of auto-advancing.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pause_at_end: bool,
}

impl NavigationHints {
    pub fn is_default(&self) -> bool {
        self.skip_to.is_none() && self.reverse_to.is_none() && !self.pause_at_end
    }

    fn offset(&self, by: usize) -> Self {
        NavigationHints {
            skip_to: self.skip_to.map(|i| i + by),
            reverse_to: self.reverse_to.map(|i| i + by),
            pause_at_end: self.pause_at_end,
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation-level settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    #[default]
    Keep,
    Ignore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    Cut,
    Fade,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSettings {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),
}

fn default_resolution() -> (u32, u32) {
    (1920, 1080)
}

impl Default for DeckSettings {
    fn default() -> Self {
        DeckSettings {
            aspect_ratio: AspectRatio::default(),
            transition: Transition::default(),
            resolution: default_resolution(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved presentation (in-memory, never serialized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

/// A media file that was found, readable and non-empty at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Path as written in the descriptor.
    pub relative: PathBuf,
    /// Path on disk.
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Playing time; `None` means the segment never completes on its own.
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub title: Option<String>,
    pub segments: Vec<AssetRef>,
    pub mode: SlideMode,
    pub hints: NavigationHints,
    /// Clip played backwards when retreating out of this slide.
    pub reverse: Option<AssetRef>,
    pub thumbnail: Option<AssetRef>,
    pub notes: String,
}

impl Slide {
    pub fn rules(&self) -> SlideRules {
        SlideRules {
            mode: self.mode,
            segments: self.segments.len(),
            reversible: self.reverse.is_some(),
            hints: self.hints.clone(),
        }
    }

    /// Every asset this slide references, in a stable order.
    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.segments
            .iter()
            .chain(self.reverse.iter())
            .chain(self.thumbnail.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub name: String,
    pub slides: Vec<Slide>,
    pub settings: DeckSettings,
}

impl Presentation {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn rules(&self) -> Vec<SlideRules> {
        self.slides.iter().map(Slide::rules).collect()
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.slides.iter().flat_map(Slide::assets)
    }

    /// Join several presentations into one, re-basing navigation hints.
    ///
    /// The first part's settings win except for the resolution, which is the
    /// largest of all parts.
    pub fn concat(name: impl Into<String>, parts: Vec<Presentation>) -> Presentation {
        let mut settings = parts.first().map(|p| p.settings.clone()).unwrap_or_default();
        let mut slides = Vec::new();

        for part in parts {
            settings.resolution = (
                settings.resolution.0.max(part.settings.resolution.0),
                settings.resolution.1.max(part.settings.resolution.1),
            );
            let offset = slides.len();
            slides.extend(part.slides.into_iter().map(|mut slide| {
                slide.hints = slide.hints.offset(offset);
                slide
            }));
        }

        Presentation {
            name: name.into(),
            slides,
            settings,
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation → Engine boundary
// ---------------------------------------------------------------------------

/// What the playback engine needs to know about one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRules {
    pub mode: SlideMode,
    pub segments: usize,
    pub reversible: bool,
    #[serde(default, skip_serializing_if = "NavigationHints::is_default")]
    pub hints: NavigationHints,
}
