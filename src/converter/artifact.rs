//! The deck as embedded in a converted document.
//!
//! The HTML player reads this JSON at startup, and [`load`] reads it back so a
//! converted artifact can be checked against the presentation it came from.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeckError, Result};
use crate::types::{AssetRef, DeckSettings, MediaKind, NavigationHints, Presentation, SlideMode, SlideRules};

/// Opening tag of the block holding the deck JSON.
pub const DECK_TAG_OPEN: &str = r#"<script type="application/json" id="deck-data">"#;
const DECK_TAG_CLOSE: &str = "</script>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDeck {
    pub name: String,
    pub settings: DeckSettings,
    pub slides: Vec<ArtifactSlide>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSlide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub mode: SlideMode,
    #[serde(flatten)]
    pub hints: NavigationHints,
    pub segments: Vec<ArtifactMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse: Option<ArtifactMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ArtifactMedia>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMedia {
    /// Relative URL or `data:` URI.
    pub src: String,
    pub kind: MediaKind,
    /// Seconds; the player relies on the media's own end event when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ArtifactDeck {
    /// Re-express a presentation, mapping every asset through `src_for`.
    pub fn build<F>(presentation: &Presentation, mut src_for: F) -> Result<Self>
    where
        F: FnMut(&AssetRef) -> Result<String>,
    {
        let mut media = |asset: &AssetRef| -> Result<ArtifactMedia> {
            Ok(ArtifactMedia {
                src: src_for(asset)?,
                kind: asset.kind,
                duration: asset.duration.map(|d| d.as_secs_f64()),
            })
        };

        let mut slides = Vec::with_capacity(presentation.len());
        for slide in &presentation.slides {
            slides.push(ArtifactSlide {
                title: slide.title.clone(),
                mode: slide.mode,
                hints: slide.hints.clone(),
                segments: slide
                    .segments
                    .iter()
                    .map(&mut media)
                    .collect::<Result<Vec<_>>>()?,
                reverse: slide.reverse.as_ref().map(&mut media).transpose()?,
                thumbnail: slide.thumbnail.as_ref().map(&mut media).transpose()?,
                notes: slide.notes.clone(),
            });
        }

        Ok(ArtifactDeck {
            name: presentation.name.clone(),
            settings: presentation.settings.clone(),
            slides,
        })
    }

    pub fn rules(&self) -> Vec<SlideRules> {
        self.slides
            .iter()
            .map(|slide| SlideRules {
                mode: slide.mode,
                segments: slide.segments.len(),
                reversible: slide.reverse.is_some(),
                hints: slide.hints.clone(),
            })
            .collect()
    }

    pub fn media(&self) -> impl Iterator<Item = &ArtifactMedia> {
        self.slides.iter().flat_map(|slide| {
            slide
                .segments
                .iter()
                .chain(slide.reverse.iter())
                .chain(slide.thumbnail.iter())
        })
    }

    /// JSON safe to place inside a `<script>` element.
    pub fn to_script_json(&self) -> Result<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(json.replace('<', "\\u003c"))
    }
}

/// Extract the embedded deck from converted HTML.
pub fn parse(html: &str, path: &Path) -> Result<ArtifactDeck> {
    let start = html
        .find(DECK_TAG_OPEN)
        .ok_or_else(|| DeckError::corrupt(path, "no embedded deck found"))?
        + DECK_TAG_OPEN.len();
    let len = html[start..]
        .find(DECK_TAG_CLOSE)
        .ok_or_else(|| DeckError::corrupt(path, "unterminated deck block"))?;

    serde_json::from_str(&html[start..start + len]).map_err(|e| DeckError::corrupt(path, e.to_string()))
}

/// Read a converted document and check that its co-located media is in place.
pub fn load(path: &Path) -> Result<ArtifactDeck> {
    let html = fs::read_to_string(path)?;
    let deck = parse(&html, path)?;

    let base = path.parent().unwrap_or(Path::new("."));
    for media in deck.media().filter(|m| !m.src.starts_with("data:")) {
        let file: PathBuf = base.join(&media.src);
        if !file.is_file() {
            return Err(DeckError::broken(&deck.name, file, "missing from converted artifact"));
        }
    }
    Ok(deck)
}
