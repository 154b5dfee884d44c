//! Deck descriptor file format, the JSON written by the rendering step.
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "Demo",
//!   "resolution": [1920, 1080],
//!   "slides": [
//!     { "segments": ["files/Demo/0.mp4"], "mode": "once" },
//!     { "segments": [{ "file": "files/Demo/1.mp4", "duration": 2.5 }],
//!       "mode": "loop-until-advanced", "reverse": "files/Demo/1_rev.mp4" }
//!   ]
//! }
//! ```
//!
//! Paths are relative to the folder holding the descriptor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{DeckSettings, NavigationHints, SlideMode};

pub const DESCRIPTOR_VERSION: u32 = 1;

fn default_version() -> u32 {
    DESCRIPTOR_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDeck {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Must match the file stem when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub settings: DeckSettings,
    pub slides: Vec<SourceSlide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSlide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub segments: Vec<SourceSegment>,
    #[serde(default)]
    pub mode: SlideMode,
    #[serde(flatten)]
    pub hints: NavigationHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse: Option<SourceSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// One media file. Accepts either a bare path string or
/// `{"file": "...", "duration": seconds}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSegment {
    pub file: PathBuf,
    /// Seconds of playing time; absent for stills and unknown clips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Deserialize)]
struct SegmentObject {
    file: PathBuf,
    #[serde(default)]
    duration: Option<f64>,
}

impl<'de> Deserialize<'de> for SourceSegment {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, MapAccess, Visitor};
        use std::fmt;

        struct SegmentVisitor;

        impl<'de> Visitor<'de> for SegmentVisitor {
            type Value = SourceSegment;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a file path or a {\"file\", \"duration\"} object")
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<SourceSegment, E> {
                Ok(SourceSegment {
                    file: PathBuf::from(v),
                    duration: None,
                })
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<SourceSegment, A::Error> {
                let obj =
                    SegmentObject::deserialize(serde::de::value::MapAccessDeserializer::new(map))?;
                Ok(SourceSegment {
                    file: obj.file,
                    duration: obj.duration,
                })
            }
        }

        d.deserialize_any(SegmentVisitor)
    }
}
