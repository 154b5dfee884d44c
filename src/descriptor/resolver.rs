use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::source::{DESCRIPTOR_VERSION, SourceDeck, SourceSegment};
use crate::assets::{self, AssetStore};
use crate::error::{DeckError, Result};
use crate::types::{AssetRef, Presentation, Slide};

/// Folder the rendering step writes descriptors to, relative to the project.
pub const DEFAULT_FOLDER: &str = "slides";

/// Locates deck descriptors inside one explicit search folder.
#[derive(Debug, Clone)]
pub struct Resolver {
    search_path: PathBuf,
}

impl Resolver {
    pub fn new(search_path: impl Into<PathBuf>) -> Self {
        Self {
            search_path: search_path.into(),
        }
    }

    pub fn search_path(&self) -> &Path {
        &self.search_path
    }

    pub fn descriptor_path(&self, name: &str) -> PathBuf {
        self.search_path.join(format!("{name}.json"))
    }

    /// Load, validate and resolve the presentation called `name`.
    pub fn resolve(&self, name: &str) -> Result<Presentation> {
        let path = self.descriptor_path(name);
        if !is_valid_name(name) {
            return Err(DeckError::UnknownPresentation {
                name: name.to_string(),
                path,
            });
        }

        let bytes = match read_descriptor(&path)? {
            Some(bytes) => bytes,
            None => {
                return Err(DeckError::UnknownPresentation {
                    name: name.to_string(),
                    path,
                });
            }
        };

        let deck: SourceDeck =
            serde_json::from_slice(&bytes).map_err(|e| DeckError::corrupt(&path, e.to_string()))?;
        validate(&deck, name, &path)?;

        let store = AssetStore::new(&self.search_path, name);
        let presentation = build(deck, name, &store)?;
        debug!(
            presentation = name,
            slides = presentation.len(),
            "resolved presentation"
        );
        Ok(presentation)
    }

    /// Resolve several scenes, keeping them separate.
    pub fn resolve_scenes(&self, names: &[String]) -> Result<Vec<Presentation>> {
        if names.is_empty() {
            return Err(DeckError::UnknownPresentation {
                name: String::new(),
                path: self.search_path.clone(),
            });
        }
        names.iter().map(|name| self.resolve(name)).collect()
    }

    /// Resolve several scenes and play them back to back as one presentation.
    pub fn resolve_many(&self, names: &[String], combined: &str) -> Result<Presentation> {
        let mut parts = self.resolve_scenes(names)?;
        if parts.len() == 1 && names[0] == combined {
            return Ok(parts.remove(0));
        }
        Ok(Presentation::concat(combined, parts))
    }

    /// Names of every presentation in the search folder that resolves cleanly.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.search_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.resolve(stem) {
                Ok(_) => names.push(stem.to_string()),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }
        names.sort();
        debug!(
            count = names.len(),
            folder = %self.search_path.display(),
            "listed presentations"
        );
        Ok(names)
    }
}

/// Raw descriptor bytes, or `None` when there is no file at `path`.
///
/// Anything at `path` that cannot be read as a regular file is corrupt, so
/// callers see the same error kind for every unusable descriptor.
fn read_descriptor(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => {
            return Err(DeckError::corrupt(path, "descriptor is not a regular file"));
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DeckError::corrupt(path, format!("cannot stat descriptor: {e}"))),
    }
    fs::read(path)
        .map(Some)
        .map_err(|e| DeckError::corrupt(path, format!("unreadable descriptor: {e}")))
}

/// Presentation names are file stems: no separators, no leading dot.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(deck: &SourceDeck, name: &str, path: &Path) -> Result<()> {
    let corrupt = |reason: String| DeckError::corrupt(path, reason);

    if deck.version != DESCRIPTOR_VERSION {
        return Err(corrupt(format!(
            "unsupported descriptor version {} (expected {DESCRIPTOR_VERSION})",
            deck.version
        )));
    }
    if let Some(declared) = &deck.name {
        if declared != name {
            return Err(corrupt(format!(
                "descriptor declares name `{declared}` but was looked up as `{name}`"
            )));
        }
    }
    if deck.slides.is_empty() {
        return Err(corrupt("presentation has no slides".into()));
    }
    let (w, h) = deck.settings.resolution;
    if w == 0 || h == 0 {
        return Err(corrupt(format!("invalid resolution {w}x{h}")));
    }

    let count = deck.slides.len();
    for (i, slide) in deck.slides.iter().enumerate() {
        if slide.segments.is_empty() {
            return Err(corrupt(format!("slide {i} has no segments")));
        }
        for (field, target) in [
            ("skip_to", slide.hints.skip_to),
            ("reverse_to", slide.hints.reverse_to),
        ] {
            if let Some(target) = target.filter(|t| *t >= count) {
                return Err(corrupt(format!(
                    "slide {i}: {field} {target} is out of range (0..{count})"
                )));
            }
        }
        for segment in slide.segments.iter().chain(slide.reverse.iter()) {
            check_segment(segment).map_err(|reason| corrupt(format!("slide {i}: {reason}")))?;
        }
        if let Some(thumb) = &slide.thumbnail {
            if !assets::is_contained(thumb) {
                return Err(corrupt(format!(
                    "slide {i}: thumbnail path `{}` must be relative to the descriptor folder",
                    thumb.display()
                )));
            }
        }
    }
    Ok(())
}

fn check_segment(segment: &SourceSegment) -> std::result::Result<(), String> {
    if !assets::is_contained(&segment.file) {
        return Err(format!(
            "asset path `{}` must be relative to the descriptor folder",
            segment.file.display()
        ));
    }
    if let Some(secs) = segment.duration {
        if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
            return Err(format!(
                "segment `{}` has invalid duration {secs}",
                segment.file.display()
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Asset binding
// ---------------------------------------------------------------------------

fn resolve_segment(store: &AssetStore, segment: &SourceSegment) -> Result<AssetRef> {
    let duration = segment
        .duration
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    store.resolve(&segment.file, duration)
}

fn build(deck: SourceDeck, name: &str, store: &AssetStore) -> Result<Presentation> {
    let slides = deck
        .slides
        .into_iter()
        .map(|slide| {
            let segments = slide
                .segments
                .iter()
                .map(|s| resolve_segment(store, s))
                .collect::<Result<Vec<_>>>()?;
            let reverse = slide
                .reverse
                .as_ref()
                .map(|s| resolve_segment(store, s))
                .transpose()?;
            let thumbnail = slide
                .thumbnail
                .as_deref()
                .map(|p| store.resolve(p, None))
                .transpose()?;
            Ok(Slide {
                title: slide.title,
                segments,
                mode: slide.mode,
                hints: slide.hints,
                reverse,
                thumbnail,
                notes: slide.notes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Presentation {
        name: name.to_string(),
        slides,
        settings: deck.settings,
    })
}

// ---------------------------------------------------------------------------
// Playlists
// ---------------------------------------------------------------------------

/// A file sequencing several presentations:
/// `{"root": "slides", "sequence": ["Intro", "Body"]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    pub sequence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_FOLDER)
}

impl Playlist {
    pub fn load(path: &Path) -> Result<Self> {
        let Some(bytes) = read_descriptor(path)? else {
            return Err(DeckError::UnknownPresentation {
                name: playlist_stem(path),
                path: path.to_path_buf(),
            });
        };
        let playlist: Playlist =
            serde_json::from_slice(&bytes).map_err(|e| DeckError::corrupt(path, e.to_string()))?;
        if playlist.sequence.is_empty() {
            return Err(DeckError::corrupt(path, "playlist sequence is empty"));
        }
        Ok(playlist)
    }

    /// Resolver rooted where the playlist points, relative to the playlist file.
    pub fn resolver(&self, playlist_path: &Path) -> Resolver {
        let base = playlist_path.parent().unwrap_or(Path::new("."));
        Resolver::new(base.join(&self.root))
    }

    pub fn display_name(&self, playlist_path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| playlist_stem(playlist_path))
    }
}

fn playlist_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("presentation")
        .to_string()
}

/// Load a playlist and resolve it into one presentation.
pub fn resolve_playlist(path: &Path) -> Result<Presentation> {
    let playlist = Playlist::load(path)?;
    playlist
        .resolver(path)
        .resolve_many(&playlist.sequence, &playlist.display_name(path))
}

// ---------------------------------------------------------------------------
// Start position
// ---------------------------------------------------------------------------

/// Where to start presenting: a scene and a slide inside it. Negative values
/// count from the end, so `-1` is the last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartAt {
    pub scene: isize,
    pub slide: isize,
}

impl FromStr for StartAt {
    type Err = String;

    /// Parses `"SCENE,SLIDE"`; either side may be empty, meaning 0.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "expected `SCENE,SLIDE`, got {} value(s) in `{s}`",
                parts.len()
            ));
        }
        let parse = |v: &str| -> std::result::Result<isize, String> {
            let v = v.trim();
            if v.is_empty() {
                Ok(0)
            } else {
                v.parse()
                    .map_err(|_| format!("start index must be an integer, not `{v}`"))
            }
        };
        Ok(StartAt {
            scene: parse(parts[0])?,
            slide: parse(parts[1])?,
        })
    }
}

fn wrap_index(index: isize, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())?
    } else {
        index as usize
    };
    (resolved < len).then_some(resolved)
}

impl StartAt {
    /// Global slide index for scenes of the given lengths, or `None` if out of range.
    pub fn slide_index(&self, scene_lengths: &[usize]) -> Option<usize> {
        let scene = wrap_index(self.scene, scene_lengths.len())?;
        let slide = wrap_index(self.slide, scene_lengths[scene])?;
        Some(scene_lengths[..scene].iter().sum::<usize>() + slide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlideMode;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn demo_folder() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for clip in ["0.mp4", "1.mp4", "1_rev.mp4", "2.mp4"] {
            write(dir.path(), &format!("files/Demo/{clip}"), "clip");
        }
        write(
            dir.path(),
            "Demo.json",
            r#"{
                "name": "Demo",
                "slides": [
                    {"segments": ["files/Demo/0.mp4"], "mode": "once", "title": "Intro"},
                    {"segments": [{"file": "files/Demo/1.mp4", "duration": 2}],
                     "mode": "loop-until-advanced", "reverse": "files/Demo/1_rev.mp4"},
                    {"segments": ["files/Demo/2.mp4"], "notes": "wrap up"}
                ]
            }"#,
        );
        dir
    }

    #[test]
    fn resolves_demo_presentation() {
        let dir = demo_folder();
        let p = Resolver::new(dir.path()).resolve("Demo").unwrap();

        assert_eq!(p.name, "Demo");
        assert_eq!(p.len(), 3);
        assert_eq!(p.slides[0].title.as_deref(), Some("Intro"));
        assert_eq!(p.slides[1].mode, SlideMode::LoopUntilAdvanced);
        assert_eq!(p.slides[1].segments[0].duration, Some(Duration::from_secs(2)));
        assert!(p.slides[1].reverse.is_some());
        assert_eq!(p.slides[2].notes, "wrap up");
    }

    #[test]
    fn resolving_twice_is_deterministic() {
        let dir = demo_folder();
        let resolver = Resolver::new(dir.path());
        assert_eq!(resolver.resolve("Demo").unwrap(), resolver.resolve("Demo").unwrap());
    }

    #[test]
    fn unknown_and_invalid_names() {
        let dir = demo_folder();
        let resolver = Resolver::new(dir.path());

        for name in ["Nope", "", "../Demo", ".hidden"] {
            let err = resolver.resolve(name).unwrap_err();
            assert!(
                matches!(err, DeckError::UnknownPresentation { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn missing_asset_is_broken_not_skipped() {
        let dir = demo_folder();
        fs::remove_file(dir.path().join("files/Demo/2.mp4")).unwrap();

        let err = Resolver::new(dir.path()).resolve("Demo").unwrap_err();
        assert!(matches!(err, DeckError::BrokenAsset { .. }), "{err}");
    }

    #[test]
    fn structural_problems_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.mp4", "clip");
        let cases = [
            ("Syntax", "{ not json"),
            ("Empty", r#"{"slides": []}"#),
            ("NoSegments", r#"{"slides": [{"segments": []}]}"#),
            ("Version", r#"{"version": 9, "slides": [{"segments": ["a.mp4"]}]}"#),
            ("Named", r#"{"name": "Other", "slides": [{"segments": ["a.mp4"]}]}"#),
            ("Skip", r#"{"slides": [{"segments": ["a.mp4"], "skip_to": 4}]}"#),
            ("Escape", r#"{"slides": [{"segments": ["../a.mp4"]}]}"#),
            ("Duration", r#"{"slides": [{"segments": [{"file": "a.mp4", "duration": -1}]}]}"#),
            ("Huge", r#"{"slides": [{"segments": [{"file": "a.mp4", "duration": 1e30}]}]}"#),
        ];
        for (name, json) in cases {
            write(dir.path(), &format!("{name}.json"), json);
        }
        fs::write(dir.path().join("Binary.json"), b"{\"slides\": [\xff]}").unwrap();
        fs::create_dir(dir.path().join("Folder.json")).unwrap();

        let resolver = Resolver::new(dir.path());
        let names = cases.iter().map(|(name, _)| *name).chain(["Binary", "Folder"]);
        for name in names {
            let err = resolver.resolve(name).unwrap_err();
            assert!(err.is_resolution_error(), "{name}: {err}");
            assert!(
                matches!(err, DeckError::CorruptDescriptor { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn list_skips_invalid_descriptors() {
        let dir = demo_folder();
        write(dir.path(), "Broken.json", "{}");
        write(dir.path(), "readme.txt", "not a deck");

        let names = Resolver::new(dir.path()).list().unwrap();
        assert_eq!(names, vec!["Demo".to_string()]);
    }

    #[test]
    fn playlist_concatenates_scenes() {
        let dir = demo_folder();
        write(
            dir.path(),
            "talk.json",
            r#"{"root": ".", "sequence": ["Demo", "Demo"], "name": "Talk"}"#,
        );

        let p = resolve_playlist(&dir.path().join("talk.json")).unwrap();
        assert_eq!(p.name, "Talk");
        assert_eq!(p.len(), 6);
    }

    #[test]
    fn start_at_parses_and_wraps() {
        let at: StartAt = "1,-1".parse().unwrap();
        assert_eq!(at, StartAt { scene: 1, slide: -1 });
        assert_eq!(at.slide_index(&[3, 4]), Some(6));

        let at: StartAt = ",".parse().unwrap();
        assert_eq!(at.slide_index(&[3]), Some(0));

        assert_eq!(StartAt { scene: -1, slide: 0 }.slide_index(&[3, 4]), Some(3));
        assert_eq!(StartAt { scene: 2, slide: 0 }.slide_index(&[3, 4]), None);
        assert_eq!(StartAt { scene: 0, slide: -4 }.slide_index(&[3]), None);
        assert!("1".parse::<StartAt>().is_err());
        assert!("a,b".parse::<StartAt>().is_err());
    }
}
