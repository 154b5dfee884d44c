//! Asset store: locates and validates rendered media for one presentation.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{DeckError, Result};
use crate::types::{AssetRef, MediaKind};

const VIDEO_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("webm", "video/webm"),
    ("ogv", "video/ogg"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
];

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Classify a media file by its extension.
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let ext = extension(path)?;
    if VIDEO_EXTENSIONS.iter().any(|(e, _)| *e == ext) {
        Some(MediaKind::Video)
    } else if IMAGE_EXTENSIONS.iter().any(|(e, _)| *e == ext) {
        Some(MediaKind::Image)
    } else {
        None
    }
}

/// MIME type used when inlining a file as a `data:` URI.
pub fn mime_type(path: &Path) -> &'static str {
    let Some(ext) = extension(path) else {
        return "application/octet-stream";
    };
    VIDEO_EXTENSIONS
        .iter()
        .chain(IMAGE_EXTENSIONS)
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

/// Descriptor paths must stay relative and must not climb out of the root.
pub fn is_contained(relative: &Path) -> bool {
    !relative.as_os_str().is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Read-only view over the media folder of a single presentation.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    presentation: String,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, presentation: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            presentation: presentation.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a descriptor-relative path into a validated [`AssetRef`].
    ///
    /// Missing, non-regular, unreadable, empty and unrecognised files all
    /// fail with [`DeckError::BrokenAsset`].
    pub fn resolve(&self, relative: &Path, duration: Option<Duration>) -> Result<AssetRef> {
        let path = self.root.join(relative);
        let broken = |reason: String| DeckError::broken(&self.presentation, &path, reason);

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(broken("file not found".into()));
            }
            Err(e) => return Err(broken(format!("cannot stat file: {e}"))),
        };
        if !meta.is_file() {
            return Err(broken("not a regular file".into()));
        }
        if meta.len() == 0 {
            return Err(broken("file is empty".into()));
        }
        File::open(&path).map_err(|e| broken(format!("unreadable: {e}")))?;

        let kind = media_kind(&path).ok_or_else(|| broken("unrecognised media type".into()))?;

        Ok(AssetRef {
            relative: relative.to_path_buf(),
            path,
            kind,
            duration,
        })
    }

    /// Re-check an already resolved asset and load its bytes.
    pub fn read(&self, asset: &AssetRef) -> Result<Vec<u8>> {
        fs::read(&asset.path)
            .map_err(|e| DeckError::broken(&self.presentation, &asset.path, format!("unreadable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, AssetStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, bytes) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, bytes).unwrap();
        }
        let store = AssetStore::new(dir.path(), "Demo");
        (dir, store)
    }

    #[test]
    fn resolves_existing_media() {
        let (_dir, store) = store_with(&[("clips/intro.mp4", b"mp4")]);
        let asset = store
            .resolve(Path::new("clips/intro.mp4"), Some(Duration::from_secs(2)))
            .unwrap();

        assert_eq!(asset.kind, MediaKind::Video);
        assert_eq!(asset.relative, PathBuf::from("clips/intro.mp4"));
        assert!(asset.path.ends_with("clips/intro.mp4"));
        assert_eq!(asset.duration, Some(Duration::from_secs(2)));
    }

    #[test]
    fn missing_file_is_a_broken_asset() {
        let (_dir, store) = store_with(&[]);
        let err = store.resolve(Path::new("gone.mp4"), None).unwrap_err();

        assert!(matches!(err, DeckError::BrokenAsset { .. }));
        assert!(format!("{err}").contains("gone.mp4"));
    }

    #[test]
    fn empty_and_unknown_files_are_broken_assets() {
        let (_dir, store) = store_with(&[("empty.mp4", b""), ("notes.txt", b"hello")]);

        let empty = store.resolve(Path::new("empty.mp4"), None).unwrap_err();
        assert!(format!("{empty}").contains("empty"));

        let unknown = store.resolve(Path::new("notes.txt"), None).unwrap_err();
        assert!(format!("{unknown}").contains("unrecognised"));
    }

    #[test]
    fn directories_are_not_assets() {
        let (dir, store) = store_with(&[]);
        fs::create_dir(dir.path().join("folder.mp4")).unwrap();

        let err = store.resolve(Path::new("folder.mp4"), None).unwrap_err();
        assert!(format!("{err}").contains("not a regular file"));
    }

    #[test]
    fn containment_rejects_escapes() {
        assert!(is_contained(Path::new("files/Demo/a.mp4")));
        assert!(!is_contained(Path::new("../a.mp4")));
        assert!(!is_contained(Path::new("/abs/a.mp4")));
        assert!(!is_contained(Path::new("")));
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type(Path::new("a.MP4")), "video/mp4");
        assert_eq!(mime_type(Path::new("a.png")), "image/png");
        assert_eq!(mime_type(Path::new("a.bin")), "application/octet-stream");
    }
}
