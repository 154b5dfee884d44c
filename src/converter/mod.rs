//! Presentation → self-contained HTML conversion.
//!
//! A conversion writes `<out>.html` plus, for co-located placement, an
//! `<out>_assets/` folder holding exactly the media the deck references.
//! Everything is staged next to the destination first; nothing at the
//! destination changes until every asset has been read and copied.

pub mod artifact;
pub mod html;

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

pub use artifact::{ArtifactDeck, load};

use crate::assets;
use crate::error::{DeckError, Result};
use crate::types::{AssetRef, Presentation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetPlacement {
    /// Copy media into `<basename>_assets/` beside the document.
    #[default]
    CoLocated,
    /// Inline media as base64 `data:` URIs.
    Embedded,
}

/// What a successful conversion produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub document: PathBuf,
    pub asset_dir: Option<PathBuf>,
    /// Distinct media files written or embedded.
    pub assets: usize,
    pub bytes: u64,
}

/// Name of the co-located media folder for the document at `output`. The
/// stem is made URL-safe since the document links into the folder.
fn asset_dir_name(output: &Path) -> String {
    let stem = output
        .file_stem()
        .map(|s| url_safe(&s.to_string_lossy()))
        .unwrap_or_default();
    format!("{stem}_assets")
}

/// Folder holding co-located media for the document at `output`.
pub fn asset_dir_for(output: &Path) -> PathBuf {
    output.with_file_name(asset_dir_name(output))
}

#[derive(Debug, Clone, Default)]
pub struct Converter {
    placement: AssetPlacement,
}

impl Converter {
    pub fn new(placement: AssetPlacement) -> Self {
        Self { placement }
    }

    pub fn placement(&self) -> AssetPlacement {
        self.placement
    }

    pub fn convert(&self, presentation: &Presentation, output: &Path) -> Result<ConversionReport> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.is_dir() {
            return Err(DeckError::OutputNotWritable {
                path: parent,
                source: io::Error::new(io::ErrorKind::NotFound, "destination folder does not exist"),
            });
        }
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DeckError::OutputNotWritable {
                path: output.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "output has no file name"),
            })?;

        verify(presentation)?;
        let dir_name = asset_dir_name(output);
        let asset_dir = asset_dir_for(output);

        let aborted = |reason: String| DeckError::PartialConversionAborted {
            path: output.to_path_buf(),
            reason,
        };

        // Stage media.
        let mut staging = match self.placement {
            AssetPlacement::CoLocated => Some(
                tempfile::Builder::new()
                    .prefix(&format!(".{dir_name}."))
                    .tempdir_in(&parent)
                    .map_err(|source| DeckError::OutputNotWritable {
                        path: parent.clone(),
                        source,
                    })?,
            ),
            AssetPlacement::Embedded => None,
        };

        let mut placed: HashMap<PathBuf, String> = HashMap::new();
        let mut used_names = HashSet::new();
        let mut bytes = 0u64;

        let deck = ArtifactDeck::build(presentation, |asset: &AssetRef| {
            if let Some(src) = placed.get(&asset.path) {
                return Ok(src.clone());
            }
            let src = match &staging {
                Some(dir) => {
                    let name = unique_name(&asset.relative, &mut used_names);
                    bytes += copy_asset(presentation, asset, &dir.path().join(&name))
                        .map_err(|e| match e {
                            StageError::Source(e) => e,
                            StageError::Write(e) => aborted(format!("staging {name}: {e}")),
                        })?;
                    format!("{dir_name}/{name}")
                }
                None => {
                    let data = fs::read(&asset.path).map_err(|e| {
                        DeckError::broken(&presentation.name, &asset.path, format!("unreadable: {e}"))
                    })?;
                    bytes += data.len() as u64;
                    format!(
                        "data:{};base64,{}",
                        assets::mime_type(&asset.path),
                        STANDARD.encode(&data)
                    )
                }
            };
            debug!(asset = %asset.relative.display(), %src, "placed asset");
            placed.insert(asset.path.clone(), src.clone());
            Ok(src)
        })?;

        // Stage the document.
        let document_html = html::render(&deck)?;
        let mut document = tempfile::Builder::new()
            .prefix(&format!(".{stem}."))
            .suffix(".html")
            .tempfile_in(&parent)
            .map_err(|source| DeckError::OutputNotWritable {
                path: parent.clone(),
                source,
            })?;
        document
            .write_all(document_html.as_bytes())
            .and_then(|()| document.flush())
            .map_err(|e| aborted(format!("staging document: {e}")))?;

        // Swap in: assets first, so the published document never points at
        // a folder that is not there yet. The previous folder stays parked
        // until the document is in place and goes back if anything fails.
        let backup = tempfile::Builder::new()
            .prefix(&format!(".{dir_name}.previous."))
            .tempdir_in(&parent)
            .map_err(|source| DeckError::OutputNotWritable {
                path: parent.clone(),
                source,
            })?;
        let parked = backup.path().join("assets");
        let had_previous = asset_dir.exists();
        if had_previous {
            fs::rename(&asset_dir, &parked)
                .map_err(|e| aborted(format!("moving aside {}: {e}", asset_dir.display())))?;
        }

        let mut published_dir = None;
        let swapped = match staging.take() {
            Some(dir) => fs::rename(dir.path(), &asset_dir)
                .map_err(|e| format!("publishing {}: {e}", asset_dir.display())),
            None => Ok(()),
        }
        .and_then(|()| {
            if self.placement == AssetPlacement::CoLocated {
                published_dir = Some(asset_dir.clone());
            }
            document
                .persist(output)
                .map(drop)
                .map_err(|e| format!("publishing document: {}", e.error))
        });

        if let Err(reason) = swapped {
            if published_dir.is_some() {
                let _ = fs::remove_dir_all(&asset_dir);
            }
            if had_previous {
                if let Err(e) = fs::rename(&parked, &asset_dir) {
                    let kept = backup.keep();
                    warn!(previous = %kept.display(), error = %e, "could not restore previous assets");
                    return Err(aborted(format!(
                        "{reason}; previous assets kept in {}",
                        kept.display()
                    )));
                }
            }
            return Err(aborted(reason));
        }

        let report = ConversionReport {
            document: output.to_path_buf(),
            asset_dir: published_dir,
            assets: placed.len(),
            bytes,
        };
        info!(
            presentation = %presentation.name,
            document = %report.document.display(),
            assets = report.assets,
            bytes = report.bytes,
            "converted presentation"
        );
        Ok(report)
    }
}

/// Re-check every asset before anything is staged.
fn verify(presentation: &Presentation) -> Result<()> {
    for asset in presentation.assets() {
        let broken = |reason: &str| DeckError::broken(&presentation.name, &asset.path, reason);
        match fs::metadata(&asset.path) {
            Ok(meta) if !meta.is_file() => return Err(broken("not a regular file")),
            Ok(meta) if meta.len() == 0 => return Err(broken("file is empty")),
            Ok(_) => {}
            Err(e) => return Err(broken(&format!("no longer readable: {e}"))),
        }
    }
    Ok(())
}

enum StageError {
    Source(DeckError),
    Write(io::Error),
}

fn copy_asset(
    presentation: &Presentation,
    asset: &AssetRef,
    dest: &Path,
) -> std::result::Result<u64, StageError> {
    let mut source = File::open(&asset.path).map_err(|e| {
        StageError::Source(DeckError::broken(
            &presentation.name,
            &asset.path,
            format!("unreadable: {e}"),
        ))
    })?;
    let mut target = File::create(dest).map_err(StageError::Write)?;
    let copied = io::copy(&mut source, &mut target).map_err(StageError::Write)?;
    target.sync_all().map_err(StageError::Write)?;
    Ok(copied)
}

/// `name` with everything outside `[A-Za-z0-9._-]` replaced by `_`.
fn url_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name safe for a URL path segment, unique within one conversion.
fn unique_name(relative: &Path, used: &mut HashSet<String>) -> String {
    let raw = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut clean = url_safe(&raw);
    if clean.is_empty() || clean.starts_with('.') {
        clean.insert_str(0, "asset");
    }

    let (base, ext) = match clean.rfind('.') {
        Some(i) if i > 0 => clean.split_at(i),
        _ => (clean.as_str(), ""),
    };
    let mut candidate = clean.clone();
    let mut n = 1;
    while !used.insert(candidate.clone()) {
        candidate = format!("{base}-{n}{ext}");
        n += 1;
    }
    candidate
}
