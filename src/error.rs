use std::path::PathBuf;

/// Result alias carrying [`DeckError`].
pub type Result<T> = std::result::Result<T, DeckError>;

/// Failures surfaced by resolution and conversion.
///
/// Navigation boundaries are not errors; see
/// [`NavigationNoOp`](crate::playback::NavigationNoOp).
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// No descriptor exists for the requested name in the search path.
    #[error("unknown presentation `{name}` (looked for {})", .path.display())]
    UnknownPresentation { name: String, path: PathBuf },

    /// A descriptor references media that is missing or unusable on disk.
    #[error("broken asset `{}` in presentation `{presentation}`: {reason}", .path.display())]
    BrokenAsset {
        presentation: String,
        path: PathBuf,
        reason: String,
    },

    /// The descriptor exists but is structurally invalid.
    #[error("corrupt descriptor {}: {reason}", .path.display())]
    CorruptDescriptor { path: PathBuf, reason: String },

    /// The converter cannot write to the requested destination.
    #[error("cannot write {}: {source}", .path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Conversion failed midway; nothing was published at the destination.
    #[error("conversion to {} aborted: {reason}", .path.display())]
    PartialConversionAborted { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DeckError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptDescriptor {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn broken(
        presentation: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::BrokenAsset {
            presentation: presentation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the three resolution failures.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPresentation { .. } | Self::BrokenAsset { .. } | Self::CorruptDescriptor { .. }
        )
    }
}
