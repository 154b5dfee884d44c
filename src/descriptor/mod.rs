//! Deck descriptors: locating, parsing and validating the per-presentation
//! metadata written by the rendering step.
//!
//! Resolution is a pure read: nothing here writes to disk, and a presentation
//! is only returned once every asset it names was found.

pub mod resolver;
pub mod source;

pub use resolver::{DEFAULT_FOLDER, Playlist, Resolver, StartAt, resolve_playlist};
pub use source::{SourceDeck, SourceSegment, SourceSlide};
