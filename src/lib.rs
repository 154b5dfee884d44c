//! Presenter for pre-rendered slide decks.
//!
//! A deck is a folder of rendered clips plus a JSON descriptor per scene.
//! [`descriptor`] finds and validates decks, [`playback`] decides what is on
//! screen, [`player`] presents in a terminal, and [`converter`] packages a
//! deck as a standalone HTML document.

pub mod assets;
pub mod config;
pub mod converter;
pub mod descriptor;
pub mod error;
pub mod menubar;
pub mod playback;
pub mod player;
pub mod types;

pub use error::{DeckError, Result};
