use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Presenter settings read from `config.json`.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub key_bindings: KeyBindings,
    pub playback_rate: f64,
    pub exit_after_last_slide: bool,
    pub start_paused: bool,
}

/// Each action accepts any of several binding strings, e.g. `"Right"`,
/// `"Ctrl-q"`, `"F11"` or a single character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub advance: Vec<String>,
    pub retreat: Vec<String>,
    pub replay: Vec<String>,
    pub play_pause: Vec<String>,
    pub first: Vec<String>,
    pub last: Vec<String>,
    pub fullscreen: Vec<String>,
    pub quit: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            advance: keys(&["Right", "Space", "PageDown"]),
            retreat: keys(&["Left", "PageUp"]),
            replay: keys(&["r"]),
            play_pause: keys(&["p"]),
            first: keys(&["Home"]),
            last: keys(&["End"]),
            fullscreen: keys(&["F11", "f"]),
            quit: keys(&["q", "Esc", "Ctrl-c"]),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            key_bindings: KeyBindings::default(),
            playback_rate: 1.0,
            exit_after_last_slide: false,
            start_paused: false,
        }
    }
}

impl PlayerConfig {
    /// Read the config at `path`, or at the per-user location when `None`.
    ///
    /// An explicit path must be readable. A missing per-user file, or a file
    /// that does not parse, yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no player config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        match serde_json::from_str::<Self>(&json) {
            Ok(config) if config.playback_rate > 0.0 && config.playback_rate.is_finite() => {
                Ok(config)
            }
            Ok(config) => {
                warn!(
                    path = %path.display(),
                    rate = config.playback_rate,
                    "playback rate must be positive, using 1.0"
                );
                Ok(Self {
                    playback_rate: 1.0,
                    ..config
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid player config, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("deck-presenter").join("config.json"))
    }
}

/// True if `event` matches any of `bindings`.
pub fn matches_any(bindings: &[String], event: &KeyEvent) -> bool {
    bindings.iter().any(|b| matches_binding(b, event))
}

/// Check whether a crossterm `KeyEvent` matches a binding string from config.
pub fn matches_binding(binding: &str, event: &KeyEvent) -> bool {
    if let Some(rest) = binding.strip_prefix("Alt-") {
        return event.modifiers.contains(KeyModifiers::ALT) && matches_key(rest, event.code);
    }
    if let Some(rest) = binding.strip_prefix("Ctrl-") {
        return event.modifiers.contains(KeyModifiers::CONTROL) && matches_key(rest, event.code);
    }

    // Plain bindings never fire while Ctrl or Alt is held.
    if event
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return false;
    }
    matches_key(binding, event.code)
}

fn matches_key(name: &str, code: KeyCode) -> bool {
    match name {
        "Right" => code == KeyCode::Right,
        "Left" => code == KeyCode::Left,
        "Up" => code == KeyCode::Up,
        "Down" => code == KeyCode::Down,
        "Enter" => code == KeyCode::Enter,
        "Esc" => code == KeyCode::Esc,
        "Space" => code == KeyCode::Char(' '),
        "Tab" => code == KeyCode::Tab,
        "Backspace" => code == KeyCode::Backspace,
        "Home" => code == KeyCode::Home,
        "End" => code == KeyCode::End,
        "PageUp" => code == KeyCode::PageUp,
        "PageDown" => code == KeyCode::PageDown,
        s => {
            if let Some(n) = s.strip_prefix('F').and_then(|rest| rest.parse::<u8>().ok()) {
                return code == KeyCode::F(n);
            }
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                // Letters match either case so Shift does not disable them.
                (Some(c), None) => match code {
                    KeyCode::Char(k) => k == c || k.to_ascii_lowercase() == c,
                    _ => false,
                },
                _ => false,
            }
        }
    }
}
