use std::io::Write;

use crossterm::{queue, style};

use crate::config::KeyBindings;

/// Print a menu item string, bolding any text inside `[...]` brackets.
/// Text outside brackets is printed dim.
pub fn print_menu_item<W: Write>(out: &mut W, item: &str) -> std::io::Result<()> {
    let mut rest = item;
    while !rest.is_empty() {
        let Some(open) = rest.find('[') else {
            queue!(
                out,
                style::SetAttribute(style::Attribute::Dim),
                style::Print(rest),
                style::SetAttribute(style::Attribute::Reset),
            )?;
            break;
        };
        if open > 0 {
            queue!(
                out,
                style::SetAttribute(style::Attribute::Dim),
                style::Print(&rest[..open]),
                style::SetAttribute(style::Attribute::Reset),
            )?;
        }
        rest = &rest[open..];
        let Some(close) = rest.find(']') else {
            queue!(out, style::Print(rest))?;
            break;
        };
        queue!(
            out,
            style::SetAttribute(style::Attribute::Bold),
            style::Print(&rest[..=close]),
            style::SetAttribute(style::Attribute::Reset),
        )?;
        rest = &rest[close + 1..];
    }
    Ok(())
}

/// Short on-screen label for a binding string.
fn key_label(binding: &str) -> String {
    match binding {
        "Right" => "→".into(),
        "Left" => "←".into(),
        "Up" => "↑".into(),
        "Down" => "↓".into(),
        "PageDown" => "PgDn".into(),
        "PageUp" => "PgUp".into(),
        other => other.into(),
    }
}

fn item(bindings: &[String], action: &str) -> Option<String> {
    if bindings.is_empty() {
        return None;
    }
    let keys: String = bindings.iter().map(|b| format!("[{}]", key_label(b))).collect();
    Some(format!("{keys} {action}"))
}

/// Menu items for the presenter, in display order. Actions with no
/// binding are left out.
pub fn presenter_items(keys: &KeyBindings) -> Vec<String> {
    [
        item(&keys.retreat, "prev"),
        item(&keys.advance, "next"),
        Some("[0-9][Enter] jump".to_string()),
        item(&keys.replay, "replay"),
        item(&keys.play_pause, "pause"),
        item(&keys.first, "first"),
        item(&keys.last, "last"),
        item(&keys.quit, "quit"),
        item(&keys.fullscreen, "full"),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_follow_bindings() {
        let mut keys = KeyBindings::default();
        keys.replay.clear();
        let items = presenter_items(&keys);

        assert_eq!(items[0], "[←][PgUp] prev");
        assert_eq!(items[1], "[→][Space][PgDn] next");
        assert!(!items.iter().any(|i| i.ends_with("replay")));
    }

    #[test]
    fn brackets_are_styled_separately() {
        let mut out = Vec::new();
        print_menu_item(&mut out, "[q] quit").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[q]"));
        assert!(text.contains(" quit"));
    }
}
