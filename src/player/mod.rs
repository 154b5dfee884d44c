//! Player — the terminal presenter.
//!
//! Drives a [`Session`] from the keyboard and shows its state on an
//! alternate screen: what slide is up, which clip would be playing, how long
//! until it completes, and the speaker notes. Media decoding is left to
//! whatever shows the assets; the terminal is the presenter's console.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, unbounded};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, queue, style, terminal};
use tracing::debug;

use crate::config::{KeyBindings, PlayerConfig, matches_any};
use crate::menubar::{presenter_items, print_menu_item};
use crate::playback::session::{Command, MediaOutput, Session, SessionEnd, SessionOptions, SessionView};
use crate::playback::{Clip, NavigationNoOp, Phase, State};
use crate::types::{Presentation, Slide};

/// How often the input thread checks whether the session is over.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Player<'a> {
    presentation: &'a Presentation,
    config: PlayerConfig,
    options: SessionOptions,
}

impl<'a> Player<'a> {
    pub fn new(presentation: &'a Presentation, config: PlayerConfig, options: SessionOptions) -> Self {
        Self {
            presentation,
            config,
            options,
        }
    }

    /// Present in the terminal until the presenter quits or the deck ends.
    ///
    /// Sets up the terminal, runs the session, and restores the terminal
    /// on exit (even on error).
    pub fn play(&mut self) -> Result<SessionEnd> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All),
        )?;

        let result = self.run(io::stdout());

        // Always restore terminal state.
        let _ = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();

        result
    }

    fn run<W: Write>(&mut self, out: W) -> Result<SessionEnd> {
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let input = {
            let stop = Arc::clone(&stop);
            let keys = self.config.key_bindings.clone();
            let total = self.presentation.len();
            thread::Builder::new()
                .name("presenter-input".into())
                .spawn(move || read_keys(KeyMapper::new(keys, total), tx, &stop))
                .context("Failed to spawn input thread")?
        };

        let mut display = TerminalOutput::new(out, &self.config.key_bindings);
        let mut session = Session::new(self.presentation, self.options.clone());
        let end = session.run(&rx, &mut display);

        stop.store(true, Ordering::Relaxed);
        match input.join() {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("input thread panicked"),
        }
        Ok(end?)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

fn read_keys(mut mapper: KeyMapper, tx: Sender<Command>, stop: &AtomicBool) -> Result<()> {
    let mut fullscreen = false;
    while !stop.load(Ordering::Relaxed) {
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match mapper.map(&key) {
            KeyAction::Command(command) => {
                debug!(?command, "key");
                if tx.send(command).is_err() || command == Command::Quit {
                    break;
                }
            }
            KeyAction::Fullscreen => {
                fullscreen = !fullscreen;
                let mut stdout = io::stdout();
                stdout.write_all(if fullscreen { b"\x1b[10;1t" } else { b"\x1b[10;0t" })?;
                stdout.flush()?;
            }
            KeyAction::Ignored => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Command(Command),
    Fullscreen,
    Ignored,
}

/// Turns key presses into session commands. Digits typed before Enter
/// select a slide by its 1-based number.
struct KeyMapper {
    keys: KeyBindings,
    total: usize,
    typed: String,
}

impl KeyMapper {
    fn new(keys: KeyBindings, total: usize) -> Self {
        Self {
            keys,
            total,
            typed: String::new(),
        }
    }

    fn map(&mut self, key: &KeyEvent) -> KeyAction {
        if let KeyCode::Char(c @ '0'..='9') = key.code {
            if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
                self.typed.push(c);
                return KeyAction::Ignored;
            }
        }
        let typed = std::mem::take(&mut self.typed);
        if key.code == KeyCode::Enter && !typed.is_empty() {
            return match typed.parse::<usize>() {
                Ok(n) if n > 0 => KeyAction::Command(Command::Jump(n - 1)),
                _ => KeyAction::Ignored,
            };
        }

        let keys = &self.keys;
        let command = if matches_any(&keys.quit, key) {
            Command::Quit
        } else if matches_any(&keys.advance, key) {
            Command::Advance
        } else if matches_any(&keys.retreat, key) {
            Command::Retreat
        } else if matches_any(&keys.replay, key) {
            Command::Replay
        } else if matches_any(&keys.play_pause, key) {
            Command::TogglePause
        } else if matches_any(&keys.first, key) {
            Command::Jump(0)
        } else if matches_any(&keys.last, key) {
            Command::Jump(self.total.saturating_sub(1))
        } else if matches_any(&keys.fullscreen, key) {
            return KeyAction::Fullscreen;
        } else {
            return KeyAction::Ignored;
        };
        KeyAction::Command(command)
    }
}

// ---------------------------------------------------------------------------
// Terminal output
// ---------------------------------------------------------------------------

struct TerminalOutput<W> {
    out: W,
    menu: Vec<String>,
}

impl<W: Write> TerminalOutput<W> {
    fn new(out: W, keys: &KeyBindings) -> Self {
        Self {
            out,
            menu: presenter_items(keys),
        }
    }

    fn line(&mut self, row: u16, text: &str) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveTo(0, row),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(text),
        )
    }

    fn render_menubar(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(" "),
        )?;
        for (i, item) in self.menu.iter().enumerate() {
            if i > 0 {
                queue!(self.out, style::Print("  "))?;
            }
            print_menu_item(&mut self.out, item)?;
        }
        Ok(())
    }

    fn render_status(&mut self, row: u16, text: &str) -> io::Result<()> {
        let mut cs = style::ContentStyle::default();
        cs.attributes.set(style::Attribute::Dim);
        queue!(
            self.out,
            cursor::MoveTo(0, row),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::PrintStyledContent(style::StyledContent::new(cs, text)),
        )
    }
}

fn thumbnail_line(slide: &Slide) -> Option<String> {
    let thumb = slide.thumbnail.as_ref()?;
    Some(format!(" thumbnail: {}", thumb.relative.display()))
}

impl<W: Write> MediaOutput for TerminalOutput<W> {
    fn show(&mut self, view: &SessionView<'_>) -> io::Result<()> {
        let (_, term_h) = terminal::size().unwrap_or((80, 24));
        let p = view.presentation;

        queue!(self.out, terminal::Clear(terminal::ClearType::All))?;
        self.render_menubar()?;

        match view.state {
            State::Ended => {
                self.line(2, &format!(" {}: end of presentation", p.name))?;
            }
            State::AtSlide { slide, segment, phase } => {
                let s = &p.slides[slide];
                let title = s.title.as_deref().unwrap_or("");
                self.line(2, &format!(" Slide {}/{}  {title}", slide + 1, p.len()))?;

                let phase = match phase {
                    Phase::Playing => "playing".to_string(),
                    Phase::Releasing => "finishing loop".to_string(),
                    Phase::Reversing { from } => format!("reversing out of slide {}", from + 1),
                    Phase::Holding => "holding last frame".to_string(),
                };
                self.line(3, &format!(" Mode: {}  |  {phase}", s.mode.tag()))?;

                if let (Some(cue), Some(asset)) = (view.cue, view.asset) {
                    let clip = match cue.clip {
                        Clip::Segment(_) => format!("segment {}/{}", segment + 1, s.segments.len()),
                        Clip::Reverse => "reverse clip".to_string(),
                    };
                    self.line(4, &format!(" {clip}: {}", asset.relative.display()))?;
                }

                let timing = match (view.paused, view.remaining) {
                    (true, _) => "paused".to_string(),
                    (false, Some(left)) => format!("{:.1}s left", left.as_secs_f64()),
                    (false, None) => "waiting for navigation".to_string(),
                };
                self.line(5, &format!(" {timing}"))?;

                if let Some(thumb) = thumbnail_line(s) {
                    self.line(6, &thumb)?;
                }

                for (i, note) in s.notes.lines().enumerate() {
                    let row = 7 + i as u16;
                    if row + 1 >= term_h {
                        break;
                    }
                    self.line(row, &format!(" {note}"))?;
                }
            }
        }

        let status = match view.signal {
            Some(NavigationNoOp::EndOfPresentation) => " Already at the last slide".to_string(),
            Some(NavigationNoOp::StartOfPresentation) => " Already at the first slide".to_string(),
            Some(NavigationNoOp::OutOfRange(i)) => {
                format!(" No slide {} (1-{})", i + 1, p.len())
            }
            None => format!(" {}", p.name),
        };
        self.render_status(term_h.saturating_sub(1), &status)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetRef, MediaKind, NavigationHints, SlideMode};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn digits_then_enter_jump_to_a_slide() {
        let mut mapper = KeyMapper::new(KeyBindings::default(), 12);
        assert_eq!(mapper.map(&press(KeyCode::Char('1'))), KeyAction::Ignored);
        assert_eq!(mapper.map(&press(KeyCode::Char('0'))), KeyAction::Ignored);
        assert_eq!(
            mapper.map(&press(KeyCode::Enter)),
            KeyAction::Command(Command::Jump(9))
        );
        assert_eq!(mapper.map(&press(KeyCode::Char('0'))), KeyAction::Ignored);
        assert_eq!(mapper.map(&press(KeyCode::Enter)), KeyAction::Ignored);
    }

    #[test]
    fn other_keys_clear_typed_digits() {
        let mut mapper = KeyMapper::new(KeyBindings::default(), 3);
        mapper.map(&press(KeyCode::Char('2')));
        assert_eq!(
            mapper.map(&press(KeyCode::Right)),
            KeyAction::Command(Command::Advance)
        );
        assert_eq!(mapper.map(&press(KeyCode::Enter)), KeyAction::Ignored);
    }

    #[test]
    fn thumbnail_is_listed_when_present() {
        let image = AssetRef {
            relative: "files/Demo/thumb.png".into(),
            path: "/decks/files/Demo/thumb.png".into(),
            kind: MediaKind::Image,
            duration: None,
        };
        let mut slide = Slide {
            title: None,
            segments: vec![image.clone()],
            mode: SlideMode::Once,
            hints: NavigationHints::default(),
            reverse: None,
            thumbnail: None,
            notes: String::new(),
        };
        assert_eq!(thumbnail_line(&slide), None);

        slide.thumbnail = Some(image);
        assert_eq!(
            thumbnail_line(&slide).as_deref(),
            Some(" thumbnail: files/Demo/thumb.png")
        );
    }

    #[test]
    fn bindings_map_to_commands() {
        let mut mapper = KeyMapper::new(KeyBindings::default(), 3);
        let cases = [
            (KeyCode::PageUp, KeyAction::Command(Command::Retreat)),
            (KeyCode::Char(' '), KeyAction::Command(Command::Advance)),
            (KeyCode::Char('r'), KeyAction::Command(Command::Replay)),
            (KeyCode::Char('p'), KeyAction::Command(Command::TogglePause)),
            (KeyCode::Home, KeyAction::Command(Command::Jump(0))),
            (KeyCode::End, KeyAction::Command(Command::Jump(2))),
            (KeyCode::F(11), KeyAction::Fullscreen),
            (KeyCode::Esc, KeyAction::Command(Command::Quit)),
            (KeyCode::Char('z'), KeyAction::Ignored),
        ];
        for (code, expected) in cases {
            assert_eq!(mapper.map(&press(code)), expected, "{code:?}");
        }
    }
}
