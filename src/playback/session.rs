//! Session: drives an [`Engine`] against wall-clock media and live input.
//!
//! Two activities race on every step: a completion timer for the current
//! cue and the navigation command channel. `select!` takes whichever is
//! ready first; re-arming the timer after each transition drops the pending
//! auto-advance.

use std::io;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, after, never, select};
use tracing::debug;

use super::{Cue, Engine, Input, NavigationNoOp, Outcome, Phase, State};
use crate::error::Result;
use crate::types::{AssetRef, Presentation};

/// Navigation requests from the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Advance,
    Retreat,
    Jump(usize),
    Replay,
    TogglePause,
    Quit,
}

impl Command {
    fn input(self) -> Option<Input> {
        match self {
            Command::Advance => Some(Input::Advance),
            Command::Retreat => Some(Input::Retreat),
            Command::Jump(i) => Some(Input::Jump(i)),
            Command::Replay => Some(Input::Replay),
            Command::TogglePause | Command::Quit => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub start_index: usize,
    pub start_paused: bool,
    pub exit_after_last_slide: bool,
    /// Media speed multiplier; 2.0 halves every segment's playing time.
    pub playback_rate: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start_index: 0,
            start_paused: false,
            exit_after_last_slide: false,
            playback_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The presenter asked to quit.
    Quit,
    /// The presentation ran out of slides.
    Finished,
    /// The command channel closed.
    Disconnected,
}

/// Snapshot handed to the display after every step.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub presentation: &'a Presentation,
    pub state: State,
    pub cue: Option<Cue>,
    pub asset: Option<&'a AssetRef>,
    pub paused: bool,
    /// Time until the current cue completes, if it ever does.
    pub remaining: Option<Duration>,
    /// Set when the last navigation had nothing to do.
    pub signal: Option<NavigationNoOp>,
}

/// Where a session shows its current state.
pub trait MediaOutput {
    fn show(&mut self, view: &SessionView<'_>) -> io::Result<()>;
}

pub struct Session<'a> {
    presentation: &'a Presentation,
    engine: Engine,
    options: SessionOptions,
    paused: bool,
    /// Playing time left for the current cue.
    remaining: Option<Duration>,
    signal: Option<NavigationNoOp>,
}

impl<'a> Session<'a> {
    pub fn new(presentation: &'a Presentation, options: SessionOptions) -> Self {
        let engine = Engine::with_start(presentation.rules(), options.start_index);
        let mut session = Self {
            presentation,
            engine,
            paused: options.start_paused,
            options,
            remaining: None,
            signal: None,
        };
        session.remaining = session.cue_duration();
        session
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn view(&self) -> SessionView<'a> {
        let cue = self.engine.current_cue();
        SessionView {
            presentation: self.presentation,
            state: self.engine.state(),
            cue,
            asset: cue.and_then(|c| c.asset(self.presentation)),
            paused: self.paused,
            remaining: self.remaining,
            signal: self.signal,
        }
    }

    /// Run until quit, the end of the presentation, or the channel closes.
    pub fn run<O: MediaOutput>(
        &mut self,
        commands: &Receiver<Command>,
        output: &mut O,
    ) -> Result<SessionEnd> {
        debug!(
            presentation = %self.presentation.name,
            slides = self.presentation.len(),
            "starting session"
        );

        loop {
            output.show(&self.view())?;

            let armed_at = Instant::now();
            let timer = match (self.paused, self.remaining) {
                (false, Some(left)) => after(left),
                _ => never(),
            };

            let end = select! {
                recv(commands) -> msg => match msg {
                    Ok(command) => {
                        self.consume_elapsed(armed_at);
                        self.command(command)
                    }
                    Err(_) => Some(SessionEnd::Disconnected),
                },
                recv(timer) -> _ => self.apply(Input::MediaFinished),
            };

            if let Some(end) = end {
                debug!(?end, "session ended");
                return Ok(end);
            }
        }
    }

    fn command(&mut self, command: Command) -> Option<SessionEnd> {
        match command {
            Command::Quit => Some(SessionEnd::Quit),
            Command::TogglePause => {
                self.paused = !self.paused;
                debug!(paused = self.paused, "toggled pause");
                None
            }
            other => other.input().and_then(|input| self.apply(input)),
        }
    }

    /// Feed one input to the engine and re-arm the media timer if the
    /// cue restarted.
    fn apply(&mut self, input: Input) -> Option<SessionEnd> {
        let before = self.engine.current_cue();
        let outcome = self.engine.handle(input);
        let next = self.engine.current_cue();
        debug!(?input, ?outcome, state = ?self.engine.state(), "transition");

        let restarted = matches!(input, Input::Replay | Input::MediaFinished | Input::Jump(_));
        if restarted || before != next {
            self.remaining = self.cue_duration();
        }

        self.signal = match outcome {
            Outcome::NoOp(signal) => Some(signal),
            _ => None,
        };

        match outcome {
            Outcome::Ended => Some(SessionEnd::Finished),
            Outcome::NoOp(NavigationNoOp::EndOfPresentation) if self.options.exit_after_last_slide => {
                Some(SessionEnd::Finished)
            }
            _ if input == Input::MediaFinished
                && self.options.exit_after_last_slide
                && self.holding_last_slide() =>
            {
                Some(SessionEnd::Finished)
            }
            _ => None,
        }
    }

    fn holding_last_slide(&self) -> bool {
        matches!(
            self.engine.state(),
            State::AtSlide { slide, phase: Phase::Holding, .. } if slide + 1 == self.engine.len()
        )
    }

    fn consume_elapsed(&mut self, armed_at: Instant) {
        if self.paused {
            return;
        }
        if let Some(left) = self.remaining.as_mut() {
            *left = left.saturating_sub(armed_at.elapsed());
        }
    }

    fn cue_duration(&self) -> Option<Duration> {
        let cue = self.engine.current_cue().filter(|c| !c.held)?;
        let asset = cue.asset(self.presentation)?;
        let rate = if self.options.playback_rate > 0.0 {
            self.options.playback_rate
        } else {
            1.0
        };
        // A rate slow enough to overflow means the cue never completes.
        let secs = asset.duration?.as_secs_f64() / rate;
        Duration::try_from_secs_f64(secs).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::types::{DeckSettings, MediaKind, NavigationHints, Slide, SlideMode};

    #[derive(Default)]
    struct Recorder {
        slides: Vec<Option<usize>>,
        signals: Vec<Option<NavigationNoOp>>,
    }

    impl MediaOutput for Recorder {
        fn show(&mut self, view: &SessionView<'_>) -> io::Result<()> {
            self.slides.push(match view.state {
                State::AtSlide { slide, .. } => Some(slide),
                State::Ended => None,
            });
            self.signals.push(view.signal);
            Ok(())
        }
    }

    fn presentation(modes: &[SlideMode], duration: Duration) -> Presentation {
        let slides = modes
            .iter()
            .enumerate()
            .map(|(i, &mode)| Slide {
                title: None,
                segments: vec![AssetRef {
                    relative: PathBuf::from(format!("{i}.mp4")),
                    path: PathBuf::from(format!("/media/{i}.mp4")),
                    kind: MediaKind::Video,
                    duration: Some(duration),
                }],
                mode,
                hints: NavigationHints::default(),
                reverse: None,
                thumbnail: None,
                notes: String::new(),
            })
            .collect();
        Presentation {
            name: "Demo".into(),
            slides,
            settings: DeckSettings::default(),
        }
    }

    #[test]
    fn manual_navigation_preempts_long_media() {
        let p = presentation(&[SlideMode::Once; 3], Duration::from_secs(60));
        let (tx, rx) = unbounded();
        tx.send(Command::Advance).unwrap();
        tx.send(Command::Advance).unwrap();
        tx.send(Command::Quit).unwrap();

        let mut out = Recorder::default();
        let end = Session::new(&p, SessionOptions::default())
            .run(&rx, &mut out)
            .unwrap();

        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(out.slides, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn once_slides_auto_advance_to_the_end() {
        let p = presentation(&[SlideMode::Once; 3], Duration::from_millis(5));
        let (_tx, rx) = unbounded();
        let options = SessionOptions {
            exit_after_last_slide: true,
            ..Default::default()
        };

        let mut out = Recorder::default();
        let end = Session::new(&p, options).run(&rx, &mut out).unwrap();

        assert_eq!(end, SessionEnd::Finished);
        assert_eq!(out.slides, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn advancing_past_a_looping_last_slide_finishes() {
        let p = presentation(&[SlideMode::Once, SlideMode::Loop], Duration::from_secs(60));
        let (tx, rx) = unbounded();
        tx.send(Command::Advance).unwrap();
        tx.send(Command::Advance).unwrap();

        let mut out = Recorder::default();
        let end = Session::new(&p, SessionOptions::default())
            .run(&rx, &mut out)
            .unwrap();

        assert_eq!(end, SessionEnd::Finished);
    }

    #[test]
    fn boundary_signals_reach_the_display() {
        let p = presentation(&[SlideMode::Once; 2], Duration::from_secs(60));
        let (tx, rx) = unbounded();
        tx.send(Command::Retreat).unwrap();
        tx.send(Command::Jump(9)).unwrap();
        drop(tx);

        let mut out = Recorder::default();
        let end = Session::new(&p, SessionOptions::default())
            .run(&rx, &mut out)
            .unwrap();

        assert_eq!(end, SessionEnd::Disconnected);
        assert_eq!(
            out.signals,
            vec![
                None,
                Some(NavigationNoOp::StartOfPresentation),
                Some(NavigationNoOp::OutOfRange(9)),
            ]
        );
    }

    #[test]
    fn paused_sessions_do_not_auto_advance() {
        let p = presentation(&[SlideMode::Once; 2], Duration::from_millis(1));
        let (tx, rx) = unbounded();
        let options = SessionOptions {
            start_paused: true,
            ..Default::default()
        };
        let mut session = Session::new(&p, options);

        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            tx.send(Command::Quit).unwrap();
        });
        let mut out = Recorder::default();
        let end = session.run(&rx, &mut out).unwrap();
        worker.join().unwrap();

        assert_eq!(end, SessionEnd::Quit);
        assert_eq!(out.slides, vec![Some(0)]);
    }

    #[test]
    fn playback_rate_scales_remaining_time() {
        let p = presentation(&[SlideMode::Once], Duration::from_secs(4));
        let options = SessionOptions {
            playback_rate: 2.0,
            ..Default::default()
        };
        let session = Session::new(&p, options);
        assert_eq!(session.view().remaining, Some(Duration::from_secs(2)));
    }

    #[test]
    fn extreme_playback_rates_do_not_overflow() {
        let p = presentation(&[SlideMode::Once], Duration::from_secs(2));

        let crawl = SessionOptions {
            playback_rate: 1e-20,
            ..Default::default()
        };
        assert_eq!(Session::new(&p, crawl).view().remaining, None);

        let invalid = SessionOptions {
            playback_rate: f64::NAN,
            ..Default::default()
        };
        assert_eq!(
            Session::new(&p, invalid).view().remaining,
            Some(Duration::from_secs(2))
        );
    }
}
