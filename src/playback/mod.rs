//! Playback engine — the navigation state machine.
//!
//! Consumes `SlideRules` and a stream of `Input`s and tracks which slide,
//! which segment and which phase the presentation is in. The engine knows
//! nothing about clocks, terminals or files: media completion arrives as an
//! input like any key press, so every transition is deterministic.
//!
//! Looping slides are exempt from the advance/retreat round trip: the first
//! `advance` on a `loop-until-advanced` slide only releases the loop.

pub mod session;

use crate::types::{AssetRef, Presentation, SlideMode, SlideRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Advance,
    Retreat,
    Jump(usize),
    Replay,
    /// The media for the current cue played to its end.
    MediaFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Playing,
    /// A `loop-until-advanced` slide was advanced; the running iteration
    /// finishes before the slide moves on.
    Releasing,
    /// Playing the reverse clip of slide `from` on the way back.
    Reversing { from: usize },
    /// Showing the last frame, waiting for navigation.
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AtSlide {
        slide: usize,
        segment: usize,
        phase: Phase,
    },
    /// The presenter advanced past a looping last slide.
    Ended,
}

/// Navigation that had nothing to do. Callers use it to decide whether to
/// end the session; it is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationNoOp {
    EndOfPresentation,
    StartOfPresentation,
    OutOfRange(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Moved { from: Option<usize>, to: usize },
    Stayed,
    Ended,
    NoOp(NavigationNoOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clip {
    Segment(usize),
    Reverse,
}

/// What should be on screen right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    /// Slide owning the clip (the departing slide while reversing).
    pub slide: usize,
    pub clip: Clip,
    /// Frozen on the last frame; no completion is expected.
    pub held: bool,
}

impl Cue {
    pub fn asset<'a>(&self, presentation: &'a Presentation) -> Option<&'a AssetRef> {
        let slide = presentation.slides.get(self.slide)?;
        match self.clip {
            Clip::Segment(i) => slide.segments.get(i),
            Clip::Reverse => slide.reverse.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    rules: Vec<SlideRules>,
    state: State,
}

impl Engine {
    pub fn new(rules: Vec<SlideRules>) -> Self {
        Self::with_start(rules, 0)
    }

    /// Start at `index`, clamped to the last slide.
    pub fn with_start(rules: Vec<SlideRules>, index: usize) -> Self {
        let state = if rules.is_empty() {
            State::Ended
        } else {
            State::AtSlide {
                slide: index.min(rules.len() - 1),
                segment: 0,
                phase: Phase::Playing,
            }
        };
        Self { rules, state }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_ended(&self) -> bool {
        self.state == State::Ended
    }

    pub fn slide_index(&self) -> Option<usize> {
        match self.state {
            State::AtSlide { slide, .. } => Some(slide),
            State::Ended => None,
        }
    }

    pub fn current_cue(&self) -> Option<Cue> {
        match self.state {
            State::Ended => None,
            State::AtSlide { slide, segment, phase } => Some(match phase {
                Phase::Playing | Phase::Releasing => Cue {
                    slide,
                    clip: Clip::Segment(segment),
                    held: false,
                },
                Phase::Reversing { from } => Cue {
                    slide: from,
                    clip: Clip::Reverse,
                    held: false,
                },
                Phase::Holding => Cue {
                    slide,
                    clip: Clip::Segment(segment),
                    held: true,
                },
            }),
        }
    }

    pub fn handle(&mut self, input: Input) -> Outcome {
        match input {
            Input::Advance => self.advance(),
            Input::Retreat => self.retreat(),
            Input::Jump(index) => self.jump(index),
            Input::Replay => self.replay(),
            Input::MediaFinished => self.media_finished(),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn advance(&mut self) -> Outcome {
        let State::AtSlide { slide, segment, phase } = self.state else {
            return Outcome::NoOp(NavigationNoOp::EndOfPresentation);
        };
        let rules = &self.rules[slide];

        if rules.mode == SlideMode::LoopUntilAdvanced && phase == Phase::Playing {
            self.state = State::AtSlide {
                slide,
                segment,
                phase: Phase::Releasing,
            };
            return Outcome::Stayed;
        }

        let skip_to = rules.hints.skip_to;
        let still_looping =
            rules.mode.loops() && matches!(phase, Phase::Playing | Phase::Releasing);

        if let Some(target) = skip_to {
            return self.enter(target);
        }
        if slide + 1 < self.rules.len() {
            return self.enter(slide + 1);
        }

        if still_looping {
            self.state = State::Ended;
            Outcome::Ended
        } else {
            Outcome::NoOp(NavigationNoOp::EndOfPresentation)
        }
    }

    fn retreat(&mut self) -> Outcome {
        let slide = match self.state {
            State::Ended => {
                let Some(last) = self.rules.len().checked_sub(1) else {
                    return Outcome::NoOp(NavigationNoOp::StartOfPresentation);
                };
                self.settle(last);
                return Outcome::Moved { from: None, to: last };
            }
            State::AtSlide {
                slide,
                phase: Phase::Reversing { .. },
                ..
            } => {
                self.settle(slide);
                return Outcome::Stayed;
            }
            State::AtSlide { slide, .. } => slide,
        };
        let rules = &self.rules[slide];

        let target = match rules.hints.reverse_to {
            Some(target) => target,
            None if slide == 0 => return Outcome::NoOp(NavigationNoOp::StartOfPresentation),
            None => slide - 1,
        };

        if rules.reversible {
            self.state = State::AtSlide {
                slide: target,
                segment: 0,
                phase: Phase::Reversing { from: slide },
            };
        } else {
            self.settle(target);
        }
        Outcome::Moved {
            from: Some(slide),
            to: target,
        }
    }

    fn jump(&mut self, index: usize) -> Outcome {
        if index >= self.rules.len() {
            return Outcome::NoOp(NavigationNoOp::OutOfRange(index));
        }
        self.enter(index)
    }

    fn replay(&mut self) -> Outcome {
        match self.state {
            State::Ended => match self.rules.len().checked_sub(1) {
                Some(last) => self.enter(last),
                None => Outcome::NoOp(NavigationNoOp::EndOfPresentation),
            },
            State::AtSlide { slide, .. } => {
                self.state = State::AtSlide {
                    slide,
                    segment: 0,
                    phase: Phase::Playing,
                };
                Outcome::Stayed
            }
        }
    }

    fn media_finished(&mut self) -> Outcome {
        let State::AtSlide { slide, segment, phase } = self.state else {
            return Outcome::Stayed;
        };
        let rules = &self.rules[slide];

        match phase {
            Phase::Holding => Outcome::Stayed,
            Phase::Reversing { .. } => {
                self.settle(slide);
                Outcome::Stayed
            }
            Phase::Playing | Phase::Releasing if segment + 1 < rules.segments => {
                self.state = State::AtSlide {
                    slide,
                    segment: segment + 1,
                    phase,
                };
                Outcome::Stayed
            }
            Phase::Playing | Phase::Releasing => match (rules.mode, phase) {
                (SlideMode::Loop, _) | (SlideMode::LoopUntilAdvanced, Phase::Playing) => {
                    self.state = State::AtSlide {
                        slide,
                        segment: 0,
                        phase,
                    };
                    Outcome::Stayed
                }
                _ => self.finish(slide),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn enter(&mut self, slide: usize) -> Outcome {
        let from = self.slide_index();
        self.state = State::AtSlide {
            slide,
            segment: 0,
            phase: Phase::Playing,
        };
        Outcome::Moved { from, to: slide }
    }

    /// Arrive at a slide from behind: `once` slides show their end state,
    /// looping slides start looping.
    fn settle(&mut self, slide: usize) {
        let rules = &self.rules[slide];
        self.state = if rules.mode.loops() {
            State::AtSlide {
                slide,
                segment: 0,
                phase: Phase::Playing,
            }
        } else {
            State::AtSlide {
                slide,
                segment: rules.segments.saturating_sub(1),
                phase: Phase::Holding,
            }
        };
    }

    /// The slide's media ran out.
    fn finish(&mut self, slide: usize) -> Outcome {
        let rules = &self.rules[slide];
        let hold = State::AtSlide {
            slide,
            segment: rules.segments.saturating_sub(1),
            phase: Phase::Holding,
        };

        let (pause_at_end, skip_to) = (rules.hints.pause_at_end, rules.hints.skip_to);

        if pause_at_end {
            self.state = hold;
            return Outcome::Stayed;
        }
        match skip_to {
            Some(target) => self.enter(target),
            None if slide + 1 < self.rules.len() => self.enter(slide + 1),
            None => {
                self.state = hold;
                Outcome::Stayed
            }
        }
    }
}
