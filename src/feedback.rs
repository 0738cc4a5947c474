//! Feedback sinks for audio/haptic/UI cues
//!
//! The engine produces no sound itself; it tells a sink when something worth
//! hearing happened. Sinks only see meaningful events, never physics ticks.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::guidance::{GuidanceEvent, RoundPhase};

/// Cue types a host can map to sounds or haptics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Dice thrown / ball released
    Launch,
    /// Guidance engaged
    SettleStart,
    /// Result shown
    Reveal,
    /// Waiting on the network
    Stalled,
}

impl Cue {
    /// Cue for entering a phase, if that phase has one
    pub fn for_phase(phase: RoundPhase) -> Option<Cue> {
        match phase {
            RoundPhase::Launch => Some(Cue::Launch),
            RoundPhase::Settle => Some(Cue::SettleStart),
            RoundPhase::Reveal => Some(Cue::Reveal),
            RoundPhase::Idle | RoundPhase::Cruise => None,
        }
    }
}

/// Receiver of guidance notifications; every method defaults to a no-op
pub trait FeedbackSink<O> {
    fn phase_changed(&mut self, _game_type: &str, _round_id: u64, _from: RoundPhase, _to: RoundPhase) {}

    fn round_complete(&mut self, _game_type: &str, _round_id: u64, _outcome: &O) {}

    fn outcome_stalled(&mut self, _game_type: &str, _round_id: u64) {}

    fn on_event(&mut self, event: &GuidanceEvent<O>) {
        match event {
            GuidanceEvent::PhaseChanged {
                game_type,
                round_id,
                from,
                to,
            } => self.phase_changed(game_type, *round_id, *from, *to),
            GuidanceEvent::RoundComplete {
                game_type,
                round_id,
                outcome,
            } => self.round_complete(game_type, *round_id, outcome),
            GuidanceEvent::OutcomeStalled {
                game_type,
                round_id,
            } => self.outcome_stalled(game_type, *round_id),
        }
    }
}

/// Logs cues instead of playing them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl<O: Debug> FeedbackSink<O> for LogSink {
    fn phase_changed(&mut self, game_type: &str, round_id: u64, from: RoundPhase, to: RoundPhase) {
        match Cue::for_phase(to) {
            Some(cue) => log::info!("[{}] round {}: {:?} -> {:?} ({:?})", game_type, round_id, from, to, cue),
            None => log::debug!("[{}] round {}: {:?} -> {:?}", game_type, round_id, from, to),
        }
    }

    fn round_complete(&mut self, game_type: &str, round_id: u64, outcome: &O) {
        log::info!("[{}] round {} revealed {:?}", game_type, round_id, outcome);
    }

    fn outcome_stalled(&mut self, game_type: &str, round_id: u64) {
        log::warn!("[{}] round {} stalled ({:?})", game_type, round_id, Cue::Stalled);
    }
}

/// Keeps every event for later inspection (replays, tests)
pub struct RecordingSink<O> {
    events: Rc<RefCell<Vec<GuidanceEvent<O>>>>,
}

impl<O> Default for RecordingSink<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> RecordingSink<O> {
    pub fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared view of the recorded events; stays valid after the sink is moved
    pub fn events(&self) -> Rc<RefCell<Vec<GuidanceEvent<O>>>> {
        Rc::clone(&self.events)
    }
}

impl<O: Clone> FeedbackSink<O> for RecordingSink<O> {
    fn on_event(&mut self, event: &GuidanceEvent<O>) {
        self.events.borrow_mut().push(event.clone());
    }
}
