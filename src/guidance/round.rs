//! Round state machine
//!
//! One `GuidedRound` per game-type slot. Fields are private: the store is the
//! only writer, through the `pub(crate)` transitions below. Every transition
//! returns `Err(Rejected)` with the round left untouched when the request
//! breaks the phase contract.

use std::fmt::Debug;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::GameProfile;
use crate::error::Rejected;

/// Lifecycle phase of a guided round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Slot free for the next round
    #[default]
    Idle,
    /// Launch impulse pending
    Launch,
    /// Free-running physics, no guidance
    Cruise,
    /// Outcome known (or stalled); attractor active
    Settle,
    /// Converged, outcome displayed
    Reveal,
}

impl RoundPhase {
    fn rank(self) -> u8 {
        match self {
            RoundPhase::Idle => 0,
            RoundPhase::Launch => 1,
            RoundPhase::Cruise => 2,
            RoundPhase::Settle => 3,
            RoundPhase::Reveal => 4,
        }
    }

    /// Phases during which the round is animating
    pub fn is_active(self) -> bool {
        matches!(self, RoundPhase::Launch | RoundPhase::Cruise | RoundPhase::Settle)
    }

    /// The single forward successor (Reveal wraps to Idle)
    pub fn next(self) -> RoundPhase {
        match self {
            RoundPhase::Idle => RoundPhase::Launch,
            RoundPhase::Launch => RoundPhase::Cruise,
            RoundPhase::Cruise => RoundPhase::Settle,
            RoundPhase::Settle => RoundPhase::Reveal,
            RoundPhase::Reveal => RoundPhase::Idle,
        }
    }
}

/// A game-specific authoritative result
///
/// Treated as opaque apart from equality and the validity check, which the
/// network boundary is expected to have already enforced.
pub trait Outcome: Clone + PartialEq + Debug {
    fn is_valid(&self) -> bool {
        true
    }
}

impl Outcome for u8 {}
impl Outcome for u32 {}
impl Outcome for i32 {}

/// Per-slot round state
#[derive(Debug, Clone, PartialEq)]
pub struct GuidedRound<O> {
    round_id: u64,
    phase: RoundPhase,
    seed: u32,
    start_time_ms: f64,
    phase_start_ms: f64,
    launch_impulse: Option<Vec3>,
    target_outcome: Option<O>,
    pending_outcome: Option<O>,
    actual_outcome: Option<O>,
    min_animation_ms: f64,
    max_animation_ms: f64,
    reveal_hold_ms: Option<f64>,
    is_animation_blocking: bool,
    skip_requested: bool,
    /// Watchdog fired: Settle with no target, attractor disengaged
    awaiting_outcome: bool,
}

impl<O: Outcome> GuidedRound<O> {
    /// A fresh Idle slot
    pub fn new(round_id: u64, seed: u32, profile: &GameProfile, now_ms: f64) -> Self {
        Self {
            round_id,
            phase: RoundPhase::Idle,
            seed,
            start_time_ms: now_ms,
            phase_start_ms: now_ms,
            launch_impulse: None,
            target_outcome: None,
            pending_outcome: None,
            actual_outcome: None,
            min_animation_ms: profile.min_animation_ms,
            max_animation_ms: profile.max_animation_ms,
            reveal_hold_ms: profile.reveal_hold_ms,
            is_animation_blocking: profile.is_animation_blocking,
            skip_requested: false,
            awaiting_outcome: false,
        }
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn start_time_ms(&self) -> f64 {
        self.start_time_ms
    }

    pub fn phase_start_ms(&self) -> f64 {
        self.phase_start_ms
    }

    pub fn launch_impulse(&self) -> Option<Vec3> {
        self.launch_impulse
    }

    pub fn target_outcome(&self) -> Option<&O> {
        self.target_outcome.as_ref()
    }

    pub fn pending_outcome(&self) -> Option<&O> {
        self.pending_outcome.as_ref()
    }

    pub fn actual_outcome(&self) -> Option<&O> {
        self.actual_outcome.as_ref()
    }

    pub fn min_animation_ms(&self) -> f64 {
        self.min_animation_ms
    }

    pub fn max_animation_ms(&self) -> f64 {
        self.max_animation_ms
    }

    pub fn is_animation_blocking(&self) -> bool {
        self.is_animation_blocking
    }

    pub fn skip_requested(&self) -> bool {
        self.skip_requested
    }

    pub fn awaiting_outcome(&self) -> bool {
        self.awaiting_outcome
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.start_time_ms).max(0.0)
    }

    pub fn phase_elapsed_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.phase_start_ms).max(0.0)
    }

    fn enter(&mut self, phase: RoundPhase, now_ms: f64) {
        self.phase = phase;
        self.phase_start_ms = now_ms;
    }

    fn clear_outcomes(&mut self) {
        self.target_outcome = None;
        self.pending_outcome = None;
        self.actual_outcome = None;
        self.skip_requested = false;
        self.awaiting_outcome = false;
    }

    /// Begin a new round in Launch
    pub(crate) fn start(
        &mut self,
        round_id: u64,
        seed: u32,
        launch_impulse: Option<Vec3>,
        now_ms: f64,
    ) -> Result<(), Rejected> {
        if self.phase.is_active() && self.is_animation_blocking {
            return Err(Rejected::RoundBlocking {
                round_id: self.round_id,
            });
        }
        if self.phase.is_active() {
            log::debug!("Round {} abandoned by round {}", self.round_id, round_id);
        }

        self.round_id = round_id;
        self.seed = seed;
        self.launch_impulse = launch_impulse;
        self.clear_outcomes();
        self.start_time_ms = now_ms;
        self.enter(RoundPhase::Launch, now_ms);
        Ok(())
    }

    /// Re-initialize to Idle for reuse
    pub(crate) fn reset(&mut self, round_id: u64, seed: u32, now_ms: f64) {
        self.round_id = round_id;
        self.seed = seed;
        self.launch_impulse = None;
        self.clear_outcomes();
        self.start_time_ms = now_ms;
        self.enter(RoundPhase::Idle, now_ms);
    }

    /// Drop the round mid-animation (player left); no cleanup needed
    pub(crate) fn abandon(&mut self, now_ms: f64) -> Result<(), Rejected> {
        if self.phase == RoundPhase::Idle {
            return Err(Rejected::NoActiveRound);
        }
        self.clear_outcomes();
        self.enter(RoundPhase::Idle, now_ms);
        Ok(())
    }

    /// Forward-only phase change
    pub(crate) fn set_phase(&mut self, to: RoundPhase, now_ms: f64) -> Result<(), Rejected> {
        let from = self.phase;
        if to == from {
            return Ok(());
        }

        let wraps = from == RoundPhase::Reveal && to == RoundPhase::Idle;
        if !wraps && to.rank() <= from.rank() {
            return Err(Rejected::BackwardTransition { from, to });
        }

        match to {
            RoundPhase::Settle => {
                if self.target_outcome.is_none() && !self.skip_requested && !self.awaiting_outcome {
                    return Err(Rejected::SettleWithoutOutcome);
                }
                self.enter(RoundPhase::Settle, now_ms);
                Ok(())
            }
            RoundPhase::Reveal => self.complete(now_ms),
            RoundPhase::Idle => {
                self.enter(RoundPhase::Idle, now_ms);
                Ok(())
            }
            RoundPhase::Launch | RoundPhase::Cruise => {
                self.enter(to, now_ms);
                Ok(())
            }
        }
    }

    /// Accept (or buffer) the authoritative outcome
    pub(crate) fn receive_outcome(&mut self, outcome: O, now_ms: f64) -> Result<(), Rejected> {
        if !outcome.is_valid() {
            debug_assert!(false, "invalid outcome reached the guidance engine: {:?}", outcome);
            return Err(Rejected::InvalidOutcome);
        }
        if self.phase == RoundPhase::Idle {
            return Err(Rejected::NoActiveRound);
        }
        if self.target_outcome.is_some() {
            return Err(Rejected::DuplicateOutcome {
                round_id: self.round_id,
            });
        }

        let early = self.elapsed_ms(now_ms) < self.min_animation_ms;
        if early && self.phase != RoundPhase::Settle {
            if self.pending_outcome.is_some() {
                return Err(Rejected::PendingAlreadyBuffered {
                    round_id: self.round_id,
                });
            }
            self.pending_outcome = Some(outcome);
            return Ok(());
        }

        self.accept_target(outcome, now_ms);
        Ok(())
    }

    fn accept_target(&mut self, outcome: O, now_ms: f64) {
        self.target_outcome = Some(outcome);
        self.pending_outcome = None;
        // A stalled Settle restarts its clock so the late settle gets its grace
        if self.phase.rank() < RoundPhase::Settle.rank() || self.awaiting_outcome {
            self.enter(RoundPhase::Settle, now_ms);
        }
        self.awaiting_outcome = false;
    }

    pub(crate) fn request_skip(&mut self) -> Result<(), Rejected> {
        if !self.phase.is_active() {
            return Err(Rejected::NoActiveRound);
        }
        self.skip_requested = true;
        Ok(())
    }

    /// Time-driven transitions: pending promotion, watchdog, reveal hold
    pub(crate) fn advance(&mut self, now_ms: f64) {
        let elapsed = self.elapsed_ms(now_ms);

        if matches!(self.phase, RoundPhase::Launch | RoundPhase::Cruise)
            && (elapsed >= self.min_animation_ms || self.skip_requested)
        {
            if let Some(outcome) = self.pending_outcome.take() {
                self.accept_target(outcome, now_ms);
            }
        }

        if self.phase.is_active()
            && self.target_outcome.is_none()
            && !self.awaiting_outcome
            && elapsed > self.max_animation_ms
        {
            self.awaiting_outcome = true;
            if self.phase != RoundPhase::Settle {
                self.enter(RoundPhase::Settle, now_ms);
            }
        }

        if self.phase == RoundPhase::Reveal {
            if let Some(hold) = self.reveal_hold_ms {
                if self.phase_elapsed_ms(now_ms) >= hold {
                    self.enter(RoundPhase::Idle, now_ms);
                }
            }
        }
    }

    /// Convergence finished: record what the player sees and move to Reveal
    pub(crate) fn complete(&mut self, now_ms: f64) -> Result<(), Rejected> {
        let Some(target) = self.target_outcome.clone() else {
            return Err(Rejected::RevealWithoutOutcome);
        };
        if self.actual_outcome.is_some() {
            return Err(Rejected::DuplicateOutcome {
                round_id: self.round_id,
            });
        }
        let settling = self.phase == RoundPhase::Settle;
        let skipping = self.skip_requested && self.phase.is_active();
        if !settling && !skipping {
            return Err(Rejected::NotSettling { phase: self.phase });
        }

        self.actual_outcome = Some(target);
        self.skip_requested = false;
        self.enter(RoundPhase::Reveal, now_ms);
        Ok(())
    }
}
