//! Error types
//!
//! Nothing here is ever allowed to stop the render loop. `Rejected` explains
//! why a store action was a no-op; callers in the frame loop may ignore it.

use thiserror::Error;

use crate::guidance::RoundPhase;

/// Why a guidance action left the round unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("no profile configured for game type `{0}`")]
    UnknownGameType(String),
    #[error("round {round_id} is still animating and blocks new rounds")]
    RoundBlocking { round_id: u64 },
    #[error("phase transition {from:?} -> {to:?} is not forward")]
    BackwardTransition { from: RoundPhase, to: RoundPhase },
    #[error("cannot enter Settle without an outcome, skip request or stall")]
    SettleWithoutOutcome,
    #[error("cannot enter Reveal before the authoritative outcome is known")]
    RevealWithoutOutcome,
    #[error("round is in {phase:?}; convergence needs Settle or a skip request")]
    NotSettling { phase: RoundPhase },
    #[error("outcome for round {round_id} already accepted")]
    DuplicateOutcome { round_id: u64 },
    #[error("an early outcome is already buffered for round {round_id}")]
    PendingAlreadyBuffered { round_id: u64 },
    #[error("outcome failed validity check")]
    InvalidOutcome,
    #[error("no active round")]
    NoActiveRound,
}

/// Configuration loading/validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("effect `{name}`: {reason}")]
    InvalidEffect { name: String, reason: String },
    #[error("game `{game}` references unknown effect `{effect}`")]
    UnknownEffect { game: String, effect: String },
    #[error("game `{game}`: min animation {min_ms}ms exceeds max {max_ms}ms")]
    InvalidDurations { game: String, min_ms: f64, max_ms: f64 },
}
