//! Guidance module
//!
//! Everything that turns an authoritative outcome into a believable settle:
//! - Round lifecycle (Idle → Launch → Cruise → Settle → Reveal)
//! - Store with actions, events and a cross-thread inbox
//! - Gated attractor forces and orientation alignment
//! - Per-frame stepper and skip handling
//!
//! Pure and deterministic: explicit timestamps, seeded noise, stable
//! iteration order (game types are kept sorted).

pub mod attractor;
pub mod round;
pub mod skip;
pub mod stepper;
pub mod store;

pub use attractor::{
    AlignmentTorque, AttractorConfig, FalloffCurve, GuidanceState, alignment_torque, attractor_force,
};
pub use round::{GuidedRound, Outcome, RoundPhase};
pub use skip::{SkipStatus, honor_skip, snap_to_target};
pub use stepper::{BodyFrame, FrameReport, FrameStepper};
pub use store::{Action, GuidanceEvent, GuidanceHandle, GuidanceStore, SubscriptionId};
