//! Guided Convergence - physics guidance for casino dice, balls and cards
//!
//! Core modules:
//! - `guidance`: Round lifecycle, attractor forces, store, frame stepper, skip
//! - `seed`: Deterministic per-round seeds
//! - `noise`: Seeded simplex noise for organic force modulation
//! - `config`: Data-driven attractor presets and per-game timing profiles
//! - `games`: Target pose layouts for roulette, dice and cards
//! - `body`: Renderer/physics handoff trait and a reference rigid body

pub mod body;
pub mod config;
pub mod error;
pub mod feedback;
pub mod games;
pub mod guidance;
pub mod noise;
pub mod seed;

pub use body::{GuidedBody, SimpleBody};
pub use config::{EngineConfig, GameProfile};
pub use error::{ConfigError, Rejected};
pub use feedback::{FeedbackSink, LogSink};
pub use guidance::{
    Action, AttractorConfig, FalloffCurve, FrameReport, FrameStepper, GuidanceEvent,
    GuidanceHandle, GuidanceState, GuidanceStore, GuidedRound, RoundPhase,
};
pub use seed::round_seed;

use glam::Vec3;

/// Engine constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz, matches the host frame stepper)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Below this distance an object counts as arrived (no force computed)
    pub const ARRIVAL_EPSILON: f32 = 1e-3;
    /// Distance at which the stepper declares convergence and snaps the pose
    pub const CONVERGE_DISTANCE: f32 = 0.01;
    /// Speed below which a converged object counts as at rest
    pub const REST_SPEED: f32 = 0.05;
    /// Below this angle (radians) two orientations count as aligned
    pub const ALIGN_EPSILON: f32 = 1e-4;
    /// Orientation error (radians) accepted at convergence
    pub const CONVERGE_ANGLE: f32 = 0.01;
    /// Max yaw (radians) of per-body launch variation
    pub const LAUNCH_SPREAD: f32 = 0.2;

    /// Floor for the normalized distance in the inverse-square falloff
    pub const INVERSE_SQUARE_MIN_D: f32 = 0.05;

    /// Noise instances kept alive by a default `NoiseCache`
    pub const NOISE_CACHE_CAPACITY: usize = 16;
}

/// Convert polar (r, theta) on the table plane to a world position at height `y`
///
/// The table plane is XZ with +Y up.
#[inline]
pub fn polar_on_table(r: f32, theta: f32, y: f32) -> Vec3 {
    Vec3::new(r * theta.cos(), y, r * theta.sin())
}
