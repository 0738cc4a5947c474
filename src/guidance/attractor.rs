//! Attractor force model
//!
//! The part that keeps convergence from looking magnetic. A force is only
//! produced when every gate passes (phase, speed, height, distance), its
//! magnitude falls off with distance, is modulated by seeded noise and is
//! hard-clamped, so no single tick can visibly pull an object.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::round::RoundPhase;
use crate::consts::{ALIGN_EPSILON, ARRIVAL_EPSILON, INVERSE_SQUARE_MIN_D};

/// Shape of the force falloff over normalized distance `d` in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FalloffCurve {
    /// `1 - d`
    #[default]
    Linear,
    /// `1 - d²`
    Quadratic,
    /// `1 / max(0.05, d)²`, capped at 1
    InverseSquare,
}

impl FalloffCurve {
    pub fn factor(self, d: f32) -> f32 {
        let d = d.clamp(0.0, 1.0);
        match self {
            FalloffCurve::Linear => 1.0 - d,
            FalloffCurve::Quadratic => 1.0 - d * d,
            FalloffCurve::InverseSquare => {
                let d = d.max(INVERSE_SQUARE_MIN_D);
                (1.0 / (d * d)).min(1.0)
            }
        }
    }
}

/// Per-effect tuning (not per-round)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttractorConfig {
    pub falloff: FalloffCurve,
    pub base_strength: f32,
    /// Force is zero beyond this distance
    pub effective_radius: f32,
    /// Force only applies below this speed
    pub velocity_gate: f32,
    /// Hard ceiling on force magnitude
    pub force_clamp: f32,
    /// 0-1 modulation of force magnitude
    pub noise_amplitude: f32,
    pub noise_frequency: f32,
}

impl Default for AttractorConfig {
    fn default() -> Self {
        Self {
            falloff: FalloffCurve::Quadratic,
            base_strength: 5.0,
            effective_radius: 1.0,
            velocity_gate: 2.0,
            force_clamp: 8.0,
            noise_amplitude: 0.2,
            noise_frequency: 1.0,
        }
    }
}

impl AttractorConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        let finite = [
            self.base_strength,
            self.effective_radius,
            self.velocity_gate,
            self.force_clamp,
            self.noise_amplitude,
            self.noise_frequency,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err("all parameters must be finite");
        }
        if self.base_strength < 0.0 {
            return Err("base_strength must be non-negative");
        }
        if self.effective_radius <= 0.0 {
            return Err("effective_radius must be positive");
        }
        if self.velocity_gate <= 0.0 {
            return Err("velocity_gate must be positive");
        }
        if self.force_clamp < 0.0 {
            return Err("force_clamp must be non-negative");
        }
        // Amplitude below 1 keeps the noise factor positive: noise may
        // weaken the pull but never reverse it.
        if !(0.0..1.0).contains(&self.noise_amplitude) {
            return Err("noise_amplitude must be in [0, 1)");
        }
        if self.noise_frequency < 0.0 {
            return Err("noise_frequency must be non-negative");
        }
        Ok(())
    }
}

/// Transient per-tick guidance input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceState {
    pub target_position: Vec3,
    pub target_rotation: Option<Quat>,
    pub phase: RoundPhase,
    /// Force only applies at or below this Y
    pub height_gate: Option<f32>,
    /// Seed-derived offset so rounds don't visually synchronize
    pub noise_offset: f64,
}

/// Gated, noise-modulated pull toward the guidance target
///
/// Returns `None` when any gate fails. `noise` must return values in [-1, 1].
pub fn attractor_force(
    position: Vec3,
    velocity: Vec3,
    guidance: &GuidanceState,
    config: &AttractorConfig,
    noise: impl Fn(f64, f64, f64) -> f64,
    elapsed_secs: f64,
) -> Option<Vec3> {
    if guidance.phase != RoundPhase::Settle {
        return None;
    }
    if !position.is_finite() || !velocity.is_finite() {
        return None;
    }

    // Fast chaotic motion is left alone
    if velocity.length() >= config.velocity_gate {
        return None;
    }

    if let Some(gate) = guidance.height_gate {
        if position.y > gate {
            return None;
        }
    }

    let offset = guidance.target_position - position;
    let distance = offset.length();
    if distance > config.effective_radius || distance < ARRIVAL_EPSILON {
        return None;
    }
    let direction = offset / distance;

    let d = distance / config.effective_radius;
    let falloff = config.falloff.factor(d);

    let freq = config.noise_frequency as f64;
    let sample = noise(
        position.x as f64 * freq,
        position.y as f64 * freq,
        (position.z as f64 + guidance.noise_offset + elapsed_secs) * freq,
    )
    .clamp(-1.0, 1.0);
    let noise_factor = 1.0 + sample as f32 * config.noise_amplitude;

    let magnitude = (config.base_strength * falloff * noise_factor).clamp(0.0, config.force_clamp);
    Some(direction * magnitude)
}

/// Rotation step toward a target orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentTorque {
    /// Unit rotation axis (arbitrary when `angle` is zero)
    pub axis: Vec3,
    /// Radians, already scaled by strength
    pub angle: f32,
}

impl AlignmentTorque {
    pub fn none() -> Self {
        Self {
            axis: Vec3::Y,
            angle: 0.0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.angle == 0.0
    }

    /// Apply this step to an orientation
    pub fn rotate(&self, current: Quat) -> Quat {
        if self.is_noop() {
            return current;
        }
        (Quat::from_axis_angle(self.axis, self.angle) * current).normalize()
    }
}

/// Minimal rotation from `current` toward `target`, scaled by `strength` in [0, 1]
pub fn alignment_torque(current: Quat, target: Quat, strength: f32) -> AlignmentTorque {
    let mut delta = (target * current.inverse()).normalize();
    // q and -q are the same rotation; pick the short way round
    if delta.w < 0.0 {
        delta = -delta;
    }

    let (axis, angle) = delta.to_axis_angle();
    if !angle.is_finite() || angle < ALIGN_EPSILON || !axis.is_finite() {
        return AlignmentTorque::none();
    }

    AlignmentTorque {
        axis: axis.normalize(),
        angle: angle * strength.clamp(0.0, 1.0),
    }
}
