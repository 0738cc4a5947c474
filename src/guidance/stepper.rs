//! Per-frame guidance step
//!
//! Called once per fixed tick by the host, before it integrates its physics
//! world. Reads the store, pushes launch impulses and attractor corrections
//! into the bodies, honors skips and deadlines, and reports the resulting
//! poses for rendering.

use glam::{Quat, Vec3};
use serde::Serialize;

use super::attractor::{GuidanceState, alignment_torque, attractor_force};
use super::round::{Outcome, RoundPhase};
use super::skip::{self, SkipStatus};
use super::store::GuidanceStore;
use crate::body::GuidedBody;
use crate::consts::{CONVERGE_ANGLE, CONVERGE_DISTANCE, LAUNCH_SPREAD, REST_SPEED};
use crate::games::TargetResolver;
use crate::noise::NoiseCache;
use crate::seed::noise_offset;

/// Rendered state of one body after a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodyFrame {
    pub position: Vec3,
    pub rotation: Quat,
    /// Attractor force applied this tick
    pub force: Option<Vec3>,
    /// Distance to target, when a target is known
    pub distance: Option<f32>,
}

/// Result of one guidance step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub phase: RoundPhase,
    pub round_id: u64,
    /// Watchdog stall: no target, no guidance
    pub awaiting_outcome: bool,
    /// Convergence completed this tick
    pub converged: bool,
    /// A skip was honored this tick
    pub skipped: bool,
    /// Deadline reached: pose forced to target this tick
    pub forced: bool,
    pub bodies: Vec<BodyFrame>,
}

impl FrameReport {
    fn new(phase: RoundPhase, round_id: u64, body_count: usize) -> Self {
        Self {
            phase,
            round_id,
            awaiting_outcome: false,
            converged: false,
            skipped: false,
            forced: false,
            bodies: Vec::with_capacity(body_count),
        }
    }

    /// Largest remaining distance to target across bodies
    pub fn max_distance(&self) -> Option<f32> {
        self.bodies
            .iter()
            .filter_map(|b| b.distance)
            .fold(None, |acc, d| Some(acc.map_or(d, |a: f32| a.max(d))))
    }
}

/// Drives guided bodies toward the authoritative outcome
#[derive(Debug, Default)]
pub struct FrameStepper {
    noise: NoiseCache,
}

impl FrameStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_noise_cache(noise: NoiseCache) -> Self {
        Self { noise }
    }

    /// Advance guidance for one game slot by one tick
    pub fn step<O, B, R>(
        &mut self,
        store: &mut GuidanceStore<O>,
        game_type: &str,
        bodies: &mut [B],
        resolver: &R,
        now_ms: f64,
        dt: f32,
    ) -> FrameReport
    where
        O: Outcome + 'static,
        B: GuidedBody,
        R: TargetResolver<O> + ?Sized,
    {
        store.drain_inbox(now_ms);
        if store.profile(game_type).is_none() {
            log::debug!("[{}] step skipped: game type not configured", game_type);
            return FrameReport::new(RoundPhase::Idle, 0, 0);
        }
        let _ = store.advance(game_type, now_ms);

        let (phase, round_id) = match store.round(game_type) {
            Some(round) => (round.phase(), round.round_id()),
            None => (RoundPhase::Idle, 0),
        };
        let mut report = FrameReport::new(phase, round_id, bodies.len());
        let mut forces: Vec<Option<Vec3>> = vec![None; bodies.len()];

        match phase {
            RoundPhase::Launch => self.launch(store, game_type, bodies, now_ms),
            RoundPhase::Cruise | RoundPhase::Settle => {
                match skip::honor_skip(store, game_type, bodies, resolver, now_ms) {
                    SkipStatus::Honored => report.skipped = true,
                    SkipStatus::Queued | SkipStatus::NotRequested if phase == RoundPhase::Settle => {
                        self.settle(store, game_type, bodies, resolver, now_ms, dt, &mut report, &mut forces);
                    }
                    _ => {}
                }
            }
            RoundPhase::Idle | RoundPhase::Reveal => {}
        }

        let target = store.round(game_type).and_then(|r| r.target_outcome().cloned());
        if let Some(round) = store.round(game_type) {
            report.phase = round.phase();
            report.awaiting_outcome = round.awaiting_outcome();
        }
        for (index, body) in bodies.iter().enumerate() {
            let distance = target
                .as_ref()
                .and_then(|t| resolver.target_pose(t, index))
                .map(|pose| (pose.position - body.position()).length());
            report.bodies.push(BodyFrame {
                position: body.position(),
                rotation: body.rotation(),
                force: forces[index],
                distance,
            });
        }
        report
    }

    /// Apply the launch impulse (seed-varied per body) and enter Cruise
    fn launch<O, B>(&mut self, store: &mut GuidanceStore<O>, game_type: &str, bodies: &mut [B], now_ms: f64)
    where
        O: Outcome + 'static,
        B: GuidedBody,
    {
        let Some(round) = store.round(game_type) else {
            return;
        };
        if let Some(impulse) = round.launch_impulse() {
            let noise = self.noise.get(round.seed());
            let offset = noise_offset(round.seed());
            for (index, body) in bodies.iter_mut().enumerate() {
                let jitter = noise.sample(index as f64 * 1.7 + 0.5, 0.25, offset) as f32;
                body.apply_impulse(Quat::from_rotation_y(jitter * LAUNCH_SPREAD) * impulse);
            }
            log::debug!("[{}] launch impulse {:?} applied to {} bodies", game_type, impulse, bodies.len());
        }
        let _ = store.set_phase(game_type, RoundPhase::Cruise, now_ms);
    }

    #[allow(clippy::too_many_arguments)]
    fn settle<O, B, R>(
        &mut self,
        store: &mut GuidanceStore<O>,
        game_type: &str,
        bodies: &mut [B],
        resolver: &R,
        now_ms: f64,
        dt: f32,
        report: &mut FrameReport,
        forces: &mut [Option<Vec3>],
    ) where
        O: Outcome + 'static,
        B: GuidedBody,
        R: TargetResolver<O> + ?Sized,
    {
        let Some(round) = store.round(game_type) else {
            return;
        };
        if round.awaiting_outcome() {
            report.awaiting_outcome = true;
            return;
        }
        let Some(target) = round.target_outcome().cloned() else {
            return;
        };
        let (Some(profile), Some(config)) = (
            store.profile(game_type).cloned(),
            store.config().effect_for_game(game_type).copied(),
        ) else {
            return;
        };

        let seed = round.seed();
        let elapsed_secs = round.elapsed_ms(now_ms) / 1000.0;
        let deadline = (round.start_time_ms() + round.max_animation_ms())
            .max(round.phase_start_ms() + profile.late_settle_ms);

        if now_ms >= deadline {
            skip::snap_to_target(bodies, resolver, &target);
            if store.complete_convergence(game_type, now_ms).is_ok() {
                log::info!("[{}] settle deadline reached; pose forced to target", game_type);
                report.forced = true;
            }
            return;
        }

        let noise = self.noise.get(seed);
        let offset = noise_offset(seed);
        let mut all_converged = true;

        for (index, body) in bodies.iter_mut().enumerate() {
            let Some(pose) = resolver.target_pose(&target, index) else {
                continue;
            };
            let position = body.position();
            let velocity = body.velocity();
            let rotation = body.rotation();
            let to_target = pose.position - position;
            let distance = to_target.length();

            let aligned = pose
                .rotation
                .is_none_or(|target_rot| rotation.angle_between(target_rot) < CONVERGE_ANGLE);
            if distance < CONVERGE_DISTANCE && velocity.length() < REST_SPEED && aligned {
                body.set_pose(pose.position, pose.rotation.unwrap_or(rotation));
                body.set_velocity(Vec3::ZERO);
                continue;
            }
            all_converged = false;

            let guidance = GuidanceState {
                target_position: pose.position,
                target_rotation: pose.rotation,
                phase: RoundPhase::Settle,
                height_gate: profile.height_gate,
                noise_offset: offset,
            };
            let force = attractor_force(
                position,
                velocity,
                &guidance,
                &config,
                |x, y, z| noise.sample(x, y, z),
                elapsed_secs,
            );
            forces[index] = force;

            let below_gate = profile.height_gate.is_none_or(|gate| position.y <= gate);
            let slow = velocity.length() < config.velocity_gate;
            let in_zone = distance <= config.effective_radius && below_gate;

            // Guided bodies only move along the line to their target
            let mut velocity = velocity;
            if in_zone && slow && distance > 0.0 {
                let closing = velocity.dot(to_target / distance).max(0.0);
                let radial = to_target / distance * closing;
                if radial != velocity {
                    velocity = radial;
                    body.set_velocity(velocity);
                }
            }

            // Never let a tick carry the body through its target
            let dv = force.map_or(Vec3::ZERO, |f| f * body.inverse_mass() * dt);
            let step_toward = if distance > 0.0 {
                (velocity + dv).dot(to_target / distance) * dt
            } else {
                0.0
            };
            if in_zone && distance < CONVERGE_DISTANCE.max(step_toward) {
                body.set_pose(pose.position, rotation);
                body.set_velocity(Vec3::ZERO);
            } else if let Some(f) = force {
                body.apply_impulse(f * dt);
            }

            if let Some(target_rot) = pose.rotation {
                if slow && below_gate {
                    let torque = alignment_torque(body.rotation(), target_rot, profile.alignment_strength);
                    body.set_pose(body.position(), torque.rotate(body.rotation()));
                }
            }
        }

        if all_converged && store.complete_convergence(game_type, now_ms).is_ok() {
            report.converged = true;
        }
    }
}
