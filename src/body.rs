//! Renderer/physics handoff
//!
//! The engine never owns the physics world. Each tick it reads a guided
//! object's kinematic state through `GuidedBody`, pushes corrections back
//! through it, and the host integrates. `SimpleBody` is a minimal stand-in
//! world used by the demo binary and the tests.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Read-write view of one guided object in the host's physics world
pub trait GuidedBody {
    fn position(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
    fn rotation(&self) -> Quat;

    /// 1 / mass; zero means kinematic (impulses ignored)
    fn inverse_mass(&self) -> f32 {
        1.0
    }

    /// Instantaneous change of momentum
    fn apply_impulse(&mut self, impulse: Vec3);

    /// Teleport to a pose for the next rendered frame
    fn set_pose(&mut self, position: Vec3, rotation: Quat);

    fn set_velocity(&mut self, velocity: Vec3);
}

/// Semi-implicit Euler rigid body on a flat table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleBody {
    pub pos: Vec3,
    pub vel: Vec3,
    pub rot: Quat,
    /// Radians/sec about each world axis
    pub angular_vel: Vec3,
    pub inverse_mass: f32,
    /// Fraction of velocity lost per second
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Table surface height, if any
    pub floor_y: Option<f32>,
    /// Bounce factor on floor contact
    pub restitution: f32,
    /// Fraction of tangential velocity lost per second while touching the floor
    pub friction: f32,
}

/// Impacts slower than this stop instead of bouncing
const REST_BOUNCE_SPEED: f32 = 0.5;

impl SimpleBody {
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            vel: Vec3::ZERO,
            rot: Quat::IDENTITY,
            angular_vel: Vec3::ZERO,
            inverse_mass: 1.0,
            linear_damping: 0.4,
            angular_damping: 0.8,
            gravity: 9.81,
            floor_y: Some(0.0),
            restitution: 0.35,
            friction: 2.0,
        }
    }

    /// No gravity, no floor: only damping acts
    pub fn floating(pos: Vec3) -> Self {
        Self {
            gravity: 0.0,
            floor_y: None,
            ..Self::new(pos)
        }
    }

    pub fn with_velocity(mut self, vel: Vec3) -> Self {
        self.vel = vel;
        self
    }

    pub fn with_damping(mut self, linear: f32) -> Self {
        self.linear_damping = linear;
        self
    }

    pub fn with_angular_velocity(mut self, angular_vel: Vec3) -> Self {
        self.angular_vel = angular_vel;
        self
    }

    /// Whether the body is resting on (or pressed into) the floor
    pub fn on_floor(&self) -> bool {
        self.floor_y.is_some_and(|floor| self.pos.y <= floor + 1e-4)
    }

    /// Advance one fixed step
    pub fn integrate(&mut self, dt: f32) {
        self.vel.y -= self.gravity * dt;
        self.vel *= (1.0 - self.linear_damping * dt).max(0.0);
        self.pos += self.vel * dt;

        if let Some(floor) = self.floor_y {
            if self.pos.y < floor {
                self.pos.y = floor;
                if self.vel.y < -REST_BOUNCE_SPEED {
                    self.vel.y = -self.vel.y * self.restitution;
                } else {
                    self.vel.y = 0.0;
                }
            }
            if self.on_floor() {
                let keep = (1.0 - self.friction * dt).max(0.0);
                self.vel.x *= keep;
                self.vel.z *= keep;
                self.angular_vel *= keep;
            }
        }

        if self.angular_vel.length_squared() > 0.0 {
            self.rot = (Quat::from_scaled_axis(self.angular_vel * dt) * self.rot).normalize();
            self.angular_vel *= (1.0 - self.angular_damping * dt).max(0.0);
        }
    }
}

impl GuidedBody for SimpleBody {
    fn position(&self) -> Vec3 {
        self.pos
    }

    fn velocity(&self) -> Vec3 {
        self.vel
    }

    fn rotation(&self) -> Quat {
        self.rot
    }

    fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        self.vel += impulse * self.inverse_mass;
    }

    fn set_pose(&mut self, position: Vec3, rotation: Quat) {
        self.pos = position;
        self.rot = rotation;
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.vel = velocity;
        if velocity == Vec3::ZERO {
            self.angular_vel = Vec3::ZERO;
        }
    }
}
