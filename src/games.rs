//! Target layouts for guided games
//!
//! Maps an authoritative outcome to the pose each guided object must end in.
//! Outcome validity lives here too, so the network boundary can reject
//! malformed values before they reach the store.

use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::guidance::Outcome;
use crate::polar_on_table;

/// Final pose for one guided object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPose {
    pub position: Vec3,
    /// `None` when orientation doesn't matter (a roulette ball)
    pub rotation: Option<Quat>,
}

impl TargetPose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: None,
        }
    }

    pub fn with_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: Some(rotation),
        }
    }
}

/// Outcome → per-body target pose
pub trait TargetResolver<O> {
    /// Pose for the body at `body_index`, or `None` if that body isn't guided
    fn target_pose(&self, outcome: &O, body_index: usize) -> Option<TargetPose>;
}

impl<O, F> TargetResolver<O> for F
where
    F: Fn(&O, usize) -> Option<TargetPose>,
{
    fn target_pose(&self, outcome: &O, body_index: usize) -> Option<TargetPose> {
        self(outcome, body_index)
    }
}

// ---------------------------------------------------------------------------
// Roulette
// ---------------------------------------------------------------------------

/// Pocket number 0-36, with 37 standing for "00"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoulettePocket(pub u8);

impl RoulettePocket {
    pub const DOUBLE_ZERO: RoulettePocket = RoulettePocket(37);
}

impl Outcome for RoulettePocket {
    fn is_valid(&self) -> bool {
        self.0 <= 37
    }
}

/// Pocket order around an American wheel, clockwise from 0 (37 = "00")
pub const WHEEL_ORDER: [u8; 38] = [
    0, 28, 9, 26, 30, 11, 7, 20, 32, 17, 5, 22, 34, 15, 3, 24, 36, 13, 1, 37, 27, 10, 25, 29, 12,
    8, 19, 31, 18, 6, 21, 33, 16, 4, 23, 35, 14, 2,
];

/// Wheel geometry on the table plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouletteLayout {
    pub center: Vec3,
    /// Radius of the pocket ring
    pub pocket_radius: f32,
    /// Ball center height when seated in a pocket
    pub ball_rest_y: f32,
    /// Wheel rotation at reveal time (radians)
    pub wheel_angle: f32,
}

impl Default for RouletteLayout {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            pocket_radius: 0.32,
            ball_rest_y: 0.0,
            wheel_angle: 0.0,
        }
    }
}

impl RouletteLayout {
    pub fn pocket_angle(&self, pocket: RoulettePocket) -> Option<f32> {
        let index = WHEEL_ORDER.iter().position(|&p| p == pocket.0)?;
        Some(self.wheel_angle + index as f32 * TAU / WHEEL_ORDER.len() as f32)
    }

    pub fn pocket_position(&self, pocket: RoulettePocket) -> Option<Vec3> {
        let theta = self.pocket_angle(pocket)?;
        Some(self.center + polar_on_table(self.pocket_radius, theta, self.ball_rest_y))
    }
}

impl TargetResolver<RoulettePocket> for RouletteLayout {
    fn target_pose(&self, outcome: &RoulettePocket, body_index: usize) -> Option<TargetPose> {
        if body_index != 0 {
            return None;
        }
        self.pocket_position(*outcome).map(TargetPose::at)
    }
}

// ---------------------------------------------------------------------------
// Dice
// ---------------------------------------------------------------------------

/// Two six-sided dice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DicePair {
    pub die1: u8,
    pub die2: u8,
}

impl DicePair {
    pub fn new(die1: u8, die2: u8) -> Self {
        Self { die1, die2 }
    }

    pub fn total(&self) -> u8 {
        self.die1 + self.die2
    }

    pub fn face(&self, index: usize) -> Option<u8> {
        match index {
            0 => Some(self.die1),
            1 => Some(self.die2),
            _ => None,
        }
    }
}

impl Outcome for DicePair {
    fn is_valid(&self) -> bool {
        (1..=6).contains(&self.die1) && (1..=6).contains(&self.die2)
    }
}

/// Local face normals of a die; opposite faces sum to 7
pub fn face_normal(face: u8) -> Option<Vec3> {
    match face {
        1 => Some(Vec3::Y),
        2 => Some(Vec3::Z),
        3 => Some(Vec3::X),
        4 => Some(Vec3::NEG_X),
        5 => Some(Vec3::NEG_Z),
        6 => Some(Vec3::NEG_Y),
        _ => None,
    }
}

/// Orientation that shows `face` on top, then yawed about +Y
pub fn face_up_rotation(face: u8, yaw: f32) -> Option<Quat> {
    let normal = face_normal(face)?;
    Some((Quat::from_rotation_y(yaw) * Quat::from_rotation_arc(normal, Vec3::Y)).normalize())
}

/// Which face of a die points up for a given orientation
pub fn top_face(rotation: Quat) -> u8 {
    (1..=6)
        .max_by(|&a, &b| {
            let up_a = face_normal(a).map(|n| (rotation * n).y).unwrap_or(f32::MIN);
            let up_b = face_normal(b).map(|n| (rotation * n).y).unwrap_or(f32::MIN);
            up_a.total_cmp(&up_b)
        })
        .unwrap_or(1)
}

/// Resting spots and yaw for a pair of dice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiceLayout {
    pub rest_spots: [Vec3; 2],
    pub yaw: [f32; 2],
}

impl Default for DiceLayout {
    fn default() -> Self {
        Self {
            rest_spots: [Vec3::new(-0.06, 0.0, 0.4), Vec3::new(0.07, 0.0, 0.46)],
            yaw: [0.3, -0.5],
        }
    }
}

impl TargetResolver<DicePair> for DiceLayout {
    fn target_pose(&self, outcome: &DicePair, body_index: usize) -> Option<TargetPose> {
        let face = outcome.face(body_index)?;
        let spot = *self.rest_spots.get(body_index)?;
        let yaw = self.yaw.get(body_index).copied().unwrap_or(0.0);
        face_up_rotation(face, yaw).map(|rot| TargetPose::with_rotation(spot, rot))
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// A single card index 0-51 revealed at a dealer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardReveal {
    pub card: u8,
}

impl Outcome for CardReveal {
    fn is_valid(&self) -> bool {
        self.card < 52
    }
}

/// Where revealed cards come to rest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    pub slot: Vec3,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            slot: Vec3::new(0.0, 0.0, 0.3),
        }
    }
}

impl TargetResolver<CardReveal> for CardLayout {
    fn target_pose(&self, _outcome: &CardReveal, body_index: usize) -> Option<TargetPose> {
        // Cards are dealt face down (identity); the reveal flips about Z
        (body_index == 0).then(|| TargetPose::with_rotation(self.slot, Quat::from_rotation_z(PI)))
    }
}
