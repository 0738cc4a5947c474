//! Skip / fast-forward
//!
//! Jumps straight to the authoritative end pose, bypassing force
//! integration. A skip that arrives before the outcome stays queued on the
//! round and is honored on the first tick after the outcome lands, so the
//! visual result can never diverge from the authoritative one.

use glam::Vec3;

use super::round::Outcome;
use super::store::GuidanceStore;
use crate::body::GuidedBody;
use crate::games::TargetResolver;

/// What the skip handler did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStatus {
    NotRequested,
    /// Requested, waiting on the outcome
    Queued,
    Honored,
}

/// Write every guided body's target pose directly and stop it
pub fn snap_to_target<O, B, R>(bodies: &mut [B], resolver: &R, outcome: &O)
where
    B: GuidedBody,
    R: TargetResolver<O> + ?Sized,
{
    for (index, body) in bodies.iter_mut().enumerate() {
        if let Some(pose) = resolver.target_pose(outcome, index) {
            let rotation = pose.rotation.unwrap_or_else(|| body.rotation());
            body.set_pose(pose.position, rotation);
            body.set_velocity(Vec3::ZERO);
        }
    }
}

/// Honor a pending skip request if the target outcome is known
pub fn honor_skip<O, B, R>(
    store: &mut GuidanceStore<O>,
    game_type: &str,
    bodies: &mut [B],
    resolver: &R,
    now_ms: f64,
) -> SkipStatus
where
    O: Outcome + 'static,
    B: GuidedBody,
    R: TargetResolver<O> + ?Sized,
{
    let Some(round) = store.round(game_type) else {
        return SkipStatus::NotRequested;
    };
    if !round.skip_requested() || !round.phase().is_active() {
        return SkipStatus::NotRequested;
    }
    let Some(target) = round.target_outcome().cloned() else {
        return SkipStatus::Queued;
    };

    snap_to_target(bodies, resolver, &target);
    match store.complete_convergence(game_type, now_ms) {
        Ok(()) => {
            log::info!("[{}] skip honored", game_type);
            SkipStatus::Honored
        }
        Err(err) => {
            log::warn!("[{}] skip could not complete: {}", game_type, err);
            SkipStatus::Queued
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::SimpleBody;
    use crate::config::EngineConfig;
    use crate::games::{RouletteLayout, RoulettePocket};
    use crate::guidance::RoundPhase;

    fn roulette_store() -> GuidanceStore<RoulettePocket> {
        let mut store = GuidanceStore::new(EngineConfig::default());
        store.start_round("roulette", 3, None, 0.0).unwrap();
        store.set_phase("roulette", RoundPhase::Cruise, 8.0).unwrap();
        store
    }

    #[test]
    fn test_no_request_does_nothing() {
        let mut store = roulette_store();
        let mut bodies = [SimpleBody::new(glam::Vec3::new(1.0, 0.5, 0.0))];
        let status = honor_skip(&mut store, "roulette", &mut bodies, &RouletteLayout::default(), 100.0);
        assert_eq!(status, SkipStatus::NotRequested);
        assert_eq!(bodies[0].pos, glam::Vec3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn test_skip_queued_until_outcome() {
        let mut store = roulette_store();
        let layout = RouletteLayout::default();
        let mut bodies = [SimpleBody::new(glam::Vec3::new(1.0, 0.5, 0.0))];

        store.request_skip("roulette", 100.0).unwrap();
        assert_eq!(honor_skip(&mut store, "roulette", &mut bodies, &layout, 100.0), SkipStatus::Queued);
        assert_eq!(store.round("roulette").unwrap().phase(), RoundPhase::Cruise);

        // Outcome arrives early; skip bypasses the minimum duration
        store.receive_outcome("roulette", RoulettePocket(17), 200.0).unwrap();
        store.advance("roulette", 210.0).unwrap();
        assert_eq!(honor_skip(&mut store, "roulette", &mut bodies, &layout, 210.0), SkipStatus::Honored);

        let round = store.round("roulette").unwrap();
        assert_eq!(round.phase(), RoundPhase::Reveal);
        assert_eq!(round.actual_outcome(), round.target_outcome());
        assert_eq!(bodies[0].pos, layout.pocket_position(RoulettePocket(17)).unwrap());
        assert_eq!(bodies[0].vel, glam::Vec3::ZERO);
    }

    #[test]
    fn test_skip_after_outcome_is_immediate() {
        let mut store = roulette_store();
        let layout = RouletteLayout::default();
        let mut bodies = [SimpleBody::new(glam::Vec3::new(1.0, 0.5, 0.0))];

        store.receive_outcome("roulette", RoulettePocket(0), 4500.0).unwrap();
        store.request_skip("roulette", 4600.0).unwrap();
        assert_eq!(honor_skip(&mut store, "roulette", &mut bodies, &layout, 4600.0), SkipStatus::Honored);
        assert_eq!(
            store.round("roulette").unwrap().actual_outcome(),
            Some(&RoulettePocket(0))
        );
    }
}
