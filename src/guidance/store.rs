//! Guidance store
//!
//! Owns one `GuidedRound` per game type. Every mutation is a named `Action`
//! applied through `dispatch`; nothing else can write round fields.
//!
//! Two notification paths:
//! - transient subscribers: plain callbacks run synchronously after any
//!   action that changed a round (the frame stepper's channel)
//! - feedback sinks: only meaningful events (phase change, round complete,
//!   stall) for UI/audio, so they never re-render per physics tick
//!
//! Outcome delivery from other threads goes through `GuidanceHandle`, which
//! only sends messages; the frame loop drains them with `drain_inbox`.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec3;

use super::round::{GuidedRound, Outcome, RoundPhase};
use crate::config::{EngineConfig, GameProfile};
use crate::error::Rejected;
use crate::feedback::FeedbackSink;
use crate::seed::round_seed;

/// Every way a round can be changed
#[derive(Debug, Clone, PartialEq)]
pub enum Action<O> {
    StartRound {
        game_type: String,
        round_id: u64,
        launch_impulse: Option<Vec3>,
    },
    SetPhase {
        game_type: String,
        phase: RoundPhase,
    },
    ReceiveOutcome {
        game_type: String,
        outcome: O,
    },
    RequestSkip {
        game_type: String,
    },
    ResetRound {
        game_type: String,
        round_id: u64,
    },
    AbandonRound {
        game_type: String,
    },
    /// Time-driven transitions (pending promotion, watchdog, reveal hold)
    Advance {
        game_type: String,
    },
    /// Convergence finished (or skip honored): reveal the target outcome
    CompleteConvergence {
        game_type: String,
    },
}

impl<O> Action<O> {
    pub fn game_type(&self) -> &str {
        match self {
            Action::StartRound { game_type, .. }
            | Action::SetPhase { game_type, .. }
            | Action::ReceiveOutcome { game_type, .. }
            | Action::RequestSkip { game_type }
            | Action::ResetRound { game_type, .. }
            | Action::AbandonRound { game_type }
            | Action::Advance { game_type }
            | Action::CompleteConvergence { game_type } => game_type,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::StartRound { .. } => "start_round",
            Action::SetPhase { .. } => "set_phase",
            Action::ReceiveOutcome { .. } => "receive_outcome",
            Action::RequestSkip { .. } => "request_skip",
            Action::ResetRound { .. } => "reset_round",
            Action::AbandonRound { .. } => "abandon_round",
            Action::Advance { .. } => "advance",
            Action::CompleteConvergence { .. } => "complete_convergence",
        }
    }
}

/// Meaningful state changes for UI/audio collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEvent<O> {
    PhaseChanged {
        game_type: String,
        round_id: u64,
        from: RoundPhase,
        to: RoundPhase,
    },
    RoundComplete {
        game_type: String,
        round_id: u64,
        outcome: O,
    },
    /// Watchdog fired: show a stalled-connection indicator
    OutcomeStalled { game_type: String, round_id: u64 },
}

/// Token returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscriber<O> = Box<dyn FnMut(&str, &GuidedRound<O>)>;

/// Central per-game-type round container
pub struct GuidanceStore<O> {
    config: EngineConfig,
    rounds: BTreeMap<String, GuidedRound<O>>,
    subscribers: Vec<(SubscriptionId, Subscriber<O>)>,
    next_subscription: u64,
    sinks: Vec<Box<dyn FeedbackSink<O>>>,
    inbox_tx: Sender<Action<O>>,
    inbox_rx: Receiver<Action<O>>,
}

impl<O: Outcome + 'static> GuidanceStore<O> {
    pub fn new(config: EngineConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            config,
            rounds: BTreeMap::new(),
            subscribers: Vec::new(),
            next_subscription: 1,
            sinks: Vec::new(),
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profile(&self, game_type: &str) -> Option<&GameProfile> {
        self.config.game(game_type)
    }

    pub fn round(&self, game_type: &str) -> Option<&GuidedRound<O>> {
        self.rounds.get(game_type)
    }

    /// All slots in stable (sorted) order
    pub fn rounds(&self) -> impl Iterator<Item = (&str, &GuidedRound<O>)> {
        self.rounds.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Register a transient callback; runs after every state-changing action
    pub fn subscribe(&mut self, callback: impl FnMut(&str, &GuidedRound<O>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the id was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn add_sink(&mut self, sink: impl FeedbackSink<O> + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Apply one action. On `Err` the round is unchanged and nobody is notified.
    pub fn dispatch(&mut self, action: Action<O>, now_ms: f64) -> Result<(), Rejected> {
        let game_type = action.game_type().to_string();
        let name = action.name();

        let result = self.apply(action, now_ms);
        match &result {
            Ok(Some(before)) => self.notify(&game_type, before),
            Ok(None) => {}
            Err(err) => log_rejection(name, &game_type, err),
        }
        result.map(|_| ())
    }

    /// Returns the pre-action snapshot when the round changed
    fn apply(&mut self, action: Action<O>, now_ms: f64) -> Result<Option<GuidedRound<O>>, Rejected> {
        let game_type = action.game_type();
        let Some(profile) = self.config.game(game_type) else {
            return Err(Rejected::UnknownGameType(game_type.to_string()));
        };

        if !self.rounds.contains_key(game_type) {
            // Only lifecycle entry points may open a slot
            if !matches!(action, Action::StartRound { .. } | Action::ResetRound { .. }) {
                return Err(Rejected::NoActiveRound);
            }
            let round = GuidedRound::new(0, round_seed(game_type, 0), profile, now_ms);
            self.rounds.insert(game_type.to_string(), round);
        }
        let Some(round) = self.rounds.get_mut(game_type) else {
            return Err(Rejected::UnknownGameType(game_type.to_string()));
        };
        let before = round.clone();

        match action {
            Action::StartRound {
                game_type,
                round_id,
                launch_impulse,
            } => {
                round.start(round_id, round_seed(&game_type, round_id), launch_impulse, now_ms)?;
                log::info!("[{}] round {} started", game_type, round_id);
            }
            Action::SetPhase { phase, .. } => round.set_phase(phase, now_ms)?,
            Action::ReceiveOutcome { outcome, .. } => round.receive_outcome(outcome, now_ms)?,
            Action::RequestSkip { .. } => round.request_skip()?,
            Action::ResetRound {
                game_type,
                round_id,
            } => round.reset(round_id, round_seed(&game_type, round_id), now_ms),
            Action::AbandonRound { game_type } => {
                round.abandon(now_ms)?;
                log::info!("[{}] round {} abandoned", game_type, before.round_id());
            }
            Action::Advance { .. } => round.advance(now_ms),
            Action::CompleteConvergence { .. } => round.complete(now_ms)?,
        }

        Ok((*round != before).then_some(before))
    }

    fn notify(&mut self, game_type: &str, before: &GuidedRound<O>) {
        let Some(after) = self.rounds.get(game_type) else {
            return;
        };

        let mut events = Vec::new();
        if before.phase() != after.phase() || before.round_id() != after.round_id() {
            events.push(GuidanceEvent::PhaseChanged {
                game_type: game_type.to_string(),
                round_id: after.round_id(),
                from: before.phase(),
                to: after.phase(),
            });
        }
        if before.actual_outcome().is_none() {
            if let Some(outcome) = after.actual_outcome() {
                log::info!(
                    "[{}] round {} complete: {:?}",
                    game_type,
                    after.round_id(),
                    outcome
                );
                events.push(GuidanceEvent::RoundComplete {
                    game_type: game_type.to_string(),
                    round_id: after.round_id(),
                    outcome: outcome.clone(),
                });
            }
        }
        if !before.awaiting_outcome() && after.awaiting_outcome() {
            log::warn!(
                "[{}] round {} passed {}ms without an outcome; awaiting",
                game_type,
                after.round_id(),
                after.max_animation_ms()
            );
            events.push(GuidanceEvent::OutcomeStalled {
                game_type: game_type.to_string(),
                round_id: after.round_id(),
            });
        }

        for event in &events {
            for sink in &mut self.sinks {
                sink.on_event(event);
            }
        }
        for (_, callback) in &mut self.subscribers {
            callback(game_type, after);
        }
    }

    // === Named actions ===

    pub fn start_round(
        &mut self,
        game_type: &str,
        round_id: u64,
        launch_impulse: Option<Vec3>,
        now_ms: f64,
    ) -> Result<(), Rejected> {
        self.dispatch(
            Action::StartRound {
                game_type: game_type.to_string(),
                round_id,
                launch_impulse,
            },
            now_ms,
        )
    }

    pub fn set_phase(&mut self, game_type: &str, phase: RoundPhase, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::SetPhase {
                game_type: game_type.to_string(),
                phase,
            },
            now_ms,
        )
    }

    pub fn receive_outcome(&mut self, game_type: &str, outcome: O, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::ReceiveOutcome {
                game_type: game_type.to_string(),
                outcome,
            },
            now_ms,
        )
    }

    pub fn request_skip(&mut self, game_type: &str, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::RequestSkip {
                game_type: game_type.to_string(),
            },
            now_ms,
        )
    }

    pub fn reset_round(&mut self, game_type: &str, round_id: u64, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::ResetRound {
                game_type: game_type.to_string(),
                round_id,
            },
            now_ms,
        )
    }

    pub fn abandon_round(&mut self, game_type: &str, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::AbandonRound {
                game_type: game_type.to_string(),
            },
            now_ms,
        )
    }

    pub fn advance(&mut self, game_type: &str, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::Advance {
                game_type: game_type.to_string(),
            },
            now_ms,
        )
    }

    /// Advance every existing slot
    pub fn advance_all(&mut self, now_ms: f64) {
        let game_types: Vec<String> = self.rounds.keys().cloned().collect();
        for game_type in game_types {
            let _ = self.advance(&game_type, now_ms);
        }
    }

    pub fn complete_convergence(&mut self, game_type: &str, now_ms: f64) -> Result<(), Rejected> {
        self.dispatch(
            Action::CompleteConvergence {
                game_type: game_type.to_string(),
            },
            now_ms,
        )
    }

    // === Message passing ===

    /// Sender for other threads (network, UI)
    pub fn handle(&self) -> GuidanceHandle<O> {
        GuidanceHandle {
            tx: self.inbox_tx.clone(),
        }
    }

    /// Apply queued actions in arrival order; returns how many were accepted
    pub fn drain_inbox(&mut self, now_ms: f64) -> usize {
        let mut accepted = 0;
        while let Ok(action) = self.inbox_rx.try_recv() {
            if self.dispatch(action, now_ms).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }
}

fn log_rejection(action: &str, game_type: &str, err: &Rejected) {
    match err {
        // Phase contract violations are ours to prevent; loud only in dev builds
        Rejected::BackwardTransition { .. }
        | Rejected::SettleWithoutOutcome
        | Rejected::RevealWithoutOutcome
        | Rejected::NotSettling { .. } => {
            if cfg!(debug_assertions) {
                log::warn!("[{}] {} rejected: {}", game_type, action, err);
            }
        }
        Rejected::DuplicateOutcome { .. } | Rejected::NoActiveRound => {
            log::debug!("[{}] {} ignored: {}", game_type, action, err);
        }
        _ => log::warn!("[{}] {} rejected: {}", game_type, action, err),
    }
}

/// Cloneable, thread-safe sender of store actions
///
/// Outcome delivery only ever enqueues; the frame loop applies the message
/// on its next `drain_inbox`, so each round keeps a single writer.
#[derive(Debug)]
pub struct GuidanceHandle<O> {
    tx: Sender<Action<O>>,
}

impl<O> Clone for GuidanceHandle<O> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<O: Outcome> GuidanceHandle<O> {
    pub fn send(&self, action: Action<O>) {
        if self.tx.send(action).is_err() {
            log::warn!("Guidance store dropped; action discarded");
        }
    }

    /// Boundary check: malformed outcomes never reach the store
    pub fn receive_outcome(&self, game_type: &str, outcome: O) -> Result<(), Rejected> {
        if !outcome.is_valid() {
            log::error!("[{}] rejected malformed outcome {:?}", game_type, outcome);
            return Err(Rejected::InvalidOutcome);
        }
        self.send(Action::ReceiveOutcome {
            game_type: game_type.to_string(),
            outcome,
        });
        Ok(())
    }

    pub fn start_round(&self, game_type: &str, round_id: u64, launch_impulse: Option<Vec3>) {
        self.send(Action::StartRound {
            game_type: game_type.to_string(),
            round_id,
            launch_impulse,
        });
    }

    pub fn request_skip(&self, game_type: &str) {
        self.send(Action::RequestSkip {
            game_type: game_type.to_string(),
        });
    }

    pub fn abandon_round(&self, game_type: &str) {
        self.send(Action::AbandonRound {
            game_type: game_type.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingSink;
    use crate::games::DicePair;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> GuidanceStore<DicePair> {
        GuidanceStore::new(EngineConfig::default())
    }

    #[test]
    fn test_unknown_game_type_rejected() {
        let mut store = store();
        let err = store.start_round("pachinko", 1, None, 0.0).unwrap_err();
        assert_eq!(err, Rejected::UnknownGameType("pachinko".to_string()));
        assert!(store.round("pachinko").is_none());
    }

    #[test]
    fn test_actions_before_start_leave_no_slot() {
        let mut store = store();
        assert_eq!(
            store.receive_outcome("craps", DicePair::new(4, 3), 0.0),
            Err(Rejected::NoActiveRound)
        );
        assert_eq!(store.advance("craps", 10.0), Err(Rejected::NoActiveRound));
        assert_eq!(store.request_skip("craps", 10.0), Err(Rejected::NoActiveRound));
        assert!(store.round("craps").is_none());
        assert_eq!(store.rounds().count(), 0);

        store.reset_round("craps", 4, 20.0).unwrap();
        let round = store.round("craps").unwrap();
        assert_eq!(round.phase(), RoundPhase::Idle);
        assert_eq!(round.round_id(), 4);
    }

    #[test]
    fn test_craps_early_outcome_scenario() {
        let mut store = store();
        store.start_round("craps", 7, None, 0.0).unwrap();
        store.set_phase("craps", RoundPhase::Cruise, 16.0).unwrap();
        store.receive_outcome("craps", DicePair::new(4, 3), 900.0).unwrap();

        store.advance("craps", 1000.0).unwrap();
        assert_eq!(store.round("craps").unwrap().phase(), RoundPhase::Cruise);

        store.advance("craps", 1200.0).unwrap();
        let round = store.round("craps").unwrap();
        assert_eq!(round.phase(), RoundPhase::Settle);
        assert_eq!(round.target_outcome(), Some(&DicePair::new(4, 3)));
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = store.subscribe(move |game, round| sink.borrow_mut().push((game.to_string(), round.phase())));

        store.start_round("craps", 1, None, 0.0).unwrap();
        // No time-driven change: no callback
        store.advance("craps", 10.0).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], ("craps".to_string(), RoundPhase::Launch));

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set_phase("craps", RoundPhase::Cruise, 20.0).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_rejected_action_notifies_nobody() {
        let mut store = store();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        store.subscribe(move |_, _| *counter.borrow_mut() += 1);

        store.start_round("craps", 1, None, 0.0).unwrap();
        assert!(store.start_round("craps", 2, None, 5.0).is_err());
        assert!(store.set_phase("craps", RoundPhase::Idle, 6.0).is_err());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(store.round("craps").unwrap().round_id(), 1);
    }

    #[test]
    fn test_events_for_full_round() {
        let mut store = store();
        let sink = RecordingSink::new();
        let events = sink.events();
        store.add_sink(sink);

        store.start_round("craps", 3, None, 0.0).unwrap();
        store.set_phase("craps", RoundPhase::Cruise, 16.0).unwrap();
        store.receive_outcome("craps", DicePair::new(6, 6), 1300.0).unwrap();
        store.complete_convergence("craps", 2000.0).unwrap();

        let events = events.borrow();
        let phases: Vec<RoundPhase> = events
            .iter()
            .filter_map(|e| match e {
                GuidanceEvent::PhaseChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![RoundPhase::Launch, RoundPhase::Cruise, RoundPhase::Settle, RoundPhase::Reveal]
        );
        assert!(events.contains(&GuidanceEvent::RoundComplete {
            game_type: "craps".to_string(),
            round_id: 3,
            outcome: DicePair::new(6, 6),
        }));
    }

    #[test]
    fn test_watchdog_emits_stall_once() {
        let mut store = store();
        let sink = RecordingSink::new();
        let events = sink.events();
        store.add_sink(sink);

        store.start_round("craps", 1, None, 0.0).unwrap();
        store.advance("craps", 6500.0).unwrap();
        store.advance("craps", 7000.0).unwrap();

        let stalls = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, GuidanceEvent::OutcomeStalled { .. }))
            .count();
        assert_eq!(stalls, 1);
        assert!(store.round("craps").unwrap().awaiting_outcome());
    }

    #[test]
    fn test_duplicate_outcome_is_idempotent() {
        let mut store = store();
        store.start_round("craps", 1, None, 0.0).unwrap();
        store.receive_outcome("craps", DicePair::new(1, 2), 1500.0).unwrap();
        let err = store.receive_outcome("craps", DicePair::new(5, 5), 1600.0).unwrap_err();
        assert_eq!(err, Rejected::DuplicateOutcome { round_id: 1 });
        assert_eq!(
            store.round("craps").unwrap().target_outcome(),
            Some(&DicePair::new(1, 2))
        );
    }

    #[test]
    fn test_rounds_are_independent() {
        let mut store = store();
        store.start_round("craps", 1, None, 0.0).unwrap();
        store.start_round("blackjack", 1, None, 0.0).unwrap();
        store.receive_outcome("blackjack", DicePair::new(2, 2), 500.0).unwrap();

        assert_eq!(store.round("blackjack").unwrap().phase(), RoundPhase::Settle);
        assert_eq!(store.round("craps").unwrap().phase(), RoundPhase::Launch);
        assert_ne!(
            store.round("craps").unwrap().seed(),
            store.round("blackjack").unwrap().seed()
        );
        let names: Vec<&str> = store.rounds().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["blackjack", "craps"]);
    }

    #[test]
    fn test_handle_messages_apply_on_drain() {
        let mut store = store();
        let handle = store.handle();
        store.start_round("craps", 1, None, 0.0).unwrap();

        let remote = handle.clone();
        std::thread::spawn(move || {
            remote.receive_outcome("craps", DicePair::new(3, 4)).unwrap();
        })
        .join()
        .unwrap();

        // Nothing applied until the frame loop drains
        assert!(store.round("craps").unwrap().target_outcome().is_none());
        assert_eq!(store.drain_inbox(1500.0), 1);
        assert_eq!(
            store.round("craps").unwrap().target_outcome(),
            Some(&DicePair::new(3, 4))
        );
    }

    #[test]
    fn test_handle_rejects_malformed_outcome() {
        let mut store = store();
        let handle = store.handle();
        store.start_round("craps", 1, None, 0.0).unwrap();
        assert_eq!(
            handle.receive_outcome("craps", DicePair::new(9, 1)),
            Err(Rejected::InvalidOutcome)
        );
        assert_eq!(store.drain_inbox(1500.0), 0);
    }

    #[test]
    fn test_phase_change_event_reports_previous_phase() {
        let mut store = store();
        let sink = RecordingSink::new();
        let events = sink.events();
        store.add_sink(sink);

        store.start_round("craps", 5, None, 0.0).unwrap();
        store.set_phase("craps", RoundPhase::Cruise, 16.0).unwrap();
        assert_eq!(
            events.borrow().last(),
            Some(&GuidanceEvent::PhaseChanged {
                game_type: "craps".to_string(),
                round_id: 5,
                from: RoundPhase::Launch,
                to: RoundPhase::Cruise,
            })
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "invalid outcome")]
    fn test_invalid_outcome_asserts_in_debug() {
        let mut store = store();
        store.start_round("craps", 1, None, 0.0).unwrap();
        let _ = store.receive_outcome("craps", DicePair::new(0, 0), 1500.0);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_invalid_outcome_ignored_in_release() {
        let mut store = store();
        store.start_round("craps", 1, None, 0.0).unwrap();
        assert_eq!(
            store.receive_outcome("craps", DicePair::new(0, 0), 1500.0),
            Err(Rejected::InvalidOutcome)
        );
        assert!(store.round("craps").unwrap().target_outcome().is_none());
    }

    #[test]
    fn test_abandon_drops_outcome_state() {
        let mut store = store();
        store.start_round("craps", 1, None, 0.0).unwrap();
        store.receive_outcome("craps", DicePair::new(2, 5), 100.0).unwrap();
        store.abandon_round("craps", 200.0).unwrap();
        let round = store.round("craps").unwrap();
        assert_eq!(round.phase(), RoundPhase::Idle);
        assert!(round.pending_outcome().is_none());
        // Slot is immediately reusable even though craps blocks
        store.start_round("craps", 2, None, 300.0).unwrap();
    }
}
