//! Match lifecycle state machine.
//!
//! Pools incoming connections, enforces bet homogeneity, runs the
//! countdown/reveal timers, fills open match slots from the waiting pool and
//! the bot controller, and detects single-survivor wins. All timing flows in
//! through explicit `now` arguments; the surrounding driver polls `tick`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::arena::{ArenaEngine, PlayerId};
use crate::bots::BotPopulationController;
use crate::config::MatchConfig;
use crate::constants::lobby::REVEAL_DURATION_MS;
use crate::lobby::status::{MatchState, MatchStatus};
use crate::metrics::Metrics;
use crate::net::connection::{Connection, ConnectionId, PlayerInfo};
use crate::util::timer::ScheduledTask;

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The match already carries a different bet amount. The offending
    /// connection has been closed.
    #[error("bet mismatch: match is locked to {expected:?}")]
    BetMismatch { expected: Option<u64> },
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

pub struct MatchOrchestrator {
    config: MatchConfig,
    state: MatchState,
    waiting: HashMap<ConnectionId, Arc<dyn Connection>>,
    active: HashMap<ConnectionId, Arc<dyn Connection>>,
    bet: Option<u64>,
    bet_fixed: bool,
    countdown: ScheduledTask,
    reveal: ScheduledTask,
    /// Participant identities frozen at the countdown-to-versus transition.
    reveal_roster: Vec<PlayerInfo>,
    /// Set once the match formally starts; freezes the bot count.
    started: bool,
    metrics: Arc<Metrics>,
}

impl MatchOrchestrator {
    pub fn new(config: MatchConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            state: MatchState::Idle,
            waiting: HashMap::new(),
            active: HashMap::new(),
            bet: None,
            bet_fixed: false,
            countdown: ScheduledTask::idle(),
            reveal: ScheduledTask::idle(),
            reveal_roster: Vec::new(),
            started: false,
            metrics,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Active human connections; bots are counted by the controller.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn bet_amount(&self) -> Option<u64> {
        self.bet
    }

    /// Add a connection to the waiting pool.
    ///
    /// The first joiner fixes the match's bet amount (including "no bet");
    /// later joiners must match it exactly or are closed and rejected.
    pub fn register_connection(
        &mut self,
        conn: Arc<dyn Connection>,
        bet: Option<u64>,
        bots: &mut BotPopulationController,
        arena: &mut dyn ArenaEngine,
        now: Instant,
    ) -> Result<(), RegistrationError> {
        let info = conn.info();
        if self.waiting.contains_key(&info.id) || self.active.contains_key(&info.id) {
            return Err(RegistrationError::AlreadyRegistered(info.id));
        }

        if self.bet_fixed && bet != self.bet {
            warn!(conn = info.id, ?bet, expected = ?self.bet, "bet mismatch, closing connection");
            conn.close();
            return Err(RegistrationError::BetMismatch { expected: self.bet });
        }
        if !self.bet_fixed {
            self.bet = bet;
            self.bet_fixed = true;
        }

        info!(conn = info.id, name = %info.name, ?bet, "connection registered");
        self.waiting.insert(info.id, conn);

        if self.state == MatchState::Active {
            self.fill_open_slots(bots, arena, false, now);
        }
        self.maybe_start_countdown(now);
        self.broadcast(bots, now);
        Ok(())
    }

    /// Move a connection from waiting to active once the arena engine has
    /// confirmed a player object exists for it.
    pub fn notify_player_joined(
        &mut self,
        id: ConnectionId,
        bots: &BotPopulationController,
        now: Instant,
    ) {
        if let Some(conn) = self.waiting.remove(&id) {
            debug!(conn = id, "player joined, promoting to active pool");
            self.active.insert(id, conn);
            self.broadcast(bots, now);
        }
    }

    /// Drop a connection from whichever pool holds it and rebalance.
    pub fn handle_connection_closed(
        &mut self,
        id: ConnectionId,
        bots: &mut BotPopulationController,
        arena: &mut dyn ArenaEngine,
        now: Instant,
    ) {
        let in_waiting = self.waiting.remove(&id).is_some();
        let in_active = self.active.remove(&id).is_some();
        if !in_waiting && !in_active {
            return;
        }
        debug!(conn = id, in_waiting, "connection closed");

        if self.state == MatchState::Active && self.active.is_empty() {
            info!("last active connection left, resetting match");
            self.reset_to_idle(bots, arena);
        }

        if self.state == MatchState::Countdown && self.waiting.len() < self.config.min_players {
            info!(
                waiting = self.waiting.len(),
                min = self.config.min_players,
                "countdown cancelled"
            );
            self.countdown.cancel();
            self.state = MatchState::Idle;
        }

        // A fully drained match forgets its bet.
        if self.waiting.is_empty() && self.active.is_empty() {
            self.bet = None;
            self.bet_fixed = false;
        }

        if self.state == MatchState::Active {
            self.fill_open_slots(bots, arena, false, now);
        }
        self.maybe_start_countdown(now);
        self.broadcast(bots, now);
    }

    /// Called when a player entity dies while its connection persists.
    /// Checks for a single remaining human survivor and signals the win.
    /// Never refills slots; bots must not appear to replace eliminated
    /// players mid-match.
    pub fn handle_player_removed(
        &mut self,
        bots: &BotPopulationController,
        arena: &mut dyn ArenaEngine,
    ) {
        if self.state != MatchState::Active || !self.started {
            return;
        }
        let survivors: Vec<PlayerId> = arena
            .alive_players()
            .into_iter()
            .filter(|id| !bots.contains(*id))
            .collect();
        if let [winner] = survivors[..] {
            info!(player = %winner, "single survivor, match won");
            arena.notify_victory(winner);
        }
    }

    /// Poll the countdown and reveal timers. Driven from the slow tick.
    pub fn tick(
        &mut self,
        bots: &mut BotPopulationController,
        arena: &mut dyn ArenaEngine,
        now: Instant,
    ) {
        if self.countdown.fire(now) {
            if self.waiting.len() >= self.config.min_players {
                self.state = MatchState::Versus;
                self.reveal_roster = self
                    .waiting
                    .values()
                    .take(self.config.max_players)
                    .map(|c| c.info())
                    .collect();
                self.reveal
                    .schedule(now, Duration::from_millis(REVEAL_DURATION_MS));
                info!(roster = self.reveal_roster.len(), "countdown elapsed, revealing match");
            } else {
                self.state = MatchState::Idle;
            }
            self.broadcast(bots, now);
        }

        if self.reveal.fire(now) {
            if self.waiting.len() >= self.config.min_players {
                self.begin_match(bots, arena, now);
            } else {
                info!("waiting pool drained during reveal, back to idle");
                self.state = MatchState::Idle;
                self.reveal_roster.clear();
                self.broadcast(bots, now);
            }
        }
    }

    fn begin_match(
        &mut self,
        bots: &mut BotPopulationController,
        arena: &mut dyn ArenaEngine,
        now: Instant,
    ) {
        self.state = MatchState::Active;
        self.fill_open_slots(bots, arena, true, now);
        self.started = true;
        self.reveal_roster.clear();
        self.metrics.matches_started.fetch_add(1, Ordering::Relaxed);
        info!(
            active = self.active.len(),
            bots = bots.active_count(),
            bet = ?self.bet,
            "match started"
        );
        self.broadcast(bots, now);
    }

    /// Move waiting connections into open active slots.
    ///
    /// Without `allow_min_fill` the pool only tops up a match that already
    /// has at least one active connection. The bot target is recomputed from
    /// the post-fill active count, but only until the match formally starts;
    /// after that the bot count is frozen.
    fn fill_open_slots(
        &mut self,
        bots: &mut BotPopulationController,
        arena: &mut dyn ArenaEngine,
        allow_min_fill: bool,
        now: Instant,
    ) {
        while !self.waiting.is_empty()
            && self.active.len() + bots.active_count() < self.config.max_players
            && (allow_min_fill || !self.active.is_empty())
        {
            let id = match self.waiting.keys().next().copied() {
                Some(id) => id,
                None => break,
            };
            let conn = match self.waiting.remove(&id) {
                Some(conn) => conn,
                None => break,
            };
            self.active.insert(id, conn.clone());
            let status = self.status(bots, now);
            conn.enable_gameplay(&status);
            debug!(conn = id, "slot filled");
        }

        if self.active.is_empty() && self.state == MatchState::Active {
            self.state = MatchState::Idle;
        }

        if !self.started {
            let target = self
                .config
                .min_players
                .min(self.config.max_players)
                .saturating_sub(self.active.len());
            bots.set_target_count(arena, target);
        }
    }

    fn maybe_start_countdown(&mut self, now: Instant) {
        if self.state == MatchState::Idle && self.waiting.len() >= self.config.min_players {
            self.state = MatchState::Countdown;
            self.countdown.schedule(now, self.config.countdown);
            info!(
                waiting = self.waiting.len(),
                countdown_ms = self.config.countdown.as_millis() as u64,
                "countdown started"
            );
        }
    }

    fn reset_to_idle(&mut self, bots: &mut BotPopulationController, arena: &mut dyn ArenaEngine) {
        self.state = MatchState::Idle;
        self.started = false;
        self.reveal_roster.clear();
        self.countdown.cancel();
        self.reveal.cancel();
        bots.clear(arena);
    }

    fn status(&self, bots: &BotPopulationController, now: Instant) -> MatchStatus {
        let participants = if self.state == MatchState::Versus {
            self.reveal_roster.clone()
        } else {
            self.waiting
                .values()
                .chain(self.active.values())
                .map(|c| c.info())
                .collect()
        };
        MatchStatus {
            state: self.state,
            waiting_count: self.waiting.len(),
            active_count: self.active.len() + bots.active_count(),
            bot_count: bots.active_count(),
            min_players: self.config.min_players,
            max_players: self.config.max_players,
            bet_amount: self.bet,
            countdown_seconds: self.countdown.remaining(now).map(|d| d.as_secs()),
            participants,
        }
    }

    fn broadcast(&self, bots: &BotPopulationController, now: Instant) {
        let status = self.status(bots, now);
        for conn in self.waiting.values() {
            conn.set_lobby_state(self.state, &status);
        }
        for conn in self.active.values() {
            conn.set_lobby_state(MatchState::Active, &status);
        }

        self.metrics
            .waiting_connections
            .store(self.waiting.len() as u64, Ordering::Relaxed);
        self.metrics
            .active_connections
            .store(self.active.len() as u64, Ordering::Relaxed);
        self.metrics
            .human_players
            .store(self.active.len() as u64, Ordering::Relaxed);
        self.metrics
            .bot_players
            .store(bots.active_count() as u64, Ordering::Relaxed);
        self.metrics
            .match_state
            .store(self.state.as_gauge(), Ordering::Relaxed);
    }
}
