//! One isolated single-player training arena with its own bot population.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::arena::{ArenaConfig, ArenaEngine, AuthStub, GridArena, PlayerId, PlayerOptions};
use crate::bots::BotPopulationController;
use crate::constants::training::MAX_BOTS;
use crate::net::connection::{Connection, ConnectionId};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("session already has a player attached")]
    Occupied,
    #[error("session has been destroyed")]
    Destroyed,
}

pub struct TrainingSession {
    id: Uuid,
    arena: GridArena,
    bots: BotPopulationController,
    /// Requested bot population, applied while a player is attached.
    bot_count: usize,
    player: Option<(ConnectionId, PlayerId)>,
    /// Start of the current playerless stretch.
    idle_since: Instant,
    /// Fired once when the single player detaches.
    on_empty: Option<Box<dyn Fn() + Send>>,
    destroyed: bool,
}

impl TrainingSession {
    pub fn new(id: Uuid, config: ArenaConfig, bot_count: usize, now: Instant) -> Self {
        let bot_count = bot_count.min(MAX_BOTS);
        Self {
            id,
            arena: GridArena::new(config),
            bots: BotPopulationController::new(),
            bot_count,
            player: None,
            idle_since: now,
            on_empty: None,
            destroyed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.player.is_none()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn active_bot_count(&self) -> usize {
        self.bots.active_count()
    }

    /// Hook fired when the player detaches; the multiplexer uses it to evict
    /// the session from the live registry.
    pub fn set_on_empty(&mut self, callback: impl Fn() + Send + 'static) {
        self.on_empty = Some(Box::new(callback));
    }

    /// How long the session has sat without a player. Zero while occupied.
    pub fn idle_for(&self, now: Instant) -> Duration {
        if self.player.is_some() {
            Duration::ZERO
        } else {
            now.saturating_duration_since(self.idle_since)
        }
    }

    /// Put the training player into the arena and spin up its opponents.
    /// A session hosts exactly one player at a time.
    pub fn attach_player(
        &mut self,
        conn: Arc<dyn Connection>,
        name: String,
        color_id: u8,
    ) -> Result<PlayerId, TrainingError> {
        if self.destroyed {
            return Err(TrainingError::Destroyed);
        }
        if self.player.is_some() {
            return Err(TrainingError::Occupied);
        }

        let conn_id = conn.info().id;
        let player = self.arena.create_player(
            conn,
            PlayerOptions {
                name,
                color_id,
                spectator: false,
                auth: AuthStub::default(),
            },
        );
        self.player = Some((conn_id, player));
        self.bots.set_target_count(&mut self.arena, self.bot_count);
        info!(session = %self.id, conn = conn_id, bots = self.bot_count, "training player attached");
        Ok(player)
    }

    /// Remove the player, retire the bots and tear the session down. Fires
    /// the `on_empty` hook so the owner can drop its reference; the tick
    /// driver exits on its own once the session is destroyed.
    pub fn detach_player(&mut self, now: Instant) {
        if let Some((conn_id, player)) = self.player.take() {
            debug!(session = %self.id, conn = conn_id, "training player detached");
            self.arena.remove_player(player);
            self.bots.clear(&mut self.arena);
            self.idle_since = now;
            if let Some(on_empty) = &self.on_empty {
                on_empty();
            }
            self.destroy();
        }
    }

    /// One slow tick: advance the arena, then let the bots react.
    pub fn tick(&mut self) {
        if self.destroyed {
            return;
        }
        self.arena.step();
        self.bots.loop_tick(&mut self.arena);
    }

    /// Tear the session down. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some((_, player)) = self.player.take() {
            self.arena.remove_player(player);
        }
        self.bots.clear(&mut self.arena);
        info!(session = %self.id, "training session destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::link::BotLink;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn session(bot_count: usize, now: Instant) -> TrainingSession {
        TrainingSession::new(Uuid::new_v4(), ArenaConfig::default(), bot_count, now)
    }

    fn conn() -> Arc<BotLink> {
        Arc::new(BotLink::new(0))
    }

    #[test]
    fn test_attach_spins_up_bots() {
        let now = Instant::now();
        let mut s = session(2, now);
        assert!(s.is_empty());

        s.attach_player(conn(), "trainee".to_string(), 1).unwrap();

        assert!(!s.is_empty());
        assert_eq!(s.active_bot_count(), 2);
        assert_eq!(s.idle_for(now + Duration::from_secs(60)), Duration::ZERO);
    }

    #[test]
    fn test_second_attach_is_rejected() {
        let mut s = session(1, Instant::now());
        s.attach_player(conn(), "one".to_string(), 1).unwrap();
        assert!(matches!(
            s.attach_player(conn(), "two".to_string(), 2),
            Err(TrainingError::Occupied)
        ));
    }

    #[test]
    fn test_detach_retires_bots_and_destroys() {
        let t0 = Instant::now();
        let mut s = session(3, t0);
        s.attach_player(conn(), "trainee".to_string(), 1).unwrap();

        s.detach_player(t0 + Duration::from_secs(30));

        assert!(s.is_empty());
        assert!(s.is_destroyed());
        assert_eq!(s.active_bot_count(), 0);
    }

    #[test]
    fn test_detach_fires_on_empty_once() {
        let t0 = Instant::now();
        let mut s = session(1, t0);
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        s.set_on_empty(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        s.attach_player(conn(), "trainee".to_string(), 1).unwrap();
        s.detach_player(t0 + Duration::from_secs(1));
        // Detaching an already empty session is a no-op.
        s.detach_player(t0 + Duration::from_secs(2));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_idle_clock_runs_while_unattached() {
        let t0 = Instant::now();
        let s = session(2, t0);
        assert_eq!(
            s.idle_for(t0 + Duration::from_secs(90)),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_bot_count_is_clamped() {
        let mut s = session(50, Instant::now());
        s.attach_player(conn(), "trainee".to_string(), 1).unwrap();
        assert_eq!(s.active_bot_count(), MAX_BOTS);
    }

    #[test]
    fn test_ticks_drive_bots() {
        let mut s = session(2, Instant::now());
        s.attach_player(conn(), "trainee".to_string(), 1).unwrap();

        for _ in 0..20 {
            s.tick();
        }
        assert_eq!(s.active_bot_count(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut s = session(2, Instant::now());
        s.attach_player(conn(), "trainee".to_string(), 1).unwrap();

        s.destroy();
        s.destroy();

        assert!(s.is_destroyed());
        assert_eq!(s.active_bot_count(), 0);
        assert!(matches!(
            s.attach_player(conn(), "late".to_string(), 1),
            Err(TrainingError::Destroyed)
        ));
        // Ticking a destroyed session is a no-op.
        s.tick();
    }
}
