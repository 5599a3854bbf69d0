//! Registry of independent training sessions plus their tokio drivers.
//!
//! Every session gets its own slow-tick task; session state is only ever
//! touched under its own mutex, so sessions never contend with each other.
//! A detaching player evicts its session from the registry immediately; the
//! periodic reaper collects sessions that never saw a player within the idle
//! timeout. Lock order is always session first, registry second.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::arena::ArenaConfig;
use crate::constants::tick::SLOW_TICK_MS;
use crate::constants::training::{IDLE_TIMEOUT, SWEEP_INTERVAL};
use crate::metrics::Metrics;
use crate::training::session::TrainingSession;

pub type SessionHandle = Arc<Mutex<TrainingSession>>;

#[derive(Clone)]
pub struct SessionMultiplexer {
    sessions: Arc<Mutex<HashMap<Uuid, SessionHandle>>>,
    arena_config: ArenaConfig,
    metrics: Arc<Metrics>,
}

impl SessionMultiplexer {
    pub fn new(arena_config: ArenaConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            arena_config,
            metrics,
        }
    }

    /// Create and register a fresh session for one incoming training
    /// connection. The session evicts itself from the registry the moment
    /// its player detaches.
    pub fn open_session(&self, bot_count: usize, now: Instant) -> SessionHandle {
        let id = Uuid::new_v4();
        let mut session = TrainingSession::new(id, self.arena_config, bot_count, now);

        let registry = self.sessions.clone();
        let metrics = self.metrics.clone();
        session.set_on_empty(move || {
            let remaining = {
                let mut sessions = registry.lock();
                sessions.remove(&id);
                sessions.len()
            };
            metrics
                .training_sessions
                .store(remaining as u64, Ordering::Relaxed);
            debug!(session = %id, "emptied training session evicted");
        });

        let handle = Arc::new(Mutex::new(session));
        let count = {
            let mut sessions = self.sessions.lock();
            sessions.insert(id, handle.clone());
            sessions.len()
        };
        self.metrics
            .training_sessions
            .store(count as u64, Ordering::Relaxed);
        info!(session = %id, bot_count, "training session opened");
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.lock().get(&id).cloned()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Destroy and evict sessions that never saw a player within the idle
    /// timeout. Detach-driven eviction handles the sessions that did.
    pub fn sweep(&self, now: Instant) {
        let candidates: Vec<(Uuid, SessionHandle)> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in candidates {
            let mut session = handle.lock();
            if session.is_empty() && session.idle_for(now) >= IDLE_TIMEOUT {
                debug!(session = %id, "reaping idle training session");
                session.destroy();
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            let remaining = {
                let mut sessions = self.sessions.lock();
                for id in &expired {
                    sessions.remove(id);
                }
                sessions.len()
            };
            self.metrics
                .training_sessions_reaped
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
            self.metrics
                .training_sessions
                .store(remaining as u64, Ordering::Relaxed);
        }
    }

    /// Tear down everything, e.g. on server shutdown.
    pub fn destroy_all(&self) {
        let drained: Vec<SessionHandle> = self.sessions.lock().drain().map(|(_, h)| h).collect();
        for handle in drained {
            handle.lock().destroy();
        }
        self.metrics.training_sessions.store(0, Ordering::Relaxed);
    }

    /// Spawn the slow-tick driver for one session. The task exits on its own
    /// once the session is destroyed.
    pub fn spawn_session_driver(handle: SessionHandle) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(SLOW_TICK_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let mut session = handle.lock();
                if session.is_destroyed() {
                    break;
                }
                session.tick();
            }
        })
    }

    /// Spawn the periodic idle-session reaper.
    pub fn spawn_reaper(&self) -> tokio::task::JoinHandle<()> {
        let multiplexer = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                multiplexer.sweep(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::link::BotLink;

    fn multiplexer() -> SessionMultiplexer {
        SessionMultiplexer::new(ArenaConfig::default(), Arc::new(Metrics::new()))
    }

    fn attach(handle: &SessionHandle) {
        handle
            .lock()
            .attach_player(Arc::new(BotLink::new(0)), "trainee".to_string(), 1)
            .unwrap();
    }

    #[test]
    fn test_open_and_lookup() {
        let mux = multiplexer();
        let t0 = Instant::now();
        let handle = mux.open_session(2, t0);
        let id = handle.lock().id();

        assert_eq!(mux.active_session_count(), 1);
        assert!(mux.get(id).is_some());
        assert!(mux.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_detach_evicts_session_immediately() {
        let mux = multiplexer();
        let t0 = Instant::now();
        let handle = mux.open_session(2, t0);
        attach(&handle);
        assert_eq!(mux.active_session_count(), 1);

        handle.lock().detach_player(t0 + Duration::from_secs(30));

        assert_eq!(mux.active_session_count(), 0);
        assert!(handle.lock().is_destroyed());
        assert_eq!(mux.metrics.training_sessions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_sweep_reaps_never_attached_sessions() {
        let mux = multiplexer();
        let t0 = Instant::now();
        let handle = mux.open_session(0, t0);

        // Not idle long enough yet.
        mux.sweep(t0 + IDLE_TIMEOUT - Duration::from_secs(1));
        assert_eq!(mux.active_session_count(), 1);

        mux.sweep(t0 + IDLE_TIMEOUT);
        assert_eq!(mux.active_session_count(), 0);
        assert!(handle.lock().is_destroyed());
        assert_eq!(
            mux.metrics
                .training_sessions_reaped
                .load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_detached_session_absent_at_later_sweep() {
        let mux = multiplexer();
        let t0 = Instant::now();
        let handle = mux.open_session(2, t0);
        attach(&handle);
        handle.lock().detach_player(t0 + Duration::from_secs(10));

        mux.sweep(t0 + Duration::from_secs(10) + IDLE_TIMEOUT + Duration::from_millis(50));
        assert_eq!(mux.active_session_count(), 0);
    }

    #[test]
    fn test_occupied_sessions_survive_sweeps() {
        let mux = multiplexer();
        let t0 = Instant::now();
        let handle = mux.open_session(1, t0);
        attach(&handle);

        mux.sweep(t0 + IDLE_TIMEOUT * 10);
        assert_eq!(mux.active_session_count(), 1);
    }

    #[test]
    fn test_session_gauge_tracks_registry() {
        let mux = multiplexer();
        let t0 = Instant::now();
        mux.open_session(1, t0);
        mux.open_session(2, t0);
        assert_eq!(mux.metrics.training_sessions.load(Ordering::Relaxed), 2);

        mux.destroy_all();
        assert_eq!(mux.active_session_count(), 0);
        assert_eq!(mux.metrics.training_sessions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_destroy_all() {
        let mux = multiplexer();
        let t0 = Instant::now();
        let a = mux.open_session(1, t0);
        let b = mux.open_session(2, t0);

        mux.destroy_all();

        assert_eq!(mux.active_session_count(), 0);
        assert!(a.lock().is_destroyed());
        assert!(b.lock().is_destroyed());
    }
}
