//! Stub connection backing a bot: same interface as a real transport
//! endpoint, no I/O, and a close callback that fires exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::lobby::status::{MatchState, MatchStatus};
use crate::net::connection::{Connection, ConnectionId, PlayerInfo};

type CloseCallback = Box<dyn FnOnce() + Send>;

pub struct BotLink {
    info: PlayerInfo,
    closed: AtomicBool,
    on_close: Mutex<Option<CloseCallback>>,
}

impl BotLink {
    pub fn new(bot_id: u32) -> Self {
        Self {
            info: PlayerInfo {
                // Bot ids live outside the range the transport hands out.
                id: u64::MAX - bot_id as u64,
                name: format!("Bot-{bot_id}"),
                color_id: 1 + (bot_id % 6) as u8,
            },
            closed: AtomicBool::new(false),
            on_close: Mutex::new(None),
        }
    }

    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        *self.on_close.lock() = Some(Box::new(callback));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn id(&self) -> ConnectionId {
        self.info.id
    }
}

impl Connection for BotLink {
    fn info(&self) -> PlayerInfo {
        self.info.clone()
    }

    fn set_lobby_state(&self, _state: MatchState, _status: &MatchStatus) {}

    fn enable_gameplay(&self, _status: &MatchStatus) {}

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Some(callback) = self.on_close.lock().take() {
                callback();
            }
        }
    }
}
