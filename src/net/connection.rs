//! The transport-facing connection seam.
//!
//! The wire protocol and socket handling live in the host server; this crate
//! only pushes lobby state and gameplay activation through this trait. Bots
//! plug in with the no-I/O [`crate::bots::link::BotLink`] implementation.

use serde::{Deserialize, Serialize};

use crate::lobby::status::{MatchState, MatchStatus};

/// Stable identity of one transport endpoint.
pub type ConnectionId = u64;

/// Identity snapshot of the player behind a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: ConnectionId,
    pub name: String,
    /// Skin color index shown in rosters and reveals.
    pub color_id: u8,
}

/// One transport endpoint, owned by the host server and referenced here.
pub trait Connection: Send + Sync {
    fn info(&self) -> PlayerInfo;

    /// Push a lobby-state notification with the current match status.
    fn set_lobby_state(&self, state: MatchState, status: &MatchStatus);

    /// Tell the client its slot is live and gameplay may begin.
    fn enable_gameplay(&self, status: &MatchStatus);

    /// Close the transport. Must be safe to call more than once.
    fn close(&self);
}
