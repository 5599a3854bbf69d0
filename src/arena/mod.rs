//! The narrow interface this subsystem consumes from the arena engine.
//!
//! The real tile/territory engine (capture rules, multi-player collision,
//! scoring) lives outside this crate; matchmaking and bots only touch it
//! through [`ArenaEngine`]. [`GridArena`] is a reduced in-crate engine used by
//! training sessions, the soak binary and tests.

pub mod grid;

use std::sync::Arc;
use uuid::Uuid;

use crate::net::connection::Connection;
use crate::util::grid::{Direction, GridPos, GridRect};

pub use grid::{ArenaConfig, GridArena};

/// Handle to a player entity inside the arena engine.
pub type PlayerId = Uuid;

/// Authentication snapshot passed through to the engine on player creation.
#[derive(Debug, Clone, Default)]
pub struct AuthStub {
    pub is_bot: bool,
    pub has_extra_life: bool,
    pub user_id: Option<String>,
}

/// Options for creating a player in the arena.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub name: String,
    pub color_id: u8,
    pub spectator: bool,
    pub auth: AuthStub,
}

/// Result of a tile ownership lookup. Out-of-range coordinates are a value,
/// not an error; bot reasoning treats `Invalid` as unsafe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileQuery {
    Owned(PlayerId),
    Unowned,
    Invalid,
}

impl TileQuery {
    #[inline]
    pub fn is_owned_by(self, id: PlayerId) -> bool {
        matches!(self, TileQuery::Owned(owner) if owner == id)
    }
}

/// Everything the matchmaking and bot subsystems ask of the arena engine.
pub trait ArenaEngine: Send {
    fn create_player(&mut self, conn: Arc<dyn Connection>, opts: PlayerOptions) -> PlayerId;
    fn remove_player(&mut self, id: PlayerId);

    fn alive_players(&self) -> Vec<PlayerId>;
    /// Players (alive or dead-but-respawnable) within `radius` tiles of `pos`,
    /// used for threat detection.
    fn players_near(&self, pos: GridPos, radius: f32) -> Vec<PlayerId>;

    fn position_of(&self, id: PlayerId) -> Option<GridPos>;
    fn direction_of(&self, id: PlayerId) -> Option<Direction>;
    /// The cells traversed since the player last left owned territory.
    fn trail_of(&self, id: PlayerId) -> Vec<GridPos>;

    fn tile_owner(&self, pos: GridPos) -> TileQuery;
    fn bounds(&self) -> GridRect;

    fn is_dead(&self, id: PlayerId) -> bool;
    fn is_permanently_dead(&self, id: PlayerId) -> bool;

    /// Ask the engine to apply a direction change for `id`. The engine stays
    /// authoritative over the actual position.
    fn request_move(&mut self, id: PlayerId, dir: Direction, pos: GridPos);

    /// Signal that `id` won the match; delivery to the client is the
    /// engine/transport's concern.
    fn notify_victory(&mut self, id: PlayerId);
}
