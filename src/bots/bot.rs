//! One autonomous arena participant: a stub connection, an arena player and
//! a decision engine, driven from the slow tick.

use std::sync::Arc;

use tracing::debug;

use crate::arena::{ArenaEngine, AuthStub, PlayerId, PlayerOptions};
use crate::bots::engine::BotDecisionEngine;
use crate::bots::link::BotLink;
use crate::net::connection::Connection;
use crate::util::grid::Direction;

pub struct Bot {
    id: u32,
    link: Arc<BotLink>,
    player: PlayerId,
    engine: BotDecisionEngine,
}

impl Bot {
    /// Create the bot's player in the arena and wire up its decision engine.
    pub fn spawn(arena: &mut dyn ArenaEngine, id: u32) -> Self {
        let link = Arc::new(BotLink::new(id));
        let info = link.info();
        let player = arena.create_player(
            link.clone(),
            PlayerOptions {
                name: info.name,
                color_id: info.color_id,
                spectator: false,
                auth: AuthStub {
                    is_bot: true,
                    has_extra_life: false,
                    user_id: None,
                },
            },
        );
        let initial = arena.direction_of(player).unwrap_or(Direction::Right);
        debug!(bot = id, player = %player, "bot spawned");
        Self {
            id,
            link,
            player,
            engine: BotDecisionEngine::new(player, initial),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn player_id(&self) -> PlayerId {
        self.player
    }

    /// A bot stays active until its link closes or its player runs out of
    /// lives. Temporary (respawnable) death does not retire it.
    pub fn is_active(&self, arena: &dyn ArenaEngine) -> bool {
        !self.link.is_closed() && !arena.is_permanently_dead(self.player)
    }

    /// Run one decision step and hand the resulting intent to the engine.
    pub fn update(&mut self, arena: &mut dyn ArenaEngine) {
        if arena.is_dead(self.player) {
            return;
        }
        let pos = match arena.position_of(self.player) {
            Some(p) => p,
            None => return,
        };
        let dir = self.engine.update(&*arena);
        arena.request_move(self.player, dir, pos);
    }

    /// Remove the bot's player from the arena and close its link.
    pub fn destroy(self, arena: &mut dyn ArenaEngine) {
        debug!(bot = self.id, "destroying bot");
        arena.remove_player(self.player);
        self.link.close();
    }
}
