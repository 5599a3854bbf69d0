//! Keeps one arena's bot population converged on a target count.

use tracing::{debug, info};

use crate::arena::{ArenaEngine, PlayerId};
use crate::bots::bot::Bot;

pub struct BotPopulationController {
    bots: Vec<Bot>,
    target: usize,
    next_bot_id: u32,
}

impl Default for BotPopulationController {
    fn default() -> Self {
        Self::new()
    }
}

impl BotPopulationController {
    pub fn new() -> Self {
        Self {
            bots: Vec::new(),
            target: 0,
            next_bot_id: 1,
        }
    }

    /// Set the desired population and reconcile immediately.
    pub fn set_target_count(&mut self, arena: &mut dyn ArenaEngine, target: usize) {
        if self.target != target {
            info!(target, current = self.bots.len(), "bot target count changed");
        }
        self.target = target;
        self.reconcile(arena);
    }

    pub fn target_count(&self) -> usize {
        self.target
    }

    pub fn active_count(&self) -> usize {
        self.bots.len()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.bots.iter().map(|b| b.player_id()).collect()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.bots.iter().any(|b| b.player_id() == player)
    }

    /// Per-tick maintenance: retire bots whose link closed or whose player is
    /// permanently dead, drive the survivors, then converge back on the
    /// target.
    pub fn loop_tick(&mut self, arena: &mut dyn ArenaEngine) {
        let mut kept = Vec::with_capacity(self.bots.len());
        for bot in self.bots.drain(..) {
            if bot.is_active(&*arena) {
                kept.push(bot);
            } else {
                debug!(bot = bot.id(), "retiring inactive bot");
                bot.destroy(arena);
            }
        }
        self.bots = kept;

        for bot in &mut self.bots {
            bot.update(arena);
        }

        self.reconcile(arena);
    }

    /// Retire every bot and drop the target to zero.
    pub fn clear(&mut self, arena: &mut dyn ArenaEngine) {
        self.target = 0;
        for bot in self.bots.drain(..) {
            bot.destroy(arena);
        }
    }

    fn reconcile(&mut self, arena: &mut dyn ArenaEngine) {
        while self.bots.len() > self.target {
            if let Some(bot) = self.bots.pop() {
                bot.destroy(arena);
            }
        }
        while self.bots.len() < self.target {
            let id = self.next_bot_id;
            self.next_bot_id += 1;
            self.bots.push(Bot::spawn(arena, id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{ArenaConfig, GridArena};

    fn test_arena() -> GridArena {
        GridArena::new(ArenaConfig {
            width: 60,
            height: 60,
        })
    }

    #[test]
    fn test_converges_on_target() {
        let mut arena = test_arena();
        let mut bots = BotPopulationController::new();

        bots.set_target_count(&mut arena, 3);
        assert_eq!(bots.active_count(), 3);
        assert_eq!(arena.bot_count(), 3);

        bots.set_target_count(&mut arena, 1);
        assert_eq!(bots.active_count(), 1);
        assert_eq!(arena.bot_count(), 1);
    }

    #[test]
    fn test_loop_tick_holds_population_steady() {
        let mut arena = test_arena();
        let mut bots = BotPopulationController::new();
        bots.set_target_count(&mut arena, 2);

        for _ in 0..50 {
            arena.step();
            bots.loop_tick(&mut arena);
            assert_eq!(bots.active_count(), 2);
        }
    }

    #[test]
    fn test_clear_retires_everything() {
        let mut arena = test_arena();
        let mut bots = BotPopulationController::new();
        bots.set_target_count(&mut arena, 4);

        bots.clear(&mut arena);

        assert_eq!(bots.active_count(), 0);
        assert_eq!(bots.target_count(), 0);
        assert_eq!(arena.bot_count(), 0);

        // A later tick must not resurrect anything.
        bots.loop_tick(&mut arena);
        assert_eq!(bots.active_count(), 0);
    }

    #[test]
    fn test_player_ids_track_population() {
        let mut arena = test_arena();
        let mut bots = BotPopulationController::new();
        bots.set_target_count(&mut arena, 2);

        let ids = bots.player_ids();
        assert_eq!(ids.len(), 2);
        for id in ids {
            assert!(bots.contains(id));
            assert!(arena.position_of(id).is_some());
        }
    }
}
