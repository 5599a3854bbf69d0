//! Reduced in-crate arena engine.
//!
//! Implements just enough of the territory game for training sessions, the
//! soak binary and tests: spawning claims a 3x3 home block, movement is one
//! cell per slow tick, leaving owned ground records a trail, re-entering owned
//! ground claims the trail cells, and stepping on one's own trail or out of
//! bounds kills. An extra life grants a single respawn; after that the player
//! is permanently dead and its connection is closed.

use std::sync::Arc;

use hashbrown::HashMap;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::arena::{ArenaEngine, PlayerId, PlayerOptions, TileQuery};
use crate::net::connection::Connection;
use crate::util::grid::{Direction, GridPos, GridRect};

/// Arena dimensions for one engine instance.
#[derive(Debug, Clone, Copy)]
pub struct ArenaConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 80,
        }
    }
}

/// Home block half-size: a spawn claims the (2r+1)x(2r+1) square around it.
const HOME_RADIUS: i32 = 1;
const SPAWN_MARGIN: i32 = 3;
const MAX_SPAWN_ATTEMPTS: u32 = 30;

struct ArenaPlayer {
    conn: Arc<dyn Connection>,
    name: String,
    is_bot: bool,
    spectator: bool,
    pos: GridPos,
    dir: Direction,
    trail: Vec<GridPos>,
    alive: bool,
    lives: u8,
    permanently_dead: bool,
}

pub struct GridArena {
    config: ArenaConfig,
    tiles: HashMap<GridPos, PlayerId>,
    players: HashMap<PlayerId, ArenaPlayer>,
    last_winner: Option<PlayerId>,
}

impl GridArena {
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            tiles: HashMap::new(),
            players: HashMap::new(),
            last_winner: None,
        }
    }

    /// Advance every live player one cell in its current direction and apply
    /// trail, capture and death rules.
    pub fn step(&mut self) {
        let ids: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(_, p)| p.alive && !p.spectator)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            self.step_player(id);
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn bot_count(&self) -> usize {
        self.players.values().filter(|p| p.is_bot).count()
    }

    pub fn last_winner(&self) -> Option<PlayerId> {
        self.last_winner
    }

    fn step_player(&mut self, id: PlayerId) {
        let (pos, hits_own_trail) = {
            let player = match self.players.get(&id) {
                Some(p) => p,
                None => return,
            };
            let next = player.pos.step(player.dir);
            (next, player.trail.contains(&next))
        };

        if !self.bounds().contains(pos) || hits_own_trail {
            self.kill_player(id);
            return;
        }

        let owned_here = self.tiles.get(&pos) == Some(&id);
        let player = match self.players.get_mut(&id) {
            Some(p) => p,
            None => return,
        };
        player.pos = pos;

        if owned_here {
            if !player.trail.is_empty() {
                let trail = std::mem::take(&mut player.trail);
                for cell in trail {
                    self.tiles.insert(cell, id);
                }
            }
        } else {
            player.trail.push(pos);
        }
    }

    fn kill_player(&mut self, id: PlayerId) {
        self.tiles.retain(|_, owner| *owner != id);
        let player = match self.players.get_mut(&id) {
            Some(p) => p,
            None => return,
        };
        player.alive = false;
        player.trail.clear();
        player.lives = player.lives.saturating_sub(1);

        if player.lives == 0 {
            player.permanently_dead = true;
            debug!(name = %player.name, "player permanently dead");
            player.conn.close();
        } else {
            debug!(name = %player.name, "player used an extra life");
            self.respawn(id);
        }
    }

    fn respawn(&mut self, id: PlayerId) {
        let spawn = self.pick_spawn();
        if let Some(player) = self.players.get_mut(&id) {
            player.pos = spawn;
            player.dir = Direction::random(&mut rand::thread_rng());
            player.alive = true;
            self.claim_home(id, spawn);
        }
    }

    fn pick_spawn(&self) -> GridPos {
        let mut rng = rand::thread_rng();
        let (w, h) = (self.config.width, self.config.height);
        let mut fallback = GridPos::new(w / 2, h / 2);
        for attempt in 0..MAX_SPAWN_ATTEMPTS {
            let pos = GridPos::new(
                rng.gen_range(SPAWN_MARGIN..w - SPAWN_MARGIN),
                rng.gen_range(SPAWN_MARGIN..h - SPAWN_MARGIN),
            );
            if attempt == 0 {
                fallback = pos;
            }
            if self.home_is_free(pos) {
                return pos;
            }
        }
        fallback
    }

    fn home_is_free(&self, center: GridPos) -> bool {
        for dx in -HOME_RADIUS..=HOME_RADIUS {
            for dy in -HOME_RADIUS..=HOME_RADIUS {
                let cell = GridPos::new(center.x + dx, center.y + dy);
                if self.tiles.contains_key(&cell) {
                    return false;
                }
            }
        }
        true
    }

    fn claim_home(&mut self, id: PlayerId, center: GridPos) {
        for dx in -HOME_RADIUS..=HOME_RADIUS {
            for dy in -HOME_RADIUS..=HOME_RADIUS {
                self.tiles.insert(GridPos::new(center.x + dx, center.y + dy), id);
            }
        }
    }
}

impl ArenaEngine for GridArena {
    fn create_player(&mut self, conn: Arc<dyn Connection>, opts: PlayerOptions) -> PlayerId {
        let id = Uuid::new_v4();
        let spawn = self.pick_spawn();
        let lives = 1 + opts.auth.has_extra_life as u8;

        info!(name = %opts.name, is_bot = opts.auth.is_bot, "creating arena player");
        let spectator = opts.spectator;
        self.players.insert(
            id,
            ArenaPlayer {
                conn,
                name: opts.name,
                is_bot: opts.auth.is_bot,
                spectator,
                pos: spawn,
                dir: Direction::random(&mut rand::thread_rng()),
                trail: Vec::new(),
                alive: !spectator,
                lives,
                permanently_dead: false,
            },
        );
        if !spectator {
            self.claim_home(id, spawn);
        }
        id
    }

    fn remove_player(&mut self, id: PlayerId) {
        if self.players.remove(&id).is_some() {
            self.tiles.retain(|_, owner| *owner != id);
        }
    }

    fn alive_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, p)| p.alive && !p.spectator)
            .map(|(id, _)| *id)
            .collect()
    }

    fn players_near(&self, pos: GridPos, radius: f32) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, p)| !p.spectator && !p.permanently_dead)
            .filter(|(_, p)| p.pos.distance_to(pos) <= radius)
            .map(|(id, _)| *id)
            .collect()
    }

    fn position_of(&self, id: PlayerId) -> Option<GridPos> {
        self.players.get(&id).map(|p| p.pos)
    }

    fn direction_of(&self, id: PlayerId) -> Option<Direction> {
        self.players.get(&id).map(|p| p.dir)
    }

    fn trail_of(&self, id: PlayerId) -> Vec<GridPos> {
        self.players
            .get(&id)
            .map(|p| p.trail.clone())
            .unwrap_or_default()
    }

    fn tile_owner(&self, pos: GridPos) -> TileQuery {
        if !self.bounds().contains(pos) {
            return TileQuery::Invalid;
        }
        match self.tiles.get(&pos) {
            Some(owner) => TileQuery::Owned(*owner),
            None => TileQuery::Unowned,
        }
    }

    fn bounds(&self) -> GridRect {
        GridRect::new(self.config.width, self.config.height)
    }

    fn is_dead(&self, id: PlayerId) -> bool {
        self.players.get(&id).map_or(true, |p| !p.alive)
    }

    fn is_permanently_dead(&self, id: PlayerId) -> bool {
        self.players.get(&id).map_or(true, |p| p.permanently_dead)
    }

    fn request_move(&mut self, id: PlayerId, dir: Direction, _pos: GridPos) {
        if let Some(player) = self.players.get_mut(&id) {
            if !player.alive || player.permanently_dead {
                return;
            }
            // Reversing into the tile just vacated is never legal.
            if dir == player.dir.opposite() {
                return;
            }
            player.dir = dir;
        }
    }

    fn notify_victory(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get(&id) {
            info!(name = %player.name, "match won");
        }
        self.last_winner = Some(id);
    }
}
