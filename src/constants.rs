//! Tuning constants, grouped by subsystem.

/// Lobby / match lifecycle constants
pub mod lobby {
    /// Length of the pre-match reveal ("versus") window in milliseconds
    pub const REVEAL_DURATION_MS: u64 = 5_000;
}

/// Tick cadence
pub mod tick {
    /// Slow tick interval driving arena steps and bot updates
    pub const SLOW_TICK_MS: u64 = 50;
}

/// Bot decision engine constants
pub mod bot {
    /// Radius (tiles) within which another live player counts as a threat
    pub const SAFETY_RADIUS: f32 = 5.0;
    /// Trail length (summed vertex distances) that forces a return home
    pub const TRAIL_LENGTH_CAP: f32 = 20.0;
    /// Expansion steps off own territory before the bot heads home
    pub const EXPANSION_STEP_BUDGET: u32 = 14;
    /// Minimum straight run before a turn is considered while expanding
    pub const MIN_RUN_LENGTH: u32 = 2;
    /// Consecutive unmoved ticks before the stuck recovery kicks in
    pub const STUCK_TICK_LIMIT: u32 = 5;
    /// Node expansion cap for the breadth-first search home
    pub const BFS_NODE_LIMIT: usize = 50;
    /// Distance to own trail below which a move is rejected.
    /// Must stay under 1.0 so moving parallel to the trail one lane over
    /// is not rejected.
    pub const TRAIL_COLLISION_RADIUS: f32 = 0.9;
    /// Trail vertices near the head excluded from the collision check
    /// (the tile just vacated is always adjacent)
    pub const TRAIL_HEAD_SLACK: usize = 1;
    /// Playable-rectangle margin bots keep from the arena edge
    pub const EDGE_MARGIN: i32 = 1;
    /// Spatial index cell size (tiles)
    pub const SPATIAL_CELL_SIZE: i32 = 4;
    /// Position history capacity for the loop detector
    pub const HISTORY_CAPACITY: usize = 20;
    /// Recent positions compared against older history
    pub const RECENT_WINDOW: usize = 5;
    /// Repetition ratio above which movement counts as looping
    pub const LOOP_THRESHOLD: f32 = 0.3;
    /// Random jitter added to expansion turn scores to diversify paths
    pub const TURN_JITTER: f32 = 6.0;
    /// Score bonus for turning perpendicular to the current heading
    pub const PERPENDICULAR_BONUS: f32 = 10.0;
    /// Score bonus for continuing straight
    pub const STRAIGHT_BONUS: f32 = 4.0;
    /// Score penalty for a tile outside the margin-shrunk rectangle or on
    /// the bot's own trail
    pub const BLOCKED_PENALTY: f32 = 50.0;
}

/// Training session constants
pub mod training {
    use std::time::Duration;

    /// Upper bound on bots per training session
    pub const MAX_BOTS: usize = 4;
    /// Sessions with no attached player older than this are reaped
    pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    /// Interval between idle-reaping sweeps
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
}
