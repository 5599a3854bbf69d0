//! Integer tile geometry: positions, bounds and cardinal directions.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A discrete tile coordinate on the arena grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent tile one step in `dir`.
    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance between tile centers.
    #[inline]
    pub fn distance_to(self, other: GridPos) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    #[inline]
    pub fn manhattan_to(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Axis-aligned playable rectangle, origin at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    pub width: i32,
    pub height: i32,
}

impl GridRect {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Containment check with a safety margin shaved off every edge.
    #[inline]
    pub fn contains_with_margin(&self, pos: GridPos, margin: i32) -> bool {
        pos.x >= margin
            && pos.x < self.width - margin
            && pos.y >= margin
            && pos.y < self.height - margin
    }
}

/// One of the four cardinal movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    #[inline]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// The two directions at a right angle to this one.
    #[inline]
    pub fn perpendicular(self) -> [Direction; 2] {
        match self {
            Direction::Up | Direction::Down => [Direction::Left, Direction::Right],
            Direction::Left | Direction::Right => [Direction::Up, Direction::Down],
        }
    }

    #[inline]
    pub fn is_perpendicular_to(self, other: Direction) -> bool {
        self != other && self != other.opposite()
    }

    pub fn random<R: Rng>(rng: &mut R) -> Direction {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// A uniformly random direction that is not the reverse of `current`.
    pub fn random_non_reversing<R: Rng>(rng: &mut R, current: Direction) -> Direction {
        let banned = current.opposite();
        loop {
            let dir = Self::random(rng);
            if dir != banned {
                return dir;
            }
        }
    }

    /// Step along the axis with the greater displacement from `from` to `to`.
    pub fn axis_major_towards(from: GridPos, to: GridPos) -> Direction {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.abs() > dy.abs() {
            if dx > 0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if dy > 0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    /// Step along the axis with the greater displacement, away from `threat`.
    pub fn axis_major_away(from: GridPos, threat: GridPos) -> Direction {
        Direction::axis_major_towards(threat, from)
    }
}

/// Shortest distance from point `p` to the segment `a`-`b` (tile centers).
pub fn segment_distance(p: GridPos, a: GridPos, b: GridPos) -> f32 {
    let (px, py) = (p.x as f32, p.y as f32);
    let (ax, ay) = (a.x as f32, a.y as f32);
    let (bx, by) = (b.x as f32, b.y as f32);
    let (abx, aby) = (bx - ax, by - ay);
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return p.distance_to(a);
    }
    let t = (((px - ax) * abx + (py - ay) * aby) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * abx, ay + t * aby);
    let (dx, dy) = (px - cx, py - cy);
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_and_opposite() {
        let pos = GridPos::new(5, 5);
        assert_eq!(pos.step(Direction::Up), GridPos::new(5, 4));
        assert_eq!(pos.step(Direction::Right), GridPos::new(6, 5));
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
    }

    #[test]
    fn test_perpendicular() {
        assert!(Direction::Up.is_perpendicular_to(Direction::Left));
        assert!(!Direction::Up.is_perpendicular_to(Direction::Down));
        assert!(!Direction::Up.is_perpendicular_to(Direction::Up));
        assert_eq!(Direction::Left.perpendicular(), [Direction::Up, Direction::Down]);
    }

    #[test]
    fn test_rect_margin() {
        let rect = GridRect::new(10, 10);
        assert!(rect.contains(GridPos::new(0, 0)));
        assert!(!rect.contains(GridPos::new(10, 0)));
        assert!(rect.contains_with_margin(GridPos::new(1, 1), 1));
        assert!(!rect.contains_with_margin(GridPos::new(0, 5), 1));
        assert!(!rect.contains_with_margin(GridPos::new(5, 9), 1));
    }

    #[test]
    fn test_axis_major() {
        let from = GridPos::new(0, 0);
        assert_eq!(
            Direction::axis_major_towards(from, GridPos::new(5, 2)),
            Direction::Right
        );
        assert_eq!(
            Direction::axis_major_towards(from, GridPos::new(-1, -4)),
            Direction::Up
        );
        // Away from a threat to the east means heading west.
        assert_eq!(
            Direction::axis_major_away(from, GridPos::new(3, 1)),
            Direction::Left
        );
    }

    #[test]
    fn test_random_non_reversing() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let dir = Direction::random_non_reversing(&mut rng, Direction::Up);
            assert_ne!(dir, Direction::Down);
        }
    }

    #[test]
    fn test_segment_distance() {
        let a = GridPos::new(0, 0);
        let b = GridPos::new(10, 0);
        assert!((segment_distance(GridPos::new(5, 3), a, b) - 3.0).abs() < 1e-6);
        assert!((segment_distance(GridPos::new(-2, 0), a, b) - 2.0).abs() < 1e-6);
        assert_eq!(segment_distance(GridPos::new(4, 0), a, a), 4.0);
    }
}
