//! Uniform grid over trail points for fast self-collision checks.
//!
//! Rebuilt from the live trail on every bot evaluation; never persisted
//! across ticks, which keeps the invariants trivial.

use hashbrown::HashMap;

use crate::util::grid::GridPos;

type CellKey = (i32, i32);

pub struct SpatialIndex {
    cell_size: i32,
    cells: HashMap<CellKey, Vec<GridPos>>,
}

impl SpatialIndex {
    pub fn new(cell_size: i32) -> Self {
        debug_assert!(cell_size > 0);
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, pos: GridPos) -> CellKey {
        (
            pos.x.div_euclid(self.cell_size),
            pos.y.div_euclid(self.cell_size),
        )
    }

    pub fn insert(&mut self, pos: GridPos) {
        self.cells.entry(self.cell_of(pos)).or_default().push(pos);
    }

    /// All inserted points in cells overlapping the query radius. Callers do
    /// the exact distance check themselves when they need it.
    pub fn nearby(&self, pos: GridPos, radius: f32) -> impl Iterator<Item = GridPos> + '_ {
        let (cx, cy) = self.cell_of(pos);
        let reach = (radius / self.cell_size as f32).ceil() as i32;

        (-reach..=reach).flat_map(move |dx| {
            (-reach..=reach).flat_map(move |dy| {
                self.cells
                    .get(&(cx + dx, cy + dy))
                    .into_iter()
                    .flat_map(|cell| cell.iter().copied())
            })
        })
    }

    /// Whether any inserted point lies strictly within `radius` of `pos`.
    pub fn has_within(&self, pos: GridPos, radius: f32) -> bool {
        self.nearby(pos, radius)
            .any(|point| point.distance_to(pos) < radius)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|c| c.is_empty())
    }
}
