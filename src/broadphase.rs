//! Bucketed spatial hash broad phase.
//!
//! Each shape's cached AABB is stamped into every grid cell it overlaps.
//! A query walks the cells its own AABB (or ray) overlaps and collects
//! the union of shapes found there, deduplicating within one query via
//! a per-call stamp rather than a `HashSet` (cheaper when the same
//! handful of shapes show up in several adjacent cells, which is the
//! common case).

use hashbrown::HashMap;
use smallvec::SmallVec;
use vek::{Aabr, Vec2};

use crate::ShapeKey;

type Cell = (i32, i32);

/// A bucketed spatial hash keyed by cell coordinates.
///
/// `cell_size` should be on the order of the average shape's size:
/// too small and a single shape spans many cells (more insert/remove
/// work); too large and a query walks many irrelevant shapes sharing a
/// cell with it.
pub struct SpatialHash {
    cell_size: f64,
    cells: HashMap<Cell, SmallVec<[ShapeKey; 4]>>,
    /// Tracks which cells each shape is currently stamped into, so
    /// `remove` and re-`insert` (on move) don't need to rescan the
    /// whole hash.
    occupancy: HashMap<ShapeKey, SmallVec<[Cell; 4]>>,
}

impl SpatialHash {
    pub fn new(cell_size: f64) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            occupancy: HashMap::new(),
        }
    }

    fn cell_of(&self, p: Vec2<f64>) -> Cell {
        (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
        )
    }

    fn cells_for(&self, bb: Aabr<f64>) -> impl Iterator<Item = Cell> + '_ {
        let (min_x, min_y) = self.cell_of(bb.min);
        let (max_x, max_y) = self.cell_of(bb.max);
        (min_x..=max_x).flat_map(move |x| (min_y..=max_y).map(move |y| (x, y)))
    }

    /// Stamp `key` into every cell its bounding box overlaps. Replaces
    /// any previous stamping for the same key (use this for moved
    /// shapes too, not just new ones).
    pub fn insert(&mut self, key: ShapeKey, bb: Aabr<f64>) {
        self.remove(key);
        let mut cells = SmallVec::new();
        for cell in self.cells_for(bb) {
            self.cells.entry(cell).or_default().push(key);
            cells.push(cell);
        }
        self.occupancy.insert(key, cells);
    }

    /// Remove every stamp of `key` from the hash. A no-op if `key` was
    /// never inserted.
    pub fn remove(&mut self, key: ShapeKey) {
        if let Some(cells) = self.occupancy.remove(&key) {
            for cell in cells {
                if let Some(bucket) = self.cells.get_mut(&cell) {
                    bucket.retain(|k| *k != key);
                    if bucket.is_empty() {
                        self.cells.remove(&cell);
                    }
                }
            }
        }
    }

    /// Call `f` once for every distinct shape whose cell(s) overlap `bb`.
    pub fn query(&self, bb: Aabr<f64>, mut f: impl FnMut(ShapeKey)) {
        let mut seen: SmallVec<[ShapeKey; 16]> = SmallVec::new();
        for cell in self.cells_for(bb) {
            if let Some(bucket) = self.cells.get(&cell) {
                for &key in bucket {
                    if !seen.contains(&key) {
                        seen.push(key);
                        f(key);
                    }
                }
            }
        }
    }

    /// Call `f` once for every distinct shape whose cell(s) the segment
    /// from `a` to `b` passes through, walking cells with a 2D DDA
    /// instead of rasterizing the segment's full bounding box.
    pub fn query_segment(&self, a: Vec2<f64>, b: Vec2<f64>, mut f: impl FnMut(ShapeKey)) {
        let mut seen: SmallVec<[ShapeKey; 16]> = SmallVec::new();
        let mut visit = |cell: Cell| {
            if let Some(bucket) = self.cells.get(&cell) {
                for &key in bucket {
                    if !seen.contains(&key) {
                        seen.push(key);
                        f(key);
                    }
                }
            }
        };

        let delta = b - a;
        let (start_x, start_y) = self.cell_of(a);
        let (end_x, end_y) = self.cell_of(b);

        if start_x == end_x && start_y == end_y {
            visit((start_x, start_y));
            return;
        }

        let step_x: i32 = if delta.x > 0.0 { 1 } else { -1 };
        let step_y: i32 = if delta.y > 0.0 { 1 } else { -1 };

        let t_delta_x = if delta.x.abs() > f64::EPSILON { (self.cell_size / delta.x).abs() } else { f64::INFINITY };
        let t_delta_y = if delta.y.abs() > f64::EPSILON { (self.cell_size / delta.y).abs() } else { f64::INFINITY };

        let next_boundary_x = (start_x as f64 + if step_x > 0 { 1.0 } else { 0.0 }) * self.cell_size;
        let next_boundary_y = (start_y as f64 + if step_y > 0 { 1.0 } else { 0.0 }) * self.cell_size;

        let mut t_max_x = if delta.x.abs() > f64::EPSILON { (next_boundary_x - a.x) / delta.x } else { f64::INFINITY };
        let mut t_max_y = if delta.y.abs() > f64::EPSILON { (next_boundary_y - a.y) / delta.y } else { f64::INFINITY };

        let mut x = start_x;
        let mut y = start_y;
        visit((x, y));

        while (x, y) != (end_x, end_y) {
            if t_max_x < t_max_y {
                t_max_x += t_delta_x;
                x += step_x;
            } else {
                t_max_y += t_delta_y;
                y += step_y;
            }
            visit((x, y));
            if t_max_x > 1.0 && t_max_y > 1.0 {
                break;
            }
        }
    }

    /// Total number of shapes currently stamped into the hash.
    pub fn len(&self) -> usize {
        self.occupancy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy.is_empty()
    }
}
