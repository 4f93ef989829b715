use crate::{BacteriumId, CellId, MacrophageId};
use immune_common::Vec2;

/// The kinds of entity a proximity query can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Bacterium,
    Macrophage,
    Cell,
}

/// A handle to any entity, as returned by proximity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Bacterium(BacteriumId),
    Macrophage(MacrophageId),
    Cell(CellId),
}

/// Uniform bucket grid over bacteria positions on a floor centred on the origin.
///
/// Rebuilt from a position snapshot: entries are counted per bucket, bucket starts come
/// from a prefix sum, then entries are scattered into bucket order. Entries for bacteria
/// removed after the last rebuild remain until the next one, so callers filter handles
/// against the live arena.
#[derive(Debug, Clone)]
pub struct BacteriaGrid {
    cell_size: f32,
    inv_cell_size: f32,
    half_width: f32,
    half_height: f32,
    dim_x: u32,
    dim_y: u32,
    cell_counts: Vec<u32>,
    cell_starts: Vec<u32>,
    entries: Vec<(BacteriumId, Vec2)>,
    // Scratch: bucket index per entry in insertion order
    entry_cells: Vec<u32>,
}

impl BacteriaGrid {
    pub fn new(cell_size: f32, half_width: f32, half_height: f32) -> Self {
        let cell_size = if cell_size > 1e-6 { cell_size } else { 1.0 };
        let inv_cell_size = 1.0 / cell_size;
        let dim_x = ((2.0 * half_width * inv_cell_size).ceil() as u32).max(1);
        let dim_y = ((2.0 * half_height * inv_cell_size).ceil() as u32).max(1);
        let num_cells = (dim_x * dim_y) as usize;
        Self {
            cell_size,
            inv_cell_size,
            half_width,
            half_height,
            dim_x,
            dim_y,
            cell_counts: vec![0; num_cells],
            cell_starts: vec![0; num_cells],
            entries: Vec::new(),
            entry_cells: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline(always)]
    fn grid_coords(&self, pos: Vec2) -> (i32, i32) {
        let gx = ((pos.x + self.half_width) * self.inv_cell_size).floor() as i32;
        let gy = ((pos.y + self.half_height) * self.inv_cell_size).floor() as i32;
        (gx, gy)
    }

    /// Calculates the 1D bucket index for a position, clamping positions off the floor
    /// onto the border buckets.
    #[inline(always)]
    pub fn cell_index(&self, pos: Vec2) -> u32 {
        let (gx, gy) = self.grid_coords(pos);
        let clamped_x = gx.clamp(0, self.dim_x as i32 - 1) as u32;
        let clamped_y = gy.clamp(0, self.dim_y as i32 - 1) as u32;
        clamped_y * self.dim_x + clamped_x
    }

    /// Replaces the grid contents with the given positions.
    pub fn rebuild<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (BacteriumId, Vec2)>,
    {
        let items: Vec<(BacteriumId, Vec2)> = items.into_iter().collect();

        // Phase 1: bucket index per entry
        let entry_cells: Vec<u32> = items.iter().map(|(_, pos)| self.cell_index(*pos)).collect();
        self.entry_cells = entry_cells;

        // Phase 2: count entries per bucket
        self.cell_counts.iter_mut().for_each(|c| *c = 0);
        for &cell in &self.entry_cells {
            self.cell_counts[cell as usize] += 1;
        }

        // Phase 3: prefix sum for bucket starts
        let mut total = 0;
        for (start, &count) in self.cell_starts.iter_mut().zip(&self.cell_counts) {
            *start = total;
            total += count;
        }
        debug_assert_eq!(total as usize, items.len());

        // Phase 4: scatter entries into bucket order
        let mut write_offsets = vec![0u32; self.cell_counts.len()];
        self.entries.clear();
        self.entries.resize(items.len(), (BacteriumId::default(), Vec2::zero()));
        for (item, &cell) in items.into_iter().zip(&self.entry_cells) {
            let slot = self.cell_starts[cell as usize] + write_offsets[cell as usize];
            write_offsets[cell as usize] += 1;
            self.entries[slot as usize] = item;
        }
    }

    /// Visits every entry whose squared distance to `pos` is at most `radius^2`.
    /// The closure receives the handle, the indexed position and the squared distance.
    pub fn for_each_within<F>(&self, pos: Vec2, radius: f32, mut f: F)
    where
        F: FnMut(BacteriumId, Vec2, f32),
    {
        if self.entries.is_empty() || radius < 0.0 {
            return;
        }
        let radius_sq = radius * radius;
        // Far points and huge radii saturate; i64 keeps the ring bounds from overflowing.
        let max_reach = self.dim_x.max(self.dim_y) as i64;
        let reach = ((radius * self.inv_cell_size).ceil() as i64).min(max_reach);
        let (center_x, center_y) = self.grid_coords(pos);
        let (center_x, center_y) = (center_x as i64, center_y as i64);

        let min_x = (center_x - reach).max(0);
        let max_x = (center_x + reach).min(self.dim_x as i64 - 1);
        let min_y = (center_y - reach).max(0);
        let max_y = (center_y + reach).min(self.dim_y as i64 - 1);

        for gy in min_y..=max_y {
            for gx in min_x..=max_x {
                let cell = (gy as u32 * self.dim_x + gx as u32) as usize;
                let start = self.cell_starts[cell] as usize;
                let end = start + self.cell_counts[cell] as usize;
                for &(id, other) in &self.entries[start..end] {
                    let dist_sq = pos.distance_squared(other);
                    if dist_sq <= radius_sq {
                        f(id, other, dist_sq);
                    }
                }
            }
        }
    }

    /// Handles of all entries within `radius` of `pos` (inclusive).
    pub fn within(&self, pos: Vec2, radius: f32) -> Vec<BacteriumId> {
        let mut found = Vec::new();
        self.for_each_within(pos, radius, |id, _, _| found.push(id));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<BacteriumId> {
        let mut map: SlotMap<BacteriumId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn finds_neighbours_across_bucket_borders() {
        let handles = ids(4);
        let mut grid = BacteriaGrid::new(10.0, 50.0, 50.0);
        grid.rebuild(vec![
            (handles[0], Vec2::new(-0.5, 0.0)),
            (handles[1], Vec2::new(0.5, 0.0)),
            (handles[2], Vec2::new(25.0, 25.0)),
            (handles[3], Vec2::new(-49.0, -49.0)),
        ]);
        assert_eq!(grid.len(), 4);

        let mut near = grid.within(Vec2::new(0.0, 0.0), 1.0);
        near.sort();
        let mut expected = vec![handles[0], handles[1]];
        expected.sort();
        assert_eq!(near, expected);

        // Radius larger than a bucket reaches several rings out.
        let far = grid.within(Vec2::new(0.0, 0.0), 40.0);
        assert_eq!(far.len(), 3);
    }

    #[test]
    fn positions_off_the_floor_land_in_border_buckets() {
        let handles = ids(1);
        let mut grid = BacteriaGrid::new(10.0, 20.0, 20.0);
        grid.rebuild(vec![(handles[0], Vec2::new(100.0, 100.0))]);
        assert_eq!(grid.cell_index(Vec2::new(100.0, 100.0)), grid.cell_index(Vec2::new(19.9, 19.9)));
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let handles = ids(2);
        let mut grid = BacteriaGrid::new(5.0, 10.0, 10.0);
        grid.rebuild(vec![(handles[0], Vec2::zero())]);
        grid.rebuild(vec![(handles[1], Vec2::new(3.0, 0.0))]);
        assert_eq!(grid.within(Vec2::zero(), 5.0), vec![handles[1]]);
    }

    #[test]
    fn distant_points_and_unbounded_radii_stay_in_range() {
        let handles = ids(3);
        let mut grid = BacteriaGrid::new(5.0, 20.0, 20.0);
        grid.rebuild(vec![
            (handles[0], Vec2::zero()),
            (handles[1], Vec2::new(4.0, 4.0)),
            (handles[2], Vec2::new(-9.0, 9.0)),
        ]);

        assert!(grid.within(Vec2::new(1e12, 0.0), 5.0).is_empty());
        assert_eq!(grid.within(Vec2::new(0.0, -1e12), 1e30).len(), 3);

        let mut all = grid.within(Vec2::zero(), f32::INFINITY);
        all.sort();
        let mut expected = handles.clone();
        expected.sort();
        assert_eq!(all, expected);
    }
}
