//! Grid Broadphase
//!
//! A uniform spatial hash over fixed-size buckets. Each body remembers the
//! rectangle of cells (its [`Region`]) it occupied last step; when the region
//! changes, only the union of the old and new regions is walked, adding the
//! body to newly covered cells and removing it from vacated ones. Candidate
//! pairs are reference-counted by the number of cells both bodies share, so
//! pair creation and teardown is incremental too.

use std::collections::HashMap;

use crate::body::BodyId;
use crate::bounds::Aabb;
use crate::composite::World;

/// Cell size of the spatial hash.
const BUCKET_WIDTH: f64 = 40.0;
const BUCKET_HEIGHT: f64 = 40.0;

/// A rectangle of grid cells, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// First column covered.
    pub start_col: i32,
    /// Last column covered.
    pub end_col: i32,
    /// First row covered.
    pub start_row: i32,
    /// Last row covered.
    pub end_row: i32,
}

impl Region {
    #[inline]
    fn contains(&self, col: i32, row: i32) -> bool {
        col >= self.start_col && col <= self.end_col && row >= self.start_row && row <= self.end_row
    }

    fn union(a: &Region, b: &Region) -> Region {
        Region {
            start_col: a.start_col.min(b.start_col),
            end_col: a.end_col.max(b.end_col),
            start_row: a.start_row.min(b.start_row),
            end_row: a.end_row.max(b.end_row),
        }
    }

    fn from_bounds(bounds: &Aabb) -> Region {
        Region {
            start_col: (bounds.min.x / BUCKET_WIDTH).floor() as i32,
            end_col: (bounds.max.x / BUCKET_WIDTH).floor() as i32,
            start_row: (bounds.min.y / BUCKET_HEIGHT).floor() as i32,
            end_row: (bounds.max.y / BUCKET_HEIGHT).floor() as i32,
        }
    }
}

/// The uniform-grid broadphase.
#[derive(Debug, Default)]
pub struct Grid {
    buckets: HashMap<(i32, i32), Vec<BodyId>>,
    /// Shared-cell refcount per candidate pair (smaller id first).
    pairs: HashMap<(BodyId, BodyId), u32>,
    /// Candidate pairs with a positive refcount, rebuilt on grid change.
    pub pairs_list: Vec<(BodyId, BodyId)>,
}

impl Grid {
    /// Create an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all buckets and pair counts; used when the world tree changed
    /// structurally and regions can no longer be trusted.
    pub(crate) fn flush(&mut self) {
        self.buckets.clear();
        self.pairs.clear();
        self.pairs_list.clear();
    }

    /// Incrementally update the grid for the given bodies.
    ///
    /// Sleeping bodies keep their cells unless `force_update` is set.
    /// Bodies outside the world bounds are ignored.
    pub(crate) fn update(&mut self, world: &mut World, body_ids: &[BodyId], force_update: bool) {
        let mut grid_changed = false;
        let world_bounds = world.bounds;

        for &id in body_ids {
            let Some(body) = world.body(id) else {
                continue;
            };
            if body.is_sleeping && !force_update {
                continue;
            }

            let bounds = *body.bounds();
            if bounds.max.x < world_bounds.min.x
                || bounds.min.x > world_bounds.max.x
                || bounds.max.y < world_bounds.min.y
                || bounds.min.y > world_bounds.max.y
            {
                continue;
            }

            let new_region = Region::from_bounds(&bounds);
            let old_region = body.region;
            if old_region == Some(new_region) && !force_update {
                continue;
            }

            // a fresh (or forced) body covers its whole new region
            let fresh = old_region.is_none() || force_update;
            let reference = if fresh {
                new_region
            } else {
                old_region.expect("checked above")
            };
            let union = Region::union(&new_region, &reference);

            for col in union.start_col..=union.end_col {
                for row in union.start_row..=union.end_row {
                    let inside_new = new_region.contains(col, row);
                    let inside_old = reference.contains(col, row);

                    if !inside_new && inside_old {
                        self.bucket_remove((col, row), id);
                    }
                    if fresh || (inside_new && !inside_old) {
                        self.bucket_add(world, (col, row), id);
                    }
                }
            }

            if let Some(body) = world.body_mut(id) {
                body.region = Some(new_region);
            }
            grid_changed = true;
        }

        if grid_changed {
            self.rebuild_pairs_list();
        }
    }

    fn bucket_add(&mut self, world: &World, cell: (i32, i32), id: BodyId) {
        let bucket = self.buckets.entry(cell).or_default();
        if bucket.contains(&id) {
            return;
        }
        let is_static = world.body(id).map(|b| b.is_static).unwrap_or(false);

        for &other in bucket.iter() {
            if other == id {
                continue;
            }
            // static-static pairs can never collide
            if is_static && world.body(other).map(|b| b.is_static).unwrap_or(false) {
                continue;
            }
            *self.pairs.entry(pair_key(id, other)).or_insert(0) += 1;
        }
        bucket.push(id);
    }

    fn bucket_remove(&mut self, cell: (i32, i32), id: BodyId) {
        let Some(bucket) = self.buckets.get_mut(&cell) else {
            return;
        };
        bucket.retain(|&b| b != id);
        for &other in bucket.iter() {
            if let Some(count) = self.pairs.get_mut(&pair_key(id, other)) {
                *count = count.saturating_sub(1);
            }
        }
    }

    fn rebuild_pairs_list(&mut self) {
        self.pairs.retain(|_, &mut count| count > 0);
        self.pairs_list.clear();
        self.pairs_list.extend(self.pairs.keys().copied());
        // hash order is not deterministic; candidate order must be
        self.pairs_list.sort_unstable();
    }
}

#[inline]
fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyConfig;
    use crate::factory;
    use glam::DVec2;

    fn world_with(positions: &[DVec2]) -> (World, Vec<BodyId>) {
        let mut world = World::new();
        let root = world.root();
        let ids = positions
            .iter()
            .map(|p| {
                world.add_body(
                    root,
                    factory::rectangle(p.x, p.y, 20.0, 20.0, BodyConfig::default()),
                )
            })
            .collect();
        (world, ids)
    }

    #[test]
    fn test_region_from_bounds() {
        let bounds = Aabb::new(DVec2::new(-10.0, 0.0), DVec2::new(70.0, 39.0));
        let region = Region::from_bounds(&bounds);
        assert_eq!(region.start_col, -1);
        assert_eq!(region.end_col, 1);
        assert_eq!(region.start_row, 0);
        assert_eq!(region.end_row, 0);
    }

    #[test]
    fn test_overlapping_bodies_become_candidates() {
        let (mut world, ids) = world_with(&[DVec2::new(100.0, 100.0), DVec2::new(110.0, 100.0)]);
        let mut grid = Grid::new();
        grid.update(&mut world, &ids, false);

        assert_eq!(grid.pairs_list, vec![(ids[0], ids[1])]);
        assert!(world.body(ids[0]).unwrap().region.is_some());
    }

    #[test]
    fn test_distant_bodies_are_not_candidates() {
        let (mut world, ids) = world_with(&[DVec2::new(0.0, 0.0), DVec2::new(500.0, 500.0)]);
        let mut grid = Grid::new();
        grid.update(&mut world, &ids, false);
        assert!(grid.pairs_list.is_empty());
    }

    #[test]
    fn test_pair_drops_when_body_moves_away() {
        let (mut world, ids) = world_with(&[DVec2::new(100.0, 100.0), DVec2::new(110.0, 100.0)]);
        let mut grid = Grid::new();
        grid.update(&mut world, &ids, false);
        assert_eq!(grid.pairs_list.len(), 1);

        world
            .body_mut(ids[1])
            .unwrap()
            .set_position(DVec2::new(900.0, 900.0));
        grid.update(&mut world, &ids, false);
        assert!(grid.pairs_list.is_empty(), "refcount reached zero");
    }

    #[test]
    fn test_static_static_pairs_skipped() {
        let mut world = World::new();
        let root = world.root();
        let config = BodyConfig {
            is_static: true,
            ..Default::default()
        };
        let a = world.add_body(
            root,
            factory::rectangle(100.0, 100.0, 20.0, 20.0, config.clone()),
        );
        let b = world.add_body(root, factory::rectangle(110.0, 100.0, 20.0, 20.0, config));
        let mut grid = Grid::new();
        grid.update(&mut world, &[a, b], false);
        assert!(grid.pairs_list.is_empty());
    }

    #[test]
    fn test_sleeping_body_keeps_cells() {
        let (mut world, ids) = world_with(&[DVec2::new(100.0, 100.0), DVec2::new(110.0, 100.0)]);
        let mut grid = Grid::new();
        grid.update(&mut world, &ids, false);

        world.body_mut(ids[0]).unwrap().set_sleeping(true);
        // moving the sleeping body without force keeps its old region
        world
            .body_mut(ids[0])
            .unwrap()
            .set_position(DVec2::new(700.0, 700.0));
        grid.update(&mut world, &ids, false);
        assert_eq!(grid.pairs_list.len(), 1, "sleeping body not rescanned");

        // a structural flush followed by a forced rebuild rescans everything
        grid.flush();
        grid.update(&mut world, &ids, true);
        assert!(grid.pairs_list.is_empty(), "forced update rescans");
    }

    #[test]
    fn test_flush_clears_state() {
        let (mut world, ids) = world_with(&[DVec2::new(100.0, 100.0), DVec2::new(110.0, 100.0)]);
        let mut grid = Grid::new();
        grid.update(&mut world, &ids, false);
        grid.flush();
        assert!(grid.pairs_list.is_empty());

        // after a flush a forced update restores candidates
        grid.update(&mut world, &ids, true);
        assert_eq!(grid.pairs_list.len(), 1);
    }

    #[test]
    fn test_out_of_world_bodies_ignored() {
        let (mut world, ids) = world_with(&[DVec2::new(100.0, 100.0)]);
        world.bounds = Aabb::new(DVec2::ZERO, DVec2::new(50.0, 50.0));
        let mut grid = Grid::new();
        grid.update(&mut world, &ids, false);
        assert!(world.body(ids[0]).unwrap().region.is_none());
    }
}
