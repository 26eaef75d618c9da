// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use std::ops::RangeInclusive;

use glam::Vec3;
use tracing::instrument;

use super::{
    BoundingBox,
    Octree,
    TreeNode,
};
use crate::ray::Ray;

/// Parametric window for ray queries, long enough to cross any playable terrain.
pub const RAY_RANGE: RangeInclusive<f32> = 0.0..=10_000.0;

/// Terminal cells reached by a volume query.
///
/// `boxes[i]` is the cell that holds `points[i]`; both lists are filled in
/// depth-first order. Every terminal cell appears once, represented by its
/// first point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlap {
    pub boxes:  Vec<BoundingBox>,
    pub points: Vec<u32>,
}

impl Overlap {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoundingBox, u32)> {
        self.boxes.iter().zip(self.points.iter().copied())
    }

    /// Unit vector pointing from the contact points towards `position`,
    /// averaged over every contact. `None` without contacts or when the
    /// contributions cancel out.
    #[must_use]
    pub fn push_direction(
        &self,
        octree: &Octree,
        position: Vec3,
    ) -> Option<Vec3> {
        let away: Vec3 = self
            .points
            .iter()
            .filter_map(|&index| octree.vertex(index))
            .map(|vertex| position - vertex)
            .sum();
        away.try_normalize()
    }
}

impl Octree {
    /// Walks down towards the first terminal cell the ray passes through.
    ///
    /// At every level the children are tried in stored order and the descent
    /// commits to the first one the ray crosses, without looking at its
    /// siblings. The result is a cell on the ray, not necessarily the closest
    /// one, and a committed branch whose children all miss yields `None`.
    ///
    /// A terminal root is returned as is, whatever the ray.
    #[must_use]
    pub fn query_ray(
        &self,
        ray: &Ray,
    ) -> Option<&TreeNode> {
        let mut node = self.root();
        if !node.is_terminal() && !node.bounds().intersects_ray(ray, RAY_RANGE) {
            return None;
        }

        loop {
            if node.is_terminal() {
                return Some(node);
            }
            node = self
                .children(node)
                .find(|child| child.bounds().intersects_ray(ray, RAY_RANGE))?;
        }
    }

    /// Collects every terminal cell overlapping `volume`.
    ///
    /// Unlike [`Octree::query_ray`] all overlapping branches are explored. A
    /// cell left with several points by the depth limit is reported once.
    #[must_use]
    #[instrument(level = "trace", skip(self), fields(hits = tracing::field::Empty))]
    pub fn query_box(
        &self,
        volume: &BoundingBox,
    ) -> Overlap {
        let mut overlap = Overlap::default();
        let root = self.root();
        if !root.bounds().overlaps(volume) {
            return overlap;
        }

        let mut search_space = vec![root];
        while let Some(node) = search_space.pop() {
            if node.is_terminal() {
                if let Some(point) = node.point() {
                    overlap.boxes.push(*node.bounds());
                    overlap.points.push(point);
                }
                continue;
            }

            let start = search_space.len();
            search_space.extend(
                self.children(node)
                    .filter(|child| child.bounds().overlaps(volume)),
            );
            // Pop in stored order
            search_space[start..].reverse();
        }

        tracing::Span::current().record("hits", overlap.len());
        overlap
    }

    /// Terrain point found straight below `position`.
    #[must_use]
    pub fn ground_point(
        &self,
        position: Vec3,
    ) -> Option<Vec3> {
        self.query_ray(&Ray::down(position))
            .and_then(TreeNode::point)
            .and_then(|index| self.vertex(index))
    }

    /// Height of `position` above the terrain point below it. Negative when
    /// the position has sunk under that point.
    #[must_use]
    pub fn altitude(
        &self,
        position: Vec3,
    ) -> Option<f32> {
        self.ground_point(position)
            .map(|ground| position.y - ground.y)
    }
}

#[cfg(test)]
mod tests {
    use rand::{
        rngs::StdRng,
        Rng,
        SeedableRng,
    };

    use super::*;

    fn three_points() -> Octree {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(5.0, 5.0, 5.0),
        ];
        Octree::build(vertices, 2).expect("valid input")
    }

    /// Flat `n * n` unit grid on the XZ plane.
    fn grid(n: u16) -> Octree {
        let mut vertices = Vec::new();
        for x in 0..n {
            for z in 0..n {
                vertices.push(Vec3::new(f32::from(x), 0.0, f32::from(z)));
            }
        }
        Octree::build(vertices, 12).expect("valid input")
    }

    #[test]
    fn box_query_finds_only_nearby_point() {
        let octree = three_points();
        let overlap = octree.query_box(&BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
        assert_eq!(overlap.points, vec![0]);
        assert_eq!(overlap.boxes.len(), 1);
        assert!(overlap.boxes[0].contains(Vec3::ZERO));
    }

    #[test]
    fn box_query_covering_everything_returns_all_points() {
        let octree = three_points();
        let overlap = octree.query_box(&BoundingBox::new(Vec3::splat(-10.0), Vec3::splat(10.0)));
        let mut points = overlap.points.clone();
        points.sort_unstable();
        assert_eq!(points, vec![0, 1, 2]);
        assert_eq!(overlap.boxes.len(), overlap.points.len());
    }

    #[test]
    fn box_query_miss_is_empty() {
        let octree = three_points();
        let overlap = octree.query_box(&BoundingBox::new(Vec3::splat(50.0), Vec3::splat(60.0)));
        assert!(overlap.is_empty());
        assert_eq!(overlap, Overlap::default());
    }

    #[test]
    fn box_query_matches_brute_force_on_grid() {
        let octree = grid(24);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let center = Vec3::new(rng.gen_range(0.0..24.0), rng.gen_range(0.0..3.0), rng.gen_range(0.0..24.0));
            let volume = BoundingBox::from_center_half_extents(center, Vec3::new(1.5, 2.0, 1.5));
            let overlap = octree.query_box(&volume);

            // Every point inside the volume must be reported
            for (index, vertex) in octree.vertices().iter().enumerate() {
                if volume.contains(*vertex) {
                    let index = u32::try_from(index).expect("small grid");
                    assert!(overlap.points.contains(&index), "missed vertex {vertex}");
                }
            }
            // And every reported cell must touch the volume
            for (bounds, _) in overlap.iter() {
                assert!(bounds.overlaps(&volume));
            }
        }
    }

    #[test]
    fn depth_capped_cell_is_reported_once() {
        let vertices = vec![Vec3::ONE, Vec3::ONE, Vec3::ZERO];
        let octree = Octree::build(vertices, 2).expect("valid input");
        let overlap = octree.query_box(&BoundingBox::new(Vec3::splat(0.9), Vec3::splat(1.1)));
        assert_eq!(overlap.points, vec![0]);
        assert_eq!(overlap.boxes.len(), 1);
        assert!(overlap.boxes[0].contains(Vec3::ONE));
    }

    #[test]
    fn ray_query_finds_point_below() {
        let octree = three_points();
        let node = octree.query_ray(&Ray::down(Vec3::new(4.9, 20.0, 4.9))).expect("hit");
        assert_eq!(node.point(), Some(2));
        assert!(node.is_terminal());
    }

    #[test]
    fn ray_query_misses_outside_terrain() {
        let octree = three_points();
        assert!(octree.query_ray(&Ray::down(Vec3::new(40.0, 20.0, 40.0))).is_none());
        assert!(octree.altitude(Vec3::new(40.0, 20.0, 40.0)).is_none());
    }

    #[test]
    fn single_point_tree_returns_root_for_any_ray() {
        let octree = Octree::build(vec![Vec3::new(3.0, 1.0, 3.0)], 4).expect("valid input");
        assert_eq!(octree.altitude(Vec3::new(3.0, 11.0, 3.0)), Some(10.0));

        // The ray passes beside the degenerate root box
        let node = octree.query_ray(&Ray::down(Vec3::new(3.5, 11.0, 3.0))).expect("terminal root");
        assert_eq!(node.point(), Some(0));
        assert_eq!(octree.altitude(Vec3::new(40.0, 6.0, -8.0)), Some(5.0));
    }


    #[test]
    fn ray_query_returns_first_crossed_child() {
        // Two points stacked vertically: octant order puts the lower one first,
        // so a ray from above still reports the lower cell
        let vertices = vec![Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 5.0, 2.0)];
        let octree = Octree::build(vertices, 4).expect("valid input");
        let node = octree.query_ray(&Ray::down(Vec3::new(0.0, 50.0, 0.0))).expect("hit");
        assert_eq!(node.point(), Some(1));
    }

    #[test]
    fn altitude_over_grid_vertex() {
        // Directly above a vertex every crossed cell also holds that vertex
        let octree = grid(16);
        let position = Vec3::new(4.0, 30.0, 7.0);
        assert_eq!(octree.ground_point(position), Some(Vec3::new(4.0, 0.0, 7.0)));
        assert_eq!(octree.altitude(position), Some(30.0));
    }

    #[test]
    fn queries_are_repeatable() {
        let octree = grid(20);
        let volume = BoundingBox::new(Vec3::new(3.0, -1.0, 3.0), Vec3::new(9.0, 5.0, 6.0));
        assert_eq!(octree.query_box(&volume), octree.query_box(&volume));

        let ray = Ray::down(Vec3::new(10.2, 40.0, 4.7));
        let first = octree.query_ray(&ray).map(TreeNode::points);
        let second = octree.query_ray(&ray).map(TreeNode::points);
        assert_eq!(first, second);
    }

    #[test]
    fn push_direction_points_away_from_contacts() {
        let octree = grid(10);
        let position = Vec3::new(5.0, 2.0, 5.0);
        let overlap = octree.query_box(&BoundingBox::from_center_half_extents(position, Vec3::new(1.0, 3.0, 1.0)));
        assert!(!overlap.is_empty());
        let push = overlap.push_direction(&octree, position).expect("contacts below");
        assert!(push.y > 0.0);
        assert!((push.length() - 1.0).abs() < 1e-5);

        assert!(Overlap::default().push_direction(&octree, position).is_none());
    }
}
