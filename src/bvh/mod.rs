// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

mod fixed;
mod query;

use std::ops::RangeInclusive;

pub use fixed::{
    NodeKey,
    Octree,
    OctreeBuilder,
    TreeNode,
    DEFAULT_MAX_DEPTH,
};
use glam::{
    BVec3,
    Vec3,
};
pub use query::{
    Overlap,
    RAY_RANGE,
};

use crate::ray::{
    Ray,
    PARALLEL_EPSILON,
};

/// Axis-aligned box, inclusive on every face.
///
/// `min <= max` holds component-wise for every value of this type; the
/// constructors sort the corners instead of trusting the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    /// Box spanning two opposite corners, given in any order.
    #[must_use]
    pub fn new(
        a: Vec3,
        b: Vec3,
    ) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[must_use]
    pub fn from_center_half_extents(
        center: Vec3,
        half_extents: Vec3,
    ) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Tight bound of a point set, `None` when the set is empty.
    #[must_use]
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for point in points {
            bounds.grow_to_include_point(point);
        }
        Some(bounds)
    }

    #[inline]
    fn grow_to_include_point(
        &mut self,
        point: Vec3,
    ) {
        self.max = self.max.max(point);
        self.min = self.min.min(point);
    }

    #[inline]
    #[must_use]
    pub const fn min(&self) -> Vec3 {
        self.min
    }

    #[inline]
    #[must_use]
    pub const fn max(&self) -> Vec3 {
        self.max
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Interval test on every axis. Touching faces count as overlapping.
    #[inline]
    #[must_use]
    pub fn overlaps(
        &self,
        other: &Self,
    ) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    #[inline]
    #[must_use]
    pub fn contains(
        &self,
        point: Vec3,
    ) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Whether every point of a small fixed set (a triangle face, say) lies inside.
    #[must_use]
    pub fn contains_all<const N: usize>(
        &self,
        points: &[Vec3; N],
    ) -> bool {
        points.iter().all(|&point| self.contains(point))
    }

    /// Slab test. Returns the parametric distance at which the ray enters the
    /// box, clamped to `search_range`, or `None` when the ray misses the box
    /// inside that range.
    #[must_use]
    pub fn ray_entry(
        &self,
        ray: &Ray,
        search_range: RangeInclusive<f32>,
    ) -> Option<f32> {
        let mut enter = f32::NEG_INFINITY;
        let mut exit = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if ray.direction[axis].abs() < PARALLEL_EPSILON {
                // Parallel to this slab, never crosses its planes
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let near = (lo - origin) * ray.inv_dir[axis];
            let far = (hi - origin) * ray.inv_dir[axis];
            let (near, far) = if near > far { (far, near) } else { (near, far) };

            enter = enter.max(near);
            exit = exit.min(far);
            if enter > exit {
                return None;
            }
        }

        let enter = enter.max(*search_range.start());
        let exit = exit.min(*search_range.end());
        if enter > exit {
            None
        } else {
            Some(enter)
        }
    }

    #[inline]
    #[must_use]
    pub fn intersects_ray(
        &self,
        ray: &Ray,
        search_range: RangeInclusive<f32>,
    ) -> bool {
        self.ray_entry(ray, search_range).is_some()
    }

    /// Splits the box at its center into eight octants.
    ///
    /// Octant `i` takes the upper half on X when bit 0 is set, on Y when bit 1
    /// is set and on Z when bit 2 is set. Tree construction relies on this
    /// order staying fixed.
    #[must_use]
    pub fn subdivide_eight(&self) -> [Self; 8] {
        let center = self.center();
        std::array::from_fn(|octant| {
            let upper = BVec3::new(octant & 1 != 0, octant & 2 != 0, octant & 4 != 0);
            Self {
                min: Vec3::select(upper, center, self.min),
                max: Vec3::select(upper, self.max, center),
            }
        })
    }
}
