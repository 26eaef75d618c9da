// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use glam::Vec3;

/// Direction components smaller than this are treated as parallel to a slab.
pub const PARALLEL_EPSILON: f32 = 1e-8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin:    Vec3,
    pub direction: Vec3,
    pub inv_dir:   Vec3,
}

impl Ray {
    /// Builds a ray without touching `direction`.
    ///
    /// Distance-based checks only make sense for unit directions, see
    /// [`Ray::normalized`].
    #[must_use]
    pub fn new(
        origin: Vec3,
        direction: Vec3,
    ) -> Self {
        Self {
            origin,
            direction,
            inv_dir: direction.recip(),
        }
    }

    /// Builds a ray with a unit direction, or `None` for a zero or non-finite one.
    #[must_use]
    pub fn normalized(
        origin: Vec3,
        direction: Vec3,
    ) -> Option<Self> {
        direction
            .try_normalize()
            .map(|direction| Self::new(origin, direction))
    }

    /// Straight down the Y axis, the altitude sensor.
    #[must_use]
    pub fn down(origin: Vec3) -> Self {
        Self::new(origin, Vec3::NEG_Y)
    }

    #[inline]
    #[must_use]
    pub fn at(
        &self,
        along: f32,
    ) -> Vec3 {
        self.origin + self.direction * along
    }
}
