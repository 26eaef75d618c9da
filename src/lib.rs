// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

//! Octree over the vertices of a static terrain mesh.
//!
//! The tree is built once from a flat vertex list and then answers two
//! questions many times per frame: which terrain point lies below a position
//! ([`Octree::query_ray`], [`Octree::altitude`]) and which terrain points sit
//! inside a moving box ([`Octree::query_box`]). [`LandingPlanner`] scatters
//! non-overlapping landing zones over the tree's leaves.
//!
//! ```no_run
//! use glam::Vec3;
//! use rand::SeedableRng;
//! use terrain_octree::{plan_landing_zones, BoundingBox, Octree};
//!
//! let vertices = vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0), Vec3::splat(5.0)];
//! let octree = Octree::build(vertices, 8)?;
//!
//! let altitude = octree.altitude(Vec3::new(4.9, 20.0, 4.9));
//! let contacts = octree.query_box(&BoundingBox::new(Vec3::splat(-1.0), Vec3::ONE));
//! let zones = plan_landing_zones(&octree, 3, &mut rand::rngs::StdRng::seed_from_u64(1));
//! # Ok::<(), terrain_octree::BuildError>(())
//! ```

mod bvh;
mod error;
mod landing;
mod ray;

pub use bvh::{
    BoundingBox,
    NodeKey,
    Octree,
    OctreeBuilder,
    Overlap,
    TreeNode,
    DEFAULT_MAX_DEPTH,
    RAY_RANGE,
};
pub use error::BuildError;
pub use landing::{
    plan_landing_zones,
    touched_zone,
    LandingConfig,
    LandingPlanner,
    LandingZone,
    Rejection,
    LARGE_HALF_WIDTH,
    MAX_ZONES,
    PLACEMENT_PROBABILITY,
    SMALL_HALF_WIDTH,
    SMALL_TERRAIN,
};
pub use ray::{
    Ray,
    PARALLEL_EPSILON,
};
