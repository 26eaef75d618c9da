// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use glam::{
    Vec2,
    Vec3,
};
use rand::Rng;
use thiserror::Error;
use tracing::{
    debug,
    instrument,
    trace,
};

use crate::bvh::{
    BoundingBox,
    Octree,
};

pub const MAX_ZONES: usize = 3;
pub const PLACEMENT_PROBABILITY: f64 = 0.1;

/// Terrains narrower than this (on their shorter side) get small zones.
pub const SMALL_TERRAIN: f32 = 500.0;
pub const SMALL_HALF_WIDTH: f32 = 5.0;
pub const LARGE_HALF_WIDTH: f32 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub struct LandingConfig {
    pub max_zones:        usize,
    /// Chance for each leaf to be tried as an anchor.
    pub probability:      f64,
    pub small_terrain:    f32,
    pub small_half_width: f32,
    pub large_half_width: f32,
    /// Zone height above its anchor, in half widths.
    pub height_factor:    f32,
    /// Density is `(width + length) / (half_width * density_divisor)`.
    pub density_divisor:  f32,
    /// Corner clearance, in minimum separations.
    pub edge_factor:      f32,
}

impl LandingConfig {
    #[must_use]
    pub fn half_width(
        &self,
        width: f32,
        length: f32,
    ) -> f32 {
        if width.min(length) < self.small_terrain {
            self.small_half_width
        } else {
            self.large_half_width
        }
    }

    /// How crowded the map is with zones of the given half width.
    #[must_use]
    pub fn density(
        &self,
        width: f32,
        length: f32,
        half_width: f32,
    ) -> f32 {
        (width + length) / (half_width * self.density_divisor)
    }
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            max_zones:        MAX_ZONES,
            probability:      PLACEMENT_PROBABILITY,
            small_terrain:    SMALL_TERRAIN,
            small_half_width: SMALL_HALF_WIDTH,
            large_half_width: LARGE_HALF_WIDTH,
            height_factor:    2.0,
            density_divisor:  10.0,
            edge_factor:      3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandingZone {
    pub bounds: BoundingBox,
    pub anchor: Vec3,
    /// Index of the anchor in the octree's vertex array.
    pub vertex: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("zone limit reached")]
    Full,
    #[error("overlaps zone {0}")]
    Overlaps(usize),
    #[error("too close to zone {0}")]
    TooClose(usize),
    #[error("too close to a terrain corner")]
    NearEdge,
}

#[inline]
fn horizontal(point: Vec3) -> Vec2 {
    Vec2::new(point.x, point.z)
}

/// Greedy placement of landing zones over an octree's leaves.
///
/// Accepted zones are final: later candidates are checked against them and
/// nothing is ever moved or dropped.
#[derive(Debug)]
pub struct LandingPlanner<'a> {
    octree:     &'a Octree,
    config:     LandingConfig,
    half_width: f32,
    density:    f32,
    zones:      Vec<LandingZone>,
}

impl<'a> LandingPlanner<'a> {
    #[must_use]
    pub fn new(
        octree: &'a Octree,
        config: LandingConfig,
    ) -> Self {
        let half_width = config.half_width(octree.width(), octree.length());
        let density = config.density(octree.width(), octree.length(), half_width);
        Self {
            octree,
            config,
            half_width,
            density,
            zones: Vec::new(),
        }
    }

    #[must_use]
    pub const fn half_width(&self) -> f32 {
        self.half_width
    }

    #[must_use]
    pub const fn density(&self) -> f32 {
        self.density
    }

    /// Horizontal distance every pair of anchors keeps.
    #[must_use]
    pub fn min_separation(&self) -> f32 {
        self.half_width * self.density
    }

    /// Horizontal distance anchors keep from the terrain's corners.
    #[must_use]
    pub fn edge_margin(&self) -> f32 {
        self.min_separation() * self.config.edge_factor
    }

    #[must_use]
    pub fn zones(&self) -> &[LandingZone] {
        &self.zones
    }

    #[must_use]
    pub fn into_zones(self) -> Vec<LandingZone> {
        self.zones
    }

    /// Zone box for an anchor: square around it, rising from its height.
    #[must_use]
    pub fn candidate(
        &self,
        anchor: Vec3,
    ) -> BoundingBox {
        let reach = Vec3::new(self.half_width, 0.0, self.half_width);
        BoundingBox::new(
            anchor - reach,
            anchor + reach + Vec3::Y * (self.half_width * self.config.height_factor),
        )
    }

    /// Runs every placement check for one anchor and keeps the zone if they
    /// all pass.
    ///
    /// # Errors
    /// Returns the first check the anchor failed.
    pub fn try_place(
        &mut self,
        vertex: u32,
        anchor: Vec3,
    ) -> Result<&LandingZone, Rejection> {
        if self.zones.len() >= self.config.max_zones {
            return Err(Rejection::Full);
        }

        let bounds = self.candidate(anchor);
        if let Some(index) = self.zones.iter().position(|zone| zone.bounds.overlaps(&bounds)) {
            return Err(Rejection::Overlaps(index));
        }

        let here = horizontal(anchor);
        let separation = self.min_separation();
        if let Some(index) = self
            .zones
            .iter()
            .position(|zone| here.distance(horizontal(zone.anchor)) < separation)
        {
            return Err(Rejection::TooClose(index));
        }

        let terrain = self.octree.bounds();
        let (lo, hi) = (horizontal(terrain.min()), horizontal(terrain.max()));
        let corners = [lo, Vec2::new(lo.x, hi.y), Vec2::new(hi.x, lo.y), hi];
        let margin = self.edge_margin();
        if corners.iter().any(|corner| here.distance(*corner) < margin) {
            return Err(Rejection::NearEdge);
        }

        self.zones.push(LandingZone {
            bounds,
            anchor,
            vertex,
        });
        Ok(&self.zones[self.zones.len() - 1])
    }

    /// Visits the leaves in tree order, trying each one with the configured
    /// probability until the zone limit is reached. Finding fewer zones than
    /// the limit, or none at all, is a normal outcome.
    #[instrument(level = "debug", skip_all, fields(leaves = self.octree.leaf_count()))]
    pub fn plan<R>(
        &mut self,
        rng: &mut R,
    ) -> &[LandingZone]
    where
        R: Rng + ?Sized,
    {
        let octree = self.octree;
        for leaf in octree.leaves() {
            if self.zones.len() >= self.config.max_zones {
                break;
            }
            if rng.gen::<f64>() >= self.config.probability {
                continue;
            }
            let Some((vertex, anchor)) = leaf
                .point()
                .and_then(|vertex| Some((vertex, octree.vertex(vertex)?)))
            else {
                continue;
            };

            if let Err(reason) = self.try_place(vertex, anchor) {
                trace!(vertex, %reason, "landing candidate rejected");
            }
        }

        debug!(
            zones = self.zones.len(),
            half_width = self.half_width,
            density = self.density,
            "landing zones planned"
        );
        &self.zones
    }
}

/// Plans up to `max_zones` zones with the default configuration.
pub fn plan_landing_zones<R>(
    octree: &Octree,
    max_zones: usize,
    rng: &mut R,
) -> Vec<LandingZone>
where
    R: Rng + ?Sized,
{
    let mut planner = LandingPlanner::new(octree, LandingConfig {
        max_zones,
        ..LandingConfig::default()
    });
    planner.plan(rng);
    planner.into_zones()
}

/// First zone a lander's box touches, with its index.
#[must_use]
pub fn touched_zone<'z>(
    zones: &'z [LandingZone],
    lander: &BoundingBox,
) -> Option<(usize, &'z LandingZone)> {
    zones
        .iter()
        .enumerate()
        .find(|(_, zone)| zone.bounds.overlaps(lander))
}

#[cfg(test)]
mod tests {
    use rand::{
        rngs::StdRng,
        SeedableRng,
    };

    use super::*;

    /// Flat square grid from 0 to `size` with `step` spacing.
    fn flat(
        size: u16,
        step: u16,
    ) -> Octree {
        let mut vertices = Vec::new();
        for x in (0..=size).step_by(usize::from(step)) {
            for z in (0..=size).step_by(usize::from(step)) {
                vertices.push(Vec3::new(f32::from(x), 0.0, f32::from(z)));
            }
        }
        Octree::build(vertices, 12).expect("valid input")
    }

    fn roomy() -> LandingConfig {
        LandingConfig {
            max_zones: 8,
            probability: 1.0,
            density_divisor: 100.0,
            ..LandingConfig::default()
        }
    }

    #[test]
    fn half_width_follows_shorter_side() {
        let config = LandingConfig::default();
        assert_eq!(config.half_width(100.0, 100.0), SMALL_HALF_WIDTH);
        assert_eq!(config.half_width(1000.0, 1000.0), LARGE_HALF_WIDTH);
        assert_eq!(config.half_width(1000.0, 499.0), SMALL_HALF_WIDTH);
    }

    #[test]
    fn density_scales_with_terrain() {
        let config = LandingConfig::default();
        assert_eq!(config.density(600.0, 600.0, 10.0), 12.0);
        assert_eq!(config.density(100.0, 100.0, 5.0), 4.0);
    }

    #[test]
    fn planner_derives_metrics_from_tree() {
        let octree = flat(600, 10);
        let planner = LandingPlanner::new(&octree, LandingConfig::default());
        assert_eq!(planner.half_width(), 10.0);
        assert_eq!(planner.density(), 12.0);
        assert_eq!(planner.min_separation(), 120.0);
        assert_eq!(planner.edge_margin(), 360.0);
    }

    #[test]
    fn candidate_rises_above_anchor() {
        let octree = flat(600, 10);
        let planner = LandingPlanner::new(&octree, LandingConfig::default());
        let bounds = planner.candidate(Vec3::new(300.0, 4.0, 200.0));
        assert_eq!(bounds.min(), Vec3::new(290.0, 4.0, 190.0));
        assert_eq!(bounds.max(), Vec3::new(310.0, 24.0, 210.0));
    }

    #[test]
    fn placement_checks_run_in_order() {
        let octree = flat(600, 10);
        let mut planner = LandingPlanner::new(&octree, LandingConfig::default());

        let center = Vec3::new(300.0, 0.0, 300.0);
        let zone = planner.try_place(0, center).expect("center is clear");
        assert_eq!(zone.anchor, center);

        assert_eq!(planner.try_place(1, Vec3::new(315.0, 0.0, 300.0)).err(), Some(Rejection::Overlaps(0)));
        assert_eq!(planner.try_place(2, Vec3::new(350.0, 0.0, 300.0)).err(), Some(Rejection::TooClose(0)));
        assert_eq!(planner.try_place(3, Vec3::new(100.0, 0.0, 100.0)).err(), Some(Rejection::NearEdge));
        assert_eq!(planner.zones().len(), 1);
    }

    #[test]
    fn separation_ignores_height() {
        let octree = flat(600, 10);
        let mut planner = LandingPlanner::new(&octree, LandingConfig::default());
        planner.try_place(0, Vec3::new(300.0, 0.0, 300.0)).expect("center is clear");

        // Stacked far above, the boxes no longer overlap but the anchors are too close
        let rejection = planner.try_place(1, Vec3::new(300.0, 500.0, 300.0)).err();
        assert_eq!(rejection, Some(Rejection::TooClose(0)));
    }

    #[test]
    fn limit_stops_placement() {
        let octree = flat(600, 10);
        let mut planner = LandingPlanner::new(&octree, LandingConfig {
            max_zones: 1,
            ..LandingConfig::default()
        });
        planner.try_place(0, Vec3::new(300.0, 0.0, 300.0)).expect("center is clear");
        assert_eq!(planner.try_place(1, Vec3::new(300.0, 0.0, 300.0)).err(), Some(Rejection::Full));
    }

    #[test]
    fn planned_zones_keep_apart() {
        let octree = flat(1000, 20);
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut planner = LandingPlanner::new(&octree, LandingConfig {
                probability: 0.3,
                ..roomy()
            });
            let separation = planner.min_separation();
            let zones = planner.plan(&mut rng).to_vec();

            assert!(zones.len() > 1, "seed {seed} placed {} zones", zones.len());
            assert!(zones.len() <= 8);
            for (i, a) in zones.iter().enumerate() {
                for b in &zones[i + 1..] {
                    assert!(!a.bounds.overlaps(&b.bounds));
                    assert!(horizontal(a.anchor).distance(horizontal(b.anchor)) >= separation);
                }
                assert_eq!(octree.vertex(a.vertex), Some(a.anchor));
            }
        }
    }

    #[test]
    fn planning_is_reproducible() {
        let octree = flat(1000, 20);
        let first = plan_landing_zones(&octree, 5, &mut StdRng::seed_from_u64(9));
        let second = plan_landing_zones(&octree, 5, &mut StdRng::seed_from_u64(9));
        assert_eq!(first, second);
    }

    #[test]
    fn zero_probability_places_nothing() {
        let octree = flat(1000, 20);
        let mut planner = LandingPlanner::new(&octree, LandingConfig {
            probability: 0.0,
            ..roomy()
        });
        assert!(planner.plan(&mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn certain_probability_fills_the_limit() {
        let octree = flat(1000, 20);
        let mut planner = LandingPlanner::new(&octree, roomy());
        assert_eq!(planner.plan(&mut StdRng::seed_from_u64(1)).len(), 8);
    }

    #[test]
    fn lander_touching_zone_is_found() {
        let octree = flat(1000, 20);
        let mut planner = LandingPlanner::new(&octree, roomy());
        let zones = planner.plan(&mut StdRng::seed_from_u64(3)).to_vec();
        let target = zones.last().expect("zones placed");

        let lander = BoundingBox::from_center_half_extents(target.anchor + Vec3::Y * 2.0, Vec3::splat(1.0));
        let (index, zone) = touched_zone(&zones, &lander).expect("lander inside zone");
        assert_eq!(index, zones.len() - 1);
        assert_eq!(zone, target);

        let far = BoundingBox::from_center_half_extents(Vec3::new(0.0, 500.0, 0.0), Vec3::splat(1.0));
        assert!(touched_zone(&zones, &far).is_none());
    }
}
