// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use std::path::PathBuf;

use clap::Parser;
use glam::Vec3;
use indicatif::{
    ParallelProgressIterator,
    ProgressBar,
};
use rand::{
    rngs::StdRng,
    Rng,
    SeedableRng,
};
use rayon::iter::{
    IntoParallelIterator,
    ParallelIterator,
};
use terrain_octree::{
    touched_zone,
    BoundingBox,
    LandingConfig,
    LandingPlanner,
    LandingZone,
    Octree,
    OctreeBuilder,
    DEFAULT_MAX_DEPTH,
    MAX_ZONES,
};
use tracing::{
    debug,
    info,
};
use tracing_subscriber::EnvFilter;

mod terrain;

/// Highest start above the terrain for a probe.
const DROP_HEIGHT: f32 = 50.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terrain octree: landing zones and altitude probes")]
struct Args {
    /// glTF/GLB terrain model. A rolling heightfield is generated when omitted
    #[arg(long)]
    model:       Option<PathBuf>,
    /// Maximum subdivision depth of the octree
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth:   u32,
    /// Seed for terrain generation, zone placement and probes
    #[arg(long, default_value_t = 0)]
    seed:        u64,
    /// Maximum number of landing zones
    #[arg(long, default_value_t = MAX_ZONES)]
    zones:       usize,
    /// Number of simulated landers dropped onto the terrain
    #[arg(long, default_value_t = 100_000)]
    probes:      u32,
    /// Vertices per side of the generated heightfield
    #[arg(long, default_value_t = 160)]
    grid:        u32,
    /// Half extent of a lander's bounding box
    #[arg(long, default_value_t = 2.0)]
    lander_size: f32,
}

#[derive(Clone, Copy, Debug, Default)]
struct ProbeStats {
    probes:       u32,
    grounded:     u32,
    altitude_sum: f64,
    contacts:     usize,
    pushed:       u32,
    in_zone:      u32,
}

impl ProbeStats {
    fn merge(
        self,
        other: Self,
    ) -> Self {
        Self {
            probes:       self.probes + other.probes,
            grounded:     self.grounded + other.grounded,
            altitude_sum: self.altitude_sum + other.altitude_sum,
            contacts:     self.contacts + other.contacts,
            pushed:       self.pushed + other.pushed,
            in_zone:      self.in_zone + other.in_zone,
        }
    }
}

/// Drops one lander: reads its altitude, then sets its box on the ground
/// below and gathers the contacts a collision pass would see.
fn probe(
    octree: &Octree,
    zones: &[LandingZone],
    half_extent: f32,
    rng: &mut StdRng,
) -> ProbeStats {
    let bounds = octree.bounds();
    let position = Vec3::new(
        rng.gen_range(bounds.min().x..=bounds.max().x),
        bounds.max().y + rng.gen_range(1.0..DROP_HEIGHT),
        rng.gen_range(bounds.min().z..=bounds.max().z),
    );

    let mut stats = ProbeStats {
        probes: 1,
        ..ProbeStats::default()
    };
    let Some(altitude) = octree.altitude(position) else {
        return stats;
    };
    stats.grounded = 1;
    stats.altitude_sum = f64::from(altitude);

    let resting = position - Vec3::Y * (altitude - half_extent);
    let lander = BoundingBox::from_center_half_extents(resting, Vec3::splat(half_extent));
    let overlap = octree.query_box(&lander);
    stats.contacts = overlap.len();
    stats.pushed = u32::from(overlap.push_direction(octree, resting).is_some());
    stats.in_zone = u32::from(touched_zone(zones, &lander).is_some());
    stats
}

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let vertices = match &args.model {
        Some(path) => terrain::load(path)?,
        None => terrain::generate(args.grid, args.seed),
    };

    let begin_time = std::time::Instant::now();
    let mut builder = OctreeBuilder::new().with_max_depth(args.max_depth);
    builder.extend(vertices);
    let octree = builder.build()?;
    info!(
        vertices = octree.vertices().len(),
        nodes = octree.node_count(),
        leaves = octree.leaf_count(),
        width = octree.width(),
        height = octree.height(),
        length = octree.length(),
        "octree built in {}ms",
        begin_time.elapsed().as_millis()
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut planner = LandingPlanner::new(&octree, LandingConfig {
        max_zones: args.zones,
        ..LandingConfig::default()
    });
    let zones = planner.plan(&mut rng).to_vec();
    for (index, zone) in zones.iter().enumerate() {
        info!(index, vertex = zone.vertex, anchor = ?zone.anchor, "landing zone");
    }
    info!(
        placed = zones.len(),
        requested = args.zones,
        half_width = planner.half_width(),
        separation = planner.min_separation(),
        "landing zones planned"
    );

    let begin_time = std::time::Instant::now();
    let bar = ProgressBar::new(u64::from(args.probes));
    let stats = (0..args.probes)
        .into_par_iter()
        .progress_with(bar)
        .map(|index| {
            let mut rng = StdRng::seed_from_u64(args.seed ^ u64::from(index).rotate_left(32));
            probe(&octree, &zones, args.lander_size, &mut rng)
        })
        .reduce(ProbeStats::default, ProbeStats::merge);
    debug!(?stats);

    info!(
        probes = stats.probes,
        grounded = stats.grounded,
        mean_altitude = stats.altitude_sum / f64::from(stats.grounded.max(1)),
        mean_contacts = stats.contacts as f64 / f64::from(stats.grounded.max(1)),
        pushed = stats.pushed,
        in_zone = stats.in_zone,
        "probes finished in {:.2}s",
        begin_time.elapsed().as_secs_f32()
    );

    Ok(())
}
