// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use std::path::Path;

use glam::Vec3;
use gltf::mesh::Mode;
use rand::{
    rngs::StdRng,
    Rng,
    SeedableRng,
};
use tracing::{
    info,
    warn,
};

/// Distance between neighbouring vertices of generated terrain.
pub const GRID_SPACING: f32 = 4.0;

/// Every triangle-mesh vertex position of a glTF/GLB model, in model space.
pub fn load(path: &Path) -> Result<Vec<Vec3>, gltf::Error> {
    let (document, buffers, _) = gltf::import(path)?;

    let mut vertices = Vec::new();
    for mesh in document.meshes() {
        for prim in mesh.primitives() {
            if prim.mode() != Mode::Triangles {
                continue;
            }

            let reader = prim.reader(|buf| buffers.get(buf.index()).map(|d| &*d.0));
            let Some(positions) = reader.read_positions() else {
                warn!(mesh = mesh.index(), "no positions attached to triangle mesh");
                continue;
            };

            let before = vertices.len();
            vertices.extend(positions.map(Vec3::from_array));
            info!(mesh = mesh.index(), vertices = vertices.len() - before, "loaded mesh");
        }
    }

    Ok(vertices)
}

/// Rolling heightfield of `side * side` vertices built from a few sine waves
/// with random phases.
#[allow(clippy::cast_precision_loss)]
pub fn generate(
    side: u32,
    seed: u64,
) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let waves: Vec<(f32, f32, f32, f32)> = (0..4)
        .map(|octave| {
            let scale = 2f32.powi(octave);
            (
                rng.gen_range(0.0..std::f32::consts::TAU),
                rng.gen_range(0.0..std::f32::consts::TAU),
                0.01 * scale,
                12.0 / scale,
            )
        })
        .collect();

    let mut vertices = Vec::with_capacity(side as usize * side as usize);
    for i in 0..side {
        for j in 0..side {
            let x = i as f32 * GRID_SPACING;
            let z = j as f32 * GRID_SPACING;
            let y: f32 = waves
                .iter()
                .map(|(phase_x, phase_z, frequency, amplitude)| {
                    amplitude * ((x * frequency + phase_x).sin() + (z * frequency + phase_z).cos())
                })
                .sum();
            vertices.push(Vec3::new(x, y, z));
        }
    }
    vertices
}
