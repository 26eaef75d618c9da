// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use thiserror::Error;

/// Reasons an [`Octree`](crate::Octree) cannot be built.
///
/// Construction is all-or-nothing: no partially built tree is ever returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("cannot build an octree from zero vertices")]
    EmptyVertices,
    #[error("maximum subdivision depth must be at least 1")]
    ZeroDepth,
    #[error("{0} vertices exceed the u32 index space")]
    TooManyVertices(usize),
    #[error("vertex {0} has a non-finite coordinate")]
    NonFiniteVertex(usize),
}
