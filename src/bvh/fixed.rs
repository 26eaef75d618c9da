// Copyright (C) 2024 GLStudios
// SPDX-License-Identifier: LGPL-2.1-only

use glam::Vec3;
use slotmap::SlotMap;
use tracing::{
    debug,
    instrument,
    warn,
};

use super::BoundingBox;
use crate::error::BuildError;

/// Subdivision depth used when the caller does not pick one.
pub const DEFAULT_MAX_DEPTH: u32 = 20;

slotmap::new_key_type! {
    pub struct NodeKey;
}

/// One cell of the octree.
///
/// Children are referenced by key into the owning [`Octree`]'s arena and are
/// never shared between parents. Empty octants are not stored at all.
#[derive(Clone, Debug)]
pub struct TreeNode {
    bounds:   BoundingBox,
    points:   Vec<u32>,
    children: Vec<NodeKey>,
    depth:    u32,
}

impl TreeNode {
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Indices into the vertex array the tree was built from.
    #[inline]
    #[must_use]
    pub fn points(&self) -> &[u32] {
        &self.points
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Distance from the root, which sits at depth 0.
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Queries stop descending at terminal nodes.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.points.len() <= 1 || self.children.is_empty()
    }

    /// The node's first point. For single-point leaves this is the point.
    #[inline]
    #[must_use]
    pub fn point(&self) -> Option<u32> {
        self.points.first().copied()
    }
}

pub struct OctreeBuilder {
    vertices:  Vec<Vec3>,
    max_depth: u32,
}

impl OctreeBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices:  Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(
        mut self,
        max_depth: u32,
    ) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn append(
        &mut self,
        vertex: Vec3,
    ) -> &mut Self {
        self.vertices.push(vertex);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Top-down build: every node is split into its eight octants and each of
    /// its points moves to the first octant that contains it, until a node
    /// holds a single point or sits at the maximum depth.
    ///
    /// # Errors
    /// Fails without building anything when there are no vertices, when a
    /// vertex is not finite, when there are more vertices than `u32` can
    /// index, or when the maximum depth is zero.
    #[instrument(skip(self), fields(vertices = self.vertices.len(), max_depth = self.max_depth))]
    pub fn build(self) -> Result<Octree, BuildError> {
        if self.max_depth == 0 {
            return Err(BuildError::ZeroDepth);
        }
        let count = u32::try_from(self.vertices.len())
            .map_err(|_| BuildError::TooManyVertices(self.vertices.len()))?;
        if let Some(index) = self.vertices.iter().position(|v| !v.is_finite()) {
            return Err(BuildError::NonFiniteVertex(index));
        }
        let root_bounds = BoundingBox::from_points(self.vertices.iter().copied())
            .ok_or(BuildError::EmptyVertices)?;

        let mut nodes: SlotMap<NodeKey, TreeNode> = SlotMap::with_key();
        let root = nodes.insert(TreeNode {
            bounds:   root_bounds,
            points:   (0..count).collect(),
            children: Vec::new(),
            depth:    0,
        });

        let mut stray = 0usize;
        let mut search_nodes = vec![root];
        while let Some(key) = search_nodes.pop() {
            let node: &TreeNode = &nodes[key];
            if node.depth >= self.max_depth || node.points.len() <= 1 {
                continue;
            }

            let depth = node.depth + 1;
            let octants = node.bounds.subdivide_eight();
            let mut remaining = node.points.clone();
            let mut children = Vec::with_capacity(octants.len());

            for bounds in octants {
                // First octant wins, so points on a split plane are never duplicated
                let (inside, outside): (Vec<u32>, Vec<u32>) = remaining
                    .into_iter()
                    .partition(|&index| bounds.contains(self.vertices[index as usize]));
                remaining = outside;

                if inside.is_empty() {
                    continue;
                }
                children.push(nodes.insert(TreeNode {
                    bounds,
                    points: inside,
                    children: Vec::new(),
                    depth,
                }));
            }

            stray += remaining.len();
            // Reversed so the stack pops children in octant order
            search_nodes.extend(children.iter().rev());
            nodes[key].children = children;
        }

        if stray > 0 {
            warn!(stray, "points not claimed by any octant");
        }

        let mut leaves = Vec::new();
        let mut walk = vec![root];
        while let Some(key) = walk.pop() {
            let node = &nodes[key];
            if node.is_leaf() && node.points.len() == 1 {
                leaves.push(key);
            }
            walk.extend(node.children.iter().rev());
        }

        let size = root_bounds.size();
        let octree = Octree {
            vertices: self.vertices,
            nodes,
            root,
            leaves,
            max_depth: self.max_depth,
            width: size.x,
            height: size.y,
            length: size.z,
        };

        debug!(
            nodes = octree.node_count(),
            leaves = octree.leaf_count(),
            avg_depth = octree.mean_leaf_depth(),
            max_depth = octree.nodes().map(TreeNode::depth).max().unwrap_or_default(),
            "octree built"
        );
        Ok(octree)
    }
}

impl Default for OctreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<Vec3> for OctreeBuilder {
    fn extend<I: IntoIterator<Item = Vec3>>(
        &mut self,
        iter: I,
    ) {
        self.vertices.extend(iter);
    }
}

/// Octree over a frozen vertex set.
///
/// Nodes live in an arena and only point downwards. Nothing is mutated after
/// [`OctreeBuilder::build`], so a built tree can be queried from many threads.
#[derive(Debug)]
pub struct Octree {
    vertices:  Vec<Vec3>,
    nodes:     SlotMap<NodeKey, TreeNode>,
    root:      NodeKey,
    leaves:    Vec<NodeKey>,
    max_depth: u32,
    width:     f32,
    height:    f32,
    length:    f32,
}

impl Octree {
    /// Shorthand for [`OctreeBuilder`].
    ///
    /// # Errors
    /// See [`OctreeBuilder::build`].
    pub fn build(
        vertices: Vec<Vec3>,
        max_depth: u32,
    ) -> Result<Self, BuildError> {
        OctreeBuilder {
            vertices,
            max_depth,
        }
        .build()
    }

    #[must_use]
    pub fn root(&self) -> &TreeNode {
        &self.nodes[self.root]
    }

    #[must_use]
    pub const fn root_key(&self) -> NodeKey {
        self.root
    }

    #[must_use]
    pub fn node(
        &self,
        key: NodeKey,
    ) -> Option<&TreeNode> {
        self.nodes.get(key)
    }

    pub fn children<'a>(
        &'a self,
        node: &'a TreeNode,
    ) -> impl Iterator<Item = &'a TreeNode> + 'a {
        node.children.iter().map(|&key| &self.nodes[key])
    }

    /// Every node, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Single-point leaves in depth-first order, the landing planner's candidates.
    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> {
        self.leaves.iter().map(|&key| &self.nodes[key])
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Mean depth over every childless node, depth-capped cells included.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_leaf_depth(&self) -> f64 {
        let (count, sum) = self
            .nodes()
            .filter(|node| node.is_leaf())
            .fold((0u64, 0u64), |(count, sum), node| (count + 1, sum + u64::from(node.depth)));
        sum as f64 / count.max(1) as f64
    }

    #[must_use]
    pub fn bounds(&self) -> &BoundingBox {
        &self.root().bounds
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex(
        &self,
        index: u32,
    ) -> Option<Vec3> {
        self.vertices.get(index as usize).copied()
    }

    #[must_use]
    pub const fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Extent of the terrain along X.
    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Extent of the terrain along Y.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Extent of the terrain along Z.
    #[must_use]
    pub const fn length(&self) -> f32 {
        self.length
    }
}
