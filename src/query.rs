use super::node::{leaves, Node};
use super::traits::Overlap;

use cgmath::{Point3, Vector3};
use cgmath::prelude::*;
use smallvec::SmallVec;

#[cfg(feature="parallel")]
use super::node::leaf_offset;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// Thresholds for [`query_neighbors_with`](fn.query_neighbors_with.html)
///
/// Alignments are cosines between the query's forward vector and the direction toward a candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub struct QueryParams {
    pub front_radius: f32,
    pub side_radius: f32,
    /// Subtrees whose center is farther than this (Manhattan distance on the XZ plane) and whose box
    /// does not overlap the query box are skipped
    pub broad_phase_radius: f32,
    pub front_alignment: f32,
    pub side_alignment: f32
}

impl Default for QueryParams {
    fn default() -> Self {
        Self{
            front_radius: 50f32,
            side_radius: 5f32,
            broad_phase_radius: 200f32,
            front_alignment: 0.999f32,
            side_alignment: 0.1f32
        }
    }
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_front_radius(mut self, radius: f32) -> Self {
        self.front_radius = radius;
        self
    }

    pub fn with_side_radius(mut self, radius: f32) -> Self {
        self.side_radius = radius;
        self
    }

    pub fn with_broad_phase_radius(mut self, radius: f32) -> Self {
        self.broad_phase_radius = radius;
        self
    }

    pub fn with_front_alignment(mut self, alignment: f32) -> Self {
        self.front_alignment = alignment;
        self
    }

    pub fn with_side_alignment(mut self, alignment: f32) -> Self {
        self.side_alignment = alignment;
        self
    }
}

/// What one object sensed around it
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub struct HitResult {
    /// Distance to the nearest front hit; the front radius when there is none
    pub nearest_front_distance: f32,
    /// Object id of the nearest front hit, or -1
    pub nearest_front_id: i32,
    /// Combination of `HitResult::FRONT`, `HitResult::SIDE_AHEAD` and `HitResult::SIDE_BEHIND`
    pub side_mask: u8
}

impl HitResult {
    pub const FRONT: u8 = 0x1;
    /// A side hit leaning toward the forward direction
    pub const SIDE_AHEAD: u8 = 0x2;
    /// A side hit leaning away from the forward direction
    pub const SIDE_BEHIND: u8 = 0x4;

    pub fn new(front_radius: f32) -> Self {
        Self{
            nearest_front_distance: front_radius,
            nearest_front_id: Node::NONE,
            side_mask: 0
        }
    }

    pub fn has_front(&self) -> bool {
        self.side_mask & Self::FRONT != 0
    }

    pub fn has_side(&self) -> bool {
        self.side_mask & (Self::SIDE_AHEAD | Self::SIDE_BEHIND) != 0
    }

    fn record(&mut self, candidate: &Node, distance: f32, alignment: f32, params: &QueryParams) {
        let is_front = distance < params.front_radius && alignment > params.front_alignment;
        let is_side = distance < params.side_radius && alignment.abs() > params.side_alignment;

        if is_front && distance < self.nearest_front_distance {
            self.nearest_front_distance = distance;
            self.nearest_front_id = candidate.object_id;
            self.side_mask |= Self::FRONT;
        }

        if is_side {
            self.side_mask |= if alignment > 0f32 { Self::SIDE_AHEAD } else { Self::SIDE_BEHIND };
        }
    }
}

/// [`query_neighbors_with`] using default [`QueryParams`] apart from the two radii
///
/// [`query_neighbors_with`]: fn.query_neighbors_with.html
/// [`QueryParams`]: struct.QueryParams.html
pub fn query_neighbors(
    nodes: &[Node],
    leaf_index: u32,
    position: Point3<f32>,
    forward: Vector3<f32>,
    front_radius: f32,
    side_radius: f32)
    -> HitResult
{
    let params = QueryParams::default()
        .with_front_radius(front_radius)
        .with_side_radius(side_radius);
    query_neighbors_with(nodes, leaf_index, position, forward, &params)
}

/// Finds the nearest object in front of a leaf, and flags objects beside it
///
/// `leaf_index` is a node index in the leaf half of `nodes`; `position` and `forward` describe the
/// query object (`forward` should be unit length).  Traversal is pre-order from the root, left before
/// right, and descends into a node only if it holds a box which either overlaps the query leaf's box or
/// whose center is within the broad-phase radius (measured on the XZ plane).  The query leaf itself is never visited.
pub fn query_neighbors_with(
    nodes: &[Node],
    leaf_index: u32,
    position: Point3<f32>,
    forward: Vector3<f32>,
    params: &QueryParams)
    -> HitResult
{
    let mut result = HitResult::new(params.front_radius);
    let query = match nodes.get(leaf_index as usize) {
        Some(query) => query,
        None => {
            debug!("query for leaf {} outside a tree of {} nodes", leaf_index, nodes.len());
            return result;
        }
    };

    let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
    if leaf_index != 0 {
        stack.push(0);
    }

    while let Some(index) = stack.pop() {
        let node = &nodes[index as usize];
        if !node.state.has_box() {
            continue;
        }

        let center = node.aabb.center();
        let toward = center - position;
        let manhattan = toward.x.abs() + toward.z.abs();
        if !node.aabb.overlaps(&query.aabb) && manhattan >= params.broad_phase_radius {
            continue;
        }

        match node.children() {
            Some((left, right)) => {
                if right != leaf_index {
                    stack.push(right);
                }
                if left != leaf_index {
                    stack.push(left);
                }
            }
            None => {
                let distance = toward.magnitude();
                let alignment = if distance > 0f32 {
                    toward.dot(forward) / distance
                } else {
                    0f32
                };
                result.record(node, distance, alignment, params);
            }
        }
    }

    result
}

/// Queries every object in the tree, returning results indexed by object id
///
/// `agent` maps an object id to that object's position and forward vector.
pub fn query_all<F>(nodes: &[Node], params: &QueryParams, agent: F) -> Vec<HitResult>
where
    F: Fn(u32) -> (Point3<f32>, Vector3<f32>)
{
    let mut results = vec![HitResult::new(params.front_radius); leaves(nodes).count()];
    for (leaf_index, leaf) in leaves(nodes) {
        let (position, forward) = agent(leaf.object_id as u32);
        results[leaf.object_id as usize] = query_neighbors_with(nodes, leaf_index, position, forward, params);
    }
    results
}

/// Parallel version of [`query_all`]
///
/// [`query_all`]: fn.query_all.html
#[cfg(feature="parallel")]
pub fn par_query_all<F>(nodes: &[Node], params: &QueryParams, agent: F) -> Vec<HitResult>
where
    F: Fn(u32) -> (Point3<f32>, Vector3<f32>) + Sync
{
    let offset = leaf_offset(nodes);
    let count = leaves(nodes).count();

    let hits: Vec<(usize, HitResult)> = (offset..offset + count)
        .into_par_iter()
        .map(|leaf_index| {
            let object_id = nodes[leaf_index].object_id as u32;
            let (position, forward) = agent(object_id);
            let hit = query_neighbors_with(nodes, leaf_index as u32, position, forward, params);
            (object_id as usize, hit)
        })
        .collect();

    let mut results = vec![HitResult::new(params.front_radius); count];
    for (object_id, hit) in hits {
        results[object_id] = hit;
    }
    results
}
