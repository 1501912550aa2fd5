use super::bounds::{reduce_bounds, DEFAULT_BOUNDS_BATCHES};
use super::error::BvhError;
use super::geom::Aabb;
use super::morton::{encode_keys, KeyEncoding, MortonKey};
use super::node::Node;
use super::refit::{refit, RefitSlot};
use super::sort::{sort_keys, SortStrategy};
use super::spin::SpinLock;
use super::tree::{backfill_parents, build_internal_nodes, build_leaves};
use super::validate::validate;

use std::sync::atomic::AtomicI32;

/// Tunables for [`BvhBuilder`](struct.BvhBuilder.html)
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub struct BuildOptions {
    pub encoding: KeyEncoding,
    /// Quantization per axis; clamped to what `encoding` can fit in 32 bits
    pub axis_bits: u32,
    pub sort_strategy: SortStrategy,
    pub bounds_batches: usize,
    /// Walk the finished tree and panic if it is malformed (debug builds only)
    pub validate: bool
}

impl Default for BuildOptions {
    fn default() -> Self {
        let encoding = KeyEncoding::default();
        Self{
            encoding,
            axis_bits: encoding.max_axis_bits(),
            sort_strategy: SortStrategy::default(),
            bounds_batches: DEFAULT_BOUNDS_BATCHES,
            validate: true
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the key encoding at its full per-axis precision
    pub fn with_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.encoding = encoding;
        self.axis_bits = encoding.max_axis_bits();
        self
    }

    pub fn with_axis_bits(mut self, bits: u32) -> Self {
        self.axis_bits = self.encoding.clamp_axis_bits(bits);
        self
    }

    pub fn with_sort_strategy(mut self, strategy: SortStrategy) -> Self {
        self.sort_strategy = strategy;
        self
    }

    pub fn with_bounds_batches(mut self, batches: usize) -> Self {
        self.bounds_batches = std::cmp::max(1, batches);
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// Owns the working buffers of the build pipeline and rebuilds the tree from scratch on every call
///
/// All buffers are sized once for `capacity` objects; [`build`] never allocates.
///
/// [`build`]: #method.build
pub struct BvhBuilder {
    capacity: usize,
    options: BuildOptions,
    object_count: usize,
    node_count: usize,
    nodes: Vec<Node>,
    keys: Vec<MortonKey>,
    index_converter: Vec<u32>,
    entries: Vec<u64>,
    scratch: Vec<u64>,
    parents: Vec<AtomicI32>,
    slots: Vec<SpinLock<RefitSlot>>
}

impl BvhBuilder {
    /// Largest capacity whose `2M - 1` node indices fit in an `i32` link
    pub const MAX_CAPACITY: usize = 1 << 30;

    pub fn new(capacity: usize) -> Result<Self, BvhError> {
        Self::with_options(capacity, BuildOptions::default())
    }

    pub fn with_options(capacity: usize, options: BuildOptions) -> Result<Self, BvhError> {
        if capacity == 0 {
            return Err(BvhError::ZeroCapacity);
        }
        if capacity > Self::MAX_CAPACITY {
            return Err(BvhError::CapacityTooLarge{
                capacity,
                max: Self::MAX_CAPACITY
            });
        }

        if options.validate && !cfg!(debug_assertions) {
            warn!("tree validation requested, but only runs with debug assertions enabled");
        }

        let leaf_capacity = capacity.next_power_of_two();
        let node_capacity = 2 * leaf_capacity - 1;
        debug!("allocating buffers for {} objects ({} nodes)", capacity, node_capacity);

        Ok(Self{
            capacity,
            options,
            object_count: 0,
            node_count: 0,
            nodes: vec![Node::default(); node_capacity],
            keys: vec![MortonKey::SENTINEL; leaf_capacity],
            index_converter: vec![0; leaf_capacity],
            entries: vec![0; leaf_capacity],
            scratch: vec![0; leaf_capacity],
            parents: (0..node_capacity).map(|_| AtomicI32::new(Node::NONE)).collect(),
            slots: (0..leaf_capacity - 1).map(|_| SpinLock::new(RefitSlot::default())).collect()
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Number of objects in the most recent build
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// The node array produced by the most recent build
    pub fn nodes(&self) -> &[Node] {
        &self.nodes[..self.node_count]
    }

    /// Builds a tree over `aabbs`, where the object id of each box is its index in the slice
    ///
    /// For `n` objects the returned array holds `2M - 1` nodes, where `M` is `n` rounded up to a power
    /// of two; the root is node 0 and leaves start at `M - 1`.  An empty input yields an empty array.
    pub fn build(&mut self, aabbs: &[Aabb]) -> Result<&[Node], BvhError> {
        let object_count = aabbs.len();
        if object_count > self.capacity {
            return Err(BvhError::CapacityExceeded{
                count: object_count,
                capacity: self.capacity
            });
        }

        let system_bounds = match reduce_bounds(aabbs, self.options.bounds_batches) {
            Some(bounds) => bounds,
            None => {
                debug!("building an empty tree");
                self.object_count = 0;
                self.node_count = 0;
                return Ok(&self.nodes[..0]);
            }
        };

        let size = system_bounds.size();
        if size.x <= 0f32 || size.y <= 0f32 || size.z <= 0f32 {
            debug!("system bounds {:?} are flat along at least one axis", system_bounds);
        }

        let leaf_count = object_count.next_power_of_two();
        let node_count = 2 * leaf_count - 1;
        trace!("building tree of {} objects, {} nodes", object_count, node_count);

        let keys = &mut self.keys[..leaf_count];
        let index_converter = &mut self.index_converter[..leaf_count];
        encode_keys(
            aabbs,
            system_bounds,
            self.options.encoding,
            self.options.axis_bits,
            keys,
            index_converter);

        sort_keys(
            self.options.sort_strategy,
            keys,
            index_converter,
            &mut self.entries[..leaf_count],
            &mut self.scratch[..leaf_count]);

        let nodes = &mut self.nodes[..node_count];
        build_leaves(nodes, aabbs, index_converter);
        build_internal_nodes(nodes, keys, object_count, &self.parents);
        backfill_parents(nodes, &self.parents);
        refit(nodes, object_count, &mut self.slots);

        if cfg!(debug_assertions) && self.options.validate {
            let report = validate(nodes);
            if !report.is_well_formed() || report.reached_leaves != object_count {
                panic!("built a malformed tree from {} objects: {:?}", object_count, report);
            }
        }

        self.object_count = object_count;
        self.node_count = node_count;
        Ok(&self.nodes[..node_count])
    }

    /// Releases every buffer; equivalent to dropping the builder
    pub fn dispose(self) {
        trace!("disposing builder with capacity {}", self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{leaves, NodeState};
    use cgmath::Point3;

    fn cube(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::new(Point3::new(x, y, z), Point3::new(x + 1f32, y + 1f32, z + 1f32))
    }

    #[test]
    fn zero_capacity() {
        assert_eq!(BvhBuilder::new(0).err(), Some(BvhError::ZeroCapacity));
    }

    #[test]
    fn capacity_too_large() {
        for &capacity in &[BvhBuilder::MAX_CAPACITY + 1, std::usize::MAX] {
            assert_eq!(
                BvhBuilder::new(capacity).err(),
                Some(BvhError::CapacityTooLarge{capacity, max: BvhBuilder::MAX_CAPACITY}));
        }
        assert_eq!(2 * BvhBuilder::MAX_CAPACITY - 1, std::i32::MAX as usize);
    }

    #[test]
    fn capacity_exceeded() {
        let mut builder = BvhBuilder::new(2).unwrap();
        let aabbs = [cube(0f32, 0f32, 0f32), cube(2f32, 0f32, 0f32), cube(4f32, 0f32, 0f32)];
        assert_eq!(
            builder.build(&aabbs).err(),
            Some(BvhError::CapacityExceeded{count: 3, capacity: 2}));
    }

    #[test]
    fn empty_frame() {
        let mut builder = BvhBuilder::new(4).unwrap();
        assert!(builder.build(&[]).unwrap().is_empty());
        assert_eq!(builder.object_count(), 0);
    }

    #[test]
    fn single_object() {
        let mut builder = BvhBuilder::new(1).unwrap();
        let aabb = cube(3f32, 3f32, 3f32);
        let nodes = builder.build(&[aabb]).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].object_id, 0);
        assert_eq!(nodes[0].parent, Node::NONE);
        assert_eq!(nodes[0].aabb, aabb);
    }

    #[test]
    fn buffers_reused_across_sizes() {
        let mut builder = BvhBuilder::new(9).unwrap();
        for &count in &[9usize, 3, 5, 1, 2, 9] {
            let aabbs: Vec<Aabb> = (0..count)
                .map(|i| cube((i * 3 % 7) as f32, 0f32, i as f32))
                .collect();
            let nodes = builder.build(&aabbs).unwrap();
            let m = count.next_power_of_two();
            assert_eq!(nodes.len(), 2 * m - 1);
            assert_eq!(leaves(nodes).count(), count);
            if count > 1 {
                assert_eq!(nodes[0].state, NodeState::Merged);
            }
            let report = validate(nodes);
            assert!(report.is_well_formed(), "{} objects: {:?}", count, report);
            assert_eq!(report.reached_leaves, count);
        }
    }

    #[test]
    fn options() {
        let options = BuildOptions::new()
            .with_encoding(KeyEncoding::Spatial)
            .with_axis_bits(32)
            .with_sort_strategy(SortStrategy::Radix)
            .with_bounds_batches(0);
        assert_eq!(options.axis_bits, 10);
        assert_eq!(options.bounds_batches, 1);

        let mut builder = BvhBuilder::with_options(4, options).unwrap();
        assert_eq!(builder.options(), &options);
        let nodes = builder.build(&[cube(0f32, 0f32, 0f32), cube(0f32, 5f32, 0f32), cube(0f32, 9f32, 0f32)]).unwrap();
        assert_eq!(leaves(nodes).count(), 3);
        builder.dispose();
    }
}
