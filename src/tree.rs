//! Topology stages: leaves in key order, internal nodes from the sorted keys, and parent links
//!
//! Internal nodes follow Karras, "Maximizing Parallelism in the Construction of BVHs, Octrees, and k-d
//! Trees" (HPG 2012): every internal node `i` finds the key range it covers and where that range splits
//! using only the sorted key array, so all of them can be built at once.

use super::geom::Aabb;
use super::morton::MortonKey;
use super::node::{Node, NodeState};

#[cfg(feature="parallel")]
use rayon::prelude::*;

use std::sync::atomic::{AtomicI32, Ordering};

/// Writes the leaf half of `nodes` in sorted order
///
/// Slot `i` of the leaf half stores the object `index_converter[i]`; slots at or past `aabbs.len()` are
/// reset to empty padding.  Parent links are filled in later by [`backfill_parents`].
pub(crate) fn build_leaves(nodes: &mut [Node], aabbs: &[Aabb], index_converter: &[u32]) {
    let offset = nodes.len() / 2;
    par_iter!(nodes[offset..], par_iter_mut, iter_mut)
        .enumerate()
        .for_each(|(i, leaf)| {
            *leaf = if i < aabbs.len() {
                let object_id = index_converter[i];
                Node{
                    aabb: aabbs[object_id as usize],
                    object_id: object_id as i32,
                    state: NodeState::Claimed,
                    ..Node::default()
                }
            } else {
                Node::default()
            };
        });
}

/// Common-prefix oracle over the first `count` sorted keys
struct Prefixes<'a> {
    keys: &'a [MortonKey],
    count: i64
}

impl<'a> Prefixes<'a> {
    fn new(keys: &'a [MortonKey], count: usize) -> Self {
        Self{keys, count: count as i64}
    }

    /// `δ(a, b)`: length of the common prefix of keys `a` and `b`, or -1 if `b` is out of range
    ///
    /// Equal keys fall back to `(count - max(a, b)) + 32`, which exceeds any real prefix and keeps runs
    /// of duplicate keys strictly ordered.
    #[inline]
    fn delta(&self, a: i64, b: i64) -> i64 {
        if b < 0 || b >= self.count {
            return -1;
        }
        let (lhs, rhs) = (self.keys[a as usize], self.keys[b as usize]);
        if lhs == rhs {
            (self.count - std::cmp::max(a, b)) + 32
        } else {
            i64::from(lhs.common_prefix(rhs))
        }
    }

    /// The inclusive key range `(first, last)` covered by internal node `i`
    fn determine_range(&self, i: i64) -> (i64, i64) {
        let d = if self.delta(i, i + 1) - self.delta(i, i - 1) > 0 { 1 } else { -1 };
        let delta_min = self.delta(i, i - d);

        let mut l_max = 2;
        while self.delta(i, i + d * l_max) > delta_min {
            l_max *= 2;
        }

        let mut l = 0;
        let mut t = l_max;
        loop {
            t = (t + 1) >> 1;
            if self.delta(i, i + d * (l + t)) > delta_min {
                l += t;
            }
            if t <= 1 {
                break;
            }
        }

        let j = i + l * d;
        if d > 0 { (i, j) } else { (j, i) }
    }

    /// The last position of the left half of `[first, last]`: the highest key still sharing more than
    /// the range's common prefix with `first`
    fn find_split(&self, first: i64, last: i64) -> i64 {
        let common_prefix = self.delta(first, last);
        let mut split = first;
        let mut step = last - first;
        loop {
            step = (step + 1) >> 1;
            let proposal = split + step;
            if proposal < last && self.delta(first, proposal) > common_prefix {
                split = proposal;
            }
            if step <= 1 {
                break;
            }
        }
        split
    }
}

/// Writes internal nodes `[0, object_count - 1)` and records each as the parent of its two children
///
/// Unused internal slots are reset.  `parents` must hold -1 in every slot on entry; each child slot is
/// written by exactly one internal node, so the stores never contend.
pub(crate) fn build_internal_nodes(
    nodes: &mut [Node],
    keys: &[MortonKey],
    object_count: usize,
    parents: &[AtomicI32])
{
    let offset = (nodes.len() / 2) as i64;
    let prefixes = Prefixes::new(keys, object_count);
    let internal_count = object_count.saturating_sub(1);

    trace!("building {} internal nodes", internal_count);

    par_iter!(nodes[..offset as usize], par_iter_mut, iter_mut)
        .enumerate()
        .for_each(|(i, node)| {
            if i >= internal_count {
                *node = Node::default();
                return;
            }

            let (first, last) = prefixes.determine_range(i as i64);
            let split = prefixes.find_split(first, last);

            let left = if split == first { split + offset } else { split };
            let right = if split + 1 == last { split + 1 + offset } else { split + 1 };

            *node = Node{
                left: left as i32,
                right: right as i32,
                ..Node::default()
            };

            parents[left as usize].store(i as i32, Ordering::Relaxed);
            parents[right as usize].store(i as i32, Ordering::Relaxed);
        });
}

/// Copies parent links into the node array, leaving `parents` reset to -1 for the next build
pub(crate) fn backfill_parents(nodes: &mut [Node], parents: &[AtomicI32]) {
    let parents = &parents[..nodes.len()];
    par_iter!(nodes, par_iter_mut, iter_mut)
        .zip(par_iter!(parents, par_iter, iter))
        .enumerate()
        .for_each(|(i, (node, parent))| {
            let parent = parent.swap(Node::NONE, Ordering::Relaxed);
            node.parent = if i == 0 { Node::NONE } else { parent };
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    fn parent_buffer(len: usize) -> Vec<AtomicI32> {
        (0..len).map(|_| AtomicI32::new(Node::NONE)).collect()
    }

    fn build(keys: &[MortonKey]) -> Vec<Node> {
        let n = keys.len();
        let m = n.next_power_of_two();
        let aabbs: Vec<Aabb> = (0..n)
            .map(|i| {
                let x = i as f32;
                Aabb::new(Point3::new(x, 0f32, 0f32), Point3::new(x + 1f32, 1f32, 1f32))
            })
            .collect();
        let index_converter: Vec<u32> = (0..m as u32).collect();
        let mut padded = keys.to_vec();
        padded.resize(m, MortonKey::SENTINEL);

        let mut nodes = vec![Node::default(); 2 * m - 1];
        let parents = parent_buffer(2 * m - 1);
        build_leaves(&mut nodes, &aabbs, &index_converter);
        build_internal_nodes(&mut nodes, &padded, n, &parents);
        backfill_parents(&mut nodes, &parents);
        nodes
    }

    #[test]
    fn karras_example() {
        // the eight keys from the paper's figure 3
        let keys: Vec<MortonKey> = [0b00001, 0b00010, 0b00100, 0b00101, 0b10011, 0b11000, 0b11001, 0b11110]
            .iter()
            .map(|&k| MortonKey(k))
            .collect();
        let nodes = build(&keys);
        let leaf = |i: i32| i + 7;

        assert_eq!((nodes[0].left, nodes[0].right), (3, 4));
        assert_eq!((nodes[3].left, nodes[3].right), (1, 2));
        assert_eq!((nodes[1].left, nodes[1].right), (leaf(0), leaf(1)));
        assert_eq!((nodes[2].left, nodes[2].right), (leaf(2), leaf(3)));
        assert_eq!((nodes[4].left, nodes[4].right), (leaf(4), 5));
        assert_eq!((nodes[5].left, nodes[5].right), (6, leaf(7)));
        assert_eq!((nodes[6].left, nodes[6].right), (leaf(5), leaf(6)));

        assert_eq!(nodes[0].parent, Node::NONE);
        assert_eq!(nodes[5].parent, 4);
        assert_eq!(nodes[leaf(7) as usize].parent, 5);
        assert!(nodes[7..].iter().all(|leaf| leaf.state == NodeState::Claimed));
        assert!(nodes[..7].iter().all(|node| node.state == NodeState::Empty && node.object_id == Node::NONE));
    }

    #[test]
    fn duplicate_keys_form_a_chain() {
        let keys = vec![MortonKey(9); 4];
        let nodes = build(&keys);
        let leaf = |i: i32| i + 3;

        assert_eq!((nodes[0].left, nodes[0].right), (2, leaf(3)));
        assert_eq!((nodes[2].left, nodes[2].right), (1, leaf(2)));
        assert_eq!((nodes[1].left, nodes[1].right), (leaf(0), leaf(1)));
    }

    #[test]
    fn padding_and_unused_internals_are_reset() {
        let keys = vec![MortonKey(1), MortonKey(2), MortonKey(40)];
        let nodes = build(&keys);

        assert_eq!(nodes.len(), 7);
        assert_eq!(nodes[2], Node::default());
        assert_eq!(nodes[6], Node::default());
        assert_eq!((nodes[0].left, nodes[0].right), (1, 5));
        assert_eq!((nodes[1].left, nodes[1].right), (3, 4));
    }

    #[test]
    fn backfill_resets_buffer() {
        let mut nodes = vec![Node::default(); 3];
        let parents = parent_buffer(7);
        parents[1].store(0, Ordering::Relaxed);
        parents[2].store(0, Ordering::Relaxed);
        backfill_parents(&mut nodes, &parents);

        assert_eq!(nodes.iter().map(|node| node.parent).collect::<Vec<_>>(), vec![-1, 0, 0]);
        assert!(parents.iter().all(|parent| parent.load(Ordering::Relaxed) == Node::NONE));
    }
}
