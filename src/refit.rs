use super::geom::Aabb;
use super::node::{Node, NodeState};
use super::spin::SpinLock;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// The mutable part of an internal node during refit
#[derive(Clone, Copy, Debug)]
pub(crate) struct RefitSlot {
    pub aabb: Aabb,
    pub state: NodeState
}

impl Default for RefitSlot {
    fn default() -> Self {
        Self{
            aabb: Aabb::empty(),
            state: NodeState::Empty
        }
    }
}

/// Propagates leaf boxes up to the root
///
/// Every leaf walks its parent chain concurrently.  At each ancestor, under that ancestor's lock:
///
/// * `Empty`: the walker records its box, marks the node `Claimed` and stops; the sibling subtree has
///   not reported yet and its walker will carry the merged box further.
/// * `Claimed`/`Merged`: the walker unions its box into the node, marks it `Merged` and continues
///   upward with the union.
///
/// `slots` holds one lock per internal node and is left reset once the results are copied back.
pub(crate) fn refit(nodes: &mut [Node], object_count: usize, slots: &mut [SpinLock<RefitSlot>]) {
    let offset = nodes.len() / 2;
    let internal_count = object_count.saturating_sub(1);
    if internal_count == 0 {
        return;
    }
    let slots = &mut slots[..internal_count];

    {
        let nodes: &[Node] = &*nodes;
        let slots: &[SpinLock<RefitSlot>] = &*slots;
        par_iter!((offset..offset + object_count), into_par_iter, into_iter)
            .for_each(|leaf| {
                let mut aabb = nodes[leaf].aabb;
                let mut parent = nodes[leaf].parent;
                while parent != Node::NONE {
                    {
                        let mut slot = slots[parent as usize].lock();
                        let state = slot.state;
                        match state {
                            NodeState::Empty => {
                                slot.aabb = aabb;
                                slot.state = NodeState::Claimed;
                                break;
                            }
                            NodeState::Claimed | NodeState::Merged => {
                                slot.aabb = slot.aabb.union(aabb);
                                slot.state = NodeState::Merged;
                                aabb = slot.aabb;
                            }
                        }
                    }
                    parent = nodes[parent as usize].parent;
                }
            });
    }

    par_iter!(nodes[..internal_count], par_iter_mut, iter_mut)
        .zip(par_iter!(slots, par_iter_mut, iter_mut))
        .for_each(|(node, slot)| {
            let slot = std::mem::replace(slot.get_mut(), RefitSlot::default());
            node.aabb = slot.aabb;
            node.state = slot.state;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    fn slots(n: usize) -> Vec<SpinLock<RefitSlot>> {
        (0..n).map(|_| SpinLock::new(RefitSlot::default())).collect()
    }

    fn leaf(x: f32, parent: i32, object_id: i32) -> Node {
        Node{
            aabb: Aabb::new(Point3::new(x, 0f32, 0f32), Point3::new(x + 1f32, 1f32, 1f32)),
            object_id,
            parent,
            state: NodeState::Claimed,
            ..Node::default()
        }
    }

    #[test]
    fn three_leaves() {
        //        0
        //      /   \
        //     1    leaf 2
        //    / \
        // leaf0 leaf1
        let mut nodes = vec![
            Node{left: 1, right: 5, ..Node::default()},
            Node{left: 3, right: 4, parent: 0, ..Node::default()},
            Node::default(),
            leaf(0f32, 1, 0),
            leaf(4f32, 1, 1),
            leaf(-3f32, 0, 2),
            Node::default()];
        let mut locks = slots(3);
        refit(&mut nodes, 3, &mut locks);

        assert_eq!(nodes[1].state, NodeState::Merged);
        assert_eq!(nodes[1].aabb.min.x, 0f32);
        assert_eq!(nodes[1].aabb.max.x, 5f32);
        assert_eq!(nodes[0].state, NodeState::Merged);
        assert_eq!(nodes[0].aabb.min.x, -3f32);
        assert_eq!(nodes[0].aabb.max.x, 5f32);
        assert_eq!(nodes[2].state, NodeState::Empty);
        assert!(locks.iter_mut().all(|lock| lock.get_mut().state == NodeState::Empty));
    }

    #[test]
    fn single_leaf_is_untouched() {
        let mut nodes = vec![leaf(2f32, Node::NONE, 0)];
        let before = nodes.clone();
        refit(&mut nodes, 1, &mut slots(1));
        assert_eq!(nodes, before);
    }
}
