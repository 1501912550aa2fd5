use super::node::{leaves, Node, NodeState};
use super::traits::Containment;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Structural findings of a walk from the root
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeReport {
    pub reached_leaves: usize,
    pub reached_internals: usize,
    /// Nodes reached more than once (including self-references)
    pub revisited: Vec<u32>,
    /// Object leaves the walk never reached
    pub unreached_leaves: Vec<u32>,
    /// Child links pointing outside the array
    pub dangling: Vec<(u32, i32)>,
    /// Children whose parent link does not point back
    pub bad_parents: Vec<u32>,
    /// Reachable internal nodes that did not end up `Merged`
    pub unmerged: Vec<u32>,
    /// `(parent, child)` pairs where the parent box does not contain the child box
    pub uncontained: Vec<(u32, u32)>
}

impl TreeReport {
    pub fn is_well_formed(&self) -> bool {
        self.revisited.is_empty() &&
        self.unreached_leaves.is_empty() &&
        self.dangling.is_empty() &&
        self.bad_parents.is_empty() &&
        self.unmerged.is_empty() &&
        self.uncontained.is_empty()
    }
}

/// Walks the tree from the root, checking reachability, parent links and box containment
pub fn validate(nodes: &[Node]) -> TreeReport {
    let mut report = TreeReport::default();
    if nodes.is_empty() {
        return report;
    }

    let mut visited: FxHashSet<u32> = FxHashSet::default();
    let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
    stack.push(0);

    if nodes[0].parent != Node::NONE {
        report.bad_parents.push(0);
    }

    while let Some(index) = stack.pop() {
        if !visited.insert(index) {
            report.revisited.push(index);
            continue;
        }

        let node = &nodes[index as usize];
        let (left, right) = match node.children() {
            Some(children) => children,
            None => {
                if node.object_id >= 0 {
                    report.reached_leaves += 1;
                }
                continue;
            }
        };

        report.reached_internals += 1;
        if node.state != NodeState::Merged {
            report.unmerged.push(index);
        }

        for &child in &[left, right] {
            if child == index {
                report.revisited.push(child);
                continue;
            }
            let child_node = match nodes.get(child as usize) {
                Some(child_node) => child_node,
                None => {
                    report.dangling.push((index, child as i32));
                    continue;
                }
            };
            if child_node.parent != index as i32 {
                report.bad_parents.push(child);
            }
            if node.state.has_box() &&
               child_node.state.has_box() &&
               !node.aabb.contains(&child_node.aabb)
            {
                report.uncontained.push((index, child));
            }
            stack.push(child);
        }
    }

    report.unreached_leaves = leaves(nodes)
        .map(|(index, _)| index)
        .filter(|index| !visited.contains(index))
        .collect();

    report
}

/// Panics unless [`validate`](fn.validate.html) finds a well-formed tree
pub fn assert_well_formed(nodes: &[Node]) {
    let report = validate(nodes);
    if !report.is_well_formed() {
        panic!("malformed tree of {} nodes: {:?}", nodes.len(), report);
    }
}
