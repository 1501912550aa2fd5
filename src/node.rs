use super::geom::Aabb;

/// Validity of a node's box
///
/// An internal node is `Empty` until the first of its children reports a box, `Claimed` while it only
/// holds that one child's box, and `Merged` once the second child has been folded in.  Leaves are
/// written as `Claimed`, since they hold exactly one object's box.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub enum NodeState {
    Empty,
    Claimed,
    Merged
}

impl NodeState {
    /// Whether the node's box may be read
    pub fn has_box(self) -> bool {
        self != NodeState::Empty
    }
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Empty
    }
}

/// One entry of the flat node array
///
/// For an array of length `2M - 1`, indices `[0, M - 1)` are internal nodes (0 is the root) and indices
/// `[M - 1, 2M - 1)` are leaves.  Links use `-1` for "none".
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub struct Node {
    pub aabb: Aabb,
    /// Input index of the object stored in a leaf; `-1` for internal nodes and padding
    pub object_id: i32,
    pub left: i32,
    pub right: i32,
    pub parent: i32,
    pub state: NodeState
}

impl Node {
    pub const NONE: i32 = -1;

    pub fn is_leaf(&self) -> bool {
        self.left < 0 && self.right < 0
    }

    pub fn children(&self) -> Option<(u32, u32)> {
        if self.left < 0 || self.right < 0 {
            None
        } else {
            Some((self.left as u32, self.right as u32))
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self{
            aabb: Aabb::empty(),
            object_id: Node::NONE,
            left: Node::NONE,
            right: Node::NONE,
            parent: Node::NONE,
            state: NodeState::Empty
        }
    }
}

/// Index of the first leaf in a node array (`M - 1` for an array of `2M - 1` nodes)
pub fn leaf_offset(nodes: &[Node]) -> usize {
    nodes.len() / 2
}

/// Iterates `(node index, node)` over leaves holding an object, skipping padding
pub fn leaves<'a>(nodes: &'a [Node]) -> impl Iterator<Item = (u32, &'a Node)> + 'a {
    let offset = leaf_offset(nodes);
    nodes[offset..].iter()
        .enumerate()
        .filter(|(_, node)| node.object_id >= 0)
        .map(move |(i, node)| ((offset + i) as u32, node))
}

/// Node index of the leaf storing `object_id`, if any
pub fn find_leaf(nodes: &[Node], object_id: u32) -> Option<u32> {
    leaves(nodes)
        .find(|(_, node)| node.object_id == object_id as i32)
        .map(|(index, _)| index)
}
