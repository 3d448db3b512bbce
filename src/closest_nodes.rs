//! Accumulator keeping nodes sorted by XOR distance to a target.

use crate::common::{Id, Node};

#[derive(Debug, Clone)]
/// Nodes sorted by their XOR distance to a target, deduplicated by Id.
///
/// Backs both the routing table's local k-closest query and the global
/// accumulator of an iterative lookup.
pub struct ClosestNodes {
    target: Id,
    nodes: Vec<Node>,
}

impl ClosestNodes {
    pub fn new(target: Id) -> Self {
        Self {
            target,
            nodes: Vec::new(),
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // === Public Methods ===

    /// Insert a node at its distance rank, ignoring ids already present.
    pub fn add(&mut self, node: Node) {
        let seek = node.id().xor(&self.target);

        if let Err(pos) = self.nodes.binary_search_by(|probe| {
            if probe.id() == node.id() {
                std::cmp::Ordering::Equal
            } else {
                probe.id().xor(&self.target).cmp(&seek)
            }
        }) {
            self.nodes.insert(pos, node);
        }
    }

    /// The up to `k` closest nodes accumulated so far.
    pub fn take(&self, k: usize) -> Vec<Node> {
        self.nodes[..k.min(self.nodes.len())].to_vec()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.nodes.iter().any(|node| node.id() == id)
    }
}
