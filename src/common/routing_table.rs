//! Kademlia routing table: `m` k-buckets indexed by XOR distance, with
//! least-recently-seen eviction gated by a liveness probe.

use crate::closest_nodes::ClosestNodes;
use crate::common::{Distance, Id, Node, Peer};
use crate::{Config, Error, Result};

#[derive(Debug)]
/// Routing table owned by exactly one node.
///
/// Bucket `i` holds only peers whose XOR distance to the owner lies in
/// `[2^i, 2^(i+1) - 1]`; distance zero (the owner itself) is never
/// stored.
pub struct RoutingTable {
    id: Id,
    config: Config,
    buckets: Vec<KBucket>,
}

impl RoutingTable {
    /// Create a routing table with `m` empty buckets of capacity `k`.
    pub fn new(id: Id, config: Config) -> Self {
        let buckets = (0..config.m).map(|_| KBucket::new(config.k)).collect();

        RoutingTable { id, config, buckets }
    }

    // === Getters ===

    /// The [Id] of the owning node, where all distances are measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn buckets(&self) -> &[KBucket] {
        &self.buckets
    }

    // === Public Methods ===

    /// Attempt to add a peer to the bucket covering its distance range,
    /// returning `true` if it was admitted.
    ///
    /// Inserting the owner itself is a no-op. A distance that fits in
    /// none of the `m` buckets means the run was configured with a
    /// bit-width too small for an observed identifier, which is fatal.
    pub fn insert(&mut self, node: Node) -> Result<bool> {
        if node.id() == &self.id {
            // A node never routes to itself.
            return Ok(false);
        }

        let index = self.bucket_index(&self.id.xor(node.id()))?;

        Ok(self.buckets[index].insert(node))
    }

    /// Up to `k` known peers closest to `target`, sorted by XOR distance.
    ///
    /// Starts at the bucket covering the target's distance and expands
    /// outward one bucket at a time, alternating between lower and higher
    /// indices, until `k` candidates are collected or the table is
    /// exhausted. The nearest candidates cluster in the matching bucket;
    /// when it is sparse the next best live one prefix-bit away on either
    /// side, which is exactly what the alternating expansion visits
    /// first.
    pub fn closest(&self, target: &Id) -> Result<Vec<Node>> {
        let start = self.bucket_index(&self.id.xor(target))?;

        let mut closest = ClosestNodes::new(*target);

        for node in self.buckets[start].nodes() {
            closest.add(node.clone());
        }

        let mut left = start as isize - 1;
        let mut right = start + 1;
        let mut go_left = true;

        while closest.len() < self.config.k && (left >= 0 || right < self.config.m) {
            if go_left {
                if left >= 0 {
                    for node in self.buckets[left as usize].nodes() {
                        closest.add(node.clone());
                    }
                    left -= 1;
                }
            } else if right < self.config.m {
                for node in self.buckets[right].nodes() {
                    closest.add(node.clone());
                }
                right += 1;
            }

            go_left = !go_left;
        }

        Ok(closest.take(self.config.k))
    }

    /// Returns `true` if this routing table has no contacts at all.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    /// The number of peers in this routing table.
    pub fn size(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Iterate over every peer, bucket by bucket.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.buckets.iter().flat_map(|bucket| bucket.nodes())
    }

    // === Private Methods ===

    /// `floor(log2(distance))`, the index of the bucket covering a
    /// distance.
    ///
    /// The zero distance has no logarithm; it maps to bucket 0 so a
    /// lookup targeting the owner's own id still has a starting point.
    fn bucket_index(&self, distance: &Distance) -> Result<usize> {
        let bits = distance.bit_length();

        if bits == 0 {
            return Ok(0);
        }

        if bits > self.config.m {
            return Err(Error::BucketIndexOutOfRange {
                bits,
                m: self.config.m,
            });
        }

        Ok(bits - 1)
    }

    #[cfg(test)]
    fn contains(&self, id: &Id) -> bool {
        self.nodes().any(|node| node.id() == id)
    }
}

/// KBuckets are similar to LRU caches that evict unresponsive peers,
/// without dropping any responsive peer in the process.
#[derive(Debug)]
pub struct KBucket {
    k: usize,
    /// Peers ordered by recency of contact, least recently seen first.
    nodes: Vec<Node>,
}

impl KBucket {
    pub(crate) fn new(k: usize) -> Self {
        KBucket {
            k,
            nodes: Vec::with_capacity(k),
        }
    }

    // === Getters ===

    /// Peers in recency order, least recently seen at the head.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Peers matching a predicate, in recency order.
    pub fn nodes_where<P: Fn(&Node) -> bool>(&self, predicate: P) -> Vec<Node> {
        self.nodes.iter().filter(|node| predicate(node)).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() == self.k
    }

    // === Public Methods ===

    /// The standard Kademlia replacement policy, biased toward long-lived
    /// reachable contacts:
    ///
    /// - a known peer is moved to the tail (freshest),
    /// - an unknown peer is appended while there is room,
    /// - once full, the least recently seen peer is probed; if it
    ///   answers it keeps its slot (moved to the tail) and the newcomer
    ///   is discarded, otherwise it is evicted for the newcomer.
    pub fn insert(&mut self, incoming: Node) -> bool {
        if let Some(index) = self.nodes.iter().position(|n| n.id() == incoming.id()) {
            let existing = self.nodes.remove(index);
            self.nodes.push(existing);

            return true;
        }

        if self.nodes.len() < self.k {
            self.nodes.push(incoming);

            return true;
        }

        let head = self.nodes.remove(0);

        if head.ping() {
            // A stale but reachable peer beats an unverified newcomer.
            self.nodes.push(head);

            false
        } else {
            self.nodes.push(incoming);

            true
        }
    }

    #[cfg(test)]
    fn contains(&self, id: &Id) -> bool {
        self.nodes.iter().any(|node| node.id() == id)
    }
}
