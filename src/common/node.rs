//! The routing-protocol peer: an identity plus a routing table, exposing
//! the single-hop `find_node` primitive and the iterative `lookup`
//! algorithm.

use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::common::{Id, RoutingTable};
use crate::id_generator::IdGenerator;
use crate::lookup::LookupState;
use crate::{Config, Result};

/// The capability a lookup needs from a remote peer.
///
/// [Node] implements it with direct in-process calls; a real deployment
/// implements the same contract over a transport with timeouts, and a
/// probe that fails there is equivalent to one returning no closer
/// nodes.
pub trait Peer {
    fn id(&self) -> &Id;

    /// Liveness probe gating bucket eviction.
    fn ping(&self) -> bool;

    /// Single-hop query: the peer's k closest known nodes to `target`,
    /// plus the traveled path extended with the peer itself.
    fn find_node(&self, target: &Id, traveled: &[Node]) -> Result<FindNodeResponse>;
}

#[derive(Debug, Clone)]
/// What a peer answers to a `find_node` query.
pub struct FindNodeResponse {
    /// Up to `k` nodes closest to the queried target, sorted by distance.
    pub closest: Vec<Node>,
    /// The chain of nodes the query passed through, callee included.
    pub traveled: Vec<Node>,
}

#[derive(Clone)]
/// A peer in the identifier space.
///
/// Cheap to clone; the same node is shared by many other nodes' routing
/// tables, while its lifetime belongs to whoever created it.
pub struct Node(Arc<NodeInner>);

struct NodeInner {
    id: Id,
    config: Config,
    /// Simulation switch: an unreachable node fails its liveness probes.
    alive: AtomicBool,
    routing_table: Mutex<RoutingTable>,
}

impl Node {
    /// Create a node with an explicit identifier, as used for synthetic
    /// probes and tests.
    pub fn new(id: Id, config: Config) -> Node {
        Node(Arc::new(NodeInner {
            id,
            config,
            alive: AtomicBool::new(true),
            routing_table: Mutex::new(RoutingTable::new(id, config)),
        }))
    }

    /// Create a node with a freshly generated unique identifier.
    pub fn generate(generator: &mut IdGenerator) -> Node {
        Node::new(generator.generate(), generator.config())
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.0.id
    }

    pub fn config(&self) -> Config {
        self.0.config
    }

    /// Snapshot of every peer this node currently knows, for read-only
    /// traversal by a harness.
    pub fn known_nodes(&self) -> Vec<Node> {
        self.table().nodes().cloned().collect()
    }

    pub fn table_size(&self) -> usize {
        self.table().size()
    }

    // === Public Methods ===

    /// Mark this node (un)reachable for subsequent liveness probes.
    pub fn set_alive(&self, alive: bool) {
        self.0.alive.store(alive, Ordering::Relaxed);
    }

    /// Insert a batch of freshly observed contacts, skipping self.
    pub fn update_routing_table<I>(&self, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut table = self.table();

        for node in nodes {
            table.insert(node)?;
        }

        Ok(())
    }

    /// Locate the up to `k` nodes closest to `target`, starting from
    /// local knowledge and converging through bounded-fan-out rounds of
    /// concurrent `find_node` queries.
    ///
    /// Returns an empty set when this node has no contacts at all, which
    /// is a normal terminal state for a node that just joined.
    pub fn lookup(&self, target: &Id) -> Result<Vec<Node>> {
        trace!(?target, id = ?self.id(), "New lookup");

        let seed = self.find_node(target, &[])?;

        if seed.closest.is_empty() {
            debug!(?target, "Lookup exhausted, no known contacts");
            return Ok(Vec::new());
        }

        let mut state = LookupState::new(*target, self.config());
        // A local find_node against self has implicitly happened.
        state.mark_queried(*self.id());
        state.seed(&seed.closest);

        let mut traveled = seed.traveled;
        let mut rounds = 0;

        loop {
            let frontier = state.frontier();

            if frontier.is_empty() {
                break;
            }

            let responses = probe(&frontier, target, &traveled);

            for node in &frontier {
                state.mark_queried(*node.id());
            }

            let mut round_nodes = Vec::new();

            for response in responses {
                let response = response?;

                round_nodes.extend(response.closest);
                merge_traveled(&mut traveled, response.traveled);
            }

            // Contacts learned this round feed back into our own table.
            self.update_routing_table(round_nodes.iter().cloned())?;

            rounds += 1;

            if !state.merge_round(&round_nodes) {
                // No one came closer than the best already found.
                break;
            }
        }

        // Final verification pass: contact the accumulated closest that
        // were never queried, without folding their answers back in.
        for response in probe(&state.unqueried_results(), target, &traveled) {
            response?;
        }

        let results = state.into_results();

        debug!(?target, rounds, found = results.len(), "Lookup converged");

        Ok(results)
    }

    // === Private Methods ===

    fn table(&self) -> MutexGuard<'_, RoutingTable> {
        // The table's invariants hold after every insert, so a table
        // poisoned by a panicking probe thread is still consistent.
        self.0
            .routing_table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Peer for Node {
    fn id(&self) -> &Id {
        &self.0.id
    }

    fn ping(&self) -> bool {
        self.0.alive.load(Ordering::Relaxed)
    }

    fn find_node(&self, target: &Id, traveled: &[Node]) -> Result<FindNodeResponse> {
        let mut table = self.table();

        let closest = table.closest(target)?;

        // Every hop the query passed through counts as a fresh contact.
        for hop in traveled {
            table.insert(hop.clone())?;
        }

        drop(table);

        let mut traveled = traveled.to_vec();
        traveled.push(self.clone());

        Ok(FindNodeResponse { closest, traveled })
    }
}

/// Dispatch one round of `find_node` queries concurrently and join them
/// all before anything is merged.
///
/// A probe that panics is reported as a peer returning no closer nodes;
/// it never aborts the round.
fn probe(frontier: &[Node], target: &Id, traveled: &[Node]) -> Vec<Result<FindNodeResponse>> {
    thread::scope(|scope| {
        let handles: Vec<_> = frontier
            .iter()
            .map(|node| scope.spawn(move || node.find_node(target, traveled)))
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(response) => response,
                Err(_) => Ok(FindNodeResponse {
                    closest: Vec::new(),
                    traveled: Vec::new(),
                }),
            })
            .collect()
    })
}

/// Append hops not seen before, preserving order of first contact.
fn merge_traveled(traveled: &mut Vec<Node>, new_hops: Vec<Node>) {
    for hop in new_hops {
        if !traveled.iter().any(|node| node.id() == hop.id()) {
            traveled.push(hop);
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Node {}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:x?})", &self.0.id.0)
    }
}

impl Debug for NodeInner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "NodeInner({:x?})", &self.id.0)
    }
}
