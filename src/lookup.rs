//! Bookkeeping for one iterative lookup: the global accumulator of
//! closest nodes, the queried set, frontier selection and the
//! convergence rule.

use std::collections::HashSet;

use crate::closest_nodes::ClosestNodes;
use crate::common::{Distance, Id, Node};
use crate::Config;

/// State private to a single `lookup` invocation.
///
/// Never shared across concurrent lookups; the caller merges each round's
/// results in one place after joining the round's probes, so merging
/// stays commutative and a round is applied atomically or not at all.
#[derive(Debug)]
pub(crate) struct LookupState {
    /// Global accumulator; its `k` head entries are the current result.
    closest: ClosestNodes,
    /// Identifiers already probed, seeded with the caller itself.
    queried: HashSet<Id>,
    /// Distance of the best-known-closest node, non-increasing across
    /// rounds.
    best: Distance,
    k: usize,
    alpha: usize,
}

impl LookupState {
    pub fn new(target: Id, config: Config) -> Self {
        Self {
            closest: ClosestNodes::new(target),
            queried: HashSet::new(),
            best: Distance::MAX,
            k: config.k,
            alpha: config.alpha,
        }
    }

    pub fn target(&self) -> Id {
        self.closest.target()
    }

    // === Public Methods ===

    /// Accept the initial local candidates and set the starting
    /// best-known-closest.
    pub fn seed(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.closest.add(node.clone());
        }

        if let Some(first) = self.closest.nodes().first() {
            self.best = first.id().xor(&self.target());
        }
    }

    pub fn mark_queried(&mut self, id: Id) {
        self.queried.insert(id);
    }

    /// The `alpha` closest not-yet-queried members of the accumulator's
    /// current top `k`, to be probed next round.
    pub fn frontier(&self) -> Vec<Node> {
        self.closest
            .take(self.k)
            .into_iter()
            .filter(|node| !self.queried.contains(node.id()))
            .take(self.alpha)
            .collect()
    }

    /// Fold one round's results into the accumulator.
    ///
    /// Returns `true` if any of them was strictly closer to the target
    /// than the best node known before the round; `false` means the
    /// search has plateaued and the lookup converged.
    pub fn merge_round(&mut self, round: &[Node]) -> bool {
        let target = self.target();

        let improved = round
            .iter()
            .any(|node| node.id().xor(&target) < self.best);

        for node in round {
            self.closest.add(node.clone());
        }

        if improved {
            if let Some(first) = self.closest.nodes().first() {
                self.best = first.id().xor(&target);
            }
        }

        improved
    }

    /// Result members that were never probed, for the final verification
    /// pass.
    pub fn unqueried_results(&self) -> Vec<Node> {
        self.closest
            .take(self.k)
            .into_iter()
            .filter(|node| !self.queried.contains(node.id()))
            .collect()
    }

    /// The up to `k` closest nodes found by this lookup.
    pub fn into_results(self) -> Vec<Node> {
        self.closest.take(self.k)
    }

    #[cfg(test)]
    fn best(&self) -> Distance {
        self.best
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> Config {
        Config::new(100, 8, 3, 2).expect("valid test config")
    }

    fn node(id: u64) -> Node {
        Node::new(Id::from_u64(id), config())
    }

    #[test]
    fn frontier_respects_alpha_and_queried() {
        let mut state = LookupState::new(Id::from_u64(0), config());

        state.seed(&[node(7), node(3), node(12), node(1)]);

        // Closest first: 1, 3, 7 (k = 3), alpha = 2 of them.
        let frontier = state.frontier();
        let ids: Vec<_> = frontier.iter().map(|n| *n.id()).collect();
        assert_eq!(ids, vec![Id::from_u64(1), Id::from_u64(3)]);

        state.mark_queried(Id::from_u64(1));

        let ids: Vec<_> = state.frontier().iter().map(|n| *n.id()).collect();
        assert_eq!(ids, vec![Id::from_u64(3), Id::from_u64(7)]);
    }

    #[test]
    fn merge_round_detects_plateau() {
        let mut state = LookupState::new(Id::from_u64(0), config());

        state.seed(&[node(8)]);

        // 4 is strictly closer to 0 than 8.
        assert!(state.merge_round(&[node(12), node(4)]));

        // Nothing closer than 4: converged.
        assert!(!state.merge_round(&[node(5), node(200)]));

        // An empty round never improves.
        assert!(!state.merge_round(&[]));
    }

    #[test]
    fn best_distance_never_increases_across_rounds() {
        let target = Id::from_u64(0);
        let mut state = LookupState::new(target, config());

        state.seed(&[node(200)]);

        let rounds: Vec<Vec<Node>> = vec![
            vec![node(150)],
            vec![node(90), node(170)],
            vec![node(40)],
            vec![node(60), node(250)],
        ];

        let mut best = state.best();

        for round in &rounds {
            state.merge_round(round);

            assert!(state.best() <= best, "best distance increased");
            best = state.best();
        }

        // The last round brought nothing closer than 40.
        assert_eq!(best, Id::from_u64(40).xor(&target));
        assert!(!state.merge_round(&rounds[3]));
    }

    #[test]
    fn results_are_capped_at_k_and_sorted() {
        let mut state = LookupState::new(Id::from_u64(0), config());

        state.seed(&[node(50)]);
        state.merge_round(&[node(9), node(2), node(30), node(17)]);

        let results = state.into_results();
        let ids: Vec<_> = results.iter().map(|n| *n.id()).collect();

        assert_eq!(ids, vec![Id::from_u64(2), Id::from_u64(9), Id::from_u64(17)]);
    }
}
