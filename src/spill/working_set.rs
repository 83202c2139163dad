//! Bounded working set the Belady spiller maintains per register class
//! (Section 4.2, "Working set").

use crate::collab::NextUseOracle;
use crate::ir::NodeId;

/// Values currently believed to occupy a register, capped at `capacity`
/// (the register class's `n_regs`).
pub struct WorkingSet {
    capacity: usize,
    members: Vec<NodeId>,
}

impl WorkingSet {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "working set needs at least one slot");
        WorkingSet {
            capacity,
            members: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn contains(&self, v: NodeId) -> bool {
        self.members.contains(&v)
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn insert(&mut self, v: NodeId) {
        if !self.contains(v) {
            self.members.push(v);
        }
    }

    pub fn remove(&mut self, v: NodeId) {
        self.members.retain(|&m| m != v);
    }

    /// Evicts the member with the furthest next use at `(block, pos)`,
    /// returning it, or `None` if there was already a spare slot. Ties go to
    /// whichever candidate entered the set earliest — `sort_by` is stable,
    /// so a descending sort by distance leaves equal-distance candidates in
    /// their original relative order and the first of those is evicted.
    pub fn displace(&mut self, oracle: &dyn NextUseOracle, block: NodeId, pos: usize) -> Option<NodeId> {
        if self.members.len() < self.capacity {
            return None;
        }
        let mut by_distance: Vec<(u32, usize)> = self
            .members
            .iter()
            .enumerate()
            .map(|(i, &m)| (oracle.distance(block, pos, m), i))
            .collect();
        by_distance.sort_by(|a, b| b.0.cmp(&a.0));
        let (_, victim_idx) = by_distance[0];
        Some(self.members.remove(victim_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedDistances(HashMap<NodeId, u32>);

    impl NextUseOracle for FixedDistances {
        fn distance(&self, _block: NodeId, _pos: usize, value: NodeId) -> u32 {
            self.0.get(&value).copied().unwrap_or(Self::NO_FURTHER_USE)
        }
    }

    #[test]
    fn displace_picks_furthest_next_use() {
        let mut ws = WorkingSet::new(2);
        let a = NodeId(0);
        let b = NodeId(1);
        ws.insert(a);
        ws.insert(b);

        let mut distances = HashMap::new();
        distances.insert(a, 10);
        distances.insert(b, 3);
        let oracle = FixedDistances(distances);
        let block = NodeId(99);

        let evicted = ws.displace(&oracle, block, 0);
        assert_eq!(evicted, Some(a));
        assert!(ws.contains(b));
        assert!(!ws.contains(a));
    }

    #[test]
    fn displace_breaks_ties_by_insertion_order() {
        let mut ws = WorkingSet::new(2);
        let a = NodeId(0);
        let b = NodeId(1);
        ws.insert(a);
        ws.insert(b);

        let mut distances = HashMap::new();
        distances.insert(a, 5);
        distances.insert(b, 5);
        let oracle = FixedDistances(distances);

        let evicted = ws.displace(&oracle, NodeId(99), 0);
        assert_eq!(evicted, Some(a));
    }

    #[test]
    fn no_eviction_when_set_has_spare_capacity() {
        let mut ws = WorkingSet::new(2);
        ws.insert(NodeId(0));
        let oracle = FixedDistances(HashMap::new());
        assert_eq!(ws.displace(&oracle, NodeId(99), 0), None);
    }
}
