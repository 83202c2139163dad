//! Reference [`NextUseOracle`] implementation: distances derived from a
//! block's existing schedule order, not a whole-program use-distance
//! analysis.

use std::collections::HashSet;

use crate::collab::{Liveness, NextUseOracle};
use crate::ir::{Graph, NodeId};
use crate::liveness::SimpleLiveness;

/// Counts steps forward through a block's schedule to find the next node
/// that reads `value`. If the block's schedule is exhausted, falls back to
/// whether `value` is live out of the block: if so, distance is the number
/// of steps remaining to the block's end (a same-sentinel-sharing
/// approximation of "used later, exact point unknown"); if not, the value is
/// dead and the shared [`NextUseOracle::NO_FURTHER_USE`] sentinel applies.
pub struct ScheduleNextUse<'g> {
    graph: &'g Graph,
    liveness: SimpleLiveness,
}

impl<'g> ScheduleNextUse<'g> {
    pub fn new(graph: &'g Graph, entry: NodeId) -> Self {
        let liveness = SimpleLiveness::compute(graph, entry);
        ScheduleNextUse { graph, liveness }
    }

    /// Values consumed as a phi operand on some edge leaving `block`.
    fn phi_edge_uses(&self, block: NodeId) -> HashSet<NodeId> {
        let mut uses = HashSet::new();
        if let Some(succs) = self.graph.successor_map().get(&block) {
            for &succ in succs {
                let preds = self.graph.control_preds(succ);
                let Some(pos) = preds.iter().position(|&p| p == block) else {
                    continue;
                };
                for &phi in self.graph.phis_of(succ) {
                    uses.insert(self.graph.node(phi).inputs[pos]);
                }
            }
        }
        uses
    }
}

impl NextUseOracle for ScheduleNextUse<'_> {
    fn distance(&self, block: NodeId, pos: usize, value: NodeId) -> u32 {
        let schedule = self.graph.schedule(block);
        for (i, &n) in schedule.iter().enumerate().skip(pos) {
            if self.graph.node(n).inputs.iter().any(|&input| input == value) {
                return (i - pos) as u32;
            }
        }

        let used_past_block_end =
            self.phi_edge_uses(block).contains(&value) || self.liveness.live_out(block).contains(&value);
        if used_past_block_end {
            (schedule.len() - pos) as u32
        } else {
            Self::NO_FURTHER_USE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Mode, Opcode};

    #[test]
    fn finds_next_use_within_block() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        let v = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
        let filler = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
        let user = g.new_node(Opcode::Ordinary, Mode::Int(32), vec![v], Some(entry));
        g.push_scheduled(entry, v);
        g.push_scheduled(entry, filler);
        g.push_scheduled(entry, user);

        let oracle = ScheduleNextUse::new(&g, entry);
        assert_eq!(oracle.distance(entry, 0, v), 2);
    }

    #[test]
    fn dead_value_returns_sentinel() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        let v = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
        g.push_scheduled(entry, v);

        let oracle = ScheduleNextUse::new(&g, entry);
        assert_eq!(oracle.distance(entry, 0, v), ScheduleNextUse::NO_FURTHER_USE);
    }
}
