//! Reference [`Liveness`] implementation.
//!
//! Deliberately a single backward sweep in postorder, not an iterate-to-
//! fixpoint dataflow solver: general fixpoint iteration over the CFG is out
//! of scope for this crate. Loop bodies can therefore undercount liveness
//! across a backedge on the first sweep; callers with loop-carried values
//! that must be exact should feed liveness in from their own analysis
//! through the same trait instead of relying on this default.

use std::collections::{HashMap, HashSet};

use crate::collab::Liveness;
use crate::dominance::reverse_postorder;
use crate::ir::{Graph, NodeId};

pub struct SimpleLiveness {
    live_in: HashMap<NodeId, HashSet<NodeId>>,
    live_out: HashMap<NodeId, HashSet<NodeId>>,
}

impl SimpleLiveness {
    pub fn compute(graph: &Graph, entry: NodeId) -> Self {
        let succs = graph.successor_map();
        let order = reverse_postorder(graph, entry, &succs);

        let mut live_in: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        let mut live_out: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();

        // Uses a value in whatever block feeds a phi operand, attributed to
        // the predecessor edge the operand corresponds to.
        let mut phi_edge_uses: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        for &block in &order {
            for &phi in graph.phis_of(block) {
                let preds = graph.control_preds(block);
                for (i, &input) in graph.node(phi).inputs.iter().enumerate() {
                    if let Some(&pred) = preds.get(i) {
                        phi_edge_uses.entry(pred).or_default().insert(input);
                    }
                }
            }
        }

        for &block in order.iter().rev() {
            let defs: HashSet<NodeId> = graph
                .schedule(block)
                .iter()
                .copied()
                .chain(graph.phis_of(block).iter().copied())
                .collect();

            let mut local_uses: HashSet<NodeId> = HashSet::new();
            for &n in graph.schedule(block) {
                for &input in &graph.node(n).inputs {
                    if !defs.contains(&input) {
                        local_uses.insert(input);
                    }
                }
            }
            if let Some(edge_uses) = phi_edge_uses.get(&block) {
                local_uses.extend(edge_uses.iter().copied());
            }

            let mut out: HashSet<NodeId> = HashSet::new();
            if let Some(succ_list) = succs.get(&block) {
                for &succ in succ_list {
                    if let Some(succ_in) = live_in.get(&succ) {
                        out.extend(succ_in.iter().copied());
                    }
                }
            }

            let mut inn = local_uses.clone();
            inn.extend(out.difference(&defs).copied());

            live_out.insert(block, out);
            live_in.insert(block, inn);
        }

        SimpleLiveness { live_in, live_out }
    }
}

impl Liveness for SimpleLiveness {
    fn live_in(&self, block: NodeId) -> &HashSet<NodeId> {
        static EMPTY: std::sync::OnceLock<HashSet<NodeId>> = std::sync::OnceLock::new();
        self.live_in.get(&block).unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }

    fn live_out(&self, block: NodeId) -> &HashSet<NodeId> {
        static EMPTY: std::sync::OnceLock<HashSet<NodeId>> = std::sync::OnceLock::new();
        self.live_out.get(&block).unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }

    /// Approximated as "live out of the block": this reference
    /// implementation does not retain per-position use information, only
    /// block-granularity live sets. A caller needing exact in-block
    /// distances should consult [`crate::next_use::ScheduleNextUse`] instead.
    fn is_live_after(&self, block: NodeId, _pos: usize, value: NodeId) -> bool {
        self.live_out(block).contains(&value)
    }
}
