//! Phi-spill walker: resolves a join block's incoming working set by
//! next-use distance and patches up predecessor edges whose exit set
//! disagrees with it (Section 4.2, "join blocks" / "cross-edge fixup").
//!
//! Loop headers are a known gap here: a backedge predecessor hasn't been
//! walked yet when its header is reached in reverse-postorder, so its exit
//! set is simply treated as empty this round. A second pass over just the
//! loop body would close that gap; this crate doesn't run one; see
//! Section 4.2's Open Questions.

use crate::collab::{Liveness, NextUseOracle, SpillEnvironment};
use crate::ir::{Graph, NodeId};
use crate::liveness::SimpleLiveness;
use crate::next_use::ScheduleNextUse;

use super::belady::ExitSets;

/// Freezes the next-use distance, from `block`'s first instruction, of
/// every live-in value and phi of `block` in `reg_class` — computed once
/// against the pre-mutation graph, the same freeze-then-mutate split
/// `spill::belady` uses, so [`resolve_join_entry`] can take `&mut Graph`
/// without fighting a borrow from the oracle that produced its input.
pub fn freeze_join_candidates(graph: &Graph, entry: NodeId, block: NodeId, reg_class: u32) -> Vec<(NodeId, u32)> {
    let liveness = SimpleLiveness::compute(graph, entry);
    let oracle = ScheduleNextUse::new(graph, entry);

    let mut candidates: Vec<NodeId> = liveness
        .live_in(block)
        .iter()
        .copied()
        .filter(|&v| graph.node(v).backend.reg_class == Some(reg_class))
        .collect();
    for &phi in graph.phis_of(block) {
        if graph.node(phi).backend.reg_class == Some(reg_class) && !candidates.contains(&phi) {
            candidates.push(phi);
        }
    }

    candidates.into_iter().map(|v| (v, oracle.distance(block, 0, v))).collect()
}

/// Picks the entry working set for a join block: the `capacity` candidates
/// (live-ins and phis of `block` in `reg_class`) with the nearest next-use
/// distance from `block`'s first instruction (Section 4.2 steps 1-3). Ties
/// go to the smaller [`NodeId`] so the choice is deterministic. Any phi of
/// `block` in `reg_class` that doesn't make the cut is spilled at the phi
/// via `env` (Section 4.2 step 4).
pub fn resolve_join_entry<E: SpillEnvironment>(
    graph: &mut Graph,
    block: NodeId,
    reg_class: u32,
    capacity: usize,
    frozen_candidates: &[(NodeId, u32)],
    env: &E,
) -> Vec<NodeId> {
    let mut by_distance = frozen_candidates.to_vec();
    by_distance.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

    let ws_start: Vec<NodeId> = by_distance.iter().take(capacity).map(|&(v, _)| v).collect();

    let phis = graph.phis_of(block).to_vec();
    for &phi in &phis {
        if graph.node(phi).backend.reg_class == Some(reg_class) && !ws_start.contains(&phi) {
            env.spill_phi(graph, phi, block);
        }
    }

    ws_start
}

/// For every predecessor whose exit set is missing a value the join's
/// resolved entry set needs, appends a reload to the end of that
/// predecessor's schedule. Returns the number of reloads inserted.
pub fn fixup_cross_edges<E: SpillEnvironment>(
    graph: &mut Graph,
    block: NodeId,
    entry_set: &[NodeId],
    exit_sets: &ExitSets,
    env: &E,
) -> usize {
    let preds = graph.control_preds(block).to_vec();
    let mut inserted = 0;
    for pred in preds {
        let have = exit_sets.get(&pred).cloned().unwrap_or_default();
        for &needed in entry_set {
            if !have.contains(&needed) {
                let reload = env.make_reload(graph, needed, pred);
                graph.push_scheduled(pred, reload);
                inserted += 1;
            }
        }
    }
    inserted
}
