//! Stack-pointer SSA reconstruction (Section 4.3.3).
//!
//! Spilling and frame layout can introduce new SP-carrying nodes into blocks
//! a single pre-existing SP definition no longer dominates every use of.
//! This rebuilds a proper SSA name for the stack pointer — phis where
//! needed — via the generic facility in [`crate::ssa_reconstruct`], then
//! redirects every stale reference to the original definition at the
//! correct reaching value for its position, and finally cleans up any
//! SP producer the end-node was only keeping alive for its own sake.

use std::collections::{HashMap, HashSet};

use crate::ir::{Graph, Mode, NodeId, Opcode};
use crate::ssa_reconstruct::reconstruct_ssa;

#[derive(Debug, Default, Clone, Copy)]
pub struct StackFixupStats {
    pub blocks_with_local_def: usize,
    pub phis_inserted: usize,
    pub uses_rewired: usize,
    pub orphaned_sp_nodes_removed: usize,
}

/// Whether `node` is a non-tuple-mode value that carries the stack pointer's
/// register: an `IncSp` always redefines it; anything else qualifies only
/// if a downstream coloring step has already assigned it `sp_value`'s
/// physical register (Section 4.3.3 step 1).
fn carries_sp_register(graph: &Graph, node: NodeId, sp_value: NodeId) -> bool {
    let n = graph.node(node);
    if n.mode == Mode::Tuple {
        return false;
    }
    if n.opcode == Opcode::IncSp || node == sp_value {
        return true;
    }
    let sp_assigned = graph.node(sp_value).backend.assigned;
    sp_assigned.is_some() && n.backend.assigned == sp_assigned
}

/// Rewires every use of `sp_value` to the SP definition that actually
/// reaches it, given that zero or more SP-carrying nodes have since been
/// inserted into the graph. Each block is assumed to carry at most one such
/// redefinition; a second one in the same block only the last is treated as
/// that block's redefinition point, and uses between the two keep seeing
/// the first's value incorrectly — a documented limitation, not silently
/// handled.
pub fn fix_stack_nodes(graph: &mut Graph, entry: NodeId, sp_value: NodeId) -> StackFixupStats {
    let mode = graph.node(sp_value).mode;
    let mut stats = StackFixupStats::default();

    let mut local_defs: HashMap<NodeId, NodeId> = HashMap::new();
    let mut all_sp_nodes: Vec<NodeId> = Vec::new();
    for block in graph.blocks() {
        let mut last = None;
        for &n in graph.schedule(block) {
            if carries_sp_register(graph, n, sp_value) {
                all_sp_nodes.push(n);
                last = Some(n);
            }
        }
        if let Some(n) = last {
            local_defs.insert(block, n);
        }
    }
    stats.blocks_with_local_def = local_defs.len();

    if local_defs.is_empty() {
        // Endless loops may have elided the keep-edges entirely; nothing to
        // reconstruct (Section 4.3.3 step 2).
        return stats;
    }

    let phi_count_before: usize = graph.blocks().iter().map(|&b| graph.phis_of(b).len()).sum();
    let recon = reconstruct_ssa(graph, entry, mode, sp_value, &local_defs);
    let phi_count_after: usize = graph.blocks().iter().map(|&b| graph.phis_of(b).len()).sum();
    stats.phis_inserted = phi_count_after - phi_count_before;

    for block in graph.blocks() {
        let mut current = *recon.entering.get(&block).unwrap_or(&sp_value);
        let schedule = graph.schedule(block).to_vec();
        for &node in &schedule {
            for input in &mut graph.node_mut(node).inputs {
                if *input == sp_value && node != sp_value && current != sp_value {
                    *input = current;
                    stats.uses_rewired += 1;
                }
            }
            if carries_sp_register(graph, node, sp_value) {
                current = node;
            }
        }
    }

    stats.orphaned_sp_nodes_removed = remove_orphaned_sp_producers(graph, &all_sp_nodes);

    tracing::debug!(
        target: "stack_fixup",
        phis_inserted = stats.phis_inserted,
        uses_rewired = stats.uses_rewired,
        orphans_removed = stats.orphaned_sp_nodes_removed,
        "stack pointer ssa reconstruction complete"
    );
    stats
}

/// Scans the end-node's keep inputs; any one that's an SP producer with no
/// real user left (only the end-node's own keep edge) is dropped from the
/// keep list and removed from its block's schedule (Section 4.3.3 step 5).
fn remove_orphaned_sp_producers(graph: &mut Graph, all_sp_nodes: &[NodeId]) -> usize {
    let Some(end) = graph.end() else {
        return 0;
    };
    let sp_nodes: HashSet<NodeId> = all_sp_nodes.iter().copied().collect();

    let mut removed = 0;
    let keep = graph.node(end).inputs.clone();
    let mut surviving = Vec::with_capacity(keep.len());
    for k in keep {
        let is_orphan_sp_producer =
            sp_nodes.contains(&k) && !graph.users_of(k).into_iter().any(|u| u != end);
        if is_orphan_sp_producer {
            if let Some(block) = graph.node(k).block {
                graph.remove_scheduled(block, k);
            }
            removed += 1;
        } else {
            surviving.push(k);
        }
    }
    graph.node_mut(end).inputs = surviving;
    removed
}
