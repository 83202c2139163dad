//! Generic SSA reconstruction (Cytron, Ferrante, Rosen, Wegman, Zadeck):
//! phi placement at dominance frontiers followed by dominator-tree-order
//! renaming. Section 4.3.3 uses this to rebuild a single-valued SSA name
//! for the stack pointer after spill/reload insertion has introduced
//! redefinitions a prior single definition can no longer reach.
//!
//! Non-recursive by construction: both phi placement and renaming walk an
//! explicit work stack rather than the call stack.

use std::collections::{HashMap, HashSet};

use crate::dominance::DominatorTree;
use crate::ir::{Graph, Mode, NodeId, Opcode};

/// Reaching definitions computed by [`reconstruct_ssa`].
pub struct Reconstruction {
    /// The name's reaching definition at the exit of each reachable block.
    pub reaching_exit: HashMap<NodeId, NodeId>,
    /// The name's reaching definition at the *entry* of each reachable
    /// block — before that block's own local redefinition, if any, applies.
    /// Equal to the inserted phi where one exists, to the function's
    /// `entry_value` at the entry block, and to the immediate dominator's
    /// `reaching_exit` everywhere else (the SSA dominance property: no phi
    /// means exactly one definition reaches this block).
    pub entering: HashMap<NodeId, NodeId>,
}

/// Rebuilds a single SSA-valued name given where it is locally redefined.
///
/// `local_defs` maps a block to the value that becomes the name's reaching
/// definition at that block's exit (e.g. the node directly after an IncSP
/// in that block). `entry_value` is the definition reaching the function's
/// entry block before any of `local_defs` apply.
///
/// Phis are inserted into the graph (and wired to `graph`'s per-block phi
/// list) wherever more than one definition reaches a join.
pub fn reconstruct_ssa(
    graph: &mut Graph,
    entry: NodeId,
    mode: Mode,
    entry_value: NodeId,
    local_defs: &HashMap<NodeId, NodeId>,
) -> Reconstruction {
    let tree = DominatorTree::build(graph, entry);
    let frontiers = tree.dominance_frontiers(graph);

    let phi_def = place_phis(graph, &frontiers, local_defs);
    rename(graph, &tree, entry, entry_value, local_defs, &phi_def)
}

fn place_phis(
    graph: &mut Graph,
    frontiers: &HashMap<NodeId, HashSet<NodeId>>,
    local_defs: &HashMap<NodeId, NodeId>,
) -> HashMap<NodeId, NodeId> {
    let mut phi_def: HashMap<NodeId, NodeId> = HashMap::new();
    let mut worklist: Vec<NodeId> = local_defs.keys().copied().collect();
    let mut queued: HashSet<NodeId> = worklist.iter().copied().collect();

    while let Some(block) = worklist.pop() {
        queued.remove(&block);
        let Some(frontier) = frontiers.get(&block) else {
            continue;
        };
        for &df_block in frontier {
            if phi_def.contains_key(&df_block) {
                continue;
            }
            let n_preds = graph.control_preds(df_block).len();
            let phi = graph.new_node(Opcode::Phi, mode, vec![NodeId::INVALID; n_preds], Some(df_block));
            graph.add_phi(df_block, phi);
            phi_def.insert(df_block, phi);
            if queued.insert(df_block) {
                worklist.push(df_block);
            }
        }
    }

    phi_def
}

fn rename(
    graph: &mut Graph,
    tree: &DominatorTree,
    entry: NodeId,
    entry_value: NodeId,
    local_defs: &HashMap<NodeId, NodeId>,
    phi_def: &HashMap<NodeId, NodeId>,
) -> Reconstruction {
    let succs = graph.successor_map();
    let children = tree.children();

    let mut reaching_exit: HashMap<NodeId, NodeId> = HashMap::new();
    let mut entering: HashMap<NodeId, NodeId> = HashMap::new();
    let mut stack: Vec<(NodeId, NodeId)> = vec![(entry, entry_value)];

    while let Some((block, incoming)) = stack.pop() {
        let mut current = incoming;
        if let Some(&phi) = phi_def.get(&block) {
            current = phi;
        }
        entering.insert(block, current);
        if let Some(&local) = local_defs.get(&block) {
            current = local;
        }
        reaching_exit.insert(block, current);

        if let Some(succ_list) = succs.get(&block) {
            for &succ in succ_list {
                if let Some(&phi) = phi_def.get(&succ) {
                    let preds = graph.control_preds(succ).to_vec();
                    if let Some(pos) = preds.iter().position(|&p| p == block) {
                        graph.node_mut(phi).inputs[pos] = current;
                    }
                }
            }
        }

        for &child in children.get(&block).into_iter().flatten() {
            stack.push((child, current));
        }
    }

    Reconstruction { reaching_exit, entering }
}
