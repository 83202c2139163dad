//! Stack-pointer bias simulation (Section 4.3.2).
//!
//! Walks the control-flow graph in DFS order from the entry block, each
//! block visited at most once, maintaining two running integers: `offset`,
//! the actual SP displacement from entry, and `wanted_bias`, the displacement
//! the callee ABI wants at the current point (it can lag `offset` by however
//! much padding an alignment request has added). `IncSp` and `MemPerm` are
//! handled inline; every other opcode is delegated to a caller-supplied
//! callback, which is free to mutate the graph afterward since this pass
//! only ever mutates `imm` fields as it goes, never structure.

use std::collections::{HashMap, HashSet};

use crate::ir::{Graph, NodeId, Opcode};

use super::layout::round_up_misaligned;

/// Runs the simulation from the graph's entry block, invoking
/// `sim_callback(node, offset)` for every scheduled node that isn't an
/// `IncSp` or `MemPerm`. `p2align` converts a node's stored log2 exponent
/// into the actual alignment it names (`p2align(4) == 16`). Returns the
/// bias at the exit of every reachable block.
pub fn sim_stack_pointer(
    graph: &mut Graph,
    misalign: i64,
    p2align: impl Fn(i64) -> i64,
    mut sim_callback: impl FnMut(NodeId, i64) -> i64,
) -> HashMap<NodeId, i64> {
    let entry = graph.entry().expect("sim_stack_pointer requires an entry block");
    let succs = graph.successor_map();

    let mut exit_offset: HashMap<NodeId, i64> = HashMap::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<(NodeId, i64, i64)> = vec![(entry, 0, 0)];

    while let Some((block, incoming_offset, incoming_bias)) = stack.pop() {
        if !visited.insert(block) {
            continue;
        }

        let mut offset = incoming_offset;
        let mut wanted_bias = incoming_bias;
        let schedule = graph.schedule(block).to_vec();

        for node in schedule {
            match graph.node(node).opcode {
                Opcode::IncSp => {
                    let ofs = graph.node(node).imm;
                    let updated_ofs = if let Some(align) = graph.node(node).align_request {
                        let candidate = offset + ofs;
                        let aligned = -round_up_misaligned(-candidate, p2align(align), misalign);
                        ofs + (aligned - candidate)
                    } else {
                        let delta = wanted_bias - offset;
                        debug_assert!(delta <= 0, "wanted_bias ran ahead of offset");
                        ofs + delta
                    };
                    graph.node_mut(node).imm = updated_ofs;
                    offset += updated_ofs;
                }
                Opcode::MemPerm => {
                    graph.node_mut(node).imm = offset;
                }
                _ => {
                    let new_offset = sim_callback(node, offset);
                    if new_offset == 0 {
                        offset = 0;
                        wanted_bias = 0;
                    } else {
                        wanted_bias += new_offset - offset;
                        offset = new_offset;
                    }
                }
            }
        }

        exit_offset.insert(block, offset);
        for &succ in succs.get(&block).into_iter().flatten() {
            stack.push((succ, offset, wanted_bias));
        }
    }

    exit_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Mode;

    fn p2align_pow2(exp: i64) -> i64 {
        1i64 << exp
    }

    #[test]
    fn inc_sp_with_align_request_rounds_and_patches_the_node() {
        // Section 8 scenario 6: IncSP(ofs=-20, align=4) from offset 0.
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        g.set_entry(entry);
        let inc = g.new_node(Opcode::IncSp, Mode::Control, vec![], Some(entry));
        g.node_mut(inc).imm = -20;
        g.node_mut(inc).align_request = Some(4);
        g.push_scheduled(entry, inc);

        let exits = sim_stack_pointer(&mut g, 0, p2align_pow2, |_, offset| offset);

        assert_eq!(g.node(inc).imm, -32);
        assert_eq!(exits[&entry], -32);
    }

    #[test]
    fn inc_sp_without_align_folds_a_zero_discrepancy_through_unchanged() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        g.set_entry(entry);
        let inc = g.new_node(Opcode::IncSp, Mode::Control, vec![], Some(entry));
        g.node_mut(inc).imm = -8;
        g.push_scheduled(entry, inc);

        // wanted_bias starts at 0 and offset starts at 0, so the compensating
        // branch (align_request == None) has nothing to make up: delta == 0.
        let exits = sim_stack_pointer(&mut g, 0, p2align_pow2, |_, offset| offset);

        assert_eq!(g.node(inc).imm, -8);
        assert_eq!(exits[&entry], -8);
    }

    #[test]
    fn wanted_bias_resets_with_the_callback_then_a_compensating_inc_sp_matches_it() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        g.set_entry(entry);
        let reset = g.new_node(Opcode::Ordinary, Mode::Int(64), vec![], Some(entry));
        let inc = g.new_node(Opcode::IncSp, Mode::Control, vec![], Some(entry));
        g.node_mut(inc).imm = 0;
        g.push_scheduled(entry, reset);
        g.push_scheduled(entry, inc);

        // The callback resets both offset and wanted_bias to 0 (frame-pointer
        // restore), so the trailing compensating IncSp sees delta == 0.
        let exits = sim_stack_pointer(&mut g, 0, p2align_pow2, |_, _| 0);

        assert_eq!(g.node(inc).imm, 0);
        assert_eq!(exits[&entry], 0);
    }

    #[test]
    fn mem_perm_records_offset_without_changing_it() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        g.set_entry(entry);
        let inc = g.new_node(Opcode::IncSp, Mode::Control, vec![], Some(entry));
        g.node_mut(inc).imm = -16;
        let perm = g.new_node(Opcode::MemPerm, Mode::Control, vec![], Some(entry));
        g.push_scheduled(entry, inc);
        g.push_scheduled(entry, perm);

        let exits = sim_stack_pointer(&mut g, 0, p2align_pow2, |_, offset| offset);

        assert_eq!(g.node(perm).imm, -16);
        assert_eq!(exits[&entry], -16);
    }

    #[test]
    fn callback_returning_zero_resets_both_running_values() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        g.set_entry(entry);
        let inc = g.new_node(Opcode::IncSp, Mode::Control, vec![], Some(entry));
        g.node_mut(inc).imm = -16;
        let restore = g.new_node(Opcode::Ordinary, Mode::Int(64), vec![], Some(entry));
        g.push_scheduled(entry, inc);
        g.push_scheduled(entry, restore);

        let exits = sim_stack_pointer(&mut g, 0, p2align_pow2, |node, offset| {
            if node == restore {
                0
            } else {
                offset
            }
        });

        assert_eq!(exits[&entry], 0);
    }

    #[test]
    fn diamond_visits_each_successor_once_with_the_entry_blocks_exit_bias() {
        let mut g = Graph::new();
        let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
        g.set_entry(entry);
        let inc = g.new_node(Opcode::IncSp, Mode::Control, vec![], Some(entry));
        g.node_mut(inc).imm = -8;
        g.push_scheduled(entry, inc);
        let left = g.new_node(Opcode::Block, Mode::Control, vec![entry], None);
        let right = g.new_node(Opcode::Block, Mode::Control, vec![entry], None);
        let _join = g.new_node(Opcode::Block, Mode::Control, vec![left, right], None);

        let exits = sim_stack_pointer(&mut g, 0, p2align_pow2, |_, offset| offset);
        assert_eq!(exits[&left], -8);
        assert_eq!(exits[&right], -8);
    }
}
