use std::collections::HashMap;

use ssacore::ir::{EntityKind, FrameType, Graph, Mode, NodeId, Opcode, RegisterClass};
use ssacore::{fix_stack_nodes, layout_frame_type, opt_remove_unnecessary_phi_sccs, sim_stack_pointer, spill_belady, FixedCapacityEnv};

fn env_with_capacity(reg_class: u32, n: usize) -> FixedCapacityEnv {
    FixedCapacityEnv::new(HashMap::from([(reg_class, n)]))
}

#[test]
fn loop_carried_phi_collapses_before_the_spiller_ever_sees_it() {
    let mut g = Graph::new();
    let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
    let v = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    g.node_mut(v).backend.reg_class = Some(0);
    g.push_scheduled(entry, v);

    let header = g.new_node(Opcode::Block, Mode::Control, vec![entry], None);
    let latch = g.new_node(Opcode::Block, Mode::Control, vec![header], None);
    g.node_mut(header).inputs.push(latch);

    let phi = g.new_node(Opcode::Phi, Mode::Int(32), vec![v, NodeId::INVALID], Some(header));
    g.node_mut(phi).backend.reg_class = Some(0);
    g.add_phi(header, phi);
    g.node_mut(phi).inputs[1] = phi;

    let user = g.new_node(Opcode::Ordinary, Mode::Int(32), vec![phi], Some(header));
    g.push_scheduled(header, user);

    let stats = opt_remove_unnecessary_phi_sccs(&mut g).unwrap();
    assert_eq!(stats.redundant_removed, 1);
    assert_eq!(g.node(user).inputs[0], v);

    let rc = RegisterClass::new(0, 4);
    let env = env_with_capacity(0, 4);
    let (belady_stats, _) = spill_belady(&mut g, entry, &rc, &env).unwrap();
    assert_eq!(belady_stats.spills_inserted, 0);
}

#[test]
fn belady_spills_and_reloads_when_a_value_is_reused_after_displacement() {
    let mut g = Graph::new();
    let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
    let a = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    let b = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    g.node_mut(a).backend.reg_class = Some(0);
    g.node_mut(b).backend.reg_class = Some(0);
    g.push_scheduled(entry, a);
    g.push_scheduled(entry, b);

    let use_b = g.new_node(Opcode::Ordinary, Mode::Int(32), vec![b], Some(entry));
    g.push_scheduled(entry, use_b);
    // `a` is still needed here, after `b` has displaced it from a 1-wide set.
    let use_a_again = g.new_node(Opcode::Ordinary, Mode::Int(32), vec![a], Some(entry));
    g.push_scheduled(entry, use_a_again);

    let rc = RegisterClass::new(0, 1);
    let env = env_with_capacity(0, 1);
    let (stats, exit_sets) = spill_belady(&mut g, entry, &rc, &env).unwrap();

    assert!(stats.spills_inserted >= 1);
    assert!(stats.reloads_inserted >= 1);
    assert_eq!(exit_sets[&entry].len(), 1);
}

#[test]
fn k_equals_one_degenerate_working_set_never_holds_two_values() {
    let mut g = Graph::new();
    let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
    let a = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    let b = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    g.node_mut(a).backend.reg_class = Some(0);
    g.node_mut(b).backend.reg_class = Some(0);
    g.push_scheduled(entry, a);
    g.push_scheduled(entry, b);

    let rc = RegisterClass::new(0, 1);
    let env = env_with_capacity(0, 1);
    let (_, exit_sets) = spill_belady(&mut g, entry, &rc, &env).unwrap();
    assert!(exit_sets[&entry].len() <= 1);
}

#[test]
fn zero_instruction_block_spills_and_reloads_nothing() {
    let mut g = Graph::new();
    let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
    let rc = RegisterClass::new(0, 2);
    let env = env_with_capacity(0, 2);
    let (stats, exit_sets) = spill_belady(&mut g, entry, &rc, &env).unwrap();
    assert_eq!(stats.spills_inserted, 0);
    assert_eq!(stats.reloads_inserted, 0);
    assert!(exit_sets[&entry].is_empty());
}

#[test]
fn frame_layout_packs_spill_slots_closest_to_the_frame_pointer() {
    let mut frame = FrameType::new();
    frame.add_member(EntityKind::SpillSlot, 4, 4);
    frame.add_member(EntityKind::SpillSlot, 4, 4);
    frame.add_member(EntityKind::Ordinary, 16, 16);

    layout_frame_type(&mut frame, 0, 0);

    assert_eq!(frame.align, 16);
    assert_eq!(frame.size % 16, 0);
    let spill_offsets: Vec<i64> = frame
        .members
        .iter()
        .filter(|e| e.kind == EntityKind::SpillSlot)
        .map(|e| e.offset)
        .collect();
    let local_offset = frame
        .members
        .iter()
        .find(|e| e.kind == EntityKind::Ordinary)
        .unwrap()
        .offset;
    assert!(spill_offsets.iter().all(|&o| o > local_offset));
}

#[test]
fn spill_slots_only_frame_lays_out_with_no_ordinary_members() {
    let mut frame = FrameType::new();
    frame.add_member(EntityKind::SpillSlot, 8, 8);
    frame.add_member(EntityKind::SpillSlot, 8, 8);

    layout_frame_type(&mut frame, 0, 0);

    assert_eq!(frame.size, 16);
    assert!(frame.members.iter().all(|e| e.kind == EntityKind::SpillSlot));
}

#[test]
fn sp_simulation_and_ssa_fixup_agree_on_the_post_increment_value() {
    let mut g = Graph::new();
    let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
    g.set_entry(entry);
    let sp = g.new_node(Opcode::Const, Mode::Int(64), vec![], Some(entry));
    let inc = g.new_node(Opcode::IncSp, Mode::Int(64), vec![], Some(entry));
    g.node_mut(inc).imm = -32;
    g.node_mut(inc).align_request = Some(4);
    let user = g.new_node(Opcode::Ordinary, Mode::Int(64), vec![sp], Some(entry));
    g.push_scheduled(entry, inc);
    g.push_scheduled(entry, user);

    let exits = sim_stack_pointer(&mut g, 0, |exp| 1i64 << exp, |_, offset| offset);
    assert_eq!(exits[&entry], -32);

    let fixup_stats = fix_stack_nodes(&mut g, entry, sp);
    assert_eq!(fixup_stats.blocks_with_local_def, 1);
    assert_eq!(g.node(user).inputs[0], inc);
}

#[test]
fn a_spilled_value_gets_a_sound_stack_frame_home() {
    // End-to-end: spill one value out of a too-small working set, then lay
    // out a frame that has a slot for it.
    let mut g = Graph::new();
    let entry = g.new_node(Opcode::Block, Mode::Control, vec![], None);
    let a = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    let b = g.new_node(Opcode::Const, Mode::Int(32), vec![], Some(entry));
    g.node_mut(a).backend.reg_class = Some(0);
    g.node_mut(b).backend.reg_class = Some(0);
    g.push_scheduled(entry, a);
    g.push_scheduled(entry, b);
    let use_b = g.new_node(Opcode::Ordinary, Mode::Int(32), vec![b], Some(entry));
    g.push_scheduled(entry, use_b);
    let use_a_again = g.new_node(Opcode::Ordinary, Mode::Int(32), vec![a], Some(entry));
    g.push_scheduled(entry, use_a_again);

    let rc = RegisterClass::new(0, 1);
    let env = env_with_capacity(0, 1);
    let (stats, _) = spill_belady(&mut g, entry, &rc, &env).unwrap();
    assert!(stats.spills_inserted >= 1);

    let mut frame = FrameType::new();
    for _ in 0..stats.spills_inserted {
        frame.add_member(EntityKind::SpillSlot, 4, 4);
    }
    layout_frame_type(&mut frame, 0, 0);
    assert_eq!(frame.members.len(), stats.spills_inserted);
    assert!(frame.members.iter().all(|e| !e.is_unset()));
}
