//! Reference [`SpillEnvironment`]: fixed per-class capacity, Spill/Reload
//! nodes that just wrap the spilled value (Section 4.2, "Shared Contracts").

use std::collections::HashMap;

use crate::collab::SpillEnvironment;
use crate::ir::{Graph, NodeId, Opcode};

pub struct FixedCapacityEnv {
    capacity: HashMap<u32, usize>,
}

impl FixedCapacityEnv {
    pub fn new(capacity: HashMap<u32, usize>) -> Self {
        FixedCapacityEnv { capacity }
    }
}

impl SpillEnvironment for FixedCapacityEnv {
    fn capacity(&self, reg_class: u32) -> usize {
        self.capacity.get(&reg_class).copied().unwrap_or(0)
    }

    fn make_spill(&self, graph: &mut Graph, value: NodeId, block: NodeId) -> NodeId {
        graph.new_node(Opcode::Spill, crate::ir::Mode::Memory, vec![value], Some(block))
    }

    fn make_reload(&self, graph: &mut Graph, value: NodeId, block: NodeId) -> NodeId {
        let mode = graph.node(value).mode;
        let reg_class = graph.node(value).backend.reg_class;
        let reload = graph.new_node(Opcode::Reload, mode, vec![value], Some(block));
        graph.node_mut(reload).backend.reg_class = reg_class;
        reload
    }

    fn spill_phi(&self, graph: &mut Graph, phi: NodeId, block: NodeId) {
        let spill = self.make_spill(graph, phi, block);
        let mut sched = graph.schedule(block).to_vec();
        sched.insert(0, spill);
        graph.set_schedule(block, sched);
        graph.node_mut(phi).backend.reg_class = None;
    }
}
