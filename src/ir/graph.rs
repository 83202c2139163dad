//! The IR arena (Design Notes, Section 9) plus the per-node link-slot
//! resource-lock protocol (Sections 4.4, 5).

use std::cell::Cell;
use std::collections::HashMap;

use super::node::{Node, NodeId};
use super::opcode::{Mode, Opcode};

/// Owns every node in one function's SSA graph. Edges are [`NodeId`]
/// handles, never pointers, so cycles (φ-induced or otherwise) are just
/// ordinary data.
pub struct Graph {
    nodes: Vec<Node>,
    /// Per-block total order over non-Phi nodes (Section 3, "Block").
    schedules: HashMap<NodeId, Vec<NodeId>>,
    /// φ-nodes logically owned by a block but outside its schedule.
    phis: HashMap<NodeId, Vec<NodeId>>,
    entry: Option<NodeId>,
    /// The function's End node, whose inputs are keep-alive edges
    /// (Section 4.3.3 step 5).
    end: Option<NodeId>,
    link_held: Cell<bool>,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            schedules: HashMap::new(),
            phis: HashMap::new(),
            entry: None,
            end: None,
            link_held: Cell::new(false),
        }
    }

    pub fn new_node(&mut self, opcode: Opcode, mode: Mode, inputs: Vec<NodeId>, block: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let is_block = matches!(opcode, Opcode::Block);
        let is_phi = matches!(opcode, Opcode::Phi);
        self.nodes.push(Node::new(opcode, mode, inputs, block));
        if is_block {
            self.schedules.insert(id, Vec::new());
            self.phis.insert(id, Vec::new());
        } else if is_phi {
            if let Some(b) = block {
                self.phis.entry(b).or_default().push(id);
            }
        }
        id
    }

    pub fn set_entry(&mut self, id: NodeId) {
        self.entry = Some(id);
    }

    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn set_end(&mut self, id: NodeId) {
        self.end = Some(id);
    }

    pub fn end(&self) -> Option<NodeId> {
        self.end
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn all_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    /// A Block's control predecessors are its input list (Section 3).
    pub fn control_preds(&self, block: NodeId) -> &[NodeId] {
        debug_assert!(self.node(block).is_block());
        &self.node(block).inputs
    }

    pub fn schedule(&self, block: NodeId) -> &[NodeId] {
        self.schedules.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_schedule(&mut self, block: NodeId, order: Vec<NodeId>) {
        self.schedules.insert(block, order);
    }

    /// Position of `n` within its block's schedule, if scheduled.
    pub fn position_of(&self, block: NodeId, n: NodeId) -> Option<usize> {
        self.schedule(block).iter().position(|&x| x == n)
    }

    pub fn insert_before(&mut self, block: NodeId, before: NodeId, new: NodeId) {
        let sched = self.schedules.entry(block).or_default();
        let pos = sched.iter().position(|&x| x == before).unwrap_or(sched.len());
        sched.insert(pos, new);
    }

    pub fn insert_after(&mut self, block: NodeId, after: NodeId, new: NodeId) {
        let sched = self.schedules.entry(block).or_default();
        let pos = sched.iter().position(|&x| x == after).map(|p| p + 1).unwrap_or(sched.len());
        sched.insert(pos, new);
    }

    pub fn push_scheduled(&mut self, block: NodeId, new: NodeId) {
        self.schedules.entry(block).or_default().push(new);
    }

    /// Drops `node` from `block`'s schedule, leaving its arena slot in place
    /// (no true deletion — edges are handles, so other nodes may still,
    /// harmlessly, reference an unscheduled node).
    pub fn remove_scheduled(&mut self, block: NodeId, node: NodeId) {
        if let Some(sched) = self.schedules.get_mut(&block) {
            sched.retain(|&n| n != node);
        }
    }

    pub fn phis_of(&self, block: NodeId) -> &[NodeId] {
        self.phis.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_phi(&mut self, block: NodeId, phi: NodeId) {
        self.phis.entry(block).or_default().push(phi);
    }

    pub fn remove_phi(&mut self, block: NodeId, phi: NodeId) {
        if let Some(list) = self.phis.get_mut(&block) {
            list.retain(|&p| p != phi);
        }
    }

    /// All blocks in the graph, in arena order (not control-flow order).
    pub fn blocks(&self) -> Vec<NodeId> {
        self.all_ids().filter(|&id| self.node(id).is_block()).collect()
    }

    /// Every node whose input list contains `id` (scans the whole arena;
    /// this is a small/medium-scale IR, not a performance-critical one).
    pub fn users_of(&self, id: NodeId) -> Vec<NodeId> {
        self.all_ids()
            .filter(|&n| self.node(n).inputs.iter().any(|&i| i == id))
            .collect()
    }

    /// Redirect every input edge pointing at `old` to point at `new`.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        for node in &mut self.nodes {
            for input in &mut node.inputs {
                if *input == old {
                    *input = new;
                }
            }
        }
    }

    /// Control-flow successor map, derived from every block's predecessor
    /// list (the graph stores predecessors as inputs; this inverts it).
    pub fn successor_map(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut succs: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for block in self.blocks() {
            for &pred in self.control_preds(block) {
                succs.entry(pred).or_default().push(block);
            }
        }
        succs
    }

    /// Reserve the single-writer per-node link slot for the calling pass.
    /// Panics if another pass's [`LinkTable`] guard is still alive — two
    /// passes must never hold it simultaneously (Sections 4.4, 5).
    pub fn link_table<T>(&self) -> LinkTable<'_, T> {
        assert!(!self.link_held.get(), "IRN_LINK already reserved by another pass");
        self.link_held.set(true);
        LinkTable {
            graph: self,
            data: HashMap::new(),
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Pass-private per-node scratch data (Design Notes, Section 9: "pass-local
/// side tables (handle -> struct) keyed off the arena index"). Dropping
/// this releases the lock it holds on [`Graph`].
pub struct LinkTable<'g, T> {
    graph: &'g Graph,
    data: HashMap<NodeId, T>,
}

impl<'g, T> LinkTable<'g, T> {
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.data.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.data.get_mut(&id)
    }

    pub fn insert(&mut self, id: NodeId, value: T) -> Option<T> {
        self.data.insert(id, value)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data.contains_key(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        self.data.remove(&id)
    }
}

impl<T> Drop for LinkTable<'_, T> {
    fn drop(&mut self) {
        self.graph.link_held.set(false);
    }
}
