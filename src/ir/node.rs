//! Arena-indexed node handles (Design Notes, Section 9: "represent the
//! graph as an arena of nodes indexed by integer handles; edges are
//! handles, never owning pointers").

use std::fmt;

use super::opcode::{Mode, Opcode};
use super::regclass::PhysReg;

/// Opaque handle into a [`super::graph::Graph`]'s node arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Sentinel used by callers that need an "invalid" handle before a real
    /// one is known (e.g. building `Node` before its Id is assigned).
    pub const INVALID: NodeId = NodeId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Backend annotation a node may carry once a register class has been
/// assigned to it (Section 3, "Node": "optional backend info").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendInfo {
    /// Register class this value needs a slot in, if any.
    pub reg_class: Option<u32>,
    /// Physical register assigned by a downstream coloring step.
    pub assigned: Option<PhysReg>,
}

/// A node in the SSA graph (Section 3, "Node").
///
/// For a Block node, `inputs` are its control predecessors. For everything
/// else, `inputs` are data inputs in operand order.
#[derive(Clone, Debug)]
pub struct Node {
    pub opcode: Opcode,
    pub mode: Mode,
    pub inputs: Vec<NodeId>,
    /// The block this node is scheduled/logically owned by. `None` only for
    /// Block nodes themselves (a Block does not belong to another block).
    pub block: Option<NodeId>,
    pub backend: BackendInfo,
    /// Opcode-specific immediate: a Const's value, an IncSp's signed
    /// stack-pointer delta, or a MemPerm's recorded simulated offset
    /// (Section 4.3.2).
    pub imm: i64,
    /// IncSp's alignment request, as a log2 exponent (`align = 4` means
    /// 16-byte alignment; `None` means "compensate to `wanted_bias`" rather
    /// than align, Section 4.3.2).
    pub align_request: Option<i64>,
    /// FrameAddr's target entity, as an index into the owning `FrameType`.
    pub entity: Option<usize>,
    /// Marks a φ that must survive Phi-SCC collapsing even with fewer than
    /// two external predecessors — an explicit loop-carry value a caller
    /// needs kept as a real φ (Section 4.1's removability predicate).
    pub loop_carry_phi: bool,
}

impl Node {
    pub fn new(opcode: Opcode, mode: Mode, inputs: Vec<NodeId>, block: Option<NodeId>) -> Self {
        Node {
            opcode,
            mode,
            inputs,
            block,
            backend: BackendInfo::default(),
            imm: 0,
            align_request: None,
            entity: None,
            loop_carry_phi: false,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.opcode, Opcode::Block)
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.opcode, Opcode::Phi)
    }
}
