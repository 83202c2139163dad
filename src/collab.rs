//! Collaborator traits (Section 4.4, "Shared Contracts").
//!
//! Each pass in this crate is generic over the piece of analysis it needs
//! but does not itself compute. A caller wires in whatever implementation
//! fits its pipeline; this crate ships one reference implementation of
//! each trait, used by the tests and suitable as a default.

use std::collections::HashSet;

use crate::ir::{Graph, NodeId};

/// Whether a value is still needed past a given program point.
///
/// The Belady spiller queries this to decide whether a value leaving the
/// working set needs a spill at all, or can simply be dropped.
pub trait Liveness {
    fn live_in(&self, block: NodeId) -> &HashSet<NodeId>;
    fn live_out(&self, block: NodeId) -> &HashSet<NodeId>;
    fn is_live_after(&self, block: NodeId, pos: usize, value: NodeId) -> bool;
}

/// Distance, in scheduled steps, from a program point to a value's next use.
///
/// `u32::MAX` is the shared sentinel for "no further use" (Open Question 3:
/// used identically for a genuinely dead value and for a value live only at
/// block exit with no in-block use; Rust's stable sort then gives a
/// deterministic, first-seen tie-break between same-distance candidates).
pub trait NextUseOracle {
    const NO_FURTHER_USE: u32 = u32::MAX;

    /// Distance from position `pos` in `block`'s schedule to `value`'s next
    /// use, or [`Self::NO_FURTHER_USE`].
    fn distance(&self, block: NodeId, pos: usize, value: NodeId) -> u32;
}

/// Inserts phis for a value reconstructed into SSA form after the graph's
/// edges have been rewritten out from under its original definitions
/// (Section 4.3.3: stack-pointer SSA reconstruction after spill/reload
/// insertion shifts SP at points a prior single definition can't reach).
pub trait SsaReconstructor {
    /// Record that `value` is now the reaching definition at the end of
    /// `block`, replacing whatever reached there before.
    fn define(&mut self, graph: &mut Graph, block: NodeId, value: NodeId);

    /// Resolve the reaching definition of the reconstructed value at the
    /// start of `block`, inserting a Phi if more than one definition reaches
    /// it along different control-flow edges.
    fn reaching_def(&mut self, graph: &mut Graph, block: NodeId) -> NodeId;
}

/// Host-provided policy the Belady spiller defers to (Section 4.2): how big
/// the working set is per register class, and how to materialize the
/// Spill/Reload nodes the algorithm decides it needs.
pub trait SpillEnvironment {
    fn capacity(&self, reg_class: u32) -> usize;

    fn make_spill(&self, graph: &mut Graph, value: NodeId, block: NodeId) -> NodeId;

    fn make_reload(&self, graph: &mut Graph, value: NodeId, block: NodeId) -> NodeId;

    /// Records that `phi` (a join-block φ the next-use ranking didn't keep
    /// in registers) is spilled at the φ: every incoming edge's operand is
    /// spilled to a common slot and `phi` itself becomes a memory φ
    /// (Section 4.2 step 4).
    fn spill_phi(&self, graph: &mut Graph, phi: NodeId, block: NodeId);
}
