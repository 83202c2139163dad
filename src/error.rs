//! Error classification (Section 7, "Error Handling Design").
//!
//! Benign absences — an entity with no spill slot need, a block with no
//! phis, a value that never needs a reload — are modeled as `Option`/empty
//! collections and a silent skip, never as an error variant. `CoreError`
//! exists only for the two cases a pass cannot recover from locally: an
//! invariant the caller's graph violated, and a collaborator-owned
//! operation this crate declines to provide a default for.

use thiserror::Error;

use crate::ir::NodeId;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The graph handed to a pass violates one of its stated preconditions
    /// (e.g. a φ-SCC with zero external predecessors, Section 4.1).
    #[error("invariant violated at {node:?}: {detail}")]
    Invariant { node: NodeId, detail: String },

    /// A collaborator trait method was required but no implementation was
    /// wired in and no default exists for this situation.
    #[error("unimplemented collaborator hook: {0}")]
    Unimplemented(&'static str),
}

pub type CoreResult<T> = Result<T, CoreError>;
