pub mod collab;
pub mod dominance;
pub mod error;
pub mod ir;
pub mod liveness;
pub mod next_use;
pub mod phi_scc;
pub mod spill;
pub mod ssa_reconstruct;
pub mod stack;

pub use collab::{Liveness, NextUseOracle, SpillEnvironment, SsaReconstructor};
pub use error::{CoreError, CoreResult};
pub use liveness::SimpleLiveness;
pub use next_use::ScheduleNextUse;
pub use phi_scc::{opt_remove_unnecessary_phi_sccs, PhiSccStats};
pub use spill::{spill_belady, BeladyStats, ExitSets, FixedCapacityEnv, WorkingSet};
pub use ssa_reconstruct::{reconstruct_ssa, Reconstruction};
pub use stack::{fix_stack_nodes, layout_frame_type, sim_stack_pointer, sort_frame_entities, StackFixupStats};
