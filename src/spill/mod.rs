//! Belady-style register spiller (Section 4.2).

pub mod belady;
pub mod env;
pub mod phi_walker;
pub mod working_set;

pub use belady::{spill_belady, BeladyStats, ExitSets};
pub use env::FixedCapacityEnv;
pub use working_set::WorkingSet;
