//! Stack-frame layout and stack-pointer rewiring (Section 4.3).

pub mod fixup;
pub mod layout;
pub mod sim;

pub use fixup::{fix_stack_nodes, StackFixupStats};
pub use layout::{layout_frame_type, sort_frame_entities};
pub use sim::sim_stack_pointer;
