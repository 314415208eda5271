//! Analyses and passes that turn the sequential IR of a gear into a
//! cycle-accurate description.
//!
//! A gear body produced by [`gearc_ir::from_ast`] reads like software: it
//! waits on interfaces, loops and calls helper functions. The passes in this
//! crate decide which variables must persist across clock cycles, split the
//! body into numbered cycle-states, forward values through each cycle and
//! finally make every handshake condition explicit. The passes are run in a
//! fixed order by a [`pipeline::Pipeline`].
pub mod analysis;
pub mod passes;
pub mod pipeline;
pub mod traversal;
mod unit;

pub use unit::Unit;
