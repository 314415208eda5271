//! Passes for the gearc compiler.
mod dead_code;
mod exit_cond;
mod infer_registers;
mod inline;
mod lower_registers;
mod schedule;

pub use dead_code::DeadCode;
pub use exit_cond::ExitCond;
pub use infer_registers::{CheckRegisters, InferRegisters};
pub use inline::Inline;
pub use lower_registers::{LowerRegisters, RegisterResets};
pub use schedule::Schedule;
