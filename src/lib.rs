//! # The gearc Compiler
//!
//! This crate plumbs together the gearc compiler crates and provides a
//! command-line interface for the compiler. Libraries that only need the
//! compiler's representation should depend on [`gearc_frontend`],
//! [`gearc_ir`] and [`gearc_opt`] directly.
pub mod cmdline;
pub mod driver;
pub mod translate;

pub use translate::translate;
