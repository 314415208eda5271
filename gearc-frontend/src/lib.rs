//! Frontend parsing and AST representation.
//!
//! Defines the AST for gear programs and the parser that produces it.
//! The AST is lowered into the representation defined in `gearc-ir`.

pub mod ast;
pub mod parser;

mod common;

pub use ast::Program;
pub use common::{BinOp, Direction, UnOp};
pub use parser::GearParser;
