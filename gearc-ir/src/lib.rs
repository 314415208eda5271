//! Intermediate representation for the gearc compiler.
//!
//! The representation is generated from the frontend AST by [from_ast].
//! The key differences between the frontend AST and the IR are:
//! 1. Every IR expression is typed and constant subexpressions are folded
//!    as soon as they are built.
//! 2. Interface handshakes are explicit: suspension points are [Await]
//!    statements and acknowledgements are writes to interface signals.

// Modules defining internal structures.
mod context;
mod expr;
mod printer;
mod session;
mod stmt;
mod translation;
mod types;
mod value;

/// Module to transform AST gears into IR.
pub mod from_ast;

pub use context::{
    Context, DefSet, Interface, ScopeEntry, Submodule, UnitKind, VarKind,
    Variable,
};
pub use expr::{Component, Expr, FunctionCall, Name, Signal};
pub use printer::Printer;
pub use session::{Frame, Session, TranslateConfig, TranslatedFunc};
pub use stmt::{
    Assert, Assign, Await, AwaitKind, Block, BlockKind, FuncBlock, IfElse,
    Return, StateBranch, StateSwitch, Stmt, StmtId, Target, walk_stmts,
};
pub use translation::{Register, Translation};
pub use types::DType;
pub use value::{Value, min_type};

// Re-export types from the frontend.
pub use gearc_frontend::{BinOp, Direction, UnOp};
pub use gearc_utils::Id;
