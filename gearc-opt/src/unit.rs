use gearc_ir::{self as ir, Block, Context, FuncBlock, Register, Stmt};
use gearc_utils::Id;
use std::collections::BTreeSet;

/// A gear body or a helper function together with the state the passes
/// accumulate about it.
#[derive(Clone, Debug)]
pub struct Unit {
    pub ctx: Context,
    /// The body. For gears it repeats forever.
    pub body: Block,
    /// Helper functions reachable from the body, already optimized.
    pub funcs: Vec<FuncBlock>,
    /// Registers inferred before scheduling.
    pub inferred: BTreeSet<Id>,
    /// Lowered registers.
    pub registers: Vec<Register>,
    /// Number of cycle-states. Zero until scheduled.
    pub states: u32,
}

impl Unit {
    pub fn new(mut ctx: Context, stmts: Vec<Stmt>) -> Self {
        let id = ctx.fresh_id();
        Unit {
            ctx,
            body: Block::seq(id, stmts),
            funcs: vec![],
            inferred: BTreeSet::new(),
            registers: vec![],
            states: 0,
        }
    }

    pub fn is_gear(&self) -> bool {
        self.ctx.kind == ir::UnitKind::Gear
    }
}
