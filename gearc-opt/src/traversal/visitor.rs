//! Implements a visitor for statement lists of the IR.
//! Passes implemented as a [Visitor] are invoked on a [Unit] and may
//! replace or remove any statement they visit.
use super::action::{Action, VisResult};
use crate::Unit;
use gearc_ir::{
    Assert, Assign, Await, Block, Context, IfElse, Return, StateSwitch, Stmt,
};
use gearc_utils::GearcResult;

/// The visiting interface for the IR. Each `start_*` method runs before the
/// children of a node are visited and each `finish_*` method after.
///
/// The arms of an [IfElse] and the branches of a [StateSwitch] are not
/// visited as blocks: only their statements are traversed.
pub trait Visitor {
    /// Visit the statements of the unit's body.
    fn do_pass(&mut self, unit: &mut Unit) -> GearcResult<()>
    where
        Self: Sized,
    {
        traverse(self, &mut unit.body.stmts, &mut unit.ctx)
    }

    /// Executed before visiting the children of a [Block].
    fn start_block(&mut self, _b: &mut Block, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after visiting the children of a [Block].
    fn finish_block(&mut self, _b: &mut Block, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    fn start_if(&mut self, _s: &mut IfElse, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    fn finish_if(&mut self, _s: &mut IfElse, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    fn start_states(
        &mut self,
        _s: &mut StateSwitch,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    fn finish_states(
        &mut self,
        _s: &mut StateSwitch,
        _ctx: &mut Context,
    ) -> VisResult {
        Ok(Action::Continue)
    }

    fn assign(&mut self, _s: &mut Assign, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    fn await_stmt(&mut self, _s: &mut Await, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    fn assert(&mut self, _s: &mut Assert, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }

    fn func_return(&mut self, _s: &mut Return, _ctx: &mut Context) -> VisResult {
        Ok(Action::Continue)
    }
}

/// Visit every statement of `stmts`, applying the changes requested by the
/// visitor.
pub fn traverse<V: Visitor + ?Sized>(
    visitor: &mut V,
    stmts: &mut Vec<Stmt>,
    ctx: &mut Context,
) -> GearcResult<()> {
    for mut stmt in std::mem::take(stmts) {
        match stmt.visit(visitor, ctx)? {
            Action::Change(new) => stmts.extend(new),
            Action::Continue | Action::SkipChildren => stmts.push(stmt),
        }
    }
    Ok(())
}

/// Describes types that can be visited by things implementing [Visitor].
pub trait Visitable {
    fn visit<V: Visitor + ?Sized>(
        &mut self,
        visitor: &mut V,
        ctx: &mut Context,
    ) -> VisResult;
}

impl Visitable for Stmt {
    fn visit<V: Visitor + ?Sized>(
        &mut self,
        visitor: &mut V,
        ctx: &mut Context,
    ) -> VisResult {
        match self {
            Stmt::Assign(s) => visitor.assign(s, ctx),
            Stmt::Await(s) => visitor.await_stmt(s, ctx),
            Stmt::Assert(s) => visitor.assert(s, ctx),
            Stmt::Return(s) => visitor.func_return(s, ctx),
            Stmt::Block(b) => b.visit(visitor, ctx),
            Stmt::IfElse(ie) => ie.visit(visitor, ctx),
            Stmt::States(sw) => sw.visit(visitor, ctx),
        }
    }
}

impl Visitable for Block {
    fn visit<V: Visitor + ?Sized>(
        &mut self,
        visitor: &mut V,
        ctx: &mut Context,
    ) -> VisResult {
        visitor
            .start_block(self, ctx)?
            .and_then(|| {
                traverse(visitor, &mut self.stmts, ctx)?;
                Ok(Action::Continue)
            })?
            .pop()
            .and_then(|| visitor.finish_block(self, ctx))
    }
}

impl Visitable for IfElse {
    fn visit<V: Visitor + ?Sized>(
        &mut self,
        visitor: &mut V,
        ctx: &mut Context,
    ) -> VisResult {
        visitor
            .start_if(self, ctx)?
            .and_then(|| {
                for arm in &mut self.branches {
                    traverse(visitor, &mut arm.stmts, ctx)?;
                }
                Ok(Action::Continue)
            })?
            .pop()
            .and_then(|| visitor.finish_if(self, ctx))
    }
}

impl Visitable for StateSwitch {
    fn visit<V: Visitor + ?Sized>(
        &mut self,
        visitor: &mut V,
        ctx: &mut Context,
    ) -> VisResult {
        visitor
            .start_states(self, ctx)?
            .and_then(|| {
                for br in &mut self.branches {
                    traverse(visitor, &mut br.body.stmts, ctx)?;
                }
                Ok(Action::Continue)
            })?
            .pop()
            .and_then(|| visitor.finish_states(self, ctx))
    }
}
