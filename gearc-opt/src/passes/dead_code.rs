use crate::Unit;
use crate::traversal::{Action, Named, Pass, VisResult, Visitor, traverse};
use gearc_ir::{Assign, Block, BlockKind, Context, IfElse, Stmt, Target};
use gearc_utils::{GearcResult, Id};
use itertools::Itertools;
use std::collections::{BTreeSet, VecDeque};

/// Removes code that has no effect on the outputs of a unit.
///
/// Blocks and arms that can never run are removed, as are empty ones.
/// Assignments to combinational variables that are never read are removed
/// until none are left, and the variables with them. Finally, helper
/// functions no longer called are dropped.
#[derive(Default)]
pub struct DeadCode {
    /// Names read anywhere in the unit.
    reads: BTreeSet<Id>,
    /// Something was removed in the current sweep.
    changed: bool,
}

impl Named for DeadCode {
    fn name() -> &'static str {
        "dead-code"
    }

    fn description() -> &'static str {
        "remove unreachable statements and unread variables"
    }
}

fn read_names(stmts: &[Stmt]) -> BTreeSet<Id> {
    let mut reads = BTreeSet::new();
    gearc_ir::walk_stmts(stmts, &mut |s| {
        for e in s.exprs() {
            reads.extend(e.names());
        }
        if let Stmt::Assign(Assign {
            target: Target::Part(n, _),
            ..
        }) = s
        {
            reads.insert(n.name);
        }
    });
    reads
}

fn calls(stmts: &[Stmt]) -> BTreeSet<Id> {
    let mut calls = BTreeSet::new();
    gearc_ir::walk_stmts(stmts, &mut |s| {
        for e in s.exprs() {
            calls.extend(e.calls());
        }
    });
    calls
}

fn is_empty(b: &Block) -> bool {
    b.stmts.is_empty()
}

impl Visitor for DeadCode {
    fn start_block(&mut self, b: &mut Block, _ctx: &mut Context) -> VisResult {
        if b.in_cond.is_false() {
            self.changed = true;
            return Ok(Action::remove());
        }
        Ok(Action::Continue)
    }

    fn finish_block(&mut self, b: &mut Block, _ctx: &mut Context) -> VisResult {
        if is_empty(b) {
            self.changed = true;
            return Ok(Action::remove());
        }
        if b.kind == BlockKind::Seq && b.exit_cond.is_true() {
            self.changed = true;
            return Ok(Action::Change(std::mem::take(&mut b.stmts)));
        }
        Ok(Action::Continue)
    }

    fn start_if(&mut self, ie: &mut IfElse, _ctx: &mut Context) -> VisResult {
        let before = ie.branches.len();
        ie.branches.retain(|arm| !arm.in_cond.is_false());
        if let Some(last) = ie.branches.iter().position(|arm| arm.in_cond.is_true()) {
            ie.branches.truncate(last + 1);
        }
        self.changed |= ie.branches.len() != before;
        Ok(Action::Continue)
    }

    fn finish_if(&mut self, ie: &mut IfElse, ctx: &mut Context) -> VisResult {
        // An empty arm in the middle still shadows the arms after it.
        while ie.branches.last().is_some_and(is_empty) {
            ie.branches.pop();
            self.changed = true;
        }
        match ie.branches.as_slice() {
            [] => {
                self.changed = true;
                Ok(Action::remove())
            }
            [only] if only.in_cond.is_true() && ie.exit_cond.is_true() => {
                self.changed = true;
                Ok(Action::Change(only.stmts.clone()))
            }
            [only] if ie.exit_cond.is_true() => {
                self.changed = true;
                let mut b = Block::cond(ctx.fresh_id(), only.in_cond.clone(), only.stmts.clone());
                b.exit_cond = only.exit_cond.clone();
                b.pos = ie.pos;
                Ok(Action::change(Stmt::Block(b)))
            }
            _ => Ok(Action::Continue),
        }
    }

    fn assign(&mut self, a: &mut Assign, ctx: &mut Context) -> VisResult {
        let Target::Var(n) = &a.target else {
            return Ok(Action::Continue);
        };
        if ctx.is_wire(n.name) && Some(n.name) != ctx.rst_cond && !self.reads.contains(&n.name) {
            log::trace!("{}: removing unread assignment to `{}'", ctx.name, n.name);
            self.changed = true;
            return Ok(Action::remove());
        }
        Ok(Action::Continue)
    }
}

impl Pass for DeadCode {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        loop {
            self.reads = read_names(&unit.body.stmts);
            self.changed = false;
            traverse(self, &mut unit.body.stmts, &mut unit.ctx)?;
            if !self.changed {
                break;
            }
        }

        let mut written = BTreeSet::new();
        gearc_ir::walk_stmts(&unit.body.stmts, &mut |s| {
            if let Stmt::Assign(a) = s {
                written.insert(a.target.name());
            }
        });
        let unused: Vec<Id> = unit
            .ctx
            .variables()
            .filter(|v| unit.ctx.is_wire(v.name))
            .map(|v| v.name)
            .filter(|n| !self.reads.contains(n) && !written.contains(n))
            .collect();
        for name in &unused {
            unit.ctx.rebind(*name, None);
        }
        if !unused.is_empty() {
            log::debug!("{}: removed {}", unit.ctx.name, unused.iter().join(", "));
        }

        // Helper functions reachable from the body.
        let direct = calls(&unit.body.stmts);
        let mut reachable = BTreeSet::new();
        let mut queue: VecDeque<Id> = direct.iter().copied().collect();
        while let Some(name) = queue.pop_front() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(f) = unit.funcs.iter().find(|f| f.name == name) {
                queue.extend(calls(&f.stmts));
            }
        }
        unit.ctx.funcs = direct;
        unit.funcs.retain(|f| reachable.contains(&f.name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearc_ir::{DType, Expr, FuncBlock, FunctionCall, Name, StmtId, UnitKind, VarKind, Variable};

    fn unit(vars: &[&str], stmts: Vec<Stmt>) -> Unit {
        let mut ctx = Context::new(Id::new("g"), UnitKind::Gear);
        for v in vars {
            ctx.declare(Variable::new(Id::new(v), Some(DType::Uint(4)), VarKind::Wire))
                .unwrap();
        }
        Unit::new(ctx, stmts)
    }

    fn name(n: &str) -> Name {
        Name {
            name: Id::new(n),
            dtype: Some(DType::Uint(4)),
        }
    }

    fn assign(id: u32, target: &str, value: Expr) -> Stmt {
        Stmt::Assign(Assign {
            id: StmtId(id),
            target: Target::Var(name(target)),
            value,
            guard: None,
            pos: Default::default(),
        })
    }

    fn out(id: u32, value: Expr) -> Stmt {
        Stmt::Assign(Assign {
            id: StmtId(id),
            target: Target::Signal(gearc_ir::Component::data(Id::new("dout"), DType::Uint(4))),
            value,
            guard: None,
            pos: Default::default(),
        })
    }

    #[test]
    fn unread_wires_are_removed_transitively() {
        let mut u = unit(
            &["a", "b", "c"],
            vec![
                assign(1, "a", Expr::int(1)),
                assign(2, "b", Expr::Name(name("a"))),
                assign(3, "c", Expr::int(2)),
                out(4, Expr::Name(name("c"))),
            ],
        );
        DeadCode::do_pass_default(&mut u).unwrap();
        assert_eq!(u.body.stmts.len(), 2);
        assert!(u.ctx.variable(Id::new("a")).is_none());
        assert!(u.ctx.variable(Id::new("b")).is_none());
        assert!(u.ctx.variable(Id::new("c")).is_some());
    }

    #[test]
    fn dead_branches_are_pruned() {
        let cond = Expr::Name(name("c"));
        let ie = IfElse {
            id: StmtId(10),
            branches: vec![
                Block::cond(StmtId(11), Expr::bool(false), vec![out(12, Expr::int(1))]),
                Block::cond(StmtId(13), cond.clone(), vec![out(14, Expr::int(2))]),
                Block::seq(StmtId(15), vec![out(16, Expr::int(3))]),
                Block::cond(StmtId(17), cond, vec![out(18, Expr::int(4))]),
            ],
            exit_cond: Expr::bool(true),
            pos: Default::default(),
        };
        let mut u = unit(
            &["c"],
            vec![
                Stmt::Block(Block::cond(StmtId(1), Expr::bool(false), vec![out(2, Expr::int(0))])),
                Stmt::IfElse(ie),
            ],
        );
        DeadCode::do_pass_default(&mut u).unwrap();
        let [Stmt::IfElse(ie)] = u.body.stmts.as_slice() else {
            panic!("{:?}", u.body.stmts);
        };
        assert_eq!(ie.branches.iter().map(|b| b.id).collect::<Vec<_>>(), vec![StmtId(13), StmtId(15)]);
    }

    #[test]
    fn uncalled_helpers_are_dropped() {
        let call = |f: &str| {
            Expr::Call(FunctionCall {
                name: Id::new(f),
                args: vec![],
                ret: Some(DType::Uint(4)),
            })
        };
        let func = |f: &str, body: Vec<Stmt>| FuncBlock {
            name: Id::new(f),
            args: vec![],
            ret_dtype: DType::Uint(4),
            stmts: body,
        };
        let mut u = unit(&[], vec![out(1, call("f"))]);
        u.funcs = vec![
            func("f", vec![Stmt::Return(gearc_ir::Return {
                id: StmtId(2),
                value: call("h"),
                pos: Default::default(),
            })]),
            func("g2", vec![]),
            func("h", vec![]),
        ];
        DeadCode::do_pass_default(&mut u).unwrap();
        assert_eq!(u.ctx.funcs, BTreeSet::from([Id::new("f")]));
        let kept: Vec<_> = u.funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(kept, vec!["f", "h"]);
    }
}
