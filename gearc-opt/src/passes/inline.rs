use crate::Unit;
use crate::traversal::{Named, Pass};
use gearc_ir::{
    Assign, Block, Context, DType, Expr, Name, Stmt, StmtId, Target, Value,
    VarKind, Variable,
};
use gearc_utils::{GPosIdx, GearcResult, Id};
use std::collections::{BTreeSet, HashMap};
use std::mem;

type Scope = HashMap<Id, Expr>;

/// Replaces reads of variables with the value last assigned to them in
/// the same cycle.
///
/// Reads of a register before any write in the cycle stay references to
/// the register. Values assigned in conditional code are merged as
/// `cond ? new : prior` when the condition is left. A register written
/// before a loop and mutated inside it is read as `_looped ? r : value`,
/// where the generated `_looped` register is set by every iteration and
/// cleared once the loop is left. Assignments stay in place; unread ones
/// are removed by dead-code elimination.
#[derive(Default)]
pub struct Inline;

impl Named for Inline {
    fn name() -> &'static str {
        "inline"
    }

    fn description() -> &'static str {
        "forward assigned values to their readers"
    }
}

impl Pass for Inline {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        let mut partial = BTreeSet::new();
        gearc_ir::walk_stmts(&unit.body.stmts, &mut |s| {
            if let Stmt::Assign(Assign {
                target: Target::Part(n, _),
                ..
            }) = s
            {
                partial.insert(n.name);
            }
        });
        let mut inliner = Inliner {
            ctx: &mut unit.ctx,
            scopes: vec![Scope::new()],
            partial,
            writes: HashMap::new(),
            guards: HashMap::new(),
        };
        let stmts = mem::take(&mut unit.body.stmts);
        let mut stmts = inliner.stmts(stmts)?;
        let guards = inliner.guards;
        if !guards.is_empty() {
            for stmt in &mut stmts {
                stmt.walk_mut(&mut |s| {
                    if let Stmt::Assign(a) = s {
                        if let Some(g) = guards.get(&a.id) {
                            a.guard = Some(match a.guard.take() {
                                Some(old) => Expr::and(old, g.clone()),
                                None => g.clone(),
                            });
                        }
                    }
                });
            }
        }
        unit.body.stmts = stmts;
        Ok(())
    }
}

struct Inliner<'a> {
    ctx: &'a mut Context,
    scopes: Vec<Scope>,
    /// Names written bit by bit somewhere. They are never forwarded.
    partial: BTreeSet<Id>,
    /// Register writes of the current state.
    writes: HashMap<Id, Vec<StmtId>>,
    /// Guards added to earlier assignments.
    guards: HashMap<StmtId, Expr>,
}

impl Inliner<'_> {
    fn lookup(&self, name: Id) -> Option<Expr> {
        self.scopes.iter().rev().find_map(|s| s.get(&name)).cloned()
    }

    fn subst(&self, e: &Expr) -> GearcResult<Expr> {
        e.substitute(&mut |n| self.lookup(n.name))
    }

    fn reference(&self, name: Id) -> Expr {
        Expr::name(name, self.ctx.variable(name).and_then(|v| v.dtype.clone()))
    }

    /// The value of `name` at this point.
    fn prior(&self, name: Id) -> Expr {
        self.lookup(name).unwrap_or_else(|| self.reference(name))
    }

    fn is_reg(&self, name: Id) -> bool {
        self.ctx.variable(name).is_some_and(|v| v.is_reg())
    }

    fn forwardable(&self, name: Id) -> bool {
        !self.partial.contains(&name)
            && self
                .ctx
                .variable(name)
                .is_some_and(|v| matches!(v.kind, VarKind::Wire | VarKind::Register))
    }

    fn set(&mut self, name: Id, value: Expr) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    /// Merge the scopes of conditional arms into the current scope. The
    /// first arm whose condition holds provides the value.
    fn merge(&mut self, arms: Vec<(Expr, Scope)>) {
        let names: BTreeSet<Id> = arms.iter().flat_map(|(_, s)| s.keys().copied()).collect();
        for name in names {
            let prior = self.prior(name);
            let value = arms.iter().rev().fold(prior.clone(), |acc, (cond, scope)| {
                let then = scope.get(&name).cloned().unwrap_or_else(|| prior.clone());
                Expr::cond(cond.clone(), then, acc)
            });
            self.set(name, value);
        }
    }

    fn stmts(&mut self, stmts: Vec<Stmt>) -> GearcResult<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    fn stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) -> GearcResult<()> {
        match stmt {
            Stmt::Assign(mut a) => {
                a.value = self.subst(&a.value)?;
                a.guard = a.guard.as_ref().map(|g| self.subst(g)).transpose()?;
                match &mut a.target {
                    Target::Var(n) if self.forwardable(n.name) => {
                        let mut value = a.value.clone();
                        if let (Some(have), Some(want)) = (value.dtype(), &n.dtype) {
                            if have != *want {
                                value = Expr::cast(value, want.clone())
                                    .map_err(|e| e.with_pos(&a.pos))?;
                            }
                        }
                        if let Some(g) = &a.guard {
                            value = Expr::cond(g.clone(), value, self.prior(n.name));
                        }
                        if self.is_reg(n.name) {
                            self.writes.entry(n.name).or_default().push(a.id);
                        }
                        self.set(n.name, value);
                    }
                    Target::Part(_, idx) => *idx = self.subst(idx)?,
                    _ => (),
                }
                out.push(Stmt::Assign(a));
            }
            Stmt::Await(mut a) => {
                a.in_await = self.subst(&a.in_await)?;
                a.exit_await = self.subst(&a.exit_await)?;
                out.push(Stmt::Await(a));
            }
            Stmt::Assert(mut a) => {
                a.test = self.subst(&a.test)?;
                out.push(Stmt::Assert(a));
            }
            Stmt::Return(mut r) => {
                r.value = self.subst(&r.value)?;
                out.push(Stmt::Return(r));
            }
            Stmt::Block(b) if b.is_loop() => self.loop_block(b, out)?,
            Stmt::Block(mut b) => {
                b.in_cond = self.subst(&b.in_cond)?;
                let conditional = !b.in_cond.is_true();
                if conditional {
                    self.scopes.push(Scope::new());
                }
                b.stmts = self.stmts(mem::take(&mut b.stmts))?;
                b.exit_cond = self.subst(&b.exit_cond)?;
                if conditional {
                    let scope = self.scopes.pop().unwrap_or_default();
                    self.merge(vec![(b.in_cond.clone(), scope)]);
                }
                out.push(Stmt::Block(b));
            }
            Stmt::IfElse(mut ie) => {
                let mut arms = vec![];
                for arm in &mut ie.branches {
                    arm.in_cond = self.subst(&arm.in_cond)?;
                    self.scopes.push(Scope::new());
                    arm.stmts = self.stmts(mem::take(&mut arm.stmts))?;
                    arm.exit_cond = self.subst(&arm.exit_cond)?;
                    arms.push((arm.in_cond.clone(), self.scopes.pop().unwrap_or_default()));
                }
                ie.exit_cond = self.subst(&ie.exit_cond)?;
                self.merge(arms);
                out.push(Stmt::IfElse(ie));
            }
            Stmt::States(mut sw) => {
                for br in &mut sw.branches {
                    br.body.in_cond = self.subst(&br.body.in_cond)?;
                    self.scopes.push(Scope::new());
                    self.writes.clear();
                    br.body.stmts = self.stmts(mem::take(&mut br.body.stmts))?;
                    br.body.exit_cond = self.subst(&br.body.exit_cond)?;
                    self.scopes.pop();
                }
                out.push(Stmt::States(sw));
            }
        }
        Ok(())
    }

    fn new_looped(&mut self) -> GearcResult<Name> {
        let name = self.ctx.gen_name("_looped");
        let mut var = Variable::new(name, Some(DType::bool()), VarKind::Register);
        var.reset = Some(Value::bool(false));
        self.ctx.declare(var)?;
        Ok(Name {
            name,
            dtype: Some(DType::bool()),
        })
    }

    fn flag(&mut self, flag: &Name, value: bool) -> Stmt {
        Stmt::Assign(Assign {
            id: self.ctx.fresh_id(),
            target: Target::Var(flag.clone()),
            value: Expr::bool(value),
            guard: None,
            pos: GPosIdx::UNKNOWN,
        })
    }

    fn loop_block(&mut self, mut b: Block, out: &mut Vec<Stmt>) -> GearcResult<()> {
        let mut mutated = BTreeSet::new();
        gearc_ir::walk_stmts(&b.stmts, &mut |s| {
            if let Stmt::Assign(a) = s {
                if !a.target.is_signal() {
                    mutated.insert(a.target.name());
                }
            }
        });
        let forwarded: Vec<Id> = mutated
            .iter()
            .copied()
            .filter(|n| self.forwardable(*n))
            .collect();
        let prior: Scope = forwarded.iter().map(|n| (*n, self.prior(*n))).collect();

        let mut entry = Scope::new();
        let mut looped: Option<Name> = None;
        for &name in &forwarded {
            match self.lookup(name) {
                Some(fwd) if self.is_reg(name) => {
                    if looped.is_none() {
                        looped = Some(self.new_looped()?);
                    }
                    let Some(flag) = looped.clone() else {
                        continue;
                    };
                    let not_looped = Expr::not(Expr::Name(flag.clone()));
                    for id in self.writes.get(&name).into_iter().flatten() {
                        self.guards.insert(*id, not_looped.clone());
                    }
                    entry.insert(name, Expr::cond(Expr::Name(flag), self.reference(name), fwd));
                }
                _ => {
                    entry.insert(name, self.reference(name));
                }
            }
        }

        self.scopes.push(entry);
        b.in_cond = self.subst(&b.in_cond)?;
        b.stmts = self.stmts(mem::take(&mut b.stmts))?;
        b.exit_cond = self.subst(&b.exit_cond)?;
        if let Some(flag) = &looped {
            let set = self.flag(flag, true);
            b.stmts.push(set);
        }
        let body = self.scopes.pop().unwrap_or_default();

        for &name in &forwarded {
            let value = match body.get(&name) {
                Some(v) if self.is_reg(name) => {
                    let before = prior.get(&name).cloned().unwrap_or_else(|| self.reference(name));
                    Expr::cond(b.in_cond.clone(), v.clone(), before)
                }
                _ => self.reference(name),
            };
            self.set(name, value);
        }
        out.push(Stmt::Block(b));
        if let Some(flag) = &looped {
            let clear = self.flag(flag, false);
            out.push(clear);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{CheckRegisters, InferRegisters, Schedule};
    use gearc_frontend::GearParser;
    use gearc_ir::{Printer, Session, TranslateConfig, from_ast::lower_gear};

    fn inline(src: &str) -> Unit {
        let prog = GearParser::parse_source("inline.gear", src.to_string()).unwrap();
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let (ctx, body) = lower_gear(&mut sess, &prog.gears[0], &[]).unwrap();
        let mut unit = Unit::new(ctx, body);
        InferRegisters::do_pass_default(&mut unit).unwrap();
        Schedule::do_pass_default(&mut unit).unwrap();
        CheckRegisters::do_pass_default(&mut unit).unwrap();
        Inline::do_pass_default(&mut unit).unwrap();
        unit
    }

    #[test]
    fn wires_are_forwarded() {
        let unit = inline(
            "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
               async with din as d {\n\
                 y: Uint[8] = 0;\n\
                 if d > 3 { y = d; }\n\
                 yield y;\n\
               }\n\
             }",
        );
        let text = Printer::stmts_to_str(&unit.body.stmts);
        assert!(
            text.contains("dout.data = ((din.data > 3) ? din.data : 0);"),
            "{text}"
        );
    }

    #[test]
    fn registers_in_loops() {
        let unit = inline(
            "gear g(din: Queue[Uint[8]]) -> (dout: Uint[16]) {\n\
               s: Uint[16] = 0;\n\
               async for d in din { s = s + d; }\n\
               yield s;\n\
             }",
        );
        let looped = unit
            .ctx
            .variables()
            .find(|v| v.name.as_str().starts_with("_looped"))
            .expect("loop flag");
        assert!(looped.is_reg());
        assert_eq!(looped.reset, Some(Value::bool(false)));
        let text = Printer::stmts_to_str(&unit.body.stmts);
        assert!(text.contains("(_looped ? s : 0)"), "{text}");
        assert!(text.contains("s = 0 when !_looped;"), "{text}");
        assert!(text.contains("_looped = 0;"), "{text}");
    }

    #[test]
    fn forwarded_values_must_convert() {
        let mut ctx = Context::new(Id::new("g"), gearc_ir::UnitKind::Gear);
        let x = Name {
            name: Id::new("x"),
            dtype: Some(DType::Uint(4)),
        };
        ctx.declare(Variable::new(x.name, x.dtype.clone(), VarKind::Wire))
            .unwrap();
        let pair = Value::tuple(vec![
            Value::typed(1, DType::Uint(4)),
            Value::typed(2, DType::Uint(4)),
        ]);
        let stmt = Stmt::Assign(Assign {
            id: ctx.fresh_id(),
            target: Target::Var(x),
            value: Expr::Res(pair),
            guard: None,
            pos: GPosIdx::UNKNOWN,
        });
        let mut unit = Unit::new(ctx, vec![stmt]);
        let err = Inline::do_pass_default(&mut unit).err().unwrap();
        assert!(
            matches!(err.kind(), gearc_utils::ErrorKind::TypeMismatch(_)),
            "{err}"
        );
    }
}
