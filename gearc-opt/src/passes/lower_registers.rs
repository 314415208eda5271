use crate::Unit;
use crate::traversal::{Action, Named, Pass, VisResult, Visitor, traverse};
use gearc_ir::{
    Assert, Assign, Await, Block, Context, DType, Expr, IfElse, Name, Register,
    Stmt, Target, Value, VarKind, Variable,
};
use gearc_utils::{Error, GPosIdx, GearcResult, Id};
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};

fn writes(stmt: &Stmt, name: Id) -> bool {
    stmt.any(&|s| matches!(s, Stmt::Assign(a) if !a.target.is_signal() && a.target.name() == name))
}

fn reads(stmt: &Stmt, name: Id) -> bool {
    stmt.any(&|s| s.exprs().iter().any(|e| e.names().contains(&name)))
}

/// Remove the constant assignment that initializes `name` when it is the
/// first statement of the cycle touching it, and return the constant.
fn take_init(stmts: &mut Vec<Stmt>, name: Id) -> Option<Value> {
    for i in 0..stmts.len() {
        let stmt = &mut stmts[i];
        if !writes(stmt, name) {
            if reads(stmt, name) {
                return None;
            }
            continue;
        }
        return match stmt {
            Stmt::Assign(Assign {
                target: Target::Var(_),
                value: Expr::Res(v),
                guard: None,
                ..
            }) => {
                let v = v.clone();
                stmts.remove(i);
                Some(v)
            }
            Stmt::Block(b) if b.kind == gearc_ir::BlockKind::Seq => take_init(&mut b.stmts, name),
            Stmt::States(sw) => sw
                .branches
                .iter_mut()
                .find(|br| br.state == 0)
                .and_then(|br| take_init(&mut br.body.stmts, name)),
            _ => None,
        };
    }
    None
}

/// Turns the constant a register is initialized with at the start of the
/// body into its reset value.
///
/// Registers are reset when the body completes, so the assignment is
/// redundant once it provides the reset value.
#[derive(Default)]
pub struct RegisterResets;

impl Named for RegisterResets {
    fn name() -> &'static str {
        "register-resets"
    }

    fn description() -> &'static str {
        "use initial constant assignments as register reset values"
    }
}

impl Pass for RegisterResets {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        let pending: Vec<Id> = unit
            .ctx
            .registers()
            .filter(|v| v.reset.is_none())
            .map(|v| v.name)
            .collect();
        for name in pending {
            let Some(init) = take_init(&mut unit.body.stmts, name) else {
                log::debug!("{}: register `{name}' has no reset value", unit.ctx.name);
                continue;
            };
            if let Some(var) = unit.ctx.variable_mut(name) {
                let init = match &var.dtype {
                    Some(t) if init.dtype().as_ref() != Some(t) => init.cast(t)?,
                    _ => init,
                };
                log::debug!("register `{name}' resets to {init}");
                var.reset = Some(init);
            }
        }
        Ok(())
    }
}

/// The inputs of a lowered register.
struct Inputs {
    next: Name,
    enable: Name,
}

/// Replaces register writes with writes to the register's `_next` and
/// `_en` inputs.
///
/// Every cycle starts with the enable low. Registers written bit by bit
/// additionally start the cycle with `_next` holding their current value,
/// and reads of them after the first write see `_next`.
#[derive(Default)]
pub struct LowerRegisters {
    inputs: HashMap<Id, Inputs>,
    /// Registers written bit by bit.
    partial: BTreeSet<Id>,
}

impl Named for LowerRegisters {
    fn name() -> &'static str {
        "lower-registers"
    }

    fn description() -> &'static str {
        "rewrite register writes as next-value and enable signals"
    }
}

impl LowerRegisters {
    fn declare(ctx: &mut Context, name: Id, suffix: &str, dtype: DType) -> GearcResult<Name> {
        let input = ctx.gen_name(name.suffixed(suffix).as_str());
        ctx.declare(Variable::new(input, Some(dtype.clone()), VarKind::RegInput))?;
        Ok(Name {
            name: input,
            dtype: Some(dtype),
        })
    }

    /// Replace reads of partially written registers with their next value.
    fn read(&self, e: &Expr) -> GearcResult<Expr> {
        if self.partial.is_empty() {
            return Ok(e.clone());
        }
        e.substitute(&mut |n| {
            self.partial
                .contains(&n.name)
                .then(|| self.inputs.get(&n.name))
                .flatten()
                .map(|i| Expr::Name(i.next.clone()))
        })
    }

    fn read_opt(&self, e: &Option<Expr>) -> GearcResult<Option<Expr>> {
        e.as_ref().map(|e| self.read(e)).transpose()
    }
}

fn assign(ctx: &mut Context, target: Name, value: Expr) -> Stmt {
    Stmt::Assign(Assign {
        id: ctx.fresh_id(),
        target: Target::Var(target),
        value,
        guard: None,
        pos: GPosIdx::UNKNOWN,
    })
}

impl Visitor for LowerRegisters {
    fn assign(&mut self, a: &mut Assign, ctx: &mut Context) -> VisResult {
        a.value = self.read(&a.value)?;
        a.guard = self.read_opt(&a.guard)?;
        if let Target::Part(_, idx) = &mut a.target {
            *idx = self.read(idx)?;
        }
        let Some(inputs) = self.inputs.get(&a.target.name()).filter(|_| !a.target.is_signal())
        else {
            return Ok(Action::Continue);
        };
        let target = match &a.target {
            Target::Part(_, idx) => Target::Part(inputs.next.clone(), idx.clone()),
            _ => Target::Var(inputs.next.clone()),
        };
        let write = Assign {
            target,
            ..a.clone()
        };
        let enable = Assign {
            id: ctx.fresh_id(),
            target: Target::Var(inputs.enable.clone()),
            value: Expr::bool(true),
            guard: a.guard.clone(),
            pos: a.pos,
        };
        Ok(Action::Change(vec![Stmt::Assign(write), Stmt::Assign(enable)]))
    }

    fn await_stmt(&mut self, a: &mut Await, _ctx: &mut Context) -> VisResult {
        a.in_await = self.read(&a.in_await)?;
        a.exit_await = self.read(&a.exit_await)?;
        Ok(Action::Continue)
    }

    fn assert(&mut self, a: &mut Assert, _ctx: &mut Context) -> VisResult {
        a.test = self.read(&a.test)?;
        Ok(Action::Continue)
    }

    fn start_block(&mut self, b: &mut Block, _ctx: &mut Context) -> VisResult {
        b.in_cond = self.read(&b.in_cond)?;
        b.exit_cond = self.read(&b.exit_cond)?;
        Ok(Action::Continue)
    }

    fn start_if(&mut self, ie: &mut IfElse, _ctx: &mut Context) -> VisResult {
        for arm in &mut ie.branches {
            arm.in_cond = self.read(&arm.in_cond)?;
            arm.exit_cond = self.read(&arm.exit_cond)?;
        }
        ie.exit_cond = self.read(&ie.exit_cond)?;
        Ok(Action::Continue)
    }
}

impl Pass for LowerRegisters {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        if !unit.is_gear() {
            return Ok(());
        }
        let regs: Vec<Variable> = unit.ctx.registers().cloned().collect();
        gearc_ir::walk_stmts(&unit.body.stmts, &mut |s| {
            if let Stmt::Assign(Assign {
                target: Target::Part(n, _),
                ..
            }) = s
            {
                self.partial.insert(n.name);
            }
        });
        self.partial.retain(|n| regs.iter().any(|r| r.name == *n));

        let ctx = &mut unit.ctx;
        let mut prologue: SmallVec<[Stmt; 4]> = SmallVec::new();
        for reg in &regs {
            let dtype = reg.dtype.clone().ok_or_else(|| {
                Error::type_mismatch(format!("register `{}' has no type", reg.name))
                    .with_pos(&reg.pos)
            })?;
            let next = Self::declare(ctx, reg.name, "_next", dtype.clone())?;
            let enable = Self::declare(ctx, reg.name, "_en", DType::bool())?;
            prologue.push(assign(ctx, enable.clone(), Expr::bool(false)));
            if self.partial.contains(&reg.name) {
                prologue.push(assign(ctx, next.clone(), reg.to_expr()));
            }
            unit.registers.push(Register {
                name: reg.name,
                dtype,
                reset: reg.reset.clone(),
                next: next.name,
                enable: enable.name,
            });
            self.inputs.insert(reg.name, Inputs { next, enable });
        }
        log::debug!(
            "{}: lowered registers {}",
            ctx.name,
            unit.registers.iter().map(|r| r.name).join(", ")
        );

        traverse(self, &mut unit.body.stmts, ctx)?;
        // The prologue goes after the cycle flags are cleared.
        let flags = [ctx.rst_cond, ctx.cycle_done];
        let at = unit
            .body
            .stmts
            .iter()
            .take_while(|s| {
                matches!(s, Stmt::Assign(a) if flags.contains(&Some(a.target.name())))
            })
            .count();
        let rest = unit.body.stmts.split_off(at);
        unit.body.stmts.extend(prologue);
        unit.body.stmts.extend(rest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{CheckRegisters, Inline, InferRegisters, Schedule};
    use gearc_frontend::GearParser;
    use gearc_ir::{Printer, Session, TranslateConfig, from_ast::lower_gear};

    fn lower(src: &str) -> Unit {
        let prog = GearParser::parse_source("regs.gear", src.to_string()).unwrap();
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let (ctx, body) = lower_gear(&mut sess, &prog.gears[0], &[]).unwrap();
        let mut unit = Unit::new(ctx, body);
        InferRegisters::do_pass_default(&mut unit).unwrap();
        Schedule::do_pass_default(&mut unit).unwrap();
        CheckRegisters::do_pass_default(&mut unit).unwrap();
        RegisterResets::do_pass_default(&mut unit).unwrap();
        Inline::do_pass_default(&mut unit).unwrap();
        LowerRegisters::do_pass_default(&mut unit).unwrap();
        unit
    }

    const ACCUMULATOR: &str = "gear g(din: Queue[Uint[8]]) -> (dout: Uint[16]) {\n\
                                 s: Uint[16] = 0;\n\
                                 async for d in din { s = s + d; }\n\
                                 yield s;\n\
                               }";

    #[test]
    fn initial_values_become_resets() {
        let unit = lower(ACCUMULATOR);
        let s = unit.registers.iter().find(|r| r.name == "s").unwrap();
        assert_eq!(s.reset.as_ref().and_then(Value::as_int), Some(0));
        assert_eq!(s.dtype, DType::Uint(16));
        assert!(unit.ctx.variables().all(|v| !v.name.as_str().starts_with("_looped")));
    }

    #[test]
    fn writes_go_through_next_and_enable() {
        let unit = lower(ACCUMULATOR);
        let s = unit.registers.iter().find(|r| r.name == "s").unwrap();
        assert_eq!(s.next, Id::new("s_next"));
        assert_eq!(s.enable, Id::new("s_en"));
        assert_eq!(
            unit.ctx.variable(s.next).map(|v| v.kind),
            Some(VarKind::RegInput)
        );
        let text = Printer::stmts_to_str(&unit.body.stmts);
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        assert_eq!(lines[0], "_rst_cond = 0;");
        assert!(lines.contains(&"s_en = 0;"), "{text}");
        assert!(lines.contains(&"s_en = 1;"), "{text}");
        assert!(lines.iter().any(|l| l.starts_with("s_next = ")), "{text}");
        assert!(!lines.iter().any(|l| l.starts_with("s = ")), "{text}");
    }

    #[test]
    fn registers_need_a_type() {
        let mut ctx = Context::new(Id::new("g"), gearc_ir::UnitKind::Gear);
        ctx.declare(Variable::new(Id::new("r"), None, VarKind::Register))
            .unwrap();
        let mut unit = Unit::new(ctx, vec![]);
        assert!(LowerRegisters::do_pass_default(&mut unit).is_err());
    }
}
