use crate::Unit;
use crate::traversal::{Named, Pass};
use gearc_ir::{Assign, Block, BlockKind, Context, DType, Expr, IfElse, Name, Stmt, Target};
use gearc_utils::{GPosIdx, GearcResult};

/// Makes the handshake conditions of a scheduled gear explicit.
///
/// Each wait is removed and the statements after it are wrapped in a
/// block entered only when the wait is satisfied. Blocks that can stop
/// early get an exit condition covering every wait inside them, and the
/// statements following such a block only run when it exits.
///
/// Register enables are finally qualified by `_cycle_done`, so a cycle
/// stalled on a handshake leaves every register unchanged.
#[derive(Default)]
pub struct ExitCond;

impl Named for ExitCond {
    fn name() -> &'static str {
        "exit-cond"
    }

    fn description() -> &'static str {
        "turn waits into explicit block conditions"
    }
}

impl Pass for ExitCond {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        if !unit.is_gear() {
            return Ok(());
        }
        let stmts = std::mem::take(&mut unit.body.stmts);
        let (stmts, exit) = gate(stmts, &mut unit.ctx);
        unit.body.stmts = stmts;
        unit.body.exit_cond = Expr::and(unit.body.exit_cond.clone(), exit);
        // Writes only take effect in a cycle whose work completed.
        if let Some(done) = unit.ctx.cycle_done {
            let done = Expr::name(done, Some(DType::bool()));
            for reg in &unit.registers {
                let enable = Name {
                    name: reg.enable,
                    dtype: Some(DType::bool()),
                };
                unit.body.stmts.push(Stmt::Assign(Assign {
                    id: unit.ctx.fresh_id(),
                    target: Target::Var(enable.clone()),
                    value: Expr::and(Expr::Name(enable), done.clone()),
                    guard: None,
                    pos: GPosIdx::UNKNOWN,
                }));
            }
        }
        Ok(())
    }
}

/// Rewrite `stmts` so that each statement runs only once everything
/// before it finished. Returns the new statements and the condition under
/// which all of them finish in the current cycle.
fn gate(stmts: Vec<Stmt>, ctx: &mut Context) -> (Vec<Stmt>, Expr) {
    let mut out = vec![];
    let mut rest = stmts.into_iter();
    while let Some(stmt) = rest.next() {
        let cont = match stmt {
            Stmt::Await(a) => Expr::and(a.in_await, a.exit_await),
            Stmt::Block(b) => {
                let b = block(b, ctx);
                let cont = if b.kind == BlockKind::Seq {
                    b.exit_cond.clone()
                } else {
                    Expr::or(Expr::not(b.in_cond.clone()), b.exit_cond.clone())
                };
                out.push(Stmt::Block(b));
                cont
            }
            Stmt::IfElse(ie) => {
                let ie = if_else(ie, ctx);
                let cont = ie.exit_cond.clone();
                out.push(Stmt::IfElse(ie));
                cont
            }
            Stmt::States(mut sw) => {
                for br in &mut sw.branches {
                    let body = std::mem::replace(&mut br.body, Block::seq(Default::default(), vec![]));
                    br.body = block(body, ctx);
                }
                out.push(Stmt::States(sw));
                Expr::bool(true)
            }
            other => {
                out.push(other);
                Expr::bool(true)
            }
        };
        if cont.is_true() {
            continue;
        }
        if cont.is_false() {
            log::trace!("dropping statements after a wait that never completes");
            return (out, cont);
        }
        let (tail, exit) = gate(rest.collect(), ctx);
        if !tail.is_empty() {
            out.push(Stmt::Block(Block::cond(ctx.fresh_id(), cont.clone(), tail)));
        }
        return (out, Expr::and(cont, exit));
    }
    (out, Expr::bool(true))
}

fn block(mut b: Block, ctx: &mut Context) -> Block {
    let (stmts, exit) = gate(std::mem::take(&mut b.stmts), ctx);
    b.stmts = stmts;
    b.exit_cond = Expr::and(b.exit_cond, exit);
    b
}

fn if_else(mut ie: IfElse, ctx: &mut Context) -> IfElse {
    ie.branches = std::mem::take(&mut ie.branches)
        .into_iter()
        .map(|arm| block(arm, ctx))
        .collect();
    // Leaving through an arm requires that arm to exit.
    let exit = ie
        .branches
        .iter()
        .rev()
        .fold(Expr::bool(true), |acc, arm| {
            Expr::cond(arm.in_cond.clone(), arm.exit_cond.clone(), acc)
        });
    ie.exit_cond = Expr::and(ie.exit_cond, exit);
    ie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{
        CheckRegisters, Inline, InferRegisters, LowerRegisters, RegisterResets, Schedule,
    };
    use gearc_frontend::GearParser;
    use gearc_ir::{Printer, Session, TranslateConfig, from_ast::lower_gear};

    fn gated(src: &str) -> Unit {
        let prog = GearParser::parse_source("exit.gear", src.to_string()).unwrap();
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let (ctx, body) = lower_gear(&mut sess, &prog.gears[0], &[]).unwrap();
        let mut unit = Unit::new(ctx, body);
        InferRegisters::do_pass_default(&mut unit).unwrap();
        Schedule::do_pass_default(&mut unit).unwrap();
        CheckRegisters::do_pass_default(&mut unit).unwrap();
        RegisterResets::do_pass_default(&mut unit).unwrap();
        Inline::do_pass_default(&mut unit).unwrap();
        LowerRegisters::do_pass_default(&mut unit).unwrap();
        ExitCond::do_pass_default(&mut unit).unwrap();
        unit
    }

    #[test]
    fn waits_become_conditions() {
        let unit = gated(
            "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
               async with din as d { yield d; }\n\
             }",
        );
        let mut waits = 0;
        gearc_ir::walk_stmts(&unit.body.stmts, &mut |s| {
            if matches!(s, Stmt::Await(_)) {
                waits += 1;
            }
        });
        assert_eq!(waits, 0);
        let text = Printer::stmts_to_str(&unit.body.stmts);
        assert!(text.contains("if din.valid {"), "{text}");
        assert!(text.contains("if dout.ready {"), "{text}");
        // The input is acknowledged only once the output accepted the data.
        let ack = text.find("din.ready = 1;").unwrap();
        assert!(ack > text.find("if dout.ready {").unwrap(), "{text}");
        assert!(!unit.body.exit_cond.is_true());
    }

    #[test]
    fn enables_wait_for_the_cycle_to_complete() {
        let unit = gated(
            "gear g(din: Uint[8]) -> (dout: Uint[16]) {\n\
               s: Uint[16] = 0;\n\
               while true { async with din as d { s = s + d; yield s; } }\n\
             }",
        );
        let done = unit.ctx.cycle_done.unwrap();
        let s = &unit.registers[0];
        let Some(Stmt::Assign(last)) = unit.body.stmts.last() else {
            panic!("the body must end with the enable");
        };
        assert_eq!(last.target.name(), s.enable);
        assert!(last.guard.is_none());
        assert!(last.value.names().contains(&done));
        assert!(last.value.names().contains(&s.enable));
    }

    #[test]
    fn straight_line_code_is_unchanged() {
        let mut ctx = Context::new(gearc_utils::Id::new("g"), gearc_ir::UnitKind::Gear);
        let id = ctx.fresh_id();
        let stmts = vec![Stmt::Block(Block::seq(id, vec![]))];
        let (out, exit) = gate(stmts.clone(), &mut ctx);
        assert_eq!(out, stmts);
        assert!(exit.is_true());
    }
}
