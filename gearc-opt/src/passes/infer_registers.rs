use crate::Unit;
use crate::analysis::{Boundaries, ReachingDefinitionAnalysis};
use crate::traversal::{Named, Pass};
use gearc_ir::{Context, VarKind};
use gearc_utils::{Error, GearcResult, Id};
use itertools::Itertools;
use std::collections::BTreeSet;

/// Names with a definition that reaches a use only from an earlier cycle.
fn crossing_variables(ctx: &Context, rd: &ReachingDefinitionAnalysis) -> BTreeSet<Id> {
    rd.crossing_uses()
        .into_iter()
        .filter(|n| {
            ctx.variable(*n)
                .is_some_and(|v| matches!(v.kind, VarKind::Wire | VarKind::Register))
        })
        .collect()
}

/// Flags the variables of a gear that must persist across clock cycles.
///
/// A variable is a register when one of its definitions reaches a use
/// through a cycle boundary and does not also reach it within the cycle.
/// Before scheduling, boundaries are back edges, the end of `await clk()`
/// and waits reached after a handshake completed in the same cycle.
#[derive(Default)]
pub struct InferRegisters;

impl Named for InferRegisters {
    fn name() -> &'static str {
        "infer-registers"
    }

    fn description() -> &'static str {
        "find variables whose values cross clock cycles"
    }
}

impl Pass for InferRegisters {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        if !unit.is_gear() {
            return Ok(());
        }
        let rd = ReachingDefinitionAnalysis::new(&unit.body.stmts, Boundaries::Handshakes);
        let regs = crossing_variables(&unit.ctx, &rd);
        log::debug!(
            "{}: registers {{{}}}, cycle boundaries at {}",
            unit.ctx.name,
            regs.iter().join(", "),
            rd.boundaries().join(", ")
        );
        unit.ctx.set_registers(&regs);
        unit.ctx.reaching = rd.def_sets();
        unit.inferred = regs;
        Ok(())
    }
}

/// Recomputes the registers of a scheduled gear, where only back edges
/// separate cycles, and rejects the gear if they differ from the ones
/// inferred before scheduling.
#[derive(Default)]
pub struct CheckRegisters;

impl Named for CheckRegisters {
    fn name() -> &'static str {
        "check-registers"
    }

    fn description() -> &'static str {
        "verify that scheduling preserved the inferred registers"
    }
}

impl Pass for CheckRegisters {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        if !unit.is_gear() {
            return Ok(());
        }
        let rd = ReachingDefinitionAnalysis::new(&unit.body.stmts, Boundaries::BackEdges);
        let user = |names: &BTreeSet<Id>| -> BTreeSet<Id> {
            names.iter().filter(|n| !n.is_generated()).copied().collect()
        };
        let post = crossing_variables(&unit.ctx, &rd);
        let (pre, post_user) = (user(&unit.inferred), user(&post));
        if pre != post_user {
            let show = |s: &BTreeSet<Id>| s.iter().map(|n| format!("`{n}'")).join(", ");
            return Err(Error::register_conflict(format!(
                "gear `{}': registers before scheduling {{{}}} differ from registers after scheduling {{{}}}",
                unit.ctx.name,
                show(&pre),
                show(&post_user)
            )));
        }
        // Generated variables that became state during scheduling.
        let mut regs = unit.ctx.register_names();
        regs.extend(post.iter().filter(|n| n.is_generated()));
        unit.ctx.set_registers(&regs);
        unit.ctx.reaching = rd.def_sets();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearc_ir::{Session, TranslateConfig, from_ast::lower_gear};
    use gearc_frontend::GearParser;

    fn infer(src: &str) -> Unit {
        let prog = GearParser::parse_source("regs.gear", src.to_string()).unwrap();
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let (ctx, body) = lower_gear(&mut sess, &prog.gears[0], &[]).unwrap();
        let mut unit = Unit::new(ctx, body);
        InferRegisters::do_pass_default(&mut unit).unwrap();
        unit
    }

    #[test]
    fn pass_through_has_no_registers() {
        let unit = infer(
            "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
               async with din as d { yield d; }\n\
             }",
        );
        assert!(unit.inferred.is_empty());
        assert!(!unit.ctx.reaching.is_empty());
    }

    #[test]
    fn accumulators_are_registers() {
        let unit = infer(
            "gear g(din: Queue[Uint[8]]) -> (dout: Uint[16]) {\n\
               s: Uint[16] = 0;\n\
               async for d in din { s = s + d; }\n\
               yield s;\n\
             }",
        );
        let user: Vec<_> = unit.inferred.iter().filter(|n| !n.is_generated()).collect();
        assert_eq!(user, vec![&Id::new("s")]);
        assert!(unit.ctx.variable(Id::new("s")).unwrap().is_reg());
        assert!(!unit.ctx.variable(Id::new("d")).unwrap().is_reg());
    }

    #[test]
    fn values_live_after_a_handshake() {
        let unit = infer(
            "gear g(a: Uint[4], b: Uint[4]) -> (dout: Uint[4]) {\n\
               async with a as x { y: Uint[4] = x; }\n\
               async with b as z { yield y; }\n\
             }",
        );
        assert_eq!(unit.inferred, BTreeSet::from([Id::new("y")]));
    }

    #[test]
    fn scheduling_must_preserve_registers() {
        let src = "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
                     async with din as d { yield d; }\n\
                   }";
        let mut unit = infer(src);
        crate::passes::Schedule::do_pass_default(&mut unit).unwrap();
        assert!(CheckRegisters::do_pass_default(&mut unit).is_ok());

        let mut unit = infer(src);
        unit.inferred.insert(Id::new("ghost"));
        crate::passes::Schedule::do_pass_default(&mut unit).unwrap();
        let err = CheckRegisters::do_pass_default(&mut unit).err().unwrap();
        assert!(
            matches!(err.kind(), gearc_utils::ErrorKind::RegisterConflict(_)),
            "{err}"
        );
        assert!(err.to_string().contains("{`ghost'}"), "{err}");
    }
}
