//! Lowering of the AST into the IR.
//!
//! Each AST statement kind is dispatched to a handler that returns the IR
//! statements it lowers to. Handlers share the unit's [`Context`] and the
//! compiler [`Session`] through a [`Lowerer`].
mod call;
mod ctrl;
mod expr;
mod intf;
mod stmt;
mod unfold;

pub use unfold::LoopStrategy;

use crate::{
    Assign, Context, DType, Expr, Interface, ScopeEntry, Session, Stmt,
    Target, UnitKind, Value,
};
use gearc_frontend::{Direction, ast};
use gearc_utils::{Error, GPosIdx, GearcResult, Id};

/// Port types of a gear instance.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub inputs: Vec<(Id, DType)>,
    pub outputs: Vec<(Id, DType)>,
}

/// Lower the body of `gear` with parameters `overrides`. Returns the
/// gear's context and its body statements.
pub fn lower_gear(
    sess: &mut Session,
    gear: &ast::GearDef,
    overrides: &[(Id, Value)],
) -> GearcResult<(Context, Vec<Stmt>)> {
    let mut lower =
        Lowerer::new(sess, Context::new(gear.name, UnitKind::Gear));
    lower.bind_signature(gear, overrides)?;
    let body = lower.stmts(&gear.body)?;
    log::debug!(
        "lowered `{}': {} statements, {} scope entries",
        gear.name,
        body.len(),
        lower.ctx.variables().count()
    );
    Ok((lower.ctx, body))
}

/// Lowering state of one translation unit.
pub struct Lowerer<'s, 'p> {
    sess: &'s mut Session<'p>,
    ctx: Context,
    /// Outputs a `yield` pushes to, in port order.
    outputs: Vec<Id>,
}

impl<'s, 'p> Lowerer<'s, 'p> {
    fn new(sess: &'s mut Session<'p>, ctx: Context) -> Self {
        Lowerer {
            sess,
            ctx,
            outputs: vec![],
        }
    }

    /// Bind the parameters and ports of `gear` in the current scope.
    fn bind_signature(
        &mut self,
        gear: &ast::GearDef,
        overrides: &[(Id, Value)],
    ) -> GearcResult<Signature> {
        if let Some((name, _)) = overrides
            .iter()
            .find(|(n, _)| !gear.params.iter().any(|p| p.name == *n))
        {
            return Err(Error::undefined(
                *name,
                format!("parameter of gear `{}'", gear.name),
            )
            .with_pos(&gear.span));
        }
        for param in &gear.params {
            let value = match overrides.iter().find(|(n, _)| *n == param.name) {
                Some((_, v)) => v.clone(),
                None => self.param_value(&param.value)?,
            };
            self.ctx.set_const(param.name, value, true);
        }
        let mut sig = Signature::default();
        let ports = gear
            .inputs
            .iter()
            .map(|p| (p, Direction::Input))
            .chain(gear.outputs.iter().map(|p| (p, Direction::Output)));
        for (port, direction) in ports {
            let dtype = self
                .resolve_type(&port.ty)
                .map_err(|e| e.or_pos(&port.span))?;
            self.ctx
                .add_interface(Interface {
                    name: port.name,
                    dtype: dtype.clone(),
                    direction,
                    port: true,
                })
                .map_err(|e| e.with_pos(&port.span))?;
            match direction {
                Direction::Input => sig.inputs.push((port.name, dtype)),
                Direction::Output => sig.outputs.push((port.name, dtype)),
            }
        }
        self.outputs = sig.outputs.iter().map(|(n, _)| *n).collect();
        Ok(sig)
    }

    fn param_value(&mut self, value: &ast::ParamValue) -> GearcResult<Value> {
        match value {
            ast::ParamValue::Type(ast::TypeExpr::Named(name)) => {
                match self.ctx.lookup(*name) {
                    Some(ScopeEntry::Const { value, .. }) => Ok(value.clone()),
                    _ => Err(Error::undefined(*name, "parameter")),
                }
            }
            ast::ParamValue::Type(t) => Ok(Value::Type(self.resolve_type(t)?)),
            ast::ParamValue::Expr(e) => self.const_expr(e),
        }
    }

    /// Lower a statement list.
    fn stmts(&mut self, stmts: &[ast::Stmt]) -> GearcResult<Vec<Stmt>> {
        let mut out = vec![];
        for s in stmts {
            out.extend(self.stmt(s).map_err(|e| e.or_pos(s))?);
        }
        Ok(out)
    }

    fn stmt(&mut self, s: &ast::Stmt) -> GearcResult<Vec<Stmt>> {
        use ast::StmtKind as K;
        let pos = s.span;
        match &s.kind {
            K::Assign { target, value } => self.assign(target, value, pos),
            K::AnnAssign { target, ty, value } => {
                self.ann_assign(*target, ty, value.as_ref(), pos)
            }
            K::AugAssign { target, op, value } => {
                self.aug_assign(target, *op, value, pos)
            }
            K::If { branches, orelse } => {
                self.if_stmt(branches, orelse.as_deref(), pos)
            }
            K::While { test, body } => self.while_stmt(test, body, pos),
            K::For { target, iter, body } => {
                self.for_stmt(target, iter, body, pos)
            }
            K::AsyncWith { items, body } => self.async_with(items, body, pos),
            K::AsyncFor { target, intf, body } => {
                self.async_for(target, intf, body, pos)
            }
            K::Yield(e) => self.yield_stmt(e, pos),
            K::Await(e) => self.await_stmt(e, pos),
            K::Assert { test, msg } => self.assert_stmt(test, msg.as_deref(), pos),
            K::Return(e) => self.return_stmt(e.as_ref(), pos),
            K::Expr(e) => self.expr_stmt(e),
            K::Pass => Ok(vec![]),
        }
    }

    /// Reject constructs that need a gear body.
    fn require_gear(&self, what: &str, pos: GPosIdx) -> GearcResult<()> {
        if self.ctx.kind == UnitKind::Func {
            return Err(Error::unsupported(format!(
                "{what} inside helper function `{}'",
                self.ctx.name
            ))
            .with_pos(&pos));
        }
        Ok(())
    }

    fn assign_stmt(&mut self, target: Target, value: Expr, pos: GPosIdx) -> Stmt {
        Stmt::Assign(Assign {
            id: self.ctx.fresh_id(),
            target,
            value,
            guard: None,
            pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AwaitKind, BlockKind, Signal, TranslateConfig};
    use gearc_frontend::GearParser;

    fn lower(src: &str) -> GearcResult<(Context, Vec<Stmt>)> {
        let prog = GearParser::parse_source("test.gear", src.to_string())?;
        let gear = prog.gears.last().cloned().expect("no gear");
        let mut sess = Session::new(&prog, TranslateConfig::default());
        lower_gear(&mut sess, &gear, &[])
    }

    fn flatten(stmts: &[Stmt]) -> Vec<Stmt> {
        let mut all = vec![];
        stmts.iter().for_each(|s| s.walk(&mut |s| all.push(s.clone())));
        all
    }

    #[test]
    fn pull_and_push() {
        let (ctx, body) = lower(
            "gear pass_through(din: Uint[8]) -> (dout: Uint[8]) {\n\
               async with din as d { yield d; }\n\
             }",
        )
        .unwrap();
        let all = flatten(&body);
        let awaits: Vec<_> = all
            .iter()
            .filter_map(|s| match s {
                Stmt::Await(a) => Some(a.kind.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            awaits,
            vec![
                AwaitKind::Pull(Id::new("din")),
                AwaitKind::Push(vec![Id::new("dout")])
            ]
        );
        let Stmt::Assign(ack) = all.last().unwrap() else {
            panic!("pull must end with an acknowledge")
        };
        assert!(matches!(&ack.target, Target::Signal(c) if c.signal == Signal::Ready));
        assert!(ctx.variable(Id::new("d")).is_some());
    }

    #[test]
    fn constant_conditions_keep_live_branch() {
        let (_, body) = lower(
            "gear g<W = 4>(din: Uint[8]) -> (dout: Uint[8]) {\n\
               x: Uint[8] = 0;\n\
               if W > 2 { x = 1; } else { x = 2; }\n\
               if W == 0 { x = 3; } elif W == 4 { x = 4; }\n\
               yield x;\n\
             }",
        )
        .unwrap();
        let all = flatten(&body);
        assert!(!all.iter().any(|s| matches!(s, Stmt::IfElse(_))));
        let values: Vec<_> = all
            .iter()
            .filter_map(|s| match s {
                Stmt::Assign(a) if a.target.name() == "x" => a.value.as_value().cloned(),
                _ => None,
            })
            .collect();
        assert_eq!(
            values,
            [0, 1, 4].map(|v| Value::typed(v, DType::Uint(8))).to_vec()
        );
    }

    #[test]
    fn queue_loop() {
        let (ctx, body) = lower(
            "gear qsum(din: Queue[Uint[8]]) -> (dout: Uint[8]) {\n\
               async for d in din { yield d; }\n\
             }",
        )
        .unwrap();
        let eot = ctx
            .variables()
            .find(|v| v.name.as_str().starts_with("_eot"))
            .expect("eot variable");
        assert_eq!(eot.dtype, Some(DType::Uint(1)));
        assert!(body.iter().any(|s| matches!(s, Stmt::Block(b) if b.kind == BlockKind::Loop)));
    }

    #[test]
    fn errors_carry_positions() {
        let err = lower(
            "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
               async with dout as d { pass; }\n\
             }",
        )
        .unwrap_err();
        assert!(err.location().into_option().is_some());
        let err = lower(
            "gear g(din: Int[8]) -> (dout: Uint[8]) {\n\
               async with din as d { yield d; }\n\
             }",
        )
        .unwrap_err();
        assert!(matches!(err.kind(), gearc_utils::ErrorKind::TypeMismatch(_)));
        assert!(err.to_string().contains("yield d"));
    }
}
