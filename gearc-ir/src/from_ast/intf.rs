//! Interface handshakes: pulls, pushes and clock waits.
use super::Lowerer;
use crate::{
    Await, AwaitKind, Block, BlockKind, Component, DType, Expr, Name, Stmt,
    Target, Value, VarKind, Variable,
};
use gearc_frontend::{BinOp, Direction, ast};
use gearc_utils::{Error, GPosIdx, GearcResult, Id, WithPos};

impl Lowerer<'_, '_> {
    /// The input interface named by `e`.
    fn input_intf(&self, e: &ast::Expr) -> GearcResult<(Id, DType)> {
        let ast::ExprKind::Name(name) = &e.kind else {
            return Err(Error::unsupported("expected an input interface").with_pos(e));
        };
        match self.ctx.interface(*name) {
            Some(i) if i.direction == Direction::Input => Ok((i.name, i.dtype.clone())),
            Some(_) => Err(Error::unsupported(format!(
                "cannot pull from output interface `{name}'"
            ))
            .with_pos(e)),
            None => Err(Error::undefined(*name, "interface").with_pos(e)),
        }
    }

    fn pull(&mut self, intf: Id, pos: GPosIdx) -> Stmt {
        Stmt::Await(Await {
            id: self.ctx.fresh_id(),
            kind: AwaitKind::Pull(intf),
            in_await: Expr::Component(Component::valid(intf)),
            exit_await: Expr::bool(true),
            pos,
        })
    }

    fn ack(&mut self, intf: Id, pos: GPosIdx) -> Stmt {
        self.assign_stmt(
            Target::Signal(Component::ready(intf)),
            Expr::bool(true),
            pos,
        )
    }

    /// `async with din as d { body }`: wait for valid data, run the body
    /// and acknowledge.
    pub(super) fn async_with(
        &mut self,
        items: &[(ast::Expr, ast::Target)],
        body: &[ast::Stmt],
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        self.require_gear("`async with'", pos)?;
        let id = self.ctx.fresh_id();
        let mut stmts = vec![];
        let mut pulled = vec![];
        for (intf, target) in items {
            let (name, dtype) = self.input_intf(intf)?;
            stmts.push(self.pull(name, intf.span));
            let data = Expr::Component(Component::data(name, dtype));
            stmts.extend(self.bind(target, data, target.copy_span())?);
            pulled.push(name);
        }
        stmts.extend(self.stmts(body)?);
        for name in pulled.into_iter().rev() {
            stmts.push(self.ack(name, pos));
        }
        Ok(vec![Stmt::Block(Block {
            pos,
            ..Block::seq(id, stmts)
        })])
    }

    /// `async for d in q { body }`: pull and process elements of a queue
    /// until its outermost end-of-transaction bits are all set.
    ///
    /// A single target binds the element data without the end-of-transaction
    /// bits. A pair of targets binds both: `async for (d, eot) in q`.
    pub(super) fn async_for(
        &mut self,
        target: &ast::Target,
        intf: &ast::Expr,
        body: &[ast::Stmt],
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        self.require_gear("`async for'", pos)?;
        let (q, dtype) = self.input_intf(intf)?;
        let DType::Queue(_, lvl) = &dtype else {
            return Err(Error::type_mismatch(format!(
                "`async for' needs a queue, `{q}' carries {dtype}"
            ))
            .with_pos(intf));
        };
        let eot_t = DType::Uint(*lvl);
        let eot = self.ctx.gen_name("_eot");
        let mut var = Variable::new(eot, Some(eot_t.clone()), VarKind::Wire);
        var.pos = pos;
        self.ctx.declare(var)?;
        let eot_name = Name {
            name: eot,
            dtype: Some(eot_t.clone()),
        };
        let last = Expr::Res(Value::typed(-1, eot_t.clone()));
        let init = self.assign_stmt(
            Target::Var(eot_name.clone()),
            Expr::Res(Value::typed(0, eot_t)),
            pos,
        );

        let loop_id = self.ctx.fresh_id();
        let data = Expr::Component(Component::data(q, dtype.clone()));
        let mut stmts = vec![self.pull(q, intf.span)];
        let elem = match target {
            ast::Target::Tuple(ts) if ts.len() == 2 => data.clone(),
            _ => Expr::subscript(data.clone(), Expr::int(0))?,
        };
        stmts.extend(self.bind(target, elem, target.copy_span())?);
        let eot_bits = Expr::subscript(data, Expr::int(1))?;
        stmts.push(self.assign_stmt(Target::Var(eot_name.clone()), eot_bits, pos));
        stmts.extend(self.stmts(body)?);
        stmts.push(self.ack(q, pos));

        let eot_expr = Expr::Name(eot_name);
        let running = Expr::binary(BinOp::NotEq, eot_expr.clone(), last.clone())?;
        Ok(vec![
            init,
            Stmt::Block(Block {
                id: loop_id,
                kind: BlockKind::Loop,
                in_cond: running,
                exit_cond: Expr::eq(eot_expr, last)?,
                stmts,
                pos,
            }),
        ])
    }

    /// `yield v` drives the outputs and waits until all of them accept.
    /// With several outputs, `yield a, None` pushes to the first only.
    pub(super) fn yield_stmt(
        &mut self,
        e: &ast::Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        self.require_gear("`yield'", pos)?;
        let outputs = self.outputs.clone();
        let mut stmts = vec![];
        let mut values = vec![];
        match (&e.kind, outputs.as_slice()) {
            (_, []) => {
                return Err(Error::unsupported("`yield' in a gear without outputs")
                    .with_pos(&pos));
            }
            (_, [out]) => values.push((*out, self.expr(e)?, e.span)),
            (ast::ExprKind::Tuple(es), _) if es.len() == outputs.len() => {
                for (out, el) in outputs.iter().zip(es) {
                    if !matches!(el.kind, ast::ExprKind::None) {
                        values.push((*out, self.expr(el)?, el.span));
                    }
                }
            }
            _ => {
                let value = self.expr(e)?;
                if value.dtype().and_then(|t| t.len()) != Some(outputs.len() as u32) {
                    return Err(Error::type_mismatch(format!(
                        "cannot split {value} over {} outputs",
                        outputs.len()
                    ))
                    .with_pos(e));
                }
                let (spilled, value) = self.spill(value, pos)?;
                stmts.extend(spilled);
                for (i, out) in outputs.iter().enumerate() {
                    let field = Expr::subscript(value.clone(), Expr::int(i as i128))?;
                    values.push((*out, field, e.span));
                }
            }
        }
        if values.is_empty() {
            return Ok(stmts);
        }
        let mut pushed = vec![];
        for (out, value, span) in values {
            let dtype = self
                .ctx
                .interface(out)
                .map(|i| i.dtype.clone())
                .ok_or_else(|| Error::undefined(out, "interface"))?;
            let value = Expr::coerce(value, dtype.clone()).map_err(|e| e.with_pos(&span))?;
            stmts.push(self.assign_stmt(
                Target::Signal(Component::data(out, dtype)),
                value,
                span,
            ));
            pushed.push(out);
        }
        let ready = Expr::all(
            pushed
                .iter()
                .map(|o| Expr::Component(Component::ready(*o))),
        );
        stmts.push(Stmt::Await(Await {
            id: self.ctx.fresh_id(),
            kind: AwaitKind::Push(pushed),
            in_await: Expr::bool(true),
            exit_await: ready,
            pos,
        }));
        Ok(stmts)
    }

    /// Only `await clk()` is supported.
    pub(super) fn await_stmt(
        &mut self,
        e: &ast::Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        self.require_gear("`await'", pos)?;
        match &e.kind {
            ast::ExprKind::Call { func, args, kwargs }
                if *func == "clk" && args.is_empty() && kwargs.is_empty() =>
            {
                Ok(vec![Stmt::Await(Await {
                    id: self.ctx.fresh_id(),
                    kind: AwaitKind::Clock,
                    in_await: Expr::bool(true),
                    exit_await: Expr::bool(true),
                    pos,
                })])
            }
            _ => Err(Error::unsupported("only `await clk()' is supported").with_pos(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        AwaitKind, DType, Session, Stmt, Target, TranslateConfig, from_ast::lower_gear,
    };
    use gearc_frontend::GearParser;
    use gearc_utils::{GearcResult, Id};

    fn lower(ports: &str, body: &str) -> GearcResult<Vec<Stmt>> {
        let text = format!("gear g{ports} {{ {body} }}");
        let prog = GearParser::parse_source("intf.gear", text)?;
        let mut sess = Session::new(&prog, TranslateConfig::default());
        lower_gear(&mut sess, &prog.gears[0], &[]).map(|(_, body)| body)
    }

    fn flatten(stmts: &[Stmt]) -> Vec<Stmt> {
        let mut all = vec![];
        crate::walk_stmts(stmts, &mut |s| all.push(s.clone()));
        all
    }

    #[test]
    fn yield_to_several_outputs() {
        let ports = "(din: Uint[4]) -> (a: Uint[4], b: Uint[5])";
        let all = flatten(&lower(ports, "async with din as d { yield d, None; yield d, d; }").unwrap());
        let pushes: Vec<_> = all
            .iter()
            .filter_map(|s| match s {
                Stmt::Await(a) => match &a.kind {
                    AwaitKind::Push(os) => Some((os.clone(), a.exit_await.to_string())),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(pushes[0], (vec![Id::new("a")], "a.ready".to_string()));
        assert_eq!(pushes[1].0, vec![Id::new("a"), Id::new("b")]);
        assert_eq!(pushes[1].1, "(a.ready && b.ready)");
        let data_b = all.iter().any(|s| {
            matches!(s, Stmt::Assign(a) if a.target == Target::Signal(crate::Component::data(Id::new("b"), crate::DType::Uint(5))))
        });
        assert!(data_b);
    }

    #[test]
    fn multiple_pulls_ack_in_reverse() {
        let ports = "(x: Uint[2], y: Uint[2]) -> (o: Uint[3])";
        let all = flatten(&lower(ports, "async with x as a, y as b { yield a + b; }").unwrap());
        let acks: Vec<_> = all
            .iter()
            .filter_map(|s| match s {
                Stmt::Assign(a) if a.target.is_signal() && a.value.is_true() => {
                    Some(a.target.name())
                }
                _ => None,
            })
            .collect();
        assert_eq!(acks, vec![Id::new("y"), Id::new("x")]);
    }

    #[test]
    fn queue_with_eot_target() {
        let ports = "(din: Queue[Uint[8], 2]) -> (dout: Uint[8])";
        let body = lower(ports, "async for (d, last) in din { if last == 3 { yield d; } }").unwrap();
        let Stmt::Assign(init) = &body[0] else {
            panic!("expected the eot reset");
        };
        assert_eq!(init.value.to_string(), "0");
        let Stmt::Block(lp) = &body[1] else {
            panic!("expected the loop");
        };
        assert_eq!(lp.in_cond.to_string(), "(_eot != 3)");
        assert_eq!(lp.exit_cond.to_string(), "(_eot == 3)");
    }

    #[test]
    fn queue_elements_bind_their_data() {
        let ports = "(din: Queue[Uint[8], 2]) -> (dout: Uint[8])";
        let bound = |body: &str| -> Vec<(Id, Option<DType>)> {
            flatten(&lower(ports, body).unwrap())
                .iter()
                .filter_map(|s| match s {
                    Stmt::Assign(a) if !a.target.is_signal() && !a.target.name().is_generated() => {
                        Some((a.target.name(), a.value.dtype()))
                    }
                    _ => None,
                })
                .collect()
        };
        assert_eq!(
            bound("async for d in din { yield d; }"),
            vec![(Id::new("d"), Some(DType::Uint(8)))]
        );
        assert_eq!(
            bound("async for (d, last) in din { yield d; }"),
            vec![
                (Id::new("d"), Some(DType::Uint(8))),
                (Id::new("last"), Some(DType::Uint(2)))
            ]
        );
    }

    #[test]
    fn clock_waits() {
        let ports = "(din: Uint[4]) -> (dout: Uint[4])";
        let body = lower(ports, "await clk();").unwrap();
        assert!(matches!(&body[0], Stmt::Await(a) if a.kind == AwaitKind::Clock));
        assert!(lower(ports, "await din;").is_err());
        assert!(lower(ports, "async for d in din { pass; }").is_err());
        assert!(lower("(din: Uint[4]) -> ()", "async with din as d { yield d; }").is_err());
    }
}
