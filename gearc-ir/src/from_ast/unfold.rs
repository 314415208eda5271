//! `for` loops. Each loop is first classified into a [LoopStrategy] and
//! then lowered accordingly.
use super::Lowerer;
use crate::{Block, BlockKind, DType, Expr, ScopeEntry, Stmt, UnitKind, Value};
use gearc_frontend::{BinOp, ast};
use gearc_utils::{Error, GPosIdx, GearcResult, bit_width};

/// How a `for` loop is lowered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopStrategy {
    /// Replicate the body once for each compile-time value.
    Unfold(Vec<Value>),
    /// Step a hardware counter from `start` while it has not passed `stop`.
    Counter { start: Expr, stop: Expr, step: i128 },
    /// Replicate the body once for each field of a fixed-length
    /// aggregate.
    Elementwise { source: Expr, len: u32 },
    Reject(String),
}

/// Whether lowering `body` creates a suspension point.
fn suspends(body: &[ast::Stmt]) -> bool {
    use ast::StmtKind as K;
    body.iter().any(|s| match &s.kind {
        K::AsyncWith { .. }
        | K::AsyncFor { .. }
        | K::Yield(_)
        | K::Await(_)
        | K::While { .. } => true,
        K::If { branches, orelse } => {
            branches.iter().any(|(_, b)| suspends(b))
                || orelse.as_deref().is_some_and(suspends)
        }
        K::For { body, .. } => suspends(body),
        _ => false,
    })
}

impl Lowerer<'_, '_> {
    pub(super) fn plan_loop(
        &mut self,
        iter: &ast::Expr,
        body: &[ast::Stmt],
    ) -> GearcResult<LoopStrategy> {
        let unfoldable = !suspends(body);
        if let ast::ExprKind::Call { func, args, kwargs } = &iter.kind {
            let shadowed = self.ctx.lookup(*func).is_some()
                || self.sess.program.find_func(*func).is_some();
            if *func == "range" && !shadowed {
                if !kwargs.is_empty() {
                    return Ok(LoopStrategy::Reject(
                        "`range' takes no keyword arguments".to_string(),
                    ));
                }
                let mut bounds = args
                    .iter()
                    .map(|a| self.expr(a))
                    .collect::<GearcResult<Vec<_>>>()?
                    .into_iter();
                let (start, stop, step) =
                    match (bounds.next(), bounds.next(), bounds.next(), bounds.next()) {
                        (Some(stop), None, None, None) => (Expr::int(0), stop, Expr::int(1)),
                        (Some(start), Some(stop), None, None) => (start, stop, Expr::int(1)),
                        (Some(start), Some(stop), Some(step), None) => (start, stop, step),
                        _ => {
                            return Ok(LoopStrategy::Reject(
                                "`range' takes one to three arguments".to_string(),
                            ));
                        }
                    };
                return Ok(self.plan_range(start, stop, step, unfoldable));
            }
        }
        let source = self.expr(iter)?;
        Ok(match &source {
            Expr::Res(Value::Aggregate { elems, .. }) if unfoldable => {
                if elems.len() > self.sess.config.max_unfold {
                    self.too_long()
                } else {
                    LoopStrategy::Unfold(elems.clone())
                }
            }
            _ => match source.dtype() {
                Some(t @ (DType::Tuple { .. } | DType::Array(..))) => {
                    LoopStrategy::Elementwise {
                        len: t.len().unwrap_or(0),
                        source,
                    }
                }
                _ => LoopStrategy::Reject(format!("cannot iterate over {source}")),
            },
        })
    }

    fn plan_range(
        &self,
        start: Expr,
        stop: Expr,
        step: Expr,
        unfoldable: bool,
    ) -> LoopStrategy {
        let int = |e: &Expr| e.as_value().and_then(Value::as_int);
        let step = match int(&step) {
            Some(0) => {
                return LoopStrategy::Reject("`range' step must not be zero".to_string());
            }
            Some(s) => s,
            None => {
                return LoopStrategy::Reject(
                    "`range' step must be a compile-time constant".to_string(),
                );
            }
        };
        if let (Some(a), Some(b), true) = (int(&start), int(&stop), unfoldable) {
            let mut values = vec![];
            let mut i = Some(a);
            while let Some(v) = i.filter(|v| (step > 0 && *v < b) || (step < 0 && *v > b)) {
                if values.len() == self.sess.config.max_unfold {
                    return self.too_long();
                }
                values.push(Value::int(v));
                i = v.checked_add(step);
            }
            return LoopStrategy::Unfold(values);
        }
        if self.ctx.kind == UnitKind::Func {
            return LoopStrategy::Reject(
                "loops with run-time bounds inside helper functions".to_string(),
            );
        }
        LoopStrategy::Counter { start, stop, step }
    }

    fn too_long(&self) -> LoopStrategy {
        LoopStrategy::Reject(format!(
            "loop unfolds into more than {} iterations",
            self.sess.config.max_unfold
        ))
    }

    pub(super) fn for_stmt(
        &mut self,
        target: &ast::Target,
        iter: &ast::Expr,
        body: &[ast::Stmt],
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let strategy = self.plan_loop(iter, body)?;
        match strategy {
            LoopStrategy::Unfold(values) => {
                log::trace!("unfolding {} iterations", values.len());
                let mut out = vec![];
                for v in values {
                    out.extend(self.bind_const(target, v, pos)?);
                    out.extend(self.stmts(body)?);
                }
                Ok(out)
            }
            LoopStrategy::Elementwise { source, len } => {
                let (mut out, source) = self.spill(source, pos)?;
                for k in 0..len {
                    let elem = Expr::subscript(source.clone(), Expr::int(k as i128))?;
                    out.extend(self.bind(target, elem, pos)?);
                    out.extend(self.stmts(body)?);
                }
                Ok(out)
            }
            LoopStrategy::Counter { start, stop, step } => {
                self.counter_loop(target, start, stop, step, body, pos)
            }
            LoopStrategy::Reject(msg) => Err(Error::unsupported(msg).with_pos(iter)),
        }
    }

    /// Bind a loop value. Names that are not variables become constants.
    fn bind_const(
        &mut self,
        target: &ast::Target,
        value: Value,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        match target {
            ast::Target::Name(name, span) => match self.ctx.lookup(*name) {
                None | Some(ScopeEntry::Const { param: false, .. }) => {
                    self.ctx.set_const(*name, value, false);
                    Ok(vec![])
                }
                _ => self.assign_name(*name, Expr::Res(value), *span),
            },
            ast::Target::Tuple(targets) => {
                let elems = match value.elems() {
                    Some(es) if es.len() == targets.len() => es.to_vec(),
                    _ => {
                        return Err(Error::type_mismatch(format!(
                            "cannot unpack {value} into {} targets",
                            targets.len()
                        ))
                        .with_pos(target));
                    }
                };
                let mut out = vec![];
                for (t, v) in targets.iter().zip(elems) {
                    out.extend(self.bind_const(t, v, pos)?);
                }
                Ok(out)
            }
            ast::Target::Subscript(..) => self.bind(target, Expr::Res(value), pos),
        }
    }

    /// `i = start; while i < stop { body; i += step; }`
    fn counter_loop(
        &mut self,
        target: &ast::Target,
        start: Expr,
        stop: Expr,
        step: i128,
        body: &[ast::Stmt],
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let ast::Target::Name(name, span) = target else {
            return Err(Error::unsupported("counter loops must bind a single name")
                .with_pos(target));
        };
        if self.ctx.variable(*name).is_none() {
            let dtype = counter_type(&start, &stop, step)?;
            let mut var = crate::Variable::new(*name, Some(dtype), crate::VarKind::Wire);
            var.pos = *span;
            self.ctx.declare(var).map_err(|e| e.with_pos(span))?;
        }
        let mut out = self.assign_name(*name, start, *span)?;
        let i = self.load(*name)?;
        let cmp = if step > 0 { BinOp::Lt } else { BinOp::Gt };
        let test = Expr::binary(cmp, i.clone(), stop)?;
        let id = self.ctx.fresh_id();
        let mut stmts = self.stmts(body)?;
        let next = Expr::binary(BinOp::Add, i, Expr::int(step))?;
        stmts.extend(self.assign_name(*name, next, *span)?);
        out.push(Stmt::Block(Block {
            id,
            kind: BlockKind::Loop,
            exit_cond: Expr::not(test.clone()),
            in_cond: test,
            stmts,
            pos,
        }));
        Ok(out)
    }
}

/// The counter type: wide enough for both bounds and one step past them.
fn counter_type(start: &Expr, stop: &Expr, step: i128) -> GearcResult<DType> {
    let (Some(a), Some(b)) = (start.dtype(), stop.dtype()) else {
        return Err(Error::type_mismatch("`range' bounds have unknown types"));
    };
    let common = DType::common(&a, &b).filter(DType::is_int).ok_or_else(|| {
        Error::type_mismatch(format!("`range' bounds of types {a} and {b}"))
    })?;
    let w = common.width().max(bit_width(step.unsigned_abs())) + 1;
    Ok(match common {
        DType::Int(_) => DType::Int(w),
        _ if step < 0 => DType::Int(w + 1),
        _ => DType::Uint(w),
    })
}
