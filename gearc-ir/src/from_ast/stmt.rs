//! Assignments and simple statements.
use super::Lowerer;
use crate::{
    Assert, DType, Expr, Name, Return, ScopeEntry, Stmt, Target, UnitKind,
    Value, VarKind, Variable,
};
use gearc_frontend::{BinOp, ast};
use gearc_utils::{Error, GPosIdx, GearcResult, Id};

impl Lowerer<'_, '_> {
    pub(super) fn assign(
        &mut self,
        target: &ast::Target,
        value: &ast::Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        if let ast::ExprKind::Call { func, args, kwargs } = &value.kind {
            if let Some(gear) = self.gear_def(*func) {
                self.instantiate(gear, args, kwargs, Some(target), value.span)?;
                return Ok(vec![]);
            }
        }
        let value = self.expr(value)?;
        self.bind(target, value, pos)
    }

    /// Assign an already lowered value to `target`.
    pub(super) fn bind(
        &mut self,
        target: &ast::Target,
        value: Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        match target {
            ast::Target::Name(name, span) => self.assign_name(*name, value, *span),
            ast::Target::Subscript(name, idx, span) => {
                let idx = self.expr(idx)?;
                self.assign_part(*name, idx, value, *span)
            }
            ast::Target::Tuple(targets) => {
                let arity = value.dtype().and_then(|t| t.len());
                if arity != Some(targets.len() as u32) {
                    return Err(Error::type_mismatch(format!(
                        "cannot unpack {value} into {} targets",
                        targets.len()
                    ))
                    .with_pos(&pos));
                }
                let (mut stmts, value) = self.spill(value, pos)?;
                for (i, t) in targets.iter().enumerate() {
                    let field = Expr::subscript(value.clone(), Expr::int(i as i128))
                        .map_err(|e| e.with_pos(t))?;
                    stmts.extend(self.bind(t, field, pos)?);
                }
                Ok(stmts)
            }
        }
    }

    /// Bind a compound value to a temporary so it is evaluated once.
    pub(super) fn spill(&mut self, value: Expr, pos: GPosIdx) -> GearcResult<(Vec<Stmt>, Expr)> {
        match value {
            Expr::Res(_) | Expr::Name(_) | Expr::Component(_) | Expr::Concat(_) => {
                Ok((vec![], value))
            }
            value => {
                let tmp = self.ctx.gen_name("_tmp");
                let stmts = self.assign_name(tmp, value, pos)?;
                Ok((stmts, self.load(tmp)?))
            }
        }
    }

    /// `name = value`. The first assignment of a new name declares a
    /// combinational variable of the value's type.
    pub(super) fn assign_name(
        &mut self,
        name: Id,
        value: Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let declared = match self.ctx.lookup(name) {
            Some(ScopeEntry::Var(v)) => Some(v.dtype.clone()),
            Some(ScopeEntry::Intf(_)) => {
                return Err(Error::unsupported(format!(
                    "assignment to interface `{name}'"
                ))
                .with_pos(&pos));
            }
            Some(ScopeEntry::Const { param: true, .. }) => {
                return Err(Error::misc(format!(
                    "parameter `{name}' cannot be assigned"
                ))
                .with_pos(&pos));
            }
            _ => None,
        };
        if let (None, Expr::Res(v @ (Value::Type(_) | Value::Str(_)))) = (&declared, &value) {
            self.ctx.set_const(name, v.clone(), false);
            return Ok(vec![]);
        }
        let value = match declared.as_ref().and_then(|t| t.as_ref()) {
            Some(t) => Expr::coerce(value, t.clone()),
            None => materialize(value),
        }
        .map_err(|e| e.with_pos(&pos))?;
        let dtype = value.dtype();
        match declared {
            None => {
                let mut var = Variable::new(name, dtype.clone(), VarKind::Wire);
                var.pos = pos;
                self.ctx.declare(var).map_err(|e| e.with_pos(&pos))?;
            }
            Some(None) => {
                if let Some(v) = self.ctx.variable_mut(name) {
                    v.dtype = dtype.clone();
                }
            }
            Some(Some(_)) => (),
        }
        let target = Target::Var(Name { name, dtype });
        Ok(vec![self.assign_stmt(target, value, pos)])
    }

    /// `name[idx] = value`
    fn assign_part(
        &mut self,
        name: Id,
        idx: Expr,
        value: Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let dtype = match self.ctx.variable(name) {
            Some(v) => v.dtype.clone().ok_or_else(|| {
                Error::misc(format!("type of `{name}' is not known"))
            }),
            None => Err(Error::undefined(name, "variable")),
        }
        .map_err(|e| e.with_pos(&pos))?;
        let target = Target::Part(
            Name {
                name,
                dtype: Some(dtype.clone()),
            },
            idx,
        );
        let part = target.dtype().ok_or_else(|| {
            Error::type_mismatch(format!("cannot assign to {target} of {dtype}"))
                .with_pos(&pos)
        })?;
        let value = Expr::coerce(value, part).map_err(|e| e.with_pos(&pos))?;
        Ok(vec![self.assign_stmt(target, value, pos)])
    }

    /// `name: T = value` or a bare declaration `name: T`.
    pub(super) fn ann_assign(
        &mut self,
        name: Id,
        ty: &ast::TypeExpr,
        value: Option<&ast::Expr>,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let dtype = self.resolve_type(ty)?;
        match self.ctx.variable(name) {
            Some(v) if v.dtype.as_ref() == Some(&dtype) => (),
            Some(v) => {
                let prev = v.dtype.as_ref().map_or("?".to_string(), |t| t.to_string());
                return Err(Error::type_mismatch(format!(
                    "`{name}' redeclared as {dtype}, previously {prev}"
                ))
                .with_pos(&pos));
            }
            None => {
                let mut var = Variable::new(name, Some(dtype), VarKind::Wire);
                var.pos = pos;
                self.ctx.declare(var).map_err(|e| e.with_pos(&pos))?;
            }
        }
        match value {
            Some(v) => {
                let value = self.expr(v)?;
                self.assign_name(name, value, pos)
            }
            None => Ok(vec![]),
        }
    }

    /// `target op= value`
    pub(super) fn aug_assign(
        &mut self,
        target: &ast::Target,
        op: BinOp,
        value: &ast::Expr,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let current = match target {
            ast::Target::Name(name, _) => self.load(*name)?,
            ast::Target::Subscript(name, idx, _) => {
                let base = self.load(*name)?;
                let idx = self.expr(idx)?;
                Expr::subscript(base, idx)?
            }
            ast::Target::Tuple(_) => {
                return Err(Error::unsupported(
                    "augmented assignment to a tuple",
                ));
            }
        };
        let rhs = self.expr(value)?;
        let value = Expr::binary(op, current, rhs).map_err(|e| e.with_pos(&pos))?;
        self.bind(target, value, pos)
    }

    pub(super) fn assert_stmt(
        &mut self,
        test: &ast::Expr,
        msg: Option<&str>,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let test = self.cond_expr(test)?;
        let msg = msg.map_or_else(|| pos.snippet(), str::to_string);
        match test.truthy() {
            Some(true) => Ok(vec![]),
            Some(false) => {
                Err(Error::misc(format!("assertion failed: {msg}")).with_pos(&pos))
            }
            None => Ok(vec![Stmt::Assert(Assert {
                id: self.ctx.fresh_id(),
                test,
                msg,
                pos,
            })]),
        }
    }

    pub(super) fn return_stmt(
        &mut self,
        value: Option<&ast::Expr>,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        if self.ctx.kind != UnitKind::Func {
            return Err(Error::unsupported("`return' outside of a helper function")
                .with_pos(&pos));
        }
        let value = match value {
            Some(e) => self.expr(e)?,
            None => Expr::Res(Value::Unit),
        };
        let value = match &self.ctx.ret_dtype {
            Some(t) => Expr::coerce(value, t.clone()),
            None => materialize(value),
        }
        .map_err(|e| e.with_pos(&pos))?;
        if self.ctx.ret_dtype.is_none() {
            self.ctx.ret_dtype = value.dtype();
        }
        Ok(vec![Stmt::Return(Return {
            id: self.ctx.fresh_id(),
            value,
            pos,
        })])
    }

    pub(super) fn expr_stmt(&mut self, e: &ast::Expr) -> GearcResult<Vec<Stmt>> {
        match &e.kind {
            // Docstrings.
            ast::ExprKind::Str(_) => Ok(vec![]),
            ast::ExprKind::Call { func, args, kwargs } => match self.gear_def(*func) {
                Some(gear) => {
                    self.instantiate(gear, args, kwargs, None, e.span)?;
                    Ok(vec![])
                }
                None => Err(Error::unsupported(format!(
                    "call to `{func}' as a statement has no effect"
                ))
                .with_pos(e)),
            },
            _ => Err(Error::unsupported("expression statement has no effect")
                .with_pos(e)),
        }
    }
}

/// Give untyped constants their narrowest type.
pub(super) fn materialize(value: Expr) -> GearcResult<Expr> {
    match &value {
        Expr::Res(v) if v.is_untyped() => {
            let t: Option<DType> = v.dtype();
            match t {
                Some(t) => Expr::coerce(value, t),
                None => Ok(value),
            }
        }
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Context, DType, Expr, Session, Stmt, Target, TranslateConfig, Value,
        from_ast::lower_gear,
    };
    use gearc_frontend::GearParser;
    use gearc_utils::{ErrorKind, GearcResult, Id};

    fn lower(body: &str) -> GearcResult<(Context, Vec<Stmt>)> {
        let text = format!(
            "gear g<W = 8>(din: Tuple[Uint[4], Int[3]]) -> (dout: Uint[8]) {{ {body} }}"
        );
        let prog = GearParser::parse_source("stmt.gear", text)?;
        let mut sess = Session::new(&prog, TranslateConfig::default());
        lower_gear(&mut sess, &prog.gears[0], &[])
    }

    fn assigns(stmts: &[Stmt]) -> Vec<(Target, Expr)> {
        let mut out = vec![];
        crate::walk_stmts(stmts, &mut |s| {
            if let Stmt::Assign(a) = s {
                out.push((a.target.clone(), a.value.clone()));
            }
        });
        out
    }

    #[test]
    fn first_assignment_declares() {
        let (ctx, body) = lower("x = 5; y: Int[6] = -3; x = x + 1;").unwrap();
        assert_eq!(ctx.variable(Id::new("x")).unwrap().dtype, Some(DType::Uint(3)));
        let all = assigns(&body);
        assert_eq!(all[1].1, Expr::Res(Value::typed(-3, DType::Int(6))));
        // Later assignments keep the declared width.
        assert_eq!(all[2].1.dtype(), Some(DType::Uint(3)));
    }

    #[test]
    fn tuples_and_parts() {
        let (ctx, body) = lower(
            "async with din as (a, b) { \
               v: Uint[8] = 0; v[3] = a[0]; v += 1; \
             }",
        )
        .unwrap();
        assert_eq!(ctx.variable(Id::new("b")).unwrap().dtype, Some(DType::Int(3)));
        let parts: Vec<_> = assigns(&body)
            .into_iter()
            .filter(|(t, _)| t.is_partial())
            .collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].0.dtype(), Some(DType::bool()));
    }

    #[test]
    fn rejected_statements() {
        let err = lower("W = 3;").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Misc(_)));
        let err = lower("din = 3;").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
        let err = lower("return 1;").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
        let err = lower("assert W == 4, \"width\";").unwrap_err();
        assert!(err.to_string().contains("assertion failed: width"));
        assert!(lower("assert W == 8; \"doc\";").unwrap().1.is_empty());
        let err = lower("x: Uint[2] = 7;").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch(_)));
    }
}
