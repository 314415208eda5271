//! Expressions and type expressions.
use super::Lowerer;
use crate::{DType, Expr, ScopeEntry, Value};
use gearc_frontend::{BinOp, UnOp, ast};
use gearc_utils::{Error, GearcResult, Id};

impl Lowerer<'_, '_> {
    pub(super) fn expr(&mut self, e: &ast::Expr) -> GearcResult<Expr> {
        self.expr_kind(e).map_err(|err| err.or_pos(e))
    }

    fn expr_kind(&mut self, e: &ast::Expr) -> GearcResult<Expr> {
        use ast::ExprKind as K;
        match &e.kind {
            K::Num(n) => Ok(Expr::int(n.clone())),
            K::Bool(b) => Ok(Expr::bool(*b)),
            K::None => Ok(Expr::Res(Value::Unit)),
            K::Str(s) => Ok(Expr::Res(Value::Str(s.clone()))),
            K::Name(name) => self.load(*name),
            K::Tuple(es) => Ok(Expr::concat(
                es.iter().map(|e| self.expr(e)).collect::<GearcResult<_>>()?,
            )),
            K::Unary(UnOp::Not, operand) => {
                Ok(Expr::not(self.cond_expr(operand)?))
            }
            K::Unary(op, operand) => Expr::unary(*op, self.expr(operand)?),
            K::Binary(op @ (BinOp::And | BinOp::Or), lhs, rhs) => {
                let lhs = self.cond_expr(lhs)?;
                let rhs = self.cond_expr(rhs)?;
                Expr::binary(*op, lhs, rhs)
            }
            K::Binary(op, lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                Expr::binary(*op, lhs, rhs)
            }
            K::IfExp { test, body, orelse } => {
                let cond = self.cond_expr(test)?;
                match cond.truthy() {
                    Some(true) => self.expr(body),
                    Some(false) => self.expr(orelse),
                    None => {
                        let then = self.expr(body)?;
                        let orelse = self.expr(orelse)?;
                        let (then, orelse) = unify(then, orelse)?;
                        Ok(Expr::cond(cond, then, orelse))
                    }
                }
            }
            K::Subscript(base, idx) => {
                let base = self.expr(base)?;
                let idx = self.expr(idx)?;
                let idx = match (idx.as_value().and_then(Value::as_int), base.dtype()) {
                    (Some(i), Some(t)) if i < 0 => {
                        Expr::int(i + t.len().unwrap_or(t.width()) as i128)
                    }
                    _ => idx,
                };
                Expr::subscript(base, idx)
            }
            K::Slice(base, lo, hi) => {
                let base = self.expr(base)?;
                let len = base
                    .dtype()
                    .map(|t| t.len().unwrap_or(t.width()))
                    .ok_or_else(|| {
                        Error::type_mismatch(format!("{base} cannot be sliced"))
                    })?;
                let start = match lo {
                    Some(e) => self.slice_bound(e, len)?,
                    None => 0,
                };
                let stop = match hi {
                    Some(e) => self.slice_bound(e, len)?,
                    None => len,
                };
                Expr::slice(base, start, stop)
            }
            K::Attribute(base, attr) => match self.expr(base)? {
                Expr::Res(Value::Type(t)) => type_attr(&t, *attr),
                base => Expr::field(base, *attr),
            },
            K::Call { func, args, kwargs } => {
                self.call(*func, args, kwargs, e.span)
            }
            K::Cast(ty, operand) => {
                let dtype = self.resolve_type(ty)?;
                Expr::cast(self.expr(operand)?, dtype)
            }
        }
    }

    /// The value bound to `name`.
    pub(super) fn load(&self, name: Id) -> GearcResult<Expr> {
        match self.ctx.lookup(name) {
            Some(ScopeEntry::Const { value, .. }) => Ok(Expr::Res(value.clone())),
            Some(ScopeEntry::Var(v)) => Ok(v.to_expr()),
            Some(ScopeEntry::Intf(_)) => Err(Error::unsupported(format!(
                "interface `{name}' used as a value"
            ))),
            None => Err(Error::undefined(name, "name")),
        }
    }

    /// Lower `e` as a condition.
    pub(super) fn cond_expr(&mut self, e: &ast::Expr) -> GearcResult<Expr> {
        let lowered = self.expr(e)?;
        to_bool(lowered).map_err(|err| err.with_pos(e))
    }

    /// Evaluate `e` at translation time.
    pub(super) fn const_expr(&mut self, e: &ast::Expr) -> GearcResult<Value> {
        match self.expr(e)? {
            Expr::Res(v) => Ok(v),
            other => Err(Error::misc(format!(
                "`{other}' is not a compile-time constant"
            ))
            .with_pos(e)),
        }
    }

    pub(super) fn const_u32(&mut self, e: &ast::Expr) -> GearcResult<u32> {
        let v = self.const_expr(e)?;
        v.as_u32().ok_or_else(|| {
            Error::misc(format!("expected a non-negative integer, found {v}"))
                .with_pos(e)
        })
    }

    fn slice_bound(&mut self, e: &ast::Expr, len: u32) -> GearcResult<u32> {
        let v = self.const_expr(e)?;
        let i = v.as_int().ok_or_else(|| {
            Error::unsupported("slice bounds must be compile-time integers")
                .with_pos(e)
        })?;
        let i = if i < 0 { i + len as i128 } else { i };
        u32::try_from(i.clamp(0, len as i128))
            .map_err(|_| Error::misc(format!("invalid slice bound {v}")).with_pos(e))
    }

    /// Evaluate a type expression.
    pub(super) fn resolve_type(&mut self, t: &ast::TypeExpr) -> GearcResult<DType> {
        use ast::TypeExpr as T;
        Ok(match t {
            T::Bool => DType::bool(),
            T::Unit => DType::Unit,
            T::Uint(w) => DType::Uint(self.width(w)?),
            T::Int(w) => DType::Int(self.width(w)?),
            T::Tuple(ts) => DType::tuple(
                ts.iter()
                    .map(|t| self.resolve_type(t))
                    .collect::<GearcResult<_>>()?,
            ),
            T::Record(fields) => {
                let mut names = Vec::with_capacity(fields.len());
                let mut types = Vec::with_capacity(fields.len());
                for (name, t) in fields {
                    names.push(*name);
                    types.push(self.resolve_type(t)?);
                }
                DType::Tuple {
                    fields: types,
                    names,
                }
            }
            T::Array(t, n) => {
                DType::Array(Box::new(self.resolve_type(t)?), self.const_u32(n)?)
            }
            T::Queue(t, lvl) => {
                let lvl = match lvl {
                    Some(l) => self.width(l)?,
                    None => 1,
                };
                DType::Queue(Box::new(self.resolve_type(t)?), lvl)
            }
            T::Named(name) => match self.ctx.lookup(*name) {
                Some(ScopeEntry::Const {
                    value: Value::Type(t),
                    ..
                }) => t.clone(),
                _ => return Err(Error::undefined(*name, "type")),
            },
        })
    }

    fn width(&mut self, e: &ast::Expr) -> GearcResult<u32> {
        match self.const_u32(e)? {
            0 => Err(Error::type_mismatch("bit width must be positive").with_pos(e)),
            w => Ok(w),
        }
    }
}

/// Convert a lowered expression into a one-bit condition.
pub(super) fn to_bool(e: Expr) -> GearcResult<Expr> {
    if let Some(b) = e.truthy() {
        return Ok(Expr::bool(b));
    }
    match e.dtype() {
        Some(t) if t.is_bool() => Ok(e),
        Some(t) if t.is_int() => Expr::binary(BinOp::NotEq, e, Expr::int(0)),
        Some(t) => Err(Error::type_mismatch(format!(
            "{e} of type {t} cannot be used as a condition"
        ))),
        None => Ok(e),
    }
}

/// Cast both arms of a conditional to their common type.
pub(super) fn unify(a: Expr, b: Expr) -> GearcResult<(Expr, Expr)> {
    match (a.dtype(), b.dtype()) {
        (Some(ta), Some(tb)) if ta != tb => {
            let t = DType::common(&ta, &tb).ok_or_else(|| {
                Error::type_mismatch(format!(
                    "conditional arms have incompatible types {ta} and {tb}"
                ))
            })?;
            Ok((Expr::cast(a, t.clone())?, Expr::cast(b, t)?))
        }
        _ => Ok((a, b)),
    }
}

fn type_attr(t: &DType, attr: Id) -> GearcResult<Expr> {
    match attr.as_str() {
        "width" => Ok(Expr::int(t.width() as i128)),
        "signed" => Ok(Expr::bool(t.is_signed())),
        _ => match t.len() {
            Some(n) if attr == "len" => Ok(Expr::int(n as i128)),
            _ => Err(Error::undefined(attr, format!("attribute of {t}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::{Context, DType, Expr, Session, TranslateConfig, UnitKind, Value};
    use gearc_frontend::{GearParser, ast};
    use gearc_utils::Id;

    /// Lower the expression of `x = <src>;` with `a: Uint[8]` in scope.
    fn lower(src: &str) -> gearc_utils::GearcResult<Expr> {
        let text = format!("gear g<T = Int[4]>() -> () {{ x = {src}; }}");
        let prog = GearParser::parse_source("expr.gear", text)?;
        let gear = &prog.gears[0];
        let ast::StmtKind::Assign { value, .. } = &gear.body[0].kind else {
            panic!("expected an assignment");
        };
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let mut ctx = Context::new(gear.name, UnitKind::Gear);
        ctx.set_const(Id::new("T"), Value::Type(DType::Int(4)), true);
        ctx.declare(crate::Variable::new(
            Id::new("a"),
            Some(DType::Uint(8)),
            crate::VarKind::Wire,
        ))?;
        let mut lower = super::Lowerer::new(&mut sess, ctx);
        lower.expr(value)
    }

    #[test]
    fn constants_fold() {
        assert_eq!(lower("1 + 2 * 3").unwrap(), Expr::int(7));
        assert_eq!(lower("T.width").unwrap(), Expr::int(4));
        assert_eq!(lower("2 if T.width > 3 else a").unwrap(), Expr::int(2));
        assert_eq!(
            lower("Uint[4](0x1f)").unwrap(),
            Expr::Res(Value::typed(15, DType::Uint(4)))
        );
    }

    #[test]
    fn typed_operations() {
        assert_eq!(lower("a + 1").unwrap().dtype(), Some(DType::Uint(9)));
        assert_eq!(lower("a[0]").unwrap().dtype(), Some(DType::bool()));
        assert_eq!(lower("a[-1]").unwrap().to_string(), "a[7]");
        assert_eq!(lower("a[2:]").unwrap().dtype(), Some(DType::Uint(6)));
        assert_eq!(lower("not a").unwrap().dtype(), Some(DType::bool()));
        let cond = lower("a if a > 3 else T(1)").unwrap();
        assert_eq!(cond.dtype(), Some(DType::Int(9)));
    }

    #[test]
    fn name_errors() {
        let err = lower("b + 1").unwrap_err();
        assert!(matches!(
            err.kind(),
            gearc_utils::ErrorKind::Undefined { .. }
        ));
        assert!(lower("a.data").is_err());
        assert!(lower("Uint[0](a)").is_err());
    }
}
