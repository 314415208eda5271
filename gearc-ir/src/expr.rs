//! Expressions of the IR.
//!
//! Every composite expression is built through a smart constructor that
//! folds constant operands into a [`Expr::Res`] and applies algebraic
//! identities, so an operator node always has at least one operand that
//! is not known at translation time.
use crate::{DType, Value};
use gearc_frontend::{BinOp, UnOp};
use gearc_utils::{Error, GearcResult, Id};
use itertools::Itertools;
use num_bigint::BigInt;
use std::collections::BTreeSet;
use std::fmt;

/// Handshake signals of an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Signal {
    Data,
    Valid,
    Ready,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Data => write!(f, "data"),
            Signal::Valid => write!(f, "valid"),
            Signal::Ready => write!(f, "ready"),
        }
    }
}

/// Reference to a variable or register.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Name {
    pub name: Id,
    pub dtype: Option<DType>,
}

/// Reference to one signal of an interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Component {
    pub intf: Id,
    pub signal: Signal,
    pub dtype: Option<DType>,
}

impl Component {
    /// The payload of interface `intf` carrying `dtype`.
    pub fn data(intf: Id, dtype: DType) -> Self {
        Component {
            intf,
            signal: Signal::Data,
            dtype: Some(dtype),
        }
    }

    pub fn valid(intf: Id) -> Self {
        Component {
            intf,
            signal: Signal::Valid,
            dtype: Some(DType::bool()),
        }
    }

    pub fn ready(intf: Id) -> Self {
        Component {
            intf,
            signal: Signal::Ready,
            dtype: Some(DType::bool()),
        }
    }
}

/// Call of a translated helper function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct FunctionCall {
    /// Unique name of the translated function.
    pub name: Id,
    pub args: Vec<Expr>,
    pub ret: Option<DType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Expr {
    /// A constant.
    Res(Value),
    Name(Name),
    Component(Component),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then : orelse`
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        dtype: DType,
    },
    Subscript {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    /// Fields or bits `[start:stop]`.
    Slice {
        operand: Box<Expr>,
        start: u32,
        stop: u32,
    },
    /// A tuple built from its fields.
    Concat(Vec<Expr>),
    Call(FunctionCall),
}

impl Expr {
    pub fn bool(b: bool) -> Self {
        Expr::Res(Value::bool(b))
    }

    pub fn int(val: impl Into<BigInt>) -> Self {
        Expr::Res(Value::int(val))
    }

    pub fn name(name: Id, dtype: Option<DType>) -> Self {
        Expr::Name(Name { name, dtype })
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Expr::Res(v) => Some(v),
            _ => None,
        }
    }

    /// Truth value of a constant expression.
    pub fn truthy(&self) -> Option<bool> {
        self.as_value().and_then(Value::truthy)
    }

    pub fn is_true(&self) -> bool {
        self.truthy() == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.truthy() == Some(false)
    }

    /// The type of the expression, `None` while unresolved.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Expr::Res(v) => v.dtype(),
            Expr::Name(n) => n.dtype.clone(),
            Expr::Component(c) => c.dtype.clone(),
            Expr::Unary { op, operand } => {
                DType::unary(*op, &operand.dtype()?).ok()
            }
            Expr::Binary { op, lhs, rhs } => {
                let shift = rhs.as_value().and_then(Value::as_u32);
                DType::binary(*op, &lhs.dtype()?, &rhs.dtype()?, shift).ok()
            }
            Expr::Cond { then, orelse, .. } => match (then.dtype(), orelse.dtype()) {
                (Some(a), Some(b)) => DType::common(&a, &b).or(Some(a)),
                (a, b) => a.or(b),
            },
            Expr::Cast { dtype, .. } => Some(dtype.clone()),
            Expr::Subscript { operand, index } => {
                let t = operand.dtype()?;
                match index.as_value().and_then(Value::as_u32) {
                    Some(i) => t.field(i),
                    None => t.elem(),
                }
            }
            Expr::Slice {
                operand,
                start,
                stop,
            } => operand.dtype()?.slice(*start, *stop),
            Expr::Concat(es) => es
                .iter()
                .map(Expr::dtype)
                .collect::<Option<Vec<_>>>()
                .map(DType::tuple),
            Expr::Call(call) => call.ret.clone(),
        }
    }

    // ============ Smart constructors ============

    pub fn unary(op: UnOp, operand: Expr) -> GearcResult<Expr> {
        if let Expr::Res(v) = &operand {
            return Ok(Expr::Res(Value::unary(op, v)?));
        }
        if op == UnOp::Not {
            return Ok(Expr::not(operand));
        }
        match operand {
            Expr::Unary {
                op: UnOp::Invert,
                operand: inner,
            } if op == UnOp::Invert => Ok(*inner),
            operand => {
                if let Some(t) = operand.dtype() {
                    DType::unary(op, &t)?;
                }
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> GearcResult<Expr> {
        if let (Expr::Res(a), Expr::Res(b)) = (&lhs, &rhs) {
            return Ok(Expr::Res(Value::binary(op, a, b)?));
        }
        match op {
            BinOp::And => return Ok(Expr::and(lhs, rhs)),
            BinOp::Or => return Ok(Expr::or(lhs, rhs)),
            BinOp::Shl | BinOp::Shr
                if rhs.as_value().and_then(Value::as_int) == Some(0) =>
            {
                return Ok(lhs);
            }
            _ => (),
        }
        let shift = rhs.as_value().and_then(Value::as_u32);
        if let (Some(a), Some(b)) = (lhs.dtype(), rhs.dtype()) {
            DType::binary(op, &a, &b, shift)?;
        }
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Boolean conjunction.
    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        match (lhs.truthy(), rhs.truthy()) {
            (Some(false), _) | (_, Some(false)) => Expr::bool(false),
            (Some(true), _) => rhs,
            (_, Some(true)) => lhs,
            _ if lhs == rhs => lhs,
            _ => Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    /// Boolean disjunction.
    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        match (lhs.truthy(), rhs.truthy()) {
            (Some(true), _) | (_, Some(true)) => Expr::bool(true),
            (Some(false), _) => rhs,
            (_, Some(false)) => lhs,
            _ if lhs == rhs => lhs,
            _ => Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    /// Boolean negation.
    pub fn not(operand: Expr) -> Expr {
        if let Some(b) = operand.truthy() {
            return Expr::bool(!b);
        }
        match operand {
            Expr::Unary {
                op: UnOp::Not,
                operand: inner,
            } if inner.dtype().is_none_or(|t| t.is_bool()) => *inner,
            Expr::Binary { op, lhs, rhs } => match op.negated() {
                Some(op) => Expr::Binary { op, lhs, rhs },
                None => Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(Expr::Binary { op, lhs, rhs }),
                },
            },
            operand => Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            },
        }
    }

    /// Conjunction of all `conds`.
    pub fn all<I: IntoIterator<Item = Expr>>(conds: I) -> Expr {
        conds.into_iter().fold(Expr::bool(true), Expr::and)
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> GearcResult<Expr> {
        Expr::binary(BinOp::Eq, lhs, rhs)
    }

    /// `cond ? then : orelse`
    pub fn cond(cond: Expr, then: Expr, orelse: Expr) -> Expr {
        match cond.truthy() {
            Some(true) => then,
            Some(false) => orelse,
            None if then == orelse => then,
            None => Expr::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                orelse: Box::new(orelse),
            },
        }
    }

    /// Explicit conversion to `dtype`.
    pub fn cast(operand: Expr, dtype: DType) -> GearcResult<Expr> {
        if let Expr::Res(v) = &operand {
            return Ok(Expr::Res(v.cast(&dtype)?));
        }
        match operand.dtype() {
            Some(t) if t == dtype => return Ok(operand),
            Some(t) if !t.can_cast(&dtype) => {
                return Err(Error::type_mismatch(format!(
                    "cannot cast {operand} of type {t} to {dtype}"
                )));
            }
            _ => (),
        }
        Expr::convert(operand, dtype, Expr::cast)
    }

    /// Implicit conversion used by assignments and pushes.
    pub fn coerce(operand: Expr, dtype: DType) -> GearcResult<Expr> {
        if let Expr::Res(v) = &operand {
            return Ok(Expr::Res(v.coerce(&dtype)?));
        }
        match operand.dtype() {
            Some(t) if t == dtype => return Ok(operand),
            Some(t) if !t.can_coerce(&dtype) => {
                return Err(Error::type_mismatch(format!(
                    "cannot implicitly convert {operand} of type {t} to {dtype}"
                )));
            }
            _ => (),
        }
        Expr::convert(operand, dtype, Expr::coerce)
    }

    fn convert(
        operand: Expr,
        dtype: DType,
        field_conv: fn(Expr, DType) -> GearcResult<Expr>,
    ) -> GearcResult<Expr> {
        let operand = match operand {
            Expr::Concat(es) if dtype.len() == Some(es.len() as u32) => {
                let fields = es
                    .into_iter()
                    .enumerate()
                    .map(|(i, e)| match dtype.field(i as u32) {
                        Some(ft) => field_conv(e, ft),
                        None => Ok(e),
                    })
                    .collect::<GearcResult<Vec<_>>>()?;
                Expr::Concat(fields)
            }
            operand => operand,
        };
        Ok(Expr::Cast {
            operand: Box::new(operand),
            dtype,
        })
    }

    /// Field or bit selection.
    pub fn subscript(operand: Expr, index: Expr) -> GearcResult<Expr> {
        let dtype = operand.dtype();
        if let Some(i) = index.as_value().and_then(Value::as_int) {
            if let Expr::Res(v) = &operand {
                return Ok(Expr::Res(v.index(i)?));
            }
            let field = u32::try_from(i)
                .ok()
                .and_then(|i| dtype.as_ref().and_then(|t| t.field(i)));
            if field.is_none() && dtype.is_some() {
                return Err(Error::misc(format!(
                    "index {i} out of range for {operand}"
                )));
            }
            match operand {
                Expr::Concat(mut es) if i >= 0 && (i as usize) < es.len() => {
                    return Ok(es.swap_remove(i as usize));
                }
                operand => {
                    return Ok(Expr::Subscript {
                        operand: Box::new(operand),
                        index: Box::new(index),
                    });
                }
            }
        } else if let Some(t) = &dtype {
            if t.elem().is_none() {
                return Err(Error::unsupported(format!(
                    "non-constant index into {operand} of type {t}"
                )));
            }
        }
        Ok(Expr::Subscript {
            operand: Box::new(operand),
            index: Box::new(index),
        })
    }

    /// Access of a named field.
    pub fn field(operand: Expr, name: Id) -> GearcResult<Expr> {
        let idx = operand
            .dtype()
            .and_then(|t| t.field_index(name))
            .ok_or_else(|| {
                Error::undefined(name, format!("field of {operand}"))
            })?;
        Expr::subscript(operand, Expr::int(idx as i128))
    }

    pub fn slice(operand: Expr, start: u32, stop: u32) -> GearcResult<Expr> {
        if let Expr::Res(v) = &operand {
            return Ok(Expr::Res(v.slice(start, stop)?));
        }
        if let Some(t) = operand.dtype() {
            if t.slice(start, stop).is_none() {
                return Err(Error::misc(format!(
                    "invalid slice [{start}:{stop}] of {operand}"
                )));
            }
            if start == 0 && stop == t.len().unwrap_or(t.width()) && t.is_int() {
                return Ok(Expr::Cast {
                    operand: Box::new(operand),
                    dtype: DType::Uint(stop),
                });
            }
        }
        match operand {
            Expr::Concat(es) if start <= stop && stop as usize <= es.len() => {
                Ok(Expr::Concat(es[start as usize..stop as usize].to_vec()))
            }
            operand => Ok(Expr::Slice {
                operand: Box::new(operand),
                start,
                stop,
            }),
        }
    }

    /// A tuple of `fields`.
    pub fn concat(fields: Vec<Expr>) -> Expr {
        if fields.iter().all(|f| matches!(f, Expr::Res(_))) {
            let elems = fields
                .into_iter()
                .filter_map(|f| match f {
                    Expr::Res(v) => Some(v),
                    _ => None,
                })
                .collect();
            return Expr::Res(Value::tuple(elems));
        }
        Expr::Concat(fields)
    }

    // ============ Traversal ============

    /// Visit this expression and all subexpressions in pre-order.
    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Res(_) | Expr::Name(_) | Expr::Component(_) => (),
            Expr::Unary { operand, .. }
            | Expr::Cast { operand, .. }
            | Expr::Slice { operand, .. } => operand.visit(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Cond { cond, then, orelse } => {
                cond.visit(f);
                then.visit(f);
                orelse.visit(f);
            }
            Expr::Subscript { operand, index } => {
                operand.visit(f);
                index.visit(f);
            }
            Expr::Concat(es) => es.iter().for_each(|e| e.visit(f)),
            Expr::Call(call) => call.args.iter().for_each(|e| e.visit(f)),
        }
    }

    /// Names of variables read by this expression.
    pub fn names(&self) -> BTreeSet<Id> {
        let mut names = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Name(n) = e {
                names.insert(n.name);
            }
        });
        names
    }

    /// Interface signals read by this expression.
    pub fn signals(&self) -> BTreeSet<(Id, Signal)> {
        let mut sigs = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Component(c) = e {
                sigs.insert((c.intf, c.signal));
            }
        });
        sigs
    }

    /// Helper functions called by this expression.
    pub fn calls(&self) -> BTreeSet<Id> {
        let mut calls = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Call(c) = e {
                calls.insert(c.name);
            }
        });
        calls
    }

    /// Rebuild the expression bottom-up through the smart constructors.
    /// Where `f` returns a replacement the subexpression is replaced and
    /// not visited further.
    pub fn rewrite<F>(&self, f: &mut F) -> GearcResult<Expr>
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        if let Some(e) = f(self) {
            return Ok(e);
        }
        Ok(match self {
            Expr::Res(_) | Expr::Name(_) | Expr::Component(_) => self.clone(),
            Expr::Unary { op, operand } => Expr::unary(*op, operand.rewrite(f)?)?,
            Expr::Binary { op, lhs, rhs } => {
                Expr::binary(*op, lhs.rewrite(f)?, rhs.rewrite(f)?)?
            }
            Expr::Cond { cond, then, orelse } => Expr::cond(
                cond.rewrite(f)?,
                then.rewrite(f)?,
                orelse.rewrite(f)?,
            ),
            Expr::Cast { operand, dtype } => {
                let operand = operand.rewrite(f)?;
                match &operand {
                    Expr::Res(v) => Expr::Res(v.cast(dtype)?),
                    _ => Expr::Cast {
                        operand: Box::new(operand),
                        dtype: dtype.clone(),
                    },
                }
            }
            Expr::Subscript { operand, index } => {
                Expr::subscript(operand.rewrite(f)?, index.rewrite(f)?)?
            }
            Expr::Slice {
                operand,
                start,
                stop,
            } => Expr::slice(operand.rewrite(f)?, *start, *stop)?,
            Expr::Concat(es) => Expr::concat(
                es.iter().map(|e| e.rewrite(f)).collect::<GearcResult<_>>()?,
            ),
            Expr::Call(call) => Expr::Call(FunctionCall {
                name: call.name,
                args: call
                    .args
                    .iter()
                    .map(|e| e.rewrite(f))
                    .collect::<GearcResult<_>>()?,
                ret: call.ret.clone(),
            }),
        })
    }

    /// Replace variable references through `f`.
    pub fn substitute<F>(&self, f: &mut F) -> GearcResult<Expr>
    where
        F: FnMut(&Name) -> Option<Expr>,
    {
        self.rewrite(&mut |e| match e {
            Expr::Name(n) => f(n),
            _ => None,
        })
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Res(v)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.intf, self.signal)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Res(v) => write!(f, "{v}"),
            Expr::Name(n) => write!(f, "{n}"),
            Expr::Component(c) => write!(f, "{c}"),
            Expr::Unary { op, operand } => write!(f, "{op}{operand}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Cond { cond, then, orelse } => {
                write!(f, "({cond} ? {then} : {orelse})")
            }
            Expr::Cast { operand, dtype } => write!(f, "{dtype}({operand})"),
            Expr::Subscript { operand, index } => write!(f, "{operand}[{index}]"),
            Expr::Slice {
                operand,
                start,
                stop,
            } => write!(f, "{operand}[{start}:{stop}]"),
            Expr::Concat(es) => write!(f, "({})", es.iter().join(", ")),
            Expr::Call(call) => {
                write!(f, "{}({})", call.name, call.args.iter().join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, w: u32) -> Expr {
        Expr::name(Id::new(name), Some(DType::Uint(w)))
    }

    #[test]
    fn constant_operands_fold() {
        let ops = [
            BinOp::Add,
            BinOp::Sub,
            BinOp::Mul,
            BinOp::Div,
            BinOp::Mod,
            BinOp::Shl,
            BinOp::Shr,
            BinOp::BitAnd,
            BinOp::BitOr,
            BinOp::BitXor,
            BinOp::Eq,
            BinOp::NotEq,
            BinOp::Lt,
            BinOp::LtE,
            BinOp::Gt,
            BinOp::GtE,
            BinOp::And,
            BinOp::Or,
        ];
        let a = Expr::Res(Value::typed(12, DType::Uint(8)));
        let b = Expr::Res(Value::typed(3, DType::Uint(4)));
        for op in ops {
            let e = Expr::binary(op, a.clone(), b.clone()).unwrap();
            assert!(matches!(e, Expr::Res(_)), "{op} did not fold: {e}");
        }
        for op in [UnOp::Neg, UnOp::Invert, UnOp::Not] {
            assert!(matches!(Expr::unary(op, a.clone()).unwrap(), Expr::Res(_)));
        }
        let c = Expr::cond(Expr::bool(true), a.clone(), b.clone());
        assert_eq!(c, a);
        let cast = Expr::cast(a.clone(), DType::Uint(2)).unwrap();
        assert_eq!(cast, Expr::Res(Value::typed(0, DType::Uint(2))));
        let tup = Expr::concat(vec![a.clone(), b.clone()]);
        assert_eq!(Expr::subscript(tup, Expr::int(1)).unwrap(), b);
    }

    #[test]
    fn result_types() {
        let e = Expr::binary(BinOp::Add, var("a", 8), var("b", 3)).unwrap();
        assert_eq!(e.dtype(), Some(DType::Uint(9)));
        let e = Expr::binary(BinOp::Gt, var("a", 8), var("b", 3)).unwrap();
        assert_eq!(e.dtype(), Some(DType::bool()));
        let e = Expr::binary(BinOp::Shl, var("a", 8), Expr::int(2)).unwrap();
        assert_eq!(e.dtype(), Some(DType::Uint(10)));
    }

    #[test]
    fn identities() {
        let a = var("a", 8);
        let b = var("b", 8);
        let eq = Expr::binary(BinOp::Eq, a.clone(), b.clone()).unwrap();
        let ne = Expr::unary(UnOp::Not, eq.clone()).unwrap();
        assert!(matches!(ne, Expr::Binary { op: BinOp::NotEq, .. }));
        assert_eq!(Expr::not(ne), eq);

        let p = var("p", 1);
        assert_eq!(Expr::not(Expr::not(p.clone())), p);
        assert_eq!(Expr::and(p.clone(), Expr::bool(true)), p);
        assert!(Expr::and(p.clone(), Expr::bool(false)).is_false());
        assert!(Expr::or(Expr::bool(true), p.clone()).is_true());
        assert_eq!(Expr::cond(p.clone(), a.clone(), a.clone()), a);
        assert_eq!(Expr::binary(BinOp::Shr, a.clone(), Expr::int(0)).unwrap(), a);
        assert_eq!(Expr::cast(a.clone(), DType::Uint(8)).unwrap(), a);
        let inv = Expr::unary(UnOp::Invert, a.clone()).unwrap();
        assert_eq!(Expr::unary(UnOp::Invert, inv).unwrap(), a);
    }

    #[test]
    fn type_errors() {
        let t = Expr::name(
            Id::new("t"),
            Some(DType::tuple(vec![DType::Uint(1), DType::Uint(2)])),
        );
        assert!(Expr::binary(BinOp::Add, t.clone(), var("a", 2)).is_err());
        assert!(Expr::subscript(t.clone(), Expr::int(2)).is_err());
        assert!(Expr::subscript(t.clone(), var("i", 1)).is_err());
        let s = Expr::name(Id::new("s"), Some(DType::Int(4)));
        assert!(Expr::coerce(s, DType::Uint(8)).is_err());
    }

    #[test]
    fn substitution_refolds() {
        let e = Expr::binary(BinOp::Add, var("a", 8), Expr::int(1)).unwrap();
        let e = Expr::binary(BinOp::Lt, e, var("b", 8)).unwrap();
        let folded = e
            .substitute(&mut |n| match n.name.as_str() {
                "a" => Some(Expr::Res(Value::typed(1, DType::Uint(8)))),
                "b" => Some(Expr::Res(Value::typed(9, DType::Uint(8)))),
                _ => None,
            })
            .unwrap();
        assert_eq!(folded, Expr::bool(true));
        assert_eq!(e.names().len(), 2);
    }
}
