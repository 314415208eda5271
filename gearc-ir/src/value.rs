//! Compile-time constants and their evaluation.
use crate::DType;
use gearc_frontend::{BinOp, UnOp};
use gearc_utils::{Error, GearcResult};
use itertools::Itertools;
use num_bigint::{BigInt, BigUint};
use num_traits::{Euclid, One, Signed, ToPrimitive, Zero};
use std::fmt;

/// Largest constant shift amount.
const MAX_SHIFT: u32 = 1 << 16;

/// A value known at translation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Value {
    Unit,
    /// An integer of any width. Untyped literals have no `dtype`.
    Int { val: BigInt, dtype: Option<DType> },
    /// Tuples, arrays and queues. Plain source tuples have no `dtype`.
    Aggregate {
        elems: Vec<Value>,
        dtype: Option<DType>,
    },
    Type(DType),
    Str(String),
}

impl Value {
    /// An untyped integer.
    pub fn int(val: impl Into<BigInt>) -> Self {
        Value::Int {
            val: val.into(),
            dtype: None,
        }
    }

    pub fn bool(b: bool) -> Self {
        Value::Int {
            val: BigInt::from(b as u8),
            dtype: Some(DType::bool()),
        }
    }

    /// An integer of type `dtype`, wrapped to its width.
    pub fn typed(val: impl Into<BigInt>, dtype: DType) -> Self {
        Value::Int {
            val: wrap(val.into(), &dtype),
            dtype: Some(dtype),
        }
    }

    pub fn tuple(elems: Vec<Value>) -> Self {
        Value::Aggregate { elems, dtype: None }
    }

    /// The type of this value. Untyped integers get the narrowest type
    /// that holds them.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Value::Unit => Some(DType::Unit),
            Value::Int { dtype: Some(t), .. } => Some(t.clone()),
            Value::Int { val, dtype: None } => Some(min_type(val)),
            Value::Aggregate { dtype: Some(t), .. } => Some(t.clone()),
            Value::Aggregate { elems, dtype: None } => elems
                .iter()
                .map(Value::dtype)
                .collect::<Option<Vec<_>>>()
                .map(DType::tuple),
            Value::Type(_) | Value::Str(_) => None,
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            Value::Int { dtype: None, .. } | Value::Aggregate { dtype: None, .. }
        )
    }

    pub fn as_big(&self) -> Option<&BigInt> {
        match self {
            Value::Int { val, .. } => Some(val),
            _ => None,
        }
    }

    /// The integer, if it fits in an `i128`.
    pub fn as_int(&self) -> Option<i128> {
        self.as_big().and_then(BigInt::to_i128)
    }

    /// A non-negative integer usable as a width, length or index.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_big().and_then(BigInt::to_u32)
    }

    /// Truth value of an integer or `None`.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Int { val, .. } => Some(!val.is_zero()),
            Value::Unit => Some(false),
            _ => None,
        }
    }

    pub fn elems(&self) -> Option<&[Value]> {
        match self {
            Value::Aggregate { elems, .. } => Some(elems),
            _ => None,
        }
    }

    /// The raw bits of a sized value, field 0 in the least significant
    /// position.
    pub fn to_bits(&self) -> Option<BigUint> {
        match self {
            Value::Unit => Some(BigUint::zero()),
            Value::Int { val, dtype } => {
                let w = match dtype {
                    Some(t) => t.width(),
                    None => min_type(val).width(),
                };
                val.rem_euclid(&pow2(w)).to_biguint()
            }
            Value::Aggregate { elems, .. } => {
                let mut bits = BigUint::zero();
                let mut offset = 0;
                for e in elems {
                    let w = e.dtype()?.width();
                    bits |= e.to_bits()? << offset;
                    offset += w;
                }
                Some(bits)
            }
            Value::Type(_) | Value::Str(_) => None,
        }
    }

    /// Reinterpret raw bits as a value of type `dtype`.
    pub fn from_bits(bits: &BigUint, dtype: &DType) -> GearcResult<Value> {
        match dtype {
            DType::Unit => Ok(Value::Unit),
            DType::Uint(w) => Ok(Value::typed(BigInt::from(bits & mask(*w)), dtype.clone())),
            DType::Int(_) | DType::Integer => {
                Ok(Value::typed(BigInt::from(bits.clone()), dtype.clone()))
            }
            _ => {
                let mut elems = vec![];
                let mut offset = 0;
                for i in 0..dtype.len().unwrap_or(0) {
                    let ft = dtype.field(i).ok_or_else(|| {
                        Error::type_mismatch(format!("malformed type {dtype}"))
                    })?;
                    let w = ft.width();
                    elems.push(Value::from_bits(&((bits >> offset) & mask(w)), &ft)?);
                    offset += w;
                }
                Ok(Value::Aggregate {
                    elems,
                    dtype: Some(dtype.clone()),
                })
            }
        }
    }

    /// Explicit conversion. Integers truncate or extend, aggregates
    /// convert field by field, and same-width types reinterpret bits.
    pub fn cast(&self, to: &DType) -> GearcResult<Value> {
        let from = self.dtype();
        if from.as_ref() == Some(to) && !self.is_untyped() {
            return Ok(self.clone());
        }
        let fail = || Error::type_mismatch(format!("cannot cast {self} to {to}"));
        match (self, to) {
            (Value::Int { val, .. }, DType::Uint(_) | DType::Int(_)) => {
                Ok(Value::typed(val.clone(), to.clone()))
            }
            (Value::Int { .. }, DType::Integer) => Ok(self.clone()),
            (Value::Aggregate { elems, .. }, _)
                if to.is_aggregate() && to.len() == Some(elems.len() as u32) =>
            {
                let elems = elems
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        let ft = to.field(i as u32).ok_or_else(fail)?;
                        e.cast(&ft)
                    })
                    .collect::<GearcResult<Vec<_>>>()?;
                Ok(Value::Aggregate {
                    elems,
                    dtype: Some(to.clone()),
                })
            }
            _ => match from {
                Some(f) if f.width() == to.width() && f.width() > 0 => {
                    let bits = self.to_bits().ok_or_else(fail)?;
                    Value::from_bits(&bits, to)
                }
                _ => Err(fail()),
            },
        }
    }

    /// Implicit conversion used for assignments and pushes. Constants
    /// must fit the destination exactly.
    pub fn coerce(&self, to: &DType) -> GearcResult<Value> {
        let from = self.dtype().ok_or_else(|| {
            Error::type_mismatch(format!("{self} is not a value"))
        })?;
        if !self.is_untyped() && !from.can_coerce(to) {
            return Err(Error::type_mismatch(format!(
                "cannot implicitly convert {self} of type {from} to {to}"
            )));
        }
        match self {
            Value::Int { val, .. } if to.is_int() => {
                let res = self.cast(to)?;
                if res.as_big() != Some(val) {
                    return Err(Error::type_mismatch(format!(
                        "value {val} does not fit in {to}"
                    )));
                }
                Ok(res)
            }
            Value::Aggregate { elems, .. }
                if to.is_aggregate() && to.len() == Some(elems.len() as u32) =>
            {
                let elems = elems
                    .iter()
                    .enumerate()
                    .map(|(i, e)| match to.field(i as u32) {
                        Some(ft) => e.coerce(&ft),
                        None => Err(Error::type_mismatch(format!(
                            "cannot convert {self} to {to}"
                        ))),
                    })
                    .collect::<GearcResult<Vec<_>>>()?;
                Ok(Value::Aggregate {
                    elems,
                    dtype: Some(to.clone()),
                })
            }
            Value::Unit if *to == DType::Unit => Ok(Value::Unit),
            _ => Err(Error::type_mismatch(format!(
                "cannot convert {self} to {to}"
            ))),
        }
    }

    /// Field or bit `i`.
    pub fn index(&self, i: i128) -> GearcResult<Value> {
        let out_of_range =
            || Error::misc(format!("index {i} out of range for {self}"));
        match self {
            Value::Aggregate { elems, .. } => usize::try_from(i)
                .ok()
                .and_then(|i| elems.get(i))
                .cloned()
                .ok_or_else(out_of_range),
            Value::Int { val, .. } => {
                let w = self.dtype().map(|t| t.width()).unwrap_or(0);
                let bit = u32::try_from(i).ok().filter(|b| *b < w).ok_or_else(out_of_range)?;
                Ok(Value::typed((val >> bit) & BigInt::one(), DType::bool()))
            }
            _ => Err(Error::type_mismatch(format!("{self} cannot be indexed"))),
        }
    }

    /// Fields or bits `[start:stop]`.
    pub fn slice(&self, start: u32, stop: u32) -> GearcResult<Value> {
        let dtype = self.dtype();
        let st = dtype.as_ref().and_then(|t| t.slice(start, stop)).ok_or_else(|| {
            Error::misc(format!("invalid slice [{start}:{stop}] of {self}"))
        })?;
        match self {
            Value::Aggregate { elems, dtype } => Ok(Value::Aggregate {
                elems: elems[start as usize..stop as usize].to_vec(),
                dtype: dtype.as_ref().map(|_| st),
            }),
            Value::Int { val, .. } => Ok(Value::typed(val >> start, st)),
            _ => Err(Error::type_mismatch(format!("{self} cannot be sliced"))),
        }
    }

    pub fn unary(op: UnOp, v: &Value) -> GearcResult<Value> {
        if op == UnOp::Not {
            let b = v.truthy().ok_or_else(|| {
                Error::type_mismatch(format!("{v} has no truth value"))
            })?;
            return Ok(Value::bool(!b));
        }
        let Value::Int { val, dtype } = v else {
            return Err(Error::type_mismatch(format!(
                "operator `{op}' cannot be applied to {v}"
            )));
        };
        let res = match op {
            UnOp::Neg => -val,
            _ => !val,
        };
        match dtype {
            None => Ok(Value::int(res)),
            Some(t) => Ok(Value::typed(res, DType::unary(op, t)?)),
        }
    }

    pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> GearcResult<Value> {
        match op {
            BinOp::And | BinOp::Or => {
                let (Some(a), Some(b)) = (lhs.truthy(), rhs.truthy()) else {
                    return Err(Error::type_mismatch(format!(
                        "operator `{op}' cannot be applied to {lhs} and {rhs}"
                    )));
                };
                let res = if op == BinOp::And { a && b } else { a || b };
                return Ok(Value::bool(res));
            }
            BinOp::Eq | BinOp::NotEq => {
                let eq = match (lhs.as_big(), rhs.as_big()) {
                    (Some(a), Some(b)) => a == b,
                    _ => match (lhs.to_bits(), rhs.to_bits()) {
                        (Some(a), Some(b)) => a == b,
                        _ => lhs == rhs,
                    },
                };
                return Ok(Value::bool(eq == (op == BinOp::Eq)));
            }
            _ => (),
        }
        let (Value::Int { val: a, .. }, Value::Int { val: b, .. }) = (lhs, rhs)
        else {
            return Err(Error::type_mismatch(format!(
                "operator `{op}' cannot be applied to {lhs} and {rhs}"
            )));
        };
        let untyped = lhs.is_untyped() && rhs.is_untyped();
        let signed = lhs.dtype().is_some_and(|t| t.is_signed())
            || rhs.dtype().is_some_and(|t| t.is_signed());
        let shift = || {
            b.to_u32()
                .filter(|s| *s <= MAX_SHIFT)
                .ok_or_else(|| Error::misc(format!("invalid shift amount {b}")))
        };
        let res = match op {
            BinOp::Lt => return Ok(Value::bool(a < b)),
            BinOp::LtE => return Ok(Value::bool(a <= b)),
            BinOp::Gt => return Ok(Value::bool(a > b)),
            BinOp::GtE => return Ok(Value::bool(a >= b)),
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div | BinOp::Mod if b.is_zero() => {
                return Err(Error::misc("division by zero"));
            }
            BinOp::Div if untyped || !signed => floor_div(a, b),
            BinOp::Div => a / b,
            BinOp::Mod if untyped || !signed => floor_mod(a, b),
            BinOp::Mod => a % b,
            BinOp::Shl => a << shift()?,
            BinOp::Shr => a >> shift()?,
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            BinOp::Eq | BinOp::NotEq | BinOp::And | BinOp::Or => {
                return Err(Error::misc(format!("unexpected operator `{op}'")));
            }
        };
        if untyped {
            return Ok(Value::int(res));
        }
        let (Some(lt), Some(rt)) = (lhs.dtype(), rhs.dtype()) else {
            return Ok(Value::int(res));
        };
        let amount = match op {
            BinOp::Shl | BinOp::Shr => Some(shift()?),
            _ => None,
        };
        let ty = DType::binary(op, &lt, &rt, amount)?;
        Ok(Value::typed(res, ty))
    }
}

/// Narrowest integer type holding `val`.
pub fn min_type(val: &BigInt) -> DType {
    if val.is_negative() {
        let magnitude = -(val + 1u8);
        DType::Int(magnitude.bits() as u32 + 1)
    } else {
        DType::Uint((val.bits() as u32).max(1))
    }
}

fn pow2(w: u32) -> BigInt {
    BigInt::one() << w
}

fn mask(w: u32) -> BigUint {
    (BigUint::one() << w) - 1u8
}

/// Wrap `val` to the range of `dtype`.
fn wrap(val: BigInt, dtype: &DType) -> BigInt {
    match dtype {
        DType::Uint(w) => val.rem_euclid(&pow2(*w)),
        DType::Int(w) if *w > 0 => {
            let v = val.rem_euclid(&pow2(*w));
            if v >= pow2(w - 1) { v - pow2(*w) } else { v }
        }
        _ => val,
    }
}

/// Division rounding toward negative infinity.
fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    if !(a % b).is_zero() && (a.is_negative() != b.is_negative()) {
        q - 1u8
    } else {
        q
    }
}

/// Remainder with the sign of the divisor.
fn floor_mod(a: &BigInt, b: &BigInt) -> BigInt {
    let r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        r + b
    } else {
        r
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "None"),
            Value::Int { val, .. } => write!(f, "{val}"),
            Value::Aggregate { elems, .. } => {
                write!(f, "({})", elems.iter().join(", "))
            }
            Value::Type(t) => write!(f, "{t}"),
            Value::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowest_types() {
        let ty = |v: i64| min_type(&BigInt::from(v));
        assert_eq!(ty(0), DType::Uint(1));
        assert_eq!(ty(255), DType::Uint(8));
        assert_eq!(ty(-1), DType::Int(1));
        assert_eq!(ty(-128), DType::Int(8));
        assert_eq!(ty(-129), DType::Int(9));
    }

    #[test]
    fn typed_arithmetic_wraps() {
        let a = Value::typed(200, DType::Uint(8));
        let b = Value::typed(100, DType::Uint(8));
        let sum = Value::binary(BinOp::Add, &a, &b).unwrap();
        assert_eq!(sum, Value::typed(300, DType::Uint(9)));
        let diff = Value::binary(BinOp::Sub, &b, &a).unwrap();
        assert_eq!(diff, Value::typed(-100, DType::Int(9)));
        assert_eq!(Value::typed(300, DType::Uint(8)).as_int(), Some(44));
        assert_eq!(Value::typed(255, DType::Int(8)).as_int(), Some(-1));
    }

    #[test]
    fn untyped_arithmetic_follows_floor_semantics() {
        let r = Value::binary(BinOp::Div, &Value::int(-7), &Value::int(2)).unwrap();
        assert_eq!(r, Value::int(-4));
        let r = Value::binary(BinOp::Mod, &Value::int(-7), &Value::int(2)).unwrap();
        assert_eq!(r, Value::int(1));
        assert!(Value::binary(BinOp::Div, &Value::int(1), &Value::int(0)).is_err());
    }

    #[test]
    fn comparisons_are_bool() {
        let a = Value::typed(3, DType::Uint(16));
        let r = Value::binary(BinOp::Lt, &a, &Value::int(4)).unwrap();
        assert_eq!(r, Value::bool(true));
        assert_eq!(r.dtype(), Some(DType::bool()));
        let r = Value::unary(UnOp::Not, &a).unwrap();
        assert_eq!(r, Value::bool(false));
    }

    #[test]
    fn casts_and_coercions() {
        let v = Value::typed(-1, DType::Int(4));
        assert_eq!(v.cast(&DType::Uint(4)).unwrap().as_int(), Some(15));
        assert_eq!(v.cast(&DType::Int(8)).unwrap().as_int(), Some(-1));
        assert!(v.coerce(&DType::Uint(8)).is_err());
        assert!(Value::int(300).coerce(&DType::Uint(8)).is_err());
        assert_eq!(
            Value::int(3).coerce(&DType::Uint(8)).unwrap(),
            Value::typed(3, DType::Uint(8))
        );
        let q = DType::Queue(Box::new(DType::Uint(4)), 1);
        let item = Value::tuple(vec![Value::int(5), Value::int(1)]);
        let qv = item.coerce(&q).unwrap();
        assert_eq!(qv.to_bits(), Some(BigUint::from(0b1_0101u8)));
        assert_eq!(Value::from_bits(&BigUint::from(0b1_0101u8), &q).unwrap(), qv);
        assert_eq!(qv.index(1).unwrap().as_int(), Some(1));
    }

    #[test]
    fn wide_constants_are_exact() {
        let zero = Value::int(0).coerce(&DType::Uint(256)).unwrap();
        assert_eq!(zero.dtype(), Some(DType::Uint(256)));

        let top = Value::typed(1, DType::Uint(256));
        let shifted = Value::binary(BinOp::Shl, &top, &Value::int(255)).unwrap();
        assert_eq!(shifted.dtype(), Some(DType::Uint(511)));
        let back = shifted.cast(&DType::Uint(256)).unwrap();
        assert_eq!(back.as_big(), Some(&(BigInt::one() << 255u32)));
        assert_eq!(back.as_int(), None);
        assert_eq!(back.index(255).unwrap(), Value::typed(1, DType::bool()));

        let all = Value::typed(-1, DType::Uint(200));
        assert_eq!(all.to_bits(), Some(mask(200)));
        assert_eq!(all.cast(&DType::Int(200)).unwrap().as_int(), Some(-1));
        let sum = Value::binary(BinOp::Add, &all, &Value::typed(1, DType::Uint(200))).unwrap();
        assert_eq!(sum.dtype(), Some(DType::Uint(201)));
        assert_eq!(sum.as_big(), Some(&pow2(200)));
    }
}
