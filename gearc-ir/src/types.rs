//! Bit-accurate data types and their operator rules.
use gearc_frontend::{BinOp, UnOp};
use gearc_utils::{Error, GearcResult, Id};
use itertools::Itertools;
use std::cmp;
use std::fmt;

/// The type of a value carried by a wire, register or interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum DType {
    Unit,
    Uint(u32),
    Int(u32),
    /// An untyped compile-time integer.
    Integer,
    /// Positional tuples have no `names`.
    Tuple { fields: Vec<DType>, names: Vec<Id> },
    Array(Box<DType>, u32),
    /// Data plus an end-of-transaction field `lvl` bits wide.
    Queue(Box<DType>, u32),
}

impl DType {
    pub fn bool() -> Self {
        DType::Uint(1)
    }

    pub fn tuple(fields: Vec<DType>) -> Self {
        DType::Tuple {
            fields,
            names: vec![],
        }
    }

    /// Total number of bits.
    pub fn width(&self) -> u32 {
        match self {
            DType::Unit | DType::Integer => 0,
            DType::Uint(w) | DType::Int(w) => *w,
            DType::Tuple { fields, .. } => fields.iter().map(DType::width).sum(),
            DType::Array(t, n) => t.width() * n,
            DType::Queue(t, lvl) => t.width() + lvl,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, DType::Int(_))
    }

    /// Integers, sized or not.
    pub fn is_int(&self) -> bool {
        matches!(self, DType::Uint(_) | DType::Int(_) | DType::Integer)
    }

    pub fn is_bool(&self) -> bool {
        *self == DType::Uint(1)
    }

    /// Types made of fields: tuples, arrays and queues.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            DType::Tuple { .. } | DType::Array(..) | DType::Queue(..)
        )
    }

    /// Number of fields of an aggregate type.
    pub fn len(&self) -> Option<u32> {
        match self {
            DType::Tuple { fields, .. } => Some(fields.len() as u32),
            DType::Array(_, n) => Some(*n),
            DType::Queue(..) => Some(2),
            _ => None,
        }
    }

    /// Field names. Positional tuples and arrays use `f0`, `f1`, ... and
    /// queues use `data` and `eot`.
    pub fn field_names(&self) -> Vec<Id> {
        match self {
            DType::Tuple { fields, names } if names.is_empty() => {
                (0..fields.len()).map(|i| Id::new(format!("f{i}"))).collect()
            }
            DType::Tuple { names, .. } => names.clone(),
            DType::Array(_, n) => (0..*n).map(|i| Id::new(format!("f{i}"))).collect(),
            DType::Queue(..) => vec![Id::new("data"), Id::new("eot")],
            _ => vec![],
        }
    }

    /// The type of field `i`. Integers index single bits.
    pub fn field(&self, i: u32) -> Option<DType> {
        match self {
            DType::Tuple { fields, .. } => fields.get(i as usize).cloned(),
            DType::Array(t, n) if i < *n => Some((**t).clone()),
            DType::Queue(t, _) if i == 0 => Some((**t).clone()),
            DType::Queue(_, lvl) if i == 1 => Some(DType::Uint(*lvl)),
            DType::Uint(w) | DType::Int(w) if i < *w => Some(DType::bool()),
            _ => None,
        }
    }

    /// The type of element selected by a non-constant index.
    pub fn elem(&self) -> Option<DType> {
        match self {
            DType::Array(t, _) => Some((**t).clone()),
            DType::Uint(_) | DType::Int(_) => Some(DType::bool()),
            _ => None,
        }
    }

    pub fn field_index(&self, name: Id) -> Option<u32> {
        self.field_names()
            .iter()
            .position(|n| *n == name)
            .map(|i| i as u32)
    }

    /// The type of the slice `[start:stop]`.
    pub fn slice(&self, start: u32, stop: u32) -> Option<DType> {
        if start > stop {
            return None;
        }
        match self {
            DType::Uint(w) | DType::Int(w) if stop <= *w => {
                Some(DType::Uint(stop - start))
            }
            DType::Array(t, n) if stop <= *n => {
                Some(DType::Array(t.clone(), stop - start))
            }
            DType::Tuple { fields, names } if stop as usize <= fields.len() => {
                let range = start as usize..stop as usize;
                Some(DType::Tuple {
                    fields: fields[range.clone()].to_vec(),
                    names: if names.is_empty() {
                        vec![]
                    } else {
                        names[range].to_vec()
                    },
                })
            }
            _ => None,
        }
    }

    /// Bit offset of field `i` from the least significant bit.
    pub fn field_offset(&self, i: u32) -> u32 {
        (0..i).filter_map(|j| self.field(j)).map(|t| t.width()).sum()
    }

    /// Smallest integer type that holds both `a` and `b`.
    pub fn common(a: &DType, b: &DType) -> Option<DType> {
        match (a, b) {
            _ if a == b => Some(a.clone()),
            (DType::Integer, t) | (t, DType::Integer) if t.is_int() => {
                Some(t.clone())
            }
            (DType::Uint(w1), DType::Uint(w2)) => {
                Some(DType::Uint(cmp::max(*w1, *w2)))
            }
            (DType::Int(w1), DType::Int(w2)) => {
                Some(DType::Int(cmp::max(*w1, *w2)))
            }
            (DType::Uint(u), DType::Int(s)) | (DType::Int(s), DType::Uint(u)) => {
                Some(DType::Int(cmp::max(*u + 1, *s)))
            }
            (
                DType::Tuple { fields: f1, names },
                DType::Tuple { fields: f2, .. },
            ) if f1.len() == f2.len() => {
                let fields = f1
                    .iter()
                    .zip(f2)
                    .map(|(a, b)| DType::common(a, b))
                    .collect::<Option<Vec<_>>>()?;
                Some(DType::Tuple {
                    fields,
                    names: names.clone(),
                })
            }
            _ => None,
        }
    }

    /// Result type of a unary operator.
    pub fn unary(op: UnOp, t: &DType) -> GearcResult<DType> {
        match (op, t) {
            (UnOp::Not, _) => Ok(DType::bool()),
            (UnOp::Neg, DType::Uint(w) | DType::Int(w)) => Ok(DType::Int(w + 1)),
            (UnOp::Invert, DType::Uint(_) | DType::Int(_)) => Ok(t.clone()),
            (_, DType::Integer) => Ok(DType::Integer),
            _ => Err(Error::type_mismatch(format!(
                "operator `{op}' cannot be applied to {t}"
            ))),
        }
    }

    /// Result type of a binary operator. `shift` is the shift amount
    /// when it is a compile-time constant.
    pub fn binary(
        op: BinOp,
        lhs: &DType,
        rhs: &DType,
        shift: Option<u32>,
    ) -> GearcResult<DType> {
        if op.is_boolean() || matches!(op, BinOp::Eq | BinOp::NotEq) {
            return Ok(DType::bool());
        }
        let mismatch = || {
            Error::type_mismatch(format!(
                "operator `{op}' cannot be applied to {lhs} and {rhs}"
            ))
        };
        let (w1, s1) = int_parts(lhs).ok_or_else(mismatch)?;
        let (w2, s2) = int_parts(rhs).ok_or_else(mismatch)?;
        if op.is_comparison() {
            return Ok(DType::bool());
        }
        if lhs == &DType::Integer && rhs == &DType::Integer {
            return Ok(DType::Integer);
        }
        let signed = s1 || s2;
        let mixed = s1 != s2;
        let mk = |w: u32, signed: bool| {
            if signed { DType::Int(w) } else { DType::Uint(w) }
        };
        let ty = match op {
            BinOp::Add => mk(cmp::max(w1, w2) + 1 + mixed as u32, signed),
            BinOp::Sub => mk(cmp::max(w1, w2) + 1 + mixed as u32, true),
            BinOp::Mul => mk(w1 + w2 + mixed as u32, signed),
            BinOp::Div => mk(w1 + signed as u32, signed),
            BinOp::Mod => mk(w2, signed),
            BinOp::Shl => {
                let grow = shift.unwrap_or_else(|| {
                    cmp::min((1u32 << cmp::min(w2, 16)) - 1, 128)
                });
                mk(w1 + grow, s1)
            }
            BinOp::Shr => {
                let shrink = shift.unwrap_or(0);
                mk(cmp::max(w1.saturating_sub(shrink), 1), s1)
            }
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                mk(cmp::max(w1, w2) + mixed as u32, signed)
            }
            _ => return Err(mismatch()),
        };
        Ok(ty)
    }

    /// Whether an explicit cast from `self` to `to` is allowed.
    /// Integers convert with truncation or extension, aggregates convert
    /// field by field, and anything reinterprets as a same-width type.
    pub fn can_cast(&self, to: &DType) -> bool {
        match (self, to) {
            _ if self == to => true,
            (DType::Integer, _) => to.is_int() || to.width() > 0,
            (f, t) if f.is_int() && t.is_int() => true,
            (DType::Unit, _) | (_, DType::Unit) => false,
            (f, t) if f.is_aggregate() && t.is_aggregate() && f.len() == t.len() => {
                (0..f.len().unwrap_or(0)).all(|i| match (f.field(i), t.field(i)) {
                    (Some(a), Some(b)) => a.can_cast(&b),
                    _ => false,
                })
            }
            (f, t) => f.width() == t.width() && f.width() > 0,
        }
    }

    /// Whether a value of type `self` may be stored where `to` is expected
    /// without an explicit cast. Signed values never silently become
    /// unsigned.
    pub fn can_coerce(&self, to: &DType) -> bool {
        match (self, to) {
            _ if self == to => true,
            (DType::Integer, t) => t.is_int(),
            (DType::Uint(_), DType::Uint(_) | DType::Int(_)) => true,
            (DType::Int(_), DType::Int(_)) => true,
            (f, t) if f.is_aggregate() && t.is_aggregate() && f.len() == t.len() => {
                (0..f.len().unwrap_or(0)).all(|i| match (f.field(i), t.field(i)) {
                    (Some(a), Some(b)) => a.can_coerce(&b),
                    _ => false,
                })
            }
            _ => false,
        }
    }
}

fn int_parts(t: &DType) -> Option<(u32, bool)> {
    match t {
        DType::Uint(w) => Some((*w, false)),
        DType::Int(w) => Some((*w, true)),
        DType::Integer => Some((0, false)),
        _ => None,
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Unit => write!(f, "Unit"),
            DType::Uint(w) => write!(f, "Uint[{w}]"),
            DType::Int(w) => write!(f, "Int[{w}]"),
            DType::Integer => write!(f, "Integer"),
            DType::Tuple { fields, names } if names.is_empty() => {
                write!(f, "Tuple[{}]", fields.iter().join(", "))
            }
            DType::Tuple { fields, names } => write!(
                f,
                "Tuple{{{}}}",
                names
                    .iter()
                    .zip(fields)
                    .map(|(n, t)| format!("{n}: {t}"))
                    .join(", ")
            ),
            DType::Array(t, n) => write!(f, "Array[{t}, {n}]"),
            DType::Queue(t, lvl) => write!(f, "Queue[{t}, {lvl}]"),
        }
    }
}
