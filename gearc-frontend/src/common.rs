use std::fmt;

/// Direction of a gear port, seen from inside the gear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Direction {
    /// The gear consumes data from the port.
    Input,
    /// The gear produces data on the port.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum UnOp {
    /// Arithmetic negation `-x`
    Neg,
    /// Bitwise inversion `~x`
    Invert,
    /// Boolean negation `not x`
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnOp::Neg => "-",
            UnOp::Invert => "~",
            UnOp::Not => "!",
        };
        write!(f, "{s}")
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    And,
    Or,
}

impl BinOp {
    /// Comparison operators always produce a single bit.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq
                | BinOp::NotEq
                | BinOp::Lt
                | BinOp::LtE
                | BinOp::Gt
                | BinOp::GtE
        )
    }

    /// Boolean connectives.
    pub fn is_boolean(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// Operators whose result type is `Uint[1]`.
    pub fn is_predicate(&self) -> bool {
        self.is_comparison() || self.is_boolean()
    }

    /// The comparison with swapped outcome, used to push negation
    /// through (in)equalities.
    pub fn negated(&self) -> Option<BinOp> {
        match self {
            BinOp::Eq => Some(BinOp::NotEq),
            BinOp::NotEq => Some(BinOp::Eq),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtE => "<=",
            BinOp::Gt => ">",
            BinOp::GtE => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{s}")
    }
}
