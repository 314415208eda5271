//! Abstract Syntax Tree for gear programs
use crate::{BinOp, UnOp};
use gearc_utils::{GPosIdx, Id, WithPos};
use num_bigint::BigInt;

/// A parsed source file: gear definitions and helper functions, in source
/// order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub gears: Vec<GearDef>,
    pub funcs: Vec<FuncDef>,
}

impl Program {
    pub fn find_gear(&self, name: Id) -> Option<&GearDef> {
        self.gears.iter().find(|g| g.name == name)
    }

    pub fn find_func(&self, name: Id) -> Option<&FuncDef> {
        self.funcs.iter().find(|f| f.name == name)
    }

    /// Merge the definitions of another file into this program.
    pub fn extend(&mut self, other: Program) {
        self.gears.extend(other.gears);
        self.funcs.extend(other.funcs);
    }
}

/// A hardware module description.
///
/// ```text
/// gear accum<W = 16>(din: Uint[8]) -> (dout: Uint[W]) { ... }
/// ```
#[derive(Debug, Clone)]
pub struct GearDef {
    pub name: Id,
    /// Compile-time parameters with their default values.
    pub params: Vec<ParamDef>,
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
    pub body: Vec<Stmt>,
    pub span: GPosIdx,
}

#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: Id,
    pub value: ParamValue,
}

/// Parameters are either expressions or types.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Expr(Expr),
    Type(TypeExpr),
}

#[derive(Debug, Clone)]
pub struct PortDef {
    pub name: Id,
    pub ty: TypeExpr,
    pub span: GPosIdx,
}

/// A plain helper function. Helper functions are combinational: they may
/// not suspend.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: Id,
    pub args: Vec<ArgDef>,
    pub ret: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    /// The function's source text, part of its memoization key.
    pub source: String,
    pub span: GPosIdx,
}

#[derive(Debug, Clone)]
pub struct ArgDef {
    pub name: Id,
    pub ty: Option<TypeExpr>,
}

/// Type expressions. Widths and lengths are expressions evaluated at
/// translation time.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Bool,
    Unit,
    Uint(Box<Expr>),
    Int(Box<Expr>),
    Tuple(Vec<TypeExpr>),
    Record(Vec<(Id, TypeExpr)>),
    Array(Box<TypeExpr>, Box<Expr>),
    Queue(Box<TypeExpr>, Option<Box<Expr>>),
    /// A type-valued parameter, `T`.
    Named(Id),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: GPosIdx,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: GPosIdx) -> Self {
        Self { kind, span }
    }
}

impl WithPos for Stmt {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `a = e;`, `a, b = e;`
    Assign { target: Target, value: Expr },
    /// `x: T = e;` or a declaration `x: T;`
    AnnAssign {
        target: Id,
        ty: TypeExpr,
        value: Option<Expr>,
    },
    /// `x += e;`
    AugAssign { target: Target, op: BinOp, value: Expr },
    /// `if c { } elif d { } else { }`
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Option<Vec<Stmt>>,
    },
    While { test: Expr, body: Vec<Stmt> },
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `async with din as d, cfg as c { }`
    AsyncWith {
        items: Vec<(Expr, Target)>,
        body: Vec<Stmt>,
    },
    /// `async for d in din { }`
    AsyncFor {
        target: Target,
        intf: Expr,
        body: Vec<Stmt>,
    },
    Yield(Expr),
    Await(Expr),
    Assert { test: Expr, msg: Option<String> },
    Return(Option<Expr>),
    Expr(Expr),
    Pass,
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone)]
pub enum Target {
    Name(Id, GPosIdx),
    /// `x[i] = e`
    Subscript(Id, Box<Expr>, GPosIdx),
    /// `a, b = e`
    Tuple(Vec<Target>),
}

impl Target {
    /// All plain names bound by this target.
    pub fn names(&self) -> Vec<Id> {
        match self {
            Target::Name(n, _) | Target::Subscript(n, _, _) => vec![*n],
            Target::Tuple(ts) => ts.iter().flat_map(|t| t.names()).collect(),
        }
    }
}

impl WithPos for Target {
    fn copy_span(&self) -> GPosIdx {
        match self {
            Target::Name(_, span) | Target::Subscript(_, _, span) => *span,
            Target::Tuple(ts) => ts
                .iter()
                .fold(GPosIdx::UNKNOWN, |acc, t| acc.merge(t.copy_span())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: GPosIdx,
}

impl Expr {
    pub fn new(kind: ExprKind, span: GPosIdx) -> Self {
        Self { kind, span }
    }
}

impl WithPos for Expr {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Num(BigInt),
    Bool(bool),
    None,
    Str(String),
    Name(Id),
    Tuple(Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `body if test else orelse`
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Subscript(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>),
    Attribute(Box<Expr>, Id),
    Call {
        func: Id,
        args: Vec<Expr>,
        kwargs: Vec<(Id, Expr)>,
    },
    /// `Uint[8](e)`
    Cast(TypeExpr, Box<Expr>),
}
