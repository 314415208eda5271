//! Statements and hierarchical blocks.
use crate::{Component, DType, Expr, Name};
use gearc_utils::{GPosIdx, Id, WithPos};

/// Identifies a statement within its translation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct StmtId(pub u32);

impl std::fmt::Display for StmtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Left-hand side of an assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Target {
    Var(Name),
    /// `x[i] = e` writes one field or bit of `x`.
    Part(Name, Expr),
    /// A signal of an interface: `o.data`, `i.ready`.
    Signal(Component),
}

impl Target {
    /// The variable or interface written.
    pub fn name(&self) -> Id {
        match self {
            Target::Var(n) | Target::Part(n, _) => n.name,
            Target::Signal(c) => c.intf,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Target::Part(..))
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Target::Signal(_))
    }

    pub fn dtype(&self) -> Option<DType> {
        match self {
            Target::Var(n) => n.dtype.clone(),
            Target::Part(n, idx) => {
                let t = n.dtype.as_ref()?;
                match idx.as_value().and_then(|v| v.as_u32()) {
                    Some(i) => t.field(i),
                    None => t.elem(),
                }
            }
            Target::Signal(c) => c.dtype.clone(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Var(n) => write!(f, "{n}"),
            Target::Part(n, idx) => write!(f, "{n}[{idx}]"),
            Target::Signal(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Assign {
    pub id: StmtId,
    pub target: Target,
    pub value: Expr,
    /// The assignment only happens when the guard holds.
    pub guard: Option<Expr>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

/// What a suspension point waits for.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum AwaitKind {
    /// Wait for data on an input interface.
    Pull(Id),
    /// Wait for outputs to accept the data driven on them.
    Push(Vec<Id>),
    /// Wait for the next clock edge.
    Clock,
}

impl AwaitKind {
    /// Interfaces whose handshake this suspension point waits on.
    pub fn interfaces(&self) -> Vec<Id> {
        match self {
            AwaitKind::Pull(i) => vec![*i],
            AwaitKind::Push(os) => os.clone(),
            AwaitKind::Clock => vec![],
        }
    }
}

/// A suspension point. Execution proceeds into it when `in_await` holds
/// and past it when `exit_await` holds.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Await {
    pub id: StmtId,
    pub kind: AwaitKind,
    pub in_await: Expr,
    pub exit_await: Expr,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Assert {
    pub id: StmtId,
    pub test: Expr,
    pub msg: String,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Return {
    pub id: StmtId,
    pub value: Expr,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BlockKind {
    /// Runs once, in order.
    Seq,
    /// Runs once when `in_cond` holds.
    Cond,
    /// Repeats while `in_cond` holds.
    Loop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Block {
    pub id: StmtId,
    pub kind: BlockKind,
    /// Condition for entering the block.
    pub in_cond: Expr,
    /// Condition for leaving the block within the current cycle.
    pub exit_cond: Expr,
    pub stmts: Vec<Stmt>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

impl Block {
    pub fn seq(id: StmtId, stmts: Vec<Stmt>) -> Self {
        Block::cond(id, Expr::bool(true), stmts)
    }

    pub fn cond(id: StmtId, in_cond: Expr, stmts: Vec<Stmt>) -> Self {
        let kind = if in_cond.is_true() {
            BlockKind::Seq
        } else {
            BlockKind::Cond
        };
        Block {
            id,
            kind,
            in_cond,
            exit_cond: Expr::bool(true),
            stmts,
            pos: GPosIdx::UNKNOWN,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.kind == BlockKind::Loop
    }
}

/// A chain of guarded arms. The first arm whose `in_cond` holds runs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct IfElse {
    pub id: StmtId,
    pub branches: Vec<Block>,
    pub exit_cond: Expr,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

impl IfElse {
    /// The conditions under which each arm runs, accounting for the
    /// arms before it.
    pub fn arm_conds(&self) -> Vec<Expr> {
        let mut prior = Expr::bool(true);
        let mut conds = vec![];
        for b in &self.branches {
            conds.push(Expr::and(prior.clone(), b.in_cond.clone()));
            prior = Expr::and(prior, Expr::not(b.in_cond.clone()));
        }
        conds
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct StateBranch {
    pub state: u32,
    pub body: Block,
}

/// One arm per cycle-state, selected by the state register.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct StateSwitch {
    pub id: StmtId,
    pub state_reg: Id,
    pub branches: Vec<StateBranch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Stmt {
    Assign(Assign),
    Await(Await),
    Assert(Assert),
    Return(Return),
    Block(Block),
    IfElse(IfElse),
    States(StateSwitch),
}

impl Stmt {
    pub fn id(&self) -> StmtId {
        match self {
            Stmt::Assign(s) => s.id,
            Stmt::Await(s) => s.id,
            Stmt::Assert(s) => s.id,
            Stmt::Return(s) => s.id,
            Stmt::Block(s) => s.id,
            Stmt::IfElse(s) => s.id,
            Stmt::States(s) => s.id,
        }
    }

    /// Expressions evaluated by this statement itself, excluding nested
    /// statements.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Assign(a) => {
                let mut es = vec![&a.value];
                if let Target::Part(_, idx) = &a.target {
                    es.push(idx);
                }
                es.extend(a.guard.iter());
                es
            }
            Stmt::Await(a) => vec![&a.in_await, &a.exit_await],
            Stmt::Assert(a) => vec![&a.test],
            Stmt::Return(r) => vec![&r.value],
            Stmt::Block(b) => vec![&b.in_cond, &b.exit_cond],
            Stmt::IfElse(ie) => {
                let mut es: Vec<&Expr> =
                    ie.branches.iter().map(|b| &b.in_cond).collect();
                es.push(&ie.exit_cond);
                es
            }
            Stmt::States(_) => vec![],
        }
    }

    /// Visit this statement and every nested statement in pre-order.
    pub fn walk<F: FnMut(&Stmt)>(&self, f: &mut F) {
        f(self);
        match self {
            Stmt::Block(b) => b.stmts.iter().for_each(|s| s.walk(f)),
            Stmt::IfElse(ie) => ie
                .branches
                .iter()
                .flat_map(|b| b.stmts.iter())
                .for_each(|s| s.walk(f)),
            Stmt::States(sw) => sw
                .branches
                .iter()
                .flat_map(|b| b.body.stmts.iter())
                .for_each(|s| s.walk(f)),
            _ => (),
        }
    }

    /// Mutable pre-order visit of this statement and its nested statements.
    pub fn walk_mut<F: FnMut(&mut Stmt)>(&mut self, f: &mut F) {
        f(self);
        match self {
            Stmt::Block(b) => b.stmts.iter_mut().for_each(|s| s.walk_mut(f)),
            Stmt::IfElse(ie) => ie
                .branches
                .iter_mut()
                .flat_map(|b| b.stmts.iter_mut())
                .for_each(|s| s.walk_mut(f)),
            Stmt::States(sw) => sw
                .branches
                .iter_mut()
                .flat_map(|b| b.body.stmts.iter_mut())
                .for_each(|s| s.walk_mut(f)),
            _ => (),
        }
    }

    /// Whether this statement or a nested one satisfies `pred`.
    pub fn any<F: Fn(&Stmt) -> bool>(&self, pred: &F) -> bool {
        let mut found = false;
        self.walk(&mut |s| found |= pred(s));
        found
    }
}

impl WithPos for Stmt {
    fn copy_span(&self) -> GPosIdx {
        match self {
            Stmt::Assign(s) => s.pos,
            Stmt::Await(s) => s.pos,
            Stmt::Assert(s) => s.pos,
            Stmt::Return(s) => s.pos,
            Stmt::Block(s) => s.pos,
            Stmt::IfElse(s) => s.pos,
            Stmt::States(_) => GPosIdx::UNKNOWN,
        }
    }
}

/// Visit every statement of `stmts` and their nested statements.
pub fn walk_stmts<F: FnMut(&Stmt)>(stmts: &[Stmt], f: &mut F) {
    stmts.iter().for_each(|s| s.walk(f));
}

/// A translated helper function.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct FuncBlock {
    pub name: Id,
    pub args: Vec<(Id, DType)>,
    pub ret_dtype: DType,
    pub stmts: Vec<Stmt>,
}
