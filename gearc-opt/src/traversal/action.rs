//! Actions control the traversal of statement lists.
use gearc_ir::Stmt;
use gearc_utils::GearcResult;

/// Result of performing a visit.
pub type VisResult = GearcResult<Action>;

/// Action performed at the end of visiting a statement.
pub enum Action {
    /// Continue traversal of the statements.
    Continue,
    /// Skips the traversal of this node's children but continues traversing
    /// the sibling nodes.
    SkipChildren,
    /// Replace the current statement with a list of statements, possibly
    /// empty. The new statements are not visited.
    Change(Vec<Stmt>),
}

impl Action {
    /// Run the traversal specified by `next` if this traversal succeeds.
    /// If the result of this traversal is not `Action::Continue`, do not
    /// run `next()`.
    pub(super) fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Change(_) | Action::SkipChildren => Ok(self),
        }
    }

    /// Remove the current statement.
    pub fn remove() -> Self {
        Action::Change(vec![])
    }

    pub fn change(stmt: Stmt) -> Self {
        Action::Change(vec![stmt])
    }

    /// Changes a Action::SkipChildren to Action::Continue.
    /// Should be called to indicate the boundary of traversing the children
    /// of a node.
    pub(super) fn pop(self) -> Self {
        match self {
            Action::SkipChildren => Action::Continue,
            x => x,
        }
    }
}
