//! Helpers for traversing gear bodies
mod action;
mod construct;
mod visitor;

pub use action::{Action, VisResult};
pub use construct::{Named, Pass};
pub use visitor::{Visitable, Visitor, traverse};
