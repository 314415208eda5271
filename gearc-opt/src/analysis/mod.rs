//! Analyses over gear bodies.
//!
//! The analyses build a control-flow graph of a statement list and answer
//! questions about it: which definitions reach a statement and whether
//! they were made in an earlier clock cycle.

pub mod cfg;
mod dataflow;
pub mod reaching_defns;

pub use cfg::{Cfg, CfgEdge, CfgNode, NodeKind, blocking_marks};
pub use dataflow::{ForwardAnalysis, Solution, solve};
pub use reaching_defns::{Boundaries, Reach, ReachingDefinitionAnalysis};
