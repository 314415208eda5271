//! A generic forward dataflow solver over a [Cfg].
use super::cfg::{Cfg, CfgEdge};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Debug;

/// A forward analysis whose facts are joined by union.
pub trait ForwardAnalysis {
    type Fact: Ord + Clone + Debug;

    /// Facts leaving `node` given the facts reaching it.
    fn transfer(
        &self,
        cfg: &Cfg,
        node: NodeIndex,
        input: &BTreeSet<Self::Fact>,
    ) -> BTreeSet<Self::Fact>;

    /// Facts carried along an edge.
    fn edge(&self, _edge: CfgEdge, facts: &BTreeSet<Self::Fact>) -> BTreeSet<Self::Fact> {
        facts.clone()
    }
}

/// Facts at the entry and exit of every node.
#[derive(Debug)]
pub struct Solution<F> {
    pub ins: HashMap<NodeIndex, BTreeSet<F>>,
    pub outs: HashMap<NodeIndex, BTreeSet<F>>,
}

impl<F: Ord + Clone> Solution<F> {
    pub fn input(&self, node: NodeIndex) -> BTreeSet<F> {
        self.ins.get(&node).cloned().unwrap_or_default()
    }
}

/// Iterate `analysis` over `cfg` until no fact changes.
pub fn solve<A: ForwardAnalysis>(cfg: &Cfg, analysis: &A) -> Solution<A::Fact> {
    let mut ins: HashMap<NodeIndex, BTreeSet<A::Fact>> = HashMap::new();
    let mut outs: HashMap<NodeIndex, BTreeSet<A::Fact>> = HashMap::new();
    let mut worklist: VecDeque<NodeIndex> = cfg.nodes().collect();
    let mut iterations = 0;
    while let Some(node) = worklist.pop_front() {
        iterations += 1;
        let input: BTreeSet<A::Fact> = cfg
            .preds(node)
            .flat_map(|(p, edge)| match outs.get(&p) {
                Some(facts) => analysis.edge(edge, facts),
                None => BTreeSet::new(),
            })
            .collect();
        let output = analysis.transfer(cfg, node, &input);
        ins.insert(node, input);
        if outs.get(&node) != Some(&output) {
            outs.insert(node, output);
            for s in cfg.succs(node) {
                if !worklist.contains(&s) {
                    worklist.push_back(s);
                }
            }
        }
    }
    log::trace!(
        "dataflow converged after {iterations} visits of {} nodes",
        cfg.graph.node_count()
    );
    Solution { ins, outs }
}
