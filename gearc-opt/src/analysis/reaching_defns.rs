//! Reaching definitions that know whether they crossed a clock cycle.
use super::cfg::{Cfg, CfgEdge, NodeKind};
use super::dataflow::{ForwardAnalysis, Solution, solve};
use gearc_ir::{DefSet, Stmt, StmtId};
use gearc_utils::Id;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashMap};

/// What separates two clock cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundaries {
    /// Before scheduling: back edges, blocking nodes reached after a
    /// handshake committed, and the point after a hard suspension.
    Handshakes,
    /// After scheduling: back edges only.
    BackEdges,
}

/// Whether a handshake has completed earlier in the current cycle.
struct CommitAnalysis;

impl ForwardAnalysis for CommitAnalysis {
    type Fact = ();

    fn transfer(&self, cfg: &Cfg, node: NodeIndex, input: &BTreeSet<()>) -> BTreeSet<()> {
        let node = cfg.node(node);
        let mut committed = !input.is_empty();
        if node.blocking {
            committed = false;
        }
        if node.clock {
            committed = false;
        } else if node.commits {
            committed = true;
        }
        if committed { BTreeSet::from([()]) } else { BTreeSet::new() }
    }

    fn edge(&self, edge: CfgEdge, facts: &BTreeSet<()>) -> BTreeSet<()> {
        if edge.is_back() { BTreeSet::new() } else { facts.clone() }
    }
}

/// A definition of `name` made by statement `def`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reach {
    pub name: Id,
    pub def: StmtId,
    /// The definition reaches this point only through a cycle boundary.
    pub crossed: bool,
}

fn cross(facts: &BTreeSet<Reach>) -> BTreeSet<Reach> {
    facts
        .iter()
        .map(|f| Reach { crossed: true, ..*f })
        .collect()
}

struct ReachAnalysis {
    /// Nodes that start a new cycle.
    boundaries: BTreeSet<NodeIndex>,
    /// Nodes that end the cycle.
    suspensions: BTreeSet<NodeIndex>,
}

impl ForwardAnalysis for ReachAnalysis {
    type Fact = Reach;

    fn transfer(&self, cfg: &Cfg, idx: NodeIndex, input: &BTreeSet<Reach>) -> BTreeSet<Reach> {
        let node = cfg.node(idx);
        let mut facts = if self.boundaries.contains(&idx) {
            cross(input)
        } else {
            input.clone()
        };
        if let Some(id) = node.stmt_id() {
            for d in node.defs.iter().filter(|d| !d.partial) {
                facts.retain(|f| f.name != d.name);
            }
            for d in &node.defs {
                facts.insert(Reach {
                    name: d.name,
                    def: id,
                    crossed: false,
                });
            }
        }
        if self.suspensions.contains(&idx) {
            facts = cross(&facts);
        }
        facts
    }

    fn edge(&self, edge: CfgEdge, facts: &BTreeSet<Reach>) -> BTreeSet<Reach> {
        if edge.is_back() { cross(facts) } else { facts.clone() }
    }
}

/// Reaching definitions of a gear body.
pub struct ReachingDefinitionAnalysis {
    pub cfg: Cfg,
    reach: Solution<Reach>,
    boundaries: BTreeSet<NodeIndex>,
}

impl ReachingDefinitionAnalysis {
    pub fn new(stmts: &[Stmt], mode: Boundaries) -> Self {
        let cfg = Cfg::gear(stmts);
        let (boundaries, suspensions) = match mode {
            Boundaries::BackEdges => (BTreeSet::new(), BTreeSet::new()),
            Boundaries::Handshakes => {
                let committed = solve(&cfg, &CommitAnalysis);
                let boundaries = cfg
                    .nodes()
                    .filter(|n| cfg.node(*n).blocking && !committed.input(*n).is_empty())
                    .collect();
                let suspensions = cfg.nodes().filter(|n| cfg.node(*n).clock).collect();
                (boundaries, suspensions)
            }
        };
        let analysis = ReachAnalysis {
            boundaries: boundaries.clone(),
            suspensions,
        };
        let reach = solve(&cfg, &analysis);
        ReachingDefinitionAnalysis {
            cfg,
            reach,
            boundaries,
        }
    }

    /// Definitions reaching the point where `node` evaluates.
    fn reaching(&self, node: NodeIndex) -> BTreeSet<Reach> {
        let input = self.reach.input(node);
        if self.boundaries.contains(&node) {
            cross(&input)
        } else {
            input
        }
    }

    /// Nodes at which a new cycle starts, other than through back edges.
    pub fn boundaries(&self) -> impl Iterator<Item = StmtId> + '_ {
        self.boundaries
            .iter()
            .filter_map(|n| self.cfg.node(*n).stmt_id())
    }

    /// Names read at some point where one of their definitions arrives
    /// only from an earlier cycle.
    pub fn crossing_uses(&self) -> BTreeSet<Id> {
        let mut names = BTreeSet::new();
        for idx in self.cfg.nodes() {
            let node = self.cfg.node(idx);
            if node.uses.is_empty() {
                continue;
            }
            let facts = self.reaching(idx);
            for f in &facts {
                let direct = Reach { crossed: false, ..*f };
                if f.crossed && node.uses.contains(&f.name) && !facts.contains(&direct) {
                    log::trace!("{} reaches {node} from an earlier cycle", f.name);
                    names.insert(f.name);
                }
            }
        }
        names
    }

    /// The definitions reaching each statement and block condition.
    pub fn def_sets(&self) -> HashMap<StmtId, DefSet> {
        self.cfg
            .nodes()
            .filter_map(|idx| match self.cfg.node(idx).kind {
                NodeKind::Stmt(id) | NodeKind::Test(id) => {
                    let defs = self.reaching(idx).iter().map(|f| (f.name, f.def)).collect();
                    Some((id, defs))
                }
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearc_ir::{Assign, Await, AwaitKind, Block, BlockKind, Component, DType, Expr, Name, Target};

    fn var(name: &str) -> Expr {
        Expr::name(Id::new(name), Some(DType::Uint(4)))
    }

    fn assign(id: u32, name: &str, value: Expr) -> Stmt {
        Stmt::Assign(Assign {
            id: StmtId(id),
            target: Target::Var(Name {
                name: Id::new(name),
                dtype: Some(DType::Uint(4)),
            }),
            value,
            guard: None,
            pos: Default::default(),
        })
    }

    fn wait(id: u32, kind: AwaitKind) -> Stmt {
        Stmt::Await(Await {
            id: StmtId(id),
            kind,
            in_await: Expr::bool(true),
            exit_await: Expr::bool(true),
            pos: Default::default(),
        })
    }

    fn ack(id: u32, intf: &str) -> Stmt {
        Stmt::Assign(Assign {
            id: StmtId(id),
            target: Target::Signal(Component::ready(Id::new(intf))),
            value: Expr::bool(true),
            guard: None,
            pos: Default::default(),
        })
    }

    #[test]
    fn loop_carried_values_cross() {
        let one = Expr::Res(gearc_ir::Value::typed(1, DType::Uint(4)));
        let body = vec![
            assign(1, "x", one.clone()),
            assign(2, "k", one.clone()),
            Stmt::Block(Block {
                kind: BlockKind::Loop,
                ..Block::cond(
                    StmtId(3),
                    var("c"),
                    vec![
                        assign(4, "y", var("k")),
                        assign(5, "x", Expr::binary(gearc_ir::BinOp::Add, var("x"), one).unwrap()),
                    ],
                )
            }),
        ];
        let rd = ReachingDefinitionAnalysis::new(&body, Boundaries::Handshakes);
        // `k` is recomputed before the loop in every cycle; `x` is carried.
        assert_eq!(rd.crossing_uses(), BTreeSet::from([Id::new("x")]));
        let defs = &rd.def_sets()[&StmtId(5)];
        assert!(defs.contains(&(Id::new("x"), StmtId(1))));
        assert!(defs.contains(&(Id::new("x"), StmtId(5))));
    }

    #[test]
    fn handshakes_split_cycles() {
        let body = vec![
            wait(1, AwaitKind::Pull(Id::new("din"))),
            assign(2, "d", var("din_data")),
            ack(3, "din"),
            wait(4, AwaitKind::Pull(Id::new("b"))),
            assign(5, "y", var("d")),
            ack(6, "b"),
        ];
        let rd = ReachingDefinitionAnalysis::new(&body, Boundaries::Handshakes);
        assert_eq!(rd.boundaries().collect::<Vec<_>>(), vec![StmtId(4)]);
        assert!(rd.crossing_uses().contains(&Id::new("d")));
        let rd = ReachingDefinitionAnalysis::new(&body, Boundaries::BackEdges);
        assert!(rd.crossing_uses().is_empty());
    }

    #[test]
    fn clock_ends_the_cycle() {
        let one = Expr::Res(gearc_ir::Value::typed(1, DType::Uint(4)));
        let body = vec![
            assign(1, "x", one),
            wait(2, AwaitKind::Clock),
            assign(3, "y", var("x")),
        ];
        let rd = ReachingDefinitionAnalysis::new(&body, Boundaries::Handshakes);
        assert_eq!(rd.boundaries().count(), 0);
        assert_eq!(rd.crossing_uses(), BTreeSet::from([Id::new("x")]));
    }
}
