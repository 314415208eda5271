use gearc_ir::{
    AwaitKind, Block, BlockKind, Expr, Signal, Stmt, StmtId, Target,
};
use gearc_utils::Id;
use petgraph::{
    Direction::{Incoming, Outgoing},
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Entry,
    Exit,
    Stmt(StmtId),
    /// The condition of a block, an if/else chain or a state switch.
    Test(StmtId),
    /// The point where a block is left.
    Sink(StmtId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CfgEdge {
    Forward,
    /// From the end of a loop body to the loop test.
    LoopBack,
    /// From the end of the gear body to its start.
    BodyBack,
}

impl CfgEdge {
    /// Back edges separate clock cycles.
    pub fn is_back(self) -> bool {
        self != CfgEdge::Forward
    }
}

/// A definition made by a node. Partial definitions write only some bits
/// of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Def {
    pub name: Id,
    pub partial: bool,
}

#[derive(Clone, Debug)]
pub struct CfgNode {
    pub kind: NodeKind,
    /// Variables read by the node.
    pub uses: BTreeSet<Id>,
    pub defs: Vec<Def>,
    /// Execution may have to wait at this node for a handshake or a loop
    /// iteration.
    pub blocking: bool,
    /// Completes a handshake: an input acknowledge or an accepted push.
    pub commits: bool,
    /// A hard suspension that ends the cycle.
    pub clock: bool,
}

impl CfgNode {
    fn new(kind: NodeKind) -> Self {
        CfgNode {
            kind,
            uses: BTreeSet::new(),
            defs: vec![],
            blocking: false,
            commits: false,
            clock: false,
        }
    }

    /// The statement or block the node was built from.
    pub fn stmt_id(&self) -> Option<StmtId> {
        match self.kind {
            NodeKind::Stmt(id) | NodeKind::Test(id) | NodeKind::Sink(id) => Some(id),
            NodeKind::Entry | NodeKind::Exit => None,
        }
    }

    fn read(&mut self, e: &Expr) {
        self.uses.extend(e.names());
    }
}

impl fmt::Display for CfgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Entry => write!(f, "entry"),
            NodeKind::Exit => write!(f, "exit"),
            NodeKind::Stmt(id) => write!(f, "stmt {id}"),
            NodeKind::Test(id) => write!(f, "test {id}"),
            NodeKind::Sink(id) => write!(f, "sink {id}"),
        }
    }
}

fn is_data_write(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Assign(a) if matches!(&a.target, Target::Signal(c) if c.signal == Signal::Data)
    )
}

/// Marks the statements of a list at which execution may have to wait.
/// The data writes preceding a push belong to the push, so a push is
/// marked at its first data write. `await clk()` never waits on a
/// handshake and is not marked.
pub fn blocking_marks(stmts: &[Stmt]) -> Vec<bool> {
    let mut marks = vec![false; stmts.len()];
    let mut group_start: Option<usize> = None;
    for (i, stmt) in stmts.iter().enumerate() {
        match stmt {
            _ if is_data_write(stmt) => {
                group_start.get_or_insert(i);
            }
            Stmt::Await(a) if a.kind == AwaitKind::Clock => group_start = None,
            Stmt::Await(a) => {
                let start = match (&a.kind, group_start) {
                    (AwaitKind::Push(_), Some(s)) => s,
                    _ => i,
                };
                marks[start] = true;
                group_start = None;
            }
            Stmt::Block(b) if b.is_loop() => {
                marks[i] = true;
                group_start = None;
            }
            _ => group_start = None,
        }
    }
    marks
}

/// The control-flow graph of a statement list.
pub struct Cfg {
    pub graph: DiGraph<CfgNode, CfgEdge>,
    pub entry: NodeIndex,
    pub exit: NodeIndex,
    /// Entry node of each block paired with its exit node.
    pub sinks: HashMap<NodeIndex, NodeIndex>,
}

impl Cfg {
    /// The graph of a gear body, which repeats forever.
    pub fn gear(stmts: &[Stmt]) -> Self {
        Cfg::build(stmts, true)
    }

    /// The graph of a body that runs once.
    pub fn func(stmts: &[Stmt]) -> Self {
        Cfg::build(stmts, false)
    }

    fn build(stmts: &[Stmt], repeats: bool) -> Self {
        let mut graph = DiGraph::new();
        let entry = graph.add_node(CfgNode::new(NodeKind::Entry));
        let exit = graph.add_node(CfgNode::new(NodeKind::Exit));
        let mut builder = Builder {
            graph,
            sinks: HashMap::new(),
        };
        let last = builder.stmts(stmts, vec![entry]);
        builder.connect(&last, exit, CfgEdge::Forward);
        if repeats {
            builder.graph.add_edge(exit, entry, CfgEdge::BodyBack);
        }
        Cfg {
            graph: builder.graph,
            entry,
            exit,
            sinks: builder.sinks,
        }
    }

    pub fn node(&self, idx: NodeIndex) -> &CfgNode {
        &self.graph[idx]
    }

    /// Predecessors with the kind of the connecting edge.
    pub fn preds(
        &self,
        idx: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, CfgEdge)> + '_ {
        self.graph
            .edges_directed(idx, Incoming)
            .map(|e| (e.source(), *e.weight()))
    }

    pub fn succs(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Outgoing)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }
}

struct Builder {
    graph: DiGraph<CfgNode, CfgEdge>,
    sinks: HashMap<NodeIndex, NodeIndex>,
}

impl Builder {
    fn connect(&mut self, preds: &[NodeIndex], to: NodeIndex, edge: CfgEdge) {
        for p in preds {
            self.graph.add_edge(*p, to, edge);
        }
    }

    fn add(&mut self, node: CfgNode, preds: &[NodeIndex]) -> NodeIndex {
        let idx = self.graph.add_node(node);
        self.connect(preds, idx, CfgEdge::Forward);
        idx
    }

    /// Add the nodes of `stmts` reached from `preds`. Returns the nodes
    /// that fall through to whatever follows.
    fn stmts(&mut self, stmts: &[Stmt], mut preds: Vec<NodeIndex>) -> Vec<NodeIndex> {
        for (stmt, blocking) in stmts.iter().zip(blocking_marks(stmts)) {
            preds = self.stmt(stmt, blocking, preds);
        }
        preds
    }

    fn stmt(&mut self, stmt: &Stmt, blocking: bool, preds: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let mut node = CfgNode::new(NodeKind::Stmt(stmt.id()));
        node.blocking = blocking;
        match stmt {
            Stmt::Assign(a) => {
                node.read(&a.value);
                a.guard.iter().for_each(|g| node.read(g));
                match &a.target {
                    Target::Var(n) => node.defs.push(Def {
                        name: n.name,
                        partial: false,
                    }),
                    Target::Part(n, idx) => {
                        node.read(idx);
                        node.uses.insert(n.name);
                        node.defs.push(Def {
                            name: n.name,
                            partial: true,
                        });
                    }
                    Target::Signal(c) => node.commits = c.signal == Signal::Ready,
                }
            }
            Stmt::Await(a) => {
                node.read(&a.in_await);
                node.read(&a.exit_await);
                node.defs.extend(a.kind.interfaces().into_iter().map(|name| Def {
                    name,
                    partial: false,
                }));
                node.commits = matches!(a.kind, AwaitKind::Push(_));
                node.clock = a.kind == AwaitKind::Clock;
            }
            Stmt::Assert(a) => node.read(&a.test),
            Stmt::Return(r) => node.read(&r.value),
            Stmt::Block(b) => return self.block(b, blocking, preds),
            Stmt::IfElse(ie) => {
                let mut test = CfgNode::new(NodeKind::Test(ie.id));
                ie.branches.iter().for_each(|b| test.read(&b.in_cond));
                let test = self.add(test, &preds);
                let mut out = vec![];
                for arm in &ie.branches {
                    out.extend(self.stmts(&arm.stmts, vec![test]));
                }
                if ie.branches.last().is_none_or(|b| !b.in_cond.is_true()) {
                    out.push(test);
                }
                return self.sink(ie.id, test, out);
            }
            Stmt::States(sw) => {
                let mut test = CfgNode::new(NodeKind::Test(sw.id));
                test.uses.insert(sw.state_reg);
                let test = self.add(test, &preds);
                let mut out = vec![];
                for br in &sw.branches {
                    out.extend(self.block(&br.body, false, vec![test]));
                }
                return self.sink(sw.id, test, out);
            }
        }
        vec![self.add(node, &preds)]
    }

    fn block(&mut self, b: &Block, blocking: bool, preds: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let mut test = CfgNode::new(NodeKind::Test(b.id));
        test.read(&b.in_cond);
        test.read(&b.exit_cond);
        test.blocking = blocking;
        let test = self.add(test, &preds);
        let body = self.stmts(&b.stmts, vec![test]);
        let out = match b.kind {
            BlockKind::Seq => body,
            BlockKind::Cond => body.into_iter().chain([test]).collect(),
            BlockKind::Loop => {
                self.connect(&body, test, CfgEdge::LoopBack);
                vec![test]
            }
        };
        self.sink(b.id, test, out)
    }

    fn sink(&mut self, id: StmtId, test: NodeIndex, preds: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let sink = self.add(CfgNode::new(NodeKind::Sink(id)), &preds);
        self.sinks.insert(test, sink);
        vec![sink]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearc_ir::{Assign, Await, DType, Name, Value};

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

    fn clock(id: u32) -> Stmt {
        Stmt::Await(Await {
            id: StmtId(id),
            kind: AwaitKind::Clock,
            in_await: Expr::bool(true),
            exit_await: Expr::bool(true),
            pos: Default::default(),
        })
    }

    #[test]
    fn loops_have_back_edges() {
        let x = Expr::name(Id::new("x"), Some(DType::Uint(4)));
        let body = vec![
            assign(1, "x", Expr::Res(Value::typed(0, DType::Uint(4)))),
            Stmt::Block(Block {
                kind: BlockKind::Loop,
                ..Block::cond(StmtId(2), x.clone(), vec![clock(3)])
            }),
            assign(4, "y", x),
        ];
        let cfg = Cfg::gear(&body);
        let back: Vec<_> = cfg
            .graph
            .edge_indices()
            .filter_map(|e| cfg.graph.edge_weight(e).copied())
            .filter(|e| e.is_back())
            .collect();
        assert_eq!(back, vec![CfgEdge::LoopBack, CfgEdge::BodyBack]);
        let test = cfg
            .nodes()
            .find(|n| cfg.node(*n).kind == NodeKind::Test(StmtId(2)))
            .unwrap();
        assert!(cfg.node(test).blocking);
        assert!(cfg.node(test).uses.contains(&Id::new("x")));
        assert!(cfg.sinks.contains_key(&test));
        assert_eq!(blocking_marks(&body), vec![false, true, false]);
    }
}
