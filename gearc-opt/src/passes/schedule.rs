use crate::Unit;
use crate::analysis::blocking_marks;
use crate::traversal::{Named, Pass};
use gearc_ir::{
    Assign, AwaitKind, Block, BlockKind, Context, DType, Expr, IfElse, Name,
    Signal, StateBranch, StateSwitch, Stmt, StmtId, Target, Value, VarKind,
    Variable,
};
use gearc_utils::{Error, GPosIdx, GearcResult, Id, WithPos, bits_needed_for};
use std::collections::{BTreeSet, HashMap};

/// Result of splitting a gear body into cycle-states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScheduleOutcome {
    Scheduled { states: u32 },
    /// The statement would belong to more than two states at once.
    Ambiguous(StmtId),
}

type Tags = BTreeSet<u32>;

/// Scheduling state at a program point.
#[derive(Clone, Debug)]
struct Flow {
    /// States the point may execute in.
    cur: Tags,
    /// A handshake completed earlier in the cycle.
    committed: bool,
}

impl Flow {
    fn state(state: u32) -> Self {
        Flow {
            cur: Tags::from([state]),
            committed: false,
        }
    }

    fn merge(mut self, other: Flow) -> Flow {
        self.cur.extend(other.cur);
        self.committed |= other.committed;
        self
    }
}

/// The states of every statement of a body.
#[derive(Default, Debug)]
struct StateMap {
    tags: HashMap<StmtId, Tags>,
    /// Statements at which a state begins.
    starts: HashMap<StmtId, u32>,
    /// `await clk()` statements with the state that follows them.
    clocks: HashMap<StmtId, u32>,
    /// Loops whose body leaves their first state, with that state.
    heads: HashMap<StmtId, u32>,
    states: u32,
    ambiguous: Option<StmtId>,
}

impl StateMap {
    fn build(stmts: &[Stmt]) -> Self {
        let mut sched = StateMap::default();
        let entry = sched.new_state();
        sched.stmts(stmts, Flow::state(entry));
        sched
    }

    fn outcome(&self) -> ScheduleOutcome {
        match self.ambiguous {
            Some(id) => ScheduleOutcome::Ambiguous(id),
            None => ScheduleOutcome::Scheduled {
                states: self.states,
            },
        }
    }

    fn new_state(&mut self) -> u32 {
        self.states += 1;
        self.states - 1
    }

    fn tag(&mut self, id: StmtId, flow: &Flow) {
        if flow.cur.len() > 2 {
            self.ambiguous.get_or_insert(id);
        }
        self.tags.insert(id, flow.cur.clone());
    }

    fn stmts(&mut self, stmts: &[Stmt], mut flow: Flow) -> Flow {
        for (stmt, blocking) in stmts.iter().zip(blocking_marks(stmts)) {
            if blocking && flow.committed {
                let state = self.new_state();
                self.starts.insert(stmt.id(), state);
                flow = Flow::state(state);
            }
            flow = self.stmt(stmt, flow);
        }
        flow
    }

    fn stmt(&mut self, stmt: &Stmt, mut flow: Flow) -> Flow {
        self.tag(stmt.id(), &flow);
        match stmt {
            Stmt::Assign(a) => {
                if matches!(&a.target, Target::Signal(c) if c.signal == Signal::Ready) {
                    flow.committed = true;
                }
                flow
            }
            Stmt::Await(a) => match a.kind {
                AwaitKind::Pull(_) => flow,
                AwaitKind::Push(_) => Flow {
                    committed: true,
                    ..flow
                },
                AwaitKind::Clock => {
                    let state = self.new_state();
                    self.clocks.insert(a.id, state);
                    Flow::state(state)
                }
            },
            Stmt::Assert(_) | Stmt::Return(_) | Stmt::States(_) => flow,
            Stmt::Block(b) if b.is_loop() => {
                let body = self.stmts(
                    &b.stmts,
                    Flow {
                        cur: flow.cur.clone(),
                        committed: false,
                    },
                );
                if body.cur != flow.cur {
                    match flow.cur.first() {
                        Some(head) if flow.cur.len() == 1 => {
                            self.heads.insert(b.id, *head);
                        }
                        _ => {
                            self.ambiguous.get_or_insert(b.id);
                        }
                    }
                }
                Flow {
                    cur: flow.cur,
                    committed: false,
                }
            }
            Stmt::Block(b) => {
                let body = self.stmts(&b.stmts, flow.clone());
                if b.in_cond.is_true() {
                    body
                } else {
                    body.merge(flow)
                }
            }
            Stmt::IfElse(ie) => {
                let exhaustive = ie.branches.last().is_some_and(|b| b.in_cond.is_true());
                let mut out = if exhaustive { None } else { Some(flow.clone()) };
                for arm in &ie.branches {
                    self.tag(arm.id, &flow);
                    let res = self.stmts(&arm.stmts, flow.clone());
                    out = Some(match out {
                        Some(o) => o.merge(res),
                        None => res,
                    });
                }
                out.unwrap_or(flow)
            }
        }
    }
}

/// Extracts the statements of one state from the tagged body.
struct Isolate<'a> {
    sched: &'a StateMap,
    state: u32,
    state_reg: Name,
    cycle_done: Id,
    ctx: &'a mut Context,
}

impl Isolate<'_> {
    /// Continue in state `next` on the following cycle.
    fn goto(&mut self, next: u32) -> Stmt {
        let dtype = self.state_reg.dtype.clone().unwrap_or(DType::bool());
        Stmt::Assign(Assign {
            id: self.ctx.fresh_id(),
            target: Target::Var(self.state_reg.clone()),
            value: Expr::Res(Value::typed(next, dtype)),
            guard: None,
            pos: GPosIdx::UNKNOWN,
        })
    }

    /// End the cycle here and continue in state `next`.
    fn leave(&mut self, out: &mut Vec<Stmt>, next: u32) {
        out.push(self.goto(next));
        out.push(flag(self.ctx, self.cycle_done, true));
    }

    fn runs_in(&self, id: StmtId) -> bool {
        self.sched
            .tags
            .get(&id)
            .is_some_and(|t| t.contains(&self.state))
    }

    fn begins_at(&self, stmt: &Stmt) -> bool {
        let id = stmt.id();
        self.sched.starts.get(&id) == Some(&self.state)
            || self.sched.clocks.get(&id) == Some(&self.state)
    }

    fn begins_in(&self, stmt: &Stmt) -> bool {
        stmt.any(&|s| self.begins_at(s))
    }

    /// The statements of `stmts` executed in this state when the list is
    /// entered from its start. The flag is set when every path through
    /// the list leaves the state.
    fn run(&mut self, stmts: &[Stmt]) -> (Vec<Stmt>, bool) {
        let mut out = vec![];
        for stmt in stmts {
            if let Some(next) = self.sched.starts.get(&stmt.id()).copied() {
                if next != self.state {
                    self.leave(&mut out, next);
                    return (out, true);
                }
            }
            if !self.runs_in(stmt.id()) {
                log::trace!("{} is not part of state {}", stmt.id(), self.state);
                continue;
            }
            match stmt {
                Stmt::Await(a) if a.kind == AwaitKind::Clock => {
                    let next = self.sched.clocks.get(&a.id).copied().unwrap_or(0);
                    self.leave(&mut out, next);
                    return (out, true);
                }
                Stmt::Block(b) => {
                    let (stmts, stopped) = self.run(&b.stmts);
                    out.push(Stmt::Block(Block {
                        id: b.id,
                        kind: b.kind,
                        in_cond: b.in_cond.clone(),
                        exit_cond: if stopped {
                            Expr::bool(false)
                        } else {
                            b.exit_cond.clone()
                        },
                        stmts,
                        pos: b.pos,
                    }));
                    if stopped && b.in_cond.is_true() {
                        return (out, true);
                    }
                }
                Stmt::IfElse(ie) => {
                    let mut all_stopped = true;
                    let mut branches = vec![];
                    for arm in &ie.branches {
                        let (stmts, stopped) = self.run(&arm.stmts);
                        all_stopped &= stopped;
                        branches.push(Block {
                            id: arm.id,
                            kind: arm.kind,
                            in_cond: arm.in_cond.clone(),
                            exit_cond: if stopped {
                                Expr::bool(false)
                            } else {
                                arm.exit_cond.clone()
                            },
                            stmts,
                            pos: arm.pos,
                        });
                    }
                    let exhaustive =
                        ie.branches.last().is_some_and(|b| b.in_cond.is_true());
                    out.push(Stmt::IfElse(IfElse {
                        id: ie.id,
                        branches,
                        exit_cond: ie.exit_cond.clone(),
                        pos: ie.pos,
                    }));
                    if all_stopped && exhaustive {
                        return (out, true);
                    }
                }
                stmt => out.push(stmt.clone()),
            }
        }
        (out, false)
    }

    /// The statements of `stmts` executed in this state when the state
    /// begins somewhere inside the list.
    fn seek(&mut self, stmts: &[Stmt]) -> (Vec<Stmt>, bool) {
        for (i, stmt) in stmts.iter().enumerate() {
            if self.sched.clocks.get(&stmt.id()) == Some(&self.state) {
                return self.run(&stmts[i + 1..]);
            }
            if self.begins_at(stmt) {
                return self.run(&stmts[i..]);
            }
            if self.begins_in(stmt) {
                let (mut out, stopped) = self.resume(stmt);
                if stopped {
                    return (out, true);
                }
                let (rest, stopped) = self.run(&stmts[i + 1..]);
                out.extend(rest);
                return (out, stopped);
            }
        }
        (vec![], false)
    }

    /// Enter a compound statement in the middle, where this state begins.
    fn resume(&mut self, stmt: &Stmt) -> (Vec<Stmt>, bool) {
        let (id, pos, exit_cond, (mut stmts, mut stopped)) = match stmt {
            Stmt::Block(b) => (b.id, b.pos, b.exit_cond.clone(), self.seek(&b.stmts)),
            Stmt::IfElse(ie) => {
                let Some(arm) = ie
                    .branches
                    .iter()
                    .find(|arm| arm.stmts.iter().any(|s| self.begins_in(s)))
                else {
                    return (vec![], false);
                };
                (arm.id, arm.pos, arm.exit_cond.clone(), self.seek(&arm.stmts))
            }
            _ => return (vec![], false),
        };
        // The rest of a loop body runs once, then the loop is tested again
        // in its first state.
        if let Some(head) = self.sched.heads.get(&id).copied() {
            if !stopped {
                stmts.push(self.goto(head));
                stopped = true;
            }
        }
        let block = Block {
            exit_cond: if stopped { Expr::bool(false) } else { exit_cond },
            pos,
            ..Block::seq(id, stmts)
        };
        (vec![Stmt::Block(block)], stopped)
    }
}

/// Splits a gear body into cycle-states.
///
/// A new state begins at a wait reached after a handshake completed in
/// the current cycle and after every `await clk()`. With more than one
/// state the body becomes a [StateSwitch] on a generated `_state`
/// register; each branch ends by loading the state that runs next.
/// `_rst_cond` is set where the body completes. `_cycle_done` is set
/// wherever the current cycle's work completes: at the end of the body, at
/// the end of each loop iteration and where a state hands over to the next.
#[derive(Default)]
pub struct Schedule;

impl Named for Schedule {
    fn name() -> &'static str {
        "schedule"
    }

    fn description() -> &'static str {
        "split the gear body into cycle-states"
    }
}

fn flag(ctx: &mut Context, name: Id, value: bool) -> Stmt {
    Stmt::Assign(Assign {
        id: ctx.fresh_id(),
        target: Target::Var(Name {
            name,
            dtype: Some(DType::bool()),
        }),
        value: Expr::bool(value),
        guard: None,
        pos: GPosIdx::UNKNOWN,
    })
}

/// Append `done = true` to the body of every loop in `stmts`.
fn mark_iterations(stmts: &mut [Stmt], ctx: &mut Context, done: Id) {
    for stmt in stmts {
        match stmt {
            Stmt::Block(b) => {
                mark_iterations(&mut b.stmts, ctx, done);
                if b.kind == BlockKind::Loop {
                    b.stmts.push(flag(ctx, done, true));
                }
            }
            Stmt::IfElse(ie) => {
                for arm in &mut ie.branches {
                    mark_iterations(&mut arm.stmts, ctx, done);
                }
            }
            _ => {}
        }
    }
}

impl Pass for Schedule {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()> {
        if !unit.is_gear() {
            return Ok(());
        }
        let ctx = &mut unit.ctx;
        let rst = ctx.gen_name("_rst_cond");
        ctx.declare(Variable::new(rst, Some(DType::bool()), VarKind::Wire))?;
        ctx.rst_cond = Some(rst);
        let done = ctx.gen_name("_cycle_done");
        ctx.declare(Variable::new(done, Some(DType::bool()), VarKind::Wire))?;
        ctx.cycle_done = Some(done);
        let mut body = std::mem::take(&mut unit.body.stmts);
        mark_iterations(&mut body, ctx, done);
        body.push(flag(ctx, rst, true));
        body.push(flag(ctx, done, true));

        let sched = StateMap::build(&body);
        let states = match sched.outcome() {
            ScheduleOutcome::Scheduled { states } => states,
            ScheduleOutcome::Ambiguous(id) => {
                let mut pos = GPosIdx::UNKNOWN;
                gearc_ir::walk_stmts(&body, &mut |s| {
                    if s.id() == id {
                        pos = s.copy_span();
                    }
                });
                return Err(Error::ambiguous_schedule(format!(
                    "gear `{}': statement would run in more than two states at once",
                    ctx.name
                ))
                .with_pos(&pos));
            }
        };
        log::debug!("{}: {states} state(s)", ctx.name);
        unit.states = states;

        let mut stmts = vec![flag(ctx, rst, false), flag(ctx, done, false)];
        if states == 1 {
            stmts.extend(body);
            unit.body.stmts = stmts;
            return Ok(());
        }

        let dtype = DType::Uint(bits_needed_for(states as u64) as u32);
        let state_reg = ctx.gen_name("_state");
        let mut var = Variable::new(state_reg, Some(dtype.clone()), VarKind::Register);
        var.reset = Some(Value::typed(0, dtype.clone()));
        ctx.declare(var)?;
        ctx.state_reg = Some(state_reg);
        let reg = Name {
            name: state_reg,
            dtype: Some(dtype.clone()),
        };

        let mut branches = vec![];
        for state in 0..states {
            let mut iso = Isolate {
                sched: &sched,
                state,
                state_reg: reg.clone(),
                cycle_done: done,
                ctx: &mut *ctx,
            };
            let (mut stmts, stopped) = if state == 0 {
                iso.run(&body)
            } else {
                iso.seek(&body)
            };
            if state != 0 && !stopped {
                stmts.push(iso.goto(0));
            }
            let test = Expr::eq(
                Expr::Name(reg.clone()),
                Expr::Res(Value::typed(state, dtype.clone())),
            )?;
            let id = ctx.fresh_id();
            branches.push(StateBranch {
                state,
                body: Block {
                    kind: BlockKind::Cond,
                    ..Block::cond(id, test, stmts)
                },
            });
        }
        stmts.push(Stmt::States(StateSwitch {
            id: ctx.fresh_id(),
            state_reg,
            branches,
        }));
        unit.body.stmts = stmts;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::InferRegisters;
    use gearc_frontend::GearParser;
    use gearc_ir::{Printer, Session, TranslateConfig, from_ast::lower_gear};

    fn schedule(src: &str) -> GearcResult<Unit> {
        let prog = GearParser::parse_source("sched.gear", src.to_string())?;
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let (ctx, body) = lower_gear(&mut sess, &prog.gears[0], &[])?;
        let mut unit = Unit::new(ctx, body);
        InferRegisters::do_pass_default(&mut unit)?;
        Schedule::do_pass_default(&mut unit)?;
        Ok(unit)
    }

    fn switch(unit: &Unit) -> &StateSwitch {
        unit.body
            .stmts
            .iter()
            .find_map(|s| match s {
                Stmt::States(sw) => Some(sw),
                _ => None,
            })
            .expect("state switch")
    }

    #[test]
    fn single_state_is_flat() {
        let unit = schedule(
            "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
               async with din as d { yield d; }\n\
             }",
        )
        .unwrap();
        assert_eq!(unit.states, 1);
        assert!(unit.ctx.state_reg.is_none());
        assert!(!unit.body.stmts.iter().any(|s| matches!(s, Stmt::States(_))));
        let text = Printer::stmts_to_str(&unit.body.stmts);
        assert!(text.starts_with("_rst_cond = 0"), "{text}");
    }

    #[test]
    fn handshake_after_commit_starts_a_state() {
        let unit = schedule(
            "gear g(a: Uint[4], b: Uint[4]) -> (dout: Uint[4]) {\n\
               async with a as x { y: Uint[4] = x; }\n\
               async with b as z { yield y; }\n\
             }",
        )
        .unwrap();
        assert_eq!(unit.states, 2);
        let reg = unit.ctx.state_reg.unwrap();
        let var = unit.ctx.variable(reg).unwrap();
        assert_eq!(var.dtype, Some(DType::Uint(1)));
        assert!(var.is_reg());
        let sw = switch(&unit);
        assert_eq!(sw.branches.len(), 2);
        assert_eq!(sw.branches[1].body.in_cond.to_string(), "(_state == 1)");

        let first = Printer::stmts_to_str(&sw.branches[0].body.stmts);
        let second = Printer::stmts_to_str(&sw.branches[1].body.stmts);
        assert!(first.contains("_state = 1"), "{first}");
        assert!(first.contains("_cycle_done = 1"), "{first}");
        assert!(!first.contains("dout"), "{first}");
        assert!(second.contains("dout.data = y"), "{second}");
        assert!(second.contains("_rst_cond = 1"), "{second}");
        assert!(second.contains("_state = 0"), "{second}");
        assert!(!second.contains("a.ready"), "{second}");
    }

    #[test]
    fn clock_waits_split_states() {
        let unit = schedule(
            "gear g(din: Uint[4]) -> (dout: Uint[4]) {\n\
               async with din as d { yield d; await clk(); yield d; }\n\
             }",
        )
        .unwrap();
        assert_eq!(unit.states, 2);
        let sw = switch(&unit);
        let second = Printer::stmts_to_str(&sw.branches[1].body.stmts);
        assert!(second.contains("din.ready = 1"), "{second}");
    }

    #[test]
    fn loops_stay_in_their_state() {
        let unit = schedule(
            "gear g(din: Queue[Uint[8]]) -> (dout: Uint[16]) {\n\
               s: Uint[16] = 0;\n\
               async for d in din { s = s + d; }\n\
               yield s;\n\
             }",
        )
        .unwrap();
        assert_eq!(unit.states, 1);
        let done = unit.ctx.cycle_done.unwrap();
        let mut loops = 0;
        gearc_ir::walk_stmts(&unit.body.stmts, &mut |s| {
            if let Stmt::Block(b) = s {
                if b.is_loop() {
                    loops += 1;
                    assert!(matches!(
                        b.stmts.last(),
                        Some(Stmt::Assign(a)) if a.target.name() == done
                    ));
                }
            }
        });
        assert_eq!(loops, 1);
    }

    #[test]
    fn statements_in_three_states_are_rejected() {
        let err = schedule(
            "gear g(din: Uint[4]) -> (dout: Uint[4]) {\n\
               async with din as x {\n\
                 if x > 1 { await clk(); } elif x > 2 { await clk(); await clk(); }\n\
                 yield x;\n\
               }\n\
             }",
        )
        .err()
        .expect("ambiguous schedule");
        assert!(
            matches!(err.kind(), gearc_utils::ErrorKind::AmbiguousSchedule(_)),
            "{err}"
        );
        assert!(err.to_string().contains("more than two states"), "{err}");
    }
}
