use gearc::translate;
use gearc_frontend::GearParser;
use gearc_ir::{
    Block, DType, Expr, Printer, Session, Signal, Stmt, Target, TranslateConfig,
    Translation, Value, from_ast::lower_gear,
};
use gearc_opt::{
    Unit,
    passes::InferRegisters,
    traversal::Pass,
};
use gearc_utils::{ErrorKind, GearcResult, Id};
use std::collections::{BTreeSet, HashMap};

const PASS_THROUGH: &str = "gear passthru(din: Uint[8]) -> (dout: Uint[8]) {\n\
                              async with din as d { yield d; }\n\
                            }";

const ACCUMULATOR: &str = "gear accum<W = 16>(din: Uint[8]) -> (dout: Uint[W]) {\n\
                             acc: Uint[W] = 0;\n\
                             while true {\n\
                               async with din as d {\n\
                                 acc = acc + d;\n\
                                 yield acc;\n\
                               }\n\
                             }\n\
                           }";

const TWO_STEPS: &str = "gear steps(a: Uint[4], b: Uint[4]) -> (dout: Uint[4]) {\n\
                           async with a as x { y: Uint[4] = x; }\n\
                           async with b as z { yield y; }\n\
                         }";

fn compile_with(src: &str, config: TranslateConfig) -> GearcResult<Translation> {
    let prog = GearParser::parse_source("test.gear", src.to_string())?;
    translate(&prog, config)
}

fn compile(src: &str) -> Translation {
    compile_with(src, TranslateConfig::default()).unwrap()
}

/// Registers inferred before any scheduling.
fn inferred(src: &str) -> BTreeSet<Id> {
    let prog = GearParser::parse_source("test.gear", src.to_string()).unwrap();
    let mut sess = Session::new(&prog, TranslateConfig::default());
    let gear = prog.gears.last().unwrap();
    let (ctx, body) = lower_gear(&mut sess, gear, &[]).unwrap();
    let mut unit = Unit::new(ctx, body);
    InferRegisters::do_pass_default(&mut unit).unwrap();
    unit.inferred
}

fn user_registers(t: &Translation) -> BTreeSet<Id> {
    t.registers
        .iter()
        .map(|r| r.name)
        .filter(|n| !n.is_generated())
        .collect()
}

/// Every entry and exit condition of the body.
fn conditions(t: &Translation) -> Vec<Expr> {
    let mut conds = vec![t.body.in_cond.clone(), t.body.exit_cond.clone()];
    gearc_ir::walk_stmts(&t.body.stmts, &mut |s| match s {
        Stmt::Block(b) => {
            conds.push(b.in_cond.clone());
            conds.push(b.exit_cond.clone());
        }
        Stmt::IfElse(ie) => {
            conds.extend(ie.branches.iter().map(|b| b.in_cond.clone()));
            conds.push(ie.exit_cond.clone());
        }
        _ => (),
    });
    conds
}

/// Evaluates the body of a translation for one cycle.
struct Cycle {
    vars: HashMap<Id, Value>,
    signals: HashMap<(Id, Signal), Value>,
}

impl Cycle {
    /// Registers start at their reset values.
    fn run(t: &Translation, inputs: &[(&str, Signal, Value)]) -> Cycle {
        let mut cycle = Cycle {
            vars: t
                .registers
                .iter()
                .filter_map(|r| Some((r.name, r.reset.clone()?)))
                .collect(),
            signals: inputs
                .iter()
                .map(|(i, s, v)| ((Id::new(*i), *s), v.clone()))
                .collect(),
        };
        cycle.block(&t.body);
        cycle
    }

    fn eval(&self, e: &Expr) -> Value {
        let e = e
            .rewrite(&mut |e| match e {
                Expr::Name(n) => self.vars.get(&n.name).cloned().map(Expr::Res),
                Expr::Component(c) => {
                    self.signals.get(&(c.intf, c.signal)).cloned().map(Expr::Res)
                }
                _ => None,
            })
            .unwrap();
        e.as_value()
            .cloned()
            .unwrap_or_else(|| panic!("`{e}' is not known in this cycle"))
    }

    fn holds(&self, e: &Expr) -> bool {
        self.eval(e).truthy().unwrap()
    }

    fn block(&mut self, b: &Block) -> bool {
        let entered = self.holds(&b.in_cond);
        if entered {
            self.stmts(&b.stmts);
        }
        entered
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign(a) if a.guard.as_ref().is_none_or(|g| self.holds(g)) => {
                    let v = self.eval(&a.value);
                    match &a.target {
                        Target::Signal(c) => self.signals.insert((c.intf, c.signal), v),
                        target => self.vars.insert(target.name(), v),
                    };
                }
                Stmt::Block(b) => {
                    self.block(b);
                }
                Stmt::IfElse(ie) => {
                    for arm in &ie.branches {
                        if self.block(arm) {
                            break;
                        }
                    }
                }
                Stmt::States(sw) => {
                    for br in &sw.branches {
                        self.block(&br.body);
                    }
                }
                _ => (),
            }
        }
    }

    fn var(&self, name: Id) -> Option<i128> {
        self.vars.get(&name).and_then(Value::as_int)
    }

    fn signal(&self, intf: &str, signal: Signal) -> Option<i128> {
        self.signals
            .get(&(Id::new(intf), signal))
            .and_then(Value::as_int)
    }
}

#[test]
fn registers_survive_scheduling() {
    for src in [PASS_THROUGH, ACCUMULATOR, TWO_STEPS] {
        let t = compile(src);
        assert_eq!(user_registers(&t), inferred(src), "{src}");
    }
    let t = compile(TWO_STEPS);
    assert_eq!(user_registers(&t), BTreeSet::from([Id::new("y")]));
    assert_eq!(t.states, 2);
    assert!(t.state_reg.is_some_and(|s| t.register(s).is_some()));
}

#[test]
fn constant_conditions_leave_no_branches() {
    let src = "gear sel<W = 8>(din: Uint[8]) -> (dout: Uint[8]) {\n\
                 async with din as d {\n\
                   if W > 4 { yield d; } else { yield 0; }\n\
                 }\n\
               }";
    for w in [8, 2] {
        let config = TranslateConfig {
            params: vec![(Id::new("W"), Value::int(w))],
            ..TranslateConfig::default()
        };
        let t = compile_with(src, config).unwrap();
        let mut branches = 0;
        gearc_ir::walk_stmts(&t.body.stmts, &mut |s| {
            if matches!(s, Stmt::IfElse(_)) {
                branches += 1;
            }
        });
        assert_eq!(branches, 0);
        let text = Printer::translation_to_str(&t);
        if w == 2 {
            assert!(text.contains("dout.data = 0;"), "{text}");
        } else {
            assert!(text.contains("dout.data = din.data;"), "{text}");
        }
    }
}

#[test]
fn straight_line_bodies_have_one_state() {
    let t = compile(
        "gear idle(din: Uint[8]) -> (dout: Uint[8]) {\n\
           x: Uint[8] = 3;\n\
           y = x + 1;\n\
         }",
    );
    assert_eq!(t.states, 1);
    assert_eq!(t.state_reg, None);
    assert!(t.registers.iter().all(|r| !r.name.as_str().starts_with("_state")));
}

#[test]
fn pass_through() {
    let t = compile(PASS_THROUGH);
    assert_eq!(t.states, 1);
    assert!(t.registers.is_empty());
    let allowed = BTreeSet::from([(Id::new("din"), Signal::Valid), (Id::new("dout"), Signal::Ready)]);
    for cond in conditions(&t) {
        assert!(cond.names().is_empty(), "{cond}");
        assert!(cond.signals().is_subset(&allowed), "{cond}");
    }
    assert!(!t.body.exit_cond.is_true());
    assert_eq!(t.body.exit_cond.signals(), allowed);
}

#[test]
fn accumulator() {
    let t = compile(ACCUMULATOR);
    assert_eq!(t.states, 1);
    assert_eq!(t.registers.len(), 1);
    let acc = &t.registers[0];
    assert_eq!(acc.name, Id::new("acc"));
    assert_eq!(acc.reset.as_ref().and_then(Value::as_int), Some(0));

    // Every write of the next value comes with the enable.
    let mut writes = vec![];
    gearc_ir::walk_stmts(&t.body.stmts, &mut |s| {
        if let Stmt::Assign(a) = s {
            writes.push((a.target.name(), a.guard.clone()));
        }
    });
    let nexts: Vec<_> = writes.iter().filter(|(n, _)| *n == acc.next).collect();
    assert!(!nexts.is_empty());
    for (_, guard) in nexts {
        assert!(writes.iter().any(|(n, g)| *n == acc.enable && g == guard));
    }
    assert!(writes.iter().all(|(n, _)| *n != acc.name));
}

#[test]
fn stalled_cycles_keep_registers() {
    let t = compile(ACCUMULATOR);
    let acc = &t.registers[0];
    let inputs = |ready: bool| {
        vec![
            ("din", Signal::Valid, Value::bool(true)),
            ("din", Signal::Data, Value::typed(5, DType::Uint(8))),
            ("dout", Signal::Ready, Value::bool(ready)),
        ]
    };

    // The consumer is not ready, so the sum must not be stored.
    let stalled = Cycle::run(&t, &inputs(false));
    assert_eq!(stalled.var(acc.enable), Some(0));
    assert_ne!(stalled.signal("din", Signal::Ready), Some(1));

    let done = Cycle::run(&t, &inputs(true));
    assert_eq!(done.var(acc.enable), Some(1));
    assert_eq!(done.var(acc.next), Some(5));
    assert_eq!(done.signal("din", Signal::Ready), Some(1));
}

#[test]
fn wide_registers() {
    let t = compile(
        "gear wide(din: Uint[8]) -> (dout: Uint[256]) {\n\
           m: Uint[256] = 0;\n\
           while true {\n\
             async with din as d {\n\
               m = m | 0xff00000000000000000000000000000000;\n\
               yield m;\n\
             }\n\
           }\n\
         }",
    );
    let m = t.register(Id::new("m")).unwrap();
    assert_eq!(m.dtype, DType::Uint(256));
    assert_eq!(m.reset, Some(Value::typed(0, DType::Uint(256))));
    let text = Printer::translation_to_str(&t);
    assert!(text.contains("86772003564839308183160524895100893921280"), "{text}");
}

#[test]
fn serialized_translation() {
    let t = compile(ACCUMULATOR);
    let json = serde_json::to_value(&t).unwrap();
    assert_eq!(json["name"], "accum");
    assert_eq!(json["registers"][0]["name"], "acc");
    assert_eq!(json["rst_cond"], "_rst_cond");
}

#[test]
fn errors_name_the_gear() {
    let err = compile_with(
        "gear bad(din: Uint[8]) -> (dout: Uint[8]) {\n\
           async with din as d { yield undefined_name; }\n\
         }",
        TranslateConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Undefined { .. }), "{err}");
    assert_eq!(err.frames(), ["translating `bad'"]);

    let config = TranslateConfig {
        top: Some(Id::new("missing")),
        ..TranslateConfig::default()
    };
    assert!(compile_with(PASS_THROUGH, config).is_err());
}
