//! Calls: casts through type parameters, builtins, helper functions and
//! gear instantiations.
use super::{Lowerer, expr::unify, stmt::materialize};
use crate::{
    Context, DType, Expr, FuncBlock, FunctionCall, Interface, ScopeEntry,
    Session, Stmt, Submodule, TranslatedFunc, UnitKind, Value, VarKind,
    Variable,
};
use gearc_frontend::{BinOp, Direction, UnOp, ast};
use gearc_utils::{Error, GPosIdx, GearcResult, Id};

impl<'p> Lowerer<'_, 'p> {
    /// The gear `name` refers to, unless a local binding shadows it.
    pub(super) fn gear_def(&self, name: Id) -> Option<&'p ast::GearDef> {
        let program = self.sess.program;
        if self.ctx.lookup(name).is_some() {
            return None;
        }
        program.find_gear(name)
    }

    pub(super) fn call(
        &mut self,
        func: Id,
        args: &[ast::Expr],
        kwargs: &[(Id, ast::Expr)],
        pos: GPosIdx,
    ) -> GearcResult<Expr> {
        let program = self.sess.program;
        match self.ctx.lookup(func) {
            Some(ScopeEntry::Const {
                value: Value::Type(t),
                ..
            }) => {
                let t = t.clone();
                let [arg] = args else {
                    return Err(Error::misc(format!(
                        "conversion to {t} takes exactly one argument"
                    )));
                };
                return Expr::cast(self.expr(arg)?, t);
            }
            Some(_) => {
                return Err(Error::misc(format!("`{func}' is not callable")));
            }
            None => (),
        }
        if let Some(f) = program.find_func(func) {
            return self.call_func(f, args, kwargs, pos);
        }
        if program.find_gear(func).is_some() {
            return Err(Error::unsupported(format!(
                "gear `{func}' may only be instantiated as a statement or assigned to names"
            )));
        }
        if !kwargs.is_empty() {
            return Err(Error::unsupported(format!(
                "keyword arguments to `{func}'"
            )));
        }
        self.builtin(func, args)
    }

    /// Builtins fold when their arguments are constants.
    fn builtin(&mut self, func: Id, args: &[ast::Expr]) -> GearcResult<Expr> {
        let vals = args
            .iter()
            .map(|a| self.expr(a))
            .collect::<GearcResult<Vec<_>>>()?;
        if (func == "max" || func == "min") && !vals.is_empty() {
            return extremum(func == "max", vals);
        }
        match (func.as_str(), vals.as_slice()) {
            ("int", [v]) => match v.as_value().and_then(Value::as_big) {
                Some(i) => Ok(Expr::int(i.clone())),
                None => Err(Error::unsupported(format!(
                    "`int' of {v}, which is not a compile-time integer"
                ))),
            },
            ("len", [v]) => {
                let t = match v {
                    Expr::Res(Value::Type(t)) => Some(t.clone()),
                    v => v.dtype(),
                };
                match t {
                    Some(t) => Ok(Expr::int(t.len().unwrap_or(t.width()) as i128)),
                    None => Err(Error::type_mismatch(format!("{v} has no length"))),
                }
            }
            ("abs", [v]) => {
                if v.dtype().is_some_and(|t| !t.is_signed()) && v.as_value().is_none() {
                    return Ok(v.clone());
                }
                let negative = Expr::binary(BinOp::Lt, v.clone(), Expr::int(0))?;
                let neg = Expr::unary(UnOp::Neg, v.clone())?;
                match negative.truthy() {
                    Some(true) => Ok(neg),
                    Some(false) => Ok(v.clone()),
                    None => {
                        let (neg, v) = unify(neg, v.clone())?;
                        Ok(Expr::cond(negative, neg, v))
                    }
                }
            }
            ("code", [v, ..]) if vals.len() <= 2 => {
                let t = v.dtype().ok_or_else(|| {
                    Error::type_mismatch(format!("{v} has no binary representation"))
                })?;
                let raw = Expr::cast(v.clone(), DType::Uint(t.width()))?;
                match vals.get(1) {
                    None => Ok(raw),
                    Some(Expr::Res(Value::Type(to))) => Expr::cast(raw, to.clone()),
                    Some(other) => Err(Error::type_mismatch(format!(
                        "`code' expects a type, found {other}"
                    ))),
                }
            }
            ("range", _) => Err(Error::unsupported(
                "`range' outside of a `for' loop header",
            )),
            ("clk", _) => Err(Error::unsupported("`clk()' outside of `await'")),
            ("int" | "len" | "abs" | "code" | "max" | "min", _) => Err(Error::misc(
                format!("wrong number of arguments to `{func}'"),
            )),
            _ => Err(Error::undefined(func, "function")),
        }
    }

    /// Call of a helper function. Each distinct pair of function source
    /// and argument types is translated once.
    fn call_func(
        &mut self,
        f: &'p ast::FuncDef,
        args: &[ast::Expr],
        kwargs: &[(Id, ast::Expr)],
        pos: GPosIdx,
    ) -> GearcResult<Expr> {
        if !kwargs.is_empty() {
            return Err(Error::unsupported(format!(
                "keyword arguments to helper function `{}'",
                f.name
            )));
        }
        if args.len() != f.args.len() {
            return Err(Error::misc(format!(
                "`{}' takes {} arguments, got {}",
                f.name,
                f.args.len(),
                args.len()
            )));
        }
        let declared = {
            let mut scratch =
                Lowerer::new(&mut *self.sess, Context::new(f.name, UnitKind::Func));
            f.args
                .iter()
                .map(|a| a.ty.as_ref().map(|t| scratch.resolve_type(t)).transpose())
                .collect::<GearcResult<Vec<_>>>()?
        };
        let mut vals = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for ((arg, decl), def) in args.iter().zip(declared).zip(&f.args) {
            let v = self.expr(arg)?;
            let v = match decl {
                Some(t) => Expr::coerce(v, t),
                None => materialize(v),
            }
            .map_err(|e| e.with_pos(arg))?;
            let t = v.dtype().ok_or_else(|| {
                Error::type_mismatch(format!(
                    "argument `{}' of `{}' has no hardware type",
                    def.name, f.name
                ))
                .with_pos(arg)
            })?;
            arg_types.push(t);
            vals.push(v);
        }
        let name = match self.sess.lookup_func(&f.source, &arg_types) {
            Some(name) => name,
            None => self.lower_func(f, &arg_types, pos)?,
        };
        self.ctx.funcs.insert(name);
        let ret = self.sess.func(name).map(|tf| tf.block.ret_dtype.clone());
        Ok(Expr::Call(FunctionCall {
            name,
            args: vals,
            ret,
        }))
    }

    fn lower_func(
        &mut self,
        f: &'p ast::FuncDef,
        arg_types: &[DType],
        pos: GPosIdx,
    ) -> GearcResult<Id> {
        if self.sess.in_progress(f.name) {
            return Err(Error::unsupported(format!(
                "recursive call to `{}'",
                f.name
            )));
        }
        let name = self.sess.gen_func_name(f.name);
        let mut ctx = Context::new(name, UnitKind::Func);
        for (a, t) in f.args.iter().zip(arg_types) {
            ctx.declare(Variable::new(a.name, Some(t.clone()), VarKind::Arg))
                .map_err(|e| e.with_pos(&f.span))?;
        }
        self.sess.push_frame(f.name, pos);
        let res = lower_func_body(self.sess, f, ctx)
            .map_err(|e| self.sess.contextualize(e));
        self.sess.pop_frame();
        let (ctx, stmts) = res?;
        let block = FuncBlock {
            name,
            args: f
                .args
                .iter()
                .zip(arg_types)
                .map(|(a, t)| (a.name, t.clone()))
                .collect(),
            ret_dtype: ctx.ret_dtype.clone().unwrap_or(DType::Unit),
            stmts,
        };
        log::debug!("translated helper `{}' as `{name}'", f.name);
        self.sess.add_func(
            f.source.clone(),
            arg_types.to_vec(),
            TranslatedFunc { block, ctx },
        );
        Ok(name)
    }

    /// Record an instance of `gear`. Its outputs become local interfaces
    /// named after the assignment targets.
    pub(super) fn instantiate(
        &mut self,
        gear: &'p ast::GearDef,
        args: &[ast::Expr],
        kwargs: &[(Id, ast::Expr)],
        target: Option<&ast::Target>,
        pos: GPosIdx,
    ) -> GearcResult<()> {
        self.require_gear("gear instantiation", pos)?;
        let params = kwargs
            .iter()
            .map(|(k, e)| Ok((*k, self.const_expr(e)?)))
            .collect::<GearcResult<Vec<_>>>()?;
        let sig = {
            let ctx = Context::new(gear.name, UnitKind::Gear);
            let mut callee = Lowerer::new(&mut *self.sess, ctx);
            callee.bind_signature(gear, &params)
        }
        .map_err(|e| e.with_pos(&pos))?;

        if args.len() != sig.inputs.len() {
            return Err(Error::misc(format!(
                "gear `{}' takes {} inputs, got {}",
                gear.name,
                sig.inputs.len(),
                args.len()
            ))
            .with_pos(&pos));
        }
        let mut inputs = vec![];
        for ((port, dtype), arg) in sig.inputs.iter().zip(args) {
            let ast::ExprKind::Name(local) = &arg.kind else {
                return Err(Error::unsupported("gear inputs must be interfaces").with_pos(arg));
            };
            let intf = self
                .ctx
                .interface(*local)
                .ok_or_else(|| Error::undefined(*local, "interface").with_pos(arg))?;
            if intf.direction != Direction::Input {
                return Err(Error::unsupported(format!(
                    "output interface `{local}' cannot drive a gear input"
                ))
                .with_pos(arg));
            }
            if intf.dtype != *dtype {
                return Err(Error::type_mismatch(format!(
                    "`{local}' carries {}, input `{port}' of `{}' expects {dtype}",
                    intf.dtype, gear.name
                ))
                .with_pos(arg));
            }
            inputs.push((*port, *local));
        }

        let inst = self.ctx.gen_name(&format!("{}_i", gear.name));
        let locals = match target {
            Some(t) => output_names(t)?,
            None => sig
                .outputs
                .iter()
                .map(|(port, _)| self.ctx.gen_name(&format!("{inst}_{port}")))
                .collect(),
        };
        if locals.len() != sig.outputs.len() {
            return Err(Error::misc(format!(
                "gear `{}' has {} outputs, {} names given",
                gear.name,
                sig.outputs.len(),
                locals.len()
            ))
            .with_pos(&pos));
        }
        let mut outputs = vec![];
        for ((port, dtype), local) in sig.outputs.into_iter().zip(locals) {
            self.ctx
                .add_interface(Interface {
                    name: local,
                    dtype,
                    direction: Direction::Input,
                    port: false,
                })
                .map_err(|e| e.with_pos(&pos))?;
            outputs.push((port, local));
        }
        log::debug!("instance `{inst}' of gear `{}'", gear.name);
        self.ctx.submodules.push(Submodule {
            name: inst,
            gear: gear.name,
            params,
            inputs,
            outputs,
            pos,
        });
        Ok(())
    }
}

/// `max` or `min` as a chain of conditionals. A single constant tuple
/// argument supplies the candidates.
fn extremum(max: bool, mut vals: Vec<Expr>) -> GearcResult<Expr> {
    if let [Expr::Res(Value::Aggregate { elems, .. })] = vals.as_slice() {
        vals = elems.iter().cloned().map(Expr::Res).collect();
    }
    let op = if max { BinOp::Gt } else { BinOp::Lt };
    let mut vals = vals.into_iter();
    let Some(mut acc) = vals.next() else {
        return Err(Error::misc("extremum of an empty sequence"));
    };
    for v in vals {
        let better = Expr::binary(op, v.clone(), acc.clone())?;
        acc = match better.truthy() {
            Some(true) => v,
            Some(false) => acc,
            None => {
                let (v, acc) = unify(v, acc)?;
                Expr::cond(better, v, acc)
            }
        };
    }
    Ok(acc)
}

fn output_names(target: &ast::Target) -> GearcResult<Vec<Id>> {
    match target {
        ast::Target::Name(n, _) => Ok(vec![*n]),
        ast::Target::Tuple(ts) => ts
            .iter()
            .map(|t| match t {
                ast::Target::Name(n, _) => Ok(*n),
                t => Err(Error::unsupported("gear outputs must bind plain names")
                    .with_pos(t)),
            })
            .collect(),
        t @ ast::Target::Subscript(..) => {
            Err(Error::unsupported("gear outputs must bind plain names").with_pos(t))
        }
    }
}

fn lower_func_body(
    sess: &mut Session,
    f: &ast::FuncDef,
    ctx: Context,
) -> GearcResult<(Context, Vec<Stmt>)> {
    let mut lower = Lowerer::new(sess, ctx);
    if let Some(ret) = &f.ret {
        lower.ctx.ret_dtype = Some(lower.resolve_type(ret)?);
    }
    let stmts = lower.stmts(&f.body)?;
    Ok((lower.ctx, stmts))
}

#[cfg(test)]
mod tests {
    use crate::{
        Context, DType, Direction, Expr, Session, Stmt, TranslateConfig, Value,
        from_ast::lower_gear,
    };
    use gearc_frontend::GearParser;
    use gearc_utils::{ErrorKind, GearcResult, Id};

    const LIB: &str = "\
        def add1(x: Uint[8]) -> Uint[9] { return x + 1; }\n\
        def ident(v) { return v; }\n\
        def spin(n) { return spin(n); }\n\
        gear relay<W = 8>(din: Uint[W]) -> (dout: Uint[W]) {\n\
          async with din as d { yield d; }\n\
        }\n";

    fn lower_with<F, T>(gear: &str, check: F) -> GearcResult<T>
    where
        F: FnOnce(&Session, Context, Vec<Stmt>) -> T,
    {
        let prog = GearParser::parse_source("call.gear", format!("{LIB}{gear}"))?;
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let top = prog.gears.last().cloned().expect("no gear");
        let (ctx, body) = lower_gear(&mut sess, &top, &[])?;
        Ok(check(&sess, ctx, body))
    }

    fn values(body: &[Stmt]) -> Vec<Expr> {
        let mut out = vec![];
        crate::walk_stmts(body, &mut |s| {
            if let Stmt::Assign(a) = s {
                out.push(a.value.clone());
            }
        });
        out
    }

    #[test]
    fn builtins_fold() {
        let vals = lower_with(
            "gear g<T = Tuple[Uint[2], Uint[3]]>(din: Int[8]) -> () {\n\
               a = max(3, 7, 5); b = len(T) + T.width; c = abs(-5); d = min((4, 2, 9));\n\
               async with din as x { e = code(x); f = abs(x); }\n\
             }",
            |_, _, body| values(&body),
        )
        .unwrap();
        assert_eq!(vals[0], Expr::Res(Value::typed(7, DType::Uint(3))));
        assert_eq!(vals[1], Expr::Res(Value::typed(7, DType::Uint(3))));
        assert_eq!(vals[2], Expr::Res(Value::typed(5, DType::Uint(3))));
        assert_eq!(vals[3], Expr::Res(Value::typed(2, DType::Uint(2))));
        assert_eq!(vals[5].dtype(), Some(DType::Uint(8)));
        assert_eq!(vals[6].dtype(), Some(DType::Int(9)));
    }

    #[test]
    fn helper_functions_are_memoized() {
        let names = lower_with(
            "gear g(din: Uint[8]) -> (dout: Uint[9]) {\n\
               async with din as d {\n\
                 a = add1(d); b = add1(d + 0);\n\
                 c = ident(d); e = ident(d[0:4]);\n\
                 yield a;\n\
               }\n\
             }",
            |sess, ctx, _| {
                let names: Vec<_> = sess.funcs().map(|f| f.block.name).collect();
                assert_eq!(ctx.funcs.len(), 3);
                assert_eq!(
                    ctx.variable(Id::new("a")).unwrap().dtype,
                    Some(DType::Uint(9))
                );
                names
            },
        )
        .unwrap();
        assert_eq!(names, vec![Id::new("add1"), Id::new("ident"), Id::new("ident_0")]);
    }

    #[test]
    fn recursion_is_rejected() {
        let err = lower_with(
            "gear g() -> () { x = spin(1); }",
            |_, _, _| (),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
        assert_eq!(err.frames(), ["translating `spin'"]);
    }

    #[test]
    fn gear_instances() {
        let ctx = lower_with(
            "gear top(din: Uint[4]) -> (dout: Uint[4]) { y = relay(din, W=4); relay(y, W=4); }",
            |_, ctx, _| ctx,
        )
        .unwrap();
        assert_eq!(ctx.submodules.len(), 2);
        let first = &ctx.submodules[0];
        assert_eq!(first.gear, Id::new("relay"));
        assert_eq!(first.inputs, vec![(Id::new("din"), Id::new("din"))]);
        assert_eq!(first.outputs, vec![(Id::new("dout"), Id::new("y"))]);
        let y = ctx.interface(Id::new("y")).unwrap();
        assert_eq!((y.direction, y.port), (Direction::Input, false));
        assert_eq!(ctx.submodules[1].inputs[0].1, Id::new("y"));

        let err = lower_with(
            "gear top(din: Uint[4]) -> () { y = relay(din); }",
            |_, _, _| (),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch(_)));
        let err = lower_with(
            "gear top(din: Uint[4]) -> () { x = relay(din, W=4) + 1; }",
            |_, _, _| (),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
    }
}
