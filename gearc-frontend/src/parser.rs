#![allow(clippy::upper_case_acronyms)]

//! Parser for gear programs.
use super::ast::{self, Expr, ExprKind, Stmt, StmtKind, Target, TypeExpr};
use crate::{BinOp, UnOp};
use gearc_utils::{self, FileIdx, GPosIdx, GearcResult, GlobalPositionTable, Id};
use num_bigint::BigInt;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_consume::{Error, Parser, match_nodes};
use std::fs;
use std::io::Read;
use std::path::Path;

type ParseResult<T> = Result<T, Error<Rule>>;

/// Data associated with parsing the file.
#[derive(Clone)]
struct UserData {
    /// Index to the current file
    pub file: FileIdx,
}

type Node<'i> = pest_consume::Node<'i, Rule, UserData>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("syntax.pest");

// Operator precedence, loosest first.
lazy_static::lazy_static! {
    static ref PRATT: PrattParser<Rule> =
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::neq, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::bor, Assoc::Left))
        .op(Op::infix(Rule::bxor, Assoc::Left))
        .op(Op::infix(Rule::band, Assoc::Left))
        .op(Op::infix(Rule::shl, Assoc::Left) | Op::infix(Rule::shr, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::floordiv, Assoc::Left)
            | Op::infix(Rule::modulo, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::invert));
}

#[derive(Parser)]
#[grammar = "syntax.pest"]
pub struct GearParser;

/// Definitions collected while parsing a file.
enum Definition {
    Gear(ast::GearDef),
    Func(ast::FuncDef),
}

/// Postfix operations applied to an atom.
enum Postfix {
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>),
    Attr(Id),
}

impl GearParser {
    /// Parse a gear source file into an AST representation.
    pub fn parse_file(path: &Path) -> GearcResult<ast::Program> {
        let time = std::time::Instant::now();
        let content = &fs::read(path).map_err(|err| {
            gearc_utils::Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy(),
            ))
        })?;
        let string_content = std::str::from_utf8(content)?.to_string();
        let out = Self::parse_source(&path.to_string_lossy(), string_content)?;
        log::info!(
            "Parsed `{}` in {}ms",
            path.to_string_lossy(),
            time.elapsed().as_millis()
        );
        Ok(out)
    }

    /// Parse a program read from `r`.
    pub fn parse<R: Read>(mut r: R) -> GearcResult<ast::Program> {
        let mut buf = String::new();
        r.read_to_string(&mut buf).map_err(|err| {
            gearc_utils::Error::invalid_file(format!(
                "Failed to parse buffer: {err}",
            ))
        })?;
        Self::parse_source("<stdin>", buf)
    }

    /// Parse `source`, registering it in the position table under `name`.
    pub fn parse_source(name: &str, source: String) -> GearcResult<ast::Program> {
        let file = GlobalPositionTable::add_file(name.to_string(), source.clone());
        let user_data = UserData { file };
        let inputs =
            GearParser::parse_with_userdata(Rule::file, &source, user_data)
                .map_err(|e| e.with_path(name))
                .map_err(|e| {
                    gearc_utils::Error::parse(format!(
                        "Failed to parse `{name}`: {e}"
                    ))
                })?;
        let input = inputs.single().map_err(|e| {
            gearc_utils::Error::parse(format!("Failed to parse `{name}`: {e}"))
        })?;
        GearParser::file(input).map_err(|e| {
            gearc_utils::Error::parse(format!("Failed to parse `{name}`: {e}"))
        })
    }

    fn get_span(node: &Node) -> GPosIdx {
        let ud = node.user_data();
        let sp = node.as_span();
        GlobalPositionTable::add_pos(ud.file, sp.start(), sp.end())
    }

    fn pair_span(ud: &UserData, pair: &pest::iterators::Pair<Rule>) -> GPosIdx {
        let sp = pair.as_span();
        GlobalPositionTable::add_pos(ud.file, sp.start(), sp.end())
    }

    #[allow(clippy::result_large_err)]
    fn op_expr_helper(
        ud: UserData,
        pairs: pest::iterators::Pairs<Rule>,
    ) -> ParseResult<Expr> {
        PRATT
            .map_primary(|primary| match primary.as_rule() {
                Rule::postfix_expr => Self::postfix_expr(
                    Node::new_with_user_data(primary, ud.clone()),
                ),
                x => unreachable!("Unexpected rule {:?} for op_expr", x),
            })
            .map_prefix(|op, rhs| {
                let rhs = rhs?;
                let span = Self::pair_span(&ud, &op).merge(rhs.span);
                let op = match op.as_rule() {
                    Rule::neg => UnOp::Neg,
                    Rule::invert => UnOp::Invert,
                    Rule::not_op => UnOp::Not,
                    _ => unreachable!(),
                };
                Ok(Expr::new(ExprKind::Unary(op, Box::new(rhs)), span))
            })
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (lhs?, rhs?);
                let span = lhs.span.merge(rhs.span);
                let op = match op.as_rule() {
                    Rule::or_op => BinOp::Or,
                    Rule::and_op => BinOp::And,
                    Rule::eq => BinOp::Eq,
                    Rule::neq => BinOp::NotEq,
                    Rule::lt => BinOp::Lt,
                    Rule::le => BinOp::LtE,
                    Rule::gt => BinOp::Gt,
                    Rule::ge => BinOp::GtE,
                    Rule::bor => BinOp::BitOr,
                    Rule::bxor => BinOp::BitXor,
                    Rule::band => BinOp::BitAnd,
                    Rule::shl => BinOp::Shl,
                    Rule::shr => BinOp::Shr,
                    Rule::add => BinOp::Add,
                    Rule::sub => BinOp::Sub,
                    Rule::mul => BinOp::Mul,
                    Rule::div | Rule::floordiv => BinOp::Div,
                    Rule::modulo => BinOp::Mod,
                    _ => unreachable!(),
                };
                Ok(Expr::new(
                    ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
                    span,
                ))
            })
            .parse(pairs)
    }

    #[allow(clippy::result_large_err)]
    fn gear_or_func(input: Node) -> ParseResult<Definition> {
        Ok(match input.as_rule() {
            Rule::gear_def => Definition::Gear(Self::gear_def(input)?),
            _ => Definition::Func(Self::func_def(input)?),
        })
    }

    fn tuple_or_single(mut exprs: Vec<Expr>, span: GPosIdx) -> Expr {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::new(ExprKind::Tuple(exprs), span)
        }
    }
}

#[pest_consume::parser]
impl GearParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    // ================ Literals =====================
    fn identifier(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn hex(input: Node) -> ParseResult<BigInt> {
        BigInt::parse_bytes(input.as_str()[2..].replace('_', "").as_bytes(), 16)
            .ok_or_else(|| input.error("Expected hexadecimal number"))
    }

    fn bin(input: Node) -> ParseResult<BigInt> {
        BigInt::parse_bytes(input.as_str()[2..].replace('_', "").as_bytes(), 2)
            .ok_or_else(|| input.error("Expected binary number"))
    }

    fn dec(input: Node) -> ParseResult<BigInt> {
        input
            .as_str()
            .replace('_', "")
            .parse::<BigInt>()
            .map_err(|_| input.error("Expected decimal number"))
    }

    fn num(input: Node) -> ParseResult<BigInt> {
        Ok(match_nodes!(
            input.into_children();
            [hex(n)] => n,
            [bin(n)] => n,
            [dec(n)] => n,
        ))
    }

    fn true_lit(_input: Node) -> ParseResult<bool> {
        Ok(true)
    }

    fn false_lit(_input: Node) -> ParseResult<bool> {
        Ok(false)
    }

    fn none_lit(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn str_char(input: Node) -> ParseResult<String> {
        Ok(input.as_str().to_string())
    }

    fn string(input: Node) -> ParseResult<String> {
        Ok(match_nodes!(
            input.into_children();
            [str_char(s)] => s,
        ))
    }

    // ================ Types =====================
    fn bool_ty(_input: Node) -> ParseResult<TypeExpr> {
        Ok(TypeExpr::Bool)
    }

    fn unit_ty(_input: Node) -> ParseResult<TypeExpr> {
        Ok(TypeExpr::Unit)
    }

    fn uint_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [expr(w)] => TypeExpr::Uint(Box::new(w)),
        ))
    }

    fn int_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [expr(w)] => TypeExpr::Int(Box::new(w)),
        ))
    }

    fn tuple_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [ty(fields)..] => TypeExpr::Tuple(fields.collect()),
        ))
    }

    fn field_ty(input: Node) -> ParseResult<(Id, TypeExpr)> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), ty(t)] => (name, t),
        ))
    }

    fn record_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [field_ty(fields)..] => TypeExpr::Record(fields.collect()),
        ))
    }

    fn array_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [ty(t), expr(n)] => TypeExpr::Array(Box::new(t), Box::new(n)),
        ))
    }

    fn queue_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [ty(t)] => TypeExpr::Queue(Box::new(t), None),
            [ty(t), expr(lvl)] => TypeExpr::Queue(Box::new(t), Some(Box::new(lvl))),
        ))
    }

    fn named_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name)] => TypeExpr::Named(name),
        ))
    }

    fn ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(
            input.into_children();
            [bool_ty(t)] => t,
            [unit_ty(t)] => t,
            [uint_ty(t)] => t,
            [int_ty(t)] => t,
            [tuple_ty(t)] => t,
            [record_ty(t)] => t,
            [array_ty(t)] => t,
            [queue_ty(t)] => t,
            [named_ty(t)] => t,
        ))
    }

    // ================ Expressions =====================
    fn kwarg(input: Node) -> ParseResult<(Id, Expr)> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), expr(e)] => (name, e),
        ))
    }

    fn call_args(input: Node) -> ParseResult<(Vec<Expr>, Vec<(Id, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::expr if !kwargs.is_empty() => {
                    return Err(child.error(
                        "positional argument follows keyword argument",
                    ));
                }
                Rule::expr => args.push(Self::expr(child)?),
                _ => kwargs.push(Self::kwarg(child)?),
            }
        }
        Ok((args, kwargs))
    }

    fn call(input: Node) -> ParseResult<Expr> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(func), call_args((args, kwargs))] => Expr::new(
                ExprKind::Call { func, args, kwargs },
                span,
            ),
        ))
    }

    fn cast(input: Node) -> ParseResult<Expr> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [ty(t), expr(e)] => Expr::new(ExprKind::Cast(t, Box::new(e)), span),
        ))
    }

    fn tuple(input: Node) -> ParseResult<Expr> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [expr(es)..] => Expr::new(ExprKind::Tuple(es.collect()), span),
        ))
    }

    fn paren(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [expr(e)] => e,
        ))
    }

    fn atom(input: Node) -> ParseResult<Expr> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [call(e)] => e,
            [cast(e)] => e,
            [tuple(e)] => e,
            [paren(e)] => e,
            [num(n)] => Expr::new(ExprKind::Num(n), span),
            [true_lit(b)] => Expr::new(ExprKind::Bool(b), span),
            [false_lit(b)] => Expr::new(ExprKind::Bool(b), span),
            [none_lit(_)] => Expr::new(ExprKind::None, span),
            [string(s)] => Expr::new(ExprKind::Str(s), span),
            [identifier(name)] => Expr::new(ExprKind::Name(name), span),
        ))
    }

    fn slice_lo(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children(); [expr(e)] => e))
    }

    fn slice_hi(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(input.into_children(); [expr(e)] => e))
    }

    fn slice(input: Node) -> ParseResult<Postfix> {
        Ok(match_nodes!(
            input.into_children();
            [] => Postfix::Slice(None, None),
            [slice_lo(lo)] => Postfix::Slice(Some(lo), None),
            [slice_hi(hi)] => Postfix::Slice(None, Some(hi)),
            [slice_lo(lo), slice_hi(hi)] => Postfix::Slice(Some(lo), Some(hi)),
        ))
    }

    fn index(input: Node) -> ParseResult<Postfix> {
        Ok(match_nodes!(input.into_children(); [expr(e)] => Postfix::Index(e)))
    }

    fn attr(input: Node) -> ParseResult<Postfix> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name)] => Postfix::Attr(name),
        ))
    }

    fn postfix(input: Node) -> ParseResult<(Postfix, GPosIdx)> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [slice(p)] => (p, span),
            [index(p)] => (p, span),
            [attr(p)] => (p, span),
        ))
    }

    fn postfix_expr(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [atom(base), postfix(ops)..] => ops.fold(base, |acc, (op, sp)| {
                let span = acc.span.merge(sp);
                let kind = match op {
                    Postfix::Index(i) => ExprKind::Subscript(Box::new(acc), Box::new(i)),
                    Postfix::Slice(lo, hi) => ExprKind::Slice(
                        Box::new(acc),
                        lo.map(Box::new),
                        hi.map(Box::new),
                    ),
                    Postfix::Attr(name) => ExprKind::Attribute(Box::new(acc), name),
                };
                Expr::new(kind, span)
            }),
        ))
    }

    fn op_expr(input: Node) -> ParseResult<Expr> {
        let ud = input.user_data().clone();
        Self::op_expr_helper(ud, input.into_pair().into_inner())
    }

    fn expr(input: Node) -> ParseResult<Expr> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [op_expr(e)] => e,
            [op_expr(body), op_expr(test), expr(orelse)] => Expr::new(
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
                span,
            ),
        ))
    }

    // ================ Statements =====================
    fn subscript_target(input: Node) -> ParseResult<Target> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), expr(idx)] => Target::Subscript(name, Box::new(idx), span),
        ))
    }

    fn tuple_target(input: Node) -> ParseResult<Target> {
        Ok(match_nodes!(
            input.into_children();
            [target(ts)..] => Target::Tuple(ts.collect()),
        ))
    }

    fn target(input: Node) -> ParseResult<Target> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [subscript_target(t)] => t,
            [tuple_target(t)] => t,
            [identifier(name)] => Target::Name(name, span),
        ))
    }

    fn target_list(input: Node) -> ParseResult<Target> {
        Ok(match_nodes!(
            input.into_children();
            [target(t)] => t,
            [target(ts)..] => Target::Tuple(ts.collect()),
        ))
    }

    fn aug_op(input: Node) -> ParseResult<BinOp> {
        Ok(match input.as_str() {
            "+=" => BinOp::Add,
            "-=" => BinOp::Sub,
            "*=" => BinOp::Mul,
            "//=" | "/=" => BinOp::Div,
            "%=" => BinOp::Mod,
            "<<=" => BinOp::Shl,
            ">>=" => BinOp::Shr,
            "&=" => BinOp::BitAnd,
            "|=" => BinOp::BitOr,
            "^=" => BinOp::BitXor,
            _ => return Err(input.error("unknown augmented assignment")),
        })
    }

    fn assign(input: Node) -> ParseResult<StmtKind> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [target_list(target), expr(values)..] => StmtKind::Assign {
                target,
                value: Self::tuple_or_single(values.collect(), span),
            },
        ))
    }

    fn ann_assign(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(target), ty(ty)] => StmtKind::AnnAssign { target, ty, value: None },
            [identifier(target), ty(ty), expr(v)] => StmtKind::AnnAssign { target, ty, value: Some(v) },
        ))
    }

    fn aug_assign(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [target(target), aug_op(op), expr(value)] => StmtKind::AugAssign { target, op, value },
        ))
    }

    fn pass_stmt(_input: Node) -> ParseResult<StmtKind> {
        Ok(StmtKind::Pass)
    }

    fn yield_stmt(input: Node) -> ParseResult<StmtKind> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [expr(values)..] => StmtKind::Yield(Self::tuple_or_single(values.collect(), span)),
        ))
    }

    fn await_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [expr(e)] => StmtKind::Await(e),
        ))
    }

    fn assert_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [expr(test)] => StmtKind::Assert { test, msg: None },
            [expr(test), string(msg)] => StmtKind::Assert { test, msg: Some(msg) },
        ))
    }

    fn return_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [] => StmtKind::Return(None),
            [expr(e)] => StmtKind::Return(Some(e)),
        ))
    }

    fn expr_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [expr(e)] => StmtKind::Expr(e),
        ))
    }

    fn block(input: Node) -> ParseResult<Vec<Stmt>> {
        Ok(match_nodes!(
            input.into_children();
            [stmt(stmts)..] => stmts.collect(),
        ))
    }

    fn elif_clause(input: Node) -> ParseResult<(Expr, Vec<Stmt>)> {
        Ok(match_nodes!(
            input.into_children();
            [expr(test), block(body)] => (test, body),
        ))
    }

    fn else_clause(input: Node) -> ParseResult<Vec<Stmt>> {
        Ok(match_nodes!(
            input.into_children();
            [block(body)] => body,
        ))
    }

    fn elifs(input: Node) -> ParseResult<Vec<(Expr, Vec<Stmt>)>> {
        Ok(match_nodes!(
            input.into_children();
            [elif_clause(clauses)..] => clauses.collect(),
        ))
    }

    fn if_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [expr(test), block(body), elifs(elifs)] => {
                let mut branches = vec![(test, body)];
                branches.extend(elifs);
                StmtKind::If { branches, orelse: None }
            },
            [expr(test), block(body), elifs(elifs), else_clause(orelse)] => {
                let mut branches = vec![(test, body)];
                branches.extend(elifs);
                StmtKind::If { branches, orelse: Some(orelse) }
            },
        ))
    }

    fn while_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [expr(test), block(body)] => StmtKind::While { test, body },
        ))
    }

    fn for_stmt(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [target(target), expr(iter), block(body)] => StmtKind::For { target, iter, body },
        ))
    }

    fn with_item(input: Node) -> ParseResult<(Expr, Target)> {
        Ok(match_nodes!(
            input.into_children();
            [expr(intf), target(t)] => (intf, t),
        ))
    }

    fn with_items(input: Node) -> ParseResult<Vec<(Expr, Target)>> {
        Ok(match_nodes!(
            input.into_children();
            [with_item(items)..] => items.collect(),
        ))
    }

    fn async_with(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [with_items(items), block(body)] => StmtKind::AsyncWith { items, body },
        ))
    }

    fn async_for(input: Node) -> ParseResult<StmtKind> {
        Ok(match_nodes!(
            input.into_children();
            [target(target), expr(intf), block(body)] => StmtKind::AsyncFor { target, intf, body },
        ))
    }

    fn stmt(input: Node) -> ParseResult<Stmt> {
        let span = Self::get_span(&input);
        let kind = match_nodes!(
            input.into_children();
            [if_stmt(s)] => s,
            [while_stmt(s)] => s,
            [for_stmt(s)] => s,
            [async_with(s)] => s,
            [async_for(s)] => s,
            [assign(s)] => s,
            [aug_assign(s)] => s,
            [ann_assign(s)] => s,
            [pass_stmt(s)] => s,
            [yield_stmt(s)] => s,
            [await_stmt(s)] => s,
            [assert_stmt(s)] => s,
            [return_stmt(s)] => s,
            [expr_stmt(s)] => s,
        );
        Ok(Stmt::new(kind, span))
    }

    // ================ Definitions =====================
    fn param_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(input.into_children(); [ty(t)] => t))
    }

    fn param(input: Node) -> ParseResult<ast::ParamDef> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), param_ty(t)] => ast::ParamDef { name, value: ast::ParamValue::Type(t) },
            [identifier(name), expr(e)] => ast::ParamDef { name, value: ast::ParamValue::Expr(e) },
        ))
    }

    fn params(input: Node) -> ParseResult<Vec<ast::ParamDef>> {
        Ok(match_nodes!(
            input.into_children();
            [param(ps)..] => ps.collect(),
        ))
    }

    fn port(input: Node) -> ParseResult<ast::PortDef> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), ty(ty)] => ast::PortDef { name, ty, span },
        ))
    }

    fn ports(input: Node) -> ParseResult<Vec<ast::PortDef>> {
        Ok(match_nodes!(
            input.into_children();
            [port(ps)..] => ps.collect(),
        ))
    }

    fn gear_def(input: Node) -> ParseResult<ast::GearDef> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), ports(inputs), ports(outputs), block(body)] => ast::GearDef {
                name, params: vec![], inputs, outputs, body, span,
            },
            [identifier(name), params(params), ports(inputs), ports(outputs), block(body)] => ast::GearDef {
                name, params, inputs, outputs, body, span,
            },
        ))
    }

    fn arg_def(input: Node) -> ParseResult<ast::ArgDef> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name)] => ast::ArgDef { name, ty: None },
            [identifier(name), ty(t)] => ast::ArgDef { name, ty: Some(t) },
        ))
    }

    fn args(input: Node) -> ParseResult<Vec<ast::ArgDef>> {
        Ok(match_nodes!(
            input.into_children();
            [arg_def(args)..] => args.collect(),
        ))
    }

    fn ret_ty(input: Node) -> ParseResult<TypeExpr> {
        Ok(match_nodes!(input.into_children(); [ty(t)] => t))
    }

    fn func_def(input: Node) -> ParseResult<ast::FuncDef> {
        let span = Self::get_span(&input);
        let source = input.as_str().to_string();
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), args(args), block(body)] => ast::FuncDef {
                name, args, ret: None, body, source, span,
            },
            [identifier(name), args(args), ret_ty(ret), block(body)] => ast::FuncDef {
                name, args, ret: Some(ret), body, source, span,
            },
        ))
    }

    fn file(input: Node) -> ParseResult<ast::Program> {
        let mut program = ast::Program::default();
        for child in input.into_children() {
            if child.as_rule() == Rule::EOI {
                continue;
            }
            match Self::gear_or_func(child)? {
                Definition::Gear(g) => program.gears.push(g),
                Definition::Func(f) => program.funcs.push(f),
            }
        }
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ast::Program {
        GearParser::parse_source("test.gear", src.to_string())
            .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn parses_gear_header() {
        let prog = parse(
            "gear accum<W = 16, T = Uint[8]>(din: Queue[Uint[8]], cfg: Bool) -> (dout: Uint[W]) {\n\
             pass;\n\
             }",
        );
        let gear = &prog.gears[0];
        assert_eq!(gear.name, "accum");
        assert_eq!(gear.params.len(), 2);
        assert!(matches!(gear.params[1].value, ast::ParamValue::Type(_)));
        assert_eq!(gear.inputs.len(), 2);
        assert_eq!(gear.outputs[0].name, "dout");
        assert!(matches!(gear.inputs[0].ty, TypeExpr::Queue(_, None)));
    }

    #[test]
    fn operator_precedence() {
        let prog = parse(
            "def f(a, b) { return a + b * 2 == 3 and not a < b; }",
        );
        let body = &prog.funcs[0].body;
        let StmtKind::Return(Some(e)) = &body[0].kind else {
            panic!("expected return")
        };
        let ExprKind::Binary(BinOp::And, lhs, rhs) = &e.kind else {
            panic!("expected `and` at the root: {e:?}")
        };
        assert!(matches!(lhs.kind, ExprKind::Binary(BinOp::Eq, _, _)));
        assert!(matches!(rhs.kind, ExprKind::Unary(UnOp::Not, _)));
        if let ExprKind::Binary(BinOp::Eq, sum, _) = &lhs.kind {
            assert!(matches!(sum.kind, ExprKind::Binary(BinOp::Add, _, _)));
        }
    }

    #[test]
    fn statements() {
        let prog = parse(
            "gear g(din: Uint[8]) -> (dout: Uint[8]) {\n\
               x: Uint[8] = 0x0f;\n\
               x += 1;\n\
               a, b = (1, 2);\n\
               async with din as d {\n\
                 if d > x { yield d; } elif d == 0 { pass; } else { yield x; }\n\
               }\n\
               for i in range(4) { x[i] = 0b1; }\n\
               await clk();\n\
               assert x != 3, \"bad x\";\n\
             }",
        );
        let kinds: Vec<_> = prog.gears[0].body.iter().map(|s| &s.kind).collect();
        assert!(matches!(kinds[0], StmtKind::AnnAssign { value: Some(_), .. }));
        assert!(matches!(kinds[1], StmtKind::AugAssign { op: BinOp::Add, .. }));
        assert!(matches!(kinds[2], StmtKind::Assign { target: Target::Tuple(_), .. }));
        let StmtKind::AsyncWith { items, body } = kinds[3] else {
            panic!("expected async with")
        };
        assert_eq!(items.len(), 1);
        assert!(matches!(&body[0].kind, StmtKind::If { branches, orelse: Some(_) } if branches.len() == 2));
        assert!(matches!(kinds[4], StmtKind::For { .. }));
        assert!(matches!(kinds[5], StmtKind::Await(_)));
        assert!(matches!(kinds[6], StmtKind::Assert { msg: Some(m), .. } if m == "bad x"));
    }

    #[test]
    fn postfix_and_conditional_expressions() {
        let prog = parse("def f(x) { return x.data[0:4] if x.eot else Uint[4](x[1]); }");
        let StmtKind::Return(Some(e)) = &prog.funcs[0].body[0].kind else {
            panic!("expected return")
        };
        let ExprKind::IfExp { test, body, orelse } = &e.kind else {
            panic!("expected conditional")
        };
        assert!(matches!(test.kind, ExprKind::Attribute(_, _)));
        assert!(matches!(body.kind, ExprKind::Slice(_, Some(_), Some(_))));
        assert!(matches!(orelse.kind, ExprKind::Cast(TypeExpr::Uint(_), _)));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = GearParser::parse_source("bad.gear", "gear g( -> ()".to_string())
            .expect_err("should fail");
        assert!(err.to_string().contains("bad.gear"));
    }
}
