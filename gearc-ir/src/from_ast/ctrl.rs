//! Conditionals and loops.
use super::Lowerer;
use crate::{Block, BlockKind, Expr, IfElse, Stmt};
use gearc_frontend::ast;
use gearc_utils::{GPosIdx, GearcResult};

impl Lowerer<'_, '_> {
    /// Arms with a constant condition are resolved here: false arms are
    /// dropped and the first true arm becomes the final `else`.
    pub(super) fn if_stmt(
        &mut self,
        branches: &[(ast::Expr, Vec<ast::Stmt>)],
        orelse: Option<&[ast::Stmt]>,
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        let mut arms = vec![];
        for (test, body) in branches {
            let cond = self.cond_expr(test)?;
            match cond.truthy() {
                Some(false) => continue,
                Some(true) => {
                    let stmts = self.stmts(body)?;
                    return Ok(self.finish_if(arms, Some(stmts), pos));
                }
                None => {
                    let id = self.ctx.fresh_id();
                    let stmts = self.stmts(body)?;
                    arms.push(Block {
                        kind: BlockKind::Cond,
                        pos: test.span,
                        ..Block::cond(id, cond, stmts)
                    });
                }
            }
        }
        let orelse = match orelse {
            Some(body) => Some(self.stmts(body)?),
            None => None,
        };
        Ok(self.finish_if(arms, orelse, pos))
    }

    fn finish_if(
        &mut self,
        mut arms: Vec<Block>,
        orelse: Option<Vec<Stmt>>,
        pos: GPosIdx,
    ) -> Vec<Stmt> {
        if arms.is_empty() {
            return orelse.unwrap_or_default();
        }
        if let Some(stmts) = orelse {
            let id = self.ctx.fresh_id();
            arms.push(Block {
                kind: BlockKind::Cond,
                ..Block::seq(id, stmts)
            });
        }
        vec![Stmt::IfElse(IfElse {
            id: self.ctx.fresh_id(),
            branches: arms,
            exit_cond: Expr::bool(true),
            pos,
        })]
    }

    pub(super) fn while_stmt(
        &mut self,
        test: &ast::Expr,
        body: &[ast::Stmt],
        pos: GPosIdx,
    ) -> GearcResult<Vec<Stmt>> {
        self.require_gear("`while' loop", pos)?;
        let cond = self.cond_expr(test)?;
        if cond.is_false() {
            return Ok(vec![]);
        }
        let id = self.ctx.fresh_id();
        let stmts = self.stmts(body)?;
        Ok(vec![Stmt::Block(Block {
            id,
            kind: BlockKind::Loop,
            exit_cond: Expr::not(cond.clone()),
            in_cond: cond,
            stmts,
            pos,
        })])
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        BlockKind, Session, Stmt, TranslateConfig, from_ast::lower_gear,
    };
    use gearc_frontend::GearParser;
    use gearc_utils::GearcResult;

    fn lower(body: &str) -> GearcResult<Vec<Stmt>> {
        let text = format!(
            "gear g<N = 2>(din: Uint[4]) -> (dout: Uint[4]) {{ \
               async with din as d {{ {body} }} \
             }}"
        );
        let prog = GearParser::parse_source("ctrl.gear", text)?;
        let mut sess = Session::new(&prog, TranslateConfig::default());
        let (_, mut body) = lower_gear(&mut sess, &prog.gears[0], &[])?;
        let Some(Stmt::Block(b)) = body.pop() else {
            panic!("expected the pull block");
        };
        Ok(b.stmts)
    }

    #[test]
    fn dynamic_if_chain() {
        let stmts = lower(
            "if d > 3 { yield 1; } elif N == 0 { yield 2; } elif d < 1 { yield 3; } \
             elif N == 2 { yield 4; } else { yield 5; }",
        )
        .unwrap();
        let Some(Stmt::IfElse(ie)) = stmts.iter().find(|s| matches!(s, Stmt::IfElse(_)))
        else {
            panic!("expected an if statement");
        };
        // `N == 0` is dropped and `N == 2` becomes the `else`.
        assert_eq!(ie.branches.len(), 3);
        assert!(ie.branches[2].in_cond.is_true());
        assert!(ie.branches.iter().all(|b| b.kind == BlockKind::Cond));
    }

    #[test]
    fn while_loops() {
        let stmts = lower("x: Uint[4] = d; while x > 0 { x = x >> 1; } while False { yield 1; }")
            .unwrap();
        let loops: Vec<_> = stmts
            .iter()
            .filter_map(|s| match s {
                Stmt::Block(b) if b.is_loop() => Some(b),
                _ => None,
            })
            .collect();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].exit_cond.to_string(), "!(x > 0)");
    }
}
