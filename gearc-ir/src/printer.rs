//! Implements a formatter for the in-memory representation of gears.
//! Printing never mutates the IR.
use crate::{self as ir, Block, BlockKind, Stmt};
use itertools::Itertools;
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    fn format_params(params: &[(ir::Id, ir::Value)]) -> String {
        if params.is_empty() {
            "".to_string()
        } else {
            format!(
                "<{}>",
                params.iter().map(|(n, v)| format!("{n}={v}")).join(", ")
            )
        }
    }

    fn format_dtype(dtype: &Option<ir::DType>) -> String {
        match dtype {
            Some(t) => t.to_string(),
            None => "?".to_string(),
        }
    }

    /// Formats and writes a translated gear.
    pub fn write_translation<F: io::Write>(
        t: &ir::Translation,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(f, "gear {}{} {{", t.name, Self::format_params(&t.params))?;
        writeln!(f, "  clock clk; reset rst; done {};", t.rst_cond)?;
        for intf in &t.interfaces {
            Self::write_interface(intf, 2, f)?;
        }
        for reg in &t.registers {
            write!(f, "  reg {}: {}", reg.name, reg.dtype)?;
            if let Some(reset) = &reg.reset {
                write!(f, " = {reset}")?;
            }
            writeln!(f, " (next {}, en {});", reg.next, reg.enable)?;
        }
        for var in &t.variables {
            writeln!(f, "  wire {}: {};", var.name, Self::format_dtype(&var.dtype))?;
        }
        for sub in &t.submodules {
            Self::write_submodule(sub, 2, f)?;
        }
        if let Some(state) = t.state_reg {
            writeln!(f, "  states {}: {};", state, t.states)?;
        }
        writeln!(
            f,
            "  body if {} until {} {{",
            t.body.in_cond, t.body.exit_cond
        )?;
        Self::write_stmts(&t.body.stmts, 4, f)?;
        writeln!(f, "  }}")?;
        writeln!(f, "}}")?;
        for func in &t.funcs {
            Self::write_func(func, f)?;
        }
        Ok(())
    }

    pub fn write_interface<F: io::Write>(
        intf: &ir::Interface,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(
            f,
            "{}{} {}: {};",
            " ".repeat(indent_level),
            intf.direction,
            intf.name,
            intf.dtype
        )
    }

    pub fn write_submodule<F: io::Write>(
        sub: &ir::Submodule,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let binds = |ports: &[(ir::Id, ir::Id)]| {
            ports.iter().map(|(p, i)| format!("{p}={i}")).join(", ")
        };
        writeln!(
            f,
            "{}{} = {}{}({}) -> ({});",
            " ".repeat(indent_level),
            sub.name,
            sub.gear,
            Self::format_params(&sub.params),
            binds(&sub.inputs),
            binds(&sub.outputs)
        )
    }

    /// Formats and writes a helper function.
    pub fn write_func<F: io::Write>(
        func: &ir::FuncBlock,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(
            f,
            "def {}({}) -> {} {{",
            func.name,
            func.args.iter().map(|(n, t)| format!("{n}: {t}")).join(", "),
            func.ret_dtype
        )?;
        Self::write_stmts(&func.stmts, 2, f)?;
        writeln!(f, "}}")
    }

    pub fn write_stmts<F: io::Write>(
        stmts: &[Stmt],
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        for stmt in stmts {
            Self::write_stmt(stmt, indent_level, f)?;
        }
        Ok(())
    }

    fn write_block_header<F: io::Write>(
        block: &Block,
        f: &mut F,
    ) -> io::Result<()> {
        match block.kind {
            BlockKind::Seq => write!(f, "seq")?,
            BlockKind::Cond => write!(f, "if {}", block.in_cond)?,
            BlockKind::Loop => write!(f, "while {}", block.in_cond)?,
        }
        if !block.exit_cond.is_true() {
            write!(f, " exit {}", block.exit_cond)?;
        }
        writeln!(f, " {{")
    }

    pub fn write_stmt<F: io::Write>(
        stmt: &Stmt,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let pad = " ".repeat(indent_level);
        write!(f, "{pad}")?;
        match stmt {
            Stmt::Assign(a) => {
                write!(f, "{} = {}", a.target, a.value)?;
                if let Some(guard) = &a.guard {
                    write!(f, " when {guard}")?;
                }
                writeln!(f, ";")
            }
            Stmt::Await(a) => {
                let what = match &a.kind {
                    ir::AwaitKind::Pull(i) => format!("pull {i}"),
                    ir::AwaitKind::Push(os) => format!("push {}", os.iter().join(", ")),
                    ir::AwaitKind::Clock => "clk".to_string(),
                };
                writeln!(f, "await {what} [in {}, exit {}];", a.in_await, a.exit_await)
            }
            Stmt::Assert(a) => writeln!(f, "assert({}, \"{}\");", a.test, a.msg),
            Stmt::Return(r) => writeln!(f, "return {};", r.value),
            Stmt::Block(b) => {
                Self::write_block_header(b, f)?;
                Self::write_stmts(&b.stmts, indent_level + 2, f)?;
                writeln!(f, "{pad}}}")
            }
            Stmt::IfElse(ie) => {
                for (i, b) in ie.branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{pad}")?;
                    }
                    if i + 1 == ie.branches.len() && b.in_cond.is_true() && i > 0 {
                        writeln!(f, "else {{")?;
                    } else {
                        let kw = if i == 0 { "if" } else { "elif" };
                        writeln!(f, "{kw} {} {{", b.in_cond)?;
                    }
                    Self::write_stmts(&b.stmts, indent_level + 2, f)?;
                    writeln!(f, "{pad}}}")?;
                }
                if !ie.exit_cond.is_true() {
                    writeln!(f, "{pad}// exit {}", ie.exit_cond)?;
                }
                Ok(())
            }
            Stmt::States(sw) => {
                writeln!(f, "switch {} {{", sw.state_reg)?;
                for br in &sw.branches {
                    writeln!(f, "{pad}  state {} {{", br.state)?;
                    Self::write_stmts(&br.body.stmts, indent_level + 4, f)?;
                    writeln!(f, "{pad}  }}")?;
                }
                writeln!(f, "{pad}}}")
            }
        }
    }

    /// Convert a statement list into a string.
    pub fn stmts_to_str(stmts: &[Stmt]) -> String {
        let mut buf = Vec::new();
        // Writing into a vector does not fail.
        let _ = Self::write_stmts(stmts, 0, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn translation_to_str(t: &ir::Translation) -> String {
        let mut buf = Vec::new();
        let _ = Self::write_translation(t, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Assign, Expr, StmtId, Target};

    #[test]
    fn prints_nested_blocks() {
        let x = ir::Name {
            name: ir::Id::new("x"),
            dtype: Some(ir::DType::Uint(4)),
        };
        let assign = Stmt::Assign(Assign {
            id: StmtId(2),
            target: Target::Var(x.clone()),
            value: Expr::int(3),
            guard: None,
            pos: Default::default(),
        });
        let cond = Expr::name(ir::Id::new("c"), Some(ir::DType::bool()));
        let block = Stmt::Block(Block::cond(StmtId(1), cond, vec![assign]));
        let text = Printer::stmts_to_str(&[block]);
        assert_eq!(text, "if c {\n  x = 3;\n}\n");
    }
}
