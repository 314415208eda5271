//! Define the [Pipeline] structure that is used to run passes over a
//! translation unit in a fixed order.
use crate::Unit;
use crate::passes::{
    CheckRegisters, DeadCode, ExitCond, InferRegisters, Inline, LowerRegisters,
    RegisterResets, Schedule,
};
use crate::traversal::{Named, Pass};
use gearc_ir::Printer;
use gearc_utils::{Error, GearcResult};
use std::fmt::Write as _;
use std::time::Instant;

/// Top-level type for all passes that transform a [Unit].
pub type PassClosure = Box<dyn Fn(&mut Unit) -> GearcResult<()>>;

/// An ordered list of registered passes.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<(&'static str, &'static str, PassClosure)>,
}

impl Pipeline {
    /// Append a pass and return an error if another pass with the same
    /// name is already registered.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut pl = Pipeline::default();
    /// pl.register_pass::<Inline>()?;
    /// ```
    pub fn register_pass<P>(&mut self) -> GearcResult<()>
    where
        P: Pass + Named + Default + 'static,
    {
        let name = P::name();
        if self.passes.iter().any(|(n, ..)| *n == name) {
            return Err(Error::misc(format!(
                "Pass with name '{name}' is already registered."
            )));
        }
        self.passes.push((
            name,
            P::description(),
            Box::new(|unit: &mut Unit| {
                P::do_pass_default(unit)?;
                Ok(())
            }),
        ));
        Ok(())
    }

    /// The passes run on gear bodies.
    pub fn gear() -> GearcResult<Self> {
        let mut pl = Pipeline::default();
        pl.register_pass::<InferRegisters>()?;
        pl.register_pass::<Schedule>()?;
        pl.register_pass::<CheckRegisters>()?;
        pl.register_pass::<RegisterResets>()?;
        pl.register_pass::<Inline>()?;
        pl.register_pass::<LowerRegisters>()?;
        pl.register_pass::<ExitCond>()?;
        pl.register_pass::<DeadCode>()?;
        Ok(pl)
    }

    /// The passes run on helper function bodies.
    pub fn func() -> GearcResult<Self> {
        let mut pl = Pipeline::default();
        pl.register_pass::<Inline>()?;
        pl.register_pass::<DeadCode>()?;
        Ok(pl)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|(n, ..)| *n)
    }

    /// Return the help string for the registered passes.
    pub fn complete_help(&self) -> String {
        let mut ret = String::with_capacity(1000);
        let _ = writeln!(ret, "Passes:");
        for (name, desc, _) in &self.passes {
            let _ = writeln!(ret, "- {name}: {desc}");
        }
        ret
    }

    /// Run every pass on `unit` in order. With `dump_ir`, the body is
    /// logged after each pass.
    pub fn execute(&self, unit: &mut Unit, dump_ir: bool) -> GearcResult<()> {
        for (name, _, pass) in &self.passes {
            let start = Instant::now();
            pass(unit)?;
            if dump_ir {
                log::debug!(
                    "{} after {name}:\n{}",
                    unit.ctx.name,
                    Printer::stmts_to_str(&unit.body.stmts)
                );
            }
            let elapsed = start.elapsed();
            // Warn if pass takes more than 5 seconds.
            if elapsed.as_secs() > 5 {
                log::warn!("{}: {name}: {}ms", unit.ctx.name, elapsed.as_millis());
            } else {
                log::info!("{}: {name}: {}ms", unit.ctx.name, elapsed.as_millis());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gear_passes_run_in_order() {
        let pl = Pipeline::gear().unwrap();
        assert_eq!(
            pl.names().collect::<Vec<_>>(),
            vec![
                "infer-registers",
                "schedule",
                "check-registers",
                "register-resets",
                "inline",
                "lower-registers",
                "exit-cond",
                "dead-code"
            ]
        );
        assert!(pl.complete_help().contains("- inline: "));
    }

    #[test]
    fn duplicate_passes_are_rejected() {
        let mut pl = Pipeline::func().unwrap();
        assert!(pl.register_pass::<Inline>().is_err());
    }
}
