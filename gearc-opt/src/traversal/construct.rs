use crate::Unit;
use gearc_utils::GearcResult;

/// Trait that describes named things. The pass pipeline requires this to
/// be implemented.
///
/// This has to be a separate trait from [`Pass`] because these methods don't
/// receive `self`.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}

/// A transformation of a [Unit].
pub trait Pass {
    fn run(&mut self, unit: &mut Unit) -> GearcResult<()>;

    /// Build a [Default] implementation of this pass and run it.
    #[inline(always)]
    fn do_pass_default(unit: &mut Unit) -> GearcResult<Self>
    where
        Self: Default + Sized + Named,
    {
        let mut pass = Self::default();
        pass.run(unit)?;
        Ok(pass)
    }
}
