use crate::{Block, DType, FuncBlock, Interface, Submodule, Value, Variable};
use gearc_utils::Id;

/// A variable that persists across cycles. The emitter loads `next` when
/// `enable` is set, and `reset` on reset or when the body completes.
///
/// `enable` already includes the completion of the current cycle: it stays
/// low while the body is stalled on a handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Register {
    pub name: Id,
    pub dtype: DType,
    pub reset: Option<Value>,
    pub next: Id,
    pub enable: Id,
}

/// The result of translating one gear, ready for an HDL emitter.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Translation {
    pub name: Id,
    pub params: Vec<(Id, Value)>,
    pub body: Block,
    pub registers: Vec<Register>,
    pub interfaces: Vec<Interface>,
    /// Combinational variables, including register inputs.
    pub variables: Vec<Variable>,
    pub funcs: Vec<FuncBlock>,
    pub submodules: Vec<Submodule>,
    pub state_reg: Option<Id>,
    /// Number of cycle-states.
    pub states: u32,
    pub rst_cond: Id,
}

impl Translation {
    pub fn register(&self, name: Id) -> Option<&Register> {
        self.registers.iter().find(|r| r.name == name)
    }

    pub fn interface(&self, name: Id) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}
