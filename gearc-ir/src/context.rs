use crate::{DType, Expr, StmtId, Value};
use gearc_frontend::Direction;
use gearc_utils::{Error, GPosIdx, GearcResult, Id, NameGenerator};
use linked_hash_map::LinkedHashMap;
use std::collections::{BTreeSet, HashMap};

/// Role of a variable in the generated logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum VarKind {
    /// A combinational value.
    Wire,
    /// Persists across cycles.
    Register,
    /// A helper function argument.
    Arg,
    /// The `_next` or `_en` input of a lowered register.
    RegInput,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Variable {
    pub name: Id,
    /// Fixed by the first assignment unless declared.
    pub dtype: Option<DType>,
    pub kind: VarKind,
    pub reset: Option<Value>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

impl Variable {
    pub fn new(name: Id, dtype: Option<DType>, kind: VarKind) -> Self {
        Variable {
            name,
            dtype,
            kind,
            reset: None,
            pos: GPosIdx::UNKNOWN,
        }
    }

    pub fn is_reg(&self) -> bool {
        self.kind == VarKind::Register
    }

    pub fn to_expr(&self) -> Expr {
        Expr::name(self.name, self.dtype.clone())
    }
}

/// A handshake channel.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Interface {
    pub name: Id,
    pub dtype: DType,
    pub direction: Direction,
    /// Gear ports, as opposed to channels connecting submodules.
    pub port: bool,
}

/// Instantiation of another gear.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Submodule {
    pub name: Id,
    pub gear: Id,
    pub params: Vec<(Id, Value)>,
    /// Callee input port bound to a local interface.
    pub inputs: Vec<(Id, Id)>,
    /// Callee output port bound to a local interface.
    pub outputs: Vec<(Id, Id)>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pos: GPosIdx,
}

#[derive(Clone, Debug)]
pub enum ScopeEntry {
    Var(Variable),
    Intf(Interface),
    /// Compile-time constants. Parameters may not be reassigned.
    Const { value: Value, param: bool },
}

/// Definitions that may reach a program point: the defined name and the
/// defining statement.
pub type DefSet = BTreeSet<(Id, StmtId)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Gear,
    Func,
}

/// Per-translation-unit state: one for each gear body and one for each
/// translated helper function.
#[derive(Clone, Debug)]
pub struct Context {
    pub name: Id,
    pub kind: UnitKind,
    scope: LinkedHashMap<Id, ScopeEntry>,
    pub submodules: Vec<Submodule>,
    /// Helper functions called from this unit.
    pub funcs: BTreeSet<Id>,
    /// Reaching definitions at each statement.
    pub reaching: HashMap<StmtId, DefSet>,
    pub state_reg: Option<Id>,
    pub rst_cond: Option<Id>,
    /// Set once the work of the current cycle has completed.
    pub cycle_done: Option<Id>,
    /// Return type of a helper function.
    pub ret_dtype: Option<DType>,
    namegen: NameGenerator,
    next_id: u32,
}

impl Context {
    pub fn new(name: Id, kind: UnitKind) -> Self {
        Context {
            name,
            kind,
            scope: LinkedHashMap::new(),
            submodules: vec![],
            funcs: BTreeSet::new(),
            reaching: HashMap::new(),
            state_reg: None,
            rst_cond: None,
            cycle_done: None,
            ret_dtype: None,
            namegen: NameGenerator::default(),
            next_id: 0,
        }
    }

    pub fn fresh_id(&mut self) -> StmtId {
        self.next_id += 1;
        StmtId(self.next_id)
    }

    /// A name not used anywhere in this unit.
    pub fn gen_name(&mut self, prefix: &str) -> Id {
        loop {
            let name = self.namegen.gen_name(prefix);
            if !self.scope.contains_key(&name) {
                return name;
            }
        }
    }

    pub fn lookup(&self, name: Id) -> Option<&ScopeEntry> {
        self.scope.get(&name)
    }

    pub fn variable(&self, name: Id) -> Option<&Variable> {
        match self.scope.get(&name) {
            Some(ScopeEntry::Var(v)) => Some(v),
            _ => None,
        }
    }

    pub fn variable_mut(&mut self, name: Id) -> Option<&mut Variable> {
        match self.scope.get_mut(&name) {
            Some(ScopeEntry::Var(v)) => Some(v),
            _ => None,
        }
    }

    pub fn interface(&self, name: Id) -> Option<&Interface> {
        match self.scope.get(&name) {
            Some(ScopeEntry::Intf(i)) => Some(i),
            _ => None,
        }
    }

    /// Bind a new variable. Only constants that are not parameters may
    /// be shadowed.
    pub fn declare(&mut self, var: Variable) -> GearcResult<()> {
        match self.scope.get(&var.name) {
            None | Some(ScopeEntry::Const { param: false, .. }) => {
                self.namegen.add_name(var.name);
                self.scope.insert(var.name, ScopeEntry::Var(var));
                Ok(())
            }
            Some(ScopeEntry::Var(_)) => Err(Error::misc(format!(
                "variable `{}' is already declared",
                var.name
            ))),
            Some(ScopeEntry::Intf(_)) => Err(Error::misc(format!(
                "`{}' is an interface and cannot be assigned",
                var.name
            ))),
            Some(ScopeEntry::Const { param: true, .. }) => Err(Error::misc(
                format!("parameter `{}' cannot be assigned", var.name),
            )),
        }
    }

    pub fn add_interface(&mut self, intf: Interface) -> GearcResult<()> {
        if self.scope.contains_key(&intf.name) {
            return Err(Error::misc(format!(
                "interface `{}' is already defined",
                intf.name
            )));
        }
        self.namegen.add_name(intf.name);
        self.scope.insert(intf.name, ScopeEntry::Intf(intf));
        Ok(())
    }

    pub fn set_const(&mut self, name: Id, value: Value, param: bool) {
        self.namegen.add_name(name);
        self.scope.insert(name, ScopeEntry::Const { value, param });
    }

    /// Replace a binding, returning the previous one.
    pub fn rebind(&mut self, name: Id, entry: Option<ScopeEntry>) -> Option<ScopeEntry> {
        match entry {
            Some(e) => self.scope.insert(name, e),
            None => self.scope.remove(&name),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.scope.values().filter_map(|e| match e {
            ScopeEntry::Var(v) => Some(v),
            _ => None,
        })
    }

    pub fn variables_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.scope.iter_mut().filter_map(|(_, e)| match e {
            ScopeEntry::Var(v) => Some(v),
            _ => None,
        })
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.scope.values().filter_map(|e| match e {
            ScopeEntry::Intf(i) => Some(i),
            _ => None,
        })
    }

    /// Parameters with their values, in declaration order.
    pub fn params(&self) -> Vec<(Id, Value)> {
        self.scope
            .iter()
            .filter_map(|(n, e)| match e {
                ScopeEntry::Const { value, param: true } => Some((*n, value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn registers(&self) -> impl Iterator<Item = &Variable> {
        self.variables().filter(|v| v.is_reg())
    }

    pub fn register_names(&self) -> BTreeSet<Id> {
        self.registers().map(|v| v.name).collect()
    }

    /// Flag exactly the variables in `names` as registers.
    pub fn set_registers(&mut self, names: &BTreeSet<Id>) {
        for v in self.variables_mut() {
            if names.contains(&v.name) {
                v.kind = VarKind::Register;
            } else if v.kind == VarKind::Register {
                v.kind = VarKind::Wire;
            }
        }
    }

    /// Whether `name` is a plain combinational variable.
    pub fn is_wire(&self, name: Id) -> bool {
        self.variable(name).is_some_and(|v| v.kind == VarKind::Wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoping_rules() {
        let mut ctx = Context::new(Id::new("g"), UnitKind::Gear);
        ctx.set_const(Id::new("W"), Value::int(8), true);
        ctx.set_const(Id::new("i"), Value::int(0), false);
        assert!(ctx.declare(Variable::new(Id::new("W"), None, VarKind::Wire)).is_err());
        assert!(ctx.declare(Variable::new(Id::new("i"), None, VarKind::Wire)).is_ok());
        assert!(ctx.declare(Variable::new(Id::new("i"), None, VarKind::Wire)).is_err());
        let n = ctx.gen_name("i");
        assert_ne!(n, Id::new("i"));
        assert_eq!(ctx.params(), vec![(Id::new("W"), Value::int(8))]);

        let regs = BTreeSet::from([Id::new("i")]);
        ctx.set_registers(&regs);
        assert_eq!(ctx.register_names(), regs);
        assert!(!ctx.is_wire(Id::new("i")));
        assert_ne!(ctx.fresh_id(), ctx.fresh_id());
    }
}
