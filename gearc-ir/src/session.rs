//! Compiler state shared across translation units.
use crate::{Context, DType, FuncBlock, Value};
use gearc_frontend::Program;
use gearc_utils::{Error, GPosIdx, Id, NameGenerator};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;

/// User-facing translation settings.
#[derive(Clone, Debug)]
pub struct TranslateConfig {
    /// Upper bound on iterations of a compile-time unfolded loop.
    pub max_unfold: usize,
    /// Log the IR after each pass.
    pub dump_ir: bool,
    /// Gear to translate. Defaults to the last gear of the program.
    pub top: Option<Id>,
    /// Parameter overrides for the top gear.
    pub params: Vec<(Id, Value)>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        TranslateConfig {
            max_unfold: 1024,
            dump_ir: false,
            top: None,
            params: vec![],
        }
    }
}

/// A translation unit in progress.
#[derive(Clone, Debug)]
pub struct Frame {
    pub unit: Id,
    /// Where the unit was called from.
    pub pos: GPosIdx,
}

/// A helper function together with its translation context.
#[derive(Clone, Debug)]
pub struct TranslatedFunc {
    pub block: FuncBlock,
    pub ctx: Context,
}

/// Memoization key of helper functions.
type FuncKey = (String, Vec<DType>);

pub struct Session<'p> {
    pub program: &'p Program,
    pub config: TranslateConfig,
    frames: Vec<Frame>,
    memo: HashMap<FuncKey, Id>,
    funcs: LinkedHashMap<Id, TranslatedFunc>,
    func_names: NameGenerator,
}

impl<'p> Session<'p> {
    pub fn new(program: &'p Program, config: TranslateConfig) -> Self {
        let mut func_names = NameGenerator::default();
        program.gears.iter().for_each(|g| func_names.add_name(g.name));
        Session {
            program,
            config,
            frames: vec![],
            memo: HashMap::new(),
            funcs: LinkedHashMap::new(),
            func_names,
        }
    }

    pub fn push_frame(&mut self, unit: Id, pos: GPosIdx) {
        self.frames.push(Frame { unit, pos });
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Whether `unit` is currently being translated.
    pub fn in_progress(&self, unit: Id) -> bool {
        self.frames.iter().any(|f| f.unit == unit)
    }

    /// The active units, innermost first.
    pub fn frames(&self) -> Vec<String> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .map(|(i, frame)| match i.checked_sub(1).map(|c| &self.frames[c]) {
                Some(caller) => match frame.pos.into_option() {
                    Some(pos) => {
                        let (file, line, col) = pos.get_location();
                        format!(
                            "translating `{}' (called from `{}' at {file}:{line}:{col})",
                            frame.unit, caller.unit
                        )
                    }
                    None => format!(
                        "translating `{}' (called from `{}')",
                        frame.unit, caller.unit
                    ),
                },
                None => format!("translating `{}'", frame.unit),
            })
            .collect()
    }

    /// Attach the active frames to an error that has none yet.
    pub fn contextualize(&self, err: Error) -> Error {
        err.with_frames(self.frames())
    }

    pub fn lookup_func(&self, source: &str, args: &[DType]) -> Option<Id> {
        self.memo.get(&(source.to_string(), args.to_vec())).copied()
    }

    /// Reserve a unique name for a translation of helper function `base`.
    pub fn gen_func_name(&mut self, base: Id) -> Id {
        self.func_names.gen_name(base)
    }

    pub fn add_func(&mut self, source: String, args: Vec<DType>, func: TranslatedFunc) {
        self.memo.insert((source, args), func.block.name);
        self.funcs.insert(func.block.name, func);
    }

    pub fn func(&self, name: Id) -> Option<&TranslatedFunc> {
        self.funcs.get(&name)
    }

    pub fn funcs(&self) -> impl Iterator<Item = &TranslatedFunc> {
        self.funcs.values()
    }

    pub fn funcs_mut(&mut self) -> impl Iterator<Item = &mut TranslatedFunc> {
        self.funcs.iter_mut().map(|(_, f)| f)
    }

    /// Move out the translated helper functions, in translation order.
    pub fn take_funcs(&mut self) -> Vec<TranslatedFunc> {
        std::mem::take(&mut self.funcs)
            .into_iter()
            .map(|(_, f)| f)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_innermost_first() {
        let prog = Program::default();
        let mut sess = Session::new(&prog, TranslateConfig::default());
        sess.push_frame(Id::new("top"), GPosIdx::UNKNOWN);
        sess.push_frame(Id::new("helper"), GPosIdx::UNKNOWN);
        assert!(sess.in_progress(Id::new("top")));
        let frames = sess.frames();
        assert_eq!(frames[0], "translating `helper' (called from `top')");
        assert_eq!(frames[1], "translating `top'");
        let err = sess.contextualize(Error::misc("boom"));
        sess.pop_frame();
        let err = sess.contextualize(err);
        assert_eq!(err.frames().len(), 2);
    }
}
