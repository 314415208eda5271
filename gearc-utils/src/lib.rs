//! Shared utilities for the gearc compiler.
mod errors;
mod id;
mod namegenerator;
mod out_file;
mod position;

mod math;

pub use errors::{Error, ErrorKind, GearcResult};
pub use id::{GSym, GetName, Id};
pub use math::{bit_width, bits_needed_for};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
pub use position::{
    FileIdx, GPosIdx, GlobalPositionTable, PosIdx, PositionTable, WithPos,
};
