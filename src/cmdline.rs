//! Command line parsing for the gearc compiler.
use argh::FromArgs;
use gearc_ir::Value;
use gearc_utils::{Error, GearcResult, Id, OutputFile};
use num_bigint::BigInt;
use std::path::PathBuf;
use std::str::FromStr;

/// How the translation is written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The IR printer.
    #[default]
    Text,
    /// The serialized translation record.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            s => Err(format!(
                "Unknown output format: {s}. Valid options: text, json"
            )),
        }
    }
}

/// A parameter override `NAME=VALUE`.
#[derive(Clone, Debug)]
pub struct ParamOverride {
    pub name: Id,
    pub value: Value,
}

impl FromStr for ParamOverride {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some((name, value)) = input.split_once('=') else {
            return Err(format!("expected NAME=VALUE, got `{input}'"));
        };
        let value = value.trim();
        let value = match value {
            "true" => Value::bool(true),
            "false" => Value::bool(false),
            v => {
                let parsed = if let Some(hex) = v.strip_prefix("0x") {
                    BigInt::parse_bytes(hex.as_bytes(), 16)
                } else if let Some(bin) = v.strip_prefix("0b") {
                    BigInt::parse_bytes(bin.as_bytes(), 2)
                } else {
                    v.parse().ok()
                };
                Value::int(parsed.ok_or_else(|| format!("bad value for `{name}': {v}"))?)
            }
        };
        Ok(ParamOverride {
            name: Id::new(name.trim()),
            value,
        })
    }
}

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// The gearc compiler
pub struct Opts {
    /// input gear program
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// output file, default is stdout
    #[argh(
        option,
        short = 'o',
        long = "output",
        default = "OutputFile::Stdout"
    )]
    pub output: OutputFile,

    /// gear to translate, defaults to the last gear of the program
    #[argh(option, long = "top")]
    pub top: Option<String>,

    /// override a parameter of the top gear: -p NAME=VALUE
    #[argh(option, short = 'p', long = "param")]
    pub params: Vec<ParamOverride>,

    /// maximum number of iterations of an unfolded loop
    #[argh(option, long = "max-unfold", default = "1024")]
    pub max_unfold: usize,

    /// log the IR after every pass
    #[argh(switch, long = "dump-ir")]
    pub dump_ir: bool,

    /// output format: text or json
    #[argh(option, long = "format", default = "OutputFormat::Text")]
    pub format: OutputFormat,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// list the passes run on every gear
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,
}

impl Opts {
    /// Parse the command line. An input file is required unless only the
    /// passes are listed.
    pub fn get_opts() -> GearcResult<Opts> {
        let opts: Opts = argh::from_env();
        if opts.file.is_none() && !opts.list_passes {
            return Err(Error::misc("no input file provided"));
        }
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_overrides() {
        let p: ParamOverride = "W=16".parse().unwrap();
        assert_eq!(p.name, Id::new("W"));
        assert_eq!(p.value, Value::int(16));
        let p: ParamOverride = "MASK=0xff".parse().unwrap();
        assert_eq!(p.value, Value::int(255));
        let p: ParamOverride = "TOP=0x100000000000000000000000000000000".parse().unwrap();
        assert_eq!(p.value.dtype(), Some(gearc_ir::DType::Uint(129)));
        let p: ParamOverride = "EN=true".parse().unwrap();
        assert_eq!(p.value, Value::bool(true));
        assert!("W".parse::<ParamOverride>().is_err());
        assert!("W=abc".parse::<ParamOverride>().is_err());
    }

    #[test]
    fn output_formats() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("verilog".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn command_line() {
        let opts = Opts::from_args(
            &["gearc"],
            &["prog.gear", "--top", "acc", "-p", "W=8", "--format", "json"],
        )
        .unwrap();
        assert_eq!(opts.top.as_deref(), Some("acc"));
        assert_eq!(opts.params.len(), 1);
        assert_eq!(opts.format, OutputFormat::Json);
        assert_eq!(opts.max_unfold, 1024);
        assert_eq!(opts.log_level, log::LevelFilter::Warn);
    }
}
