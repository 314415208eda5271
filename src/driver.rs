//! Driver for the gearc compiler.
use crate::cmdline::{OutputFormat, Opts};
use crate::translate::translate;
use gearc_frontend::GearParser;
use gearc_ir::{Printer, TranslateConfig};
use gearc_opt::pipeline::Pipeline;
use gearc_utils::{Error, GearcResult, Id};
use std::io::Write;

/// Run the compiler from the command line.
pub fn run_compiler() -> GearcResult<()> {
    // parse the command line arguments into Opts struct
    let opts = Opts::get_opts()?;

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    // list the passes when --list-passes is given
    if opts.list_passes {
        println!("{}", Pipeline::gear()?.complete_help());
        return Ok(());
    }

    let Some(file) = &opts.file else {
        return Err(Error::misc("no input file provided"));
    };
    let program = GearParser::parse_file(file)?;
    let config = TranslateConfig {
        max_unfold: opts.max_unfold,
        dump_ir: opts.dump_ir,
        top: opts.top.as_deref().map(Id::new),
        params: opts.params.iter().map(|p| (p.name, p.value.clone())).collect(),
    };
    let translation = translate(&program, config)?;

    let mut out = opts
        .output
        .get_write()
        .map_err(|e| Error::write_error(format!("{}: {e}", opts.output)))?;
    match opts.format {
        OutputFormat::Text => Printer::write_translation(&translation, &mut out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &translation)
                .map_err(|e| Error::write_error(format!("JSON Error: {e}")))?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
