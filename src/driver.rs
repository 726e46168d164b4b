//! Driver for the seqc compiler.
use crate::cmdline::Opts;
use seqc_frontend::Workspace;
use seqc_utils::{Error, SeqResult};
use std::time::Instant;

/// Run the compiler from the command line.
pub fn run_compiler() -> SeqResult<()> {
    let opts = Opts::get_opts();

    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    run(opts)
}

/// Load the description named by `opts` and run the requested backends.
pub fn run(opts: Opts) -> SeqResult<()> {
    let time = Instant::now();
    let mut ws = match &opts.file {
        Some(path) => Workspace::from_file(path)?,
        None => Workspace::from_reader(std::io::stdin().lock())?,
    };
    if let Some(name) = &opts.top {
        ws.top = ws.ctx.find_bin(name).ok_or_else(|| {
            Error::not_found(format!("top bin `{name}' is not defined"))
        })?;
    }
    log::info!(
        "Loaded {} bins in {}ms",
        ws.ctx.bins().count(),
        time.elapsed().as_millis()
    );

    let recurse = !opts.no_recurse;
    let mut output = opts.output;
    for backend in opts.backend.backends() {
        match &opts.dir {
            Some(dir) => backend.run_dir(&ws.ctx, ws.top, recurse, dir)?,
            None => backend.run(&ws.ctx, ws.top, recurse, &mut output)?,
        }
    }
    Ok(())
}
