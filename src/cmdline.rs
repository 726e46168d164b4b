//! Command line parsing for the seqc compiler.
use argh::FromArgs;
use seqc_backend::BackendOpt;
use seqc_utils::OutputFile;
use std::path::{Path, PathBuf};

#[derive(FromArgs, Debug)]
/// Compile hierarchical control sequences into Verilog state machines.
pub struct Opts {
    /// input JSON description. Reads stdin when absent.
    #[argh(positional, from_str_fn(read_path))]
    pub file: Option<PathBuf>,

    /// output file, default is stdout
    #[argh(option, short = 'o', default = "OutputFile::Stdout")]
    pub output: OutputFile,

    /// write one file per bin and output into this directory
    #[argh(option, short = 'd')]
    pub dir: Option<PathBuf>,

    /// select a backend: verilog, map, instance or all
    #[argh(option, short = 'b', default = "BackendOpt::default()")]
    pub backend: BackendOpt,

    /// bin to emit. Defaults to the description's `top`, then its last bin
    #[argh(option, short = 't')]
    pub top: Option<String>,

    /// only emit the top bin, not its descendants
    #[argh(switch, long = "no-recurse")]
    pub no_recurse: bool,

    /// logging level: off, error, warn, info, debug or trace
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

fn read_path(path: &str) -> Result<PathBuf, String> {
    Ok(Path::new(path).into())
}

impl Opts {
    pub fn get_opts() -> Self {
        argh::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Opts, String> {
        Opts::from_args(&["seqc"], args).map_err(|e| e.output)
    }

    #[test]
    fn defaults() {
        let opts = parse(&[]).unwrap();
        assert!(opts.file.is_none());
        assert!(matches!(opts.output, OutputFile::Stdout));
        assert!(opts.dir.is_none());
        assert_eq!(opts.backend, BackendOpt::Verilog);
        assert!(opts.top.is_none());
        assert!(!opts.no_recurse);
        assert_eq!(opts.log_level, log::LevelFilter::Warn);
    }

    #[test]
    fn every_option() {
        let opts = parse(&[
            "prog.json",
            "-o",
            "out.v",
            "-b",
            "all",
            "-t",
            "ctl",
            "--no-recurse",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(opts.file, Some(PathBuf::from("prog.json")));
        assert_eq!(opts.output.to_string(), "out.v");
        assert_eq!(opts.backend, BackendOpt::All);
        assert_eq!(opts.top.as_deref(), Some("ctl"));
        assert!(opts.no_recurse);
        assert_eq!(opts.log_level, log::LevelFilter::Debug);
    }

    #[test]
    fn bad_backend() {
        let err = parse(&["-b", "vhdl"]).unwrap_err();
        assert!(err.contains("not a valid backend"), "{err}");
    }
}
