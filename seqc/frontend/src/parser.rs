//! Reading descriptions from text.
use crate::ast::Description;
use seqc_utils::{Error, SeqResult};
use std::{fs, io::Read, path::Path, time::Instant};

/// Parse a description held in memory.
pub fn parse_str(src: &str) -> SeqResult<Description> {
    serde_json::from_str(src).map_err(Error::parse_error)
}

/// Parse a description from a file.
pub fn parse_file(path: &Path) -> SeqResult<Description> {
    let time = Instant::now();
    let src = fs::read_to_string(path).map_err(|e| {
        Error::misc(format!("cannot read {}: {e}", path.display()))
    })?;
    let desc = parse_str(&src).map_err(|e| e.within(path.display()))?;
    log::info!(
        "Parsed `{}' in {}ms",
        path.display(),
        time.elapsed().as_millis()
    );
    Ok(desc)
}

/// Parse a description from a stream, usually stdin.
pub fn parse_reader<R: Read>(mut input: R) -> SeqResult<Description> {
    let mut src = String::new();
    input.read_to_string(&mut src)?;
    parse_str(&src)
}
