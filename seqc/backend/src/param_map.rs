//! Dispatch index to sequence name, one line per top-level sequence. Useful
//! as a translate file for the `seq` selector in a waveform viewer.
use crate::traits::{Backend, Unit};
use seqc_ir::Bin;
use seqc_utils::SeqResult;
use std::io::Write;

#[derive(Default)]
pub struct ParamMapBackend;

impl Backend for ParamMapBackend {
    fn name(&self) -> &'static str {
        "map"
    }

    fn needs_module(&self) -> bool {
        false
    }

    fn file_names(&self, bin: &Bin) -> Vec<String> {
        vec![format!("{}.map", bin.name)]
    }

    fn comment(&self) -> &'static str {
        "#"
    }

    fn emit(&self, unit: &Unit, _part: usize, out: &mut dyn Write) -> SeqResult<()> {
        for (i, node) in unit.bin.top_level().enumerate() {
            writeln!(out, "{i} {}", node.name)?;
        }
        Ok(())
    }
}
