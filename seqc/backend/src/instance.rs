//! Snippets for instantiating the top bin from hand written Verilog: the
//! wires it drives and the instance itself.
use crate::traits::{Backend, Unit};
use crate::verilog::range;
use seqc_ir::{Bin, Direction};
use seqc_utils::SeqResult;
use std::io::Write;

#[derive(Default)]
pub struct InstanceBackend;

impl InstanceBackend {
    fn wires(unit: &Unit, out: &mut dyn Write) -> SeqResult<()> {
        let bin = unit.bin;
        for port in bin.ports.values().filter(|p| p.dir == Direction::Output) {
            writeln!(out, "wire {}{};", range(port.sig.width), port.sig.name)?;
        }
        writeln!(out, "wire {0}_running, {0}_done;", bin.name)?;
        Ok(())
    }

    fn instance(unit: &Unit, out: &mut dyn Write) -> SeqResult<()> {
        let bin = unit.bin;
        writeln!(out, "{0} u_{0}_ (", bin.name)?;
        writeln!(out, "    .clk(clk),")?;
        writeln!(out, "    .reset_n({}),", bin.reset_n)?;
        for name in bin.ports.keys() {
            writeln!(out, "    .{name}({name}),")?;
        }
        writeln!(out, "    .seq({}_seq),", bin.name)?;
        writeln!(out, "    .start({}_start),", bin.name)?;
        writeln!(out, "    .running({}_running),", bin.name)?;
        writeln!(out, "    .done({}_done)", bin.name)?;
        writeln!(out, ");")?;
        Ok(())
    }
}

impl Backend for InstanceBackend {
    fn name(&self) -> &'static str {
        "instance"
    }

    fn needs_module(&self) -> bool {
        false
    }

    fn file_names(&self, bin: &Bin) -> Vec<String> {
        vec![
            format!("{}_wires.v", bin.name),
            format!("{}_instance.v", bin.name),
        ]
    }

    fn recursive(&self) -> bool {
        false
    }

    fn emit(&self, unit: &Unit, part: usize, out: &mut dyn Write) -> SeqResult<()> {
        match part {
            0 => Self::wires(unit, out),
            _ => Self::instance(unit, out),
        }
    }
}
