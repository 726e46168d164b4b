//! Interface for a seqc backend.
use seqc_ir::{Bin, BinId, Context, rtl::Module};
use seqc_utils::{Error, OutputFile, SeqResult};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Instant,
};

/// Header written at the top of every emitted file. Carries no date or user
/// so that re-emitting a program is byte-identical.
const BANNER: [&str; 2] = [
    "This file was generated by seqc.",
    "DO NOT EDIT THIS FILE BY HAND! Your changes will be overwritten.",
];

/// One bin with the module synthesized for it. `module` is only present
/// for backends that ask for it through [Backend::needs_module].
pub struct Unit<'a> {
    pub ctx: &'a Context,
    pub bin: &'a Bin,
    pub module: Option<&'a Module>,
}

impl<'a> Unit<'a> {
    /// The synthesized module, or an error if it was never built.
    pub fn synthesized(&self) -> SeqResult<&'a Module> {
        self.module.ok_or_else(|| {
            Error::misc(format!("bin `{}' was not synthesized", self.bin.name))
        })
    }
}

/// A backend for seqc.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;

    /// Files written for `bin` in directory mode. Output `i` of
    /// [Backend::emit] goes to file `i`.
    fn file_names(&self, bin: &Bin) -> Vec<String>;

    /// Whether descendants of the top bin are emitted too when recursion is
    /// requested.
    fn recursive(&self) -> bool {
        true
    }

    /// Whether [Backend::emit] reads the synthesized module. Backends that
    /// only print bin metadata skip synthesis.
    fn needs_module(&self) -> bool {
        true
    }

    /// Line comment marker of the output format.
    fn comment(&self) -> &'static str {
        "//"
    }

    /// Check the synthesized module before anything is written.
    fn validate(&self, _unit: &Unit) -> SeqResult<()> {
        Ok(())
    }

    /// Write output `part` of `unit`, without the banner.
    fn emit(&self, unit: &Unit, part: usize, out: &mut dyn Write) -> SeqResult<()>;

    fn banner(&self, out: &mut dyn Write) -> SeqResult<()> {
        for line in BANNER {
            writeln!(out, "{} {}", self.comment(), line)?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Synthesize, validate and emit every requested bin into one stream.
    /// Later runs on the same `file` append to it.
    fn run(
        &self,
        ctx: &Context,
        top: BinId,
        recurse: bool,
        file: &mut OutputFile,
    ) -> SeqResult<()> {
        let modules = synthesize(
            ctx,
            top,
            recurse && self.recursive(),
            self.needs_module(),
        );
        let units = units(ctx, &modules);
        units.iter().try_for_each(|u| self.validate(u))?;
        let mut out = file.get_write()?;
        self.banner(&mut out)?;
        for unit in &units {
            let time = Instant::now();
            for part in 0..self.file_names(unit.bin).len() {
                self.emit(unit, part, &mut out)?;
            }
            log::info!(
                "{}: emitted `{}' in {}ms",
                self.name(),
                unit.bin.name,
                time.elapsed().as_millis()
            );
        }
        out.flush()?;
        Ok(())
    }

    /// Write one file per bin and output into `dir`.
    fn run_dir(
        &self,
        ctx: &Context,
        top: BinId,
        recurse: bool,
        dir: &Path,
    ) -> SeqResult<()> {
        let modules = synthesize(
            ctx,
            top,
            recurse && self.recursive(),
            self.needs_module(),
        );
        let units = units(ctx, &modules);
        units.iter().try_for_each(|u| self.validate(u))?;
        std::fs::create_dir_all(dir)?;
        for unit in &units {
            for (part, name) in self.file_names(unit.bin).into_iter().enumerate() {
                let path = dir.join(&name);
                let mut out = BufWriter::new(File::create(&path).map_err(|e| {
                    Error::misc(format!("cannot create {}: {e}", path.display()))
                })?);
                self.banner(&mut out)?;
                self.emit(unit, part, &mut out)?;
                out.flush()?;
                log::info!("{}: wrote {}", self.name(), path.display());
            }
        }
        Ok(())
    }
}

fn synthesize(
    ctx: &Context,
    top: BinId,
    recurse: bool,
    build: bool,
) -> Vec<(BinId, Option<Module>)> {
    let ids = if recurse {
        ctx.postorder(top)
    } else {
        vec![top]
    };
    ids.into_iter()
        .map(|id| (id, build.then(|| seqc_synth::synthesize_bin(ctx, id))))
        .collect()
}

fn units<'a>(
    ctx: &'a Context,
    modules: &'a [(BinId, Option<Module>)],
) -> Vec<Unit<'a>> {
    modules
        .iter()
        .map(|(id, module)| Unit {
            ctx,
            bin: ctx.bin(*id),
            module: module.as_ref(),
        })
        .collect()
}
