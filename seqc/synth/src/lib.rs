//! Lowers linked bins into structural RTL modules.
mod arith;
mod assemble;

pub use assemble::{STALL_COUNT, child_net};

use linked_hash_map::LinkedHashMap;
use seqc_ir::{
    Bin, BinId, Context,
    rtl::{Design, Module},
};
use seqc_utils::bits_needed_for;
use std::time::Instant;

/// Width of the `seq` selector of a bin.
pub fn seq_width(bin: &Bin) -> u64 {
    bits_needed_for(bin.seqs.len() as u64)
}

/// Build the module implementing one bin.
pub fn synthesize_bin(ctx: &Context, id: BinId) -> Module {
    let time = Instant::now();
    let bin = ctx.bin(id);
    let module = assemble::Assembler::new(ctx, bin).assemble();
    log::info!(
        "Synthesized `{}` ({} nets, {} processes) in {}ms",
        bin.name,
        module.decls.len(),
        module.processes.len(),
        time.elapsed().as_millis()
    );
    module
}

/// Build `top` and, with `recurse`, every bin below it (children first,
/// each once).
pub fn synthesize(ctx: &Context, top: BinId, recurse: bool) -> Design {
    let ids = if recurse {
        ctx.postorder(top)
    } else {
        vec![top]
    };
    let mut modules = LinkedHashMap::new();
    for id in ids {
        let module = synthesize_bin(ctx, id);
        modules.insert(module.name, module);
    }
    Design {
        modules,
        top: ctx.bin(top).name,
    }
}
