use crate::{Bin, BinDef, BinId, link::Linker};
use seqc_utils::{Error, Id, NameGenerator, SeqResult};
use std::time::Instant;

/// A top-level sequence of a built bin, usable as a `Child` target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeqRef {
    pub bin: BinId,
    pub index: usize,
}

/// Owns every bin of a program and the name counter used while building
/// them. Bins are added bottom up: children before their parents.
#[derive(Default, Debug)]
pub struct Context {
    bins: Vec<Bin>,
    namegen: NameGenerator,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `def` into a new bin. On error nothing is added and the name
    /// counter is left untouched.
    pub fn add_bin(&mut self, def: BinDef) -> SeqResult<BinId> {
        let time = Instant::now();
        let name = def.name;
        if self.find_bin(name.as_str()).is_some() {
            return Err(Error::naming_conflict(format!(
                "bin `{name}' is already defined"
            )));
        }
        let mut namegen = self.namegen.clone();
        let bin = Linker::new(&self.bins, &mut namegen)
            .link(def)
            .map_err(|e| e.within(format!("bin `{name}'")))?;
        self.namegen = namegen;
        let id = BinId::new(self.bins.len());
        log::info!(
            "Linked `{}` ({} nodes) in {}ms",
            name,
            bin.nodes.len(),
            time.elapsed().as_millis()
        );
        self.bins.push(bin);
        Ok(id)
    }

    pub fn bin(&self, id: BinId) -> &Bin {
        &self.bins[id.index()]
    }

    pub fn get(&self, id: BinId) -> Option<&Bin> {
        self.bins.get(id.index())
    }

    pub fn bins(&self) -> impl Iterator<Item = (BinId, &Bin)> {
        self.bins
            .iter()
            .enumerate()
            .map(|(i, b)| (BinId::new(i), b))
    }

    pub fn find_bin(&self, name: &str) -> Option<BinId> {
        self.bins
            .iter()
            .position(|b| b.name == name)
            .map(BinId::new)
    }

    /// The most recently added bin, conventionally the top of the hierarchy.
    pub fn last(&self) -> Option<BinId> {
        self.bins.len().checked_sub(1).map(BinId::new)
    }

    /// Reference to a top-level sequence of a built bin.
    pub fn seq_ref(&self, bin: BinId, name: &str) -> Option<SeqRef> {
        let index = self.get(bin)?.dispatch_index(Id::from(name))?;
        Some(SeqRef { bin, index })
    }

    /// `top` and every bin below it, children before parents, each once.
    pub fn postorder(&self, top: BinId) -> Vec<BinId> {
        fn visit(ctx: &Context, id: BinId, out: &mut Vec<BinId>) {
            if out.contains(&id) {
                return;
            }
            for child in &ctx.bin(id).children {
                visit(ctx, *child, out);
            }
            out.push(id);
        }
        let mut out = vec![];
        visit(self, top, &mut out);
        out
    }
}
