use crate::{Node, Port, Seq, SeqIdx, Signal};
use linked_hash_map::LinkedHashMap;
use seqc_utils::{GetName, Id};
use smallvec::SmallVec;

/// Names every module already uses for its own interface.
pub const RESERVED_NAMES: &[&str] =
    &["clk", "reset_n", "seq", "start", "running", "done", "done_"];

/// Handle to a bin stored in a [crate::Context].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinId(u32);

impl BinId {
    pub(crate) fn new(idx: usize) -> Self {
        BinId(idx as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Kinds of node that share one piece of hardware per bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StaticKind {
    /// The free running stall counter.
    Stall,
}

/// Every instance sharing a static resource, plus the widest width any of
/// them needs.
#[derive(Clone, Debug, Default)]
pub struct Bucket {
    pub insts: Vec<SeqIdx>,
    pub max_width: u64,
}

/// Shared static resources, collected while linking and consumed once when
/// the bin is synthesized.
#[derive(Clone, Debug, Default)]
pub struct SeqData {
    buckets: LinkedHashMap<StaticKind, Bucket>,
}

impl SeqData {
    pub(crate) fn join(&mut self, kind: StaticKind, idx: SeqIdx, width: u64) {
        let bucket = self.buckets.entry(kind).or_default();
        bucket.insts.push(idx);
        bucket.max_width = bucket.max_width.max(width);
    }

    pub fn get(&self, kind: StaticKind) -> Option<&Bucket> {
        self.buckets.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StaticKind, &Bucket)> {
        self.buckets.iter()
    }
}

/// Authoring form of a bin.
#[derive(Clone, Debug)]
pub struct BinDef {
    pub name: Id,
    /// Position in this list is the dispatch index.
    pub seqs: Vec<Seq>,
    pub regs: Vec<Signal>,
    pub children: Vec<BinId>,
    /// Register the `done` output (one cycle later) instead of driving it
    /// combinationally.
    pub register_done: bool,
    /// Every top-level sequence is promised to take a single cycle.
    pub len1: bool,
    /// Reset name used when instantiating this bin from hand written code.
    pub reset_n: Id,
}

impl BinDef {
    pub fn new<S: Into<Id>>(name: S, seqs: Vec<Seq>) -> Self {
        BinDef {
            name: name.into(),
            seqs,
            regs: vec![],
            children: vec![],
            register_done: true,
            len1: false,
            reset_n: "reset_n".into(),
        }
    }

    pub fn with_regs(mut self, regs: Vec<Signal>) -> Self {
        self.regs = regs;
        self
    }

    pub fn with_children(mut self, children: Vec<BinId>) -> Self {
        self.children = children;
        self
    }

    pub fn combinational_done(mut self) -> Self {
        self.register_done = false;
        self
    }

    pub fn single_cycle(mut self) -> Self {
        self.len1 = true;
        self
    }

    pub fn with_reset_name<S: Into<Id>>(mut self, name: S) -> Self {
        self.reset_n = name.into();
        self
    }
}

/// A fully linked control container. Compiles to one module.
#[derive(Clone, Debug)]
pub struct Bin {
    pub name: Id,
    /// Top-level sequences in dispatch order.
    pub seqs: Vec<SeqIdx>,
    /// Node arena, in pre-order.
    pub nodes: Vec<Node>,
    pub allseqs: LinkedHashMap<Id, SeqIdx>,
    pub regs: LinkedHashMap<Id, Signal>,
    pub ports: LinkedHashMap<Id, Port>,
    pub children: Vec<crate::BinId>,
    /// Start wires that may trigger each child bin, OR-ed together.
    pub child_starts: LinkedHashMap<BinId, SmallVec<[Id; 2]>>,
    pub seqdata: SeqData,
    pub register_done: bool,
    pub len1: bool,
    pub reset_n: Id,
}

impl Bin {
    pub fn node(&self, idx: SeqIdx) -> &Node {
        &self.nodes[idx.index()]
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.allseqs.get(&Id::from(name)).map(|idx| self.node(*idx))
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Node> {
        self.seqs.iter().map(|idx| self.node(*idx))
    }

    /// Position of a top-level sequence.
    pub fn dispatch_index(&self, name: Id) -> Option<usize> {
        self.seqs.iter().position(|idx| self.node(*idx).name == name)
    }

    /// Registers that are not visible as ports.
    pub fn internal_regs(&self) -> impl Iterator<Item = &Signal> {
        self.regs
            .values()
            .filter(|r| !self.ports.contains_key(&r.name))
    }
}

impl GetName for Bin {
    fn name(&self) -> Id {
        self.name
    }
}
