//! The linked form of a sequence: every reference resolved against the
//! owning bin, stored in the bin's node arena.
use crate::{BinId, Exports, Justify, Signal};
use seqc_utils::{GetName, Id, math};

/// Index of a node in its bin's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqIdx(u32);

impl SeqIdx {
    pub(crate) fn new(idx: usize) -> Self {
        SeqIdx(idx as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Where a node hangs in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parent {
    /// A top-level sequence of the bin.
    Bin,
    Seq(SeqIdx),
}

/// A resolved operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Const { val: u128, width: u64 },
    /// An owned register or an input port.
    Net(Signal),
}

impl Value {
    pub fn constant(val: u128, width: u64) -> Self {
        Value::Const {
            val: val & math::mask(width),
            width,
        }
    }

    pub fn width(&self) -> u64 {
        match self {
            Value::Const { width, .. } => *width,
            Value::Net(sig) => sig.width,
        }
    }

    pub fn signed(&self) -> bool {
        match self {
            Value::Const { .. } => false,
            Value::Net(sig) => sig.signed,
        }
    }

    pub fn as_net(&self) -> Option<&Signal> {
        match self {
            Value::Net(sig) => Some(sig),
            Value::Const { .. } => None,
        }
    }
}

/// Register writes a node performs, on `start` or (with `at_end`) on `done`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetMap {
    pub entries: Vec<(Signal, Value)>,
    pub at_end: bool,
}

impl SetMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountDir {
    Down,
    Up,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetachMode {
    Always,
    Never,
    When(Value),
}

/// How a `Child` node reaches its target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildLink {
    /// A fixed top-level sequence of one child bin.
    Fixed { child: BinId, index: usize },
    /// Child bin in the top `child_bits` bits of `sel`, sequence index in the
    /// low `seq_bits` bits. Children are the owning bin's, in order.
    Dynamic {
        sel: Signal,
        child_bits: u64,
        seq_bits: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Set, Reset and Nop.
    Set(SetMap),
    Stall {
        count: Value,
        set: SetMap,
    },
    Trigger {
        reg: Signal,
        count: Option<Value>,
        active_high: bool,
    },
    Toggle {
        reg: Signal,
    },
    Sync {
        sync: Signal,
        active_high: bool,
        set: SetMap,
    },
    Child {
        link: ChildLink,
        set: SetMap,
        detach: DetachMode,
    },
    Serial {
        set: SetMap,
        term: Option<Value>,
    },
    Parallel,
    Select {
        sel: Value,
    },
    Repeat {
        count: Value,
        counter: Option<Signal>,
    },
    Count {
        dir: CountDir,
        reg: Signal,
        stop: Value,
        skip: Value,
    },
    Add {
        a: Value,
        b: Value,
        out: Signal,
        clamp: bool,
    },
    Multiply {
        a: Value,
        b: Value,
        out: Signal,
        justify: Justify,
        clamp: bool,
    },
    SerialMultiply {
        a: Value,
        b: Value,
        out: Signal,
        justify: Justify,
        clamp: bool,
    },
}

impl NodeKind {
    /// Nodes that share the bin-wide stall counter.
    pub fn uses_stall_counter(&self) -> bool {
        matches!(
            self,
            NodeKind::Stall { .. } | NodeKind::Trigger { count: Some(_), .. }
        )
    }

    /// The value the stall counter is compared against.
    pub fn stall_count(&self) -> Option<&Value> {
        match self {
            NodeKind::Stall { count, .. } => Some(count),
            NodeKind::Trigger { count, .. } => count.as_ref(),
            _ => None,
        }
    }

    pub fn set_map(&self) -> Option<&SetMap> {
        match self {
            NodeKind::Set(set)
            | NodeKind::Stall { set, .. }
            | NodeKind::Sync { set, .. }
            | NodeKind::Child { set, .. }
            | NodeKind::Serial { set, .. } => Some(set),
            _ => None,
        }
    }

    /// Registers this node writes, not counting its subsequences.
    pub fn written_regs(&self) -> Vec<Id> {
        let mut regs: Vec<Id> = self
            .set_map()
            .map(|s| s.entries.iter().map(|(r, _)| r.name).collect())
            .unwrap_or_default();
        match self {
            NodeKind::Trigger { reg, .. }
            | NodeKind::Toggle { reg }
            | NodeKind::Count { reg, .. } => regs.push(reg.name),
            NodeKind::Add { out, .. }
            | NodeKind::Multiply { out, .. }
            | NodeKind::SerialMultiply { out, .. } => regs.push(out.name),
            _ => (),
        }
        regs
    }
}

/// A linked sequence node.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: Id,
    /// Variant name as authored, for diagnostics.
    pub origin: &'static str,
    pub kind: NodeKind,
    pub subseqs: Vec<SeqIdx>,
    pub parent: Parent,
    pub exports: Exports,
    pub dryrun: Option<Value>,
}

impl Node {
    /// One-cycle start pulse.
    pub fn start(&self) -> Id {
        Id::from(format!("seq_{}_start_", self.name))
    }

    /// Completion pulse.
    pub fn done(&self) -> Id {
        Id::from(format!("seq_{}_done_", self.name))
    }

    /// Registered activity level.
    pub fn running(&self) -> Id {
        Id::from(format!("seq_{}_running_", self.name))
    }

    /// Name for a helper net private to this node.
    pub fn local(&self, suffix: &str) -> Id {
        Id::from(format!("seq_{}_{}_", self.name, suffix))
    }

    /// Start wire for one child of a dynamically addressed `Child` node.
    pub fn child_start(&self, child: Id) -> Id {
        self.local(&format!("start_{child}"))
    }
}

impl GetName for Node {
    fn name(&self) -> Id {
        self.name
    }
}
