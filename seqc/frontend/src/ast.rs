//! Types deserialized from a JSON program description.
//!
//! The layout mirrors the authoring API of `seqc_ir`: a list of bins, each
//! holding its registers, the names of the bins it instantiates and its
//! top-level sequences. Children must be listed before the bins that use
//! them.
use linked_hash_map::LinkedHashMap;
use serde::Deserialize;

fn yes() -> bool {
    true
}

fn reset_n() -> String {
    "reset_n".to_string()
}

fn one() -> Operand {
    Operand::Int(1)
}

/// A whole program.
#[derive(Debug, Deserialize)]
pub struct Description {
    pub bins: Vec<BinDecl>,
    /// Bin to emit. Defaults to the last one.
    #[serde(default)]
    pub top: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BinDecl {
    pub name: String,
    #[serde(default)]
    pub regs: Vec<SignalDecl>,
    /// Names of bins defined earlier in the description.
    #[serde(default)]
    pub children: Vec<String>,
    pub seqs: Vec<SubSeq>,
    #[serde(default = "yes")]
    pub register_done: bool,
    #[serde(default)]
    pub len1: bool,
    #[serde(default = "reset_n")]
    pub reset_n: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalDecl {
    pub name: String,
    pub width: u64,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub init: i64,
}

/// `{ "signal": { ... } }`
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRef {
    pub signal: SignalDecl,
}

/// A value read by a node.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Int(i64),
    Name(String),
    Signal(SignalRef),
}

/// Entry of a subsequence list. Bare names and signals dispatch to a child.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubSeq {
    Name(String),
    Signal(SignalRef),
    Seq(Box<SeqDecl>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Detach {
    Flag(bool),
    When(Operand),
}

impl Default for Detach {
    fn default() -> Self {
        Detach::Flag(false)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Justify {
    #[default]
    Left,
    Right,
}

/// Register writes, in the order they are listed.
pub type SetMap = LinkedHashMap<String, Operand>;

/// A node: options shared by every kind plus the kind itself.
#[derive(Debug, Deserialize)]
pub struct SeqDecl {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<SignalDecl>,
    #[serde(default)]
    pub running: Option<SignalDecl>,
    #[serde(default)]
    pub done: Option<SignalDecl>,
    #[serde(default)]
    pub dryrun: Option<Operand>,
    #[serde(flatten)]
    pub kind: KindDecl,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindDecl {
    Set {
        set: SetMap,
        #[serde(default)]
        at_end: bool,
    },
    Reset,
    Nop,
    Stall {
        count: Operand,
        #[serde(default)]
        set: SetMap,
        #[serde(default)]
        at_end: bool,
    },
    Trigger {
        reg: Operand,
        #[serde(default)]
        count: Option<Operand>,
        #[serde(default)]
        active_low: bool,
    },
    Toggle {
        reg: Operand,
    },
    Sync {
        sync: Operand,
        #[serde(default)]
        active_low: bool,
        #[serde(default)]
        set: SetMap,
    },
    Child {
        target: ChildTarget,
        #[serde(default)]
        set: SetMap,
        #[serde(default)]
        detach: Detach,
    },
    Serial {
        seqs: Vec<SubSeq>,
        #[serde(default)]
        set: SetMap,
        #[serde(default)]
        term: Option<Operand>,
    },
    Parallel {
        seqs: Vec<SubSeq>,
    },
    Select {
        seqs: Vec<SubSeq>,
        sel: Operand,
    },
    Repeat {
        seq: Box<SubSeq>,
        count: Operand,
        #[serde(default)]
        counter: Option<SignalDecl>,
    },
    CountDown {
        reg: String,
        stop: Operand,
        #[serde(default = "one")]
        skip: Operand,
    },
    CountUp {
        reg: String,
        stop: Operand,
        #[serde(default = "one")]
        skip: Operand,
    },
    Add {
        a: Operand,
        b: Operand,
        out: Operand,
        #[serde(default)]
        clamp: bool,
    },
    Multiply {
        a: Operand,
        b: Operand,
        out: Operand,
        #[serde(default)]
        justify: Justify,
        #[serde(default)]
        clamp: bool,
    },
    SerialMultiply {
        a: Operand,
        b: Operand,
        out: Operand,
        #[serde(default)]
        justify: Justify,
        #[serde(default)]
        clamp: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChildTarget {
    Name(String),
    Signal(SignalRef),
}
