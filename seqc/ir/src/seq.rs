//! The authoring form of a program: plain data built by the user (or the
//! frontend) before a bin links it.
use crate::{Signal, context::SeqRef};
use seqc_utils::Id;

/// A value a node reads: a constant, the name of a register owned by the
/// bin, or a signal that becomes an input port.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Const(i64),
    Name(Id),
    Signal(Signal),
}

macro_rules! operand_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Const(v as i64)
            }
        })*
    };
}
operand_from_int!(i32, i64, u32, u64, usize);

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Name(s.into())
    }
}

impl From<Id> for Operand {
    fn from(id: Id) -> Self {
        Operand::Name(id)
    }
}

impl From<Signal> for Operand {
    fn from(sig: Signal) -> Self {
        Operand::Signal(sig)
    }
}

impl From<&Signal> for Operand {
    fn from(sig: &Signal) -> Self {
        Operand::Signal(sig.clone())
    }
}

/// What a `Child` node dispatches to.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildTarget {
    /// A top-level sequence of one of the bin's children, by name.
    Name(Id),
    /// A top-level sequence of an already built child bin.
    Node(SeqRef),
    /// Chosen at run time: child select in the high bits, sequence select in
    /// the low bits.
    Signal(Signal),
}

/// Whether a `Child` node waits for the child bin to finish.
#[derive(Clone, Debug, PartialEq)]
pub enum Detach {
    Always,
    Never,
    When(Operand),
}

impl From<bool> for Detach {
    fn from(b: bool) -> Self {
        if b { Detach::Always } else { Detach::Never }
    }
}

/// Which end of a wide product survives narrowing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Justify {
    /// Keep the most significant bits.
    #[default]
    Left,
    /// Keep the least significant bits.
    Right,
}

/// User supplied signals that mirror a node's handshake as output ports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Exports {
    pub start: Option<Signal>,
    pub running: Option<Signal>,
    pub done: Option<Signal>,
}

pub type SetList = Vec<(Id, Operand)>;

#[derive(Clone, Debug, PartialEq)]
pub enum SeqKind {
    Set {
        set: SetList,
        at_end: bool,
    },
    Reset,
    Nop,
    Stall {
        count: Operand,
        set: SetList,
        at_end: bool,
    },
    Trigger {
        reg: Operand,
        count: Option<Operand>,
        active_high: bool,
    },
    Toggle {
        reg: Operand,
    },
    Sync {
        sync: Operand,
        active_high: bool,
        set: SetList,
    },
    Child {
        target: ChildTarget,
        set: SetList,
        detach: Detach,
    },
    Serial {
        seqs: Vec<Seq>,
        set: SetList,
        term: Option<Operand>,
    },
    Parallel {
        seqs: Vec<Seq>,
    },
    Select {
        seqs: Vec<Seq>,
        sel: Operand,
    },
    Repeat {
        seq: Box<Seq>,
        count: Operand,
        counter: Option<Signal>,
    },
    CountDown {
        reg: Id,
        stop: Operand,
        skip: Operand,
    },
    CountUp {
        reg: Id,
        stop: Operand,
        skip: Operand,
    },
    Add {
        a: Operand,
        b: Operand,
        out: Operand,
        clamp: bool,
    },
    Multiply {
        a: Operand,
        b: Operand,
        out: Operand,
        justify: Justify,
        clamp: bool,
    },
    SerialMultiply {
        a: Operand,
        b: Operand,
        out: Operand,
        justify: Justify,
        clamp: bool,
    },
}

impl SeqKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SeqKind::Set { .. } => "Set",
            SeqKind::Reset => "Reset",
            SeqKind::Nop => "Nop",
            SeqKind::Stall { .. } => "Stall",
            SeqKind::Trigger { .. } => "Trigger",
            SeqKind::Toggle { .. } => "Toggle",
            SeqKind::Sync { .. } => "Sync",
            SeqKind::Child { .. } => "Child",
            SeqKind::Serial { .. } => "Serial",
            SeqKind::Parallel { .. } => "Parallel",
            SeqKind::Select { .. } => "Select",
            SeqKind::Repeat { .. } => "Repeat",
            SeqKind::CountDown { .. } => "CountDown",
            SeqKind::CountUp { .. } => "CountUp",
            SeqKind::Add { .. } => "Add",
            SeqKind::Multiply { .. } => "Multiply",
            SeqKind::SerialMultiply { .. } => "SerialMultiply",
        }
    }
}

/// One node of the authoring tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Seq {
    /// Generated at link time when absent.
    pub name: Option<Id>,
    pub kind: SeqKind,
    pub exports: Exports,
    /// Suppresses register writes without changing timing.
    pub dryrun: Option<Operand>,
}

fn set_list<K, V, I>(set: I) -> SetList
where
    K: Into<Id>,
    V: Into<Operand>,
    I: IntoIterator<Item = (K, V)>,
{
    set.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl From<SeqKind> for Seq {
    fn from(kind: SeqKind) -> Self {
        Seq {
            name: None,
            kind,
            exports: Exports::default(),
            dryrun: None,
        }
    }
}

/// A bare name in a subsequence list dispatches to a child sequence.
impl From<&str> for Seq {
    fn from(name: &str) -> Self {
        Seq::child(ChildTarget::Name(name.into()))
    }
}

/// A bare signal in a subsequence list dispatches to a child sequence
/// chosen at run time.
impl From<Signal> for Seq {
    fn from(sig: Signal) -> Self {
        Seq::child(ChildTarget::Signal(sig))
    }
}

impl From<SeqRef> for Seq {
    fn from(r: SeqRef) -> Self {
        Seq::child(ChildTarget::Node(r))
    }
}

impl Seq {
    pub fn set<K, V, I>(set: I) -> Self
    where
        K: Into<Id>,
        V: Into<Operand>,
        I: IntoIterator<Item = (K, V)>,
    {
        SeqKind::Set {
            set: set_list(set),
            at_end: false,
        }
        .into()
    }

    pub fn reset() -> Self {
        SeqKind::Reset.into()
    }

    pub fn nop() -> Self {
        SeqKind::Nop.into()
    }

    pub fn stall<C: Into<Operand>>(count: C) -> Self {
        SeqKind::Stall {
            count: count.into(),
            set: vec![],
            at_end: false,
        }
        .into()
    }

    /// A one-shot pulse on `reg`.
    pub fn trigger<R: Into<Operand>>(reg: R) -> Self {
        SeqKind::Trigger {
            reg: reg.into(),
            count: None,
            active_high: true,
        }
        .into()
    }

    /// A pulse on `reg` lasting `count` cycles.
    pub fn trigger_for<R: Into<Operand>, C: Into<Operand>>(
        reg: R,
        count: C,
    ) -> Self {
        SeqKind::Trigger {
            reg: reg.into(),
            count: Some(count.into()),
            active_high: true,
        }
        .into()
    }

    pub fn toggle<R: Into<Operand>>(reg: R) -> Self {
        SeqKind::Toggle { reg: reg.into() }.into()
    }

    pub fn sync<S: Into<Operand>>(sync: S) -> Self {
        SeqKind::Sync {
            sync: sync.into(),
            active_high: true,
            set: vec![],
        }
        .into()
    }

    pub fn child<T: Into<ChildTarget>>(target: T) -> Self {
        SeqKind::Child {
            target: target.into(),
            set: vec![],
            detach: Detach::Never,
        }
        .into()
    }

    pub fn serial(seqs: Vec<Seq>) -> Self {
        SeqKind::Serial {
            seqs,
            set: vec![],
            term: None,
        }
        .into()
    }

    pub fn parallel(seqs: Vec<Seq>) -> Self {
        SeqKind::Parallel { seqs }.into()
    }

    pub fn select<S: Into<Operand>>(seqs: Vec<Seq>, sel: S) -> Self {
        SeqKind::Select {
            seqs,
            sel: sel.into(),
        }
        .into()
    }

    pub fn repeat<C: Into<Operand>>(seq: Seq, count: C) -> Self {
        SeqKind::Repeat {
            seq: Box::new(seq),
            count: count.into(),
            counter: None,
        }
        .into()
    }

    pub fn count_down<R, S, K>(reg: R, stop: S, skip: K) -> Self
    where
        R: Into<Id>,
        S: Into<Operand>,
        K: Into<Operand>,
    {
        SeqKind::CountDown {
            reg: reg.into(),
            stop: stop.into(),
            skip: skip.into(),
        }
        .into()
    }

    pub fn count_up<R, S, K>(reg: R, stop: S, skip: K) -> Self
    where
        R: Into<Id>,
        S: Into<Operand>,
        K: Into<Operand>,
    {
        SeqKind::CountUp {
            reg: reg.into(),
            stop: stop.into(),
            skip: skip.into(),
        }
        .into()
    }

    pub fn add<A, B, O>(a: A, b: B, out: O) -> Self
    where
        A: Into<Operand>,
        B: Into<Operand>,
        O: Into<Operand>,
    {
        SeqKind::Add {
            a: a.into(),
            b: b.into(),
            out: out.into(),
            clamp: false,
        }
        .into()
    }

    pub fn multiply<A, B, O>(a: A, b: B, out: O) -> Self
    where
        A: Into<Operand>,
        B: Into<Operand>,
        O: Into<Operand>,
    {
        SeqKind::Multiply {
            a: a.into(),
            b: b.into(),
            out: out.into(),
            justify: Justify::Left,
            clamp: false,
        }
        .into()
    }

    pub fn serial_multiply<A, B, O>(a: A, b: B, out: O) -> Self
    where
        A: Into<Operand>,
        B: Into<Operand>,
        O: Into<Operand>,
    {
        SeqKind::SerialMultiply {
            a: a.into(),
            b: b.into(),
            out: out.into(),
            justify: Justify::Left,
            clamp: false,
        }
        .into()
    }

    pub fn named<S: Into<Id>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register writes performed alongside the node's own behavior. Only
    /// set, stall, sync, child and serial nodes carry a register map; on any
    /// other kind this returns `self` unchanged.
    pub fn with_set<K, V, I>(mut self, entries: I) -> Self
    where
        K: Into<Id>,
        V: Into<Operand>,
        I: IntoIterator<Item = (K, V)>,
    {
        match &mut self.kind {
            SeqKind::Set { set, .. }
            | SeqKind::Stall { set, .. }
            | SeqKind::Sync { set, .. }
            | SeqKind::Child { set, .. }
            | SeqKind::Serial { set, .. } => set.extend(set_list(entries)),
            _ => (),
        }
        self
    }

    /// Perform the register writes when the node completes rather than when
    /// it starts. Has no effect outside set and stall nodes.
    pub fn at_end(mut self) -> Self {
        match &mut self.kind {
            SeqKind::Set { at_end, .. } | SeqKind::Stall { at_end, .. } => {
                *at_end = true
            }
            _ => (),
        }
        self
    }

    /// Invert the active level of a trigger or sync node. Other kinds are
    /// returned unchanged.
    pub fn active_low(mut self) -> Self {
        match &mut self.kind {
            SeqKind::Trigger { active_high, .. }
            | SeqKind::Sync { active_high, .. } => *active_high = false,
            _ => (),
        }
        self
    }

    pub fn detached<D: Into<Detach>>(mut self, d: D) -> Self {
        if let SeqKind::Child { detach, .. } = &mut self.kind {
            *detach = d.into();
        }
        self
    }

    pub fn with_term<T: Into<Operand>>(mut self, t: T) -> Self {
        if let SeqKind::Serial { term, .. } = &mut self.kind {
            *term = Some(t.into());
        }
        self
    }

    pub fn with_counter(mut self, sig: Signal) -> Self {
        if let SeqKind::Repeat { counter, .. } = &mut self.kind {
            *counter = Some(sig);
        }
        self
    }

    /// Saturate the result of an arithmetic node instead of wrapping it.
    /// Other kinds are returned unchanged.
    pub fn clamped(mut self) -> Self {
        match &mut self.kind {
            SeqKind::Add { clamp, .. }
            | SeqKind::Multiply { clamp, .. }
            | SeqKind::SerialMultiply { clamp, .. } => *clamp = true,
            _ => (),
        }
        self
    }

    pub fn justified(mut self, j: Justify) -> Self {
        match &mut self.kind {
            SeqKind::Multiply { justify, .. }
            | SeqKind::SerialMultiply { justify, .. } => *justify = j,
            _ => (),
        }
        self
    }

    pub fn export_start(mut self, sig: Signal) -> Self {
        self.exports.start = Some(sig);
        self
    }

    pub fn export_running(mut self, sig: Signal) -> Self {
        self.exports.running = Some(sig);
        self
    }

    pub fn export_done(mut self, sig: Signal) -> Self {
        self.exports.done = Some(sig);
        self
    }

    pub fn with_dryrun<D: Into<Operand>>(mut self, d: D) -> Self {
        self.dryrun = Some(d.into());
        self
    }
}

impl From<&str> for ChildTarget {
    fn from(s: &str) -> Self {
        ChildTarget::Name(s.into())
    }
}

impl From<Signal> for ChildTarget {
    fn from(sig: Signal) -> Self {
        ChildTarget::Signal(sig)
    }
}

impl From<SeqRef> for ChildTarget {
    fn from(r: SeqRef) -> Self {
        ChildTarget::Node(r)
    }
}
