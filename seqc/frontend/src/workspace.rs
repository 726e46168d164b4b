use crate::{ast, parser};
use seqc_ir::{
    BinDef, BinId, ChildTarget, Context, Detach, Exports, Justify, Operand,
    Seq, SeqKind, Signal,
};
use seqc_utils::{Error, Id, SeqResult};
use std::{io::Read, path::Path};

/// A linked program together with the bin selected for emission.
pub struct Workspace {
    pub ctx: Context,
    pub top: BinId,
}

impl Workspace {
    pub fn from_json(src: &str) -> SeqResult<Self> {
        Self::from_description(parser::parse_str(src)?)
    }

    pub fn from_file(path: &Path) -> SeqResult<Self> {
        Self::from_description(parser::parse_file(path)?)
    }

    pub fn from_reader<R: Read>(input: R) -> SeqResult<Self> {
        Self::from_description(parser::parse_reader(input)?)
    }

    /// Link every bin in the order it is listed.
    pub fn from_description(desc: ast::Description) -> SeqResult<Self> {
        let mut ctx = Context::new();
        for bin in desc.bins {
            let name = bin.name.clone();
            let def = bin_def(&ctx, bin)?;
            ctx.add_bin(def)?;
            log::debug!("added bin `{name}'");
        }
        let top = match desc.top {
            Some(name) => ctx.find_bin(&name).ok_or_else(|| {
                Error::not_found(format!("top bin `{name}' is not defined"))
            })?,
            None => ctx.last().ok_or_else(|| {
                Error::invalid_config("the description defines no bins")
            })?,
        };
        Ok(Workspace { ctx, top })
    }
}

fn bin_def(ctx: &Context, bin: ast::BinDecl) -> SeqResult<BinDef> {
    let children = bin
        .children
        .iter()
        .map(|c| {
            ctx.find_bin(c).ok_or_else(|| {
                Error::not_found(format!(
                    "child `{c}' of `{}' must be defined before it",
                    bin.name
                ))
            })
        })
        .collect::<SeqResult<Vec<_>>>()?;
    let mut def = BinDef::new(bin.name.as_str(), sub_seqs(bin.seqs))
        .with_regs(bin.regs.into_iter().map(signal).collect())
        .with_children(children)
        .with_reset_name(bin.reset_n);
    def.register_done = bin.register_done;
    def.len1 = bin.len1;
    Ok(def)
}

fn signal(s: ast::SignalDecl) -> Signal {
    let sig = Signal::new(s.name, s.width).with_init(s.init);
    if s.signed { sig.signed() } else { sig }
}

fn operand(op: ast::Operand) -> Operand {
    match op {
        ast::Operand::Int(v) => Operand::Const(v),
        ast::Operand::Name(n) => Operand::Name(n.into()),
        ast::Operand::Signal(s) => Operand::Signal(signal(s.signal)),
    }
}

fn set_map(set: ast::SetMap) -> Vec<(Id, Operand)> {
    set.into_iter().map(|(k, v)| (k.into(), operand(v))).collect()
}

fn sub_seqs(seqs: Vec<ast::SubSeq>) -> Vec<Seq> {
    seqs.into_iter().map(sub_seq).collect()
}

fn sub_seq(s: ast::SubSeq) -> Seq {
    match s {
        ast::SubSeq::Name(n) => Seq::from(n.as_str()),
        ast::SubSeq::Signal(s) => Seq::from(signal(s.signal)),
        ast::SubSeq::Seq(decl) => seq(*decl),
    }
}

fn justify(j: ast::Justify) -> Justify {
    match j {
        ast::Justify::Left => Justify::Left,
        ast::Justify::Right => Justify::Right,
    }
}

fn seq(decl: ast::SeqDecl) -> Seq {
    use ast::KindDecl as K;
    let kind = match decl.kind {
        K::Set { set, at_end } => SeqKind::Set {
            set: set_map(set),
            at_end,
        },
        K::Reset => SeqKind::Reset,
        K::Nop => SeqKind::Nop,
        K::Stall { count, set, at_end } => SeqKind::Stall {
            count: operand(count),
            set: set_map(set),
            at_end,
        },
        K::Trigger {
            reg,
            count,
            active_low,
        } => SeqKind::Trigger {
            reg: operand(reg),
            count: count.map(operand),
            active_high: !active_low,
        },
        K::Toggle { reg } => SeqKind::Toggle { reg: operand(reg) },
        K::Sync {
            sync,
            active_low,
            set,
        } => SeqKind::Sync {
            sync: operand(sync),
            active_high: !active_low,
            set: set_map(set),
        },
        K::Child {
            target,
            set,
            detach,
        } => SeqKind::Child {
            target: match target {
                ast::ChildTarget::Name(n) => ChildTarget::Name(n.into()),
                ast::ChildTarget::Signal(s) => {
                    ChildTarget::Signal(signal(s.signal))
                }
            },
            set: set_map(set),
            detach: match detach {
                ast::Detach::Flag(b) => b.into(),
                ast::Detach::When(op) => Detach::When(operand(op)),
            },
        },
        K::Serial { seqs, set, term } => SeqKind::Serial {
            seqs: sub_seqs(seqs),
            set: set_map(set),
            term: term.map(operand),
        },
        K::Parallel { seqs } => SeqKind::Parallel {
            seqs: sub_seqs(seqs),
        },
        K::Select { seqs, sel } => SeqKind::Select {
            seqs: sub_seqs(seqs),
            sel: operand(sel),
        },
        K::Repeat {
            seq,
            count,
            counter,
        } => SeqKind::Repeat {
            seq: Box::new(sub_seq(*seq)),
            count: operand(count),
            counter: counter.map(signal),
        },
        K::CountDown { reg, stop, skip } => SeqKind::CountDown {
            reg: reg.into(),
            stop: operand(stop),
            skip: operand(skip),
        },
        K::CountUp { reg, stop, skip } => SeqKind::CountUp {
            reg: reg.into(),
            stop: operand(stop),
            skip: operand(skip),
        },
        K::Add { a, b, out, clamp } => SeqKind::Add {
            a: operand(a),
            b: operand(b),
            out: operand(out),
            clamp,
        },
        K::Multiply {
            a,
            b,
            out,
            justify: j,
            clamp,
        } => SeqKind::Multiply {
            a: operand(a),
            b: operand(b),
            out: operand(out),
            justify: justify(j),
            clamp,
        },
        K::SerialMultiply {
            a,
            b,
            out,
            justify: j,
            clamp,
        } => SeqKind::SerialMultiply {
            a: operand(a),
            b: operand(b),
            out: operand(out),
            justify: justify(j),
            clamp,
        },
    };
    Seq {
        name: decl.name.map(Id::from),
        kind,
        exports: Exports {
            start: decl.start.map(signal),
            running: decl.running.map(signal),
            done: decl.done.map(signal),
        },
        dryrun: decl.dryrun.map(operand),
    }
}
