//! The linking pass: one recursive descent over a [BinDef]'s sequence tree
//! that names every node, resolves operands against the bin's registers,
//! collects ports, buckets shared resources and wires in child bins.
use crate::{
    Bin, BinDef, BinId, ChildLink, ChildTarget, CountDir, Detach, DetachMode,
    Direction, Exports, Node, NodeKind, Operand, Parent, Port, RESERVED_NAMES,
    Seq, SeqData, SeqIdx, SeqKind, SetMap, Signal, StaticKind, Value,
    seq::SetList,
};
use linked_hash_map::LinkedHashMap;
use seqc_utils::{Error, Id, NameGenerator, SeqResult, bits_needed_for, math};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};

/// Where a top-level sequence of a direct child lives. Names defined by
/// more than one child are ambiguous and only fail when used.
#[derive(Clone, Copy)]
enum ChildSeq {
    Unique(BinId, usize),
    Ambiguous,
}

/// Check that `name` can be used as a net name in the emitted module.
fn check_name(name: Id, what: &str) -> SeqResult<()> {
    let s = name.as_str();
    let mut chars = s.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::invalid_config(format!(
            "`{s}' is not a valid {what} name"
        )));
    }
    if RESERVED_NAMES.contains(&s) {
        return Err(Error::naming_conflict(format!(
            "{what} `{s}' collides with the module interface"
        )));
    }
    Ok(())
}

pub(crate) struct Linker<'a> {
    built: &'a [Bin],
    namegen: &'a mut NameGenerator,
    regs: LinkedHashMap<Id, Signal>,
    ports: LinkedHashMap<Id, Port>,
    nodes: Vec<Node>,
    allseqs: LinkedHashMap<Id, SeqIdx>,
    children: Vec<BinId>,
    child_seqs: HashMap<Id, ChildSeq>,
    child_starts: LinkedHashMap<BinId, SmallVec<[Id; 2]>>,
    seqdata: SeqData,
}

impl<'a> Linker<'a> {
    pub(crate) fn new(built: &'a [Bin], namegen: &'a mut NameGenerator) -> Self {
        Linker {
            built,
            namegen,
            regs: LinkedHashMap::new(),
            ports: LinkedHashMap::new(),
            nodes: vec![],
            allseqs: LinkedHashMap::new(),
            children: vec![],
            child_seqs: HashMap::new(),
            child_starts: LinkedHashMap::new(),
            seqdata: SeqData::default(),
        }
    }

    pub(crate) fn link(mut self, def: BinDef) -> SeqResult<Bin> {
        check_name(def.name, "bin")?;
        if def.seqs.is_empty() {
            return Err(Error::invalid_config("a bin needs at least one sequence"));
        }
        for reg in def.regs {
            check_name(reg.name, "register")?;
            reg.validate()?;
            if self.regs.contains_key(&reg.name) {
                return Err(Error::naming_conflict(format!(
                    "register `{}' is declared twice",
                    reg.name
                )));
            }
            self.ports.insert(reg.name, Port::register(reg.clone()));
            self.regs.insert(reg.name, reg);
        }
        for child in def.children {
            self.add_child(child)?;
        }

        let mut seqs = Vec::with_capacity(def.seqs.len());
        for seq in def.seqs {
            seqs.push(self.link_seq(seq, Parent::Bin)?);
        }

        Ok(Bin {
            name: def.name,
            seqs,
            nodes: self.nodes,
            allseqs: self.allseqs,
            regs: self.regs,
            ports: self.ports,
            children: self.children,
            child_starts: self.child_starts,
            seqdata: self.seqdata,
            register_done: def.register_done,
            len1: def.len1,
            reset_n: def.reset_n,
        })
    }

    fn built(&self, id: BinId) -> SeqResult<&'a Bin> {
        self.built.get(id.index()).ok_or_else(|| {
            Error::not_found(format!("no bin with index {}", id.index()))
        })
    }

    /// Merge the ports of a child bin: names matching one of our registers
    /// are terminated, every other port is propagated without its register
    /// qualifier.
    fn add_child(&mut self, id: BinId) -> SeqResult<()> {
        let child = self.built(id)?;
        if self.children.contains(&id) {
            return Err(Error::naming_conflict(format!(
                "child bin `{}' is listed twice",
                child.name
            )));
        }
        self.children.push(id);
        self.child_starts.insert(id, SmallVec::new());

        for port in child.ports.values() {
            let name = port.sig.name;
            if self.regs.contains_key(&name) {
                if port.dir == Direction::Output {
                    log::warn!(
                        "output `{}' of child `{}' is terminated by a register of the same name",
                        name,
                        child.name
                    );
                }
                self.ports.remove(&name);
            } else {
                self.add_port(Port {
                    reg: false,
                    ..port.clone()
                })?;
            }
        }

        for (index, node) in child.top_level().enumerate() {
            self.child_seqs
                .entry(node.name)
                .and_modify(|e| *e = ChildSeq::Ambiguous)
                .or_insert(ChildSeq::Unique(id, index));
        }
        Ok(())
    }

    /// Record a port. Output classification wins and an output is never
    /// downgraded by a later input of the same name.
    fn add_port(&mut self, port: Port) -> SeqResult<()> {
        let name = port.sig.name;
        check_name(name, "port")?;
        match self.ports.get_mut(&name) {
            Some(existing) => {
                if existing.sig.width != port.sig.width {
                    return Err(Error::width_mismatch(format!(
                        "port `{}' is used with widths {} and {}",
                        name, existing.sig.width, port.sig.width
                    )));
                }
                if port.overrides(existing) {
                    *existing = port;
                }
            }
            None => {
                self.ports.insert(name, port);
            }
        }
        Ok(())
    }

    fn read(&self, name: Id) -> SeqResult<Value> {
        self.regs
            .get(&name)
            .map(|r| Value::Net(r.clone()))
            .ok_or_else(|| Error::not_found(format!("register `{name}'")))
    }

    /// Read a register that only this bin may observe, such as a count or
    /// a stop bound: it stops being a port.
    fn read_internal(&mut self, name: Id) -> SeqResult<Value> {
        let v = self.read(name)?;
        self.ports.remove(&name);
        Ok(v)
    }

    /// An owned register of the same name, or a new input port.
    fn signal(&mut self, sig: Signal) -> SeqResult<Value> {
        if let Some(reg) = self.regs.get(&sig.name) {
            return Ok(Value::Net(reg.clone()));
        }
        sig.validate()?;
        self.add_port(Port::input(sig.clone()))?;
        Ok(Value::Net(sig))
    }

    fn constant(n: i64) -> SeqResult<Value> {
        if n < 0 {
            return Err(Error::invalid_config(format!(
                "negative constant {n} where an unsigned value is required"
            )));
        }
        Ok(Value::constant(n as u128, bits_needed_for(n as u64 + 1)))
    }

    fn value(&mut self, op: Operand) -> SeqResult<Value> {
        match op {
            Operand::Const(n) => Self::constant(n),
            Operand::Name(name) => self.read(name),
            Operand::Signal(sig) => self.signal(sig),
        }
    }

    /// Like [Self::value], but a named register becomes internal.
    fn count(&mut self, op: Operand) -> SeqResult<Value> {
        match op {
            Operand::Name(name) => self.read_internal(name),
            op => self.value(op),
        }
    }

    /// A register this node drives.
    fn target(&self, op: Operand) -> SeqResult<Signal> {
        let name = match op {
            Operand::Name(name) => name,
            Operand::Signal(sig) => sig.name,
            Operand::Const(n) => {
                return Err(Error::invalid_config(format!(
                    "constant {n} cannot be written to"
                )));
            }
        };
        self.regs.get(&name).cloned().ok_or_else(|| {
            Error::missing_resource(format!(
                "register `{name}' is not owned by this bin"
            ))
        })
    }

    /// A single bit control value.
    fn control(&mut self, op: Operand, what: &str) -> SeqResult<Value> {
        let v = self.value(op)?;
        if v.width() != 1 {
            return Err(Error::width_mismatch(format!(
                "{what} must be one bit wide, found {} bits",
                v.width()
            )));
        }
        Ok(v)
    }

    fn set_map(&mut self, set: SetList, at_end: bool) -> SeqResult<SetMap> {
        let mut entries: Vec<(Signal, Value)> = Vec::with_capacity(set.len());
        for (name, op) in set {
            let reg = self.target(Operand::Name(name))?;
            if entries.iter().any(|(r, _)| r.name == reg.name) {
                return Err(Error::invalid_config(format!(
                    "register `{name}' is set twice"
                )));
            }
            let value = match op {
                Operand::Const(n) => {
                    Value::constant(math::encode(n, reg.width), reg.width)
                }
                op => self.value(op)?,
            };
            entries.push((reg, value));
        }
        Ok(SetMap { entries, at_end })
    }

    fn exports(&mut self, exports: &Exports) -> SeqResult<()> {
        for sig in [&exports.start, &exports.running, &exports.done]
            .into_iter()
            .flatten()
        {
            if sig.width != 1 {
                return Err(Error::width_mismatch(format!(
                    "exported handshake `{}' must be one bit wide",
                    sig.name
                )));
            }
            self.output(sig)?;
        }
        Ok(())
    }

    /// A combinational output port driven by this bin.
    fn output(&mut self, sig: &Signal) -> SeqResult<()> {
        sig.validate()?;
        if self.regs.contains_key(&sig.name) {
            return Err(Error::naming_conflict(format!(
                "output `{}' has the name of a register",
                sig.name
            )));
        }
        self.add_port(Port::output(sig.clone()))
    }

    fn link_subs(&mut self, seqs: Vec<Seq>, parent: SeqIdx) -> SeqResult<Vec<SeqIdx>> {
        if seqs.is_empty() {
            return Err(Error::invalid_config("no subsequences"));
        }
        seqs.into_iter()
            .map(|s| self.link_seq(s, Parent::Seq(parent)))
            .collect()
    }

    fn link_seq(&mut self, seq: Seq, parent: Parent) -> SeqResult<SeqIdx> {
        let origin = seq.kind.kind_name();
        let name = match seq.name {
            Some(name) => {
                check_name(name, "sequence")?;
                name
            }
            None => {
                let taken = &self.allseqs;
                self.namegen.gen_seq_name(|n| taken.contains_key(&n))
            }
        };
        if self.allseqs.contains_key(&name) {
            return Err(Error::naming_conflict(format!(
                "sequence `{name}' is defined twice"
            )));
        }
        let idx = SeqIdx::new(self.nodes.len());
        self.allseqs.insert(name, idx);
        self.nodes.push(Node {
            name,
            origin,
            kind: NodeKind::Parallel,
            subseqs: vec![],
            parent,
            exports: Exports::default(),
            dryrun: None,
        });
        log::debug!("linking {origin} `{name}'");

        self.link_node(idx, seq.kind, seq.exports, seq.dryrun)
            .map_err(|e| e.within(format!("{origin} `{name}'")))?;
        Ok(idx)
    }

    fn link_node(
        &mut self,
        idx: SeqIdx,
        kind: SeqKind,
        exports: Exports,
        dryrun: Option<Operand>,
    ) -> SeqResult<()> {
        let mut subseqs = vec![];
        let kind = match kind {
            SeqKind::Set { set, at_end } => NodeKind::Set(self.set_map(set, at_end)?),
            SeqKind::Reset => NodeKind::Set(SetMap {
                entries: self
                    .regs
                    .values()
                    .map(|r| (r.clone(), Value::constant(r.init_bits(), r.width)))
                    .collect(),
                at_end: false,
            }),
            SeqKind::Nop => NodeKind::Set(SetMap::default()),
            SeqKind::Stall { count, set, at_end } => {
                let count = self.count(count)?;
                if count == Value::constant(0, count.width()) {
                    return Err(Error::invalid_config("stall count must be positive"));
                }
                self.seqdata.join(StaticKind::Stall, idx, count.width());
                NodeKind::Stall {
                    count,
                    set: self.set_map(set, at_end)?,
                }
            }
            SeqKind::Trigger {
                reg,
                count,
                active_high,
            } => {
                let reg = self.target(reg)?;
                let count = count.map(|c| self.count(c)).transpose()?;
                if let Some(c) = &count {
                    self.seqdata.join(StaticKind::Stall, idx, c.width());
                }
                NodeKind::Trigger {
                    reg,
                    count,
                    active_high,
                }
            }
            SeqKind::Toggle { reg } => NodeKind::Toggle {
                reg: self.target(reg)?,
            },
            SeqKind::Sync {
                sync,
                active_high,
                set,
            } => {
                let sync = match self.value(sync)? {
                    Value::Net(sig) => sig,
                    Value::Const { .. } => {
                        return Err(Error::invalid_config(
                            "sync condition must be a signal or register",
                        ));
                    }
                };
                NodeKind::Sync {
                    sync,
                    active_high,
                    set: self.set_map(set, false)?,
                }
            }
            SeqKind::Child {
                target,
                set,
                detach,
            } => {
                let link = self.child_link(target)?;
                let detach = match detach {
                    Detach::Always => DetachMode::Always,
                    Detach::Never => DetachMode::Never,
                    Detach::When(op) => DetachMode::When(self.control(op, "detach")?),
                };
                NodeKind::Child {
                    link,
                    set: self.set_map(set, false)?,
                    detach,
                }
            }
            SeqKind::Serial { seqs, set, term } => {
                subseqs = self.link_subs(seqs, idx)?;
                NodeKind::Serial {
                    set: self.set_map(set, false)?,
                    term: term.map(|t| self.value(t)).transpose()?,
                }
            }
            SeqKind::Parallel { seqs } => {
                subseqs = self.link_subs(seqs, idx)?;
                self.check_parallel(&subseqs)?;
                NodeKind::Parallel
            }
            SeqKind::Select { seqs, sel } => {
                subseqs = self.link_subs(seqs, idx)?;
                NodeKind::Select {
                    sel: self.value(sel)?,
                }
            }
            SeqKind::Repeat {
                seq,
                count,
                counter,
            } => {
                subseqs = self.link_subs(vec![*seq], idx)?;
                let count = self.count(count)?;
                if count == Value::constant(0, count.width()) {
                    return Err(Error::invalid_config("repeat count must be positive"));
                }
                if let Some(sig) = &counter {
                    self.output(sig)?;
                }
                NodeKind::Repeat { count, counter }
            }
            SeqKind::CountDown { reg, stop, skip } => {
                self.count_node(CountDir::Down, reg, stop, skip, dryrun.is_some())?
            }
            SeqKind::CountUp { reg, stop, skip } => {
                self.count_node(CountDir::Up, reg, stop, skip, dryrun.is_some())?
            }
            SeqKind::Add { a, b, out, clamp } => NodeKind::Add {
                a: self.value(a)?,
                b: self.value(b)?,
                out: self.target(out)?,
                clamp,
            },
            SeqKind::Multiply {
                a,
                b,
                out,
                justify,
                clamp,
            } => NodeKind::Multiply {
                a: self.value(a)?,
                b: self.value(b)?,
                out: self.target(out)?,
                justify,
                clamp,
            },
            SeqKind::SerialMultiply {
                a,
                b,
                out,
                justify,
                clamp,
            } => NodeKind::SerialMultiply {
                a: self.value(a)?,
                b: self.value(b)?,
                out: self.target(out)?,
                justify,
                clamp,
            },
        };

        let dryrun = dryrun.map(|d| self.control(d, "dryrun")).transpose()?;
        self.exports(&exports)?;

        let node = &mut self.nodes[idx.index()];
        node.kind = kind;
        node.subseqs = subseqs;
        node.exports = exports;
        node.dryrun = dryrun;
        self.add_child_starts(idx)
    }

    fn count_node(
        &mut self,
        dir: CountDir,
        reg: Id,
        stop: Operand,
        skip: Operand,
        dryrun: bool,
    ) -> SeqResult<NodeKind> {
        if dryrun {
            log::warn!("dryrun has no effect on a counting sequence");
        }
        Ok(NodeKind::Count {
            dir,
            reg: self.target(Operand::Name(reg))?,
            stop: self.count(stop)?,
            skip: self.value(skip)?,
        })
    }

    fn child_link(&mut self, target: ChildTarget) -> SeqResult<ChildLink> {
        match target {
            ChildTarget::Name(name) => match self.child_seqs.get(&name) {
                Some(ChildSeq::Unique(child, index)) => Ok(ChildLink::Fixed {
                    child: *child,
                    index: *index,
                }),
                Some(ChildSeq::Ambiguous) => Err(Error::naming_conflict(format!(
                    "more than one child defines a sequence `{name}'"
                ))),
                None => Err(Error::not_found(format!(
                    "no child defines a sequence `{name}'"
                ))),
            },
            ChildTarget::Node(r) => {
                let child = self.built(r.bin)?;
                if !self.children.contains(&r.bin) {
                    return Err(Error::invalid_config(format!(
                        "`{}' is not a child of this bin",
                        child.name
                    )));
                }
                if r.index >= child.seqs.len() {
                    return Err(Error::not_found(format!(
                        "`{}' has no sequence {}",
                        child.name, r.index
                    )));
                }
                Ok(ChildLink::Fixed {
                    child: r.bin,
                    index: r.index,
                })
            }
            ChildTarget::Signal(sig) => {
                if self.children.is_empty() {
                    return Err(Error::invalid_config(
                        "dynamic dispatch in a bin without children",
                    ));
                }
                let child_bits = if self.children.len() > 1 {
                    bits_needed_for(self.children.len() as u64)
                } else {
                    0
                };
                let mut seq_bits = 1;
                for child in &self.children {
                    let n = self.built(*child)?.seqs.len() as u64;
                    seq_bits = seq_bits.max(bits_needed_for(n));
                }
                let sel = match self.regs.get(&sig.name) {
                    Some(reg) => reg.clone(),
                    None => {
                        self.signal(sig.clone())?;
                        sig
                    }
                };
                if sel.width != child_bits + seq_bits {
                    return Err(Error::width_mismatch(format!(
                        "selector `{}' is {} bits wide, dispatch needs {} child and {} sequence bits",
                        sel.name, sel.width, child_bits, seq_bits
                    )));
                }
                Ok(ChildLink::Dynamic {
                    sel,
                    child_bits,
                    seq_bits,
                })
            }
        }
    }

    /// Record the start wires of a `Child` node on every bin it may trigger.
    fn add_child_starts(&mut self, idx: SeqIdx) -> SeqResult<()> {
        let node = &self.nodes[idx.index()];
        let NodeKind::Child { link, .. } = &node.kind else {
            return Ok(());
        };
        let starts: Vec<(BinId, Id)> = match link {
            ChildLink::Fixed { child, .. } => vec![(*child, node.start())],
            ChildLink::Dynamic { .. } if self.children.len() == 1 => {
                vec![(self.children[0], node.start())]
            }
            ChildLink::Dynamic { .. } => self
                .children
                .iter()
                .map(|c| -> SeqResult<(BinId, Id)> {
                    Ok((*c, node.child_start(self.built(*c)?.name)))
                })
                .collect::<SeqResult<_>>()?,
        };
        for (child, start) in starts {
            self.child_starts.entry(child).or_default().push(start);
        }
        Ok(())
    }

    fn subtree(&self, root: SeqIdx) -> Vec<SeqIdx> {
        let mut out = vec![];
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.nodes[idx.index()].subseqs.iter().rev());
        }
        out
    }

    /// Branches of a `Parallel` run at the same time: two of them may not
    /// write the same register. Sharing the stall counter or a child bin is
    /// legal but almost always a mistake.
    fn check_parallel(&self, branches: &[SeqIdx]) -> SeqResult<()> {
        let mut writers: HashMap<Id, Id> = HashMap::new();
        let mut stalls: Option<Id> = None;
        let mut dispatch: HashMap<BinId, Id> = HashMap::new();

        for root in branches {
            let branch = self.nodes[root.index()].name;
            let mut regs = BTreeSet::new();
            let mut uses_stall = false;
            let mut targets = BTreeSet::new();
            for idx in self.subtree(*root) {
                let kind = &self.nodes[idx.index()].kind;
                regs.extend(kind.written_regs());
                uses_stall |= kind.uses_stall_counter();
                match kind {
                    NodeKind::Child {
                        link: ChildLink::Fixed { child, .. },
                        ..
                    } => {
                        targets.insert(*child);
                    }
                    NodeKind::Child {
                        link: ChildLink::Dynamic { .. },
                        ..
                    } => targets.extend(self.children.iter().copied()),
                    _ => (),
                }
            }

            for reg in regs {
                if let Some(other) = writers.insert(reg, branch) {
                    return Err(Error::invalid_config(format!(
                        "parallel branches `{other}' and `{branch}' both write `{reg}'"
                    )));
                }
            }
            if uses_stall {
                if let Some(other) = stalls {
                    log::warn!(
                        "parallel branches `{other}' and `{branch}' share the stall counter"
                    );
                }
                stalls = Some(branch);
            }
            for child in targets {
                if let Some(other) = dispatch.insert(child, branch) {
                    log::warn!(
                        "parallel branches `{}' and `{}' both dispatch to `{}'",
                        other,
                        branch,
                        self.built
                            .get(child.index())
                            .map(|b| b.name.as_str())
                            .unwrap_or("?")
                    );
                }
            }
        }
        Ok(())
    }
}
