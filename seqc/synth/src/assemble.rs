//! State-machine assembly: lowers one linked [Bin] to one [Module].
//!
//! Every node gets a `start` wire (driven by its parent), a `done` wire (its
//! completion condition) and a `running` register. The bin dispatches on its
//! `seq` input: the addressed top-level sequence's statements run in one arm
//! of a `case`, the other sequences' idle statements run alongside it.
//!
//! ## Example
//! A bin `b` with `Serial([Nop, Nop])` as its only sequence produces:
//! ```text
//! assign seq_seq0001_start_ = start & (seq == 1'd0);
//! assign seq_seq0002_start_ = seq_seq0001_start_;
//! assign seq_seq0003_start_ = seq_seq0002_done_ & (seq_seq0001_addr_ == 1'd0);
//! assign seq_seq0001_done_ = seq_seq0003_done_ & seq_seq0001_running_;
//! ```
use crate::{arith, seq_width};
use seqc_ir::{
    Bin, ChildLink, Context, CountDir, DetachMode, Direction, Justify, Node,
    NodeKind, SeqIdx, SetMap, Signal, StaticKind, Value,
    rtl::{CaseArm, Decl, Expr, Instance, Module, ModulePort, NetKind, Process, Stmt},
};
use seqc_utils::{Id, bits_needed_for};

/// Shared stall counter of a bin.
pub const STALL_COUNT: &str = "stall_count_";

/// Net of the parent module connected to port `what` of a child bin.
pub fn child_net(child: &Bin, what: &str) -> Id {
    Id::from(format!("child_{}_{}_", child.name, what))
}

/// Statements a node contributes to the bin's dispatch `case`.
#[derive(Default, Clone)]
struct NodeLogic {
    /// Runs while the top-level sequence owning the node is addressed.
    seq: Vec<Stmt>,
    /// Runs while another top-level sequence is addressed.
    inactive: Vec<Stmt>,
}

/// How a node's `running` register follows its `start`.
enum Running {
    /// Set by `start`, cleared by `done` or by any start of the bin.
    Latch,
    /// `running <= start | (!bin_start & level)`
    Follow(Expr),
}

pub(crate) struct Assembler<'a> {
    ctx: &'a Context,
    bin: &'a Bin,
    module: Module,
    /// Reset statements of every node.
    reset: Vec<Stmt>,
    /// `running` updates of every node.
    running: Vec<Stmt>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(ctx: &'a Context, bin: &'a Bin) -> Self {
        Assembler {
            ctx,
            bin,
            module: Module::new(bin.name),
            reset: vec![],
            running: vec![],
        }
    }

    pub(crate) fn assemble(mut self) -> Module {
        self.interface();
        self.child_nets();
        let logic: Vec<NodeLogic> =
            self.bin.seqs.iter().map(|s| self.lower(*s)).collect();
        self.dispatch(logic);
        self.stall_counter();
        self.child_starts();
        self.instances();
        self.module
    }

    fn interface(&mut self) {
        let bin = self.bin;
        let m = &mut self.module;
        m.port("clk", 1, Direction::Input, false);
        m.port("reset_n", 1, Direction::Input, false);
        for p in bin.ports.values() {
            m.ports.push(ModulePort {
                name: p.sig.name,
                width: p.sig.width,
                signed: p.sig.signed,
                dir: p.dir,
                reg: p.reg,
            });
        }
        m.port("seq", seq_width(bin), Direction::Input, false);
        m.port("start", 1, Direction::Input, false);
        m.port("running", 1, Direction::Output, !bin.len1);
        m.port("done", 1, Direction::Output, bin.register_done || bin.len1);
        for (i, node) in bin.top_level().enumerate() {
            m.param(format!("seq_{}_", node.name), i as u128);
        }
        for reg in bin.internal_regs() {
            m.decls.push(Decl {
                name: reg.name,
                width: reg.width,
                signed: reg.signed,
                kind: NetKind::Reg,
            });
        }
        m.wire("done_", 1);
    }

    fn child_nets(&mut self) {
        for id in &self.bin.children {
            let child = self.ctx.bin(*id);
            let seq = child_net(child, "seq");
            self.module.reg(seq, seq_width(child));
            self.module.reg(child_net(child, "start"), 1);
            self.module.wire(child_net(child, "running"), 1);
            self.module.wire(child_net(child, "done"), 1);
            self.reset.push(Stmt::assign(seq, Expr::zero(seq_width(child))));
        }
    }

    /// Wrap register writes of `node` in its dryrun condition.
    fn guard(node: &Node, stmts: Vec<Stmt>) -> Vec<Stmt> {
        match (&node.dryrun, stmts.is_empty()) {
            (_, true) => stmts,
            (Some(d), false) => vec![Stmt::when(!arith::expr(d), stmts)],
            (None, false) => stmts,
        }
    }

    fn set_stmts(node: &Node, set: &SetMap) -> Vec<Stmt> {
        if set.is_empty() {
            return vec![];
        }
        let cond = if set.at_end { node.done() } else { node.start() };
        let body = set
            .entries
            .iter()
            .map(|(reg, v)| Stmt::assign(reg.name, arith::fit(v, reg.width)))
            .collect();
        Self::guard(node, vec![Stmt::when(Expr::Net(cond), body)])
    }

    /// True once the shared stall counter has waited `count` cycles.
    fn stall_reached(&mut self, node: &Node, count: &Value) -> Expr {
        let cnt = Expr::net(STALL_COUNT);
        match count {
            Value::Const { val, width } => {
                cnt.ge(Expr::constant(val.saturating_sub(1), *width))
            }
            Value::Net(sig) => {
                let limit = self.module.define(
                    node.local("limit"),
                    sig.width,
                    Expr::Net(sig.name).sub(Expr::constant(1, sig.width)),
                );
                cnt.ge(limit)
            }
        }
    }

    /// Narrow `src` into `out`, declaring any intermediate net.
    fn narrow(
        &mut self,
        node: &Node,
        src: &Signal,
        out: &Signal,
        justify: Justify,
        clamp: bool,
    ) -> Expr {
        let wide = node.local("wide");
        let n = arith::narrow(src, out, justify, clamp, wide.as_str());
        if let Some((sig, driver)) = n.wide {
            self.module.define(sig.name, sig.width, driver);
        }
        n.value
    }

    fn lower(&mut self, idx: SeqIdx) -> NodeLogic {
        let bin = self.bin;
        let node = bin.node(idx);
        let start = Expr::Net(node.start());
        let running = Expr::Net(node.running());
        self.module.wire(node.start(), 1);
        self.module.wire(node.done(), 1);
        self.module.reg(node.running(), 1);
        self.reset.push(Stmt::assign(node.running(), Expr::bit(false)));

        let subs: Vec<NodeLogic> =
            node.subseqs.iter().map(|s| self.lower(*s)).collect();
        let subnodes: Vec<&Node> =
            node.subseqs.iter().map(|s| bin.node(*s)).collect();
        let mut logic = NodeLogic::default();

        let (done, mode) = match &node.kind {
            NodeKind::Set(set) => {
                logic.seq = Self::set_stmts(node, set);
                (running.clone(), Running::Follow(Expr::bit(false)))
            }
            NodeKind::Stall { count, set } => {
                logic.seq = Self::set_stmts(node, set);
                let reached = self.stall_reached(node, count);
                (running.clone() & reached, Running::Latch)
            }
            NodeKind::Trigger {
                reg,
                count,
                active_high,
            } => {
                let hi = if *active_high {
                    Expr::ones(reg.width)
                } else {
                    Expr::zero(reg.width)
                };
                let lo = !hi.clone();
                let r = Expr::Net(reg.name);
                match count {
                    Some(count) => {
                        logic.seq = Self::guard(
                            node,
                            vec![Stmt::if_else(
                                start.clone(),
                                vec![Stmt::assign(reg.name, hi)],
                                vec![Stmt::when(
                                    Expr::Net(node.done()),
                                    vec![Stmt::assign(reg.name, lo)],
                                )],
                            )],
                        );
                        let reached = self.stall_reached(node, count);
                        (running.clone() & reached, Running::Latch)
                    }
                    None => {
                        logic.seq = Self::guard(
                            node,
                            vec![Stmt::if_else(
                                start.clone(),
                                vec![Stmt::assign(reg.name, hi.clone())],
                                vec![Stmt::assign(reg.name, lo.clone())],
                            )],
                        );
                        (
                            running.clone() & r.clone().eq(lo),
                            Running::Follow(r.eq(hi)),
                        )
                    }
                }
            }
            NodeKind::Toggle { reg } => {
                logic.seq = Self::guard(
                    node,
                    vec![Stmt::when(
                        start.clone(),
                        vec![Stmt::assign(reg.name, !Expr::Net(reg.name))],
                    )],
                );
                (running.clone(), Running::Follow(Expr::bit(false)))
            }
            NodeKind::Sync {
                sync,
                active_high,
                set,
            } => {
                logic.seq = Self::set_stmts(node, set);
                let cond = if *active_high {
                    Expr::Net(sync.name).reduce_and()
                } else {
                    !Expr::Net(sync.name).reduce_or()
                };
                (running.clone() & cond, Running::Latch)
            }
            NodeKind::Child { link, set, detach } => {
                let child_done = self.lower_child(node, link, &mut logic);
                logic.seq.extend(Self::set_stmts(node, set));
                let waited = child_done & running.clone();
                let done = match detach {
                    DetachMode::Always => running.clone(),
                    DetachMode::Never => waited,
                    DetachMode::When(v) => {
                        Expr::mux(arith::expr(v), running.clone(), waited)
                    }
                };
                (done, Running::Latch)
            }
            NodeKind::Serial { set, term } => {
                let done =
                    self.lower_serial(node, &subnodes, &subs, term.as_ref(), &mut logic);
                let mut seq = Self::set_stmts(node, set);
                seq.append(&mut logic.seq);
                logic.seq = seq;
                (done, Running::Latch)
            }
            NodeKind::Parallel => {
                for sub in &subnodes {
                    self.module.assign(sub.start(), start.clone());
                }
                let any_running =
                    Expr::any(subnodes.iter().map(|s| Expr::Net(s.running())));
                for l in &subs {
                    logic.seq.extend(l.seq.iter().cloned());
                    logic.inactive.extend(l.inactive.iter().cloned());
                }
                (
                    running.clone() & !any_running.clone(),
                    Running::Follow(any_running),
                )
            }
            NodeKind::Select { sel } => {
                let sel_w = sel.width();
                let key = |i: usize| {
                    let w = sel_w.max(bits_needed_for(i as u64 + 1));
                    arith::fit(sel, w).eq(Expr::constant(i as u128, w))
                };
                let mut chosen = Expr::bit(true);
                for (i, sub) in subnodes.iter().enumerate().rev() {
                    self.module.assign(sub.start(), start.clone() & key(i));
                    chosen = Expr::mux(key(i), Expr::Net(sub.done()), chosen);
                }
                let arms = subs
                    .iter()
                    .enumerate()
                    .map(|(i, l)| CaseArm {
                        value: i as u128,
                        label: None,
                        body: l.seq.clone(),
                    })
                    .collect();
                logic.seq = vec![Stmt::Case {
                    sel: arith::expr(sel),
                    arms,
                }];
                logic.inactive = subs.iter().flat_map(|l| l.inactive.clone()).collect();
                (running.clone() & chosen, Running::Latch)
            }
            NodeKind::Repeat { count, counter } => {
                let sub = subnodes[0];
                let cw = count.width();
                let cnt_name = node.local("counter");
                let cnt = self.module.reg(cnt_name, cw);
                self.reset.push(Stmt::assign(cnt_name, Expr::zero(cw)));
                let last = match count {
                    Value::Const { val, width } => cnt
                        .clone()
                        .ge(Expr::constant(val.saturating_sub(1), *width)),
                    Value::Net(sig) => {
                        let limit = self.module.define(
                            node.local("limit"),
                            cw,
                            Expr::Net(sig.name).sub(Expr::constant(1, cw)),
                        );
                        cnt.clone().ge(limit)
                    }
                };
                let sub_done = Expr::Net(sub.done());
                self.module.assign(
                    sub.start(),
                    start.clone() | (sub_done.clone() & !Expr::Net(node.done())),
                );
                if let Some(port) = counter {
                    let sig = Signal::new(cnt_name, cw);
                    self.module.assign(port.name, arith::resize(&sig, port.width));
                }
                logic.seq = vec![Stmt::if_else(
                    start.clone(),
                    vec![Stmt::assign(cnt_name, Expr::zero(cw))],
                    vec![Stmt::when(
                        sub_done.clone(),
                        vec![Stmt::assign(cnt_name, cnt.add(Expr::constant(1, cw)))],
                    )],
                )];
                logic.seq.extend(subs[0].seq.iter().cloned());
                logic.inactive = subs[0].inactive.clone();
                (running.clone() & sub_done & last, Running::Latch)
            }
            NodeKind::Count {
                dir,
                reg,
                stop,
                skip,
            } => {
                let wr = reg.width;
                let we = wr.max(skip.width()) + 1;
                let current = arith::resize(
                    &Signal {
                        signed: false,
                        ..reg.clone()
                    },
                    we,
                );
                let skip = match skip {
                    Value::Net(s) => arith::resize(
                        &Signal {
                            signed: false,
                            ..s.clone()
                        },
                        we,
                    ),
                    c => arith::fit(c, we),
                };
                let pre_name = node.local("next_pre");
                let pre = match dir {
                    CountDir::Down => current.sub(skip),
                    CountDir::Up => current.add(skip),
                };
                self.module.define(pre_name, we, pre);
                let low = Expr::slice(pre_name, wr - 1, 0);
                let next_v = match dir {
                    CountDir::Down => Expr::mux(
                        Expr::slice(pre_name, we - 1, we - 1),
                        Expr::zero(wr),
                        low,
                    ),
                    CountDir::Up => Expr::mux(
                        Expr::slice(pre_name, we - 1, wr).reduce_or(),
                        Expr::ones(wr),
                        low,
                    ),
                };
                let next = self.module.define(node.local("next"), wr, next_v);
                let stop = arith::expr(stop);
                let (step, finished) = match dir {
                    CountDir::Down => (next.clone().ge(stop.clone()), next.le(stop)),
                    CountDir::Up => (next.clone().le(stop.clone()), next.ge(stop)),
                };
                logic.seq = vec![Stmt::when(
                    running.clone() & step,
                    vec![Stmt::assign(reg.name, Expr::Net(node.local("next")))],
                )];
                (running.clone() & finished, Running::Latch)
            }
            NodeKind::Add { a, b, out, clamp } => {
                let ws = arith::effective_width(a, b).max(arith::effective_width(b, a)) + 1;
                let sum = Signal {
                    name: node.local("sum"),
                    width: ws,
                    signed: a.signed() || b.signed(),
                    init: 0,
                };
                self.module.define(
                    sum.name,
                    ws,
                    arith::fit(a, ws).add(arith::fit(b, ws)),
                );
                let value = self.narrow(node, &sum, out, Justify::Right, *clamp);
                logic.seq = Self::guard(
                    node,
                    vec![Stmt::when(start.clone(), vec![Stmt::assign(out.name, value)])],
                );
                (running.clone(), Running::Follow(Expr::bit(false)))
            }
            NodeKind::Multiply {
                a,
                b,
                out,
                justify,
                clamp,
            } => {
                let wp = arith::effective_width(a, b) + arith::effective_width(b, a);
                let product = Signal {
                    name: node.local("product"),
                    width: wp,
                    signed: a.signed() || b.signed(),
                    init: 0,
                };
                self.module.define(
                    product.name,
                    wp,
                    arith::fit(a, wp).mul(arith::fit(b, wp)),
                );
                let value = self.narrow(node, &product, out, *justify, *clamp);
                logic.seq = Self::guard(
                    node,
                    vec![Stmt::when(start.clone(), vec![Stmt::assign(out.name, value)])],
                );
                (running.clone(), Running::Follow(Expr::bit(false)))
            }
            NodeKind::SerialMultiply {
                a,
                b,
                out,
                justify,
                clamp,
            } => {
                let done = self.lower_serial_multiply(
                    node, a, b, out, *justify, *clamp, &mut logic,
                );
                (done, Running::Latch)
            }
        };

        self.module.assign(node.done(), done);
        let bin_start = Expr::net("start");
        self.running.push(match mode {
            Running::Latch => Stmt::if_else(
                start.clone(),
                vec![Stmt::assign(node.running(), Expr::bit(true))],
                vec![Stmt::when(
                    Expr::Net(node.done()) | bin_start,
                    vec![Stmt::assign(node.running(), Expr::bit(false))],
                )],
            ),
            Running::Follow(level) => Stmt::assign(
                node.running(),
                start.clone() | (!bin_start & level),
            ),
        });

        if let Some(s) = &node.exports.start {
            self.module.assign(s.name, start);
        }
        if let Some(s) = &node.exports.running {
            self.module.assign(s.name, running);
        }
        if let Some(s) = &node.exports.done {
            self.module.assign(s.name, Expr::Net(node.done()));
        }
        logic
    }

    /// Wire a `Child` node to the child bins it dispatches to. Returns the
    /// child completion it waits for.
    fn lower_child(&mut self, node: &Node, link: &ChildLink, logic: &mut NodeLogic) -> Expr {
        let start = Expr::Net(node.start());
        match link {
            ChildLink::Fixed { child, index } => {
                let c = self.ctx.bin(*child);
                logic.seq.push(Stmt::when(
                    start,
                    vec![Stmt::assign(
                        child_net(c, "seq"),
                        Expr::constant(*index as u128, seq_width(c)),
                    )],
                ));
                Expr::Net(child_net(c, "done"))
            }
            ChildLink::Dynamic {
                sel,
                child_bits,
                seq_bits,
            } => {
                let w = sel.width;
                let child_sel = (*child_bits > 0).then(|| {
                    self.module.define(
                        node.local("child_sel"),
                        *child_bits,
                        Expr::slice(sel.name, w - 1, w - child_bits),
                    )
                });
                let seq_sel = node.local("seq_sel");
                self.module
                    .define(seq_sel, *seq_bits, Expr::slice(sel.name, seq_bits - 1, 0));

                let mut arms = vec![];
                let mut finished = vec![];
                for (i, id) in self.bin.children.iter().enumerate() {
                    let c = self.ctx.bin(*id);
                    let wi = seq_width(c);
                    let value = if wi == *seq_bits {
                        Expr::Net(seq_sel)
                    } else {
                        Expr::slice(seq_sel, wi - 1, 0)
                    };
                    let hit = match &child_sel {
                        Some(cs) => cs.clone().eq(Expr::constant(i as u128, *child_bits)),
                        None => Expr::bit(true),
                    };
                    if child_sel.is_some() {
                        self.module.define(
                            node.child_start(c.name),
                            1,
                            start.clone() & hit.clone(),
                        );
                    }
                    finished.push(Expr::Net(child_net(c, "done")) & hit);
                    arms.push(CaseArm {
                        value: i as u128,
                        label: None,
                        body: vec![Stmt::assign(child_net(c, "seq"), value)],
                    });
                }
                let body = match child_sel {
                    Some(cs) => vec![Stmt::Case { sel: cs, arms }],
                    None => arms.into_iter().flat_map(|a| a.body).collect(),
                };
                logic.seq.push(Stmt::when(start, body));
                Expr::any(finished)
            }
        }
    }

    /// A program counter walks the subsequences; each one's `done` starts
    /// the next. Returns the `done` condition.
    fn lower_serial(
        &mut self,
        node: &Node,
        subnodes: &[&Node],
        subs: &[NodeLogic],
        term: Option<&Value>,
        logic: &mut NodeLogic,
    ) -> Expr {
        let start = Expr::Net(node.start());
        let running = Expr::Net(node.running());
        let n = subnodes.len();
        let aw = bits_needed_for(n as u64);
        let addr_name = node.local("addr");
        let addr = self.module.reg(addr_name, aw);
        self.reset.push(Stmt::assign(addr_name, Expr::zero(aw)));
        let at = |i: usize| addr.clone().eq(Expr::constant(i as u128, aw));

        let term_hit = term.map(|t| {
            self.module
                .define(node.local("term"), 1, addr.clone().ge(arith::expr(t)))
        });
        let go_on = term_hit.clone().map(|t| !t).unwrap_or(Expr::bit(true));

        self.module.assign(subnodes[0].start(), start.clone());
        for i in 1..n {
            self.module.assign(
                subnodes[i].start(),
                Expr::Net(subnodes[i - 1].done()) & at(i - 1) & go_on.clone(),
            );
        }
        let advance = Expr::any(subnodes[1..].iter().map(|s| Expr::Net(s.start())));
        let next_addr = self.module.define(
            node.local("next_addr"),
            aw,
            Expr::mux(
                start,
                Expr::zero(aw),
                Expr::mux(advance, addr.clone().add(Expr::constant(1, aw)), addr.clone()),
            ),
        );

        logic.seq.push(Stmt::assign(addr_name, next_addr));
        for (i, (sub, l)) in subnodes.iter().zip(subs).enumerate() {
            if !l.seq.is_empty() {
                logic
                    .seq
                    .push(Stmt::when(at(i) | Expr::Net(sub.start()), l.seq.clone()));
            }
        }
        logic.inactive.push(Stmt::assign(addr_name, Expr::zero(aw)));
        logic
            .inactive
            .extend(subs.iter().flat_map(|l| l.inactive.iter().cloned()));

        let last = Expr::Net(subnodes[n - 1].done());
        match term_hit {
            None => last & running,
            Some(t) => {
                let any_done = Expr::any(subnodes.iter().map(|s| Expr::Net(s.done())));
                running & ((any_done & t) | last)
            }
        }
    }

    /// Shift-and-add over the bits of `b`, one bit per cycle. Returns the
    /// `done` condition.
    #[allow(clippy::too_many_arguments)]
    fn lower_serial_multiply(
        &mut self,
        node: &Node,
        a: &Value,
        b: &Value,
        out: &Signal,
        justify: Justify,
        clamp: bool,
        logic: &mut NodeLogic,
    ) -> Expr {
        let start = Expr::Net(node.start());
        let running = Expr::Net(node.running());
        let wp = arith::effective_width(a, b) + arith::effective_width(b, a);
        let wb = b.width();
        let wi = bits_needed_for(wb + 1);

        let a_ = self.module.define(node.local("a"), wp, arith::fit(a, wp));
        let b_name = node.local("b");
        self.module.define(b_name, wb, arith::expr(b));
        let idx_name = node.local("idx");
        let idx = self.module.reg(idx_name, wi);
        let acc_name = node.local("acc");
        let acc = self.module.reg(acc_name, wp);
        self.reset.push(Stmt::assign(acc_name, Expr::zero(wp)));
        self.reset.push(Stmt::assign(idx_name, Expr::zero(wi)));

        // The first step runs on the start edge, so `cur` and `base` restart
        // the walk whenever `start` is high.
        let cur = self.module.define(
            node.local("cur"),
            wi,
            Expr::mux(start.clone(), Expr::zero(wi), idx.clone()),
        );
        let base = self.module.define(
            node.local("base"),
            wp,
            Expr::mux(start.clone(), Expr::zero(wp), acc),
        );
        let bit = if wb == 1 {
            Expr::Net(b_name)
        } else {
            Expr::index(b_name, cur.clone())
        };
        let pp = self.module.define(
            node.local("pp"),
            wp,
            Expr::mux(bit, a_.shl(cur.clone()), Expr::zero(wp)),
        );
        let last = self.module.define(
            node.local("last"),
            1,
            cur.clone().eq(Expr::constant(u128::from(wb - 1), wi)),
        );
        let next = if b.signed() {
            Expr::mux(
                last.clone(),
                base.clone().sub(pp.clone()),
                base.clone().add(pp),
            )
        } else {
            base.add(pp)
        };
        let acc_next = Signal {
            name: node.local("acc_next"),
            width: wp,
            signed: a.signed() || b.signed(),
            init: 0,
        };
        self.module.define(acc_next.name, wp, next);
        let value = self.narrow(node, &acc_next, out, justify, clamp);

        let mut step = vec![
            Stmt::assign(acc_name, Expr::Net(acc_next.name)),
            Stmt::assign(idx_name, cur.add(Expr::constant(1, wi))),
        ];
        step.extend(Self::guard(
            node,
            vec![Stmt::when(last, vec![Stmt::assign(out.name, value)])],
        ));
        let busy = running.clone() & idx.clone().lt(Expr::constant(u128::from(wb), wi));
        logic.seq = vec![Stmt::when(start | busy, step)];
        // One step per bit of `b`; the product is in place when `done` rises.
        running & idx.eq(Expr::constant(u128::from(wb), wi))
    }

    /// Top-level starts, the bin's `done_`/`running`/`done` and the main
    /// clocked process holding the dispatch `case`.
    fn dispatch(&mut self, logic: Vec<NodeLogic>) {
        let bin = self.bin;
        let sw = seq_width(bin);
        let sel = |i: usize| Expr::net("seq").eq(Expr::constant(i as u128, sw));
        let bin_start = Expr::net("start");

        let mut chosen = Expr::bit(true);
        for (i, node) in bin.top_level().enumerate().collect::<Vec<_>>().into_iter().rev() {
            self.module
                .assign(node.start(), bin_start.clone() & sel(i));
            chosen = Expr::mux(sel(i), Expr::Net(node.done()), chosen);
        }
        self.module.assign(
            "done_",
            Expr::mux(
                bin_start.clone() | !Expr::net("running"),
                Expr::bit(false),
                chosen,
            ),
        );

        let arms = bin
            .top_level()
            .enumerate()
            .map(|(i, node)| {
                let mut body: Vec<Stmt> = logic
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .flat_map(|(_, l)| l.inactive.iter().cloned())
                    .collect();
                body.extend(logic[i].seq.iter().cloned());
                CaseArm {
                    value: i as u128,
                    label: Some(Id::from(format!("seq_{}_", node.name))),
                    body,
                }
            })
            .collect();

        let mut reset: Vec<Stmt> = bin
            .regs
            .values()
            .map(|r| Stmt::assign(r.name, Expr::constant(r.init_bits(), r.width)))
            .collect();
        let mut body = vec![];
        if !bin.len1 {
            reset.push(Stmt::assign("running", Expr::bit(false)));
            body.push(Stmt::if_else(
                bin_start.clone(),
                vec![Stmt::assign("running", Expr::bit(true))],
                vec![Stmt::when(
                    Expr::net("done_"),
                    vec![Stmt::assign("running", Expr::bit(false))],
                )],
            ));
        }
        reset.append(&mut self.reset);
        body.append(&mut self.running);
        body.push(Stmt::Case {
            sel: Expr::net("seq"),
            arms,
        });
        self.module.processes.push(Process {
            comment: Some("Dispatch".to_string()),
            reset,
            body,
        });

        if bin.len1 {
            self.module.processes.push(Process {
                comment: Some("Single cycle completion".to_string()),
                reset: vec![Stmt::assign("done", Expr::bit(false))],
                body: vec![Stmt::assign("done", bin_start)],
            });
            self.module.assign("running", Expr::net("done"));
        } else if bin.register_done {
            self.module.processes.push(Process {
                comment: Some("Registered completion".to_string()),
                reset: vec![Stmt::assign("done", Expr::bit(false))],
                body: vec![Stmt::assign("done", Expr::net("done_"))],
            });
        } else {
            self.module.assign("done", Expr::net("done_"));
        }
    }

    /// One counter shared by every stall-family node, restarted by any of
    /// their starts and saturating at all ones.
    fn stall_counter(&mut self) {
        let bin = self.bin;
        let Some(bucket) = bin.seqdata.get(StaticKind::Stall) else {
            return;
        };
        let m = bucket.max_width;
        let cnt = self.module.reg(STALL_COUNT, m);
        let any_start = self.module.define(
            "start_stall_count_",
            1,
            Expr::any(bucket.insts.iter().map(|i| Expr::Net(bin.node(*i).start()))),
        );
        let next = self.module.define(
            "next_stall_count_",
            m,
            Expr::mux(
                any_start,
                Expr::zero(m),
                Expr::mux(
                    cnt.clone().reduce_and(),
                    cnt.clone(),
                    cnt.add(Expr::constant(1, m)),
                ),
            ),
        );
        self.module.processes.push(Process {
            comment: Some("Stall counter".to_string()),
            reset: vec![Stmt::assign(STALL_COUNT, Expr::zero(m))],
            body: vec![Stmt::assign(STALL_COUNT, next)],
        });
    }

    fn child_starts(&mut self) {
        if self.bin.children.is_empty() {
            return;
        }
        let mut process = Process {
            comment: Some("Child starts".to_string()),
            ..Default::default()
        };
        for (id, starts) in self.bin.child_starts.iter() {
            let c = self.ctx.bin(*id);
            let net = child_net(c, "start");
            process.reset.push(Stmt::assign(net, Expr::bit(false)));
            process.body.push(Stmt::assign(
                net,
                Expr::any(starts.iter().map(|s| Expr::Net(*s))),
            ));
        }
        self.module.processes.push(process);
    }

    fn instances(&mut self) {
        for id in &self.bin.children {
            let c = self.ctx.bin(*id);
            let mut conns: Vec<(Id, Id)> =
                vec![("clk".into(), "clk".into()), ("reset_n".into(), "reset_n".into())];
            // Outputs terminated by a register of this bin stay unconnected.
            conns.extend(
                c.ports
                    .values()
                    .filter(|p| {
                        p.dir == Direction::Input || !self.bin.regs.contains_key(&p.sig.name)
                    })
                    .map(|p| (p.sig.name, p.sig.name)),
            );
            for what in ["seq", "start", "running", "done"] {
                conns.push((what.into(), child_net(c, what)));
            }
            self.module.instances.push(Instance {
                module: c.name,
                name: Id::from(format!("u_{}_", c.name)),
                conns,
            });
        }
    }
}
