//! Cycle-level behavior of synthesized bins, checked in the simulator.
use seqc_ir::{BinDef, BinId, Context, Justify, Seq, Signal};
use seqc_sim::Simulator;
use seqc_synth::synthesize;

struct Bench {
    sim: Simulator,
}

impl Bench {
    /// Link every bin in order and simulate the last one.
    fn new(defs: Vec<BinDef>) -> Self {
        let mut ctx = Context::new();
        let mut top = None;
        for def in defs {
            top = Some(ctx.add_bin(def).unwrap());
        }
        Self::of(&ctx, top.unwrap())
    }

    fn of(ctx: &Context, top: BinId) -> Self {
        let design = synthesize(ctx, top, true);
        let mut sim = Simulator::new(&design).unwrap();
        sim.reset().unwrap();
        Bench { sim }
    }

    fn peek(&self, net: &str) -> u128 {
        self.sim.peek(net).unwrap()
    }

    fn poke(&mut self, net: &str, v: u128) {
        self.sim.poke(net, v).unwrap()
    }

    fn step(&mut self) {
        self.sim.step()
    }

    /// Address `seq` and hold `start` for one clock edge.
    fn start(&mut self, seq: u128) {
        self.poke("seq", seq);
        self.poke("start", 1);
        self.step();
        self.poke("start", 0);
    }

    /// Clock edges from the one sampling `start` until `done` reads high.
    fn run(&mut self, seq: u128) -> u64 {
        self.start(seq);
        let mut edges = 1;
        while self.peek("done") == 0 {
            assert!(edges < 100, "`done` never rose");
            self.step();
            edges += 1;
        }
        edges
    }
}

fn bin(name: &str, seqs: Vec<Seq>) -> BinDef {
    BinDef::new(name, seqs).combinational_done()
}

#[test]
fn stalls_share_one_counter() {
    let mut b = Bench::new(vec![bin(
        "stalls",
        vec![Seq::stall(3).named("short"), Seq::stall(5).named("long")],
    )]);
    assert_eq!(b.run(0), 3);
    assert_eq!(b.run(1), 5);
    assert_eq!(b.run(0), 3);
    // Idle, the counter saturates at its 3-bit maximum.
    for _ in 0..20 {
        b.step();
    }
    assert_eq!(b.peek("stall_count_"), 7);
}

#[test]
fn registered_done_is_one_cycle_later() {
    let mut b = Bench::new(vec![BinDef::new("reg_done", vec![Seq::stall(3)])]);
    assert_eq!(b.run(0), 4);
    b.step();
    assert_eq!(b.peek("done"), 0);
    assert_eq!(b.peek("running"), 0);
}

#[test]
fn running_covers_the_whole_sequence() {
    let mut b = Bench::new(vec![bin("level", vec![Seq::stall(4)])]);
    assert_eq!(b.peek("running"), 0);
    b.start(0);
    for _ in 0..3 {
        assert_eq!(b.peek("running"), 1);
        assert_eq!(b.peek("done"), 0);
        b.step();
    }
    assert_eq!(b.peek("done"), 1);
    b.step();
    assert_eq!(b.peek("running"), 0);
    assert_eq!(b.peek("done"), 0);
}

#[test]
fn serial_walks_its_index() {
    let mut b = Bench::new(vec![bin(
        "walk",
        vec![Seq::serial(vec![Seq::nop(), Seq::nop(), Seq::nop()]).named("walk")],
    )]);
    b.start(0);
    let mut seen = vec![b.peek("seq_walk_addr_")];
    while b.peek("done") == 0 {
        b.step();
        seen.push(b.peek("seq_walk_addr_"));
    }
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn serial_term_stops_early() {
    let serial = Seq::serial(vec![Seq::nop(), Seq::nop(), Seq::nop()]);
    let mut b = Bench::new(vec![bin("early", vec![serial.with_term(1)])]);
    assert_eq!(b.run(0), 2);
}

#[test]
fn repeat_exports_its_pass() {
    let body = Seq::repeat(Seq::stall(2), 4).with_counter(Signal::new("pass", 2));
    let mut b = Bench::new(vec![bin("again", vec![body])]);
    b.start(0);
    let mut passes = vec![b.peek("pass")];
    while b.peek("done") == 0 {
        b.step();
        passes.push(b.peek("pass"));
    }
    assert_eq!(passes, vec![0, 0, 1, 1, 2, 2, 3, 3]);
}

#[test]
fn parallel_waits_for_every_branch() {
    let par = Seq::parallel(vec![
        Seq::serial(vec![Seq::nop(), Seq::nop()]),
        Seq::nop(),
    ]);
    let mut b = Bench::new(vec![bin("fork", vec![par])]);
    assert_eq!(b.run(0), 3);
}

#[test]
fn select_follows_its_selector() {
    let sel = Signal::new("pick", 1);
    let mut b = Bench::new(vec![bin(
        "choose",
        vec![Seq::select(vec![Seq::stall(2), Seq::stall(4)], sel)],
    )]);
    b.poke("pick", 1);
    assert_eq!(b.run(0), 4);
    b.poke("pick", 0);
    assert_eq!(b.run(0), 2);
}

#[test]
fn trigger_pulses() {
    let mut b = Bench::new(vec![
        bin(
            "pulse",
            vec![Seq::trigger("go"), Seq::trigger_for("go", 3)],
        )
        .with_regs(vec![Signal::new("go", 1)]),
    ]);
    b.start(0);
    assert_eq!(b.peek("go"), 1);
    b.step();
    assert_eq!(b.peek("go"), 0);
    assert_eq!(b.peek("done"), 1);
    b.step();

    b.start(1);
    let mut high = 0;
    while b.peek("done") == 0 {
        high += b.peek("go");
        b.step();
    }
    high += b.peek("go");
    assert_eq!(high, 3);
    b.step();
    assert_eq!(b.peek("go"), 0);
}

#[test]
fn toggle_and_sync() {
    let ready = Signal::new("ready", 1);
    let mut b = Bench::new(vec![
        bin("flip", vec![Seq::toggle("t"), Seq::sync(ready)])
            .with_regs(vec![Signal::new("t", 1)]),
    ]);
    assert_eq!(b.run(0), 1);
    assert_eq!(b.peek("t"), 1);
    b.step();
    b.run(0);
    assert_eq!(b.peek("t"), 0);
    b.step();

    b.start(1);
    for _ in 0..5 {
        assert_eq!(b.peek("done"), 0);
        b.step();
    }
    b.poke("ready", 1);
    assert_eq!(b.peek("done"), 1);
}

#[test]
fn dryrun_keeps_timing_and_skips_writes() {
    let set = Seq::set([("x", 5)]).with_dryrun(Signal::new("dry", 1));
    let mut b = Bench::new(vec![
        bin("maybe", vec![Seq::serial(vec![set, Seq::nop()])])
            .with_regs(vec![Signal::new("x", 3)]),
    ]);
    b.poke("dry", 1);
    assert_eq!(b.run(0), 2);
    assert_eq!(b.peek("x"), 0);
    b.step();
    b.poke("dry", 0);
    assert_eq!(b.run(0), 2);
    assert_eq!(b.peek("x"), 5);
}

#[test]
fn stall_counts_from_signals_and_registers() {
    let len = Signal::new("len", 4);
    let mut b = Bench::new(vec![bin("wait", vec![Seq::stall(len)])]);
    b.poke("len", 6);
    assert_eq!(b.run(0), 6);
    b.poke("len", 2);
    assert_eq!(b.run(0), 2);

    let mut b = Bench::new(vec![
        bin("wait_reg", vec![Seq::set([("n", 3)]), Seq::stall("n")])
            .with_regs(vec![Signal::new("n", 4)]),
    ]);
    b.run(0);
    b.step();
    assert_eq!(b.run(1), 3);
}

#[test]
fn trigger_width_from_a_signal() {
    let mut b = Bench::new(vec![
        bin("pulse", vec![Seq::trigger_for("go", Signal::new("width", 3))])
            .with_regs(vec![Signal::new("go", 1)]),
    ]);
    b.poke("width", 2);
    b.start(0);
    let mut high = 0;
    while b.peek("done") == 0 {
        high += b.peek("go");
        b.step();
    }
    high += b.peek("go");
    assert_eq!(high, 2);
}

#[test]
fn active_low_trigger() {
    let mut b = Bench::new(vec![
        bin("pulse_n", vec![Seq::trigger("go_n").active_low()])
            .with_regs(vec![Signal::new("go_n", 1).with_init(1)]),
    ]);
    assert_eq!(b.peek("go_n"), 1);
    b.start(0);
    assert_eq!(b.peek("go_n"), 0);
    b.step();
    assert_eq!(b.peek("go_n"), 1);
    assert_eq!(b.peek("done"), 1);
}

#[test]
fn stall_writes_at_start_or_at_end() {
    let mut b = Bench::new(vec![
        bin(
            "hold",
            vec![
                Seq::stall(3).with_set([("x", 5)]),
                Seq::stall(3).with_set([("y", 2)]).at_end(),
            ],
        )
        .with_regs(vec![Signal::new("x", 3), Signal::new("y", 3)]),
    ]);
    b.start(0);
    assert_eq!(b.peek("x"), 5);
    while b.peek("done") == 0 {
        b.step();
    }
    b.step();

    b.start(1);
    while b.peek("done") == 0 {
        assert_eq!(b.peek("y"), 0);
        b.step();
    }
    assert_eq!(b.peek("y"), 0);
    b.step();
    assert_eq!(b.peek("y"), 2);
}

#[test]
fn select_out_of_range_completes() {
    let mut b = Bench::new(vec![bin(
        "choose",
        vec![Seq::select(
            vec![Seq::stall(2), Seq::stall(3), Seq::stall(4)],
            Signal::new("pick", 2),
        )],
    )]);
    b.poke("pick", 3);
    assert_eq!(b.run(0), 1);
    b.step();
    b.poke("pick", 2);
    assert_eq!(b.run(0), 4);
}

#[test]
fn repeat_count_zero_runs_the_maximum() {
    let k = Signal::new("k", 2);
    let mut b = Bench::new(vec![bin("again", vec![Seq::repeat(Seq::nop(), k)])]);
    b.poke("k", 3);
    assert_eq!(b.run(0), 3);
    b.step();
    b.poke("k", 0);
    assert_eq!(b.run(0), 4);
}

#[test]
fn reset_restores_initial_values() {
    let mut b = Bench::new(vec![
        bin("restore", vec![Seq::set([("x", 7), ("y", 1)]), Seq::reset()])
            .with_regs(vec![Signal::new("x", 3).with_init(2), Signal::new("y", 1)]),
    ]);
    assert_eq!(b.peek("x"), 2);
    b.run(0);
    assert_eq!((b.peek("x"), b.peek("y")), (7, 1));
    b.step();
    assert_eq!(b.run(1), 1);
    assert_eq!((b.peek("x"), b.peek("y")), (2, 0));
}

#[test]
fn preemption_never_reports_the_old_node() {
    let mut b = Bench::new(vec![bin(
        "preempt",
        vec![Seq::stall(10).named("slow"), Seq::stall(2).named("fast")],
    )]);
    b.start(0);
    for _ in 0..3 {
        b.step();
        assert_eq!(b.peek("done"), 0);
    }
    assert_eq!(b.peek("seq_slow_running_"), 1);

    b.poke("seq", 1);
    b.poke("start", 1);
    assert_eq!(b.peek("done_"), 0);
    assert_eq!(b.peek("seq_fast_start_"), 1);
    assert_eq!(b.peek("seq_slow_start_"), 0);
    b.step();
    b.poke("start", 0);
    assert_eq!(b.peek("seq_slow_running_"), 0);
    assert_eq!(b.peek("done"), 0);
    b.step();
    assert_eq!(b.peek("done"), 1);
    assert_eq!(b.peek("seq_slow_done_"), 0);
}

#[test]
fn dynamic_child_addressing() {
    let a = bin("a", vec![Seq::nop().named("a0"), Seq::nop().named("a1")]);
    let b = bin(
        "b",
        vec![
            Seq::nop().named("b0"),
            Seq::nop().named("b1"),
            Seq::nop().named("b2"),
            Seq::stall(2).named("b3"),
            Seq::nop().named("b4"),
        ],
    );
    let mut ctx = Context::new();
    let ia = ctx.add_bin(a).unwrap();
    let ib = ctx.add_bin(b).unwrap();
    let top = ctx
        .add_bin(
            bin("top", vec![Seq::from(Signal::new("target", 4)).named("go")])
                .with_children(vec![ia, ib]),
        )
        .unwrap();
    let mut t = Bench::of(&ctx, top);

    // child 1, sequence 3
    t.poke("target", 0b1011);
    t.start(0);
    assert_eq!(t.peek("u_b_.seq"), 3);
    assert_eq!(t.peek("u_b_.start"), 1);
    assert_eq!(t.peek("u_a_.seq"), 0);
    assert_eq!(t.peek("u_a_.start"), 0);
    let mut edges = 1;
    while t.peek("done") == 0 {
        assert_eq!(t.peek("u_a_.running"), 0);
        t.step();
        edges += 1;
    }
    assert_eq!(edges, 3);
    assert_eq!(t.peek("u_b_.seq_b3_running_"), 1);
}

#[test]
fn detached_child_completes_at_once() {
    let c = bin("c", vec![Seq::stall(5).named("hold")]);
    let mut ctx = Context::new();
    let ic = ctx.add_bin(c).unwrap();
    let top = ctx
        .add_bin(
            bin("fire", vec![Seq::child("hold").detached(true)]).with_children(vec![ic]),
        )
        .unwrap();
    let mut t = Bench::of(&ctx, top);
    assert_eq!(t.run(0), 1);
    t.step();
    assert_eq!(t.peek("u_c_.running"), 1);
    assert_eq!(t.peek("running"), 0);
}

#[test]
fn terminated_child_output_stays_inside() {
    let c = bin("c", vec![Seq::set([("flag", 1)]).named("raise")])
        .with_regs(vec![Signal::new("flag", 1)]);
    let mut ctx = Context::new();
    let ic = ctx.add_bin(c).unwrap();
    let top = ctx
        .add_bin(
            bin("p", vec![Seq::child("raise")])
                .with_regs(vec![Signal::new("flag", 1)])
                .with_children(vec![ic]),
        )
        .unwrap();
    let design = synthesize(&ctx, top, true);
    assert!(design.top().unwrap().ports.iter().all(|p| p.name != "flag"));

    let mut t = Bench::of(&ctx, top);
    t.run(0);
    assert_eq!(t.peek("u_c_.flag"), 1);
    assert_eq!(t.peek("flag"), 0);
}

#[test]
fn single_cycle_bin() {
    let mut b = Bench::new(vec![
        BinDef::new("once", vec![Seq::set([("x", 1)])])
            .with_regs(vec![Signal::new("x", 1)])
            .single_cycle(),
    ]);
    b.start(0);
    assert_eq!(b.peek("done"), 1);
    assert_eq!(b.peek("running"), 1);
    assert_eq!(b.peek("x"), 1);
    b.step();
    assert_eq!(b.peek("done"), 0);
    assert_eq!(b.peek("running"), 0);
}

#[test]
fn counters_saturate_at_stop() {
    let mut b = Bench::new(vec![
        bin(
            "count",
            vec![Seq::count_down("n", 3, 2), Seq::count_up("m", 15, 6)],
        )
        .with_regs(vec![Signal::new("n", 4).with_init(10), Signal::new("m", 4)]),
    ]);
    assert_eq!(b.run(0), 4);
    assert_eq!(b.peek("n"), 4);
    b.step();
    assert_eq!(b.peek("n"), 4);

    assert_eq!(b.run(1), 3);
    assert_eq!(b.peek("m"), 12);
    b.step();
    assert_eq!(b.peek("m"), 15);
}

fn arith_bench(seq: Seq, out: Signal) -> Bench {
    Bench::new(vec![bin("alu", vec![seq]).with_regs(vec![out])])
}

#[test]
fn add_wraps_or_clamps() {
    let (a, b) = (Signal::new("a", 4), Signal::new("b", 4));
    let out = Signal::new("sum", 4);
    let add = Seq::add(a.clone(), b.clone(), "sum");
    for (seq, expected) in [(add.clone(), 3), (add.clamped(), 15)] {
        let mut t = arith_bench(seq, out.clone());
        t.poke("a", 7);
        t.poke("b", 12);
        t.run(0);
        assert_eq!(t.peek("sum"), expected);
    }

    let (a, b) = (a.signed(), b.signed());
    let out = out.signed();
    let add = Seq::add(a.clone(), b.clone(), "sum");
    for (seq, expected) in [(add.clone(), 5), (add.clamped(), 8)] {
        let mut t = arith_bench(seq, out.clone());
        // -8 + -3
        t.poke("a", 8);
        t.poke("b", 13);
        t.run(0);
        assert_eq!(t.peek("sum"), expected);
    }
}

#[test]
fn multiply_justifies() {
    let (a, b) = (Signal::new("a", 4), Signal::new("b", 4));
    let out = Signal::new("p", 4);
    let mul = Seq::multiply(a.clone(), b.clone(), "p");
    let cases = [
        (mul.clone(), 1),
        (mul.clone().justified(Justify::Right), 2),
        (mul.justified(Justify::Right).clamped(), 15),
    ];
    for (seq, expected) in cases {
        let mut t = arith_bench(seq, out.clone());
        t.poke("a", 6);
        t.poke("b", 3);
        assert_eq!(t.run(0), 1);
        assert_eq!(t.peek("p"), expected);
    }

    // A negative product never reads as a large unsigned one.
    let sa = a.signed();
    let mul = Seq::multiply(sa.clone(), b.clone(), "p");
    for (seq, expected) in [(mul.clone(), 15), (mul.clamped(), 0)] {
        let mut t = arith_bench(seq, out.clone());
        t.poke("a", 14);
        t.poke("b", 3);
        t.run(0);
        assert_eq!(t.peek("p"), expected);
    }
}

#[test]
fn serial_multiply_takes_one_cycle_per_bit() {
    let (a, b) = (Signal::new("a", 4), Signal::new("b", 4));
    let mut t = arith_bench(
        Seq::serial_multiply(a.clone(), b.clone(), "p"),
        Signal::new("p", 8),
    );
    t.poke("a", 6);
    t.poke("b", 3);
    assert_eq!(t.run(0), 4);
    assert_eq!(t.peek("p"), 18);

    let (a, b) = (Signal::new("a", 4), Signal::new("b", 4).signed());
    let mut t = arith_bench(
        Seq::serial_multiply(a.clone(), b.clone(), "p").justified(Justify::Right),
        Signal::new("p", 8).signed(),
    );
    // 3 * -2
    t.poke("a", 3);
    t.poke("b", 14);
    assert_eq!(t.run(0), 4);
    assert_eq!(t.peek("p"), 250);
}
