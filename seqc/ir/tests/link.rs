use seqc_ir::{
    BinDef, ChildLink, Context, Direction, Error, Id, NodeKind, Seq, Signal,
    StaticKind,
};

fn leaf_bin(ctx: &mut Context, name: &str, n: usize) -> seqc_ir::BinId {
    let seqs = (0..n)
        .map(|i| Seq::nop().named(format!("{name}_s{i}")))
        .collect();
    ctx.add_bin(BinDef::new(name, seqs)).unwrap()
}

#[test]
fn duplicate_names_at_any_depth() {
    let mut ctx = Context::new();
    let def = BinDef::new(
        "dup",
        vec![Seq::serial(vec![
            Seq::nop().named("a"),
            Seq::parallel(vec![Seq::nop(), Seq::nop().named("a")]),
        ])],
    );
    let err = ctx.add_bin(def).unwrap_err();
    assert!(matches!(err, Error::NamingConflict(_)), "{err}");
    assert!(ctx.find_bin("dup").is_none());
}

#[test]
fn bins_are_unique() {
    let mut ctx = Context::new();
    leaf_bin(&mut ctx, "b", 1);
    let err = ctx.add_bin(BinDef::new("b", vec![Seq::nop()])).unwrap_err();
    assert!(matches!(err, Error::NamingConflict(_)));
}

#[test]
fn reserved_register_names() {
    let mut ctx = Context::new();
    let def = BinDef::new("r", vec![Seq::nop()]).with_regs(vec![Signal::new("done", 1)]);
    assert!(matches!(
        ctx.add_bin(def).unwrap_err(),
        Error::NamingConflict(_)
    ));
}

#[test]
fn auto_names_are_preorder_and_atomic() {
    let mut ctx = Context::new();
    // Fails after drawing names; the counter must not advance.
    let bad = BinDef::new("bad", vec![Seq::serial(vec![Seq::nop(), Seq::stall("nope")])]);
    assert!(matches!(ctx.add_bin(bad).unwrap_err(), Error::NotFound(_)));

    let id = ctx
        .add_bin(BinDef::new(
            "good",
            vec![Seq::serial(vec![Seq::nop(), Seq::nop()]), Seq::nop()],
        ))
        .unwrap();
    let names: Vec<_> = ctx.bin(id).nodes.iter().map(|n| n.name.to_string()).collect();
    assert_eq!(names, ["seq0001", "seq0002", "seq0003", "seq0004"]);
    assert_eq!(ctx.bin(id).seqs.len(), 2);
}

#[test]
fn child_outputs_are_terminated_by_parent_registers() {
    let mut ctx = Context::new();
    let child = ctx
        .add_bin(
            BinDef::new("child", vec![Seq::set([("x", 1)]).named("go")])
                .with_regs(vec![Signal::new("x", 1)]),
        )
        .unwrap();
    assert!(ctx.bin(child).ports.get(&Id::new("x")).unwrap().reg);

    let owner = ctx
        .add_bin(
            BinDef::new("owner", vec![Seq::from("go")])
                .with_regs(vec![Signal::new("x", 1)])
                .with_children(vec![child]),
        )
        .unwrap();
    assert!(!ctx.bin(owner).ports.contains_key(&Id::new("x")));

    let plain = ctx
        .add_bin(BinDef::new("plain", vec![Seq::from("go")]).with_children(vec![child]))
        .unwrap();
    let port = ctx.bin(plain).ports.get(&Id::new("x")).unwrap();
    assert_eq!(port.dir, Direction::Output);
    assert!(!port.reg);
}

#[test]
fn outputs_are_never_downgraded() {
    let mut ctx = Context::new();
    let child = ctx
        .add_bin(
            BinDef::new("c", vec![Seq::toggle("flag").named("flip")])
                .with_regs(vec![Signal::new("flag", 1)]),
        )
        .unwrap();
    let parent = ctx
        .add_bin(
            BinDef::new(
                "p",
                vec![Seq::serial(vec![Seq::from("flip"), Seq::sync(Signal::new("flag", 1))])],
            )
            .with_children(vec![child]),
        )
        .unwrap();
    let port = ctx.bin(parent).ports.get(&Id::new("flag")).unwrap();
    assert_eq!(port.dir, Direction::Output);
}

#[test]
fn inputs_and_internal_registers() {
    let mut ctx = Context::new();
    let id = ctx
        .add_bin(
            BinDef::new(
                "io",
                vec![
                    Seq::stall("len"),
                    Seq::sync(Signal::new("ready", 1)),
                    Seq::set([("len", 3)]),
                ],
            )
            .with_regs(vec![Signal::new("len", 4)]),
        )
        .unwrap();
    let bin = ctx.bin(id);
    assert!(!bin.ports.contains_key(&Id::new("len")));
    assert_eq!(bin.ports.get(&Id::new("ready")).unwrap().dir, Direction::Input);
    assert_eq!(bin.internal_regs().count(), 1);
}

#[test]
fn missing_and_unknown_registers() {
    let mut ctx = Context::new();
    let err = ctx
        .add_bin(BinDef::new("m", vec![Seq::set([("ghost", 1)])]))
        .unwrap_err();
    assert!(matches!(err, Error::MissingResource(_)), "{err}");

    let err = ctx
        .add_bin(BinDef::new("n", vec![Seq::stall("ghost")]))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[test]
fn control_signals_are_single_bit() {
    let mut ctx = Context::new();
    let err = ctx
        .add_bin(BinDef::new(
            "w",
            vec![Seq::nop().with_dryrun(Signal::new("dry", 2))],
        ))
        .unwrap_err();
    assert!(matches!(err, Error::WidthMismatch(_)), "{err}");
}

#[test]
fn parallel_branches_may_not_share_registers() {
    let mut ctx = Context::new();
    let def = BinDef::new(
        "par",
        vec![Seq::parallel(vec![
            Seq::set([("a", 1)]),
            Seq::serial(vec![Seq::nop(), Seq::toggle("a")]),
        ])],
    )
    .with_regs(vec![Signal::new("a", 1)]);
    let err = ctx.add_bin(def).unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)), "{err}");

    // Disjoint registers are fine.
    let def = BinDef::new(
        "par2",
        vec![Seq::parallel(vec![Seq::set([("a", 1)]), Seq::toggle("b")])],
    )
    .with_regs(vec![Signal::new("a", 1), Signal::new("b", 1)]);
    assert!(ctx.add_bin(def).is_ok());
}

#[test]
fn stall_family_shares_one_bucket() {
    let mut ctx = Context::new();
    let id = ctx
        .add_bin(
            BinDef::new(
                "st",
                vec![Seq::stall(3), Seq::stall(20), Seq::trigger_for("pulse", 2)],
            )
            .with_regs(vec![Signal::new("pulse", 1)]),
        )
        .unwrap();
    let bucket = ctx.bin(id).seqdata.get(StaticKind::Stall).unwrap();
    assert_eq!(bucket.insts.len(), 3);
    assert_eq!(bucket.max_width, 5);
}

#[test]
fn dynamic_dispatch_field_widths() {
    let mut ctx = Context::new();
    let a = leaf_bin(&mut ctx, "a", 2);
    let b = leaf_bin(&mut ctx, "b", 5);

    let err = ctx
        .add_bin(
            BinDef::new("bad", vec![Seq::from(Signal::new("sel", 5))])
                .with_children(vec![a, b]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::WidthMismatch(_)), "{err}");

    let id = ctx
        .add_bin(
            BinDef::new("top", vec![Seq::from(Signal::new("sel", 4)).named("go")])
                .with_children(vec![a, b]),
        )
        .unwrap();
    let bin = ctx.bin(id);
    let node = bin.find("go").unwrap();
    match &node.kind {
        NodeKind::Child {
            link: ChildLink::Dynamic {
                child_bits,
                seq_bits,
                ..
            },
            ..
        } => assert_eq!((*child_bits, *seq_bits), (1, 3)),
        k => panic!("unexpected {k:?}"),
    }
    assert_eq!(bin.child_starts.get(&a).unwrap().len(), 1);
    assert_eq!(
        bin.child_starts.get(&b).unwrap()[0],
        "seq_go_start_b_"
    );
}

#[test]
fn child_by_name_and_reference() {
    let mut ctx = Context::new();
    let a = leaf_bin(&mut ctx, "a", 3);
    let r = ctx.seq_ref(a, "a_s2").unwrap();
    let id = ctx
        .add_bin(
            BinDef::new("top", vec![Seq::from("a_s1"), Seq::from(r)]).with_children(vec![a]),
        )
        .unwrap();
    let links: Vec<_> = ctx
        .bin(id)
        .top_level()
        .map(|n| match &n.kind {
            NodeKind::Child {
                link: ChildLink::Fixed { index, .. },
                ..
            } => *index,
            _ => usize::MAX,
        })
        .collect();
    assert_eq!(links, [1, 2]);
    assert_eq!(ctx.bin(id).child_starts.get(&a).unwrap().len(), 2);
    assert_eq!(ctx.postorder(id), vec![a, id]);

    let err = ctx
        .add_bin(BinDef::new("orphan", vec![Seq::from("a_s1")]))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
