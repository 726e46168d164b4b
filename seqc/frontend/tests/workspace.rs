use seqc_frontend::Workspace;
use seqc_ir::{Direction, Error, Id};
use std::io::Write;

const PROGRAM: &str = r#"{
  "bins": [
    {
      "name": "counter",
      "regs": [ { "name": "n", "width": 4 } ],
      "seqs": [
        { "kind": "count_up", "name": "tick", "reg": "n", "stop": 9, "skip": 2 },
        { "kind": "reset", "name": "clear" }
      ]
    },
    {
      "name": "ctl",
      "regs": [
        { "name": "led", "width": 1 },
        { "name": "acc", "width": 8, "signed": true, "init": -1 }
      ],
      "children": [ "counter" ],
      "register_done": false,
      "reset_n": "rst_n",
      "seqs": [
        {
          "kind": "serial",
          "name": "go",
          "seqs": [ "tick", { "kind": "set", "set": { "led": 1 } }, "clear" ],
          "done": { "name": "go_done", "width": 1 }
        },
        {
          "kind": "repeat",
          "name": "spin",
          "count": 3,
          "seq": { "kind": "toggle", "reg": "led" },
          "counter": { "name": "spin_pass", "width": 2 }
        },
        {
          "kind": "multiply",
          "name": "scale",
          "a": { "signal": { "name": "x", "width": 4, "signed": true } },
          "b": 3,
          "out": "acc",
          "justify": "right",
          "clamp": true
        },
        {
          "kind": "child",
          "name": "tick_async",
          "target": "tick",
          "detach": true
        }
      ]
    }
  ]
}"#;

#[test]
fn description_links_into_a_context() {
    let ws = Workspace::from_json(PROGRAM).unwrap();
    let top = ws.ctx.bin(ws.top);
    assert_eq!(top.name, "ctl");
    assert!(!top.register_done);
    assert_eq!(top.reset_n, "rst_n");
    let names: Vec<_> = top.top_level().map(|n| n.name.to_string()).collect();
    assert_eq!(names, vec!["go", "spin", "scale", "tick_async"]);
    assert_eq!(top.children.len(), 1);

    let acc = &top.regs[&Id::from("acc")];
    assert!(acc.signed);
    assert_eq!(acc.init, -1);

    let port = |name: &str| top.ports.get(&Id::from(name)).map(|p| p.dir);
    assert_eq!(port("x"), Some(Direction::Input));
    assert_eq!(port("led"), Some(Direction::Output));
    assert_eq!(port("go_done"), Some(Direction::Output));
    assert_eq!(port("spin_pass"), Some(Direction::Output));
}

#[test]
fn top_defaults_to_the_last_bin() {
    let ws = Workspace::from_json(
        r#"{ "bins": [
            { "name": "a", "seqs": [ { "kind": "nop" } ] },
            { "name": "b", "seqs": [ { "kind": "nop" } ] }
        ] }"#,
    )
    .unwrap();
    assert_eq!(ws.ctx.bin(ws.top).name, "b");

    let ws = Workspace::from_json(
        r#"{ "top": "a", "bins": [
            { "name": "a", "seqs": [ { "kind": "nop" } ] },
            { "name": "b", "seqs": [ { "kind": "nop" } ] }
        ] }"#,
    )
    .unwrap();
    assert_eq!(ws.ctx.bin(ws.top).name, "a");
}

#[test]
fn children_must_come_first() {
    let err = Workspace::from_json(
        r#"{ "bins": [
            { "name": "p", "children": [ "c" ], "seqs": [ "s" ] },
            { "name": "c", "seqs": [ { "kind": "nop", "name": "s" } ] }
        ] }"#,
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[test]
fn unknown_top_and_empty_programs() {
    let err = Workspace::from_json(
        r#"{ "top": "zz", "bins": [ { "name": "a", "seqs": [ { "kind": "nop" } ] } ] }"#,
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::NotFound(_)), "{err}");

    let err = Workspace::from_json(r#"{ "bins": [] }"#).err().unwrap();
    assert!(matches!(err, Error::InvalidConfiguration(_)), "{err}");
}

#[test]
fn linking_errors_pass_through() {
    let err = Workspace::from_json(
        r#"{ "bins": [
            { "name": "a", "seqs": [ { "kind": "nop" } ] },
            { "name": "a", "seqs": [ { "kind": "nop" } ] }
        ] }"#,
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::NamingConflict(_)), "{err}");

    let err = Workspace::from_json(
        r#"{ "bins": [ { "name": "a", "seqs": [ { "kind": "toggle", "reg": "nope" } ] } ] }"#,
    )
    .err()
    .unwrap();
    assert!(!matches!(err, Error::Parse(_)), "{err}");
}

#[test]
fn reads_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(PROGRAM.as_bytes()).unwrap();
    let ws = Workspace::from_file(file.path()).unwrap();
    assert_eq!(ws.ctx.bin(ws.top).name, "ctl");

    let err = Workspace::from_file(&file.path().with_extension("missing"))
        .err()
        .unwrap();
    assert!(err.to_string().starts_with("cannot read"));
}
