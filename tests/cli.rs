use seqc::{cmdline::Opts, driver};
use seqc_backend::BackendOpt;
use seqc_frontend::Workspace;
use seqc_sim::Simulator;
use seqc_utils::OutputFile;
use std::path::{Path, PathBuf};

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

fn opts(file: PathBuf) -> Opts {
    Opts {
        file: Some(file),
        output: OutputFile::Null,
        dir: None,
        backend: BackendOpt::Verilog,
        top: None,
        no_recurse: false,
        log_level: log::LevelFilter::Off,
    }
}

#[test]
fn blink_toggles_four_times() {
    let ws = Workspace::from_file(&demo("blink.json")).unwrap();
    let design = seqc_synth::synthesize(&ws.ctx, ws.top, true);
    let mut sim = Simulator::new(&design).unwrap();
    sim.reset().unwrap();

    sim.poke("seq", 0).unwrap();
    sim.poke("start", 1).unwrap();
    sim.step();
    sim.poke("start", 0).unwrap();
    let mut led = sim.peek("led").unwrap();
    let mut flips = u32::from(led == 1);
    let mut edges = 1;
    while sim.peek("done").unwrap() == 0 {
        assert!(edges < 200, "`done` never rose");
        sim.step();
        edges += 1;
        let now = sim.peek("led").unwrap();
        flips += u32::from(now != led);
        led = now;
    }
    assert_eq!(flips, 4);
    assert_eq!(led, 0);
}

#[test]
fn single_stream_holds_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("blink.out");
    let mut o = opts(demo("blink.json"));
    o.output = OutputFile::file(out.clone());
    o.backend = BackendOpt::All;
    driver::run(o).unwrap();

    let text = std::fs::read_to_string(out).unwrap();
    assert!(text.contains("module delay ("));
    assert!(text.contains("module blink ("));
    assert!(text.contains("0 flash\n1 off\n"));
    assert!(text.contains("blink u_blink_ ("));
}

#[test]
fn directory_mode_and_top_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = opts(demo("blink.json"));
    o.dir = Some(dir.path().to_path_buf());
    o.top = Some("delay".to_string());
    o.no_recurse = true;
    o.backend = BackendOpt::All;
    driver::run(o).unwrap();

    for name in ["delay.v", "delay.map", "delay_wires.v", "delay_instance.v"] {
        assert!(dir.path().join(name).exists(), "{name}");
    }
    assert!(!dir.path().join("blink.v").exists());
}

#[test]
fn unknown_top_fails_before_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = opts(demo("blink.json"));
    o.dir = Some(dir.path().join("out"));
    o.top = Some("nope".to_string());
    let err = driver::run(o).unwrap_err();
    assert!(err.to_string().starts_with("not found:"), "{err}");
    assert!(!dir.path().join("out").exists());
}
