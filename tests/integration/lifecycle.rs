//! Integration tests for a hosted program's life
//!
//! Tests loading through a content source, spawning, scheduled thinks,
//! recovery after an abort, and snapshot save/restore.

use qcvm_foundation::{EdictId, ErrorKind, Type, Value};
use qcvm_progs::{ImageBuilder, MemorySource, Opcode, ofs};
use qcvm_runtime::Session;
use qcvm_vm::{ExecState, VmConfig};

const RETURN: u16 = ofs::RETURN as u16;
const SELF: u16 = ofs::SELF as u16;

/// `worldspawn` spawns one edict that re-schedules `army_run` every think,
/// counting its runs in `ticks`. `broken` calls a null function.
fn army() -> Vec<u8> {
    let mut b = ImageBuilder::new();
    b.set_file("world.qc");
    b.field("frame", Type::Float);
    b.field("nextthink", Type::Float);
    b.field("think", Type::Function);
    b.field("health", Type::Float);
    let ticks = b.global_float("ticks", 0.0);
    let nothing = b.global("nothing", Type::Function);
    let spawn = b.builtin("spawn", 14);
    let spawn_g = b.function_global(spawn);
    let one = b.constant(1.0);
    let run_frame = b.constant(3.0);
    let stand_frame = b.constant(1.0);

    let army_run = b.declare("army_run");
    let army_run_g = b.function_global(army_run);
    b.define(army_run, &[], |f| {
        f.emit(Opcode::AddF, ticks, one, ticks);
        f.emit(Opcode::State, run_frame, army_run_g, 0);
    });
    b.function("worldspawn", &[], |f| {
        f.call(spawn_g, &[]);
        f.emit(Opcode::StoreEnt, RETURN, SELF, 0);
        f.emit(Opcode::State, stand_frame, army_run_g, 0);
    });
    b.function("broken", &[], |f| {
        f.call(nothing, &[]);
    });
    b.build()
}

fn source() -> MemorySource {
    MemorySource::new()
        .with_file("progs.dat", b"not a program".to_vec())
        .with_file("qwprogs.dat", army())
}

fn session() -> Session {
    Session::from_source(&source(), "progs.dat", Some("qwprogs.dat"), VmConfig::default())
        .unwrap()
}

fn ticks(s: &Session) -> f32 {
    s.vm().global("ticks").unwrap().as_float().unwrap()
}

fn newest_edict(s: &Session) -> EdictId {
    s.vm()
        .edicts()
        .iter_live()
        .map(|e| e.id())
        .last()
        .filter(|id| !id.is_world())
        .expect("worldspawn spawned an edict")
}

#[test]
fn override_name_is_preferred() {
    let s = session();
    assert!(s.vm().find_function("army_run").is_some());

    let err = Session::from_source(&source(), "progs.dat", None, VmConfig::default()).unwrap_err();
    assert_eq!(err.tier(), qcvm_foundation::ErrorTier::Load);
}

#[test]
fn thinks_follow_the_clock() {
    let mut s = session();
    s.run("worldspawn").unwrap();
    s.activate();
    let id = newest_edict(&s);
    assert_eq!(
        s.vm_mut().field(id, "frame", Type::Float).unwrap(),
        Some(Value::Float(1.0))
    );

    assert_eq!(s.run_frame(0.05).unwrap(), 0);
    assert_eq!(ticks(&s), 0.0);

    for (n, time) in [1.0f32, 2.0, 3.0].into_iter().enumerate() {
        assert_eq!(s.run_frame(time).unwrap(), 1);
        assert_eq!(ticks(&s), (n + 1) as f32);
    }
    assert_eq!(
        s.vm_mut().field(id, "frame", Type::Float).unwrap(),
        Some(Value::Float(3.0))
    );
}

#[test]
fn frames_continue_after_an_abort() {
    let mut s = session();
    s.run("worldspawn").unwrap();
    s.activate();
    s.run_frame(1.0).unwrap();

    let err = s.run("broken").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NullFunctionCall));
    assert_eq!(s.vm().state(), ExecState::Aborted);

    assert_eq!(s.run_frame(2.0).unwrap(), 1);
    assert_eq!(ticks(&s), 2.0);
    assert_eq!(s.vm().depth(), 0);
}

#[test]
fn saved_state_resumes_identically() {
    let mut s = session();
    s.run("worldspawn").unwrap();
    s.activate();
    s.run_frame(1.0).unwrap();
    s.run_frame(2.0).unwrap();

    let path = std::env::temp_dir().join(format!("qcvm-lifecycle-{}.sav", std::process::id()));
    s.save(&path).unwrap();
    s.run_frame(3.0).unwrap();

    let mut resumed = session();
    resumed.load_snapshot(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(ticks(&resumed), 2.0);
    assert_eq!(resumed.vm().time(), 2.0);
    resumed.activate();
    assert_eq!(resumed.run_frame(3.0).unwrap(), 1);

    assert_eq!(ticks(&resumed), ticks(&s));
    assert_eq!(resumed.edict_dump(), s.edict_dump());
}

#[test]
fn listings_describe_the_image() {
    let s = session();
    let functions = s.function_listing();
    assert!(functions.iter().any(|l| l.contains("spawn") && l.contains("-> spawn")));
    assert!(functions.iter().any(|l| l.contains("army_run") && l.contains("world.qc")));

    assert!(s.field_listing().iter().any(|l| l.ends_with(".nextthink")));
    assert!(s.global_listing().iter().any(|l| l.contains("ticks")));

    let disasm = s.disassemble("army_run").unwrap();
    assert!(disasm.iter().any(|l| l.contains("STATE")));
    assert!(disasm.last().unwrap().contains("DONE"));
}
