//! Integration tests for per-image compatibility switches
//!
//! Tests that images recognized by digest keep their historical
//! behavior, and that replacing a program resets engine state.

use qcvm_foundation::{EdictId, ErrorKind, Type, Value};
use qcvm_progs::{ImageBuilder, LoadOptions, Opcode, ProgramImage, ofs};
use qcvm_vm::{SimState, Vm, VmConfig};

const WORLD: u16 = ofs::WORLD as u16;

fn world_writer() -> Vec<u8> {
    let mut b = ImageBuilder::new();
    let health = b.field("health", Type::Float);
    let ptr = b.global("ptr", Type::Pointer);
    let five = b.constant(5.0);
    b.function("hurt_world", &[], |f| {
        f.emit(Opcode::Address, WORLD, health, ptr);
        f.emit(Opcode::StorePF, five, ptr, 0);
    });
    b.build()
}

fn image(bytes: &[u8]) -> ProgramImage {
    ProgramImage::from_bytes(bytes, &LoadOptions::default()).unwrap()
}

#[test]
fn known_digest_allows_world_writes() {
    let bytes = world_writer();
    let digest = image(&bytes).program.digest();

    let config = VmConfig::default().with_legacy_digest(digest);
    let mut vm = Vm::new(image(&bytes), config);
    assert!(vm.is_legacy());
    vm.set_sim_state(SimState::Active);

    vm.execute_named("hurt_world").unwrap();
    assert_eq!(
        vm.field(EdictId::WORLD, "health", Type::Float).unwrap(),
        Some(Value::Float(5.0))
    );
}

#[test]
fn other_digests_do_not_match() {
    let bytes = world_writer();
    let config = VmConfig::default().with_legacy_digest([0xAB; 16]);
    let mut vm = Vm::new(image(&bytes), config);
    assert!(!vm.is_legacy());
    vm.set_sim_state(SimState::Active);

    let err = vm.execute_named("hurt_world").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::WorldWriteViolation));
}

#[test]
fn replacing_the_program_reevaluates_the_digest() {
    let bytes = world_writer();
    let digest = image(&bytes).program.digest();
    let mut vm = Vm::new(image(&bytes), VmConfig::default().with_legacy_digest(digest));
    let fresh = vm.edicts().live_count();
    let spawned = vm.spawn().unwrap();
    assert!(vm.edicts().get(spawned).is_ok_and(|e| !e.is_free()));

    let mut other = ImageBuilder::new();
    other.field("health", Type::Float);
    other.global_float("version", 2.0);
    vm.replace_program(image(&other.build())).unwrap();

    assert!(!vm.is_legacy());
    assert_eq!(vm.edicts().live_count(), fresh);
    assert_eq!(vm.global("version").unwrap(), Value::Float(2.0));
}
