//! Integration tests for opcode semantics
//!
//! Tests truth rules, raw-bit branches, and determinism of global
//! arithmetic.

use proptest::prelude::*;
use qcvm_foundation::{EdictId, Type, Value, Word};
use qcvm_progs::{ImageBuilder, LoadOptions, Opcode, ProgramImage};
use qcvm_vm::{Vm, VmConfig};

fn vm(b: &ImageBuilder) -> Vm {
    let image = ProgramImage::from_bytes(&b.build(), &LoadOptions::default()).unwrap();
    Vm::new(image, VmConfig::default())
}

fn float(vm: &Vm, name: &str) -> f32 {
    vm.global(name).unwrap().as_float().unwrap()
}

/// `probe()` sets `taken` when `IF cond` branches.
fn if_probe(op: Opcode) -> ImageBuilder {
    let mut b = ImageBuilder::new();
    let cond = b.global("cond", Type::Float);
    let taken = b.global_float("taken", 0.0);
    let one = b.constant(1.0);
    b.function("probe", &[], |f| {
        let br = f.emit(op, cond, 0, 0);
        f.emit(Opcode::Done, 0, 0, 0);
        let target = f.here();
        f.patch_branch(br, target);
        f.emit(Opcode::StoreF, one, taken, 0);
    });
    b
}

fn branch_taken(op: Opcode, cond: Word) -> bool {
    let mut vm = vm(&if_probe(op));
    let at = usize::from(vm.program().find_global("cond").unwrap().ofs);
    vm.globals_mut().set(at, cond).unwrap();
    vm.execute_named("probe").unwrap();
    float(&vm, "taken") == 1.0
}

// =============================================================================
// Branches
// =============================================================================

#[test]
fn if_tests_raw_bits() {
    assert!(!branch_taken(Opcode::If, Word::ZERO));
    assert!(branch_taken(Opcode::If, Word::from_f32(2.0)));
    // Negative zero has its sign bit set.
    assert!(branch_taken(Opcode::If, Word::from_f32(-0.0)));
}

#[test]
fn ifnot_tests_raw_bits() {
    assert!(branch_taken(Opcode::IfNot, Word::ZERO));
    assert!(!branch_taken(Opcode::IfNot, Word::from_f32(0.5)));
    assert!(!branch_taken(Opcode::IfNot, Word::from_f32(-0.0)));
}

#[test]
fn world_reference_is_false() {
    assert!(branch_taken(Opcode::IfNot, EdictId::WORLD.to_word()));
    assert!(!branch_taken(Opcode::IfNot, EdictId(4).to_word()));
}

#[test]
fn not_float_uses_float_equality() {
    let mut b = ImageBuilder::new();
    let neg_zero = b.global_float("neg_zero", -0.0);
    let out = b.global("out", Type::Float);
    b.function("calc", &[], |f| {
        f.emit(Opcode::NotF, neg_zero, 0, out);
    });
    let mut vm = vm(&b);
    vm.execute_named("calc").unwrap();
    assert_eq!(float(&vm, "out"), 1.0);
}

// =============================================================================
// Comparisons
// =============================================================================

#[test]
fn entity_and_function_equality_compare_references() {
    let mut b = ImageBuilder::new();
    let e1 = b.global("e1", Type::Entity);
    let e2 = b.global("e2", Type::Entity);
    let same = b.global("same", Type::Float);
    let differ = b.global("differ", Type::Float);
    b.function("calc", &[], |f| {
        f.emit(Opcode::EqE, e1, e1, same);
        f.emit(Opcode::NeE, e1, e2, differ);
    });
    let mut vm = vm(&b);
    let a = vm.spawn().unwrap();
    let c = vm.spawn().unwrap();
    vm.set_global("e1", Value::Entity(a)).unwrap();
    vm.set_global("e2", Value::Entity(c)).unwrap();
    vm.execute_named("calc").unwrap();
    assert_eq!(float(&vm, "same"), 1.0);
    assert_eq!(float(&vm, "differ"), 1.0);
}

#[test]
fn string_inequality_keeps_magnitude() {
    let mut b = ImageBuilder::new();
    let zed = b.constant_string("zed");
    let abe = b.constant_string("abe");
    let out = b.global("out", Type::Float);
    let eq = b.global("eq", Type::Float);
    b.function("calc", &[], |f| {
        f.emit(Opcode::NeS, zed, abe, out);
        f.emit(Opcode::EqS, zed, abe, eq);
    });
    let mut vm = vm(&b);
    vm.execute_named("calc").unwrap();
    assert_eq!(float(&vm, "out"), f32::from(b'z' - b'a'));
    assert_eq!(float(&vm, "eq"), 0.0);
}

#[test]
fn vector_equality_is_componentwise() {
    let mut b = ImageBuilder::new();
    let u = b.global_vector("u", [1.0, 2.0, 3.0]);
    let v = b.global_vector("v", [1.0, 2.0, 4.0]);
    let eq = b.global("eq", Type::Float);
    let ne = b.global("ne", Type::Float);
    b.function("calc", &[], |f| {
        f.emit(Opcode::EqV, u, v, eq);
        f.emit(Opcode::NeV, u, v, ne);
    });
    let mut vm = vm(&b);
    vm.execute_named("calc").unwrap();
    assert_eq!(float(&vm, "eq"), 0.0);
    assert_eq!(float(&vm, "ne"), 1.0);
}

// =============================================================================
// Field Access
// =============================================================================

#[test]
fn vector_fields_load_and_store_three_words() {
    let mut b = ImageBuilder::new();
    let origin = b.field("origin", Type::Vector);
    let target = b.global("target", Type::Entity);
    let ptr = b.global("ptr", Type::Pointer);
    let spot = b.constant_vector([64.0, -32.0, 8.0]);
    let seen = b.global("seen", Type::Vector);
    b.function("place", &[], |f| {
        f.emit(Opcode::Address, target, origin, ptr);
        f.emit(Opcode::StorePV, spot, ptr, 0);
        f.emit(Opcode::LoadV, target, origin, seen);
    });
    let mut vm = vm(&b);
    let id = vm.spawn().unwrap();
    vm.set_global("target", Value::Entity(id)).unwrap();
    vm.execute_named("place").unwrap();

    assert_eq!(vm.global("seen").unwrap(), Value::Vector([64.0, -32.0, 8.0]));
    assert_eq!(
        vm.field(id, "origin", Type::Vector).unwrap(),
        Some(Value::Vector([64.0, -32.0, 8.0]))
    );
}

// =============================================================================
// Determinism
// =============================================================================

fn polynomial() -> ImageBuilder {
    let mut b = ImageBuilder::new();
    let x = b.global("x", Type::Float);
    let y = b.global("y", Type::Float);
    let out = b.global("out", Type::Float);
    let noise = b.global_float("noise", 0.0);
    let three = b.constant(3.0);
    b.function("poly", &[], |f| {
        let t = f.local(Type::Float);
        f.emit(Opcode::MulF, x, x, t);
        f.emit(Opcode::MulF, t, three, t);
        f.emit(Opcode::SubF, t, y, t);
        f.emit(Opcode::DivF, t, three, out);
    });
    b.function("scribble", &[], |f| {
        let t = f.local(Type::Float);
        f.emit(Opcode::AddF, noise, three, noise);
        f.emit(Opcode::MulF, noise, noise, t);
    });
    b
}

proptest! {
    #[test]
    fn global_arithmetic_is_repeatable(x in -1000.0f32..1000.0, y in -1000.0f32..1000.0) {
        let mut vm = vm(&polynomial());
        vm.set_global("x", Value::Float(x)).unwrap();
        vm.set_global("y", Value::Float(y)).unwrap();
        vm.execute_named("poly").unwrap();
        let first = float(&vm, "out");

        vm.execute_named("scribble").unwrap();
        vm.execute_named("scribble").unwrap();
        vm.execute_named("poly").unwrap();
        prop_assert_eq!(float(&vm, "out").to_bits(), first.to_bits());
        prop_assert_eq!(first.to_bits(), ((x * x * 3.0 - y) / 3.0).to_bits());
    }
}
