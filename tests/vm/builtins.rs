//! Integration tests for builtins
//!
//! Tests the builtin call ABI, numbering modes, and host services.

use std::cell::RefCell;
use std::rc::Rc;

use qcvm_foundation::{EdictId, Type, Value};
use qcvm_progs::{ImageBuilder, Opcode, ProgramImage, ofs};
use qcvm_vm::{BuiltinNumbering, BuiltinRegistry, Host, Vm, VmConfig};

const RETURN: u16 = ofs::RETURN as u16;

fn vm_with(b: &ImageBuilder, config: VmConfig) -> Vm {
    let image = ProgramImage::from_bytes(&b.build(), &config.load_options()).unwrap();
    Vm::new(image, config)
}

fn vm(b: &ImageBuilder) -> Vm {
    vm_with(b, VmConfig::default())
}

fn float(vm: &Vm, name: &str) -> f32 {
    vm.global(name).unwrap().as_float().unwrap()
}

// =============================================================================
// Numbering
// =============================================================================

/// Declares `sqrt` and `vlen` under each other's default numbers.
fn swapped_math() -> ImageBuilder {
    let mut b = ImageBuilder::new();
    let sqrt = b.builtin("sqrt", 12);
    let vlen = b.builtin("vlen", 62);
    let (sqrt_g, vlen_g) = (b.function_global(sqrt), b.function_global(vlen));
    let sixteen = b.constant(16.0);
    let v = b.constant_vector([3.0, 4.0, 0.0]);
    let root = b.global("root", Type::Float);
    let len = b.global("len", Type::Float);
    b.function("measure", &[], |f| {
        f.call(sqrt_g, &[(sixteen, Type::Float)]);
        f.emit(Opcode::StoreF, RETURN, root, 0);
        f.call(vlen_g, &[(v, Type::Vector)]);
        f.emit(Opcode::StoreF, RETURN, len, 0);
    });
    b
}

#[test]
fn remap_dispatches_by_declared_name() {
    let mut vm = vm(&swapped_math());
    assert_eq!(vm.builtins().name_of(12), Some("sqrt"));
    assert_eq!(vm.builtins().name_of(62), Some("vlen"));

    vm.execute_named("measure").unwrap();
    assert_eq!(float(&vm, "root"), 4.0);
    assert_eq!(float(&vm, "len"), 5.0);
}

#[test]
fn default_numbering_ignores_declarations() {
    let config = VmConfig::default().with_builtin_numbering(BuiltinNumbering::Default);
    let mut vm = vm_with(&swapped_math(), config);
    assert_eq!(vm.builtins().name_of(12), Some("vlen"));

    vm.execute_named("measure").unwrap();
    // `sqrt(16)` lands on vlen, which reads '16 0 0'.
    assert_eq!(float(&vm, "root"), 16.0);
}

#[test]
fn unimplemented_builtin_returns_zero() {
    let mut b = ImageBuilder::new();
    let missing = b.builtin("frobnicate", 700);
    let missing_g = b.function_global(missing);
    let out = b.global_float("out", 3.0);
    b.function("start", &[], |f| {
        f.call(missing_g, &[]);
        f.emit(Opcode::StoreF, RETURN, out, 0);
    });
    let mut vm = vm(&b);
    vm.execute_named("start").unwrap();
    assert_eq!(float(&vm, "out"), 0.0);
}

// =============================================================================
// Custom Builtins
// =============================================================================

#[test]
fn custom_builtin_reads_arguments_and_returns() {
    let mut b = ImageBuilder::new();
    let sum3 = b.builtin("sum3", 300);
    let sum3_g = b.function_global(sum3);
    let (x, y, z) = (b.constant(1.0), b.constant(20.0), b.constant(300.0));
    let out = b.global("out", Type::Float);
    b.function("start", &[], |f| {
        f.call(sum3_g, &[(x, Type::Float), (y, Type::Float), (z, Type::Float)]);
        f.emit(Opcode::StoreF, RETURN, out, 0);
    });

    let mut registry = BuiltinRegistry::with_core();
    registry.register("sum3", 300, |vm: &mut Vm| {
        assert_eq!(vm.argc(), 3);
        let total = vm.arg_float(0)? + vm.arg_float(1)? + vm.arg_float(2)?;
        vm.return_float(total)
    });
    let config = VmConfig::default();
    let image = ProgramImage::from_bytes(&b.build(), &config.load_options()).unwrap();
    let mut vm = Vm::with_registry(image, config, registry);

    vm.execute_named("start").unwrap();
    assert_eq!(float(&vm, "out"), 321.0);
}

#[test]
fn builtins_spawn_edicts_for_the_program() {
    let mut b = ImageBuilder::new();
    let health = b.field("health", Type::Float);
    let spawn = b.builtin("spawn", 14);
    let spawn_g = b.function_global(spawn);
    let made = b.global("made", Type::Entity);
    let ptr = b.global("ptr", Type::Pointer);
    let hundred = b.constant(100.0);
    b.function("start", &[], |f| {
        f.call(spawn_g, &[]);
        f.emit(Opcode::StoreEnt, RETURN, made, 0);
        f.emit(Opcode::Address, made, health, ptr);
        f.emit(Opcode::StorePF, hundred, ptr, 0);
    });
    let mut vm = vm(&b);
    let before = vm.edicts().live_count();
    vm.execute_named("start").unwrap();

    let Value::Entity(id) = vm.global("made").unwrap() else {
        panic!("made is not an entity");
    };
    assert_ne!(id, EdictId::WORLD);
    assert_eq!(vm.edicts().live_count(), before + 1);
    assert_eq!(
        vm.field(id, "health", Type::Float).unwrap(),
        Some(Value::Float(100.0))
    );
}

#[test]
fn ftos_produces_a_temp_string() {
    let mut b = ImageBuilder::new();
    let ftos = b.builtin("ftos", 26);
    let ftos_g = b.function_global(ftos);
    let n = b.constant(42.0);
    let text = b.global("text", Type::String);
    b.function("start", &[], |f| {
        f.call(ftos_g, &[(n, Type::Float)]);
        f.emit(Opcode::StoreS, RETURN, text, 0);
    });
    let mut vm = vm(&b);
    vm.execute_named("start").unwrap();

    let Value::String(s) = vm.global("text").unwrap() else {
        panic!("text is not a string");
    };
    assert_eq!(vm.strings().get(s).unwrap(), b"42");
}

// =============================================================================
// Host Services
// =============================================================================

struct Console {
    skill: f32,
    dprinted: Rc<RefCell<Vec<String>>>,
}

impl Host for Console {
    fn dprint(&mut self, text: &str) {
        self.dprinted.borrow_mut().push(text.to_string());
    }

    fn cvar(&mut self, name: &str) -> Option<f32> {
        (name == "skill").then_some(self.skill)
    }
}

#[test]
fn host_answers_cvar_and_receives_output() {
    let mut b = ImageBuilder::new();
    let cvar = b.builtin("cvar", 45);
    let dprint = b.builtin("dprint", 25);
    let (cvar_g, dprint_g) = (b.function_global(cvar), b.function_global(dprint));
    let skill = b.constant_string("skill");
    let deathmatch = b.constant_string("deathmatch");
    let hello = b.constant_string("hello\n");
    let a = b.global("a", Type::Float);
    let c = b.global_float("c", 9.0);
    b.function("start", &[], |f| {
        f.call(cvar_g, &[(skill, Type::String)]);
        f.emit(Opcode::StoreF, RETURN, a, 0);
        f.call(cvar_g, &[(deathmatch, Type::String)]);
        f.emit(Opcode::StoreF, RETURN, c, 0);
        f.call(dprint_g, &[(hello, Type::String)]);
    });

    let dprinted = Rc::new(RefCell::new(Vec::new()));
    let mut vm = vm(&b).with_host(Box::new(Console {
        skill: 3.0,
        dprinted: Rc::clone(&dprinted),
    }));
    vm.execute_named("start").unwrap();

    assert_eq!(float(&vm, "a"), 3.0);
    assert_eq!(float(&vm, "c"), 0.0);
    assert_eq!(dprinted.borrow().as_slice(), ["hello\n".to_string()]);
}

#[test]
fn extension_numbers_are_published_and_answer() {
    let mut b = ImageBuilder::new();
    b.global_float("EXT_CHECKEXTENSION", 0.0);
    b.global_float("EXT_BUILTIN_FIND", 0.0);
    let check = b.builtin("checkextension", 99);
    let check_g = b.function_global(check);
    let known = b.constant_string("dp_qc_sincossqrtpow");
    let unknown = b.constant_string("DP_QC_NOPE");
    let yes = b.global("yes", Type::Float);
    let no = b.global("no", Type::Float);
    b.function("probe", &[], |f| {
        f.call(check_g, &[(known, Type::String)]);
        f.emit(Opcode::StoreF, RETURN, yes, 0);
        f.call(check_g, &[(unknown, Type::String)]);
        f.emit(Opcode::StoreF, RETURN, no, 0);
    });
    let mut vm = vm(&b);
    assert_eq!(float(&vm, "EXT_CHECKEXTENSION"), 99.0);
    assert_eq!(float(&vm, "EXT_BUILTIN_FIND"), 100.0);

    vm.execute_named("probe").unwrap();
    assert_eq!(float(&vm, "yes"), 1.0);
    assert_eq!(float(&vm, "no"), 0.0);
}

/// Runs `substring(text, start, length)` and returns the result.
fn substring(text: &str, start: f32, length: f32) -> Vec<u8> {
    let mut b = ImageBuilder::new();
    let substring = b.builtin("substring", 116);
    let substring_g = b.function_global(substring);
    let s = b.constant_string(text);
    let (from, len) = (b.constant(start), b.constant(length));
    let out = b.global("out", Type::String);
    b.function("slice", &[], |f| {
        f.call(
            substring_g,
            &[(s, Type::String), (from, Type::Float), (len, Type::Float)],
        );
        f.emit(Opcode::StoreS, RETURN, out, 0);
    });
    let mut vm = vm(&b);
    vm.execute_named("slice").unwrap();
    let Value::String(r) = vm.global("out").unwrap() else {
        panic!("out is not a string");
    };
    vm.strings().get(r).unwrap().to_vec()
}

#[test]
fn substring_clamps_to_the_string() {
    assert_eq!(substring("abcdef", 1.0, 3.0), b"bcd");
    assert_eq!(substring("abc", 1.0, 1.0e30), b"bc");
    assert_eq!(substring("abc", 1.0, f32::INFINITY), b"bc");
    assert_eq!(substring("abc", 1.0e30, 2.0), b"");
    assert_eq!(substring("abc", 1.0, -1.0), b"bc");
}
