//! Integration tests for aborts and diagnostics
//!
//! Tests error context capture, host reporting, and recovery.

use std::cell::RefCell;
use std::rc::Rc;

use qcvm_debug::AbortReport;
use qcvm_foundation::{ErrorKind, ErrorTier, Type, Value};
use qcvm_progs::{ImageBuilder, Opcode, ProgramImage, ofs};
use qcvm_vm::{ExecState, Host, SimState, Vm, VmConfig};

const SELF: u16 = ofs::SELF as u16;
const WORLD: u16 = ofs::WORLD as u16;

#[derive(Default)]
struct Recorder {
    reports: Rc<RefCell<Vec<String>>>,
    printed: Rc<RefCell<Vec<String>>>,
}

impl Host for Recorder {
    fn print(&mut self, text: &str) {
        self.printed.borrow_mut().push(text.to_string());
    }

    fn report(&mut self, report: &AbortReport) {
        self.reports.borrow_mut().push(report.message.clone());
    }
}

fn vm(b: &ImageBuilder) -> Vm {
    let config = VmConfig::default();
    let image = ProgramImage::from_bytes(&b.build(), &config.load_options()).unwrap();
    Vm::new(image, config)
}

/// `outer` calls `inner`, which calls through the null function global
/// `nothing`.
fn null_call() -> ImageBuilder {
    let mut b = ImageBuilder::new();
    b.field("health", Type::Float);
    let nothing = b.global("nothing", Type::Function);
    b.set_file("combat.qc");
    let inner = b.function("inner", &[], |f| {
        f.call(nothing, &[]);
    });
    let inner_g = b.function_global(inner);
    b.set_file("client.qc");
    b.function("outer", &[], |f| {
        f.call(inner_g, &[]);
    });
    b.function("fine", &[], |_| {});
    b
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn abort_carries_statement_and_stack() {
    let mut vm = vm(&null_call());
    let err = vm.execute_named("outer").unwrap_err();

    assert!(matches!(err.kind, ErrorKind::NullFunctionCall));
    assert_eq!(err.tier(), ErrorTier::Execution);
    assert!(err.is_reported());

    let context = err.context.as_ref().expect("abort attaches context");
    let statement = context.statement.as_deref().expect("statement disassembly");
    assert!(statement.contains("CALL0"), "{statement}");
    assert_eq!(context.stack.len(), 2);
    assert!(context.stack[0].contains("combat.qc : inner"));
    assert!(context.stack[1].contains("client.qc : outer"));
}

#[test]
fn null_call_dumps_self() {
    let mut vm = vm(&null_call());
    let id = vm.spawn().unwrap();
    vm.set_field(id, "health", Value::Float(35.0)).unwrap();
    vm.set_self(id).unwrap();

    let err = vm.execute_named("inner").unwrap_err();
    let dump = err
        .context
        .as_ref()
        .and_then(|c| c.edict.as_deref())
        .expect("self dump");
    assert!(dump.starts_with(&format!("EDICT {}", id.0)));
    assert!(dump.contains("health"));
}

#[test]
fn host_receives_one_report_per_abort() {
    let host = Recorder::default();
    let reports = Rc::clone(&host.reports);
    let mut vm = vm(&null_call()).with_host(Box::new(host));

    vm.execute_named("outer").unwrap_err();
    assert_eq!(reports.borrow().as_slice(), ["NULL function".to_string()]);

    vm.execute_named("outer").unwrap_err();
    assert_eq!(reports.borrow().len(), 2);
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn engine_is_usable_after_abort() {
    let mut vm = vm(&null_call());
    vm.execute_named("outer").unwrap_err();

    assert_eq!(vm.state(), ExecState::Aborted);
    assert_eq!(vm.depth(), 0);
    assert_eq!(vm.local_usage(), 0);

    vm.execute_named("fine").unwrap();
    assert_eq!(vm.state(), ExecState::Idle);
}

#[test]
fn missing_function_name_is_not_an_abort() {
    let mut vm = vm(&null_call());
    let err = vm.execute_named("nowhere").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingSymbol(ref name) if name == "nowhere"));
    assert_eq!(vm.state(), ExecState::Idle);
}

// =============================================================================
// Program-Raised Errors
// =============================================================================

#[test]
fn error_builtin_aborts_with_message() {
    let mut b = ImageBuilder::new();
    let error = b.builtin("error", 10);
    let error_g = b.function_global(error);
    let (what, why) = (b.constant_string("door "), b.constant_string("jammed"));
    b.set_file("doors.qc");
    b.function("door_use", &[], |f| {
        f.call(error_g, &[(what, Type::String), (why, Type::String)]);
    });

    let host = Recorder::default();
    let printed = Rc::clone(&host.printed);
    let mut vm = vm(&b).with_host(Box::new(host));
    let err = vm.execute_named("door_use").unwrap_err();

    assert!(matches!(err.kind, ErrorKind::ProgramError(ref m) if m == "door jammed"));
    let printed = printed.borrow();
    assert!(printed[0].contains("SERVER ERROR in door_use"));
    assert!(printed[0].contains("door jammed"));
}

#[test]
fn objerror_frees_self() {
    let mut b = ImageBuilder::new();
    b.field("health", Type::Float);
    let objerror = b.builtin("objerror", 11);
    let objerror_g = b.function_global(objerror);
    let msg = b.constant_string("no target");
    b.function("trigger_init", &[], |f| {
        f.call(objerror_g, &[(msg, Type::String)]);
    });
    let mut vm = vm(&b);
    let id = vm.spawn().unwrap();
    vm.set_self(id).unwrap();

    let err = vm.execute_named("trigger_init").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ProgramError(_)));
    assert!(vm.edicts().get(id).unwrap().is_free());
}

// =============================================================================
// World Protection
// =============================================================================

fn world_writer() -> ImageBuilder {
    let mut b = ImageBuilder::new();
    let health = b.field("health", Type::Float);
    let ptr = b.global("ptr", Type::Pointer);
    let five = b.constant(5.0);
    b.function("hurt_world", &[], |f| {
        f.emit(Opcode::Address, WORLD, health, ptr);
        f.emit(Opcode::StorePF, five, ptr, 0);
    });
    b.function("hurt_self", &[], |f| {
        f.emit(Opcode::Address, SELF, health, ptr);
        f.emit(Opcode::StorePF, five, ptr, 0);
    });
    b.function("aim_at_world", &[], |f| {
        f.emit(Opcode::Address, WORLD, health, ptr);
    });
    b.function("write_aimed", &[], |f| {
        f.emit(Opcode::StorePF, five, ptr, 0);
    });
    b
}

#[test]
fn world_is_writable_while_loading() {
    let mut vm = vm(&world_writer());
    vm.execute_named("hurt_world").unwrap();
    let world = qcvm_foundation::EdictId::WORLD;
    assert_eq!(
        vm.field(world, "health", Type::Float).unwrap(),
        Some(Value::Float(5.0))
    );
}

#[test]
fn world_is_read_only_once_active() {
    let mut vm = vm(&world_writer());
    vm.set_sim_state(SimState::Active);

    let err = vm.execute_named("hurt_world").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::WorldWriteViolation));
    assert!(!vm.is_legacy());

    let id = vm.spawn().unwrap();
    vm.set_self(id).unwrap();
    vm.execute_named("hurt_self").unwrap();
}

#[test]
fn stored_world_pointer_is_rejected_once_active() {
    let mut vm = vm(&world_writer());
    vm.execute_named("aim_at_world").unwrap();
    vm.set_sim_state(SimState::Active);

    let err = vm.execute_named("write_aimed").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::WorldWriteViolation));
    let world = qcvm_foundation::EdictId::WORLD;
    assert_eq!(
        vm.field(world, "health", Type::Float).unwrap(),
        Some(Value::Float(0.0))
    );
}
