//! Console, error, and introspection builtins.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::unnecessary_wraps)]

use qcvm_debug::dump_edict;
use qcvm_foundation::{Error, Result};
use tracing::warn;

use super::BuiltinRegistry;
use crate::vm::Vm;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry
        .register("error", 10, native_error)
        .register("objerror", 11, native_objerror)
        .register("dprint", 25, native_dprint)
        .register("traceon", 29, native_traceon)
        .register("traceoff", 30, native_traceoff)
        .register("cvar", 45, native_cvar)
        .register("checkextension", 99, native_checkextension)
        .register("builtin_find", 100, native_builtin_find);
}

fn current_name(vm: &Vm) -> String {
    vm.program()
        .function(vm.current_function())
        .map_or_else(|| "<NO FUNCTION>".to_string(), |f| f.name.clone())
}

/// error(string, ...): aborts the program with the joined message.
fn native_error(vm: &mut Vm) -> Result<()> {
    let message = String::from_utf8_lossy(&vm.concat_args(0)?).into_owned();
    let name = current_name(vm);
    vm.host_mut()
        .print(&format!("======SERVER ERROR in {name}:\n{message}\n"));
    Err(Error::program(message))
}

/// objerror(string, ...): reports against `self`, frees it, and aborts.
fn native_objerror(vm: &mut Vm) -> Result<()> {
    let message = String::from_utf8_lossy(&vm.concat_args(0)?).into_owned();
    let name = current_name(vm);
    let id = vm.self_edict();
    let dump = dump_edict(&vm.view(), &vm.edicts().get(id)?);
    vm.host_mut()
        .print(&format!("======OBJECT ERROR in {name}:\n{message}\n{dump}"));
    if !id.is_world() {
        vm.remove(id)?;
    }
    Err(Error::program(message))
}

fn native_dprint(vm: &mut Vm) -> Result<()> {
    let text = String::from_utf8_lossy(&vm.concat_args(0)?).into_owned();
    vm.host_mut().dprint(&text);
    Ok(())
}

fn native_traceon(vm: &mut Vm) -> Result<()> {
    vm.set_trace(true);
    Ok(())
}

fn native_traceoff(vm: &mut Vm) -> Result<()> {
    vm.set_trace(false);
    Ok(())
}

/// cvar(string name): the host's value, zero when it has none.
fn native_cvar(vm: &mut Vm) -> Result<()> {
    let name = vm.arg_string(0)?;
    let value = vm.host_mut().cvar(&name).unwrap_or_else(|| {
        warn!(%name, "unknown cvar");
        0.0
    });
    vm.return_float(value)
}

/// checkextension(string name): 1 if the engine advertises `name`.
fn native_checkextension(vm: &mut Vm) -> Result<()> {
    let name = vm.arg_string(0)?;
    let supported = vm.registry().supports_extension(&name);
    vm.return_float(if supported { 1.0 } else { 0.0 })
}

/// builtin_find(string name): the number `name` is reachable at, or 0.
fn native_builtin_find(vm: &mut Vm) -> Result<()> {
    let name = vm.arg_string(0)?;
    let number = vm.builtins().number_of(&name).unwrap_or(0);
    vm.return_float(number as f32)
}
