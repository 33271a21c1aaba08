//! Edict builtins: spawning, removal, and searches.

use qcvm_debug::dump_edict;
use qcvm_foundation::{EdictId, Error, Result, StringRef};

use super::BuiltinRegistry;
use crate::vm::Vm;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry
        .register("spawn", 14, native_spawn)
        .register("remove", 15, native_remove)
        .register("find", 18, native_find)
        .register("eprint", 31, native_eprint)
        .register("coredump", 28, native_coredump)
        .register("nextent", 47, native_nextent);
}

fn native_spawn(vm: &mut Vm) -> Result<()> {
    let id = vm.spawn()?;
    vm.return_edict(id)
}

fn native_remove(vm: &mut Vm) -> Result<()> {
    let id = vm.arg_edict(0)?;
    vm.remove(id)
}

/// find(entity start, .string field, string match): next live edict after
/// `start` whose field equals `match`, or the world.
fn native_find(vm: &mut Vm) -> Result<()> {
    let start = vm.arg_edict(0)?;
    let field = vm.arg_word(1)?.bits() as usize;
    let wanted = vm.arg_string_ref(2)?;
    if wanted.is_null() {
        return Err(Error::program("find: bad search string"));
    }
    let wanted = vm.strings().get(wanted)?.to_vec();

    let found = (start.index() + 1..vm.edicts().num_edicts())
        .map(|i| vm.edicts().at(i))
        .filter(|e| !e.is_free())
        .find_map(|e| {
            let s = StringRef::from_word(e.word(field).ok()?);
            if s.is_null() {
                return None;
            }
            (vm.strings().get(s).ok()? == wanted.as_slice()).then(|| e.id())
        })
        .unwrap_or(EdictId::WORLD);
    vm.return_edict(found)
}

/// nextent(entity): next live edict after the argument, or the world.
fn native_nextent(vm: &mut Vm) -> Result<()> {
    let start = vm.arg_edict(0)?;
    let next = (start.index() + 1..vm.edicts().num_edicts())
        .map(|i| vm.edicts().at(i))
        .find(|e| !e.is_free())
        .map_or(EdictId::WORLD, |e| e.id());
    vm.return_edict(next)
}

fn native_eprint(vm: &mut Vm) -> Result<()> {
    let id = vm.arg_edict(0)?;
    let dump = dump_edict(&vm.view(), &vm.edicts().get(id)?);
    vm.host_mut().print(&dump);
    Ok(())
}

/// coredump(): prints every live edict.
fn native_coredump(vm: &mut Vm) -> Result<()> {
    let view = vm.view();
    let dumps: Vec<String> = vm
        .edicts()
        .iter_live()
        .map(|e| dump_edict(&view, &e))
        .collect();
    for dump in dumps {
        vm.host_mut().print(&dump);
    }
    Ok(())
}
