//! Edict dumps.

use std::fmt::Write;

use qcvm_foundation::Type;
use qcvm_storage::Edict;

use crate::view::ProgramView;

/// Renders every non-zero field of an edict, one per line.
///
/// Vector component aliases (`origin_x` and friends) are skipped since the
/// vector itself is printed.
#[must_use]
pub fn dump_edict(view: &ProgramView<'_>, edict: &Edict<'_>) -> String {
    let mut out = format!("EDICT {}:\n", edict.id().0);
    if edict.is_free() {
        out.push_str("FREE\n");
        return out;
    }
    for def in view.program.field_defs() {
        if def.name.is_empty() || def.ty == Type::Void || is_component(&def.name) {
            continue;
        }
        let Ok(words) = edict.words(usize::from(def.ofs), def.ty.size()) else {
            continue;
        };
        if words.iter().all(|w| w.is_zero()) {
            continue;
        }
        let _ = writeln!(out, "{:>15} {}", def.name, view.value_string(def.ty, words));
    }
    out
}

fn is_component(name: &str) -> bool {
    name.len() > 2 && (name.ends_with("_x") || name.ends_with("_y") || name.ends_with("_z"))
}
