//! Statement disassembly.

use std::fmt::Write;

use qcvm_foundation::FuncRef;
use qcvm_progs::Opcode;

use crate::view::ProgramView;

/// Disassembles statement `index`, resolving operand names.
///
/// Never fails: an out-of-range index renders as a placeholder.
#[must_use]
pub fn disassemble(view: &ProgramView<'_>, index: usize) -> String {
    let Some(st) = view.program.statements().get(index) else {
        return format!("{index:5} <statement out of range>");
    };
    let mut out = format!("{index:5} {:<10} ", st.op.name());
    // Operands are 16-bit global offsets stored as signed values.
    #[allow(clippy::cast_sign_loss)]
    let (a, b, c) = (st.a as u16, st.b as u16, st.c as u16);
    match st.op {
        Opcode::If | Opcode::IfNot => {
            let _ = write!(out, "{}branch {}", view.global_string(a), st.b);
        }
        Opcode::Goto => {
            let _ = write!(out, "branch {}", st.a);
        }
        Opcode::StoreF
        | Opcode::StoreV
        | Opcode::StoreS
        | Opcode::StoreEnt
        | Opcode::StoreFld
        | Opcode::StoreFnc => {
            out.push_str(&view.global_string(a));
            out.push_str(&view.global_name(b));
        }
        _ => {
            if a != 0 {
                out.push_str(&view.global_string(a));
            }
            if b != 0 {
                out.push_str(&view.global_string(b));
            }
            if c != 0 {
                out.push_str(&view.global_name(c));
            }
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// Disassembles a whole bytecode function, up to and including its last
/// return before the next function begins.
#[must_use]
pub fn disassemble_function(view: &ProgramView<'_>, f: FuncRef) -> Vec<String> {
    let Some(func) = view.program.function(f) else {
        return vec![format!("<bad function {}>", f.0)];
    };
    let Some(entry) = func.entry() else {
        return vec![format!(
            "{} is builtin #{}",
            func.name,
            func.builtin_number().unwrap_or(0)
        )];
    };
    let end = view
        .program
        .functions()
        .iter()
        .filter_map(qcvm_progs::Function::entry)
        .filter(|&e| e > entry)
        .min()
        .unwrap_or(view.program.statements().len());
    let mut lines = vec![format!("{} ({}):", func.name, func.file)];
    lines.extend((entry..end).map(|i| disassemble(view, i)));
    lines
}
