//! String builtins. Results go through the temp string ring.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use qcvm_foundation::{Result, Vec3};

use super::BuiltinRegistry;
use crate::vm::Vm;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry
        .register("ftos", 26, native_ftos)
        .register("vtos", 27, native_vtos)
        .register("stof", 81, native_stof)
        .register("strlen", 114, native_strlen)
        .register("strcat", 115, native_strcat)
        .register("substring", 116, native_substring);
}

/// Whole numbers print without a fraction, everything else as `%5.1f`.
pub(crate) fn format_float(f: f32) -> String {
    if f == f.trunc() && f.abs() < 2_147_483_648.0 {
        format!("{}", f as i32)
    } else {
        format!("{f:5.1}")
    }
}

pub(crate) fn format_vector(v: Vec3) -> String {
    format!("'{:5.1} {:5.1} {:5.1}'", v[0], v[1], v[2])
}

/// Parses the longest numeric prefix, `atof` style; zero if there is none.
pub(crate) fn parse_float(text: &[u8]) -> f32 {
    let text = String::from_utf8_lossy(text);
    let trimmed = text.trim_start();
    let mut best = 0.0;
    for (i, ch) in trimmed.char_indices() {
        if !(ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.' | 'e' | 'E')) {
            break;
        }
        if let Ok(v) = trimmed[..=i].parse::<f32>() {
            best = v;
        }
    }
    best
}

fn native_ftos(vm: &mut Vm) -> Result<()> {
    let text = format_float(vm.arg_float(0)?);
    vm.return_temp_string(text.as_bytes())
}

fn native_vtos(vm: &mut Vm) -> Result<()> {
    let text = format_vector(vm.arg_vector(0)?);
    vm.return_temp_string(text.as_bytes())
}

fn native_stof(vm: &mut Vm) -> Result<()> {
    let f = parse_float(vm.arg_bytes(0)?);
    vm.return_float(f)
}

fn native_strlen(vm: &mut Vm) -> Result<()> {
    let len = vm.arg_bytes(0)?.len();
    vm.return_float(len as f32)
}

/// strcat(string, ...): joins every argument.
fn native_strcat(vm: &mut Vm) -> Result<()> {
    let joined = vm.concat_args(0)?;
    vm.return_temp_string(&joined)
}

/// substring(string s, float start, float length), clamped to `s`.
fn native_substring(vm: &mut Vm) -> Result<()> {
    let start = vm.arg_float(1)?.max(0.0) as usize;
    let length = vm.arg_float(2)?;
    let bytes = vm.arg_bytes(0)?;
    let start = start.min(bytes.len());
    let end = if length < 0.0 {
        bytes.len()
    } else {
        start.saturating_add(length as usize).min(bytes.len())
    };
    let piece = bytes[start..end].to_vec();
    vm.return_temp_string(&piece)
}
