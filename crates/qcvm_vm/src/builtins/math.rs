//! Numeric and vector builtins.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::unnecessary_wraps)]

use std::f32::consts::PI;

use qcvm_foundation::{Result, Vec3};
use qcvm_progs::ofs;
use rand::Rng;

use super::BuiltinRegistry;
use crate::vm::Vm;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry
        .register("makevectors", 1, native_makevectors)
        .register("random", 7, native_random)
        .register("normalize", 9, native_normalize)
        .register("vlen", 12, native_vlen)
        .register("vectoyaw", 13, native_vectoyaw)
        .register("rint", 36, native_rint)
        .register("floor", 37, native_floor)
        .register("ceil", 38, native_ceil)
        .register("fabs", 43, native_fabs)
        .register("vectoangles", 51, native_vectoangles)
        .register("sin", 60, native_sin)
        .register("cos", 61, native_cos)
        .register("sqrt", 62, native_sqrt)
        .register("pow", 97, native_pow);
}

/// Forward, right, and up vectors for pitch/yaw/roll angles in degrees.
pub(crate) fn angle_vectors(angles: Vec3) -> (Vec3, Vec3, Vec3) {
    let rad = |deg: f32| deg * (PI * 2.0 / 360.0);
    let (sp, cp) = rad(angles[0]).sin_cos();
    let (sy, cy) = rad(angles[1]).sin_cos();
    let (sr, cr) = rad(angles[2]).sin_cos();

    let forward = [cp * cy, cp * sy, -sp];
    let right = [
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    ];
    let up = [cr * sp * cy + sr * sy, cr * sp * sy - sr * cy, cr * cp];
    (forward, right, up)
}

fn length(v: Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Yaw of a direction in whole degrees, `0..360`.
fn yaw_of(v: Vec3) -> f32 {
    if v[0] == 0.0 && v[1] == 0.0 {
        return 0.0;
    }
    let yaw = (v[1].atan2(v[0]) * 180.0 / PI).trunc();
    if yaw < 0.0 { yaw + 360.0 } else { yaw }
}

/// makevectors(vector angles): sets `v_forward`, `v_right`, `v_up`.
fn native_makevectors(vm: &mut Vm) -> Result<()> {
    let (forward, right, up) = angle_vectors(vm.arg_vector(0)?);
    let globals = vm.globals_mut();
    globals.set_vector(ofs::V_FORWARD, forward)?;
    globals.set_vector(ofs::V_RIGHT, right)?;
    globals.set_vector(ofs::V_UP, up)
}

/// random(): uniform in `[0, 1]`, from the engine's seeded generator.
fn native_random(vm: &mut Vm) -> Result<()> {
    let n: u16 = vm.rng.gen_range(0..=0x7fff);
    vm.return_float(f32::from(n) / f32::from(0x7fff_u16))
}

fn native_normalize(vm: &mut Vm) -> Result<()> {
    let v = vm.arg_vector(0)?;
    let len = length(v);
    if len == 0.0 {
        vm.return_vector([0.0; 3])
    } else {
        vm.return_vector([v[0] / len, v[1] / len, v[2] / len])
    }
}

fn native_vlen(vm: &mut Vm) -> Result<()> {
    let v = vm.arg_vector(0)?;
    vm.return_float(length(v))
}

fn native_vectoyaw(vm: &mut Vm) -> Result<()> {
    let v = vm.arg_vector(0)?;
    vm.return_float(yaw_of(v))
}

/// vectoangles(vector dir): `'pitch yaw 0'` in whole degrees.
fn native_vectoangles(vm: &mut Vm) -> Result<()> {
    let v = vm.arg_vector(0)?;
    let pitch = if v[0] == 0.0 && v[1] == 0.0 {
        if v[2] > 0.0 { 90.0 } else { 270.0 }
    } else {
        let forward = (v[0] * v[0] + v[1] * v[1]).sqrt();
        let pitch = (v[2].atan2(forward) * 180.0 / PI).trunc();
        if pitch < 0.0 { pitch + 360.0 } else { pitch }
    };
    vm.return_vector([pitch, yaw_of(v), 0.0])
}

/// rint(float): rounds half away from zero.
fn native_rint(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    let r = if f > 0.0 { (f + 0.5).trunc() } else { (f - 0.5).trunc() };
    vm.return_float(r)
}

fn native_floor(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    vm.return_float(f.floor())
}

fn native_ceil(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    vm.return_float(f.ceil())
}

fn native_fabs(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    vm.return_float(f.abs())
}

fn native_sin(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    vm.return_float(f.sin())
}

fn native_cos(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    vm.return_float(f.cos())
}

fn native_sqrt(vm: &mut Vm) -> Result<()> {
    let f = vm.arg_float(0)?;
    vm.return_float(f.sqrt())
}

fn native_pow(vm: &mut Vm) -> Result<()> {
    let (x, y) = (vm.arg_float(0)?, vm.arg_float(1)?);
    vm.return_float(x.powf(y))
}
