//! In-memory assembler for program images.
//!
//! Produces byte-exact images without an external compiler, so tests,
//! benches, and tools can construct well-formed (or deliberately broken)
//! programs.
//!
//! ```
//! use qcvm_progs::{ImageBuilder, Opcode};
//!
//! let mut b = ImageBuilder::new();
//! let total = b.global_float("total", 0.0);
//! let one = b.constant(1.0);
//! b.function("bump", &[], |f| {
//!     f.emit(Opcode::AddF, total, one, total);
//! });
//! let bytes = b.build();
//! assert!(bytes.len() > 60);
//! ```

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::collections::HashMap;

use qcvm_foundation::{FuncRef, StringRef, Type, Vec3, Word};

use crate::format::{
    DEF_SIZE, FUNCTION_SIZE, HEADER_SIZE, Header, MAX_PARMS, PROG_VERSION, PROGHEADER_CRC,
    RawDef, RawFunction, RawStatement, STATEMENT_SIZE,
};
use crate::globals::{WELL_KNOWN, ofs};
use crate::opcode::Opcode;

/// Assembles a program image.
#[derive(Clone, Debug)]
pub struct ImageBuilder {
    version: i32,
    crc: i32,
    strings: Vec<u8>,
    string_index: HashMap<String, i32>,
    statements: Vec<RawStatement>,
    functions: Vec<RawFunction>,
    global_defs: Vec<RawDef>,
    field_defs: Vec<RawDef>,
    globals: Vec<Word>,
    entity_fields: i32,
    file: i32,
    function_globals: HashMap<u32, u16>,
    field_offsets: HashMap<String, u16>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    /// Starts an image with the well-known globals reserved and defined.
    #[must_use]
    pub fn new() -> Self {
        let mut b = Self {
            version: PROG_VERSION,
            crc: PROGHEADER_CRC,
            strings: vec![0],
            string_index: HashMap::new(),
            statements: vec![RawStatement {
                op: Opcode::Done.to_u16(),
                a: 0,
                b: 0,
                c: 0,
            }],
            functions: vec![RawFunction {
                first_statement: 0,
                parm_start: 0,
                locals: 0,
                profile: 0,
                name: 0,
                file: 0,
                num_parms: 0,
                parm_size: [0; MAX_PARMS],
            }],
            global_defs: vec![RawDef {
                ty: 0,
                ofs: 0,
                name: 0,
            }],
            field_defs: vec![RawDef {
                ty: 0,
                ofs: 0,
                name: 0,
            }],
            globals: vec![Word::ZERO; ofs::COUNT],
            entity_fields: 0,
            file: 0,
            function_globals: HashMap::new(),
            field_offsets: HashMap::new(),
        };
        b.string_index.insert(String::new(), 0);
        b.file = b.intern("builder.qc").0;
        for &(name, ty, at) in WELL_KNOWN {
            let name = b.intern(name).0;
            b.global_defs.push(RawDef {
                ty: ty.to_raw(),
                ofs: at as u16,
                name,
            });
        }
        b
    }

    /// Overrides the header version.
    #[must_use]
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Overrides the header checksum.
    #[must_use]
    pub fn with_crc(mut self, crc: i32) -> Self {
        self.crc = crc;
        self
    }

    /// Sets the source file recorded for functions defined from now on.
    pub fn set_file(&mut self, name: &str) {
        self.file = self.intern(name).0;
    }

    /// Adds a string to the blob, reusing an identical one.
    pub fn intern(&mut self, s: &str) -> StringRef {
        if let Some(&at) = self.string_index.get(s) {
            return StringRef(at);
        }
        let at = self.strings.len() as i32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.string_index.insert(s.to_string(), at);
        StringRef(at)
    }

    fn alloc(&mut self, words: usize) -> u16 {
        let at = self.globals.len();
        self.globals.resize(at + words, Word::ZERO);
        at as u16
    }

    fn define_global(&mut self, name: &str, ty: Type, at: u16) {
        let name = self.intern(name).0;
        self.global_defs.push(RawDef {
            ty: ty.to_raw(),
            ofs: at,
            name,
        });
    }

    /// Next free global offset.
    #[must_use]
    pub fn next_global(&self) -> u16 {
        self.globals.len() as u16
    }

    /// Declares a named global of `ty`, zero-initialized.
    pub fn global(&mut self, name: &str, ty: Type) -> u16 {
        let at = self.alloc(ty.size());
        self.define_global(name, ty, at);
        at
    }

    /// Declares a named float global.
    pub fn global_float(&mut self, name: &str, value: f32) -> u16 {
        let at = self.global(name, Type::Float);
        self.globals[usize::from(at)] = Word::from_f32(value);
        at
    }

    /// Declares a named vector global.
    pub fn global_vector(&mut self, name: &str, value: Vec3) -> u16 {
        let at = self.global(name, Type::Vector);
        for (i, v) in value.into_iter().enumerate() {
            self.globals[usize::from(at) + i] = Word::from_f32(v);
        }
        at
    }

    /// Declares a named string global initialized to `value`.
    pub fn global_string(&mut self, name: &str, value: &str) -> u16 {
        let s = self.intern(value);
        let at = self.global(name, Type::String);
        self.globals[usize::from(at)] = s.to_word();
        at
    }

    /// Adds an anonymous float constant.
    pub fn constant(&mut self, value: f32) -> u16 {
        let at = self.alloc(1);
        self.define_global("IMMEDIATE", Type::Float, at);
        self.globals[usize::from(at)] = Word::from_f32(value);
        at
    }

    /// Adds an anonymous vector constant.
    pub fn constant_vector(&mut self, value: Vec3) -> u16 {
        let at = self.alloc(3);
        self.define_global("IMMEDIATE", Type::Vector, at);
        for (i, v) in value.into_iter().enumerate() {
            self.globals[usize::from(at) + i] = Word::from_f32(v);
        }
        at
    }

    /// Adds an anonymous string constant.
    pub fn constant_string(&mut self, value: &str) -> u16 {
        let s = self.intern(value);
        let at = self.alloc(1);
        self.define_global("IMMEDIATE", Type::String, at);
        self.globals[usize::from(at)] = s.to_word();
        at
    }

    /// Overwrites the initial value of a global word.
    pub fn set_global(&mut self, at: u16, word: Word) {
        if let Some(slot) = self.globals.get_mut(usize::from(at)) {
            *slot = word;
        }
    }

    /// Declares an edict field.
    ///
    /// Returns the offset of the field-typed global that holds the field's
    /// offset, which is what `LOAD_*` and `ADDRESS` take as operand `b`.
    pub fn field(&mut self, name: &str, ty: Type) -> u16 {
        let field_ofs = self.entity_fields as u16;
        self.entity_fields += ty.size() as i32;
        let name_ref = self.intern(name).0;
        self.field_defs.push(RawDef {
            ty: ty.to_raw(),
            ofs: field_ofs,
            name: name_ref,
        });
        self.field_offsets.insert(name.to_string(), field_ofs);
        let at = self.alloc(1);
        self.define_global(name, Type::Field, at);
        self.globals[usize::from(at)] = Word::from_bits(u32::from(field_ofs));
        at
    }

    /// Offset of a declared field within the edict.
    #[must_use]
    pub fn field_offset(&self, name: &str) -> Option<u16> {
        self.field_offsets.get(name).copied()
    }

    /// Declares a builtin under its default number.
    pub fn builtin(&mut self, name: &str, number: u32) -> FuncRef {
        let f = self.declare(name);
        if let Some(raw) = self.functions.get_mut(f.index()) {
            raw.first_statement = -(number as i32);
        }
        f
    }

    /// Reserves a function slot and the global that refers to it.
    ///
    /// Lets functions call each other before both are defined.
    pub fn declare(&mut self, name: &str) -> FuncRef {
        let index = self.functions.len() as u32;
        let name_ref = self.intern(name).0;
        self.functions.push(RawFunction {
            first_statement: 0,
            parm_start: 0,
            locals: 0,
            profile: 0,
            name: name_ref,
            file: self.file,
            num_parms: 0,
            parm_size: [0; MAX_PARMS],
        });
        let at = self.alloc(1);
        self.define_global(name, Type::Function, at);
        self.globals[usize::from(at)] = FuncRef(index).to_word();
        self.function_globals.insert(index, at);
        FuncRef(index)
    }

    /// Global holding a reference to `f`.
    #[must_use]
    pub fn function_global(&self, f: FuncRef) -> u16 {
        self.function_globals.get(&f.0).copied().unwrap_or(0)
    }

    /// Defines the body of a declared function.
    ///
    /// `parm_sizes` gives the words per parameter (1, or 3 for vectors).
    /// A `DONE` is appended when the body does not end in a return or jump.
    pub fn define(
        &mut self,
        f: FuncRef,
        parm_sizes: &[u8],
        body: impl FnOnce(&mut FunctionBuilder<'_>),
    ) -> FuncRef {
        let first_statement = self.statements.len() as i32;
        let parm_start = self.globals.len();
        let mut parms = Vec::with_capacity(parm_sizes.len());
        for &size in parm_sizes.iter().take(MAX_PARMS) {
            parms.push(self.alloc(usize::from(size)));
        }

        let mut fb = FunctionBuilder {
            image: self,
            func: f,
            parms,
        };
        body(&mut fb);

        let ends_cleanly = self.statements.len() > first_statement as usize
            && self.statements.last().is_some_and(|st| {
                Opcode::from_u16(st.op)
                    .is_some_and(|op| op.is_return() || op == Opcode::Goto)
            });
        if !ends_cleanly {
            self.statements.push(RawStatement {
                op: Opcode::Done.to_u16(),
                a: 0,
                b: 0,
                c: 0,
            });
        }

        let mut parm_size = [0u8; MAX_PARMS];
        for (slot, &size) in parm_size.iter_mut().zip(parm_sizes) {
            *slot = size;
        }
        let locals = self.globals.len() - parm_start;
        if let Some(raw) = self.functions.get_mut(f.index()) {
            raw.first_statement = first_statement;
            raw.parm_start = parm_start as i32;
            raw.locals = locals as i32;
            raw.num_parms = parm_sizes.len().min(MAX_PARMS) as i32;
            raw.parm_size = parm_size;
        }
        f
    }

    /// Declares and defines a function in one step.
    pub fn function(
        &mut self,
        name: &str,
        parm_sizes: &[u8],
        body: impl FnOnce(&mut FunctionBuilder<'_>),
    ) -> FuncRef {
        let f = self.declare(name);
        self.define(f, parm_sizes, body)
    }

    /// Raw record of a function, for deliberately malformed images.
    pub fn raw_function_mut(&mut self, f: FuncRef) -> Option<&mut RawFunction> {
        self.functions.get_mut(f.index())
    }

    /// Number of statements emitted so far.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Serializes the image.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let ofs_statements = HEADER_SIZE;
        let ofs_global_defs = ofs_statements + self.statements.len() * STATEMENT_SIZE;
        let ofs_field_defs = ofs_global_defs + self.global_defs.len() * DEF_SIZE;
        let ofs_functions = ofs_field_defs + self.field_defs.len() * DEF_SIZE;
        let ofs_strings = ofs_functions + self.functions.len() * FUNCTION_SIZE;
        let ofs_globals = ofs_strings + self.strings.len();

        let header = Header {
            version: self.version,
            crc: self.crc,
            ofs_statements: ofs_statements as i32,
            num_statements: self.statements.len() as i32,
            ofs_global_defs: ofs_global_defs as i32,
            num_global_defs: self.global_defs.len() as i32,
            ofs_field_defs: ofs_field_defs as i32,
            num_field_defs: self.field_defs.len() as i32,
            ofs_functions: ofs_functions as i32,
            num_functions: self.functions.len() as i32,
            ofs_strings: ofs_strings as i32,
            num_strings: self.strings.len() as i32,
            ofs_globals: ofs_globals as i32,
            num_globals: self.globals.len() as i32,
            entity_fields: self.entity_fields,
        };

        let mut out = header.to_bytes();
        for st in &self.statements {
            out.extend_from_slice(&st.to_bytes());
        }
        for def in self.global_defs.iter().chain(&self.field_defs) {
            out.extend_from_slice(&def.to_bytes());
        }
        for f in &self.functions {
            out.extend_from_slice(&f.to_bytes());
        }
        out.extend_from_slice(&self.strings);
        for w in &self.globals {
            out.extend_from_slice(&w.bits().to_le_bytes());
        }
        out
    }
}

/// Emits the body of one function.
pub struct FunctionBuilder<'a> {
    image: &'a mut ImageBuilder,
    func: FuncRef,
    parms: Vec<u16>,
}

impl FunctionBuilder<'_> {
    /// The function being defined.
    #[must_use]
    pub fn func(&self) -> FuncRef {
        self.func
    }

    /// Global holding a reference to the function being defined.
    #[must_use]
    pub fn self_global(&self) -> u16 {
        self.image.function_global(self.func)
    }

    /// Offset of parameter `n` inside this function's local region.
    #[must_use]
    pub fn parm(&self, n: usize) -> u16 {
        self.parms.get(n).copied().unwrap_or(0)
    }

    /// Allocates a local of `ty`.
    pub fn local(&mut self, ty: Type) -> u16 {
        self.image.alloc(ty.size())
    }

    /// The image under construction.
    pub fn image(&mut self) -> &mut ImageBuilder {
        &mut *self.image
    }

    /// Adds a float constant.
    pub fn constant(&mut self, value: f32) -> u16 {
        self.image.constant(value)
    }

    /// Index the next statement will have.
    #[must_use]
    pub fn here(&self) -> usize {
        self.image.statements.len()
    }

    /// Emits a statement and returns its index.
    ///
    /// Operands are truncated to 16 bits, so global offsets above 32767 and
    /// negative displacements both encode as the format expects.
    pub fn emit(
        &mut self,
        op: Opcode,
        a: impl Into<i32>,
        b: impl Into<i32>,
        c: impl Into<i32>,
    ) -> usize {
        self.emit_raw(op.to_u16(), a, b, c)
    }

    /// Emits a statement with an arbitrary opcode number.
    pub fn emit_raw(
        &mut self,
        op: u16,
        a: impl Into<i32>,
        b: impl Into<i32>,
        c: impl Into<i32>,
    ) -> usize {
        let at = self.here();
        self.image.statements.push(RawStatement {
            op,
            a: a.into() as i16,
            b: b.into() as i16,
            c: c.into() as i16,
        });
        at
    }

    fn displacement(from: usize, to: usize) -> i32 {
        to as i32 - from as i32
    }

    /// Emits `GOTO target`.
    pub fn goto(&mut self, target: usize) -> usize {
        let disp = Self::displacement(self.here(), target);
        self.emit(Opcode::Goto, disp, 0, 0)
    }

    /// Emits `IF cond GOTO target`.
    pub fn branch_if(&mut self, cond: u16, target: usize) -> usize {
        let disp = Self::displacement(self.here(), target);
        self.emit(Opcode::If, cond, disp, 0)
    }

    /// Emits `IFNOT cond GOTO target`.
    pub fn branch_ifnot(&mut self, cond: u16, target: usize) -> usize {
        let disp = Self::displacement(self.here(), target);
        self.emit(Opcode::IfNot, cond, disp, 0)
    }

    /// Points an already emitted branch at `target`.
    pub fn patch_branch(&mut self, at: usize, target: usize) {
        let disp = Self::displacement(at, target) as i16;
        if let Some(st) = self.image.statements.get_mut(at) {
            match Opcode::from_u16(st.op) {
                Some(Opcode::Goto) => st.a = disp,
                Some(Opcode::If | Opcode::IfNot) => st.b = disp,
                _ => {}
            }
        }
    }

    /// Copies arguments into the parameter slots and calls through `func_global`.
    ///
    /// Each argument is a global offset and its type (vectors copy three words).
    pub fn call(&mut self, func_global: u16, args: &[(u16, Type)]) -> usize {
        for (i, &(arg, ty)) in args.iter().enumerate().take(MAX_PARMS) {
            let store = if ty == Type::Vector {
                Opcode::StoreV
            } else {
                Opcode::StoreF
            };
            self.emit(store, arg, ofs::parm(i) as u16, 0);
        }
        let op = Opcode::call(args.len().min(MAX_PARMS)).unwrap_or(Opcode::Call8);
        self.emit(op, func_global, 0, 0)
    }

    /// Emits `RETURN value`.
    pub fn ret(&mut self, value: u16) -> usize {
        self.emit(Opcode::Return, value, 0, 0)
    }
}
