//! Loading and validating program images.
//!
//! Every offset stored in an image is checked here, once, so the
//! interpreter can index statements, functions, and parameter regions
//! without re-validating them on every step.

#![allow(clippy::cast_sign_loss)]

use md5::{Digest, Md5};
use tracing::{info, warn};

use qcvm_foundation::{Error, ErrorKind, Result, StringRef, Type, Word};

use crate::checksum::crc16;
use crate::format::{
    DEF_SIZE, FUNCTION_SIZE, Header, PROG_VERSION, PROGHEADER_CRC, RawDef, RawFunction, Reader,
    STATEMENT_SIZE,
};
use crate::globals::{GlobalBlock, ofs};
use crate::opcode::{Opcode, Operand, Statement};
use crate::program::{Def, Function, Program};
use crate::source::ContentSource;
use crate::strings::StringTable;

/// Sizes of the runtime string regions created at load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Number of temp string slots.
    pub temp_string_slots: usize,
    /// Bytes per temp string slot.
    pub temp_string_size: usize,
    /// Capacity of the permanent dynamic string region in bytes.
    pub string_capacity: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            temp_string_slots: 16,
            temp_string_size: 1024,
            string_capacity: 1 << 20,
        }
    }
}

impl LoadOptions {
    /// Sets the temp ring geometry.
    #[must_use]
    pub fn with_temp_strings(mut self, slots: usize, size: usize) -> Self {
        self.temp_string_slots = slots;
        self.temp_string_size = size;
        self
    }

    /// Sets the dynamic string capacity.
    #[must_use]
    pub fn with_string_capacity(mut self, capacity: usize) -> Self {
        self.string_capacity = capacity;
        self
    }
}

/// A validated program together with its initial mutable state.
#[derive(Clone, Debug)]
pub struct ProgramImage {
    /// Immutable tables.
    pub program: Program,
    /// String table.
    pub strings: StringTable,
    /// Initial global block.
    pub globals: GlobalBlock,
}

impl ProgramImage {
    /// Fetches `name` (or the override, when set and present) and loads it.
    ///
    /// A missing override falls back to `name` with a warning.
    pub fn load(
        source: &dyn ContentSource,
        name: &str,
        override_name: Option<&str>,
        options: &LoadOptions,
    ) -> Result<Self> {
        let bytes = match override_name.filter(|o| !o.is_empty()) {
            Some(alt) => match source.fetch(alt) {
                Ok(bytes) => {
                    info!(file = alt, "using program override");
                    bytes
                }
                Err(err) => {
                    warn!(file = alt, %err, fallback = name, "program override unavailable");
                    source.fetch(name)?
                }
            },
            None => source.fetch(name)?,
        };
        Self::from_bytes(&bytes, options)
    }

    /// Parses and validates an image held in memory.
    pub fn from_bytes(bytes: &[u8], options: &LoadOptions) -> Result<Self> {
        let crc = crc16(bytes);
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&Md5::digest(bytes));

        let header = Header::parse(bytes)?;
        if header.version != PROG_VERSION {
            return Err(Error::new(ErrorKind::VersionMismatch {
                expected: PROG_VERSION,
                found: header.version,
            }));
        }
        if header.crc != PROGHEADER_CRC {
            return Err(Error::new(ErrorKind::HeaderCorrupt {
                expected: PROGHEADER_CRC,
                found: header.crc,
            }));
        }

        let reader = Reader::new(bytes);
        let num_statements = table(
            &reader,
            "statements",
            header.ofs_statements,
            header.num_statements,
            STATEMENT_SIZE,
        )?;
        let num_global_defs = table(
            &reader,
            "global definitions",
            header.ofs_global_defs,
            header.num_global_defs,
            DEF_SIZE,
        )?;
        let num_field_defs = table(
            &reader,
            "field definitions",
            header.ofs_field_defs,
            header.num_field_defs,
            DEF_SIZE,
        )?;
        let num_functions = table(
            &reader,
            "functions",
            header.ofs_functions,
            header.num_functions,
            FUNCTION_SIZE,
        )?;
        let num_strings = table(&reader, "strings", header.ofs_strings, header.num_strings, 1)?;
        let num_globals = table(&reader, "globals", header.ofs_globals, header.num_globals, 4)?;
        let entity_fields = count("entity fields", header.entity_fields)?;

        if num_globals < ofs::COUNT {
            return Err(Error::malformed(format!(
                "global block has {num_globals} words, well-known layout needs {}",
                ofs::COUNT
            )));
        }
        if num_functions == 0 {
            return Err(Error::malformed("function table is empty"));
        }

        let string_start = offset(header.ofs_strings)?;
        let blob = bytes[string_start..string_start + num_strings].to_vec();
        let strings = StringTable::new(
            blob,
            options.temp_string_slots,
            options.temp_string_size,
            options.string_capacity,
        );
        let name_of = |what: &str, r: i32| -> Result<String> {
            if usize::try_from(r).is_ok_and(|r| r < num_strings.max(1)) {
                Ok(strings.get_str(StringRef(r))?.into_owned())
            } else {
                Err(Error::malformed(format!(
                    "{what} name {r} outside string blob of {num_strings} bytes"
                )))
            }
        };

        let mut r = Reader::at(bytes, offset(header.ofs_statements)?);
        let mut statements = Vec::with_capacity(num_statements);
        for i in 0..num_statements {
            let raw = r.statement()?;
            let op = Opcode::from_u16(raw.op).ok_or_else(|| {
                Error::new(ErrorKind::BadOpcode {
                    opcode: raw.op,
                    statement: i,
                })
            })?;
            let st = Statement::new(op, raw.a, raw.b, raw.c);
            validate_statement(&st, i, num_statements, num_globals)?;
            statements.push(st);
        }

        let mut r = Reader::at(bytes, offset(header.ofs_global_defs)?);
        let mut global_defs = Vec::with_capacity(num_global_defs);
        for i in 0..num_global_defs {
            let def = resolve_def(r.def()?, &name_of)?;
            if usize::from(def.ofs) + def.ty.size() > num_globals {
                return Err(Error::malformed(format!(
                    "global definition {i} ({}) at {} outside {num_globals} globals",
                    def.name, def.ofs
                )));
            }
            global_defs.push(def);
        }

        let mut r = Reader::at(bytes, offset(header.ofs_field_defs)?);
        let mut field_defs = Vec::with_capacity(num_field_defs);
        for i in 0..num_field_defs {
            let def = resolve_def(r.def()?, &name_of)?;
            if def.ty != Type::Void && usize::from(def.ofs) + def.ty.size() > entity_fields {
                return Err(Error::malformed(format!(
                    "field definition {i} ({}) at {} outside {entity_fields} field words",
                    def.name, def.ofs
                )));
            }
            field_defs.push(def);
        }

        let mut r = Reader::at(bytes, offset(header.ofs_functions)?);
        let mut functions = Vec::with_capacity(num_functions);
        for i in 0..num_functions {
            let raw = r.function()?;
            functions.push(resolve_function(i, &raw, num_statements, num_globals, &name_of)?);
        }

        let mut r = Reader::at(bytes, offset(header.ofs_globals)?);
        let mut words = Vec::with_capacity(num_globals);
        for _ in 0..num_globals {
            words.push(Word::from_bits(r.u32()?));
        }

        info!(
            functions = num_functions,
            statements = num_statements,
            globals = num_globals,
            entity_fields,
            crc = crc,
            digest = %hex(&digest),
            "loaded program image"
        );

        let program = Program::new(
            header,
            functions,
            statements,
            global_defs,
            field_defs,
            crc,
            digest,
        );
        Ok(Self {
            program,
            strings,
            globals: GlobalBlock::new(words),
        })
    }

    /// Splits the image into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Program, StringTable, GlobalBlock) {
        (self.program, self.strings, self.globals)
    }
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

fn count(what: &str, n: i32) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::malformed(format!("negative {what} count {n}")))
}

fn offset(ofs: i32) -> Result<usize> {
    usize::try_from(ofs).map_err(|_| Error::malformed(format!("negative table offset {ofs}")))
}

fn table(reader: &Reader<'_>, what: &'static str, ofs: i32, n: i32, size: usize) -> Result<usize> {
    let n = count(what, n)?;
    let start = offset(ofs)?;
    let len = n
        .checked_mul(size)
        .ok_or_else(|| Error::malformed(format!("{what} table size overflows")))?;
    reader.require(what, start, len)?;
    Ok(n)
}

fn validate_statement(st: &Statement, index: usize, count: usize, num_globals: usize) -> Result<()> {
    for (operand, use_) in st.raw_operands().iter().zip(st.op.operands()) {
        match use_ {
            Operand::Unused | Operand::Branch => {}
            Operand::Global(words) => {
                let at = usize::from(*operand as u16);
                // Return values are copied with clamping, so one word suffices.
                let need = if st.op.is_return() { 1 } else { usize::from(words) };
                if at + need > num_globals {
                    return Err(Error::malformed(format!(
                        "statement {index} ({}) operand {at} outside {num_globals} globals",
                        st.op
                    )));
                }
            }
        }
    }
    if let Some(target) = st.branch_target(index) {
        if usize::try_from(target).map_or(true, |t| t >= count) {
            return Err(Error::new(ErrorKind::BadBranch {
                statement: index,
                target,
                count,
            }));
        }
    }
    Ok(())
}

fn resolve_def(raw: RawDef, name_of: &dyn Fn(&str, i32) -> Result<String>) -> Result<Def> {
    let ty = Type::from_raw(raw.ty)
        .ok_or_else(|| Error::malformed(format!("unknown definition type {}", raw.ty)))?;
    Ok(Def {
        ty,
        save: raw.ty & Type::SAVE_GLOBAL != 0,
        ofs: raw.ofs,
        name_ref: StringRef(raw.name),
        name: name_of("definition", raw.name)?,
    })
}

fn resolve_function(
    index: usize,
    raw: &RawFunction,
    num_statements: usize,
    num_globals: usize,
    name_of: &dyn Fn(&str, i32) -> Result<String>,
) -> Result<Function> {
    let name = name_of("function", raw.name)?;
    let file = name_of("function file", raw.file)?;
    let bad = |why: String| Error::malformed(format!("function {index} ({name}): {why}"));

    let parm_start = usize::try_from(raw.parm_start)
        .map_err(|_| bad(format!("negative parameter start {}", raw.parm_start)))?;
    let locals = usize::try_from(raw.locals)
        .map_err(|_| bad(format!("negative locals count {}", raw.locals)))?;
    let num_parms = usize::try_from(raw.num_parms)
        .map_err(|_| bad(format!("negative parameter count {}", raw.num_parms)))?;

    let function = Function {
        first_statement: raw.first_statement,
        parm_start,
        locals,
        num_parms,
        parm_size: raw.parm_size,
        name: name.clone(),
        file,
    };

    if let Some(entry) = function.entry() {
        if index != 0 && entry >= num_statements {
            return Err(bad(format!(
                "first statement {entry} outside {num_statements} statements"
            )));
        }
        if parm_start + locals > num_globals {
            return Err(bad(format!(
                "locals {parm_start}..{} outside {num_globals} globals",
                parm_start + locals
            )));
        }
        if function.parm_size[..function.parm_count()].iter().any(|&s| s > 3) {
            return Err(bad("parameter wider than a vector".into()));
        }
        if parm_start + function.parm_words() > num_globals {
            return Err(bad("parameters outside the global block".into()));
        }
    }
    Ok(function)
}
