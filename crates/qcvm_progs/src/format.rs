//! On-disk layout of a program image.
//!
//! Everything is little-endian. The header is fifteen `i32`s; the tables it
//! points at are arrays of fixed-size records.

use qcvm_foundation::{Error, ErrorKind, Result};

/// Program format version understood by this engine.
pub const PROG_VERSION: i32 = 6;

/// Checksum of the well-known globals/fields layout the engine is built for.
pub const PROGHEADER_CRC: i32 = 5927;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 15 * 4;
/// Size of one statement record.
pub const STATEMENT_SIZE: usize = 8;
/// Size of one global or field definition record.
pub const DEF_SIZE: usize = 8;
/// Size of one function record.
pub const FUNCTION_SIZE: usize = 36;
/// Maximum declared parameters per function.
pub const MAX_PARMS: usize = 8;

/// Image header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: i32,
    /// Layout checksum.
    pub crc: i32,
    /// Byte offset of the statement table.
    pub ofs_statements: i32,
    /// Number of statements.
    pub num_statements: i32,
    /// Byte offset of the global definitions.
    pub ofs_global_defs: i32,
    /// Number of global definitions.
    pub num_global_defs: i32,
    /// Byte offset of the field definitions.
    pub ofs_field_defs: i32,
    /// Number of field definitions.
    pub num_field_defs: i32,
    /// Byte offset of the function table.
    pub ofs_functions: i32,
    /// Number of functions.
    pub num_functions: i32,
    /// Byte offset of the string blob.
    pub ofs_strings: i32,
    /// Length of the string blob in bytes.
    pub num_strings: i32,
    /// Byte offset of the global block.
    pub ofs_globals: i32,
    /// Number of global words.
    pub num_globals: i32,
    /// Number of field words per edict.
    pub entity_fields: i32,
}

impl Header {
    /// Parses the header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.require("header", 0, HEADER_SIZE)?;
        Ok(Self {
            version: r.i32()?,
            crc: r.i32()?,
            ofs_statements: r.i32()?,
            num_statements: r.i32()?,
            ofs_global_defs: r.i32()?,
            num_global_defs: r.i32()?,
            ofs_field_defs: r.i32()?,
            num_field_defs: r.i32()?,
            ofs_functions: r.i32()?,
            num_functions: r.i32()?,
            ofs_strings: r.i32()?,
            num_strings: r.i32()?,
            ofs_globals: r.i32()?,
            num_globals: r.i32()?,
            entity_fields: r.i32()?,
        })
    }

    /// Serializes the header.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let fields = [
            self.version,
            self.crc,
            self.ofs_statements,
            self.num_statements,
            self.ofs_global_defs,
            self.num_global_defs,
            self.ofs_field_defs,
            self.num_field_defs,
            self.ofs_functions,
            self.num_functions,
            self.ofs_strings,
            self.num_strings,
            self.ofs_globals,
            self.num_globals,
            self.entity_fields,
        ];
        fields.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Raw statement record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawStatement {
    /// Opcode number.
    pub op: u16,
    /// First operand.
    pub a: i16,
    /// Second operand.
    pub b: i16,
    /// Third operand.
    pub c: i16,
}

/// Raw definition record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawDef {
    /// Type tag, possibly with the save-global bit.
    pub ty: u16,
    /// Word offset.
    pub ofs: u16,
    /// Name string reference.
    pub name: i32,
}

/// Raw function record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawFunction {
    /// First statement, or negated builtin number.
    pub first_statement: i32,
    /// First global word of the parameter/local region.
    pub parm_start: i32,
    /// Words in the parameter/local region.
    pub locals: i32,
    /// Profile counter slot (ignored on load).
    pub profile: i32,
    /// Name string reference.
    pub name: i32,
    /// Source file string reference.
    pub file: i32,
    /// Declared parameter count.
    pub num_parms: i32,
    /// Words per parameter.
    pub parm_size: [u8; MAX_PARMS],
}

/// Bounds-checked little-endian cursor.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    /// Fails unless `start..start + len` lies inside the image.
    pub(crate) fn require(&self, what: &'static str, start: usize, len: usize) -> Result<()> {
        let end = start.checked_add(len).ok_or_else(|| {
            Error::malformed(format!("{what} extent overflows"))
        })?;
        if end > self.bytes.len() {
            return Err(Error::new(ErrorKind::Truncated {
                what,
                start,
                end,
                len: self.bytes.len(),
            }));
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.require("record", self.pos, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub(crate) fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub(crate) fn statement(&mut self) -> Result<RawStatement> {
        Ok(RawStatement {
            op: self.u16()?,
            a: self.i16()?,
            b: self.i16()?,
            c: self.i16()?,
        })
    }

    pub(crate) fn def(&mut self) -> Result<RawDef> {
        Ok(RawDef {
            ty: self.u16()?,
            ofs: self.u16()?,
            name: self.i32()?,
        })
    }

    pub(crate) fn function(&mut self) -> Result<RawFunction> {
        Ok(RawFunction {
            first_statement: self.i32()?,
            parm_start: self.i32()?,
            locals: self.i32()?,
            profile: self.i32()?,
            name: self.i32()?,
            file: self.i32()?,
            num_parms: self.i32()?,
            parm_size: self.take()?,
        })
    }
}

impl RawStatement {
    /// Serializes the record.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; STATEMENT_SIZE] {
        let mut out = [0u8; STATEMENT_SIZE];
        out[0..2].copy_from_slice(&self.op.to_le_bytes());
        out[2..4].copy_from_slice(&self.a.to_le_bytes());
        out[4..6].copy_from_slice(&self.b.to_le_bytes());
        out[6..8].copy_from_slice(&self.c.to_le_bytes());
        out
    }
}

impl RawDef {
    /// Serializes the record.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DEF_SIZE] {
        let mut out = [0u8; DEF_SIZE];
        out[0..2].copy_from_slice(&self.ty.to_le_bytes());
        out[2..4].copy_from_slice(&self.ofs.to_le_bytes());
        out[4..8].copy_from_slice(&self.name.to_le_bytes());
        out
    }
}

impl RawFunction {
    /// Serializes the record.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FUNCTION_SIZE] {
        let mut out = [0u8; FUNCTION_SIZE];
        let ints = [
            self.first_statement,
            self.parm_start,
            self.locals,
            self.profile,
            self.name,
            self.file,
            self.num_parms,
        ];
        for (i, v) in ints.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        out[28..36].copy_from_slice(&self.parm_size);
        out
    }
}
