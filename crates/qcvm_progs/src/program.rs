//! The immutable tables of a loaded program.

use std::collections::HashMap;

use qcvm_foundation::{FuncRef, StringRef, Type};

use crate::format::{Header, MAX_PARMS};
use crate::opcode::Statement;

/// A global or field definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Def {
    /// Declared type.
    pub ty: Type,
    /// Whether the global is written to savegames.
    pub save: bool,
    /// Word offset (into the global block or the edict field block).
    pub ofs: u16,
    /// Name reference in the string table.
    pub name_ref: StringRef,
    /// Resolved name.
    pub name: String,
}

/// A function descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    /// First statement, or the negated builtin number.
    pub first_statement: i32,
    /// First global word of the parameter and local region.
    pub parm_start: usize,
    /// Words in the parameter and local region.
    pub locals: usize,
    /// Declared parameter count.
    pub num_parms: usize,
    /// Words per parameter.
    pub parm_size: [u8; MAX_PARMS],
    /// Resolved name.
    pub name: String,
    /// Resolved source file name.
    pub file: String,
}

impl Function {
    /// True for natively implemented functions.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        self.first_statement < 0
    }

    /// The builtin number, for natively implemented functions.
    #[must_use]
    pub fn builtin_number(&self) -> Option<u32> {
        if self.is_builtin() {
            Some(self.first_statement.unsigned_abs())
        } else {
            None
        }
    }

    /// First statement, for bytecode functions.
    #[must_use]
    pub fn entry(&self) -> Option<usize> {
        usize::try_from(self.first_statement).ok()
    }

    /// Number of parameters that are copied on entry.
    #[must_use]
    pub fn parm_count(&self) -> usize {
        self.num_parms.min(MAX_PARMS)
    }

    /// Total words occupied by the parameters.
    #[must_use]
    pub fn parm_words(&self) -> usize {
        self.parm_size[..self.parm_count()]
            .iter()
            .map(|&s| usize::from(s))
            .sum()
    }
}

/// The function, statement, and definition tables of a program.
#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) header: Header,
    pub(crate) functions: Vec<Function>,
    pub(crate) statements: Vec<Statement>,
    pub(crate) global_defs: Vec<Def>,
    pub(crate) field_defs: Vec<Def>,
    pub(crate) crc: u16,
    pub(crate) digest: [u8; 16],
    pub(crate) function_index: HashMap<String, FuncRef>,
    pub(crate) global_index: HashMap<String, usize>,
    pub(crate) field_index: HashMap<String, usize>,
    pub(crate) global_at: HashMap<u16, usize>,
    pub(crate) field_at: HashMap<u16, usize>,
}

impl Program {
    pub(crate) fn new(
        header: Header,
        functions: Vec<Function>,
        statements: Vec<Statement>,
        global_defs: Vec<Def>,
        field_defs: Vec<Def>,
        crc: u16,
        digest: [u8; 16],
    ) -> Self {
        let mut function_index = HashMap::new();
        for (i, f) in functions.iter().enumerate().skip(1) {
            if let Ok(index) = u32::try_from(i) {
                function_index.entry(f.name.clone()).or_insert(FuncRef(index));
            }
        }
        let (global_index, global_at) = index_defs(&global_defs);
        let (field_index, field_at) = index_defs(&field_defs);
        Self {
            header,
            functions,
            statements,
            global_defs,
            field_defs,
            crc,
            digest,
            function_index,
            global_index,
            field_index,
            global_at,
            field_at,
        }
    }

    /// The parsed header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// All functions; index 0 is the null function.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// All statements.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// All global definitions.
    #[must_use]
    pub fn global_defs(&self) -> &[Def] {
        &self.global_defs
    }

    /// All field definitions.
    #[must_use]
    pub fn field_defs(&self) -> &[Def] {
        &self.field_defs
    }

    /// Field words per edict.
    #[must_use]
    pub fn entity_fields(&self) -> usize {
        usize::try_from(self.header.entity_fields).unwrap_or(0)
    }

    /// CRC-16 of the raw image.
    #[must_use]
    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// MD5 digest of the raw image.
    #[must_use]
    pub fn digest(&self) -> [u8; 16] {
        self.digest
    }

    /// Looks up a function.
    #[must_use]
    pub fn function(&self, f: FuncRef) -> Option<&Function> {
        self.functions.get(f.index())
    }

    /// Finds a function by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<FuncRef> {
        self.function_index.get(name).copied()
    }

    /// Finds a global definition by name.
    #[must_use]
    pub fn find_global(&self, name: &str) -> Option<&Def> {
        self.global_index.get(name).map(|&i| &self.global_defs[i])
    }

    /// Finds a field definition by name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&Def> {
        self.field_index.get(name).map(|&i| &self.field_defs[i])
    }

    /// The global definition starting at `ofs`, if any.
    #[must_use]
    pub fn global_def_at(&self, ofs: u16) -> Option<&Def> {
        self.global_at.get(&ofs).map(|&i| &self.global_defs[i])
    }

    /// The field definition starting at `ofs`, if any.
    #[must_use]
    pub fn field_def_at(&self, ofs: u16) -> Option<&Def> {
        self.field_at.get(&ofs).map(|&i| &self.field_defs[i])
    }

    /// The function whose statement range contains `statement`.
    #[must_use]
    pub fn function_containing(&self, statement: usize) -> Option<FuncRef> {
        let mut best: Option<(usize, usize)> = None;
        for (i, f) in self.functions.iter().enumerate().skip(1) {
            if let Some(entry) = f.entry() {
                if entry <= statement && best.is_none_or(|(e, _)| entry > e) {
                    best = Some((entry, i));
                }
            }
        }
        best.and_then(|(_, i)| u32::try_from(i).ok()).map(FuncRef)
    }
}

fn index_defs(defs: &[Def]) -> (HashMap<String, usize>, HashMap<u16, usize>) {
    let mut by_name = HashMap::new();
    let mut by_ofs = HashMap::new();
    for (i, def) in defs.iter().enumerate() {
        if !def.name.is_empty() {
            by_name.entry(def.name.clone()).or_insert(i);
        }
        if def.ty != Type::Void {
            by_ofs.entry(def.ofs).or_insert(i);
        }
    }
    (by_name, by_ofs)
}
