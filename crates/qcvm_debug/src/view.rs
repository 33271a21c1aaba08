//! Rendering values with names resolved against a loaded program.

use qcvm_foundation::{Type, Value, Word};
use qcvm_progs::{GlobalBlock, Program, StringTable};

/// Width operands are padded to in disassembly.
const OPERAND_WIDTH: usize = 20;

/// Borrowed view of the program state diagnostics read from.
#[derive(Copy, Clone, Debug)]
pub struct ProgramView<'a> {
    /// Program tables.
    pub program: &'a Program,
    /// String table.
    pub strings: &'a StringTable,
    /// Global block.
    pub globals: &'a GlobalBlock,
}

impl<'a> ProgramView<'a> {
    /// Creates a view.
    #[must_use]
    pub fn new(program: &'a Program, strings: &'a StringTable, globals: &'a GlobalBlock) -> Self {
        Self {
            program,
            strings,
            globals,
        }
    }

    /// Renders a typed value the way program authors expect to read it.
    #[must_use]
    pub fn value_string(&self, ty: Type, words: &[Word]) -> String {
        match Value::read(ty, words) {
            Value::Void => "void".to_string(),
            Value::String(s) => match self.strings.get_str(s) {
                Ok(text) => text.into_owned(),
                Err(_) => format!("<bad string {}>", s.0),
            },
            Value::Float(f) => format!("{f:5.1}"),
            Value::Vector(v) => format!("'{:5.1} {:5.1} {:5.1}'", v[0], v[1], v[2]),
            Value::Entity(e) => format!("entity {}", e.0),
            Value::Function(f) => match self.program.function(f) {
                Some(func) => format!("{}()", func.name),
                None => format!("<bad function {}>", f.0),
            },
            Value::Field(ofs) => match u16::try_from(ofs)
                .ok()
                .and_then(|o| self.program.field_def_at(o))
            {
                Some(def) => format!(".{}", def.name),
                None => format!(".<{ofs}>"),
            },
            Value::Pointer(p) => format!("pointer {p}"),
        }
    }

    /// Renders global `ofs` as `ofs(name)value`, padded for disassembly.
    #[must_use]
    pub fn global_string(&self, ofs: u16) -> String {
        let mut s = match self.program.global_def_at(ofs) {
            Some(def) => {
                let words = self
                    .globals
                    .slice(usize::from(ofs), def.ty.size())
                    .unwrap_or(&[]);
                format!("{ofs}({}){}", def.name, self.value_string(def.ty, words))
            }
            None => format!("{ofs}(???)"),
        };
        pad(&mut s);
        s
    }

    /// Renders global `ofs` as `ofs(name)`, padded for disassembly.
    #[must_use]
    pub fn global_name(&self, ofs: u16) -> String {
        let mut s = match self.program.global_def_at(ofs) {
            Some(def) => format!("{ofs}({})", def.name),
            None => format!("{ofs}(???)"),
        };
        pad(&mut s);
        s
    }
}

fn pad(s: &mut String) {
    while s.len() < OPERAND_WIDTH {
        s.push(' ');
    }
    s.push(' ');
}
