//! Instruction set of the progs virtual machine.
//!
//! Every statement carries an opcode and three 16-bit operands. Operands are
//! word offsets into the global block, except for branch displacements,
//! which are signed statement counts relative to the branching statement.

#![allow(clippy::doc_markdown)]

use std::fmt;

/// A single opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Return from the function, result in `a`.
    Done = 0,
    /// `c = a * b`
    MulF,
    /// `c = a . b` (dot product)
    MulV,
    /// `c = a * b` (float times vector)
    MulFV,
    /// `c = a * b` (vector times float)
    MulVF,
    /// `c = a / b`
    DivF,
    /// `c = a + b`
    AddF,
    /// `c = a + b` (vectors)
    AddV,
    /// `c = a - b`
    SubF,
    /// `c = a - b` (vectors)
    SubV,

    /// `c = a == b` (floats)
    EqF,
    /// `c = a == b` (vectors)
    EqV,
    /// `c = a == b` (strings)
    EqS,
    /// `c = a == b` (entities)
    EqE,
    /// `c = a == b` (functions)
    EqFnc,
    /// `c = a != b` (floats)
    NeF,
    /// `c = a != b` (vectors)
    NeV,
    /// `c = a != b` (strings)
    NeS,
    /// `c = a != b` (entities)
    NeE,
    /// `c = a != b` (functions)
    NeFnc,

    /// `c = a <= b`
    Le,
    /// `c = a >= b`
    Ge,
    /// `c = a < b`
    Lt,
    /// `c = a > b`
    Gt,

    /// `c = a.b` (float field)
    LoadF,
    /// `c = a.b` (vector field)
    LoadV,
    /// `c = a.b` (string field)
    LoadS,
    /// `c = a.b` (entity field)
    LoadEnt,
    /// `c = a.b` (field field)
    LoadFld,
    /// `c = a.b` (function field)
    LoadFnc,

    /// `c = &a.b`
    Address,

    /// `b = a` (float)
    StoreF,
    /// `b = a` (vector)
    StoreV,
    /// `b = a` (string)
    StoreS,
    /// `b = a` (entity)
    StoreEnt,
    /// `b = a` (field)
    StoreFld,
    /// `b = a` (function)
    StoreFnc,

    /// `*b = a` (float)
    StorePF,
    /// `*b = a` (vector)
    StorePV,
    /// `*b = a` (string)
    StorePS,
    /// `*b = a` (entity)
    StorePEnt,
    /// `*b = a` (field)
    StorePFld,
    /// `*b = a` (function)
    StorePFnc,

    /// Return from the function, result in `a`.
    Return,
    /// `c = !a` (float)
    NotF,
    /// `c = !a` (vector)
    NotV,
    /// `c = !a` (string)
    NotS,
    /// `c = !a` (entity)
    NotEnt,
    /// `c = !a` (function)
    NotFnc,
    /// Branch by `b` if `a` is true.
    If,
    /// Branch by `b` if `a` is false.
    IfNot,
    /// Call `a` with no arguments.
    Call0,
    /// Call `a` with one argument.
    Call1,
    /// Call `a` with two arguments.
    Call2,
    /// Call `a` with three arguments.
    Call3,
    /// Call `a` with four arguments.
    Call4,
    /// Call `a` with five arguments.
    Call5,
    /// Call `a` with six arguments.
    Call6,
    /// Call `a` with seven arguments.
    Call7,
    /// Call `a` with eight arguments.
    Call8,
    /// `self.frame = a; self.think = b; self.nextthink = time + 0.1`
    State,
    /// Branch by `a`.
    Goto,
    /// `c = a && b`
    And,
    /// `c = a || b`
    Or,
    /// `c = a & b` (as integers)
    BitAnd,
    /// `c = a | b` (as integers)
    BitOr,
}

/// How a statement uses one of its operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Ignored.
    Unused,
    /// Global offset covering this many words.
    Global(u8),
    /// Signed statement displacement.
    Branch,
}

const G: Operand = Operand::Global(1);
const V: Operand = Operand::Global(3);
const B: Operand = Operand::Branch;
const U: Operand = Operand::Unused;

impl Opcode {
    /// Number of opcodes.
    pub const COUNT: u16 = 66;

    const ALL: [Opcode; Self::COUNT as usize] = [
        Self::Done,
        Self::MulF,
        Self::MulV,
        Self::MulFV,
        Self::MulVF,
        Self::DivF,
        Self::AddF,
        Self::AddV,
        Self::SubF,
        Self::SubV,
        Self::EqF,
        Self::EqV,
        Self::EqS,
        Self::EqE,
        Self::EqFnc,
        Self::NeF,
        Self::NeV,
        Self::NeS,
        Self::NeE,
        Self::NeFnc,
        Self::Le,
        Self::Ge,
        Self::Lt,
        Self::Gt,
        Self::LoadF,
        Self::LoadV,
        Self::LoadS,
        Self::LoadEnt,
        Self::LoadFld,
        Self::LoadFnc,
        Self::Address,
        Self::StoreF,
        Self::StoreV,
        Self::StoreS,
        Self::StoreEnt,
        Self::StoreFld,
        Self::StoreFnc,
        Self::StorePF,
        Self::StorePV,
        Self::StorePS,
        Self::StorePEnt,
        Self::StorePFld,
        Self::StorePFnc,
        Self::Return,
        Self::NotF,
        Self::NotV,
        Self::NotS,
        Self::NotEnt,
        Self::NotFnc,
        Self::If,
        Self::IfNot,
        Self::Call0,
        Self::Call1,
        Self::Call2,
        Self::Call3,
        Self::Call4,
        Self::Call5,
        Self::Call6,
        Self::Call7,
        Self::Call8,
        Self::State,
        Self::Goto,
        Self::And,
        Self::Or,
        Self::BitAnd,
        Self::BitOr,
    ];

    /// Decodes a raw opcode number.
    #[must_use]
    pub fn from_u16(raw: u16) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Returns the raw opcode number.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Mnemonic used in disassembly.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Done => "DONE",
            Self::MulF => "MUL_F",
            Self::MulV => "MUL_V",
            Self::MulFV => "MUL_FV",
            Self::MulVF => "MUL_VF",
            Self::DivF => "DIV",
            Self::AddF => "ADD_F",
            Self::AddV => "ADD_V",
            Self::SubF => "SUB_F",
            Self::SubV => "SUB_V",
            Self::EqF => "EQ_F",
            Self::EqV => "EQ_V",
            Self::EqS => "EQ_S",
            Self::EqE => "EQ_E",
            Self::EqFnc => "EQ_FNC",
            Self::NeF => "NE_F",
            Self::NeV => "NE_V",
            Self::NeS => "NE_S",
            Self::NeE => "NE_E",
            Self::NeFnc => "NE_FNC",
            Self::Le => "LE",
            Self::Ge => "GE",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::LoadF => "INDIRECT",
            Self::LoadV => "INDIRECT_V",
            Self::LoadS => "INDIRECT_S",
            Self::LoadEnt => "INDIRECT_E",
            Self::LoadFld => "INDIRECT_FI",
            Self::LoadFnc => "INDIRECT_FU",
            Self::Address => "ADDRESS",
            Self::StoreF => "STORE_F",
            Self::StoreV => "STORE_V",
            Self::StoreS => "STORE_S",
            Self::StoreEnt => "STORE_ENT",
            Self::StoreFld => "STORE_FLD",
            Self::StoreFnc => "STORE_FNC",
            Self::StorePF => "STOREP_F",
            Self::StorePV => "STOREP_V",
            Self::StorePS => "STOREP_S",
            Self::StorePEnt => "STOREP_ENT",
            Self::StorePFld => "STOREP_FLD",
            Self::StorePFnc => "STOREP_FNC",
            Self::Return => "RETURN",
            Self::NotF => "NOT_F",
            Self::NotV => "NOT_V",
            Self::NotS => "NOT_S",
            Self::NotEnt => "NOT_ENT",
            Self::NotFnc => "NOT_FNC",
            Self::If => "IF",
            Self::IfNot => "IFNOT",
            Self::Call0 => "CALL0",
            Self::Call1 => "CALL1",
            Self::Call2 => "CALL2",
            Self::Call3 => "CALL3",
            Self::Call4 => "CALL4",
            Self::Call5 => "CALL5",
            Self::Call6 => "CALL6",
            Self::Call7 => "CALL7",
            Self::Call8 => "CALL8",
            Self::State => "STATE",
            Self::Goto => "GOTO",
            Self::And => "AND",
            Self::Or => "OR",
            Self::BitAnd => "BITAND",
            Self::BitOr => "BITOR",
        }
    }

    /// Returns how operands `a`, `b`, and `c` are used.
    #[must_use]
    pub const fn operands(self) -> [Operand; 3] {
        match self {
            Self::Done | Self::Return => [G, U, U],
            Self::MulF
            | Self::DivF
            | Self::AddF
            | Self::SubF
            | Self::EqF
            | Self::EqS
            | Self::EqE
            | Self::EqFnc
            | Self::NeF
            | Self::NeS
            | Self::NeE
            | Self::NeFnc
            | Self::Le
            | Self::Ge
            | Self::Lt
            | Self::Gt
            | Self::And
            | Self::Or
            | Self::BitAnd
            | Self::BitOr
            | Self::Address
            | Self::LoadF
            | Self::LoadS
            | Self::LoadEnt
            | Self::LoadFld
            | Self::LoadFnc => [G, G, G],
            Self::MulV | Self::EqV | Self::NeV => [V, V, G],
            Self::MulFV => [G, V, V],
            Self::MulVF => [V, G, V],
            Self::AddV | Self::SubV => [V, V, V],
            Self::LoadV => [G, G, V],
            Self::StoreF
            | Self::StoreS
            | Self::StoreEnt
            | Self::StoreFld
            | Self::StoreFnc
            | Self::StorePF
            | Self::StorePS
            | Self::StorePEnt
            | Self::StorePFld
            | Self::StorePFnc
            | Self::State => [G, G, U],
            Self::StoreV => [V, V, U],
            Self::StorePV => [V, G, U],
            Self::NotF | Self::NotS | Self::NotEnt | Self::NotFnc => [G, U, G],
            Self::NotV => [V, U, G],
            Self::If | Self::IfNot => [G, B, U],
            Self::Call0
            | Self::Call1
            | Self::Call2
            | Self::Call3
            | Self::Call4
            | Self::Call5
            | Self::Call6
            | Self::Call7
            | Self::Call8 => [G, U, U],
            Self::Goto => [B, U, U],
        }
    }

    /// Argument count for `CALL0`..`CALL8`.
    #[must_use]
    pub const fn call_argc(self) -> Option<usize> {
        let raw = self as u16;
        if raw >= Self::Call0 as u16 && raw <= Self::Call8 as u16 {
            Some((raw - Self::Call0 as u16) as usize)
        } else {
            None
        }
    }

    /// Returns the call opcode for `argc` arguments.
    #[must_use]
    pub fn call(argc: usize) -> Option<Self> {
        if argc > 8 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        Self::from_u16(Self::Call0 as u16 + argc as u16)
    }

    /// True for opcodes that leave the current function.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(self, Self::Done | Self::Return)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// The opcode.
    pub op: Opcode,
    /// First operand.
    pub a: i16,
    /// Second operand.
    pub b: i16,
    /// Third operand.
    pub c: i16,
}

impl Statement {
    /// Creates a statement.
    #[must_use]
    pub const fn new(op: Opcode, a: i16, b: i16, c: i16) -> Self {
        Self { op, a, b, c }
    }

    /// Operand `a` as a global offset.
    #[must_use]
    pub const fn ga(&self) -> usize {
        self.a as u16 as usize
    }

    /// Operand `b` as a global offset.
    #[must_use]
    pub const fn gb(&self) -> usize {
        self.b as u16 as usize
    }

    /// Operand `c` as a global offset.
    #[must_use]
    pub const fn gc(&self) -> usize {
        self.c as u16 as usize
    }

    /// Operands in order.
    #[must_use]
    pub const fn raw_operands(&self) -> [i16; 3] {
        [self.a, self.b, self.c]
    }

    /// Branch target of this statement, if it branches.
    ///
    /// The displacement is relative to the branching statement itself.
    #[must_use]
    pub fn branch_target(&self, index: usize) -> Option<i64> {
        let disp = match self.op {
            Opcode::Goto => self.a,
            Opcode::If | Opcode::IfNot => self.b,
            _ => return None,
        };
        #[allow(clippy::cast_possible_wrap)]
        Some(index as i64 + i64::from(disp))
    }
}
