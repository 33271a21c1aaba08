//! Error types for qcvm.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//!
//! Errors fall into three tiers (see [`ErrorTier`]). Load and execution
//! errors are never recovered inside the engine: they travel to the host as
//! a single value, carrying the abort diagnostics in [`ErrorContext`].

use std::fmt;

use thiserror::Error;

/// The main error type for qcvm operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Diagnostics captured when the error aborted execution.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a malformed-image error.
    #[must_use]
    pub fn malformed(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed(what.into()))
    }

    /// Creates a bad global offset error.
    #[must_use]
    pub fn bad_global(offset: usize, len: usize) -> Self {
        Self::new(ErrorKind::BadGlobal { offset, len })
    }

    /// Creates a bad edict error.
    #[must_use]
    pub fn bad_edict(index: u32, count: usize) -> Self {
        Self::new(ErrorKind::BadEdict { index, count })
    }

    /// Creates a program-raised error (the `error` builtin and friends).
    #[must_use]
    pub fn program(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProgramError(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns the tier of this error.
    #[must_use]
    pub fn tier(&self) -> ErrorTier {
        self.kind.tier()
    }

    /// Returns true once abort diagnostics have been attached.
    #[must_use]
    pub fn is_reported(&self) -> bool {
        self.context.is_some()
    }
}

/// Error severity tiers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorTier {
    /// The image cannot be used; `execute` must not be called.
    Load,
    /// The running program was aborted; the engine is reset and reusable.
    Execution,
    /// Failure in a host-side facility (files, snapshots).
    Host,
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The image was built for a different program ABI.
    #[error("wrong version number: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version the engine understands.
        expected: i32,
        /// Version stored in the image.
        found: i32,
    },

    /// The header checksum does not match the well-known layout.
    #[error("system vars have been modified (header crc {found}, expected {expected})")]
    HeaderCorrupt {
        /// Checksum the engine was built against.
        expected: i32,
        /// Checksum stored in the image.
        found: i32,
    },

    /// A table extends past the end of the image.
    #[error("image truncated: {what} needs bytes {start}..{end} but image is {len} bytes")]
    Truncated {
        /// Which table.
        what: &'static str,
        /// First byte required.
        start: usize,
        /// One past the last byte required.
        end: usize,
        /// Actual image length.
        len: usize,
    },

    /// Structurally invalid image content.
    #[error("malformed program: {0}")]
    Malformed(String),

    /// Unknown opcode.
    #[error("bad opcode {opcode} at statement {statement}")]
    BadOpcode {
        /// The raw opcode.
        opcode: u16,
        /// Statement index.
        statement: usize,
    },

    /// Branch target outside the statement array.
    #[error("branch at statement {statement} targets {target}, outside 0..{count}")]
    BadBranch {
        /// Statement index of the branch.
        statement: usize,
        /// Computed target.
        target: i64,
        /// Number of statements.
        count: usize,
    },

    /// A required symbol is absent from the image.
    #[error("missing required symbol: {0}")]
    MissingSymbol(String),

    /// Call through the null function.
    #[error("NULL function")]
    NullFunctionCall,

    /// Function number past the end of the function table.
    #[error("function {index} out of range (program has {count})")]
    FunctionIndexOutOfRange {
        /// Requested function.
        index: u32,
        /// Function count.
        count: usize,
    },

    /// Call stack depth limit reached.
    #[error("stack overflow (depth limit {limit})")]
    StackOverflow {
        /// Configured depth limit.
        limit: usize,
    },

    /// Return with no frame to pop.
    #[error("prog stack underflow")]
    StackUnderflow,

    /// Local-save stack capacity exceeded.
    #[error("locals stack overflow ({requested} words requested, {used}/{capacity} in use)")]
    LocalStackOverflow {
        /// Words the callee needs saved.
        requested: usize,
        /// Words already saved.
        used: usize,
        /// Capacity in words.
        capacity: usize,
    },

    /// Restore asked for more words than were saved.
    #[error("locals stack underflow")]
    LocalStackUnderflow,

    /// Builtin number outside the builtin table.
    #[error("bad builtin call number {number}")]
    BadBuiltin {
        /// Builtin number.
        number: u32,
    },

    /// Write through a reference to edict 0 while the world is active.
    #[error("assignment to world entity")]
    WorldWriteViolation,

    /// The statement budget of one `execute` was exhausted.
    #[error("runaway loop error (budget {budget} statements)")]
    RunawayLoop {
        /// Budget that was exhausted.
        budget: u32,
    },

    /// Global offset outside the global block.
    #[error("global offset {offset} outside block of {len} words")]
    BadGlobal {
        /// Offset requested.
        offset: usize,
        /// Block length.
        len: usize,
    },

    /// Field offset outside the edict field block.
    #[error("field offset {offset} outside {len} field words")]
    BadField {
        /// Offset requested.
        offset: u32,
        /// Field words per edict.
        len: usize,
    },

    /// Edict reference past the end of the store.
    #[error("edict {index} out of range (store has {count})")]
    BadEdict {
        /// Requested edict.
        index: u32,
        /// Edict count.
        count: usize,
    },

    /// Pointer that does not decode to an edict field.
    #[error("bad pointer {0}")]
    BadPointer(u32),

    /// String reference outside the string table.
    #[error("bad string reference {0}")]
    BadString(i32),

    /// The dynamic string region is full.
    #[error("string table full ({capacity} bytes)")]
    StringTableFull {
        /// Capacity of the dynamic region.
        capacity: usize,
    },

    /// Every edict slot is in use.
    #[error("no free edicts (limit {limit})")]
    NoFreeEdicts {
        /// Maximum edicts.
        limit: usize,
    },

    /// Error raised by program code through a builtin.
    #[error("program error: {0}")]
    ProgramError(String),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// Snapshot encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Returns the tier this kind belongs to.
    #[must_use]
    pub fn tier(&self) -> ErrorTier {
        match self {
            Self::VersionMismatch { .. }
            | Self::HeaderCorrupt { .. }
            | Self::Truncated { .. }
            | Self::Malformed(_)
            | Self::BadOpcode { .. }
            | Self::BadBranch { .. }
            | Self::MissingSymbol(_) => ErrorTier::Load,
            Self::Io(_) | Self::Serialization(_) => ErrorTier::Host,
            _ => ErrorTier::Execution,
        }
    }
}

/// Diagnostics captured at the abort point.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The offending statement, disassembled.
    pub statement: Option<String>,
    /// Call stack, innermost frame first.
    pub stack: Vec<String>,
    /// Dump of the edict most relevant to the failure (usually `self`).
    pub edict: Option<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the disassembled statement.
    #[must_use]
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }

    /// Attaches an edict dump.
    #[must_use]
    pub fn with_edict(mut self, dump: impl Into<String>) -> Self {
        self.edict = Some(dump.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        if self.stack.is_empty() {
            writeln!(f, "<NO STACK>")?;
        } else {
            for frame in &self.stack {
                writeln!(f, "  {frame}")?;
            }
        }
        if let Some(edict) = &self.edict {
            write!(f, "{edict}")?;
        }
        Ok(())
    }
}
