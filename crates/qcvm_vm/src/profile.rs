//! Per-function execution counters.

use qcvm_foundation::FuncRef;
use qcvm_progs::Program;

/// Counters for one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileEntry {
    /// The function.
    pub function: FuncRef,
    /// Its name.
    pub name: String,
    /// Statements executed while it was the innermost function.
    pub statements: u64,
    /// Times it was entered (or dispatched, for builtins).
    pub calls: u64,
}

/// Statement and call counts indexed by function number.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    statements: Vec<u64>,
    calls: Vec<u64>,
}

impl Profile {
    /// Creates counters for `functions` functions.
    #[must_use]
    pub fn new(functions: usize) -> Self {
        Self {
            statements: vec![0; functions],
            calls: vec![0; functions],
        }
    }

    pub(crate) fn statement(&mut self, f: FuncRef) {
        if let Some(n) = self.statements.get_mut(f.index()) {
            *n += 1;
        }
    }

    pub(crate) fn call(&mut self, f: FuncRef) {
        if let Some(n) = self.calls.get_mut(f.index()) {
            *n += 1;
        }
    }

    /// Total statements counted.
    #[must_use]
    pub fn total_statements(&self) -> u64 {
        self.statements.iter().sum()
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        self.statements.fill(0);
        self.calls.fill(0);
    }

    /// The `top_n` functions by statements executed, busiest first.
    ///
    /// Functions that never ran are left out.
    #[must_use]
    pub fn top(&self, program: &Program, top_n: usize) -> Vec<ProfileEntry> {
        let mut entries: Vec<ProfileEntry> = program
            .functions()
            .iter()
            .enumerate()
            .filter_map(|(i, func)| {
                let statements = self.statements.get(i).copied().unwrap_or(0);
                let calls = self.calls.get(i).copied().unwrap_or(0);
                if statements == 0 && calls == 0 {
                    return None;
                }
                Some(ProfileEntry {
                    function: FuncRef(u32::try_from(i).ok()?),
                    name: func.name.clone(),
                    statements,
                    calls,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            b.statements
                .cmp(&a.statements)
                .then(b.calls.cmp(&a.calls))
                .then(a.function.cmp(&b.function))
        });
        entries.truncate(top_n);
        entries
    }
}
