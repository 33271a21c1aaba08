//! Native functions callable from program code.
//!
//! A [`BuiltinRegistry`] names every native implementation the engine (and
//! its host) provides, each with a default number. When an image is loaded
//! the registry is resolved against the program into a [`BuiltinTable`],
//! which is what `CALL` dispatch consults:
//!
//! 1. in [`BuiltinNumbering::Remap`] mode, every builtin the program
//!    declares by a known name is placed at the number the program uses;
//! 2. every registered builtin not yet placed takes its default number if
//!    that slot is still free.
//!
//! Slots left empty behave as harmless no-ops.
//!
//! Builtins take their arguments from the parameter globals and leave their
//! result in the return global; see the `arg_*` and `return_*` helpers on
//! [`Vm`].

mod console;
mod edicts;
mod math;
mod strings;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use qcvm_foundation::{Error, ErrorKind, Result};
use qcvm_progs::Program;
use tracing::debug;

use crate::config::BuiltinNumbering;
use crate::vm::Vm;

/// Signature shared by every builtin.
pub type BuiltinFn = Rc<dyn Fn(&mut Vm) -> Result<()>>;

/// A named native function.
#[derive(Clone)]
pub struct Builtin {
    /// Name programs declare it under.
    pub name: String,
    /// Compiled-in number.
    pub number: u32,
    /// Implementation.
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

/// Every native function available to programs, by name.
#[derive(Clone, Debug, Default)]
pub struct BuiltinRegistry {
    builtins: Vec<Builtin>,
    by_name: HashMap<String, usize>,
    extensions: Vec<String>,
}

impl BuiltinRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the engine's core builtins.
    #[must_use]
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        math::register(&mut registry);
        strings::register(&mut registry);
        edicts::register(&mut registry);
        console::register(&mut registry);
        registry.add_extension("DP_QC_SINCOSSQRTPOW");
        registry
    }

    /// Registers a builtin, replacing any earlier one with the same name.
    pub fn register(
        &mut self,
        name: &str,
        number: u32,
        func: impl Fn(&mut Vm) -> Result<()> + 'static,
    ) -> &mut Self {
        let builtin = Builtin {
            name: name.to_string(),
            number,
            func: Rc::new(func),
        };
        match self.by_name.get(name) {
            Some(&i) => self.builtins[i] = builtin,
            None => {
                self.by_name.insert(name.to_string(), self.builtins.len());
                self.builtins.push(builtin);
            }
        }
        self
    }

    /// Advertises an extension to `checkextension`.
    pub fn add_extension(&mut self, name: &str) -> &mut Self {
        if !self.supports_extension(name) {
            self.extensions.push(name.to_string());
        }
        self
    }

    /// True if `name` has been advertised.
    #[must_use]
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(name))
    }

    /// Advertised extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Looks up a builtin by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.by_name.get(name).map(|&i| &self.builtins[i])
    }

    /// Number of registered builtins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }

    /// Registered builtins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.builtins.iter()
    }
}

/// Builtin numbers resolved for one loaded program.
#[derive(Clone, Debug, Default)]
pub struct BuiltinTable {
    slots: Vec<Option<Builtin>>,
    numbering: BuiltinNumbering,
}

impl BuiltinTable {
    /// Resolves `registry` against `program` into a table of `size` slots.
    #[must_use]
    pub fn build(
        registry: &BuiltinRegistry,
        program: &Program,
        numbering: BuiltinNumbering,
        size: usize,
    ) -> Self {
        let mut slots: Vec<Option<Builtin>> = vec![None; size];
        let mut placed = HashSet::new();

        if numbering == BuiltinNumbering::Remap {
            for func in program.functions() {
                let Some(number) = func.builtin_number() else {
                    continue;
                };
                let Some(builtin) = registry.get(&func.name) else {
                    continue;
                };
                let Some(slot) = slots.get_mut(number as usize) else {
                    debug!(name = %func.name, number, "builtin number outside table");
                    continue;
                };
                if number != builtin.number {
                    debug!(
                        name = %func.name,
                        from = builtin.number,
                        to = number,
                        "builtin remapped"
                    );
                }
                *slot = Some(builtin.clone());
                placed.insert(builtin.name.as_str());
            }
        }

        for builtin in registry.iter() {
            if builtin.number == 0 || placed.contains(builtin.name.as_str()) {
                continue;
            }
            if let Some(slot) = slots.get_mut(builtin.number as usize) {
                if slot.is_none() {
                    *slot = Some(builtin.clone());
                }
            }
        }

        let table = Self { slots, numbering };
        debug!(
            assigned = table.assigned(),
            size = table.len(),
            ?numbering,
            "builtin table built"
        );
        table
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding an implementation.
    #[must_use]
    pub fn assigned(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Mode the table was built in.
    #[must_use]
    pub fn numbering(&self) -> BuiltinNumbering {
        self.numbering
    }

    /// Implementation at `number`; `Ok(None)` for an empty slot.
    pub fn lookup(&self, number: u32) -> Result<Option<&Builtin>> {
        self.slots
            .get(number as usize)
            .map(Option::as_ref)
            .ok_or_else(|| Error::new(ErrorKind::BadBuiltin { number }))
    }

    /// Number currently assigned to the builtin called `name`.
    #[must_use]
    pub fn number_of(&self, name: &str) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|b| b.name == name))
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Name of the builtin at `number`.
    #[must_use]
    pub fn name_of(&self, number: u32) -> Option<&str> {
        self.slots
            .get(number as usize)
            .and_then(Option::as_ref)
            .map(|b| b.name.as_str())
    }
}
