//! A loaded program together with the host-side chores around it.
//!
//! [`Session`] is what tools and simple hosts use instead of driving a
//! [`Vm`] directly: it opens images from disk, runs named entry points and
//! edict think functions, renders listings of the program's tables, and
//! saves or restores snapshots.

use std::path::Path;

use tracing::{debug, info};

use qcvm_debug::{disassemble_function, dump_edict};
use qcvm_foundation::{EdictId, Error, ErrorKind, FuncRef, Result};
use qcvm_progs::{ContentSource, DirSource};
use qcvm_vm::{SimState, Vm, VmConfig};

use crate::serialize::{self, Snapshot};

/// A program loaded into an engine.
#[derive(Debug)]
pub struct Session {
    vm: Vm,
    name: String,
}

impl Session {
    /// Opens the image at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not validate.
    pub fn open(path: impl AsRef<Path>, config: VmConfig) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::new(ErrorKind::Io(format!("not a file name: {}", path.display())))
            })?
            .to_string();
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_source(&DirSource::new(root), &name, None, config)
    }

    /// Loads `name` (or `override_name`, when present) from `source`.
    ///
    /// # Errors
    ///
    /// Fails if neither file can be fetched or the image does not validate.
    pub fn from_source(
        source: &dyn ContentSource,
        name: &str,
        override_name: Option<&str>,
        config: VmConfig,
    ) -> Result<Self> {
        let vm = Vm::load(source, name, override_name, config)?;
        Ok(Self::with_vm(vm, name))
    }

    /// Wraps an engine that is already set up.
    #[must_use]
    pub fn with_vm(vm: Vm, name: impl Into<String>) -> Self {
        Self {
            vm,
            name: name.into(),
        }
    }

    /// The image's file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine.
    #[must_use]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// The engine, mutably.
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Unwraps the engine.
    #[must_use]
    pub fn into_vm(self) -> Vm {
        self.vm
    }

    /// Ends the loading phase; from now on edict 0 is read-only.
    pub fn activate(&mut self) {
        self.vm.set_sim_state(SimState::Active);
    }

    /// Runs the function called `name` with `self` and `other` set to the
    /// world.
    ///
    /// # Errors
    ///
    /// Fails if there is no such function or it aborts.
    pub fn run(&mut self, name: &str) -> Result<()> {
        self.vm.set_self(EdictId::WORLD)?;
        self.vm.set_other(EdictId::WORLD)?;
        self.vm.execute_named(name)
    }

    /// Runs `id`'s think function if it has one; returns whether it ran.
    ///
    /// # Errors
    ///
    /// Fails if `id` is out of range or the think function aborts.
    pub fn think(&mut self, id: EdictId) -> Result<bool> {
        let Some(think_at) = self.vm.hot_fields().think else {
            return Ok(false);
        };
        let think = FuncRef::from_word(self.vm.edicts().get(id)?.word(usize::from(think_at))?);
        if think.is_null() {
            return Ok(false);
        }
        self.vm.set_self(id)?;
        self.vm.set_other(EdictId::WORLD)?;
        self.vm.execute(think)?;
        Ok(true)
    }

    /// Advances the clock to `time` and runs every think that is due.
    ///
    /// An edict is due when its `nextthink` is positive and not after
    /// `time`; its `nextthink` is cleared before the think runs. Returns
    /// the number of thinks run.
    ///
    /// # Errors
    ///
    /// Stops at the first think that aborts.
    pub fn run_frame(&mut self, time: f32) -> Result<usize> {
        self.vm.set_time(time)?;
        let Some(next_at) = self.vm.hot_fields().nextthink.map(usize::from) else {
            return Ok(0);
        };

        let due: Vec<EdictId> = self
            .vm
            .edicts()
            .iter_live()
            .filter(|e| {
                e.float(next_at)
                    .is_ok_and(|next| next > 0.0 && next <= time)
            })
            .map(|e| e.id())
            .collect();

        let mut ran = 0;
        for id in due {
            if self.vm.edicts().get(id)?.is_free() {
                continue;
            }
            self.vm.edicts_mut().get_mut(id)?.set_float(next_at, 0.0)?;
            if self.think(id)? {
                ran += 1;
            }
        }
        debug!(time, thinks = ran, "frame run");
        Ok(ran)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// One line per function: number, name, file, and where it starts.
    #[must_use]
    pub fn function_listing(&self) -> Vec<String> {
        self.vm
            .program()
            .functions()
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, func)| match func.builtin_number() {
                Some(n) => {
                    let bound = self
                        .vm
                        .builtins()
                        .name_of(n)
                        .map_or_else(|| "unbound".to_string(), |b| format!("-> {b}"));
                    format!("{i:5} {:<24} builtin #{n} {bound}", func.name)
                }
                None => format!(
                    "{i:5} {:<24} {:<16} statement {} parms {} locals {}",
                    func.name,
                    func.file,
                    func.first_statement,
                    func.parm_count(),
                    func.locals
                ),
            })
            .collect()
    }

    /// One line per global definition with its current value.
    #[must_use]
    pub fn global_listing(&self) -> Vec<String> {
        let view = self.vm.view();
        self.vm
            .program()
            .global_defs()
            .iter()
            .filter(|def| !def.name.is_empty() && def.name != "IMMEDIATE")
            .map(|def| {
                let words = self
                    .vm
                    .globals()
                    .slice(usize::from(def.ofs), def.ty.size())
                    .unwrap_or(&[]);
                let save = if def.save { " save" } else { "" };
                format!(
                    "{:5} {:<8} {:<24} {}{save}",
                    def.ofs,
                    def.ty.to_string(),
                    def.name,
                    view.value_string(def.ty, words)
                )
            })
            .collect()
    }

    /// One line per field definition.
    #[must_use]
    pub fn field_listing(&self) -> Vec<String> {
        self.vm
            .program()
            .field_defs()
            .iter()
            .filter(|def| !def.name.is_empty())
            .map(|def| format!("{:5} {:<8} .{}", def.ofs, def.ty.to_string(), def.name))
            .collect()
    }

    /// Disassembly of the function called `name`.
    ///
    /// # Errors
    ///
    /// Fails if there is no such function.
    pub fn disassemble(&self, name: &str) -> Result<Vec<String>> {
        let f = self
            .vm
            .find_function(name)
            .ok_or_else(|| Error::new(ErrorKind::MissingSymbol(name.to_string())))?;
        Ok(disassemble_function(&self.vm.view(), f))
    }

    /// Dumps of every live edict.
    #[must_use]
    pub fn edict_dump(&self) -> Vec<String> {
        let view = self.vm.view();
        self.vm
            .edicts()
            .iter_live()
            .map(|e| dump_edict(&view, &e))
            .collect()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Copies out the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.vm)
    }

    /// Restores a snapshot taken from the same image.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot belongs to another image.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.apply(&mut self.vm)
    }

    /// Saves the current state to `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        serialize::save_to_file(&self.snapshot(), path.as_ref())?;
        info!(path = %path.as_ref().display(), "snapshot saved");
        Ok(())
    }

    /// Restores state saved by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or belongs to another image.
    pub fn load_snapshot(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = serialize::load_from_file(path)?;
        self.restore(&snapshot)
    }
}
