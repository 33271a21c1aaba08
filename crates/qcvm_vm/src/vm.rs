//! The bytecode interpreter.
//!
//! A [`Vm`] owns everything one loaded program needs: the program tables,
//! string table, global block, edict store, both stacks, and the resolved
//! builtin table. Hosts drive it with [`Vm::execute`], which runs a
//! function to completion or aborts it; there is no suspended state.
//!
//! # Calling convention
//!
//! Parameters and locals of a function occupy a fixed range of the global
//! block. On entry the current contents of that range are pushed onto the
//! local-save stack and the arguments are copied in from the parameter
//! globals; on return the saved words are popped back. Results travel
//! through the return global.
//!
//! # Re-entrancy
//!
//! Builtins receive `&mut Vm` and may call [`Vm::execute`] themselves. The
//! nested run ends when the call stack unwinds to the depth it started at.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]
#![allow(clippy::too_many_lines)]


use std::rc::Rc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info, trace, warn};

use qcvm_debug::{AbortReport, ProgramView, StackFrame, disassemble};
use qcvm_foundation::{
    EdictId, Error, ErrorKind, FuncRef, Result, StringRef, Type, Value, Vec3, Word,
};
use qcvm_progs::{
    ContentSource, FieldCache, Function, GlobalBlock, HotFields, Opcode, Program, ProgramImage,
    Statement, StringTable, hex, ofs,
};
use qcvm_storage::{EdictStore, FieldPointer};

use crate::builtins::{BuiltinRegistry, BuiltinTable};
use crate::config::VmConfig;
use crate::host::{Host, NoHost};
use crate::profile::{Profile, ProfileEntry};
use crate::stack::{CallStack, Frame, LocalStack};

/// What the engine is doing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecState {
    /// No function is running.
    Idle,
    /// A function is being interpreted.
    Running,
    /// The last run failed; the engine is reset and may be used again.
    Aborted,
}

/// Phase of the hosted simulation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SimState {
    /// The world is being spawned; programs may write to edict 0.
    #[default]
    Loading,
    /// The world is running; edict 0 is read-only to programs.
    Active,
}

/// A loaded program and its interpreter.
pub struct Vm {
    config: VmConfig,
    program: Program,
    strings: StringTable,
    globals: GlobalBlock,
    edicts: EdictStore,
    hot: HotFields,
    field_cache: FieldCache,
    registry: BuiltinRegistry,
    builtins: BuiltinTable,
    stack: CallStack,
    locals: LocalStack,
    host: Box<dyn Host>,
    state: ExecState,
    sim: SimState,
    legacy: bool,
    xfunction: FuncRef,
    statement: usize,
    argc: usize,
    trace: bool,
    profile: Profile,
    pub(crate) rng: ChaCha8Rng,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("state", &self.state)
            .field("sim", &self.sim)
            .field("depth", &self.stack.depth())
            .field("functions", &self.program.functions().len())
            .field("edicts", &self.edicts.num_edicts())
            .finish_non_exhaustive()
    }
}

impl Vm {
    /// Creates an engine for `image` with the core builtins.
    #[must_use]
    pub fn new(image: ProgramImage, config: VmConfig) -> Self {
        Self::with_registry(image, config, BuiltinRegistry::with_core())
    }

    /// Creates an engine for `image` with a custom builtin registry.
    #[must_use]
    pub fn with_registry(image: ProgramImage, config: VmConfig, registry: BuiltinRegistry) -> Self {
        let (program, strings, globals) = image.into_parts();
        let edicts = EdictStore::new(program.entity_fields(), config.store_config());
        let builtins = BuiltinTable::build(
            &registry,
            &program,
            config.builtin_numbering,
            config.max_builtins,
        );
        let profile = Profile::new(program.functions().len());
        let mut vm = Self {
            stack: CallStack::new(config.max_stack_depth),
            locals: LocalStack::new(config.local_stack_size),
            trace: config.trace,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            hot: HotFields::default(),
            field_cache: FieldCache::new(),
            host: Box::new(NoHost),
            state: ExecState::Idle,
            sim: SimState::Loading,
            legacy: false,
            xfunction: FuncRef::NULL,
            statement: 0,
            argc: 0,
            config,
            program,
            strings,
            globals,
            edicts,
            registry,
            builtins,
            profile,
        };
        vm.install();
        vm
    }

    /// Fetches, validates, and loads a program.
    ///
    /// `override_name` is tried first; when the source has no such file
    /// the loader falls back to `name`.
    pub fn load(
        source: &dyn ContentSource,
        name: &str,
        override_name: Option<&str>,
        config: VmConfig,
    ) -> Result<Self> {
        let image = ProgramImage::load(source, name, override_name, &config.load_options())?;
        Ok(Self::new(image, config))
    }

    /// Swaps in a new program, discarding all edicts and runtime state.
    ///
    /// Fails if called while a function is running.
    pub fn replace_program(&mut self, image: ProgramImage) -> Result<()> {
        if self.state == ExecState::Running {
            return Err(Error::internal("cannot replace the program while executing"));
        }
        let (program, strings, globals) = image.into_parts();
        self.edicts = EdictStore::new(program.entity_fields(), self.config.store_config());
        self.builtins = BuiltinTable::build(
            &self.registry,
            &program,
            self.config.builtin_numbering,
            self.config.max_builtins,
        );
        self.profile = Profile::new(program.functions().len());
        self.program = program;
        self.strings = strings;
        self.globals = globals;
        self.stack.clear();
        self.locals.clear();
        self.state = ExecState::Idle;
        self.sim = SimState::Loading;
        self.xfunction = FuncRef::NULL;
        self.statement = 0;
        self.argc = 0;
        self.install();
        Ok(())
    }

    /// Per-image setup shared by construction and replacement.
    fn install(&mut self) {
        self.field_cache.clear();
        self.hot = HotFields::resolve(&self.program);
        let digest = self.program.digest();
        self.legacy = self.config.legacy_digests.contains(&digest);

        for (global, builtin) in [
            ("EXT_CHECKEXTENSION", "checkextension"),
            ("EXT_BUILTIN_FIND", "builtin_find"),
        ] {
            let Some(def) = self.program.find_global(global) else {
                continue;
            };
            if def.ty != Type::Float {
                continue;
            }
            let number = self.builtins.number_of(builtin).unwrap_or(0);
            if let Err(err) = self.globals.set_float(usize::from(def.ofs), number as f32) {
                warn!(global, %err, "could not publish builtin number");
            }
        }

        info!(
            crc = self.program.crc(),
            digest = %hex(&digest),
            edict_size = self.edicts.edict_size(),
            builtins = self.builtins.assigned(),
            legacy_world_writes = self.legacy,
            "program installed"
        );
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The loaded program's tables.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The string table.
    #[must_use]
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// The string table, mutably.
    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    /// The global block.
    #[must_use]
    pub fn globals(&self) -> &GlobalBlock {
        &self.globals
    }

    /// The global block, mutably.
    pub fn globals_mut(&mut self) -> &mut GlobalBlock {
        &mut self.globals
    }

    /// The edict store.
    #[must_use]
    pub fn edicts(&self) -> &EdictStore {
        &self.edicts
    }

    /// The edict store, mutably.
    pub fn edicts_mut(&mut self) -> &mut EdictStore {
        &mut self.edicts
    }

    /// Hot field offsets for the loaded program.
    #[must_use]
    pub fn hot_fields(&self) -> &HotFields {
        &self.hot
    }

    /// The builtin registry.
    #[must_use]
    pub fn registry(&self) -> &BuiltinRegistry {
        &self.registry
    }

    /// The builtin table resolved for the loaded program.
    #[must_use]
    pub fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    /// Installs the host.
    pub fn set_host(&mut self, host: Box<dyn Host>) {
        self.host = host;
    }

    /// Builder form of [`set_host`](Self::set_host).
    #[must_use]
    pub fn with_host(mut self, host: Box<dyn Host>) -> Self {
        self.host = host;
        self
    }

    /// The host.
    pub fn host_mut(&mut self) -> &mut dyn Host {
        self.host.as_mut()
    }

    /// Execution state.
    #[must_use]
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Simulation phase.
    #[must_use]
    pub fn sim_state(&self) -> SimState {
        self.sim
    }

    /// Marks the world as running (edict 0 read-only) or loading.
    pub fn set_sim_state(&mut self, sim: SimState) {
        self.sim = sim;
    }

    /// True when the loaded image matched a legacy digest.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Current call depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Words on the local-save stack.
    #[must_use]
    pub fn local_usage(&self) -> usize {
        self.locals.used()
    }

    /// Argument count of the most recent call.
    #[must_use]
    pub fn argc(&self) -> usize {
        self.argc
    }

    /// True while statements are being traced.
    #[must_use]
    pub fn is_tracing(&self) -> bool {
        self.trace
    }

    /// Turns statement tracing on or off.
    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    /// Function currently executing, or null when idle.
    #[must_use]
    pub fn current_function(&self) -> FuncRef {
        self.xfunction
    }

    /// Borrowed view for diagnostics.
    #[must_use]
    pub fn view(&self) -> ProgramView<'_> {
        ProgramView::new(&self.program, &self.strings, &self.globals)
    }

    // =========================================================================
    // Host bookkeeping
    // =========================================================================

    /// The `time` global.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.globals.float(ofs::TIME).unwrap_or(0.0)
    }

    /// Sets the `time` global.
    pub fn set_time(&mut self, time: f32) -> Result<()> {
        self.globals.set_float(ofs::TIME, time)
    }

    /// The `self` global.
    #[must_use]
    pub fn self_edict(&self) -> EdictId {
        self.globals.edict(ofs::SELF).unwrap_or(EdictId::WORLD)
    }

    /// Sets the `self` global.
    pub fn set_self(&mut self, id: EdictId) -> Result<()> {
        self.globals.set_edict(ofs::SELF, id)
    }

    /// Sets the `other` global.
    pub fn set_other(&mut self, id: EdictId) -> Result<()> {
        self.globals.set_edict(ofs::OTHER, id)
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<FuncRef> {
        self.program.find_function(name)
    }

    /// Reads a named global.
    pub fn global(&self, name: &str) -> Result<Value> {
        let def = self
            .program
            .find_global(name)
            .ok_or_else(|| Error::new(ErrorKind::MissingSymbol(name.to_string())))?;
        self.globals.value(usize::from(def.ofs), def.ty)
    }

    /// Writes a named global.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let at = self
            .program
            .find_global(name)
            .map(|def| usize::from(def.ofs))
            .ok_or_else(|| Error::new(ErrorKind::MissingSymbol(name.to_string())))?;
        self.globals.set_value(at, value)
    }

    /// Reads a field of an edict by name, `None` if the program has no
    /// such field.
    pub fn field(&mut self, id: EdictId, name: &str, ty: Type) -> Result<Option<Value>> {
        let Some(at) = self.field_cache.lookup(&self.program, name) else {
            return Ok(None);
        };
        let e = self.edicts.get(id)?;
        e.value(usize::from(at), ty).map(Some)
    }

    /// Writes a field of an edict by name; returns false if the program
    /// has no such field.
    pub fn set_field(&mut self, id: EdictId, name: &str, value: Value) -> Result<bool> {
        let Some(at) = self.field_cache.lookup(&self.program, name) else {
            return Ok(false);
        };
        let mut e = self.edicts.get_mut(id)?;
        e.set_value(usize::from(at), value)?;
        Ok(true)
    }

    /// Allocates an edict at the current time.
    pub fn spawn(&mut self) -> Result<EdictId> {
        let time = self.time();
        self.edicts.alloc(time)
    }

    /// Unlinks and frees an edict.
    pub fn remove(&mut self, id: EdictId) -> Result<()> {
        self.edicts.get(id)?;
        self.host.unlink_edict(id);
        let time = self.time();
        self.edicts.free(id, time)
    }

    /// The `top_n` busiest functions since the last reset.
    #[must_use]
    pub fn profile(&self, top_n: usize) -> Vec<ProfileEntry> {
        self.profile.top(&self.program, top_n)
    }

    /// Zeroes the profile counters.
    pub fn reset_profile(&mut self) {
        self.profile.reset();
    }

    // =========================================================================
    // Builtin ABI
    // =========================================================================

    fn parm_ofs(n: usize) -> Result<usize> {
        if n >= ofs::MAX_PARMS {
            return Err(Error::bad_global(ofs::parm(n), ofs::PARMS_END));
        }
        Ok(ofs::parm(n))
    }

    /// Raw first word of argument `n`.
    pub fn arg_word(&self, n: usize) -> Result<Word> {
        self.globals.get(Self::parm_ofs(n)?)
    }

    /// Argument `n` as a float.
    pub fn arg_float(&self, n: usize) -> Result<f32> {
        self.globals.float(Self::parm_ofs(n)?)
    }

    /// Argument `n` as a vector.
    pub fn arg_vector(&self, n: usize) -> Result<Vec3> {
        self.globals.vector(Self::parm_ofs(n)?)
    }

    /// Argument `n` as an edict reference.
    pub fn arg_edict(&self, n: usize) -> Result<EdictId> {
        self.globals.edict(Self::parm_ofs(n)?)
    }

    /// Argument `n` as a function reference.
    pub fn arg_function(&self, n: usize) -> Result<FuncRef> {
        self.globals.function(Self::parm_ofs(n)?)
    }

    /// Argument `n` as a string reference.
    pub fn arg_string_ref(&self, n: usize) -> Result<StringRef> {
        self.globals.string(Self::parm_ofs(n)?)
    }

    /// Bytes of string argument `n`.
    pub fn arg_bytes(&self, n: usize) -> Result<&[u8]> {
        self.strings.get(self.arg_string_ref(n)?)
    }

    /// String argument `n`, lossily decoded.
    pub fn arg_string(&self, n: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.arg_bytes(n)?).into_owned())
    }

    /// String arguments `from..argc` joined together.
    pub fn concat_args(&self, from: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for n in from..self.argc.min(ofs::MAX_PARMS) {
            out.extend_from_slice(self.arg_bytes(n)?);
        }
        Ok(out)
    }

    /// Returns a float from a builtin.
    pub fn return_float(&mut self, value: f32) -> Result<()> {
        self.globals.set_float(ofs::RETURN, value)
    }

    /// Returns a vector from a builtin.
    pub fn return_vector(&mut self, value: Vec3) -> Result<()> {
        self.globals.set_vector(ofs::RETURN, value)
    }

    /// Returns an edict from a builtin.
    pub fn return_edict(&mut self, id: EdictId) -> Result<()> {
        self.globals.set_edict(ofs::RETURN, id)
    }

    /// Returns an existing string from a builtin.
    pub fn return_string_ref(&mut self, s: StringRef) -> Result<()> {
        self.globals.set_string(ofs::RETURN, s)
    }

    /// Returns new text from a builtin through a temp string slot.
    pub fn return_temp_string(&mut self, text: &[u8]) -> Result<()> {
        let s = self.strings.temp(text)?;
        self.return_string_ref(s)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs function `f` to completion.
    ///
    /// On failure the engine is reset (both stacks emptied) and the error
    /// carries the abort diagnostics, which have also been logged and
    /// handed to [`Host::report`].
    pub fn execute(&mut self, f: FuncRef) -> Result<()> {
        let outer = self.state;
        self.state = ExecState::Running;
        match self.run(f) {
            Ok(()) => {
                self.state = if outer == ExecState::Running {
                    ExecState::Running
                } else {
                    ExecState::Idle
                };
                Ok(())
            }
            Err(err) => Err(self.abort(err)),
        }
    }

    /// Runs the function called `name`.
    pub fn execute_named(&mut self, name: &str) -> Result<()> {
        let f = self
            .program
            .find_function(name)
            .ok_or_else(|| Error::new(ErrorKind::MissingSymbol(name.to_string())))?;
        self.execute(f)
    }

    /// Frames innermost first, for diagnostics.
    #[must_use]
    pub fn stack_frames(&self) -> Vec<StackFrame> {
        let mut frames = Vec::with_capacity(self.stack.depth() + 1);
        if !self.xfunction.is_null() {
            frames.push(StackFrame {
                function: self.xfunction,
                statement: self.statement,
            });
        }
        frames.extend(
            self.stack
                .frames()
                .iter()
                .rev()
                .filter(|frame| !frame.function.is_null())
                .map(|frame| StackFrame {
                    function: frame.function,
                    statement: frame.statement,
                }),
        );
        frames
    }

    fn abort(&mut self, mut err: Error) -> Error {
        if !err.is_reported() {
            let dump_self = self.config.diagnostics.dump_self_on_null_call
                && matches!(
                    err.kind,
                    ErrorKind::NullFunctionCall | ErrorKind::FunctionIndexOutOfRange { .. }
                );
            let edict = dump_self.then(|| self.self_edict());
            let statement = (!self.xfunction.is_null()).then_some(self.statement);
            let frames = self.stack_frames();
            let context = AbortReport::capture(
                &self.view(),
                &self.config.diagnostics,
                statement,
                &frames,
                &self.edicts,
                edict,
            );
            err = err.with_context(context);
            let report = AbortReport::from_error(&err);
            error!(error = %err.kind, depth = self.stack.depth(), "execution aborted\n{report}");
            self.host.report(&report);
        }
        self.stack.clear();
        self.locals.clear();
        self.xfunction = FuncRef::NULL;
        self.state = ExecState::Aborted;
        err
    }

    fn checked_function(&self, f: FuncRef) -> Result<&Function> {
        if f.is_null() {
            return Err(Error::new(ErrorKind::NullFunctionCall));
        }
        self.program.function(f).ok_or_else(|| {
            Error::new(ErrorKind::FunctionIndexOutOfRange {
                index: f.0,
                count: self.program.functions().len(),
            })
        })
    }

    fn call_builtin(&mut self, number: u32, f: FuncRef) -> Result<()> {
        self.profile.call(f);
        let func = self.builtins.lookup(number)?.map(|b| Rc::clone(&b.func));
        match func {
            Some(func) => func(self),
            None => {
                let name = self.program.function(f).map_or("?", |func| func.name.as_str());
                warn!(number, name, "unimplemented builtin called");
                self.globals.set_vector(ofs::RETURN, [0.0; 3])
            }
        }
    }

    fn enter_function(&mut self, f: FuncRef) -> Result<usize> {
        let func = self.checked_function(f)?;
        let entry = func
            .entry()
            .ok_or_else(|| Error::internal("entered a builtin as bytecode"))?;
        let (start, len, parm_size, parms) =
            (func.parm_start, func.locals, func.parm_size, func.parm_count());

        self.stack.push(Frame {
            statement: self.statement,
            function: self.xfunction,
        })?;
        self.locals.push(self.globals.slice(start, len)?)?;

        let mut dst = start;
        for (i, &size) in parm_size[..parms].iter().enumerate() {
            for j in 0..usize::from(size) {
                let word = self.globals.get(ofs::parm(i) + j)?;
                self.globals.set(dst, word)?;
                dst += 1;
            }
        }

        self.xfunction = f;
        self.profile.call(f);
        Ok(entry)
    }

    fn leave_function(&mut self) -> Result<usize> {
        if self.stack.depth() == 0 {
            return Err(Error::new(ErrorKind::StackUnderflow));
        }
        let (start, len) = self
            .program
            .function(self.xfunction)
            .map(|func| (func.parm_start, func.locals))
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))?;
        self.locals.pop_into(self.globals.slice_mut(start, len)?)?;
        let frame = self.stack.pop()?;
        self.xfunction = frame.function;
        self.statement = frame.statement;
        Ok(frame.statement)
    }

    fn run(&mut self, f: FuncRef) -> Result<()> {
        if let Some(number) = self.checked_function(f)?.builtin_number() {
            return self.call_builtin(number, f);
        }

        let exit_depth = self.stack.depth();
        let budget = self.config.runaway_budget;
        let mut remaining = budget;
        let mut pc = self.enter_function(f)?;

        loop {
            self.statement = pc;
            if remaining == 0 {
                return Err(Error::new(ErrorKind::RunawayLoop { budget }));
            }
            remaining -= 1;

            let st = *self
                .program
                .statements()
                .get(pc)
                .ok_or_else(|| Error::internal(format!("statement {pc} out of range")))?;
            if self.trace {
                trace!(target: "qcvm::trace", "{}", disassemble(&self.view(), pc));
            }
            self.profile.statement(self.xfunction);

            let (a, b, c) = (st.ga(), st.gb(), st.gc());
            match st.op {
                Opcode::AddF => {
                    let r = self.float(a)? + self.float(b)?;
                    self.set_float(c, r)?;
                }
                Opcode::AddV => {
                    let (x, y) = (self.vector(a)?, self.vector(b)?);
                    self.set_vector(c, [x[0] + y[0], x[1] + y[1], x[2] + y[2]])?;
                }
                Opcode::SubF => {
                    let r = self.float(a)? - self.float(b)?;
                    self.set_float(c, r)?;
                }
                Opcode::SubV => {
                    let (x, y) = (self.vector(a)?, self.vector(b)?);
                    self.set_vector(c, [x[0] - y[0], x[1] - y[1], x[2] - y[2]])?;
                }
                Opcode::MulF => {
                    let r = self.float(a)? * self.float(b)?;
                    self.set_float(c, r)?;
                }
                Opcode::MulV => {
                    let (x, y) = (self.vector(a)?, self.vector(b)?);
                    self.set_float(c, x[0] * y[0] + x[1] * y[1] + x[2] * y[2])?;
                }
                Opcode::MulFV => {
                    let (s, v) = (self.float(a)?, self.vector(b)?);
                    self.set_vector(c, [s * v[0], s * v[1], s * v[2]])?;
                }
                Opcode::MulVF => {
                    let (v, s) = (self.vector(a)?, self.float(b)?);
                    self.set_vector(c, [s * v[0], s * v[1], s * v[2]])?;
                }
                Opcode::DivF => {
                    let r = self.float(a)? / self.float(b)?;
                    self.set_float(c, r)?;
                }
                Opcode::BitAnd => {
                    let r = (self.float(a)? as i32) & (self.float(b)? as i32);
                    self.set_float(c, r as f32)?;
                }
                Opcode::BitOr => {
                    let r = (self.float(a)? as i32) | (self.float(b)? as i32);
                    self.set_float(c, r as f32)?;
                }
                Opcode::Ge => {
                    let r = self.float(a)? >= self.float(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::Le => {
                    let r = self.float(a)? <= self.float(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::Gt => {
                    let r = self.float(a)? > self.float(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::Lt => {
                    let r = self.float(a)? < self.float(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::And => {
                    let r = self.float(a)? != 0.0 && self.float(b)? != 0.0;
                    self.set_flag(c, r)?;
                }
                Opcode::Or => {
                    let r = self.float(a)? != 0.0 || self.float(b)? != 0.0;
                    self.set_flag(c, r)?;
                }
                Opcode::NotF => {
                    let r = self.float(a)? == 0.0;
                    self.set_flag(c, r)?;
                }
                Opcode::NotV => {
                    let r = self.vector(a)?.iter().all(|&v| v == 0.0);
                    self.set_flag(c, r)?;
                }
                Opcode::NotS => {
                    let s = StringRef::from_word(self.word(a)?);
                    let r = self.strings.is_empty_string(s);
                    self.set_flag(c, r)?;
                }
                Opcode::NotFnc => {
                    let r = FuncRef::from_word(self.word(a)?).is_null();
                    self.set_flag(c, r)?;
                }
                Opcode::NotEnt => {
                    let r = EdictId::from_word(self.word(a)?).is_world();
                    self.set_flag(c, r)?;
                }
                Opcode::EqF => {
                    let r = self.float(a)? == self.float(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::EqV => {
                    let r = self.vector(a)? == self.vector(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::EqS => {
                    let r = self.compare_strings(a, b)? == 0;
                    self.set_flag(c, r)?;
                }
                Opcode::EqE | Opcode::EqFnc => {
                    let r = self.word(a)? == self.word(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::NeF => {
                    let r = self.float(a)? != self.float(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::NeV => {
                    let r = self.vector(a)? != self.vector(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::NeS => {
                    let r = self.compare_strings(a, b)?;
                    self.set_float(c, r as f32)?;
                }
                Opcode::NeE | Opcode::NeFnc => {
                    let r = self.word(a)? != self.word(b)?;
                    self.set_flag(c, r)?;
                }
                Opcode::StoreF
                | Opcode::StoreS
                | Opcode::StoreEnt
                | Opcode::StoreFld
                | Opcode::StoreFnc => self.globals.copy(a, b, 1)?,
                Opcode::StoreV => self.globals.copy(a, b, 3)?,
                Opcode::StorePF
                | Opcode::StorePS
                | Opcode::StorePEnt
                | Opcode::StorePFld
                | Opcode::StorePFnc => self.store_through(a, b, 1)?,
                Opcode::StorePV => self.store_through(a, b, 3)?,
                Opcode::Address => self.address(a, b, c)?,
                Opcode::LoadF
                | Opcode::LoadS
                | Opcode::LoadEnt
                | Opcode::LoadFld
                | Opcode::LoadFnc => self.load_field(a, b, c, 1)?,
                Opcode::LoadV => self.load_field(a, b, c, 3)?,
                Opcode::IfNot => {
                    if self.word(a)?.is_zero() {
                        pc = Self::jump(&st, pc, self.program.statements().len())?;
                        continue;
                    }
                }
                Opcode::If => {
                    if !self.word(a)?.is_zero() {
                        pc = Self::jump(&st, pc, self.program.statements().len())?;
                        continue;
                    }
                }
                Opcode::Goto => {
                    pc = Self::jump(&st, pc, self.program.statements().len())?;
                    continue;
                }
                Opcode::Call0
                | Opcode::Call1
                | Opcode::Call2
                | Opcode::Call3
                | Opcode::Call4
                | Opcode::Call5
                | Opcode::Call6
                | Opcode::Call7
                | Opcode::Call8 => {
                    self.argc = st.op.call_argc().unwrap_or(0);
                    let callee = FuncRef::from_word(self.word(a)?);
                    if let Some(number) = self.checked_function(callee)?.builtin_number() {
                        self.call_builtin(number, callee)?;
                    } else {
                        pc = self.enter_function(callee)?;
                        continue;
                    }
                }
                Opcode::Done | Opcode::Return => {
                    let mut ret = [Word::ZERO; 3];
                    for (i, slot) in ret.iter_mut().enumerate() {
                        *slot = self.globals.get(a + i).unwrap_or(Word::ZERO);
                    }
                    self.globals.slice_mut(ofs::RETURN, 3)?.copy_from_slice(&ret);
                    pc = self.leave_function()?;
                    if self.stack.depth() == exit_depth {
                        return Ok(());
                    }
                }
                Opcode::State => self.think_state(a, b)?,
            }
            pc += 1;
        }
    }

    // =========================================================================
    // Statement helpers
    // =========================================================================

    fn jump(st: &Statement, pc: usize, count: usize) -> Result<usize> {
        let target = st.branch_target(pc).unwrap_or(-1);
        usize::try_from(target)
            .ok()
            .filter(|&t| t < count)
            .ok_or_else(|| {
                Error::new(ErrorKind::BadBranch {
                    statement: pc,
                    target,
                    count,
                })
            })
    }

    fn word(&self, at: usize) -> Result<Word> {
        self.globals.get(at)
    }

    fn float(&self, at: usize) -> Result<f32> {
        self.globals.float(at)
    }

    fn vector(&self, at: usize) -> Result<Vec3> {
        self.globals.vector(at)
    }

    fn set_float(&mut self, at: usize, value: f32) -> Result<()> {
        self.globals.set_float(at, value)
    }

    fn set_vector(&mut self, at: usize, value: Vec3) -> Result<()> {
        self.globals.set_vector(at, value)
    }

    fn set_flag(&mut self, at: usize, value: bool) -> Result<()> {
        self.globals.set(at, Word::from_bool(value))
    }

    fn compare_strings(&self, a: usize, b: usize) -> Result<i32> {
        let x = StringRef::from_word(self.word(a)?);
        let y = StringRef::from_word(self.word(b)?);
        self.strings.compare(x, y)
    }

    fn check_world_write(&self, id: EdictId) -> Result<()> {
        if id.is_world() && self.sim == SimState::Active && !self.legacy {
            return Err(Error::new(ErrorKind::WorldWriteViolation));
        }
        Ok(())
    }

    fn load_field(&mut self, a: usize, b: usize, c: usize, n: usize) -> Result<()> {
        let id = EdictId::from_word(self.word(a)?);
        let field = self.word(b)?.bits() as usize;
        let mut buf = [Word::ZERO; 3];
        buf[..n].copy_from_slice(self.edicts.get(id)?.words(field, n)?);
        self.globals.slice_mut(c, n)?.copy_from_slice(&buf[..n]);
        Ok(())
    }

    fn address(&mut self, a: usize, b: usize, c: usize) -> Result<()> {
        let id = EdictId::from_word(self.word(a)?);
        self.check_world_write(id)?;
        self.edicts.get(id)?;
        let field = self.word(b)?.bits() as usize;
        let ptr = FieldPointer::new(id, field).encode(self.edicts.field_words())?;
        self.globals.set(c, Word::from_bits(ptr))
    }

    fn store_through(&mut self, a: usize, b: usize, n: usize) -> Result<()> {
        let ptr = FieldPointer::decode(
            self.word(b)?.bits(),
            self.edicts.field_words(),
            self.edicts.count(),
        )?;
        self.check_world_write(ptr.edict)?;
        let mut buf = [Word::ZERO; 3];
        buf[..n].copy_from_slice(self.globals.slice(a, n)?);
        self.edicts
            .get_mut(ptr.edict)?
            .words_mut(ptr.field, n)?
            .copy_from_slice(&buf[..n]);
        Ok(())
    }

    fn think_state(&mut self, a: usize, b: usize) -> Result<()> {
        let id = self.globals.edict(ofs::SELF)?;
        self.check_world_write(id)?;
        let time = self.globals.float(ofs::TIME)?;
        let frame = self.float(a)?;
        let think = self.word(b)?;
        let (nextthink_at, frame_at, think_at) =
            (self.hot.nextthink, self.hot.frame, self.hot.think);

        let mut e = self.edicts.get_mut(id)?;
        if let Some(at) = nextthink_at {
            e.set_float(usize::from(at), time + 0.1)?;
        }
        if let Some(at) = frame_at {
            e.set_float(usize::from(at), frame)?;
        }
        if let Some(at) = think_at {
            e.set_word(usize::from(at), think)?;
        }
        Ok(())
    }
}
