//! Engine configuration.

use qcvm_debug::DiagnosticsConfig;
use qcvm_progs::LoadOptions;
use qcvm_storage::StoreConfig;

/// How builtin numbers in a program are matched to native implementations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BuiltinNumbering {
    /// Every builtin keeps its compiled-in number.
    Default,
    /// Numbers follow the names the loaded program declares, falling back
    /// to the default number for builtins the program does not mention.
    #[default]
    Remap,
}

/// Limits and switches for one engine instance.
#[derive(Clone, Debug)]
pub struct VmConfig {
    /// Maximum call depth.
    pub max_stack_depth: usize,
    /// Words available for saving callee locals.
    pub local_stack_size: usize,
    /// Statements one `execute` may run before it is aborted.
    pub runaway_budget: u32,
    /// Bytes available for strings created at runtime.
    pub string_capacity: usize,
    /// Number of temp string slots.
    pub temp_string_slots: usize,
    /// Bytes per temp string slot.
    pub temp_string_size: usize,
    /// Size of the builtin number space.
    pub max_builtins: usize,
    /// Builtin numbering mode.
    pub builtin_numbering: BuiltinNumbering,
    /// Edicts allocated up front.
    pub initial_edicts: usize,
    /// Edicts added when the store runs out.
    pub edict_batch: usize,
    /// Hard edict limit.
    pub max_edicts: usize,
    /// Slots reserved for the world and clients.
    pub reserved_edicts: usize,
    /// Image digests that run with world writes permitted.
    pub legacy_digests: Vec<[u8; 16]>,
    /// Seed for the `random` builtin.
    pub seed: u64,
    /// Start with statement tracing on.
    pub trace: bool,
    /// What abort reports include.
    pub diagnostics: DiagnosticsConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 1024,
            local_stack_size: 16384,
            runaway_budget: 0x0100_0000,
            string_capacity: 1 << 20,
            temp_string_slots: 16,
            temp_string_size: 1024,
            max_builtins: 1024,
            builtin_numbering: BuiltinNumbering::Remap,
            initial_edicts: 256,
            edict_batch: 256,
            max_edicts: 8192,
            reserved_edicts: 17,
            legacy_digests: Vec::new(),
            seed: 0,
            trace: false,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl VmConfig {
    /// Sets the call depth limit.
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Sets the local-save stack capacity in words.
    #[must_use]
    pub fn with_local_stack_size(mut self, words: usize) -> Self {
        self.local_stack_size = words;
        self
    }

    /// Sets the per-execute statement budget.
    #[must_use]
    pub fn with_runaway_budget(mut self, budget: u32) -> Self {
        self.runaway_budget = budget;
        self
    }

    /// Sets the runtime string capacity.
    #[must_use]
    pub fn with_string_capacity(mut self, bytes: usize) -> Self {
        self.string_capacity = bytes;
        self
    }

    /// Sets the temp string ring.
    #[must_use]
    pub fn with_temp_strings(mut self, slots: usize, size: usize) -> Self {
        self.temp_string_slots = slots;
        self.temp_string_size = size;
        self
    }

    /// Sets the builtin number space.
    #[must_use]
    pub fn with_max_builtins(mut self, n: usize) -> Self {
        self.max_builtins = n;
        self
    }

    /// Sets the builtin numbering mode.
    #[must_use]
    pub fn with_builtin_numbering(mut self, numbering: BuiltinNumbering) -> Self {
        self.builtin_numbering = numbering;
        self
    }

    /// Sets the edict store sizes.
    #[must_use]
    pub fn with_edicts(mut self, initial: usize, batch: usize, max: usize) -> Self {
        self.initial_edicts = initial;
        self.edict_batch = batch;
        self.max_edicts = max;
        self
    }

    /// Sets how many leading slots the allocator never hands out.
    #[must_use]
    pub fn with_reserved_edicts(mut self, n: usize) -> Self {
        self.reserved_edicts = n;
        self
    }

    /// Adds a digest that selects the world-write quirk.
    #[must_use]
    pub fn with_legacy_digest(mut self, digest: [u8; 16]) -> Self {
        self.legacy_digests.push(digest);
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables statement tracing from the start.
    #[must_use]
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Sets the diagnostics configuration.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Loader options matching this configuration.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default()
            .with_temp_strings(self.temp_string_slots, self.temp_string_size)
            .with_string_capacity(self.string_capacity)
    }

    /// Store sizing matching this configuration.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            initial: self.initial_edicts,
            batch: self.edict_batch,
            max: self.max_edicts,
            reserved: self.reserved_edicts,
        }
    }
}
