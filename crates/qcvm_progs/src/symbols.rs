//! Name-to-offset resolution for native code.
//!
//! Fields that builtins and the engine touch directly are resolved once per
//! image into [`HotFields`]. Programs may omit any of them; an absent field
//! resolves to offset zero and native code skips it. Ad-hoc lookups by name
//! go through [`FieldCache`], a tiny cache that must be cleared whenever a
//! new image is loaded.

use qcvm_foundation::Type;

use crate::program::Program;

/// Offsets of the edict fields native code uses, resolved per image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HotFields {
    /// `.string classname`
    pub classname: Option<u16>,
    /// `.string model`
    pub model: Option<u16>,
    /// `.vector origin`
    pub origin: Option<u16>,
    /// `.vector angles`
    pub angles: Option<u16>,
    /// `.vector velocity`
    pub velocity: Option<u16>,
    /// `.float frame`
    pub frame: Option<u16>,
    /// `.float nextthink`
    pub nextthink: Option<u16>,
    /// `.void() think`
    pub think: Option<u16>,
    /// `.float health`
    pub health: Option<u16>,
    /// `.float flags`
    pub flags: Option<u16>,
    /// `.string targetname`
    pub targetname: Option<u16>,
}

impl HotFields {
    /// Resolves every hot field against `program`.
    ///
    /// A field declared with an unexpected type is treated as absent.
    #[must_use]
    pub fn resolve(program: &Program) -> Self {
        let find = |name: &str, ty: Type| {
            program
                .find_field(name)
                .filter(|def| def.ty == ty)
                .map(|def| def.ofs)
        };
        Self {
            classname: find("classname", Type::String),
            model: find("model", Type::String),
            origin: find("origin", Type::Vector),
            angles: find("angles", Type::Vector),
            velocity: find("velocity", Type::Vector),
            frame: find("frame", Type::Float),
            nextthink: find("nextthink", Type::Float),
            think: find("think", Type::Function),
            health: find("health", Type::Float),
            flags: find("flags", Type::Float),
            targetname: find("targetname", Type::String),
        }
    }

    /// Offset of a resolved field, or zero when absent.
    #[must_use]
    pub fn offset(field: Option<u16>) -> usize {
        field.map_or(0, usize::from)
    }
}

#[derive(Clone, Debug, Default)]
struct CacheEntry {
    name: String,
    ofs: Option<u16>,
}

/// Two-entry round-robin cache of field name lookups.
#[derive(Clone, Debug, Default)]
pub struct FieldCache {
    entries: [Option<CacheEntry>; 2],
    next: usize,
}

impl FieldCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a field offset by name, consulting the cache first.
    pub fn lookup(&mut self, program: &Program, name: &str) -> Option<u16> {
        if let Some(hit) = self.entries.iter().flatten().find(|e| e.name == name) {
            return hit.ofs;
        }
        let ofs = program.find_field(name).map(|def| def.ofs);
        self.entries[self.next] = Some(CacheEntry {
            name: name.to_string(),
            ofs,
        });
        self.next = (self.next + 1) % self.entries.len();
        ofs
    }

    /// Forgets every cached lookup.
    pub fn clear(&mut self) {
        self.entries = [None, None];
        self.next = 0;
    }

    /// True if `name` is currently cached.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().flatten().any(|e| e.name == name)
    }
}
