//! The global block: word-addressed variable storage shared by all running
//! program code, including the parameter and return slots.

use qcvm_foundation::{EdictId, Error, FuncRef, Result, StringRef, Type, Value, Vec3, Word};

/// Well-known offsets at the start of the global block.
pub mod ofs {
    /// Always zero.
    pub const NULL: usize = 0;
    /// Return value (three words).
    pub const RETURN: usize = 1;
    /// First parameter slot (three words each).
    pub const PARM0: usize = 4;
    /// Number of parameter slots.
    pub const MAX_PARMS: usize = 8;
    /// One past the last parameter word.
    pub const PARMS_END: usize = PARM0 + MAX_PARMS * 3;

    /// Current `self` edict.
    pub const SELF: usize = 28;
    /// Current `other` edict.
    pub const OTHER: usize = 29;
    /// World edict reference.
    pub const WORLD: usize = 30;
    /// Simulated time in seconds.
    pub const TIME: usize = 31;
    /// Duration of the current frame.
    pub const FRAMETIME: usize = 32;
    /// Forces touch functions to run again.
    pub const FORCE_RETOUCH: usize = 33;
    /// Current map name.
    pub const MAPNAME: usize = 34;
    /// Deathmatch mode.
    pub const DEATHMATCH: usize = 35;
    /// Cooperative mode.
    pub const COOP: usize = 36;
    /// Team play mode.
    pub const TEAMPLAY: usize = 37;
    /// Flags carried across levels.
    pub const SERVERFLAGS: usize = 38;
    /// Secret count.
    pub const TOTAL_SECRETS: usize = 39;
    /// Monster count.
    pub const TOTAL_MONSTERS: usize = 40;
    /// Secrets found.
    pub const FOUND_SECRETS: usize = 41;
    /// Monsters killed.
    pub const KILLED_MONSTERS: usize = 42;
    /// First of sixteen level-change parameters.
    pub const PARM1: usize = 43;
    /// Forward vector set by `makevectors`.
    pub const V_FORWARD: usize = 59;
    /// Up vector set by `makevectors`.
    pub const V_UP: usize = 62;
    /// Right vector set by `makevectors`.
    pub const V_RIGHT: usize = 65;
    /// Trace result: entirely in solid.
    pub const TRACE_ALLSOLID: usize = 68;
    /// Trace result: started in solid.
    pub const TRACE_STARTSOLID: usize = 69;
    /// Trace result: fraction completed.
    pub const TRACE_FRACTION: usize = 70;
    /// Trace result: end position.
    pub const TRACE_ENDPOS: usize = 71;
    /// Trace result: plane normal.
    pub const TRACE_PLANE_NORMAL: usize = 74;
    /// Trace result: plane distance.
    pub const TRACE_PLANE_DIST: usize = 77;
    /// Trace result: entity hit.
    pub const TRACE_ENT: usize = 78;
    /// Trace result: ended in open space.
    pub const TRACE_INOPEN: usize = 79;
    /// Trace result: ended in water.
    pub const TRACE_INWATER: usize = 80;
    /// Destination entity for unicast messages.
    pub const MSG_ENTITY: usize = 81;
    /// Entry points the host calls by slot.
    pub const MAIN: usize = 82;
    /// Called at the start of every frame.
    pub const START_FRAME: usize = 83;
    /// Called before client physics.
    pub const PLAYER_PRE_THINK: usize = 84;
    /// Called after client physics.
    pub const PLAYER_POST_THINK: usize = 85;
    /// Client suicide.
    pub const CLIENT_KILL: usize = 86;
    /// Client connected.
    pub const CLIENT_CONNECT: usize = 87;
    /// Client entered the server.
    pub const PUT_CLIENT_IN_SERVER: usize = 88;
    /// Client disconnected.
    pub const CLIENT_DISCONNECT: usize = 89;
    /// Fresh level-change parameters.
    pub const SET_NEW_PARMS: usize = 90;
    /// Save level-change parameters.
    pub const SET_CHANGE_PARMS: usize = 91;

    /// Words occupied by the well-known layout.
    pub const COUNT: usize = 92;

    /// Offset of parameter slot `n`.
    #[must_use]
    pub const fn parm(n: usize) -> usize {
        PARM0 + n * 3
    }
}

/// Named well-known globals with their types, in offset order.
pub const WELL_KNOWN: &[(&str, Type, usize)] = &[
    ("self", Type::Entity, ofs::SELF),
    ("other", Type::Entity, ofs::OTHER),
    ("world", Type::Entity, ofs::WORLD),
    ("time", Type::Float, ofs::TIME),
    ("frametime", Type::Float, ofs::FRAMETIME),
    ("force_retouch", Type::Float, ofs::FORCE_RETOUCH),
    ("mapname", Type::String, ofs::MAPNAME),
    ("deathmatch", Type::Float, ofs::DEATHMATCH),
    ("coop", Type::Float, ofs::COOP),
    ("teamplay", Type::Float, ofs::TEAMPLAY),
    ("serverflags", Type::Float, ofs::SERVERFLAGS),
    ("total_secrets", Type::Float, ofs::TOTAL_SECRETS),
    ("total_monsters", Type::Float, ofs::TOTAL_MONSTERS),
    ("found_secrets", Type::Float, ofs::FOUND_SECRETS),
    ("killed_monsters", Type::Float, ofs::KILLED_MONSTERS),
    ("v_forward", Type::Vector, ofs::V_FORWARD),
    ("v_up", Type::Vector, ofs::V_UP),
    ("v_right", Type::Vector, ofs::V_RIGHT),
    ("trace_allsolid", Type::Float, ofs::TRACE_ALLSOLID),
    ("trace_startsolid", Type::Float, ofs::TRACE_STARTSOLID),
    ("trace_fraction", Type::Float, ofs::TRACE_FRACTION),
    ("trace_endpos", Type::Vector, ofs::TRACE_ENDPOS),
    ("trace_plane_normal", Type::Vector, ofs::TRACE_PLANE_NORMAL),
    ("trace_plane_dist", Type::Float, ofs::TRACE_PLANE_DIST),
    ("trace_ent", Type::Entity, ofs::TRACE_ENT),
    ("trace_inopen", Type::Float, ofs::TRACE_INOPEN),
    ("trace_inwater", Type::Float, ofs::TRACE_INWATER),
    ("msg_entity", Type::Entity, ofs::MSG_ENTITY),
    ("main", Type::Function, ofs::MAIN),
    ("StartFrame", Type::Function, ofs::START_FRAME),
    ("PlayerPreThink", Type::Function, ofs::PLAYER_PRE_THINK),
    ("PlayerPostThink", Type::Function, ofs::PLAYER_POST_THINK),
    ("ClientKill", Type::Function, ofs::CLIENT_KILL),
    ("ClientConnect", Type::Function, ofs::CLIENT_CONNECT),
    ("PutClientInServer", Type::Function, ofs::PUT_CLIENT_IN_SERVER),
    ("ClientDisconnect", Type::Function, ofs::CLIENT_DISCONNECT),
    ("SetNewParms", Type::Function, ofs::SET_NEW_PARMS),
    ("SetChangeParms", Type::Function, ofs::SET_CHANGE_PARMS),
];

/// Word-addressed global storage with checked access.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalBlock {
    words: Vec<Word>,
}

impl GlobalBlock {
    /// Wraps loaded words.
    #[must_use]
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }

    /// Creates a block of `len` zero words.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![Word::ZERO; len],
        }
    }

    /// Number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if the block has no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// All words.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// All words, mutably.
    pub fn words_mut(&mut self) -> &mut [Word] {
        &mut self.words
    }

    /// Reads one word.
    pub fn get(&self, ofs: usize) -> Result<Word> {
        self.words
            .get(ofs)
            .copied()
            .ok_or_else(|| Error::bad_global(ofs, self.words.len()))
    }

    /// Writes one word.
    pub fn set(&mut self, ofs: usize, word: Word) -> Result<()> {
        let len = self.words.len();
        let slot = self
            .words
            .get_mut(ofs)
            .ok_or_else(|| Error::bad_global(ofs, len))?;
        *slot = word;
        Ok(())
    }

    /// Borrows `len` words starting at `ofs`.
    pub fn slice(&self, ofs: usize, len: usize) -> Result<&[Word]> {
        ofs.checked_add(len)
            .and_then(|end| self.words.get(ofs..end))
            .ok_or_else(|| Error::bad_global(ofs, self.words.len()))
    }

    /// Mutably borrows `len` words starting at `ofs`.
    pub fn slice_mut(&mut self, ofs: usize, len: usize) -> Result<&mut [Word]> {
        let total = self.words.len();
        ofs.checked_add(len)
            .and_then(|end| self.words.get_mut(ofs..end))
            .ok_or_else(|| Error::bad_global(ofs, total))
    }

    /// Reads a float.
    pub fn float(&self, ofs: usize) -> Result<f32> {
        Ok(self.get(ofs)?.as_f32())
    }

    /// Writes a float.
    pub fn set_float(&mut self, ofs: usize, value: f32) -> Result<()> {
        self.set(ofs, Word::from_f32(value))
    }

    /// Reads a vector.
    pub fn vector(&self, ofs: usize) -> Result<Vec3> {
        let w = self.slice(ofs, 3)?;
        Ok([w[0].as_f32(), w[1].as_f32(), w[2].as_f32()])
    }

    /// Writes a vector.
    pub fn set_vector(&mut self, ofs: usize, value: Vec3) -> Result<()> {
        let w = self.slice_mut(ofs, 3)?;
        for (slot, v) in w.iter_mut().zip(value) {
            *slot = Word::from_f32(v);
        }
        Ok(())
    }

    /// Reads an edict reference.
    pub fn edict(&self, ofs: usize) -> Result<EdictId> {
        Ok(EdictId::from_word(self.get(ofs)?))
    }

    /// Writes an edict reference.
    pub fn set_edict(&mut self, ofs: usize, id: EdictId) -> Result<()> {
        self.set(ofs, id.to_word())
    }

    /// Reads a string reference.
    pub fn string(&self, ofs: usize) -> Result<StringRef> {
        Ok(StringRef::from_word(self.get(ofs)?))
    }

    /// Writes a string reference.
    pub fn set_string(&mut self, ofs: usize, s: StringRef) -> Result<()> {
        self.set(ofs, s.to_word())
    }

    /// Reads a function reference.
    pub fn function(&self, ofs: usize) -> Result<FuncRef> {
        Ok(FuncRef::from_word(self.get(ofs)?))
    }

    /// Reads a typed value.
    pub fn value(&self, ofs: usize, ty: Type) -> Result<Value> {
        Ok(Value::read(ty, self.slice(ofs, ty.size())?))
    }

    /// Writes a typed value.
    pub fn set_value(&mut self, ofs: usize, value: Value) -> Result<()> {
        value.write(self.slice_mut(ofs, value.ty().size())?);
        Ok(())
    }

    /// Copies `len` words from `src` to `dst` within the block.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) -> Result<()> {
        self.slice(src, len)?;
        self.slice(dst, len)?;
        self.words.copy_within(src..src + len, dst);
        Ok(())
    }
}
