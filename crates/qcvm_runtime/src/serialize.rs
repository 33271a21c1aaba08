//! Snapshot save and restore using `MessagePack`.
//!
//! A snapshot holds everything a running program can change: the global
//! block, the edicts, and the strings created at runtime. It is tagged
//! with the program's CRC and digest and only restores into an engine
//! running the same image.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use qcvm_foundation::{Error, ErrorKind, Result, Word};
use qcvm_progs::hex;
use qcvm_storage::StoreSnapshot;
use qcvm_vm::{ExecState, Vm};

/// Saved engine state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// CRC of the image the snapshot was taken from.
    pub crc: u16,
    /// MD5 digest of that image.
    pub digest: [u8; 16],
    /// Raw global block.
    pub globals: Vec<u32>,
    /// Temp ring and permanent runtime strings.
    pub strings: Vec<u8>,
    /// Edicts below the high-water mark.
    pub edicts: StoreSnapshot,
}

impl Snapshot {
    /// Copies the mutable state out of `vm`.
    #[must_use]
    pub fn capture(vm: &Vm) -> Self {
        let program = vm.program();
        Self {
            crc: program.crc(),
            digest: program.digest(),
            globals: vm.globals().words().iter().map(|w| w.bits()).collect(),
            strings: vm.strings().runtime_bytes().to_vec(),
            edicts: vm.edicts().snapshot(),
        }
    }

    /// Writes the snapshot back into `vm`.
    ///
    /// # Errors
    ///
    /// Fails if `vm` is executing, runs a different image, or has a
    /// differently sized global block.
    pub fn apply(&self, vm: &mut Vm) -> Result<()> {
        if vm.state() == ExecState::Running {
            return Err(mismatch("cannot restore while executing".into()));
        }
        let (crc, digest) = (vm.program().crc(), vm.program().digest());
        if self.crc != crc || self.digest != digest {
            return Err(mismatch(format!(
                "snapshot is for image {} (crc {}), loaded image is {} (crc {crc})",
                hex(&self.digest),
                self.crc,
                hex(&digest)
            )));
        }
        if self.globals.len() != vm.globals().len() {
            return Err(mismatch(format!(
                "snapshot has {} globals, program has {}",
                self.globals.len(),
                vm.globals().len()
            )));
        }

        // Rebuilt aside: a rejected snapshot leaves `vm` untouched.
        let mut edicts = vm.edicts().clone();
        edicts.restore(&self.edicts)?;
        let mut strings = vm.strings().clone();
        strings.restore_runtime_bytes(&self.strings)?;

        *vm.edicts_mut() = edicts;
        *vm.strings_mut() = strings;
        for (slot, &bits) in vm.globals_mut().words_mut().iter_mut().zip(&self.globals) {
            *slot = Word::from_bits(bits);
        }
        info!(
            edicts = self.edicts.edicts.len(),
            string_bytes = self.strings.len(),
            "snapshot restored"
        );
        Ok(())
    }
}

fn mismatch(message: String) -> Error {
    Error::new(ErrorKind::Serialization(message))
}

/// Serializes a snapshot to bytes using `MessagePack` format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(snapshot)
        .map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))
}

/// Deserializes a snapshot from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_bytes(bytes: &[u8]) -> Result<Snapshot> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))
}

/// Saves a snapshot to a file, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails.
pub fn save_to_file<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        Error::new(ErrorKind::Io(format!(
            "failed to create file '{}': {e}",
            path.display()
        )))
    })?;

    let mut writer = BufWriter::new(file);
    let bytes = to_bytes(snapshot)?;

    writer.write_all(&bytes).map_err(|e| {
        Error::new(ErrorKind::Io(format!(
            "failed to write to file '{}': {e}",
            path.display()
        )))
    })?;
    writer.flush().map_err(|e| {
        Error::new(ErrorKind::Io(format!(
            "failed to flush file '{}': {e}",
            path.display()
        )))
    })?;

    Ok(())
}

/// Loads a snapshot from a `MessagePack` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::new(ErrorKind::Io(format!(
            "failed to open file '{}': {e}",
            path.display()
        )))
    })?;

    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| {
        Error::new(ErrorKind::Io(format!(
            "failed to read file '{}': {e}",
            path.display()
        )))
    })?;

    from_bytes(&bytes)
}
