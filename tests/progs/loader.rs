//! Integration tests for image loading
//!
//! Tests that untrusted images are validated before anything runs them.

use qcvm_foundation::{ErrorKind, ErrorTier, Type};
use qcvm_progs::checksum::crc16;
use qcvm_progs::format::HEADER_SIZE;
use qcvm_progs::{
    DirSource, Header, ImageBuilder, LoadOptions, MemorySource, Opcode, ProgramImage, ofs,
};

fn sample() -> ImageBuilder {
    let mut b = ImageBuilder::new();
    b.set_file("world.qc");
    b.field("health", Type::Float);
    b.field("origin", Type::Vector);
    let score = b.global_float("score", 0.0);
    let one = b.constant(1.0);
    b.function("worldspawn", &[], |f| {
        f.emit(Opcode::AddF, score, one, score);
    });
    b
}

fn load(bytes: &[u8]) -> qcvm_foundation::Result<ProgramImage> {
    ProgramImage::from_bytes(bytes, &LoadOptions::default())
}

/// Rewrites the header of `bytes` in place.
fn patch_header(bytes: &mut [u8], edit: impl FnOnce(&mut Header)) {
    let mut header = Header::parse(bytes).unwrap();
    edit(&mut header);
    bytes[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
}

// =============================================================================
// Accepted Images
// =============================================================================

#[test]
fn sample_image_loads() {
    let image = load(&sample().build()).unwrap();
    let program = &image.program;

    let f = program.find_function("worldspawn").unwrap();
    let func = program.function(f).unwrap();
    assert_eq!(func.file, "world.qc");
    assert!(!func.is_builtin());
    assert_eq!(program.entity_fields(), 4);
    assert!(image.globals.len() >= ofs::COUNT);
}

#[test]
fn definitions_are_typed() {
    let image = load(&sample().build()).unwrap();
    let program = &image.program;

    assert_eq!(program.find_field("origin").unwrap().ty, Type::Vector);
    assert_eq!(program.find_global("score").unwrap().ty, Type::Float);
    assert_eq!(program.find_global("origin").unwrap().ty, Type::Field);
    assert!(program.find_global("nonexistent").is_none());
}

#[test]
fn checksums_identify_the_image() {
    let bytes = sample().build();
    let image = load(&bytes).unwrap();
    assert_eq!(image.program.crc(), crc16(&bytes));

    let mut other = sample();
    other.global_float("extra", 2.0);
    let other = load(&other.build()).unwrap();
    assert_ne!(other.program.digest(), image.program.digest());
}

#[test]
fn statement_owner_is_found() {
    let image = load(&sample().build()).unwrap();
    let program = &image.program;
    let f = program.find_function("worldspawn").unwrap();
    let entry = program.function(f).unwrap().entry().unwrap();
    assert_eq!(program.function_containing(entry), Some(f));
}

// =============================================================================
// Rejected Images
// =============================================================================

#[test]
fn version_mismatch() {
    let err = load(&ImageBuilder::new().with_version(5).build()).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::VersionMismatch {
            expected: 6,
            found: 5
        }
    ));
    assert_eq!(err.tier(), ErrorTier::Load);
}

#[test]
fn header_crc_mismatch() {
    let mut bytes = sample().build();
    patch_header(&mut bytes, |h| h.crc = 12_345);
    let err = load(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::HeaderCorrupt { expected: 5927, found: 12_345 }));
}

#[test]
fn empty_input() {
    let err = load(&[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Truncated { .. }));
}

#[test]
fn table_past_end_of_image() {
    let mut bytes = sample().build();
    patch_header(&mut bytes, |h| h.num_statements += 1000);
    let err = load(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Truncated { .. }));
}

#[test]
fn negative_counts() {
    let mut bytes = sample().build();
    patch_header(&mut bytes, |h| h.num_functions = -1);
    let err = load(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Malformed(_)));
}

#[test]
fn too_few_globals() {
    let mut bytes = sample().build();
    patch_header(&mut bytes, |h| h.num_globals = 40);
    let err = load(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Malformed(_)));
}

#[test]
fn field_outside_the_edict() {
    let mut bytes = sample().build();
    patch_header(&mut bytes, |h| h.entity_fields = 2);
    let err = load(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Malformed(_)));
}

#[test]
fn unknown_opcode() {
    let mut b = sample();
    b.function("broken", &[], |f| {
        f.emit_raw(99, 0, 0, 0);
    });
    let err = load(&b.build()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadOpcode { opcode: 99, .. }));
}

#[test]
fn backward_branch_before_the_program() {
    let mut b = sample();
    b.function("broken", &[], |f| {
        f.emit(Opcode::Goto, -10_000, 0, 0);
    });
    let err = load(&b.build()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadBranch { target, .. } if target < 0));
}

#[test]
fn conditional_branch_past_the_end() {
    let mut b = sample();
    let cond = b.global_float("cond", 1.0);
    b.function("broken", &[], |f| {
        f.emit(Opcode::If, cond, 300, 0);
    });
    let err = load(&b.build()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadBranch { .. }));
}

#[test]
fn operand_outside_the_globals() {
    let mut b = sample();
    b.function("broken", &[], |f| {
        f.emit(Opcode::StoreF, 1, 20_000, 0);
    });
    let err = load(&b.build()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Malformed(_)));
}

#[test]
fn function_entry_outside_the_statements() {
    let mut b = sample();
    let f = b.function("broken", &[], |_| {});
    b.raw_function_mut(f).unwrap().first_statement = 10_000;
    let err = load(&b.build()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Malformed(_)));
}

// =============================================================================
// Content Sources
// =============================================================================

#[test]
fn load_from_directory() {
    let dir = std::env::temp_dir().join(format!("qcvm-progs-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("progs.dat"), sample().build()).unwrap();

    let source = DirSource::new(&dir);
    let image = ProgramImage::load(&source, "progs.dat", None, &LoadOptions::default());
    std::fs::remove_dir_all(&dir).ok();

    assert!(image.unwrap().program.find_function("worldspawn").is_some());
}

#[test]
fn missing_file_is_io_error() {
    let source = MemorySource::new();
    let err =
        ProgramImage::load(&source, "progs.dat", None, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Io(_)));
}

#[test]
fn empty_override_is_ignored() {
    let source = MemorySource::new().with_file("progs.dat", sample().build());
    let image =
        ProgramImage::load(&source, "progs.dat", Some(""), &LoadOptions::default()).unwrap();
    assert!(image.program.find_function("worldspawn").is_some());
}
