//! Integration tests for the string table
//!
//! Tests image strings, runtime appends, and the temp ring.

use qcvm_foundation::{ErrorKind, StringRef};
use qcvm_progs::{ImageBuilder, LoadOptions, ProgramImage};

fn image(options: &LoadOptions) -> ProgramImage {
    let mut b = ImageBuilder::new();
    b.global_string("greeting", "hello there");
    ProgramImage::from_bytes(&b.build(), options).unwrap()
}

fn greeting(image: &ProgramImage) -> StringRef {
    let def = image.program.find_global("greeting").unwrap();
    image.globals.string(usize::from(def.ofs)).unwrap()
}

// =============================================================================
// Image Strings
// =============================================================================

#[test]
fn image_strings_resolve_from_globals() {
    let image = image(&LoadOptions::default());
    let s = greeting(&image);
    assert_eq!(image.strings.get_str(s).unwrap(), "hello there");
}

#[test]
fn null_string_is_empty() {
    let image = image(&LoadOptions::default());
    assert_eq!(image.strings.get(StringRef::NULL).unwrap(), b"");
    assert!(image.strings.is_empty_string(StringRef::NULL));
}

#[test]
fn references_outside_the_table_fail() {
    let image = image(&LoadOptions::default());
    let len = i32::try_from(image.strings.len()).unwrap();
    let err = image.strings.get(StringRef(len + 10)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadString(_)));
}

// =============================================================================
// Runtime Strings
// =============================================================================

#[test]
fn appended_strings_are_stable() {
    let mut image = image(&LoadOptions::default());
    let a = image.strings.set(b"player").unwrap();
    for i in 0..50 {
        image.strings.set(format!("item_{i}").as_bytes()).unwrap();
    }
    assert_eq!(image.strings.get(a).unwrap(), b"player");
    assert_eq!(image.strings.set(b"player").unwrap(), a);
}

#[test]
fn appended_strings_stop_at_nul() {
    let mut image = image(&LoadOptions::default());
    let s = image.strings.set(b"left\0right").unwrap();
    assert_eq!(image.strings.get(s).unwrap(), b"left");
}

#[test]
fn capacity_is_enforced() {
    let mut image = image(&LoadOptions::default().with_string_capacity(16));
    image.strings.set(b"0123456789").unwrap();
    let err = image.strings.set(b"abcdefghij").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StringTableFull { capacity: 16 }));
}

#[test]
fn temp_ring_reuses_slots() {
    let mut image = image(&LoadOptions::default().with_temp_strings(3, 32));
    let refs: Vec<StringRef> = (0..4)
        .map(|i| image.strings.temp(format!("t{i}").as_bytes()).unwrap())
        .collect();
    assert_eq!(refs[0], refs[3]);
    assert_ne!(refs[1], refs[2]);
    assert_eq!(image.strings.get(refs[0]).unwrap(), b"t3");
    assert_eq!(image.strings.get(refs[2]).unwrap(), b"t2");
}

#[test]
fn temp_without_ring_is_permanent() {
    let mut image = image(&LoadOptions::default().with_temp_strings(0, 0));
    let a = image.strings.temp(b"first").unwrap();
    let b = image.strings.temp(b"second").unwrap();
    assert_eq!(image.strings.get(a).unwrap(), b"first");
    assert_eq!(image.strings.get(b).unwrap(), b"second");
}

#[test]
fn compare_returns_byte_difference() {
    let mut image = image(&LoadOptions::default());
    let a = image.strings.set(b"axe").unwrap();
    let b = image.strings.set(b"ax").unwrap();
    assert_eq!(image.strings.compare(a, a).unwrap(), 0);
    assert_eq!(image.strings.compare(a, b).unwrap(), i32::from(b'e'));
    assert_eq!(image.strings.compare(b, a).unwrap(), -i32::from(b'e'));
}
