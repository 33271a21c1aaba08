//! Integration tests for symbol resolution
//!
//! Tests hot field resolution and the field name cache.

use qcvm_foundation::Type;
use qcvm_progs::{FieldCache, HotFields, ImageBuilder, LoadOptions, Program, ProgramImage};

fn program(fields: &[(&str, Type)]) -> Program {
    let mut b = ImageBuilder::new();
    for &(name, ty) in fields {
        b.field(name, ty);
    }
    ProgramImage::from_bytes(&b.build(), &LoadOptions::default())
        .unwrap()
        .program
}

// =============================================================================
// Hot Fields
// =============================================================================

#[test]
fn full_field_set_resolves() {
    let p = program(&[
        ("classname", Type::String),
        ("model", Type::String),
        ("origin", Type::Vector),
        ("angles", Type::Vector),
        ("velocity", Type::Vector),
        ("frame", Type::Float),
        ("nextthink", Type::Float),
        ("think", Type::Function),
        ("health", Type::Float),
        ("flags", Type::Float),
        ("targetname", Type::String),
    ]);
    let hot = HotFields::resolve(&p);
    assert_eq!(hot.classname, Some(0));
    assert_eq!(hot.origin, Some(2));
    assert_eq!(hot.angles, Some(5));
    assert_eq!(hot.think, Some(13));
    assert_eq!(hot.targetname, Some(16));
}

#[test]
fn missing_fields_are_absent_not_errors() {
    let hot = HotFields::resolve(&program(&[("origin", Type::Vector)]));
    assert_eq!(hot.origin, Some(0));
    assert_eq!(hot.health, None);
    assert_eq!(HotFields::offset(hot.health), 0);
}

#[test]
fn mistyped_fields_are_absent() {
    let hot = HotFields::resolve(&program(&[
        ("origin", Type::Float),
        ("think", Type::Float),
    ]));
    assert_eq!(hot.origin, None);
    assert_eq!(hot.think, None);
}

// =============================================================================
// Field Cache
// =============================================================================

#[test]
fn cache_holds_two_names() {
    let p = program(&[
        ("alpha", Type::Float),
        ("gravity", Type::Float),
        ("items", Type::Float),
    ]);
    let mut cache = FieldCache::new();
    assert_eq!(cache.lookup(&p, "alpha"), Some(0));
    assert_eq!(cache.lookup(&p, "gravity"), Some(1));
    assert_eq!(cache.lookup(&p, "items"), Some(2));
    assert!(!cache.contains("alpha"));
    assert!(cache.contains("gravity"));
    assert!(cache.contains("items"));
}

#[test]
fn cache_does_not_outlive_clear() {
    let first = program(&[("alpha", Type::Float)]);
    let second = program(&[("scale", Type::Float), ("alpha", Type::Float)]);
    let mut cache = FieldCache::new();
    assert_eq!(cache.lookup(&first, "alpha"), Some(0));
    cache.clear();
    assert_eq!(cache.lookup(&second, "alpha"), Some(1));
}
