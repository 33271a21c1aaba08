//! Integration tests for Word and Value
//!
//! Tests raw word reinterpretation and typed reads and writes.

use qcvm_foundation::{EdictId, FuncRef, StringRef, Type, Value, Word};

// =============================================================================
// Word
// =============================================================================

#[test]
fn float_bits_round_trip() {
    let w = Word::from_f32(1.5);
    assert_eq!(w.bits(), 1.5f32.to_bits());
    assert_eq!(w.as_f32(), 1.5);
}

#[test]
fn int_view_shares_bits_with_float_view() {
    let w = Word::from_i32(-1);
    assert_eq!(w.bits(), u32::MAX);
    assert!(w.as_f32().is_nan());
}

#[test]
fn negative_zero_is_not_zero() {
    assert!(Word::ZERO.is_zero());
    assert!(Word::from_f32(0.0).is_zero());
    assert!(!Word::from_f32(-0.0).is_zero());
}

#[test]
fn booleans_are_floats() {
    assert_eq!(Word::from_bool(true).as_f32(), 1.0);
    assert_eq!(Word::from_bool(false), Word::ZERO);
}

// =============================================================================
// Ids
// =============================================================================

#[test]
fn world_and_null_references() {
    assert!(EdictId::WORLD.is_world());
    assert!(!EdictId::new(3).is_world());
    assert!(FuncRef::NULL.is_null());
    assert!(StringRef::NULL.is_null());
}

#[test]
fn ids_travel_as_raw_words() {
    let id = EdictId::new(42);
    assert_eq!(EdictId::from_word(id.to_word()), id);
    assert_eq!(FuncRef::from_word(FuncRef(7).to_word()), FuncRef(7));
    assert_eq!(StringRef::from_word(StringRef(19).to_word()), StringRef(19));
}

// =============================================================================
// Value
// =============================================================================

#[test]
fn type_sizes() {
    assert_eq!(Type::Vector.size(), 3);
    for ty in [Type::Float, Type::String, Type::Entity, Type::Function] {
        assert_eq!(ty.size(), 1);
    }
}

#[test]
fn type_display_is_lowercase() {
    assert_eq!(Type::Function.to_string(), "function");
    assert_eq!(Type::Vector.to_string(), "vector");
}

#[test]
fn vector_occupies_three_words() {
    let mut block = [Word::ZERO; 5];
    Value::Vector([1.0, 2.0, 3.0]).write(&mut block[1..]);
    assert_eq!(block[0], Word::ZERO);
    assert_eq!(block[3].as_f32(), 3.0);
    assert_eq!(block[4], Word::ZERO);
    assert_eq!(
        Value::read(Type::Vector, &block[1..]),
        Value::Vector([1.0, 2.0, 3.0])
    );
}

#[test]
fn float_write_leaves_neighbours_alone() {
    let mut block = [Word::from_f32(9.0); 3];
    Value::Float(4.0).write(&mut block);
    assert_eq!(block[0].as_f32(), 4.0);
    assert_eq!(block[1].as_f32(), 9.0);
}

#[test]
fn short_block_reads_as_zero() {
    let block = [Word::from_f32(7.0)];
    assert_eq!(
        Value::read(Type::Vector, &block),
        Value::Vector([7.0, 0.0, 0.0])
    );
}

#[test]
fn same_bits_different_types() {
    let block = [Word::from_bits(5)];
    assert_eq!(Value::read(Type::Entity, &block), Value::Entity(EdictId(5)));
    assert_eq!(Value::read(Type::Function, &block), Value::Function(FuncRef(5)));
    assert_eq!(Value::read(Type::Field, &block), Value::Field(5));
    let Value::Float(f) = Value::read(Type::Float, &block) else {
        panic!("float expected");
    };
    assert_eq!(f.to_bits(), 5);
}

#[test]
fn accessors_match_variant() {
    let v = Value::Vector([0.0, 1.0, 0.0]);
    assert_eq!(v.ty(), Type::Vector);
    assert_eq!(v.as_vector(), Some([0.0, 1.0, 0.0]));
    assert_eq!(v.as_float(), None);
    assert_eq!(Value::Entity(EdictId(2)).as_entity(), Some(EdictId(2)));
}
