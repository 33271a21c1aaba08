//! Integration tests for Error types
//!
//! Tests error construction, display, tiers, and abort context.

use qcvm_foundation::{Error, ErrorContext, ErrorKind, ErrorTier};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_malformed() {
    let err = Error::malformed("function 3 starts past the statements");
    assert!(matches!(err.kind, ErrorKind::Malformed(_)));
    assert!(format!("{err}").contains("function 3"));
}

#[test]
fn error_bad_global() {
    let err = Error::bad_global(400, 120);
    assert!(matches!(
        err.kind,
        ErrorKind::BadGlobal {
            offset: 400,
            len: 120
        }
    ));
    let msg = format!("{err}");
    assert!(msg.contains("400"));
    assert!(msg.contains("120"));
}

#[test]
fn error_bad_edict() {
    let err = Error::bad_edict(9000, 256);
    assert!(matches!(err.kind, ErrorKind::BadEdict { index: 9000, .. }));
    assert!(format!("{err}").contains("9000"));
}

#[test]
fn error_program() {
    let err = Error::program("monster_army: bad spawn");
    assert_eq!(format!("{err}"), "program error: monster_army: bad spawn");
}

#[test]
fn fresh_errors_carry_no_report() {
    let err = Error::internal("oops");
    assert!(!err.is_reported());
    assert!(err.context.is_none());
}

// =============================================================================
// Error Display
// =============================================================================

#[test]
fn error_display_version_mismatch() {
    let err = Error::new(ErrorKind::VersionMismatch {
        expected: 6,
        found: 7,
    });
    let msg = format!("{err}");
    assert!(msg.contains("expected 6"));
    assert!(msg.contains("found 7"));
}

#[test]
fn error_display_runaway() {
    let err = Error::new(ErrorKind::RunawayLoop { budget: 100_000 });
    assert!(format!("{err}").contains("runaway loop"));
}

#[test]
fn error_display_null_function() {
    let err = Error::new(ErrorKind::NullFunctionCall);
    assert_eq!(format!("{err}"), "NULL function");
}

// =============================================================================
// Error Tiers
// =============================================================================

#[test]
fn load_tier() {
    for kind in [
        ErrorKind::VersionMismatch {
            expected: 6,
            found: 5,
        },
        ErrorKind::HeaderCorrupt {
            expected: 5927,
            found: 1,
        },
        ErrorKind::Malformed("x".into()),
        ErrorKind::BadOpcode {
            opcode: 200,
            statement: 1,
        },
        ErrorKind::MissingSymbol("main".into()),
    ] {
        assert_eq!(Error::new(kind).tier(), ErrorTier::Load);
    }
}

#[test]
fn execution_tier() {
    for kind in [
        ErrorKind::NullFunctionCall,
        ErrorKind::StackOverflow { limit: 32 },
        ErrorKind::LocalStackUnderflow,
        ErrorKind::WorldWriteViolation,
        ErrorKind::BadBuiltin { number: 9 },
        ErrorKind::ProgramError("x".into()),
    ] {
        assert_eq!(Error::new(kind).tier(), ErrorTier::Execution);
    }
}

#[test]
fn host_tier() {
    assert_eq!(Error::new(ErrorKind::Io("x".into())).tier(), ErrorTier::Host);
    assert_eq!(
        Error::new(ErrorKind::Serialization("x".into())).tier(),
        ErrorTier::Host
    );
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn context_lists_frames_in_order() {
    let ctx = ErrorContext::new()
        .with_statement("   12 ADD_F       a, b, c")
        .with_frame("    items.qc : touch statement 3")
        .with_frame("   world.qc : worldspawn statement 9");
    let text = ctx.to_string();
    let touch = text.find("touch").unwrap();
    let world = text.find("worldspawn").unwrap();
    assert!(text.starts_with("   12 ADD_F"));
    assert!(touch < world);
}

#[test]
fn context_without_stack_says_so() {
    let ctx = ErrorContext::new().with_statement("    0 DONE");
    assert!(ctx.to_string().contains("<NO STACK>"));
}

#[test]
fn context_marks_error_reported() {
    let err = Error::new(ErrorKind::WorldWriteViolation)
        .with_context(ErrorContext::new().with_edict("EDICT 0:\nhealth 100"));
    assert!(err.is_reported());
    assert!(err.context.unwrap().to_string().contains("health 100"));
}
