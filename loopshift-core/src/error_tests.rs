use crate::error::*;

// ===== Error Display Tests =====

#[test]
fn test_empty_identifier_error() {
    let err = Error::EmptyIdentifier { what: "base name" };
    assert_eq!(err.to_string(), "Empty identifier: base name must not be empty");
}

#[test]
fn test_invalid_identifier_error() {
    let err = Error::InvalidIdentifier {
        what: "variable",
        name: "1abc".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid identifier for variable: \"1abc\"");
}

#[test]
fn test_group_too_small_error() {
    let err = Error::GroupTooSmall {
        target: "result".to_string(),
        got: 1,
    };
    assert_eq!(
        err.to_string(),
        "Loop group for result needs at least two loops, got 1"
    );
}

// ===== Identifier Validation Tests =====

#[test]
fn test_ensure_identifier_accepts_plain_names() {
    assert!(ensure_identifier("variable", "item").is_ok());
    assert!(ensure_identifier("variable", "_item").is_ok());
    assert!(ensure_identifier("variable", "$tmp2").is_ok());
    assert!(ensure_identifier("variable", "accumulator").is_ok());
}

#[test]
fn test_ensure_identifier_rejects_empty() {
    assert_eq!(
        ensure_identifier("base name", ""),
        Err(Error::EmptyIdentifier { what: "base name" })
    );
}

#[test]
fn test_ensure_identifier_rejects_bad_characters() {
    assert!(matches!(
        ensure_identifier("variable", "9lives"),
        Err(Error::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        ensure_identifier("variable", "a-b"),
        Err(Error::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        ensure_identifier("variable", "a b"),
        Err(Error::InvalidIdentifier { .. })
    ));
}

#[test]
fn test_result_type_alias() {
    fn validate(n: &str) -> Result<usize> {
        ensure_identifier("variable", n)?;
        Ok(n.len())
    }
    assert_eq!(validate("abc"), Ok(3));
    assert!(validate("").is_err());
}

// ===== Property Tests =====

mod properties {
    use crate::error::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_java_style_names_are_accepted(name in "[a-zA-Z_$][a-zA-Z0-9_$]{0,16}") {
            prop_assert!(ensure_identifier("variable", &name).is_ok());
        }

        #[test]
        fn prop_leading_digit_is_rejected(name in "[0-9][a-zA-Z0-9_]{0,16}") {
            let is_invalid = matches!(
                ensure_identifier("variable", &name),
                Err(Error::InvalidIdentifier { .. })
            );
            prop_assert!(is_invalid);
        }
    }
}
