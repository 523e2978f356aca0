use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CacheError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(CacheError::not_found("x").to_string().contains("not found:"));
    assert!(
        CacheError::conversion("x")
            .to_string()
            .contains("conversion error:")
    );
    assert!(
        CacheError::storage("x")
            .to_string()
            .contains("storage error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CacheError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert!(!err.is_not_found());
}

#[test]
fn not_found_is_classified() {
    assert!(CacheError::not_found("26/01/02/x.png").is_not_found());
    assert!(!CacheError::validation("x").is_not_found());
}
