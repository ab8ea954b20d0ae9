use super::*;

#[test]
fn helpers_build_the_matching_variant() {
    assert!(matches!(StageError::launch("x"), StageError::Launch(_)));
    assert!(matches!(StageError::device("x"), StageError::Device(_)));
    assert!(matches!(StageError::reload("x"), StageError::Reload(_)));
    assert!(matches!(
        StageError::validation("x"),
        StageError::Validation(_)
    ));
    assert!(matches!(StageError::stream("x"), StageError::Stream(_)));
}

#[test]
fn display_includes_category_and_message() {
    let err = StageError::validation("bad geometry");
    assert_eq!(err.to_string(), "validation error: bad geometry");
}

#[test]
fn anyhow_errors_convert_transparently() {
    let source = anyhow::anyhow!("underlying failure");
    let err: StageError = source.into();
    assert!(matches!(err, StageError::Other(_)));
    assert_eq!(err.to_string(), "underlying failure");
}
