use huginn::{HuginnError, Result};

#[test]
fn test_error_display() {
    let err = HuginnError::DuplicateBatch("launch".to_string());
    assert!(err.to_string().contains("launch"));

    let err = HuginnError::BatchTooLarge { size: 12, max: 10 };
    let msg = err.to_string();
    assert!(msg.contains("12") && msg.contains("10"));
}

#[test]
fn test_analysis_error_names_framework() {
    let err = HuginnError::Analysis {
        framework: "STEPPS".into(),
        message: "model offline".into(),
    };
    assert_eq!(err.to_string(), "analysis failed (STEPPS): model offline");
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(HuginnError::EmptyBatch)
    }
    assert!(returns_error().is_err());
}

#[test]
fn test_json_error_converts() {
    fn parse() -> Result<serde_json::Value> {
        Ok(serde_json::from_str("{ nope")?)
    }
    assert!(matches!(parse(), Err(HuginnError::Json(_))));
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn validation_errors() {
    assert!(HuginnError::InvalidBatchId.is_validation());
    assert!(HuginnError::DuplicateBatch("b".into()).is_validation());
    assert!(HuginnError::EmptyBatch.is_validation());
    assert!(HuginnError::BatchTooLarge { size: 2, max: 1 }.is_validation());
    assert!(HuginnError::InvalidConcurrency(0).is_validation());
}

#[test]
fn non_validation_errors() {
    assert!(!HuginnError::BatchNotFound("b".into()).is_validation());
    assert!(!HuginnError::CacheNotFound("c".into()).is_validation());
    assert!(!HuginnError::Persistence("disk".into()).is_validation());
    assert!(!HuginnError::UnknownFramework("X".into()).is_validation());
}

#[test]
fn item_failures() {
    assert!(HuginnError::UnknownFramework("X".into()).is_item_failure());
    assert!(HuginnError::InvalidInput("empty".into()).is_item_failure());
    assert!(
        HuginnError::Analysis {
            framework: "IDEAL".into(),
            message: "x".into()
        }
        .is_item_failure()
    );
    assert!(!HuginnError::EmptyBatch.is_item_failure());
    assert!(!HuginnError::Configuration("x".into()).is_item_failure());
}
