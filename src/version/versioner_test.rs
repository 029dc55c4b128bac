use super::Versioner;
use super::FROM_BEGINNING;
use crate::Document;
use crate::StorageError;

#[test]
fn test_stamp_and_read_back() {
    let versioner = Versioner;
    let mut doc = Document::new("a", None, serde_json::Value::Null);
    assert_eq!(versioner.object_resource_version(&doc), 0);

    versioner.update_object(&mut doc, 42);
    assert_eq!(versioner.object_resource_version(&doc), 42);
}

#[test]
fn test_parse_sentinels() {
    let versioner = Versioner;
    assert_eq!(versioner.parse_resource_version("").unwrap(), FROM_BEGINNING);
    assert_eq!(versioner.parse_resource_version("0").unwrap(), FROM_BEGINNING);
    assert_eq!(versioner.parse_resource_version("12345").unwrap(), 12345);
}

#[test]
fn test_parse_rejects_non_numeric() {
    let versioner = Versioner;
    assert!(matches!(
        versioner.parse_resource_version("abc"),
        Err(StorageError::InvalidResourceVersion(s)) if s == "abc"
    ));
    assert!(matches!(
        versioner.parse_resource_version("-1"),
        Err(StorageError::InvalidResourceVersion(_))
    ));
}
