use super::JsonCodec;
use crate::Codec;
use crate::CodecError;
use crate::Document;
use crate::StorageError;

#[test]
fn test_round_trip_preserves_metadata_and_body() {
    let codec = JsonCodec;
    let doc = Document::new(
        "alpha",
        Some("team-a".to_string()),
        serde_json::json!({"replicas": 3}),
    )
    .with_label("tier", "backend");

    let bytes = codec.encode(&doc).expect("encode");
    let decoded = codec.decode(&bytes).expect("decode");
    assert_eq!(doc, decoded);
}

#[test]
fn test_encode_rejects_unnamed_document() {
    let codec = JsonCodec;
    let doc = Document::default();
    assert!(matches!(
        codec.encode(&doc),
        Err(StorageError::Codec(CodecError::Malformed(_)))
    ));
}

#[test]
fn test_decode_rejects_garbage() {
    let codec = JsonCodec;
    assert!(matches!(
        codec.decode(b"not json"),
        Err(StorageError::Codec(CodecError::Json(_)))
    ));
}

#[test]
fn test_missing_optional_fields_default() {
    let codec = JsonCodec;
    let decoded = codec
        .decode(br#"{"metadata":{"name":"bare"}}"#)
        .expect("decode");
    assert_eq!(decoded.metadata.resource_version, 0);
    assert!(decoded.metadata.namespace.is_none());
    assert!(decoded.metadata.labels.is_empty());
}
