use crate::Codec;
use crate::CodecError;
use crate::Document;
use crate::Result;

/// The default codec: one pretty-printed JSON document per object, matching
/// the file backend's on-disk layout where the file itself is the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(
        &self,
        document: &Document,
    ) -> Result<Vec<u8>> {
        if document.metadata.name.is_empty() {
            return Err(CodecError::Malformed("document has no name".to_string()).into());
        }
        Ok(serde_json::to_vec_pretty(document)?)
    }

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<Document> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
