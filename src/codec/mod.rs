mod json;

#[cfg(test)]
mod json_test;

pub use json::*;

use crate::Document;
use crate::Result;

/// Pluggable byte representation for stored documents.
///
/// Both backends persist whatever this produces and trust it to round-trip;
/// `GuaranteedUpdate` also uses the encoded form to detect no-op updates by
/// byte comparison.
pub trait Codec: Send + Sync + 'static {
    fn encode(
        &self,
        document: &Document,
    ) -> Result<Vec<u8>>;

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<Document>;
}
