use crate::Document;
use crate::Result;
use crate::StorageError;

/// The "from now on" watch sentinel: no replay, live events only.
pub const FROM_BEGINNING: u64 = 0;

/// Resource-version capability exposed alongside each store: read a
/// document's version, stamp a freshly assigned one, and parse the string
/// form callers hand over the wire.
#[derive(Debug, Default, Clone, Copy)]
pub struct Versioner;

impl Versioner {
    pub fn object_resource_version(
        &self,
        document: &Document,
    ) -> u64 {
        document.metadata.resource_version
    }

    pub fn update_object(
        &self,
        document: &mut Document,
        resource_version: u64,
    ) {
        document.metadata.resource_version = resource_version;
    }

    /// Empty and `"0"` both mean "from the beginning". Anything that is not
    /// a base-10 u64 is the caller's mistake, not ours.
    pub fn parse_resource_version(
        &self,
        raw: &str,
    ) -> Result<u64> {
        if raw.is_empty() {
            return Ok(FROM_BEGINNING);
        }
        raw.parse::<u64>()
            .map_err(|_| StorageError::InvalidResourceVersion(raw.to_string()))
    }
}
