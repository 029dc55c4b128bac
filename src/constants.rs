// -
// GuaranteedUpdate

/// Upper bound on read-modify-write attempts before the store gives up.
/// The update callback is caller-supplied and may race with other writers;
/// an unbounded loop would risk livelock.
pub(crate) const MAX_UPDATE_ATTEMPTS: u32 = 30;

// -
// Watch

/// Default per-subscription event buffer. A subscriber that falls this far
/// behind the mutation stream gets closed rather than stalling the writer.
pub(crate) const DEFAULT_WATCH_CAPACITY: usize = 1024;

// -
// Resource version layout (snowflake-style)

/// Bits reserved for the per-millisecond sequence counter.
pub(crate) const RV_SEQUENCE_BITS: u64 = 12;
/// Bits reserved for the generator node id.
pub(crate) const RV_NODE_BITS: u64 = 10;
/// Largest node id that fits the layout.
pub(crate) const RV_MAX_NODE_ID: u16 = (1 << RV_NODE_BITS) - 1;
/// Sequence values per millisecond before the generator must roll over.
pub(crate) const RV_SEQUENCE_MASK: u64 = (1 << RV_SEQUENCE_BITS) - 1;

// -
// Keys

/// Tenant used for objects without a namespace in the composite (GRN) form.
pub(crate) const DEFAULT_TENANT: &str = "default";

/// On-disk object file extension for the file backend.
pub(crate) const OBJECT_FILE_EXTENSION: &str = "json";
