//! Embeddable versioned object store with live-watch delivery.
//!
//! Objects live under hierarchical keys, every write mints a strictly
//! increasing resource version, and watchers observe mutations in commit
//! order. The [`Storage`] trait has two interchangeable backends: an
//! in-memory map and a plain-file tree.

mod codec;
mod config;
mod constants;
mod document;
mod errors;
mod storage;
mod version;
mod watch;

pub use codec::*;
pub use config::*;
pub use document::*;
pub use errors::*;
pub use storage::*;
pub use version::*;
pub use watch::*;
