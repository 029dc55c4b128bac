pub mod adaptors;
pub mod key;
pub mod options;
pub mod store;
pub(crate) mod update;

pub use adaptors::*;
pub use key::*;
pub use options::*;
pub use store::*;
