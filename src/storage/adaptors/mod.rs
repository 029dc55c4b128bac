pub mod file;
pub mod mem;

pub use file::*;
pub use mem::*;
