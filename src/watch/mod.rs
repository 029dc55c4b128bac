mod event;
mod predicate;
mod watch_set;

#[cfg(test)]
mod watch_set_test;

pub use event::*;
pub use predicate::*;
pub use watch_set::*;
