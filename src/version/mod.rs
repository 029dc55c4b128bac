mod generator;
mod versioner;

#[cfg(test)]
mod versioner_test;

pub use generator::*;
pub use versioner::*;
