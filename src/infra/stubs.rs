#[cfg(test)]
pub use test_stubs::*;
