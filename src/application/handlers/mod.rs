//! Application use cases, one handler per operation.

pub mod billing;
pub mod marketplace;
