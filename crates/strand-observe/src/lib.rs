//! Process-wide logging setup for services built on strand.

mod logger;
pub use logger::*;
