//! Smaller cancellation-aware helpers built from [`SignalQueue`](crate::SignalQueue),
//! channels and timers.

mod generator;
pub use generator::Generator;

mod limit;
pub use limit::time_limit;

mod race;
pub use race::{Searcher, first_success, searcher};

mod merge;
pub use merge::merge;
