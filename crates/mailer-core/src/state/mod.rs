//! Order status state machine.
//!
//! Pure transition logic with no storage access; the lifecycle service calls
//! it before building any write.

pub mod status;

pub use status::{StatusManager, TransitionError, TransitionRule};
