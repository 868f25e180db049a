//! Shared types for the followtrack metrics tracker.

mod account;
mod cycle;
mod notification;
mod stats;

pub use account::*;
pub use cycle::*;
pub use notification::*;
pub use stats::*;
