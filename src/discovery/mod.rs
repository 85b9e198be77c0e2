//! Hub discovery over UDP broadcast
//!
//! The hub periodically advertises its node endpoint as a `hub:<host>:<port>`
//! record; nodes without a configured address listen for the first valid
//! record and connect there.

mod broadcaster;
mod listener;
mod record;

pub use broadcaster::*;
pub use listener::*;
pub use record::*;
