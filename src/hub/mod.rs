//! Hub side: connection registry, request dispatch, node server
//!
//! The registry and pending table are the shared mutable state of the hub;
//! both are encapsulated behind method APIs and reached only through the
//! dispatcher or a connection's receive loop.

mod dispatcher;
mod pending;
mod registry;
mod server;

pub use dispatcher::*;
pub use pending::*;
pub use registry::*;
pub use server::*;
