//! Domain models for the dosechain system.

mod entry;
mod recommendation;
mod request;

pub use entry::*;
pub use recommendation::*;
pub use request::*;
