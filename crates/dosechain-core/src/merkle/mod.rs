//! Merkle tree for tamper-evident verification of committed predictions.

mod proof;
mod tree;

pub use proof::*;
pub use tree::*;
