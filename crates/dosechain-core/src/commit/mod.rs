//! Simulated write-once ledger commit.
//!
//! Protocol:
//! 1. Submit the fingerprint and recommendation metadata (`Submitted`)
//! 2. Wait for the store to acknowledge (`Pending`)
//! 3. Wait for confirmation (`Confirmed`) or rejection (`Rejected`)
//!
//! Progress goes through an optional bounded channel. Every notification is
//! sent before the terminal result is returned.

mod simulator;

pub use simulator::*;
