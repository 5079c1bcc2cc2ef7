//! Sequencer test suite.
//!
//! Drives upgrades and downgrades against the in-memory store with
//! recording migration doubles.
//!
//! Run with: cargo test --test sequencer

mod test_helpers;

mod test_failures;
mod test_upgrade;
