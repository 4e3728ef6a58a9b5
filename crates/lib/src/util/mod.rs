//! Shared utilities.
//!
//! Test helpers for faking the external installer live here.

#[cfg(test)]
pub mod testutil;
