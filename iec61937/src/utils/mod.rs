//! Utility functions and supporting infrastructure.
//!
//! Error types shared across the crate and the 16-bit word byte-order helpers
//! used when lifting payloads off the wire.

pub mod byteorder;
pub mod errors;
