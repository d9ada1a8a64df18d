//! Data structures representing stream components.
//!
//! Burst preambles and their classification, the ADTS header used to size
//! AAC bursts, and the codec/format types shared by the decode path.

pub mod adts;
pub mod burst;
pub mod codec;
