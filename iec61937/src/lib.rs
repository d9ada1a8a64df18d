//! IEC 61937 passthrough for S/PDIF capture.
//!
//! ## Technical Overview
//!
//! An S/PDIF receiver delivers 16-bit stereo frames at 48 kHz. The frames
//! either carry linear PCM or compressed audio wrapped in IEC 61937 data
//! bursts.
//!
//! ### Burst Organization
//!
//! Every burst starts with four 16-bit words, stored little-endian:
//!
//! - **Pa, Pb**: sync words 0xF872 and 0x4E1F
//! - **Pc**: data type (AC-3, E-AC-3, MPEG-1/2, MPEG-2 AAC, DTS I/II/III)
//! - **Pd**: payload length, in bits except for E-AC-3 (bytes)
//!
//! The payload follows with every 16-bit word byte-swapped, then zero
//! padding up to the burst slot of the data type.
//!
//! ### Stream Handling
//!
//! A stream without a preamble in one maximum burst slot (6144 bytes) is
//! played as PCM. The codec of the first burst becomes the stream identity;
//! losing sync or changing codec afterwards restarts the whole pipeline.
//!
//! ## Quick Start
//!
//! 1. Implement [`device::AudioBackend`] for the capture and playback side
//! 2. Implement [`codec::DecoderFactory`] for the decoders you have
//! 3. Drive [`process::pipeline::Pipeline`] until it returns a fatal error
//!
//! ```rust,ignore
//! use iec61937::process::notify::TcpNotifier;
//! use iec61937::process::pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("capture.raw", "out#.raw");
//! let mut pipeline = Pipeline::new(config, backend, decoders, TcpNotifier::default())?;
//! let err = pipeline.run().unwrap_err();
//! eprintln!("{err}");
//! ```

/// Decoder traits implemented by codec backends.
pub mod codec;

/// Capture and playback device traits and the buffered byte reader.
pub mod device;

/// Processing stages of the passthrough loop.
///
/// 1. **Synchronization** ([`process::sync`]): finds burst preambles.
///
/// 2. **Extraction** ([`process::extract`]): assembles payloads and tracks the
///    stream identity.
///
/// 3. **Decoding** ([`process::session`], [`process::resample`]): decodes
///    packets and converts them to S16.
///
/// 4. **Control** ([`process::pipeline`]): opens devices, writes audio and
///    restarts on stream changes.
pub mod process;

/// Data structures of the IEC 61937 layer.
///
/// - **Bursts** ([`structs::burst`]): Preamble, data types, classification
/// - **ADTS** ([`structs::adts`]): AAC frame headers
/// - **Codecs** ([`structs::codec`]): Codec ids, formats, decoded frames
pub mod structs;

/// Supporting infrastructure.
///
/// - **Byte Order** ([`utils::byteorder`]): Word swapping and LE serialization
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
