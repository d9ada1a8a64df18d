use std::io;

use crate::structs::codec::{CodecId, StreamFormat};

#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open device {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Input overrun occurred")]
    Overrun,

    #[error("Output underrun occurred")]
    Underrun,

    #[error("Device recovery failed after {cause}: {source}")]
    RecoverFailed {
        cause: String,
        #[source]
        source: Box<DeviceError>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// Transient timing faults that the device's recovery primitive can clear.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DeviceError::Overrun | DeviceError::Underrun => true,
            DeviceError::Io(e) => e.kind() == io::ErrorKind::Interrupted,
            _ => false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("End of stream on capture device")]
    EndOfStream,

    #[error("Capture device failed: {0}")]
    Device(#[from] DeviceError),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdtsError {
    #[error("ADTS header needs 7 bytes, got {0}")]
    Truncated(usize),

    #[error("Invalid ADTS syncword {0:#05X}")]
    InvalidSync(u16),

    #[error("Invalid ADTS sampling frequency index {0}")]
    InvalidSampleRate(u8),

    #[error("ADTS frame_length {0} is shorter than its header")]
    FrameTooShort(u16),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstError {
    #[error("Unknown codec {0}")]
    UnsupportedDataType(u8),

    #[error("Invalid AAC packet in IEC 61937: {0}")]
    InvalidAdts(#[from] AdtsError),

    #[error("Payload of {payload} bytes does not fit a {slot}-byte burst slot")]
    PayloadExceedsSlot { payload: usize, slot: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("No decoder available for {0}")]
    NoDecoder(CodecId),

    #[error("Cannot open {codec} decoder: {reason}")]
    Open { codec: CodecId, reason: String },

    #[error("Cannot initialize decoder backend: {0}")]
    Backend(String),

    #[error("Cannot decode input: {0}")]
    Decode(String),

    #[error("Decoder consumed {consumed} bytes of a {len}-byte packet")]
    Overconsumed { consumed: usize, len: usize },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResampleError {
    #[error("Unsupported channel count {0}")]
    UnsupportedChannels(u16),

    #[error("Invalid sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("Resampler used before configuration")]
    NotConfigured,

    #[error("Frame format {actual} does not match configured {expected}")]
    FormatMismatch {
        expected: StreamFormat,
        actual: StreamFormat,
    },

    #[error("Frame declares {expected} samples per channel, buffer holds {actual}")]
    SampleCount { expected: usize, actual: usize },
}

/// Conditions that end the passthrough loop.
#[derive(thiserror::Error, Debug)]
pub enum FatalError {
    #[error("Capture device reached end of stream")]
    EndOfStream,

    #[error("Capture device failed: {0}")]
    Capture(DeviceError),

    #[error("Cannot open audio input {name}: {source}")]
    OpenInput {
        name: String,
        #[source]
        source: DeviceError,
    },

    #[error(
        "Cannot open audio output {name}, channels={channels}, format=s16, rate={sample_rate}: {source}"
    )]
    OpenOutput {
        name: String,
        channels: u16,
        sample_rate: u32,
        #[source]
        source: DeviceError,
    },

    #[error("Could not play audio to output device: {0}")]
    Playback(DeviceError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Cannot allocate {0} bytes for packet payload")]
    Alloc(usize),
}

impl From<ReadError> for FatalError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::EndOfStream => FatalError::EndOfStream,
            ReadError::Device(e) => FatalError::Capture(e),
        }
    }
}
