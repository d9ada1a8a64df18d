//! Codec identities, stream formats and decoded audio frames.

use std::fmt::{self, Display, Formatter};

use serde::{Serialize, Serializer};

/// Sample rate assumed for unencapsulated PCM on the capture side.
pub const PCM_SAMPLE_RATE: u32 = 48000;

/// Channel count assumed for unencapsulated PCM on the capture side.
pub const PCM_CHANNELS: u16 = 2;

/// Codec carried by a burst, or raw PCM when no burst is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// Unencapsulated 16-bit little-endian PCM.
    Pcm,
    Ac3,
    Eac3,
    Mp1,
    Mp2,
    Mp3,
    Aac,
    Dts,
}

impl CodecId {
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Pcm => "pcm_s16le",
            CodecId::Ac3 => "ac3",
            CodecId::Eac3 => "eac3",
            CodecId::Mp1 => "mp1",
            CodecId::Mp2 => "mp2",
            CodecId::Mp3 => "mp3",
            CodecId::Aac => "aac",
            CodecId::Dts => "dts",
        }
    }
}

impl Display for CodecId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for CodecId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Speaker assignment bitmask (bit 0 front left, bit 1 front right, bit 2
/// front centre, bit 3 LFE, bits 4/5 rear left/right, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelLayout(pub u64);

impl ChannelLayout {
    pub const MONO: Self = Self(0x4);
    pub const STEREO: Self = Self(0x3);
    pub const SURROUND_5_1: Self = Self(0x3F);
    pub const SURROUND_7_1: Self = Self(0x63F);

    pub fn channel_count(self) -> u32 {
        self.0.count_ones()
    }

    /// Conventional layout for a bare channel count, for decoders that do
    /// not report speaker positions.
    pub fn from_channel_count(channels: u16) -> Self {
        match channels {
            0 => Self(0),
            1 => Self::MONO,
            2 => Self::STEREO,
            6 => Self::SURROUND_5_1,
            8 => Self::SURROUND_7_1,
            n => Self(u64::MAX >> (64 - u32::from(n.min(64)))),
        }
    }
}

impl Display for ChannelLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Channel count, sample rate and layout of decoded audio.
///
/// The all-zero value means "no format established yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub layout: ChannelLayout,
}

impl StreamFormat {
    /// Fixed parameters used for unencapsulated capture data.
    pub const PCM: Self = Self {
        channels: PCM_CHANNELS,
        sample_rate: PCM_SAMPLE_RATE,
        layout: ChannelLayout::STEREO,
    };

    pub fn new(channels: u16, sample_rate: u32, layout: ChannelLayout) -> Self {
        Self {
            channels,
            sample_rate,
            layout,
        }
    }

    /// Size of one interleaved S16 frame in bytes.
    pub fn s16_frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

impl Display for StreamFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch, {} Hz, layout {}",
            self.channels, self.sample_rate, self.layout
        )
    }
}

/// Sample storage of a decoded frame as handed over by a decoder backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// One plane per channel, normalized to [-1.0, 1.0].
    PlanarF32(Vec<Vec<f32>>),
    /// Interleaved signed 16-bit samples.
    InterleavedS16(Vec<i16>),
}

/// One block of decoded audio.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub format: StreamFormat,
    /// Samples per channel.
    pub frames: usize,
    pub samples: Samples,
}

#[test]
fn codec_names_serialize_as_strings() {
    let json = serde_json::to_string(&CodecId::Eac3).unwrap();
    assert_eq!(json, "\"eac3\"");
    assert_eq!(CodecId::Pcm.to_string(), "pcm_s16le");
}

#[test]
fn layout_channel_counts() {
    assert_eq!(ChannelLayout::STEREO.channel_count(), 2);
    assert_eq!(ChannelLayout::SURROUND_5_1.channel_count(), 6);
    assert_eq!(ChannelLayout::SURROUND_7_1.channel_count(), 8);
    assert_eq!(format!("{}", ChannelLayout::SURROUND_5_1), "0000003f");
}

#[test]
fn layout_from_bare_channel_count() {
    assert_eq!(ChannelLayout::from_channel_count(6), ChannelLayout::SURROUND_5_1);
    assert_eq!(ChannelLayout::from_channel_count(3).channel_count(), 3);
    assert_eq!(ChannelLayout::from_channel_count(0).channel_count(), 0);
}
