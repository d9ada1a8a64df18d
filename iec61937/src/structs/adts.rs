//! ADTS header carried at the front of IEC 61937 MPEG-2 AAC bursts.
//!
//! Only the fixed and variable header fields are read; the raw data blocks
//! are left to the decoder.

use std::io::{self, Cursor};

use bitstream_io::{BigEndian, BitRead, BitReader};

use crate::utils::errors::AdtsError;

pub const ADTS_HEADER_SIZE: usize = 7;
pub const ADTS_SYNCWORD: u16 = 0xFFF;

/// Samples per channel in one AAC raw data block.
pub const AAC_SAMPLES_PER_BLOCK: u32 = 1024;

pub const MPEG4_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub mpeg2: bool,
    pub protection_absent: bool,
    /// Audio object type minus one.
    pub profile: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    pub frame_length: u16,
    pub buffer_fullness: u16,
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    pub fn parse(data: &[u8]) -> Result<Self, AdtsError> {
        if data.len() < ADTS_HEADER_SIZE {
            return Err(AdtsError::Truncated(data.len()));
        }

        let header = Self::read_fields(&data[..ADTS_HEADER_SIZE])
            .map_err(|_| AdtsError::Truncated(data.len()))??;

        if header.sampling_frequency_index as usize >= MPEG4_SAMPLE_RATES.len() {
            return Err(AdtsError::InvalidSampleRate(header.sampling_frequency_index));
        }

        if (header.frame_length as usize) < ADTS_HEADER_SIZE {
            return Err(AdtsError::FrameTooShort(header.frame_length));
        }

        Ok(header)
    }

    fn read_fields(data: &[u8]) -> io::Result<Result<Self, AdtsError>> {
        let mut bs: BitReader<_, BigEndian> = BitReader::new(Cursor::new(data));

        let sync: u16 = bs.read_unsigned_var(12)?;
        if sync != ADTS_SYNCWORD {
            return Ok(Err(AdtsError::InvalidSync(sync)));
        }

        let mpeg2 = bs.read_bit()?;
        let _layer: u8 = bs.read_unsigned_var(2)?;
        let protection_absent = bs.read_bit()?;
        let profile: u8 = bs.read_unsigned_var(2)?;
        let sampling_frequency_index: u8 = bs.read_unsigned_var(4)?;
        let _private_bit = bs.read_bit()?;
        let channel_configuration: u8 = bs.read_unsigned_var(3)?;
        let _original_copy = bs.read_bit()?;
        let _home = bs.read_bit()?;
        let _copyright_id_bit = bs.read_bit()?;
        let _copyright_id_start = bs.read_bit()?;
        let frame_length: u16 = bs.read_unsigned_var(13)?;
        let buffer_fullness: u16 = bs.read_unsigned_var(11)?;
        let raw_data_blocks: u8 = bs.read_unsigned_var(2)?;

        Ok(Ok(Self {
            mpeg2,
            protection_absent,
            profile,
            sampling_frequency_index,
            channel_configuration,
            frame_length,
            buffer_fullness,
            raw_data_blocks,
        }))
    }

    /// Header length including the optional CRC.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_SIZE
        } else {
            ADTS_HEADER_SIZE + 2
        }
    }

    pub fn frames(&self) -> u32 {
        self.raw_data_blocks as u32 + 1
    }

    /// Samples per channel carried by the ADTS frame.
    pub fn samples(&self) -> u32 {
        self.frames() * AAC_SAMPLES_PER_BLOCK
    }

    pub fn sample_rate(&self) -> u32 {
        MPEG4_SAMPLE_RATES[self.sampling_frequency_index as usize]
    }

    /// Two-byte AudioSpecificConfig equivalent to this header.
    pub fn audio_specific_config(&self) -> [u8; 2] {
        let object_type = (self.profile as u16 + 1) & 0x1F;
        let asc = (object_type << 11)
            | ((self.sampling_frequency_index as u16 & 0xF) << 7)
            | ((self.channel_configuration as u16 & 0xF) << 3);
        asc.to_be_bytes()
    }
}

#[cfg(test)]
pub(crate) fn adts_header_bytes(
    sampling_frequency_index: u8,
    channel_configuration: u8,
    frame_length: u16,
    raw_data_blocks: u8,
) -> [u8; ADTS_HEADER_SIZE] {
    // AAC LC, MPEG-4, no CRC, buffer fullness 0x7FF.
    let profile = 1u8;
    [
        0xFF,
        0xF1,
        (profile << 6) | (sampling_frequency_index << 2) | (channel_configuration >> 2),
        ((channel_configuration & 0x3) << 6) | ((frame_length >> 11) as u8 & 0x3),
        (frame_length >> 3) as u8,
        ((frame_length as u8 & 0x7) << 5) | 0x1F,
        0xFC | (raw_data_blocks & 0x3),
    ]
}

#[test]
fn parse_lc_stereo_48k() -> Result<(), AdtsError> {
    let bytes = adts_header_bytes(3, 2, 371, 0);
    let header = AdtsHeader::parse(&bytes)?;

    assert!(header.protection_absent);
    assert_eq!(header.profile, 1);
    assert_eq!(header.sample_rate(), 48000);
    assert_eq!(header.channel_configuration, 2);
    assert_eq!(header.frame_length, 371);
    assert_eq!(header.buffer_fullness, 0x7FF);
    assert_eq!(header.samples(), 1024);
    assert_eq!(header.header_len(), 7);
    assert_eq!(header.audio_specific_config(), [0x11, 0x90]);
    Ok(())
}

#[test]
fn multiple_raw_blocks_scale_samples() -> Result<(), AdtsError> {
    let header = AdtsHeader::parse(&adts_header_bytes(3, 6, 1500, 3))?;
    assert_eq!(header.frames(), 4);
    assert_eq!(header.samples(), 4096);
    Ok(())
}

#[test]
fn rejects_bad_headers() {
    assert_eq!(
        AdtsHeader::parse(&[0xFF, 0xF1, 0x4C]),
        Err(AdtsError::Truncated(3))
    );

    let mut bytes = adts_header_bytes(3, 2, 371, 0);
    bytes[1] = 0x01;
    assert_eq!(AdtsHeader::parse(&bytes), Err(AdtsError::InvalidSync(0xFF0)));

    assert_eq!(
        AdtsHeader::parse(&adts_header_bytes(13, 2, 371, 0)),
        Err(AdtsError::InvalidSampleRate(13))
    );
    assert_eq!(
        AdtsHeader::parse(&adts_header_bytes(3, 2, 5, 0)),
        Err(AdtsError::FrameTooShort(5))
    );
}
