//! IEC 61937 burst preamble and data-type classification.
//!
//! ## Burst layout
//!
//! Every burst starts with four 16-bit words:
//!
//! - **Pa/Pb**: sync words 0xF872 / 0x4E1F
//! - **Pc**: burst info, low byte is the data type
//! - **Pd**: payload length, in bits for every type except E-AC-3 (bytes)
//!
//! The payload follows, then zero padding up to the burst slot size of the
//! data type. On the capture side each word arrives byte-swapped, so the sync
//! preamble reads `72 F8 1F 4E` and Pc/Pd are little-endian.

use std::fmt::{self, Display, Formatter};

use crate::structs::adts::AdtsHeader;
use crate::structs::codec::CodecId;
use crate::utils::errors::BurstError;

pub const SYNCWORD1: u16 = 0xF872;
pub const SYNCWORD2: u16 = 0x4E1F;

/// Sync preamble as it accumulates in a byte-wise shift register.
pub const SYNC_PATTERN: u32 =
    (SYNCWORD1.swap_bytes() as u32) << 16 | SYNCWORD2.swap_bytes() as u32;

/// Pa, Pb, Pc and Pd.
pub const BURST_HEADER_SIZE: usize = 8;

/// Samples per AC-3 frame.
pub const AC3_FRAME_SIZE: usize = 1536;

/// Largest burst slot the synchronizer will scan before giving up: one AC-3
/// burst (1536 frames, 32 ms at 48 kHz).
pub const MAX_BURST_SIZE: usize = 8 + 1792 + 4344;

/// MPEG burst slot sizes, indexed by `[sample-rate class][layer]` where class
/// 0 is the low sampling frequency extension and 1 is full rate.
pub const MPEG_PKT_OFFSET: [[usize; 3]; 2] = [[3072, 9216, 4608], [1536, 4608, 4608]];

/// DTS burst slot sizes for type I, II and III.
pub const DTS_PKT_OFFSET: [usize; 3] = [2048, 4096, 8192];

/// Burst data types understood by the classifier (low byte of Pc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Ac3 = 0x01,
    Mpeg1Layer1 = 0x04,
    Mpeg1Layer23 = 0x05,
    Mpeg2Ext = 0x06,
    Mpeg2Aac = 0x07,
    Mpeg2Layer1Lsf = 0x08,
    Mpeg2Layer2Lsf = 0x09,
    Mpeg2Layer3Lsf = 0x0A,
    Dts1 = 0x0B,
    Dts2 = 0x0C,
    Dts3 = 0x0D,
    Eac3 = 0x15,
}

impl DataType {
    pub fn from_code(code: u16) -> Option<Self> {
        let data_type = match code & 0xFF {
            0x01 => Self::Ac3,
            0x04 => Self::Mpeg1Layer1,
            0x05 => Self::Mpeg1Layer23,
            0x06 => Self::Mpeg2Ext,
            0x07 => Self::Mpeg2Aac,
            0x08 => Self::Mpeg2Layer1Lsf,
            0x09 => Self::Mpeg2Layer2Lsf,
            0x0A => Self::Mpeg2Layer3Lsf,
            0x0B => Self::Dts1,
            0x0C => Self::Dts2,
            0x0D => Self::Dts3,
            0x15 => Self::Eac3,
            _ => return None,
        };
        Some(data_type)
    }

    /// E-AC-3 declares its payload length in bytes and fills the whole slot.
    pub fn is_byte_length(code: u16) -> bool {
        code == Self::Eac3 as u16
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Ac3 => "AC-3",
            DataType::Mpeg1Layer1 => "MPEG-1 layer 1",
            DataType::Mpeg1Layer23 => "MPEG-1 layer 2/3",
            DataType::Mpeg2Ext => "MPEG-2 extension",
            DataType::Mpeg2Aac => "MPEG-2 AAC",
            DataType::Mpeg2Layer1Lsf => "MPEG-2 layer 1 LSF",
            DataType::Mpeg2Layer2Lsf => "MPEG-2 layer 2 LSF",
            DataType::Mpeg2Layer3Lsf => "MPEG-2 layer 3 LSF",
            DataType::Dts1 => "DTS type I",
            DataType::Dts2 => "DTS type II",
            DataType::Dts3 => "DTS type III",
            DataType::Eac3 => "E-AC-3",
        };
        f.write_str(name)
    }
}

/// Pc and Pd of a burst preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstHeader {
    pub data_type: u16,
    pub length: u16,
}

/// Payload size derived from Pd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLength {
    pub bytes: usize,
    /// False when a bit count did not end on a 16-bit boundary.
    pub word_aligned: bool,
}

impl BurstHeader {
    pub fn new(data_type: u16, length: u16) -> Self {
        Self { data_type, length }
    }

    /// Converts Pd to a byte count.
    ///
    /// Bit counts that are not a multiple of 16 are rounded up to the next
    /// whole word so no payload byte is dropped.
    pub fn payload_len(&self) -> PayloadLength {
        if DataType::is_byte_length(self.data_type) {
            return PayloadLength {
                bytes: self.length as usize,
                word_aligned: true,
            };
        }

        let bits = self.length as usize;
        PayloadLength {
            bytes: bits.div_ceil(16) * 2,
            word_aligned: bits % 16 == 0,
        }
    }

    /// Serializes the preamble the way it appears on the capture side.
    pub fn write_le(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&crate::join_bytes_le!(
            SYNCWORD1,
            SYNCWORD2,
            self.data_type,
            self.length
        ));
    }
}

/// Codec and burst slot size of a classified burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClassification {
    pub codec: CodecId,
    /// Total slot size including header and padding, 0 when the payload
    /// already spans the slot.
    pub burst_slot_size: usize,
}

impl FrameClassification {
    /// Bytes of padding between the end of the payload and the next burst.
    pub fn padding(&self, payload_len: usize) -> Result<usize, BurstError> {
        if self.burst_slot_size == 0 {
            return Ok(0);
        }

        self.burst_slot_size
            .checked_sub(payload_len + BURST_HEADER_SIZE)
            .ok_or(BurstError::PayloadExceedsSlot {
                payload: payload_len,
                slot: self.burst_slot_size,
            })
    }
}

/// Determines codec and burst slot size from Pc and the byte-order corrected
/// start of the payload.
pub fn classify(
    data_type: u16,
    payload_prefix: &[u8],
) -> Result<FrameClassification, BurstError> {
    let Some(kind) = DataType::from_code(data_type) else {
        return Err(BurstError::UnsupportedDataType((data_type & 0xFF) as u8));
    };

    let (codec, burst_slot_size) = match kind {
        DataType::Ac3 => (CodecId::Ac3, AC3_FRAME_SIZE << 2),
        DataType::Eac3 => (CodecId::Eac3, 0),
        DataType::Mpeg1Layer1 => (CodecId::Mp1, MPEG_PKT_OFFSET[1][0]),
        DataType::Mpeg1Layer23 => (CodecId::Mp3, MPEG_PKT_OFFSET[1][1]),
        DataType::Mpeg2Ext => (CodecId::Mp3, 4608),
        DataType::Mpeg2Aac => {
            let adts = AdtsHeader::parse(payload_prefix)?;
            (CodecId::Aac, (adts.samples() as usize) << 2)
        }
        DataType::Mpeg2Layer1Lsf => (CodecId::Mp1, MPEG_PKT_OFFSET[0][0]),
        DataType::Mpeg2Layer2Lsf => (CodecId::Mp2, MPEG_PKT_OFFSET[0][1]),
        DataType::Mpeg2Layer3Lsf => (CodecId::Mp3, MPEG_PKT_OFFSET[0][2]),
        DataType::Dts1 => (CodecId::Dts, DTS_PKT_OFFSET[0]),
        DataType::Dts2 => (CodecId::Dts, DTS_PKT_OFFSET[1]),
        DataType::Dts3 => (CodecId::Dts, DTS_PKT_OFFSET[2]),
    };

    Ok(FrameClassification {
        codec,
        burst_slot_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::adts::adts_header_bytes;

    #[test]
    fn sync_pattern_matches_wire_bytes() {
        assert_eq!(SYNC_PATTERN, u32::from_be_bytes([0x72, 0xF8, 0x1F, 0x4E]));
        assert_eq!(MAX_BURST_SIZE, 6144);
    }

    #[test]
    fn every_supported_type_classifies() {
        let adts = adts_header_bytes(3, 2, 371, 0);
        let expected = [
            (0x01, CodecId::Ac3, 6144),
            (0x04, CodecId::Mp1, 1536),
            (0x05, CodecId::Mp3, 4608),
            (0x06, CodecId::Mp3, 4608),
            (0x07, CodecId::Aac, 4096),
            (0x08, CodecId::Mp1, 3072),
            (0x09, CodecId::Mp2, 9216),
            (0x0A, CodecId::Mp3, 4608),
            (0x0B, CodecId::Dts, 2048),
            (0x0C, CodecId::Dts, 4096),
            (0x0D, CodecId::Dts, 8192),
            (0x15, CodecId::Eac3, 0),
        ];

        for (code, codec, slot) in expected {
            let class = classify(code, &adts).unwrap();
            assert_eq!(class.codec, codec, "data type {code:#04X}");
            assert_eq!(class.burst_slot_size, slot, "data type {code:#04X}");
            assert!(class.padding(64).is_ok());
        }
    }

    #[test]
    fn classification_uses_low_byte_only() {
        // Pc high byte carries error flags and type-dependent info.
        let class = classify(0x1F01, &[]).unwrap();
        assert_eq!(class.codec, CodecId::Ac3);
    }

    #[test]
    fn unsupported_codes_never_panic() {
        for code in 0u16..=0xFF {
            if DataType::from_code(code).is_some() {
                continue;
            }
            assert_eq!(
                classify(code, &[]),
                Err(BurstError::UnsupportedDataType(code as u8))
            );
        }
    }

    #[test]
    fn aac_needs_a_valid_adts_header() {
        assert!(matches!(
            classify(0x07, &[0x00; 4]),
            Err(BurstError::InvalidAdts(_))
        ));
        assert!(matches!(
            classify(0x07, &[0x12; 16]),
            Err(BurstError::InvalidAdts(_))
        ));
    }

    #[test]
    fn padding_rules() {
        let ac3 = classify(0x01, &[]).unwrap();
        assert_eq!(ac3.padding(1536), Ok(6144 - 1536 - 8));
        assert_eq!(
            ac3.padding(6140),
            Err(BurstError::PayloadExceedsSlot {
                payload: 6140,
                slot: 6144
            })
        );

        let eac3 = classify(0x15, &[]).unwrap();
        assert_eq!(eac3.padding(24000), Ok(0));
    }

    #[test]
    fn payload_length_from_pd() {
        let ac3 = BurstHeader::new(0x01, 0x3000);
        assert_eq!(
            ac3.payload_len(),
            PayloadLength {
                bytes: 1536,
                word_aligned: true
            }
        );

        let odd = BurstHeader::new(0x01, 0x3008);
        assert_eq!(
            odd.payload_len(),
            PayloadLength {
                bytes: 1538,
                word_aligned: false
            }
        );

        let eac3 = BurstHeader::new(0x15, 6001);
        assert_eq!(eac3.payload_len().bytes, 6001);
    }

    #[test]
    fn header_serializes_swapped() {
        let mut bytes = Vec::new();
        BurstHeader::new(0x01, 0x3000).write_le(&mut bytes);
        assert_eq!(bytes, [0x72, 0xF8, 0x1F, 0x4E, 0x01, 0x00, 0x00, 0x30]);
    }
}
