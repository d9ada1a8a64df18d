use std::fmt::{self, Display, Formatter};
use std::time::Instant;

use log::{debug, info, warn};

use crate::device::ByteSource;
use crate::process::sync::{SyncOutcome, Synchronizer};
use crate::structs::burst::{BurstHeader, MAX_BURST_SIZE, classify};
use crate::structs::codec::{CodecId, StreamFormat};
use crate::utils::byteorder::swap_words16;
use crate::utils::errors::{BurstError, FatalError};

/// Why the pipeline has to be torn down and rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Garbage budget exhausted while a stream was active.
    SyncLost,
    /// A classified burst carried a different codec than the active stream.
    CodecChanged { from: CodecId, to: CodecId },
    /// A burst could not be classified while a stream was active.
    Unclassified(BurstError),
    /// The decoder rejected a packet.
    DecodeRejected,
    /// Decoding finished without establishing a sample rate.
    NoSampleRate,
    /// A decoded frame announced a channel count the output cannot take.
    UnusableFormat(StreamFormat),
}

impl Display for RestartReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::SyncLost => f.write_str("sync lost on active stream"),
            RestartReason::CodecChanged { from, to } => {
                write!(f, "codec changed from {from} to {to}")
            }
            RestartReason::Unclassified(e) => {
                write!(f, "unclassified burst on active stream: {e}")
            }
            RestartReason::DecodeRejected => f.write_str("decoder rejected packet"),
            RestartReason::NoSampleRate => f.write_str("no sample rate detected"),
            RestartReason::UnusableFormat(format) => {
                write!(f, "unusable decoded format: {format}")
            }
        }
    }
}

/// A byte-order corrected burst payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data_type: u16,
    pub codec: CodecId,
    pub data: Vec<u8>,
    /// False when Pd did not end on a 16-bit boundary.
    pub word_aligned: bool,
    /// Bytes skipped before the preamble.
    pub garbage_len: usize,
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Payload read by [`assemble`], not yet classified.
#[derive(Debug)]
pub struct RawPayload {
    pub header: BurstHeader,
    pub data: Vec<u8>,
    pub word_aligned: bool,
}

/// Reads the payload declared by `header` and restores codec byte order.
///
/// A short read is end of stream; an allocation failure is fatal.
pub fn assemble<S: ByteSource + ?Sized>(
    source: &mut S,
    header: BurstHeader,
) -> Result<RawPayload, FatalError> {
    let len = header.payload_len();
    if !len.word_aligned {
        warn!(
            "Packet not ending at a 16-bit boundary ({} bits), padded to {} bytes",
            header.length, len.bytes
        );
    }

    let mut data = Vec::new();
    data.try_reserve_exact(len.bytes)
        .map_err(|_| FatalError::Alloc(len.bytes))?;
    data.resize(len.bytes, 0);

    source.read_exact(&mut data)?;
    swap_words16(&mut data);

    Ok(RawPayload {
        header,
        data,
        word_aligned: len.word_aligned,
    })
}

/// What the demuxer produced for one pipeline iteration.
#[derive(Debug)]
pub enum DemuxUnit {
    /// No preamble within the budget; [`Demuxer::pcm_block`] holds raw PCM.
    Pcm,
    Packet(Packet),
    /// A burst that could not be classified before any stream was active.
    Unclassified { data_type: u16, error: BurstError },
    Retry,
    Restart(RestartReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastSeen {
    Pcm,
    DataType(u16),
}

/// Synchronizer, packet assembler and stream identity for one capture
/// session.
///
/// The identity is the codec of the first classified burst; any later burst
/// of a different codec, and any loss of sync while it is set, asks for a
/// restart. A fresh `Demuxer` is created on every reinitialization.
#[derive(Debug)]
pub struct Demuxer {
    sync: Synchronizer,
    identity: Option<CodecId>,
    last_seen: Option<LastSeen>,
    unsupported_reports: u32,
    skip_packets: u32,
}

impl Default for Demuxer {
    fn default() -> Self {
        Self::new(MAX_BURST_SIZE)
    }
}

impl Demuxer {
    pub fn new(garbage_capacity: usize) -> Self {
        Self {
            sync: Synchronizer::new(garbage_capacity),
            identity: None,
            last_seen: None,
            unsupported_reports: 0,
            skip_packets: 0,
        }
    }

    /// Forces the next `count` units to come back as [`DemuxUnit::Retry`].
    pub fn with_skip_packets(mut self, count: u32) -> Self {
        self.skip_packets = count;
        self
    }

    pub fn skip_packets(&self) -> u32 {
        self.skip_packets
    }

    /// Codec of the active stream, if a burst has been classified.
    pub fn identity(&self) -> Option<CodecId> {
        self.identity
    }

    /// Warnings issued for unclassifiable bursts. A run of one data type
    /// counts once.
    pub fn unsupported_reports(&self) -> u32 {
        self.unsupported_reports
    }

    /// Capture bytes consumed by the last search; raw PCM after
    /// [`DemuxUnit::Pcm`].
    pub fn pcm_block(&self) -> &[u8] {
        self.sync.garbage()
    }

    /// Produces the next unit from the capture stream.
    pub fn read_unit<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<DemuxUnit, FatalError> {
        let start = Instant::now();

        let garbage_len = match self.sync.next_frame_or_pcm(source)? {
            SyncOutcome::Sync { garbage_len } => garbage_len,
            SyncOutcome::Exhausted => return Ok(self.on_exhausted()),
        };

        debug!(
            "read_packet start in {:.1} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        let data_type = source.read_u16_le()?;
        let length = source.read_u16_le()?;
        let payload = assemble(source, BurstHeader::new(data_type, length))?;

        debug!(
            "read_packet {} bytes in {:.1} ms",
            payload.data.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        let classified = classify(data_type, &payload.data)
            .and_then(|class| Ok((class, class.padding(payload.data.len())?)));

        let (class, padding) = match classified {
            Ok(classified) => classified,
            Err(e) => return Ok(self.on_unclassified(data_type, e)),
        };
        self.last_seen = Some(LastSeen::DataType(data_type));

        debug!("read_packet codec {}", class.codec);

        if padding > 0 {
            let skip_start = Instant::now();
            source.skip(padding)?;
            debug!(
                "read_packet skip {padding} bytes in {:.1} ms",
                skip_start.elapsed().as_secs_f64() * 1000.0
            );
        }

        if self.take_skip() {
            return Ok(DemuxUnit::Retry);
        }

        match self.identity {
            None => self.identity = Some(class.codec),
            Some(active) if active != class.codec => {
                info!("codec changed from {active} to {}", class.codec);
                return Ok(DemuxUnit::Restart(RestartReason::CodecChanged {
                    from: active,
                    to: class.codec,
                }));
            }
            Some(_) => {}
        }

        Ok(DemuxUnit::Packet(Packet {
            data_type,
            codec: class.codec,
            data: payload.data,
            word_aligned: payload.word_aligned,
            garbage_len,
        }))
    }

    fn on_exhausted(&mut self) -> DemuxUnit {
        if self.take_skip() {
            return DemuxUnit::Retry;
        }

        if self.last_seen != Some(LastSeen::Pcm) {
            info!("No packet found > PCM");
        }
        self.last_seen = Some(LastSeen::Pcm);

        if self.identity.is_some() {
            info!("active stream > restart");
            return DemuxUnit::Restart(RestartReason::SyncLost);
        }

        debug!("read_packet PCM");
        DemuxUnit::Pcm
    }

    fn on_unclassified(&mut self, data_type: u16, err: BurstError) -> DemuxUnit {
        if self.last_seen != Some(LastSeen::DataType(data_type)) {
            warn!("{err} (data type {:#06X})", data_type);
            self.unsupported_reports += 1;
        }
        self.last_seen = Some(LastSeen::DataType(data_type));

        if self.identity.is_some() {
            info!("active stream > restart");
            DemuxUnit::Restart(RestartReason::Unclassified(err))
        } else {
            DemuxUnit::Unclassified {
                data_type,
                error: err,
            }
        }
    }

    fn take_skip(&mut self) -> bool {
        if self.skip_packets == 0 {
            return false;
        }

        self.skip_packets -= 1;
        info!("skipping packet {}", self.skip_packets);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ByteReader;
    use crate::process::testing::{ScriptedCapture, StreamBuilder, pcm_bytes};

    fn reader(data: Vec<u8>) -> ByteReader<ScriptedCapture> {
        ByteReader::new(ScriptedCapture::new(data))
    }

    fn expect_packet(unit: DemuxUnit) -> Packet {
        match unit {
            DemuxUnit::Packet(packet) => packet,
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn assembles_and_swaps_payload() -> anyhow::Result<()> {
        let payload: Vec<u8> = (0..64u8).collect();
        let stream = StreamBuilder::new().pcm(10).ac3(&payload).build();

        let mut demuxer = Demuxer::default();
        let packet = expect_packet(demuxer.read_unit(&mut reader(stream))?);

        assert_eq!(packet.codec, CodecId::Ac3);
        assert_eq!(packet.data, payload);
        assert_eq!(packet.garbage_len, 10);
        assert!(packet.word_aligned);
        assert_eq!(demuxer.identity(), Some(CodecId::Ac3));
        Ok(())
    }

    #[test]
    fn padding_aligns_to_next_burst() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .ac3(&[1u8; 100])
            .ac3(&[2u8; 300])
            .build();

        let mut source = reader(stream);
        let mut demuxer = Demuxer::default();

        let first = expect_packet(demuxer.read_unit(&mut source)?);
        let second = expect_packet(demuxer.read_unit(&mut source)?);
        assert_eq!(first.data, [1u8; 100]);
        assert_eq!(second.garbage_len, 0);
        assert_eq!(second.data, [2u8; 300]);
        Ok(())
    }

    #[test]
    fn odd_bit_length_is_padded_not_truncated() -> anyhow::Result<()> {
        let mut stream = Vec::new();
        BurstHeader::new(0x01, 8 * 10 + 8).write_le(&mut stream);
        stream.extend_from_slice(&[0xAB; 12]);
        stream.extend_from_slice(&vec![0u8; 6144]);

        let packet = expect_packet(Demuxer::default().read_unit(&mut reader(stream))?);
        assert_eq!(packet.data.len(), 12);
        assert!(!packet.word_aligned);
        Ok(())
    }

    #[test]
    fn pcm_without_identity() -> anyhow::Result<()> {
        let data = pcm_bytes(MAX_BURST_SIZE * 2);
        let mut source = reader(data.clone());
        let mut demuxer = Demuxer::default();

        assert!(matches!(demuxer.read_unit(&mut source)?, DemuxUnit::Pcm));
        assert_eq!(demuxer.pcm_block(), &data[..MAX_BURST_SIZE]);
        assert!(matches!(demuxer.read_unit(&mut source)?, DemuxUnit::Pcm));
        assert_eq!(demuxer.pcm_block(), &data[MAX_BURST_SIZE..]);
        Ok(())
    }

    #[test]
    fn sync_loss_on_active_stream_restarts() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .ac3(&[0u8; 64])
            .pcm(MAX_BURST_SIZE)
            .build();

        let mut source = reader(stream);
        let mut demuxer = Demuxer::default();

        expect_packet(demuxer.read_unit(&mut source)?);
        assert!(matches!(
            demuxer.read_unit(&mut source)?,
            DemuxUnit::Restart(RestartReason::SyncLost)
        ));
        Ok(())
    }

    #[test]
    fn codec_change_restarts() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .ac3(&[0u8; 64])
            .dts1(&[0u8; 64])
            .build();

        let mut source = reader(stream);
        let mut demuxer = Demuxer::default();

        expect_packet(demuxer.read_unit(&mut source)?);
        assert!(matches!(
            demuxer.read_unit(&mut source)?,
            DemuxUnit::Restart(RestartReason::CodecChanged {
                from: CodecId::Ac3,
                to: CodecId::Dts
            })
        ));
        Ok(())
    }

    #[test]
    fn unsupported_type_retries_then_restarts() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .raw_burst(0x16, &[0u8; 32])
            .ac3(&[0u8; 64])
            .raw_burst(0x16, &[0u8; 32])
            .build();

        let mut source = reader(stream);
        let mut demuxer = Demuxer::default();

        assert!(matches!(
            demuxer.read_unit(&mut source)?,
            DemuxUnit::Unclassified {
                data_type: 0x16,
                ..
            }
        ));
        expect_packet(demuxer.read_unit(&mut source)?);
        assert!(matches!(
            demuxer.read_unit(&mut source)?,
            DemuxUnit::Restart(RestartReason::Unclassified(
                BurstError::UnsupportedDataType(0x16)
            ))
        ));
        Ok(())
    }

    #[test]
    fn unsupported_type_warns_once_per_run() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .repeat(3, |s| s.raw_burst(0x16, &[0u8; 32]))
            .repeat(2, |s| s.raw_burst(0x20, &[0u8; 32]))
            .raw_burst(0x16, &[0u8; 32])
            .build();

        let mut source = reader(stream);
        let mut demuxer = Demuxer::default();

        let mut seen = Vec::new();
        for _ in 0..6 {
            match demuxer.read_unit(&mut source)? {
                DemuxUnit::Unclassified { data_type, .. } => seen.push(data_type),
                other => panic!("expected unclassified burst, got {other:?}"),
            }
        }
        assert_eq!(seen, [0x16, 0x16, 0x16, 0x20, 0x20, 0x16]);
        assert_eq!(demuxer.unsupported_reports(), 3);
        Ok(())
    }

    #[test]
    fn skip_knob_forces_retries() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .ac3(&[0u8; 64])
            .ac3(&[0u8; 64])
            .build();

        let mut source = reader(stream);
        let mut demuxer = Demuxer::default().with_skip_packets(1);

        assert!(matches!(demuxer.read_unit(&mut source)?, DemuxUnit::Retry));
        assert_eq!(demuxer.skip_packets(), 0);
        assert_eq!(demuxer.identity(), None);
        expect_packet(demuxer.read_unit(&mut source)?);
        Ok(())
    }

    #[test]
    fn truncated_payload_is_end_of_stream() {
        let mut stream = Vec::new();
        BurstHeader::new(0x01, 0x3000).write_le(&mut stream);
        stream.extend_from_slice(&[0u8; 100]);

        assert!(matches!(
            Demuxer::default().read_unit(&mut reader(stream)),
            Err(FatalError::EndOfStream)
        ));
    }

    #[test]
    fn oversized_payload_fails_classification() -> anyhow::Result<()> {
        let stream = StreamBuilder::new()
            .raw_burst(0x0B, &[0u8; 2044])
            .build();

        assert!(matches!(
            Demuxer::default().read_unit(&mut reader(stream))?,
            DemuxUnit::Unclassified {
                error: BurstError::PayloadExceedsSlot {
                    payload: 2044,
                    slot: 2048
                },
                ..
            }
        ));
        Ok(())
    }
}
