//! Scripted devices, fake decoders and stream builders for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::codec::{AudioDecoder, Decoded, DecoderFactory};
use crate::device::{AudioBackend, CaptureDevice, PlaybackDevice, PlaybackParams};
use crate::process::notify::{Notifier, StreamStatus};
use crate::structs::burst::{BURST_HEADER_SIZE, BurstHeader, DataType};
use crate::structs::codec::{ChannelLayout, CodecId, DecodedFrame, Samples, StreamFormat};
use crate::utils::byteorder::swap_words16;
use crate::utils::errors::{CodecError, DeviceError};

type Shared<T> = Rc<RefCell<T>>;

/// Bytes that never contain a burst preamble.
pub fn pcm_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 200) as u8).collect()
}

/// Capture device replaying a byte queue, optionally shared between
/// reopened handles.
#[derive(Debug)]
pub struct ScriptedCapture {
    data: Shared<VecDeque<u8>>,
    faults: VecDeque<DeviceError>,
    pub recoveries: u32,
}

impl ScriptedCapture {
    pub fn new(data: Vec<u8>) -> Self {
        Self::shared(Rc::new(RefCell::new(data.into())))
    }

    pub fn shared(data: Shared<VecDeque<u8>>) -> Self {
        Self {
            data,
            faults: VecDeque::new(),
            recoveries: 0,
        }
    }

    pub fn fail_next(&mut self, err: DeviceError) {
        self.faults.push_back(err);
    }
}

impl CaptureDevice for ScriptedCapture {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if let Some(err) = self.faults.pop_front() {
            return Err(err);
        }

        let mut data = self.data.borrow_mut();
        let n = buf.len().min(data.len());
        for (dst, src) in buf.iter_mut().zip(data.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn recover(&mut self, _err: &DeviceError) -> Result<(), DeviceError> {
        self.recoveries += 1;
        Ok(())
    }
}

/// Playback device recording every block written to it.
#[derive(Debug)]
pub struct ScriptedPlayback {
    channels: u16,
    writes: Shared<Vec<Vec<u8>>>,
    faults: VecDeque<DeviceError>,
    last_frames: u64,
    pub recoveries: u32,
}

impl ScriptedPlayback {
    pub fn new(channels: u16) -> Self {
        Self::recording(channels, Rc::default())
    }

    fn recording(channels: u16, writes: Shared<Vec<Vec<u8>>>) -> Self {
        Self {
            channels,
            writes,
            faults: VecDeque::new(),
            last_frames: 0,
            recoveries: 0,
        }
    }

    pub fn fail_next(&mut self, err: DeviceError) {
        self.faults.push_back(err);
    }
}

impl PlaybackDevice for ScriptedPlayback {
    fn write(&mut self, pcm: &[u8], frames: usize) -> Result<usize, DeviceError> {
        if let Some(err) = self.faults.pop_front() {
            return Err(err);
        }

        let len = (frames * self.channels as usize * 2).min(pcm.len());
        self.writes.borrow_mut().push(pcm[..len].to_vec());
        self.last_frames = frames as u64;
        Ok(frames)
    }

    fn recover(&mut self, _err: &DeviceError) -> Result<(), DeviceError> {
        self.recoveries += 1;
        Ok(())
    }

    fn delay_frames(&mut self) -> Option<u64> {
        Some(self.last_frames)
    }
}

/// Backend handing out scripted devices. Clones share all state, so a test
/// can keep one to inspect what the pipeline did.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    input: Shared<VecDeque<u8>>,
    pub captures_opened: Shared<Vec<String>>,
    pub playbacks_opened: Shared<Vec<(String, PlaybackParams)>>,
    pub writes: Shared<Vec<Vec<u8>>>,
    fail_playback_open: bool,
}

impl MockBackend {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: Rc::new(RefCell::new(input.into())),
            ..Self::default()
        }
    }

    pub fn failing_playback(mut self) -> Self {
        self.fail_playback_open = true;
        self
    }

    pub fn output_names(&self) -> Vec<String> {
        self.playbacks_opened
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl AudioBackend for MockBackend {
    type Capture = ScriptedCapture;
    type Playback = ScriptedPlayback;

    fn open_capture(&mut self, name: &str) -> Result<ScriptedCapture, DeviceError> {
        self.captures_opened.borrow_mut().push(name.to_string());
        Ok(ScriptedCapture::shared(Rc::clone(&self.input)))
    }

    fn open_playback(
        &mut self,
        name: &str,
        params: &PlaybackParams,
    ) -> Result<ScriptedPlayback, DeviceError> {
        if self.fail_playback_open {
            return Err(DeviceError::Open {
                name: name.to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            });
        }

        self.playbacks_opened
            .borrow_mut()
            .push((name.to_string(), *params));
        Ok(ScriptedPlayback::recording(
            params.channels,
            Rc::clone(&self.writes),
        ))
    }
}

/// Payload understood by [`FakeDecoder`]: channel count, sample rate and
/// frame count up front, zero filled to `len`.
///
/// A channel count of 0 makes the decoder fail, 0xFF makes it wait for more
/// data.
pub fn fake_payload(channels: u8, sample_rate: u32, frames: u16, len: usize) -> Vec<u8> {
    let mut payload = vec![channels, 0];
    payload.extend_from_slice(&sample_rate.to_le_bytes());
    payload.extend_from_slice(&frames.to_le_bytes());
    payload.resize(len.max(payload.len()), 0);
    payload
}

fn fake_layout(channels: u16) -> ChannelLayout {
    match channels {
        2 => ChannelLayout::STEREO,
        6 => ChannelLayout::SURROUND_5_1,
        8 => ChannelLayout::SURROUND_7_1,
        n => ChannelLayout((1u64 << n) - 1),
    }
}

#[derive(Debug)]
pub struct FakeDecoder {
    consume: Option<usize>,
}

impl AudioDecoder for FakeDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Decoded, CodecError> {
        if payload.len() < 8 {
            return Err(CodecError::Decode(format!("{} byte packet", payload.len())));
        }

        let consumed = self.consume.unwrap_or(payload.len());
        let channels = match payload[0] {
            0 => return Err(CodecError::Decode("invalid frame".into())),
            0xFF => return Ok(Decoded::pending(consumed)),
            n => n as u16,
        };
        let sample_rate = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
        let frames = u16::from_le_bytes([payload[6], payload[7]]) as usize;

        let samples = (0..frames * channels as usize).map(|i| i as i16).collect();
        let frame = DecodedFrame {
            format: StreamFormat::new(channels, sample_rate, fake_layout(channels)),
            frames,
            samples: Samples::InterleavedS16(samples),
        };
        Ok(Decoded::frame(frame, consumed))
    }
}

/// Factory for [`FakeDecoder`]s that logs every open.
#[derive(Debug, Clone, Default)]
pub struct FakeDecoders {
    opened: Shared<Vec<CodecId>>,
    unavailable: Vec<CodecId>,
    consume: Option<usize>,
}

impl FakeDecoders {
    pub fn without(mut self, codec: CodecId) -> Self {
        self.unavailable.push(codec);
        self
    }

    /// Decoders report `bytes` consumed regardless of the packet size.
    pub fn consuming(mut self, bytes: usize) -> Self {
        self.consume = Some(bytes);
        self
    }

    pub fn opened(&self) -> Vec<CodecId> {
        self.opened.borrow().clone()
    }
}

impl DecoderFactory for FakeDecoders {
    type Decoder = FakeDecoder;

    fn open(&mut self, codec: CodecId) -> Result<FakeDecoder, CodecError> {
        if self.unavailable.contains(&codec) {
            return Err(CodecError::NoDecoder(codec));
        }

        self.opened.borrow_mut().push(codec);
        Ok(FakeDecoder {
            consume: self.consume,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Shared<Vec<StreamStatus>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, status: StreamStatus) {
        self.sent.borrow_mut().push(status);
    }
}

/// Builds capture streams the way they appear on the wire.
#[derive(Debug, Default)]
pub struct StreamBuilder {
    bytes: Vec<u8>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pcm(mut self, len: usize) -> Self {
        self.bytes.extend(pcm_bytes(len));
        self
    }

    /// Appends a burst carrying `payload` (codec byte order), padded to
    /// `slot` bytes including the header.
    pub fn burst(mut self, data_type: u16, payload: &[u8], slot: usize) -> Self {
        let length = if DataType::is_byte_length(data_type) {
            payload.len()
        } else {
            payload.len() * 8
        };
        BurstHeader::new(data_type, length as u16).write_le(&mut self.bytes);

        let mut swapped = payload.to_vec();
        swap_words16(&mut swapped);
        self.bytes.extend_from_slice(&swapped);

        let used = BURST_HEADER_SIZE + payload.len();
        self.bytes.resize(self.bytes.len() + slot.saturating_sub(used), 0);
        self
    }

    /// A burst without padding.
    pub fn raw_burst(self, data_type: u16, payload: &[u8]) -> Self {
        let slot = payload.len() + BURST_HEADER_SIZE;
        self.burst(data_type, payload, slot)
    }

    pub fn ac3(self, payload: &[u8]) -> Self {
        self.burst(0x01, payload, 6144)
    }

    pub fn dts1(self, payload: &[u8]) -> Self {
        self.burst(0x0B, payload, 2048)
    }

    pub fn repeat(mut self, count: usize, f: impl Fn(Self) -> Self) -> Self {
        for _ in 0..count {
            self = f(self);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
