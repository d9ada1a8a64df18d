use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::codec::DecoderFactory;
use crate::device::{
    AudioBackend, ByteReader, PlaybackDevice, PlaybackParams, output_device_name,
};
use crate::process::extract::{DemuxUnit, Demuxer, RestartReason};
use crate::process::notify::{Notifier, StreamStatus};
use crate::process::session::{CodecSession, DecodeStatus};
use crate::structs::codec::{CodecId, StreamFormat};
use crate::utils::errors::FatalError;

/// Default minimum playback buffer time.
pub const DEFAULT_BUFFER_TIME: Duration = Duration::from_millis(64);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capture device name.
    pub input: String,
    /// Playback device name; the first `#` is replaced by the channel count.
    pub output: String,
    pub buffer_time: Duration,
    /// Debug knob: treat the first N units as retries.
    pub skip_packets: u32,
}

impl PipelineConfig {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            buffer_time: DEFAULT_BUFFER_TIME,
            skip_packets: 0,
        }
    }
}

/// Non-fatal result of one [`Pipeline::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// A raw PCM block was played, `bytes` long.
    Pcm { bytes: usize },
    /// A packet was decoded to `bytes` of S16.
    Decoded { bytes: usize },
    Retry,
    /// Devices and decoder were torn down and rebuilt.
    Restart(RestartReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub pcm_blocks: u64,
    pub packets_decoded: u64,
    pub retries: u64,
    pub restarts: u64,
    pub output_opens: u64,
    pub frames_written: u64,
    /// Playback time of everything written.
    pub audio_time: Duration,
}

#[derive(Debug)]
struct OutputDevice<P> {
    device: P,
    name: String,
    format: StreamFormat,
    max_latency: Duration,
}

impl<P: PlaybackDevice> OutputDevice<P> {
    fn write(&mut self, pcm: &[u8], stats: &mut PipelineStats) -> Result<(), FatalError> {
        let frames = pcm.len() / 2 / self.format.channels as usize;
        if frames == 0 {
            return Ok(());
        }

        let start = Instant::now();
        let written = self
            .device
            .write_recovering(pcm, frames)
            .map_err(FatalError::Playback)?;
        debug!(
            "write {written} frames in {:.1} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        if written < frames {
            warn!("short write to {}: {written} of {frames} frames", self.name);
        }

        let rate = self.format.sample_rate as u64;
        stats.frames_written += written as u64;
        stats.audio_time += Duration::from_nanos(written as u64 * 1_000_000_000 / rate);

        if let Some(delay) = self.device.delay_frames() {
            let latency = Duration::from_nanos(delay * 1_000_000_000 / rate);
            if latency > self.max_latency {
                self.max_latency = latency;
                info!("output latency: {} ms", latency.as_millis());
            }
        }
        Ok(())
    }
}

/// Capture → sync → decode → playback loop with its restart policy.
///
/// All state lives here: the open devices, the demuxer with the current
/// stream identity, and the codec session. A restart rebuilds all three; an
/// output reopen only flushes the input.
pub struct Pipeline<B: AudioBackend, F: DecoderFactory, N> {
    config: PipelineConfig,
    backend: B,
    factory: F,
    notifier: N,
    input: Option<ByteReader<B::Capture>>,
    output: Option<OutputDevice<B::Playback>>,
    demuxer: Demuxer,
    session: CodecSession<F::Decoder>,
    stats: PipelineStats,
}

impl<B, F, N> Pipeline<B, F, N>
where
    B: AudioBackend,
    F: DecoderFactory,
    N: Notifier,
{
    /// Opens the capture device. The output is opened once the first
    /// format is known.
    pub fn new(
        config: PipelineConfig,
        backend: B,
        factory: F,
        notifier: N,
    ) -> Result<Self, FatalError> {
        let demuxer = Demuxer::default().with_skip_packets(config.skip_packets);
        let mut pipeline = Self {
            config,
            backend,
            factory,
            notifier,
            input: None,
            output: None,
            demuxer,
            session: CodecSession::new(),
            stats: PipelineStats::default(),
        };
        pipeline.open_input()?;
        Ok(pipeline)
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn session(&self) -> &CodecSession<F::Decoder> {
        &self.session
    }

    pub fn demuxer(&self) -> &Demuxer {
        &self.demuxer
    }

    /// Format of the open playback device.
    pub fn output_format(&self) -> Option<StreamFormat> {
        self.output.as_ref().map(|o| o.format)
    }

    /// Highest output latency seen since the playback device was opened.
    pub fn max_output_latency(&self) -> Option<Duration> {
        self.output.as_ref().map(|o| o.max_latency)
    }

    /// Runs until a fatal error.
    pub fn run(&mut self) -> Result<(), FatalError> {
        loop {
            self.tick()?;
        }
    }

    /// Processes one unit from the capture stream.
    pub fn tick(&mut self) -> Result<PipelineOutcome, FatalError> {
        self.stats.ticks += 1;

        let Some(input) = self.input.as_mut() else {
            self.open_input()?;
            return Ok(PipelineOutcome::Retry);
        };

        match self.demuxer.read_unit(input)? {
            DemuxUnit::Retry | DemuxUnit::Unclassified { .. } => {
                self.stats.retries += 1;
                Ok(PipelineOutcome::Retry)
            }
            DemuxUnit::Restart(reason) => self.restart(reason),
            DemuxUnit::Pcm => self.play_pcm(),
            DemuxUnit::Packet(packet) => {
                let start = Instant::now();
                if self.session.load(packet.codec, &mut self.factory)? {
                    info!("loaded {} decoder", packet.codec);
                }

                let status = self.session.decode(&packet.data);
                debug!(
                    "decode {} bytes in {:.1} ms",
                    packet.data.len(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                self.play_decoded(packet.codec, status)
            }
        }
    }

    fn play_pcm(&mut self) -> Result<PipelineOutcome, FatalError> {
        let previous = self.session.format();
        self.session.load(CodecId::Pcm, &mut self.factory)?;
        if self.session.format() != previous {
            self.close_output();
        }

        let bytes = self.demuxer.pcm_block().len();
        self.stats.pcm_blocks += 1;

        if self.ensure_output(CodecId::Pcm)? {
            self.write_silence(bytes)?;
        } else if let Some(output) = self.output.as_mut() {
            output.write(self.demuxer.pcm_block(), &mut self.stats)?;
        }

        Ok(PipelineOutcome::Pcm { bytes })
    }

    fn play_decoded(
        &mut self,
        codec: CodecId,
        status: DecodeStatus,
    ) -> Result<PipelineOutcome, FatalError> {
        let (bytes, format_changed) = match status {
            DecodeStatus::Rejected(e) => {
                warn!("Error decoding frame: {e}");
                return self.restart(RestartReason::DecodeRejected);
            }
            DecodeStatus::UnusableFormat(format) if format.sample_rate == 0 => {
                return self.restart(RestartReason::NoSampleRate);
            }
            DecodeStatus::UnusableFormat(format) => {
                return self.restart(RestartReason::UnusableFormat(format));
            }
            DecodeStatus::Decoded {
                bytes,
                format_changed,
                ..
            } => (bytes, format_changed),
        };

        if self.session.format().sample_rate == 0 {
            return self.restart(RestartReason::NoSampleRate);
        }
        self.stats.packets_decoded += 1;

        if format_changed {
            self.close_output();
        }
        if bytes == 0 {
            return Ok(PipelineOutcome::Decoded { bytes });
        }

        if self.ensure_output(codec)? {
            self.write_silence(bytes)?;
        } else if let Some(output) = self.output.as_mut() {
            output.write(self.session.pcm(), &mut self.stats)?;
        }

        Ok(PipelineOutcome::Decoded { bytes })
    }

    /// Opens the output for the session's format unless a matching one is
    /// open. Returns `true` when a device was opened, in which case the
    /// input has been flushed and the pending block is stale.
    fn ensure_output(&mut self, codec: CodecId) -> Result<bool, FatalError> {
        let format = self.session.format();
        if let Some(output) = &self.output {
            if output.format.channels == format.channels {
                return Ok(false);
            }
        }
        self.close_output();

        self.notifier.notify(StreamStatus {
            codec,
            channels: format.channels,
        });

        let name = output_device_name(&self.config.output, format.channels);
        let params = PlaybackParams {
            channels: format.channels,
            sample_rate: format.sample_rate,
            buffer_time: self.config.buffer_time,
        };
        let device = self
            .backend
            .open_playback(&name, &params)
            .map_err(|source| FatalError::OpenOutput {
                name: name.clone(),
                channels: format.channels,
                sample_rate: format.sample_rate,
                source,
            })?;

        info!(
            "Opened output {name} for {codec}: {} channels, {} Hz",
            format.channels, format.sample_rate
        );
        self.stats.output_opens += 1;
        self.output = Some(OutputDevice {
            device,
            name,
            format,
            max_latency: Duration::ZERO,
        });

        self.reinit_input()?;
        Ok(true)
    }

    fn write_silence(&mut self, bytes: usize) -> Result<(), FatalError> {
        let silence = vec![0u8; bytes];
        match self.output.as_mut() {
            Some(output) => output.write(&silence, &mut self.stats),
            None => Ok(()),
        }
    }

    /// Tears down both devices and the decoder, then starts over with a new
    /// stream identity.
    fn restart(&mut self, reason: RestartReason) -> Result<PipelineOutcome, FatalError> {
        info!("Restart: {reason}");
        self.stats.restarts += 1;

        self.close_output();
        self.session.close();
        self.reinit_input()?;
        self.session = CodecSession::new();

        Ok(PipelineOutcome::Restart(reason))
    }

    /// Reopens the capture device and forgets the stream identity.
    fn reinit_input(&mut self) -> Result<(), FatalError> {
        self.input = None;
        self.open_input()?;
        self.demuxer = Demuxer::default().with_skip_packets(self.demuxer.skip_packets());
        Ok(())
    }

    fn open_input(&mut self) -> Result<(), FatalError> {
        let name = &self.config.input;
        let device = self
            .backend
            .open_capture(name)
            .map_err(|source| FatalError::OpenInput {
                name: name.clone(),
                source,
            })?;
        debug!("opened input {name}");
        self.input = Some(ByteReader::new(device));
        Ok(())
    }

    fn close_output(&mut self) {
        if let Some(output) = self.output.take() {
            debug!("closed output {}", output.name);
        }
    }
}
