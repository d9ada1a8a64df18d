use log::{debug, info, warn};

use crate::codec::{AudioDecoder, DecoderFactory};
use crate::process::resample::Resampler;
use crate::structs::codec::{CodecId, StreamFormat};
use crate::utils::errors::CodecError;

/// Lifecycle of a [`CodecSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loaded(CodecId),
    Decoding(CodecId),
    Closed,
}

/// Outcome of [`CodecSession::decode`].
#[derive(Debug)]
pub enum DecodeStatus {
    /// Converted audio is available in [`CodecSession::pcm`].
    Decoded {
        bytes: usize,
        format_changed: bool,
        /// Payload bytes the decoder did not consume.
        bytes_left: usize,
    },
    /// The decoder refused the packet; the stream has to be restarted.
    Rejected(CodecError),
    /// The decoder produced a frame the resampler cannot take, such as one
    /// without a sample rate or with too many channels.
    UnusableFormat(StreamFormat),
}

/// Active decoder, last known output format and the converter feeding the
/// playback device.
#[derive(Debug)]
pub struct CodecSession<D> {
    state: SessionState,
    decoder: Option<D>,
    format: StreamFormat,
    resampler: Resampler,
    pcm: Vec<u8>,
}

impl<D> Default for CodecSession<D> {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            decoder: None,
            format: StreamFormat::default(),
            resampler: Resampler::new(),
            pcm: Vec::new(),
        }
    }
}

impl<D: AudioDecoder> CodecSession<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn codec(&self) -> Option<CodecId> {
        match self.state {
            SessionState::Loaded(codec) | SessionState::Decoding(codec) => Some(codec),
            SessionState::Idle | SessionState::Closed => None,
        }
    }

    /// Last known output format. Zero until something has been decoded or
    /// PCM has been loaded.
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn resampler(&self) -> &Resampler {
        &self.resampler
    }

    /// Interleaved S16 output of the last successful decode.
    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    /// Switches the session to `codec`. Returns `false` when it is already
    /// loaded.
    ///
    /// Raw PCM needs no decoder and installs the fixed capture format.
    pub fn load<F>(&mut self, codec: CodecId, factory: &mut F) -> Result<bool, CodecError>
    where
        F: DecoderFactory<Decoder = D>,
    {
        if self.codec() == Some(codec) {
            return Ok(false);
        }

        if let Some(previous) = self.codec() {
            info!("codec changed from {previous} to {codec}");
        }
        self.decoder = None;

        if codec == CodecId::Pcm {
            self.set_format(StreamFormat::PCM);
        } else {
            self.decoder = Some(factory.open(codec)?);
            debug!("opened {codec} decoder");
        }

        self.state = SessionState::Loaded(codec);
        Ok(true)
    }

    /// Decodes one packet and converts the result to interleaved S16.
    ///
    /// Failures never end the session here; they come back as
    /// [`DecodeStatus::Rejected`] or [`DecodeStatus::UnusableFormat`] and
    /// the caller restarts the stream.
    pub fn decode(&mut self, payload: &[u8]) -> DecodeStatus {
        let (SessionState::Loaded(codec) | SessionState::Decoding(codec)) = self.state else {
            return DecodeStatus::Rejected(CodecError::Decode("no codec loaded".into()));
        };
        let Some(decoder) = self.decoder.as_mut() else {
            return DecodeStatus::Rejected(CodecError::Decode(format!("{codec} has no decoder")));
        };

        let decoded = match decoder.decode(payload) {
            Ok(decoded) => decoded,
            Err(e) => return DecodeStatus::Rejected(e),
        };

        let Some(bytes_left) = payload.len().checked_sub(decoded.consumed) else {
            return DecodeStatus::Rejected(CodecError::Overconsumed {
                consumed: decoded.consumed,
                len: payload.len(),
            });
        };
        if bytes_left > 0 {
            debug!("still some bytes left {bytes_left}");
        }

        self.state = SessionState::Decoding(codec);

        let Some(frame) = decoded.frame else {
            self.pcm.clear();
            return DecodeStatus::Decoded {
                bytes: 0,
                format_changed: false,
                bytes_left,
            };
        };

        let format_changed = frame.format != self.format;
        if format_changed {
            if let Err(e) = self.resampler.configure(frame.format) {
                warn!("unusable decoded format {}: {e}", frame.format);
                self.pcm.clear();
                return DecodeStatus::UnusableFormat(frame.format);
            }
            if frame.format.channels != self.format.channels {
                info!(
                    "channels changed: {} > {}",
                    self.format.channels, frame.format.channels
                );
            }
            self.format = frame.format;
        }

        let bytes = match self.resampler.convert(&frame, &mut self.pcm) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("cannot convert decoded frame: {e}");
                return DecodeStatus::Rejected(CodecError::Decode(e.to_string()));
            }
        };

        DecodeStatus::Decoded {
            bytes,
            format_changed,
            bytes_left,
        }
    }

    /// Drops the decoder. The session cannot be used afterwards.
    pub fn close(&mut self) {
        self.decoder = None;
        self.pcm.clear();
        self.state = SessionState::Closed;
    }

    fn set_format(&mut self, format: StreamFormat) {
        if format.channels != self.format.channels && self.format.channels != 0 {
            info!(
                "channels changed: {} > {}",
                self.format.channels, format.channels
            );
        }
        self.format = format;
    }
}
