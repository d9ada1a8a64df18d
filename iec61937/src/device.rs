//! Device boundary: capture and playback handles, the backend that opens
//! them, and the buffered byte source the synchronizer reads from.
//!
//! Capture devices deliver interleaved 16-bit stereo at 48 kHz. Playback
//! devices are opened for a fixed channel count; changing it requires a new
//! handle.

use std::time::Duration;

use log::warn;

use crate::utils::errors::{DeviceError, ReadError};

/// Bytes requested from the capture device per read.
pub const INPUT_CHUNK_SIZE: usize = 768;

/// Blocking capture handle.
pub trait CaptureDevice {
    /// Reads up to `buf.len()` bytes. `Ok(0)` means the device is gone.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Clears a recoverable fault (overrun) so the read can be repeated.
    fn recover(&mut self, err: &DeviceError) -> Result<(), DeviceError>;

    /// Reads with one recovery-and-retry cycle on a recoverable fault.
    fn read_recovering(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        match self.read(buf) {
            Err(e) if e.is_recoverable() => {
                warn!("input {e}");
                self.recover(&e).map_err(|source| recovery_failed(&e, source))?;
                self.read(buf)
            }
            result => result,
        }
    }
}

/// Blocking playback handle.
pub trait PlaybackDevice {
    /// Writes `frames` interleaved S16 frames from `pcm`, returns frames written.
    fn write(&mut self, pcm: &[u8], frames: usize) -> Result<usize, DeviceError>;

    /// Clears a recoverable fault (underrun) so the write can be repeated.
    fn recover(&mut self, err: &DeviceError) -> Result<(), DeviceError>;

    /// Frames queued on the device but not yet played, if the device knows.
    fn delay_frames(&mut self) -> Option<u64> {
        None
    }

    /// Writes with one recovery-and-retry cycle on a recoverable fault.
    fn write_recovering(&mut self, pcm: &[u8], frames: usize) -> Result<usize, DeviceError> {
        match self.write(pcm, frames) {
            Err(e) if e.is_recoverable() => {
                warn!("output {e}");
                self.recover(&e).map_err(|source| recovery_failed(&e, source))?;
                self.write(pcm, frames)
            }
            result => result,
        }
    }
}

fn recovery_failed(cause: &DeviceError, source: DeviceError) -> DeviceError {
    DeviceError::RecoverFailed {
        cause: cause.to_string(),
        source: Box::new(source),
    }
}

/// Parameters a playback device is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackParams {
    pub channels: u16,
    pub sample_rate: u32,
    /// Minimum device buffer time.
    pub buffer_time: Duration,
}

/// Opens device handles by name.
pub trait AudioBackend {
    type Capture: CaptureDevice;
    type Playback: PlaybackDevice;

    fn open_capture(&mut self, name: &str) -> Result<Self::Capture, DeviceError>;

    fn open_playback(
        &mut self,
        name: &str,
        params: &PlaybackParams,
    ) -> Result<Self::Playback, DeviceError>;
}

/// Resolves an output device name for a channel count.
///
/// The first `#` in the template is replaced by the channel count, so
/// `dsp#` selects `dsp2` for stereo and `dsp6` for 5.1.
pub fn output_device_name(template: &str, channels: u16) -> String {
    template.replacen('#', &channels.to_string(), 1)
}

/// Byte-granular reads on top of a capture device.
pub trait ByteSource {
    fn read_u8(&mut self) -> Result<u8, ReadError>;

    /// Fills `buf` completely; a short read is end of stream.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ReadError>;

    fn skip(&mut self, count: usize) -> Result<(), ReadError>;

    fn read_u16_le(&mut self) -> Result<u16, ReadError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
}

/// Buffered reader pulling [`INPUT_CHUNK_SIZE`] bytes at a time from a
/// capture device.
#[derive(Debug)]
pub struct ByteReader<D> {
    device: D,
    buffer: Box<[u8]>,
    pos: usize,
    filled: usize,
    total: u64,
}

impl<D: CaptureDevice> ByteReader<D> {
    pub fn new(device: D) -> Self {
        Self::with_chunk_size(device, INPUT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(device: D, chunk_size: usize) -> Self {
        Self {
            device,
            buffer: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            total: 0,
        }
    }

    /// Total bytes pulled from the device.
    pub fn bytes_read(&self) -> u64 {
        self.total
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    fn available(&self) -> &[u8] {
        &self.buffer[self.pos..self.filled]
    }

    fn fill(&mut self) -> Result<(), ReadError> {
        let n = self.device.read_recovering(&mut self.buffer)?;
        if n == 0 {
            return Err(ReadError::EndOfStream);
        }

        self.pos = 0;
        self.filled = n.min(self.buffer.len());
        self.total += self.filled as u64;
        Ok(())
    }
}

impl<D: CaptureDevice> ByteSource for ByteReader<D> {
    #[inline]
    fn read_u8(&mut self) -> Result<u8, ReadError> {
        if self.pos == self.filled {
            self.fill()?;
        }

        let byte = self.buffer[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ReadError> {
        let mut written = 0;
        while written < buf.len() {
            if self.pos == self.filled {
                self.fill()?;
            }

            let chunk = self.available();
            let n = chunk.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&chunk[..n]);
            written += n;
            self.pos += n;
        }
        Ok(())
    }

    fn skip(&mut self, mut count: usize) -> Result<(), ReadError> {
        while count > 0 {
            if self.pos == self.filled {
                self.fill()?;
            }

            let n = (self.filled - self.pos).min(count);
            self.pos += n;
            count -= n;
        }
        Ok(())
    }
}
