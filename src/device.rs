use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};

use iec61937::device::{AudioBackend, CaptureDevice, PlaybackDevice, PlaybackParams};
use iec61937::utils::errors::DeviceError;

/// Name selecting stdin for capture and stdout for playback.
pub const STDIO: &str = "-";

/// Devices backed by files, FIFOs, character devices or the standard
/// streams.
///
/// Reopening a capture path continues where the previous handle stopped,
/// like reopening a live capture device would.
#[derive(Debug, Default)]
pub struct StreamBackend {
    captures: HashMap<String, File>,
}

impl StreamBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for StreamBackend {
    type Capture = StreamCapture;
    type Playback = StreamPlayback;

    fn open_capture(&mut self, name: &str) -> Result<StreamCapture, DeviceError> {
        let open_err = |source| DeviceError::Open {
            name: name.to_string(),
            source,
        };

        let reader: Box<dyn Read> = if name == STDIO {
            Box::new(io::stdin())
        } else {
            let file = match self.captures.get(name) {
                Some(file) => file.try_clone().map_err(open_err)?,
                None => {
                    let file = File::open(name).map_err(open_err)?;
                    let handle = file.try_clone().map_err(open_err)?;
                    self.captures.insert(name.to_string(), file);
                    handle
                }
            };
            Box::new(file)
        };

        Ok(StreamCapture { reader })
    }

    fn open_playback(
        &mut self,
        name: &str,
        params: &PlaybackParams,
    ) -> Result<StreamPlayback, DeviceError> {
        let writer: Box<dyn Write> = if name == STDIO {
            Box::new(io::stdout())
        } else {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(name)
                .map_err(|source| DeviceError::Open {
                    name: name.to_string(),
                    source,
                })?;
            Box::new(file)
        };

        let frame_bytes = params.channels.max(1) as usize * 2;
        let buffer_micros = params.buffer_time.as_micros() as u64;
        let buffer_frames = (buffer_micros * params.sample_rate as u64 / 1_000_000) as usize;
        let capacity = (buffer_frames * frame_bytes).max(frame_bytes);

        Ok(StreamPlayback {
            writer: BufWriter::with_capacity(capacity, writer),
            frame_bytes,
        })
    }
}

pub struct StreamCapture {
    reader: Box<dyn Read>,
}

impl CaptureDevice for StreamCapture {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        Ok(self.reader.read(buf)?)
    }

    fn recover(&mut self, _err: &DeviceError) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub struct StreamPlayback {
    writer: BufWriter<Box<dyn Write>>,
    frame_bytes: usize,
}

impl PlaybackDevice for StreamPlayback {
    fn write(&mut self, pcm: &[u8], frames: usize) -> Result<usize, DeviceError> {
        let frames = frames.min(pcm.len() / self.frame_bytes);
        self.writer.write_all(&pcm[..frames * self.frame_bytes])?;
        Ok(frames)
    }

    fn recover(&mut self, _err: &DeviceError) -> Result<(), DeviceError> {
        self.writer.flush()?;
        Ok(())
    }

    fn delay_frames(&mut self) -> Option<u64> {
        Some((self.writer.buffer().len() / self.frame_bytes) as u64)
    }
}
