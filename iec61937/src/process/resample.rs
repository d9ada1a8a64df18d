use log::debug;

use crate::structs::codec::{DecodedFrame, Samples, StreamFormat};
use crate::utils::errors::ResampleError;

/// Maximum channel count accepted by [`Resampler::configure`].
pub const MAX_CHANNELS: u16 = 8;

/// Converts decoded frames to native-endian interleaved S16.
///
/// Output rate and channel layout always equal the input; only the sample
/// format changes.
#[derive(Debug, Default)]
pub struct Resampler {
    format: Option<StreamFormat>,
    reconfigurations: u32,
}

impl Resampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares conversion for `format`, replacing any previous setup.
    pub fn configure(&mut self, format: StreamFormat) -> Result<(), ResampleError> {
        if format.channels == 0 || format.channels > MAX_CHANNELS {
            return Err(ResampleError::UnsupportedChannels(format.channels));
        }
        if format.sample_rate == 0 {
            return Err(ResampleError::InvalidSampleRate(format.sample_rate));
        }

        debug!("resampler configured for {format}");
        self.format = Some(format);
        self.reconfigurations += 1;
        Ok(())
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    /// How many times [`configure`](Self::configure) succeeded.
    pub fn reconfigurations(&self) -> u32 {
        self.reconfigurations
    }

    /// Appends `frame` as interleaved S16 to `out`, replacing its contents.
    /// Returns the byte count.
    pub fn convert(&self, frame: &DecodedFrame, out: &mut Vec<u8>) -> Result<usize, ResampleError> {
        let expected = self.format.ok_or(ResampleError::NotConfigured)?;
        if frame.format != expected {
            return Err(ResampleError::FormatMismatch {
                expected,
                actual: frame.format,
            });
        }

        let channels = expected.channels as usize;
        out.clear();
        out.reserve(frame.frames * channels * 2);

        match &frame.samples {
            Samples::InterleavedS16(samples) => {
                if samples.len() != frame.frames * channels {
                    return Err(ResampleError::SampleCount {
                        expected: frame.frames,
                        actual: samples.len() / channels,
                    });
                }
                for sample in samples {
                    out.extend_from_slice(&sample.to_ne_bytes());
                }
            }
            Samples::PlanarF32(planes) => {
                if planes.len() != channels {
                    return Err(ResampleError::FormatMismatch {
                        expected,
                        actual: StreamFormat {
                            channels: planes.len() as u16,
                            ..expected
                        },
                    });
                }
                if let Some(plane) = planes.iter().find(|p| p.len() < frame.frames) {
                    return Err(ResampleError::SampleCount {
                        expected: frame.frames,
                        actual: plane.len(),
                    });
                }
                for i in 0..frame.frames {
                    for plane in planes {
                        out.extend_from_slice(&f32_to_s16(plane[i]).to_ne_bytes());
                    }
                }
            }
        }

        Ok(out.len())
    }
}

#[inline]
fn f32_to_s16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::codec::ChannelLayout;

    fn stereo() -> StreamFormat {
        StreamFormat::new(2, 44100, ChannelLayout::STEREO)
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut resampler = Resampler::new();
        assert_eq!(
            resampler.configure(StreamFormat::new(0, 48000, ChannelLayout::default())),
            Err(ResampleError::UnsupportedChannels(0))
        );
        assert_eq!(
            resampler.configure(StreamFormat::new(2, 0, ChannelLayout::STEREO)),
            Err(ResampleError::InvalidSampleRate(0))
        );
        assert_eq!(resampler.reconfigurations(), 0);
    }

    #[test]
    fn interleaves_planar_float() -> anyhow::Result<()> {
        let mut resampler = Resampler::new();
        resampler.configure(stereo())?;

        let frame = DecodedFrame {
            format: stereo(),
            frames: 2,
            samples: Samples::PlanarF32(vec![vec![1.0, -1.0], vec![0.0, 2.0]]),
        };
        let mut out = Vec::new();
        let bytes = resampler.convert(&frame, &mut out)?;

        assert_eq!(bytes, 8);
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples, [32767, 0, -32767, 32767]);
        Ok(())
    }

    #[test]
    fn passes_s16_through() -> anyhow::Result<()> {
        let mut resampler = Resampler::new();
        resampler.configure(stereo())?;

        let frame = DecodedFrame {
            format: stereo(),
            frames: 2,
            samples: Samples::InterleavedS16(vec![1, -2, 3, -4]),
        };
        let mut out = vec![0xAA; 3];
        resampler.convert(&frame, &mut out)?;

        let expected: Vec<u8> = [1i16, -2, 3, -4]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        assert_eq!(out, expected);
        Ok(())
    }

    #[test]
    fn refuses_unconfigured_or_mismatched_frames() -> anyhow::Result<()> {
        let mut resampler = Resampler::new();
        let frame = DecodedFrame {
            format: StreamFormat::new(6, 48000, ChannelLayout::SURROUND_5_1),
            frames: 1,
            samples: Samples::InterleavedS16(vec![0; 6]),
        };
        let mut out = Vec::new();

        assert_eq!(
            resampler.convert(&frame, &mut out),
            Err(ResampleError::NotConfigured)
        );

        resampler.configure(stereo())?;
        assert!(matches!(
            resampler.convert(&frame, &mut out),
            Err(ResampleError::FormatMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn short_sample_buffer_is_an_error() -> anyhow::Result<()> {
        let mut resampler = Resampler::new();
        resampler.configure(stereo())?;

        let frame = DecodedFrame {
            format: stereo(),
            frames: 4,
            samples: Samples::InterleavedS16(vec![0; 6]),
        };
        assert_eq!(
            resampler.convert(&frame, &mut Vec::new()),
            Err(ResampleError::SampleCount {
                expected: 4,
                actual: 3
            })
        );
        Ok(())
    }
}
