//! Decoder backend built on libavcodec, for the formats symphonia lacks.

use ffmpeg_next as ffmpeg;
use ffmpeg::codec::Id;
use ffmpeg::frame::Audio as AudioFrame;
use ffmpeg::util::format::sample::{Sample, Type};

use iec61937::codec::{AudioDecoder, Decoded, DecoderFactory};
use iec61937::structs::codec::{ChannelLayout, CodecId, DecodedFrame, Samples, StreamFormat};
use iec61937::utils::errors::CodecError;

fn codec_id(codec: CodecId) -> Option<Id> {
    match codec {
        CodecId::Ac3 => Some(Id::AC3),
        CodecId::Eac3 => Some(Id::EAC3),
        CodecId::Dts => Some(Id::DTS),
        CodecId::Mp1 => Some(Id::MP1),
        CodecId::Mp2 => Some(Id::MP2),
        CodecId::Mp3 => Some(Id::MP3),
        CodecId::Aac => Some(Id::AAC),
        CodecId::Pcm => None,
    }
}

#[derive(Debug)]
pub struct FfmpegDecoders;

impl FfmpegDecoders {
    pub fn new() -> Result<Self, CodecError> {
        ffmpeg::init().map_err(|e| CodecError::Backend(e.to_string()))?;
        Ok(Self)
    }
}

impl DecoderFactory for FfmpegDecoders {
    type Decoder = FfmpegDecoder;

    fn open(&mut self, codec: CodecId) -> Result<FfmpegDecoder, CodecError> {
        let id = codec_id(codec).ok_or(CodecError::NoDecoder(codec))?;
        let found = ffmpeg::decoder::find(id).ok_or(CodecError::NoDecoder(codec))?;

        let inner = ffmpeg::codec::Context::new_with_codec(found)
            .decoder()
            .audio()
            .map_err(|e| CodecError::Open {
                codec,
                reason: e.to_string(),
            })?;

        Ok(FfmpegDecoder {
            inner,
            frame: AudioFrame::empty(),
        })
    }
}

pub struct FfmpegDecoder {
    inner: ffmpeg::decoder::Audio,
    frame: AudioFrame,
}

impl AudioDecoder for FfmpegDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Decoded, CodecError> {
        let packet = ffmpeg::Packet::copy(payload);
        self.inner
            .send_packet(&packet)
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let mut output: Option<DecodedFrame> = None;
        while self.inner.receive_frame(&mut self.frame).is_ok() {
            let decoded = convert_frame(&self.frame)?;
            match output.as_mut() {
                None => output = Some(decoded),
                Some(out) if out.format == decoded.format => append(out, decoded),
                Some(_) => log::warn!("dropping frame with changed format {}", decoded.format),
            }
        }

        Ok(match output {
            Some(frame) => Decoded::frame(frame, payload.len()),
            None => Decoded::pending(payload.len()),
        })
    }
}

fn append(out: &mut DecodedFrame, next: DecodedFrame) {
    if let (Samples::PlanarF32(planes), Samples::PlanarF32(more)) = (&mut out.samples, next.samples)
    {
        for (plane, extra) in planes.iter_mut().zip(more) {
            plane.extend(extra);
        }
        out.frames += next.frames;
    }
}

fn convert_frame(frame: &AudioFrame) -> Result<DecodedFrame, CodecError> {
    let channels = frame.channels();
    let frames = frame.samples();
    let kind = frame.format();
    let format = StreamFormat::new(
        channels,
        frame.rate(),
        ChannelLayout::from_channel_count(channels),
    );

    let planes = match kind {
        Sample::U8(Type::Planar)
        | Sample::I16(Type::Planar)
        | Sample::I32(Type::Planar)
        | Sample::F32(Type::Planar)
        | Sample::F64(Type::Planar) => (0..channels as usize)
            .map(|ch| plane_samples(frame.data(ch), kind, frames))
            .collect::<Result<Vec<_>, _>>()?,
        Sample::U8(Type::Packed)
        | Sample::I16(Type::Packed)
        | Sample::I32(Type::Packed)
        | Sample::F32(Type::Packed)
        | Sample::F64(Type::Packed) => {
            let interleaved = plane_samples(frame.data(0), kind, frames * channels as usize)?;
            deinterleave(&interleaved, channels as usize, frames)
        }
        other => {
            return Err(CodecError::Decode(format!(
                "unsupported sample format {other:?}"
            )));
        }
    };

    Ok(DecodedFrame {
        format,
        frames,
        samples: Samples::PlanarF32(planes),
    })
}

/// Reads `count` native-endian samples of `kind` as normalized f32.
fn plane_samples(data: &[u8], kind: Sample, count: usize) -> Result<Vec<f32>, CodecError> {
    let width = kind.bytes();
    let bytes = data.get(..count * width).ok_or_else(|| {
        CodecError::Decode(format!(
            "frame plane holds {} bytes, {count} samples expected",
            data.len()
        ))
    })?;

    let samples = match kind {
        Sample::U8(_) => bytes.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
        Sample::I16(_) => bytes
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        Sample::I32(_) => bytes
            .chunks_exact(4)
            .map(|b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        Sample::F32(_) => bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Sample::F64(_) => bytes
            .chunks_exact(8)
            .map(|b| f64::from_ne_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        other => {
            return Err(CodecError::Decode(format!(
                "unsupported sample format {other:?}"
            )));
        }
    };
    Ok(samples)
}

fn deinterleave(samples: &[f32], channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| {
            samples
                .iter()
                .skip(ch)
                .step_by(channels.max(1))
                .take(frames)
                .copied()
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dolby_and_dts_decoders_open() -> anyhow::Result<()> {
        let mut factory = FfmpegDecoders::new()?;
        for codec in [CodecId::Ac3, CodecId::Eac3, CodecId::Dts] {
            factory.open(codec)?;
        }
        assert!(matches!(
            factory.open(CodecId::Pcm),
            Err(CodecError::NoDecoder(CodecId::Pcm))
        ));
        Ok(())
    }

    #[test]
    fn packed_samples_split_into_planes() {
        let planes = deinterleave(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 3);
        assert_eq!(planes, [vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]]);
    }

    #[test]
    fn integer_planes_are_normalized() -> anyhow::Result<()> {
        let mut bytes = Vec::new();
        for v in [i16::MIN, 0, 16384] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let plane = plane_samples(&bytes, Sample::I16(Type::Planar), 3)?;
        assert_eq!(plane, [-1.0, 0.0, 0.5]);

        assert!(matches!(
            plane_samples(&bytes, Sample::I16(Type::Planar), 4),
            Err(CodecError::Decode(_))
        ));
        Ok(())
    }
}
