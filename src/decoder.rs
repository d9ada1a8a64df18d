//! Decoder backends.
//!
//! symphonia covers MPEG-1/2 layers 1 to 3 and ADTS AAC. AC-3, E-AC-3 and
//! DTS need libavcodec, linked in with the `ffmpeg` feature.

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

use symphonia::core::audio::AudioBuffer;
use symphonia::core::codecs::{
    CODEC_TYPE_AAC, CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3, CodecParameters, CodecType,
    Decoder, DecoderOptions,
};
use symphonia::core::formats::Packet;

use iec61937::codec::{AudioDecoder, Decoded, DecoderFactory};
use iec61937::structs::adts::AdtsHeader;
use iec61937::structs::codec::{ChannelLayout, CodecId, DecodedFrame, Samples, StreamFormat};
use iec61937::utils::errors::CodecError;

fn codec_type(codec: CodecId) -> Option<CodecType> {
    match codec {
        CodecId::Mp1 => Some(CODEC_TYPE_MP1),
        CodecId::Mp2 => Some(CODEC_TYPE_MP2),
        CodecId::Mp3 => Some(CODEC_TYPE_MP3),
        CodecId::Aac => Some(CODEC_TYPE_AAC),
        CodecId::Pcm | CodecId::Ac3 | CodecId::Eac3 | CodecId::Dts => None,
    }
}

/// Every decoder this build carries: symphonia first, libavcodec for the
/// rest when enabled.
#[derive(Debug)]
pub struct Decoders {
    symphonia: SymphoniaDecoders,
    #[cfg(feature = "ffmpeg")]
    ffmpeg: ffmpeg::FfmpegDecoders,
}

impl Decoders {
    pub fn new() -> Result<Self, CodecError> {
        Ok(Self {
            symphonia: SymphoniaDecoders,
            #[cfg(feature = "ffmpeg")]
            ffmpeg: ffmpeg::FfmpegDecoders::new()?,
        })
    }
}

pub enum BackendDecoder {
    Symphonia(SymphoniaDecoder),
    #[cfg(feature = "ffmpeg")]
    Ffmpeg(ffmpeg::FfmpegDecoder),
}

impl DecoderFactory for Decoders {
    type Decoder = BackendDecoder;

    fn open(&mut self, codec: CodecId) -> Result<BackendDecoder, CodecError> {
        match self.symphonia.open(codec) {
            Ok(decoder) => Ok(BackendDecoder::Symphonia(decoder)),
            #[cfg(feature = "ffmpeg")]
            Err(CodecError::NoDecoder(_)) => self.ffmpeg.open(codec).map(BackendDecoder::Ffmpeg),
            Err(e) => Err(e),
        }
    }
}

impl AudioDecoder for BackendDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Decoded, CodecError> {
        match self {
            BackendDecoder::Symphonia(decoder) => decoder.decode(payload),
            #[cfg(feature = "ffmpeg")]
            BackendDecoder::Ffmpeg(decoder) => decoder.decode(payload),
        }
    }
}

#[derive(Debug, Default)]
pub struct SymphoniaDecoders;

impl DecoderFactory for SymphoniaDecoders {
    type Decoder = SymphoniaDecoder;

    fn open(&mut self, codec: CodecId) -> Result<SymphoniaDecoder, CodecError> {
        let codec_type = codec_type(codec).ok_or(CodecError::NoDecoder(codec))?;

        // AAC needs its AudioSpecificConfig from the first ADTS header.
        let inner = if codec == CodecId::Aac {
            None
        } else {
            Some(make_decoder(codec, CodecParameters::new().for_codec(codec_type))?)
        };

        Ok(SymphoniaDecoder {
            codec,
            codec_type,
            inner,
            sample_buf: None,
            ts: 0,
        })
    }
}

fn make_decoder(codec: CodecId, params: &CodecParameters) -> Result<Box<dyn Decoder>, CodecError> {
    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| CodecError::Open {
            codec,
            reason: e.to_string(),
        })
}

pub struct SymphoniaDecoder {
    codec: CodecId,
    codec_type: CodecType,
    inner: Option<Box<dyn Decoder>>,
    sample_buf: Option<AudioBuffer<f32>>,
    ts: u64,
}

impl SymphoniaDecoder {
    /// Strips the ADTS header, creating the decoder on the first frame.
    fn aac_frame<'a>(&mut self, payload: &'a [u8]) -> Result<&'a [u8], CodecError> {
        let adts = AdtsHeader::parse(payload).map_err(|e| CodecError::Decode(e.to_string()))?;

        if self.inner.is_none() {
            let asc = adts.audio_specific_config();
            let mut params = CodecParameters::new();
            params
                .for_codec(self.codec_type)
                .with_sample_rate(adts.sample_rate())
                .with_extra_data(Box::new(asc));
            self.inner = Some(make_decoder(self.codec, &params)?);
        }

        let end = (adts.frame_length as usize).min(payload.len());
        payload
            .get(adts.header_len()..end)
            .ok_or_else(|| CodecError::Decode(format!("ADTS frame of {end} bytes")))
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Decoded, CodecError> {
        let data = if self.codec == CodecId::Aac {
            self.aac_frame(payload)?
        } else {
            payload
        };

        let Some(decoder) = self.inner.as_mut() else {
            return Err(CodecError::NoDecoder(self.codec));
        };

        let packet = Packet::new_from_slice(0, self.ts, 0, data);
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let frames = decoded.frames();
        if frames == 0 {
            return Ok(Decoded::pending(payload.len()));
        }
        self.ts += frames as u64;

        let spec = *decoded.spec();
        let capacity = decoded.capacity();
        let reusable = matches!(
            &self.sample_buf,
            Some(buf) if buf.capacity() >= capacity && *buf.spec() == spec
        );
        if !reusable {
            self.sample_buf = None;
        }
        let buf = self
            .sample_buf
            .get_or_insert_with(|| AudioBuffer::new(capacity as u64, spec));
        decoded.convert(buf);

        let planes = buf.planes();
        let samples = planes.planes().iter().map(|plane| plane[..frames].to_vec()).collect();

        let format = StreamFormat::new(
            spec.channels.count() as u16,
            spec.rate,
            ChannelLayout(spec.channels.bits() as u64),
        );
        Ok(Decoded::frame(
            DecodedFrame {
                format,
                frames,
                samples: Samples::PlanarF32(samples),
            },
            payload.len(),
        ))
    }
}
