//! Decoder boundary. Backends plug in compressed-audio decoders by
//! implementing [`DecoderFactory`].

use crate::structs::codec::{CodecId, DecodedFrame};
use crate::utils::errors::CodecError;

/// Result of feeding one packet to a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Present once the decoder has produced a complete frame.
    pub frame: Option<DecodedFrame>,
    /// Bytes of the packet the decoder used.
    pub consumed: usize,
}

impl Decoded {
    pub fn frame(frame: DecodedFrame, consumed: usize) -> Self {
        Self {
            frame: Some(frame),
            consumed,
        }
    }

    pub fn pending(consumed: usize) -> Self {
        Self {
            frame: None,
            consumed,
        }
    }
}

/// A compressed-audio decoder for one codec.
pub trait AudioDecoder {
    /// Decodes one byte-order corrected burst payload.
    fn decode(&mut self, payload: &[u8]) -> Result<Decoded, CodecError>;
}

/// Opens decoders by codec id.
pub trait DecoderFactory {
    type Decoder: AudioDecoder;

    /// Returns [`CodecError::NoDecoder`] when the codec is not built in.
    fn open(&mut self, codec: CodecId) -> Result<Self::Decoder, CodecError>;
}
