use crate::device::ByteSource;
use crate::structs::burst::SYNC_PATTERN;
use crate::utils::errors::ReadError;

/// Result of one sync search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Preamble found after `garbage_len` non-matching bytes.
    Sync { garbage_len: usize },
    /// The garbage budget ran out without a preamble.
    Exhausted,
}

/// Locates burst preambles in an unstructured capture byte stream.
///
/// Bytes are shifted one at a time into a 32-bit register that is compared
/// against [`SYNC_PATTERN`]. Every byte consumed while searching is kept, so
/// when the budget is exhausted the caller can play the bytes back as PCM.
#[derive(Debug)]
pub struct Synchronizer {
    state: u32,
    garbage: Vec<u8>,
    capacity: usize,
}

impl Synchronizer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: 0,
            garbage: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Searches for the next preamble, reading at most `capacity` bytes.
    ///
    /// The shift register survives an exhausted search, so a preamble split
    /// across two calls is still found. It is cleared after every match.
    pub fn next_frame_or_pcm<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<SyncOutcome, ReadError> {
        self.garbage.clear();

        while self.state != SYNC_PATTERN {
            if self.garbage.len() >= self.capacity {
                return Ok(SyncOutcome::Exhausted);
            }

            let byte = source.read_u8()?;
            self.garbage.push(byte);
            self.state = (self.state << 8) | byte as u32;
        }

        self.state = 0;
        Ok(SyncOutcome::Sync {
            garbage_len: self.garbage.len().saturating_sub(4),
        })
    }

    /// Bytes consumed by the last search, preamble included.
    pub fn garbage(&self) -> &[u8] {
        &self.garbage
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
