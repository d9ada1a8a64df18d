/// Preamble search over the capture byte stream.
///
/// Provides the [`Synchronizer`](sync::Synchronizer), which either locks onto
/// the next burst or hands back a block of raw PCM.
pub mod sync;

/// Burst payload assembly and stream identity.
///
/// Provides the [`Demuxer`](extract::Demuxer) turning the capture stream into
/// [`Packet`](extract::Packet)s, PCM blocks, retries and restarts.
pub mod extract;

/// Decoder lifecycle and format tracking.
pub mod session;

/// Sample format conversion to interleaved S16.
pub mod resample;

/// Stream status reports sent on output changes.
pub mod notify;

/// The passthrough loop and its restart policy.
///
/// Provides the [`Pipeline`](pipeline::Pipeline) tying devices, demuxer,
/// session and notifier together.
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;
