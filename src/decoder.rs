//! Record-at-a-time decoding over a delimited byte source.
//!
//! The byte source follows the HRDP archive reader contract: one `read`
//! call fills the buffer with exactly one complete record. The decoder owns
//! its read buffer and copies anything it retains, so the source is free to
//! reuse or overwrite its own storage between calls. Run one decoder per
//! source; independent decoders share no state and may run on separate
//! threads.
use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

use crate::packet::{Channel, DataHeader, FrameHeader, Outcome, Packet};
use crate::{Error, Result};

/// Read buffer size, sized for the largest record the ground archive
/// produces.
pub const BUFFER_SIZE: usize = 8 << 20;

/// Pulls one record per call from `R` and decodes it.
pub struct Decoder<R> {
    inner: R,
    buffer: Vec<u8>,
    with_data: bool,
}

impl<R> Decoder<R>
where
    R: Read,
{
    /// `with_data` false gives metadata-only packets, skipping the payload
    /// copy for cheap scanning.
    pub fn new(inner: R, with_data: bool) -> Self {
        Self {
            inner,
            buffer: vec![0u8; BUFFER_SIZE],
            with_data,
        }
    }

    /// Decode the next record. `None` at end-of-source; end-of-source is a
    /// terminal condition, not an error.
    pub fn decode(&mut self) -> Option<Result<(Packet, Outcome)>> {
        let n = match self.inner.read(&mut self.buffer) {
            Ok(0) => return None,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return None,
            Err(err) => return Some(Err(err.into())),
        };
        Some(Packet::decode(&self.buffer[..n], self.with_data))
    }
}

impl<R> Iterator for Decoder<R>
where
    R: Read,
{
    type Item = Result<(Packet, Outcome)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode()
    }
}

/// Decoder that yields only packets accepted by a predicate.
///
/// The predicate sees the frame header, data header, and checksum
/// [Outcome] and answers whether to keep the packet, along with the
/// outcome to report for it. See [by_channel] and [by_origin] for the two
/// standard predicates.
pub struct FilteredDecoder<R, F> {
    decoder: Decoder<R>,
    filter: F,
}

impl<R, F> FilteredDecoder<R, F>
where
    R: Read,
    F: FnMut(&FrameHeader, &DataHeader, Outcome) -> (bool, Outcome),
{
    pub fn new(decoder: Decoder<R>, filter: F) -> Self {
        Self { decoder, filter }
    }

    /// Decode until a kept packet, a source failure, or end-of-source.
    ///
    /// The retry on rejected packets is an iterative loop, never
    /// recursion: long runs of filtered-out traffic must not grow the
    /// stack. Skipped and mis-framed records are logged and retried as
    /// well; only byte-source failures surface as errors.
    pub fn decode(&mut self) -> Option<Result<(Packet, Outcome)>> {
        loop {
            match self.decoder.decode()? {
                Ok((packet, outcome)) => {
                    let (keep, outcome) = (self.filter)(&packet.frame, &packet.data, outcome);
                    if keep {
                        return Some(Ok((packet, outcome)));
                    }
                }
                Err(Error::Skip) => debug!("unrecognized record, skipping"),
                Err(Error::Syncword) => {
                    // distinct from a skip: the source itself mis-delimited
                    warn!("record without frame syncword, upstream framing suspect");
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl<R, F> Iterator for FilteredDecoder<R, F>
where
    R: Read,
    F: FnMut(&FrameHeader, &DataHeader, Outcome) -> (bool, Outcome),
{
    type Item = Result<(Packet, Outcome)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode()
    }
}

/// Keep packets from one channel.
///
/// With `pass_invalid` true, checksum-invalid packets are passed through
/// re-classified as [`Outcome::Ok`]; otherwise they are suppressed.
pub fn by_channel(
    channel: Channel,
    pass_invalid: bool,
) -> impl FnMut(&FrameHeader, &DataHeader, Outcome) -> (bool, Outcome) {
    move |frame, _, outcome| {
        if frame.channel != channel {
            return (false, outcome);
        }
        apply_invalid(outcome, pass_invalid)
    }
}

/// Keep packets from one producing unit, by data-header origin.
///
/// `pass_invalid` behaves as in [by_channel].
pub fn by_origin(
    origin: u8,
    pass_invalid: bool,
) -> impl FnMut(&FrameHeader, &DataHeader, Outcome) -> (bool, Outcome) {
    move |_, data, outcome| {
        if data.origin != origin {
            return (false, outcome);
        }
        apply_invalid(outcome, pass_invalid)
    }
}

fn apply_invalid(outcome: Outcome, pass_invalid: bool) -> (bool, Outcome) {
    match outcome {
        Outcome::Ok => (true, Outcome::Ok),
        Outcome::Invalid if pass_invalid => (true, Outcome::Ok),
        Outcome::Invalid => (false, Outcome::Invalid),
    }
}
