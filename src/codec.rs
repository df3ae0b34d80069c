//! The codec-facing interface of the harness.
//!
//! The compression engine is an external collaborator: the pipeline only ever
//! talks to it through [`RohcCodec`], and the engine receives its
//! capabilities (trace sink, RTP detection, randomness) as injected values
//! at construction time, never through process-wide state.

use crate::error::CodecError;
use crate::types::ContextId;

/// What the codec reports about the packet it most recently compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastPacketInfo {
    /// Context the packet was compressed under.
    pub cid: ContextId,
    /// Whether that context was created or reinitialized for this packet.
    pub context_is_new: bool,
}

/// A compressor/decompressor pair exercised by the verification pipeline.
///
/// `compress` and `decompress` operate on whole network packets (link layer
/// already stripped). Both halves share context state keyed by CID; the
/// harness never touches that state, it only observes `last_packet_info`.
pub trait RohcCodec {
    /// Compresses one uncompressed packet into its ROHC representation.
    fn compress(&mut self, packet: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompresses one ROHC packet back into the original representation.
    fn decompress(&mut self, rohc_packet: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Reports `(cid, context_is_new)` for the last `compress` call.
    ///
    /// # Errors
    /// - [`CodecError::InfoUnavailable`] - No packet has been compressed yet
    fn last_packet_info(&self) -> Result<LastPacketInfo, CodecError>;
}

/// Capability deciding whether a UDP flow is an RTP stream.
///
/// Consulted by the codec when it first sees a flow, to pick between
/// RTP-specific and plain UDP compression rules.
pub trait RtpDetector {
    fn is_rtp(&self, ip: &[u8], udp: &[u8], payload: &[u8]) -> bool;
}

/// Random-number capability for the codec.
///
/// Production verification runs inject [`ZeroRandom`] so every run is
/// reproducible bit for bit.
pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

/// The deterministic stub: always returns zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroRandom;

impl RandomSource for ZeroRandom {
    fn next_u32(&mut self) -> u32 {
        0
    }
}
