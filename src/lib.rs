//! `rohcsniff`: a live-traffic verification harness for ROHC-style header
//! compression codecs.
//!
//! The harness pulls frames from a capture source, feeds each through a
//! compress→decompress round trip, and asserts the result is byte-identical
//! to the original packet. It exists to validate a codec against real traffic
//! before and while deploying it, and to catch silent regressions: the first
//! frame that does not survive the round trip ends the run with a full
//! post-mortem (statistics, byte-level diff, per-context capture dumps, and
//! the codec's recent trace history).
//!
//! ## Core pieces
//!
//! - **[`Verifier`]**: the per-frame pipeline: strip link framing, undo
//!   physical-layer padding, compress, dump, decompress, compare.
//! - **[`RohcCodec`]**: the seam to the codec engine under test; the bundled
//!   [`UncompressedEngine`] keeps the binary self-contained.
//! - **[`TraceRecorder`]**: bounded circular history of codec diagnostics.
//! - **[`DumpManager`]**: one capture file per compression context,
//!   recreated whenever the codec reinitializes that context.
//! - **[`diff`]**: aligned byte-level difference view for mismatches.
//! - **[`classify`]**: the RTP-stream heuristic the codec consults per flow.
//!
//! The verification loop is single-threaded and synchronous by contract:
//! codec context state is order-dependent, so frames are processed strictly
//! in capture order. Cancellation is cooperative through a shared stop flag
//! read only between frames.

pub mod capture;
pub mod classify;
pub mod codec;
pub mod constants;
pub mod crc;
pub mod diff;
pub mod dump;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod trace;
pub mod types;

pub use capture::{CaptureSource, CapturedFrame, LinkType, LiveCapture, PcapFileSource};
pub use codec::{LastPacketInfo, RandomSource, RohcCodec, RtpDetector, ZeroRandom};
pub use dump::DumpManager;
pub use engine::{CidKind, UncompressedEngine};
pub use error::{CaptureError, CodecError, DumpError, SetupError};
pub use pipeline::{Outcome, RunFailure, RunSummary, Stats, Verifier};
pub use trace::{RecordingTraceSink, TraceEntity, TraceLevel, TraceRecorder, TraceSink};
pub use types::ContextId;
