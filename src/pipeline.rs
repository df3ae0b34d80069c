//! The per-frame verification pipeline.
//!
//! For every captured frame: strip the link-layer header, undo physical-layer
//! padding, compress, route the frame into its context's dump file,
//! decompress, and compare the result byte-for-byte against the input. Each
//! frame resolves to exactly one [`Outcome`]; anything but a match ends the
//! run, because the tool's entire value is stopping at the first divergence.

use std::fmt;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::capture::{CaptureSource, CapturedFrame, LinkType};
use crate::codec::RohcCodec;
use crate::constants::{ETHERNET_FRAME_MIN_LEN, IPV6_HDR_LEN};
use crate::dump::{DumpManager, write_fallback_dump};
use crate::error::{CaptureError, CodecError, DumpError};
use crate::types::ContextId;

/// How one frame fared through the compress→decompress round trip.
///
/// Produced exactly once per input frame. Non-`Match` variants carry what a
/// post-mortem needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The decompressed packet equals the original byte for byte.
    Match,
    /// The round trip produced different bytes.
    Mismatch {
        original: Vec<u8>,
        decompressed: Vec<u8>,
    },
    /// The codec could not compress the packet.
    CompressionFailure { error: CodecError },
    /// The codec could not decompress its own output.
    DecompressionFailure { error: CodecError },
    /// The capture record is inconsistent and was rejected before processing.
    MalformedInput {
        wire_len: usize,
        captured_len: usize,
    },
    /// The codec could not report which context handled the packet.
    InfoUnavailable { error: CodecError },
}

impl Outcome {
    /// Whether the frame passed verification.
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match)
    }

    /// Short label used in failure reports.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Match => "match",
            Outcome::Mismatch { .. } => "decompressed packet does not match the original",
            Outcome::CompressionFailure { .. } => "compression failed",
            Outcome::DecompressionFailure { .. } => "decompression failed",
            Outcome::MalformedInput { .. } => "bad capture record",
            Outcome::InfoUnavailable { .. } => "failed to get compression info",
        }
    }
}

/// Running counters over all processed frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub matches: u64,
    pub compression_failures: u64,
    pub decompression_failures: u64,
    pub mismatches: u64,
    pub malformed: u64,
    pub info_unavailable: u64,
}

impl Stats {
    /// Records one resolved outcome.
    pub fn tally(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Match => self.matches += 1,
            Outcome::Mismatch { .. } => self.mismatches += 1,
            Outcome::CompressionFailure { .. } => self.compression_failures += 1,
            Outcome::DecompressionFailure { .. } => self.decompression_failures += 1,
            Outcome::MalformedInput { .. } => self.malformed += 1,
            Outcome::InfoUnavailable { .. } => self.info_unavailable += 1,
        }
    }

    /// Total number of tallied frames.
    pub fn total(&self) -> u64 {
        self.matches
            + self.compression_failures
            + self.decompression_failures
            + self.mismatches
            + self.malformed
            + self.info_unavailable
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK, ERR(COMP), ERR(DECOMP), ERR(REF), ERR(BAD), ERR(INTERNAL) = {} {} {} {} {} {}",
            self.matches,
            self.compression_failures,
            self.decompression_failures,
            self.mismatches,
            self.malformed,
            self.info_unavailable
        )
    }
}

/// Result of a run that ended without a verification failure.
#[derive(Debug)]
pub struct RunSummary {
    /// Frames pulled from the capture source.
    pub frames: u64,
    /// Final counters.
    pub stats: Stats,
    /// Whether the loop exited because the stop flag was raised.
    pub stopped_by_signal: bool,
    /// CIDs whose dump files were open at shutdown, now closed.
    pub closed_contexts: Vec<ContextId>,
}

/// Why a run ended early.
#[derive(Debug, Error)]
pub enum RunFailure {
    /// A frame resolved to something other than `Match`.
    #[error("verification failed at frame #{frame_number}")]
    Verification {
        frame_number: u64,
        /// Context the codec reported for the frame, when it got that far.
        cid: Option<ContextId>,
        outcome: Outcome,
    },

    /// Dump routing hit a filesystem error; escalated to the fatal path.
    #[error("dump routing failed at frame #{frame_number}: {error}")]
    Dump { frame_number: u64, error: DumpError },

    /// The capture source itself failed.
    #[error("capture source failed: {error}")]
    Capture { error: CaptureError },
}

/// Recovers the logical IP packet length from the IP header itself.
///
/// Used to undo Ethernet minimum-frame padding: the padding bytes are part of
/// the captured frame but not of the IP packet, and compressing them would
/// guarantee a later comparison mismatch. Returns `None` when the header is
/// too short to state a length.
fn ip_logical_length(packet: &[u8]) -> Option<usize> {
    let first = *packet.first()?;
    match first >> 4 {
        4 => (packet.len() >= 4)
            .then(|| usize::from(u16::from_be_bytes([packet[2], packet[3]]))),
        6 => (packet.len() >= 6)
            .then(|| IPV6_HDR_LEN + usize::from(u16::from_be_bytes([packet[4], packet[5]]))),
        _ => None,
    }
}

/// Orchestrates per-frame verification against one codec engine.
pub struct Verifier<C: RohcCodec> {
    codec: C,
    link: LinkType,
    dumps: DumpManager,
    dump_dir: PathBuf,
    stats: Stats,
    frames_processed: u64,
    last_cid: Option<ContextId>,
}

impl<C: RohcCodec> Verifier<C> {
    /// Creates a verifier for a capture medium with `link` framing, writing
    /// dump files into `dump_dir`.
    pub fn new(
        codec: C,
        link: LinkType,
        max_contexts: u16,
        dump_dir: impl Into<PathBuf>,
    ) -> Self {
        let dump_dir = dump_dir.into();
        Self {
            codec,
            link,
            dumps: DumpManager::new(max_contexts, link, dump_dir.clone()),
            dump_dir,
            stats: Stats::default(),
            frames_processed: 0,
            last_cid: None,
        }
    }

    /// Final counters so far.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Frames pulled from the source so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Context the codec reported for the most recent frame that got as far
    /// as dump routing.
    pub fn last_cid(&self) -> Option<ContextId> {
        self.last_cid
    }

    /// Access to the dump slots, mainly for shutdown and tests.
    pub fn dumps_mut(&mut self) -> &mut DumpManager {
        &mut self.dumps
    }

    /// The codec engine under test.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Resolves one frame to its verification outcome.
    ///
    /// Dump-routing failures are returned as errors rather than outcomes;
    /// they are just as fatal but are resource problems of the harness, not
    /// verdicts about the codec.
    pub fn process_frame(&mut self, frame: &CapturedFrame) -> Result<Outcome, DumpError> {
        self.last_cid = None;
        let link_len = self.link.header_len();

        if frame.wire_len <= link_len || frame.captured_len != frame.wire_len {
            return Ok(Outcome::MalformedInput {
                wire_len: frame.wire_len,
                captured_len: frame.captured_len,
            });
        }

        let mut payload: &[u8] = &frame.data[link_len..];

        // A frame at the Ethernet minimum may carry physical-layer padding
        // after the IP packet; the IP header knows the logical length.
        if self.link == LinkType::Ethernet && frame.wire_len == ETHERNET_FRAME_MIN_LEN {
            if let Some(logical_len) = ip_logical_length(payload) {
                if logical_len < payload.len() {
                    payload = &payload[..logical_len];
                }
            }
        }

        let rohc = match self.codec.compress(payload) {
            Ok(rohc) => rohc,
            Err(error) => {
                // Keep the failing frame around for offline inspection.
                write_fallback_dump(&self.dump_dir, self.link, frame)?;
                return Ok(Outcome::CompressionFailure { error });
            }
        };

        let info = match self.codec.last_packet_info() {
            Ok(info) => info,
            Err(error) => return Ok(Outcome::InfoUnavailable { error }),
        };
        self.last_cid = Some(info.cid);

        self.dumps.route(info.cid, info.context_is_new, frame)?;

        let decompressed = match self.codec.decompress(&rohc) {
            Ok(decompressed) => decompressed,
            Err(error) => return Ok(Outcome::DecompressionFailure { error }),
        };

        if decompressed == payload {
            Ok(Outcome::Match)
        } else {
            Ok(Outcome::Mismatch {
                original: payload.to_vec(),
                decompressed,
            })
        }
    }

    /// Pulls frames from `source` until it ends, the stop flag is raised, or
    /// a frame fails verification.
    ///
    /// Frames are processed strictly in capture order; the codec's context
    /// state depends on the exact sequence it sees. The stop flag is read
    /// only before each fetch; an in-flight frame is always fully resolved.
    pub fn run<S: CaptureSource>(
        &mut self,
        source: &mut S,
        stop: &AtomicBool,
        progress: bool,
    ) -> Result<RunSummary, RunFailure> {
        debug_assert_eq!(source.link_type(), self.link);

        while !stop.load(Ordering::Relaxed) {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => return Err(RunFailure::Capture { error }),
            };

            self.frames_processed += 1;
            if progress {
                if self.frames_processed > 1 {
                    print!("\r");
                }
                print!("packet #{}", self.frames_processed);
                let _ = io::stdout().flush();
            }

            let outcome = self.process_frame(&frame).map_err(|error| RunFailure::Dump {
                frame_number: self.frames_processed,
                error,
            })?;
            self.stats.tally(&outcome);

            if !outcome.is_match() {
                return Err(RunFailure::Verification {
                    frame_number: self.frames_processed,
                    cid: self.last_cid,
                    outcome,
                });
            }
        }

        let stopped_by_signal = stop.load(Ordering::Relaxed);
        let closed_contexts = self.dumps.close_all();
        Ok(RunSummary {
            frames: self.frames_processed,
            stats: self.stats.clone(),
            stopped_by_signal,
            closed_contexts,
        })
    }
}
