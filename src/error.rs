//! Error types for the verification harness.
//!
//! Failures are grouped by tier: setup errors abort startup with a non-zero
//! exit status, codec errors become fatal per-frame verification outcomes, and
//! dump-routing errors escalate to the same fatal path. The `thiserror` crate
//! is used for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ContextId;

/// Startup-time failures: bad arguments, unopenable devices, unusable media.
///
/// No per-frame state exists yet when these occur; the process reports them
/// and exits with status 1.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The requested maximum context count is outside the CID type's bounds.
    #[error("the maximum number of contexts should be between 1 and {max}, got {given}")]
    InvalidMaxContexts { given: u32, max: u16 },

    /// The capture device could not be opened.
    #[error("failed to open capture device '{device}': {reason}")]
    DeviceOpen { device: String, reason: String },

    /// The capture medium uses a link-layer type the harness cannot strip.
    #[error("link layer type {linktype} not supported (supported: Ethernet, Linux cooked, raw IP)")]
    UnsupportedLinkType { linktype: u32 },

    /// The capture stream is not a readable legacy pcap.
    #[error("invalid capture stream: {0}")]
    InvalidCapture(String),
}

/// Errors while pulling frames from a capture source.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// I/O failure on the underlying device or file.
    #[error("I/O error reading capture source: {0}")]
    Io(#[from] std::io::Error),

    /// The capture stream contained data that does not parse as capture records.
    #[error("malformed capture data: {0}")]
    Malformed(String),
}

/// Failures reported by the codec engine through its public interface.
///
/// Any of these ends the run: the harness exists to catch the first
/// divergence, not to mask it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Insufficient data to parse a complete field or structure.
    #[error("incomplete packet data: needed {needed} bytes, got {got} for {context}")]
    NotEnoughData {
        needed: usize,
        got: usize,
        context: &'static str,
    },

    /// The packet does not carry a parseable IP header.
    #[error("invalid IP version nibble: {0}")]
    InvalidIpVersion(u8),

    /// The packet's network header is inconsistent with itself.
    #[error("malformed network header: {0}")]
    MalformedHeader(&'static str),

    /// Unrecognized packet type discriminator in a compressed packet.
    #[error("invalid packet type discriminator: 0x{0:02X}")]
    InvalidPacketType(u8),

    /// CRC validation failed, indicating corruption between the codec halves.
    #[error("CRC mismatch: expected 0x{expected:02X}, got 0x{calculated:02X}")]
    CrcMismatch { expected: u8, calculated: u8 },

    /// A compressed packet referenced a CID outside the configured bound.
    #[error("{cid} out of range (maximum contexts: {max_contexts})")]
    CidOutOfRange { cid: ContextId, max_contexts: u16 },

    /// A compressed packet arrived for a context that was never initialized.
    #[error("no established context for {0}")]
    ContextNotFound(ContextId),

    /// Per-packet info was requested before any packet was compressed.
    #[error("no packet compressed yet, per-packet info unavailable")]
    InfoUnavailable,

    /// Unexpected internal codec error.
    #[error("internal codec error: {0}")]
    Internal(String),
}

/// Resource errors while routing frames into per-context dump files.
///
/// These escalate to the fatal per-frame path; a diagnostic tool that cannot
/// write its diagnostics has nothing useful left to do.
#[derive(Error, Debug)]
pub enum DumpError {
    /// A dump file could not be created.
    #[error("failed to open dump file '{path}': {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stale dump file could not be removed before recreation.
    #[error("failed to remove stale dump file '{path}': {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A frame could not be written to an open dump file.
    #[error("failed to write frame to dump file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The codec reported a CID outside the slot collection.
    #[error("no dump slot for {cid} (maximum contexts: {max_contexts})")]
    CidOutOfRange { cid: ContextId, max_contexts: u16 },
}
