//! Constants shared across the verification harness.
//!
//! Values that describe the capture media and the console output bounds live
//! here; codec wire-format constants reside in `engine`.

// --- Link-layer framing ---

/// Length of an Ethernet II header preceding the IP packet.
pub const ETHERNET_HDR_LEN: usize = 14;
/// Length of a Linux cooked-socket (SLL) header preceding the IP packet.
pub const LINUX_COOKED_HDR_LEN: usize = 16;
/// Minimum length of an Ethernet frame on the wire; shorter payloads are padded.
pub const ETHERNET_FRAME_MIN_LEN: usize = 60;
/// Snap length used for live capture and dump files (the device MTU).
pub const CAPTURE_SNAPLEN: u32 = 1518;

// --- Trace history bounds ---

/// Maximum number of codec trace lines retained for post-mortem dumps.
pub const MAX_TRACE_HISTORY: usize = 5000;
/// Maximum length in bytes of a single retained trace line; excess is truncated.
pub const MAX_TRACE_LEN: usize = 300;

// --- Diff reporter bounds ---

/// Byte-compare at most this many bytes to keep the diff view readable.
pub const DIFF_BYTE_LIMIT: usize = 180;
/// Number of byte cells rendered per diff line.
pub const DIFF_BYTES_PER_LINE: usize = 4;

// --- Context bounds ---

/// Maximum number of simultaneous contexts in small-CID mode.
pub const SMALL_CID_MAX_CONTEXTS: u16 = 128;
/// Maximum number of simultaneous contexts in large-CID mode.
pub const LARGE_CID_MAX_CONTEXTS: u16 = 16384;

// --- ROHC profile identifiers (RFC 3095 / RFC 3843) ---

/// ROHC Uncompressed profile identifier (0x0000).
pub const PROFILE_ID_UNCOMPRESSED: u16 = 0x0000;
/// ROHC RTP/UDP/IP profile identifier (0x0001).
pub const PROFILE_ID_RTP_UDP_IP: u16 = 0x0001;
/// ROHC UDP/IP profile identifier (0x0002).
pub const PROFILE_ID_UDP_IP: u16 = 0x0002;
/// ROHC IP-only profile identifier (0x0004).
pub const PROFILE_ID_IP_ONLY: u16 = 0x0004;

// --- Standard Internet protocol numbers (IANA assigned) ---

/// IP protocol number for TCP.
pub const IP_PROTOCOL_TCP: u8 = 6;
/// IP protocol number for UDP.
pub const IP_PROTOCOL_UDP: u8 = 17;

/// Fixed IPv6 base header length in bytes.
pub const IPV6_HDR_LEN: usize = 40;
/// Length of a UDP header in bytes.
pub const UDP_HDR_LEN: usize = 8;

// --- RTP detection heuristic ---

/// UDP port reserved for SIP signalling; SIP traffic is never RTP.
pub const SIP_PORT: u16 = 5060;
/// An RTP stream's UDP length field is not expected to exceed this.
pub const RTP_MAX_UDP_LEN: u16 = 200;
/// Smallest possible RTP header, in bytes.
pub const RTP_MIN_HEADER_LEN: usize = 12;
/// RTP payload types the heuristic accepts: GSM, G.723, G.729, telephony-event.
pub const RTP_KNOWN_PAYLOAD_TYPES: [u8; 4] = [0x03, 0x04, 0x12, 0x65];
