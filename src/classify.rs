//! RTP flow classification heuristic.
//!
//! The codec consults this predicate once per new UDP flow to decide whether
//! the flow should be handled under real-time-transport compression rules.
//! It is a heuristic by design: false positives and negatives on unusual
//! traffic are an accepted tradeoff.

use crate::codec::RtpDetector;
use crate::constants::{
    RTP_KNOWN_PAYLOAD_TYPES, RTP_MAX_UDP_LEN, RTP_MIN_HEADER_LEN, SIP_PORT, UDP_HDR_LEN,
};

/// Decides whether a UDP packet looks like RTP.
///
/// `ip` is the network header the flow was found under, `udp` the UDP header
/// bytes, and `payload` the UDP payload. The rules, in order:
/// SIP signalling (both ports 5060) is never RTP; RTP destination ports are
/// even (RTCP takes the odd sibling); RTP datagrams stay small; the payload
/// must hold at least a minimal RTP header with version bits `10` and one of
/// the known audio/telephony payload types.
pub fn is_rtp(ip: &[u8], udp: &[u8], payload: &[u8]) -> bool {
    debug_assert!(!ip.is_empty());

    if udp.len() < UDP_HDR_LEN {
        return false;
    }
    let src_port = u16::from_be_bytes([udp[0], udp[1]]);
    let dst_port = u16::from_be_bytes([udp[2], udp[3]]);
    let udp_len = u16::from_be_bytes([udp[4], udp[5]]);

    if src_port == SIP_PORT && dst_port == SIP_PORT {
        return false;
    }
    if dst_port % 2 != 0 {
        return false;
    }
    if udp_len > RTP_MAX_UDP_LEN {
        return false;
    }
    if payload.len() < RTP_MIN_HEADER_LEN {
        return false;
    }
    // RTP version bits shall be 2.
    if (payload[0] >> 6) & 0x3 != 0x2 {
        return false;
    }
    let payload_type = payload[1] & 0x7F;
    RTP_KNOWN_PAYLOAD_TYPES.contains(&payload_type)
}

/// The production `RtpDetector` capability backed by [`is_rtp`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpRtpHeuristic;

impl RtpDetector for UdpRtpHeuristic {
    fn is_rtp(&self, ip: &[u8], udp: &[u8], payload: &[u8]) -> bool {
        is_rtp(ip, udp, payload)
    }
}
