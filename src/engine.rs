//! Built-in Uncompressed-profile codec engine.
//!
//! The verification pipeline treats the codec as an external collaborator
//! behind the [`RohcCodec`] trait; this engine keeps the binary self-contained
//! without linking a foreign codec. It classifies packets into per-flow
//! contexts, reclaims the least-recently-used CID when the configured bound is
//! reached, and carries payloads verbatim so the round trip is byte-exact.
//! Capabilities (trace sink, RTP detection, randomness) are injected at
//! construction, never reached through process-wide state.

use std::collections::{HashMap, HashSet};

use crate::codec::{LastPacketInfo, RandomSource, RohcCodec, RtpDetector};
use crate::constants::{
    IP_PROTOCOL_TCP, IP_PROTOCOL_UDP, IPV6_HDR_LEN, LARGE_CID_MAX_CONTEXTS, PROFILE_ID_IP_ONLY,
    PROFILE_ID_RTP_UDP_IP, PROFILE_ID_UDP_IP, PROFILE_ID_UNCOMPRESSED, SMALL_CID_MAX_CONTEXTS,
    UDP_HDR_LEN,
};
use crate::crc::Crc8;
use crate::error::CodecError;
use crate::trace::{TraceEntity, TraceLevel, TraceSink};
use crate::types::ContextId;

/// Packet type discriminator of a context-initialization packet.
const PACKET_TYPE_INIT: u8 = 0xFC;
/// Packet type discriminator of an established-context packet.
const PACKET_TYPE_NORMAL: u8 = 0xFA;

/// CID addressing mode of the engine pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CidKind {
    /// One-byte CIDs.
    Small,
    /// Two-byte big-endian CIDs.
    Large,
}

impl CidKind {
    /// Bytes a CID occupies on the wire.
    pub fn cid_bytes(self) -> usize {
        match self {
            CidKind::Small => 1,
            CidKind::Large => 2,
        }
    }

    /// Upper bound on simultaneous contexts in this mode.
    pub fn max_contexts_bound(self) -> u16 {
        match self {
            CidKind::Small => SMALL_CID_MAX_CONTEXTS,
            CidKind::Large => LARGE_CID_MAX_CONTEXTS,
        }
    }

    fn encode_cid(self, out: &mut Vec<u8>, cid: ContextId) {
        match self {
            CidKind::Small => out.push(cid.value() as u8),
            CidKind::Large => out.extend_from_slice(&cid.value().to_be_bytes()),
        }
    }

    fn decode_cid(self, bytes: &[u8]) -> ContextId {
        match self {
            CidKind::Small => ContextId::new(u16::from(bytes[0])),
            CidKind::Large => ContextId::new(u16::from_be_bytes([bytes[0], bytes[1]])),
        }
    }
}

/// Identifies the flow a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FlowKey {
    V4 {
        src: [u8; 4],
        dst: [u8; 4],
        protocol: u8,
        ports: Option<(u16, u16)>,
    },
    V6 {
        src: [u8; 16],
        dst: [u8; 16],
        next_header: u8,
        ports: Option<(u16, u16)>,
    },
}

/// Flow identity plus the transport offset the classifier needs.
#[derive(Debug)]
struct ParsedPacket {
    key: FlowKey,
    /// Offset of the UDP header, when the packet carries one directly.
    udp_offset: Option<usize>,
}

fn transport_ports(packet: &[u8], offset: usize) -> Option<(u16, u16)> {
    if packet.len() < offset + 4 {
        return None;
    }
    let src = u16::from_be_bytes([packet[offset], packet[offset + 1]]);
    let dst = u16::from_be_bytes([packet[offset + 2], packet[offset + 3]]);
    Some((src, dst))
}

/// Extracts the flow identity of an IP packet.
fn parse_flow(packet: &[u8]) -> Result<ParsedPacket, CodecError> {
    let first = *packet.first().ok_or(CodecError::NotEnoughData {
        needed: 1,
        got: 0,
        context: "IP version",
    })?;

    match first >> 4 {
        4 => {
            if packet.len() < 20 {
                return Err(CodecError::NotEnoughData {
                    needed: 20,
                    got: packet.len(),
                    context: "IPv4 header",
                });
            }
            let header_len = usize::from(first & 0x0F) * 4;
            if header_len < 20 {
                return Err(CodecError::MalformedHeader("IPv4 IHL below minimum"));
            }
            if packet.len() < header_len {
                return Err(CodecError::NotEnoughData {
                    needed: header_len,
                    got: packet.len(),
                    context: "IPv4 options",
                });
            }
            let protocol = packet[9];
            let mut src = [0u8; 4];
            let mut dst = [0u8; 4];
            src.copy_from_slice(&packet[12..16]);
            dst.copy_from_slice(&packet[16..20]);

            let has_transport = protocol == IP_PROTOCOL_UDP || protocol == IP_PROTOCOL_TCP;
            let ports = has_transport
                .then(|| transport_ports(packet, header_len))
                .flatten();
            let udp_offset = (protocol == IP_PROTOCOL_UDP
                && packet.len() >= header_len + UDP_HDR_LEN)
                .then_some(header_len);

            Ok(ParsedPacket {
                key: FlowKey::V4 {
                    src,
                    dst,
                    protocol,
                    ports,
                },
                udp_offset,
            })
        }
        6 => {
            if packet.len() < IPV6_HDR_LEN {
                return Err(CodecError::NotEnoughData {
                    needed: IPV6_HDR_LEN,
                    got: packet.len(),
                    context: "IPv6 header",
                });
            }
            let next_header = packet[6];
            let mut src = [0u8; 16];
            let mut dst = [0u8; 16];
            src.copy_from_slice(&packet[8..24]);
            dst.copy_from_slice(&packet[24..40]);

            let has_transport = next_header == IP_PROTOCOL_UDP || next_header == IP_PROTOCOL_TCP;
            let ports = has_transport
                .then(|| transport_ports(packet, IPV6_HDR_LEN))
                .flatten();
            let udp_offset = (next_header == IP_PROTOCOL_UDP
                && packet.len() >= IPV6_HDR_LEN + UDP_HDR_LEN)
                .then_some(IPV6_HDR_LEN);

            Ok(ParsedPacket {
                key: FlowKey::V6 {
                    src,
                    dst,
                    next_header,
                    ports,
                },
                udp_offset,
            })
        }
        version => Err(CodecError::InvalidIpVersion(version)),
    }
}

/// Compressor-side state of one flow.
#[derive(Debug)]
struct EngineContext {
    cid: ContextId,
    key: FlowKey,
    profile_id: u16,
    packets: u64,
    last_accessed: u64,
}

/// A compressor/decompressor pair carrying payloads verbatim.
///
/// Context assignment is real: flows map to CIDs, the bound is enforced, and
/// exhaustion reclaims the least-recently-used context. The harness thus sees
/// the same context lifecycle traffic (including CID reuse) a full codec
/// produces, while the payload round trip stays trivially byte-exact.
pub struct UncompressedEngine {
    cid_kind: CidKind,
    max_contexts: u16,
    contexts: HashMap<ContextId, EngineContext>,
    by_flow: HashMap<FlowKey, ContextId>,
    /// Decompressor-side view: contexts established by an init packet.
    established: HashSet<ContextId>,
    crc: Crc8,
    trace: Box<dyn TraceSink>,
    detector: Box<dyn RtpDetector>,
    random: Box<dyn RandomSource>,
    last_info: Option<LastPacketInfo>,
    tick: u64,
}

impl UncompressedEngine {
    /// Creates an engine bounded to `max_contexts` simultaneous contexts.
    pub fn new(
        cid_kind: CidKind,
        max_contexts: u16,
        trace: Box<dyn TraceSink>,
        detector: Box<dyn RtpDetector>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        debug_assert!(max_contexts >= 1 && max_contexts <= cid_kind.max_contexts_bound());
        Self {
            cid_kind,
            max_contexts,
            contexts: HashMap::new(),
            by_flow: HashMap::new(),
            established: HashSet::new(),
            crc: Crc8::new(),
            trace,
            detector,
            random,
            last_info: None,
            tick: 0,
        }
    }

    /// Number of live compressor contexts.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    fn profile_for(&self, parsed: &ParsedPacket, packet: &[u8]) -> u16 {
        match parsed.udp_offset {
            Some(offset) => {
                let udp = &packet[offset..offset + UDP_HDR_LEN];
                let payload = &packet[offset + UDP_HDR_LEN..];
                if self.detector.is_rtp(packet, udp, payload) {
                    PROFILE_ID_RTP_UDP_IP
                } else {
                    PROFILE_ID_UDP_IP
                }
            }
            None => PROFILE_ID_IP_ONLY,
        }
    }

    /// Lowest free CID, or the least-recently-used one once all are in use.
    fn allocate_cid(&mut self) -> Result<ContextId, CodecError> {
        for value in 0..self.max_contexts {
            let cid = ContextId::new(value);
            if !self.contexts.contains_key(&cid) {
                return Ok(cid);
            }
        }

        let victim = self
            .contexts
            .values()
            .min_by_key(|context| context.last_accessed)
            .map(|context| context.cid)
            .ok_or_else(|| CodecError::Internal("no context to reclaim".to_string()))?;
        let stale = self
            .contexts
            .remove(&victim)
            .ok_or_else(|| CodecError::Internal("reclaim victim vanished".to_string()))?;
        self.by_flow.remove(&stale.key);
        self.trace.trace(
            TraceLevel::Info,
            TraceEntity::Compressor,
            stale.profile_id,
            &format!("reclaiming {} after {} packets", victim, stale.packets),
        );
        Ok(victim)
    }

    fn lookup_or_create(
        &mut self,
        parsed: &ParsedPacket,
        packet: &[u8],
    ) -> Result<(ContextId, bool), CodecError> {
        if let Some(&cid) = self.by_flow.get(&parsed.key) {
            self.tick += 1;
            let tick = self.tick;
            let context = self
                .contexts
                .get_mut(&cid)
                .ok_or_else(|| CodecError::Internal("flow mapped to missing context".to_string()))?;
            context.packets += 1;
            context.last_accessed = tick;
            return Ok((cid, false));
        }

        let profile_id = self.profile_for(parsed, packet);
        let cid = self.allocate_cid()?;
        let seed = self.random.next_u32();
        self.trace.trace(
            TraceLevel::Info,
            TraceEntity::Compressor,
            profile_id,
            &format!("new context {} (seed {})", cid, seed),
        );
        self.tick += 1;
        self.contexts.insert(
            cid,
            EngineContext {
                cid,
                key: parsed.key,
                profile_id,
                packets: 1,
                last_accessed: self.tick,
            },
        );
        self.by_flow.insert(parsed.key, cid);
        Ok((cid, true))
    }
}

impl RohcCodec for UncompressedEngine {
    fn compress(&mut self, packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        let parsed = match parse_flow(packet) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.trace.trace(
                    TraceLevel::Warning,
                    TraceEntity::Compressor,
                    PROFILE_ID_UNCOMPRESSED,
                    &format!("cannot classify packet for compression: {}", error),
                );
                return Err(error);
            }
        };

        let (cid, context_is_new) = self.lookup_or_create(&parsed, packet)?;
        let profile_id = self
            .contexts
            .get(&cid)
            .map(|context| context.profile_id)
            .ok_or_else(|| CodecError::Internal("context vanished after lookup".to_string()))?;

        let mut rohc = Vec::with_capacity(packet.len() + 6);
        if context_is_new {
            rohc.push(PACKET_TYPE_INIT);
            self.cid_kind.encode_cid(&mut rohc, cid);
            rohc.extend_from_slice(&profile_id.to_be_bytes());
            let crc = self.crc.checksum(&rohc);
            rohc.push(crc);
        } else {
            rohc.push(PACKET_TYPE_NORMAL);
            self.cid_kind.encode_cid(&mut rohc, cid);
        }
        rohc.extend_from_slice(packet);

        self.last_info = Some(LastPacketInfo {
            cid,
            context_is_new,
        });
        self.trace.trace(
            TraceLevel::Debug,
            TraceEntity::Compressor,
            profile_id,
            &format!(
                "{}: {} bytes in, {} bytes out{}",
                cid,
                packet.len(),
                rohc.len(),
                if context_is_new { " (init)" } else { "" }
            ),
        );
        Ok(rohc)
    }

    fn decompress(&mut self, rohc_packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        let packet_type = *rohc_packet.first().ok_or(CodecError::NotEnoughData {
            needed: 1,
            got: 0,
            context: "packet type",
        })?;
        let cid_bytes = self.cid_kind.cid_bytes();

        match packet_type {
            PACKET_TYPE_INIT => {
                let header_len = 1 + cid_bytes + 2 + 1;
                if rohc_packet.len() < header_len {
                    let error = CodecError::NotEnoughData {
                        needed: header_len,
                        got: rohc_packet.len(),
                        context: "initialization header",
                    };
                    self.trace.trace(
                        TraceLevel::Warning,
                        TraceEntity::Decompressor,
                        PROFILE_ID_UNCOMPRESSED,
                        &format!("{}", error),
                    );
                    return Err(error);
                }
                let cid = self.cid_kind.decode_cid(&rohc_packet[1..1 + cid_bytes]);
                if cid.value() >= self.max_contexts {
                    let error = CodecError::CidOutOfRange {
                        cid,
                        max_contexts: self.max_contexts,
                    };
                    self.trace.trace(
                        TraceLevel::Warning,
                        TraceEntity::Decompressor,
                        PROFILE_ID_UNCOMPRESSED,
                        &format!("{}", error),
                    );
                    return Err(error);
                }
                let profile_id = u16::from_be_bytes([
                    rohc_packet[1 + cid_bytes],
                    rohc_packet[1 + cid_bytes + 1],
                ]);
                let expected = rohc_packet[header_len - 1];
                let calculated = self.crc.checksum(&rohc_packet[..header_len - 1]);
                if calculated != expected {
                    let error = CodecError::CrcMismatch {
                        expected,
                        calculated,
                    };
                    self.trace.trace(
                        TraceLevel::Warning,
                        TraceEntity::Decompressor,
                        profile_id,
                        &format!("{} init rejected: {}", cid, error),
                    );
                    return Err(error);
                }
                self.established.insert(cid);
                self.trace.trace(
                    TraceLevel::Debug,
                    TraceEntity::Decompressor,
                    profile_id,
                    &format!("{} established", cid),
                );
                Ok(rohc_packet[header_len..].to_vec())
            }
            PACKET_TYPE_NORMAL => {
                let header_len = 1 + cid_bytes;
                if rohc_packet.len() < header_len {
                    let error = CodecError::NotEnoughData {
                        needed: header_len,
                        got: rohc_packet.len(),
                        context: "packet header",
                    };
                    self.trace.trace(
                        TraceLevel::Warning,
                        TraceEntity::Decompressor,
                        PROFILE_ID_UNCOMPRESSED,
                        &format!("{}", error),
                    );
                    return Err(error);
                }
                let cid = self.cid_kind.decode_cid(&rohc_packet[1..1 + cid_bytes]);
                if cid.value() >= self.max_contexts {
                    let error = CodecError::CidOutOfRange {
                        cid,
                        max_contexts: self.max_contexts,
                    };
                    self.trace.trace(
                        TraceLevel::Warning,
                        TraceEntity::Decompressor,
                        PROFILE_ID_UNCOMPRESSED,
                        &format!("{}", error),
                    );
                    return Err(error);
                }
                if !self.established.contains(&cid) {
                    let error = CodecError::ContextNotFound(cid);
                    self.trace.trace(
                        TraceLevel::Warning,
                        TraceEntity::Decompressor,
                        PROFILE_ID_UNCOMPRESSED,
                        &format!("{}", error),
                    );
                    return Err(error);
                }
                Ok(rohc_packet[header_len..].to_vec())
            }
            other => {
                let error = CodecError::InvalidPacketType(other);
                self.trace.trace(
                    TraceLevel::Warning,
                    TraceEntity::Decompressor,
                    PROFILE_ID_UNCOMPRESSED,
                    &format!("{}", error),
                );
                Err(error)
            }
        }
    }

    fn last_packet_info(&self) -> Result<LastPacketInfo, CodecError> {
        self.last_info.ok_or(CodecError::InfoUnavailable)
    }
}
