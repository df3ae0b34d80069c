//! Shared helpers for the integration tests: packet and frame builders,
//! in-memory capture streams, and codec wrappers that observe or sabotage
//! the engine under test.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;

use rohcsniff::capture::{CapturedFrame, LinkType};
use rohcsniff::codec::{LastPacketInfo, RohcCodec, ZeroRandom};
use rohcsniff::classify::UdpRtpHeuristic;
use rohcsniff::constants::{ETHERNET_FRAME_MIN_LEN, IP_PROTOCOL_UDP};
use rohcsniff::dump::{write_pcap_global_header, write_pcap_record};
use rohcsniff::engine::{CidKind, UncompressedEngine};
use rohcsniff::error::CodecError;
use rohcsniff::trace::{RecordingTraceSink, TraceRecorder};

/// Builds a well-formed IPv4/UDP packet.
pub fn ipv4_udp_packet(
    src: [u8; 4],
    dst: [u8; 4],
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total_len = 20 + 8 + payload.len();
    let mut packet = vec![0u8; total_len];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
    packet[8] = 64;
    packet[9] = IP_PROTOCOL_UDP;
    packet[12..16].copy_from_slice(&src);
    packet[16..20].copy_from_slice(&dst);
    packet[20..22].copy_from_slice(&src_port.to_be_bytes());
    packet[22..24].copy_from_slice(&dst_port.to_be_bytes());
    packet[24..26].copy_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    packet[28..].copy_from_slice(payload);
    packet
}

/// Wraps an IP packet in Ethernet framing; `pad_to_minimum` pads the frame
/// with zero bytes up to the 60-byte Ethernet minimum, as a NIC would.
pub fn ethernet_frame_bytes(ip_packet: &[u8], pad_to_minimum: bool) -> Vec<u8> {
    let mut data = vec![0u8; 14 + ip_packet.len()];
    data[12] = 0x08; // EtherType IPv4
    data[14..].copy_from_slice(ip_packet);
    if pad_to_minimum && data.len() < ETHERNET_FRAME_MIN_LEN {
        data.resize(ETHERNET_FRAME_MIN_LEN, 0);
    }
    data
}

/// Captured frame whose wire and captured lengths equal the data length.
pub fn frame_from(data: Vec<u8>) -> CapturedFrame {
    CapturedFrame::whole(0, 0, Bytes::from(data))
}

/// Serializes a legacy-pcap capture holding `frames`.
pub fn pcap_capture(link: LinkType, frames: &[CapturedFrame]) -> Vec<u8> {
    let mut out = Vec::new();
    write_pcap_global_header(&mut out, link, 1518).expect("write to Vec cannot fail");
    for frame in frames {
        write_pcap_record(&mut out, frame).expect("write to Vec cannot fail");
    }
    out
}

/// Engine wired with the production capabilities and a shared trace history.
pub fn test_engine(
    cid_kind: CidKind,
    max_contexts: u16,
) -> (UncompressedEngine, Rc<RefCell<TraceRecorder>>) {
    let recorder = Rc::new(RefCell::new(TraceRecorder::with_default_capacity()));
    let sink = RecordingTraceSink::new(Rc::clone(&recorder), false);
    let engine = UncompressedEngine::new(
        cid_kind,
        max_contexts,
        Box::new(sink),
        Box::new(UdpRtpHeuristic),
        Box::new(ZeroRandom),
    );
    (engine, recorder)
}

/// Codec wrapper recording the payload lengths handed to `compress`.
pub struct RecordingCodec<C: RohcCodec> {
    pub inner: C,
    pub compress_input_lens: Vec<usize>,
}

impl<C: RohcCodec> RecordingCodec<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            compress_input_lens: Vec::new(),
        }
    }
}

impl<C: RohcCodec> RohcCodec for RecordingCodec<C> {
    fn compress(&mut self, packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.compress_input_lens.push(packet.len());
        self.inner.compress(packet)
    }

    fn decompress(&mut self, rohc_packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.inner.decompress(rohc_packet)
    }

    fn last_packet_info(&self) -> Result<LastPacketInfo, CodecError> {
        self.inner.last_packet_info()
    }
}

/// Codec wrapper that corrupts the decompressed bytes from a given frame on,
/// simulating a silent codec regression.
pub struct TamperingCodec<C: RohcCodec> {
    inner: C,
    corrupt_from_frame: u64,
    frames_seen: u64,
}

impl<C: RohcCodec> TamperingCodec<C> {
    /// Corruption starts at `corrupt_from_frame` (1-indexed).
    pub fn new(inner: C, corrupt_from_frame: u64) -> Self {
        Self {
            inner,
            corrupt_from_frame,
            frames_seen: 0,
        }
    }
}

impl<C: RohcCodec> RohcCodec for TamperingCodec<C> {
    fn compress(&mut self, packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.frames_seen += 1;
        self.inner.compress(packet)
    }

    fn decompress(&mut self, rohc_packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut packet = self.inner.decompress(rohc_packet)?;
        if self.frames_seen >= self.corrupt_from_frame {
            if let Some(byte) = packet.last_mut() {
                *byte ^= 0xFF;
            }
        }
        Ok(packet)
    }

    fn last_packet_info(&self) -> Result<LastPacketInfo, CodecError> {
        self.inner.last_packet_info()
    }
}
