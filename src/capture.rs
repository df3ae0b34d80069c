//! Capture sources: where verification frames come from.
//!
//! Two implementations of [`CaptureSource`] exist: a live pnet datalink
//! channel on a network interface, and a legacy-pcap stream reader used for
//! offline verification and throughout the test suite. The link-layer type is
//! fixed per source for the whole run; it determines how many framing bytes
//! the pipeline strips before each IP packet.

use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError};
use pnet::datalink::{self, Channel, Config, DataLinkReceiver};

use crate::constants::{ETHERNET_HDR_LEN, LINUX_COOKED_HDR_LEN};
use crate::error::{CaptureError, SetupError};

/// Link-layer framing of a capture medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Ethernet II framing (14 header bytes).
    Ethernet,
    /// Linux cooked-socket framing (16 header bytes).
    LinuxCooked,
    /// Raw IP, no link-layer header.
    Raw,
}

impl LinkType {
    /// Number of framing bytes preceding the IP packet.
    pub fn header_len(self) -> usize {
        match self {
            LinkType::Ethernet => ETHERNET_HDR_LEN,
            LinkType::LinuxCooked => LINUX_COOKED_HDR_LEN,
            LinkType::Raw => 0,
        }
    }

    /// Maps a pcap linktype number to a supported medium.
    ///
    /// Raw IP appears as 101 in capture files and as the historic value 12 on
    /// some BSD-derived stacks; both are accepted.
    pub fn from_pcap_linktype(linktype: i32) -> Option<Self> {
        match linktype {
            1 => Some(LinkType::Ethernet),
            113 => Some(LinkType::LinuxCooked),
            12 | 101 => Some(LinkType::Raw),
            _ => None,
        }
    }

    /// The pcap linktype number written into dump-file headers.
    pub fn to_pcap_linktype(self) -> u32 {
        match self {
            LinkType::Ethernet => 1,
            LinkType::LinuxCooked => 113,
            LinkType::Raw => 101,
        }
    }
}

/// One captured frame with its capture-record metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Capture timestamp, seconds part.
    pub ts_sec: u32,
    /// Capture timestamp, microseconds part.
    pub ts_usec: u32,
    /// Bytes actually captured (`data.len()`).
    pub captured_len: usize,
    /// Bytes the frame occupied on the wire.
    pub wire_len: usize,
    /// The captured bytes, link layer included.
    pub data: Bytes,
}

impl CapturedFrame {
    /// Builds a frame whose captured and wire lengths both equal the data
    /// length, as a live capture delivers them.
    pub fn whole(ts_sec: u32, ts_usec: u32, data: Bytes) -> Self {
        let len = data.len();
        Self {
            ts_sec,
            ts_usec,
            captured_len: len,
            wire_len: len,
            data,
        }
    }
}

/// A source of captured frames with a fixed link-layer type.
pub trait CaptureSource {
    /// Link-layer framing of every frame this source yields.
    fn link_type(&self) -> LinkType;

    /// Pulls the next frame; `Ok(None)` signals end of stream.
    ///
    /// May block indefinitely on a live source awaiting traffic.
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError>;
}

/// Live capture on a network interface through a pnet datalink channel.
///
/// pnet channels deliver Ethernet frames, so the link type is always
/// [`LinkType::Ethernet`]; cooked and raw media are reachable through
/// [`PcapFileSource`].
pub struct LiveCapture {
    rx: Box<dyn DataLinkReceiver>,
}

impl LiveCapture {
    /// Opens `device` for sniffing.
    ///
    /// # Errors
    /// - [`SetupError::DeviceOpen`] - Unknown interface or channel failure
    /// - [`SetupError::UnsupportedLinkType`] - Channel is not Ethernet
    pub fn open(device: &str) -> Result<Self, SetupError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|candidate| candidate.name == device)
            .ok_or_else(|| SetupError::DeviceOpen {
                device: device.to_string(),
                reason: "no such interface".to_string(),
            })?;

        match datalink::channel(&interface, Config::default()) {
            Ok(Channel::Ethernet(_tx, rx)) => Ok(Self { rx }),
            Ok(_) => Err(SetupError::UnsupportedLinkType { linktype: 0 }),
            Err(source) => Err(SetupError::DeviceOpen {
                device: device.to_string(),
                reason: source.to_string(),
            }),
        }
    }
}

impl CaptureSource for LiveCapture {
    fn link_type(&self) -> LinkType {
        LinkType::Ethernet
    }

    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        let packet = self.rx.next()?;
        let data = Bytes::copy_from_slice(packet);
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Ok(Some(CapturedFrame::whole(
            elapsed.as_secs() as u32,
            elapsed.subsec_micros(),
            data,
        )))
    }
}

/// Legacy-pcap stream reader over any `Read` source.
///
/// The link type comes from the stream's global header during construction,
/// so an unsupported medium fails at setup time, before any frame is pulled.
pub struct PcapFileSource<R: Read> {
    reader: LegacyPcapReader<R>,
    link_type: LinkType,
}

impl<R: Read> PcapFileSource<R> {
    /// Parses the global header of `input` and prepares record iteration.
    ///
    /// # Errors
    /// - [`SetupError::InvalidCapture`] - Not a readable legacy pcap stream
    /// - [`SetupError::UnsupportedLinkType`] - Medium is not Ethernet/cooked/raw
    pub fn new(input: R) -> Result<Self, SetupError> {
        let mut reader = LegacyPcapReader::new(65536, input)
            .map_err(|error| SetupError::InvalidCapture(format!("{:?}", error)))?;

        // The first block out of the reader is the global header.
        let linktype = loop {
            match reader.next() {
                Ok((offset, block)) => {
                    let found = match block {
                        PcapBlockOwned::LegacyHeader(ref header) => Some(header.network.0),
                        _ => None,
                    };
                    drop(block);
                    reader.consume(offset);
                    match found {
                        Some(linktype) => break linktype,
                        None => {
                            return Err(SetupError::InvalidCapture(
                                "capture record precedes the global header".to_string(),
                            ));
                        }
                    }
                }
                Err(PcapError::Incomplete(_)) => {
                    reader
                        .refill()
                        .map_err(|error| SetupError::InvalidCapture(format!("{:?}", error)))?;
                }
                Err(error) => {
                    return Err(SetupError::InvalidCapture(format!("{:?}", error)));
                }
            }
        };

        let link_type = LinkType::from_pcap_linktype(linktype).ok_or(
            SetupError::UnsupportedLinkType {
                linktype: linktype as u32,
            },
        )?;

        Ok(Self { reader, link_type })
    }
}

impl<R: Read> CaptureSource for PcapFileSource<R> {
    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        loop {
            match self.reader.next() {
                Ok((offset, block)) => {
                    let parsed = match block {
                        PcapBlockOwned::Legacy(ref record) => Ok(Some(CapturedFrame {
                            ts_sec: record.ts_sec,
                            ts_usec: record.ts_usec,
                            captured_len: record.caplen as usize,
                            wire_len: record.origlen as usize,
                            data: Bytes::copy_from_slice(record.data),
                        })),
                        PcapBlockOwned::LegacyHeader(_) => Ok(None),
                        PcapBlockOwned::NG(_) => Err(CaptureError::Malformed(
                            "pcapng block in legacy pcap stream".to_string(),
                        )),
                    };
                    drop(block);
                    self.reader.consume(offset);
                    match parsed {
                        Ok(Some(frame)) => return Ok(Some(frame)),
                        Ok(None) => {}
                        Err(error) => return Err(error),
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    self.reader
                        .refill()
                        .map_err(|error| CaptureError::Malformed(format!("{:?}", error)))?;
                }
                Err(error) => {
                    return Err(CaptureError::Malformed(format!("{:?}", error)));
                }
            }
        }
    }
}
