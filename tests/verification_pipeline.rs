//! End-to-end verification runs: capture stream in, verdict out.
//!
//! These tests drive the full pipeline (pcap source, built-in engine, dump
//! routing, comparison) the way the binary does, minus the process abort.

mod common;

use std::sync::atomic::AtomicBool;

use common::{
    ethernet_frame_bytes, frame_from, ipv4_udp_packet, pcap_capture, test_engine,
    RecordingCodec, TamperingCodec,
};
use rohcsniff::capture::{CaptureSource, CapturedFrame, LinkType, PcapFileSource};
use rohcsniff::engine::CidKind;
use rohcsniff::pipeline::{Outcome, RunFailure, Verifier};
use rohcsniff::report::failure_report;

fn read_dump(path: &std::path::Path) -> Vec<CapturedFrame> {
    let file = std::fs::File::open(path).unwrap();
    let mut source = PcapFileSource::new(file).unwrap();
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame().unwrap() {
        frames.push(frame);
    }
    frames
}

#[test]
fn clean_capture_verifies_every_frame() {
    // Two flows, interleaved, plus one padded minimum-size frame.
    let flow_a = ipv4_udp_packet([10, 0, 0, 1], [10, 0, 0, 9], 10000, 9000, &[0x11; 100]);
    let flow_b = ipv4_udp_packet([10, 0, 0, 2], [10, 0, 0, 9], 10002, 9002, &[0x22; 64]);
    let tiny = ipv4_udp_packet([10, 0, 0, 3], [10, 0, 0, 9], 10004, 9004, &[0x33; 4]);

    let frames = vec![
        frame_from(ethernet_frame_bytes(&flow_a, false)),
        frame_from(ethernet_frame_bytes(&flow_b, false)),
        frame_from(ethernet_frame_bytes(&flow_a, false)),
        frame_from(ethernet_frame_bytes(&tiny, true)),
        frame_from(ethernet_frame_bytes(&flow_b, false)),
    ];
    let capture = pcap_capture(LinkType::Ethernet, &frames);

    let dir = tempfile::tempdir().unwrap();
    let mut source = PcapFileSource::new(&capture[..]).unwrap();
    let (engine, _traces) = test_engine(CidKind::Small, 16);
    let mut verifier = Verifier::new(engine, source.link_type(), 16, dir.path());

    let stop = AtomicBool::new(false);
    let summary = verifier.run(&mut source, &stop, false).unwrap();

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.stats.matches, 5);
    assert_eq!(summary.stats.total(), 5);
    assert!(!summary.stopped_by_signal);
    // Three flows, three contexts, three dump files closed at shutdown.
    assert_eq!(summary.closed_contexts.len(), 3);

    // Every captured frame landed in exactly one per-context dump.
    let dumped: usize = summary
        .closed_contexts
        .iter()
        .map(|cid| {
            read_dump(&dir.path().join(format!("dump_stream_cid_{}.pcap", cid.value()))).len()
        })
        .sum();
    assert_eq!(dumped, 5);
}

#[test]
fn divergence_at_frame_k_stops_the_run_there() {
    let flow = ipv4_udp_packet([10, 0, 0, 1], [10, 0, 0, 9], 10000, 9000, &[0x44; 80]);
    let frames: Vec<_> = (0..5)
        .map(|_| frame_from(ethernet_frame_bytes(&flow, false)))
        .collect();
    let capture = pcap_capture(LinkType::Ethernet, &frames);

    let dir = tempfile::tempdir().unwrap();
    let mut source = PcapFileSource::new(&capture[..]).unwrap();
    let (engine, traces) = test_engine(CidKind::Small, 16);
    let codec = TamperingCodec::new(engine, 3);
    let mut verifier = Verifier::new(codec, LinkType::Ethernet, 16, dir.path());

    let stop = AtomicBool::new(false);
    let failure = verifier.run(&mut source, &stop, false).unwrap_err();

    match &failure {
        RunFailure::Verification {
            frame_number,
            outcome,
            ..
        } => {
            assert_eq!(*frame_number, 3);
            match outcome {
                Outcome::Mismatch {
                    original,
                    decompressed,
                } => {
                    assert_eq!(original.len(), decompressed.len());
                    assert_ne!(original, decompressed);
                }
                other => panic!("expected mismatch, got {:?}", other),
            }
        }
        other => panic!("expected verification failure, got {:?}", other),
    }

    // Frames 1 and 2 passed; frame 4 was never pulled.
    assert_eq!(verifier.stats().matches, 2);
    assert_eq!(verifier.stats().mismatches, 1);
    assert_eq!(verifier.frames_processed(), 3);
    let remaining = source.next_frame().unwrap();
    assert!(remaining.is_some(), "frame 4 must still be in the source");

    // The operator-facing report carries a non-empty diff and the traces.
    let trace_lines = traces.borrow_mut().drain();
    let report = failure_report(&failure, verifier.stats(), &trace_lines);
    assert!(report.contains("packet #3"));
    assert!(report.contains("#0x"));
    assert!(report.contains("print the last"));
}

#[test]
fn padded_minimum_frame_is_compared_at_its_logical_length() {
    // 26-byte IP packet inside a 60-byte padded Ethernet frame.
    let ip_packet = ipv4_udp_packet([10, 0, 0, 1], [10, 0, 0, 9], 10000, 9000, &[0x55; 2]);
    assert_eq!(ip_packet.len(), 30);
    let frame = frame_from(ethernet_frame_bytes(&ip_packet, true));
    assert_eq!(frame.wire_len, 60);
    let capture = pcap_capture(LinkType::Ethernet, &[frame]);

    let dir = tempfile::tempdir().unwrap();
    let mut source = PcapFileSource::new(&capture[..]).unwrap();
    let (engine, _traces) = test_engine(CidKind::Small, 16);
    let codec = RecordingCodec::new(engine);
    let mut verifier = Verifier::new(codec, LinkType::Ethernet, 16, dir.path());

    let stop = AtomicBool::new(false);
    let summary = verifier.run(&mut source, &stop, false).unwrap();

    assert_eq!(summary.stats.matches, 1);
    // The codec saw the 30-byte logical IP packet, not the 46-byte padded
    // payload region of the frame.
    assert_eq!(verifier.codec().compress_input_lens, vec![30]);
}

#[test]
fn padded_frame_truncation_reaches_the_codec() {
    let ip_packet = ipv4_udp_packet([10, 0, 0, 1], [10, 0, 0, 9], 10000, 9000, &[0x55; 18]);
    assert_eq!(ip_packet.len(), 46);
    let mut data = ethernet_frame_bytes(&ip_packet, true);
    assert_eq!(data.len(), 60);
    // Rewrite the total-length field to 40: six trailing padding-like bytes.
    data[14 + 2..14 + 4].copy_from_slice(&40u16.to_be_bytes());
    let capture = pcap_capture(LinkType::Ethernet, &[frame_from(data)]);

    let dir = tempfile::tempdir().unwrap();
    let mut source = PcapFileSource::new(&capture[..]).unwrap();
    let (engine, _traces) = test_engine(CidKind::Small, 16);
    let codec = RecordingCodec::new(engine);
    let mut verifier = Verifier::new(codec, LinkType::Ethernet, 16, dir.path());

    let stop = AtomicBool::new(false);
    let summary = verifier.run(&mut source, &stop, false).unwrap();

    assert_eq!(summary.stats.matches, 1);
    assert_eq!(verifier.codec().compress_input_lens, vec![40]);
}

#[test]
fn cid_reuse_restarts_the_dump_file() {
    // One context slot, two alternating flows: every frame reinitializes
    // CID 0, so its dump file only ever holds the latest frame.
    let flow_a = ipv4_udp_packet([10, 0, 0, 1], [10, 0, 0, 9], 10000, 9000, &[0xAA; 40]);
    let flow_b = ipv4_udp_packet([10, 0, 0, 2], [10, 0, 0, 9], 10000, 9000, &[0xBB; 40]);
    let frames = vec![
        frame_from(ethernet_frame_bytes(&flow_a, false)),
        frame_from(ethernet_frame_bytes(&flow_b, false)),
        frame_from(ethernet_frame_bytes(&flow_a, false)),
    ];
    let capture = pcap_capture(LinkType::Ethernet, &frames);

    let dir = tempfile::tempdir().unwrap();
    let mut source = PcapFileSource::new(&capture[..]).unwrap();
    let (engine, _traces) = test_engine(CidKind::Small, 1);
    let mut verifier = Verifier::new(engine, LinkType::Ethernet, 1, dir.path());

    let stop = AtomicBool::new(false);
    let summary = verifier.run(&mut source, &stop, false).unwrap();

    assert_eq!(summary.stats.matches, 3);
    let dumped = read_dump(&dir.path().join("dump_stream_cid_0.pcap"));
    assert_eq!(dumped.len(), 1);
    assert_eq!(&dumped[0].data[..], &frames[2].data[..]);
}

#[test]
fn cooked_and_raw_media_verify_end_to_end() {
    let ip_packet = ipv4_udp_packet([10, 0, 0, 1], [10, 0, 0, 9], 10000, 9000, &[0x66; 32]);

    for link in [LinkType::LinuxCooked, LinkType::Raw] {
        let data = match link {
            LinkType::LinuxCooked => {
                let mut data = vec![0u8; 16 + ip_packet.len()];
                data[16..].copy_from_slice(&ip_packet);
                data
            }
            _ => ip_packet.clone(),
        };
        let capture = pcap_capture(link, &[frame_from(data)]);

        let dir = tempfile::tempdir().unwrap();
        let mut source = PcapFileSource::new(&capture[..]).unwrap();
        assert_eq!(source.link_type(), link);
        let (engine, _traces) = test_engine(CidKind::Small, 16);
        let mut verifier = Verifier::new(engine, link, 16, dir.path());

        let stop = AtomicBool::new(false);
        let summary = verifier.run(&mut source, &stop, false).unwrap();
        assert_eq!(summary.stats.matches, 1, "link {:?}", link);
    }
}

#[test]
fn randomized_traffic_round_trips_deterministically() {
    use rand::prelude::*;
    use rand::rngs::StdRng;

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut frames = Vec::new();
    for _ in 0..50 {
        let src = [10, 0, 0, rng.random_range(1..=4)];
        let dst_port = rng.random_range(8000..9000u16) & !1;
        let payload_len = rng.random_range(4..200usize);
        let payload: Vec<u8> = (0..payload_len).map(|_| rng.random()).collect();
        let packet = ipv4_udp_packet(src, [10, 0, 0, 200], 10000, dst_port, &payload);
        frames.push(frame_from(ethernet_frame_bytes(&packet, false)));
    }
    let capture = pcap_capture(LinkType::Ethernet, &frames);

    let dir = tempfile::tempdir().unwrap();
    let mut source = PcapFileSource::new(&capture[..]).unwrap();
    // Two context slots for four flows: forces steady LRU reclaim.
    let (engine, _traces) = test_engine(CidKind::Small, 2);
    let mut verifier = Verifier::new(engine, LinkType::Ethernet, 2, dir.path());

    let stop = AtomicBool::new(false);
    let summary = verifier.run(&mut source, &stop, false).unwrap();
    assert_eq!(summary.stats.matches, 50);
    assert_eq!(summary.closed_contexts.len(), 2);
}
