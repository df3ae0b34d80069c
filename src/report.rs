//! Rendering of the fatal-failure report.
//!
//! When a run ends on anything but a clean shutdown, the operator gets one
//! block of text: the failing frame and its verdict, the byte-level diff for
//! mismatches, the running statistics, and the codec's retained trace
//! history. Rendering is separated from printing so tests can assert on the
//! report without a process abort in the way.

use std::fmt::Write;

use crate::diff;
use crate::pipeline::{Outcome, RunFailure, Stats};

/// Renders the complete post-mortem report for a failed run.
///
/// `traces` is the drained trace history, oldest line first.
pub fn failure_report(failure: &RunFailure, stats: &Stats, traces: &[String]) -> String {
    let mut out = String::new();

    match failure {
        RunFailure::Verification {
            frame_number,
            cid,
            outcome,
        } => {
            let context = match cid {
                Some(cid) => cid.to_string(),
                None => "no CID".to_string(),
            };
            let _ = writeln!(
                out,
                "packet #{}, {}: {}",
                frame_number,
                context,
                outcome.label()
            );
            match outcome {
                Outcome::Mismatch {
                    original,
                    decompressed,
                } => out.push_str(&diff::diff(original, decompressed)),
                Outcome::CompressionFailure { error }
                | Outcome::DecompressionFailure { error }
                | Outcome::InfoUnavailable { error } => {
                    let _ = writeln!(out, "{}", error);
                }
                Outcome::MalformedInput {
                    wire_len,
                    captured_len,
                } => {
                    let _ = writeln!(
                        out,
                        "bad capture record (len = {}, caplen = {})",
                        wire_len, captured_len
                    );
                }
                Outcome::Match => {}
            }
        }
        RunFailure::Dump { .. } | RunFailure::Capture { .. } => {
            let _ = writeln!(out, "{}", failure);
        }
    }

    let _ = writeln!(out, "stats {}", stats);

    if traces.is_empty() {
        let _ = writeln!(out, "no trace to display");
    } else {
        let _ = writeln!(out, "print the last {} traces...", traces.len());
        for line in traces {
            let _ = writeln!(out, "{}", line);
        }
    }

    out
}
