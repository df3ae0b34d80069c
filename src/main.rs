//! Sniffer binary: verify a ROHC codec against live traffic.
//!
//! Opens the named network device, round-trips every sniffed frame through
//! the codec engine, and stops loudly at the first frame that fails
//! verification. Runs until interrupted (Ctrl+C / SIGTERM), which closes the
//! per-context dump files and exits cleanly.

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use rohcsniff::capture::{CaptureSource, LiveCapture};
use rohcsniff::classify::UdpRtpHeuristic;
use rohcsniff::codec::ZeroRandom;
use rohcsniff::constants::SMALL_CID_MAX_CONTEXTS;
use rohcsniff::engine::{CidKind, UncompressedEngine};
use rohcsniff::error::SetupError;
use rohcsniff::pipeline::Verifier;
use rohcsniff::report;
use rohcsniff::trace::{RecordingTraceSink, TraceRecorder};

#[derive(Parser, Debug)]
#[command(
    name = "rohcsniff",
    about = "Test a ROHC codec with sniffed traffic: compress, decompress, compare",
    disable_version_flag = true
)]
struct CliArgs {
    /// The type of CID to use among 'smallcid' and 'largecid'.
    #[arg(value_enum, value_name = "CID_TYPE")]
    cid_type: Option<CidTypeArg>,

    /// The name of the network device to capture packets from.
    #[arg(value_name = "DEVICE")]
    device: Option<String>,

    /// Print version information and exit.
    #[arg(short = 'v', long = "version")]
    show_version: bool,

    /// Echo codec trace lines live instead of only warnings and errors.
    #[arg(long)]
    verbose: bool,

    /// The maximum number of contexts to simultaneously use during the test.
    #[arg(long, value_name = "NUM")]
    max_contexts: Option<u32>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CidTypeArg {
    /// One-byte context identifiers.
    #[value(name = "smallcid")]
    Small,
    /// Two-byte context identifiers.
    #[value(name = "largecid")]
    Large,
}

impl From<CidTypeArg> for CidKind {
    fn from(value: CidTypeArg) -> Self {
        match value {
            CidTypeArg::Small => CidKind::Small,
            CidTypeArg::Large => CidKind::Large,
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.show_version {
        println!("rohcsniff {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let (Some(cid_type), Some(device)) = (args.cid_type, args.device.clone()) else {
        eprintln!("both CID_TYPE and DEVICE are required; see --help for usage");
        return ExitCode::FAILURE;
    };
    let cid_kind = CidKind::from(cid_type);

    let max_contexts = match validate_max_contexts(cid_kind, args.max_contexts) {
        Ok(max_contexts) => max_contexts,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::FAILURE;
        }
    };

    match sniff(cid_kind, max_contexts, &device, args.verbose) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}

/// Checks the requested context bound against the CID type's range.
fn validate_max_contexts(
    cid_kind: CidKind,
    requested: Option<u32>,
) -> Result<u16, SetupError> {
    let bound = cid_kind.max_contexts_bound();
    match requested {
        None => Ok(SMALL_CID_MAX_CONTEXTS.min(bound)),
        Some(count) if count >= 1 && count <= u32::from(bound) => Ok(count as u16),
        Some(count) => Err(SetupError::InvalidMaxContexts {
            given: count,
            max: bound,
        }),
    }
}

/// Wires the capture source, codec engine, and verifier together and runs
/// until the source ends, a signal arrives, or verification fails.
fn sniff(
    cid_kind: CidKind,
    max_contexts: u16,
    device: &str,
    verbose: bool,
) -> Result<(), SetupError> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_from_signal = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        eprintln!("signal caught, stopping after the in-flight frame");
        stop_from_signal.store(true, Ordering::SeqCst);
    })
    .expect("failed to install the signal handler");

    let mut source = LiveCapture::open(device)?;
    let link = source.link_type();

    let recorder = Rc::new(RefCell::new(TraceRecorder::with_default_capacity()));
    let sink = RecordingTraceSink::new(Rc::clone(&recorder), verbose);
    let codec = UncompressedEngine::new(
        cid_kind,
        max_contexts,
        Box::new(sink),
        Box::new(UdpRtpHeuristic),
        Box::new(ZeroRandom),
    );
    let mut verifier = Verifier::new(codec, link, max_contexts, ".");

    match verifier.run(&mut source, &stop, true) {
        Ok(summary) => {
            println!();
            if summary.stopped_by_signal {
                println!("program stopped by signal");
            }
            for cid in &summary.closed_contexts {
                println!("close dump file for context with ID {}", cid.value());
            }
            println!(
                "{} frames verified, stats {}",
                summary.frames, summary.stats
            );
            Ok(())
        }
        Err(failure) => {
            let traces = recorder.borrow_mut().drain();
            eprintln!();
            eprint!(
                "{}",
                report::failure_report(&failure, verifier.stats(), &traces)
            );
            // Die hard: leave a core for post-mortem work, never a clean code.
            std::process::abort();
        }
    }
}
