//! Diagnostic trace plumbing: severity levels, the codec-facing sink trait,
//! and the bounded circular history kept for post-mortem dumps.
//!
//! The codec emits traces continuously; the harness only prints them when a
//! frame fails verification, so the recorder keeps a fixed-size window of the
//! most recent lines and silently overwrites the oldest ones.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::constants::{MAX_TRACE_HISTORY, MAX_TRACE_LEN};

/// Priority level of a codec trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descr = match self {
            TraceLevel::Debug => "DEBUG",
            TraceLevel::Info => "INFO",
            TraceLevel::Warning => "WARNING",
            TraceLevel::Error => "ERROR",
        };
        f.write_str(descr)
    }
}

/// Which half of the codec emitted a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEntity {
    Compressor,
    Decompressor,
}

impl fmt::Display for TraceEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descr = match self {
            TraceEntity::Compressor => "comp",
            TraceEntity::Decompressor => "decomp",
        };
        f.write_str(descr)
    }
}

/// Capability injected into the codec engine for emitting diagnostics.
///
/// The codec calls this synchronously from `compress`/`decompress`, on the
/// same thread as the verification loop.
pub trait TraceSink {
    /// Accepts one formatted trace message with its severity, originating
    /// entity, and the profile id the message relates to.
    fn trace(&mut self, level: TraceLevel, entity: TraceEntity, profile_id: u16, message: &str);
}

/// Bounded circular log of formatted trace lines.
///
/// States: empty, partially filled, full. Once full, each `record` silently
/// overwrites the oldest retained line. The fill level is tracked explicitly
/// (`entries.len()` against `capacity`), never inferred from an index value.
#[derive(Debug)]
pub struct TraceRecorder {
    capacity: usize,
    entries: Vec<String>,
    /// Slot the next write lands in once the buffer is full; the oldest
    /// retained line lives here.
    next: usize,
}

impl TraceRecorder {
    /// Creates an empty recorder retaining at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            entries: Vec::new(),
            next: 0,
        }
    }

    /// Creates a recorder with the default post-mortem history bounds.
    pub fn with_default_capacity() -> Self {
        Self::new(MAX_TRACE_HISTORY)
    }

    /// Appends one line, truncating it to the fixed length bound.
    ///
    /// Over-length lines are truncated on a UTF-8 boundary rather than
    /// rejected; this is the only place the harness intentionally drops data.
    pub fn record(&mut self, line: impl Into<String>) {
        let mut line = line.into();
        if line.len() > MAX_TRACE_LEN {
            let mut cut = MAX_TRACE_LEN;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }

        if self.entries.len() < self.capacity {
            self.entries.push(line);
        } else {
            self.entries[self.next] = line;
            self.next = (self.next + 1) % self.capacity;
        }
    }

    /// Removes and returns the retained lines, oldest first.
    ///
    /// Correctly orders lines across the wrap point once the buffer has
    /// overflowed. The recorder is empty afterwards.
    pub fn drain(&mut self) -> Vec<String> {
        let next = std::mem::take(&mut self.next);
        let entries = std::mem::take(&mut self.entries);
        if entries.len() < self.capacity {
            entries
        } else {
            let mut ordered = Vec::with_capacity(entries.len());
            ordered.extend_from_slice(&entries[next..]);
            ordered.extend_from_slice(&entries[..next]);
            ordered
        }
    }

    /// Number of lines currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no line has been recorded (or everything was drained).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained lines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Production trace sink: formats each message, optionally echoes it live,
/// and always records it into the shared history.
///
/// Warnings and errors are echoed unconditionally; lower severities only in
/// verbose mode. The history is shared with the verification loop through an
/// `Rc<RefCell<..>>` handle, which is sound here: the codec invokes the sink
/// only synchronously on the loop's own call stack.
pub struct RecordingTraceSink {
    recorder: Rc<RefCell<TraceRecorder>>,
    verbose: bool,
}

impl RecordingTraceSink {
    /// Creates a sink recording into `recorder`, echoing per `verbose`.
    pub fn new(recorder: Rc<RefCell<TraceRecorder>>, verbose: bool) -> Self {
        Self { recorder, verbose }
    }
}

impl TraceSink for RecordingTraceSink {
    fn trace(&mut self, level: TraceLevel, entity: TraceEntity, profile_id: u16, message: &str) {
        let line = format!("[{}] [{}] [profile 0x{:04X}] {}", level, entity, profile_id, message);
        if level >= TraceLevel::Warning || self.verbose {
            println!("{}", line);
        }
        self.recorder.borrow_mut().record(line);
    }
}
