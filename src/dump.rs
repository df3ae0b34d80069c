//! Per-context capture dumps for post-mortem analysis.
//!
//! Every frame the codec assigns to a context is appended to that context's
//! dump file, `dump_stream_cid_<cid>.pcap`. When the codec reports that a
//! context was (re)initialized, the old file is deleted and a fresh one
//! started, so a dump file never interleaves frames from two unrelated flows
//! that happened to reuse a CID. Frames whose compression failed before any
//! CID was assigned land in a fixed fallback file instead.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::capture::{CapturedFrame, LinkType};
use crate::constants::CAPTURE_SNAPLEN;
use crate::error::DumpError;
use crate::types::ContextId;

/// Name of the capture file holding the last frame whose compression failed.
pub const FALLBACK_DUMP_FILE: &str = "dump_stream_default.pcap";

/// Writes a legacy-pcap global header (little-endian, version 2.4).
pub fn write_pcap_global_header(
    w: &mut impl Write,
    link: LinkType,
    snaplen: u32,
) -> std::io::Result<()> {
    w.write_all(&0xa1b2c3d4u32.to_le_bytes())?;
    w.write_all(&2u16.to_le_bytes())?;
    w.write_all(&4u16.to_le_bytes())?;
    w.write_all(&0i32.to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;
    w.write_all(&snaplen.to_le_bytes())?;
    w.write_all(&link.to_pcap_linktype().to_le_bytes())?;
    Ok(())
}

/// Writes one legacy-pcap record carrying `frame`.
pub fn write_pcap_record(w: &mut impl Write, frame: &CapturedFrame) -> std::io::Result<()> {
    w.write_all(&frame.ts_sec.to_le_bytes())?;
    w.write_all(&frame.ts_usec.to_le_bytes())?;
    w.write_all(&(frame.data.len() as u32).to_le_bytes())?;
    w.write_all(&(frame.wire_len as u32).to_le_bytes())?;
    w.write_all(&frame.data)?;
    Ok(())
}

/// An open capture file accepting frames for one context.
#[derive(Debug)]
pub struct DumpWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl DumpWriter {
    /// Creates (truncating) the file at `path` and writes the global header.
    pub fn create(path: PathBuf, link: LinkType) -> Result<Self, DumpError> {
        let file = File::create(&path).map_err(|source| DumpError::Create {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        write_pcap_global_header(&mut writer, link, CAPTURE_SNAPLEN).map_err(|source| {
            DumpError::Write {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Self { path, writer })
    }

    /// Appends one frame and flushes, so the file stays complete even if the
    /// process aborts right after a verification failure.
    pub fn write_frame(&mut self, frame: &CapturedFrame) -> Result<(), DumpError> {
        write_pcap_record(&mut self.writer, frame)
            .and_then(|()| self.writer.flush())
            .map_err(|source| DumpError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Maintains one dump slot per possible CID.
///
/// Slots are allocated once from the configured context bound; handles are
/// created lazily on first routing and replaced atomically when the codec
/// reports a context reinitialization.
#[derive(Debug)]
pub struct DumpManager {
    slots: Vec<Option<DumpWriter>>,
    link: LinkType,
    directory: PathBuf,
}

impl DumpManager {
    /// Creates a manager with `max_contexts` empty slots, writing files with
    /// `link` framing into `directory`.
    pub fn new(max_contexts: u16, link: LinkType, directory: impl Into<PathBuf>) -> Self {
        let mut slots = Vec::with_capacity(usize::from(max_contexts));
        slots.resize_with(usize::from(max_contexts), || None);
        Self {
            slots,
            link,
            directory: directory.into(),
        }
    }

    /// Path of the dump file for `cid`.
    pub fn path_for(&self, cid: ContextId) -> PathBuf {
        self.directory
            .join(format!("dump_stream_cid_{}.pcap", cid.value()))
    }

    /// Routes one frame into the dump slot for `cid`.
    ///
    /// With `context_is_new` set, any existing handle is closed and its
    /// backing file deleted before a fresh file is started, even when no
    /// prior handle existed, so a leftover file from an earlier run can never
    /// absorb frames of a new flow. Without it, a missing handle is simply
    /// opened.
    ///
    /// # Errors
    /// Any filesystem failure here is terminal for the pipeline; there is no
    /// recovery policy for a diagnostic tool that cannot write diagnostics.
    pub fn route(
        &mut self,
        cid: ContextId,
        context_is_new: bool,
        frame: &CapturedFrame,
    ) -> Result<(), DumpError> {
        let index = cid.as_index();
        if index >= self.slots.len() {
            return Err(DumpError::CidOutOfRange {
                cid,
                max_contexts: self.slots.len() as u16,
            });
        }

        if context_is_new {
            // Close first so buffered frames of the dying flow are flushed
            // before its file disappears.
            drop(self.slots[index].take());
            let path = self.path_for(cid);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(DumpError::Remove { path, source }),
            }
            self.slots[index] = Some(DumpWriter::create(path, self.link)?);
        }

        if self.slots[index].is_none() {
            self.slots[index] = Some(DumpWriter::create(self.path_for(cid), self.link)?);
        }

        match self.slots[index].as_mut() {
            Some(writer) => writer.write_frame(frame),
            None => unreachable!("dump slot populated above"),
        }
    }

    /// Whether a handle is currently open for `cid`.
    pub fn is_open(&self, cid: ContextId) -> bool {
        self.slots
            .get(cid.as_index())
            .is_some_and(|slot| slot.is_some())
    }

    /// Number of currently open handles.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Closes every open handle, returning the CIDs that had one.
    pub fn close_all(&mut self) -> Vec<ContextId> {
        let mut closed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(writer) = slot.take() {
                drop(writer);
                closed.push(ContextId::new(index as u16));
            }
        }
        closed
    }
}

/// Writes `frame` as the sole record of the fallback capture file.
///
/// The file is recreated on every call: it holds exactly the most recent
/// frame whose compression failed. Returns the file's path.
pub fn write_fallback_dump(
    directory: &Path,
    link: LinkType,
    frame: &CapturedFrame,
) -> Result<PathBuf, DumpError> {
    let path = directory.join(FALLBACK_DUMP_FILE);
    let mut writer = DumpWriter::create(path.clone(), link)?;
    writer.write_frame(frame)?;
    Ok(path)
}
