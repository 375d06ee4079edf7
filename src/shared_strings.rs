//! Shared-string pool with memory/disk spillover.
//!
//! The pool can be larger than any sensible memory budget, so storage is
//! chosen per workbook: small pools land in a contiguous arena of
//! NUL-terminated strings, large ones spill to a temp file of
//! length-prefixed records. The spill file is unlinked when the provider is
//! dropped, error paths included.

use crate::error::{Error, Result};
use crate::package::OpcPackage;
use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

/// Arena starting size; doubles on demand from here.
const INITIAL_ARENA_SIZE: usize = 8 * 1024 * 1024;

/// Storage selection for the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SharedStringsMode {
    /// Always keep strings in the arena.
    InMemory,
    /// Always spill to a temp file.
    External,
    /// Estimate the pool size first and pick per workbook.
    #[default]
    Auto,
}

/// Configuration for shared-string parsing and storage.
#[derive(Debug, Clone)]
pub struct SharedStringsConfig {
    /// Storage selection strategy
    pub mode: SharedStringsMode,
    /// In `Auto` mode, estimated pool sizes above this spill to disk
    pub memory_threshold: usize,
    /// Individual strings longer than this are truncated
    pub max_string_length: usize,
    /// Whether rich-text runs contribute their text
    pub flatten_rich_text: bool,
}

impl Default for SharedStringsConfig {
    fn default() -> Self {
        Self {
            mode: SharedStringsMode::Auto,
            memory_threshold: 64 * 1024 * 1024,
            max_string_length: 1024 * 1024,
            flatten_rich_text: true,
        }
    }
}

impl SharedStringsConfig {
    /// Set the storage mode.
    pub fn with_mode(mut self, mode: SharedStringsMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the auto-mode spill threshold in bytes.
    pub fn with_memory_threshold(mut self, bytes: usize) -> Self {
        self.memory_threshold = bytes;
        self
    }

    /// Set the per-string length cap in bytes.
    pub fn with_max_string_length(mut self, bytes: usize) -> Self {
        self.max_string_length = bytes;
        self
    }

    /// Enable or disable rich-text flattening.
    pub fn with_flatten_rich_text(mut self, flatten: bool) -> Self {
        self.flatten_rich_text = flatten;
        self
    }
}

enum Storage {
    Arena { arena: Vec<u8>, offsets: Vec<u32> },
    Spill {
        file: NamedTempFile,
        offsets: Vec<u64>,
        written: u64,
    },
}

/// The workbook's shared-string pool, indexable by cell reference.
pub struct SharedStrings {
    storage: Storage,
    count: usize,
    active_mode: SharedStringsMode,
}

impl Default for SharedStrings {
    /// An empty pool; every lookup resolves to nothing.
    fn default() -> Self {
        Self {
            storage: Storage::Arena {
                arena: Vec::new(),
                offsets: Vec::new(),
            },
            count: 0,
            active_mode: SharedStringsMode::InMemory,
        }
    }
}

impl SharedStrings {
    /// Parse the shared-strings part at the given package path.
    ///
    /// A workbook without the part gets an empty pool, which is valid.
    pub fn parse(package: &OpcPackage, path: &str, config: &SharedStringsConfig) -> Result<Self> {
        if !package.zip().has(path)? {
            return Ok(Self::default());
        }
        let xml = package.read_part(path)?;
        Self::parse_xml(&xml, path, config)
    }

    /// Parse shared-strings XML content.
    ///
    /// A first lightweight pass counts entries and estimates the pool size
    /// so the storage decision and reservations happen before any string is
    /// stored.
    pub fn parse_xml(xml: &str, part: &str, config: &SharedStringsConfig) -> Result<Self> {
        let estimate = scan_pool(xml, part)?;

        let spill = match config.mode {
            SharedStringsMode::InMemory => false,
            SharedStringsMode::External => true,
            SharedStringsMode::Auto => estimate.text_bytes > config.memory_threshold,
        };

        let mut pool = if spill {
            let file = tempfile::Builder::new()
                .prefix("unxlsx-strings-")
                .suffix(".tmp")
                .tempfile()
                .map_err(|e| Error::SpillFailure(e.to_string()))?;
            Self {
                storage: Storage::Spill {
                    file,
                    offsets: Vec::with_capacity(estimate.entries),
                    written: 0,
                },
                count: 0,
                active_mode: SharedStringsMode::External,
            }
        } else {
            let capacity = INITIAL_ARENA_SIZE.max(estimate.text_bytes + estimate.entries);
            Self {
                storage: Storage::Arena {
                    arena: Vec::with_capacity(capacity),
                    offsets: Vec::with_capacity(estimate.entries),
                },
                count: 0,
                active_mode: SharedStringsMode::InMemory,
            }
        };

        pool.fill(xml, part, config)?;
        Ok(pool)
    }

    /// Second pass: decode each `si` entry and store it.
    fn fill(&mut self, xml: &str, part: &str, config: &SharedStringsConfig) -> Result<()> {
        let mut reader = quick_xml::Reader::from_str(xml);

        let mut buf = Vec::new();
        let mut in_si = false;
        // element names below the current si, outermost first
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut capture = false;
        let mut current = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(ref e)) => {
                    let name = e.name().as_ref().to_vec();
                    if !in_si {
                        if name == b"si" {
                            in_si = true;
                            current.clear();
                            stack.clear();
                        }
                    } else {
                        if name == b"t" {
                            let parent = stack.last().map(Vec::as_slice);
                            capture = match parent {
                                None => true,
                                Some(b"r") => config.flatten_rich_text,
                                Some(_) => false,
                            };
                        }
                        stack.push(name);
                    }
                }
                Ok(quick_xml::events::Event::Empty(ref e)) => {
                    if !in_si && e.name().as_ref() == b"si" {
                        self.store("", config)?;
                    }
                }
                Ok(quick_xml::events::Event::Text(ref e)) => {
                    if capture {
                        current.push_str(&e.unescape().unwrap_or_default());
                    }
                }
                Ok(quick_xml::events::Event::CData(ref e)) => {
                    if capture {
                        current.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(quick_xml::events::Event::End(ref e)) => {
                    if in_si {
                        if stack.is_empty() && e.name().as_ref() == b"si" {
                            let entry = std::mem::take(&mut current);
                            self.store(&entry, config)?;
                            in_si = false;
                        } else {
                            if e.name().as_ref() == b"t" {
                                capture = false;
                            }
                            stack.pop();
                        }
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => {
                    return Err(Error::InvalidXml {
                        part: part.to_string(),
                        detail: e.to_string(),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    fn store(&mut self, value: &str, config: &SharedStringsConfig) -> Result<()> {
        let value = truncate_to_boundary(value, config.max_string_length);

        match &mut self.storage {
            Storage::Arena { arena, offsets } => {
                offsets.push(arena.len() as u32);
                arena.extend_from_slice(value.as_bytes());
                arena.push(0);
            }
            Storage::Spill {
                file,
                offsets,
                written,
            } => {
                let length = value.len() as u32;
                let record = file.as_file_mut();
                record
                    .write_all(&length.to_le_bytes())
                    .and_then(|_| record.write_all(value.as_bytes()))
                    .map_err(|e| Error::SpillFailure(e.to_string()))?;
                offsets.push(*written);
                *written += 4 + u64::from(length);
            }
        }

        self.count += 1;
        Ok(())
    }

    /// Look up a string by pool index; fails when out of range.
    pub fn get(&self, index: usize) -> Result<String> {
        self.try_get(index)
            .map(Cow::into_owned)
            .ok_or(Error::SharedStringOutOfRange {
                index,
                count: self.count,
            })
    }

    /// Look up a string by pool index; `None` when out of range.
    pub fn try_get(&self, index: usize) -> Option<Cow<'_, str>> {
        if index >= self.count {
            return None;
        }

        match &self.storage {
            Storage::Arena { arena, offsets } => {
                let start = *offsets.get(index)? as usize;
                let rest = arena.get(start..)?;
                let end = rest.iter().position(|&b| b == 0)?;
                Some(String::from_utf8_lossy(&rest[..end]))
            }
            Storage::Spill { file, offsets, .. } => {
                let offset = *offsets.get(index)?;
                read_spill_record(file.as_file(), offset).map(Cow::Owned)
            }
        }
    }

    /// Number of strings in the pool.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The storage mode actually in use after the spill decision.
    pub fn active_mode(&self) -> SharedStringsMode {
        self.active_mode
    }

    /// Whether strings live in the spill file.
    pub fn uses_spill(&self) -> bool {
        matches!(self.storage, Storage::Spill { .. })
    }

    /// Bytes held in the in-memory arena.
    pub fn memory_usage(&self) -> usize {
        match &self.storage {
            Storage::Arena { arena, .. } => arena.len(),
            Storage::Spill { .. } => 0,
        }
    }

    /// Release the pool's storage. Dropping the spill file unlinks it.
    pub fn close(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for SharedStrings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStrings")
            .field("count", &self.count)
            .field("active_mode", &self.active_mode)
            .field("uses_spill", &self.uses_spill())
            .finish()
    }
}

struct PoolEstimate {
    entries: usize,
    text_bytes: usize,
}

/// First pass over the pool: count entries and estimate total text size.
/// A parseable `count`/`uniqueCount` attribute seeds the entry estimate.
fn scan_pool(xml: &str, part: &str) -> Result<PoolEstimate> {
    let mut reader = quick_xml::Reader::from_str(xml);

    let mut buf = Vec::new();
    let mut declared: Option<usize> = None;
    let mut entries = 0usize;
    let mut text_bytes = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(ref e))
            | Ok(quick_xml::events::Event::Empty(ref e)) => match e.name().as_ref() {
                b"sst" => {
                    for attr in e.attributes().flatten() {
                        let key = attr.key.as_ref();
                        if key == b"uniqueCount" || (key == b"count" && declared.is_none()) {
                            if let Ok(n) = String::from_utf8_lossy(&attr.value).parse() {
                                declared = Some(n);
                            }
                        }
                    }
                }
                b"si" => entries += 1,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(ref e)) => text_bytes += e.len(),
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidXml {
                    part: part.to_string(),
                    detail: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(PoolEstimate {
        entries: entries.max(declared.unwrap_or(0)),
        text_bytes,
    })
}

fn read_spill_record(file: &File, offset: u64) -> Option<String> {
    let mut reader = file;
    reader.seek(SeekFrom::Start(offset)).ok()?;

    let mut length = [0u8; 4];
    reader.read_exact(&mut length).ok()?;
    let length = u32::from_le_bytes(length) as usize;

    let mut data = vec![0u8; length];
    reader.read_exact(&mut data).ok()?;
    Some(String::from_utf8_lossy(&data).into_owned())
}

/// Truncate to the cap without splitting a UTF-8 sequence.
fn truncate_to_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
