//! Bounded Zip container access for OOXML packages.
//!
//! Workbook archives come from untrusted sources, so every read goes through
//! configurable limits: entry count, per-entry uncompressed size, and total
//! uncompressed size are checked before any decompressed byte reaches a
//! caller, entry paths are normalized, and traversal attempts are dropped.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Zip magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Decompression chunk size.
const READ_CHUNK: usize = 512 * 1024;

/// Longest accepted entry path, in bytes.
const MAX_PATH_LEN: usize = 1024;

/// Security limits applied to the archive.
#[derive(Debug, Clone)]
pub struct ZipLimits {
    /// Maximum number of entries in the central directory
    pub max_entries: usize,
    /// Maximum uncompressed size of a single entry
    pub max_entry_size: u64,
    /// Maximum total uncompressed size across all entries
    pub max_total_uncompressed: u64,
}

impl Default for ZipLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_entry_size: 256 * 1024 * 1024,
            max_total_uncompressed: 2 * 1024 * 1024 * 1024,
        }
    }
}

/// One catalogued archive entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Normalized entry path (forward slashes, no leading slash)
    pub path: String,
    /// Compressed size in bytes
    pub compressed_size: u64,
    /// Uncompressed size in bytes
    pub uncompressed_size: u64,
    /// Whether the entry's encryption bit is set
    pub encrypted: bool,
    /// Index into the central directory
    index: usize,
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

type Archive = zip::ZipArchive<Box<dyn ReadSeek>>;

/// Reader over a workbook's Zip container.
///
/// The central directory is validated against [`ZipLimits`] at open time;
/// the entry catalog is built lazily on first enumeration and cached.
/// All operations after [`close`](ZipReader::close) fail with
/// [`Error::NotOpen`].
pub struct ZipReader {
    archive: RefCell<Option<Archive>>,
    catalog: RefCell<Option<Vec<ZipEntry>>>,
    limits: ZipLimits,
}

impl ZipReader {
    /// Open an archive from a file path with default limits.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_limits(path, ZipLimits::default())
    }

    /// Open an archive from a file path.
    pub fn open_with_limits(path: impl AsRef<Path>, limits: ZipLimits) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        let read = file.read(&mut magic)?;
        if read < 4 || magic != ZIP_MAGIC {
            return Err(Error::NotAZip(path.display().to_string()));
        }
        file.rewind()?;

        let source: Box<dyn ReadSeek> = Box::new(BufReader::new(file));
        Self::from_source(source, limits)
    }

    /// Open an archive held in memory with default limits.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_limits(data, ZipLimits::default())
    }

    /// Open an archive held in memory.
    pub fn from_bytes_with_limits(data: Vec<u8>, limits: ZipLimits) -> Result<Self> {
        if data.len() < 4 || data[..4] != ZIP_MAGIC {
            return Err(Error::NotAZip("in-memory buffer".to_string()));
        }
        let source: Box<dyn ReadSeek> = Box::new(Cursor::new(data));
        Self::from_source(source, limits)
    }

    fn from_source(source: Box<dyn ReadSeek>, limits: ZipLimits) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(source)?;
        Self::validate_limits(&mut archive, &limits)?;

        Ok(Self {
            archive: RefCell::new(Some(archive)),
            catalog: RefCell::new(None),
            limits,
        })
    }

    /// Scan the central directory and fail fast on any exceeded limit,
    /// before any entry data is decompressed.
    fn validate_limits(archive: &mut Archive, limits: &ZipLimits) -> Result<()> {
        if archive.len() > limits.max_entries {
            return Err(Error::TooManyEntries {
                count: archive.len(),
                limit: limits.max_entries,
            });
        }

        let mut total: u64 = 0;
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            let size = entry.size();
            if size > limits.max_entry_size {
                return Err(Error::EntryTooLarge {
                    path: entry.name().to_string(),
                    size,
                    limit: limits.max_entry_size,
                });
            }
            total = total.saturating_add(size);
            if total > limits.max_total_uncompressed {
                return Err(Error::TotalUncompressedTooLarge {
                    total,
                    limit: limits.max_total_uncompressed,
                });
            }
        }

        Ok(())
    }

    /// List catalogued entries.
    ///
    /// Entries with suspicious paths are dropped from the listing;
    /// encrypted entries fail the enumeration.
    pub fn entries(&self) -> Result<Vec<ZipEntry>> {
        self.ensure_catalog()?;
        let catalog = self.catalog.borrow();
        let entries = catalog.as_ref().expect("catalog built above");
        if let Some(encrypted) = entries.iter().find(|e| e.encrypted) {
            return Err(Error::EncryptionNotSupported(encrypted.path.clone()));
        }
        Ok(entries.clone())
    }

    /// Whether an entry with the given normalized path exists.
    pub fn has(&self, path: &str) -> Result<bool> {
        self.ensure_catalog()?;
        Ok(self
            .catalog
            .borrow()
            .as_ref()
            .expect("catalog built above")
            .iter()
            .any(|e| e.path == path))
    }

    /// Read and decompress one entry into a contiguous buffer.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        if path.len() > MAX_PATH_LEN {
            return Err(Error::PathTooLong { limit: MAX_PATH_LEN });
        }
        if is_path_suspicious(path) {
            return Err(Error::SuspiciousPath(path.to_string()));
        }

        self.ensure_catalog()?;
        let entry = {
            let catalog = self.catalog.borrow();
            catalog
                .as_ref()
                .expect("catalog built above")
                .iter()
                .find(|e| e.path == path)
                .cloned()
                .ok_or_else(|| Error::EntryNotFound(path.to_string()))?
        };

        if entry.uncompressed_size > self.limits.max_entry_size {
            return Err(Error::EntryTooLarge {
                path: entry.path,
                size: entry.uncompressed_size,
                limit: self.limits.max_entry_size,
            });
        }
        if entry.encrypted {
            return Err(Error::EncryptionNotSupported(entry.path));
        }

        let mut guard = self.archive.borrow_mut();
        let archive = guard.as_mut().ok_or(Error::NotOpen("zip reader"))?;
        let mut file = archive
            .by_index(entry.index)
            .map_err(|e| Error::DecompressionError {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        let mut data = Vec::with_capacity(entry.uncompressed_size as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut chunk).map_err(|e| Error::DecompressionError {
                path: path.to_string(),
                detail: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }

        Ok(data)
    }

    /// Read an entry and decode it as UTF-8 text, dropping any leading BOM.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        let data = self.read(path)?;
        let text = String::from_utf8_lossy(&data).into_owned();
        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }

    /// Release the underlying source and cached catalog.
    pub fn close(&self) {
        self.archive.borrow_mut().take();
        self.catalog.borrow_mut().take();
    }

    /// Whether the reader is still open.
    pub fn is_open(&self) -> bool {
        self.archive.borrow().is_some()
    }

    /// The limits this reader enforces.
    pub fn limits(&self) -> &ZipLimits {
        &self.limits
    }

    fn ensure_catalog(&self) -> Result<()> {
        if self.catalog.borrow().is_some() {
            return Ok(());
        }

        let mut guard = self.archive.borrow_mut();
        let archive = guard.as_mut().ok_or(Error::NotOpen("zip reader"))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;

            let path = normalize_path(file.name());
            if path.is_empty() || is_path_suspicious(&path) || path.len() > MAX_PATH_LEN {
                continue;
            }

            entries.push(ZipEntry {
                path,
                compressed_size: file.compressed_size(),
                uncompressed_size: file.size(),
                encrypted: file.encrypted(),
                index,
            });
        }
        drop(guard);

        *self.catalog.borrow_mut() = Some(entries);
        Ok(())
    }
}

impl std::fmt::Debug for ZipReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipReader")
            .field("open", &self.is_open())
            .field("limits", &self.limits)
            .finish()
    }
}

/// Normalize an entry path: backslashes become forward slashes and leading
/// slashes are stripped.
fn normalize_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    normalized.trim_start_matches('/').to_string()
}

/// Paths with traversal components, embedded NUL, or absolute form are
/// rejected outright.
fn is_path_suspicious(path: &str) -> bool {
    if path.starts_with('/') || path.contains('\0') {
        return true;
    }
    path.split('/').any(|component| component == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for (name, data) in files {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        buffer
    }

    #[test]
    fn test_open_read_round_trip() {
        let data = build_zip(&[("a.xml", b"<a/>"), ("dir/b.xml", b"<b/>")]);
        let reader = ZipReader::from_bytes(data).unwrap();

        assert!(reader.has("a.xml").unwrap());
        assert!(reader.has("dir/b.xml").unwrap());
        assert!(!reader.has("missing.xml").unwrap());

        assert_eq!(reader.read("a.xml").unwrap(), b"<a/>");
        assert_eq!(reader.read_xml("dir/b.xml").unwrap(), "<b/>");
    }

    #[test]
    fn test_not_a_zip() {
        let result = ZipReader::from_bytes(vec![0x00, 0x01, 0x02, 0x03, 0x04]);
        assert!(matches!(result, Err(Error::NotAZip(_))));

        let result = ZipReader::from_bytes(vec![0x50]);
        assert!(matches!(result, Err(Error::NotAZip(_))));
    }

    #[test]
    fn test_entry_not_found() {
        let data = build_zip(&[("a.xml", b"<a/>")]);
        let reader = ZipReader::from_bytes(data).unwrap();
        assert!(matches!(
            reader.read("nope.xml"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_suspicious_paths_dropped_from_listing() {
        let data = build_zip(&[
            ("good.xml", b"<g/>"),
            ("../escape.xml", b"<e/>"),
            ("nested/../../escape2.xml", b"<e/>"),
        ]);
        let reader = ZipReader::from_bytes(data).unwrap();

        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "good.xml");
    }

    #[test]
    fn test_suspicious_path_read_rejected() {
        let data = build_zip(&[("good.xml", b"<g/>")]);
        let reader = ZipReader::from_bytes(data).unwrap();

        assert!(matches!(
            reader.read("../good.xml"),
            Err(Error::SuspiciousPath(_))
        ));
        assert!(matches!(
            reader.read("/good.xml"),
            Err(Error::SuspiciousPath(_))
        ));

        let long = "a/".repeat(600) + "x.xml";
        assert!(matches!(reader.read(&long), Err(Error::PathTooLong { .. })));
    }

    #[test]
    fn test_backslash_paths_normalized() {
        let data = build_zip(&[("dir\\file.xml", b"<f/>")]);
        let reader = ZipReader::from_bytes(data).unwrap();

        assert!(reader.has("dir/file.xml").unwrap());
        assert_eq!(reader.read("dir/file.xml").unwrap(), b"<f/>");
    }

    #[test]
    fn test_too_many_entries() {
        let data = build_zip(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let limits = ZipLimits {
            max_entries: 2,
            ..Default::default()
        };
        let result = ZipReader::from_bytes_with_limits(data, limits);
        assert!(matches!(result, Err(Error::TooManyEntries { .. })));
    }

    #[test]
    fn test_entry_too_large() {
        let data = build_zip(&[("big.bin", &[0u8; 64][..])]);
        let limits = ZipLimits {
            max_entry_size: 16,
            ..Default::default()
        };
        let result = ZipReader::from_bytes_with_limits(data, limits);
        assert!(matches!(result, Err(Error::EntryTooLarge { .. })));
    }

    #[test]
    fn test_total_uncompressed_too_large() {
        let data = build_zip(&[("a.bin", &[0u8; 40][..]), ("b.bin", &[0u8; 40][..])]);
        let limits = ZipLimits {
            max_entry_size: 64,
            max_total_uncompressed: 64,
            ..Default::default()
        };
        let result = ZipReader::from_bytes_with_limits(data, limits);
        assert!(matches!(
            result,
            Err(Error::TotalUncompressedTooLarge { .. })
        ));
    }

    #[test]
    fn test_encrypted_entry_rejected() {
        let mut data = build_zip(&[("secret.xml", b"<s/>")]);

        // Set the general-purpose encryption bit in the local and central
        // headers of the stored archive.
        for i in 0..data.len().saturating_sub(4) {
            if data[i..i + 4] == [0x50, 0x4B, 0x03, 0x04] {
                data[i + 6] |= 1;
            }
            if data[i..i + 4] == [0x50, 0x4B, 0x01, 0x02] {
                data[i + 8] |= 1;
            }
        }

        let reader = ZipReader::from_bytes(data).unwrap();
        assert!(matches!(
            reader.entries(),
            Err(Error::EncryptionNotSupported(_))
        ));
        assert!(matches!(
            reader.read("secret.xml"),
            Err(Error::EncryptionNotSupported(_))
        ));
    }

    #[test]
    fn test_operations_after_close() {
        let data = build_zip(&[("a.xml", b"<a/>")]);
        let reader = ZipReader::from_bytes(data).unwrap();
        assert!(reader.is_open());

        reader.close();
        assert!(!reader.is_open());
        assert!(matches!(reader.entries(), Err(Error::NotOpen(_))));
        assert!(matches!(reader.has("a.xml"), Err(Error::NotOpen(_))));
        assert!(matches!(reader.read("a.xml"), Err(Error::NotOpen(_))));
    }

    #[test]
    fn test_bom_stripped_from_xml() {
        let data = build_zip(&[("bom.xml", b"\xEF\xBB\xBF<doc/>")]);
        let reader = ZipReader::from_bytes(data).unwrap();
        assert_eq!(reader.read_xml("bom.xml").unwrap(), "<doc/>");
    }
}
