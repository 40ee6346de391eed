// src/wheel/archive.rs

//! In-memory ZIP container for wheels
//!
//! Wheels are plain ZIP files (PEP 427). Every entry is held fully decoded in
//! memory so that selected entries can be rewritten and the whole container
//! re-emitted with a consistent central directory.
//!
//! Supported subset:
//! - stored (0) and deflated (8) entries
//! - single-disk archives without ZIP64 records
//! - no encryption
//!
//! Serialization is deterministic: entry order, timestamps and attributes come
//! from the entries themselves, deflate runs at a fixed level, and no extra
//! fields or comments are written.

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::collections::HashSet;
use std::io::{Read, Write};
use tracing::debug;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_DIR_LEN: usize = 22;
/// Maximum archive comment length, bounds the trailer search
const MAX_COMMENT_LEN: usize = 0xFFFF;

/// General purpose flag: entry is encrypted
const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: name is UTF-8
const FLAG_UTF8: u16 = 0x0800;

/// Version made by: unix host, spec 2.0
const VERSION_MADE_BY: u16 = (3 << 8) | 20;
const VERSION_NEEDED: u16 = 20;

/// Largest uncompressed entry we are willing to hold in memory
pub const MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;
/// Largest total uncompressed size of all entries together
pub const MAX_TOTAL_SIZE: u64 = 1024 * 1024 * 1024;
/// Maximum uncompressed/compressed ratio for any entry
pub const MAX_EXPANSION_RATIO: u64 = 200;
/// Bytes every entry may expand beyond the ratio, so tiny files always pass
pub const RATIO_SLACK: u64 = 4096;

/// Fixed deflate level so output bytes only depend on the entries
const DEFLATE_LEVEL: u32 = 6;

/// Path reported for errors that concern the container rather than an entry
const ARCHIVE_PATH: &str = "<archive>";

/// Entry compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    Stored,
    #[default]
    Deflated,
}

impl CompressionMethod {
    fn code(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflated => 8,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Stored),
            8 => Some(Self::Deflated),
            _ => None,
        }
    }
}

/// MS-DOS modification timestamp as stored in ZIP headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable timestamp
    pub const EPOCH: Self = Self {
        date: (1 << 5) | 1,
        time: 0,
    };
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

/// A single archive member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub data: Vec<u8>,
    pub method: CompressionMethod,
    pub modified: DosDateTime,
    /// External attributes; the high 16 bits carry the unix mode
    pub external_attr: u32,
}

impl Entry {
    /// Regular file with mode 0644, deflated, at the DOS epoch
    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            method: CompressionMethod::Deflated,
            modified: DosDateTime::EPOCH,
            external_attr: 0o100644 << 16,
        }
    }

    /// Directory entry; the path is given a trailing slash if missing
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            data: Vec::new(),
            method: CompressionMethod::Stored,
            modified: DosDateTime::EPOCH,
            external_attr: (0o040755 << 16) | 0x10,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Unix mode from the external attributes (0 when the writer set none)
    pub fn unix_mode(&self) -> u32 {
        self.external_attr >> 16
    }

    pub fn is_executable(&self) -> bool {
        self.unix_mode() & 0o111 != 0
    }

    /// Set the unix permission bits, keeping the file type bits
    pub fn with_mode(mut self, mode: u32) -> Self {
        let file_type = if self.unix_mode() & 0o170000 != 0 {
            self.unix_mode() & 0o170000
        } else {
            0o100000
        };
        self.external_attr = ((file_type | (mode & 0o7777)) << 16) | (self.external_attr & 0xFFFF);
        self
    }

    /// Final path component (without a trailing slash for directories)
    pub fn file_name(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

/// Ordered collection of entries with unique paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    entries: Vec<Entry>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a ZIP archive held in memory
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let eocd = find_end_of_central_dir(bytes)?;

        let disk = read_u16(bytes, eocd + 4)?;
        let cd_disk = read_u16(bytes, eocd + 6)?;
        let disk_entries = read_u16(bytes, eocd + 8)?;
        let total_entries = read_u16(bytes, eocd + 10)?;
        let cd_size = read_u32(bytes, eocd + 12)?;
        let cd_offset = read_u32(bytes, eocd + 16)?;

        if total_entries == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_offset == 0xFFFF_FFFF {
            return Err(Error::corrupt(ARCHIVE_PATH, "ZIP64 archives are not supported"));
        }
        if disk != 0 || cd_disk != 0 || disk_entries != total_entries {
            return Err(Error::corrupt(ARCHIVE_PATH, "multi-disk archives are not supported"));
        }

        let cd_start = cd_offset as usize;
        let cd_end = cd_start
            .checked_add(cd_size as usize)
            .filter(|&end| end <= eocd)
            .ok_or_else(|| Error::corrupt(ARCHIVE_PATH, "central directory out of bounds"))?;

        let mut headers = Vec::with_capacity(total_entries as usize);
        let mut seen = HashSet::with_capacity(total_entries as usize);
        let mut pos = cd_start;
        let mut total_size: u64 = 0;

        for _ in 0..total_entries {
            if pos + CENTRAL_HEADER_LEN > cd_end {
                return Err(Error::corrupt(ARCHIVE_PATH, "truncated central directory"));
            }
            let header = CentralHeader::parse(bytes, pos)?;
            pos += CENTRAL_HEADER_LEN + header.name_len + header.extra_len + header.comment_len;
            if pos > cd_end {
                return Err(Error::corrupt(&header.path, "central directory record overruns"));
            }

            if !seen.insert(header.path.clone()) {
                return Err(Error::corrupt(&header.path, "duplicate entry name"));
            }
            check_entry_path(&header.path)?;

            total_size = total_size.saturating_add(header.size);
            if total_size > MAX_TOTAL_SIZE {
                return Err(Error::corrupt(
                    ARCHIVE_PATH,
                    format!("total uncompressed size exceeds limit of {}", MAX_TOTAL_SIZE),
                ));
            }
            headers.push(header);
        }

        let mut entries = Vec::with_capacity(headers.len());
        for header in headers {
            let data = read_entry_data(bytes, &header)?;
            entries.push(Entry {
                path: header.path,
                data,
                method: header.method,
                modified: header.modified,
                external_attr: header.external_attr,
            });
        }

        debug!("Loaded {} archive entries", entries.len());
        Ok(Self { entries })
    }

    /// Encode the archive as ZIP bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.entries.len() >= 0xFFFF {
            return Err(Error::corrupt(ARCHIVE_PATH, "too many entries without ZIP64"));
        }

        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let offset = to_u32(out.len(), &entry.path, "local header offset")?;
            let crc = crc32fast::hash(&entry.data);
            let compressed = compress(entry)?;
            let compressed_size = to_u32(compressed.len(), &entry.path, "compressed size")?;
            let size = to_u32(entry.data.len(), &entry.path, "size")?;
            let name = entry.path.as_bytes();
            let name_len = u16::try_from(name.len())
                .map_err(|_| Error::corrupt(&entry.path, "entry name too long"))?;
            let flags = if entry.path.is_ascii() { 0 } else { FLAG_UTF8 };
            let method = entry.method_for_write().code();

            put_u32(&mut out, LOCAL_HEADER_SIG);
            put_u16(&mut out, VERSION_NEEDED);
            put_u16(&mut out, flags);
            put_u16(&mut out, method);
            put_u16(&mut out, entry.modified.time);
            put_u16(&mut out, entry.modified.date);
            put_u32(&mut out, crc);
            put_u32(&mut out, compressed_size);
            put_u32(&mut out, size);
            put_u16(&mut out, name_len);
            put_u16(&mut out, 0);
            out.extend_from_slice(name);
            out.extend_from_slice(&compressed);

            put_u32(&mut central, CENTRAL_HEADER_SIG);
            put_u16(&mut central, VERSION_MADE_BY);
            put_u16(&mut central, VERSION_NEEDED);
            put_u16(&mut central, flags);
            put_u16(&mut central, method);
            put_u16(&mut central, entry.modified.time);
            put_u16(&mut central, entry.modified.date);
            put_u32(&mut central, crc);
            put_u32(&mut central, compressed_size);
            put_u32(&mut central, size);
            put_u16(&mut central, name_len);
            put_u16(&mut central, 0); // extra
            put_u16(&mut central, 0); // comment
            put_u16(&mut central, 0); // disk
            put_u16(&mut central, 0); // internal attributes
            put_u32(&mut central, entry.external_attr);
            put_u32(&mut central, offset);
            central.extend_from_slice(name);
        }

        let cd_offset = to_u32(out.len(), ARCHIVE_PATH, "central directory offset")?;
        let cd_size = to_u32(central.len(), ARCHIVE_PATH, "central directory size")?;
        out.extend_from_slice(&central);

        let count = self.entries.len() as u16;
        put_u32(&mut out, END_OF_CENTRAL_DIR_SIG);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, count);
        put_u16(&mut out, count);
        put_u32(&mut out, cd_size);
        put_u32(&mut out, cd_offset);
        put_u16(&mut out, 0);

        Ok(out)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.path == path)
    }

    pub fn position(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_some()
    }

    /// Append an entry; fails if the path already exists
    pub fn push(&mut self, entry: Entry) -> Result<()> {
        if self.contains(&entry.path) {
            return Err(Error::RenameConflict { path: entry.path });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Insert an entry at `index` (clamped to the end); fails if the path exists
    pub fn insert(&mut self, index: usize, entry: Entry) -> Result<()> {
        if self.contains(&entry.path) {
            return Err(Error::RenameConflict { path: entry.path });
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Option<Entry> {
        let index = self.position(path)?;
        Some(self.entries.remove(index))
    }

    /// Change the path of an entry in place, keeping its position
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.contains(to) {
            return Err(Error::RenameConflict { path: to.to_string() });
        }
        let entry = self
            .get_mut(from)
            .ok_or_else(|| Error::NotFound(from.to_string()))?;
        entry.path = to.to_string();
        Ok(())
    }
}

impl Entry {
    /// Directories are always stored; deflating an empty body buys nothing
    fn method_for_write(&self) -> CompressionMethod {
        if self.data.is_empty() && self.is_dir() {
            CompressionMethod::Stored
        } else {
            self.method
        }
    }
}

/// Fields of a central directory record we need to locate and check an entry
struct CentralHeader {
    path: String,
    method: CompressionMethod,
    modified: DosDateTime,
    crc: u32,
    compressed_size: u64,
    size: u64,
    name_len: usize,
    extra_len: usize,
    comment_len: usize,
    external_attr: u32,
    local_offset: usize,
}

impl CentralHeader {
    fn parse(bytes: &[u8], pos: usize) -> Result<Self> {
        if read_u32(bytes, pos)? != CENTRAL_HEADER_SIG {
            return Err(Error::corrupt(ARCHIVE_PATH, "bad central directory signature"));
        }

        let flags = read_u16(bytes, pos + 8)?;
        let method_code = read_u16(bytes, pos + 10)?;
        let time = read_u16(bytes, pos + 12)?;
        let date = read_u16(bytes, pos + 14)?;
        let crc = read_u32(bytes, pos + 16)?;
        let compressed_size = read_u32(bytes, pos + 20)?;
        let size = read_u32(bytes, pos + 24)?;
        let name_len = read_u16(bytes, pos + 28)? as usize;
        let extra_len = read_u16(bytes, pos + 30)? as usize;
        let comment_len = read_u16(bytes, pos + 32)? as usize;
        let external_attr = read_u32(bytes, pos + 38)?;
        let local_offset = read_u32(bytes, pos + 42)?;

        let name_start = pos + CENTRAL_HEADER_LEN;
        let name_bytes = bytes
            .get(name_start..name_start + name_len)
            .ok_or_else(|| Error::corrupt(ARCHIVE_PATH, "truncated entry name"))?;
        let path = String::from_utf8(name_bytes.to_vec())
            .map_err(|_| Error::corrupt(ARCHIVE_PATH, "entry name is not valid UTF-8"))?;

        if flags & FLAG_ENCRYPTED != 0 {
            return Err(Error::corrupt(&path, "encrypted entries are not supported"));
        }
        if compressed_size == 0xFFFF_FFFF || size == 0xFFFF_FFFF || local_offset == 0xFFFF_FFFF {
            return Err(Error::corrupt(&path, "ZIP64 entries are not supported"));
        }
        let method = CompressionMethod::from_code(method_code).ok_or_else(|| {
            Error::corrupt(&path, format!("unsupported compression method {}", method_code))
        })?;

        Ok(Self {
            path,
            method,
            modified: DosDateTime { date, time },
            crc,
            compressed_size: compressed_size as u64,
            size: size as u64,
            name_len,
            extra_len,
            comment_len,
            external_attr,
            local_offset: local_offset as usize,
        })
    }
}

/// Locate the end-of-central-directory record, allowing a trailing comment
fn find_end_of_central_dir(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < END_OF_CENTRAL_DIR_LEN {
        return Err(Error::corrupt(ARCHIVE_PATH, "too short to be a ZIP archive"));
    }

    let last = bytes.len() - END_OF_CENTRAL_DIR_LEN;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    let sig = END_OF_CENTRAL_DIR_SIG.to_le_bytes();

    (first..=last)
        .rev()
        .find(|&pos| {
            bytes[pos..pos + 4] == sig
                && read_u16(bytes, pos + 20)
                    .is_ok_and(|len| pos + END_OF_CENTRAL_DIR_LEN + len as usize == bytes.len())
        })
        .ok_or_else(|| Error::corrupt(ARCHIVE_PATH, "end of central directory not found"))
}

/// Reject entry names that would escape an extraction root
fn check_entry_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::corrupt(ARCHIVE_PATH, "empty entry name"));
    }
    if path.starts_with('/') || path.starts_with('\\') || path.contains('\0') {
        return Err(Error::corrupt(path, "absolute or invalid entry name"));
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(Error::corrupt(path, "entry name has a drive prefix"));
    }
    if path.split(['/', '\\']).any(|component| component == "..") {
        return Err(Error::corrupt(path, "entry name contains '..'"));
    }
    Ok(())
}

/// Read, inflate and check one entry's data
fn read_entry_data(bytes: &[u8], header: &CentralHeader) -> Result<Vec<u8>> {
    let path = header.path.as_str();

    if header.size > MAX_ENTRY_SIZE {
        return Err(Error::corrupt(
            path,
            format!("uncompressed size {} exceeds limit of {}", header.size, MAX_ENTRY_SIZE),
        ));
    }
    if header.size
        > header
            .compressed_size
            .saturating_mul(MAX_EXPANSION_RATIO)
            .saturating_add(RATIO_SLACK)
    {
        return Err(Error::corrupt(
            path,
            format!(
                "expansion ratio exceeds {}:1 ({} -> {} bytes)",
                MAX_EXPANSION_RATIO, header.compressed_size, header.size
            ),
        ));
    }

    let local = header.local_offset;
    if read_u32(bytes, local).ok() != Some(LOCAL_HEADER_SIG) {
        return Err(Error::corrupt(path, "bad local header signature"));
    }
    let local_name_len = read_u16(bytes, local + 26)? as usize;
    let local_extra_len = read_u16(bytes, local + 28)? as usize;
    let data_start = local + LOCAL_HEADER_LEN + local_name_len + local_extra_len;
    let compressed = bytes
        .get(data_start..data_start + header.compressed_size as usize)
        .ok_or_else(|| Error::corrupt(path, "entry data out of bounds"))?;

    let data = match header.method {
        CompressionMethod::Stored => compressed.to_vec(),
        CompressionMethod::Deflated => {
            let mut out = Vec::with_capacity(header.size as usize);
            DeflateDecoder::new(compressed)
                .take(header.size + 1)
                .read_to_end(&mut out)
                .map_err(|e| Error::corrupt(path, format!("inflate failed: {}", e)))?;
            out
        }
    };

    if data.len() as u64 != header.size {
        return Err(Error::corrupt(
            path,
            format!("declared size {} but found {} bytes", header.size, data.len()),
        ));
    }

    let crc = crc32fast::hash(&data);
    if crc != header.crc {
        return Err(Error::corrupt(
            path,
            format!("CRC-32 mismatch: expected {:08x}, got {:08x}", header.crc, crc),
        ));
    }

    Ok(data)
}

fn compress(entry: &Entry) -> Result<Vec<u8>> {
    match entry.method_for_write() {
        CompressionMethod::Stored => Ok(entry.data.clone()),
        CompressionMethod::Deflated => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(DEFLATE_LEVEL));
            encoder
                .write_all(&entry.data)
                .and_then(|_| encoder.finish())
                .map_err(|e| Error::corrupt(&entry.path, format!("deflate failed: {}", e)))
        }
    }
}

fn read_u16(bytes: &[u8], pos: usize) -> Result<u16> {
    bytes
        .get(pos..pos + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::corrupt(ARCHIVE_PATH, format!("unexpected end of data at {}", pos)))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    bytes
        .get(pos..pos + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::corrupt(ARCHIVE_PATH, format!("unexpected end of data at {}", pos)))
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn to_u32(value: usize, path: &str, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::corrupt(path, format!("{} exceeds 4 GiB", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Archive {
        let mut archive = Archive::new();
        archive.push(Entry::directory("pkg")).unwrap();
        archive
            .push(Entry::file("pkg/__init__.py", b"import os\n".to_vec()))
            .unwrap();
        archive
            .push(Entry::file("pkg/bin/tool", b"#!/bin/sh\n".to_vec()).with_mode(0o755))
            .unwrap();
        archive
            .push(Entry::file("pkg/data.bin", vec![7u8; 4096]))
            .unwrap();
        archive
    }

    #[test]
    fn test_serialize_then_load_preserves_entries() {
        let archive = sample();
        let bytes = archive.serialize().unwrap();
        let loaded = Archive::load(&bytes).unwrap();

        assert_eq!(loaded, archive);
        assert!(loaded.get("pkg/bin/tool").unwrap().is_executable());
        assert!(!loaded.get("pkg/__init__.py").unwrap().is_executable());
        assert!(loaded.get("pkg/").unwrap().is_dir());
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let a = sample().serialize().unwrap();
        let b = sample().serialize().unwrap();
        assert_eq!(a, b);

        let reloaded = Archive::load(&a).unwrap().serialize().unwrap();
        assert_eq!(a, reloaded);
    }

    #[test]
    fn test_load_with_trailing_comment() {
        let mut bytes = sample().serialize().unwrap();
        let comment = b"built by hand";
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(comment);

        let loaded = Archive::load(&bytes).unwrap();
        assert_eq!(loaded.len(), 4);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = Archive::load(b"definitely not a zip file").unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { ref path, .. } if path == "<archive>"));
    }

    #[test]
    fn test_load_detects_crc_mismatch() {
        let mut archive = Archive::new();
        let mut entry = Entry::file("pkg/a.txt", b"hello".to_vec());
        entry.method = CompressionMethod::Stored;
        archive.push(entry).unwrap();
        let mut bytes = archive.serialize().unwrap();

        // Flip one byte of the stored content
        let data_start = LOCAL_HEADER_LEN + "pkg/a.txt".len();
        bytes[data_start] ^= 0xFF;

        let err = Archive::load(&bytes).unwrap_err();
        match err {
            Error::CorruptArchive { path, reason } => {
                assert_eq!(path, "pkg/a.txt");
                assert!(reason.contains("CRC-32"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_size_mismatch() {
        let mut archive = Archive::new();
        let mut entry = Entry::file("a.txt", b"hello".to_vec());
        entry.method = CompressionMethod::Stored;
        archive.push(entry).unwrap();
        let mut bytes = archive.serialize().unwrap();

        // Central directory uncompressed size lives 24 bytes into the record
        let cd_offset = read_u32(&bytes, bytes.len() - 6).unwrap() as usize;
        bytes[cd_offset + 24..cd_offset + 28].copy_from_slice(&6u32.to_le_bytes());

        let err = Archive::load(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { ref reason, .. } if reason.contains("declared size")));
    }

    #[test]
    fn test_load_rejects_expansion_bomb() {
        let mut archive = Archive::new();
        archive.push(Entry::file("zeros", vec![0u8; 4 * 1024 * 1024])).unwrap();
        let bytes = archive.serialize().unwrap();

        let err = Archive::load(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { ref reason, .. } if reason.contains("expansion ratio")));
    }

    #[test]
    fn test_load_rejects_many_small_bombs() {
        let mut archive = Archive::new();
        for i in 0..64 {
            archive
                .push(Entry::file(format!("pkg/zeros{}.bin", i), vec![0u8; 1024 * 1024]))
                .unwrap();
        }
        let bytes = archive.serialize().unwrap();

        let err = Archive::load(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { ref reason, .. } if reason.contains("expansion ratio")));
    }

    #[test]
    fn test_ratio_slack_admits_small_files() {
        let mut archive = Archive::new();
        archive.push(Entry::file("pkg/blank.txt", vec![b' '; 4096])).unwrap();
        let bytes = archive.serialize().unwrap();
        assert!(Archive::load(&bytes).is_ok());
    }

    #[test]
    fn test_load_rejects_total_size_over_limit() {
        let mut archive = Archive::new();
        for name in ["a", "b", "c"] {
            let mut entry = Entry::file(name, b"x".to_vec());
            entry.method = CompressionMethod::Stored;
            archive.push(entry).unwrap();
        }
        let mut bytes = archive.serialize().unwrap();

        // Declare 512 MiB per entry; the total check runs before any entry is read
        let mut pos = read_u32(&bytes, bytes.len() - 6).unwrap() as usize;
        for name in ["a", "b", "c"] {
            bytes[pos + 24..pos + 28].copy_from_slice(&(MAX_ENTRY_SIZE as u32).to_le_bytes());
            pos += CENTRAL_HEADER_LEN + name.len();
        }

        let err = Archive::load(&bytes).unwrap_err();
        match err {
            Error::CorruptArchive { path, reason } => {
                assert_eq!(path, "<archive>");
                assert!(reason.contains("total uncompressed size"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_traversal_names() {
        for name in ["../evil.py", "pkg/../../evil.py", "/etc/passwd", "C:/evil.py", "pkg\\..\\evil"] {
            let mut archive = Archive::new();
            archive.push(Entry::file(name, b"x".to_vec())).unwrap();
            let bytes = archive.serialize().unwrap();

            let err = Archive::load(&bytes).unwrap_err();
            assert!(
                matches!(err, Error::CorruptArchive { ref path, .. } if path == name),
                "{} was accepted: {:?}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_utf8_names() {
        let mut archive = Archive::new();
        archive.push(Entry::file("pkg/données.txt", b"x".to_vec())).unwrap();
        let bytes = archive.serialize().unwrap();
        let loaded = Archive::load(&bytes).unwrap();
        assert!(loaded.contains("pkg/données.txt"));
    }

    #[test]
    fn test_duplicate_paths_rejected() {
        let mut archive = sample();
        let err = archive
            .push(Entry::file("pkg/__init__.py", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, Error::RenameConflict { .. }));

        let err = archive.rename("pkg/data.bin", "pkg/__init__.py").unwrap_err();
        assert!(matches!(err, Error::RenameConflict { .. }));
    }

    #[test]
    fn test_entry_manipulation() {
        let mut archive = sample();
        archive.rename("pkg/data.bin", "pkg/payload.bin").unwrap();
        assert_eq!(archive.position("pkg/payload.bin"), Some(3));

        archive.insert(1, Entry::file("pkg/new.py", Vec::new())).unwrap();
        assert_eq!(archive.position("pkg/new.py"), Some(1));

        let removed = archive.remove("pkg/new.py").unwrap();
        assert_eq!(removed.file_name(), "new.py");
        assert_eq!(archive.len(), 4);
        assert!(archive.remove("missing").is_none());
    }
}
