//! POSIX tar parsing, one 512-byte header at a time.
//!
//! Header layout used here:
//!
//! | offset | len | field                                  |
//! |--------|-----|----------------------------------------|
//! | 0      | 100 | name, NUL-terminated                   |
//! | 124    | 12  | size, ASCII octal (or GNU base-256)    |
//! | 156    | 1   | type flag                              |
//! | 257    | 6   | magic, `ustar\0` for POSIX ustar       |
//! | 345    | 155 | name prefix (ustar only)               |
//!
//! Header checksums are not validated.

use crate::entry::{self, ArchiveEntry};
use crate::error::{ExtractError, Result};

pub const BLOCK_SIZE: usize = 512;

const NAME: (usize, usize) = (0, 100);
const SIZE: (usize, usize) = (124, 12);
const TYPE_FLAG: usize = 156;
const MAGIC: (usize, usize) = (257, 6);
const PREFIX: (usize, usize) = (345, 155);

const USTAR_MAGIC: &[u8] = b"ustar\0";

/// How a header's type flag is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Directory,
    File,
    /// GNU `L`: the payload is the next header's name.
    LongName,
    /// pax `x`: extended attributes for the next header.
    PaxLocal,
    /// pax `g` or GNU `K`: metadata this parser ignores.
    Ignored,
}

impl HeaderKind {
    fn from_flag(flag: u8) -> Self {
        match flag {
            b'5' => HeaderKind::Directory,
            b'L' => HeaderKind::LongName,
            b'x' => HeaderKind::PaxLocal,
            b'g' | b'K' => HeaderKind::Ignored,
            _ => HeaderKind::File,
        }
    }
}

/// Parse every entry of an uncompressed tar archive.
pub fn extract_tar(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut pending_name: Option<String> = None;

    while offset + BLOCK_SIZE <= data.len() {
        let header = &data[offset..offset + BLOCK_SIZE];
        if header.iter().all(|&b| b == 0) {
            break;
        }

        let size = parse_size(field(header, SIZE))?;
        let kind = HeaderKind::from_flag(header[TYPE_FLAG]);

        let data_start = offset + BLOCK_SIZE;
        let data_end = usize::try_from(size)
            .ok()
            .and_then(|size| data_start.checked_add(size))
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                ExtractError::corrupt(format!(
                    "entry at offset {} declares {} bytes but the archive ends first",
                    offset, size
                ))
            })?;
        let payload = &data[data_start..data_end];

        match kind {
            HeaderKind::LongName => {
                pending_name = Some(c_string(payload));
            }
            HeaderKind::PaxLocal => {
                if let Some(path) = pax_path(payload) {
                    pending_name = Some(path);
                }
            }
            HeaderKind::Ignored => {}
            HeaderKind::Directory | HeaderKind::File => {
                let raw_name = pending_name.take().unwrap_or_else(|| header_name(header));
                let is_directory = kind == HeaderKind::Directory || raw_name.ends_with('/');

                if let Some(path) = entry::normalize_path(&raw_name) {
                    entries.push(if is_directory {
                        ArchiveEntry::directory(path)
                    } else {
                        ArchiveEntry::file(path, payload.to_vec())
                    });
                }
            }
        }

        offset = data_start + padded(data_end - data_start);
    }

    log::debug!("tar: {} entries", entries.len());
    entry::finalize(entries)
}

/// Round `len` up to the next block boundary.
fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

fn field(header: &[u8], (start, len): (usize, usize)) -> &[u8] {
    &header[start..start + len]
}

/// Bytes up to the first NUL, decoded lossily.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Name field, joined with the ustar prefix when one is present.
fn header_name(header: &[u8]) -> String {
    let name = c_string(field(header, NAME));
    if field(header, MAGIC) != USTAR_MAGIC {
        return name;
    }
    let prefix = c_string(field(header, PREFIX));
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), name)
    }
}

/// Decode the size field: octal ASCII, or big-endian binary when the high bit is set.
fn parse_size(raw: &[u8]) -> Result<u64> {
    if raw.first().is_some_and(|b| b & 0x80 != 0) {
        let mut size = u64::from(raw[0] & 0x7F);
        for &b in &raw[1..] {
            size = size
                .checked_mul(256)
                .and_then(|s| s.checked_add(u64::from(b)))
                .ok_or_else(|| ExtractError::corrupt("tar size field overflows"))?;
        }
        return Ok(size);
    }

    let text = c_string(raw);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8)
        .map_err(|_| ExtractError::corrupt(format!("invalid tar size field '{}'", text)))
}

/// Pull the `path` record out of a pax extended header.
///
/// Records look like `"<len> <key>=<value>\n"`, where `<len>` counts the
/// whole record including itself.
fn pax_path(mut payload: &[u8]) -> Option<String> {
    let mut path = None;
    while !payload.is_empty() {
        let space = payload.iter().position(|&b| b == b' ')?;
        let len: usize = std::str::from_utf8(&payload[..space]).ok()?.parse().ok()?;
        if len <= space || len > payload.len() {
            return path;
        }
        let record = &payload[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        payload = &payload[len..];
    }
    path
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a header block the way `tar` writes one (checksum left blank).
    pub(crate) fn header(name: &str, size: usize, flag: u8) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        let size = format!("{:011o}\0", size);
        block[124..136].copy_from_slice(size.as_bytes());
        block[156] = flag;
        block[257..263].copy_from_slice(USTAR_MAGIC);
        block
    }

    pub(crate) fn push_entry(out: &mut Vec<u8>, name: &str, flag: u8, data: &[u8]) {
        out.extend_from_slice(&header(name, data.len(), flag));
        out.extend_from_slice(data);
        out.resize(padded(out.len()), 0);
    }

    pub(crate) fn finish(out: &mut Vec<u8>) {
        out.extend_from_slice(&[0u8; BLOCK_SIZE * 2]);
    }

    #[test]
    fn end_markers_only() {
        let data = vec![0u8; BLOCK_SIZE * 2];
        assert!(extract_tar(&data).unwrap().is_empty());
    }

    #[test]
    fn empty_input() {
        assert!(extract_tar(&[]).unwrap().is_empty());
    }

    #[test]
    fn skips_padding_between_entries() {
        let mut data = Vec::new();
        push_entry(&mut data, "one.txt", b'0', &[b'a'; 700]);
        push_entry(&mut data, "two.txt", b'0', b"second");
        finish(&mut data);

        let entries = extract_tar(&data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].size, 700);
        assert_eq!(entries[1].path, "two.txt");
        assert_eq!(entries[1].data.as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn directory_by_flag_or_slash() {
        let mut data = Vec::new();
        push_entry(&mut data, "flagged", b'5', &[]);
        push_entry(&mut data, "slashed/", b'0', &[]);
        finish(&mut data);

        let entries = extract_tar(&data).unwrap();
        assert!(entries.iter().all(|e| e.is_directory));
        assert_eq!(entries[1].path, "slashed");
    }

    #[test]
    fn synthesizes_parents() {
        let mut data = Vec::new();
        push_entry(&mut data, "a/b/c.txt", b'0', b"c");
        finish(&mut data);

        let entries = extract_tar(&data).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a/b/c.txt", "a", "a/b"]);
    }

    #[test]
    fn stops_without_end_marker() {
        let mut data = Vec::new();
        push_entry(&mut data, "x", b'0', b"x");
        data.extend_from_slice(&[1u8; 100]);
        assert_eq!(extract_tar(&data).unwrap().len(), 1);
    }

    #[test]
    fn truncated_data_is_corrupt() {
        let mut data = header("big.bin", 4096, b'0').to_vec();
        data.extend_from_slice(&[0u8; 100]);
        assert!(matches!(
            extract_tar(&data),
            Err(ExtractError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn invalid_size_is_corrupt() {
        let mut block = header("x", 0, b'0');
        block[124..136].copy_from_slice(b"9zz\0\0\0\0\0\0\0\0\0");
        assert!(extract_tar(&block).is_err());
    }

    #[test]
    fn ustar_prefix_joined() {
        let mut block = header("file.txt", 0, b'0');
        block[345..349].copy_from_slice(b"deep");
        let mut data = block.to_vec();
        finish(&mut data);

        let entries = extract_tar(&data).unwrap();
        assert!(entries.iter().any(|e| e.path == "deep/file.txt"));
    }

    #[test]
    fn gnu_long_name() {
        let long = format!("{}/file.txt", "d".repeat(120));
        let mut data = Vec::new();
        push_entry(&mut data, "././@LongLink", b'L', format!("{}\0", long).as_bytes());
        push_entry(&mut data, "truncated", b'0', b"body");
        finish(&mut data);

        let entries = extract_tar(&data).unwrap();
        assert_eq!(entries[0].path, long);
        assert_eq!(entries[0].data.as_deref(), Some(&b"body"[..]));
    }

    #[test]
    fn pax_path_override() {
        let record = "21 path=pax/name.txt\n";
        assert_eq!(record.len(), 21);
        let mut data = Vec::new();
        push_entry(&mut data, "PaxHeaders/name", b'x', record.as_bytes());
        push_entry(&mut data, "short", b'0', b"p");
        finish(&mut data);

        let entries = extract_tar(&data).unwrap();
        assert_eq!(entries[0].path, "pax/name.txt");
        assert!(!entries.iter().any(|e| e.path.starts_with("PaxHeaders")));
    }

    #[test]
    fn base256_size() {
        let mut raw = [0u8; 12];
        raw[0] = 0x80;
        raw[10] = 0x02;
        raw[11] = 0x01;
        assert_eq!(parse_size(&raw).unwrap(), 513);
    }
}
