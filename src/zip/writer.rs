//! Minimal ZIP writer: DEFLATE entries, central directory, EOCD.
//!
//! No ZIP64 records are written, so every entry must stay below 4 GiB and
//! the archive below 65535 entries. The caller checks those limits.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{self, Write};

use super::structures::*;

/// Version needed to extract: 2.0 (DEFLATE).
const VERSION_NEEDED: u16 = 20;
/// Version made by: UNIX host, APPNOTE 2.0.
const VERSION_MADE_BY: u16 = (3 << 8) | 20;
/// 1980-01-01 00:00, the DOS epoch.
const DOS_DATE: u16 = (1 << 5) | 1;
const DOS_TIME: u16 = 0;
/// Regular file, rw-r--r--, in the high word of the external attributes.
const EXTERNAL_ATTRS: u32 = 0o100644 << 16;

struct CentralRecord {
    name: Vec<u8>,
    method: CompressionMethod,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    lfh_offset: u32,
}

/// Streams entries into an in-memory ZIP archive.
pub struct ZipWriter {
    out: Vec<u8>,
    records: Vec<CentralRecord>,
}

impl Default for ZipWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Append a file. Data that does not shrink under DEFLATE is stored as-is.
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let deflated = encoder.finish()?;

        let (method, payload) = if deflated.len() < data.len() {
            (CompressionMethod::Deflate, deflated.as_slice())
        } else {
            (CompressionMethod::Stored, data)
        };

        let record = CentralRecord {
            name: path.as_bytes().to_vec(),
            method,
            crc32: crc32fast::hash(data),
            compressed_size: to_u32(payload.len())?,
            uncompressed_size: to_u32(data.len())?,
            lfh_offset: to_u32(self.out.len())?,
        };

        self.out.write_all(LFH_SIGNATURE)?;
        self.out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        self.out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        self.out.write_u16::<LittleEndian>(record.method.as_u16())?;
        self.out.write_u16::<LittleEndian>(DOS_TIME)?;
        self.out.write_u16::<LittleEndian>(DOS_DATE)?;
        self.out.write_u32::<LittleEndian>(record.crc32)?;
        self.out.write_u32::<LittleEndian>(record.compressed_size)?;
        self.out.write_u32::<LittleEndian>(record.uncompressed_size)?;
        self.out.write_u16::<LittleEndian>(to_u16(record.name.len())?)?;
        self.out.write_u16::<LittleEndian>(0)?; // extra field length
        self.out.write_all(&record.name)?;
        self.out.write_all(payload)?;

        self.records.push(record);
        Ok(())
    }

    /// Write the central directory and EOCD, returning the archive bytes.
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        let cd_offset = to_u32(self.out.len())?;

        for record in &self.records {
            self.out.write_all(CDFH_SIGNATURE)?;
            self.out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
            self.out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            self.out.write_u16::<LittleEndian>(FLAG_UTF8)?;
            self.out.write_u16::<LittleEndian>(record.method.as_u16())?;
            self.out.write_u16::<LittleEndian>(DOS_TIME)?;
            self.out.write_u16::<LittleEndian>(DOS_DATE)?;
            self.out.write_u32::<LittleEndian>(record.crc32)?;
            self.out.write_u32::<LittleEndian>(record.compressed_size)?;
            self.out.write_u32::<LittleEndian>(record.uncompressed_size)?;
            self.out.write_u16::<LittleEndian>(to_u16(record.name.len())?)?;
            self.out.write_u16::<LittleEndian>(0)?; // extra field length
            self.out.write_u16::<LittleEndian>(0)?; // comment length
            self.out.write_u16::<LittleEndian>(0)?; // disk number start
            self.out.write_u16::<LittleEndian>(0)?; // internal attributes
            self.out.write_u32::<LittleEndian>(EXTERNAL_ATTRS)?;
            self.out.write_u32::<LittleEndian>(record.lfh_offset)?;
            self.out.write_all(&record.name)?;
        }

        let cd_size = to_u32(self.out.len())? - cd_offset;
        let entries = to_u16(self.records.len())?;
        EndOfCentralDirectory::single_disk(entries, cd_size, cd_offset).write_to(&mut self.out)?;

        Ok(self.out)
    }
}

fn to_u32(n: usize) -> io::Result<u32> {
    u32::try_from(n).map_err(|_| io::Error::other("value exceeds ZIP32 limits"))
}

fn to_u16(n: usize) -> io::Result<u16> {
    u16::try_from(n).map_err(|_| io::Error::other("value exceeds ZIP32 limits"))
}
