//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{ExtractError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Generic over the reader so the same code walks an in-memory buffer or any
/// other random-access source.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let entries = parser.list_files().await?;
/// for entry in entries {
///     let offset = parser.get_data_offset(&entry).await?;
///     // Read file data from offset...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// [`ExtractError::CorruptArchive`] if no valid EOCD can be found.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(ExtractError::corrupt("too small to be a ZIP file"));
        }

        // Common case first: no archive comment.
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        // The EOCD sits earlier when the archive carries a comment.
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for exactly the trailing bytes.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ExtractError::corrupt("end of central directory not found"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are needed
    /// (fields set to 0xFFFF or 0xFFFFFFFF).
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| ExtractError::corrupt("missing ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List all entries in the ZIP archive.
    ///
    /// Reads the EOCD first, then fetches and parses the entire Central
    /// Directory.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;
        if eocd.is_multi_disk() {
            return Err(ExtractError::corrupt("multi-volume ZIP archives are not supported"));
        }

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        let cd_end = cd_offset
            .checked_add(cd_size)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| ExtractError::corrupt("central directory lies outside the archive"))?;
        // Every header takes at least CDFH_MIN_SIZE bytes.
        if total_entries > cd_size / CDFH_MIN_SIZE as u64 {
            return Err(ExtractError::corrupt(format!(
                "central directory of {} bytes cannot hold {} entries",
                cd_size, total_entries
            )));
        }
        log::debug!(
            "central directory: {} entries, {} bytes at {}..{}",
            total_entries,
            cd_size,
            cd_offset,
            cd_end
        );

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..total_entries {
            let entry = self.parse_cdfh(&mut cursor)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    ///
    /// The CDFH contains metadata about a file in the archive, including
    /// its name, sizes, and location of the actual file data.
    fn parse_cdfh(&self, cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let truncated = |_: std::io::Error| ExtractError::corrupt("truncated central directory");

        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig).map_err(truncated)?;
        if sig != CDFH_SIGNATURE {
            return Err(ExtractError::corrupt("invalid central directory file header"));
        }

        let mut fixed = [0u8; CDFH_MIN_SIZE - 4];
        cursor.read_exact(&mut fixed).map_err(truncated)?;
        let mut header = Cursor::new(&fixed[..]);

        let _version_made_by = header.read_u16::<LittleEndian>()?;
        let _version_needed = header.read_u16::<LittleEndian>()?;
        let flags = header.read_u16::<LittleEndian>()?;
        let compression_method = header.read_u16::<LittleEndian>()?;
        let _last_mod_time = header.read_u16::<LittleEndian>()?;
        let _last_mod_date = header.read_u16::<LittleEndian>()?;
        let crc32 = header.read_u32::<LittleEndian>()?;
        let mut compressed_size = header.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = header.read_u32::<LittleEndian>()? as u64;
        let file_name_length = header.read_u16::<LittleEndian>()?;
        let extra_field_length = header.read_u16::<LittleEndian>()?;
        let file_comment_length = header.read_u16::<LittleEndian>()?;
        let _disk_number_start = header.read_u16::<LittleEndian>()?;
        let _internal_attrs = header.read_u16::<LittleEndian>()?;
        let _external_attrs = header.read_u32::<LittleEndian>()?;
        let mut lfh_offset = header.read_u32::<LittleEndian>()? as u64;

        if flags & 0x0001 != 0 {
            return Err(ExtractError::corrupt("encrypted ZIP entries are not supported"));
        }

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes).map_err(truncated)?;
        // Lossy: non-UTF-8 names still get a usable path.
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        let is_directory = file_name.ends_with('/');

        let mut extra = vec![0u8; extra_field_length as usize];
        cursor.read_exact(&mut extra).map_err(truncated)?;
        let mut extra = Cursor::new(extra.as_slice());
        let extra_end = extra_field_length as u64;

        while extra.position() + 4 <= extra_end {
            let header_id = extra.read_u16::<LittleEndian>()?;
            let field_size = extra.read_u16::<LittleEndian>()? as u64;
            let field_end = (extra.position() + field_size).min(extra_end);

            if header_id == 0x0001 {
                // Each ZIP64 value is present only if its header field is saturated.
                if uncompressed_size == 0xFFFFFFFF && extra.position() + 8 <= field_end {
                    uncompressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && extra.position() + 8 <= field_end {
                    compressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && extra.position() + 8 <= field_end {
                    lfh_offset = extra.read_u64::<LittleEndian>()?;
                }
            }
            extra.set_position(field_end);
        }

        // Skip over the file comment (we don't use it)
        cursor.set_position(cursor.position() + file_comment_length as u64);

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf).await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ExtractError::corrupt(format!(
                "invalid local file header for '{}'",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        Ok(data_offset)
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn empty_zip() -> Vec<u8> {
        let mut out = Vec::new();
        EndOfCentralDirectory::single_disk(0, 0, 0)
            .write_to(&mut out)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn empty_archive_lists_nothing() {
        let parser = ZipParser::new(Arc::new(MemoryReader::new(empty_zip())));
        assert!(parser.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finds_eocd_behind_comment() {
        let mut data = Vec::new();
        let mut eocd = EndOfCentralDirectory::single_disk(0, 0, 0);
        eocd.comment_len = 5;
        eocd.write_to(&mut data).unwrap();
        data.extend_from_slice(b"hello");

        let parser = ZipParser::new(Arc::new(MemoryReader::new(data)));
        let (_, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(offset, 0);
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let parser = ZipParser::new(Arc::new(MemoryReader::new(vec![0x50u8; 100])));
        assert!(matches!(
            parser.list_files().await,
            Err(ExtractError::CorruptArchive { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_central_directory_past_end() {
        let mut data = Vec::new();
        EndOfCentralDirectory::single_disk(1, 46, 1000)
            .write_to(&mut data)
            .unwrap();
        let parser = ZipParser::new(Arc::new(MemoryReader::new(data)));
        assert!(matches!(
            parser.list_files().await,
            Err(ExtractError::CorruptArchive { .. })
        ));
    }
}
