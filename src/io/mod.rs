mod memory;

pub use memory::MemoryReader;

use async_trait::async_trait;

use crate::error::{ExtractError, Result};

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` completely or fail with a truncation error
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf).await?;
        if n < buf.len() {
            return Err(ExtractError::corrupt(format!(
                "unexpected end of archive reading {} bytes at offset {}",
                buf.len(),
                offset
            )));
        }
        Ok(())
    }
}
