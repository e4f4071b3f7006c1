use async_trait::async_trait;
use std::sync::Arc;

use super::ReadAt;
use crate::error::Result;

/// Random access over an archive already held in memory.
///
/// Cloning is cheap: the bytes are shared, so concurrent decode tasks can each
/// hold a handle.
#[derive(Clone)]
pub struct MemoryReader {
    data: Arc<[u8]>,
}

impl MemoryReader {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_read_at_end() {
        let reader = MemoryReader::new(vec![1u8, 2, 3, 4]);
        let mut buf = [0u8; 3];
        assert_eq!(reader.read_at(2, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(reader.read_at(9, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_exact_reports_truncation() {
        let reader = MemoryReader::new(vec![0u8; 4]);
        let mut buf = [0u8; 8];
        assert!(reader.read_exact_at(0, &mut buf).await.is_err());
    }
}
