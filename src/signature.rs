//! Base-side signature generation: fixed-size block partitioning with a
//! weak/strong hash pair per block.

use std::pin::Pin;

use async_stream::try_stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::error::Result;
use crate::hash::{strong_hash, weak_hash};
use crate::types::{BlockHash, Config};

/// Read until `buf` is full or the reader hits end-of-stream. Returns the
/// number of bytes read, possibly 0.
pub(crate) async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Stream one [`BlockHash`] per `cfg.block_size` bytes of `base`, in
/// ascending index order. The final block covers fewer bytes when the
/// stream ends mid-block; an empty stream yields no records.
pub fn signature_stream<'a, R>(
    mut base: R,
    cfg: Config,
) -> Pin<Box<dyn Stream<Item = Result<BlockHash>> + Send + 'a>>
where
    R: AsyncRead + Unpin + Send + 'a,
{
    Box::pin(try_stream! {
        let mut block = vec![0u8; cfg.block_size];
        let mut index = 0u64;
        loop {
            let n = read_full(&mut base, &mut block).await?;
            if n == 0 {
                break;
            }
            let bytes = &block[..n];
            yield BlockHash {
                index,
                weak: weak_hash(bytes),
                strong: strong_hash(bytes),
            };
            index += 1;
            if n < cfg.block_size {
                break;
            }
        }
        debug!(blocks = index, block_size = cfg.block_size, "signature complete");
    })
}

/// Collect the complete signature table of `base`, ready to hand to the
/// delta engine.
pub async fn signature<R>(base: R, cfg: Config) -> Result<Vec<BlockHash>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut stream = signature_stream(base, cfg);
    let mut table = Vec::new();
    while let Some(record) = stream.next().await {
        table.push(record?);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(block_size: usize) -> Config {
        Config {
            block_size,
            max_data_op: 64,
        }
    }

    #[tokio::test]
    async fn empty_base_has_empty_signature() {
        let table = signature(&[][..], cfg(8)).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn partitions_into_blocks_with_short_tail() {
        let table = signature(&b"aaaaaaaabbbbbbbbcc"[..], cfg(8)).await.unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].weak, weak_hash(b"aaaaaaaa"));
        assert_eq!(table[2].weak, weak_hash(b"cc"));
        assert_eq!(table[2].strong, strong_hash(b"cc"));
    }

    #[tokio::test]
    async fn exact_multiple_has_no_short_tail() {
        let data = vec![1u8; 32];
        let table = signature(&data[..], cfg(8)).await.unwrap();
        assert_eq!(table.len(), 4);
    }

    #[tokio::test]
    async fn indices_ascend_from_zero() {
        let data = vec![7u8; 100];
        let table = signature(&data[..], cfg(8)).await.unwrap();
        assert_eq!(table.len(), 13);
        for (i, record) in table.iter().enumerate() {
            assert_eq!(record.index, i as u64);
        }
    }

    #[tokio::test]
    async fn identical_blocks_share_hashes() {
        let table = signature(&b"xyxyxyxyxyxyxyxy"[..], cfg(8)).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].weak, table[1].weak);
        assert_eq!(table[0].strong, table[1].strong);
    }
}
