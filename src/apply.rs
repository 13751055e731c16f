//! Delta application: replay an operation stream against a seekable base,
//! writing the reconstructed source to an output sink.

use std::io::SeekFrom;

use futures::stream;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::error::{ApplyError, ApplyResult};
use crate::signature::read_full;
use crate::types::{Config, Op};

/// Apply a stream of operations to `base`, writing the rebuilt source to
/// `sink`.
///
/// Operations are consumed strictly in arrival order; the stream's end
/// terminates the apply. Output already written when an error surfaces is
/// left in place, and every error carries the output offset reached, so a
/// caller can seek the sink there and resume with a fresh apply.
pub async fn apply_stream<W, B, Ops, E>(
    mut sink: W,
    mut base: B,
    mut ops: Ops,
    cfg: Config,
) -> ApplyResult<(), E>
where
    W: AsyncWrite + Unpin,
    B: AsyncRead + AsyncSeek + Unpin,
    Ops: Stream<Item = std::result::Result<Op, E>> + Unpin,
{
    let mut progress = 0u64;
    while let Some(next) = ops.next().await {
        let op = next.map_err(|source| ApplyError::OpStream { source, progress })?;
        match op {
            Op::Data { bytes } => {
                if bytes.is_empty() {
                    return Err(ApplyError::Malformed {
                        reason: "empty data operation",
                        progress,
                    });
                }
                sink.write_all(&bytes)
                    .await
                    .map_err(|source| ApplyError::Io { source, progress })?;
                progress += bytes.len() as u64;
            }
            Op::Block { index } => {
                let end = index
                    .checked_add(1)
                    .ok_or(ApplyError::MissingBlock { index, progress })?;
                copy_range(&mut sink, &mut base, index, end, cfg.block_size, &mut progress)
                    .await?;
            }
            Op::BlockRange { start, end } => {
                if end <= start {
                    return Err(ApplyError::Malformed {
                        reason: "empty block range",
                        progress,
                    });
                }
                copy_range(&mut sink, &mut base, start, end, cfg.block_size, &mut progress)
                    .await?;
            }
        }
    }
    sink.flush()
        .await
        .map_err(|source| ApplyError::Io { source, progress })?;
    debug!(bytes = progress, "apply complete");
    Ok(())
}

/// Apply an in-memory operation sequence. Convenience wrapper over
/// [`apply_stream`].
pub async fn apply_iter<I, W, B, E>(sink: W, base: B, ops: I, cfg: Config) -> ApplyResult<(), E>
where
    I: IntoIterator<Item = std::result::Result<Op, E>>,
    W: AsyncWrite + Unpin,
    B: AsyncRead + AsyncSeek + Unpin,
{
    apply_stream(sink, base, stream::iter(ops), cfg).await
}

/// Copy base blocks `start..end` to the sink as one transfer. Only the
/// final base block may come up short; any other shortfall means the delta
/// references blocks the base does not have.
async fn copy_range<W, B, E>(
    sink: &mut W,
    base: &mut B,
    start: u64,
    end: u64,
    block_size: usize,
    progress: &mut u64,
) -> ApplyResult<(), E>
where
    W: AsyncWrite + Unpin,
    B: AsyncRead + AsyncSeek + Unpin,
{
    base.seek(SeekFrom::Start(start * block_size as u64))
        .await
        .map_err(|source| ApplyError::Io {
            source,
            progress: *progress,
        })?;
    let want = (end - start) as usize * block_size;
    let mut buf = vec![0u8; want];
    let n = read_full(base, &mut buf)
        .await
        .map_err(|source| ApplyError::Io {
            source,
            progress: *progress,
        })?;
    if n + block_size <= want {
        // First block the base could not fully cover.
        return Err(ApplyError::MissingBlock {
            index: start + (n / block_size) as u64,
            progress: *progress,
        });
    }
    sink.write_all(&buf[..n])
        .await
        .map_err(|source| ApplyError::Io {
            source,
            progress: *progress,
        })?;
    *progress += n as u64;
    Ok(())
}
