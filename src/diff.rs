//! Delta generation: slide a rolling-hash window over the source, match
//! windows against the base's signature table, and emit block references
//! for matched regions plus literal bytes for everything else.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;

use async_stream::try_stream;
use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;
use tokio_stream::Stream;
use tracing::debug;

use crate::error::Result;
use crate::hash::RollingHash;
use crate::signature::read_full;
use crate::types::{BlockHash, Config, Op};

/// Floor for the source read buffer; single-byte window steps are served
/// out of this buffer, not the reader.
const READ_CHUNK: usize = 64 * 1024;

/// Byte-at-a-time view over a reader, buffered in large chunks.
struct Chunked<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> Chunked<R> {
    fn new(reader: R, chunk: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; chunk],
            pos: 0,
            len: 0,
            eof: false,
        }
    }

    async fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        if self.pos == self.len {
            if self.eof {
                return Ok(None);
            }
            self.len = read_full(&mut self.reader, &mut self.buf).await?;
            self.pos = 0;
            if self.len < self.buf.len() {
                self.eof = true;
            }
            if self.len == 0 {
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }
}

fn window_rolling(window: &VecDeque<u8>) -> RollingHash {
    let (head, tail) = window.as_slices();
    let mut hash = RollingHash::new();
    hash.update(head);
    hash.update(tail);
    hash
}

fn window_strong(window: &VecDeque<u8>) -> [u8; 32] {
    let (head, tail) = window.as_slices();
    let mut hasher = Sha256::new();
    hasher.update(head);
    hasher.update(tail);
    hasher.finalize().into()
}

fn run_op(first: u64, last: u64) -> Op {
    if first == last {
        Op::Block { index: first }
    } else {
        Op::BlockRange {
            start: first,
            end: last + 1,
        }
    }
}

/// Stream the operations of a delta that rebuilds `source` from the base
/// described by `signature`.
///
/// The signature table is borrowed for the life of the stream, never
/// retained. Operations come out strictly in output order: applying them in
/// sequence against the base reproduces `source` exactly. A window is only
/// accepted as a match once the strong digest confirms it; when several base
/// blocks carry identical content, the lowest-indexed one wins. Runs of
/// consecutively matched block indices coalesce into a single
/// [`Op::BlockRange`].
///
/// Dropping the stream cancels the scan; no further source reads occur.
pub fn diff_stream<'a, R>(
    mut source: R,
    signature: &'a [BlockHash],
    cfg: Config,
) -> Pin<Box<dyn Stream<Item = Result<Op>> + Send + 'a>>
where
    R: AsyncRead + Unpin + Send + 'a,
{
    Box::pin(try_stream! {
        if signature.is_empty() {
            // Nothing can match: the whole source goes out as literals.
            let mut buf = vec![0u8; cfg.max_data_op];
            loop {
                let n = read_full(&mut source, &mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Op::Data { bytes: buf[..n].to_vec() };
                if n < buf.len() {
                    break;
                }
            }
            debug!("delta complete (empty signature)");
            return;
        }

        // Weak value -> positions in `signature`, preserving table order so
        // the first strong-confirmed candidate is deterministic.
        let mut index: HashMap<u32, Vec<usize>> = HashMap::new();
        for (pos, record) in signature.iter().enumerate() {
            index.entry(record.weak).or_default().push(pos);
        }
        debug!(blocks = signature.len(), buckets = index.len(), "match index built");

        let mut src = Chunked::new(source, cfg.block_size.max(READ_CHUNK));
        let mut window: VecDeque<u8> = VecDeque::with_capacity(cfg.block_size);
        while window.len() < cfg.block_size {
            match src.next_byte().await? {
                Some(b) => window.push_back(b),
                None => break,
            }
        }
        let mut weak = window_rolling(&window);

        // Literal bytes not yet emitted, and the run of consecutively
        // matched block indices held back for coalescing. Any Data emission
        // releases the held run first, so output order follows source order.
        let mut literal: Vec<u8> = Vec::with_capacity(cfg.max_data_op);
        let mut run: Option<(u64, u64)> = None;

        while !window.is_empty() {
            let matched = match index.get(&weak.value()) {
                Some(bucket) => {
                    let strong = window_strong(&window);
                    bucket
                        .iter()
                        .map(|&pos| &signature[pos])
                        .find(|record| record.strong == strong)
                        .map(|record| record.index)
                }
                None => None,
            };

            if let Some(idx) = matched {
                if !literal.is_empty() {
                    if let Some((first, last)) = run.take() {
                        yield run_op(first, last);
                    }
                    yield Op::Data { bytes: std::mem::take(&mut literal) };
                }
                match run {
                    Some((first, last)) if last + 1 == idx => {
                        run = Some((first, idx));
                    }
                    Some((first, last)) => {
                        yield run_op(first, last);
                        run = Some((idx, idx));
                    }
                    None => {
                        run = Some((idx, idx));
                    }
                }

                // The window is consumed; start the next one after it.
                window.clear();
                while window.len() < cfg.block_size {
                    match src.next_byte().await? {
                        Some(b) => window.push_back(b),
                        None => break,
                    }
                }
                weak = window_rolling(&window);
                continue;
            }

            // No match: the window's first byte is a literal.
            let Some(old) = window.pop_front() else {
                break;
            };
            literal.push(old);
            if literal.len() == cfg.max_data_op {
                if let Some((first, last)) = run.take() {
                    yield run_op(first, last);
                }
                yield Op::Data { bytes: std::mem::take(&mut literal) };
            }
            match src.next_byte().await? {
                Some(b) => {
                    window.push_back(b);
                    weak.roll(old, b, window.len());
                }
                None => {
                    // End of source: the window shrinks from the left until
                    // a (possibly short) final block matches or nothing
                    // remains. Recompute the weak hash at each step.
                    weak = window_rolling(&window);
                }
            }
        }

        if !literal.is_empty() {
            if let Some((first, last)) = run.take() {
                yield run_op(first, last);
            }
            yield Op::Data { bytes: std::mem::take(&mut literal) };
        }
        if let Some((first, last)) = run.take() {
            yield run_op(first, last);
        }
        debug!("delta complete");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::signature;
    use tokio_stream::StreamExt;

    fn cfg(block_size: usize, max_data_op: usize) -> Config {
        Config {
            block_size,
            max_data_op,
        }
    }

    fn lcg_bytes(len: usize, seed: u32) -> Vec<u8> {
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (x >> 24) as u8
            })
            .collect()
    }

    async fn collect(source: &[u8], table: &[BlockHash], cfg: Config) -> Vec<Op> {
        let mut stream = diff_stream(source, table, cfg);
        let mut ops = Vec::new();
        while let Some(op) = stream.next().await {
            ops.push(op.unwrap());
        }
        ops
    }

    async fn delta_ops(source: &[u8], base: &[u8], cfg: Config) -> Vec<Op> {
        let table = signature(base, cfg).await.unwrap();
        collect(source, &table, cfg).await
    }

    #[tokio::test]
    async fn empty_signature_degenerates_to_literals() {
        let source = vec![3u8; 100];
        let ops = collect(&source, &[], cfg(8, 32)).await;
        assert_eq!(ops.len(), 4);
        let mut total = Vec::new();
        for op in &ops {
            match op {
                Op::Data { bytes } => {
                    assert!(!bytes.is_empty() && bytes.len() <= 32);
                    total.extend_from_slice(bytes);
                }
                other => panic!("unexpected op: {other:?}"),
            }
        }
        assert_eq!(total, source);
    }

    #[tokio::test]
    async fn empty_source_yields_no_ops() {
        let base = lcg_bytes(64, 5);
        let ops = delta_ops(&[], &base, cfg(8, 32)).await;
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn identical_input_coalesces_to_one_range() {
        let data: Vec<u8> = (0..96u32).map(|i| (i * 7 + 3) as u8).collect();
        let ops = delta_ops(&data, &data, cfg(8, 64)).await;
        assert_eq!(ops, vec![Op::BlockRange { start: 0, end: 12 }]);
    }

    #[tokio::test]
    async fn single_block_match_stays_a_block_op() {
        let base: Vec<u8> = (0..8u8).collect();
        let mut source = b"##".to_vec();
        source.extend_from_slice(&base);
        source.extend_from_slice(b"!!");
        let ops = delta_ops(&source, &base, cfg(8, 64)).await;
        assert_eq!(
            ops,
            vec![
                Op::Data { bytes: b"##".to_vec() },
                Op::Block { index: 0 },
                Op::Data { bytes: b"!!".to_vec() },
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_base_blocks_match_lowest_index() {
        let block: Vec<u8> = (100..108u8).collect();
        let base = [block.clone(), block.clone(), block.clone()].concat();
        let ops = delta_ops(&block, &base, cfg(8, 64)).await;
        assert_eq!(ops, vec![Op::Block { index: 0 }]);
    }

    #[tokio::test]
    async fn mutated_middle_block_becomes_literals() {
        let base = lcg_bytes(4 * 8, 7);
        let mut source = base.clone();
        source[12] ^= 0xa5;
        let ops = delta_ops(&source, &base, cfg(8, 64)).await;
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], Op::Block { index: 0 });
        assert!(matches!(&ops[1], Op::Data { bytes } if bytes.len() == 8));
        assert_eq!(ops[2], Op::BlockRange { start: 2, end: 4 });
    }

    #[tokio::test]
    async fn short_final_block_matches_source_tail() {
        // Base tail block is 3 bytes; a source ending in those bytes picks
        // it up in the end-of-stream sweep.
        let base = lcg_bytes(19, 21); // blocks of 8, 8, 3
        let mut source = b"prefix--".to_vec();
        source.extend_from_slice(&base[16..]);
        let ops = delta_ops(&source, &base, cfg(8, 64)).await;
        assert_eq!(
            ops,
            vec![
                Op::Data { bytes: b"prefix--".to_vec() },
                Op::Block { index: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn small_string_update() {
        let base = b"I am the original content";
        let source = b"I am the new content";
        let ops = delta_ops(source, base, cfg(4, 16)).await;
        assert_eq!(
            ops,
            vec![
                Op::BlockRange { start: 0, end: 2 },
                Op::Data { bytes: b" new co".to_vec() },
                Op::BlockRange { start: 5, end: 7 },
            ]
        );
    }

    #[tokio::test]
    async fn literal_payloads_are_bounded() {
        let base = lcg_bytes(256, 1);
        let source = lcg_bytes(1000, 2);
        let max = 48;
        let ops = delta_ops(&source, &base, cfg(32, max)).await;
        for op in &ops {
            if let Op::Data { bytes } = op {
                assert!(!bytes.is_empty() && bytes.len() <= max);
            }
        }
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_deltas() {
        let base = lcg_bytes(3000, 11);
        let mut source = lcg_bytes(3000, 11);
        source[1500] ^= 1;
        let c = cfg(256, 700);
        let first = delta_ops(&source, &base, c).await;
        let second = delta_ops(&source, &base, c).await;
        assert_eq!(first, second);
    }
}
