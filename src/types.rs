//! Record shapes shared by the signature, diff and apply stages.

/// Session parameters. Both sides of an exchange must agree on
/// `block_size`; `max_data_op` only affects buffering granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Bytes per base block. The final block of the base may be shorter.
    pub block_size: usize,
    /// Upper bound on the payload of a single [`Op::Data`], in bytes.
    pub max_data_op: usize,
}

impl Config {
    /// Default block length: 6 KiB.
    pub const DEFAULT_BLOCK_SIZE: usize = 6 * 1024;
    /// Default literal payload bound: 16 KiB.
    pub const DEFAULT_MAX_DATA_OP: usize = 16 * 1024;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            max_data_op: Self::DEFAULT_MAX_DATA_OP,
        }
    }
}

/// Signature record for one base block.
///
/// Records are produced in strictly ascending `index` order, exactly one
/// per block of the base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHash {
    /// 0-based ordinal of the block within the base.
    pub index: u64,
    /// Rolling-hash value over the block's bytes.
    pub weak: u32,
    /// SHA-256 over the block's bytes; consulted only for byte equality.
    pub strong: [u8; 32],
}

/// One step of a delta. Applying a delta's operations in order against the
/// base reproduces the source byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Copy the single base block at `index`.
    Block { index: u64 },
    /// Copy the contiguous run of base blocks `start..end` (`end` exclusive).
    BlockRange { start: u64, end: u64 },
    /// Literal source bytes absent from the base. Never empty, never longer
    /// than [`Config::max_data_op`].
    Data { bytes: Vec<u8> },
}
