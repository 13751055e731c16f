//! `rollsync` – streaming rsync-style delta transfer over async byte streams.
//!
//! Rebuilds a *source* byte stream on a peer that already holds a related
//! *base*, transferring only a compact per-block signature of the base plus
//! a delta of block references and literal bytes:
//!
//! * [`signature()`] / [`signature_stream`] – partition the base into
//!   fixed-size blocks and hash each with a weak rolling hash and SHA-256.
//! * [`diff()`] – slide a rolling-hash window over the source, match windows
//!   against the signature table, and emit [`Op`]s: single block copies,
//!   coalesced block ranges, and bounded literal runs.
//! * [`apply()`] / [`apply_iter`] – replay the operations against a seekable
//!   base, reproducing the source byte-for-byte.
//!
//! The three stages are independent: run the signature where the base
//! lives, the diff where the source lives, and the apply back on the base
//! side, with any transport in between. Within one process, diff and apply
//! pipeline through any ordered channel (e.g. `tokio::sync::mpsc`) since
//! operations are emitted and consumed strictly in order; dropping a stage's
//! stream cancels it.
//!
//! No wire format is imposed: [`BlockHash`] and [`Op`] are in-memory records
//! and an outer framing layer chooses their encoding. An [`Op::Data`] payload
//! is owned by the operation, so forwarding it across tasks needs no copy.
//! The crate performs no I/O beyond the readers, writers and streams handed
//! to it.
//!
//! SPDX-License-Identifier: Apache-2.0 OR MIT

mod apply;
mod diff;
mod error;
mod hash;
mod signature;
mod types;

pub use apply::{apply_iter, apply_stream as apply};
pub use diff::diff_stream as diff;
pub use error::{ApplyError, ApplyResult, Error, Result};
pub use signature::{signature, signature_stream};
pub use types::{BlockHash, Config, Op};
