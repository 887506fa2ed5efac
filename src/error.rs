// SPDX-License-Identifier: GPL-3.0-or-later
//! Error taxonomy for the analyzer.
//!
//! Only failures that abort an operation live here. Disassembly-time
//! anomalies (a branch inside a delay slot, an edge to an undecoded
//! address) are logged and tolerated so that a partial or malformed image
//! still yields a usable CFG.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The first 8 bytes of the image are not `"PS-X EXE"`.
    #[error("bad magic: expected \"PS-X EXE\"")]
    BadMagic,

    /// The image is too short to contain the fixed 0x800-byte header.
    #[error("truncated image: {len} bytes, need at least {}", crate::exe::HEADER_SIZE)]
    Truncated { len: usize },

    /// A global address falls outside `[t_addr, t_addr + t_size)`.
    #[error("address {0:#010x} outside the loaded text range")]
    AddressOutOfRange(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
