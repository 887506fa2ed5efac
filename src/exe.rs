// SPDX-License-Identifier: GPL-3.0-or-later
//! PS-X EXE image parsing and the two address spaces.
//!
//! A PS-X EXE starts with a fixed 0x800-byte little-endian header; the
//! text+data image follows. The analyzer keeps the whole body in memory
//! for the lifetime of the run because delay-slot decoding reads words at
//! random offsets.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Size of the fixed header in bytes. The body starts here.
pub const HEADER_SIZE: usize = 0x800;

/// Magic tag at offset 0.
pub const MAGIC: &[u8; 8] = b"PS-X EXE";

/// Header field offsets.
const OFFSET_PC0: usize = 0x10;
const OFFSET_GP0: usize = 0x14;
const OFFSET_T_ADDR: usize = 0x18;
const OFFSET_T_SIZE: usize = 0x1c;
const OFFSET_D_ADDR: usize = 0x20;
const OFFSET_SAVED_SP: usize = 0x3c;

/// Parsed PS-X EXE header.
#[derive(Debug, Clone)]
pub struct Header {
    /// Initial program counter (global address).
    pub pc0: u32,
    /// Initial $gp value.
    pub gp0: u32,
    /// Text load base (global address).
    pub t_addr: u32,
    /// Text size in bytes.
    pub t_size: u32,
    pub d_addr: u32,
    pub d_size: u32,
    pub b_addr: u32,
    pub b_size: u32,
    pub s_addr: u32,
    pub s_size: u32,
    /// Register values saved by the loader: sp, fp, gp, ra, s0.
    pub saved_regs: [u32; 5],
}

impl Header {
    /// Parse the fixed header from the start of an image.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Truncated { len: data.len() });
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(Error::BadMagic);
        }

        let word = |offset: usize| LittleEndian::read_u32(&data[offset..offset + 4]);

        let mut saved_regs = [0u32; 5];
        for (i, reg) in saved_regs.iter_mut().enumerate() {
            *reg = word(OFFSET_SAVED_SP + i * 4);
        }

        Ok(Header {
            pc0: word(OFFSET_PC0),
            gp0: word(OFFSET_GP0),
            t_addr: word(OFFSET_T_ADDR),
            t_size: word(OFFSET_T_SIZE),
            d_addr: word(OFFSET_D_ADDR),
            d_size: word(OFFSET_D_ADDR + 4),
            b_addr: word(OFFSET_D_ADDR + 8),
            b_size: word(OFFSET_D_ADDR + 12),
            s_addr: word(OFFSET_D_ADDR + 16),
            s_size: word(OFFSET_D_ADDR + 20),
            saved_regs,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PS-X EXE")?;
        writeln!(f, "  pc0:    {:#010x}", self.pc0)?;
        writeln!(f, "  gp0:    {:#010x}", self.gp0)?;
        writeln!(
            f,
            "  text:   {:#010x} + {:#x} ({} bytes)",
            self.t_addr, self.t_size, self.t_size
        )?;
        write!(f, "  data:   {:#010x} + {:#x}", self.d_addr, self.d_size)
    }
}

/// A loaded PS-X EXE: the parsed header plus the text+data body.
pub struct Executable {
    pub header: Header,
    /// The body starting at file offset 0x800. May be shorter than
    /// `t_size` for truncated dumps.
    pub text: Vec<u8>,
}

impl Executable {
    /// Parse an in-memory image.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        let text = data[HEADER_SIZE..].to_vec();
        if text.len() < header.t_size as usize {
            log::warn!(
                "image body is {} bytes but header claims t_size {:#x}; analyzing what is there",
                text.len(),
                header.t_size
            );
        }
        Ok(Executable { header, text })
    }

    /// Load an image from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        Self::parse(&data)
    }

    /// Convert a global (CPU) address to a local text offset.
    pub fn to_local(&self, global: u32) -> Result<u32> {
        if global < self.header.t_addr {
            return Err(Error::AddressOutOfRange(global));
        }
        let local = global - self.header.t_addr;
        if local >= self.header.t_size {
            return Err(Error::AddressOutOfRange(global));
        }
        Ok(local)
    }

    /// Convert a local text offset back to a global address.
    pub fn to_global(&self, local: u32) -> u32 {
        self.header.t_addr.wrapping_add(local)
    }

    /// Read the 32-bit word at a local offset, if the body covers it.
    pub fn word_at(&self, local: u32) -> Option<u32> {
        let offset = local as usize;
        let bytes = self.text.get(offset..offset + 4)?;
        Some(LittleEndian::read_u32(bytes))
    }
}
