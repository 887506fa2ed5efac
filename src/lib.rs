// SPDX-License-Identifier: GPL-3.0-or-later
//! PS-X EXE Static Analyzer Library
//!
//! This library disassembles PlayStation executables (MIPS R3000 machine
//! code) into a micro-assembly control-flow graph: recursive decoding
//! with delay-slot handling, basic-block fusion, function-ownership
//! tagging, and structural reduction of `if` and `while(true)` shapes.

pub mod api;
pub mod cfg;
pub mod error;
pub mod exe;
pub mod graph;
pub mod microcode;
pub mod mips;
pub mod symbols;

pub use error::{Error, Result};
