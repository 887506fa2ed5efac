// SPDX-License-Identifier: GPL-3.0-or-later
//! Debug-symbol source consumed by the analyzer.
//!
//! The host supplies labels and function entry points from whatever debug
//! format it reads (SYM files from the SN Systems toolchain, hand-written
//! JSON, ...). The analyzer only needs three things from it: function
//! addresses to seed the worklist, the `__SN_GP_BASE` label to resolve
//! $gp-relative operands, and cosmetic names for resolved addresses.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Name of the label that marks the $gp addressing base.
pub const GP_BASE_LABEL: &str = "__SN_GP_BASE";

/// A named label attached to a global address.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// A known function entry point.
#[derive(Debug, Clone)]
pub struct Function {
    pub global_address: u32,
    pub name: Option<String>,
}

/// Strip a "0x" or "0X" prefix from a string, if present.
fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a hex address string with optional 0x/0X prefix.
fn parse_hex_addr(s: &str) -> Option<u32> {
    u32::from_str_radix(strip_hex_prefix(s), 16).ok()
}

/// JSON shape: `{ "labels": [{"0xaddr": "name"}], "functions": [...] }`.
#[derive(Debug, Default, Deserialize)]
struct DebugSourceJson {
    #[serde(default)]
    labels: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    functions: Vec<BTreeMap<String, String>>,
}

/// The symbol/debug source for one analysis run.
#[derive(Debug, Default)]
pub struct DebugSource {
    labels: BTreeMap<u32, Vec<Label>>,
    functions: Vec<Function>,
}

impl DebugSource {
    /// Load a debug source from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open symbols file {:?}", path))?;
        let json: DebugSourceJson = serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse symbols file {:?}", path))?;
        Ok(Self::from_json(json))
    }

    fn from_json(json: DebugSourceJson) -> Self {
        let mut source = DebugSource::default();
        for entry in json.labels {
            for (addr_str, name) in entry {
                if let Some(addr) = parse_hex_addr(&addr_str) {
                    source.add_label(addr, name);
                }
            }
        }
        for entry in json.functions {
            for (addr_str, name) in entry {
                if let Some(addr) = parse_hex_addr(&addr_str) {
                    let name = (!name.is_empty()).then_some(name);
                    source.add_function(addr, name);
                }
            }
        }
        source
    }

    pub fn add_label(&mut self, global: u32, name: String) {
        self.labels.entry(global).or_default().push(Label { name });
    }

    pub fn add_function(&mut self, global: u32, name: Option<String>) {
        self.functions.push(Function {
            global_address: global,
            name,
        });
    }

    /// All labels attached to a global address.
    pub fn labels(&self, global: u32) -> &[Label] {
        self.labels.get(&global).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Known function entry points, in insertion order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Global addresses of all known functions.
    pub fn function_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.functions.iter().map(|f| f.global_address)
    }

    /// Cosmetic name for a global address: the first label there, or the
    /// name of a function starting there.
    pub fn symbol_name(&self, global: u32) -> Option<&str> {
        if let Some(labels) = self.labels.get(&global)
            && let Some(label) = labels.first()
        {
            return Some(&label.name);
        }
        self.functions
            .iter()
            .find(|f| f.global_address == global)
            .and_then(|f| f.name.as_deref())
    }

    /// The $gp addressing base, if a `__SN_GP_BASE` label exists.
    pub fn gp_base(&self) -> Option<u32> {
        self.labels
            .iter()
            .find(|(_, labels)| labels.iter().any(|l| l.name == GP_BASE_LABEL))
            .map(|(&addr, _)| addr)
    }
}
