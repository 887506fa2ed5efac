// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use psx_decompiler::{
    api,
    cfg::analyze,
    exe::Executable,
    graph::{Graph, Node, build_function_graph, reduce},
    symbols::DebugSource,
};

/// Parse a decimal or 0x-prefixed hex address.
fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", s, e))
}

#[derive(Parser)]
#[command(name = "psx-decompiler")]
#[command(about = "Analyze PS-X EXE images into micro-assembly control flow")]
struct Args {
    /// Path to the PS-X EXE image
    exe: PathBuf,

    /// JSON file with debug labels and function entry points
    #[arg(short, long)]
    symbols: Option<PathBuf>,

    /// First global address to list
    #[arg(short, long, value_parser = parse_address, default_value = "0")]
    offset: u32,

    /// Number of blocks to list
    #[arg(short, long, default_value_t = 32)]
    length: usize,

    /// Emit the listing as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Also print the reduced structural graph of every function
    #[arg(long)]
    functions: bool,
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Entry => "entry",
        Node::Exit => "exit",
        Node::Sequence(_) => "sequence",
        Node::Collection(_) => "collection",
        Node::If { inverted: false, .. } => "if",
        Node::If { inverted: true, .. } => "if-not",
        Node::WhileTrue { .. } => "while-true",
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let exe = Executable::load(&args.exe)
        .with_context(|| format!("Failed to load {:?}", args.exe))?;
    println!("{}", exe.header);
    println!();

    let symbols = match &args.symbols {
        Some(path) => DebugSource::load(path)?,
        None => DebugSource::default(),
    };

    let analysis = analyze(&exe, &symbols);
    println!(
        "Decoded {} basic blocks across {} functions",
        analysis.blocks.len(),
        analysis.functions.len()
    );

    if args.functions {
        for &entry in &analysis.functions {
            let mut graph = build_function_graph(&analysis.blocks, entry);
            let applied = reduce(&mut graph);
            println!(
                "\nfunction {:#010x}: {} nodes, {} edges ({} reductions)",
                exe.to_global(entry),
                graph.node_count(),
                graph.edge_count(),
                applied
            );
            for (id, node) in graph.nodes() {
                if matches!(node, Node::Entry | Node::Exit) {
                    continue;
                }
                let micro_ops = node.to_collection().instructions().len();
                println!(
                    "  {}: {} ({} micro-ops)",
                    Graph::node_name(id),
                    node_kind(node),
                    micro_ops
                );
            }
        }
        println!();
    }

    let entries = api::instructions(&analysis.blocks, &exe, args.offset, args.length);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            match entry.jump_target {
                Some(target) => {
                    println!("{:#010x}  {}  -> {:#010x}", entry.address, entry.text, target)
                }
                None => println!("{:#010x}  {}", entry.address, entry.text),
            }
        }
    }

    Ok(())
}
