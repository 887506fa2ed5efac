// SPDX-License-Identifier: GPL-3.0-or-later
//! The structural control-flow graph.
//!
//! Nodes live in an arena keyed by small integer ids; edges store endpoint
//! ids. Back-edges and self-loops need no special ownership handling, and
//! replacing a node's payload keeps every incident edge valid. After
//! reduction a node owns its child sub-nodes outright.

mod reduce;

pub use reduce::{apply_if, apply_while_true, if_candidate, reduce, while_true_candidate, IfCandidate};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::microcode::{JumpType, MicroBlock, MicroInsn, Register};

pub type NodeId = u32;

/// Edge kinds, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Unconditional fall-through or jump.
    Always,
    /// Taken outcome of a two-way condition.
    True,
    /// Not-taken outcome of a two-way condition.
    False,
    Entry,
    Exit,
}

/// A directed edge between two arena nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// Graph node variants, a closed set.
#[derive(Debug, Clone)]
pub enum Node {
    Entry,
    Exit,
    /// Straight-line code: word address to the micro-ops decoded from it.
    Sequence(BTreeMap<u32, Vec<MicroInsn>>),
    /// An immutable snapshot derived from other nodes.
    Collection(Vec<(u32, Vec<MicroInsn>)>),
    /// A structured conditional: the body runs when the condition's branch
    /// is not taken, or taken when `inverted`.
    If {
        condition: Box<Node>,
        body: Box<Node>,
        inverted: bool,
    },
    /// A structured endless loop.
    WhileTrue { body: Box<Node> },
}

impl Node {
    /// Build a sequence node from a fused micro-block, grouping its
    /// micro-ops by originating word address.
    pub fn sequence_from_block(block: &MicroBlock) -> Node {
        let mut map: BTreeMap<u32, Vec<MicroInsn>> = BTreeMap::new();
        for insn in &block.insns {
            map.entry(insn.addr).or_default().push(insn.clone());
        }
        Node::Sequence(map)
    }

    /// Whether any instruction in this node (or its children) was decoded
    /// from the word at `addr`.
    pub fn contains_address(&self, addr: u32) -> bool {
        match self {
            Node::Entry | Node::Exit => false,
            Node::Sequence(map) => map.contains_key(&addr),
            Node::Collection(items) => items.iter().any(|(a, _)| *a == addr),
            Node::If { condition, body, .. } => {
                condition.contains_address(addr) || body.contains_address(addr)
            }
            Node::WhileTrue { body } => body.contains_address(addr),
        }
    }

    /// All word addresses represented by this node and its children.
    pub fn addresses(&self) -> BTreeSet<u32> {
        let mut set = BTreeSet::new();
        self.collect_addresses(&mut set);
        set
    }

    fn collect_addresses(&self, set: &mut BTreeSet<u32>) {
        match self {
            Node::Entry | Node::Exit => {}
            Node::Sequence(map) => set.extend(map.keys().copied()),
            Node::Collection(items) => set.extend(items.iter().map(|(a, _)| *a)),
            Node::If { condition, body, .. } => {
                condition.collect_addresses(set);
                body.collect_addresses(set);
            }
            Node::WhileTrue { body } => body.collect_addresses(set),
        }
    }

    /// The contained instructions in structural order: for an `If`, the
    /// condition's instructions followed by the body's.
    pub fn instructions(&self) -> Vec<(u32, &MicroInsn)> {
        let mut out = Vec::new();
        self.collect_instructions(&mut out);
        out
    }

    fn collect_instructions<'a>(&'a self, out: &mut Vec<(u32, &'a MicroInsn)>) {
        match self {
            Node::Entry | Node::Exit => {}
            Node::Sequence(map) => {
                for (&addr, insns) in map {
                    out.extend(insns.iter().map(|i| (addr, i)));
                }
            }
            Node::Collection(items) => {
                for (addr, insns) in items {
                    out.extend(insns.iter().map(|i| (*addr, i)));
                }
            }
            Node::If { condition, body, .. } => {
                condition.collect_instructions(out);
                body.collect_instructions(out);
            }
            Node::WhileTrue { body } => body.collect_instructions(out),
        }
    }

    /// Derive the immutable collection form of this node.
    pub fn to_collection(&self) -> Node {
        let mut items: Vec<(u32, Vec<MicroInsn>)> = Vec::new();
        for (addr, insn) in self.instructions() {
            match items.last_mut() {
                Some((last, insns)) if *last == addr => insns.push(insn.clone()),
                _ => items.push((addr, vec![insn.clone()])),
            }
        }
        Node::Collection(items)
    }

    /// Registers read anywhere inside this node.
    pub fn input_registers(&self) -> BTreeSet<Register> {
        let mut set = BTreeSet::new();
        for (_, insn) in self.instructions() {
            set.extend(insn.input_registers());
        }
        set
    }

    /// Registers written anywhere inside this node.
    pub fn output_registers(&self) -> BTreeSet<Register> {
        self.instructions()
            .iter()
            .filter_map(|(_, insn)| insn.output_register())
            .collect()
    }
}

/// The arena graph: owns all top-level nodes and all edges.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeSet<Edge>,
    next_id: NodeId,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Stable printable id for a node.
    pub fn node_name(id: NodeId) -> String {
        format!("node_{}", id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Snapshot of all node ids, safe to hold across mutation.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        self.edges.insert(Edge { from, to, kind });
    }

    pub fn remove_edge(&mut self, edge: &Edge) {
        self.edges.remove(edge);
    }

    /// Remove a node; every incident edge goes with it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.edges.retain(|e| e.from != id && e.to != id);
        Some(node)
    }

    /// Swap a node's payload in place. The id is stable, so incident
    /// edges keep referring to the new payload without rewiring.
    pub fn replace_node(&mut self, id: NodeId, with: impl FnOnce(Node) -> Node) -> bool {
        match self.nodes.remove(&id) {
            Some(old) => {
                self.nodes.insert(id, with(old));
                true
            }
            None => false,
        }
    }

    pub fn outgoing(&self, id: NodeId) -> Vec<Edge> {
        self.edges.iter().filter(|e| e.from == id).copied().collect()
    }

    pub fn incoming(&self, id: NodeId) -> Vec<Edge> {
        self.edges.iter().filter(|e| e.to == id).copied().collect()
    }

    /// Union of represented word addresses over all nodes. Invariant under
    /// structural reduction.
    pub fn addresses(&self) -> BTreeSet<u32> {
        let mut set = BTreeSet::new();
        for node in self.nodes.values() {
            node.collect_addresses(&mut set);
        }
        set
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (&id, node) in &self.nodes {
            let kind = match node {
                Node::Entry => "entry",
                Node::Exit => "exit",
                Node::Sequence(_) => "seq",
                Node::Collection(_) => "coll",
                Node::If { .. } => "if",
                Node::WhileTrue { .. } => "while",
            };
            writeln!(f, "{} [{}]", Self::node_name(id), kind)?;
        }
        for edge in &self.edges {
            writeln!(
                f,
                "{} -> {} [{:?}]",
                Self::node_name(edge.from),
                Self::node_name(edge.to),
                edge.kind
            )?;
        }
        Ok(())
    }
}

/// Build the initial structural graph for one function.
///
/// Member blocks are those tagged as owned by `entry`. Conditional
/// branches become True/False edge pairs; lone jump or fall-through
/// edges become Always edges; call edges do not appear (the call's
/// fall-through already carries sequential flow). Blocks with no
/// surviving successors lead to the shared exit node.
pub fn build_function_graph(blocks: &BTreeMap<u32, MicroBlock>, entry: u32) -> Graph {
    let mut graph = Graph::new();

    let members: Vec<&MicroBlock> = blocks
        .values()
        .filter(|b| b.owning_functions.contains(&entry))
        .collect();

    let mut ids: BTreeMap<u32, NodeId> = BTreeMap::new();
    for block in &members {
        ids.insert(block.address, graph.add_node(Node::sequence_from_block(block)));
    }

    let entry_id = graph.add_node(Node::Entry);
    let exit_id = graph.add_node(Node::Exit);
    if let Some(&first) = ids.get(&entry) {
        graph.add_edge(entry_id, first, EdgeKind::Entry);
    }

    for block in &members {
        let from = ids[&block.address];

        let cond_target = block
            .outs
            .iter()
            .find(|&(_, &kind)| kind == JumpType::JumpConditional)
            .and_then(|(&to, _)| ids.get(&to).copied());
        let control_target = block
            .outs
            .iter()
            .find(|&(_, &kind)| kind == JumpType::Control)
            .and_then(|(&to, _)| ids.get(&to).copied());

        let mut connected = false;
        if let Some(taken) = cond_target {
            graph.add_edge(from, taken, EdgeKind::True);
            connected = true;
            if let Some(fall) = control_target {
                graph.add_edge(from, fall, EdgeKind::False);
            }
        } else {
            for (&to, &kind) in &block.outs {
                if matches!(kind, JumpType::Jump | JumpType::Control)
                    && let Some(&target) = ids.get(&to)
                {
                    graph.add_edge(from, target, EdgeKind::Always);
                    connected = true;
                }
            }
        }

        if !connected {
            graph.add_edge(from, exit_id, EdgeKind::Exit);
        }
    }

    graph
}
