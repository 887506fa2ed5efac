// SPDX-License-Identifier: GPL-3.0-or-later
//! Structural reduction: collapsing `if` and `while(true)` shapes.
//!
//! Reducers mutate the graph, so each pass first snapshots the node ids,
//! then re-validates candidacy immediately before applying. The driver
//! re-scans after every pass that changed something and stops at the
//! fixed point.

use super::{EdgeKind, Graph, Node, NodeId};

/// A validated `if` shape rooted at `condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfCandidate {
    pub condition: NodeId,
    pub body: NodeId,
    pub successor: NodeId,
    /// Set when the False target plays the body role.
    pub inverted: bool,
}

/// Check whether `id` roots an `if` shape: two outgoing edges (one True,
/// one False), where one target is a pure diamond body (single in-edge
/// from `id`, single Always out-edge to the other target).
pub fn if_candidate(graph: &Graph, id: NodeId) -> Option<IfCandidate> {
    match graph.node(id)? {
        Node::Entry | Node::Exit => return None,
        _ => {}
    }
    let outs = graph.outgoing(id);
    if outs.len() != 2 {
        return None;
    }
    let taken = outs.iter().find(|e| e.kind == EdgeKind::True)?.to;
    let fallthrough = outs.iter().find(|e| e.kind == EdgeKind::False)?.to;

    for (body, successor, inverted) in
        [(taken, fallthrough, false), (fallthrough, taken, true)]
    {
        if body == id || successor == id || body == successor {
            continue;
        }
        if matches!(graph.node(body), Some(Node::Entry | Node::Exit) | None) {
            continue;
        }
        let body_in = graph.incoming(body);
        let body_out = graph.outgoing(body);
        if body_in.len() == 1
            && body_in[0].from == id
            && body_out.len() == 1
            && body_out[0].kind == EdgeKind::Always
            && body_out[0].to == successor
        {
            return Some(IfCandidate {
                condition: id,
                body,
                successor,
                inverted,
            });
        }
    }
    None
}

/// Collapse a validated `if` shape. The condition node is replaced in
/// place by the new `If` node (same id, so edges from predecessors stay
/// put); the body node and all edges of the diamond disappear; a single
/// Always edge to the common successor remains.
pub fn apply_if(graph: &mut Graph, candidate: &IfCandidate) {
    let Some(body) = graph.remove_node(candidate.body) else {
        return;
    };
    for edge in graph.outgoing(candidate.condition) {
        graph.remove_edge(&edge);
    }
    let inverted = candidate.inverted;
    graph.replace_node(candidate.condition, |condition| Node::If {
        condition: Box::new(condition),
        body: Box::new(body),
        inverted,
    });
    graph.add_edge(candidate.condition, candidate.successor, EdgeKind::Always);
}

/// Check whether `id` is a self-loop: exactly one outgoing edge, an
/// Always edge back to itself.
pub fn while_true_candidate(graph: &Graph, id: NodeId) -> bool {
    if matches!(graph.node(id), Some(Node::Entry | Node::Exit) | None) {
        return false;
    }
    let outs = graph.outgoing(id);
    outs.len() == 1 && outs[0].kind == EdgeKind::Always && outs[0].to == id
}

/// Collapse a self-loop into a `WhileTrue` node with no outgoing edges.
pub fn apply_while_true(graph: &mut Graph, id: NodeId) {
    for edge in graph.outgoing(id) {
        graph.remove_edge(&edge);
    }
    graph.replace_node(id, |body| Node::WhileTrue {
        body: Box::new(body),
    });
}

/// Run both reducers to their fixed point. Returns the number of
/// reductions applied.
pub fn reduce(graph: &mut Graph) -> usize {
    let mut total = 0;
    loop {
        let mut applied = 0;
        for id in graph.node_ids() {
            if let Some(candidate) = if_candidate(graph, id) {
                apply_if(graph, &candidate);
                applied += 1;
            } else if while_true_candidate(graph, id) {
                apply_while_true(graph, id);
                applied += 1;
            }
        }
        if applied == 0 {
            break;
        }
        total += applied;
    }
    total
}
