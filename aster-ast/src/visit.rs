// Structured traversal over the node tree

use crate::NodeRef;

/// Visitor verdict: keep walking or stop the whole traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    Stop,
}

/// Pre-order walk: the node first, then its children left to right.
/// Returns `Stop` as soon as the visitor does.
pub fn walk_pre(node: &NodeRef, visitor: &mut dyn FnMut(&NodeRef) -> VisitFlow) -> VisitFlow {
    if visitor(node) == VisitFlow::Stop {
        return VisitFlow::Stop;
    }
    for child in node.children() {
        if walk_pre(&child, visitor) == VisitFlow::Stop {
            return VisitFlow::Stop;
        }
    }
    VisitFlow::Continue
}

/// Post-order walk: children left to right, then the node.
pub fn walk_post(node: &NodeRef, visitor: &mut dyn FnMut(&NodeRef) -> VisitFlow) -> VisitFlow {
    for child in node.children() {
        if walk_post(&child, visitor) == VisitFlow::Stop {
            return VisitFlow::Stop;
        }
    }
    visitor(node)
}
