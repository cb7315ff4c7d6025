//! Statement analyzers (§4.4.3), one module per family of AST kinds.

pub mod ddl;
pub mod dml;
pub mod expr;
pub mod proc;
pub mod select;
pub mod try_catch;

pub mod cursor;

use sqlpl_core::arena::{Arena, Leaf, NodeId};

/// Resolve a `StrTag`-leaf node to its text. Panics if `node` isn't a
/// string leaf — every call site here is one that already matched on
/// `NodeKind` to know it's looking at an identifier/literal position.
pub fn leaf_text<'a>(arena: &'a Arena, node: NodeId) -> &'a str {
    match arena.get(node).leaf() {
        Some(Leaf::Str { text, .. }) => arena.text(*text),
        _ => panic!("expected a string leaf at {:?}", node),
    }
}

/// Walk a right-spine cons list, collecting each item's value.
pub fn collect_list(arena: &Arena, list: Option<NodeId>) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut cur = list;
    while let Some(id) = cur {
        if let Some(item) = arena.get(id).left() {
            out.push(item);
        }
        cur = arena.get(id).right();
    }
    out
}
