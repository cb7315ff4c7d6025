//! Core data structures shared by every pass of the sqlpl compiler.
//!
//! - `arena` — the AST arena (C1): a typed, index-based tree with explicit
//!   parent back-pointers and an encapsulated mutation API.
//! - `symtab` — case-insensitive, insertion-order-preserving symbol tables (C2).
//! - `sem` — the semantic record attached to AST nodes by the analyzer (§3.2).
//! - `interner` — string interning backing the arena's `str_pool`.
//! - `diagnostics` — diagnostic collection and rendering, shared by every pass.

pub mod arena;
pub mod diagnostics;
pub mod interner;
pub mod sem;
pub mod symtab;

pub use arena::{Arena, FileId, Leaf, Node, NodeId, NodeKind, NumTag, QidLeaf, StrTag};
pub use diagnostics::Diagnostics;
pub use interner::{Interner, Symbol};
pub use sem::{
    CoreType, JoinInfo, SemFlags, SemId, SemRecord, SemTable, StructInfo, TableInfo, TypeHash,
};
pub use symtab::{ScopeStack, SymbolTable};
