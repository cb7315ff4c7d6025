//! The AST arena (C1): an arena-allocated heterogeneous tree.
//!
//! Every node carries `(kind, file, line, left, right, parent, sem?)`.
//! Interior nodes use `left`/`right` for their (at most two) children;
//! longer lists are encoded as right-spine cons chains, matching the
//! grammar's list-producing non-terminals (`stmt_list`, `cte_tables`, ...).
//! Leaves come in four variants sharing the same header (§3.1).
//!
//! Mutation only ever happens through `Arena` methods (`set_left`,
//! `set_right`, `replace`, `clone_subtree`) so that a direct assignment
//! which forgets to fix up `parent` is not possible to write — the bug
//! shape the original design flags as the most common one is ruled out
//! by construction.

use crate::interner::Symbol;

/// Interned source file name.
pub type FileId = Symbol;

/// A handle into the arena. Cheap to copy, stable for the lifetime of the
/// arena (nodes are never freed individually; the whole arena is dropped
/// as a unit at the end of a compile).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque index into the analyzer's semantic-record table (`SemTable`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SemId(u32);

impl SemId {
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminator selecting which layout a node has. Interior kinds use
/// `left`/`right` per the grammar; leaf kinds carry a `Leaf` payload.
///
/// This is not exhaustive of every surface construct in §6.1 — it covers
/// the statement/expression shapes the analyzer (§4.4.3), the rewrite
/// passes (§4.4.5), and the regenerator (§4.5) operate on directly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    // --- leaves ---
    IntLeaf,
    NumLit,
    StrLit,
    QuotedId,

    // --- list/cons ---
    StmtList,
    ColList,
    ParamList,
    ArgList,
    CteList,
    ProjectionList,
    WhenList,

    // --- top-level program ---
    Program,

    // --- DDL ---
    CreateTable,
    ColDef,
    PkConstraint,
    FkConstraint,
    UniqueConstraint,
    CreateView,
    CreateIndex,
    CreateTrigger,
    AlterTableAddColumn,
    DropStmt,
    SchemaRegion,
    SchemaUpgradeVersion,
    SchemaUpgradeScript,
    PreviousSchema,
    Unsub,
    EmitEnums,
    EmitConstants,
    EmitGroup,
    SchemaAdHocMigration,
    CreateAnnotation,
    DeleteAnnotation,
    RecreateAnnotation,

    // --- declarations ---
    CreateProc,
    ProcParam,
    DeclareFunc,
    InterfaceDecl,
    EnumDecl,
    ConstGroup,
    NamedType,
    VarGroup,
    MacroDef,
    MacroFormal,
    Attribute,

    // --- procedural statements ---
    Declare,
    Let,
    Const,
    Set,
    If,
    ElseIf,
    Else,
    Switch,
    When,
    While,
    Loop,
    Leave,
    Continue,
    Return,
    RollbackReturn,
    CommitReturn,
    Try,
    Catch,
    Throw,
    ProcSavepoint,
    Call,
    DeclareOutCall,
    DeclareCursor,
    Fetch,
    CloseCursor,
    OutStmt,
    OutUnion,
    UpdateCursor,
    BlobGet,
    BlobSet,

    // --- DML / SQL ---
    With,
    CteTable,
    Select,
    SelectCore,
    FromClause,
    JoinClause,
    WhereClause,
    GroupByClause,
    HavingClause,
    OrderByClause,
    ProjectionItem,
    StarExpr,
    TableStarExpr,
    Insert,
    InsertValues,
    Upsert,
    Update,
    UpdateSetItem,
    Delete,

    // --- expressions ---
    BinaryExpr,
    UnaryExpr,
    BetweenRewrite,
    FuncCallExpr,
    ColumnRefExpr,
    VariableRefExpr,
    CastExpr,
    AttestNotNull,
    IsNullExpr,
    NullableWrap,
    InferredNotNullWrap,
    ArgumentsRefExpr,

    // --- macro references ---
    MacroRef,
    MacroArgRef,
    IfDefBlock,
    TextBuiltin,
    IdBuiltin,
    MacroLineBuiltin,
    MacroFileBuiltin,
}

/// Tag for a numeric literal leaf (§3.1).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NumTag {
    Bool,
    Int,
    Long,
    Real,
}

/// Tag for a string/identifier/blob leaf (§3.1).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StrTag {
    SqlLiteral,
    CLiteral,
    QuotedId,
    Identifier,
}

/// A pre-escaped mangled free-text identifier, e.g. backtick-quoted
/// `` `a b` `` stored as `X_aX20b`. The original is recoverable via
/// `QidLeaf::original`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct QidLeaf {
    pub mangled: Symbol,
    pub original: Symbol,
}

/// The discriminated payload carried by leaf nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Leaf {
    Int(i32),
    Num { tag: NumTag, text: Symbol },
    Str { tag: StrTag, text: Symbol },
    Qid(QidLeaf),
}

/// Either an interior node's children or a leaf's payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeShape {
    Interior {
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
    Leaf(Leaf),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub file: FileId,
    pub line: u32,
    pub sem: Option<SemId>,
    pub shape: NodeShape,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self.shape, NodeShape::Leaf(_))
    }

    pub fn left(&self) -> Option<NodeId> {
        match self.shape {
            NodeShape::Interior { left, .. } => left,
            NodeShape::Leaf(_) => None,
        }
    }

    pub fn right(&self) -> Option<NodeId> {
        match self.shape {
            NodeShape::Interior { right, .. } => right,
            NodeShape::Leaf(_) => None,
        }
    }

    pub fn leaf(&self) -> Option<&Leaf> {
        match &self.shape {
            NodeShape::Leaf(l) => Some(l),
            NodeShape::Interior { .. } => None,
        }
    }
}

/// The two process-wide arenas described in §3.1: `ast_pool` (this type)
/// and `str_pool` (the embedded `Interner`). Both live for the duration
/// of a compile and are released as a unit; there is no per-node free.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
    pub strings: crate::interner::Interner,
}

/// Traversal order for `walk`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WalkOrder {
    Pre,
    Post,
}

/// Lets a visitor short-circuit a `walk`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WalkControl {
    Continue,
    SkipChildren,
    Stop,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `filename`, for use as a node's `file` field.
    pub fn file(&mut self, filename: &str) -> FileId {
        self.strings.intern(filename)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn reparent(&mut self, child: NodeId, parent: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Allocate an interior node, fixing up `left`/`right`'s parent links.
    pub fn new_node(
        &mut self,
        kind: NodeKind,
        left: Option<NodeId>,
        right: Option<NodeId>,
        file: FileId,
        line: u32,
    ) -> NodeId {
        debug_assert!(line > 0, "every node must have a positive line number");
        let id = self.push(Node {
            kind,
            parent: None,
            file,
            line,
            sem: None,
            shape: NodeShape::Interior { left, right },
        });
        if let Some(l) = left {
            self.reparent(l, id);
        }
        if let Some(r) = right {
            self.reparent(r, id);
        }
        id
    }

    fn new_leaf(&mut self, kind: NodeKind, leaf: Leaf, file: FileId, line: u32) -> NodeId {
        debug_assert!(line > 0, "every node must have a positive line number");
        self.push(Node {
            kind,
            parent: None,
            file,
            line,
            sem: None,
            shape: NodeShape::Leaf(leaf),
        })
    }

    pub fn new_int_leaf(&mut self, value: i32, file: FileId, line: u32) -> NodeId {
        self.new_leaf(NodeKind::IntLeaf, Leaf::Int(value), file, line)
    }

    pub fn new_num_leaf(&mut self, tag: NumTag, text: &str, file: FileId, line: u32) -> NodeId {
        let text = self.strings.intern(text);
        self.new_leaf(NodeKind::NumLit, Leaf::Num { tag, text }, file, line)
    }

    pub fn new_str_leaf(&mut self, tag: StrTag, text: &str, file: FileId, line: u32) -> NodeId {
        let text = self.strings.intern(text);
        self.new_leaf(NodeKind::StrLit, Leaf::Str { tag, text }, file, line)
    }

    /// Construct a quoted-identifier leaf from the raw backtick-delimited
    /// source text (backticks included), mangling it to the `X_`-escaped
    /// form used by every later pass (§3.1).
    pub fn new_qid_leaf(&mut self, raw_backticked: &str, file: FileId, line: u32) -> NodeId {
        let inner = raw_backticked
            .strip_prefix('`')
            .and_then(|s| s.strip_suffix('`'))
            .unwrap_or(raw_backticked);
        let mangled_text = mangle_quoted_identifier(inner);
        let mangled = self.strings.intern(&mangled_text);
        let original = self.strings.intern(inner);
        self.new_leaf(
            NodeKind::QuotedId,
            Leaf::Qid(QidLeaf { mangled, original }),
            file,
            line,
        )
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.get(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    pub fn sem(&self, id: NodeId) -> Option<SemId> {
        self.get(id).sem
    }

    pub fn set_sem(&mut self, id: NodeId, sem: SemId) {
        self.get_mut(id).sem = Some(sem);
    }

    pub fn text(&self, sym: Symbol) -> &str {
        self.strings.resolve(sym)
    }

    /// Replace `parent`'s left child, updating the new child's parent link.
    /// Always use this (and `set_right`) rather than mutating `shape`
    /// directly.
    pub fn set_left(&mut self, parent: NodeId, child: Option<NodeId>) {
        match &mut self.get_mut(parent).shape {
            NodeShape::Interior { left, .. } => *left = child,
            NodeShape::Leaf(_) => panic!("cannot set children of a leaf node"),
        }
        if let Some(c) = child {
            self.reparent(c, parent);
        }
    }

    pub fn set_right(&mut self, parent: NodeId, child: Option<NodeId>) {
        match &mut self.get_mut(parent).shape {
            NodeShape::Interior { right, .. } => *right = child,
            NodeShape::Leaf(_) => panic!("cannot set children of a leaf node"),
        }
        if let Some(c) = child {
            self.reparent(c, parent);
        }
    }

    /// Substitute `new` for `old` in `old`'s parent, in whichever slot
    /// `old` occupies. Used by rewrites (§4.4.5) and macro expansion (§4.3).
    pub fn replace(&mut self, old: NodeId, new: Option<NodeId>) {
        let Some(parent) = self.parent(old) else {
            // Replacing the root: caller is responsible for updating
            // whatever external handle points at it.
            return;
        };
        let is_left = self.get(parent).left() == Some(old);
        let is_right = self.get(parent).right() == Some(old);
        if is_left {
            self.set_left(parent, new);
        } else if is_right {
            self.set_right(parent, new);
        } else {
            panic!("old.parent does not actually contain old");
        }
    }

    /// Deep-copy a subtree. Every copied node lives in this arena at a
    /// fresh `NodeId`; there is no structural sharing with the original,
    /// since a node may not be aliased across two positions in the tree.
    pub fn clone_subtree(&mut self, root: NodeId) -> NodeId {
        let node = self.get(root).clone();
        match node.shape {
            NodeShape::Leaf(leaf) => self.new_leaf(node.kind, leaf, node.file, node.line),
            NodeShape::Interior { left, right } => {
                let new_left = left.map(|l| self.clone_subtree(l));
                let new_right = right.map(|r| self.clone_subtree(r));
                self.new_node(node.kind, new_left, new_right, node.file, node.line)
            }
        }
    }

    /// Traverse a subtree, calling `visitor` for each node in `order`.
    pub fn walk(&self, root: NodeId, order: WalkOrder, visitor: &mut impl FnMut(NodeId) -> WalkControl) -> WalkControl {
        if order == WalkOrder::Pre {
            match visitor(root) {
                WalkControl::Stop => return WalkControl::Stop,
                WalkControl::SkipChildren => return WalkControl::Continue,
                WalkControl::Continue => {}
            }
        }
        let node = self.get(root);
        let children: Vec<NodeId> = match node.shape {
            NodeShape::Interior { left, right } => left.into_iter().chain(right).collect(),
            NodeShape::Leaf(_) => Vec::new(),
        };
        for child in children {
            if self.walk(child, order, visitor) == WalkControl::Stop {
                return WalkControl::Stop;
            }
        }
        if order == WalkOrder::Post {
            return visitor(root);
        }
        WalkControl::Continue
    }

    /// Self-check mode (§3.1, §8.2): every non-root node's parent must
    /// actually contain it among its children.
    pub fn check_parent_links(&self, root: NodeId) -> Result<(), Vec<NodeId>> {
        let mut bad = Vec::new();
        let mut visit = |id: NodeId| -> WalkControl {
            if let Some(parent) = self.parent(id) {
                let p = self.get(parent);
                if p.left() != Some(id) && p.right() != Some(id) {
                    bad.push(id);
                }
            }
            WalkControl::Continue
        };
        self.walk(root, WalkOrder::Pre, &mut visit);
        if bad.is_empty() {
            Ok(())
        } else {
            Err(bad)
        }
    }
}

/// Mangle free-text identifier contents (as found between backticks) into
/// the `X_`-escaped form: every byte outside `[A-Za-z0-9_]` becomes
/// `X<hex>` and a leading `X` is used as the escape marker, matching the
/// shape given in §3.1 (`` `a b` `` → `X_aX20b`).
fn mangle_quoted_identifier(inner: &str) -> String {
    let mut out = String::from("X_");
    for b in inner.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            out.push(b as char);
        } else {
            out.push('X');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

/// Reverse `mangle_quoted_identifier`, recovering the original free text
/// from a mangled form. Used by diagnostics that want to show the
/// user-written identifier.
pub fn unmangle_quoted_identifier(mangled: &str) -> Option<String> {
    let rest = mangled.strip_prefix("X_")?;
    let mut out = String::new();
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'X' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            out.push(byte as char);
            i += 3;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    Some(out)
}

/// Cleanup registry entry point (§5): re-initializes the arena for a
/// fresh compile in the same process (amalgam mode).
impl Arena {
    pub fn cleanup(&mut self) {
        self.nodes.clear();
        self.strings = crate::interner::Interner::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(a: &mut Arena) -> FileId {
        a.file("t.sql")
    }

    #[test]
    fn parent_links_after_new_node() {
        let mut a = Arena::new();
        let f = file(&mut a);
        let leaf = a.new_int_leaf(1, f, 1);
        let node = a.new_node(NodeKind::StmtList, Some(leaf), None, f, 1);
        assert_eq!(a.parent(leaf), Some(node));
        assert!(a.check_parent_links(node).is_ok());
    }

    #[test]
    fn replace_fixes_up_parent() {
        let mut a = Arena::new();
        let f = file(&mut a);
        let old = a.new_int_leaf(1, f, 1);
        let root = a.new_node(NodeKind::StmtList, Some(old), None, f, 1);
        let new = a.new_int_leaf(2, f, 1);
        a.replace(old, Some(new));
        assert_eq!(a.get(root).left(), Some(new));
        assert_eq!(a.parent(new), Some(root));
        assert!(a.check_parent_links(root).is_ok());
    }

    #[test]
    fn clone_subtree_has_no_sharing() {
        let mut a = Arena::new();
        let f = file(&mut a);
        let leaf = a.new_int_leaf(7, f, 1);
        let root = a.new_node(NodeKind::StmtList, Some(leaf), None, f, 1);
        let clone = a.clone_subtree(root);
        assert_ne!(clone, root);
        assert_ne!(a.get(clone).left(), a.get(root).left());
        assert!(a.check_parent_links(clone).is_ok());
    }

    #[test]
    fn list_splice_rewires_three_pointers() {
        // Simulates a macro list splice: parent list's left becomes the
        // body's first item, body's tail is rewritten to point at what
        // was the parent's next link (§4.3 step 7).
        let mut a = Arena::new();
        let f = file(&mut a);
        let item_a = a.new_int_leaf(1, f, 1);
        let rest = a.new_node(NodeKind::StmtList, Some(item_a), None, f, 1);
        let macro_ref = a.new_int_leaf(99, f, 1); // stand-in for the ref being spliced
        let outer = a.new_node(NodeKind::StmtList, Some(macro_ref), Some(rest), f, 1);

        let body_item1 = a.new_int_leaf(10, f, 1);
        let body_item2 = a.new_int_leaf(20, f, 1);
        let body_tail = a.new_node(NodeKind::StmtList, Some(body_item2), None, f, 1);
        let body_head = a.new_node(NodeKind::StmtList, Some(body_item1), Some(body_tail), f, 1);

        // Splice: outer.left -> body_head.left ; body_tail.right -> outer.right
        a.set_right(body_tail, a.get(outer).right());
        a.set_left(outer, a.get(body_head).left());
        a.set_right(outer, a.get(body_head).right());

        assert!(a.check_parent_links(outer).is_ok());
        assert_eq!(a.get(outer).left(), Some(body_item1));
    }

    #[test]
    fn mangle_roundtrip() {
        let mangled = mangle_quoted_identifier("a b");
        assert_eq!(mangled, "X_aX20b");
        assert_eq!(unmangle_quoted_identifier(&mangled).as_deref(), Some("a b"));
    }
}
