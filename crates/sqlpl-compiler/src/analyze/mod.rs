//! Semantic analyzer (C4, §4.4): a single pre-order pass over top-level
//! statements, dispatching by AST kind to a specialized analyzer and
//! annotating every subexpression along the way.

pub mod flow;
mod rewrites;
pub mod schema;
mod stmt;
pub mod types;

use flow::FlowStack;
use schema::SchemaRegistries;
use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind};
use sqlpl_core::sem::StructInfo;
use sqlpl_core::{Diagnostics, ScopeStack, SemTable};
use types::ScalarType;

/// Per-procedure bookkeeping that only makes sense while analyzing one
/// `CREATE PROC` body (§4.4.3 "call proc", "try/catch").
pub struct ProcContext {
    pub name: String,
    pub has_dml: bool,
    pub throws: bool,
    pub result_shape: Option<StructInfo>,
}

/// Owns every piece of state that accumulates across a compile's
/// semantic pass: the semantic-record table, the schema registries,
/// lexical scopes for variables and cursors, and the flow-improvement
/// stack (§3.2, §3.3, §3.4).
pub struct Analyzer<'d> {
    pub sem: SemTable,
    pub registries: SchemaRegistries,
    pub scopes: ScopeStack<ScalarType>,
    pub cursors: ScopeStack<StructInfo>,
    pub flow: FlowStack,
    pub current_proc: Option<ProcContext>,
    /// Set from a top-level `@schema_upgrade_version(N)` pragma, scanned
    /// before the main pass so DDL analyzed earlier in the file can still
    /// see it (§4.4.4, §8 scenario 4).
    pub schema_upgrade_version: Option<i32>,
    pub diagnostics: &'d mut Diagnostics,
}

impl<'d> Analyzer<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            sem: SemTable::new(),
            registries: SchemaRegistries::new(),
            scopes: ScopeStack::new(),
            cursors: ScopeStack::new(),
            flow: FlowStack::new(),
            current_proc: None,
            schema_upgrade_version: None,
            diagnostics,
        }
    }

    /// Reset every piece of process-wide state (§5 "reset-on-init is a
    /// named responsibility"), so the same `Analyzer` can be reused
    /// across compiles in amalgam mode.
    pub fn cleanup(&mut self) {
        self.sem.cleanup();
        self.registries.cleanup();
        self.scopes = ScopeStack::new();
        self.cursors = ScopeStack::new();
        self.flow = FlowStack::new();
        self.current_proc = None;
        self.schema_upgrade_version = None;
    }

    pub fn error(&mut self, arena: &Arena, node: NodeId, msg: impl Into<String>) {
        let file = arena.text(arena.get(node).file).to_owned();
        let line = arena.get(node).line;
        self.diagnostics.error(file, line, msg).emit();
    }

    fn leaf_text(&self, arena: &Arena, node: NodeId) -> String {
        stmt::leaf_text(arena, node).to_owned()
    }

    /// Drive the whole pass: walk the top-level statement list in
    /// order, dispatching each statement to its specialized analyzer.
    pub fn run(&mut self, arena: &mut Arena, root: NodeId) {
        let stmts = arena.get(root).left();
        self.schema_upgrade_version = scan_schema_upgrade_version(arena, stmts);
        self.analyze_stmt_list(arena, stmts);
    }

    pub(crate) fn analyze_stmt_list(&mut self, arena: &mut Arena, list: Option<NodeId>) {
        let mut cur = list;
        while let Some(id) = cur {
            if let Some(stmt) = arena.get(id).left() {
                self.analyze_stmt(arena, stmt);
            }
            cur = arena.get(id).right();
        }
    }

    pub(crate) fn analyze_stmt(&mut self, arena: &mut Arena, node: NodeId) {
        match arena.kind(node) {
            NodeKind::CreateTable => stmt::ddl::analyze_create_table(self, arena, node),
            NodeKind::CreateProc => stmt::ddl::analyze_create_proc(self, arena, node),
            NodeKind::CreateView => stmt::ddl::analyze_create_view(self, arena, node),
            NodeKind::CreateIndex => stmt::ddl::analyze_create_index(self, arena, node),
            NodeKind::CreateTrigger => stmt::ddl::analyze_create_trigger(self, arena, node),

            NodeKind::Declare => stmt::cursor::analyze_declare(self, arena, node),
            NodeKind::DeclareCursor => stmt::cursor::analyze_declare_cursor(self, arena, node),
            NodeKind::DeclareOutCall => stmt::cursor::analyze_declare_out_call(self, arena, node),
            NodeKind::Fetch => stmt::cursor::analyze_fetch(self, arena, node),
            NodeKind::CloseCursor => {}

            NodeKind::Let => stmt::proc::analyze_let(self, arena, node),
            NodeKind::Set => stmt::proc::analyze_set(self, arena, node),
            NodeKind::If => stmt::proc::analyze_if(self, arena, node),
            NodeKind::While => stmt::proc::analyze_while(self, arena, node),
            NodeKind::Try => stmt::try_catch::analyze_try(self, arena, node),
            NodeKind::Call => stmt::proc::analyze_call(self, arena, node),
            NodeKind::Throw | NodeKind::RollbackReturn => {
                if let Some(ctx) = &mut self.current_proc {
                    ctx.throws = true;
                }
            }
            NodeKind::Leave | NodeKind::Continue | NodeKind::Return | NodeKind::CommitReturn => {}

            NodeKind::Select => {
                stmt::select::analyze_select(self, arena, node);
            }
            NodeKind::Insert => stmt::dml::analyze_insert(self, arena, node),
            NodeKind::Update => stmt::dml::analyze_update(self, arena, node),
            NodeKind::Delete => stmt::dml::analyze_delete(self, arena, node),

            NodeKind::SchemaUpgradeVersion
            | NodeKind::SchemaUpgradeScript
            | NodeKind::PreviousSchema
            | NodeKind::Unsub
            | NodeKind::EmitEnums
            | NodeKind::EmitConstants
            | NodeKind::EmitGroup
            | NodeKind::SchemaAdHocMigration
            | NodeKind::Attribute => {}

            NodeKind::MacroRef => {
                self.error(arena, node, "unresolved macro reference reached semantic analysis");
            }
            other => {
                self.error(arena, node, format!("no statement analyzer registered for {:?}", other));
            }
        }
    }
}

/// Find a top-level `@schema_upgrade_version(N)` pragma, if present
/// (§4.4.4). Scanned ahead of the main pass since the pragma may appear
/// after the DDL it governs (§8 scenario 4).
fn scan_schema_upgrade_version(arena: &Arena, list: Option<NodeId>) -> Option<i32> {
    let mut cur = list;
    while let Some(id) = cur {
        if let Some(stmt) = arena.get(id).left() {
            if arena.kind(stmt) == NodeKind::SchemaUpgradeVersion {
                if let Some(arg) = arena.get(stmt).left() {
                    if let Some(Leaf::Int(v)) = arena.get(arg).leaf() {
                        return Some(*v);
                    }
                }
            }
        }
        cur = arena.get(id).right();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::collections::HashSet;

    fn analyze(src: &str) -> (Arena, Diagnostics) {
        let mut arena = Arena::new();
        let root = parse(src, "t.sql", &mut arena).unwrap();
        let defines = HashSet::new();
        let mut diag = Diagnostics::new();
        crate::macros::expand_program(&mut arena, root, &defines, &mut diag);
        let mut analyzer = Analyzer::new(&mut diag);
        analyzer.run(&mut arena, root);
        (arena, diag)
    }

    #[test]
    fn create_table_then_select_resolves_columns() {
        let (_arena, diag) = analyze("CREATE TABLE t (id INT NOT NULL PRIMARY KEY, name TEXT); SELECT id FROM t;");
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn select_from_unknown_table_is_an_error() {
        let (_arena, diag) = analyze("SELECT id FROM missing;");
        assert!(diag.has_errors());
    }

    #[test]
    fn let_then_set_type_mismatch_is_an_error() {
        let (_arena, diag) = analyze("LET x := 1; SET x := 'oops';");
        assert!(diag.has_errors());
    }
}
