//! SQL regenerator (C5): a pure function over the annotated AST that
//! writes SQL/source text into a buffer, parameterized by a callback
//! vector so that diagnostics echo, codegen emission, and re-emission
//! of derived CQL can all walk the same tree differently (§4.5).

pub mod priority;

use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind, StrTag};

/// Selects which of the three regeneration "masters" (§4.5) a run serves.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RegenMode {
    /// Echo user source back, preserving form, for diagnostics.
    #[default]
    Echo,
    /// CQL-only annotations (kinds, `@attribute`) are dropped.
    NoAnnotations,
    /// SQLite-acceptable SQL: kinds stripped, aliases may be minified.
    Sqlite,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RegenOptions {
    pub mode: RegenMode,
    pub minify_aliases: bool,
    pub minify_casts: bool,
    pub convert_hex: bool,
    pub long_to_int_conv: bool,
}

/// Hooks a caller can override to intercept regeneration of specific
/// node shapes (§4.5's callback table). Each returns `true` if it wrote
/// replacement text itself (suppressing the default rendering).
pub trait RegenCallbacks {
    fn variable(&mut self, _arena: &Arena, _node: NodeId, _buf: &mut String) -> bool {
        false
    }
    fn star(&mut self, _arena: &Arena, _node: NodeId, _buf: &mut String) -> bool {
        false
    }
    fn set_kind(&mut self, _arena: &Arena, _node: NodeId, _buf: &mut String) -> bool {
        false
    }
    fn cte_suppress(&mut self, _arena: &Arena, _node: NodeId) -> bool {
        false
    }
    fn cte_proc(&mut self, _arena: &Arena, _node: NodeId, _buf: &mut String) -> bool {
        false
    }
    fn table_rename(&mut self, _arena: &Arena, _node: NodeId, _buf: &mut String) -> bool {
        false
    }
    fn func_call(&mut self, _arena: &Arena, _node: NodeId, _buf: &mut String) -> bool {
        false
    }
}

/// The default callback set: every hook declines, producing an
/// unmodified echo of the tree.
#[derive(Default)]
pub struct EchoCallbacks;
impl RegenCallbacks for EchoCallbacks {}

/// Collects placeholder-bound variable names in call order, for a
/// caller that wants to bind them against a prepared statement. Used
/// by the `Sqlite` mode default.
#[derive(Default)]
pub struct BindingCallbacks {
    pub bound_vars: Vec<String>,
}

impl RegenCallbacks for BindingCallbacks {
    fn variable(&mut self, arena: &Arena, node: NodeId, buf: &mut String) -> bool {
        if let Some(Leaf::Str { text, .. }) = arena.get(node).leaf() {
            self.bound_vars.push(arena.text(*text).to_owned());
        } else if let Some(name_id) = arena.get(node).left() {
            if let Some(Leaf::Str { text, .. }) = arena.get(name_id).leaf() {
                self.bound_vars.push(arena.text(*text).to_owned());
            }
        }
        buf.push('?');
        true
    }
}

pub struct Regenerator<'a, C: RegenCallbacks> {
    arena: &'a Arena,
    callbacks: C,
    options: RegenOptions,
}

impl<'a, C: RegenCallbacks> Regenerator<'a, C> {
    pub fn new(arena: &'a Arena, callbacks: C, options: RegenOptions) -> Self {
        Self {
            arena,
            callbacks,
            options,
        }
    }

    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    pub fn regenerate(&mut self, root: NodeId) -> String {
        let mut buf = String::new();
        self.emit_node(root, &mut buf);
        buf
    }

    fn emit_node(&mut self, id: NodeId, buf: &mut String) {
        let kind = self.arena.kind(id);
        match kind {
            NodeKind::Program => {
                if let Some(list) = self.arena.get(id).left() {
                    self.emit_stmt_list(list, buf, ";\n");
                }
            }
            NodeKind::StmtList => self.emit_stmt_list(id, buf, ";\n"),
            NodeKind::IntLeaf | NodeKind::NumLit | NodeKind::StrLit | NodeKind::QuotedId => {
                self.emit_leaf(id, buf)
            }
            NodeKind::Let => {
                let name = self.arena.get(id).left().unwrap();
                let value = self.arena.get(id).right().unwrap();
                buf.push_str("LET ");
                self.emit_node(name, buf);
                buf.push_str(" := ");
                self.emit_expr(value, 0, buf);
            }
            NodeKind::Set => {
                let name = self.arena.get(id).left().unwrap();
                let value = self.arena.get(id).right().unwrap();
                buf.push_str("SET ");
                self.emit_node(name, buf);
                buf.push_str(" := ");
                self.emit_expr(value, 0, buf);
            }
            NodeKind::Declare => {
                let name = self.arena.get(id).left().unwrap();
                buf.push_str("DECLARE ");
                self.emit_node(name, buf);
            }
            NodeKind::If => {
                let cond = self.arena.get(id).left().unwrap();
                buf.push_str("IF ");
                self.emit_expr(cond, 0, buf);
                buf.push_str(" THEN\n");
                if let Some(then_node) = self.arena.get(id).right() {
                    if let Some(then_body) = self.arena.get(then_node).left() {
                        self.emit_stmt_list(then_body, buf, ";\n");
                    }
                }
                buf.push_str("END IF");
            }
            NodeKind::While => {
                let cond = self.arena.get(id).left().unwrap();
                buf.push_str("WHILE ");
                self.emit_expr(cond, 0, buf);
                buf.push_str(" BEGIN\n");
                if let Some(body) = self.arena.get(id).right() {
                    self.emit_stmt_list(body, buf, ";\n");
                }
                buf.push_str("END");
            }
            NodeKind::Return => buf.push_str("RETURN"),
            NodeKind::RollbackReturn => buf.push_str("ROLLBACK RETURN"),
            NodeKind::CommitReturn => buf.push_str("COMMIT RETURN"),
            NodeKind::Throw => buf.push_str("THROW"),
            NodeKind::Leave => buf.push_str("LEAVE"),
            NodeKind::Continue => buf.push_str("CONTINUE"),
            NodeKind::Call => {
                let name = self.arena.get(id).left().unwrap();
                buf.push_str("CALL ");
                self.emit_node(name, buf);
                buf.push('(');
                if let Some(args) = self.arena.get(id).right() {
                    self.emit_arg_list(args, buf);
                }
                buf.push(')');
            }
            NodeKind::Select => {
                if let Some(inner) = self.arena.get(id).left() {
                    self.emit_node(inner, buf);
                }
            }
            NodeKind::With => {
                let cte_list = self.arena.get(id).left().unwrap();
                let core = self.arena.get(id).right().unwrap();
                buf.push_str("WITH ");
                self.emit_cte_list(cte_list, buf);
                buf.push(' ');
                self.emit_node(core, buf);
            }
            NodeKind::SelectCore => self.emit_select_core(id, buf),
            NodeKind::CreateTable => self.emit_create_table(id, buf),
            NodeKind::CreateProc => self.emit_create_proc(id, buf),
            NodeKind::Insert => self.emit_insert(id, buf),
            NodeKind::Update => self.emit_update(id, buf),
            NodeKind::Delete => self.emit_delete(id, buf),
            NodeKind::DeclareCursor => {
                let name = self.arena.get(id).left().unwrap();
                buf.push_str("DECLARE ");
                self.emit_node(name, buf);
                buf.push_str(" CURSOR FOR ");
                if let Some(select) = self.arena.get(id).right() {
                    self.emit_node(select, buf);
                }
            }
            NodeKind::Fetch => {
                let name = self.arena.get(id).left().unwrap();
                buf.push_str("FETCH ");
                self.emit_node(name, buf);
            }
            NodeKind::CloseCursor => {
                let name = self.arena.get(id).left().unwrap();
                buf.push_str("CLOSE ");
                self.emit_node(name, buf);
            }
            NodeKind::Try => {
                buf.push_str("BEGIN TRY\n");
                if let Some(inner) = self.arena.get(id).left() {
                    if let Some(body) = self.arena.get(inner).left() {
                        self.emit_stmt_list(body, buf, ";\n");
                    }
                }
                buf.push_str("END TRY");
                if let Some(catch) = self.arena.get(id).right() {
                    buf.push_str(";\nBEGIN CATCH\n");
                    if let Some(body) = self.arena.get(catch).left() {
                        self.emit_stmt_list(body, buf, ";\n");
                    }
                    buf.push_str("END CATCH");
                }
            }
            _ => self.emit_expr(id, 0, buf),
        }
    }

    fn emit_stmt_list(&mut self, mut list: NodeId, buf: &mut String, sep: &str) {
        let mut first = true;
        loop {
            let Some(item) = self.arena.get(list).left() else {
                break;
            };
            if !first {
                buf.push_str(sep);
            }
            first = false;
            self.emit_node(item, buf);
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_arg_list(&mut self, mut list: NodeId, buf: &mut String) {
        let mut first = true;
        loop {
            let Some(item) = self.arena.get(list).left() else {
                break;
            };
            if !first {
                buf.push_str(", ");
            }
            first = false;
            self.emit_expr(item, 0, buf);
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_cte_list(&mut self, mut list: NodeId, buf: &mut String) {
        let mut first = true;
        loop {
            let Some(cte) = self.arena.get(list).left() else {
                break;
            };
            if self.callbacks.cte_suppress(self.arena, cte) {
                match self.arena.get(list).right() {
                    Some(next) => {
                        list = next;
                        continue;
                    }
                    None => break,
                }
            }
            if !first {
                buf.push_str(", ");
            }
            first = false;
            let name = self.arena.get(cte).left().unwrap();
            self.emit_node(name, buf);
            buf.push_str(" AS (");
            if !self.callbacks.cte_proc(self.arena, cte, buf) {
                if let Some(body) = self.arena.get(cte).right() {
                    self.emit_node(body, buf);
                }
            }
            buf.push(')');
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_select_core(&mut self, id: NodeId, buf: &mut String) {
        let projection = self.arena.get(id).left();
        let from_where = self.arena.get(id).right();
        buf.push_str("SELECT ");
        if let Some(p) = projection {
            self.emit_projection_list(p, buf);
        }
        if let Some(fw) = from_where {
            if let Some(from) = self.arena.get(fw).left() {
                buf.push_str(" FROM ");
                if !self.callbacks.table_rename(self.arena, from, buf) {
                    if let Some(name) = self.arena.get(from).left() {
                        self.emit_node(name, buf);
                    }
                }
            }
            if let Some(whr) = self.arena.get(fw).right() {
                buf.push_str(" WHERE ");
                if let Some(cond) = self.arena.get(whr).left() {
                    self.emit_expr(cond, 0, buf);
                }
            }
        }
    }

    fn emit_projection_list(&mut self, mut list: NodeId, buf: &mut String) {
        let mut first = true;
        loop {
            let Some(item) = self.arena.get(list).left() else {
                break;
            };
            if !first {
                buf.push_str(", ");
            }
            first = false;
            if self.arena.kind(item) == NodeKind::StarExpr {
                if !self.callbacks.star(self.arena, item, buf) {
                    buf.push('*');
                }
            } else {
                let expr = self.arena.get(item).left().unwrap();
                self.emit_expr(expr, 0, buf);
                if let Some(alias) = self.arena.get(item).right() {
                    if !self.options.minify_aliases {
                        buf.push_str(" AS ");
                        self.emit_node(alias, buf);
                    }
                }
            }
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_create_table(&mut self, id: NodeId, buf: &mut String) {
        let name = self.arena.get(id).left().unwrap();
        buf.push_str("CREATE TABLE ");
        self.emit_node(name, buf);
        buf.push_str(" (");
        if let Some(body) = self.arena.get(id).right() {
            if let Some(cols) = self.arena.get(body).left() {
                self.emit_col_list(cols, buf);
            }
        }
        buf.push(')');
    }

    fn emit_col_list(&mut self, mut list: NodeId, buf: &mut String) {
        let mut first = true;
        loop {
            let Some(item) = self.arena.get(list).left() else {
                break;
            };
            if !first {
                buf.push_str(", ");
            }
            first = false;
            let name = self.arena.get(item).left().unwrap();
            self.emit_node(name, buf);
            buf.push(' ');
            if let Some(type_node) = self.arena.get(item).right() {
                if let Some(type_leaf) = self.arena.get(type_node).left() {
                    self.emit_node(type_leaf, buf);
                }
            }
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_create_proc(&mut self, id: NodeId, buf: &mut String) {
        let name = self.arena.get(id).left().unwrap();
        buf.push_str("CREATE PROC ");
        self.emit_node(name, buf);
        buf.push('(');
        if let Some(sig) = self.arena.get(id).right() {
            if let Some(params) = self.arena.get(sig).left() {
                self.emit_col_list(params, buf);
            }
            buf.push_str(") BEGIN\n");
            if let Some(body) = self.arena.get(sig).right() {
                self.emit_stmt_list(body, buf, ";\n");
            }
        } else {
            buf.push_str(") BEGIN\n");
        }
        buf.push_str("\nEND");
    }

    fn emit_insert(&mut self, id: NodeId, buf: &mut String) {
        let table = self.arena.get(id).left().unwrap();
        buf.push_str("INSERT INTO ");
        self.emit_node(table, buf);
        if let Some(values_node) = self.arena.get(id).right() {
            if let Some(cols) = self.arena.get(values_node).left() {
                buf.push('(');
                self.emit_col_list_names(cols, buf);
                buf.push(')');
            }
            buf.push_str(" VALUES (");
            if let Some(values) = self.arena.get(values_node).right() {
                self.emit_arg_list(values, buf);
            }
            buf.push(')');
        }
    }

    fn emit_col_list_names(&mut self, mut list: NodeId, buf: &mut String) {
        let mut first = true;
        loop {
            let Some(item) = self.arena.get(list).left() else {
                break;
            };
            if !first {
                buf.push_str(", ");
            }
            first = false;
            self.emit_node(item, buf);
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_update(&mut self, id: NodeId, buf: &mut String) {
        let table = self.arena.get(id).left().unwrap();
        buf.push_str("UPDATE ");
        self.emit_node(table, buf);
        buf.push_str(" SET ");
        if let Some(body) = self.arena.get(id).right() {
            if let Some(sets) = self.arena.get(body).left() {
                self.emit_set_list(sets, buf);
            }
            if let Some(whr) = self.arena.get(body).right() {
                buf.push_str(" WHERE ");
                if let Some(cond) = self.arena.get(whr).left() {
                    self.emit_expr(cond, 0, buf);
                }
            }
        }
    }

    fn emit_set_list(&mut self, mut list: NodeId, buf: &mut String) {
        let mut first = true;
        loop {
            let Some(item) = self.arena.get(list).left() else {
                break;
            };
            if !first {
                buf.push_str(", ");
            }
            first = false;
            let col = self.arena.get(item).left().unwrap();
            self.emit_node(col, buf);
            buf.push_str(" = ");
            if let Some(value) = self.arena.get(item).right() {
                self.emit_expr(value, 0, buf);
            }
            match self.arena.get(list).right() {
                Some(next) => list = next,
                None => break,
            }
        }
    }

    fn emit_delete(&mut self, id: NodeId, buf: &mut String) {
        let table = self.arena.get(id).left().unwrap();
        buf.push_str("DELETE FROM ");
        self.emit_node(table, buf);
        if let Some(whr) = self.arena.get(id).right() {
            buf.push_str(" WHERE ");
            if let Some(cond) = self.arena.get(whr).left() {
                self.emit_expr(cond, 0, buf);
            }
        }
    }

    fn emit_leaf(&mut self, id: NodeId, buf: &mut String) {
        match self.arena.get(id).leaf() {
            Some(Leaf::Int(v)) => buf.push_str(&v.to_string()),
            Some(Leaf::Num { text, .. }) => buf.push_str(self.arena.text(*text)),
            Some(Leaf::Str { tag, text }) => {
                let s = self.arena.text(*text);
                match tag {
                    StrTag::SqlLiteral => {
                        if s.eq_ignore_ascii_case("NULL") {
                            buf.push_str("NULL");
                        } else {
                            buf.push('\'');
                            buf.push_str(&s.replace('\'', "''"));
                            buf.push('\'');
                        }
                    }
                    StrTag::CLiteral => {
                        buf.push('\'');
                        buf.push_str(&s.replace('\'', "''"));
                        buf.push('\'');
                    }
                    StrTag::Identifier | StrTag::QuotedId => buf.push_str(s),
                }
            }
            Some(Leaf::Qid(q)) => buf.push_str(self.arena.text(q.mangled)),
            None => {}
        }
    }

    /// Emit an expression subtree, parenthesizing when `child_priority <
    /// parent_priority` or on an equal-priority right operand (§4.5).
    fn emit_expr(&mut self, id: NodeId, parent_priority: u8, buf: &mut String) {
        let kind = self.arena.kind(id);
        let my_priority = self.node_priority(id, kind);
        let needs_parens = my_priority < parent_priority;
        if needs_parens {
            buf.push('(');
        }
        match kind {
            NodeKind::IntLeaf | NodeKind::NumLit | NodeKind::StrLit | NodeKind::QuotedId => {
                self.emit_leaf(id, buf)
            }
            NodeKind::VariableRefExpr => {
                if !self.callbacks.variable(self.arena, id, buf) {
                    let name = self.arena.get(id).left().unwrap();
                    self.emit_node(name, buf);
                }
            }
            NodeKind::ColumnRefExpr => {
                let name = self.arena.get(id).left().unwrap();
                self.emit_node(name, buf);
            }
            NodeKind::BinaryExpr => {
                let lhs = self.arena.get(id).left().unwrap();
                let pair = self.arena.get(id).right().unwrap();
                let op = self.arena.get(pair).left().unwrap();
                let rhs = self.arena.get(pair).right().unwrap();
                self.emit_expr(lhs, my_priority, buf);
                buf.push(' ');
                self.emit_node(op, buf);
                buf.push(' ');
                self.emit_expr(rhs, my_priority + 1, buf);
            }
            NodeKind::UnaryExpr => {
                let op = self.arena.get(id).left().unwrap();
                let operand = self.arena.get(id).right().unwrap();
                self.emit_node(op, buf);
                buf.push(' ');
                self.emit_expr(operand, priority::UNARY_PRIORITY, buf);
            }
            NodeKind::BetweenRewrite => {
                let lhs = self.arena.get(id).left().unwrap();
                let bounds = self.arena.get(id).right().unwrap();
                let low = self.arena.get(bounds).left().unwrap();
                let high = self.arena.get(bounds).right().unwrap();
                self.emit_expr(lhs, 4, buf);
                buf.push_str(" BETWEEN ");
                self.emit_expr(low, 4, buf);
                buf.push_str(" AND ");
                self.emit_expr(high, 4, buf);
            }
            NodeKind::IsNullExpr => {
                let lhs = self.arena.get(id).left().unwrap();
                let negated = matches!(
                    self.arena.get(self.arena.get(id).right().unwrap()).leaf(),
                    Some(Leaf::Int(1))
                );
                self.emit_expr(lhs, 3, buf);
                buf.push_str(if negated { " IS NOT NULL" } else { " IS NULL" });
            }
            NodeKind::CastExpr => {
                let value = self.arena.get(id).left().unwrap();
                let type_leaf = self.arena.get(id).right().unwrap();
                if self.options.minify_casts {
                    self.emit_expr(value, parent_priority, buf);
                } else {
                    buf.push_str("CAST(");
                    self.emit_expr(value, 0, buf);
                    buf.push_str(" AS ");
                    self.emit_node(type_leaf, buf);
                    buf.push(')');
                }
            }
            NodeKind::AttestNotNull => {
                let inner = self.arena.get(id).left().unwrap();
                buf.push_str("ATTEST_NOTNULL(");
                self.emit_expr(inner, 0, buf);
                buf.push(')');
            }
            NodeKind::FuncCallExpr => {
                if !self.callbacks.func_call(self.arena, id, buf) {
                    let name = self.arena.get(id).left().unwrap();
                    self.emit_node(name, buf);
                    buf.push('(');
                    if let Some(args) = self.arena.get(id).right() {
                        self.emit_arg_list(args, buf);
                    }
                    buf.push(')');
                }
            }
            NodeKind::StarExpr => {
                if !self.callbacks.star(self.arena, id, buf) {
                    buf.push('*');
                }
            }
            NodeKind::ArgumentsRefExpr => {
                let field = self.arena.get(id).left().unwrap();
                buf.push_str("ARGUMENTS.");
                self.emit_node(field, buf);
            }
            NodeKind::MacroRef | NodeKind::MacroArgRef => {
                let name = self.arena.get(id).left().unwrap();
                self.emit_node(name, buf);
                buf.push('(');
                if let Some(args) = self.arena.get(id).right() {
                    self.emit_arg_list(args, buf);
                }
                buf.push(')');
            }
            _ => self.emit_node(id, buf),
        }
        if needs_parens {
            buf.push(')');
        }
    }

    fn node_priority(&self, id: NodeId, kind: NodeKind) -> u8 {
        match kind {
            NodeKind::BinaryExpr => {
                if let Some(pair) = self.arena.get(id).right() {
                    if let Some(op) = self.arena.get(pair).left() {
                        if let Some(Leaf::Str { text, .. }) = self.arena.get(op).leaf() {
                            return priority::binop_priority(self.arena.text(*text));
                        }
                    }
                }
                0
            }
            NodeKind::UnaryExpr => priority::UNARY_PRIORITY,
            _ => priority::ATOM_PRIORITY,
        }
    }
}

/// Convenience entry point used by the macro preprocessor's `@TEXT`/`@ID`
/// builtins: render `node`'s generated source text in echo mode,
/// unquoted (string literals lose their surrounding quotes, matching
/// "unquoted first" in §4.3).
pub fn echo_text(arena: &Arena, node: NodeId) -> String {
    let kind = arena.kind(node);
    if kind == NodeKind::StrLit {
        if let Some(Leaf::Str { text, .. }) = arena.get(node).leaf() {
            return arena.text(*text).to_owned();
        }
    }
    let mut regen = Regenerator::new(arena, EchoCallbacks, RegenOptions::default());
    regen.emit_expr_pub(node)
}

impl<'a> Regenerator<'a, EchoCallbacks> {
    fn emit_expr_pub(&mut self, id: NodeId) -> String {
        let mut buf = String::new();
        self.emit_expr(id, 0, &mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn regen(src: &str) -> String {
        let mut arena = Arena::new();
        let root = parse(src, "t.sql", &mut arena).unwrap();
        let mut r = Regenerator::new(&arena, EchoCallbacks, RegenOptions::default());
        r.regenerate(root)
    }

    #[test]
    fn regenerates_select_with_where() {
        let out = regen("SELECT a, b FROM t WHERE a = 1;");
        assert_eq!(out, "SELECT a, b FROM t WHERE a = 1");
    }

    #[test]
    fn binary_expr_respects_precedence_parens() {
        let out = regen("LET y := (1 + 2) * 3;");
        assert_eq!(out, "LET y := (1 + 2) * 3");
    }

    #[test]
    fn no_spurious_parens_when_precedence_allows() {
        let out = regen("LET y := 1 + 2 * 3;");
        assert_eq!(out, "LET y := 1 + 2 * 3");
    }

    #[test]
    fn star_projection_defaults_to_literal_star() {
        let out = regen("SELECT * FROM t;");
        assert_eq!(out, "SELECT * FROM t");
    }

    #[test]
    fn minify_aliases_drops_as_clause() {
        let mut arena = Arena::new();
        let root = parse("SELECT a AS x FROM t;", "t.sql", &mut arena).unwrap();
        let opts = RegenOptions {
            minify_aliases: true,
            ..Default::default()
        };
        let mut r = Regenerator::new(&arena, EchoCallbacks, opts);
        assert_eq!(r.regenerate(root), "SELECT a FROM t");
    }

    #[test]
    fn echo_text_unquotes_sql_string_literal() {
        let mut arena = Arena::new();
        let file = arena.file("t.sql");
        let leaf = arena.new_str_leaf(StrTag::SqlLiteral, "hi ", file, 1);
        assert_eq!(echo_text(&arena, leaf), "hi ");
    }
}
