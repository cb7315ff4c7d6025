//! The expansion walker itself (§4.3's seven-step algorithm).

use super::{builtins, MacroKind};
use crate::regen;
use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind, StrTag};
use sqlpl_core::Diagnostics;
use std::collections::{HashMap, HashSet};

#[derive(Clone)]
struct MacroDefInfo {
    kind: MacroKind,
    formals: Vec<(String, MacroKind)>,
    body: NodeId,
}

/// One level of the expansion stack (§4.3 step 5): the macro being
/// expanded, its call site (for `@MACRO_LINE`/`@MACRO_FILE` and error
/// traces), and the formal→argument bindings visible while its cloned
/// body is walked.
struct Frame {
    macro_name: String,
    call_file: String,
    call_line: u32,
    bindings: HashMap<String, (MacroKind, NodeId)>,
}

pub struct MacroExpander<'d> {
    defines: &'d HashSet<String>,
    registry: HashMap<String, MacroDefInfo>,
    frames: Vec<Frame>,
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn leaf_text<'x>(arena: &'x Arena, id: NodeId) -> &'x str {
    match arena.get(id).leaf() {
        Some(Leaf::Str { text, .. }) => arena.text(*text),
        _ => panic!("expected a string/identifier leaf at {:?}", id),
    }
}

/// Walk a right-spine cons list, returning each item's value (the
/// `left` of each cons cell) — never the cons cells themselves.
fn collect_list_items(arena: &Arena, list: Option<NodeId>) -> Vec<NodeId> {
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

impl<'d> MacroExpander<'d> {
    pub fn new(defines: &'d HashSet<String>) -> Self {
        Self {
            defines,
            registry: HashMap::new(),
            frames: Vec::new(),
        }
    }

    pub fn run(&mut self, arena: &mut Arena, root: NodeId, diagnostics: &mut Diagnostics) {
        self.expand_node(arena, root, diagnostics);
    }

    fn expand_node(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        match arena.kind(id) {
            NodeKind::MacroDef => self.register_macro_def(arena, id, diag),
            NodeKind::MacroRef => self.expand_macro_ref(arena, id, diag),
            NodeKind::IfDefBlock => self.expand_ifdef(arena, id, diag),
            NodeKind::TextBuiltin => self.expand_text_builtin(arena, id, diag),
            NodeKind::IdBuiltin => self.expand_id_builtin(arena, id, diag),
            NodeKind::MacroLineBuiltin => self.expand_macro_line(arena, id, diag),
            NodeKind::MacroFileBuiltin => self.expand_macro_file(arena, id, diag),
            _ => {
                if let Some(l) = arena.get(id).left() {
                    self.expand_node(arena, l, diag);
                }
                if let Some(r) = arena.get(id).right() {
                    self.expand_node(arena, r, diag);
                }
            }
        }
    }

    fn register_macro_def(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let file_str = arena.text(arena.get(id).file).to_owned();
        let line = arena.get(id).line;
        let header = arena.get(id).left().expect("macro def has a header");
        let sig = arena.get(id).right().expect("macro def has a signature");
        let kind_leaf = arena.get(header).left().expect("macro def header has a kind");
        let name_leaf = arena.get(header).right().expect("macro def header has a name");
        let kind_text = leaf_text(arena, kind_leaf).to_owned();
        let name = leaf_text(arena, name_leaf).to_owned();

        let Some(kind) = MacroKind::from_name(&kind_text) else {
            self.emit_error(diag, &file_str, line, format!("unknown macro kind '{}'", kind_text), Some(name));
            self.splice_list(arena, id, None);
            return;
        };

        let formal_list = arena.get(sig).left();
        let body = arena.get(sig).right().expect("macro def has a body");
        let mut formals = Vec::new();
        for formal_node in collect_list_items(arena, formal_list) {
            let fname_leaf = arena.get(formal_node).left().expect("macro formal has a name");
            let fkind_leaf = arena.get(formal_node).right().expect("macro formal has a kind");
            let fname = leaf_text(arena, fname_leaf).to_owned();
            let fkind_text = leaf_text(arena, fkind_leaf).to_owned();
            let fkind = MacroKind::from_name(&fkind_text).unwrap_or(MacroKind::Expr);
            formals.push((fname, fkind));
        }

        self.registry.insert(
            normalize(&name),
            MacroDefInfo {
                kind,
                formals,
                body,
            },
        );
        // A macro def has no runtime representation; drop it from its
        // enclosing statement list now that it's registered.
        self.splice_list(arena, id, None);
    }

    fn expand_macro_ref(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let file_str = arena.text(arena.get(id).file).to_owned();
        let line = arena.get(id).line;
        let name_leaf = arena.get(id).left().expect("macro ref has a name");
        let name = leaf_text(arena, name_leaf).to_owned();
        let arg_list = arena.get(id).right();
        let args = collect_list_items(arena, arg_list);

        // Step 1: expand argument subtrees first, in the *caller's*
        // frame (so a formal reference passed through as an argument
        // still resolves against the enclosing macro, not the callee).
        for &a in &args {
            self.expand_node(arena, a, diag);
        }

        // Step 2: is this a reference to a formal of the macro whose
        // body we're currently walking?
        if let Some(frame) = self.frames.last() {
            if let Some(&(fkind, bound)) = frame.bindings.get(&normalize(&name)) {
                let clone = arena.clone_subtree(bound);
                if fkind.is_list_kind() {
                    self.splice_list(arena, id, Some(clone));
                } else {
                    arena.replace(id, Some(clone));
                }
                return;
            }
        }

        // Step 3: macro-definition lookup.
        let Some(def) = self.registry.get(&normalize(&name)).cloned() else {
            self.emit_error(
                diag,
                &file_str,
                line,
                format!("reference to undefined macro '{}'", name),
                Some(name),
            );
            return;
        };

        // Step 4: arity validation (per-argument grammatical-kind
        // validation is not tracked post-parse; a kind mismatch instead
        // surfaces as a semantic error once the substituted subtree is
        // analyzed in a position its kind doesn't fit).
        if args.len() != def.formals.len() {
            self.emit_error(
                diag,
                &file_str,
                line,
                format!(
                    "macro '{}' expects {} argument(s), found {}",
                    name,
                    def.formals.len(),
                    args.len()
                ),
                Some(name),
            );
            return;
        }

        // Step 5: clone the body (macros may expand more than once; the
        // clone never shares nodes with the definition) and push a frame.
        let body_clone = arena.clone_subtree(def.body);
        let mut bindings = HashMap::new();
        for ((fname, fkind), &arg) in def.formals.iter().zip(args.iter()) {
            bindings.insert(normalize(fname), (*fkind, arg));
        }
        self.frames.push(Frame {
            macro_name: name,
            call_file: file_str,
            call_line: line,
            bindings,
        });

        // Step 6: recursively expand the clone.
        self.expand_node(arena, body_clone, diag);

        self.frames.pop();

        // Step 7: splice into the position of the original ref.
        if def.kind.is_list_kind() {
            self.splice_list(arena, id, Some(body_clone));
        } else {
            arena.replace(id, Some(body_clone));
        }
    }

    fn expand_ifdef(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let name_leaf = arena.get(id).left().expect("ifdef has a name");
        let name = leaf_text(arena, name_leaf).to_owned();
        let branches = arena.get(id).right().expect("ifdef has branches");
        let then_body = arena.get(branches).left();
        let else_body = arena.get(branches).right();
        let selected = if self.defines.contains(&name) { then_body } else { else_body };
        if let Some(b) = selected {
            self.expand_node(arena, b, diag);
        }
        self.splice_list(arena, id, selected);
    }

    fn expand_text_builtin(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let args = collect_list_items(arena, arena.get(id).left());
        for &a in &args {
            self.expand_node(arena, a, diag);
        }
        let file_id = arena.get(id).file;
        let line = arena.get(id).line;
        let replacement = builtins::text_builtin(arena, &args, file_id, line);
        arena.replace(id, Some(replacement));
    }

    fn expand_id_builtin(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let args = collect_list_items(arena, arena.get(id).left());
        for &a in &args {
            self.expand_node(arena, a, diag);
        }
        let file_id = arena.get(id).file;
        let line = arena.get(id).line;
        let file_str = arena.text(file_id).to_owned();
        match builtins::id_builtin(arena, &args, file_id, line) {
            Ok(replacement) => {
                arena.replace(id, Some(replacement));
            }
            Err(msg) => self.emit_error(diag, &file_str, line, msg, None),
        }
    }

    fn expand_macro_line(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let file_id = arena.get(id).file;
        let line = arena.get(id).line;
        match self.frames.first() {
            Some(frame) => {
                let replacement = arena.new_int_leaf(frame.call_line as i32, file_id, line);
                arena.replace(id, Some(replacement));
            }
            None => {
                let file_str = arena.text(file_id).to_owned();
                self.emit_error(diag, &file_str, line, "@MACRO_LINE used outside any macro expansion".into(), None);
            }
        }
    }

    fn expand_macro_file(&mut self, arena: &mut Arena, id: NodeId, diag: &mut Diagnostics) {
        let file_id = arena.get(id).file;
        let line = arena.get(id).line;
        match self.frames.first().map(|f| f.call_file.clone()) {
            Some(call_file) => {
                let replacement = arena.new_str_leaf(StrTag::SqlLiteral, &call_file, file_id, line);
                arena.replace(id, Some(replacement));
            }
            None => {
                let file_str = arena.text(file_id).to_owned();
                self.emit_error(diag, &file_str, line, "@MACRO_FILE used outside any macro expansion".into(), None);
            }
        }
    }

    /// List-splice (§4.3 step 7): `node_id` occupies the `left` slot of
    /// some cons cell (`outer`). Rewire three pointers so `replacement`
    /// (itself a cons chain, or `None` for an empty expansion) replaces
    /// `node_id` in the surrounding list without nesting a new cons level.
    fn splice_list(&self, arena: &mut Arena, node_id: NodeId, replacement: Option<NodeId>) {
        let outer = arena
            .parent(node_id)
            .expect("list-spliced node must sit in a list position");
        debug_assert_eq!(arena.get(outer).left(), Some(node_id));
        let original_rest = arena.get(outer).right();
        match replacement {
            None => {
                arena.replace(outer, original_rest);
            }
            Some(head) => {
                let mut tail = head;
                while let Some(next) = arena.get(tail).right() {
                    tail = next;
                }
                arena.set_right(tail, original_rest);
                let head_left = arena.get(head).left();
                let head_right = arena.get(head).right();
                arena.set_left(outer, head_left);
                arena.set_right(outer, head_right);
            }
        }
    }

    fn emit_error(&self, diag: &mut Diagnostics, file: &str, line: u32, msg: String, subject: Option<String>) {
        let mut builder = diag.error(file.to_owned(), line, msg).ast_kind("macro_ref");
        if let Some(s) = subject {
            builder = builder.subject(s);
        }
        // Outermost last: frames[0] is outermost, so walk innermost-first.
        for frame in self.frames.iter().rev() {
            builder = builder.macro_frame(frame.macro_name.clone(), frame.call_file.clone(), frame.call_line);
        }
        builder.emit();
    }
}

// `regen` is only reachable through `builtins::{text,id}_builtin`; this
// re-export keeps the dependency visible at the module boundary.
#[allow(unused_imports)]
use regen as _regen_dep;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::regen::{EchoCallbacks, RegenOptions, Regenerator};

    fn expand(src: &str, defines: &[&str]) -> (Arena, NodeId, Diagnostics) {
        let mut arena = Arena::new();
        let root = parse(src, "t.sql", &mut arena).unwrap();
        let define_set: HashSet<String> = defines.iter().map(|s| s.to_string()).collect();
        let mut diag = Diagnostics::new();
        let mut expander = MacroExpander::new(&define_set);
        expander.run(&mut arena, root, &mut diag);
        (arena, root, diag)
    }

    fn regen_str(arena: &Arena, root: NodeId) -> String {
        let mut r = Regenerator::new(arena, EchoCallbacks, RegenOptions::default());
        r.regenerate(root)
    }

    #[test]
    fn expands_expr_macro_scalar_splice() {
        let (arena, root, diag) = expand("@MACRO(expr) inc!(e! expr) BEGIN e! + 1 END; SELECT inc!(5);", &[]);
        assert!(diag.is_empty());
        assert_eq!(regen_str(&arena, root), "SELECT 5 + 1");
    }

    #[test]
    fn expansion_on_macro_free_tree_is_a_no_op() {
        let (arena, root, diag) = expand("SELECT a FROM t WHERE a = 1;", &[]);
        assert!(diag.is_empty());
        assert_eq!(regen_str(&arena, root), "SELECT a FROM t WHERE a = 1");
    }

    #[test]
    fn undefined_macro_reference_is_an_error() {
        let (_arena, _root, diag) = expand("SELECT missing!(1);", &[]);
        assert!(diag.has_errors());
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn arity_mismatch_is_an_error_and_other_statements_still_analyzable() {
        let (_arena, _root, diag) =
            expand("@MACRO(expr) inc!(e! expr) BEGIN e! + 1 END; SELECT inc!(1, 2);", &[]);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn ifdef_selects_then_branch_when_defined() {
        let (arena, root, diag) = expand("@IFDEF FEATURE_X LET y := 1; @ELSE LET y := 2; @ENDIF;", &["FEATURE_X"]);
        assert!(diag.is_empty());
        assert_eq!(regen_str(&arena, root), "LET y := 1");
    }

    #[test]
    fn ifdef_selects_else_branch_when_undefined() {
        let (arena, root, diag) = expand("@IFDEF FEATURE_X LET y := 1; @ELSE LET y := 2; @ENDIF;", &[]);
        assert!(diag.is_empty());
        assert_eq!(regen_str(&arena, root), "LET y := 2");
    }

    #[test]
    fn stmt_list_macro_splices_without_nesting() {
        let (arena, root, diag) = expand(
            "@MACRO(stmt_list) twice!(s! stmt_list) BEGIN LET a := 1; LET b := 2; END; twice!(); LET c := 3;",
            &[],
        );
        assert!(diag.is_empty());
        let stmts = arena.get(root).left().unwrap();
        let first = arena.get(stmts).left().unwrap();
        assert_eq!(arena.kind(first), NodeKind::Let);
        assert_eq!(regen_str(&arena, root), "LET a := 1;\nLET b := 2;\nLET c := 3");
    }

    #[test]
    fn macro_errors_do_not_abort_sibling_analysis() {
        let (_arena, _root, diag) = expand("SELECT missing!(1); SELECT another_missing!(2);", &[]);
        assert_eq!(diag.error_count(), 2);
    }
}
