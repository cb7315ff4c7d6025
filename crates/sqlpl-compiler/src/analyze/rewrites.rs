//! Surface-to-simpler-form rewrites (§4.4.5). `between` is desugared by
//! the grammar itself (`BetweenRewrite`, §3's parser) since its shape is
//! purely syntactic; the rewrites here need semantic information (the
//! join scope, the current flow context) and so happen during analysis.

use super::flow::FlowStack;
use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind, StrTag};
use sqlpl_core::sem::JoinInfo;
use sqlpl_core::Interner;

/// `ARGUMENTS.x` canonicalizes to the argument's fully-qualified name
/// inside the enclosing procedure's argument bundle (§4.4.5). The
/// canonical form reuses the parser's `ColumnRefExpr` shape so later
/// passes don't need a special case.
pub fn canonicalize_arguments_ref(arena: &mut Arena, node: NodeId, proc_name: &str) {
    if arena.kind(node) != NodeKind::ArgumentsRefExpr {
        return;
    }
    let field_leaf = arena.get(node).left().expect("ARGUMENTS ref has a field name");
    let field = match arena.get(field_leaf).leaf() {
        Some(Leaf::Str { text, .. }) => arena.text(*text).to_owned(),
        _ => return,
    };
    let line = arena.get(node).line;
    let file = arena.get(node).file;
    let qualified = format!("{}.arguments.{}", proc_name, field);
    let leaf = arena.arena_str_leaf(&qualified, file, line);
    let replacement = arena.new_node(NodeKind::ColumnRefExpr, Some(leaf), None, file, line);
    arena.replace(node, Some(replacement));
}

/// Wrap an improved nullable reference in `cql_inferred_notnull` (§4.4.5)
/// so downstream passes see a not-null value without re-deriving the
/// improvement. A no-op if `var_node` is already wrapped.
pub fn wrap_notnull_if_improved(arena: &mut Arena, var_node: NodeId, flow: &FlowStack) -> NodeId {
    let name_leaf = match arena.get(var_node).left() {
        Some(n) => n,
        None => return var_node,
    };
    let Some(Leaf::Str { text, .. }) = arena.get(name_leaf).leaf() else {
        return var_node;
    };
    let name = arena.text(*text).to_owned();
    if !flow.is_improved(&name) {
        return var_node;
    }
    let file = arena.get(var_node).file;
    let line = arena.get(var_node).line;
    arena.new_node(NodeKind::InferredNotNullWrap, Some(var_node), None, file, line)
}

/// Expand `select *` / `select T.*` into the explicit column list the
/// join scope resolves to (§4.4.5). Mutates the projection list in
/// place via the same list-splice mechanics macro expansion uses.
pub fn expand_star(arena: &mut Arena, star_node: NodeId, scope: &JoinInfo, strings: &Interner) {
    let expanded: Vec<NodeId> = match arena.kind(star_node) {
        NodeKind::StarExpr => scope
            .members
            .iter()
            .flat_map(|m| m.struct_info.names.iter())
            .map(|&name_sym| make_column_ref(arena, strings.resolve(name_sym), star_node))
            .collect(),
        NodeKind::TableStarExpr => {
            let alias_leaf = arena.get(star_node).left().expect("table-star has an alias");
            let alias = match arena.get(alias_leaf).leaf() {
                Some(Leaf::Str { text, .. }) => arena.text(*text).to_owned(),
                _ => return,
            };
            let Some(member) = scope.find(&alias, strings) else { return };
            member
                .struct_info
                .names
                .iter()
                .map(|&name_sym| make_column_ref(arena, &format!("{}.{}", alias, strings.resolve(name_sym)), star_node))
                .collect()
        }
        _ => return,
    };

    let Some(parent) = arena.parent(star_node) else { return };
    let mut items = expanded.into_iter();
    let Some(first) = items.next() else {
        arena.replace(star_node, None);
        return;
    };
    arena.replace(star_node, Some(first));
    let mut tail = first;
    for item in items {
        let file = arena.get(parent).file;
        let line = arena.get(parent).line;
        let cons = arena.new_node(NodeKind::ProjectionList, Some(item), None, file, line);
        arena.set_right(tail, Some(cons));
        tail = cons;
    }
}

fn make_column_ref(arena: &mut Arena, name: &str, template: NodeId) -> NodeId {
    let file = arena.get(template).file;
    let line = arena.get(template).line;
    let leaf = arena.arena_str_leaf(name, file, line);
    arena.new_node(NodeKind::ColumnRefExpr, Some(leaf), None, file, line)
}

/// Thin helper trait so rewrite code can build a plain identifier leaf
/// without importing `StrTag` at every call site.
trait StrLeafExt {
    fn arena_str_leaf(&mut self, text: &str, file: sqlpl_core::arena::FileId, line: u32) -> NodeId;
}

impl StrLeafExt for Arena {
    fn arena_str_leaf(&mut self, text: &str, file: sqlpl_core::arena::FileId, line: u32) -> NodeId {
        self.new_str_leaf(StrTag::Identifier, text, file, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlpl_core::sem::{JoinMember, StructInfo};

    fn file(a: &mut Arena) -> sqlpl_core::arena::FileId {
        a.file("t.sql")
    }

    #[test]
    fn arguments_ref_canonicalizes_to_column_ref() {
        let mut a = Arena::new();
        let f = file(&mut a);
        let field = a.new_str_leaf(StrTag::Identifier, "amount", f, 1);
        let node = a.new_node(NodeKind::ArgumentsRefExpr, Some(field), None, f, 1);
        let parent = a.new_node(NodeKind::ProjectionItem, Some(node), None, f, 1);
        canonicalize_arguments_ref(&mut a, node, "deposit");
        let replaced = a.get(parent).left().expect("projection item still has its expr child");
        assert_eq!(a.kind(replaced), NodeKind::ColumnRefExpr);
        let name_leaf = a.get(replaced).left().expect("column ref has a name leaf");
        let Some(Leaf::Str { text, .. }) = a.get(name_leaf).leaf() else { panic!("expected str leaf") };
        assert_eq!(a.text(*text), "deposit.arguments.amount");
    }

    #[test]
    fn star_expands_against_join_scope() {
        let mut a = Arena::new();
        let f = file(&mut a);
        let mut strings = Interner::new();
        let id_sym = strings.intern("id");
        let name_sym = strings.intern("name");
        let scope = JoinInfo {
            members: vec![JoinMember {
                alias: strings.intern("t"),
                struct_info: StructInfo { names: vec![id_sym, name_sym], kinds: vec![None, None], semtypes: vec![], struct_name: None },
                nullable_override: false,
            }],
        };
        let star = a.new_node(NodeKind::StarExpr, None, None, f, 1);
        let list = a.new_node(NodeKind::ProjectionList, Some(star), None, f, 1);
        expand_star(&mut a, star, &scope, &strings);
        let first = a.get(list).left().expect("expanded star leaves a first column");
        assert_eq!(a.kind(first), NodeKind::ColumnRefExpr);
    }
}
