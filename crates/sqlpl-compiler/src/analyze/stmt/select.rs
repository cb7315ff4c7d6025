//! `select` analysis (§4.4.3): build a join scope from `from`, analyze
//! the projection list against it, and the result's struct pointer
//! becomes the statement's sem type.

use super::{collect_list, leaf_text};
use crate::analyze::rewrites::expand_star;
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, NodeId, NodeKind};
use sqlpl_core::sem::{CoreType, JoinInfo, JoinMember, SemRecord, StructInfo};

/// Build the join scope for one `FromClause`. Only a single bare table
/// reference is modeled (the grammar doesn't produce explicit joins);
/// a `JoinInfo` with one member still lets star-expansion and column
/// resolution share the same machinery a multi-way join would use.
fn build_from_scope(analyzer: &mut Analyzer, arena: &Arena, from: NodeId) -> JoinInfo {
    let table_leaf = arena.get(from).left().expect("from clause names a table");
    let table_name = leaf_text(arena, table_leaf).to_owned();
    let Some(&table_node) = analyzer.registries.tables.get(&table_name) else {
        analyzer.error(arena, from, format!("reference to undefined table '{}'", table_name));
        return JoinInfo::default();
    };
    if analyzer.registries.is_deleted(&table_name) {
        analyzer.error(arena, from, format!("table '{}' has been deleted", table_name));
    }
    let struct_info = arena
        .sem(table_node)
        .and_then(|sem| analyzer.sem.get(sem).struct_info.clone())
        .unwrap_or_else(|| StructInfo { names: vec![], kinds: vec![], semtypes: vec![], struct_name: None });
    JoinInfo { members: vec![JoinMember { alias: arena.strings.intern(&table_name), struct_info, nullable_override: false }] }
}

pub fn analyze_select(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) -> StructInfo {
    let maybe_with = arena.get(node).left().expect("select has a body");
    let core = if arena.kind(maybe_with) == NodeKind::With {
        analyze_ctes(analyzer, arena, maybe_with);
        arena.get(maybe_with).right().expect("with has a core select")
    } else {
        maybe_with
    };
    let struct_info = analyze_select_core(analyzer, arena, core);
    let mut rec = SemRecord::new(CoreType::Struct);
    rec.struct_info = Some(struct_info.clone());
    let sem_id = analyzer.sem.alloc(rec);
    arena.set_sem(node, sem_id);
    struct_info
}

fn analyze_ctes(analyzer: &mut Analyzer, arena: &mut Arena, with_node: NodeId) {
    let cte_list = arena.get(with_node).left();
    for cte in collect_list(arena, cte_list) {
        let name_leaf = arena.get(cte).left().expect("cte has a name");
        let name = leaf_text(arena, name_leaf).to_owned();
        let body = arena.get(cte).right().expect("cte has a body");
        let shape = analyze_select_core(analyzer, arena, body);
        let mut rec = SemRecord::new(CoreType::Struct);
        rec.struct_info = Some(shape);
        let sem_id = analyzer.sem.alloc(rec);
        arena.set_sem(cte, sem_id);
        analyzer.registries.tables.insert_overwrite(&name, cte);
    }
}

fn analyze_select_core(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) -> StructInfo {
    let projection = arena.get(node).left();
    let from_where = arena.get(node).right().expect("select core has from/where");
    let from = arena.get(from_where).left();
    let where_clause = arena.get(from_where).right();

    let scope = from.map(|f| build_from_scope(analyzer, arena, f)).unwrap_or_default();

    if let Some(w) = where_clause {
        let cond = arena.get(w).left().expect("where clause has a condition");
        analyzer.analyze_expr(arena, cond);
    }

    let items = collect_list(arena, projection);
    let strings = arena.strings.clone();
    for &item in &items {
        if matches!(arena.kind(item), NodeKind::StarExpr | NodeKind::TableStarExpr) {
            expand_star(arena, item, &scope, &strings);
        }
    }
    // Re-collect: star expansion may have changed the list's shape.
    let items = collect_list(arena, projection);

    let mut names = Vec::new();
    let mut kinds = Vec::new();
    let mut semtypes = Vec::new();
    for item in items {
        match arena.kind(item) {
            NodeKind::ProjectionItem => {
                let expr = arena.get(item).left().expect("projection item has an expr");
                let alias = arena.get(item).right();
                let ty = analyzer.analyze_expr(arena, expr);
                let col_name = match alias {
                    Some(a) => leaf_text(arena, a).to_owned(),
                    None => projected_name(arena, expr),
                };
                names.push(arena.strings.intern(&col_name));
                kinds.push(None);
                let mut rec = SemRecord::new(ty.core);
                if !ty.nullable {
                    rec.flags.set(sqlpl_core::sem::SemFlags::NOT_NULL);
                }
                semtypes.push(analyzer.sem.alloc(rec));
            }
            NodeKind::ColumnRefExpr => {
                let ty = analyzer.analyze_expr(arena, item);
                let col_name = projected_name(arena, item);
                names.push(arena.strings.intern(&col_name));
                kinds.push(None);
                let mut rec = SemRecord::new(ty.core);
                if !ty.nullable {
                    rec.flags.set(sqlpl_core::sem::SemFlags::NOT_NULL);
                }
                semtypes.push(analyzer.sem.alloc(rec));
            }
            _ => {}
        }
    }
    StructInfo { names, kinds, semtypes, struct_name: None }
}

/// The default projected column name when no `AS` alias is given: the
/// bare column name for a column ref, or `"column"` as a fallback for
/// any other expression shape (the regenerator's `minify_aliases`
/// callback is where real synthesis of numbered aliases belongs).
fn projected_name(arena: &Arena, expr: NodeId) -> String {
    if arena.kind(expr) == NodeKind::ColumnRefExpr {
        let leaf = arena.get(expr).left().expect("column ref has a name");
        leaf_text(arena, leaf).to_owned()
    } else {
        "column".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use sqlpl_core::Diagnostics;
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
    fn star_projection_expands_to_table_columns() {
        let (_arena, diag) = analyze("CREATE TABLE t (id INT NOT NULL PRIMARY KEY, name TEXT); SELECT * FROM t;");
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn select_from_deleted_table_is_an_error() {
        let (_arena, diag) = analyze("CREATE TABLE t (id INT NOT NULL PRIMARY KEY) @DELETE(2); SELECT id FROM t;");
        assert!(diag.has_errors());
    }

    #[test]
    fn qualified_star_projection_expands_against_its_alias() {
        let (_arena, diag) = analyze("CREATE TABLE t (id INT NOT NULL PRIMARY KEY, name TEXT); SELECT t.* FROM t;");
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn cte_is_visible_to_the_core_select() {
        let (_arena, diag) = analyze(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); WITH c AS (SELECT id FROM t) SELECT id FROM c;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }
}
