//! `insert`/`update`/`delete` analysis (§4.4.3 "insert").

use super::{collect_list, leaf_text};
use crate::analyze::types::ScalarType;
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, NodeId};
use sqlpl_core::sem::StructInfo;

/// Resolve `table` against the tables registry, returning its struct
/// shape, or `None` (after emitting an error) if it isn't defined.
fn resolve_table(analyzer: &mut Analyzer, arena: &Arena, node: NodeId, table: &str) -> Option<StructInfo> {
    let Some(&table_node) = analyzer.registries.tables.get(table) else {
        analyzer.error(arena, node, format!("reference to undefined table '{}'", table));
        return None;
    };
    if analyzer.registries.is_deleted(table) {
        analyzer.error(arena, node, format!("table '{}' has been deleted", table));
    }
    arena.sem(table_node).and_then(|sem| analyzer.sem.get(sem).struct_info.clone())
}

fn column_type(analyzer: &Analyzer, shape: &StructInfo, name: &str, strings: &sqlpl_core::Interner) -> Option<ScalarType> {
    let i = shape.names.iter().position(|&s| strings.resolve(s).eq_ignore_ascii_case(name))?;
    let rec = analyzer.sem.get(shape.semtypes[i]);
    Some(ScalarType::new(rec.core_type, !rec.flags.has(sqlpl_core::sem::SemFlags::NOT_NULL)))
}

pub fn analyze_insert(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    if let Some(ctx) = &mut analyzer.current_proc {
        ctx.has_dml = true;
    }
    let table_leaf = arena.get(node).left().expect("insert names a table");
    let table = leaf_text(arena, table_leaf).to_owned();
    let values_node = arena.get(node).right().expect("insert has a values clause");
    let col_list = arena.get(values_node).left();
    let value_list = arena.get(values_node).right();

    let cols = collect_list(arena, col_list);
    let values = collect_list(arena, value_list);

    let shape = resolve_table(analyzer, arena, node, &table);

    if !cols.is_empty() && cols.len() != values.len() {
        analyzer.error(arena, node, format!("INSERT column count ({}) does not match value count ({})", cols.len(), values.len()));
    }

    let strings = arena.strings.clone();
    let col_names: Vec<String> = cols.iter().map(|&c| leaf_text(arena, c).to_owned()).collect();
    for (i, &value) in values.iter().enumerate() {
        let ty = analyzer.analyze_expr(arena, value);
        let Some(shape) = &shape else { continue };
        let col_name = col_names.get(i).cloned();
        let target = col_name.as_deref().and_then(|c| column_type(analyzer, shape, c, &strings));
        if let Some(target) = target {
            if !ty.assignable_to(target) {
                analyzer.error(arena, value, format!("value at position {} is not assignable to column '{}'", i, col_name.unwrap_or_default()));
            }
        }
    }
}

pub fn analyze_update(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    if let Some(ctx) = &mut analyzer.current_proc {
        ctx.has_dml = true;
    }
    let table_leaf = arena.get(node).left().expect("update names a table");
    let table = leaf_text(arena, table_leaf).to_owned();
    let body = arena.get(node).right().expect("update has a body");
    let set_list = arena.get(body).left();
    let where_clause = arena.get(body).right();

    let shape = resolve_table(analyzer, arena, node, &table);
    let strings = arena.strings.clone();

    for set_item in collect_list(arena, set_list) {
        let col_leaf = arena.get(set_item).left().expect("update-set item has a column");
        let col_name = leaf_text(arena, col_leaf).to_owned();
        let value = arena.get(set_item).right().expect("update-set item has a value");
        let ty = analyzer.analyze_expr(arena, value);
        if let Some(shape) = &shape {
            match column_type(analyzer, shape, &col_name, &strings) {
                Some(target) => {
                    if !ty.assignable_to(target) {
                        analyzer.error(arena, value, format!("value is not assignable to column '{}'", col_name));
                    }
                }
                None => analyzer.error(arena, set_item, format!("table '{}' has no column '{}'", table, col_name)),
            }
        }
    }

    if let Some(w) = where_clause {
        let cond = arena.get(w).left().expect("where clause has a condition");
        analyzer.analyze_expr(arena, cond);
    }
}

pub fn analyze_delete(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    if let Some(ctx) = &mut analyzer.current_proc {
        ctx.has_dml = true;
    }
    let table_leaf = arena.get(node).left().expect("delete names a table");
    let table = leaf_text(arena, table_leaf).to_owned();
    resolve_table(analyzer, arena, node, &table);

    if let Some(w) = arena.get(node).right() {
        let cond = arena.get(w).left().expect("where clause has a condition");
        analyzer.analyze_expr(arena, cond);
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
    fn insert_with_mismatched_column_and_value_counts_is_an_error() {
        let (_arena, diag) = analyze(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY, name TEXT); INSERT INTO t (id, name) VALUES (1);",
        );
        assert!(diag.has_errors());
    }

    #[test]
    fn well_formed_insert_is_clean() {
        let (_arena, diag) = analyze(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY, name TEXT); INSERT INTO t (id, name) VALUES (1, 'a');",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn update_unknown_column_is_an_error() {
        let (_arena, diag) = analyze("CREATE TABLE t (id INT NOT NULL PRIMARY KEY); UPDATE t SET missing = 1;");
        assert!(diag.has_errors());
    }

    #[test]
    fn delete_from_unknown_table_is_an_error() {
        let (_arena, diag) = analyze("DELETE FROM missing WHERE 1;");
        assert!(diag.has_errors());
    }

    fn proc_has_dml(src: &str, proc_name: &str) -> bool {
        let mut arena = Arena::new();
        let root = parse(src, "t.sql", &mut arena).unwrap();
        let defines = HashSet::new();
        let mut diag = Diagnostics::new();
        crate::macros::expand_program(&mut arena, root, &defines, &mut diag);
        let mut analyzer = Analyzer::new(&mut diag);
        analyzer.run(&mut arena, root);
        let proc_node = *analyzer.registries.procs.get(proc_name).expect("proc registered");
        let sem_id = arena.sem(proc_node).expect("proc has a sem record");
        analyzer.sem.get(sem_id).flags.has(sqlpl_core::sem::SemFlags::HAS_DML)
    }

    #[test]
    fn insert_inside_a_proc_flags_it_has_dml() {
        assert!(proc_has_dml(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); CREATE PROC p () BEGIN INSERT INTO t (id) VALUES (1); END;",
            "p",
        ));
    }

    #[test]
    fn update_inside_a_proc_flags_it_has_dml() {
        assert!(proc_has_dml(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); CREATE PROC p () BEGIN UPDATE t SET id = 2; END;",
            "p",
        ));
    }

    #[test]
    fn delete_inside_a_proc_flags_it_has_dml() {
        assert!(proc_has_dml(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); CREATE PROC p () BEGIN DELETE FROM t; END;",
            "p",
        ));
    }

    #[test]
    fn proc_with_no_dml_is_not_flagged() {
        assert!(!proc_has_dml("CREATE PROC p () BEGIN LET x := 1; END;", "p"));
    }
}
