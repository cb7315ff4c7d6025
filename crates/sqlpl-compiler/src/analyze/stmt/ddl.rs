//! DDL analysis (§4.4.3 "create table" and friends): column lists,
//! struct-pointer/type-hash computation, registry population.

use super::{collect_list, leaf_text};
use crate::analyze::schema::{validate_annotation_order, validate_schema_upgrade_visibility, SchemaAnnotation};
use crate::analyze::types::resolve_type_name;
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind};
use sqlpl_core::sem::{CoreType, SemRecord, StructInfo, TableInfo};

const FLAG_NOT_NULL: i32 = 1;
const FLAG_PK: i32 = 1 << 1;

fn col_def_parts(arena: &Arena, col: NodeId) -> (String, String, bool, bool) {
    let name_leaf = arena.get(col).left().expect("col def has a name");
    let type_node = arena.get(col).right().expect("col def has a type node");
    let type_leaf = arena.get(type_node).left().expect("col type node has a type name");
    let flags_leaf = arena.get(type_node).right().expect("col type node has flags");
    let name = leaf_text(arena, name_leaf).to_owned();
    let type_name = leaf_text(arena, type_leaf).to_owned();
    let flags = match arena.get(flags_leaf).leaf() {
        Some(Leaf::Int(v)) => *v,
        _ => 0,
    };
    (name, type_name, flags & FLAG_NOT_NULL != 0, flags & FLAG_PK != 0)
}

fn collect_annotations(arena: &Arena, ann_list: Option<NodeId>) -> Vec<SchemaAnnotation> {
    collect_list(arena, ann_list)
        .into_iter()
        .filter_map(|ann| match arena.kind(ann) {
            NodeKind::CreateAnnotation => {
                let v = arena.get(ann).left().map(|leaf| match arena.get(leaf).leaf() {
                    Some(Leaf::Int(v)) => *v,
                    _ => 0,
                });
                v.map(SchemaAnnotation::Create)
            }
            NodeKind::DeleteAnnotation => {
                let v = arena.get(ann).left().map(|leaf| match arena.get(leaf).leaf() {
                    Some(Leaf::Int(v)) => *v,
                    _ => 0,
                });
                v.map(SchemaAnnotation::Delete)
            }
            NodeKind::RecreateAnnotation => Some(SchemaAnnotation::Recreate),
            _ => None,
        })
        .collect()
}

pub fn analyze_create_table(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("create table has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let body = arena.get(node).right().expect("create table has a body");
    let col_list = arena.get(body).left();
    let ann_list = arena.get(body).right();

    let cols = collect_list(arena, col_list);
    let mut names = Vec::new();
    let mut kinds = Vec::new();
    let mut semtypes = Vec::new();
    let mut not_null_flags = Vec::new();
    let mut core_types = Vec::new();
    let mut key_indices = Vec::new();

    for (i, col) in cols.iter().enumerate() {
        let (col_name, type_name, not_null, is_pk) = col_def_parts(arena, *col);
        let core = resolve_type_name(&type_name);
        let sym = arena.strings.intern(&col_name);
        names.push(sym);
        kinds.push(None);
        let mut rec = SemRecord::new(core);
        if not_null {
            rec.flags.set(sqlpl_core::sem::SemFlags::NOT_NULL);
        }
        let sem_id = analyzer.sem.alloc(rec);
        semtypes.push(sem_id);
        not_null_flags.push(not_null);
        core_types.push(core);
        if is_pk {
            key_indices.push(i);
        }
    }

    let struct_info = StructInfo { names, kinds, semtypes, struct_name: Some(arena.strings.intern(&name)) };
    let value_indices: Vec<usize> = (0..cols.len()).filter(|i| !key_indices.contains(i)).collect();
    let table_info = TableInfo::compute(&struct_info, &not_null_flags, &core_types, key_indices, value_indices, &arena.strings);

    let anns = collect_annotations(arena, ann_list);
    let file = arena.text(arena.get(node).file).to_owned();
    let line = arena.get(node).line;
    validate_annotation_order(&name, &anns, None, &file, line, analyzer.diagnostics);
    let max_create_version = anns
        .iter()
        .filter_map(|a| if let SchemaAnnotation::Create(v) = a { Some(*v) } else { None })
        .max();
    validate_schema_upgrade_visibility(&name, max_create_version, analyzer.schema_upgrade_version, &file, line, analyzer.diagnostics);
    if anns.iter().any(|a| matches!(a, SchemaAnnotation::Delete(_))) {
        analyzer.registries.mark_deleted(&name);
    }

    let mut table_record = SemRecord::new(CoreType::Struct);
    table_record.name = Some(arena.strings.intern(&name));
    table_record.struct_info = Some(struct_info);
    table_record.table_info = Some(table_info);
    let sem_id = analyzer.sem.alloc(table_record);
    arena.set_sem(node, sem_id);

    if !analyzer.registries.tables.insert(&name, node) {
        analyzer.error(arena, node, format!("table '{}' is already defined", name));
    }
}

pub fn analyze_create_proc(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("create proc has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let sig = arena.get(node).right().expect("create proc has a signature");
    let param_list = arena.get(sig).left();
    let body = arena.get(sig).right();

    analyzer.scopes.push_scope();
    analyzer.current_proc = Some(crate::analyze::ProcContext { name: name.clone(), has_dml: false, throws: false, result_shape: None });

    for param in collect_list(arena, param_list) {
        let (pname, type_name, not_null, _) = col_def_parts(arena, param);
        let core = resolve_type_name(&type_name);
        let ty = crate::analyze::types::ScalarType::new(core, !not_null);
        analyzer.scopes.insert_local(&pname, ty);
    }

    if let Some(body) = body {
        analyzer.analyze_stmt_list(arena, Some(body));
    }

    let ctx = analyzer.current_proc.take();
    analyzer.scopes.pop_scope();

    let mut rec = SemRecord::new(CoreType::Object);
    rec.name = Some(arena.strings.intern(&name));
    if let Some(ctx) = &ctx {
        if ctx.has_dml {
            rec.flags.set(sqlpl_core::sem::SemFlags::HAS_DML);
        }
        if ctx.throws {
            rec.flags.set(sqlpl_core::sem::SemFlags::THROWS);
        }
        rec.struct_info = ctx.result_shape.clone();
    }
    let sem_id = analyzer.sem.alloc(rec);
    arena.set_sem(node, sem_id);

    if !analyzer.registries.procs.insert(&name, node) {
        analyzer.error(arena, node, format!("procedure '{}' is already defined", name));
    }
}

pub fn analyze_create_view(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("create view has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    if let Some(select) = arena.get(node).right() {
        analyzer.analyze_stmt(arena, select);
    }
    if !analyzer.registries.views.insert(&name, node) {
        analyzer.error(arena, node, format!("view '{}' is already defined", name));
    }
}

pub fn analyze_create_index(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("create index has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let body = arena.get(node).right().expect("create index has a body");
    let table_leaf = arena.get(body).left().expect("create index names a table");
    let table = leaf_text(arena, table_leaf).to_owned();
    if !analyzer.registries.tables.contains(&table) {
        analyzer.error(arena, node, format!("index '{}' references undefined table '{}'", name, table));
    }
    if !analyzer.registries.indices.insert(&name, node) {
        analyzer.error(arena, node, format!("index '{}' is already defined", name));
    }
}

/// Trigger bodies aren't deeply analyzed (§1 scope; see the parser's
/// note on `parse_create_trigger`) — just registered.
pub fn analyze_create_trigger(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("create trigger has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    if !analyzer.registries.triggers.insert(&name, node) {
        analyzer.error(arena, node, format!("trigger '{}' is already defined", name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use sqlpl_core::Diagnostics;
    use std::collections::HashSet;

    /// A proc that performs DML inside a `try` and throws in its `catch`
    /// should end up flagged both `HAS_DML` and `THROWS` (§4.4.3 "mark
    /// the caller's 'has DML' flag if the callee uses DML", §8 scenario
    /// 6 "`r` is flagged as DML-using" and "error-throwing").
    #[test]
    fn try_catch_proc_with_insert_and_throw_is_flagged_dml_and_throws() {
        let mut arena = Arena::new();
        let root = parse(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); \
             CREATE PROC r () BEGIN \
               BEGIN TRY INSERT INTO t (id) VALUES (1); END TRY \
               BEGIN CATCH THROW; END CATCH; \
             END;",
            "t.sql",
            &mut arena,
        )
        .unwrap();
        let defines = HashSet::new();
        let mut diag = Diagnostics::new();
        crate::macros::expand_program(&mut arena, root, &defines, &mut diag);
        let mut analyzer = Analyzer::new(&mut diag);
        analyzer.run(&mut arena, root);
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());

        let proc_node = *analyzer.registries.procs.get("r").expect("proc registered");
        let sem_id = arena.sem(proc_node).expect("proc has a sem record");
        let rec = analyzer.sem.get(sem_id);
        assert!(rec.flags.has(sqlpl_core::sem::SemFlags::HAS_DML), "expected HAS_DML");
        assert!(rec.flags.has(sqlpl_core::sem::SemFlags::THROWS), "expected THROWS");
    }

    #[test]
    fn proc_with_no_dml_or_throw_is_flagged_neither() {
        let mut arena = Arena::new();
        let root = parse("CREATE PROC p () BEGIN LET x := 1; END;", "t.sql", &mut arena).unwrap();
        let defines = HashSet::new();
        let mut diag = Diagnostics::new();
        crate::macros::expand_program(&mut arena, root, &defines, &mut diag);
        let mut analyzer = Analyzer::new(&mut diag);
        analyzer.run(&mut arena, root);

        let proc_node = *analyzer.registries.procs.get("p").expect("proc registered");
        let sem_id = arena.sem(proc_node).expect("proc has a sem record");
        let rec = analyzer.sem.get(sem_id);
        assert!(!rec.flags.has(sqlpl_core::sem::SemFlags::HAS_DML));
        assert!(!rec.flags.has(sqlpl_core::sem::SemFlags::THROWS));
    }
}
