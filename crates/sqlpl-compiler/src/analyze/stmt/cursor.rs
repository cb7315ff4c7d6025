//! `declare`/`declare cursor`/`declare out call`/`fetch` analysis
//! (§4.4.3, §4.4.2 "has-row").

use super::leaf_text;
use crate::analyze::types::{resolve_type_name, ScalarType};
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, Leaf, NodeId};
use sqlpl_core::sem::{SemFlags, SemRecord, StructInfo};

pub fn analyze_declare(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("declare has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let type_node = arena.get(node).right().expect("declare has a type node");
    let type_leaf = arena.get(type_node).left().expect("declare type node has a type name");
    let flags_leaf = arena.get(type_node).right().expect("declare type node has flags");
    let type_name = leaf_text(arena, type_leaf).to_owned();
    let not_null = matches!(arena.get(flags_leaf).leaf(), Some(Leaf::Int(v)) if v & 1 != 0);

    let core = resolve_type_name(&type_name);
    let ty = ScalarType::new(core, !not_null);
    analyzer.scopes.insert_local(&name, ty);

    let mut rec = SemRecord::new(core);
    rec.flags.set(SemFlags::VARIABLE);
    if not_null {
        rec.flags.set(SemFlags::NOT_NULL);
    }
    let sem_id = analyzer.sem.alloc(rec);
    arena.set_sem(node, sem_id);
}

/// `declare <name> cursor for <select>` (§4.4.3 "select"): the select's
/// result shape becomes the cursor's row shape.
pub fn analyze_declare_cursor(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("declare cursor has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let select = arena.get(node).right().expect("declare cursor has a select");

    let shape = super::select::analyze_select(analyzer, arena, select);
    analyzer.cursors.insert_local(&name, shape.clone());

    let mut rec = SemRecord::new(sqlpl_core::sem::CoreType::Struct);
    rec.name = Some(arena.strings.intern(&name));
    rec.struct_info = Some(shape);
    rec.flags.set(SemFlags::VALUE_CURSOR);
    let sem_id = analyzer.sem.alloc(rec);
    arena.set_sem(node, sem_id);
}

/// `declare out call proc(args)`: binds a cursor named after the called
/// procedure, shaped by its result struct (if any).
pub fn analyze_declare_out_call(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let call = arena.get(node).left().expect("declare out call wraps a call expr");
    let name_leaf = arena.get(call).left().expect("call has a name");
    let name = leaf_text(arena, name_leaf).to_owned();

    let shape = super::proc::analyze_call_result_shape(analyzer, arena, call);
    let shape = shape.unwrap_or_else(|| StructInfo { names: vec![], kinds: vec![], semtypes: vec![], struct_name: None });
    analyzer.cursors.insert_local(&name, shape.clone());

    let mut rec = SemRecord::new(sqlpl_core::sem::CoreType::Struct);
    rec.name = Some(arena.strings.intern(&name));
    rec.struct_info = Some(shape);
    rec.flags.set(SemFlags::OUT_ARG);
    let sem_id = analyzer.sem.alloc(rec);
    arena.set_sem(node, sem_id);
}

/// `fetch <cursor>`: looks up the cursor's row shape; a simplified
/// stand-in for the full has-row-conditional improvement (§4.4.2) marks
/// the cursor itself `HAS_ROW` rather than threading a checked-if
/// construct, since this grammar has no `if cursor` shorthand to key on.
pub fn analyze_fetch(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("fetch has a cursor name");
    let name = leaf_text(arena, name_leaf).to_owned();
    if analyzer.cursors.lookup(&name).is_none() {
        analyzer.error(arena, node, format!("fetch from undeclared cursor '{}'", name));
        return;
    }
    analyzer.flow.improve(&name);
    let mut rec = SemRecord::new(sqlpl_core::sem::CoreType::Struct);
    rec.flags.set(SemFlags::HAS_ROW);
    let sem_id = analyzer.sem.alloc(rec);
    arena.set_sem(node, sem_id);
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
    fn declare_cursor_then_fetch_resolves() {
        let (_arena, diag) = analyze(
            "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); CREATE PROC p () BEGIN DECLARE c CURSOR FOR SELECT id FROM t; FETCH c; END;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn fetch_from_undeclared_cursor_is_an_error() {
        let (_arena, diag) = analyze("CREATE PROC p () BEGIN FETCH missing; END;");
        assert!(diag.has_errors());
    }

    #[test]
    fn plain_declare_binds_a_typed_variable() {
        let (_arena, diag) = analyze("CREATE PROC p () BEGIN DECLARE x INT NOT NULL; SET x := 1; END;");
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }
}
