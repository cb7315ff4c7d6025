//! `try`/`catch` analysis (§4.4.3 "try/catch", §4.4.2 "Try/catch").

use crate::analyze::flow::ContextKind;
use crate::analyze::types::ScalarType;
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, NodeId};
use sqlpl_core::sem::CoreType;

/// `try { ... } catch { ... }`. Any statement in `try` may throw at any
/// point, so `catch` starts from the pre-try flow state rather than
/// inheriting whatever `try` managed to improve (§4.4.2: "on entering
/// catch, only improvements that are stable across every prefix of
/// `try` survive" — approximated here as none of `try`'s own
/// improvements, since this analyzer doesn't track per-statement
/// invalidation points within a block).
pub fn analyze_try(analyzer: &mut Analyzer, arena: &mut Arena, node: NodeId) {
    let try_node = arena.get(node).left().expect("try has a try node");
    let try_body = arena.get(try_node).left();
    let catch_node = arena.get(node).right();

    analyzer.flow.push(ContextKind::Branch);
    analyzer.analyze_stmt_list(arena, try_body);
    let try_survivors = analyzer.flow.snapshot();
    analyzer.flow.pop();

    let catch_survivors = match catch_node {
        Some(catch) => {
            let catch_body = arena.get(catch).left();
            analyzer.flow.push(ContextKind::Branch);
            analyzer.scopes.push_scope();
            analyzer.scopes.insert_local("@RC", ScalarType::new(CoreType::Int32, false));
            analyzer.analyze_stmt_list(arena, catch_body);
            analyzer.scopes.pop_scope();
            let s = analyzer.flow.snapshot();
            analyzer.flow.pop();
            s
        }
        None => try_survivors.clone(),
    };

    let merged: std::collections::HashSet<String> = try_survivors.intersection(&catch_survivors).cloned().collect();
    analyzer.flow.intersect_into_parent(&merged);
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
    fn try_catch_analyzes_both_bodies() {
        let (_arena, diag) = analyze(
            "CREATE PROC p () BEGIN BEGIN TRY LET x := 1; END TRY BEGIN CATCH LET y := 2; END CATCH; END;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn try_without_catch_is_clean() {
        let (_arena, diag) = analyze("CREATE PROC p () BEGIN BEGIN TRY LET x := 1; END TRY; END;");
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn catch_body_can_reference_rc() {
        let (_arena, diag) = analyze(
            "CREATE PROC p () BEGIN BEGIN TRY LET x := 1; END TRY BEGIN CATCH LET r := @RC; END CATCH; END;",
        );
        assert!(diag.is_empty(), "{:?}", diag.iter().collect::<Vec<_>>());
    }
}
