use super::*;
use sqlpl_core::arena::{Arena, Leaf, NodeKind};

fn parse_ok(src: &str) -> (Arena, NodeId) {
    let mut arena = Arena::new();
    let root = parse(src, "t.sql", &mut arena).expect("parse should succeed");
    (arena, root)
}

#[test]
fn parses_empty_program() {
    let (arena, root) = parse_ok("");
    assert_eq!(arena.kind(root), NodeKind::Program);
    assert!(arena.get(root).left().is_none());
}

#[test]
fn parses_create_table_with_columns() {
    let (arena, root) = parse_ok("CREATE TABLE t (id INTEGER NOT NULL PRIMARY KEY, name TEXT);");
    let stmts = arena.get(root).left().unwrap();
    let create = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(create), NodeKind::CreateTable);
    let name_leaf = arena.get(create).left().unwrap();
    match arena.get(name_leaf).leaf() {
        Some(Leaf::Str { text, .. }) => assert_eq!(arena.text(*text), "t"),
        _ => panic!("expected identifier leaf"),
    }
}

#[test]
fn parses_create_proc_with_params_and_body() {
    let (arena, root) = parse_ok(
        "CREATE PROC p (x INTEGER NOT NULL) BEGIN LET y := x + 1; RETURN; END;",
    );
    let stmts = arena.get(root).left().unwrap();
    let proc = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(proc), NodeKind::CreateProc);
}

#[test]
fn parses_if_else_chain() {
    let (arena, root) = parse_ok("IF x = 1 THEN SET y := 1; ELSE IF x = 2 THEN SET y := 2; ELSE SET y := 3; END IF;");
    let stmts = arena.get(root).left().unwrap();
    let if_node = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(if_node), NodeKind::If);
}

#[test]
fn parses_try_catch() {
    let (arena, root) = parse_ok("BEGIN TRY; CALL foo(); END TRY; BEGIN CATCH; THROW; END CATCH;");
    let stmts = arena.get(root).left().unwrap();
    let try_node = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(try_node), NodeKind::Try);
    assert!(arena.get(try_node).right().is_some());
}

#[test]
fn parses_select_with_where_and_binary_precedence() {
    let (arena, root) = parse_ok("SELECT a, b FROM t WHERE a = 1 AND b > 2;");
    let stmts = arena.get(root).left().unwrap();
    let select = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(select), NodeKind::Select);
}

#[test]
fn parses_macro_ref_as_expression() {
    let (arena, root) = parse_ok("LET y := inc!(5);");
    let stmts = arena.get(root).left().unwrap();
    let let_node = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(let_node), NodeKind::Let);
    let value = arena.get(let_node).right().unwrap();
    assert_eq!(arena.kind(value), NodeKind::MacroRef);
}

#[test]
fn parses_macro_def() {
    let (arena, root) = parse_ok("@MACRO(expr) double!(x: expr) BEGIN x + x END;");
    let stmts = arena.get(root).left().unwrap();
    let def = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(def), NodeKind::MacroDef);
}

#[test]
fn parses_ifdef_block() {
    let (arena, root) = parse_ok("@IFDEF FEATURE_X LET y := 1; @ELSE LET y := 2; @ENDIF;");
    let stmts = arena.get(root).left().unwrap();
    let block = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(block), NodeKind::IfDefBlock);
}

#[test]
fn parses_declare_cursor_and_fetch() {
    let (arena, root) = parse_ok("DECLARE c CURSOR FOR SELECT a FROM t; FETCH c; CLOSE c;");
    let stmts = arena.get(root).left().unwrap();
    let decl = arena.get(stmts).left().unwrap();
    assert_eq!(arena.kind(decl), NodeKind::DeclareCursor);
}

#[test]
fn between_desugars_to_rewrite_node() {
    let (arena, root) = parse_ok("LET ok := x BETWEEN 1 AND 10;");
    let stmts = arena.get(root).left().unwrap();
    let let_node = arena.get(stmts).left().unwrap();
    let value = arena.get(let_node).right().unwrap();
    assert_eq!(arena.kind(value), NodeKind::BetweenRewrite);
}

#[test]
fn quoted_identifier_is_mangled_and_preserves_original() {
    let (arena, root) = parse_ok("SELECT `a b` FROM t;");
    let stmts = arena.get(root).left().unwrap();
    let select = arena.get(stmts).left().unwrap();
    let core = arena.get(select).left().unwrap();
    let projection = arena.get(core).left().unwrap();
    let item = arena.get(projection).left().unwrap();
    let expr = arena.get(item).left().unwrap();
    match arena.get(expr).leaf() {
        Some(Leaf::Qid(q)) => {
            assert_eq!(arena.text(q.mangled), "X_aX20b");
            assert_eq!(arena.text(q.original), "a b");
        }
        _ => panic!("expected quoted identifier leaf"),
    }
}

#[test]
fn parse_error_reports_line_and_file() {
    let mut arena = Arena::new();
    let err = parse("CREATE TABLE (id INTEGER);", "bad.sql", &mut arena).unwrap_err();
    assert_eq!(err.file, "bad.sql");
    assert_eq!(err.line, 1);
}

#[test]
fn check_parent_links_holds_after_parsing_nested_expression() {
    let (arena, root) = parse_ok("LET y := (1 + 2) * 3;");
    assert!(arena.check_parent_links(root).is_ok());
}
