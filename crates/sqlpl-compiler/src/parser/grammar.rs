//! Grammar rules: one `parse_*` function per non-terminal named in §6.1
//! that this compiler exercises end to end. Not a complete SQL grammar —
//! per §1 the grammar's implementation is a mechanical exercise; the
//! shapes built here are what §3/§4 actually operate on.

use super::lexer::Token;
use super::{ParseError, Parser};
use sqlpl_core::arena::{NodeId, NodeKind, NumTag, StrTag};

type PResult<T> = Result<T, ParseError>;

/// Build a right-spine cons list: `mk_list(p, StmtList, [a, b, c])` is
/// `cons(a, cons(b, cons(c, nil)))`, matching how list-kinded macros
/// splice (§4.3 step 7).
fn mk_list(p: &mut Parser, kind: NodeKind, items: Vec<NodeId>, line: u32) -> Option<NodeId> {
    let mut tail: Option<NodeId> = None;
    for item in items.into_iter().rev() {
        tail = Some(p.arena.new_node(kind, Some(item), tail, p.file, line));
    }
    tail
}

pub fn parse_program(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let mut stmts = Vec::new();
    while !p.at_end() {
        if p.eat_token(&Token::Semi) {
            continue;
        }
        stmts.push(parse_top_level_stmt(p)?);
        while p.eat_token(&Token::Semi) {}
    }
    let list = mk_list(p, NodeKind::StmtList, stmts, line);
    Ok(p.arena.new_node(NodeKind::Program, list, None, p.file, line))
}

fn parse_stmt_list_until(p: &mut Parser, terminators: &[&str]) -> PResult<Option<NodeId>> {
    let line = p.current_line();
    let mut stmts = Vec::new();
    loop {
        while p.eat_token(&Token::Semi) {}
        if p.at_end() || terminators.iter().any(|t| p.at_keyword(t)) {
            break;
        }
        stmts.push(parse_top_level_stmt(p)?);
    }
    Ok(mk_list(p, NodeKind::StmtList, stmts, line))
}

fn parse_top_level_stmt(p: &mut Parser) -> PResult<NodeId> {
    if p.at_keyword("CREATE") {
        return parse_create(p);
    }
    if p.at_keyword("DECLARE") {
        return parse_declare(p);
    }
    if p.at_keyword("LET") {
        return parse_let(p);
    }
    if p.at_keyword("SET") {
        return parse_set(p);
    }
    if p.at_keyword("IF") {
        return parse_if(p);
    }
    if p.at_keyword("WHILE") {
        return parse_while(p);
    }
    if p.at_keyword("LEAVE") {
        let line = p.current_line();
        p.advance();
        return Ok(p.arena.new_node(NodeKind::Leave, None, None, p.file, line));
    }
    if p.at_keyword("CONTINUE") {
        let line = p.current_line();
        p.advance();
        return Ok(p.arena.new_node(NodeKind::Continue, None, None, p.file, line));
    }
    if p.at_keyword("BEGIN") {
        return parse_try_catch(p);
    }
    if p.at_keyword("THROW") {
        let line = p.current_line();
        p.advance();
        return Ok(p.arena.new_node(NodeKind::Throw, None, None, p.file, line));
    }
    if p.at_keyword("RETURN") {
        let line = p.current_line();
        p.advance();
        return Ok(p.arena.new_node(NodeKind::Return, None, None, p.file, line));
    }
    if p.at_keyword("ROLLBACK") {
        let line = p.current_line();
        p.advance();
        p.expect_keyword("RETURN")?;
        return Ok(p.arena.new_node(NodeKind::RollbackReturn, None, None, p.file, line));
    }
    if p.at_keyword("COMMIT") {
        let line = p.current_line();
        p.advance();
        p.expect_keyword("RETURN")?;
        return Ok(p.arena.new_node(NodeKind::CommitReturn, None, None, p.file, line));
    }
    if p.at_keyword("CALL") {
        return parse_call(p);
    }
    if p.at_keyword("FETCH") {
        return parse_fetch(p);
    }
    if p.at_keyword("CLOSE") {
        let line = p.current_line();
        p.advance();
        let name = p.expect_ident()?;
        let leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
        return Ok(p.arena.new_node(NodeKind::CloseCursor, Some(leaf), None, p.file, line));
    }
    if p.at_keyword("SELECT") || p.at_keyword("WITH") {
        return parse_select_stmt(p);
    }
    if p.at_keyword("INSERT") {
        return parse_insert(p);
    }
    if p.at_keyword("UPDATE") {
        return parse_update(p);
    }
    if p.at_keyword("DELETE") {
        return parse_delete(p);
    }
    if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@MACRO")) {
        return parse_macro_def(p);
    }
    if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@IFDEF")) {
        return parse_ifdef(p);
    }
    if matches!(p.peek(), Some(Token::AtDirective(_))) {
        return parse_schema_pragma(p);
    }
    if matches!(p.peek(), Some(Token::MacroRefName(_))) {
        return parse_macro_ref(p, NodeKind::MacroRef);
    }
    Err(p.error(format!(
        "unexpected token at start of statement: {:?}",
        p.peek_text().unwrap_or("<eof>")
    )))
}

// ---------------------------------------------------------------- DDL --

fn parse_create(p: &mut Parser) -> PResult<NodeId> {
    p.expect_keyword("CREATE")?;
    if p.eat_keyword("TABLE") {
        return parse_create_table(p);
    }
    if p.eat_keyword("PROC") {
        return parse_create_proc(p);
    }
    if p.eat_keyword("VIEW") {
        return parse_create_view(p);
    }
    if p.eat_keyword("INDEX") {
        return parse_create_index(p);
    }
    if p.eat_keyword("TRIGGER") {
        return parse_create_trigger(p);
    }
    Err(p.error("expected TABLE, PROC, VIEW, INDEX, or TRIGGER after CREATE"))
}

fn parse_annotations(p: &mut Parser) -> PResult<Vec<NodeId>> {
    let mut anns = Vec::new();
    loop {
        let line = p.current_line();
        if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@create")) {
            p.advance();
            p.expect_token(Token::LParen)?;
            let v = parse_int_literal(p)?;
            p.expect_token(Token::RParen)?;
            anns.push(p.arena.new_node(NodeKind::CreateAnnotation, Some(v), None, p.file, line));
        } else if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@delete")) {
            p.advance();
            p.expect_token(Token::LParen)?;
            let v = parse_int_literal(p)?;
            p.expect_token(Token::RParen)?;
            anns.push(p.arena.new_node(NodeKind::DeleteAnnotation, Some(v), None, p.file, line));
        } else if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@recreate")) {
            p.advance();
            let mut group = None;
            if p.eat_token(&Token::LParen) {
                let name = p.expect_ident()?;
                group = Some(p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line));
                p.expect_token(Token::RParen)?;
            }
            anns.push(p.arena.new_node(NodeKind::RecreateAnnotation, group, None, p.file, line));
        } else {
            break;
        }
    }
    Ok(anns)
}

fn parse_int_literal(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    match p.peek().cloned() {
        Some(Token::IntLit(s)) => {
            p.advance();
            let v: i32 = s.parse().map_err(|_| p.error("bad integer literal"))?;
            Ok(p.arena.new_int_leaf(v, p.file, line))
        }
        other => Err(p.error(format!("expected integer literal, found {:?}", other))),
    }
}

fn parse_create_table(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::LParen)?;
    let mut cols = Vec::new();
    loop {
        cols.push(parse_col_def(p)?);
        if !p.eat_token(&Token::Comma) {
            break;
        }
    }
    p.expect_token(Token::RParen)?;
    let col_list = mk_list(p, NodeKind::ColList, cols, line);
    let anns = parse_annotations(p)?;
    let ann_list = mk_list(p, NodeKind::StmtList, anns, line);
    let body = p.arena.new_node(NodeKind::StmtList, col_list, ann_list, p.file, line);
    Ok(p.arena.new_node(NodeKind::CreateTable, Some(name_leaf), Some(body), p.file, line))
}

fn parse_col_def(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    let type_name = p.expect_ident()?;
    let mut not_null = false;
    let mut is_pk = false;
    loop {
        if p.eat_keyword("NOT") {
            p.expect_keyword("NULL")?;
            not_null = true;
        } else if p.eat_keyword("PRIMARY") {
            p.expect_keyword("KEY")?;
            is_pk = true;
        } else {
            break;
        }
    }
    let type_leaf = p.arena.new_str_leaf(StrTag::Identifier, type_name, p.file, line);
    let flags = (not_null as i32) | ((is_pk as i32) << 1);
    let flags_leaf = p.arena.new_int_leaf(flags, p.file, line);
    let type_node = p.arena.new_node(NodeKind::ColDef, Some(type_leaf), Some(flags_leaf), p.file, line);
    Ok(p.arena.new_node(NodeKind::ColDef, Some(name_leaf), Some(type_node), p.file, line))
}

fn parse_create_proc(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::LParen)?;
    let mut params = Vec::new();
    if !matches!(p.peek(), Some(Token::RParen)) {
        loop {
            params.push(parse_proc_param(p)?);
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
    }
    p.expect_token(Token::RParen)?;
    let param_list = mk_list(p, NodeKind::ParamList, params, line);
    p.expect_keyword("BEGIN")?;
    let body = parse_stmt_list_until(p, &["END"])?;
    p.expect_keyword("END")?;
    let sig = p.arena.new_node(NodeKind::ProcParam, param_list, body, p.file, line);
    Ok(p.arena.new_node(NodeKind::CreateProc, Some(name_leaf), Some(sig), p.file, line))
}

fn parse_proc_param(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let _ = p.eat_keyword("IN") || p.eat_keyword("OUT");
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    let type_name = p.expect_ident()?;
    let mut not_null = false;
    if p.eat_keyword("NOT") {
        p.expect_keyword("NULL")?;
        not_null = true;
    }
    let type_leaf = p.arena.new_str_leaf(StrTag::Identifier, type_name, p.file, line);
    let flags_leaf = p.arena.new_int_leaf(not_null as i32, p.file, line);
    let type_node = p.arena.new_node(NodeKind::ColDef, Some(type_leaf), Some(flags_leaf), p.file, line);
    Ok(p.arena.new_node(NodeKind::ColDef, Some(name_leaf), Some(type_node), p.file, line))
}

fn parse_create_view(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_keyword("AS")?;
    let select = parse_select_stmt(p)?;
    Ok(p.arena.new_node(NodeKind::CreateView, Some(name_leaf), Some(select), p.file, line))
}

fn parse_create_index(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_keyword("ON")?;
    let table = p.expect_ident()?;
    let table_leaf = p.arena.new_str_leaf(StrTag::Identifier, table, p.file, line);
    p.expect_token(Token::LParen)?;
    let mut cols = Vec::new();
    loop {
        let c = p.expect_ident()?;
        cols.push(p.arena.new_str_leaf(StrTag::Identifier, c, p.file, line));
        if !p.eat_token(&Token::Comma) {
            break;
        }
    }
    p.expect_token(Token::RParen)?;
    let col_list = mk_list(p, NodeKind::ColList, cols, line);
    let body = p.arena.new_node(NodeKind::StmtList, Some(table_leaf), col_list, p.file, line);
    Ok(p.arena.new_node(NodeKind::CreateIndex, Some(name_leaf), Some(body), p.file, line))
}

/// Triggers are parsed structurally (name + table) but their body is
/// not analyzed in depth — out of scope for the statement-analysis
/// cases this spec names in §4.4.3.
fn parse_create_trigger(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    while !p.at_keyword("BEGIN") && !p.at_end() {
        p.advance();
    }
    p.expect_keyword("BEGIN")?;
    let body = parse_stmt_list_until(p, &["END"])?;
    p.expect_keyword("END")?;
    Ok(p.arena.new_node(NodeKind::CreateTrigger, Some(name_leaf), body, p.file, line))
}

fn parse_schema_pragma(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let Some(Token::AtDirective(d)) = p.peek().cloned() else {
        unreachable!("caller checked AtDirective");
    };
    p.advance();
    let kind = match d.to_ascii_lowercase().as_str() {
        "@schema_upgrade_version" => NodeKind::SchemaUpgradeVersion,
        "@schema_upgrade_script" => NodeKind::SchemaUpgradeScript,
        "@previous_schema" => NodeKind::PreviousSchema,
        "@unsub" => NodeKind::Unsub,
        "@emit_enums" => NodeKind::EmitEnums,
        "@emit_constants" => NodeKind::EmitConstants,
        "@emit_group" => NodeKind::EmitGroup,
        "@schema_ad_hoc_migration" => NodeKind::SchemaAdHocMigration,
        "@attribute" => NodeKind::Attribute,
        other => return Err(p.error(format!("unknown pragma {}", other))),
    };
    let mut arg = None;
    if p.eat_token(&Token::LParen) {
        if !matches!(p.peek(), Some(Token::RParen)) {
            arg = Some(parse_expr(p)?);
        }
        p.expect_token(Token::RParen)?;
    }
    Ok(p.arena.new_node(kind, arg, None, p.file, line))
}

// --------------------------------------------------------- procedural --

fn parse_declare(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("DECLARE")?;
    if p.eat_keyword("OUT") {
        p.expect_keyword("CALL")?;
        let call = parse_call_expr(p)?;
        return Ok(p.arena.new_node(NodeKind::DeclareOutCall, Some(call), None, p.file, line));
    }
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    if p.eat_keyword("CURSOR") {
        p.expect_keyword("FOR")?;
        let select = parse_select_stmt(p)?;
        return Ok(p.arena.new_node(NodeKind::DeclareCursor, Some(name_leaf), Some(select), p.file, line));
    }
    let type_name = p.expect_ident()?;
    let mut not_null = false;
    if p.eat_keyword("NOT") {
        p.expect_keyword("NULL")?;
        not_null = true;
    }
    let type_leaf = p.arena.new_str_leaf(StrTag::Identifier, type_name, p.file, line);
    let flags_leaf = p.arena.new_int_leaf(not_null as i32, p.file, line);
    let type_node = p.arena.new_node(NodeKind::ColDef, Some(type_leaf), Some(flags_leaf), p.file, line);
    Ok(p.arena.new_node(NodeKind::Declare, Some(name_leaf), Some(type_node), p.file, line))
}

fn parse_let(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("LET")?;
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::ColonEq)?;
    let value = parse_expr(p)?;
    Ok(p.arena.new_node(NodeKind::Let, Some(name_leaf), Some(value), p.file, line))
}

fn parse_set(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("SET")?;
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::ColonEq)?;
    let value = parse_expr(p)?;
    Ok(p.arena.new_node(NodeKind::Set, Some(name_leaf), Some(value), p.file, line))
}

fn parse_if(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("IF")?;
    let cond = parse_expr(p)?;
    p.expect_keyword("THEN")?;
    let then_body = parse_stmt_list_until(p, &["ELSE", "END"])?;
    let else_branch = if p.eat_keyword("ELSE") {
        if p.at_keyword("IF") {
            Some(parse_if(p)?)
        } else {
            let body = parse_stmt_list_until(p, &["END"])?;
            p.expect_keyword("END")?;
            p.eat_keyword("IF");
            body.map(|b| p.arena.new_node(NodeKind::Else, Some(b), None, p.file, line))
        }
    } else {
        p.expect_keyword("END")?;
        p.eat_keyword("IF");
        None
    };
    let then_node = p.arena.new_node(NodeKind::StmtList, then_body, else_branch, p.file, line);
    Ok(p.arena.new_node(NodeKind::If, Some(cond), Some(then_node), p.file, line))
}

fn parse_while(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("WHILE")?;
    let cond = parse_expr(p)?;
    p.expect_keyword("BEGIN")?;
    let body = parse_stmt_list_until(p, &["END"])?;
    p.expect_keyword("END")?;
    Ok(p.arena.new_node(NodeKind::While, Some(cond), body, p.file, line))
}

fn parse_try_catch(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("BEGIN")?;
    p.expect_keyword("TRY")?;
    p.eat_token(&Token::Semi);
    let try_body = parse_stmt_list_until(p, &["END"])?;
    p.expect_keyword("END")?;
    p.expect_keyword("TRY")?;
    p.eat_token(&Token::Semi);
    let mut catch_body = None;
    if p.eat_keyword("BEGIN") {
        p.expect_keyword("CATCH")?;
        p.eat_token(&Token::Semi);
        catch_body = parse_stmt_list_until(p, &["END"])?;
        p.expect_keyword("END")?;
        p.expect_keyword("CATCH")?;
    }
    let try_node = p.arena.new_node(NodeKind::Try, try_body, None, p.file, line);
    let catch_node = catch_body.map(|c| p.arena.new_node(NodeKind::Catch, Some(c), None, p.file, line));
    Ok(p.arena.new_node(NodeKind::Try, Some(try_node), catch_node, p.file, line))
}

fn parse_call_expr(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::LParen)?;
    let mut args = Vec::new();
    if !matches!(p.peek(), Some(Token::RParen)) {
        loop {
            args.push(parse_expr(p)?);
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
    }
    p.expect_token(Token::RParen)?;
    let arg_list = mk_list(p, NodeKind::ArgList, args, line);
    Ok(p.arena.new_node(NodeKind::Call, Some(name_leaf), arg_list, p.file, line))
}

fn parse_call(p: &mut Parser) -> PResult<NodeId> {
    p.expect_keyword("CALL")?;
    parse_call_expr(p)
}

fn parse_fetch(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("FETCH")?;
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    Ok(p.arena.new_node(NodeKind::Fetch, Some(name_leaf), None, p.file, line))
}

// ------------------------------------------------------------- SQL/DML --

fn parse_select_stmt(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    let mut cte_list = None;
    if p.eat_keyword("WITH") {
        let mut ctes = Vec::new();
        loop {
            let name = p.expect_ident()?;
            let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
            p.expect_keyword("AS")?;
            p.expect_token(Token::LParen)?;
            let body = parse_select_core(p)?;
            p.expect_token(Token::RParen)?;
            ctes.push(p.arena.new_node(NodeKind::CteTable, Some(name_leaf), Some(body), p.file, line));
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
        cte_list = mk_list(p, NodeKind::CteList, ctes, line);
    }
    let core = parse_select_core(p)?;
    let with_node = cte_list.map(|c| p.arena.new_node(NodeKind::With, Some(c), Some(core), p.file, line));
    Ok(p.arena.new_node(NodeKind::Select, with_node.or(Some(core)), None, p.file, line))
}

fn parse_select_core(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("SELECT")?;
    let projection = parse_projection_list(p)?;
    let mut from = None;
    if p.eat_keyword("FROM") {
        let table = p.expect_ident()?;
        let table_leaf = p.arena.new_str_leaf(StrTag::Identifier, table, p.file, line);
        from = Some(p.arena.new_node(NodeKind::FromClause, Some(table_leaf), None, p.file, line));
    }
    let mut where_clause = None;
    if p.eat_keyword("WHERE") {
        let cond = parse_expr(p)?;
        where_clause = Some(p.arena.new_node(NodeKind::WhereClause, Some(cond), None, p.file, line));
    }
    let from_where = p.arena.new_node(NodeKind::StmtList, from, where_clause, p.file, line);
    Ok(p.arena.new_node(NodeKind::SelectCore, Some(projection), Some(from_where), p.file, line))
}

fn parse_projection_list(p: &mut Parser) -> PResult<Option<NodeId>> {
    let line = p.current_line();
    let mut items = Vec::new();
    loop {
        if p.eat_token(&Token::Star) {
            items.push(p.arena.new_node(NodeKind::StarExpr, None, None, p.file, line));
        } else if matches!(p.peek(), Some(Token::Ident(_)))
            && matches!(p.peek_nth(1), Some(Token::Dot))
            && matches!(p.peek_nth(2), Some(Token::Star))
        {
            let alias = p.expect_ident()?;
            let alias_leaf = p.arena.new_str_leaf(StrTag::Identifier, alias, p.file, line);
            p.advance(); // '.'
            p.advance(); // '*'
            items.push(p.arena.new_node(NodeKind::TableStarExpr, Some(alias_leaf), None, p.file, line));
        } else {
            let expr = parse_expr(p)?;
            let mut alias = None;
            if p.eat_keyword("AS") {
                let name = p.expect_ident()?;
                alias = Some(p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line));
            }
            items.push(p.arena.new_node(NodeKind::ProjectionItem, Some(expr), alias, p.file, line));
        }
        if !p.eat_token(&Token::Comma) {
            break;
        }
    }
    Ok(mk_list(p, NodeKind::ProjectionList, items, line))
}

fn parse_insert(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("INSERT")?;
    p.expect_keyword("INTO")?;
    let table = p.expect_ident()?;
    let table_leaf = p.arena.new_str_leaf(StrTag::Identifier, table, p.file, line);
    let mut cols = Vec::new();
    if p.eat_token(&Token::LParen) {
        loop {
            let c = p.expect_ident()?;
            cols.push(p.arena.new_str_leaf(StrTag::Identifier, c, p.file, line));
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
        p.expect_token(Token::RParen)?;
    }
    let col_list = mk_list(p, NodeKind::ColList, cols, line);
    p.expect_keyword("VALUES")?;
    p.expect_token(Token::LParen)?;
    let mut values = Vec::new();
    loop {
        values.push(parse_expr(p)?);
        if !p.eat_token(&Token::Comma) {
            break;
        }
    }
    p.expect_token(Token::RParen)?;
    let value_list = mk_list(p, NodeKind::ArgList, values, line);
    let values_node = p.arena.new_node(NodeKind::InsertValues, col_list, value_list, p.file, line);
    Ok(p.arena.new_node(NodeKind::Insert, Some(table_leaf), Some(values_node), p.file, line))
}

fn parse_update(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("UPDATE")?;
    let table = p.expect_ident()?;
    let table_leaf = p.arena.new_str_leaf(StrTag::Identifier, table, p.file, line);
    p.expect_keyword("SET")?;
    let mut sets = Vec::new();
    loop {
        let col = p.expect_ident()?;
        let col_leaf = p.arena.new_str_leaf(StrTag::Identifier, col, p.file, line);
        p.expect_token(Token::Eq)?;
        let value = parse_expr(p)?;
        sets.push(p.arena.new_node(NodeKind::UpdateSetItem, Some(col_leaf), Some(value), p.file, line));
        if !p.eat_token(&Token::Comma) {
            break;
        }
    }
    let set_list = mk_list(p, NodeKind::StmtList, sets, line);
    let mut where_clause = None;
    if p.eat_keyword("WHERE") {
        let cond = parse_expr(p)?;
        where_clause = Some(p.arena.new_node(NodeKind::WhereClause, Some(cond), None, p.file, line));
    }
    let body = p.arena.new_node(NodeKind::StmtList, set_list, where_clause, p.file, line);
    Ok(p.arena.new_node(NodeKind::Update, Some(table_leaf), Some(body), p.file, line))
}

fn parse_delete(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("DELETE")?;
    p.expect_keyword("FROM")?;
    let table = p.expect_ident()?;
    let table_leaf = p.arena.new_str_leaf(StrTag::Identifier, table, p.file, line);
    let mut where_clause = None;
    if p.eat_keyword("WHERE") {
        let cond = parse_expr(p)?;
        where_clause = Some(p.arena.new_node(NodeKind::WhereClause, Some(cond), None, p.file, line));
    }
    Ok(p.arena.new_node(NodeKind::Delete, Some(table_leaf), where_clause, p.file, line))
}

// --------------------------------------------------------- expressions --

/// Binding power for a binary operator token, low to high (§4.5
/// "Priority/precedence"): the regenerator reuses this exact ordering to
/// decide when to parenthesize.
fn binop_priority(tok: &Token) -> Option<(u8, NodeKind)> {
    match tok {
        Token::Ident(s) if s.eq_ignore_ascii_case("OR") => Some((1, NodeKind::BinaryExpr)),
        Token::Ident(s) if s.eq_ignore_ascii_case("AND") => Some((2, NodeKind::BinaryExpr)),
        Token::Eq | Token::EqEq | Token::Neq | Token::BangEq | Token::Lt | Token::Gt | Token::Le | Token::Ge => {
            Some((3, NodeKind::BinaryExpr))
        }
        Token::Plus | Token::Minus => Some((4, NodeKind::BinaryExpr)),
        Token::Star | Token::Slash | Token::Percent => Some((5, NodeKind::BinaryExpr)),
        Token::CoalesceOp => Some((2, NodeKind::BinaryExpr)),
        _ => None,
    }
}

pub fn parse_expr(p: &mut Parser) -> PResult<NodeId> {
    parse_expr_bp(p, 0)
}

fn parse_expr_bp(p: &mut Parser, min_bp: u8) -> PResult<NodeId> {
    let mut lhs = parse_unary(p)?;
    loop {
        if p.at_keyword("BETWEEN") {
            lhs = parse_between(p, lhs)?;
            continue;
        }
        if p.at_keyword("IS") {
            lhs = parse_is(p, lhs)?;
            continue;
        }
        let Some(tok) = p.peek().cloned() else { break };
        let Some((bp, kind)) = binop_priority(&tok) else { break };
        if bp < min_bp {
            break;
        }
        let line = p.current_line();
        let op_text = p.peek_text().unwrap_or("").to_owned();
        p.advance();
        let op_leaf = p.arena.new_str_leaf(StrTag::Identifier, &op_text, p.file, line);
        let rhs = parse_expr_bp(p, bp + 1)?;
        let pair = p.arena.new_node(kind, Some(op_leaf), Some(rhs), p.file, line);
        lhs = p.arena.new_node(kind, Some(lhs), Some(pair), p.file, line);
    }
    Ok(lhs)
}

fn parse_between(p: &mut Parser, lhs: NodeId) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("BETWEEN")?;
    let low = parse_expr_bp(p, 4)?;
    p.expect_keyword("AND")?;
    let high = parse_expr_bp(p, 4)?;
    let bounds = p.arena.new_node(NodeKind::BetweenRewrite, Some(low), Some(high), p.file, line);
    Ok(p.arena.new_node(NodeKind::BetweenRewrite, Some(lhs), Some(bounds), p.file, line))
}

fn parse_is(p: &mut Parser, lhs: NodeId) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("IS")?;
    let negated = p.eat_keyword("NOT");
    p.expect_keyword("NULL")?;
    let kind = if negated { NodeKind::IsNullExpr } else { NodeKind::IsNullExpr };
    let flag = p.arena.new_int_leaf(negated as i32, p.file, line);
    Ok(p.arena.new_node(kind, Some(lhs), Some(flag), p.file, line))
}

fn parse_unary(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    if p.eat_keyword("NOT") {
        let operand = parse_unary(p)?;
        let tag = p.arena.new_str_leaf(StrTag::Identifier, "NOT", p.file, line);
        return Ok(p.arena.new_node(NodeKind::UnaryExpr, Some(tag), Some(operand), p.file, line));
    }
    if p.eat_token(&Token::Minus) {
        let operand = parse_unary(p)?;
        let tag = p.arena.new_str_leaf(StrTag::Identifier, "-", p.file, line);
        return Ok(p.arena.new_node(NodeKind::UnaryExpr, Some(tag), Some(operand), p.file, line));
    }
    parse_primary(p)
}

fn parse_primary(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    match p.peek().cloned() {
        Some(Token::IntLit(s)) => {
            p.advance();
            Ok(p.arena.new_num_leaf(NumTag::Int, s, p.file, line))
        }
        Some(Token::LongLit(s)) => {
            p.advance();
            Ok(p.arena.new_num_leaf(NumTag::Long, s, p.file, line))
        }
        Some(Token::RealLit(s)) => {
            p.advance();
            Ok(p.arena.new_num_leaf(NumTag::Real, s, p.file, line))
        }
        Some(Token::SqlString(s)) => {
            p.advance();
            Ok(p.arena.new_str_leaf(StrTag::SqlLiteral, s, p.file, line))
        }
        Some(Token::CString(s)) => {
            p.advance();
            Ok(p.arena.new_str_leaf(StrTag::CLiteral, s, p.file, line))
        }
        Some(Token::BacktickIdent(s)) => {
            p.advance();
            Ok(p.arena.new_qid_leaf(s, p.file, line))
        }
        Some(Token::LParen) => {
            p.advance();
            let inner = parse_expr(p)?;
            p.expect_token(Token::RParen)?;
            Ok(inner)
        }
        Some(Token::MacroRefName(_)) => parse_macro_ref(p, NodeKind::MacroRef),
        Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@TEXT") => parse_builtin(p, NodeKind::TextBuiltin),
        Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@ID") => parse_builtin(p, NodeKind::IdBuiltin),
        Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@MACRO_LINE") => {
            p.advance();
            Ok(p.arena.new_node(NodeKind::MacroLineBuiltin, None, None, p.file, line))
        }
        Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@MACRO_FILE") => {
            p.advance();
            Ok(p.arena.new_node(NodeKind::MacroFileBuiltin, None, None, p.file, line))
        }
        Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@RC") => {
            p.advance();
            let leaf = p.arena.new_str_leaf(StrTag::Identifier, "@RC", p.file, line);
            Ok(p.arena.new_node(NodeKind::VariableRefExpr, Some(leaf), None, p.file, line))
        }
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => {
            p.advance();
            Ok(p.arena.new_str_leaf(StrTag::SqlLiteral, "NULL", p.file, line))
        }
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("CAST") => parse_cast(p),
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("ATTEST_NOTNULL") => {
            p.advance();
            p.expect_token(Token::LParen)?;
            let inner = parse_expr(p)?;
            p.expect_token(Token::RParen)?;
            Ok(p.arena.new_node(NodeKind::AttestNotNull, Some(inner), None, p.file, line))
        }
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("ARGUMENTS") => {
            p.advance();
            p.expect_token(Token::Dot)?;
            let field = p.expect_ident()?;
            let field_leaf = p.arena.new_str_leaf(StrTag::Identifier, field, p.file, line);
            Ok(p.arena.new_node(NodeKind::ArgumentsRefExpr, Some(field_leaf), None, p.file, line))
        }
        Some(Token::Ident(name)) => {
            p.advance();
            parse_ident_tail(p, name, line)
        }
        other => Err(p.error(format!("expected expression, found {:?}", other))),
    }
}

fn parse_ident_tail<'a>(p: &mut Parser<'a, '_>, name: &'a str, line: u32) -> PResult<NodeId> {
    if p.eat_token(&Token::LParen) {
        let mut args = Vec::new();
        if !matches!(p.peek(), Some(Token::RParen)) {
            loop {
                args.push(parse_expr(p)?);
                if !p.eat_token(&Token::Comma) {
                    break;
                }
            }
        }
        p.expect_token(Token::RParen)?;
        let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
        let arg_list = mk_list(p, NodeKind::ArgList, args, line);
        return Ok(p.arena.new_node(NodeKind::FuncCallExpr, Some(name_leaf), arg_list, p.file, line));
    }
    if p.eat_token(&Token::Dot) {
        let field = p.expect_ident()?;
        let qualified = format!("{}.{}", name, field);
        let leaf = p.arena.new_str_leaf(StrTag::Identifier, &qualified, p.file, line);
        return Ok(p.arena.new_node(NodeKind::ColumnRefExpr, Some(leaf), None, p.file, line));
    }
    let leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    Ok(p.arena.new_node(NodeKind::VariableRefExpr, Some(leaf), None, p.file, line))
}

fn parse_cast(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.expect_keyword("CAST")?;
    p.expect_token(Token::LParen)?;
    let value = parse_expr(p)?;
    p.expect_keyword("AS")?;
    let type_name = p.expect_ident()?;
    let type_leaf = p.arena.new_str_leaf(StrTag::Identifier, type_name, p.file, line);
    p.expect_token(Token::RParen)?;
    Ok(p.arena.new_node(NodeKind::CastExpr, Some(value), Some(type_leaf), p.file, line))
}

fn parse_builtin(p: &mut Parser, kind: NodeKind) -> PResult<NodeId> {
    let line = p.current_line();
    p.advance();
    p.expect_token(Token::LParen)?;
    let mut args = Vec::new();
    if !matches!(p.peek(), Some(Token::RParen)) {
        loop {
            args.push(parse_expr(p)?);
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
    }
    p.expect_token(Token::RParen)?;
    let arg_list = mk_list(p, NodeKind::ArgList, args, line);
    Ok(p.arena.new_node(kind, arg_list, None, p.file, line))
}

// --------------------------------------------------------------- macros --

fn parse_macro_def(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.advance(); // @MACRO
    p.expect_token(Token::LParen)?;
    let kind_name = p.expect_ident()?;
    let kind_leaf = p.arena.new_str_leaf(StrTag::Identifier, kind_name, p.file, line);
    p.expect_token(Token::RParen)?;
    let Some(Token::MacroRefName(name)) = p.peek().cloned() else {
        return Err(p.error("expected macro name ending in '!'"));
    };
    p.advance();
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::LParen)?;
    let mut formals = Vec::new();
    if !matches!(p.peek(), Some(Token::RParen)) {
        loop {
            // Formal syntax is `name! kind` (the formal name is itself a
            // bang-suffixed macro-ref-shaped token, e.g. `e! expr`).
            let Some(Token::MacroRefName(fname)) = p.peek().cloned() else {
                return Err(p.error("expected macro formal name ending in '!'"));
            };
            p.advance();
            let fkind = p.expect_ident()?;
            let fname_leaf = p.arena.new_str_leaf(StrTag::Identifier, fname, p.file, line);
            let fkind_leaf = p.arena.new_str_leaf(StrTag::Identifier, fkind, p.file, line);
            formals.push(p.arena.new_node(NodeKind::MacroFormal, Some(fname_leaf), Some(fkind_leaf), p.file, line));
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
    }
    p.expect_token(Token::RParen)?;
    let formal_list = mk_list(p, NodeKind::ParamList, formals, line);
    p.expect_keyword("BEGIN")?;
    let body = parse_macro_body(p)?;
    p.expect_keyword("END")?;
    let sig = p.arena.new_node(NodeKind::MacroFormal, formal_list, Some(body), p.file, line);
    let header = p.arena.new_node(NodeKind::MacroDef, Some(kind_leaf), Some(name_leaf), p.file, line);
    Ok(p.arena.new_node(NodeKind::MacroDef, Some(header), Some(sig), p.file, line))
}

/// A macro body is parsed as a single expression for `expr`-kinded
/// macros, or a statement list otherwise; since the body's grammatical
/// kind is only checked at expansion time (§4.3), the parser accepts
/// either shape and lets the macro kind drive interpretation.
fn parse_macro_body(p: &mut Parser) -> PResult<NodeId> {
    if p.at_keyword("END") {
        let line = p.current_line();
        return Ok(p.arena.new_node(NodeKind::StmtList, None, None, p.file, line));
    }
    // Try statement-list shape first; fall back to a bare expression.
    let checkpoint = p.pos;
    if let Ok(Some(list)) = parse_stmt_list_until(p, &["END"]) {
        return Ok(list);
    }
    p.pos = checkpoint;
    parse_expr(p)
}

fn parse_macro_ref(p: &mut Parser, kind: NodeKind) -> PResult<NodeId> {
    let line = p.current_line();
    let Some(Token::MacroRefName(name)) = p.peek().cloned() else {
        return Err(p.error("expected macro reference"));
    };
    p.advance();
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    p.expect_token(Token::LParen)?;
    let mut args = Vec::new();
    if !matches!(p.peek(), Some(Token::RParen)) {
        loop {
            args.push(parse_expr(p)?);
            if !p.eat_token(&Token::Comma) {
                break;
            }
        }
    }
    p.expect_token(Token::RParen)?;
    let arg_list = mk_list(p, NodeKind::ArgList, args, line);
    Ok(p.arena.new_node(kind, Some(name_leaf), arg_list, p.file, line))
}

fn parse_ifdef(p: &mut Parser) -> PResult<NodeId> {
    let line = p.current_line();
    p.advance(); // @IFDEF
    let name = p.expect_ident()?;
    let name_leaf = p.arena.new_str_leaf(StrTag::Identifier, name, p.file, line);
    let then_body = parse_stmt_list_until(p, &["@ELSE", "@ENDIF"])?;
    let mut else_body = None;
    if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@ELSE")) {
        p.advance();
        else_body = parse_stmt_list_until(p, &["@ENDIF"])?;
    }
    if matches!(p.peek(), Some(Token::AtDirective(d)) if d.eq_ignore_ascii_case("@ENDIF")) {
        p.advance();
    } else {
        return Err(p.error("expected @ENDIF"));
    }
    let branches = p.arena.new_node(NodeKind::StmtList, then_body, else_body, p.file, line);
    Ok(p.arena.new_node(NodeKind::IfDefBlock, Some(name_leaf), Some(branches), p.file, line))
}
