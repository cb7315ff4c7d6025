//! `@TEXT`, `@ID`, `@MACRO_LINE`, `@MACRO_FILE` builtins (§4.3).

use crate::regen::echo_text;
use sqlpl_core::arena::{Arena, FileId, NodeId, StrTag};

/// `@TEXT(arg1, arg2, ...)`: concatenate each argument's generated
/// source text and wrap the result in a SQL string literal.
pub fn text_builtin(arena: &mut Arena, args: &[NodeId], file: FileId, line: u32) -> NodeId {
    let mut joined = String::new();
    for &arg in args {
        joined.push_str(&echo_text(arena, arg));
    }
    arena.new_str_leaf(StrTag::SqlLiteral, &joined, file, line)
}

/// `@ID(arg)`: like `@TEXT` but the result must be a legal identifier.
pub fn id_builtin(arena: &mut Arena, args: &[NodeId], file: FileId, line: u32) -> Result<NodeId, String> {
    let mut joined = String::new();
    for &arg in args {
        joined.push_str(&echo_text(arena, arg));
    }
    if !is_legal_identifier(&joined) {
        return Err(format!("@ID produced an invalid identifier: '{}'", joined));
    }
    Ok(arena.new_str_leaf(StrTag::Identifier, &joined, file, line))
}

fn is_legal_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_identifier_accepts_underscore_prefix() {
        assert!(is_legal_identifier("_foo_1"));
        assert!(!is_legal_identifier("1foo"));
        assert!(!is_legal_identifier("foo bar"));
        assert!(!is_legal_identifier(""));
    }
}
