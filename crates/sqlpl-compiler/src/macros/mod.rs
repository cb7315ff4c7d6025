//! Macro preprocessor (C3): expands typed, hygienic macros in place
//! before the semantic analyzer ever sees the tree (§4.3).

mod builtins;
mod expand;

use sqlpl_core::arena::NodeId;
use sqlpl_core::Diagnostics;
use std::collections::HashSet;

pub use expand::MacroExpander;

/// One of the six grammatical positions a macro may be defined for.
/// Each corresponds to one non-terminal; a reference only expands
/// where that non-terminal is grammatically expected (§4.3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MacroKind {
    Expr,
    StmtList,
    QueryParts,
    CteTables,
    SelectCore,
    SelectExpr,
}

impl MacroKind {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "expr" => Some(Self::Expr),
            "stmt_list" => Some(Self::StmtList),
            "query_parts" => Some(Self::QueryParts),
            "cte_tables" => Some(Self::CteTables),
            "select_core" => Some(Self::SelectCore),
            "select_expr" => Some(Self::SelectExpr),
            _ => None,
        }
    }

    /// True if this kind expands via list-splice (§4.3 step 7) rather
    /// than scalar pointer replacement.
    pub fn is_list_kind(self) -> bool {
        matches!(self, Self::StmtList | Self::CteTables)
    }
}

/// Expand every macro reference, `@IFDEF` block, and builtin (`@TEXT`,
/// `@ID`, `@MACRO_LINE`, `@MACRO_FILE`) reachable from `root`, in place.
///
/// Returns `true` if expansion completed with no errors (the driver
/// should skip semantic analysis otherwise, per §4.6 step 4).
pub fn expand_program(
    arena: &mut sqlpl_core::Arena,
    root: NodeId,
    defines: &HashSet<String>,
    diagnostics: &mut Diagnostics,
) -> bool {
    let mut expander = MacroExpander::new(defines);
    expander.run(arena, root, diagnostics);
    !diagnostics.has_errors()
}
