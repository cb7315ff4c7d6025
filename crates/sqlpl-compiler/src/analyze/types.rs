//! Type-lattice helpers (§4.4.1): resolving declared type names to the
//! core-type lattice and checking conversion/assignment compatibility.

use sqlpl_core::sem::CoreType;

/// Resolve a declared type name (as it appears in `DECLARE`/column/param
/// syntax) to a core type. Unknown names are treated as `object` (the
/// catch-all for opaque host types), matching how unrecognized named
/// types fall through rather than hard-erroring at this layer.
pub fn resolve_type_name(name: &str) -> CoreType {
    match name.to_ascii_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => CoreType::Bool,
        "INT" | "INTEGER" => CoreType::Int32,
        "LONG" | "LONG_INT" | "BIGINT" => CoreType::Int64,
        "REAL" | "FLOAT" | "DOUBLE" => CoreType::Real,
        "TEXT" | "VARCHAR" | "STRING" => CoreType::Text,
        "BLOB" => CoreType::Blob,
        _ => CoreType::Object,
    }
}

/// A scalar type: a core type plus the nullable/sensitive flags that
/// travel with it through expression analysis (§4.4.1).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ScalarType {
    pub core: CoreType,
    pub nullable: bool,
    pub sensitive: bool,
}

impl ScalarType {
    pub fn new(core: CoreType, nullable: bool) -> Self {
        Self { core, nullable, sensitive: false }
    }

    pub fn not_null(core: CoreType) -> Self {
        Self::new(core, false)
    }

    pub fn error() -> Self {
        Self::new(CoreType::Null, true)
    }

    /// `self` widens to `target`'s core type, and a nullable `self`
    /// cannot target a not-null slot (§4.4.1: `T` is a subtype of `T?`).
    pub fn assignable_to(self, target: ScalarType) -> bool {
        if self.nullable && !target.nullable {
            return false;
        }
        if self.sensitive && !target.sensitive {
            return false;
        }
        self.core.implicitly_converts_to(target.core)
    }

    /// The result type of a binary arithmetic/comparison operator: the
    /// wider of the two numeric types, nullable if either side is, and
    /// sensitive if either side is (§4.4.1 "Sensitivity propagates").
    pub fn combine_numeric(a: ScalarType, b: ScalarType) -> ScalarType {
        let core = if a.core.implicitly_converts_to(b.core) { b.core } else { a.core };
        ScalarType { core, nullable: a.nullable || b.nullable, sensitive: a.sensitive || b.sensitive }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_and_unknown_type_names() {
        assert_eq!(resolve_type_name("int"), CoreType::Int32);
        assert_eq!(resolve_type_name("LONG"), CoreType::Int64);
        assert_eq!(resolve_type_name("widget"), CoreType::Object);
    }

    #[test]
    fn nullable_cannot_assign_to_not_null() {
        let nullable_int = ScalarType::new(CoreType::Int32, true);
        let not_null_int = ScalarType::not_null(CoreType::Int32);
        assert!(!nullable_int.assignable_to(not_null_int));
        assert!(not_null_int.assignable_to(nullable_int));
    }

    #[test]
    fn sensitive_cannot_assign_to_non_sensitive() {
        let mut sensitive = ScalarType::not_null(CoreType::Text);
        sensitive.sensitive = true;
        let plain = ScalarType::not_null(CoreType::Text);
        assert!(!sensitive.assignable_to(plain));
        assert!(plain.assignable_to(sensitive));
    }

    #[test]
    fn combine_numeric_widens_and_propagates_nullability() {
        let a = ScalarType::not_null(CoreType::Int32);
        let b = ScalarType::new(CoreType::Real, true);
        let c = ScalarType::combine_numeric(a, b);
        assert_eq!(c.core, CoreType::Real);
        assert!(c.nullable);
    }
}
