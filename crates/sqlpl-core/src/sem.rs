//! The semantic record (§3.2): attached lazily by the semantic pass to
//! any AST node that participates in analysis.

use crate::arena::SemId;
use crate::interner::Symbol;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Core type lattice (§4.4.1). Ordered only by nullability; the numeric
/// tower `bool ⊂ int32 ⊂ int64 ⊂ real` is the only implicit-conversion
/// family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CoreType {
    Null,
    Bool,
    Int32,
    Int64,
    Real,
    Text,
    Blob,
    Object,
    Struct,
    Join,
}

impl CoreType {
    /// Position in the numeric tower, or `None` if not numeric.
    fn numeric_rank(self) -> Option<u8> {
        match self {
            CoreType::Bool => Some(0),
            CoreType::Int32 => Some(1),
            CoreType::Int64 => Some(2),
            CoreType::Real => Some(3),
            _ => None,
        }
    }

    /// True if `self` implicitly converts to `target` (§4.4.1): only
    /// within the numeric tower, and only widening.
    pub fn implicitly_converts_to(self, target: CoreType) -> bool {
        if self == target {
            return true;
        }
        match (self.numeric_rank(), target.numeric_rank()) {
            (Some(a), Some(b)) => a <= b,
            _ => false,
        }
    }
}

/// ~30 accumulated boolean properties (§3.2). Stored as a bitset so the
/// record stays small and flags compose with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
pub struct SemFlags(u32);

macro_rules! flag_bits {
    ($($name:ident = $bit:expr),* $(,)?) => {
        impl SemFlags {
            $(
                pub const $name: SemFlags = SemFlags(1 << $bit);
            )*

            pub fn has(self, f: SemFlags) -> bool {
                self.0 & f.0 == f.0
            }

            pub fn set(&mut self, f: SemFlags) {
                self.0 |= f.0;
            }

            pub fn clear(&mut self, f: SemFlags) {
                self.0 &= !f.0;
            }

            pub fn with(self, f: SemFlags) -> Self {
                SemFlags(self.0 | f.0)
            }
        }
    };
}

flag_bits! {
    NOT_NULL = 0,
    SENSITIVE = 1,
    VARIABLE = 2,
    IN_ARG = 3,
    OUT_ARG = 4,
    HAS_SHAPE_STORAGE = 5,
    HAS_ROW = 6,
    INLINE_CALL = 7,
    USED = 8,
    ERROR = 9,
    BOXED = 10,
    HAS_DML = 11,
    THROWS = 12,
    PRIVATE = 13,
    DEPLOYABLE = 14,
    DELETED = 15,
    CREATE_PROC = 16,
    SELECT_FUNC = 17,
    NO_CHECK = 18,
    VALUE_CURSOR = 19,
    BACKED_TABLE = 20,
    BACKING_TABLE = 21,
    RESULT_SET = 22,
    OUT_UNION = 23,
}

impl std::ops::BitOr for SemFlags {
    type Output = SemFlags;
    fn bitor(self, rhs: SemFlags) -> SemFlags {
        SemFlags(self.0 | rhs.0)
    }
}

/// The shape of a row, cursor, or procedure result (§3.2, glossary "Shape").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructInfo {
    pub names: Vec<Symbol>,
    pub kinds: Vec<Option<Symbol>>,
    pub semtypes: Vec<SemId>,
    pub struct_name: Option<Symbol>,
}

impl StructInfo {
    pub fn count(&self) -> usize {
        self.names.len()
    }
}

/// One aliased member of a join scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinMember {
    pub alias: Symbol,
    pub struct_info: StructInfo,
    /// True if an outer join forces every column nullable regardless of
    /// the underlying table's declared nullability.
    pub nullable_override: bool,
}

/// An ordered sequence of struct pointers with alias names (§3.2).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JoinInfo {
    pub members: Vec<JoinMember>,
}

impl JoinInfo {
    pub fn find(&self, alias: &str, strings: &crate::interner::Interner) -> Option<&JoinMember> {
        self.members
            .iter()
            .find(|m| strings.resolve(m.alias).eq_ignore_ascii_case(alias))
    }
}

/// A 64-bit digest, see `TableInfo::type_hash` and §4.4 / §8.6.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TypeHash(pub u64);

/// One not-null column description used as input to `type_hash` (§8.6):
/// case-insensitive name, nullability (always true here, by construction
/// — only not-null columns are hashed), and core type.
struct NotNullColDesc<'a> {
    name: &'a str,
    core_type: CoreType,
}

/// Precomputed projections of a table's `StructInfo` (§3.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableInfo {
    pub notnull_col_indices: Vec<usize>,
    pub key_col_indices: Vec<usize>,
    pub value_col_indices: Vec<usize>,
    pub type_hash: TypeHash,
}

impl TableInfo {
    /// Compute the table's `TableInfo` from its struct shape and the set
    /// of not-null / key column indices the DDL analyzer determined.
    ///
    /// `type_hash` is a pure function (§8.6) of the sorted, case-folded
    /// `(name, core_type)` pairs of the not-null columns: adding a
    /// nullable column must not change it, adding a not-null column must.
    pub fn compute(
        struct_info: &StructInfo,
        not_null_flags: &[bool],
        core_types: &[CoreType],
        key_col_indices: Vec<usize>,
        value_col_indices: Vec<usize>,
        strings: &crate::interner::Interner,
    ) -> Self {
        let notnull_col_indices: Vec<usize> = (0..struct_info.count())
            .filter(|&i| not_null_flags[i])
            .collect();

        let mut descs: Vec<NotNullColDesc> = notnull_col_indices
            .iter()
            .map(|&i| NotNullColDesc {
                name: strings.resolve(struct_info.names[i]),
                core_type: core_types[i],
            })
            .collect();
        descs.sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));

        let mut hasher = Sha256::new();
        for d in &descs {
            hasher.update(d.name.to_ascii_lowercase().as_bytes());
            hasher.update([0u8]);
            hasher.update([d.core_type as u8]);
        }
        let digest = hasher.finalize();
        let bytes: [u8; 8] = digest[..8].try_into().expect("sha256 digest has >=8 bytes");
        let type_hash = TypeHash(u64::from_be_bytes(bytes));

        TableInfo {
            notnull_col_indices,
            key_col_indices,
            value_col_indices,
            type_hash,
        }
    }
}

/// The per-node semantic record (§3.2). Produced exactly once per node
/// by the semantic pass; read by everything downstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemRecord {
    pub core_type: CoreType,
    pub flags: SemFlags,
    pub kind_tag: Option<Symbol>,
    pub name: Option<Symbol>,
    pub struct_info: Option<StructInfo>,
    pub join_info: Option<JoinInfo>,
    pub table_info: Option<TableInfo>,
    pub error: Option<String>,
}

impl SemRecord {
    pub fn new(core_type: CoreType) -> Self {
        Self {
            core_type,
            flags: SemFlags::default(),
            kind_tag: None,
            name: None,
            struct_info: None,
            join_info: None,
            table_info: None,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        let mut r = Self::new(CoreType::Null);
        r.flags.set(SemFlags::ERROR);
        r.error = Some(msg.into());
        r
    }

    pub fn is_error(&self) -> bool {
        self.flags.has(SemFlags::ERROR)
    }

    /// Two kinds are compatible only if equal, or if either side is
    /// untagged (§4.4.1 "Kinds").
    pub fn kind_compatible(a: Option<Symbol>, b: Option<Symbol>) -> bool {
        match (a, b) {
            (None, _) | (_, None) => true,
            (Some(x), Some(y)) => x == y,
        }
    }

    /// A "set" kind (suffix rule, §3.2) marks a result-set reference.
    pub fn is_set_kind(kind: Option<Symbol>, strings: &crate::interner::Interner) -> bool {
        kind.map(|s| strings.resolve(s).ends_with("set"))
            .unwrap_or(false)
    }
}

/// Arena of semantic records, indexed by `SemId`. Lives alongside the AST
/// arena for the duration of a compile.
#[derive(Debug, Default)]
pub struct SemTable {
    records: Vec<SemRecord>,
}

impl SemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, record: SemRecord) -> SemId {
        let id = SemId::from_raw(self.records.len() as u32);
        self.records.push(record);
        id
    }

    pub fn get(&self, id: SemId) -> &SemRecord {
        &self.records[id.index()]
    }

    pub fn get_mut(&mut self, id: SemId) -> &mut SemRecord {
        &mut self.records[id.index()]
    }

    pub fn cleanup(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;

    #[test]
    fn numeric_tower_widens_one_way() {
        assert!(CoreType::Bool.implicitly_converts_to(CoreType::Int32));
        assert!(CoreType::Int32.implicitly_converts_to(CoreType::Real));
        assert!(!CoreType::Real.implicitly_converts_to(CoreType::Int32));
        assert!(!CoreType::Text.implicitly_converts_to(CoreType::Int32));
    }

    #[test]
    fn flags_roundtrip() {
        let mut f = SemFlags::default();
        assert!(!f.has(SemFlags::NOT_NULL));
        f.set(SemFlags::NOT_NULL);
        assert!(f.has(SemFlags::NOT_NULL));
        f.clear(SemFlags::NOT_NULL);
        assert!(!f.has(SemFlags::NOT_NULL));
    }

    #[test]
    fn type_hash_stable_under_nullable_addition() {
        let mut strings = Interner::new();
        let id = strings.intern("id");
        let v = strings.intern("v");
        let struct1 = StructInfo {
            names: vec![id],
            kinds: vec![None],
            semtypes: vec![],
            struct_name: None,
        };
        let h1 = TableInfo::compute(
            &struct1,
            &[true],
            &[CoreType::Int32],
            vec![0],
            vec![],
            &strings,
        )
        .type_hash;

        // Adding a nullable column should not change the hash.
        let struct2 = StructInfo {
            names: vec![id, v],
            kinds: vec![None, None],
            semtypes: vec![],
            struct_name: None,
        };
        let h2 = TableInfo::compute(
            &struct2,
            &[true, false],
            &[CoreType::Int32, CoreType::Text],
            vec![0],
            vec![1],
            &strings,
        )
        .type_hash;
        assert_eq!(h1.0, h2.0);

        // Adding a not-null column must change it.
        let struct3 = StructInfo {
            names: vec![id, v],
            kinds: vec![None, None],
            semtypes: vec![],
            struct_name: None,
        };
        let h3 = TableInfo::compute(
            &struct3,
            &[true, true],
            &[CoreType::Int32, CoreType::Text],
            vec![0, 1],
            vec![],
            &strings,
        )
        .type_hash;
        assert_ne!(h1.0, h3.0);
    }
}
