//! Schema registries (§3.3) and versioning checks (§4.4.4).

use sqlpl_core::arena::NodeId;
use sqlpl_core::{Diagnostics, SymbolTable};
use std::collections::HashMap;

/// One `@CREATE`/`@DELETE`/`@RECREATE` annotation collected off a
/// table/column/index/trigger/view declaration, in chronological order
/// (§4.4.4 "schema_annotations").
#[derive(Clone, Copy, Debug)]
pub enum SchemaAnnotation {
    Create(i32),
    Delete(i32),
    Recreate,
}

/// Process-wide registries built incrementally during semantic analysis
/// (§3.3). Every map is case-insensitive via [`SymbolTable`].
#[derive(Default)]
pub struct SchemaRegistries {
    pub tables: SymbolTable<NodeId>,
    pub views: SymbolTable<NodeId>,
    pub indices: SymbolTable<NodeId>,
    pub triggers: SymbolTable<NodeId>,
    pub procs: SymbolTable<NodeId>,
    pub funcs: SymbolTable<NodeId>,
    pub enums: SymbolTable<NodeId>,
    pub consts: SymbolTable<NodeId>,
    pub named_types: SymbolTable<NodeId>,
    pub variable_groups: SymbolTable<NodeId>,

    /// name -> deleted. A `@DELETE`d table stays in `tables` (kept for
    /// CTE-shadowing) but is flagged here so ordinary references error.
    pub deleted_tables: HashMap<String, bool>,

    /// Dependency edges between `@RECREATE(group)` groups: a group
    /// depends on another if one of its tables FKs into the other
    /// group's tables.
    pub recreate_group_deps: HashMap<String, Vec<String>>,

    pub ad_hoc_migrations: Vec<String>,
    pub deployable_validations: Vec<String>,

    /// Global notnull-improvement table (§3.3), keyed by a flow-path
    /// independent canonical name — distinct from the per-analysis
    /// [`super::flow::FlowStack`], which is scoped to one statement list.
    pub notnull_improvements: SymbolTable<bool>,
}

impl SchemaRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cleanup(&mut self) {
        *self = Self::default();
    }

    pub fn mark_deleted(&mut self, table: &str) {
        self.deleted_tables.insert(table.to_ascii_lowercase(), true);
    }

    pub fn is_deleted(&self, table: &str) -> bool {
        self.deleted_tables.get(&table.to_ascii_lowercase()).copied().unwrap_or(false)
    }

    pub fn add_recreate_dependency(&mut self, group: &str, depends_on: &str) {
        self.recreate_group_deps.entry(group.to_ascii_lowercase()).or_default().push(depends_on.to_ascii_lowercase());
    }
}

/// Validate version ordering across a declaration's collected
/// annotations (§4.4.4): a column's `@CREATE` must not precede its
/// table's, and `@DELETE` must exceed `@CREATE`.
pub fn validate_annotation_order(
    subject: &str,
    anns: &[SchemaAnnotation],
    table_create_version: Option<i32>,
    file: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) {
    let mut create_version = None;
    let mut delete_version = None;
    for ann in anns {
        match ann {
            SchemaAnnotation::Create(v) => create_version = Some(*v),
            SchemaAnnotation::Delete(v) => delete_version = Some(*v),
            SchemaAnnotation::Recreate => {}
        }
    }
    if let (Some(table_v), Some(col_v)) = (table_create_version, create_version) {
        if col_v < table_v {
            diagnostics
                .error(file.to_owned(), line, format!("'{}' has @CREATE({}) earlier than its table's @CREATE({})", subject, col_v, table_v))
                .subject(subject.to_owned())
                .emit();
        }
    }
    if let (Some(c), Some(d)) = (create_version, delete_version) {
        if d <= c {
            diagnostics
                .error(file.to_owned(), line, format!("'{}' has @DELETE({}) not greater than its @CREATE({})", subject, d, c))
                .subject(subject.to_owned())
                .emit();
        }
    }
}

/// "Previous schema" regression check (§4.4.4): a new `@CREATE` column
/// may not appear at a version at or below the reference snapshot's max.
pub fn validate_against_previous_schema(
    subject: &str,
    create_version: Option<i32>,
    previous_schema_max_version: i32,
    file: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) {
    if let Some(v) = create_version {
        if v <= previous_schema_max_version {
            diagnostics
                .error(
                    file.to_owned(),
                    line,
                    format!(
                        "'{}' @CREATE({}) is not greater than the previous schema's max version ({})",
                        subject, v, previous_schema_max_version
                    ),
                )
                .subject(subject.to_owned())
                .emit();
        }
    }
}

/// `@schema_upgrade_version` visibility check (§4.4.4, §8 scenario 4): a
/// schema object whose `@CREATE` version exceeds the compilation's
/// declared upgrade version hasn't been introduced yet in this build.
pub fn validate_schema_upgrade_visibility(
    subject: &str,
    create_version: Option<i32>,
    schema_upgrade_version: Option<i32>,
    file: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) {
    if let (Some(cv), Some(uv)) = (create_version, schema_upgrade_version) {
        if cv > uv {
            diagnostics
                .error(
                    file.to_owned(),
                    line,
                    format!(
                        "'{}' is introduced at @CREATE({}) which is not visible at schema_upgrade_version({})",
                        subject, cv, uv
                    ),
                )
                .subject(subject.to_owned())
                .emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_create_version_before_table_is_an_error() {
        let mut diag = Diagnostics::new();
        validate_annotation_order("col", &[SchemaAnnotation::Create(1)], Some(2), "t.sql", 1, &mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn delete_not_after_create_is_an_error() {
        let mut diag = Diagnostics::new();
        validate_annotation_order(
            "col",
            &[SchemaAnnotation::Create(3), SchemaAnnotation::Delete(3)],
            None,
            "t.sql",
            1,
            &mut diag,
        );
        assert!(diag.has_errors());
    }

    #[test]
    fn well_ordered_annotations_are_clean() {
        let mut diag = Diagnostics::new();
        validate_annotation_order(
            "col",
            &[SchemaAnnotation::Create(2), SchemaAnnotation::Delete(5)],
            Some(1),
            "t.sql",
            1,
            &mut diag,
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn previous_schema_regression_is_caught() {
        let mut diag = Diagnostics::new();
        validate_against_previous_schema("col", Some(4), 4, "t.sql", 1, &mut diag);
        assert!(diag.has_errors());
        let mut diag2 = Diagnostics::new();
        validate_against_previous_schema("col", Some(5), 4, "t.sql", 1, &mut diag2);
        assert!(diag2.is_empty());
    }

    #[test]
    fn create_version_beyond_upgrade_version_is_an_error() {
        let mut diag = Diagnostics::new();
        validate_schema_upgrade_visibility("t", Some(2), Some(1), "t.sql", 1, &mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn create_version_at_or_below_upgrade_version_is_clean() {
        let mut diag = Diagnostics::new();
        validate_schema_upgrade_visibility("t", Some(1), Some(1), "t.sql", 1, &mut diag);
        assert!(diag.is_empty());
    }

    #[test]
    fn deleted_table_is_flagged_but_stays_registered() {
        let mut reg = SchemaRegistries::new();
        reg.tables.insert("Foo", NodeId::from_raw(0));
        reg.mark_deleted("foo");
        assert!(reg.tables.contains("FOO"));
        assert!(reg.is_deleted("Foo"));
    }
}
