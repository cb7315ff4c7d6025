//! Symbol tables (C2): case-insensitive, insertion-order-preserving maps
//! used for scopes, schema registries, and dispatch tables.

use indexmap::IndexMap;

/// Normalizes a key for case-insensitive lookup while preserving the
/// original spelling for display (§3.2 "Name: the canonical
/// (case-preserved) identifier").
fn normalize(key: &str) -> String {
    key.to_ascii_lowercase()
}

/// A case-insensitive, insertion-order-preserving symbol table.
///
/// Duplicate inserts return `false` and leave the existing value in
/// place; lookups are case-insensitive. Iteration order matches
/// insertion order, which is required for deterministic output (§5).
#[derive(Debug, Clone)]
pub struct SymbolTable<V> {
    // normalized key -> (canonical-case key, value)
    entries: IndexMap<String, (String, V)>,
}

impl<V> Default for SymbolTable<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> SymbolTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`. Returns `false` without modifying the
    /// table if `key` already exists (case-insensitively).
    pub fn insert(&mut self, key: &str, value: V) -> bool {
        let norm = normalize(key);
        if self.entries.contains_key(&norm) {
            return false;
        }
        self.entries.insert(norm, (key.to_owned(), value));
        true
    }

    /// Insert, overwriting any existing entry under `key`. Used by
    /// registries where a later redefinition is meant to shadow (e.g.
    /// `@DELETE`d tables kept for CTE shadowing, §3.3).
    pub fn insert_overwrite(&mut self, key: &str, value: V) {
        let norm = normalize(key);
        self.entries.insert(norm, (key.to_owned(), value));
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&normalize(key)).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(&normalize(key)).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order, yielding the canonical-case key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.shift_remove(&normalize(key)).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A stack of nested scopes for lexical lookup (proc-local variables, arg
/// bundles, cursor fields, CTE scopes). Lookup walks from the innermost
/// scope outward.
#[derive(Debug)]
pub struct ScopeStack<V> {
    scopes: Vec<SymbolTable<V>>,
}

impl<V> Default for ScopeStack<V> {
    fn default() -> Self {
        Self { scopes: vec![SymbolTable::new()] }
    }
}

impl<V> ScopeStack<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(SymbolTable::new());
    }

    /// Pop the innermost scope. Acts as the "cleanup registry" (§4.2):
    /// transient per-proc / per-block tables are freed on scope exit.
    pub fn pop_scope(&mut self) -> Option<SymbolTable<V>> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Insert into the innermost scope only.
    pub fn insert_local(&mut self, key: &str, value: V) -> bool {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(key, value)
    }

    /// Look up `key`, innermost scope first.
    pub fn lookup(&self, key: &str) -> Option<&V> {
        self.scopes.iter().rev().find_map(|s| s.get(key))
    }

    /// True if `key` is bound in the innermost scope specifically (used
    /// to detect shadowing/redeclaration within one block).
    pub fn is_local(&self, key: &str) -> bool {
        self.scopes
            .last()
            .map(|s| s.contains(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_lookup_preserves_case() {
        let mut t = SymbolTable::new();
        assert!(t.insert("MyTable", 1));
        assert!(!t.insert("mytable", 2), "duplicate insert must fail");
        assert_eq!(t.get("MYTABLE"), Some(&1));
        let (k, _) = t.iter().next().unwrap();
        assert_eq!(k, "MyTable");
    }

    #[test]
    fn insertion_order_preserved() {
        let mut t = SymbolTable::new();
        t.insert("b", 1);
        t.insert("a", 2);
        t.insert("c", 3);
        let keys: Vec<_> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn scope_stack_shadows_inner_first() {
        let mut s: ScopeStack<i32> = ScopeStack::new();
        s.insert_local("x", 1);
        s.push_scope();
        s.insert_local("x", 2);
        assert_eq!(s.lookup("x"), Some(&2));
        s.pop_scope();
        assert_eq!(s.lookup("x"), Some(&1));
    }
}
