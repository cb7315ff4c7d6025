//! Flow-analysis state (§3.4, §4.4.2): nullability improvements tracked
//! per control-flow context, with specialized handling for loop bodies
//! (two-pass conservative reanalysis) and try/catch.

use std::collections::HashSet;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContextKind {
    Plain,
    Branch,
    Jump,
}

struct FlowContext {
    kind: ContextKind,
    improved: HashSet<String>,
}

/// Stack of nested flow contexts. Lookup walks from the innermost
/// context outward, same shape as [`sqlpl_core::ScopeStack`] but for
/// improvement sets rather than declarations, since an improvement and
/// a declaration have different lifetimes.
pub struct FlowStack {
    contexts: Vec<FlowContext>,
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Default for FlowStack {
    fn default() -> Self {
        Self { contexts: vec![FlowContext { kind: ContextKind::Plain, improved: HashSet::new() }] }
    }
}

impl FlowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ContextKind) {
        self.contexts.push(FlowContext { kind, improved: HashSet::new() });
    }

    /// Pop the innermost context, discarding its improvements (§4.4.2
    /// "On normal exit of a `then` branch they drop").
    pub fn pop(&mut self) {
        if self.contexts.len() > 1 {
            self.contexts.pop();
        }
    }

    pub fn is_improved(&self, name: &str) -> bool {
        let key = normalize(name);
        self.contexts.iter().rev().any(|c| c.improved.contains(&key))
    }

    pub fn improve(&mut self, name: &str) {
        let key = normalize(name);
        self.contexts.last_mut().expect("flow stack is never empty").improved.insert(key);
    }

    /// Assignment to `x` invalidates every improvement mentioning `x`,
    /// across every live context (§4.4.2 "Assignments to `x` invalidate
    /// all improvements mentioning `x`").
    pub fn invalidate(&mut self, name: &str) {
        let key = normalize(name);
        for ctx in &mut self.contexts {
            ctx.improved.remove(&key);
        }
    }

    /// Intersect the innermost context's improvements with `other` in
    /// place, keeping only what survived every branch arm (§4.4.2 "on
    /// exit of the whole `if` we keep only improvements that survived
    /// every path that falls through").
    pub fn intersect_into_parent(&mut self, arm_survivors: &HashSet<String>) {
        if let Some(parent) = self.contexts.last_mut() {
            parent.improved = parent.improved.intersection(arm_survivors).cloned().collect();
        }
    }

    /// Snapshot of the innermost context's improvements, for merging
    /// across sibling branch arms.
    pub fn snapshot(&self) -> HashSet<String> {
        self.contexts.last().map(|c| c.improved.clone()).unwrap_or_default()
    }

    pub fn current_kind(&self) -> ContextKind {
        self.contexts.last().map(|c| c.kind).unwrap_or(ContextKind::Plain)
    }

    /// Every name improved in any live context, innermost or not. Used by
    /// the loop-body two-pass analysis (§4.4.2) to diff what a first pass
    /// unset before committing to a second, real pass.
    pub fn all_improved(&self) -> HashSet<String> {
        self.contexts.iter().flat_map(|c| c.improved.iter().cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn improvement_is_visible_then_drops_on_pop() {
        let mut s = FlowStack::new();
        s.push(ContextKind::Branch);
        s.improve("x");
        assert!(s.is_improved("x"));
        s.pop();
        assert!(!s.is_improved("x"));
    }

    #[test]
    fn assignment_invalidates_improvement_in_every_context() {
        let mut s = FlowStack::new();
        s.improve("x");
        s.push(ContextKind::Branch);
        s.improve("x");
        s.invalidate("x");
        assert!(!s.is_improved("x"));
        s.pop();
        assert!(!s.is_improved("x"));
    }

    #[test]
    fn if_with_no_else_keeps_no_improvement_in_parent_after_intersect() {
        // `if x is not null then ... end if;` with no else: the parent
        // only keeps an improvement that every path (including the
        // implicit empty else) agrees on, so nothing survives here.
        let mut s = FlowStack::new();
        s.push(ContextKind::Branch);
        s.improve("x");
        let then_survivors = s.snapshot();
        s.pop();
        let else_survivors: HashSet<String> = HashSet::new();
        let merged: HashSet<String> = then_survivors.intersection(&else_survivors).cloned().collect();
        s.intersect_into_parent(&merged);
        assert!(!s.is_improved("x"));
    }
}
