/// Cross-path duplicate-emission guard.
///
/// A tool call can surface through the inline token parser, the structured
/// delta accumulator, or both. Two key spaces prevent a logically identical
/// call from being reported twice:
/// - identity keys `name:index`, used when the inline encoding carries an
///   explicit index (identity takes precedence over argument equality);
/// - canonical keys `name:<canonical-json-args>`, shared by both paths in
///   both directions.
use rustc_hash::FxHashSet;

use crate::util::canonical_call_key;

#[derive(Debug, Default)]
pub(crate) struct EmittedCallGuard {
    canonical_keys: FxHashSet<String>,
    identity_keys: FxHashSet<String>,
}

impl EmittedCallGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim an inline-parsed call. Returns false when the same identity or
    /// the same name+arguments was already emitted.
    pub(crate) fn claim_inline(
        &mut self,
        name: &str,
        index: Option<u32>,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let canonical = canonical_call_key(name, arguments);
        if let Some(index) = index {
            let identity = format!("{name}:{index}");
            if !self.identity_keys.insert(identity) {
                return false;
            }
        } else if self.canonical_keys.contains(&canonical) {
            return false;
        }
        self.canonical_keys.insert(canonical);
        true
    }

    /// Claim a structured-delta call. Returns false when the same
    /// name+arguments already went out through either path.
    pub(crate) fn claim_structured(
        &mut self,
        name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        self.canonical_keys
            .insert(canonical_call_key(name, arguments))
    }

    pub(crate) fn clear(&mut self) {
        self.canonical_keys.clear();
        self.identity_keys.clear();
    }
}
