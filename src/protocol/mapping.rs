use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::canonical::{CanonicalRole, FinishReason};
use crate::config::ModelsConfig;

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

/// Parse an OpenAI wire role. Roles outside the two-party model are rejected.
#[must_use]
pub fn openai_role_to_canonical(s: &str) -> Option<CanonicalRole> {
    match s {
        "system" | "developer" => Some(CanonicalRole::System),
        "user" => Some(CanonicalRole::User),
        "assistant" => Some(CanonicalRole::Assistant),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Stop reason mappings
// ---------------------------------------------------------------------------

/// Map a single-shot completion API stop reason to the canonical one.
///
/// A response without any stop reason carries no structured signal and is
/// reported as `done`.
#[must_use]
pub fn completion_stop_to_canonical(reason: Option<&str>) -> FinishReason {
    match reason {
        None => FinishReason::Done,
        Some("max_tokens") => FinishReason::Length,
        Some("stop_sequence" | "end_turn" | "stop") => FinishReason::Stop,
        Some(other) => {
            tracing::debug!(stop_reason = other, "unknown completion stop reason");
            FinishReason::Stop
        }
    }
}

// ---------------------------------------------------------------------------
// Model mapping
// ---------------------------------------------------------------------------

/// Immutable lookup from canonical model identifiers to backend identifiers.
#[derive(Debug, Clone)]
pub struct ModelMap {
    entries: FxHashMap<String, Arc<str>>,
    fallback: Arc<str>,
}

impl ModelMap {
    #[must_use]
    pub fn new(config: &ModelsConfig) -> Self {
        let entries = config
            .map
            .iter()
            .map(|(canonical, backend)| (canonical.clone(), Arc::from(backend.as_str())))
            .collect();
        Self {
            entries,
            fallback: Arc::from(config.fallback.as_str()),
        }
    }

    /// Backend model for `canonical`, or the fixed fallback when unknown.
    #[must_use]
    pub fn resolve(&self, canonical: &str) -> &str {
        self.entries
            .get(canonical)
            .map_or(self.fallback.as_ref(), AsRef::as_ref)
    }

    /// Canonical identifiers in stable (sorted) order.
    #[must_use]
    pub fn canonical_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ModelMap {
    fn default() -> Self {
        Self::new(&ModelsConfig::default())
    }
}
