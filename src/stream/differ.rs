/// Delta between two successive cumulative snapshots.
///
/// When `current` extends `previous` the delta is the new suffix. Otherwise
/// the upstream restarted or corrected its output, and the whole of
/// `current` is the delta.
#[must_use]
pub fn diff<'a>(previous: &str, current: &'a str) -> &'a str {
    current.strip_prefix(previous).unwrap_or(current)
}

/// Per-session differ state for cumulative backends.
#[derive(Debug, Default)]
pub struct IncrementalDiffer {
    last_seen: String,
}

impl IncrementalDiffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` as the latest cumulative text and return the delta
    /// to emit for it.
    pub fn advance(&mut self, snapshot: String) -> String {
        let delta = diff(&self.last_seen, &snapshot).to_string();
        if !self.last_seen.is_empty() && delta.len() == snapshot.len() {
            tracing::debug!(
                previous_len = self.last_seen.len(),
                current_len = snapshot.len(),
                "cumulative snapshot does not extend previous text; emitting it whole"
            );
        }
        self.last_seen = snapshot;
        delta
    }

    #[must_use]
    pub fn last_seen(&self) -> &str {
        &self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_prefix_and_identity() {
        assert_eq!(diff("He", "Hello"), "llo");
        assert_eq!(diff("", "H"), "H");
        assert_eq!(diff("Hello", "Hello"), "");
        assert_eq!(diff("abc", "abc"), diff("abc", "abc"));
    }

    #[test]
    fn test_diff_non_prefix_yields_whole_snapshot() {
        assert_eq!(diff("Hello", "Goodbye"), "Goodbye");
        assert_eq!(diff("Hello world", "Hello"), "Hello");
    }

    #[test]
    fn test_advance_reconstructs_growing_snapshots() {
        let mut differ = IncrementalDiffer::new();
        let deltas: Vec<String> = ["H", "He", "Hello", "Hello", "Hello, world"]
            .into_iter()
            .map(|s| differ.advance(s.to_string()))
            .collect();
        assert_eq!(deltas, vec!["H", "e", "llo", "", ", world"]);
        assert_eq!(deltas.concat(), "Hello, world");
        assert_eq!(differ.last_seen(), "Hello, world");
    }

    #[test]
    fn test_advance_restart_replaces_stale_prefix() {
        let mut differ = IncrementalDiffer::new();
        assert_eq!(differ.advance("Hello".into()), "Hello");
        assert_eq!(differ.advance("Goodbye".into()), "Goodbye");
        assert_eq!(differ.advance("Goodbye!".into()), "!");
    }

    #[test]
    fn test_multibyte_prefix_boundaries() {
        let mut differ = IncrementalDiffer::new();
        assert_eq!(differ.advance("caf".into()), "caf");
        assert_eq!(differ.advance("caf\u{e9} \u{1f600}".into()), "\u{e9} \u{1f600}");
    }
}
