use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::format_request_seq_hex;

const COMPLETION_ID_PREFIX: &str = "chatcmpl-";

/// Per-process source of request UUIDs and response ids.
///
/// A random seed makes ids from different processes unlikely to collide; the
/// counter keeps them unique within one process.
pub(crate) struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            seed: fastrand::u128(..),
            counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub(crate) fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        uuid::Uuid::from_u128(self.seed ^ u128::from(request_seq))
    }

    /// `chatcmpl-<16 hex>` response id for `request_seq`.
    #[must_use]
    pub(crate) fn completion_id(&self, request_seq: u64) -> String {
        // Truncation keeps the low 64 bits of the mixed seed.
        #[allow(clippy::cast_possible_truncation)]
        let mixed = (self.seed as u64) ^ request_seq;
        format_request_seq_hex(COMPLETION_ID_PREFIX, mixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_per_sequence() {
        let ids = RequestIdGenerator::new();
        let a = ids.next_seq();
        let b = ids.next_seq();
        assert_ne!(a, b);
        assert_ne!(ids.request_uuid(a), ids.request_uuid(b));
        assert_ne!(ids.completion_id(a), ids.completion_id(b));
    }

    #[test]
    fn test_completion_id_shape() {
        let id = RequestIdGenerator::new().completion_id(7);
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 16);
    }
}
