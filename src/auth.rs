use http::header::AUTHORIZATION;

/// Extract a client-supplied key from `Authorization: Bearer <key>`.
///
/// A missing header, a non-Bearer scheme or an empty key yields `None`.
#[must_use]
pub fn extract_bearer_key(headers: &http::HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}
