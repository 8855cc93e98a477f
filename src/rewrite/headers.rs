//! Internal header filtering.
//!
//! Headers whose name starts with [`INTERNAL_HEADER_PREFIX`] carry data
//! between chain links and must not leak to an origin unless the link is
//! configured to preserve them. `http::HeaderName` is always lowercase, so a
//! lowercase prefix comparison is case-insensitive with respect to the wire.

use axum::http::HeaderMap;

/// Reserved prefix for chain-internal headers.
pub const INTERNAL_HEADER_PREFIX: &str = "x-chain-internal-";

/// Returns true if `name` carries the internal prefix (ASCII case-insensitive).
pub fn is_internal_header(name: &str) -> bool {
    name.len() >= INTERNAL_HEADER_PREFIX.len()
        && name.as_bytes()[..INTERNAL_HEADER_PREFIX.len()]
            .eq_ignore_ascii_case(INTERNAL_HEADER_PREFIX.as_bytes())
}

/// Remove every internal header. Returns how many distinct names were dropped.
pub fn strip_internal_headers(headers: &mut HeaderMap) -> usize {
    let internal: Vec<_> = headers
        .keys()
        .filter(|name| is_internal_header(name.as_str()))
        .cloned()
        .collect();

    for name in &internal {
        headers.remove(name);
    }
    internal.len()
}

/// Apply the configured header policy in place.
pub fn apply_header_policy(headers: &mut HeaderMap, preserve_internal: bool) {
    if preserve_internal {
        return;
    }
    let dropped = strip_internal_headers(headers);
    if dropped > 0 {
        tracing::trace!(dropped, "Stripped internal headers");
    }
}
