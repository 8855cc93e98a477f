//! Path rewriting.
//!
//! # Design Decisions
//! - Prefix matching is a literal, case-sensitive string comparison
//! - Trailing slashes on the prefix are insignificant
//! - A path outside the prefix is passed through unchanged, never rejected
//! - Joining always leaves exactly one `/` between base and rest

/// Strip `proxy_path` from the front of `path`.
///
/// Returns `None` when `path` does not start with the prefix. An empty
/// prefix (or `/`) matches everything and strips nothing.
pub fn strip_proxy_path<'a>(path: &'a str, proxy_path: &str) -> Option<&'a str> {
    let prefix = proxy_path.trim_end_matches('/');
    path.strip_prefix(prefix)
}

/// Join a target base path and a residual path with a single separator.
pub fn join_paths(base: &str, rest: &str) -> String {
    match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) => format!("{}/{}", base, rest),
        _ => format!("{}{}", base, rest),
    }
}

/// Compute the outbound path for `request_path`.
pub fn rewrite_path(request_path: &str, proxy_path: &str, target_base: &str) -> String {
    let residual = strip_proxy_path(request_path, proxy_path).unwrap_or(request_path);
    join_paths(target_base, residual)
}
