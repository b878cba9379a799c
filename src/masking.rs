//! In-place masking of sensitive values in nested key/value structures.

use sentry_core::protocol::Value;

/// The token masked values are replaced with.
pub const MASK: &str = "***";

/// Masks every value reachable through one of the given dotted paths.
///
/// Paths descend nested mappings key by key, so `server.HTTP_AUTHORIZATION`
/// replaces the `HTTP_AUTHORIZATION` entry inside the `server` mapping while
/// a single-segment path masks a whole group. Only non-null values are
/// replaced; paths that do not resolve are skipped. Masking an already
/// masked structure changes nothing.
pub fn mask_paths<S: AsRef<str>>(target: &mut Value, paths: &[S]) {
    for path in paths {
        mask_path(target, path.as_ref());
    }
}

fn mask_path(target: &mut Value, path: &str) {
    let mut node = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Value::Object(map) = node else {
            return;
        };
        let Some(child) = map.get_mut(segment) else {
            return;
        };
        if segments.peek().is_none() {
            if !child.is_null() {
                *child = Value::String(MASK.into());
            }
            return;
        }
        node = child;
    }
}
