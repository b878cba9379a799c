//! Request context capture behind an injectable provider.

use std::net::IpAddr;

use sentry_core::protocol::{Map, Value};

use crate::converters::is_truthy;
use crate::masking::mask_paths;
use crate::record::BoxError;

/// Read-only access to the host environment a batch is flushed in.
///
/// The route never touches process globals itself; everything it knows about
/// the current request, session and server environment comes through this
/// trait. Implementations are expected to be cheap snapshots, the route
/// queries them once per record.
pub trait ContextProvider: Send + Sync {
    /// Returns the named variable group, if the environment tracks it.
    ///
    /// Conventional group names are `query`, `form`, `files`, `cookies`,
    /// `session` and `server`, but implementations are free to expose any
    /// names; the route's include list selects from them.
    fn var_group(&self, name: &str) -> Option<Value>;

    /// The address the active request originated from, if any.
    fn remote_addr(&self) -> Option<IpAddr> {
        None
    }

    /// The authenticated session user, or `Ok(None)` for guests.
    ///
    /// Errors are treated the same as `Ok(None)`: user enrichment is best
    /// effort and must never block delivery.
    fn session_user(&self) -> Result<Option<SessionUser>, BoxError> {
        Ok(None)
    }
}

/// Identity of an authenticated session user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUser {
    /// Stable identifier of the user account.
    pub id: Option<String>,
    /// Human-readable display name.
    pub name: Option<String>,
}

/// Captures the provider's variable groups as redacted context data.
///
/// Every group named on the include list is fetched once, filtered down to
/// the included keys, masked with [`mask_paths`] and pruned of groups that
/// end up empty. Include entries take three forms: `group` takes a whole
/// group, `group.key` takes one nested value, and `!group.key` removes a
/// value taken by an earlier entry. Includes apply in order, exclusions
/// afterwards.
pub fn collect_context(
    provider: &dyn ContextProvider,
    log_vars: &[String],
    mask_vars: &[String],
) -> Map<String, Value> {
    let mut source = Map::new();
    for entry in log_vars {
        let name = entry.strip_prefix('!').unwrap_or(entry);
        let name = name.split_once('.').map_or(name, |(head, _)| head);
        if !source.contains_key(name) {
            if let Some(value) = provider.var_group(name) {
                source.insert(name.to_owned(), value);
            }
        }
    }

    let mut context = filter_var_groups(&source, log_vars);
    mask_paths(&mut context, mask_vars);

    match context {
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, value)| is_truthy(value))
            .collect(),
        _ => Map::new(),
    }
}

/// Renders captured context groups as a single preformatted text block.
///
/// Each group becomes a `$name = <pretty-printed JSON>` section; sections
/// are separated by blank lines.
pub fn format_context_text(groups: &Map<String, Value>) -> String {
    let mut blocks = Vec::with_capacity(groups.len());
    for (name, value) in groups {
        let dump = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        blocks.push(format!("${name} = {dump}"));
    }
    blocks.join("\n\n")
}

fn filter_var_groups(source: &Map<String, Value>, log_vars: &[String]) -> Value {
    let mut result = Value::Object(Default::default());
    let mut exclusions = Vec::new();

    for entry in log_vars {
        if let Some(path) = entry.strip_prefix('!') {
            exclusions.push(path);
            continue;
        }
        let mut segments = entry.split('.');
        let mut node = match segments.next().and_then(|head| source.get(head)) {
            Some(group) => group,
            None => continue,
        };
        let mut resolved = true;
        for segment in segments {
            match node.get(segment) {
                Some(child) => node = child,
                None => {
                    resolved = false;
                    break;
                }
            }
        }
        if resolved {
            set_path(&mut result, entry, node.clone());
        }
    }

    for path in exclusions {
        remove_path(&mut result, path);
    }
    result
}

fn set_path(target: &mut Value, path: &str, value: Value) {
    let mut node = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Value::Object(map) = node else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_owned(), value);
            return;
        }
        node = map
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Default::default()));
    }
}

fn remove_path(target: &mut Value, path: &str) {
    let mut node = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Value::Object(map) = node else {
            return;
        };
        if segments.peek().is_none() {
            map.remove(segment);
            return;
        }
        match map.get_mut(segment) {
            Some(child) => node = child,
            None => return,
        }
    }
}
