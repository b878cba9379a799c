use std::error::Error;
use std::fmt;

use sentry_core::protocol::{Context, Event, Map, User, Value, Values};
use sentry_core::{Hub, Scope};

use crate::context::{collect_context, format_context_text, ContextProvider};
use crate::converters::{
    convert_record_level, exceptions_from_error, is_truthy, timestamp_to_system_time,
    value_to_string,
};
use crate::parse::{parse_stacktrace, strip_call_sites};
use crate::record::{LogPayload, LogRecord};

type EnrichCallback<T> = Box<dyn Fn(&LogPayload, T) -> T + Send + Sync>;

/// Which attribute of the sentry user record carries the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameAttribute {
    /// Store the display name as `username`.
    #[default]
    Username,
    /// Store the display name as a custom `name` attribute.
    Name,
}

/// How captured variable groups are attached to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    /// One named context block per variable group.
    #[default]
    Grouped,
    /// A single preformatted `context` extra containing all groups.
    Text,
}

/// Routes batches of host-framework log records to sentry.
///
/// Every record in a batch becomes one captured event on the current hub.
/// Records are processed in batch order and each one is normalized and
/// captured inside its own scope, so nothing set for one record is visible
/// to the next.
pub struct SentryLogRoute {
    /// If set to `true`, request context is captured onto events.
    /// (defaults to `true`)
    pub context: bool,
    /// Variable groups included in the captured context.
    ///
    /// Entries take the forms `group`, `group.key` and `!group.key`; see
    /// [`collect_context`].
    pub log_vars: Vec<String>,
    /// Dotted paths whose values are masked before they leave the process.
    pub mask_vars: Vec<String>,
    /// If set to `true`, the record timestamp is used as the event timestamp
    /// and attached as a `timestamp` extra. (defaults to `true`)
    pub include_timestamp: bool,
    /// Which user attribute carries the session user's display name.
    pub name_attribute: NameAttribute,
    /// How captured context groups are delivered.
    pub context_mode: ContextMode,

    provider: Option<Box<dyn ContextProvider>>,
    extra_callback: Option<EnrichCallback<Map<String, Value>>>,
    user_callback: Option<EnrichCallback<User>>,
    tags_callback: Option<EnrichCallback<Map<String, Value>>>,
}

impl Default for SentryLogRoute {
    fn default() -> Self {
        Self {
            context: true,
            log_vars: ["query", "form", "files", "session", "server"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            mask_vars: [
                "server.HTTP_AUTHORIZATION",
                "server.PHP_AUTH_USER",
                "server.PHP_AUTH_PW",
                "server.HTTP_COOKIE",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            include_timestamp: true,
            name_attribute: NameAttribute::default(),
            context_mode: ContextMode::default(),
            provider: None,
            extra_callback: None,
            user_callback: None,
            tags_callback: None,
        }
    }
}

impl fmt::Debug for SentryLogRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct Provider;
        let provider = self.provider.as_ref().map(|_| Provider);

        f.debug_struct("SentryLogRoute")
            .field("context", &self.context)
            .field("log_vars", &self.log_vars)
            .field("mask_vars", &self.mask_vars)
            .field("include_timestamp", &self.include_timestamp)
            .field("name_attribute", &self.name_attribute)
            .field("context_mode", &self.context_mode)
            .field("provider", &provider)
            .finish()
    }
}

impl SentryLogRoute {
    /// Creates a route with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables context capture.
    pub fn context(mut self, context: bool) -> Self {
        self.context = context;
        self
    }

    /// Replaces the include list of captured variable groups.
    pub fn log_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the list of masked variable paths.
    pub fn mask_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches or omits the record timestamp on outgoing events.
    pub fn include_timestamp(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    /// Selects the attribute carrying the session user's display name.
    pub fn name_attribute(mut self, attribute: NameAttribute) -> Self {
        self.name_attribute = attribute;
        self
    }

    /// Selects how captured context groups are delivered.
    pub fn context_mode(mut self, mode: ContextMode) -> Self {
        self.context_mode = mode;
        self
    }

    /// Installs the provider the route reads request state from.
    ///
    /// Without a provider, user enrichment and context capture are skipped.
    pub fn provider<P>(mut self, provider: P) -> Self
    where
        P: ContextProvider + 'static,
    {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Sets a transformation applied to the extras of every record.
    ///
    /// The callback receives the raw record payload and the extras assembled
    /// so far, and returns the extras to use instead.
    pub fn extra_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LogPayload, Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.extra_callback = Some(Box::new(callback));
        self
    }

    /// Sets a transformation applied to the user of every record.
    pub fn user_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LogPayload, User) -> User + Send + Sync + 'static,
    {
        self.user_callback = Some(Box::new(callback));
        self
    }

    /// Sets a transformation applied to the tags of every record.
    pub fn tags_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LogPayload, Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.tags_callback = Some(Box::new(callback));
        self
    }

    /// Processes one batch of records, in order.
    ///
    /// Without an enabled client on the current hub the whole batch is
    /// skipped and a diagnostic is emitted through [`log`].
    pub fn process_batch(&self, records: &[LogRecord]) {
        if records.is_empty() {
            return;
        }
        let enabled =
            Hub::with_active(|hub| hub.client().map_or(false, |client| client.is_enabled()));
        if !enabled {
            log::trace!(
                "no enabled sentry client bound to the current hub, skipping {} log records",
                records.len()
            );
            return;
        }
        for record in records {
            let (scope_data, capture) = self.normalize(record);
            sentry_core::with_scope(
                move |scope| scope_data.apply(scope),
                move || capture.dispatch(),
            );
        }
    }

    fn normalize<'a>(&self, record: &'a LogRecord) -> (ScopeData, CaptureData<'a>) {
        let mut message = String::new();
        let mut stacktrace = None;
        let mut exceptions = Values::new();
        let mut user = User::default();
        let mut tags = Map::new();
        let mut extra = Map::new();

        tags.insert("category".to_owned(), Value::from(record.category.as_str()));
        if self.include_timestamp {
            extra.insert("timestamp".to_owned(), Value::from(record.timestamp));
        }

        if let Some(provider) = &self.provider {
            if let Some(addr) = provider.remote_addr() {
                user.ip_address = Some(addr.into());
            }
            if let Ok(Some(session)) = provider.session_user() {
                user.id = session.id;
                if let Some(name) = session.name {
                    match self.name_attribute {
                        NameAttribute::Username => user.username = Some(name),
                        NameAttribute::Name => {
                            user.other.insert("name".to_owned(), Value::from(name));
                        }
                    }
                }
            }
        }

        match &record.payload {
            // Dispatched through the error-capture path below; the error
            // carries its own message and chain.
            LogPayload::Exception(_) => {}
            LogPayload::Structured { fields, exception } => {
                let mut fields = fields.clone();
                if let Some(value) = fields.remove("msg") {
                    message = value_to_string(&value);
                }
                if let Some(value) = fields.remove("message") {
                    message = value_to_string(&value);
                }
                // A non-mapping tags value is dropped along with the
                // reserved key.
                if let Some(Value::Object(map)) = fields.remove("tags") {
                    for (key, value) in map {
                        tags.insert(key, value);
                    }
                }
                if let Some(error) = exception {
                    exceptions = exceptions_from_error(error.as_ref());
                }
                for (key, value) in fields {
                    extra.insert(key, value);
                }
            }
            LogPayload::Text(text) => {
                let first_line = text.trim_start().lines().next().unwrap_or("");
                message = strip_call_sites(first_line);
                extra.insert("full_message".to_owned(), Value::from(text.as_str()));
                stacktrace = parse_stacktrace(text);
            }
        }

        let mut contexts = Vec::new();
        if self.context {
            if let Some(provider) = &self.provider {
                let groups = collect_context(provider.as_ref(), &self.log_vars, &self.mask_vars);
                match self.context_mode {
                    ContextMode::Grouped => {
                        contexts = groups
                            .into_iter()
                            .map(|(name, value)| (name, context_from_value(value)))
                            .collect();
                    }
                    ContextMode::Text => {
                        if !groups.is_empty() {
                            extra.insert(
                                "context".to_owned(),
                                Value::from(format_context_text(&groups)),
                            );
                        }
                    }
                }
            }
        }

        if let Some(callback) = &self.extra_callback {
            extra = callback(&record.payload, extra);
        }
        if let Some(callback) = &self.user_callback {
            user = callback(&record.payload, user);
        }
        if let Some(callback) = &self.tags_callback {
            tags = callback(&record.payload, tags);
        }

        let scope_data = ScopeData {
            user,
            tags,
            extra,
            contexts,
        };
        let capture = match &record.payload {
            LogPayload::Exception(error) => CaptureData::Exception(error.as_ref()),
            _ => {
                let mut event = Event {
                    message: Some(message),
                    level: convert_record_level(&record.level),
                    stacktrace,
                    exception: exceptions,
                    ..Default::default()
                };
                if self.include_timestamp {
                    if let Some(timestamp) = timestamp_to_system_time(record.timestamp) {
                        event.timestamp = timestamp;
                    }
                }
                CaptureData::Event(event)
            }
        };
        (scope_data, capture)
    }
}

struct ScopeData {
    user: User,
    tags: Map<String, Value>,
    extra: Map<String, Value>,
    contexts: Vec<(String, Context)>,
}

impl ScopeData {
    fn apply(self, scope: &mut Scope) {
        scope.set_user(Some(self.user));
        for (key, value) in self.extra {
            scope.set_extra(&key, value);
        }
        for (key, value) in self.tags {
            if is_truthy(&value) {
                scope.set_tag(&key, value_to_string(&value));
            }
        }
        for (name, context) in self.contexts {
            scope.set_context(&name, context);
        }
    }
}

#[allow(clippy::large_enum_variant)]
enum CaptureData<'a> {
    Exception(&'a (dyn Error + Send + Sync + 'static)),
    Event(Event<'static>),
}

impl CaptureData<'_> {
    fn dispatch(self) {
        match self {
            CaptureData::Exception(error) => {
                sentry_core::capture_error(error);
            }
            CaptureData::Event(event) => {
                sentry_core::capture_event(event);
            }
        }
    }
}

fn context_from_value(value: Value) -> Context {
    match value {
        Value::Object(map) => Context::Other(map.into_iter().collect()),
        other => {
            let mut map = Map::new();
            map.insert("value".to_owned(), other);
            Context::Other(map)
        }
    }
}
