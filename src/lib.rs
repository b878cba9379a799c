//! Routes batched log records from a host logging framework to Sentry.
//!
//! Batch-oriented loggers collect records while a request is served and
//! flush them through their routes at the end. This crate provides such a
//! route for Sentry: every flushed record is normalized into an event,
//! enriched with redacted request context and session user information, and
//! captured on the current hub inside its own scope.
//!
//! Three payload shapes are understood. Plain text has inline call-site
//! suffixes stripped from the message and call-stack text parsed back into a
//! structured stack trace. Structured key/value data has the reserved keys
//! `msg`, `message` and `tags` split out, with the remaining fields attached
//! as extras. Captured errors are reported through the error-capture path
//! and keep their own exception chain.
//!
//! # Examples
//!
//! ```
//! use sentry_logroute::{LogRecord, RecordLevel, SentryLogRoute};
//!
//! let route = SentryLogRoute::new()
//!     .mask_vars(["server.HTTP_AUTHORIZATION", "server.HTTP_COOKIE"]);
//!
//! let records = vec![LogRecord::new(
//!     "database connection lost in /srv/app/db.php:114",
//!     RecordLevel::Error,
//!     "application.db",
//!     1_700_000_000.25,
//! )];
//!
//! // One captured event per record; without an initialized client the
//! // whole batch is skipped.
//! route.process_batch(&records);
//! ```

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]

mod context;
mod converters;
mod masking;
mod parse;
mod record;
mod router;

pub use crate::context::{collect_context, format_context_text, ContextProvider, SessionUser};
pub use crate::converters::convert_record_level;
pub use crate::masking::{mask_paths, MASK};
pub use crate::parse::parse_stacktrace;
pub use crate::record::{BoxError, LogPayload, LogRecord, RecordLevel};
pub use crate::router::{ContextMode, NameAttribute, SentryLogRoute};

pub use sentry_core::protocol::{Frame, Level, Map, Stacktrace, User, Value};
