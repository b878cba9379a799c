use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, UNIX_EPOCH};

use sentry::protocol::{Context, IpAddress, Map, Value};
use sentry::test::with_captured_events;
use serde_json::json;

use sentry_logroute::{
    ContextMode, ContextProvider, LogPayload, LogRecord, NameAttribute, RecordLevel,
    SentryLogRoute, SessionUser,
};

fn text_record(text: &str, level: RecordLevel) -> LogRecord {
    LogRecord::new(text, level, "application", 1_700_000_000.5)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("fixture must be an object, got {other:?}"),
    }
}

struct FakeProvider {
    fail_user: bool,
}

impl ContextProvider for FakeProvider {
    fn var_group(&self, name: &str) -> Option<Value> {
        match name {
            "server" => Some(json!({
                "HTTP_AUTHORIZATION": "Bearer t0ps3cret",
                "PHP_AUTH_PW": "hunter2",
                "REQUEST_METHOD": "POST",
            })),
            "query" => Some(json!({"page": "2"})),
            _ => None,
        }
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
    }

    fn session_user(&self) -> Result<Option<SessionUser>, sentry_logroute::BoxError> {
        if self.fail_user {
            return Err("session store offline".into());
        }
        Ok(Some(SessionUser {
            id: Some("7".into()),
            name: Some("deckard".into()),
        }))
    }
}

#[test]
fn captures_text_records_as_events() {
    let route = SentryLogRoute::new();
    let text = "upstream timed out in /srv/app/components/HttpClient.php:88\n\
                in /srv/app/index.php (12)";
    let events = with_captured_events(|| {
        route.process_batch(&[text_record(text, RecordLevel::Warning)]);
    });

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.message.as_deref(), Some("upstream timed out"));
    assert_eq!(event.level, sentry::Level::Warning);
    assert_eq!(event.tags["category"], "application");
    assert_eq!(event.extra["full_message"], Value::from(text));
    assert_eq!(event.extra["timestamp"], Value::from(1_700_000_000.5));
    assert_eq!(
        event.timestamp,
        UNIX_EPOCH + Duration::from_millis(1_700_000_000_500)
    );

    let trace = event.stacktrace.as_ref().expect("stacktrace expected");
    assert_eq!(trace.frames.len(), 2);
    assert_eq!(
        trace.frames[0].abs_path.as_deref(),
        Some("/srv/app/index.php")
    );
    assert_eq!(trace.frames[0].lineno, Some(12));
    assert_eq!(
        trace.frames[1].abs_path.as_deref(),
        Some("/srv/app/components/HttpClient.php")
    );
    assert_eq!(trace.frames[1].lineno, Some(88));
}

#[test]
fn structured_records_split_reserved_keys() {
    let fields = object(json!({
        "msg": "shadowed",
        "message": "boom",
        "tags": {"a": 1, "disabled": 0},
        "request_id": "r-42",
    }));
    let error = std::io::Error::new(std::io::ErrorKind::Other, "disk offline");
    let record = LogRecord::new(
        LogPayload::Structured {
            fields,
            exception: Some(Box::new(error)),
        },
        RecordLevel::Error,
        "application.db",
        1_700_000_000.5,
    );

    let route = SentryLogRoute::new();
    let events = with_captured_events(|| route.process_batch(&[record]));

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.message.as_deref(), Some("boom"));
    assert_eq!(event.level, sentry::Level::Error);
    assert_eq!(event.tags["a"], "1");
    assert_eq!(event.tags["category"], "application.db");
    assert!(!event.tags.contains_key("disabled"));
    assert_eq!(event.extra["request_id"], Value::from("r-42"));
    assert!(!event.extra.contains_key("msg"));
    assert!(!event.extra.contains_key("message"));
    assert!(!event.extra.contains_key("tags"));
    assert_eq!(event.exception.len(), 1);
    assert_eq!(event.exception[0].value.as_deref(), Some("disk offline"));
}

#[test]
fn non_mapping_tags_values_are_discarded() {
    let fields = object(json!({
        "message": "boom",
        "tags": "not-a-mapping",
        "request_id": "r-42",
    }));
    let record = LogRecord::new(
        LogPayload::structured(fields),
        RecordLevel::Error,
        "application",
        1_700_000_000.5,
    );

    let route = SentryLogRoute::new();
    let events = with_captured_events(|| route.process_batch(&[record]));

    let event = &events[0];
    assert_eq!(event.message.as_deref(), Some("boom"));
    assert!(!event.tags.contains_key("tags"));
    assert_eq!(event.tags["category"], "application");
    assert!(!event.extra.contains_key("tags"));
    assert_eq!(event.extra["request_id"], Value::from("r-42"));
}

#[test]
fn falsy_tag_values_are_dropped() {
    let route = SentryLogRoute::new().tags_callback(|_, mut tags| {
        tags.insert("zero".into(), json!(0));
        tags.insert("empty".into(), json!(""));
        tags.insert("zero_string".into(), json!("0"));
        tags.insert("flag".into(), json!(false));
        tags.insert("missing".into(), Value::Null);
        tags.insert("one".into(), json!(1));
        tags.insert("label".into(), json!("x"));
        tags
    });
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("plain report", RecordLevel::Info)]);
    });

    let tags = &events[0].tags;
    for absent in ["zero", "empty", "zero_string", "flag", "missing"] {
        assert!(!tags.contains_key(absent), "tag {absent} should be dropped");
    }
    assert_eq!(tags["one"], "1");
    assert_eq!(tags["label"], "x");
    assert_eq!(tags["category"], "application");
}

#[test]
fn scope_state_does_not_leak_between_records() {
    let route = SentryLogRoute::new().tags_callback(|payload, mut tags| {
        if let LogPayload::Text(text) = payload {
            if text.contains("first") {
                tags.insert("first_only".into(), json!(true));
            }
        }
        tags
    });
    let events = with_captured_events(|| {
        route.process_batch(&[
            text_record("first record", RecordLevel::Info),
            text_record("second record", RecordLevel::Info),
        ]);
    });

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tags["first_only"], "true");
    assert!(!events[1].tags.contains_key("first_only"));
    assert_eq!(
        events[1].extra["full_message"],
        Value::from("second record")
    );
}

#[test]
fn enriches_events_from_the_provider() {
    let route = SentryLogRoute::new().provider(FakeProvider { fail_user: false });
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("context check", RecordLevel::Info)]);
    });

    let event = &events[0];
    let user = event.user.as_ref().expect("user expected");
    assert_eq!(user.id.as_deref(), Some("7"));
    assert_eq!(user.username.as_deref(), Some("deckard"));
    assert_eq!(
        user.ip_address,
        Some(IpAddress::Exact(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))))
    );

    if let Some(Context::Other(server)) = event.contexts.get("server") {
        assert_eq!(server["HTTP_AUTHORIZATION"], Value::from("***"));
        assert_eq!(server["PHP_AUTH_PW"], Value::from("***"));
        assert_eq!(server["REQUEST_METHOD"], Value::from("POST"));
    } else {
        panic!("expected a server context");
    }
    if let Some(Context::Other(query)) = event.contexts.get("query") {
        assert_eq!(query["page"], Value::from("2"));
    } else {
        panic!("expected a query context");
    }
}

#[test]
fn session_failures_leave_user_enrichment_partial() {
    let route = SentryLogRoute::new().provider(FakeProvider { fail_user: true });
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("session check", RecordLevel::Info)]);
    });

    let user = events[0].user.as_ref().expect("user expected");
    assert_eq!(user.id, None);
    assert_eq!(user.username, None);
    assert!(user.ip_address.is_some());
}

#[test]
fn name_attribute_can_target_a_custom_field() {
    let route = SentryLogRoute::new()
        .provider(FakeProvider { fail_user: false })
        .name_attribute(NameAttribute::Name);
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("naming", RecordLevel::Info)]);
    });

    let user = events[0].user.as_ref().expect("user expected");
    assert_eq!(user.username, None);
    assert_eq!(user.other["name"], Value::from("deckard"));
}

#[test]
fn text_context_mode_renders_a_dump_extra() {
    let route = SentryLogRoute::new()
        .provider(FakeProvider { fail_user: false })
        .context_mode(ContextMode::Text);
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("dump", RecordLevel::Info)]);
    });

    let event = &events[0];
    assert!(event.contexts.is_empty());
    let dump = match &event.extra["context"] {
        Value::String(dump) => dump,
        other => panic!("context extra should be a string, got {other:?}"),
    };
    assert!(dump.contains("$query = "));
    assert!(dump.contains("$server = "));
    assert!(dump.contains("***"));
    assert!(!dump.contains("t0ps3cret"));
    assert!(!dump.contains("hunter2"));
}

#[test]
fn context_capture_can_be_disabled() {
    let route = SentryLogRoute::new()
        .provider(FakeProvider { fail_user: false })
        .context(false);
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("no context", RecordLevel::Info)]);
    });

    let event = &events[0];
    assert!(event.contexts.is_empty());
    assert!(!event.extra.contains_key("context"));
    // User enrichment is independent of context capture.
    assert!(event.user.is_some());
}

#[test]
fn timestamp_can_be_left_to_the_client() {
    let route = SentryLogRoute::new().include_timestamp(false);
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("no timestamp", RecordLevel::Info)]);
    });

    assert!(!events[0].extra.contains_key("timestamp"));
}

#[test]
fn error_payloads_use_the_exception_capture_path() {
    let route = SentryLogRoute::new()
        .provider(FakeProvider { fail_user: false })
        .extra_callback(|_, mut extra| {
            extra.insert("job".into(), json!("indexer"));
            extra
        });
    let error = std::io::Error::new(
        std::io::ErrorKind::Other,
        "permission denied in /srv/app/worker.php:33",
    );
    let record = LogRecord::new(
        LogPayload::exception(error),
        RecordLevel::Warning,
        "application.worker",
        1_700_000_000.5,
    );
    let events = with_captured_events(|| route.process_batch(&[record]));

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(!event.exception.is_empty());
    assert_eq!(
        event.exception[0].value.as_deref(),
        Some("permission denied in /srv/app/worker.php:33")
    );
    // The error text never goes through the message parser.
    assert!(event.stacktrace.is_none());
    assert!(event.message.is_none());
    // Scope enrichment still applies on this path.
    assert_eq!(event.tags["category"], "application.worker");
    assert_eq!(event.extra["job"], Value::from("indexer"));
    let user = event.user.as_ref().expect("user expected");
    assert_eq!(user.id.as_deref(), Some("7"));
}

#[test]
fn callbacks_transform_extra_user_and_tags() {
    let route = SentryLogRoute::new()
        .extra_callback(|_, mut extra| {
            extra.insert("job".into(), json!("report"));
            extra
        })
        .user_callback(|_, mut user| {
            user.id = Some("override".into());
            user
        })
        .tags_callback(|_, mut tags| {
            tags.insert("team".into(), json!("ops"));
            tags
        });
    let events = with_captured_events(|| {
        route.process_batch(&[text_record("callback check", RecordLevel::Info)]);
    });

    let event = &events[0];
    assert_eq!(event.extra["job"], Value::from("report"));
    assert_eq!(event.tags["team"], "ops");
    assert_eq!(
        event.user.as_ref().and_then(|user| user.id.as_deref()),
        Some("override")
    );
}

#[test]
fn empty_batches_are_no_ops() {
    let events = with_captured_events(|| {
        SentryLogRoute::new().process_batch(&[]);
    });
    assert!(events.is_empty());
}
