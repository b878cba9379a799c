// Runs in its own test binary so no client is ever bound on this process.

use sentry_logroute::{LogPayload, LogRecord, RecordLevel, SentryLogRoute};

#[test]
fn batches_without_a_client_are_skipped() {
    let route = SentryLogRoute::new().extra_callback(|_, extra| extra);
    let records = vec![
        LogRecord::new(
            "left behind in /srv/app/a.php:1",
            RecordLevel::Error,
            "application",
            1_700_000_000.5,
        ),
        LogRecord::new(
            LogPayload::exception(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
            RecordLevel::Error,
            "application",
            1_700_000_000.5,
        ),
    ];

    route.process_batch(&records);
    assert_eq!(sentry::Hub::current().last_event_id(), None);
}
