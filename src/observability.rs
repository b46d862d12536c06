use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("docweave.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("docweave.client.request_errors");
pub(crate) static CLIENT_REPLAYS: Counter = Counter::new("docweave.client.replays");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("docweave.client.request_duration_seconds");

pub(crate) static SESSION_REFRESHES: Counter = Counter::new("docweave.session.refreshes");
pub(crate) static SESSION_REFRESH_FAILURES: Counter =
    Counter::new("docweave.session.refresh_failures");
pub(crate) static SESSION_FORCED_LOGOUTS: Counter =
    Counter::new("docweave.session.forced_logouts");

pub(crate) static STREAM_PAYLOADS: Counter = Counter::new("docweave.stream.payloads");
pub(crate) static STREAM_BYTES: Counter = Counter::new("docweave.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("docweave.stream.errors");

pub(crate) static STORE_POLLS: Counter = Counter::new("docweave.store.polls");
pub(crate) static STORE_POLLS_UNCHANGED: Counter = Counter::new("docweave.store.polls_unchanged");
pub(crate) static STORE_STALE_RESPONSES: Counter =
    Counter::new("docweave.store.stale_responses");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_REPLAYS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&SESSION_REFRESHES);
    collector.register_counter(&SESSION_REFRESH_FAILURES);
    collector.register_counter(&SESSION_FORCED_LOGOUTS);

    collector.register_counter(&STREAM_PAYLOADS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);

    collector.register_counter(&STORE_POLLS);
    collector.register_counter(&STORE_POLLS_UNCHANGED);
    collector.register_counter(&STORE_STALE_RESPONSES);
}
