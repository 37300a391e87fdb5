use metrics::{Unit, describe_counter, describe_histogram};

/// Registers descriptions for the metric names emitted by the client and the
/// ingress service. Recording stays a no-op until a recorder is installed.
pub fn describe_metrics() {
    describe_counter!("maxbot_requests_total", "REST calls sent, by endpoint");
    describe_counter!(
        "maxbot_errors_total",
        "REST calls that failed, by error class and endpoint"
    );
    describe_histogram!(
        "maxbot_request_seconds",
        Unit::Seconds,
        "REST round-trip latency"
    );
    describe_counter!("maxbot_retries_total", "Retried REST calls, by error class");
    describe_counter!("maxbot_updates_fetched_total", "Events fetched by long polling");
    describe_counter!("maxbot_poll_errors_total", "Failed long-poll requests");
    describe_counter!(
        "maxbot_poll_errors_dropped_total",
        "Poll error records dropped because the channel was full"
    );
    describe_counter!(
        "maxbot_webhook_requests_total",
        "Webhook deliveries, by outcome"
    );
}
