use std::sync::OnceLock;

use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!("http_requests_total", Unit::Count, "HTTP requests by method, path, status");
    describe_counter!(
        "answer_saves_total",
        Unit::Count,
        "Answer persistence attempts by outcome"
    );
    describe_counter!(
        "attempt_submissions_total",
        Unit::Count,
        "Attempt submissions by outcome"
    );
    describe_counter!(
        "score_recomputations_total",
        Unit::Count,
        "Authoritative score recomputations by outcome"
    );
}
