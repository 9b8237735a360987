use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

/// Install the Prometheus recorder when enabled. The render handle travels
/// in `AppState`; nothing is stored process-wide.
pub(crate) fn install(settings: &Settings) -> anyhow::Result<Option<PrometheusHandle>> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(Some(handle))
}
