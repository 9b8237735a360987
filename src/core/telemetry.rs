use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Wire up the tracing subscriber. `RUST_LOG` wins over the configured
/// level; JSON output is a deploy-time switch for log shippers.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.telemetry().log_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    let result = if settings.telemetry().json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}
