pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, security::Keystore, state::AppState, telemetry};
use crate::services::generation::{BatchGenerator, HttpQuestionSource};
use crate::services::identity::IdentityAdminService;
use crate::services::notifications::EmailService;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init(&settings)?;
    let metrics_handle = core::metrics::install(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let keystore = Keystore::fetch(&settings).await?;
    let generator = BatchGenerator::from_settings(&settings);
    let question_source = HttpQuestionSource::from_settings(&settings)?;
    let identity = IdentityAdminService::from_settings(&settings)?;
    let mailer = EmailService::from_settings(&settings)?;

    let state = AppState::new(
        settings,
        db_pool,
        keystore,
        generator,
        question_source,
        identity,
        mailer,
        metrics_handle,
    );
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Certification Portal API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::wait_for_signal()).await?;

    Ok(())
}
