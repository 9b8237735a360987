use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

use crate::core::{config::Settings, security::Keystore};
use crate::services::generation::{BatchGenerator, HttpQuestionSource};
use crate::services::identity::IdentityAdminService;
use crate::services::notifications::EmailService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    keystore: Keystore,
    generator: BatchGenerator,
    question_source: HttpQuestionSource,
    identity: IdentityAdminService,
    mailer: EmailService,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        keystore: Keystore,
        generator: BatchGenerator,
        question_source: HttpQuestionSource,
        identity: IdentityAdminService,
        mailer: EmailService,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                settings,
                db,
                keystore,
                generator,
                question_source,
                identity,
                mailer,
                metrics,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn keystore(&self) -> &Keystore {
        &self.inner.keystore
    }

    pub(crate) fn generator(&self) -> &BatchGenerator {
        &self.inner.generator
    }

    pub(crate) fn question_source(&self) -> &HttpQuestionSource {
        &self.inner.question_source
    }

    pub(crate) fn identity(&self) -> &IdentityAdminService {
        &self.inner.identity
    }

    pub(crate) fn mailer(&self) -> &EmailService {
        &self.inner.mailer
    }

    pub(crate) fn metrics_handle(&self) -> Option<&PrometheusHandle> {
        self.inner.metrics.as_ref()
    }
}
