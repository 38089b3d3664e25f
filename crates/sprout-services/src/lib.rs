//! Core services of the sprout backend: session authority, device
//! provisioning and telemetry recording.
//!
//! Everything is wired through [`Services`], an explicit dependency container
//! handed to the HTTP layer and the message hub. There is no global state.

pub mod error;
pub mod mail;
pub mod provisioning;
pub mod session;
pub mod telemetry;
pub mod templates;

use std::sync::Arc;

use sprout_db::{Database, SeriesStore};

pub use error::{Error, Result};
pub use mail::{EmailSender, LogMailer, SendGridMailer};
#[cfg(any(test, feature = "test-util"))]
pub use mail::{MemoryMailer, SentEmail};
pub use provisioning::{CurrentUser, CurrentUserResolver, DeviceLookup, ProvisioningCoordinator};
pub use session::{AuthConfig, SessionAuthority};
pub use telemetry::{SqliteSeries, TelemetryRecorder, TimeSeriesStore};
pub use templates::{TemplateRenderer, Templates};

/// All services, sharing one relational store and one series store.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<SessionAuthority>,
    pub provisioning: Arc<ProvisioningCoordinator>,
    pub telemetry: Arc<TelemetryRecorder>,
    pub templates: Arc<dyn TemplateRenderer>,
}

impl Services {
    pub fn new(
        db: Arc<Database>,
        series: Arc<SeriesStore>,
        mailer: Arc<dyn EmailSender>,
        templates: Arc<dyn TemplateRenderer>,
        auth: AuthConfig,
    ) -> Self {
        let sessions = Arc::new(SessionAuthority::new(
            db.clone(),
            mailer,
            templates.clone(),
            auth,
        ));
        let provisioning = Arc::new(ProvisioningCoordinator::new(db));
        let telemetry = Arc::new(TelemetryRecorder::new(
            provisioning.clone(),
            Arc::new(SqliteSeries::new(series)),
        ));

        Self {
            sessions,
            provisioning,
            telemetry,
            templates,
        }
    }
}

/// Run a blocking store call off the async runtime, tagging failures with
/// the service operation name.
pub(crate) async fn blocking<T, F>(op: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await?
        .map_err(Error::persistence(op))
}
