//! Error taxonomy shared by the session, provisioning and telemetry services.

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("user email already exists")]
    UserExists,

    #[error("user not found")]
    NoUser,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid auth token")]
    InvalidToken,

    #[error("auth token expired")]
    ExpiredToken,

    /// The caller has no authenticated identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// A breadcrumb named a hardware address no device is bound to.
    #[error("device not found for hardware address {0}")]
    NoDevice(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("hardware address {mac_addr} is already bound to device {device_id}")]
    AddressInUse { mac_addr: String, device_id: i64 },

    #[error("no telemetry recorded for device {0}")]
    NoTelemetry(i64),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("template rendering failed")]
    Template(#[source] anyhow::Error),

    #[error("sending email failed")]
    Email(#[source] anyhow::Error),

    /// The password was changed, but its reset tokens could not be removed.
    /// The change stands; only the cleanup failed.
    #[error("password changed but reset tokens were not cleared")]
    ResetCleanup(#[source] anyhow::Error),

    /// Opaque failure from the relational or time-series store.
    #[error("{op} failed: {source:#}")]
    Persistence {
        op: &'static str,
        source: anyhow::Error,
    },

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn persistence(op: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Persistence { op, source }
    }
}
