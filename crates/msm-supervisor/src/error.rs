//! `SupervisorError` — the Lifecycle Engine's error taxonomy (§7). A single
//! `thiserror` enum with a `kind()` accessor the HTTP layer maps to a status
//! code, mirroring the teacher's `ApiError` (status-mapped, constructed via
//! `From` impls) even though that exact file wasn't present in the
//! retrieved pack and is reconstructed from its call-site usage.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Resource,
    Integrity,
    Security,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid server name {0:?}: must match ^[A-Za-z0-9_-]{{1,64}}$")]
    InvalidName(String),
    #[error("invalid tcp port {0}: must be in 1..=65535")]
    InvalidPort(i64),
    #[error("server name {0:?} is already in use")]
    NameInUse(String),

    #[error("server {0} is already running")]
    AlreadyRunning(i64),
    #[error("server {0} is already stopped")]
    AlreadyStopped(i64),
    #[error("tcp port {port} is in use{}", holder_pid.map(|p| format!(" by pid {p}")).unwrap_or_default())]
    PortInUse { port: i64, holder_pid: Option<u32> },

    #[error("server {0} not found")]
    ServerNotFound(i64),
    #[error("backup {0} not found")]
    BackupNotFound(i64),

    #[error("eula.txt is missing or not accepted for server {0}")]
    EulaMissing(i64),
    #[error("import target has no server.jar, no runnable jar with a Main-Class manifest, and no jar at all in {0}")]
    NoImportableJar(String),
    #[error("disk or filesystem error: {0}")]
    Filesystem(#[source] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("download failed after retries: {0}")]
    Download(#[from] msm_fetchers::FetchError),

    #[error("digest mismatch or truncated download: {0}")]
    Integrity(String),

    #[error("refused: path {path:?} escapes the data root")]
    PathTraversal { path: String },
    #[error("refused: operation requires elevated privileges to be denied to root/administrator")]
    ElevatedPrincipal,

    #[error("platform error: {0}")]
    Platform(#[from] msm_platform::PlatformError),
}

impl SupervisorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::InvalidName(_) | SupervisorError::InvalidPort(_) => ErrorKind::Validation,
            SupervisorError::NameInUse(_)
            | SupervisorError::AlreadyRunning(_)
            | SupervisorError::AlreadyStopped(_)
            | SupervisorError::PortInUse { .. } => ErrorKind::Conflict,
            SupervisorError::ServerNotFound(_) | SupervisorError::BackupNotFound(_) => ErrorKind::NotFound,
            SupervisorError::EulaMissing(_)
            | SupervisorError::NoImportableJar(_)
            | SupervisorError::Filesystem(_)
            | SupervisorError::Database(_)
            | SupervisorError::Download(_)
            | SupervisorError::Platform(_) => ErrorKind::Resource,
            SupervisorError::Integrity(_) => ErrorKind::Integrity,
            SupervisorError::PathTraversal { .. } | SupervisorError::ElevatedPrincipal => ErrorKind::Security,
        }
    }
}
