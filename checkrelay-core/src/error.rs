//! Error types for checkrelay operations

use thiserror::Error;

/// Failures reported by the remote system or the transport to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Authentication failed for {login}@{host}: {reason}")]
    Authentication {
        host: String,
        login: String,
        reason: String,
    },

    #[error("Connection to {host} failed: {reason}")]
    Network { host: String, reason: String },

    #[error("Remote query {query} failed: {reason}")]
    Protocol { query: String, reason: String },
}

/// Failures of the admission and worker-pool machinery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(
        "Previous request pending (started {elapsed_ms} ms ago). Increase your check interval \
         and check timeout, and verify bandwidth availability"
    )]
    DuplicateInFlight { elapsed_ms: u64 },

    #[error("Work queue of pool {pool} stayed full for {waited_ms} ms")]
    QueueTimeout { pool: String, waited_ms: u64 },

    #[error("Pool {pool} is shut down")]
    PoolShutDown { pool: String },

    #[error("Worker of pool {pool} dropped the request before answering")]
    WorkerLost { pool: String },

    #[error("Failed to start worker thread for pool {pool}: {reason}")]
    SpawnFailed { pool: String, reason: String },
}

/// Malformed or incomplete caller input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid arguments. please set {field}")]
    MissingField { field: String },

    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("unknown request : {name}")]
    UnknownCheck { name: String },

    #[error("Malformed request: {reason}")]
    Malformed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all checkrelay errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    #[error("{0}")]
    Request(#[from] RequestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Refresh of {cache} failed: {cause}")]
    RefreshFailed {
        cache: String,
        cause: Box<GatewayError>,
    },

    #[error("Lock poisoned: {what}")]
    LockPoisoned { what: String },
}

/// Result type alias for checkrelay operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Coarse failure category used for logging and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Network,
    RemoteProtocol,
    DuplicateInFlight,
    QueueTimeout,
    NotFound,
    Argument,
    Internal,
}

impl GatewayError {
    /// Category of this error. A failed refresh reports the kind of its cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Remote(RemoteError::Authentication { .. }) => ErrorKind::Authentication,
            GatewayError::Remote(RemoteError::Network { .. }) => ErrorKind::Network,
            GatewayError::Remote(RemoteError::Protocol { .. }) => ErrorKind::RemoteProtocol,
            GatewayError::Dispatch(DispatchError::DuplicateInFlight { .. }) => {
                ErrorKind::DuplicateInFlight
            }
            GatewayError::Dispatch(DispatchError::QueueTimeout { .. }) => ErrorKind::QueueTimeout,
            GatewayError::Dispatch(_) => ErrorKind::Internal,
            GatewayError::Request(_) => ErrorKind::Argument,
            GatewayError::Config(_) => ErrorKind::Internal,
            GatewayError::NotFound { .. } => ErrorKind::NotFound,
            GatewayError::RefreshFailed { cause, .. } => cause.kind(),
            GatewayError::LockPoisoned { .. } => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        GatewayError::NotFound { what: what.into() }
    }

    pub fn lock_poisoned(what: impl Into<String>) -> Self {
        GatewayError::LockPoisoned { what: what.into() }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        RequestError::MissingField {
            field: field.into(),
        }
        .into()
    }

    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RequestError::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
        .into()
    }

    pub fn protocol(query: impl Into<String>, reason: impl Into<String>) -> Self {
        RemoteError::Protocol {
            query: query.into(),
            reason: reason.into(),
        }
        .into()
    }

    /// Whether retrying on a fresh session could help.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network)
    }
}
