use thiserror::Error as ThisError;

/// Every way a check run can fail. None of these are retried.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Could not load config: {0}")]
    ConfigLoad(String),

    #[error("Failed to dial the LDAP server at {addr}: {reason}")]
    Connection { addr: String, reason: String },

    #[error("Could not start TLS on the LDAP connection to {addr}: {reason}")]
    Tls { addr: String, reason: String },

    #[error("Could not bind to LDAP server as '{dn}': {reason}")]
    Bind { dn: String, reason: String },

    #[error("Expected exactly 1 entry for user '{username}', got {count} entries")]
    AmbiguousOrMissingUser { username: String, count: usize },

    #[error("Credentials mismatch for '{dn}': {reason}")]
    CredentialMismatch { dn: String, reason: String },

    #[error("Could not search directory under '{base}' with filter {filter}: {reason}")]
    DirectorySearch {
        base: String,
        filter: String,
        reason: String,
    },
}

impl Error {
    /// The pipeline stage that failed, for operator-facing output.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::ConfigLoad(_) => "config",
            Error::Connection { .. } => "connect",
            Error::Tls { .. } => "starttls",
            Error::Bind { .. } => "bind",
            Error::AmbiguousOrMissingUser { .. } => "user search",
            Error::CredentialMismatch { .. } => "credential check",
            Error::DirectorySearch { .. } => "search",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
