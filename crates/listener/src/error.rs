use thiserror::Error;

pub type Result<T> = std::result::Result<T, ListenerError>;

#[derive(Debug, Error)]
pub enum ListenerError {
    /// The cluster could not be reached from this host.
    #[error("Connectivity check with {endpoint} failed: {source}")]
    Connectivity {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The listener port is already bound by someone else.
    #[error("Port {port} is unavailable: {source}")]
    PortUnavailable {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a status outside 200/202.
    #[error("Request failed with HTTP status {status}: {body}")]
    Request { status: u16, body: String },

    #[error("Cluster rejected credentials with HTTP status {status}")]
    Authentication { status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Listener already has a running dispatch runtime")]
    AlreadyRegistered,
}
