use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Cannot bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("No domain zones to match for: {0:?}")]
    NoZoneMatch(String),

    #[error("Hostname not valid (idna): {0}")]
    Normalization(String),

    #[error("Read buffer overflow (limit {limit} bytes)")]
    BufferOverflow { limit: usize },

    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),

    #[error("Upstream {server} failed: {source}")]
    Upstream {
        server: String,
        #[source]
        source: Box<ProxyError>,
    },

    #[error("Network timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::time::error::Elapsed> for ProxyError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ProxyError::Timeout
    }
}

impl ProxyError {
    pub(crate) fn upstream(server: impl ToString, source: ProxyError) -> Self {
        ProxyError::Upstream {
            server: server.to_string(),
            source: Box::new(source),
        }
    }
}
