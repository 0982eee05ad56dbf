//! # WHOIS Proxy Library
//!
//! A caching TCP proxy for the WHOIS protocol (RFC 3912).
//!
//! ## Features
//!
//! - One-line requests, text responses, one exchange per connection
//! - IDN hostnames converted to Punycode before lookup
//! - Upstream server picked by longest matching zone suffix
//! - Response cache with per-entry TTL and a periodic full reset
//! - Operator annotations inserted after the `source:` line
//! - Bounded number of concurrent connections
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use whois_proxy::{Config, WhoisProxy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Some(Path::new("config.yml")))?;
//!     let proxy = WhoisProxy::bind(config.service).await?;
//!
//!     println!("Listening on {}", proxy.local_addr()?);
//!     proxy.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod augment;
pub mod cache;
pub mod config;
pub mod errors;
pub mod handler;
pub mod normalize;
pub mod protocol;
pub mod server;
pub mod whois;
pub mod zones;

// Re-export main types for easy access
pub use cache::ResponseCache;
pub use config::{Config, ServiceConfig};
pub use errors::ProxyError;
pub use handler::RequestHandler;
pub use server::Server;
pub use whois::{TcpWhoisClient, WhoisUpstream};
pub use zones::{UpstreamAddr, ZoneResolver};

use std::{future::Future, net::SocketAddr, sync::Arc};
use tracing::info;

/// A bound proxy: listener, cache, upstream client and handler wired
/// together from the service settings.
pub struct WhoisProxy {
    server: Server,
    handler: Arc<RequestHandler>,
}

impl WhoisProxy {
    /// Validate `config` and bind the listening socket.
    pub async fn bind(config: ServiceConfig) -> Result<Self, ProxyError> {
        config.validate()?;
        let config = Arc::new(config);

        let cache = Arc::new(ResponseCache::from_config(&config));
        let upstream = Arc::new(TcpWhoisClient::from_config(&config));
        let handler = Arc::new(RequestHandler::new(config.clone(), cache, upstream)?);
        let server = Server::bind(&config.bind_addr(), config.max_connections).await?;

        info!(
            zones = config.domain_zone_whois.len(),
            annotated_domains = config.add_whois_desc_info.len(),
            default_whois = %config.default_whois,
            "whois proxy configured"
        );

        Ok(Self { server, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
        self.server.local_addr()
    }

    /// Serve until `shutdown` resolves and in-flight requests are done.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()>,
    {
        self.server.serve(self.handler, shutdown).await
    }
}
