use crate::{
    config::ServiceConfig,
    errors::ProxyError,
    protocol::{read_frame, write_line, Framing},
    zones::UpstreamAddr,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;

/// Connect timeout towards upstream WHOIS servers.
pub const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can answer a WHOIS query for a domain.
#[async_trait]
pub trait WhoisUpstream: Send + Sync {
    async fn query(&self, upstream: &UpstreamAddr, domain: &str) -> Result<String, ProxyError>;
}

/// Plain TCP WHOIS client (RFC 3912): one connection per query, response
/// read until the server closes the stream.
#[derive(Debug, Clone)]
pub struct TcpWhoisClient {
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    max_response_size: usize,
}

impl TcpWhoisClient {
    pub fn new(read_timeout: Duration, write_timeout: Duration, max_response_size: usize) -> Self {
        Self {
            connect_timeout: UPSTREAM_CONNECT_TIMEOUT,
            read_timeout,
            write_timeout,
            max_response_size,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.read_timeout(), config.write_timeout(), config.max_len_buffer)
    }

    async fn execute_whois_query(
        &self,
        upstream: &UpstreamAddr,
        domain: &str,
    ) -> Result<String, ProxyError> {
        let mut stream = timeout(
            self.connect_timeout,
            TcpStream::connect((upstream.host.as_str(), upstream.port)),
        )
        .await??;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        write_line(&mut stream, domain, self.write_timeout).await?;

        let response = read_frame(
            &mut stream,
            Framing::Eof,
            self.max_response_size,
            self.read_timeout,
        )
        .await?;
        debug!(server = %upstream, bytes = response.len(), "upstream response received");

        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

/// Strip surrounding whitespace and dots from a domain before it is sent.
pub fn clean_domain(domain: &str) -> Result<&str, ProxyError> {
    let domain = domain.trim().trim_matches('.');
    if domain.is_empty() {
        return Err(ProxyError::InvalidDomain(domain.to_string()));
    }
    Ok(domain)
}

#[async_trait]
impl WhoisUpstream for TcpWhoisClient {
    async fn query(&self, upstream: &UpstreamAddr, domain: &str) -> Result<String, ProxyError> {
        let domain = clean_domain(domain)?;
        self.execute_whois_query(upstream, domain)
            .await
            .map_err(|e| ProxyError::upstream(upstream, e))
    }
}
