//! One WHOIS exchange per connection: framed read, lookup pipeline, framed
//! write.

use crate::{
    augment,
    cache::ResponseCache,
    config::ServiceConfig,
    errors::ProxyError,
    normalize,
    protocol::{read_frame, write_line, Framing},
    whois::WhoisUpstream,
    zones::{UpstreamAddr, ZoneResolver},
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

pub const EMPTY_REQUEST_RESPONSE: &str = "empty request";
pub const READ_ERROR_RESPONSE: &str = "error read socket";

pub struct RequestHandler {
    config: Arc<ServiceConfig>,
    resolver: ZoneResolver,
    cache: Arc<ResponseCache>,
    upstream: Arc<dyn WhoisUpstream>,
}

impl RequestHandler {
    pub fn new(
        config: Arc<ServiceConfig>,
        cache: Arc<ResponseCache>,
        upstream: Arc<dyn WhoisUpstream>,
    ) -> Result<Self, ProxyError> {
        let resolver = config.zone_resolver()?;
        Ok(Self {
            config,
            resolver,
            cache,
            upstream,
        })
    }

    /// Run the exchange on `stream` and close it. A handling error wins over
    /// an error raised while closing.
    pub async fn serve<S>(&self, mut stream: S) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.handle(&mut stream).await;
        let closed = stream.shutdown().await;

        result?;
        closed.map_err(ProxyError::from)
    }

    /// Read one request line and answer it. Nothing is written back when the
    /// lookup itself fails.
    pub async fn handle<S>(&self, stream: &mut S) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let write_timeout = self.config.write_timeout();

        let request = match read_frame(
            stream,
            Framing::Crlf,
            self.config.max_len_buffer,
            self.config.read_timeout(),
        )
        .await
        {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                let _ = write_line(stream, READ_ERROR_RESPONSE, write_timeout).await;
                return Err(e);
            }
        };

        // usually a TCP health check
        if request.trim().len() < 2 {
            return write_line(stream, EMPTY_REQUEST_RESPONSE, write_timeout).await;
        }

        let response = self.process_request(&request).await?;
        write_line(stream, &response, write_timeout).await
    }

    /// Turn a raw request into the text sent back to the client.
    pub async fn process_request(&self, request: &str) -> Result<String, ProxyError> {
        let host = request.split("\r\n").next().unwrap_or_default().trim();
        debug!(request = host, "whois request");

        let fqdn = match normalize::to_ascii(host) {
            Ok(fqdn) => fqdn,
            Err(e) => {
                warn!(host, "{}", e);
                return Ok(normalize::render_error_message(&self.config.error_msg_template, host));
            }
        };

        let upstream = self.resolver.resolve(&fqdn)?;
        debug!(domain = %fqdn, server = %upstream, "whois server selected");

        self.whois_info_cached(&fqdn, upstream).await
    }

    async fn whois_info_cached(
        &self,
        fqdn: &str,
        upstream: &UpstreamAddr,
    ) -> Result<String, ProxyError> {
        if let Some(cached) = self.cache.get(fqdn).await {
            debug!(domain = fqdn, "served from cache");
            return Ok(cached);
        }

        let mut whois_info = self.upstream.query(upstream, fqdn).await?;

        if let Some(extra) = self.config.add_whois_desc_info.get(fqdn) {
            whois_info = augment::insert_after_source(&whois_info, extra);
        }

        self.cache.set(fqdn, whois_info.clone()).await;
        Ok(whois_info)
    }
}
