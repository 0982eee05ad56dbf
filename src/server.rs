//! TCP accept loop with a connection ceiling and asynchronous error
//! reporting.

use crate::{errors::ProxyError, handler::RequestHandler};
use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    sync::{
        mpsc::{self, error::SendTimeoutError},
        Semaphore,
    },
};
use tracing::{debug, error, info, warn};

/// Handler errors waiting for the logging task.
pub const ERROR_QUEUE_CAPACITY: usize = 1024;
/// How long a handler waits on a full error queue before dropping its error.
pub const ERROR_QUEUE_SEND_TIMEOUT: Duration = Duration::from_millis(100);

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type ErrorReport = (SocketAddr, ProxyError);

pub struct Server {
    listener: TcpListener,
    limiter: Arc<Semaphore>,
    max_connections: usize,
}

impl Server {
    /// Bind the listening socket. Failing here is fatal for the service.
    pub async fn bind(addr: &str, max_connections: usize) -> Result<Self, ProxyError> {
        if max_connections == 0 {
            return Err(ProxyError::Config("max_connections must be greater than 0".to_string()));
        }

        let listener = TcpListener::bind(addr).await.map_err(|source| ProxyError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            listener,
            limiter: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// A connection is only accepted once a slot is free, so at most
    /// `max_connections` handlers run at a time. After shutdown no new
    /// connection is accepted and this waits for running handlers to finish.
    pub async fn serve<F>(self, handler: Arc<RequestHandler>, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()>,
    {
        let (errors_tx, errors_rx) = mpsc::channel::<ErrorReport>(ERROR_QUEUE_CAPACITY);
        let reporter = tokio::spawn(report_errors(errors_rx));

        info!(
            addr = %self.local_addr()?,
            max_connections = self.max_connections,
            "whois proxy accepting connections"
        );

        tokio::pin!(shutdown);
        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            let handler = handler.clone();
            let errors = errors_tx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                debug!(%peer, "connection accepted");
                if let Err(e) = handler.serve(stream).await {
                    report_error(&errors, (peer, e)).await;
                }
            });
        }

        info!("stopped accepting connections, waiting for in-flight requests");
        let all_slots = u32::try_from(self.max_connections).unwrap_or(u32::MAX);
        let _ = self.limiter.acquire_many(all_slots).await;

        drop(errors_tx);
        let _ = reporter.await;
        info!("whois proxy stopped");

        Ok(())
    }
}

async fn report_error(errors: &mpsc::Sender<ErrorReport>, report: ErrorReport) {
    match errors.send_timeout(report, ERROR_QUEUE_SEND_TIMEOUT).await {
        Ok(()) => {}
        Err(SendTimeoutError::Timeout((peer, e))) | Err(SendTimeoutError::Closed((peer, e))) => {
            warn!(%peer, error = %e, "error queue unavailable, dropping report");
        }
    }
}

async fn report_errors(mut errors: mpsc::Receiver<ErrorReport>) {
    while let Some((peer, e)) = errors.recv().await {
        error!(%peer, error = %e, "tcp server problem");
    }
}
