use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{API_PREFIX, ApiState, router};
use crate::error::Result;

/// A running HTTP server.
///
/// Dropping it aborts the serve task; cancel the token passed to
/// [`ApiServer::start`] and call [`ApiServer::stopped`] for a graceful stop.
pub struct ApiServer {
    addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Bind `bind_addr` (port 0 picks a free port) and start serving.
    pub async fn start(state: ApiState, bind_addr: &str, cancel: CancellationToken) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;
        let app = router(state);

        info!("API listening on http://{addr}{API_PREFIX}");

        let handle = tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API server error: {e}");
            }
        });

        Ok(Self {
            addr,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL of the API, e.g. `http://127.0.0.1:8000/api/v1`.
    pub fn base_url(&self) -> String {
        format!("http://{}{API_PREFIX}", self.addr)
    }

    pub fn shutdown(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Wait for the serve task to finish after its token was cancelled.
    pub async fn stopped(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("API server task failed: {e}");
                }
            }
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
