//! ProxyServer struct and main run loop.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::context::ProxyContext;
use super::handler::handle_request;

/// The proxy server: one task per connection, HTTP/1.1 with upgrades so
/// CONNECT tunnels can take over the socket.
pub struct ProxyServer {
    ctx: Arc<ProxyContext>,
}

impl ProxyServer {
    pub fn new(ctx: Arc<ProxyContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<ProxyContext> {
        &self.ctx
    }

    /// Bind on all interfaces at the configured port.
    pub async fn bind(&self) -> Result<TcpListener, anyhow::Error> {
        let port = self.ctx.config.get().port;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        Ok(listener)
    }

    /// Accept connections on `listener` until the task is dropped or
    /// accepting fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let config = self.ctx.config.get();
        info!("Listening on http://{}", listener.local_addr()?);
        info!("Proxying to {}", config.target_url);
        info!("Loaded {} rules", config.rules.len());

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(Arc::clone(&ctx), req));

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .with_upgrades()
                    .await
                {
                    if err.is_incomplete_message() {
                        debug!("Connection from {} closed early: {}", remote_addr, err);
                    } else {
                        error!("Error serving connection from {}: {}", remote_addr, err);
                    }
                }
            });
        }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}
