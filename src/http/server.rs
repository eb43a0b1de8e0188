use crate::driver::RoutingControllers;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server as HyperServer;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// hyper transport for a built [`RoutingControllers`]
pub struct Server {
    controllers: Arc<RoutingControllers>,
}

impl Server {
    pub fn new(controllers: RoutingControllers) -> Self {
        Self {
            controllers: Arc::new(controllers),
        }
    }

    pub async fn serve(self, addr: &str) -> Result<()> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::config(format!("Invalid address '{}': {}", addr, e)))?;

        log::info!("RustF controllers listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(sig) => sig,
                    Err(e) => {
                        log::error!("Failed to install SIGTERM handler: {}", e);
                        return;
                    }
                };

                tokio::select! {
                    _ = sigterm.recv() => {
                        log::info!("Received SIGTERM signal - initiating graceful shutdown");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Received SIGINT signal (Ctrl+C) - initiating graceful shutdown");
                    }
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl+C signal: {}", e);
                    return;
                }
                log::info!("Received Ctrl+C signal - initiating graceful shutdown");
            }

            let _ = shutdown_tx.send(());
        });

        let controllers = Arc::clone(&self.controllers);
        let make_svc = make_service_fn(move |_conn| {
            let controllers = Arc::clone(&controllers);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let controllers = Arc::clone(&controllers);
                    async move {
                        let response = match Request::from_hyper(req).await {
                            Ok(request) => controllers.dispatch(request).await,
                            Err(e) => {
                                log::error!("Failed to read request: {}", e);
                                Response::internal_error()
                            }
                        };
                        Ok::<_, Infallible>(response.into_hyper())
                    }
                }))
            }
        });

        let server = HyperServer::try_bind(&addr)?
            .serve(make_svc)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });

        server.await?;
        log::info!("Server stopped");
        Ok(())
    }
}
