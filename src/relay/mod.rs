//! Conversion relay: an HTTP front for a document conversion engine.
//!
//! The relay is stateless across requests. Each `POST /convert` carries one
//! document in the `file` multipart field and is answered with the PDF bytes
//! or a plain-text error. Requests are independent and may run concurrently.
//!
//! | Route            | Response                                          |
//! |------------------|---------------------------------------------------|
//! | `POST /convert`  | 200 `application/pdf`, 400 no file, 413, 500      |
//! | `GET /health`    | 200 `{"status":"ok","version":"…"}`                |
//!
//! Cross-origin requests are allowed from any origin so a browser front end
//! served elsewhere can call it.

pub mod engine;
pub mod handler;

use crate::config::RelayConfig;
use crate::error::Docs2PdfError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use engine::ConversionEngine;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared, read-only state handed to every request.
pub struct RelayState {
    pub engine: Arc<dyn ConversionEngine>,
    pub upload_dir: PathBuf,
}

/// Build the relay router.
pub fn router(config: &RelayConfig, engine: Arc<dyn ConversionEngine>) -> Router {
    let state = Arc::new(RelayState {
        engine,
        upload_dir: config.upload_dir.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/convert",
            post(handler::convert).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/health", get(handler::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn bind(config: &RelayConfig) -> Result<TcpListener, Docs2PdfError> {
    let addr = config.socket_addr();
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|source| Docs2PdfError::UploadDir {
            path: config.upload_dir.clone(),
            source,
        })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| Docs2PdfError::RelayServe {
            addr: addr.to_string(),
            source,
        })
}

/// Run the relay until `shutdown` resolves.
///
/// Creates the upload directory if needed, then serves on
/// [`RelayConfig::socket_addr`].
pub async fn serve<F>(
    config: &RelayConfig,
    engine: Arc<dyn ConversionEngine>,
    shutdown: F,
) -> Result<(), Docs2PdfError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|source| Docs2PdfError::RelayServe {
            addr: config.socket_addr().to_string(),
            source,
        })?;
    info!("Relay listening on http://{}", addr);

    axum::serve(listener, router(config, engine))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| Docs2PdfError::RelayServe {
            addr: addr.to_string(),
            source,
        })?;

    info!("Relay stopped");
    Ok(())
}

/// Shutdown future for [`serve`] driven by an OS signal listener such as
/// `tokio::signal::ctrl_c()`.
///
/// Resolves when the signal arrives. If the listener itself fails, the
/// failure is logged and the future never resolves, so the relay keeps
/// serving rather than stopping on startup.
pub async fn shutdown_on<S>(signal: S)
where
    S: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Signal handler unavailable, serving until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Handle to a relay running on a background task.
///
/// Bind to port 0 for an ephemeral port; [`RelayServer::url`] reports the
/// address actually bound.
pub struct RelayServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RelayServer {
    /// Bind and start serving in the background.
    pub async fn start(
        config: &RelayConfig,
        engine: Arc<dyn ConversionEngine>,
    ) -> Result<Self, Docs2PdfError> {
        let listener = bind(config).await?;
        let addr = listener
            .local_addr()
            .map_err(|source| Docs2PdfError::RelayServe {
                addr: config.socket_addr().to_string(),
                source,
            })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(config, engine);

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!("Relay on {} stopped with error: {}", addr, e);
            }
        });

        info!("Relay started on {}", addr);
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for clients. Wildcard binds are reported as loopback.
    pub fn url(&self) -> String {
        let ip = if self.addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            match self.addr {
                SocketAddr::V4(a) => a.ip().to_string(),
                SocketAddr::V6(a) => format!("[{}]", a.ip()),
            }
        };
        format!("http://{}:{}", ip, self.addr.port())
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}
