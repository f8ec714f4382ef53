//! Process wiring shared by the game server and the fleet router.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::dao::pictures::{DisabledPictureSigner, PictureSigner, S3Config, S3PictureSigner};

/// Configure tracing subscribers so logs include spans by default.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// S3 signer when credentials are present, otherwise a signer that refuses every key.
pub fn picture_signer_from_env() -> Arc<dyn PictureSigner> {
    match S3Config::from_env() {
        Ok(config) => {
            let signer = S3PictureSigner::new(config);
            info!(host = %signer.host(), "picture signing enabled");
            Arc::new(signer)
        }
        Err(err) => {
            warn!(error = %err, "picture signing disabled; candidates will be sent without pictures");
            Arc::new(DisabledPictureSigner)
        }
    }
}

/// Attach cross-cutting layers and serve `app` on `0.0.0.0:port` until shutdown.
pub async fn serve(app: Router<()>, port: u16) -> anyhow::Result<()> {
    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "could not install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown requested");
}
