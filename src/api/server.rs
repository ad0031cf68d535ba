//! API Server Module
//!
//! Builds the REST and monitoring routers and runs both servers until a
//! shutdown signal, then drains them within the grace period.

use axum::{middleware, Router};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::{request_id_middleware, security_headers_middleware};
use super::routes::{accounts_router, monitoring_router, AccountsState, MonitoringState};
use crate::app::Handlers;

/// Prefix of every REST route
pub const API_PREFIX: &str = "/rest/v1";

/// Create the REST API router with its middleware stack
pub fn api_router(handlers: Handlers, request_timeout: Duration) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, accounts_router(AccountsState::new(handlers, request_timeout)))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Create the monitoring router
pub fn monitoring_app(state: MonitoringState) -> Router {
    monitoring_router(state).layer(TraceLayer::new_for_http())
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    app: Router,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(server = name, %addr, "listening");
        }
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // An error means the sender is gone, which is also a stop
                let _ = stop.changed().await;
            })
            .await
    })
}

fn join_result(result: Result<io::Result<()>, tokio::task::JoinError>) -> io::Result<()> {
    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Serve both routers until `shutdown` resolves, then drain
///
/// Connections still open when `grace_period` elapses are dropped. A server
/// that fails before shutdown ends the run with its error.
pub async fn serve<F>(
    api: (TcpListener, Router),
    monitoring: (TcpListener, Router),
    grace_period: Duration,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut api_task = spawn_server("api", api.0, api.1, stop_rx.clone());
    let mut monitoring_task = spawn_server("monitoring", monitoring.0, monitoring.1, stop_rx);

    tokio::select! {
        _ = shutdown => {
            tracing::info!(grace_secs = grace_period.as_secs(), "shutdown signal received, draining");
        }
        result = &mut api_task => return join_result(result),
        result = &mut monitoring_task => return join_result(result),
    }

    // Receivers live inside the tasks, so this only fails once both have exited
    let _ = stop_tx.send(true);

    let drain = async {
        let (api_result, monitoring_result) = tokio::join!(&mut api_task, &mut monitoring_task);
        join_result(api_result)?;
        join_result(monitoring_result)
    };

    let drained = tokio::time::timeout(grace_period, drain).await;
    match drained {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("grace period elapsed with requests in flight");
            api_task.abort();
            monitoring_task.abort();
            Ok(())
        }
    }
}
