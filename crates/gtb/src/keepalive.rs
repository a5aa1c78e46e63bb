//! Liveness endpoint plus an optional self-ping loop, for free-tier hosts
//! that idle out services without inbound traffic.

use std::sync::Arc;

use axum::{routing::get, Router};

use gtb_core::config::Config;

pub fn spawn(cfg: Arc<Config>) {
    let port = cfg.port;
    tokio::spawn(async move {
        let app = Router::new().route("/", get(|| async { "alive" }));
        let addr = format!("0.0.0.0:{port}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                tracing::info!("liveness endpoint on {addr}");
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("liveness server failed: {e}");
                }
            }
            Err(e) => tracing::error!("liveness bind failed on {addr}: {e}"),
        }
    });

    let Some(url) = cfg.self_ping_url.clone() else {
        return;
    };
    let interval = cfg.self_ping_interval;
    tokio::spawn(async move {
        let http = reqwest::Client::new();
        loop {
            tokio::time::sleep(interval).await;
            // Failures are expected while the host spins up.
            if let Err(e) = http.get(&url).send().await {
                tracing::debug!("self-ping failed: {e}");
            }
        }
    });
}
