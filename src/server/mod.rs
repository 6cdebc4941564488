mod filters;
mod handlers;

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use tokio::{
    signal::{self, unix::SignalKind},
    sync::broadcast,
};
use tracing::info;
use url::Url;

use warp::Filter;

use crate::{
    analyser::Prober,
    config::Config,
    downloader::Downloader,
};

/// Used to parse JSON body of the POST /analyseUrl request
#[derive(Debug, Deserialize)]
struct AnalyseRequest {
    #[serde(alias = "URL")]
    url: Url,
}

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    error: String,
}

/// Create the webserver and start serving the routes.
pub(crate) async fn server(config: Config) -> anyhow::Result<()> {
    let downloader = Downloader::new(config.page_timeout)?;
    let prober = Prober::new(downloader.clone(), config.probe);
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

    let routes = filters::analyse(downloader, prober)
        .or(filters::index(config.static_dir.clone()))
        .or(filters::public(config.static_dir.clone()))
        .with(warp::trace::request());

    let mut sigterm = signal::unix::signal(SignalKind::terminate())?;
    let mut sigquit = signal::unix::signal(SignalKind::quit())?;

    tokio::spawn(async move {
        let kill = signal::ctrl_c();

        let send_kill = move || {
            info!("Received shutdown signal. Sending shutdown command.");
            let _ = shutdown_tx.send(());
        };
        tokio::select! {
            _ = sigterm.recv() => send_kill(),
            _ = sigquit.recv() => send_kill(),
            _ = kill => send_kill(),
        }
    });

    let addr = SocketAddr::new(config.ip, config.port);
    let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, async move {
        shutdown_rx.recv().await.ok();
    })?;

    info!("Server listening on: {} ({} environment)", addr, config.env);
    server.await;

    Ok(())
}
