use std::sync::Arc;

use anyhow::Result;
use axum::serve;
use maxbot_ingress_webhook::{AppState, ChannelSink, IngressConfig, build_router};
use maxbot_telemetry::{TelemetryConfig, init_telemetry};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env(
        "maxbot-ingress-webhook",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = IngressConfig::from_env()?;
    let verifier = config.verifier();
    if verifier.is_insecure() {
        warn!("webhook signature verification is disabled");
    }

    let (sink, mut events) = ChannelSink::new(config.event_buffer);
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(
                update_id = event.update_id,
                event_id = %event.event_id,
                event_type = %event.kind,
                chat_id = %event.chat.id,
                "event"
            );
        }
    });

    let router = build_router(&config, AppState::new(verifier, Arc::new(sink)));
    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, path = %config.path, "maxbot-ingress-webhook listening");

    serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    drain.await.ok();
    info!("maxbot-ingress-webhook stopped");
    Ok(())
}
