use anyhow::Result;
use maxbot_client::{MaxbotClient, PollingUpdate};
use maxbot_poller::{PollerConfig, echo_reply};
use maxbot_telemetry::{TelemetryConfig, init_telemetry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env(
        "maxbot-poller",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = PollerConfig::from_env()?;
    let client = MaxbotClient::new(config.client.clone())?;
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown requested");
        on_signal.cancel();
    });

    info!(
        offset = config.polling.update_offset,
        echo = config.echo,
        "maxbot-poller starting"
    );
    let session = client.start_polling(config.polling.clone(), cancel);
    let (mut updates, worker) = session.into_parts();
    while let Some(update) = updates.recv().await {
        handle_update(&client, config.echo, update).await;
    }

    let cursor = worker.await?;
    client.shutdown();
    info!(
        next_offset = cursor.offset(),
        "maxbot-poller stopped, resume with MAXBOT_POLL_OFFSET={}",
        cursor.offset()
    );
    Ok(())
}

async fn handle_update(client: &MaxbotClient, echo: bool, update: PollingUpdate) {
    let event = match update.outcome {
        Ok(event) => event,
        Err(err) => {
            warn!(offset = update.update_id, error = %err, "poll failed");
            return;
        }
    };
    info!(
        update_id = event.update_id,
        event_type = %event.kind,
        chat_id = %event.chat.id,
        "event"
    );

    if !echo {
        return;
    }
    if let Some((chat_id, text)) = echo_reply(&event) {
        if let Err(err) = client.send_text(chat_id, text).await {
            warn!(chat_id, error = %err, "echo failed");
        }
    }
}
