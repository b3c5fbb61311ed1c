use anyhow::{Context, Result};
use rtdb_relay::config::{load_config, RelayConfig};
use rtdb_relay::{StoreClient, SubscriptionManager, WebhookNotifier};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rtdb_relay=info".into()),
        )
        .init();

    info!("Relay starting...");

    let config = match std::env::var("RELAY_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => RelayConfig::default(),
    }
    .with_env_overrides();
    config.validate().context("Invalid configuration")?;

    info!(
        database_url = %config.store.database_url,
        path = %config.store.path,
        webhook_url = %config.notifier.webhook_url,
        "Configuration loaded"
    );

    let store = StoreClient::new(config.store.clone()).context("Failed to create store client")?;
    let notifier =
        WebhookNotifier::new(&config.notifier).context("Failed to create webhook notifier")?;

    let mut subscription = SubscriptionManager::new(Arc::new(store), Arc::new(notifier));
    subscription
        .start(config.store.path.clone())
        .context("Failed to start subscription")?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    subscription.stop().await;
    info!("Relay stopped");

    Ok(())
}
