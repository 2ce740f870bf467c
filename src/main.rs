use anyhow::Context;
use frontbridge::{
    ConfigBuilder, FrontClient, RetryPolicy, SubscriptionManager, WebhookState, webhook_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid configuration")?;
    frontbridge::init_tracing_with_config(&config);

    let client = FrontClient::from_config(&config).context("failed to build API client")?;

    match &config.webhook.target_url {
        Some(target_url) => {
            let manager =
                SubscriptionManager::new(client.clone(), target_url.clone(), config.webhook.events.clone());
            if let Err(e) = manager.reconcile().await {
                tracing::error!(error = %e, "Webhook subscription reconciliation failed");
            }
        }
        None => tracing::info!("No webhook target URL configured, skipping subscription reconciliation"),
    }

    let state = WebhookState::from_config(
        &config.webhook,
        client,
        RetryPolicy::from_config(&config.retry),
    );
    let app = webhook_router(state, config.server.max_body_size);

    let addr = config.server.addr().context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "frontbridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("frontbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
