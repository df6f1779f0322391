//! WeChat SDK demo server
//!
//! Serves the webhook with an echo handler for text messages and a greeting
//! for new followers. Configuration comes from the environment (see
//! `WechatConfig::from_env`).

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wechat_sdk::prelude::*;
use wechat_sdk::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,wechat_sdk=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("WeChat SDK demo server starting...");

    // Load configuration
    let config = WechatConfig::from_env().context("Failed to load configuration")?;
    let addr: SocketAddr = config
        .webhook_addr
        .parse()
        .with_context(|| format!("Invalid WEBHOOK_ADDR: {}", config.webhook_addr))?;
    let path = config.webhook_path.clone();

    let wechat = Wechat::make(config)?;
    wechat.on_error(|e| tracing::error!("WeChat API error: {}", e));

    let server = wechat.server();
    server
        .on_event("subscribe", |_| Some(Message::text("Thanks for following!")))
        .on_message(MsgType::Text, |msg| {
            msg.content.as_deref().map(Message::text)
        });

    info!("Webhook mounted at {} on {}", path, addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(addr, server).await {
            tracing::error!("Webhook server error: {}", e);
        }
    });

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }

    handle.abort();
    info!("WeChat SDK demo server stopped");
    Ok(())
}
