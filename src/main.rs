use std::sync::Arc;

use relay_bridge::channels::{AppleScriptSink, EmailTransport};
use relay_bridge::config::BridgeConfig;
use relay_bridge::error::{Error, Result};
use relay_bridge::relay::BridgeController;
use relay_bridge::store::ChatDbSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut bridge = open_bridge().await.unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        if matches!(e, Error::Config(_)) {
            eprintln!("  export EMAIL_IMAP_HOST=imap.gmail.com EMAIL_USERNAME=... EMAIL_PASSWORD=...");
        }
        std::process::exit(1);
    });

    bridge.run_until(shutdown_signal()).await;

    Ok(())
}

/// Load config and wire the production collaborators into a controller.
async fn open_bridge() -> Result<BridgeController> {
    let config = BridgeConfig::from_env()?;

    eprintln!("📨 Relay Bridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Chat DB: {}", config.chat_db_path.display());
    eprintln!("   State: {}", config.state_path.display());
    eprintln!(
        "   IMAP: {}:{}, SMTP: {}:{}",
        config.email.imap_host,
        config.email.imap_port,
        config.email.smtp_host,
        config.email.smtp_port
    );
    eprintln!("   Operator: {}", config.operator_address);
    if !config.schedule.is_gated() {
        eprintln!("   Schedule: always\n");
    } else {
        eprintln!("   Schedule: {} window(s)\n", config.schedule.windows().len());
    }

    let source = ChatDbSource::open(&config.chat_db_path).await?;
    let mail = EmailTransport::new(config.email.clone());

    Ok(BridgeController::new(
        config,
        Arc::new(source),
        Arc::new(mail),
        Arc::new(AppleScriptSink::new()),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
