//! Portaria gateway server.
//!
//! Wires the library's pieces together from environment configuration:
//! observability, signing key, credential store, authenticator, admission
//! pipeline, then serves until interrupted.
//!
//! Configuration is environment-driven; see `GatewayConfig` for the full
//! surface. A missing or undersized signing key and a missing database are
//! both startup failures: the process refuses to run partially configured.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use portaria::observability::{self, ObservabilityConfig, SecurityEvent};
use portaria::prelude::*;
use portaria::security_event;
use portaria::store::postgres::{DatabaseConfig, PgStore};

/// Portaria gateway: CPF authentication and request admission.
#[derive(Parser)]
#[command(name = "portaria-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address (overrides LISTEN_ADDR)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    observability::init(&ObservabilityConfig::from_env())?;

    let config = GatewayConfig::from_env()?;
    let key = SigningKey::from_env()?;

    let pool = DatabaseConfig::from_env()?.connect().await?;
    let store: Arc<dyn CredentialStore> = Arc::new(PgStore::new(pool));

    let issuer = TokenIssuer::new(&key, &config.issuer, &config.audience, config.token_ttl);
    let verifier = Arc::new(TokenVerifier::new(&key, &config.issuer, &config.audience));

    let authenticator = Arc::new(Authenticator::new(
        store,
        issuer,
        config.auth_mode,
        config.lookup_timeout,
    ));

    let state = GatewayState {
        authenticator,
        upstream: config.upstream_url.as_deref().map(UpstreamClient::new),
    };
    let admission = AdmissionState::new(
        verifier,
        config.route_policies.clone(),
        config.public_paths.clone(),
    );

    let app = gateway_router(&config, state, admission);

    let listen = args.listen.unwrap_or_else(|| config.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&listen).await?;

    security_event!(
        SecurityEvent::SystemStartup,
        addr = %listen,
        upstream = %config.upstream_url.as_deref().unwrap_or("none"),
        "Gateway listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    security_event!(SecurityEvent::SystemShutdown, "Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
