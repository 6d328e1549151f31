use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livesub_server::{
    auth,
    config::{Args, ServerConfig},
    create_router, schema,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("livesub_server={0},livesub_core={0},tower_http=info", log_filter).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: ServerConfig = args.into();
    let listen_addr = config.listen_addr();

    let registry = schema::load_registry(config.schema_path.as_deref())?;
    let authenticator = auth::from_mode(config.auth)?;

    tracing::info!(
        auth = ?config.auth,
        mailbox_capacity = config.broker.mailbox_capacity,
        overflow_policy = %config.broker.overflow_policy,
        max_sessions = config.broker.max_sessions,
        "starting livesub server"
    );

    let state = AppState::new(config, registry, authenticator);
    let app = create_router(state);

    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!("livesub listening on {}", listen_addr);
    tracing::info!("WebSocket endpoint at ws://{}/ws", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
