use auth_service::config::Config;
use auth_service::crypto::codec::TokenCodec;
use auth_service::handlers::auth_handler::AppState;
use auth_service::repositories::principals::PgPrincipalDirectory;
use auth_service::repositories::session_store::RedisSessionStore;
use auth_service::routes;
use auth_service::services::auth_service::AuthService;
use auth_service::services::notification::{LogNotifier, NotificationSender, WebhookNotifier};
use auth_service::services::session_registry::SessionRegistry;
use common::config::LogFormat;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first: it selects the log format
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    init_tracing(config.observability.log_format);

    info!("Starting Auth Service");
    info!("Configuration loaded successfully");

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Initialize database connection pool
    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    info!("Connecting to Redis...");
    let store = RedisSessionStore::connect(&config.redis.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            e
        })?;

    info!("Redis connection established");

    let notifier: Arc<dyn NotificationSender> = match &config.notification_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.as_str()).map_err(|e| {
            error!("Failed to build webhook notifier: {}", e);
            e
        })?),
        None => {
            warn!("NOTIFICATION_WEBHOOK_URL not set, one-time codes will not be delivered");
            Arc::new(LogNotifier)
        }
    };

    let bind_address = config.bind_address.clone();

    let auth = AuthService::new(
        Arc::new(PgPrincipalDirectory::new(db_pool)),
        SessionRegistry::new(Arc::new(store)),
        TokenCodec::new(&config.jwt_secret),
        notifier,
        config.auth.clone(),
    );

    let state = Arc::new(AppState { auth });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Auth Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Auth Service shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_service=debug,tower_http=debug".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Wait for SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
