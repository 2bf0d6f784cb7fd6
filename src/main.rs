use intl_portal::{
    AppState, Catalogs, GoogleProvider, ProviderState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: Configuration, Logging, Database, Message Catalogs, the
/// Identity Provider, and the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // AppConfig::load() implements the fail-fast principle for missing Production secrets.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Prioritizes the RUST_LOG environment variable, falling back to sensible
    // defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "intl_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    // Pretty output for local debugging; JSON output in production for ingestion
    // by centralized log aggregators.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    tracing::info!(
        "Locales: {:?} (default '{}'), {} admin email(s) on the allow-list",
        config.locales,
        config.default_locale,
        config.admin_emails.len()
    );

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // Instantiate the Repository, wrapping it in an Arc for thread-safe sharing.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Message Catalog Loading (Fail-Fast on the default locale)
    // A missing non-default catalog degrades to the default language; a missing
    // default catalog means there is nothing to degrade to, so startup fails.
    let catalogs =
        Arc::new(Catalogs::load(&config).expect("FATAL: Failed to load message catalogs."));

    // 6. Identity Provider Initialization (Google OAuth)
    let provider = Arc::new(GoogleProvider::new(&config)) as ProviderState;

    // 7. Unified State Assembly
    let app_state = AppState {
        repo,
        provider,
        catalogs,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
