//! charity-hub - GraphQL backend for a charity association

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use charity_hub::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::Backend,
    graphql::build_schema,
    services::{EmailService, Services, StripeClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "charity_hub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting charity-hub...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Connect storage
    let backend = Backend::connect(&config.database).await?;
    backend
        .ensure_indexes()
        .await
        .context("Failed to create database indexes")?;
    tracing::info!(driver = ?backend.driver(), "Database connected");

    let cache = create_cache(&config.cache);
    let email = Arc::new(EmailService::new(config.email.clone()));
    tracing::info!(mode = ?email.mode(), "Email service initialized");

    if config.stripe.secret_key.is_empty() {
        tracing::warn!("Stripe secret key is not set; payment operations will fail");
    }
    let gateway = Arc::new(StripeClient::new(&config.stripe));

    let services = Arc::new(Services::new(
        &config,
        backend.repositories(),
        cache,
        email,
        gateway,
    ));

    // Drop expired login attempts every 5 minutes
    {
        let services = services.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                services.users.cleanup_login_attempts().await;
            }
        });
    }

    let state = AppState {
        schema: build_schema(services.clone()),
        services,
        backend,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
