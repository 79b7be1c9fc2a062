use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use keygate::config::Config;
use keygate::db::{AppState, create_pool, init_db, queries};
use keygate::handlers;
use keygate::models::AdminRole;
use keygate::signing::DownloadSigner;
use keygate::sweeper::spawn_expiry_sweeper;

#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "Device-bound license server with scoped admin access control")]
struct Cli {
    /// Seed the database with dev data (admin, product, policy, license)
    #[arg(long)]
    seed: bool,
}

/// Creates the first super admin when the admins table is empty and
/// prints its API key once. No-op otherwise.
fn bootstrap_first_admin(state: &AppState, username: &str) {
    let conn = state
        .db
        .get()
        .expect("Failed to get db connection for bootstrap");

    let count = queries::count_admins(&conn).expect("Failed to count admins");
    if count > 0 {
        tracing::info!("Admins already exist, skipping bootstrap");
        return;
    }

    let (admin, api_key) = queries::create_admin(&conn, username, AdminRole::SuperAdmin)
        .expect("Failed to create bootstrap admin");

    tracing::info!("============================================");
    tracing::info!("BOOTSTRAP SUPER ADMIN CREATED");
    tracing::info!("Username: {}", admin.username);
    tracing::info!("API Key: {}", api_key);
    tracing::info!("============================================");
    tracing::info!("SAVE THIS API KEY - IT WILL NOT BE SHOWN AGAIN");
    tracing::info!("============================================");
}

/// Seeds the database with dev data for local testing.
/// Creates: super admin, product, policy, and one license.
fn seed_dev_data(state: &AppState) {
    let conn = state
        .db
        .get()
        .expect("Failed to get db connection for seeding");

    let count = queries::count_admins(&conn).expect("Failed to count admins");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let (admin, api_key) = queries::create_admin(&conn, "dev", AdminRole::SuperAdmin)
        .expect("Failed to create dev admin");
    tracing::info!("Admin: {} ({})", admin.username, admin.role);

    let product = queries::create_product(&conn, "Dev Product", Some(&admin.id))
        .expect("Failed to create dev product");
    tracing::info!("Product: {} (id: {})", product.name, product.id);

    let policy = queries::create_policy(
        &conn,
        "Dev Policy",
        &serde_json::json!({ "features": ["export", "sync"] }),
        Some(&admin.id),
    )
    .expect("Failed to create dev policy");
    tracing::info!("Policy: {} (id: {})", policy.policy_name, policy.id);

    let license = queries::create_license(
        &conn,
        &queries::NewLicense {
            product_id: &product.id,
            policy_id: Some(&policy.id),
            customer_name: "Dev Customer",
            customer_email: "dev@keygate.local",
            max_devices: 3,
            expires_at: keygate::clock::today() + chrono::Days::new(365),
            notes: None,
            created_by: &admin.id,
        },
    )
    .expect("Failed to create dev license");
    tracing::info!("License: {} (id: {})", license.license_key, license.id);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    // Copy-paste friendly output for API clients
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  admin_api_key: {}", api_key);
    println!("  product_id: {}", product.id);
    println!("  policy_id: {}", policy.id);
    println!("  license_key: {}", license.license_key);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    if config.is_dev() {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        signer: DownloadSigner::new(config.download_url_secret.as_bytes().to_vec()),
        files_dir: config.files_dir.clone(),
    };

    if cli.seed {
        if !config.is_dev() {
            tracing::warn!("--seed flag ignored: not in dev mode (set KEYGATE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    if let Some(ref username) = config.bootstrap_admin_username {
        bootstrap_first_admin(&state, username);
    }

    spawn_expiry_sweeper(
        state.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );

    let app = Router::new()
        .merge(handlers::client_router())
        .merge(handlers::admin_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Keygate server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
