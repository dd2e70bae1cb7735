use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hostbuilder::auth;
use hostbuilder::cli::{format_dry_run, Args};
use hostbuilder::config::Settings;
use hostbuilder::server::{create_router, AppState};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load environment: an explicit file must exist, the implicit .env is
    // optional.
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    } else if let Err(e) = dotenvy::dotenv() {
        info!("No .env file loaded: {}", e);
    }

    let settings = Settings::from_env();

    // Dry-run mode: print resolved configuration and exit
    if args.dry_run {
        print!("{}", format_dry_run(&settings));
        return;
    }

    // One token per process lifetime; startup aborts if the exchange fails.
    let token = match auth::obtain_token(&settings).await {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to obtain cluster token: {}", e);
            process::exit(1);
        }
    };
    info!("Cluster token obtained for project {}", settings.project_name);

    let addr = format!("{}:{}", args.bind_addr, args.port);
    let state = AppState::new(settings, token);
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            process::exit(1);
        }
    };

    info!("hostbuilder listening on {}", addr);
    info!("Endpoints:");
    info!("  GET  /health       - Health check");
    info!("  GET  /status       - Service status");
    info!("  POST /v1/provision - Trigger a hosting build");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
