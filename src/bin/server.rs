use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use ticket_tracker::config::ServerConfig;
use ticket_tracker::core::session::create_session_manager;
use ticket_tracker::core::tracker::TrackerService;
use ticket_tracker::routes::{routes, AppState};
use ticket_tracker::security_logger::init_security_logger;
use ticket_tracker::storage::MemoryStorageProvider;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Load config from env
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, tls={}, development_mode={}",
        config.host, config.port, config.enable_tls, config.development_mode
    );
    if config.development_mode {
        warn!("Development mode is enabled: cookies may be sent without Secure and localhost origins are accepted");
    }

    init_security_logger();

    let tracker = Arc::new(TrackerService::new(Arc::new(MemoryStorageProvider::new())));

    if let Some(admin) = &config.bootstrap_admin {
        if let Err(e) = tracker.ensure_admin(&admin.username, &admin.password).await {
            error!("Failed to provision administrator '{}': {}", admin.username, e);
            std::process::exit(1);
        }
    } else {
        warn!("No TRACKER_ADMIN_USERNAME configured; no account will be able to create projects");
    }

    // Create session manager
    let sessions = create_session_manager(config.session_ttl);
    sessions.clone().start_cleanup_task();

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let tls_paths = match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) if config.enable_tls => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let state = Arc::new(AppState::new(tracker, sessions, config));
    let app = routes(state);

    match tls_paths {
        Some((cert_path, key_path)) => {
            info!("Starting ticket tracker on https://{}", addr);
            warp::serve(app)
                .tls()
                .cert_path(cert_path)
                .key_path(key_path)
                .run(addr)
                .await;
        }
        None => {
            info!("Starting ticket tracker on http://{}", addr);
            warp::serve(app).run(addr).await;
        }
    }
}
