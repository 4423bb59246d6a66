//! Multi-vendor chat gateway
//!
//! Serves a unified chat API over the Tencent LKE bot and SoochowLife
//! vendors, and reverse-proxies `/api/{provider}/...` to vendor upstreams.

mod api;
mod conversion;
mod core;
mod models;

use crate::api::endpoints::{AppState, create_router};
use crate::core::config::Config;
use crate::core::logging::init_logging;
use crate::core::model_manager::ModelManager;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Check for --help flag
    if std::env::args().any(|arg| arg == "--help") {
        print_help();
        return;
    }

    dotenv::dotenv().ok();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.server.log_level);
    print_startup_banner(&config);

    let model_manager = match ModelManager::from_config(&config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to create vendor clients: {:#}", e);
            std::process::exit(1);
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app_state = match AppState::new(config, model_manager) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to create application state: {:#}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    println!("🚀 Chat Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!("✅ Configuration loaded successfully");
    match config.default_provider() {
        Some(provider) => println!("   Default Provider: {}", provider),
        None => println!("   Default Provider: none"),
    }
    if let Some(tencent) = &config.providers.tencent {
        println!("   Tencent Endpoint: {}{}", tencent.endpoint, tencent.chat_path);
    }
    if let Some(soochow) = &config.providers.soochowlife {
        println!(
            "   SoochowLife Mode: {}",
            if soochow.is_app { "direct" } else { "proxied" }
        );
    }
    for (name, url) in &config.proxy.upstreams {
        println!("   Proxy Upstream: {} -> {}", name, url);
    }
    println!("   Request Timeout: {}ms", config.request.timeout_ms);
    println!("   Proxy Timeout: {}s", config.proxy.timeout_secs);
    println!("   Server: {}:{}", config.server.host, config.server.port);
    println!(
        "   Access Code: {}",
        if config.access.code.is_some() {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!();
}

/// Print help message
fn print_help() {
    println!("Chat Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: chat-gateway [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help    Display this help message");
    println!();
    println!("Environment variables:");
    println!("  CONFIG_PATH - Path to the TOML configuration (default: config.toml)");
    println!("  RUST_LOG    - Log filter, overrides server.log_level");
    println!();
    println!("Configuration sections:");
    println!("  [server]                host, port, log_level, public_url");
    println!("  [request]               timeout_ms, thinking_timeout_ms");
    println!("  [access]                code");
    println!("  [providers]             default");
    println!("  [providers.tencent]     bot_app_key, endpoint, chat_path");
    println!("  [providers.soochowlife] url, use_custom_config, is_app, base_url, chat_path");
    println!("  [proxy]                 timeout_secs");
    println!("  [proxy.upstreams]       <provider> = \"<base url>\"");
}
