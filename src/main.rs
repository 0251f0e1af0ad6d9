// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use fabstir_vision_node::{
    api::{start_server, ApiConfig, AppState},
    config::NodeConfig,
    detection::{DetectionModelManager, DetectorConfig},
};
use std::env;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Fabstir Vision Node...\n");
    println!("📦 BUILD VERSION: {}", fabstir_vision_node::version::VERSION);
    println!("📅 Build Date: {}", fabstir_vision_node::version::BUILD_DATE);
    println!();

    // Parse environment variables for configuration
    let config = NodeConfig::from_env();
    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!("Invalid configuration: {}", e));
    }

    // Load the detection model from the local model repository
    println!("🧠 Initializing detection model...");
    println!("   Repository:   {}", config.model_dir.display());
    println!("   Model:        {}", config.model_name);
    println!("   Input size:   {}px", config.input_size);
    println!("   Confidence:   {}", config.confidence_threshold);
    println!("   IoU:          {}", config.iou_threshold);

    let manager = DetectionModelManager::new(DetectorConfig::from(&config)).await?;
    if manager.has_detector() {
        println!("✅ Detection model loaded successfully");
    } else {
        eprintln!(
            "⚠️  Model not found at: {}",
            config.model_path().display()
        );
        eprintln!("   The node will start but /detect will return 503.");
    }

    // Configure and start API server
    println!("\n🌐 Starting API server...");
    let api_config = ApiConfig {
        listen_addr: format!("0.0.0.0:{}", config.api_port),
        upload_dir: config.upload_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    };

    let state = AppState::new(api_config);
    if let Some(detector) = manager.get_detector() {
        state.set_detector(detector).await;
    }

    let server_handle = tokio::spawn(start_server(state));

    println!("✅ API server started on http://0.0.0.0:{}", config.api_port);

    // Print node information
    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("🎉 Fabstir Vision Node is running!");
    println!("{}", separator);
    println!("API Port:       {}", config.api_port);
    println!("Model:          {}", config.model_name);
    println!("Upload Dir:     {}", config.upload_dir.display());
    println!("\nAPI Endpoints:");
    println!("  Health:       http://localhost:{}/health", config.api_port);
    println!("  Detect:       POST http://localhost:{}/detect", config.api_port);
    println!("\nTest with curl:");
    println!("  curl -X POST http://localhost:{}/detect \\", config.api_port);
    println!("    -F 'image=@photo.jpg'");
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    // Wait for shutdown signal
    signal::ctrl_c().await?;

    println!("\n⏹️  Shutting down...");

    server_handle.abort();

    println!("👋 Goodbye!");
    Ok(())
}
