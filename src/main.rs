//! Care Scheduling - Axum Server
//!
//! Run with: cargo run
//! Then seed demo data: curl -X POST http://localhost:7860/demo-data/SMALL/load

use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use care_scheduling::api::{self, AppState};
use care_scheduling::console;
use care_scheduling::notify::Notifier;

#[tokio::main]
async fn main() {
    // Initialize tracing (logs from care_scheduling at INFO level).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("care_scheduling=info".parse().unwrap()),
        )
        .init();

    console::print_banner();

    // CORS for development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(AppState::new(Notifier::spawn()));
    let app = api::router(state).layer(cors);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(7860);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!(
        "{} Server listening on {}",
        "▸".bright_green(),
        format!("http://{}", addr).bright_cyan().underline()
    );

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
