//! Dashboard JSON server
//!
//! Serves the current dashboard view to a browser front end.
//! Run with: cargo run --bin dashboard_server

use anyhow::Result;
use rolloutboard::error::RefreshError;
use rolloutboard::loader::{source_from_config, LoadPolicy};
use rolloutboard::logging::{log, obj, v_str, Domain, Level};
use rolloutboard::refresh::Dashboard;
use rolloutboard::state::Config;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let source = source_from_config(&cfg)?;
    let dashboard = Arc::new(Dashboard::new(
        source,
        LoadPolicy::from_config(&cfg),
        cfg.maturity_scale_max,
    ));

    if let Err(err) = dashboard.refresh().await {
        // keep serving; /api/refresh can recover once the files are fixed
        eprintln!("initial load failed: {}", err);
    }

    let listener = TcpListener::bind(("127.0.0.1", cfg.port)).await?;
    println!("Dashboard server running at http://localhost:{}", cfg.port);
    println!();
    println!("Endpoints:");
    println!("  GET  /api/dashboard - Full dashboard view as JSON");
    println!("  GET  /api/summary   - KPI cards, phase progress, backlog stats");
    println!("  POST /api/refresh   - Reload every dataset");
    println!("  GET  /api/health    - Health check");
    println!();
    log(
        Level::Info,
        Domain::System,
        "server_started",
        obj(&[("port", json!(cfg.port)), ("source", v_str(&dashboard.source_name()))]),
    );

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(_) => continue,
        };
        let dashboard = dashboard.clone();
        tokio::spawn(async move {
            let _ = handle(stream, &dashboard).await;
        });
    }
}

async fn handle(mut stream: TcpStream, dashboard: &Dashboard) -> Result<()> {
    let mut request = String::new();
    BufReader::new(&mut stream).read_line(&mut request).await?;

    let (status, body) = route(request.trim_end(), dashboard).await;
    let response = format!(
        "HTTP/1.1 {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {}\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

async fn route(request: &str, dashboard: &Dashboard) -> (&'static str, String) {
    let not_loaded = || ("503 SERVICE UNAVAILABLE", json!({"error": "no data loaded"}).to_string());

    if request.starts_with("GET /api/dashboard") {
        match dashboard.view() {
            Some(view) => ("200 OK", serde_json::to_string(&view).unwrap_or_default()),
            None => not_loaded(),
        }
    } else if request.starts_with("GET /api/summary") {
        match dashboard.view() {
            Some(view) => ("200 OK", view.summary().to_string()),
            None => not_loaded(),
        }
    } else if request.starts_with("POST /api/refresh") {
        match dashboard.refresh().await {
            Ok(data) => (
                "200 OK",
                json!({"status": "ok", "rows": data.total_rows()}).to_string(),
            ),
            Err(RefreshError::InFlight) => (
                "409 CONFLICT",
                json!({"error": "refresh already running"}).to_string(),
            ),
            Err(RefreshError::Load(err)) => (
                "502 BAD GATEWAY",
                json!({"error": err.to_string(), "dataset": err.dataset()}).to_string(),
            ),
        }
    } else if request.starts_with("GET /api/health") {
        (
            "200 OK",
            json!({
                "status": "ok",
                "loaded": dashboard.snapshot().is_some(),
                "refreshing": dashboard.is_refreshing(),
            })
            .to_string(),
        )
    } else {
        ("404 NOT FOUND", json!({"error": "not found"}).to_string())
    }
}
