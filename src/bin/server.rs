//! nlframe HTTP server

use axum::{
    extract::Json,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

use nlframe_solver::prelude::*;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    success: bool,
    error: Option<String>,
    report: Option<AnalysisReport>,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn analyze(Json(definition): Json<ModelDefinition>) -> impl IntoResponse {
    info!(
        "Analysis request: {} nodes, {} elements",
        definition.nodes.len(),
        definition.elements.len()
    );

    // The solve is CPU bound and fans out over rayon
    let result = tokio::task::spawn_blocking(move || run_analysis(&definition)).await;

    match result {
        Ok(Ok(report)) => (
            StatusCode::OK,
            Json(AnalysisResponse {
                success: true,
                error: None,
                report: Some(report),
            }),
        ),
        Ok(Err(e)) => {
            warn!("Analysis rejected: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(AnalysisResponse {
                    success: false,
                    error: Some(e.to_string()),
                    report: None,
                }),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AnalysisResponse {
                success: false,
                error: Some(e.to_string()),
                report: None,
            }),
        ),
    }
}

fn run_analysis(definition: &ModelDefinition) -> NlFrameResult<AnalysisReport> {
    let mut model = Model::from_definition(definition)?;
    let outcome = model.analyze()?;
    if !outcome.is_finished() {
        warn!("Analysis stopped early: {:?}", outcome);
    }
    model.report()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/analyze", post(analyze))
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8086));
    info!("nlframe server listening on http://{}", addr);
    println!("nlframe server listening on http://{}", addr);
    println!("  Health check: GET  /health");
    println!("  Analysis:     POST /api/v1/analyze");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
