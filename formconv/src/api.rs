//! HTTP front end for the pipeline.
//!
//! `POST /responseAI.json` with `{"query": "..."}` runs one generation and
//! answers `{"success": true, "data": <converted form>}`; `GET /health`
//! answers `{"status": "healthy"}`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::pipeline::{FormConverter, FormGenerator, Pipeline, SurveyRequest};

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    query: Option<String>,
}

pub fn router<G, C>(pipeline: Arc<Pipeline<G, C>>) -> Router
where
    G: FormGenerator + 'static,
    C: FormConverter + 'static,
{
    Router::new()
        .route("/responseAI.json", post(generate::<G, C>))
        .route("/health", get(health))
        .with_state(pipeline)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn generate<G, C>(State(pipeline): State<Arc<Pipeline<G, C>>>, body: Bytes) -> (StatusCode, Json<Value>)
where
    G: FormGenerator + 'static,
    C: FormConverter + 'static,
{
    let request = serde_json::from_slice::<GenerateBody>(&body)
        .ok()
        .and_then(|b| b.query)
        .and_then(|q| SurveyRequest::parse(&q).ok());

    let Some(request) = request else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Missing query parameter" })),
        );
    };

    info!("API request: {}", request);
    match pipeline.run(&request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": outcome.document })),
        ),
        Err(e) => {
            let message = e.report();
            error!("Generation failed: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": message })),
            )
        }
    }
}
