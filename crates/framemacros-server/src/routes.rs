//! HTTP routes

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use framemacros_rewrite::Rewriter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{warn, Level};
use uuid::Uuid;

use crate::catalog::{Catalog, TableListing};
use crate::explain::{explain, ExplainRequest, ExplainResponse};
use crate::log_event;

#[derive(Clone)]
pub struct AppState {
    pub rewriter: Rewriter,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(rewriter: Rewriter, catalog: Catalog) -> Self {
        Self {
            rewriter,
            catalog: Arc::new(catalog),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub registry_version: String,
    pub tables: usize,
    pub functions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub request_id: String,
    pub error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tables", get(tables))
        .route("/explain", post(explain_call))
        .with_state(state)
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        registry_version: state.rewriter.registry().version().to_string(),
        tables: state.catalog.len(),
        functions: state.rewriter.registry().names().len(),
    })
}

pub async fn tables(State(state): State<AppState>) -> Json<Vec<TableListing>> {
    Json(state.catalog.listing())
}

pub async fn explain_call(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, (StatusCode, Json<ErrorBody>)> {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let table = request.table.clone();

    match explain(&state.rewriter, state.catalog.as_ref(), request, request_id.clone()) {
        Ok(response) => {
            log_event!(
                level: Level::INFO,
                event: "explain_completed",
                request_id: request_id,
                table: table,
                triples: response.plan.triples.len(),
                duration_us: started.elapsed().as_micros()
            );
            Ok(Json(response))
        }
        Err(err) => {
            warn!(request_id = %request_id, table = %table, error = %err, "Explain failed");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    request_id,
                    error: err.to_string(),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ir::TableSchema;
    use std::collections::HashMap;

    fn state() -> AppState {
        AppState::new(
            Rewriter::default(),
            Catalog::new([TableSchema::from_names("people", ["name", "age"])]),
        )
    }

    fn request(call: &str) -> ExplainRequest {
        ExplainRequest {
            table: "people".to_string(),
            call: call.to_string(),
            scope: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(health) = health(State(state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.tables, 1);
        assert!(health.functions > 0);
        assert_eq!(
            health.registry_version,
            state().rewriter.registry().version()
        );
    }

    #[tokio::test]
    async fn test_tables() {
        let Json(listing) = tables(State(state())).await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].columns.len(), 2);
    }

    #[tokio::test]
    async fn test_explain_ok() {
        let Json(response) = explain_call(State(state()), Json(request("@subset(:age > 30)")))
            .await
            .unwrap();
        assert_eq!(response.plan.triples.len(), 1);
        assert!(Uuid::parse_str(&response.request_id).is_ok());
    }

    #[tokio::test]
    async fn test_explain_conflict_is_bad_request() {
        let (status, Json(body)) =
            explain_call(State(state()), Json(request("@transform(@r @c :y = :age)")))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("Conflicting"), "{}", body.error);
    }
}
