use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::blockchain::{IndexingEngine, NodeClient};
use crate::error::{ApiError, ValidationError, WatcherError};
use crate::logging::LogContext;

const CODE_OK: i32 = 0;
const CODE_ERROR: i32 = 1;

/// Success envelope: `{"code": 0, "data": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub code: i32,
    pub data: T,
}

/// Failure envelope: `{"code": 1, "msg": ..., "detail": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub msg: String,
    pub detail: String,
}

/// Payload of `GET /v1/status`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub cursor: u64,
    pub subscriptions: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    pub address: String,
}

/// Application state shared across handlers
pub struct AppState<C: NodeClient> {
    pub engine: Arc<IndexingEngine<C>>,
}

// Derived Clone would require `C: Clone`
impl<C: NodeClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

fn success<T: Serialize>(data: T) -> Response {
    Json(DataResponse { code: CODE_OK, data }).into_response()
}

fn failure(error: impl Display) -> Response {
    let message = error.to_string();
    Json(ErrorResponse {
        code: CODE_ERROR,
        msg: message.clone(),
        detail: message,
    })
    .into_response()
}

fn validate_address(raw: &str) -> Result<&str, ValidationError> {
    let address = raw.trim();
    if address.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    Ok(address)
}

/// Build the router with every route mounted on `state`.
pub fn create_router<C: NodeClient + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/v1/get_current_block", get(get_current_block::<C>))
        .route("/v1/subscribe", post(subscribe::<C>))
        .route("/v1/get_transactions", get(get_transactions::<C>))
        .route("/v1/status", get(get_status::<C>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// HTTP API server
pub struct ApiServer<C: NodeClient> {
    engine: Arc<IndexingEngine<C>>,
    pub host: String,
    pub port: u16,
}

impl<C: NodeClient + 'static> ApiServer<C> {
    pub fn new(engine: Arc<IndexingEngine<C>>, host: String, port: u16) -> Self {
        Self { engine, host, port }
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(AppState {
            engine: Arc::clone(&self.engine),
        });

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        LogContext::new("api", "start")
            .with_metadata("addr", json!(addr))
            .info(&format!("HTTP API server listening on {}", addr));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        log::info!("HTTP API server stopped");
        Ok(())
    }
}

/// GET /ping
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

/// GET /v1/get_current_block - live read of the node's latest block
pub async fn get_current_block<C: NodeClient + 'static>(State(state): State<AppState<C>>) -> Response {
    match state.engine.get_current_block().await {
        Ok(block) => success(block),
        Err(e) => {
            let error = WatcherError::from(e);
            LogContext::new("api", "get_current_block")
                .with_metadata("severity", json!(format!("{:?}", error.severity())))
                .warn(&format!("Failed to read current block: {}", error));
            failure(error)
        }
    }
}

/// POST /v1/subscribe
pub async fn subscribe<C: NodeClient + 'static>(
    State(state): State<AppState<C>>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return failure(WatcherError::from(ValidationError::MalformedRequest(
                rejection.body_text(),
            )))
        }
    };

    match validate_address(&request.address) {
        Ok(address) => {
            state.engine.subscribe(address);
            success(())
        }
        Err(e) => failure(WatcherError::from(e)),
    }
}

/// GET /v1/get_transactions?address=...
pub async fn get_transactions<C: NodeClient + 'static>(
    State(state): State<AppState<C>>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return failure(WatcherError::from(ValidationError::MalformedRequest(
                rejection.body_text(),
            )))
        }
    };

    match validate_address(&query.address) {
        Ok(address) => success(state.engine.get_transactions(address)),
        Err(e) => failure(WatcherError::from(e)),
    }
}

/// GET /v1/status
pub async fn get_status<C: NodeClient + 'static>(State(state): State<AppState<C>>) -> Response {
    success(StatusResponse {
        cursor: state.engine.cursor(),
        subscriptions: state.engine.subscriptions().len(),
    })
}
