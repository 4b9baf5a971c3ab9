//! # HTTP API
//!
//! Builds the axum router that puts one domain's processor on the network.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path           | Description                                        |
//! |--------|----------------|----------------------------------------------------|
//! | GET    | `/health`      | Liveness probe                                     |
//! | GET    | `/status`      | Domain, suppliers, inventory size                  |
//! | POST   | `/transaction` | Encoded tree in, this domain's subtree out         |
//! | POST   | `/auction`     | Publisher role: sign an Offer, fan out, resolve    |
//! | POST   | `/audit`       | Encoded tree in, audit report out (`?scope=winner`)|
//!
//! `/transaction` is the endpoint other domains call during fan-out. Its
//! status codes are part of the exchange contract: 200 with a subtree, 400
//! for a request this domain refuses to extend, 500 when the fault is local.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use swan_protocol::audit::{audit_tree, audit_winner_path, AuditReport};
use swan_protocol::config::{MAX_TRANSACTION_BYTES, TREE_CONTENT_TYPE};
use swan_protocol::exchange::TransactionProcessor;
use swan_protocol::payload::{Bid, Offer};
use swan_protocol::tree::{codec::to_wire, decode, WireNode};
use swan_protocol::ProtocolError;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// This domain's processor.
    pub processor: Arc<TransactionProcessor>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all routes, CORS, tracing, and the
/// request body limit.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/transaction", post(transaction_handler))
        .route("/auction", post(auction_handler))
        .route("/audit", post(audit_handler))
        .layer(DefaultBodyLimit::max(MAX_TRANSACTION_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A [`ProtocolError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ProtocolError);

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub domain: String,
    pub suppliers: Vec<String>,
    pub adverts: usize,
    pub bad_actor: bool,
    pub timestamp: String,
}

/// Body of `POST /auction`.
#[derive(Debug, Deserialize)]
pub struct AuctionRequest {
    /// Publisher page domain. Defaults to this node's domain.
    #[serde(default)]
    pub pub_domain: Option<String>,
    pub placement: String,
    #[serde(default)]
    pub cbid: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub preferences: Option<String>,
    /// Whitespace-separated advertiser domains to exclude.
    #[serde(default)]
    pub stopped: Option<String>,
}

impl AuctionRequest {
    fn into_offer(self, default_domain: &str) -> Offer {
        let mut offer = Offer::new(
            self.pub_domain.unwrap_or_else(|| default_domain.to_string()),
            self.placement,
        );
        offer.cbid = self.cbid;
        offer.sid = self.sid;
        offer.preferences = self.preferences;
        offer.stopped = self
            .stopped
            .as_deref()
            .map(Offer::parse_stopped)
            .unwrap_or_default();
        offer
    }
}

/// Response for `POST /auction`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuctionResponse {
    /// The complete tree, root first.
    pub tree: WireNode,
    /// Domain of the node the winner path ends on.
    pub winner: String,
    pub bid: Option<Bid>,
    pub suppliers: usize,
    pub failures: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditScope {
    #[default]
    Full,
    Winner,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub scope: AuditScope,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.processor.config();
    Json(StatusResponse {
        version: state.version.clone(),
        domain: config.host.clone(),
        suppliers: config.suppliers.clone(),
        adverts: config.adverts.len(),
        bad_actor: config.bad_actor,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /transaction`: extend the caller's tree and answer with this
/// domain's subtree.
async fn transaction_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let result = async {
        let tree = decode(&body)?;
        let mut rng = StdRng::from_entropy();
        let outcome = state.processor.process(tree, &mut rng).await?;
        let bytes = outcome.encode_response()?;
        Ok::<_, ProtocolError>((outcome, bytes))
    }
    .await;

    match result {
        Ok((outcome, bytes)) => {
            state.metrics.transactions_processed_total.inc();
            if let Some(report) = &outcome.fanout {
                state.metrics.record_fanout(report);
            }
            Ok(([(header::CONTENT_TYPE, TREE_CONTENT_TYPE)], bytes).into_response())
        }
        Err(e) => {
            state.metrics.transactions_rejected_total.inc();
            Err(e.into())
        }
    }
}

/// `POST /auction`: act as publisher for one placement.
async fn auction_handler(
    State(state): State<AppState>,
    Json(request): Json<AuctionRequest>,
) -> Result<Json<AuctionResponse>, ApiError> {
    let offer = request.into_offer(state.processor.domain());
    let mut rng = StdRng::from_entropy();
    let outcome = state.processor.open_auction(offer, &mut rng).await?;

    state.metrics.auctions_opened_total.inc();
    if outcome.bid.is_some() {
        state.metrics.winners_resolved_total.inc();
    }
    let (suppliers, failures) = match &outcome.fanout {
        Some(report) => {
            state.metrics.record_fanout(report);
            (report.dispatched(), report.failures())
        }
        None => (0, 0),
    };

    Ok(Json(AuctionResponse {
        tree: to_wire(&outcome.tree, outcome.tree.root()),
        winner: outcome.tree.record(outcome.winner).domain.clone(),
        bid: outcome.bid,
        suppliers,
        failures,
    }))
}

/// `POST /audit`: verify every node of a finished tree, or only the winner
/// path.
async fn audit_handler(
    Query(query): Query<AuditQuery>,
    body: Bytes,
) -> Result<Json<AuditReport>, ApiError> {
    let tree = decode(&body)?;
    let report = match query.scope {
        AuditScope::Full => audit_tree(&tree)?,
        AuditScope::Winner => audit_winner_path(&tree)?,
    };
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
