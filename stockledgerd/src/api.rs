//! HTTP API for the Stockledger daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Inventory listing and single-product balance
//! - Receive, remove and adjust stock
//! - Ledger history per product
//! - Point-of-sale transactions
//!
//! The authentication layer in front of the daemon supplies the caller via
//! the `x-actor-id` and `x-organization-id` headers.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use stockledger_domain::{
    BalanceView, Caller, CategoryId, LedgerEntry, OrganizationId, ProductId, SaleLine, SaleResult,
};
use stockledger_engine::{LedgerError, ProductCatalog, SaleItem, SaleOrchestrator, StockOperations};
use stockledger_store::LedgerStore;

/// Header carrying the authenticated user id
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Header carrying the user's organization, absent for users without one
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<S: LedgerStore + 'static, C: ProductCatalog + 'static> {
    pub operations: StockOperations<S, C>,
    pub sales: SaleOrchestrator<S, C>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Inventory listing filter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuery {
    pub category_id: Option<CategoryId>,
}

/// Request to receive stock.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

/// Request to remove stock.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveStockRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
}

/// Request to set stock to an absolute quantity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub product_id: ProductId,
    pub new_quantity: Decimal,
    pub notes: Option<String>,
}

/// Request to process a sale.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub items: Vec<SaleItem>,
    pub notes: Option<String>,
}

/// Balance of one product.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub organization_id: OrganizationId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// One ledger entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub product_id: ProductId,
    pub transaction_type: String,
    pub quantity_change: Decimal,
    pub quantity_before: Decimal,
    pub quantity_after: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One priced sale line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Committed sale.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub sale_id: String,
    pub items: Vec<SaleItemResponse>,
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Caller Identity
// =============================================================================

/// Caller extracted from the identity headers.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Caller);

#[async_trait]
impl<St> FromRequestParts<St> for CallerIdentity
where
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let actor_id = header_str(parts, ACTOR_HEADER)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| unauthenticated("Not authenticated"))?;

        let organization_id = match header_str(parts, ORGANIZATION_HEADER) {
            None => None,
            Some(raw) => Some(
                raw.trim()
                    .parse::<OrganizationId>()
                    .map_err(|_| unauthenticated("Invalid organization header"))?,
            ),
        };

        Ok(CallerIdentity(Caller {
            actor_id,
            organization_id,
        }))
    }
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<S, C>(state: Arc<ApiState<S, C>>) -> Router
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/inventory", get(list_inventory_handler))
        .route("/api/inventory/product/:product_id", get(get_inventory_handler))
        .route("/api/inventory/product/:product_id/history", get(history_handler))
        .route("/api/inventory/add", post(add_stock_handler))
        .route("/api/inventory/remove", post(remove_stock_handler))
        .route("/api/inventory/adjust", post(adjust_stock_handler))
        .route("/api/sales", post(sale_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List the organization's balances, optionally by category.
async fn list_inventory_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<Vec<InventoryResponse>>, ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let views = state
        .operations
        .list_balances(&caller, query.category_id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(views.iter().map(to_inventory_response).collect()))
}

/// Balance of a single product.
async fn get_inventory_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Path(product_id): Path<ProductId>,
) -> Result<Json<InventoryResponse>, ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let view = state
        .operations
        .get_balance(&caller, product_id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(to_inventory_response(&view)))
}

/// Ledger history of a product, newest first.
async fn history_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let entries = state
        .operations
        .list_history(&caller, product_id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(entries.iter().map(to_transaction_response).collect()))
}

/// Receive stock.
async fn add_stock_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Json(req): Json<AddStockRequest>,
) -> Result<(StatusCode, Json<InventoryResponse>), ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let view = state
        .operations
        .receive_stock(&caller, req.product_id, req.quantity, req.notes)
        .await
        .map_err(to_error_response)?;

    Ok((StatusCode::CREATED, Json(to_inventory_response(&view))))
}

/// Remove stock.
async fn remove_stock_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Json(req): Json<RemoveStockRequest>,
) -> Result<Json<InventoryResponse>, ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let view = state
        .operations
        .remove_stock(&caller, req.product_id, req.quantity, req.reference_id, req.notes)
        .await
        .map_err(to_error_response)?;

    Ok(Json(to_inventory_response(&view)))
}

/// Set stock to an absolute quantity.
async fn adjust_stock_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<InventoryResponse>, ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let view = state
        .operations
        .adjust_stock_to(&caller, req.product_id, req.new_quantity, req.notes)
        .await
        .map_err(to_error_response)?;

    Ok(Json(to_inventory_response(&view)))
}

/// Process a sale.
async fn sale_handler<S, C>(
    State(state): State<Arc<ApiState<S, C>>>,
    CallerIdentity(caller): CallerIdentity,
    Json(req): Json<SaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), ApiError>
where
    S: LedgerStore + 'static,
    C: ProductCatalog + 'static,
{
    let result = state
        .sales
        .process_sale(&caller, &req.items, req.notes)
        .await
        .map_err(to_error_response)?;

    Ok((StatusCode::CREATED, Json(to_sale_response(result))))
}

// =============================================================================
// Helpers
// =============================================================================

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn unauthenticated(message: &str) -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
            code: "UNAUTHENTICATED".to_string(),
        }),
    )
}

fn to_error_response(error: LedgerError) -> ApiError {
    let status = match &error {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::ForbiddenCrossOrganization { .. } => StatusCode::FORBIDDEN,
        LedgerError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientStock { .. } => StatusCode::CONFLICT,
        LedgerError::ProductInactive { .. } => StatusCode::BAD_REQUEST,
        LedgerError::NoOrganization => StatusCode::BAD_REQUEST,
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LedgerError::Catalog(_) => StatusCode::BAD_GATEWAY,
    };

    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    }

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
}

fn to_inventory_response(view: &BalanceView) -> InventoryResponse {
    InventoryResponse {
        organization_id: view.organization_id,
        product_id: view.product_id,
        product_name: view.product_name.clone(),
        quantity: view.quantity,
        unit_price: view.unit_price,
        updated_at: view.updated_at,
    }
}

fn to_transaction_response(entry: &LedgerEntry) -> TransactionResponse {
    TransactionResponse {
        id: entry.id,
        product_id: entry.product_id,
        transaction_type: entry.kind.to_string(),
        quantity_change: entry.quantity_change,
        quantity_before: entry.quantity_before,
        quantity_after: entry.quantity_after,
        reference_id: entry.correlation_id.clone(),
        notes: entry.notes.clone(),
        created_by: entry.actor_id,
        created_at: entry.created_at,
    }
}

fn to_sale_item_response(line: SaleLine) -> SaleItemResponse {
    SaleItemResponse {
        product_id: line.product_id,
        product_name: line.product_name,
        quantity: line.quantity,
        unit_price: line.unit_price,
        total_price: line.line_total,
    }
}

fn to_sale_response(result: SaleResult) -> SaleResponse {
    SaleResponse {
        sale_id: result.sale_id,
        items: result.lines.into_iter().map(to_sale_item_response).collect(),
        total_amount: result.total_amount,
        notes: result.notes,
        timestamp: result.created_at,
    }
}

// =============================================================================
// Tests
// =============================================================================
