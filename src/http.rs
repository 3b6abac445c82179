//! HTTP gateway for the back-office dashboard.
//!
//! Every route wraps one core operation. Requests carry the data the
//! operation needs; receiving and stock adjustments are forwarded to the
//! REST backend when one is configured.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;

use crate::client::{BackendClient, BackendError, SessionContext};
use crate::config::Config;
use crate::domain::adjustment::{StockAdjustment, StockAdjustmentPayload};
use crate::domain::aggregates::{ItemStatus, Product, ProductError, PurchaseOrder};
use crate::domain::events::DomainEvent;
use crate::domain::receiving::{initialize_receiving, prepare_receipt, ReceivingEntry, ReceivingPayload};
use crate::domain::value_objects::Quantity;
use crate::domain::variants::{regenerate_variants, ProductAttribute, ProductVariant, RandomSkuGenerator, SkuGenerator, VariantTemplate};
use crate::BackofficeError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Option<BackendClient>,
    pub skus: Arc<dyn SkuGenerator + Send + Sync>,
}

impl AppState {
    pub fn new(config: Config) -> crate::Result<Self> {
        let backend = match &config.backend_api_url {
            Some(url) => Some(BackendClient::new(url.clone(), config.backend_timeout)?),
            None => None,
        };
        Ok(Self { config: Arc::new(config), backend, skus: Arc::new(RandomSkuGenerator) })
    }

    pub fn with_sku_generator(mut self, skus: Arc<dyn SkuGenerator + Send + Sync>) -> Self { self.skus = skus; self }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "opensase-backoffice"})) }))
        .route("/api/v1/variants/regenerate", post(regenerate))
        .route("/api/v1/products/attributes", post(add_attribute))
        .route("/api/v1/products/attributes/remove", post(remove_attribute))
        .route("/api/v1/products/variants/remove", post(remove_variant))
        .route("/api/v1/receiving/initialize", post(initialize))
        .route("/api/v1/receiving/validate", post(validate))
        .route("/api/v1/purchase-orders/:id/receive", post(receive))
        .route("/api/v1/stock-adjustments", post(adjust_stock))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub attributes: Vec<ProductAttribute>,
    #[serde(default)]
    pub existing_variants: Vec<ProductVariant>,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub product_name: String,
    #[serde(default)]
    pub category_id: String,
    pub base_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddAttributeRequest {
    pub product: Product,
    #[validate(length(min = 1, message = "Attribute name is required"))]
    pub name: String,
    /// Comma-separated, e.g. `"S, M, L"`.
    #[validate(length(min = 1, message = "Attribute values are required"))]
    pub values: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveAttributeRequest { pub product: Product, pub name: String }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveVariantRequest { pub product: Product, pub variant_id: String }

#[derive(Debug, Deserialize)]
pub struct InitializeRequest { pub order: PurchaseOrder }

#[derive(Debug, Deserialize)]
pub struct ReceivingRequest {
    /// Ignored when a backend is configured; the order is then fetched.
    #[serde(default)]
    pub order: Option<PurchaseOrder>,
    pub entries: Vec<ReceivingEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest { pub product: Product, pub adjustment: StockAdjustment }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedStatus { pub item_id: String, pub status: ItemStatus }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivingResponse {
    pub payload: ReceivingPayload,
    pub projected_statuses: Vec<ProjectedStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentResponse {
    pub stock_quantity: Quantity,
    pub payload: StockAdjustmentPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn regenerate(State(s): State<AppState>, Json(r): Json<RegenerateRequest>) -> Result<Json<Vec<ProductVariant>>, BackofficeError> {
    r.validate()?;
    let template = VariantTemplate { product_name: &r.product_name, category_id: &r.category_id, base_price: r.base_price };
    Ok(Json(regenerate_variants(&r.attributes, &r.existing_variants, template, s.skus.as_ref())))
}

async fn add_attribute(State(s): State<AppState>, Json(r): Json<AddAttributeRequest>) -> Result<Json<Product>, BackofficeError> {
    r.validate()?;
    let mut product = r.product;
    product.add_attribute(&r.name, &r.values, s.skus.as_ref())?;
    log_events(product.take_events());
    Ok(Json(product))
}

async fn remove_attribute(State(s): State<AppState>, Json(r): Json<RemoveAttributeRequest>) -> Result<Json<Product>, BackofficeError> {
    let mut product = r.product;
    product.remove_attribute(&r.name, s.skus.as_ref());
    log_events(product.take_events());
    Ok(Json(product))
}

async fn remove_variant(State(s): State<AppState>, Json(r): Json<RemoveVariantRequest>) -> Result<Json<Product>, BackofficeError> {
    let mut product = r.product;
    product.remove_variant(&r.variant_id, s.config.variant_removal, s.skus.as_ref())?;
    log_events(product.take_events());
    Ok(Json(product))
}

async fn initialize(State(s): State<AppState>, Json(r): Json<InitializeRequest>) -> Json<Vec<ReceivingEntry>> {
    Json(initialize_receiving(&r.order, s.config.receiving_workflow))
}

async fn validate(State(s): State<AppState>, Json(r): Json<ReceivingRequest>) -> Result<Json<ReceivingResponse>, BackofficeError> {
    let order = r.order.ok_or_else(|| BackofficeError::BadRequest("order is required".into()))?;
    let payload = prepare_receipt(&order, &r.entries, s.config.receiving_workflow)?;
    Ok(Json(receiving_response(&order, payload, None)))
}

async fn receive(
    State(s): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(r): Json<ReceivingRequest>,
) -> Result<Json<ReceivingResponse>, BackofficeError> {
    let mut session = session_from(&headers);
    let order = match (&s.backend, r.order) {
        (Some(backend), _) => backend.get_purchase_order(&mut session, &id).await?,
        (None, Some(order)) => order,
        (None, None) => return Err(BackofficeError::BadRequest("order is required when no backend is configured".into())),
    };
    if order.id != id {
        return Err(BackofficeError::BadRequest(format!("order {} does not match path {}", order.id, id)));
    }

    let payload = prepare_receipt(&order, &r.entries, s.config.receiving_workflow)?;
    let message = match &s.backend {
        Some(backend) => Some(backend.submit_receiving(&mut session, &payload).await?),
        None => None,
    };
    Ok(Json(receiving_response(&order, payload, message)))
}

async fn adjust_stock(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<AdjustmentRequest>) -> Result<Json<AdjustmentResponse>, BackofficeError> {
    let mut product = r.product;
    let stock_quantity = product.apply_adjustment(&r.adjustment)?;
    log_events(product.take_events());
    let message = match &s.backend {
        Some(backend) => Some(backend.adjust_stock(&mut session_from(&headers), &r.adjustment).await?),
        None => None,
    };
    Ok(Json(AdjustmentResponse { stock_quantity, payload: r.adjustment.to_payload(), message }))
}

fn receiving_response(order: &PurchaseOrder, payload: ReceivingPayload, message: Option<String>) -> ReceivingResponse {
    let projected_statuses = payload.projected_statuses(order).into_iter()
        .map(|(item_id, status)| ProjectedStatus { item_id, status })
        .collect();
    ReceivingResponse { payload, projected_statuses, message }
}

fn session_from(headers: &HeaderMap) -> SessionContext {
    headers.get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(SessionContext::from_authorization)
        .unwrap_or_default()
}

fn log_events(events: Vec<DomainEvent>) {
    for event in events {
        tracing::info!(?event, "domain event");
    }
}

impl IntoResponse for BackofficeError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            BackofficeError::Receiving(e) => (StatusCode::UNPROCESSABLE_ENTITY, json!({
                "error": "Validation Errors",
                "details": e.messages(),
            })),
            BackofficeError::InvalidRequest(errors) => {
                let details: HashMap<&str, Vec<String>> = errors.field_errors().into_iter()
                    .map(|(field, errs)| (field, errs.iter().filter_map(|e| e.message.as_ref().map(|m| m.to_string())).collect()))
                    .collect();
                (StatusCode::BAD_REQUEST, json!({ "error": "One or more fields are invalid", "details": details }))
            }
            BackofficeError::Product(ProductError::DuplicateAttribute(_)) => (StatusCode::CONFLICT, json!({ "error": self.to_string() })),
            BackofficeError::Product(ProductError::EmptyAttribute(_)) => (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": self.to_string() })),
            BackofficeError::Product(ProductError::VariantNotFound(_)) => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            BackofficeError::Receipt(_) | BackofficeError::Adjustment(_) => (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": self.to_string() })),
            BackofficeError::Backend(BackendError::SessionExpired) => (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() })),
            BackofficeError::Backend(BackendError::NoContent) => return StatusCode::NO_CONTENT.into_response(),
            BackofficeError::Backend(e) => {
                tracing::error!("backend failure: {}", e);
                (StatusCode::BAD_GATEWAY, json!({ "error": e.to_string() }))
            }
            BackofficeError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            BackofficeError::Config(e) => {
                tracing::error!("configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Unexpected server error" }))
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Sku;
    use crate::domain::variants::AttributeValues;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    struct FixedSkus;
    impl SkuGenerator for FixedSkus {
        fn generate(&self, _: &str, values: &AttributeValues, _: &str) -> Sku {
            Sku::new(format!("FX-{}", values.values().cloned().collect::<Vec<_>>().join("-"))).unwrap()
        }
    }

    fn app(config: Config) -> Router {
        router(AppState::new(config).unwrap().with_sku_generator(Arc::new(FixedSkus)))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri).header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn order_json() -> Value {
        json!({
            "_id": "po1", "orderNumber": "PO-1001", "supplierName": "Home Goods Supply",
            "items": [
                {"_id": "i1", "productId": "p1", "productName": "T-Shirt", "variantId": "v1",
                 "variantAttributes": {"Size": "M"}, "quantity": 10, "unitCost": 15.99, "receivedQuantity": 4, "status": "partial"},
                {"_id": "i2", "productId": "p2", "productName": "Mug", "quantity": 5, "unitCost": 3}
            ]
        })
    }

    #[tokio::test]
    async fn test_regenerate_endpoint() {
        let (status, body) = post_json(app(Config::default()), "/api/v1/variants/regenerate", json!({
            "attributes": [{"name": "Size", "values": ["S", "M"]}, {"name": "Color", "values": ["Red"]}],
            "productName": "T-Shirt", "categoryId": "clothing", "basePrice": 15.99
        })).await;
        assert_eq!(status, StatusCode::OK);
        let variants = body.as_array().unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0]["sku"], "FX-RED-S");
        assert_eq!(variants[1]["attributeValues"]["Size"], "M");
    }

    #[tokio::test]
    async fn test_regenerate_requires_product_name() {
        let (status, body) = post_json(app(Config::default()), "/api/v1/variants/regenerate", json!({
            "attributes": [], "productName": "", "basePrice": 1
        })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["product_name"][0], "Product name is required");
    }

    #[tokio::test]
    async fn test_duplicate_attribute_conflict() {
        let product = json!({"name": "T-Shirt", "price": 10, "categoryId": "cl", "attributes": [{"name": "Size", "values": ["S"]}]});
        let (status, body) = post_json(app(Config::default()), "/api/v1/products/attributes", json!({
            "product": product, "name": "SIZE", "values": "M, L"
        })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Attribute \"SIZE\" already exists");
    }

    #[tokio::test]
    async fn test_attribute_without_values_unprocessable() {
        let product = json!({"name": "T-Shirt", "price": 10, "categoryId": "cl"});
        let (status, body) = post_json(app(Config::default()), "/api/v1/products/attributes", json!({
            "product": product, "name": "Fit", "values": " , "
        })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Attribute \"Fit\" needs at least one value");
    }

    #[tokio::test]
    async fn test_add_attribute_returns_variants() {
        let product = json!({"name": "T-Shirt", "price": 10, "categoryId": "cl"});
        let (status, body) = post_json(app(Config::default()), "/api/v1/products/attributes", json!({
            "product": product, "name": "Size", "values": "S, M, L"
        })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["variants"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_initialize_uses_remaining() {
        let (status, body) = post_json(app(Config::default()), "/api/v1/receiving/initialize", json!({ "order": order_json() })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["receivedQuantityNow"], 6);
        assert_eq!(body[1]["qualityCheck"], "passed");
    }

    #[tokio::test]
    async fn test_validate_reports_all_violations() {
        let (status, body) = post_json(app(Config::default()), "/api/v1/receiving/validate", json!({
            "order": order_json(),
            "entries": [
                {"itemId": "i1", "receivedQuantityNow": 7, "qualityCheck": "passed"},
                {"itemId": "i2", "receivedQuantityNow": 6, "qualityCheck": "passed"}
            ]
        })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"], json!([
            "T-Shirt (Size: M): Received quantity cannot exceed the remaining quantity (6)",
            "Mug: Received quantity cannot exceed the remaining quantity (5)"
        ]));
    }

    #[tokio::test]
    async fn test_receive_without_backend_returns_payload() {
        let (status, body) = post_json(app(Config::default()), "/api/v1/purchase-orders/po1/receive", json!({
            "order": order_json(),
            "entries": [{"itemId": "i1", "receivedQuantityNow": 6, "qualityCheck": "passed", "notes": "ok"}]
        })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["items"][0]["variantId"], "v1");
        assert_eq!(body["projectedStatuses"][0]["status"], "received");
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_receive_rejects_mismatched_order() {
        let (status, _) = post_json(app(Config::default()), "/api/v1/purchase-orders/po2/receive", json!({
            "order": order_json(), "entries": []
        })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stock_adjustment_endpoint() {
        let product = json!({"_id": "3", "name": "Simple Mug", "price": 5, "categoryId": "home", "stockQuantity": 200});
        let (status, body) = post_json(app(Config::default()), "/api/v1/stock-adjustments", json!({
            "product": product,
            "adjustment": {"productId": "3", "direction": "subtract", "quantity": 20}
        })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stockQuantity"], 180);
        assert_eq!(body["payload"]["notes"], "Manual reduction");

        let (status, _) = post_json(app(Config::default()), "/api/v1/stock-adjustments", json!({
            "product": {"_id": "3", "name": "Simple Mug", "price": 5, "categoryId": "home", "stockQuantity": 2},
            "adjustment": {"productId": "3", "direction": "subtract", "quantity": 20}
        })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
