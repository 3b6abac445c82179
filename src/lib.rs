//! OpenSASE Back-office
//!
//! Catalog and purchasing logic behind the e-commerce admin dashboard.
//!
//! ## Features
//! - Product variants generated from attribute combinations, with SKUs
//! - Purchase-order receiving with aggregated validation
//! - Manual stock adjustments per product or variant
//! - Client for the REST backend that owns persistence
//! - HTTP gateway exposing the above

pub mod client;
pub mod config;
pub mod domain;
pub mod http;

use thiserror::Error;

pub use client::{BackendClient, BackendError, SessionContext};
pub use config::{Config, ConfigError};
pub use domain::adjustment::{AdjustmentError, StockAdjustment};
pub use domain::aggregates::{Product, ProductError, PurchaseOrder, PurchaseOrderItem, ReceiptError, VariantRemoval};
pub use domain::receiving::{ReceivingEntry, ReceivingPayload, ReceivingWorkflow, ValidationError};
pub use domain::variants::{ProductAttribute, ProductVariant, RandomSkuGenerator, SkuGenerator};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BackofficeError {
    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("Validation errors: {0}")]
    Receiving(#[from] ValidationError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error(transparent)]
    Adjustment(#[from] AdjustmentError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, BackofficeError>;
