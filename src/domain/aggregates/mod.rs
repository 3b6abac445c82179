//! Aggregates module
pub mod product;
pub mod purchase_order;

pub use product::{Product, ProductError, ProductSavePayload, VariantRemoval, VariantSavePayload};
pub use purchase_order::{ItemStatus, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, ReceiptError};
