//! Domain events
use crate::domain::aggregates::ItemStatus;
use crate::domain::adjustment::AdjustmentDirection;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Product(ProductEvent),
    PurchaseOrder(PurchaseOrderEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProductEvent {
    AttributeAdded { product_id: Option<String>, attribute: String },
    AttributeRemoved { product_id: Option<String>, attribute: String },
    VariantsRegenerated { product_id: Option<String>, total: usize },
    VariantRemoved { product_id: Option<String>, variant_id: String, skus_reissued: bool },
    StockAdjusted { product_id: Option<String>, variant_id: Option<String>, direction: AdjustmentDirection, quantity: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum PurchaseOrderEvent {
    ItemReceived { order_id: String, item_id: String, quantity: u32, status: ItemStatus },
    Received { order_id: String },
}
