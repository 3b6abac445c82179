//! Purchase Order Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::events::{DomainEvent, PurchaseOrderEvent};
use crate::domain::receiving::ReceivingPayload;
use crate::domain::variants::AttributeValues;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus { #[default] Pending, Partial, Received, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus { Draft, #[default] Pending, Ordered, Shipped, Received, Cancelled }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_attributes: Option<AttributeValues>,
    pub quantity: u32,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub total_cost: Decimal,
    #[serde(default)]
    pub received_quantity: u32,
    #[serde(default)]
    pub status: ItemStatus,
}

impl PurchaseOrderItem {
    pub fn new(id: impl Into<String>, product_id: impl Into<String>, product_name: impl Into<String>, quantity: u32, unit_cost: Decimal) -> Self {
        Self {
            id: id.into(), product_id: product_id.into(), product_name: product_name.into(),
            variant_id: None, variant_sku: None, variant_attributes: None,
            quantity, unit_cost, total_cost: unit_cost * Decimal::from(quantity),
            received_quantity: 0, status: ItemStatus::Pending,
        }
    }

    /// Ordered minus already received.
    pub fn remaining(&self) -> u32 { self.quantity.saturating_sub(self.received_quantity) }

    pub fn is_receivable(&self) -> bool { self.status != ItemStatus::Cancelled }

    /// `Name (Size: M, Color: Red)` for variant lines, the bare product name otherwise.
    pub fn display_name(&self) -> String {
        match &self.variant_attributes {
            Some(values) if !values.is_empty() => {
                let attrs: Vec<String> = values.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                format!("{} ({})", self.product_name, attrs.join(", "))
            }
            _ => self.product_name.clone(),
        }
    }

    /// Status the line would have after receiving `now` more units.
    pub fn status_after(&self, now: u32) -> ItemStatus {
        if self.status == ItemStatus::Cancelled { return ItemStatus::Cancelled; }
        let total = self.received_quantity.saturating_add(now);
        if total == self.quantity { ItemStatus::Received }
        else if total > 0 && total < self.quantity { ItemStatus::Partial }
        else { ItemStatus::Pending }
    }

    pub fn receive(&mut self, now: u32) -> Result<ItemStatus, ReceiptError> {
        if !self.is_receivable() { return Err(ReceiptError::CancelledItem(self.id.clone())); }
        if now > self.remaining() {
            return Err(ReceiptError::OverReceipt { item_id: self.id.clone(), remaining: self.remaining(), requested: now });
        }
        self.status = self.status_after(now);
        self.received_quantity += now;
        Ok(self.status)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub status: PurchaseOrderStatus,
    pub items: Vec<PurchaseOrderItem>,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl PurchaseOrder {
    pub fn create(id: impl Into<String>, order_number: impl Into<String>, supplier_name: impl Into<String>) -> Self {
        Self {
            id: id.into(), order_number: order_number.into(), supplier_name: supplier_name.into(),
            status: PurchaseOrderStatus::Pending, items: vec![], total_amount: Decimal::ZERO, events: vec![],
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&PurchaseOrderItem> { self.items.iter().find(|i| i.id == item_id) }

    pub fn add_item(&mut self, item: PurchaseOrderItem) { self.items.push(item); self.recalculate_total(); }

    pub fn recalculate_total(&mut self) {
        for item in &mut self.items {
            item.total_cost = item.unit_cost * Decimal::from(item.quantity);
        }
        self.total_amount = self.items.iter().map(|i| i.total_cost).sum();
    }

    pub fn is_fully_received(&self) -> bool {
        self.items.iter().filter(|i| i.is_receivable()).all(|i| i.status == ItemStatus::Received)
    }

    /// Applies every line of a receipt or none of them.
    pub fn apply_receipt(&mut self, receipt: &ReceivingPayload) -> Result<(), ReceiptError> {
        if receipt.purchase_order_id != self.id {
            return Err(ReceiptError::OrderMismatch { expected: self.id.clone(), found: receipt.purchase_order_id.clone() });
        }

        let mut requested: HashMap<&str, u32> = HashMap::new();
        for line in &receipt.items {
            let total = requested.entry(line.item_id.as_str()).or_default();
            *total = total.checked_add(line.received_quantity).ok_or_else(|| ReceiptError::OverReceipt {
                item_id: line.item_id.clone(),
                remaining: self.item(&line.item_id).map_or(0, PurchaseOrderItem::remaining),
                requested: u32::MAX,
            })?;
        }
        for (item_id, quantity) in &requested {
            let item = self.item(item_id).ok_or_else(|| ReceiptError::UnknownItem(item_id.to_string()))?;
            if !item.is_receivable() { return Err(ReceiptError::CancelledItem(item.id.clone())); }
            if *quantity > item.remaining() {
                return Err(ReceiptError::OverReceipt { item_id: item.id.clone(), remaining: item.remaining(), requested: *quantity });
            }
        }

        let mut received = Vec::new();
        for item in &mut self.items {
            if let Some(quantity) = requested.get(item.id.as_str()) {
                let status = item.receive(*quantity)?;
                received.push((item.id.clone(), *quantity, status));
            }
        }
        for (item_id, quantity, status) in received {
            tracing::info!(order = %self.id, item = %item_id, quantity, ?status, "line item received");
            self.raise_event(DomainEvent::PurchaseOrder(PurchaseOrderEvent::ItemReceived { order_id: self.id.clone(), item_id, quantity, status }));
        }
        if self.is_fully_received() && self.status != PurchaseOrderStatus::Received {
            self.status = PurchaseOrderStatus::Received;
            self.raise_event(DomainEvent::PurchaseOrder(PurchaseOrderEvent::Received { order_id: self.id.clone() }));
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptError {
    #[error("Receipt is for purchase order {found}, expected {expected}")]
    OrderMismatch { expected: String, found: String },
    #[error("Line item {0} is not on this purchase order")]
    UnknownItem(String),
    #[error("Line item {0} is cancelled")]
    CancelledItem(String),
    #[error("Line item {item_id}: received quantity {requested} exceeds remaining {remaining}")]
    OverReceipt { item_id: String, remaining: u32, requested: u32 },
}
