//! Inventory receiving
//!
//! An operator declares how much of each purchase-order line arrived and how
//! it passed quality control. Every problem with the submission is collected
//! before anything is sent, and only lines with a positive quantity make it
//! into the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::aggregates::{ItemStatus, PurchaseOrder, PurchaseOrderItem};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityCheck {
    #[default]
    Pending,
    Passed,
    Failed,
    Partial,
}

/// `Standard` seeds every line as passed. `Strict` seeds them as pending and
/// refuses submission until each receivable line has been checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceivingWorkflow {
    #[default]
    Standard,
    Strict,
}

impl FromStr for ReceivingWorkflow {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown receiving workflow `{}`", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivingEntry {
    pub item_id: String,
    pub received_quantity_now: u32,
    #[serde(default)]
    pub quality_check: QualityCheck,
    #[serde(default)]
    pub notes: String,
}

/// One entry per receivable line, defaulting to the full remaining quantity.
pub fn initialize_receiving(order: &PurchaseOrder, workflow: ReceivingWorkflow) -> Vec<ReceivingEntry> {
    let quality_check = match workflow {
        ReceivingWorkflow::Standard => QualityCheck::Passed,
        ReceivingWorkflow::Strict => QualityCheck::Pending,
    };
    order.items.iter()
        .filter(|item| item.is_receivable())
        .map(|item| ReceivingEntry {
            item_id: item.id.clone(),
            received_quantity_now: item.remaining(),
            quality_check,
            notes: String::new(),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceivingViolation {
    OverReceipt { item_id: String, item_name: String, remaining: u32, requested: u32 },
    QualityCheckRequired { item_id: String, item_name: String },
    CancelledItem { item_id: String, item_name: String },
    UnknownItem { item_id: String },
    DuplicateEntry { item_id: String },
    NothingToReceive,
}

impl fmt::Display for ReceivingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverReceipt { item_name, remaining, .. } => {
                write!(f, "{}: Received quantity cannot exceed the remaining quantity ({})", item_name, remaining)
            }
            Self::QualityCheckRequired { item_name, .. } => write!(f, "{}: Quality check is required", item_name),
            Self::CancelledItem { item_name, .. } => write!(f, "{}: Line item is cancelled and cannot be received", item_name),
            Self::UnknownItem { item_id } => write!(f, "{}: Line item is not on this purchase order", item_id),
            Self::DuplicateEntry { item_id } => write!(f, "{}: Line item was entered more than once", item_id),
            Self::NothingToReceive => write!(f, "Please specify received quantities for at least one item"),
        }
    }
}

/// Every violation found in a receiving submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.violations))]
pub struct ValidationError {
    violations: Vec<ReceivingViolation>,
}

impl ValidationError {
    pub fn violations(&self) -> &[ReceivingViolation] { &self.violations }
    pub fn messages(&self) -> Vec<String> { self.violations.iter().map(ToString::to_string).collect() }
}

fn join_messages(violations: &[ReceivingViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

pub fn validate_receiving(order: &PurchaseOrder, entries: &[ReceivingEntry], workflow: ReceivingWorkflow) -> Result<(), ValidationError> {
    let by_item = index_entries(entries);
    let mut violations = Vec::new();

    let mut seen = HashSet::new();
    let mut repeated = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.item_id.as_str()) {
            if repeated.insert(entry.item_id.as_str()) {
                violations.push(ReceivingViolation::DuplicateEntry { item_id: entry.item_id.clone() });
            }
            continue;
        }
        if order.item(&entry.item_id).is_none() {
            violations.push(ReceivingViolation::UnknownItem { item_id: entry.item_id.clone() });
        }
    }

    for item in &order.items {
        let entry = by_item.get(item.id.as_str()).copied();
        let now = entry.map_or(0, |e| e.received_quantity_now);
        if !item.is_receivable() {
            if now > 0 {
                violations.push(ReceivingViolation::CancelledItem { item_id: item.id.clone(), item_name: item.display_name() });
            }
            continue;
        }
        if now > item.remaining() {
            violations.push(ReceivingViolation::OverReceipt {
                item_id: item.id.clone(), item_name: item.display_name(), remaining: item.remaining(), requested: now,
            });
        }
        let checked = entry.map_or(false, |e| e.quality_check != QualityCheck::Pending);
        if workflow == ReceivingWorkflow::Strict && !checked {
            violations.push(ReceivingViolation::QualityCheckRequired { item_id: item.id.clone(), item_name: item.display_name() });
        }
    }

    // judged on the entries that would reach the payload
    if !by_item.values().any(|e| e.received_quantity_now > 0) {
        violations.push(ReceivingViolation::NothingToReceive);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        tracing::warn!(order = %order.id, count = violations.len(), "receiving submission rejected");
        Err(ValidationError { violations })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedItem {
    pub item_id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub received_quantity: u32,
    pub quality_check: QualityCheck,
    #[serde(default)]
    pub notes: String,
}

/// Body of `PUT purchase-orders/{id}/receive-inventory`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivingPayload {
    pub purchase_order_id: String,
    pub received_date: DateTime<Utc>,
    pub items: Vec<ReceivedItem>,
}

impl ReceivingPayload {
    /// Status each touched line would end up with once the backend applies this receipt.
    pub fn projected_statuses(&self, order: &PurchaseOrder) -> Vec<(String, ItemStatus)> {
        self.items.iter()
            .filter_map(|line| order.item(&line.item_id).map(|item| (item.id.clone(), item.status_after(line.received_quantity))))
            .collect()
    }
}

pub fn build_receiving_payload(order: &PurchaseOrder, entries: &[ReceivingEntry]) -> ReceivingPayload {
    build_receiving_payload_at(order, entries, Utc::now())
}

/// Lines follow the order's item order; entries with nothing received are dropped.
pub fn build_receiving_payload_at(order: &PurchaseOrder, entries: &[ReceivingEntry], received_date: DateTime<Utc>) -> ReceivingPayload {
    let by_item = index_entries(entries);
    let items = order.items.iter()
        .filter_map(|item| by_item.get(item.id.as_str()).map(|entry| (item, *entry)))
        .filter(|(_, entry)| entry.received_quantity_now > 0)
        .map(|(item, entry)| received_item(item, entry))
        .collect();
    ReceivingPayload { purchase_order_id: order.id.clone(), received_date, items }
}

/// Validates, then builds the payload.
pub fn prepare_receipt(order: &PurchaseOrder, entries: &[ReceivingEntry], workflow: ReceivingWorkflow) -> Result<ReceivingPayload, ValidationError> {
    validate_receiving(order, entries, workflow)?;
    let payload = build_receiving_payload(order, entries);
    tracing::info!(order = %order.id, lines = payload.items.len(), "receiving payload prepared");
    Ok(payload)
}

fn received_item(item: &PurchaseOrderItem, entry: &ReceivingEntry) -> ReceivedItem {
    ReceivedItem {
        item_id: item.id.clone(),
        product_id: item.product_id.clone(),
        variant_id: item.variant_id.clone(),
        received_quantity: entry.received_quantity_now,
        quality_check: entry.quality_check,
        notes: entry.notes.clone(),
    }
}

fn index_entries(entries: &[ReceivingEntry]) -> HashMap<&str, &ReceivingEntry> {
    entries.iter().map(|e| (e.item_id.as_str(), e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn order() -> PurchaseOrder {
        let mut po = PurchaseOrder::create("po1", "PO-1001", "Textile Masters Ltd.");
        let mut shirt = PurchaseOrderItem::new("i1", "p1", "T-Shirt", 10, Decimal::ONE);
        shirt.variant_id = Some("v1".into());
        shirt.variant_attributes = Some([("Size".to_string(), "M".to_string())].into_iter().collect());
        shirt.received_quantity = 4;
        po.add_item(shirt);
        po.add_item(PurchaseOrderItem::new("i2", "p2", "Mug", 5, Decimal::ONE));
        po
    }

    fn entry(item_id: &str, now: u32) -> ReceivingEntry {
        ReceivingEntry { item_id: item_id.into(), received_quantity_now: now, quality_check: QualityCheck::Passed, notes: String::new() }
    }

    #[test]
    fn test_initialize_defaults_to_remaining() {
        let mut po = order();
        po.items.push(PurchaseOrderItem { status: ItemStatus::Cancelled, ..PurchaseOrderItem::new("i3", "p3", "Cap", 2, Decimal::ONE) });
        let entries = initialize_receiving(&po, ReceivingWorkflow::Standard);
        assert_eq!(entries, vec![entry("i1", 6), entry("i2", 5)]);
        let strict = initialize_receiving(&po, ReceivingWorkflow::Strict);
        assert!(strict.iter().all(|e| e.quality_check == QualityCheck::Pending));
    }

    #[test]
    fn test_remaining_boundary() {
        let po = order();
        assert!(validate_receiving(&po, &[entry("i1", 6)], ReceivingWorkflow::Standard).is_ok());
        let err = validate_receiving(&po, &[entry("i1", 7)], ReceivingWorkflow::Standard).unwrap_err();
        assert_eq!(err.messages(), vec!["T-Shirt (Size: M): Received quantity cannot exceed the remaining quantity (6)"]);
    }

    #[test]
    fn test_violations_are_aggregated() {
        let po = order();
        let entries = vec![entry("i1", 9), entry("i2", 6), entry("ghost", 1)];
        let err = validate_receiving(&po, &entries, ReceivingWorkflow::Standard).unwrap_err();
        assert_eq!(err.violations().len(), 3);
        assert!(err.to_string().contains("Mug: Received quantity cannot exceed the remaining quantity (5)"));
    }

    #[test]
    fn test_strict_requires_quality_check() {
        let po = order();
        let mut entries = initialize_receiving(&po, ReceivingWorkflow::Strict);
        let err = validate_receiving(&po, &entries, ReceivingWorkflow::Strict).unwrap_err();
        assert_eq!(err.messages(), vec!["T-Shirt (Size: M): Quality check is required", "Mug: Quality check is required"]);
        entries[0].quality_check = QualityCheck::Failed;
        entries[1].quality_check = QualityCheck::Partial;
        assert!(validate_receiving(&po, &entries, ReceivingWorkflow::Strict).is_ok());
    }

    #[test]
    fn test_repeated_item_is_rejected() {
        let po = order();
        let err = prepare_receipt(&po, &[entry("i1", 5), entry("i1", 0)], ReceivingWorkflow::Standard).unwrap_err();
        assert_eq!(err.violations(), &[
            ReceivingViolation::DuplicateEntry { item_id: "i1".into() },
            ReceivingViolation::NothingToReceive,
        ]);
        let err = validate_receiving(&po, &[entry("i1", 1), entry("i1", 2), entry("i1", 3)], ReceivingWorkflow::Standard).unwrap_err();
        assert_eq!(err.messages(), vec!["i1: Line item was entered more than once"]);
    }

    #[test]
    fn test_nothing_to_receive() {
        let po = order();
        let err = validate_receiving(&po, &[entry("i1", 0)], ReceivingWorkflow::Standard).unwrap_err();
        assert_eq!(err.violations(), &[ReceivingViolation::NothingToReceive]);
    }

    #[test]
    fn test_payload_filters_zero_lines() {
        let po = order();
        let date = Utc::now();
        let payload = build_receiving_payload_at(&po, &[entry("i2", 0), entry("i1", 3)], date);
        assert_eq!(payload.purchase_order_id, "po1");
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].variant_id.as_deref(), Some("v1"));
        assert_eq!(payload.items[0].received_quantity, 3);
        assert_eq!(payload.projected_statuses(&po), vec![("i1".to_string(), ItemStatus::Partial)]);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["items"][0]["qualityCheck"], "passed");
        assert_eq!(json["items"][0]["receivedQuantity"], 3);
        assert!(json["receivedDate"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_workflow_from_str() {
        assert_eq!("STRICT".parse::<ReceivingWorkflow>(), Ok(ReceivingWorkflow::Strict));
        assert!("lenient".parse::<ReceivingWorkflow>().is_err());
    }
}
