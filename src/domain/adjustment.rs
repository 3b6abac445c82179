//! Manual stock adjustments against a product or one of its variants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::Product;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    #[default]
    Add,
    Subtract,
}

/// Reason code the backend records for an adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentType {
    Received,
    Damaged,
}

impl From<AdjustmentDirection> for AdjustmentType {
    fn from(direction: AdjustmentDirection) -> Self {
        match direction {
            AdjustmentDirection::Add => Self::Received,
            AdjustmentDirection::Subtract => Self::Damaged,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub direction: AdjustmentDirection,
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentPayload {
    pub adjustment_type: AdjustmentType,
    pub adjustment_quantity: u32,
    pub variant_id: Option<String>,
    pub notes: String,
}

impl StockAdjustment {
    pub fn validate(&self, product: &Product) -> Result<(), AdjustmentError> {
        if self.quantity == 0 {
            return Err(AdjustmentError::InvalidQuantity);
        }
        if let Some(id) = product.id() {
            if id != self.product_id {
                return Err(AdjustmentError::ProductMismatch { expected: id.to_string(), found: self.product_id.clone() });
            }
        }
        match self.variant_id.as_deref() {
            None if product.has_variants() => Err(AdjustmentError::VariantRequired),
            Some(variant_id) if product.variant(variant_id).is_none() => {
                Err(AdjustmentError::UnknownVariant(variant_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn to_payload(&self) -> StockAdjustmentPayload {
        let notes = if self.notes.trim().is_empty() {
            match self.direction {
                AdjustmentDirection::Add => "Manual addition".to_string(),
                AdjustmentDirection::Subtract => "Manual reduction".to_string(),
            }
        } else {
            self.notes.clone()
        };
        StockAdjustmentPayload {
            adjustment_type: self.direction.into(),
            adjustment_quantity: self.quantity,
            variant_id: self.variant_id.clone(),
            notes,
        }
    }

    /// Backend path the payload is `PUT` to.
    pub fn endpoint(&self) -> String {
        match &self.variant_id {
            Some(variant_id) => format!("products/{}/variants/{}/stock", self.product_id, variant_id),
            None => format!("products/{}/stock", self.product_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustmentError {
    #[error("Please enter a valid quantity")]
    InvalidQuantity,
    #[error("Please select a variant for this product")]
    VariantRequired,
    #[error("Variant {0} not found")]
    UnknownVariant(String),
    #[error("Adjustment targets product {found}, expected {expected}")]
    ProductMismatch { expected: String, found: String },
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },
}
