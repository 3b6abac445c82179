//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::domain::adjustment::{AdjustmentDirection, AdjustmentError, StockAdjustment};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{AttributeName, Quantity};
use crate::domain::variants::{
    regenerate_variants, reissue_skus, AttributeValues, ProductAttribute, ProductVariant, SkuGenerator, VariantTemplate,
};

/// A catalog product. With attributes, its variants are exactly the Cartesian
/// product of the attribute values; without, stock is tracked on the product.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    category_id: String,
    #[serde(default)]
    stock_quantity: Quantity,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default, deserialize_with = "unique_attributes")]
    attributes: Vec<ProductAttribute>,
    #[serde(default)]
    variants: Vec<ProductVariant>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// What happens to the surviving variants' SKUs when one variant is removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VariantRemoval {
    /// Every surviving variant is issued a new SKU, as the admin form always did.
    #[default]
    ReissueSkus,
    KeepSkus,
}

impl Product {
    pub fn create(name: impl Into<String>, category_id: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: None, name: name.into(), description: String::new(), price, category_id: category_id.into(),
            stock_quantity: Quantity::default(), images: vec![], attributes: vec![], variants: vec![], events: vec![],
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self { self.id = Some(id.into()); self }
    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }

    pub fn id(&self) -> Option<&str> { self.id.as_deref() }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> Decimal { self.price }
    pub fn category_id(&self) -> &str { &self.category_id }
    pub fn stock_quantity(&self) -> Quantity { self.stock_quantity }
    pub fn attributes(&self) -> &[ProductAttribute] { &self.attributes }
    pub fn variants(&self) -> &[ProductVariant] { &self.variants }
    pub fn has_variants(&self) -> bool { !self.attributes.is_empty() }
    pub fn variant(&self, variant_id: &str) -> Option<&ProductVariant> { self.variants.iter().find(|v| v.id == variant_id) }

    /// Adds an attribute from a comma-separated value list and regenerates
    /// the variants.
    pub fn add_attribute(&mut self, name: &str, raw_values: &str, skus: &dyn SkuGenerator) -> Result<(), ProductError> {
        self.add_parsed_attribute(ProductAttribute::parse(name, raw_values), skus)
    }

    pub fn add_parsed_attribute(&mut self, attribute: ProductAttribute, skus: &dyn SkuGenerator) -> Result<(), ProductError> {
        if self.attributes.iter().any(|a| a.name() == attribute.name()) {
            tracing::warn!(attribute = %attribute.name(), "duplicate attribute rejected");
            return Err(ProductError::DuplicateAttribute(attribute.name().to_string()));
        }
        if attribute.values().is_empty() {
            tracing::warn!(attribute = %attribute.name(), "attribute without values rejected");
            return Err(ProductError::EmptyAttribute(attribute.name().to_string()));
        }
        let name = attribute.name().to_string();
        self.attributes.push(attribute);
        self.raise_event(DomainEvent::Product(ProductEvent::AttributeAdded { product_id: self.id.clone(), attribute: name }));
        self.regenerate(skus);
        Ok(())
    }

    /// Removes the named attribute. Returns false when no attribute has that name.
    pub fn remove_attribute(&mut self, name: &str, skus: &dyn SkuGenerator) -> bool {
        let name = AttributeName::new(name);
        let Some(position) = self.attributes.iter().position(|a| *a.name() == name) else {
            return false;
        };
        let removed = self.attributes.remove(position);
        self.raise_event(DomainEvent::Product(ProductEvent::AttributeRemoved {
            product_id: self.id.clone(), attribute: removed.name().to_string(),
        }));
        self.regenerate(skus);
        true
    }

    pub fn remove_variant(&mut self, variant_id: &str, removal: VariantRemoval, skus: &dyn SkuGenerator) -> Result<ProductVariant, ProductError> {
        let position = self.variants.iter().position(|v| v.id == variant_id)
            .ok_or_else(|| ProductError::VariantNotFound(variant_id.to_string()))?;
        let removed = self.variants.remove(position);
        let skus_reissued = removal == VariantRemoval::ReissueSkus;
        if skus_reissued {
            let template = VariantTemplate { product_name: &self.name, category_id: &self.category_id, base_price: self.price };
            reissue_skus(&mut self.variants, template, skus);
        }
        self.raise_event(DomainEvent::Product(ProductEvent::VariantRemoved {
            product_id: self.id.clone(), variant_id: removed.id.clone(), skus_reissued,
        }));
        Ok(removed)
    }

    /// `Name (Size: M, Color: Red)`, attributes in product order.
    pub fn variant_display_name(&self, variant: &ProductVariant) -> String {
        display_name(&self.name, &self.attributes, &variant.attribute_values)
    }

    /// Applies a validated manual adjustment and returns the new stock level
    /// of whatever it targeted.
    pub fn apply_adjustment(&mut self, adjustment: &StockAdjustment) -> Result<Quantity, AdjustmentError> {
        adjustment.validate(self)?;
        let stock = match adjustment.variant_id.as_deref() {
            Some(variant_id) => &mut self.variants.iter_mut().find(|v| v.id == variant_id)
                .ok_or_else(|| AdjustmentError::UnknownVariant(variant_id.to_string()))?
                .stock_quantity,
            None => &mut self.stock_quantity,
        };
        *stock = match adjustment.direction {
            AdjustmentDirection::Add => stock.add(adjustment.quantity),
            AdjustmentDirection::Subtract => stock.subtract(adjustment.quantity)
                .ok_or(AdjustmentError::InsufficientStock { available: stock.value(), requested: adjustment.quantity })?,
        };
        let level = *stock;
        tracing::info!(product = %self.name, variant = ?adjustment.variant_id, stock = level.value(), "stock adjusted");
        self.raise_event(DomainEvent::Product(ProductEvent::StockAdjusted {
            product_id: self.id.clone(), variant_id: adjustment.variant_id.clone(),
            direction: adjustment.direction, quantity: adjustment.quantity,
        }));
        Ok(level)
    }

    /// Body for `POST products` / `PUT products/{id}`.
    pub fn to_save_payload(&self) -> ProductSavePayload {
        ProductSavePayload {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            category_id: self.category_id.clone(),
            stock_quantity: self.stock_quantity,
            images: self.images.clone(),
            attributes: self.attributes.clone(),
            variants: self.variants.iter().map(|v| VariantSavePayload {
                size: v.attribute("Size").unwrap_or_default().to_string(),
                color: v.attribute("Color").unwrap_or_default().to_string(),
                attribute_values: v.attribute_values.clone(),
                sku: v.sku.to_string(),
                price: v.price,
                stock_quantity: v.stock_quantity,
                images: v.images.clone(),
            }).collect(),
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }

    fn regenerate(&mut self, skus: &dyn SkuGenerator) {
        let template = VariantTemplate { product_name: &self.name, category_id: &self.category_id, base_price: self.price };
        self.variants = regenerate_variants(&self.attributes, &self.variants, template, skus);
        let total = self.variants.len();
        self.raise_event(DomainEvent::Product(ProductEvent::VariantsRegenerated { product_id: self.id.clone(), total }));
    }
}

/// Keeps the first attribute of each case-insensitive name.
fn unique_attributes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ProductAttribute>, D::Error> {
    let mut attributes: Vec<ProductAttribute> = Vec::new();
    for attribute in Vec::<ProductAttribute>::deserialize(deserializer)? {
        if attributes.iter().any(|a| a.name() == attribute.name()) {
            tracing::warn!(attribute = %attribute.name(), "dropping repeated attribute");
        } else {
            attributes.push(attribute);
        }
    }
    Ok(attributes)
}

pub(crate) fn display_name(product_name: &str, attributes: &[ProductAttribute], values: &AttributeValues) -> String {
    let mut parts: Vec<String> = attributes.iter()
        .filter_map(|a| values.get(a.name().as_str()).map(|v| format!("{}: {}", a.name(), v)))
        .collect();
    // keys no longer backed by an attribute still identify the variant
    for (key, value) in values {
        if !attributes.iter().any(|a| a.name().as_str() == key.as_str()) {
            parts.push(format!("{}: {}", key, value));
        }
    }
    if parts.is_empty() { product_name.to_string() } else { format!("{} ({})", product_name, parts.join(", ")) }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSavePayload {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: String,
    pub stock_quantity: Quantity,
    pub images: Vec<String>,
    pub attributes: Vec<ProductAttribute>,
    pub variants: Vec<VariantSavePayload>,
}

/// Variant as the backend stores it: flattened `size`/`color` plus the full mapping.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSavePayload {
    pub size: String,
    pub color: String,
    pub attribute_values: AttributeValues,
    pub sku: String,
    pub price: Decimal,
    pub stock_quantity: Quantity,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Attribute \"{0}\" already exists")]
    DuplicateAttribute(String),
    #[error("Attribute \"{0}\" needs at least one value")]
    EmptyAttribute(String),
    #[error("Variant {0} not found")]
    VariantNotFound(String),
}
