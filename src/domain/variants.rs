//! Variant generation
//!
//! A product's variant list is the Cartesian product of its attribute value
//! lists. Regeneration keeps any existing variant whose full attribute-value
//! mapping still occurs, and synthesizes the rest with a fresh id and SKU.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::domain::value_objects::{AttributeName, Quantity, Sku};

/// Attribute name → chosen value for one variant.
pub type AttributeValues = BTreeMap<String, String>;

/// A named axis of variation with its ordered values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AttributeRecord")]
pub struct ProductAttribute {
    name: AttributeName,
    values: Vec<String>,
}

#[derive(Deserialize)]
struct AttributeRecord {
    name: String,
    #[serde(default)]
    values: Vec<String>,
}

impl From<AttributeRecord> for ProductAttribute {
    fn from(record: AttributeRecord) -> Self { Self::new(record.name, record.values) }
}

impl ProductAttribute {
    /// Trims every value and drops blanks and repeats, keeping first-seen order.
    pub fn new<I, S>(name: impl Into<AttributeName>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for value in values {
            let value = value.as_ref().trim();
            if !value.is_empty() && !normalized.iter().any(|v| v == value) {
                normalized.push(value.to_string());
            }
        }
        Self { name: name.into(), values: normalized }
    }

    /// Parses a comma-separated value list such as `"S, M, L"`.
    pub fn parse(name: impl Into<AttributeName>, raw_values: &str) -> Self {
        Self::new(name, parse_attribute_values(raw_values))
    }

    pub fn name(&self) -> &AttributeName { &self.name }
    pub fn values(&self) -> &[String] { &self.values }
}

pub fn parse_attribute_values(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|v| !v.is_empty()).map(str::to_string).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    #[serde(rename = "_id")]
    pub id: String,
    pub attribute_values: AttributeValues,
    pub sku: Sku,
    pub price: Decimal,
    #[serde(default)]
    pub stock_quantity: Quantity,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductVariant {
    /// Case-insensitive lookup of one attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup_attribute(&self.attribute_values, name)
    }
}

fn lookup_attribute<'a>(values: &'a AttributeValues, name: &str) -> Option<&'a str> {
    values.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
}

/// What a freshly synthesized variant inherits from its product.
#[derive(Clone, Copy, Debug)]
pub struct VariantTemplate<'a> {
    pub product_name: &'a str,
    pub category_id: &'a str,
    pub base_price: Decimal,
}

/// Issues SKUs for new variants. Production SKUs carry random and
/// time-based parts, so a SKU is stored once and never re-derived.
pub trait SkuGenerator {
    fn generate(&self, product_name: &str, attribute_values: &AttributeValues, category_id: &str) -> Sku;
}

/// Category, name, size and color parts of a SKU, in that order; absent or
/// empty parts come back as empty strings.
pub fn sku_stem(product_name: &str, attribute_values: &AttributeValues, category_id: &str) -> Vec<String> {
    let category: String = category_id.chars().take(2).collect::<String>().to_uppercase();
    let name: String = product_name.chars().filter(|c| c.is_alphanumeric()).take(3).collect();
    let size: String = lookup_attribute(attribute_values, "Size").map(|v| v.chars().take(2).collect()).unwrap_or_default();
    let color: String = lookup_attribute(attribute_values, "Color").map(|v| v.chars().take(3).collect()).unwrap_or_default();
    vec![category, name, size, color]
}

/// `CA-NAM-SZ-COL-NNNN-TT`: stem, a zero-padded random number and the last two
/// digits of the current epoch milliseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSkuGenerator;

impl SkuGenerator for RandomSkuGenerator {
    fn generate(&self, product_name: &str, attribute_values: &AttributeValues, category_id: &str) -> Sku {
        let mut segments = sku_stem(product_name, attribute_values, category_id);
        segments.push(format!("{:04}", rand::thread_rng().gen_range(0..10_000)));
        segments.push(format!("{:02}", Utc::now().timestamp_millis().rem_euclid(100)));
        Sku::assemble(segments)
    }
}

/// Every attribute-value combination in row-major order: the first attribute
/// varies slowest. No attributes means no combinations.
pub fn combinations(attributes: &[ProductAttribute]) -> Vec<AttributeValues> {
    if attributes.is_empty() {
        return Vec::new();
    }
    attributes.iter().fold(vec![AttributeValues::new()], |partials, attribute| {
        partials
            .iter()
            .flat_map(|partial| {
                attribute.values().iter().map(move |value| {
                    let mut next = partial.clone();
                    next.insert(attribute.name().as_str().to_string(), value.clone());
                    next
                })
            })
            .collect()
    })
}

/// Rebuilds the variant list for `attributes`. A variant from `existing` is
/// kept untouched when its whole mapping equals a combination; adding or
/// dropping an attribute therefore invalidates every prior match.
pub fn regenerate_variants(
    attributes: &[ProductAttribute],
    existing: &[ProductVariant],
    template: VariantTemplate<'_>,
    skus: &dyn SkuGenerator,
) -> Vec<ProductVariant> {
    // first occurrence wins when the existing list carries duplicates
    let mut by_combination: HashMap<&AttributeValues, &ProductVariant> = HashMap::new();
    for variant in existing {
        by_combination.entry(&variant.attribute_values).or_insert(variant);
    }

    let mut reused = 0usize;
    let variants: Vec<ProductVariant> = combinations(attributes)
        .into_iter()
        .map(|combination| match by_combination.get(&combination) {
            Some(kept) => {
                reused += 1;
                (*kept).clone()
            }
            None => synthesize(combination, template, skus),
        })
        .collect();

    tracing::debug!(total = variants.len(), reused, product = template.product_name, "regenerated variants");
    variants
}

/// Issues a new SKU to every variant, keeping everything else.
pub fn reissue_skus(variants: &mut [ProductVariant], template: VariantTemplate<'_>, skus: &dyn SkuGenerator) {
    for variant in variants.iter_mut() {
        variant.sku = skus.generate(template.product_name, &variant.attribute_values, template.category_id);
    }
}

fn synthesize(attribute_values: AttributeValues, template: VariantTemplate<'_>, skus: &dyn SkuGenerator) -> ProductVariant {
    let sku = skus.generate(template.product_name, &attribute_values, template.category_id);
    ProductVariant {
        id: Uuid::new_v4().to_string(),
        attribute_values,
        sku,
        price: template.base_price,
        stock_quantity: Quantity::default(),
        images: Vec::new(),
    }
}
