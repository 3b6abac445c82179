//! Value Objects for the back-office catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// SKU (Stock Keeping Unit) value object. `new` normalises operator input;
/// SKUs read back from storage keep their stored text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub const MAX_LEN: usize = 50;

    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.chars().count() > Self::MAX_LEN { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }

    /// Builds a SKU from generated segments as given, skipping blank ones and
    /// clipping to `MAX_LEN`. Callers supply at least one non-blank segment.
    pub(crate) fn assemble<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        Self(joined.chars().take(Self::MAX_LEN).collect())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "SKU empty"), Self::TooLong => write!(f, "SKU too long") }
    }
}

/// Name of a variation axis such as "Size". Compares case-insensitively,
/// displays as entered.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AttributeName(String);

impl AttributeName {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into().trim().to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn matches(&self, other: &str) -> bool { self.0.eq_ignore_ascii_case(other.trim()) }
}

impl PartialEq for AttributeName {
    fn eq(&self, other: &Self) -> bool { self.0.eq_ignore_ascii_case(&other.0) }
}
impl Eq for AttributeName {}

impl Hash for AttributeName {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.to_ascii_lowercase().hash(state) }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<String> for AttributeName {
    fn from(value: String) -> Self { Self::new(value) }
}

impl From<&str> for AttributeName {
    fn from(value: &str) -> Self { Self::new(value) }
}

impl From<AttributeName> for String {
    fn from(name: AttributeName) -> Self { name.0 }
}

/// Stock quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

impl From<u32> for Quantity {
    fn from(value: u32) -> Self { Self(value) }
}
