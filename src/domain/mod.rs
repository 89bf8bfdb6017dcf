use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants;

/// Retailers with a supported feed format.
///
/// The tag of each variant is also the value persisted on the store record,
/// so existing tags must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grocer {
    StoreA,
    StoreB,
    StoreC,
}

impl Grocer {
    pub const ALL: [Grocer; 3] = [Grocer::StoreA, Grocer::StoreB, Grocer::StoreC];

    pub fn tag(&self) -> &'static str {
        match self {
            Grocer::StoreA => constants::STORE_A,
            Grocer::StoreB => constants::STORE_B,
            Grocer::StoreC => constants::STORE_C,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.tag() == tag)
    }
}

impl fmt::Display for Grocer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Grocer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(&s.trim().to_lowercase()).ok_or_else(|| {
            format!(
                "unknown grocer '{}' (expected one of: {})",
                s,
                constants::supported_grocer_tags().join(", ")
            )
        })
    }
}

/// Canonical product shape every retailer feed is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub name: String,
    pub manufacturer: String,
    pub price: Decimal,
    /// Retailer-assigned id. Parsed for diagnostics only; item identity does not use it.
    pub external_sku: String,
}

impl NormalizedProduct {
    pub fn new(
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        price: Decimal,
        external_sku: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            manufacturer: manufacturer.into(),
            price,
            external_sku: external_sku.into(),
        }
    }
}

/// A retail location in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: i64,
    pub location_id: String,
    pub grocer: Grocer,
    pub created_at: DateTime<Utc>,
}

/// A priced item carried by one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    pub name: String,
    pub manufacturer: String,
    pub price: Decimal,
    pub store_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What an item upsert did to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Record-level rules shared by every store backend.
pub fn validate_item(name: &str, price: Decimal) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("item name must not be empty".to_string());
    }
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("item price must not be negative (got {})", price));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grocer_tags_round_trip() {
        for grocer in Grocer::ALL {
            assert_eq!(Grocer::from_tag(grocer.tag()), Some(grocer));
        }
        assert_eq!("STORE_B".parse::<Grocer>(), Ok(Grocer::StoreB));
        assert!("store_d".parse::<Grocer>().is_err());
    }

    #[test]
    fn test_grocer_serializes_as_tag() {
        let json = serde_json::to_string(&Grocer::StoreC).unwrap();
        assert_eq!(json, "\"store_c\"");
    }

    #[test]
    fn test_validate_item() {
        assert!(validate_item("Milk", dec!(3.50)).is_ok());
        assert!(validate_item("Free sample", dec!(0)).is_ok());
        assert!(validate_item("   ", dec!(1.00)).is_err());
        assert!(validate_item("Milk", dec!(-0.01)).is_err());
    }
}
