use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

use super::{decode, price_number, string_or_null, FeedParser, ParsedFeed};
use crate::domain::{Grocer, NormalizedProduct};
use crate::error::ParseError;

/// Nested `location` / `inventory` layout where each entry splits the
/// product description and its pricing into sub-objects.
#[derive(Debug, Deserialize)]
struct StoreBFeed {
    location: StoreBLocation,
    #[serde(default)]
    inventory: Vec<StoreBEntry>,
}

#[derive(Debug, Deserialize)]
struct StoreBLocation {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StoreBEntry {
    #[serde(default)]
    item: StoreBItem,
    pricing: StoreBPricing,
    #[serde(default, deserialize_with = "string_or_null")]
    barcode: String,
}

#[derive(Debug, Default, Deserialize)]
struct StoreBItem {
    #[serde(default, deserialize_with = "string_or_null")]
    label: String,
    #[serde(default, deserialize_with = "string_or_null")]
    brand_name: String,
}

#[derive(Debug, Deserialize)]
struct StoreBPricing {
    #[serde(deserialize_with = "price_number")]
    current_price: Decimal,
}

pub struct StoreBParser;

impl FeedParser for StoreBParser {
    fn grocer(&self) -> Grocer {
        Grocer::StoreB
    }

    fn parse(&self, reader: &mut dyn Read) -> Result<ParsedFeed, ParseError> {
        let feed: StoreBFeed = decode(self.grocer(), reader)?;

        let products = feed
            .inventory
            .into_iter()
            .map(|entry| NormalizedProduct {
                name: entry.item.label,
                manufacturer: entry.item.brand_name,
                price: entry.pricing.current_price,
                external_sku: entry.barcode,
            })
            .collect();

        Ok(ParsedFeed {
            location_id: feed.location.id,
            products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_store_b_flattens_inventory() {
        let feed = json!({
            "location": {"id": "B-204"},
            "inventory": [
                {
                    "item": {"label": "Oat Milk", "brand_name": "Oatly"},
                    "pricing": {"current_price": 4.99},
                    "barcode": "0123456789"
                }
            ]
        })
        .to_string();

        let parsed = StoreBParser.parse(&mut feed.as_bytes()).unwrap();

        assert_eq!(parsed.location_id, "B-204");
        assert_eq!(
            parsed.products,
            vec![NormalizedProduct::new("Oat Milk", "Oatly", dec!(4.99), "0123456789")]
        );
    }

    #[test]
    fn test_store_b_missing_brand_is_empty_manufacturer() {
        let feed = json!({
            "location": {"id": "B-1"},
            "inventory": [
                {"item": {"label": "Bananas", "brand_name": null}, "pricing": {"current_price": 0.59}}
            ]
        })
        .to_string();

        let parsed = StoreBParser.parse(&mut feed.as_bytes()).unwrap();
        assert_eq!(parsed.products[0].manufacturer, "");
        assert_eq!(parsed.products[0].external_sku, "");
    }

    #[test]
    fn test_store_b_requires_location() {
        let feed = json!({"inventory": []}).to_string();
        let err = StoreBParser.parse(&mut feed.as_bytes()).unwrap_err();
        assert_eq!(err.grocer, Grocer::StoreB);
    }

    #[test]
    fn test_store_b_truncated_document_fails() {
        let feed = r#"{"location": {"id": "B-1"}, "inventory": [{"item": {"label": "Eggs""#;
        assert!(StoreBParser.parse(&mut feed.as_bytes()).is_err());
    }

    #[test]
    fn test_store_b_rejects_quoted_price() {
        let feed = json!({
            "location": {"id": "B-1"},
            "inventory": [{"item": {"label": "Eggs"}, "pricing": {"current_price": "4.10"}}]
        })
        .to_string();
        assert!(StoreBParser.parse(&mut feed.as_bytes()).is_err());
    }
}
