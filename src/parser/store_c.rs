use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

use super::{decode, price_number, string_or_null, FeedParser, ParsedFeed};
use crate::domain::{Grocer, NormalizedProduct};
use crate::error::ParseError;

#[derive(Debug, Deserialize)]
struct StoreCFeed {
    store_code: String,
    #[serde(default)]
    catalogue: Vec<StoreCEntry>,
}

#[derive(Debug, Deserialize)]
struct StoreCEntry {
    #[serde(default, deserialize_with = "string_or_null")]
    display_name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    producer: String,
    #[serde(deserialize_with = "price_number")]
    cost: Decimal,
    #[serde(default, deserialize_with = "string_or_null")]
    product_id: String,
}

/// `store_code` plus a `catalogue` array
pub struct StoreCParser;

impl FeedParser for StoreCParser {
    fn grocer(&self) -> Grocer {
        Grocer::StoreC
    }

    fn parse(&self, reader: &mut dyn Read) -> Result<ParsedFeed, ParseError> {
        let feed: StoreCFeed = decode(self.grocer(), reader)?;

        let products = feed
            .catalogue
            .into_iter()
            .map(|entry| NormalizedProduct {
                name: entry.display_name,
                manufacturer: entry.producer,
                price: entry.cost,
                external_sku: entry.product_id,
            })
            .collect();

        Ok(ParsedFeed {
            location_id: feed.store_code,
            products,
        })
    }
}
