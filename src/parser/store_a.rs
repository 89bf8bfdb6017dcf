use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

use super::{decode, price_number, string_or_null, FeedParser, ParsedFeed};
use crate::domain::{Grocer, NormalizedProduct};
use crate::error::ParseError;

/// Flat product array keyed by `store_location_id`.
#[derive(Debug, Deserialize)]
struct StoreAFeed {
    store_location_id: String,
    #[serde(default)]
    products: Vec<StoreAProduct>,
}

#[derive(Debug, Deserialize)]
struct StoreAProduct {
    #[serde(default, deserialize_with = "string_or_null")]
    product_name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    manufacturer: String,
    #[serde(deserialize_with = "price_number")]
    retail_price: Decimal,
    #[serde(default, deserialize_with = "string_or_null")]
    sku: String,
}

pub struct StoreAParser;

impl FeedParser for StoreAParser {
    fn grocer(&self) -> Grocer {
        Grocer::StoreA
    }

    fn parse(&self, reader: &mut dyn Read) -> Result<ParsedFeed, ParseError> {
        let feed: StoreAFeed = decode(self.grocer(), reader)?;

        let products = feed
            .products
            .into_iter()
            .map(|p| NormalizedProduct {
                name: p.product_name,
                manufacturer: p.manufacturer,
                price: p.retail_price,
                external_sku: p.sku,
            })
            .collect();

        Ok(ParsedFeed {
            location_id: feed.store_location_id,
            products,
        })
    }
}
