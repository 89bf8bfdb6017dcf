//! Retailer feed parsers.
//!
//! Each retailer exports its catalog as a single JSON document with its own
//! field names and nesting. A parser only translates that structure into
//! [`NormalizedProduct`]s; validation and persistence happen downstream.

use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use std::io::{BufReader, Read};
use std::str::FromStr;
use tracing::debug;

use crate::domain::{Grocer, NormalizedProduct};
use crate::error::ParseError;

pub mod selector;
pub mod store_a;
pub mod store_b;
pub mod store_c;

pub use selector::ParserSelector;
pub use store_a::StoreAParser;
pub use store_b::StoreBParser;
pub use store_c::StoreCParser;

/// One decoded feed: the retailer's location id and its products in feed order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    pub location_id: String,
    pub products: Vec<NormalizedProduct>,
}

/// Contract shared by every retailer format.
pub trait FeedParser: Send + Sync {
    /// Retailer this parser understands
    fn grocer(&self) -> Grocer;

    /// Decode a whole feed from `reader`. On error nothing is returned, so a
    /// corrupt feed can never yield a partial catalog.
    fn parse(&self, reader: &mut dyn Read) -> Result<ParsedFeed, ParseError>;
}

/// Decode `T` straight from the stream through a buffered reader, without
/// reading the payload into memory first.
pub(crate) fn decode<T: DeserializeOwned>(
    grocer: Grocer,
    reader: &mut dyn Read,
) -> Result<T, ParseError> {
    let buffered = BufReader::new(reader);
    let decoded = serde_json::from_reader(buffered)
        .map_err(|source| ParseError { grocer, source })?;
    debug!(grocer = %grocer, "feed decoded");
    Ok(decoded)
}

/// Treat an explicit JSON `null` like a missing string field.
pub(crate) fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Prices must be JSON numbers. Quoted prices are rejected instead of parsed.
pub(crate) fn price_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    Decimal::from_str(&number.to_string())
        .map_err(|e| D::Error::custom(format!("price {} out of range: {}", number, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "string_or_null")]
        brand: String,
    }

    #[derive(Debug, Deserialize)]
    struct Priced {
        #[serde(deserialize_with = "price_number")]
        price: Decimal,
    }

    #[test]
    fn test_null_and_missing_strings_become_empty() {
        let mut null_input = r#"{"brand": null}"#.as_bytes();
        let sample: Sample = decode(Grocer::StoreA, &mut null_input).unwrap();
        assert_eq!(sample.brand, "");

        let mut missing_input = r#"{}"#.as_bytes();
        let sample: Sample = decode(Grocer::StoreA, &mut missing_input).unwrap();
        assert_eq!(sample.brand, "");
    }

    #[test]
    fn test_decode_error_carries_grocer() {
        let mut input = r#"{"brand": "#.as_bytes();
        let err = decode::<Sample>(Grocer::StoreC, &mut input).unwrap_err();
        assert_eq!(err.grocer, Grocer::StoreC);
        assert!(err.to_string().contains("store_c"));
    }

    #[test]
    fn test_price_accepts_integers_and_fractions() {
        let mut input = r#"{"price": 4}"#.as_bytes();
        let priced: Priced = decode(Grocer::StoreA, &mut input).unwrap();
        assert_eq!(priced.price, dec!(4));

        let mut input = r#"{"price": 3.50}"#.as_bytes();
        let priced: Priced = decode(Grocer::StoreA, &mut input).unwrap();
        assert_eq!(priced.price, dec!(3.5));
    }

    #[test]
    fn test_price_rejects_quoted_numbers() {
        let mut input = r#"{"price": "3.50"}"#.as_bytes();
        assert!(decode::<Priced>(Grocer::StoreB, &mut input).is_err());
    }
}
