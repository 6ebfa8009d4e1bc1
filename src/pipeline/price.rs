//! Price parsing and the invalid-record filter.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{CanonicalFlightRecord, FlightSource, PriceValue};

static NUMERIC_RUN: OnceLock<Regex> = OnceLock::new();

fn numeric_run() -> &'static Regex {
    NUMERIC_RUN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("static regex"))
}

/// Parse a price from a display string such as `"¥1,234.50"` or `"US$ 899"`.
///
/// Thousands separators are removed, then the first numeric run is taken.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '\'' | '_'))
        .collect();

    let run = numeric_run().find(&cleaned)?;
    run.as_str().parse::<f64>().ok()
}

/// Parse a price in any provider encoding; `None` unless finite and positive
pub fn parse_price(value: &PriceValue) -> Option<f64> {
    let amount = match value {
        PriceValue::Number(n) => *n,
        PriceValue::Text(text) => parse_price_text(text)?,
        PriceValue::Missing => return None,
    };

    (amount.is_finite() && amount > 0.0).then_some(amount)
}

/// Whether a record may enter the merger
pub fn keep(record: &CanonicalFlightRecord) -> bool {
    record.price.amount.is_finite() && record.price.amount > 0.0 && !record.legs.is_empty()
}

/// Drop invalid records from one stream, logging how many were dropped
pub fn filter_records(
    records: Vec<CanonicalFlightRecord>,
    source: FlightSource,
) -> Vec<CanonicalFlightRecord> {
    let before = records.len();
    let kept: Vec<_> = records.into_iter().filter(keep).collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        tracing::debug!(
            "[{}] dropped {} of {} records with invalid price or legs",
            source.id(),
            dropped,
            before
        );
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlightLeg, Price};

    fn record(amount: f64, legs: usize) -> CanonicalFlightRecord {
        CanonicalFlightRecord {
            source: FlightSource::Structured,
            price: Price {
                amount,
                currency: "CNY".to_string(),
                display: None,
            },
            legs: vec![FlightLeg::default(); legs],
            stop_count: 0,
            duration_minutes: None,
            is_hidden_city: false,
            hidden_destination_code: None,
            ai_recommended: false,
            booking_token: None,
            provider_id: None,
            raw: None,
        }
    }

    #[test]
    fn test_parse_price_encodings() {
        assert_eq!(
            parse_price(&PriceValue::Text("¥1,234.50".to_string())),
            Some(1234.50)
        );
        assert_eq!(parse_price(&PriceValue::Number(42.0)), Some(42.0));
        assert_eq!(parse_price(&PriceValue::Text("0".to_string())), None);
        assert_eq!(parse_price(&PriceValue::Missing), None);
        assert_eq!(parse_price(&PriceValue::Text("call us".to_string())), None);
        assert_eq!(parse_price(&PriceValue::Number(f64::NAN)), None);
        assert_eq!(parse_price(&PriceValue::Number(-12.0)), None);
    }

    #[test]
    fn test_parse_price_text_variants() {
        assert_eq!(parse_price_text("US$ 899"), Some(899.0));
        assert_eq!(parse_price_text("1,299 CNY"), Some(1299.0));
        assert_eq!(parse_price_text("€12.5 (incl. taxes 3.2)"), Some(12.5));
        assert_eq!(parse_price_text("-5"), Some(-5.0));
        assert_eq!(parse_price_text(""), None);
    }

    #[test]
    fn test_keep_requires_price_and_legs() {
        assert!(keep(&record(100.0, 1)));
        assert!(!keep(&record(0.0, 1)));
        assert!(!keep(&record(100.0, 0)));
        assert!(!keep(&record(f64::INFINITY, 1)));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let records = vec![
            record(100.0, 1),
            record(0.0, 1),
            record(55.5, 2),
            record(-1.0, 1),
            record(10.0, 0),
        ];

        let once = filter_records(records, FlightSource::HiddenCity);
        let twice = filter_records(once.clone(), FlightSource::HiddenCity);

        assert_eq!(once.len(), 2);
        let amounts = |rs: &[CanonicalFlightRecord]| {
            rs.iter().map(|r| r.price.amount).collect::<Vec<_>>()
        };
        assert_eq!(amounts(&once), amounts(&twice));
    }
}
