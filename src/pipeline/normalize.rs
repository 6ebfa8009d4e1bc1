//! Conversion of provider payloads into [`CanonicalFlightRecord`]s.
//!
//! Each (source, payload shape) pair has its own function. Field lookups are
//! alias-tolerant; anything missing is left at its zero value. A record is only
//! rejected when no leg can be recovered.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{
    CanonicalFlightRecord, FlightLeg, FlightSource, Price, PriceValue, ProviderFlight,
    ProviderLeg, RawPayload, RawProviderRecord, RecordTags,
};
use crate::pipeline::price::parse_price;

const LEG_LIST_KEYS: &[&str] = &["legs", "segments", "route", "flights"];
const CARRIER_CODE_KEYS: &[&str] = &["airline_code", "carrier_code", "carrier", "operating_carrier"];
const CARRIER_NAME_KEYS: &[&str] = &["airline_name", "carrier_name", "airline"];
const FLIGHT_NUMBER_KEYS: &[&str] = &["flight_number", "flight_no", "flightNumber", "number"];
const DEPARTURE_AIRPORT_KEYS: &[&str] = &["departure_airport", "flyFrom", "from", "origin"];
const ARRIVAL_AIRPORT_KEYS: &[&str] = &["arrival_airport", "flyTo", "to", "destination"];
const DEPARTURE_TIME_KEYS: &[&str] = &[
    "departure_time",
    "local_departure",
    "departure_at",
    "departureTime",
    "dTime",
];
const ARRIVAL_TIME_KEYS: &[&str] = &[
    "arrival_time",
    "local_arrival",
    "arrival_at",
    "arrivalTime",
    "aTime",
];
const STOP_KEYS: &[&str] = &["stops", "stop_count", "number_of_stops"];
const DURATION_KEYS: &[&str] = &["duration_minutes", "duration", "total_duration"];
const HIDDEN_FLAG_KEYS: &[&str] = &["is_hidden_city", "hidden_city", "hidden_city_ticketing"];
const HIDDEN_DESTINATION_KEYS: &[&str] = &["hidden_destination", "hidden_city_destination"];
const TOKEN_KEYS: &[&str] = &["booking_token", "token"];
const ID_KEYS: &[&str] = &["id", "itinerary_id"];

/// Normalize one raw record into the canonical shape
pub fn normalize(raw: &RawProviderRecord, source: FlightSource) -> Option<CanonicalFlightRecord> {
    let mut record = match (&raw.payload, source) {
        (RawPayload::Object(flight), _) => from_object(flight, source),
        (RawPayload::Mapping(map), FlightSource::HiddenCity) => from_hidden_city_mapping(map),
        (RawPayload::Mapping(map), _) => from_structured_mapping(map, source),
    }?;

    apply_tags(&mut record, &raw.tags);
    Some(record)
}

/// Normalize a whole stream, dropping records without legs
pub fn normalize_all(raw: &[RawProviderRecord], source: FlightSource) -> Vec<CanonicalFlightRecord> {
    let records: Vec<_> = raw.iter().filter_map(|r| normalize(r, source)).collect();

    if records.len() < raw.len() {
        tracing::debug!(
            "[{}] {} of {} records had no usable legs",
            source.id(),
            raw.len() - records.len(),
            raw.len()
        );
    }

    records
}

/// Larger unix timestamps are taken as milliseconds (10^11 s is year 5138)
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Parse a provider timestamp (RFC 3339, ISO-like local time, or unix seconds
/// or milliseconds)
pub fn parse_time(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let stamp = n.as_i64()?;
            let parsed = if stamp.abs() >= MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(stamp)
            } else {
                DateTime::from_timestamp(stamp, 0)
            };
            parsed.map(|dt| dt.naive_utc())
        }
        Value::String(s) => parse_time_str(s),
        _ => None,
    }
}

fn parse_time_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn from_object(flight: &ProviderFlight, source: FlightSource) -> Option<CanonicalFlightRecord> {
    let legs = flight.legs.iter().map(leg_from_object).collect();

    finish(Parts {
        source,
        price: flight.price.clone(),
        currency: flight.currency.clone(),
        legs,
        stops: flight.stops,
        duration_minutes: flight.duration_minutes,
        is_hidden_city: flight.is_hidden_city.unwrap_or(false),
        hidden_destination: flight.hidden_destination.clone(),
        booking_token: flight.booking_token.clone(),
        provider_id: flight.id.clone(),
        raw: serde_json::to_value(flight).ok(),
    })
}

fn leg_from_object(leg: &ProviderLeg) -> FlightLeg {
    let time = |t: &Option<String>| t.as_deref().and_then(parse_time_str);

    FlightLeg {
        carrier_code: leg.airline_code.clone().unwrap_or_default(),
        carrier_name: leg.airline_name.clone().unwrap_or_default(),
        flight_number: leg.flight_number.clone().unwrap_or_default(),
        departure_airport: code(leg.departure_airport.as_deref().unwrap_or_default()),
        arrival_airport: code(leg.arrival_airport.as_deref().unwrap_or_default()),
        departure_time: time(&leg.departure_time),
        arrival_time: time(&leg.arrival_time),
    }
}

fn from_structured_mapping(
    map: &Map<String, Value>,
    source: FlightSource,
) -> Option<CanonicalFlightRecord> {
    let (price, currency) = price_of(map);

    finish(Parts {
        source,
        price,
        currency,
        legs: legs_of(map),
        stops: uint_field(map, STOP_KEYS),
        duration_minutes: minutes_of(map),
        is_hidden_city: bool_field(map, HIDDEN_FLAG_KEYS).unwrap_or(false),
        hidden_destination: str_field(map, HIDDEN_DESTINATION_KEYS).map(|s| code(&s)),
        booking_token: str_field(map, TOKEN_KEYS),
        provider_id: str_field(map, ID_KEYS),
        raw: Some(Value::Object(map.clone())),
    })
}

/// Hidden-city providers report durations in seconds, either flat or as
/// `{"total": <secs>}`, and flag hidden-city fares explicitly.
fn from_hidden_city_mapping(map: &Map<String, Value>) -> Option<CanonicalFlightRecord> {
    let (price, currency) = price_of(map);

    let duration_minutes = match map.get("duration") {
        Some(Value::Object(d)) => d
            .get("total")
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s / 60).ok()),
        _ => uint_field(map, &["duration_minutes"])
            .or_else(|| uint_field(map, &["duration_seconds"]).map(|s| s / 60)),
    };

    let is_hidden_city = bool_field(map, HIDDEN_FLAG_KEYS).unwrap_or(false);
    let legs = legs_of(map);
    let hidden_destination = str_field(map, HIDDEN_DESTINATION_KEYS)
        .map(|s| code(&s))
        .or_else(|| {
            is_hidden_city
                .then(|| legs.last().map(|l: &FlightLeg| l.arrival_airport.clone()))
                .flatten()
        });

    finish(Parts {
        source: FlightSource::HiddenCity,
        price,
        currency,
        legs,
        stops: uint_field(map, STOP_KEYS),
        duration_minutes,
        is_hidden_city,
        hidden_destination,
        booking_token: str_field(map, TOKEN_KEYS),
        provider_id: str_field(map, ID_KEYS),
        raw: Some(Value::Object(map.clone())),
    })
}

fn legs_of(map: &Map<String, Value>) -> Vec<FlightLeg> {
    let list = LEG_LIST_KEYS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_array));

    match list {
        Some(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(leg_from_mapping)
            .collect(),
        // Flat single-leg shape
        None if str_field(map, DEPARTURE_AIRPORT_KEYS).is_some() => vec![leg_from_mapping(map)],
        None => Vec::new(),
    }
}

fn leg_from_mapping(map: &Map<String, Value>) -> FlightLeg {
    let time = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(parse_time));

    let mut carrier_code = str_field(map, CARRIER_CODE_KEYS).unwrap_or_default();
    let mut carrier_name = str_field(map, CARRIER_NAME_KEYS).unwrap_or_default();

    // A bare "airline" field can hold either a code or a name
    if carrier_code.is_empty() && looks_like_carrier_code(&carrier_name) {
        carrier_code = std::mem::take(&mut carrier_name);
    } else if !looks_like_carrier_code(&carrier_code) && carrier_name.is_empty() {
        carrier_name = std::mem::take(&mut carrier_code);
    }

    FlightLeg {
        flight_number: str_field(map, FLIGHT_NUMBER_KEYS)
            .map(|n| prefix_flight_number(&carrier_code, n))
            .unwrap_or_default(),
        carrier_code,
        carrier_name,
        departure_airport: code(&str_field(map, DEPARTURE_AIRPORT_KEYS).unwrap_or_default()),
        arrival_airport: code(&str_field(map, ARRIVAL_AIRPORT_KEYS).unwrap_or_default()),
        departure_time: time(DEPARTURE_TIME_KEYS),
        arrival_time: time(ARRIVAL_TIME_KEYS),
    }
}

fn price_of(map: &Map<String, Value>) -> (PriceValue, Option<String>) {
    let currency = str_field(map, &["currency", "currency_code"]);

    match map.get("price") {
        Some(Value::Object(p)) => {
            let amount = ["amount", "total", "value"]
                .iter()
                .find_map(|k| p.get(*k));
            let nested_currency = p
                .get("currency")
                .and_then(Value::as_str)
                .map(str::to_string);
            (PriceValue::from_json(amount), nested_currency.or(currency))
        }
        other => (PriceValue::from_json(other), currency),
    }
}

fn minutes_of(map: &Map<String, Value>) -> Option<u32> {
    DURATION_KEYS.iter().find_map(|k| match map.get(*k)? {
        Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Value::String(s) => parse_duration_text(s),
        _ => None,
    })
}

static DURATION_PART: OnceLock<Regex> = OnceLock::new();

/// Parse "2h 35m", "2 hr 35 min" or "155"; `None` on overflow
fn parse_duration_text(s: &str) -> Option<u32> {
    let s = s.trim().to_ascii_lowercase();
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }

    let part = DURATION_PART.get_or_init(|| Regex::new(r"(\d+)\s*([hm])").expect("static regex"));
    let mut total: Option<u32> = None;
    for caps in part.captures_iter(&s) {
        let n: u32 = caps[1].parse().ok()?;
        let minutes = match &caps[2] {
            "h" => n.checked_mul(60)?,
            _ => n,
        };
        total = Some(total.unwrap_or(0).checked_add(minutes)?);
    }
    total
}

struct Parts {
    source: FlightSource,
    price: PriceValue,
    currency: Option<String>,
    legs: Vec<FlightLeg>,
    stops: Option<u32>,
    duration_minutes: Option<u32>,
    is_hidden_city: bool,
    hidden_destination: Option<String>,
    booking_token: Option<String>,
    provider_id: Option<String>,
    raw: Option<Value>,
}

fn finish(parts: Parts) -> Option<CanonicalFlightRecord> {
    let mut legs = parts.legs;
    if legs.is_empty() {
        return None;
    }

    if legs.iter().all(|l| l.departure_time.is_some()) {
        legs.sort_by_key(|l| l.departure_time);
    }

    let stop_count = parts
        .stops
        .unwrap_or_else(|| u32::try_from(legs.len() - 1).unwrap_or(u32::MAX));
    let duration_minutes = parts.duration_minutes.or_else(|| derived_duration(&legs));

    let display = match &parts.price {
        PriceValue::Text(text) => Some(text.clone()),
        _ => None,
    };

    Some(CanonicalFlightRecord {
        source: parts.source,
        price: Price {
            amount: parse_price(&parts.price).unwrap_or(0.0),
            currency: parts.currency.unwrap_or_default(),
            display,
        },
        legs,
        stop_count,
        duration_minutes,
        is_hidden_city: parts.is_hidden_city,
        hidden_destination_code: parts.hidden_destination.filter(|c| !c.is_empty()),
        ai_recommended: false,
        booking_token: parts.booking_token,
        provider_id: parts.provider_id,
        raw: parts.raw,
    })
}

fn derived_duration(legs: &[FlightLeg]) -> Option<u32> {
    let start = legs.first()?.departure_time?;
    let end = legs.last()?.arrival_time?;
    let minutes = (end - start).num_minutes();
    u32::try_from(minutes).ok().filter(|&m| m > 0)
}

fn apply_tags(record: &mut CanonicalFlightRecord, tags: &RecordTags) {
    if let Some(hidden) = tags.hidden_city {
        record.is_hidden_city = hidden;
    }
    if let Some(destination) = &tags.hidden_destination {
        record.hidden_destination_code = Some(code(destination));
    }
    record.ai_recommended |= tags.ai_recommended;

    if record.is_hidden_city && record.hidden_destination_code.is_none() {
        record.hidden_destination_code = record.final_destination().map(str::to_string);
    }
}

fn str_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn uint_field(map: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn bool_field(map: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn code(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

fn looks_like_carrier_code(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn prefix_flight_number(carrier_code: &str, number: String) -> String {
    if !carrier_code.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
        format!("{}{}", carrier_code, number)
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(value: Value) -> RawProviderRecord {
        RawProviderRecord::from_json(value).unwrap()
    }

    #[test]
    fn test_structured_mapping() {
        let raw = mapping(json!({
            "id": "itin-1",
            "price": "¥1,234",
            "currency": "CNY",
            "stops": 1,
            "legs": [
                {
                    "airline_code": "CA", "airline_name": "Air China", "flight_number": "CA1831",
                    "departure_airport": "pek", "arrival_airport": "SHA",
                    "departure_time": "2026-11-01T11:00:00", "arrival_time": "2026-11-01T13:10:00"
                },
                {
                    "airline_code": "CA", "flight_number": "1501",
                    "departure_airport": "SHA", "arrival_airport": "CAN",
                    "departure_time": "2026-11-01T15:00:00", "arrival_time": "2026-11-01T17:30:00"
                }
            ]
        }));

        let record = normalize(&raw, FlightSource::Structured).unwrap();
        assert_eq!(record.price.amount, 1234.0);
        assert_eq!(record.price.currency, "CNY");
        assert_eq!(record.price.display.as_deref(), Some("¥1,234"));
        assert_eq!(record.legs.len(), 2);
        assert_eq!(record.legs[0].departure_airport, "PEK");
        assert_eq!(record.legs[1].flight_number, "CA1501");
        assert_eq!(record.stop_count, 1);
        assert_eq!(record.duration_minutes, Some(390));
        assert_eq!(record.provider_id.as_deref(), Some("itin-1"));
        assert!(record.raw.is_some());
        assert!(!record.is_hidden_city);
    }

    #[test]
    fn test_hidden_city_mapping() {
        let raw = mapping(json!({
            "price": 680,
            "currency": "CNY",
            "is_hidden_city": true,
            "duration": {"departure": 9000, "total": 9000},
            "booking_token": "tok",
            "route": [
                {
                    "airline": "MU", "flight_no": 5101, "flyFrom": "PEK", "flyTo": "SHA",
                    "local_departure": "2026-11-01T08:00:00.000Z",
                    "local_arrival": "2026-11-01T10:05:00.000Z"
                },
                {
                    "airline": "MU", "flight_no": 5302, "flyFrom": "SHA", "flyTo": "CAN",
                    "local_departure": "2026-11-01T12:00:00.000Z",
                    "local_arrival": "2026-11-01T14:30:00.000Z"
                }
            ]
        }));

        let record = normalize(&raw, FlightSource::HiddenCity).unwrap();
        assert_eq!(record.price.amount, 680.0);
        assert!(record.is_hidden_city);
        assert_eq!(record.hidden_destination_code.as_deref(), Some("CAN"));
        assert_eq!(record.duration_minutes, Some(150));
        assert_eq!(record.legs[0].carrier_code, "MU");
        assert_eq!(record.legs[0].flight_number, "MU5101");
        assert_eq!(record.layovers().collect::<Vec<_>>(), vec!["SHA"]);
    }

    #[test]
    fn test_object_payload_and_chronological_legs() {
        let flight = ProviderFlight {
            price: PriceValue::Number(420.0),
            currency: Some("USD".to_string()),
            legs: vec![
                ProviderLeg {
                    departure_airport: Some("ORD".to_string()),
                    arrival_airport: Some("LAX".to_string()),
                    departure_time: Some("2026-11-01 14:00".to_string()),
                    ..Default::default()
                },
                ProviderLeg {
                    departure_airport: Some("JFK".to_string()),
                    arrival_airport: Some("ORD".to_string()),
                    departure_time: Some("2026-11-01 09:00".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let record = normalize(&RawProviderRecord::object(flight), FlightSource::Structured).unwrap();
        assert_eq!(record.legs[0].departure_airport, "JFK");
        assert_eq!(record.route(), "JFK → ORD → LAX");
        assert_eq!(record.stop_count, 1);
    }

    #[test]
    fn test_partial_mapping_degrades_to_zero_values() {
        let raw = mapping(json!({
            "departure_airport": "PEK",
            "arrival_airport": "SHA"
        }));

        let record = normalize(&raw, FlightSource::Structured).unwrap();
        assert_eq!(record.legs.len(), 1);
        assert_eq!(record.price.amount, 0.0);
        assert_eq!(record.price.currency, "");
        assert_eq!(record.legs[0].departure_time, None);
        assert_eq!(record.duration_minutes, None);
    }

    #[test]
    fn test_mapping_without_legs_is_rejected() {
        let raw = mapping(json!({"price": 100}));
        assert!(normalize(&raw, FlightSource::Structured).is_none());
    }

    #[test]
    fn test_tags_override_payload() {
        let raw = mapping(json!({
            "price": {"amount": "1,050.00", "currency": "CNY"},
            "legs": [
                {"from": "PEK", "to": "SHA"},
                {"from": "SHA", "to": "XMN"}
            ]
        }))
        .with_tags(RecordTags {
            hidden_city: Some(true),
            hidden_destination: Some("xmn".to_string()),
            ai_recommended: true,
        });

        let record = normalize(&raw, FlightSource::SuggestedHiddenCity).unwrap();
        assert_eq!(record.price.amount, 1050.0);
        assert_eq!(record.price.currency, "CNY");
        assert!(record.is_hidden_city);
        assert!(record.ai_recommended);
        assert_eq!(record.hidden_destination_code.as_deref(), Some("XMN"));
        assert_eq!(record.source, FlightSource::SuggestedHiddenCity);
    }

    #[test]
    fn test_parse_duration_text() {
        assert_eq!(parse_duration_text("2h 35m"), Some(155));
        assert_eq!(parse_duration_text("2 hr 35 min"), Some(155));
        assert_eq!(parse_duration_text("155"), Some(155));
        assert_eq!(parse_duration_text("soon"), None);
    }

    #[test]
    fn test_parse_time_formats() {
        assert!(parse_time(&json!("2026-11-01T08:00:00+08:00")).is_some());
        assert!(parse_time(&json!("2026-11-01 08:00")).is_some());
        assert!(parse_time(&json!(1_790_000_000)).is_some());
        assert!(parse_time(&json!("tomorrow")).is_none());
    }

    #[test]
    fn test_parse_duration_text_overflow() {
        assert_eq!(parse_duration_text("99999999h"), None);
        assert_eq!(parse_duration_text("4294967296"), None);
        assert_eq!(parse_duration_text("71582788h 16m"), None);
    }

    #[test]
    fn test_oversized_durations_are_dropped() {
        let raw = mapping(json!({
            "price": 500,
            "duration": "99999999h",
            "legs": [{"from": "PEK", "to": "SHA"}]
        }));
        let record = normalize(&raw, FlightSource::Structured).unwrap();
        assert_eq!(record.duration_minutes, None);
        assert_eq!(record.legs.len(), 1);

        let raw = mapping(json!({
            "price": 500,
            "duration_minutes": 5_000_000_000u64,
            "stops": 5_000_000_000u64,
            "legs": [{"from": "PEK", "to": "SHA"}]
        }));
        let record = normalize(&raw, FlightSource::Structured).unwrap();
        assert_eq!(record.duration_minutes, None);
        assert_eq!(record.stop_count, 0);
    }

    #[test]
    fn test_millisecond_timestamps() {
        assert_eq!(
            parse_time(&json!(1_790_000_000_000i64)),
            parse_time(&json!(1_790_000_000))
        );

        let raw = mapping(json!({
            "price": 500,
            "legs": [{
                "from": "PEK", "to": "SHA",
                "departure_time": 1_790_000_000_000i64,
                "arrival_time": 1_790_009_000_000i64
            }]
        }));
        let record = normalize(&raw, FlightSource::Structured).unwrap();
        assert_eq!(record.duration_minutes, Some(150));
    }
}
