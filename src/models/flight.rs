//! Flight record models: raw provider payloads and the canonical record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which pipeline stream a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightSource {
    /// Structured fare search
    Structured,
    /// Hidden-city fare search
    HiddenCity,
    /// Hidden-city routes suggested by the discovery model
    SuggestedHiddenCity,
}

impl FlightSource {
    /// Returns the display name of the stream
    pub fn name(&self) -> &'static str {
        match self {
            FlightSource::Structured => "Structured search",
            FlightSource::HiddenCity => "Hidden-city search",
            FlightSource::SuggestedHiddenCity => "AI-suggested hidden city",
        }
    }

    /// Returns the stream identifier (used in logs and adapter ids)
    pub fn id(&self) -> &'static str {
        match self {
            FlightSource::Structured => "structured",
            FlightSource::HiddenCity => "hidden_city",
            FlightSource::SuggestedHiddenCity => "suggested_hidden_city",
        }
    }
}

impl std::fmt::Display for FlightSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A price as a provider encodes it: a number, a display string, or nothing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl PriceValue {
    /// Interpret an arbitrary JSON value as a price encoding
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => {
                n.as_f64().map(PriceValue::Number).unwrap_or_default()
            }
            Some(serde_json::Value::String(s)) => PriceValue::Text(s.clone()),
            _ => PriceValue::Missing,
        }
    }
}

/// One leg of an attribute-style provider object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderLeg {
    #[serde(default)]
    pub airline_code: Option<String>,
    #[serde(default)]
    pub airline_name: Option<String>,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub departure_airport: Option<String>,
    #[serde(default)]
    pub arrival_airport: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
}

/// Attribute-style flight object, as returned by typed provider libraries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderFlight {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub price: PriceValue,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub legs: Vec<ProviderLeg>,
    #[serde(default)]
    pub stops: Option<u32>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub is_hidden_city: Option<bool>,
    #[serde(default)]
    pub hidden_destination: Option<String>,
    #[serde(default)]
    pub booking_token: Option<String>,
}

/// Provider payload, discriminated by shape
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// Typed, attribute-style object
    Object(ProviderFlight),
    /// Untyped key/value mapping (usually decoded JSON)
    Mapping(serde_json::Map<String, serde_json::Value>),
}

/// Annotations an adapter attaches to a record before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTags {
    /// Overrides the payload's own hidden-city flag when set
    pub hidden_city: Option<bool>,
    /// Ticketed destination beyond the traveller's real one
    pub hidden_destination: Option<String>,
    pub ai_recommended: bool,
}

/// A provider-specific record; only the normalizer looks inside the payload
#[derive(Debug, Clone)]
pub struct RawProviderRecord {
    pub payload: RawPayload,
    pub tags: RecordTags,
}

impl RawProviderRecord {
    /// Wrap a typed provider object
    pub fn object(flight: ProviderFlight) -> Self {
        Self {
            payload: RawPayload::Object(flight),
            tags: RecordTags::default(),
        }
    }

    /// Wrap a key/value mapping
    pub fn mapping(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            payload: RawPayload::Mapping(map),
            tags: RecordTags::default(),
        }
    }

    /// Build from a decoded JSON value; non-object values are rejected
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self::mapping(map)),
            _ => None,
        }
    }

    /// Replace the tags
    pub fn with_tags(mut self, tags: RecordTags) -> Self {
        self.tags = tags;
        self
    }
}

/// Price of an itinerary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,

    /// Provider display text, kept until the budgeter strips it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A single flown segment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightLeg {
    pub carrier_code: String,
    pub carrier_name: String,
    pub flight_number: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: Option<NaiveDateTime>,
    pub arrival_time: Option<NaiveDateTime>,
}

/// The normalized, source-independent representation of one itinerary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalFlightRecord {
    pub source: FlightSource,
    pub price: Price,

    /// Chronological
    pub legs: Vec<FlightLeg>,

    pub stop_count: u32,
    pub duration_minutes: Option<u32>,
    pub is_hidden_city: bool,
    pub hidden_destination_code: Option<String>,
    pub ai_recommended: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Embedded raw provider payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl CanonicalFlightRecord {
    /// First departure airport
    pub fn origin(&self) -> Option<&str> {
        self.legs.first().map(|l| l.departure_airport.as_str())
    }

    /// Final arrival airport (the ticketed destination)
    pub fn final_destination(&self) -> Option<&str> {
        self.legs.last().map(|l| l.arrival_airport.as_str())
    }

    /// Airports where the itinerary lands before its final destination
    pub fn layovers(&self) -> impl Iterator<Item = &str> {
        let n = self.legs.len().saturating_sub(1);
        self.legs[..n].iter().map(|l| l.arrival_airport.as_str())
    }

    /// Carrier names joined for display
    pub fn carriers(&self) -> String {
        let mut names: Vec<&str> = Vec::new();
        for leg in &self.legs {
            let name = if leg.carrier_name.is_empty() {
                leg.carrier_code.as_str()
            } else {
                leg.carrier_name.as_str()
            };
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names.join(" / ")
    }

    /// Route as "AAA → BBB → CCC"
    pub fn route(&self) -> String {
        let mut stops: Vec<&str> = Vec::with_capacity(self.legs.len() + 1);
        if let Some(first) = self.origin() {
            stops.push(first);
        }
        stops.extend(self.legs.iter().map(|l| l.arrival_airport.as_str()));
        stops.join(" → ")
    }
}
