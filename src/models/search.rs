//! Search request and pipeline result models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cabin class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    /// Returns the display name
    pub fn name(&self) -> &'static str {
        match self {
            CabinClass::Economy => "Economy",
            CabinClass::PremiumEconomy => "Premium economy",
            CabinClass::Business => "Business",
            CabinClass::First => "First",
        }
    }
}

/// Maximum number of stops the traveller accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxStops {
    #[default]
    Any,
    NonStop,
    OneStop,
    TwoStops,
}

/// Result ordering preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Best,
    Price,
    Duration,
    DepartureTime,
    ArrivalTime,
}

/// Report language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Language {
    /// Pick a language from a locale tag such as "zh-CN" or "en-US"
    pub fn from_locale(locale: &str) -> Self {
        if locale.trim().to_ascii_lowercase().starts_with("zh") {
            Language::Zh
        } else {
            Language::En
        }
    }
}

/// Passenger composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants_in_seat: u32,
    pub infants_on_lap: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
        }
    }
}

impl Passengers {
    /// Total number of travellers
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants_in_seat + self.infants_on_lap
    }
}

/// A flight search, owned by the caller and read-only to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Departure location code (IATA)
    pub origin: String,

    /// Destination location code (IATA)
    pub destination: String,

    pub departure_date: NaiveDate,

    /// Present for round trips
    pub return_date: Option<NaiveDate>,

    pub passengers: Passengers,
    pub cabin: CabinClass,
    pub max_stops: MaxStops,
    pub sort_by: SortBy,

    /// Locale tag, e.g. "zh-CN"
    pub locale: String,

    /// ISO currency code
    pub currency: String,

    /// Free-text user preferences
    pub preferences: String,
}

impl SearchRequest {
    /// Create a one-way economy search for one adult
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_date: NaiveDate,
    ) -> Self {
        Self {
            origin: origin.into().trim().to_ascii_uppercase(),
            destination: destination.into().trim().to_ascii_uppercase(),
            departure_date,
            return_date: None,
            passengers: Passengers::default(),
            cabin: CabinClass::default(),
            max_stops: MaxStops::default(),
            sort_by: SortBy::default(),
            locale: "en-US".to_string(),
            currency: "USD".to_string(),
            preferences: String::new(),
        }
    }

    /// Make this a round trip
    pub fn return_date(mut self, date: NaiveDate) -> Self {
        self.return_date = Some(date);
        self
    }

    /// Set passengers
    pub fn passengers(mut self, passengers: Passengers) -> Self {
        self.passengers = passengers;
        self
    }

    /// Set cabin class
    pub fn cabin(mut self, cabin: CabinClass) -> Self {
        self.cabin = cabin;
        self
    }

    /// Set stop preference
    pub fn max_stops(mut self, max_stops: MaxStops) -> Self {
        self.max_stops = max_stops;
        self
    }

    /// Set sort preference
    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// Set locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Set currency
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_ascii_uppercase();
        self
    }

    /// Set free-text preferences
    pub fn preferences(mut self, preferences: impl Into<String>) -> Self {
        self.preferences = preferences.into();
        self
    }

    /// Whether a return date is present
    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }

    /// Report language derived from the locale
    pub fn language(&self) -> Language {
        Language::from_locale(&self.locale)
    }
}

/// Which adapters a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineShape {
    /// Structured + hidden-city (round trips)
    TwoStage,
    /// Structured + hidden-city + AI-suggested hidden city (one-way)
    ThreeStage,
}

impl PipelineShape {
    /// Shape for a request
    pub fn for_request(request: &SearchRequest) -> Self {
        if request.is_round_trip() {
            PipelineShape::TwoStage
        } else {
            PipelineShape::ThreeStage
        }
    }
}

/// Number of records per stream handed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCounts {
    pub structured: usize,
    pub hidden_city: usize,
    pub ai_recommended: usize,
}

impl SourceCounts {
    /// Sum of all streams
    pub fn total(&self) -> usize {
        self.structured + self.hidden_city + self.ai_recommended
    }
}

/// The only artifact returned to the caller of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub success: bool,

    /// Markdown report
    pub report: String,

    pub source_counts: SourceCounts,
    pub model_used: Option<String>,
    pub fallback_used: bool,
    pub shape: PipelineShape,
    pub elapsed_ms: u64,
}
