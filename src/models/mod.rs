//! Core data models for flight searches and pipeline results.

mod flight;
mod search;

pub use flight::{
    CanonicalFlightRecord, FlightLeg, FlightSource, Price, PriceValue, ProviderFlight, ProviderLeg,
    RawPayload, RawProviderRecord, RecordTags,
};
pub use search::{
    CabinClass, Language, MaxStops, Passengers, PipelineResult, PipelineShape, SearchRequest,
    SortBy, SourceCounts,
};
