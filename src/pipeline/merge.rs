//! Merging the three streams into one size-bounded dataset.

use serde::Serialize;

use crate::config::BudgetConfig;
use crate::models::{CanonicalFlightRecord, FlightSource, SourceCounts};

/// The consolidated dataset handed to the prompt builder
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedDataset {
    pub structured: Vec<CanonicalFlightRecord>,
    pub hidden_city: Vec<CanonicalFlightRecord>,
    pub suggested: Vec<CanonicalFlightRecord>,
}

impl MergedDataset {
    /// True when no stream holds a record
    pub fn is_empty(&self) -> bool {
        self.structured.is_empty() && self.hidden_city.is_empty() && self.suggested.is_empty()
    }

    /// Record counts per stream
    pub fn counts(&self) -> SourceCounts {
        SourceCounts {
            structured: self.structured.len(),
            hidden_city: self.hidden_city.len(),
            ai_recommended: self.suggested.len(),
        }
    }

    /// Iterate over (stream, records) pairs in report order
    pub fn streams(&self) -> [(FlightSource, &[CanonicalFlightRecord]); 3] {
        [
            (FlightSource::Structured, self.structured.as_slice()),
            (FlightSource::HiddenCity, self.hidden_city.as_slice()),
            (FlightSource::SuggestedHiddenCity, self.suggested.as_slice()),
        ]
    }
}

/// Merge the filtered streams, applying per-stream caps and stripping
/// internal fields.
pub fn merge(
    structured: Vec<CanonicalFlightRecord>,
    hidden_city: Vec<CanonicalFlightRecord>,
    suggested: Vec<CanonicalFlightRecord>,
    budget: &BudgetConfig,
) -> MergedDataset {
    MergedDataset {
        structured: budget_stream(structured, FlightSource::Structured, budget.structured_cap, false),
        hidden_city: budget_stream(hidden_city, FlightSource::HiddenCity, budget.hidden_city_cap, false),
        suggested: budget_stream(
            suggested,
            FlightSource::SuggestedHiddenCity,
            budget.suggested_cap,
            true,
        ),
    }
}

/// Ascending by price; NaN never reaches here but sorts last if it does
pub fn sort_by_price(records: &mut [CanonicalFlightRecord]) {
    records.sort_by(|a, b| a.price.amount.total_cmp(&b.price.amount));
}

fn budget_stream(
    mut records: Vec<CanonicalFlightRecord>,
    source: FlightSource,
    cap: usize,
    always_sort: bool,
) -> Vec<CanonicalFlightRecord> {
    let before_count = records.len();
    let before_bytes = serialized_size(&records);

    if always_sort || records.len() > cap {
        sort_by_price(&mut records);
    }
    records.truncate(cap);
    records.iter_mut().for_each(strip);

    let after_bytes = serialized_size(&records);
    if before_count > 0 {
        let reduction = if before_bytes == 0 {
            0.0
        } else {
            100.0 * (before_bytes.saturating_sub(after_bytes)) as f64 / before_bytes as f64
        };
        tracing::info!(
            "[{}] {} -> {} records, {} -> {} bytes ({:.1}% smaller)",
            source.id(),
            before_count,
            records.len(),
            before_bytes,
            after_bytes,
            reduction
        );
    }

    records
}

fn strip(record: &mut CanonicalFlightRecord) {
    record.raw = None;
    record.booking_token = None;
    record.provider_id = None;
    record.price.display = None;
}

fn serialized_size(records: &[CanonicalFlightRecord]) -> usize {
    serde_json::to_vec(records).map(|v| v.len()).unwrap_or(0)
}
