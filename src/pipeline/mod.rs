//! The aggregation pipeline.
//!
//! ```text
//! FlightAggregator::run
//!   ├─ adapters (concurrent)      sources::*
//!   ├─ normalize                  canonical records
//!   ├─ price::filter_records      drop unpriced / legless records
//!   ├─ merge                      per-stream caps, stripping
//!   ├─ PromptBuilder::build
//!   └─ ModelInvoker::invoke       primary, then fallback
//! ```

pub mod invoker;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod price;
pub mod prompt;
pub mod report;

pub use invoker::{InvocationOutcome, ModelInvocation, ModelInvoker};
pub use merge::{merge, MergedDataset};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use normalize::normalize;
pub use orchestrator::FlightAggregator;
pub use price::{filter_records, keep, parse_price};
pub use prompt::{Prompt, PromptBuilder};
pub use report::{degraded_report, no_flights_report};
