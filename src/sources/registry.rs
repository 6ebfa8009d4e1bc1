//! Registry mapping each pipeline stream to its adapter.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ProviderAdapter, SourceError};
use crate::models::{FlightSource, PipelineShape};

/// Registry of the adapters available to the orchestrator
///
/// At most one adapter is registered per [`FlightSource`]. A stream without an
/// adapter is treated as unavailable for every run.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<FlightSource, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous adapter for its stream
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        tracing::debug!("Registered adapter '{}' for {}", adapter.id(), adapter.source());
        self.adapters.insert(adapter.source(), adapter);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Get the adapter for a stream
    pub fn get(&self, source: FlightSource) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&source)
    }

    /// Get the adapter for a stream, returning an error if none is registered
    pub fn get_required(&self, source: FlightSource) -> Result<&Arc<dyn ProviderAdapter>, SourceError> {
        self.get(source)
            .ok_or_else(|| SourceError::Unavailable(format!("no adapter for {}", source.id())))
    }

    /// Streams a pipeline shape runs, in report order
    pub fn streams_for(shape: PipelineShape) -> &'static [FlightSource] {
        match shape {
            PipelineShape::TwoStage => &[FlightSource::Structured, FlightSource::HiddenCity],
            PipelineShape::ThreeStage => &[
                FlightSource::Structured,
                FlightSource::HiddenCity,
                FlightSource::SuggestedHiddenCity,
            ],
        }
    }

    /// Adapters for a shape; unregistered streams come back as errors
    pub fn for_shape(
        &self,
        shape: PipelineShape,
    ) -> Vec<(FlightSource, Result<Arc<dyn ProviderAdapter>, SourceError>)> {
        Self::streams_for(shape)
            .iter()
            .map(|&source| (source, self.get_required(source).cloned()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
