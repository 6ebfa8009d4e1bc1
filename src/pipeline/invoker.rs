//! Report model invocation with a single fallback.
//!
//! The invoker is a small state machine:
//!
//! ```text
//! TryPrimary ──ok──▶ Succeeded
//!     │ fail
//!     ▼
//! TryFallback ──ok──▶ Succeeded
//!     │ fail
//!     ▼
//!   Failed
//! ```
//!
//! A timeout, a transport or API error and an empty answer are all failures.

use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::prompt::Prompt;
use crate::sources::{CompletionModel, SourceError};

/// Final outcome of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success(String),
    Failure(String),
}

/// Record of one report generation
#[derive(Debug, Clone)]
pub struct ModelInvocation {
    pub requested_model: String,

    /// The model whose answer was used; `None` when both failed
    pub actual_model: Option<String>,

    pub fallback_used: bool,
    pub outcome: InvocationOutcome,

    /// One entry per failed attempt, as "model: reason"
    pub errors: Vec<String>,
}

impl ModelInvocation {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, InvocationOutcome::Success(_))
    }

    /// The report text, when the invocation succeeded
    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            InvocationOutcome::Success(content) => Some(content),
            InvocationOutcome::Failure(_) => None,
        }
    }
}

#[derive(Debug)]
enum InvocationState {
    TryPrimary,
    TryFallback,
    Succeeded { model: String, content: String },
    Failed,
}

/// Calls the report model, falling back once on failure
#[derive(Debug, Clone)]
pub struct ModelInvoker {
    model: Arc<dyn CompletionModel>,
    fallback_model: String,
    primary_timeout: Duration,
    fallback_timeout: Duration,
}

impl ModelInvoker {
    pub fn new(model: Arc<dyn CompletionModel>, fallback_model: impl Into<String>) -> Self {
        Self {
            model,
            fallback_model: fallback_model.into(),
            primary_timeout: Duration::from_secs(300),
            fallback_timeout: Duration::from_secs(180),
        }
    }

    /// Set the per-attempt timeouts
    pub fn timeouts(mut self, primary: Duration, fallback: Duration) -> Self {
        self.primary_timeout = primary;
        self.fallback_timeout = fallback;
        self
    }

    /// Generate a report, never returning an error
    pub async fn invoke(&self, prompt: &Prompt, primary_model: &str) -> ModelInvocation {
        let mut errors = Vec::new();
        let mut state = InvocationState::TryPrimary;

        loop {
            state = match state {
                InvocationState::TryPrimary => {
                    match self.attempt(prompt, primary_model, self.primary_timeout).await {
                        Ok(content) => InvocationState::Succeeded {
                            model: primary_model.to_string(),
                            content,
                        },
                        Err(e) => {
                            tracing::warn!("Primary model {} failed: {}", primary_model, e);
                            errors.push(format!("{}: {}", primary_model, e));
                            InvocationState::TryFallback
                        }
                    }
                }
                InvocationState::TryFallback => {
                    tracing::info!("Falling back to {}", self.fallback_model);
                    match self
                        .attempt(prompt, &self.fallback_model, self.fallback_timeout)
                        .await
                    {
                        Ok(content) => InvocationState::Succeeded {
                            model: self.fallback_model.clone(),
                            content,
                        },
                        Err(e) => {
                            tracing::error!("Fallback model {} failed: {}", self.fallback_model, e);
                            errors.push(format!("{}: {}", self.fallback_model, e));
                            InvocationState::Failed
                        }
                    }
                }
                InvocationState::Succeeded { model, content } => {
                    let fallback_used = !errors.is_empty();
                    return ModelInvocation {
                        requested_model: primary_model.to_string(),
                        actual_model: Some(model),
                        fallback_used,
                        outcome: InvocationOutcome::Success(content),
                        errors,
                    };
                }
                InvocationState::Failed => {
                    return ModelInvocation {
                        requested_model: primary_model.to_string(),
                        actual_model: None,
                        fallback_used: true,
                        outcome: InvocationOutcome::Failure(errors.join("; ")),
                        errors,
                    };
                }
            };
        }
    }

    async fn attempt(
        &self,
        prompt: &Prompt,
        model: &str,
        limit: Duration,
    ) -> Result<String, SourceError> {
        let call = self.model.complete(Some(&prompt.system), &prompt.user, model);
        let content = tokio::time::timeout(limit, call)
            .await
            .map_err(|_| SourceError::Timeout(format!("no answer within {:?}", limit)))??;

        if content.trim().is_empty() {
            return Err(SourceError::EmptyResponse(format!("{} returned blank content", model)));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{MockCompletionModel, MockReply};

    fn prompt() -> Prompt {
        Prompt {
            system: "system".to_string(),
            user: "user".to_string(),
        }
    }

    fn invoker(model: MockCompletionModel) -> (Arc<MockCompletionModel>, ModelInvoker) {
        let model = Arc::new(model);
        let invoker = ModelInvoker::new(model.clone(), "small")
            .timeouts(Duration::from_millis(50), Duration::from_millis(50));
        (model, invoker)
    }

    #[tokio::test]
    async fn test_primary_success() {
        let (model, invoker) =
            invoker(MockCompletionModel::new().reply("big", MockReply::Text("# Report".into())));

        let result = invoker.invoke(&prompt(), "big").await;
        assert!(result.is_success());
        assert_eq!(result.actual_model.as_deref(), Some("big"));
        assert!(!result.fallback_used);
        assert_eq!(result.content(), Some("# Report"));
        assert_eq!(model.calls(), vec!["big"]);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let (model, invoker) = invoker(
            MockCompletionModel::new()
                .reply("big", MockReply::Hang)
                .reply("small", MockReply::Text("# Fallback report".into())),
        );

        let result = invoker.invoke(&prompt(), "big").await;
        assert!(result.is_success());
        assert!(result.fallback_used);
        assert_eq!(result.actual_model.as_deref(), Some("small"));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(model.calls(), vec!["big", "small"]);
    }

    #[tokio::test]
    async fn test_blank_answer_is_a_failure() {
        let (_, invoker) = invoker(
            MockCompletionModel::new()
                .reply("big", MockReply::Text("  \n ".into()))
                .reply("small", MockReply::Text("ok".into())),
        );

        let result = invoker.invoke(&prompt(), "big").await;
        assert!(result.fallback_used);
        assert_eq!(result.content(), Some("ok"));
    }

    #[tokio::test]
    async fn test_both_fail() {
        let (model, invoker) = invoker(
            MockCompletionModel::new()
                .reply("big", MockReply::Fail("overloaded".into()))
                .reply("small", MockReply::Hang),
        );

        let result = invoker.invoke(&prompt(), "big").await;
        assert!(!result.is_success());
        assert!(result.actual_model.is_none());
        assert_eq!(result.errors.len(), 2);
        assert!(matches!(result.outcome, InvocationOutcome::Failure(ref r) if r.contains("overloaded")));
        // The fallback runs exactly once
        assert_eq!(model.calls(), vec!["big", "small"]);
    }
}
