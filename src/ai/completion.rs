//! Completion Service
//!
//! Sends the full transcript to the configured backend and returns the
//! first choice as the next candidate manifest.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::provider::{CompletionRequest, SharedBackend};
use super::timeout::guarded;
use crate::types::{AssistError, CandidateManifest, ConversationTranscript, Result};

pub struct CompletionService {
    backend: SharedBackend,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl CompletionService {
    pub fn new(backend: SharedBackend, model: impl Into<String>, temperature: f32, timeout: Duration) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature,
            timeout,
        }
    }

    /// Request the next candidate for `transcript`
    ///
    /// Only the first choice is used. Zero choices, or a blank first choice,
    /// is `ResponseEmpty`. The transcript is never modified here.
    pub async fn complete(
        &self,
        cancel: &CancellationToken,
        transcript: &ConversationTranscript,
    ) -> Result<CandidateManifest> {
        let request = CompletionRequest {
            turns: transcript.turns(),
            temperature: self.temperature,
            model: &self.model,
        };

        let response = guarded(
            cancel,
            self.timeout,
            self.backend.complete(&request),
            "completion request",
            AssistError::backend_timeout,
        )
        .await?;

        if response.choices.len() > 1 {
            debug!(
                "{} returned {} choices, using the first",
                self.backend.name(),
                response.choices.len()
            );
        }

        let candidate = response
            .choices
            .into_iter()
            .next()
            .map(CandidateManifest::new)
            .ok_or(AssistError::ResponseEmpty)?;

        if candidate.is_blank() {
            warn!("{} returned a blank completion", self.backend.name());
            return Err(AssistError::ResponseEmpty);
        }

        Ok(candidate)
    }
}
