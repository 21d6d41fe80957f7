//! Run Command
//!
//! Wires configuration, schema grounding, the completion backend and the
//! cluster applier into one interactive session.
//!
//! Usage:
//!   kubectl-assist "create a deployment running nginx with 3 replicas"

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ai::{CompletionService, create_backend};
use crate::cli::progress::ConsoleSpinner;
use crate::cli::ui::{ConsoleOperator, Output};
use crate::cluster::{ClusterConnection, ManifestApplier};
use crate::config::{Config, ConfigLoader, ConfigOverrides};
use crate::schema::{SchemaGrounding, SchemaResolver};
use crate::session::{
    InteractionController, LoopOutcome, NoopProgress, ProgressSink, SessionOptions,
};
use crate::types::{AssistError, Result};

pub struct RunOptions {
    pub request: String,
    pub overrides: ConfigOverrides,
}

/// Run one session. Errors returned here happen before the loop starts;
/// failures inside the loop come back as `LoopOutcome::Failed`.
pub async fn run(options: RunOptions) -> Result<LoopOutcome> {
    let config = ConfigLoader::load(&options.overrides)?;
    config.require_credentials()?;

    if config.session.debug {
        debug!(?config, "Effective configuration");
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut controller = build_controller(&config, cancel).await?;
    let outcome = controller.run(&options.request).await;

    match &outcome {
        LoopOutcome::Applied(result) => Output::new().applied(result),
        LoopOutcome::Declined if !config.session.raw => Output::new().declined(),
        _ => {}
    }
    Ok(outcome)
}

async fn build_controller(
    config: &Config,
    cancel: CancellationToken,
) -> Result<InteractionController> {
    let timeouts = config.timeouts();

    // Without a cluster the session can still generate manifests; apply reports it.
    let connection = match ClusterConnection::from_config(&config.cluster).await {
        Ok(connection) => {
            debug!(?connection, "Cluster connection ready");
            Some(connection)
        }
        Err(e) => {
            warn!("No cluster connection: {}", e);
            None
        }
    };

    let resolver = SchemaResolver::new(&config.schema, connection.clone())?;
    let grounding = SchemaGrounding::new(Arc::new(resolver), &config.schema);

    let backend = create_backend(&config.llm)?;
    debug!(backend = backend.name(), model = %config.llm.model, "Completion backend ready");
    let completion = CompletionService::new(
        backend,
        config.llm.model.clone(),
        config.llm.temperature,
        timeouts.completion,
    );

    let applier = ManifestApplier::new(
        connection,
        config.cluster.field_manager.clone(),
        timeouts.apply,
    );

    Ok(InteractionController::new(
        completion,
        grounding,
        Arc::new(applier),
        Arc::new(ConsoleOperator::new()),
        progress_sink(config),
        SessionOptions::from(&config.session),
        cancel,
    ))
}

/// Raw output must stay pipeable and debug logs would interleave with the spinner
fn progress_sink(config: &Config) -> Arc<dyn ProgressSink> {
    if config.session.raw || config.session.debug {
        Arc::new(NoopProgress)
    } else {
        Arc::new(ConsoleSpinner::new())
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("Interrupt received");
                cancel.cancel();
            }
            Err(e) => warn!("Cannot listen for interrupts: {}", e),
        }
    });
}

/// Join positional words into the request text
pub fn request_from_words(words: &[String]) -> Result<String> {
    let request = words.join(" ");
    if request.trim().is_empty() {
        return Err(AssistError::Config(
            "a request is required, e.g. kubectl-assist \"create an nginx deployment\"".to_string(),
        ));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_request_from_words() {
        let words = vec!["create".to_string(), "a".to_string(), "namespace".to_string()];
        assert_eq!(request_from_words(&words).unwrap(), "create a namespace");
    }

    #[test]
    fn test_empty_request_rejected() {
        assert_matches!(request_from_words(&[]), Err(AssistError::Config(_)));
        assert_matches!(
            request_from_words(&["  ".to_string()]),
            Err(AssistError::Config(_))
        );
    }

    #[test]
    fn test_progress_sink_quiet_in_raw_mode() {
        let mut config = Config::default();
        config.session.raw = true;
        // NoopProgress never panics and never draws
        let sink = progress_sink(&config);
        sink.start("Generating");
        sink.stop();
    }
}
