//! Generation → confirmation → apply loop
//!
//! ```text
//! AwaitingPrompt ─► Generating ─► AwaitingDecision ─┬─► Generating   (Reprompt)
//!                        │                          ├─► Applying ─► Terminated
//!                        └─► Terminated (Failed)    └─► Terminated   (Decline)
//! ```
//!
//! The transcript only ever grows. Every suspension point races the run's
//! cancellation token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::decision::{Operator, OperatorDecision};
use super::progress::ProgressSink;
use crate::ai::CompletionService;
use crate::ai::prompt::PromptTemplates;
use crate::ai::timeout::cancellable;
use crate::cluster::{Applier, ApplyResult};
use crate::config::SessionConfig;
use crate::schema::SchemaGrounding;
use crate::types::{AssistError, CandidateManifest, ConversationTranscript, Result, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingPrompt,
    Generating,
    AwaitingDecision,
    Applying,
    Terminated,
}

/// How a run ended
#[derive(Debug)]
pub enum LoopOutcome {
    Applied(ApplyResult),
    Declined,
    Failed(AssistError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub raw: bool,
    pub require_confirmation: bool,
    pub max_reprompts: u32,
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            raw: config.raw,
            require_confirmation: config.require_confirmation,
            max_reprompts: config.max_reprompts,
        }
    }
}

pub struct InteractionController {
    completion: CompletionService,
    grounding: SchemaGrounding,
    applier: Arc<dyn Applier>,
    operator: Arc<dyn Operator>,
    progress: Arc<dyn ProgressSink>,
    options: SessionOptions,
    cancel: CancellationToken,
    transcript: ConversationTranscript,
    candidate: Option<CandidateManifest>,
    state: LoopState,
    reprompts: u32,
}

impl InteractionController {
    pub fn new(
        completion: CompletionService,
        grounding: SchemaGrounding,
        applier: Arc<dyn Applier>,
        operator: Arc<dyn Operator>,
        progress: Arc<dyn ProgressSink>,
        options: SessionOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            completion,
            grounding,
            applier,
            operator,
            progress,
            options,
            cancel,
            transcript: ConversationTranscript::new(),
            candidate: None,
            state: LoopState::AwaitingPrompt,
            reprompts: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Conversation so far; still readable after a failed apply
    pub fn transcript(&self) -> &ConversationTranscript {
        &self.transcript
    }

    /// The candidate most recently presented
    pub fn candidate(&self) -> Option<&CandidateManifest> {
        self.candidate.as_ref()
    }

    pub fn reprompts(&self) -> u32 {
        self.reprompts
    }

    /// Drive one run to termination
    pub async fn run(&mut self, request: &str) -> LoopOutcome {
        let outcome = match self.drive(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.progress.stop();
                LoopOutcome::Failed(e)
            }
        };
        self.state = LoopState::Terminated;
        outcome
    }

    async fn drive(&mut self, request: &str) -> Result<LoopOutcome> {
        if request.trim().is_empty() {
            return Err(AssistError::Config("request must not be empty".to_string()));
        }

        self.seed(request).await?;

        loop {
            let candidate = self.generate().await?;
            self.operator.present(&candidate);

            if self.options.raw {
                debug!("Raw mode: candidate printed, not applying");
                return Ok(LoopOutcome::Declined);
            }
            if !self.options.require_confirmation {
                return self.apply(&candidate).await;
            }

            self.state = LoopState::AwaitingDecision;
            let allow_reprompt = self.reprompts < self.options.max_reprompts;
            let decision = cancellable(
                &self.cancel,
                self.operator.decide(allow_reprompt),
                "decision prompt",
            )
            .await?;

            match decision {
                OperatorDecision::Apply => return self.apply(&candidate).await,
                OperatorDecision::Decline => {
                    info!("Manifest declined");
                    return Ok(LoopOutcome::Declined);
                }
                OperatorDecision::Reprompt { clarification } => {
                    if !allow_reprompt {
                        return Err(AssistError::RepromptLimitReached {
                            limit: self.options.max_reprompts,
                        });
                    }
                    self.reprompts += 1;
                    debug!("Reprompt {}/{}", self.reprompts, self.options.max_reprompts);
                    self.add_user_turn(&clarification).await?;
                }
            }
        }
    }

    /// System instructions, then the request with its grounding
    async fn seed(&mut self, request: &str) -> Result<()> {
        self.transcript
            .push(Turn::system(PromptTemplates::manifest_generator().build()));
        self.add_user_turn(request).await
    }

    /// Grounding for `text` (when any) followed by `text` as a user turn
    async fn add_user_turn(&mut self, text: &str) -> Result<()> {
        self.progress.start("Consulting cluster schema");
        let grounding = self.grounding.ground(text, &self.cancel).await;
        self.progress.stop();

        if let Some(context) = grounding? {
            self.transcript.push(Turn::system(context));
        }
        self.transcript.push(Turn::user(text));
        Ok(())
    }

    async fn generate(&mut self) -> Result<CandidateManifest> {
        self.state = LoopState::Generating;

        self.progress.start("Generating manifest");
        let result = self.completion.complete(&self.cancel, &self.transcript).await;
        self.progress.stop();

        let candidate = result?;
        self.transcript.push(Turn::assistant(candidate.as_str()));
        self.candidate = Some(candidate.clone());
        Ok(candidate)
    }

    async fn apply(&mut self, candidate: &CandidateManifest) -> Result<LoopOutcome> {
        self.state = LoopState::Applying;

        self.progress.start("Applying manifest");
        let result = self.applier.apply(&self.cancel, candidate).await;
        self.progress.stop();

        Ok(LoopOutcome::Applied(result?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::completion::tests::ScriptedBackend;
    use crate::cluster::{AppliedObject, ApplyAction};
    use crate::config::{GroundingMode, SchemaConfig};
    use crate::schema::{SchemaDocument, SchemaResolver, SchemaSource};
    use crate::types::Role;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // -------------------------------------------------------------------------
    // Test doubles
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct ScriptedOperator {
        decisions: Mutex<VecDeque<OperatorDecision>>,
        presented: Mutex<Vec<String>>,
        offers: Mutex<Vec<bool>>,
        block: bool,
    }

    impl ScriptedOperator {
        fn new(decisions: Vec<OperatorDecision>) -> Arc<Self> {
            Arc::new(Self {
                decisions: Mutex::new(decisions.into()),
                ..Default::default()
            })
        }

        fn blocking() -> Arc<Self> {
            Arc::new(Self {
                block: true,
                ..Default::default()
            })
        }

        fn presented(&self) -> Vec<String> {
            self.presented.lock().unwrap().clone()
        }

        fn decisions_requested(&self) -> usize {
            self.offers.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Operator for ScriptedOperator {
        fn present(&self, candidate: &CandidateManifest) {
            self.presented.lock().unwrap().push(candidate.to_string());
        }

        async fn decide(&self, allow_reprompt: bool) -> Result<OperatorDecision> {
            self.offers.lock().unwrap().push(allow_reprompt);
            if self.block {
                std::future::pending::<()>().await;
            }
            Ok(self
                .decisions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OperatorDecision::Decline))
        }
    }

    struct RecordingApplier {
        applied: Mutex<Vec<String>>,
        failure: Option<String>,
    }

    impl RecordingApplier {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                applied: Mutex::new(Vec::new()),
                failure: None,
            })
        }

        fn rejecting(message: &str) -> Arc<Self> {
            Arc::new(Self {
                applied: Mutex::new(Vec::new()),
                failure: Some(message.to_string()),
            })
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Applier for RecordingApplier {
        async fn apply(
            &self,
            _cancel: &CancellationToken,
            manifest: &CandidateManifest,
        ) -> Result<ApplyResult> {
            self.applied.lock().unwrap().push(manifest.to_string());
            match &self.failure {
                Some(message) => Err(AssistError::ApplyRejected(message.clone())),
                None => Ok(ApplyResult {
                    objects: vec![AppliedObject {
                        kind: "Pod".to_string(),
                        name: "nginx".to_string(),
                        namespace: Some("default".to_string()),
                        action: ApplyAction::Created,
                    }],
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingProgress {
        fn start(&self, message: &str) {
            self.events.lock().unwrap().push(format!("start:{}", message));
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("stop".to_string());
        }
    }

    struct FixedSchema(serde_json::Value);

    #[async_trait]
    impl SchemaSource for FixedSchema {
        async fn fetch_schema(&self, _cancel: &CancellationToken) -> Result<SchemaDocument> {
            Ok(SchemaDocument::new(self.0.clone()))
        }
    }

    // -------------------------------------------------------------------------
    // Harness
    // -------------------------------------------------------------------------

    struct Harness {
        backend: Arc<ScriptedBackend>,
        operator: Arc<ScriptedOperator>,
        applier: Arc<RecordingApplier>,
        progress: Arc<RecordingProgress>,
        source: Arc<dyn SchemaSource>,
        options: SessionOptions,
        cancel: CancellationToken,
        mode: GroundingMode,
    }

    impl Harness {
        fn new(backend: ScriptedBackend, operator: Arc<ScriptedOperator>) -> Self {
            Self {
                backend: Arc::new(backend),
                operator,
                applier: RecordingApplier::ok(),
                progress: Arc::new(RecordingProgress::default()),
                source: Arc::new(FixedSchema(json!({"definitions": {}}))),
                options: SessionOptions {
                    raw: false,
                    require_confirmation: true,
                    max_reprompts: 10,
                },
                cancel: CancellationToken::new(),
                mode: GroundingMode::BestEffort,
            }
        }

        fn controller(&self) -> InteractionController {
            let schema_config = SchemaConfig {
                grounding: self.mode,
                ..Default::default()
            };
            InteractionController::new(
                CompletionService::new(
                    self.backend.clone(),
                    "gpt-3.5-turbo-0301",
                    0.0,
                    Duration::from_secs(5),
                ),
                SchemaGrounding::new(self.source.clone(), &schema_config),
                self.applier.clone(),
                self.operator.clone(),
                self.progress.clone(),
                self.options.clone(),
                self.cancel.clone(),
            )
        }
    }

    fn reprompt(clarification: &str) -> OperatorDecision {
        OperatorDecision::Reprompt {
            clarification: clarification.to_string(),
        }
    }

    fn contents(turns: &[Turn]) -> Vec<&str> {
        turns.iter().map(|t| t.content.as_str()).collect()
    }

    // -------------------------------------------------------------------------
    // Scenarios
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reprompt_carries_prior_context() {
        let harness = Harness::new(
            ScriptedBackend::texts(&["M1", "M2"]),
            ScriptedOperator::new(vec![reprompt("use nginx:1.25"), OperatorDecision::Decline]),
        );
        let mut controller = harness.controller();

        let outcome = controller.run("a pod named nginx").await;
        assert_matches!(outcome, LoopOutcome::Declined);

        let seen = harness.backend.seen();
        assert_eq!(seen.len(), 2);
        let second = contents(&seen[1]);
        let request = second.iter().position(|c| *c == "a pod named nginx").unwrap();
        let m1 = second.iter().position(|c| *c == "M1").unwrap();
        let clarification = second.iter().position(|c| *c == "use nginx:1.25").unwrap();
        assert!(request < m1 && m1 < clarification);

        assert_eq!(harness.operator.presented(), vec!["M1", "M2"]);
        assert_eq!(controller.candidate().unwrap().as_str(), "M2");
        assert_eq!(controller.transcript().last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_raw_mode_prints_and_stops() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![OperatorDecision::Apply]),
        );
        harness.options.raw = true;
        let mut controller = harness.controller();

        let outcome = controller.run("a pod named nginx").await;

        assert_matches!(outcome, LoopOutcome::Declined);
        assert_eq!(harness.operator.presented(), vec!["M1"]);
        assert_eq!(harness.operator.decisions_requested(), 0);
        assert!(harness.applier.applied().is_empty());
        assert_eq!(controller.state(), LoopState::Terminated);
    }

    #[tokio::test]
    async fn test_unreachable_schema_still_generates() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![OperatorDecision::Decline]),
        );
        let config = SchemaConfig {
            url: Some("http://127.0.0.1:1/openapi/v2".to_string()),
            timeout_secs: 2,
            ..Default::default()
        };
        harness.source = Arc::new(SchemaResolver::new(&config, None).unwrap());
        let mut controller = harness.controller();

        let outcome = controller.run("a pod named nginx").await;

        assert_matches!(outcome, LoopOutcome::Declined);
        assert_eq!(harness.backend.calls(), 1);
        assert!(
            !controller
                .transcript()
                .turns()
                .iter()
                .any(|t| t.content.contains("# Schema:"))
        );
    }

    #[tokio::test]
    async fn test_required_grounding_fails_run() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![]),
        );
        let config = SchemaConfig {
            url: Some("http://127.0.0.1:1/openapi/v2".to_string()),
            timeout_secs: 2,
            ..Default::default()
        };
        harness.source = Arc::new(SchemaResolver::new(&config, None).unwrap());
        harness.mode = GroundingMode::Required;
        let mut controller = harness.controller();

        let outcome = controller.run("a pod named nginx").await;

        assert_matches!(outcome, LoopOutcome::Failed(AssistError::SchemaUnavailable(_)));
        assert_eq!(harness.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_apply_rejection_keeps_transcript() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![OperatorDecision::Apply]),
        );
        harness.applier = RecordingApplier::rejecting("pods is forbidden: User \"dev\"");
        let mut controller = harness.controller();

        let outcome = controller.run("a pod named nginx").await;

        assert_matches!(
            outcome,
            LoopOutcome::Failed(AssistError::ApplyRejected(ref msg)) if msg.contains("forbidden")
        );
        assert_eq!(controller.candidate().unwrap().as_str(), "M1");
        assert_eq!(contents(controller.transcript().turns())[1..], ["a pod named nginx", "M1"]);
    }

    // -------------------------------------------------------------------------
    // Decisions
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_decline_never_applies() {
        let harness = Harness::new(
            ScriptedBackend::texts(&["M1", "M2"]),
            ScriptedOperator::new(vec![reprompt("more replicas"), OperatorDecision::Decline]),
        );
        let outcome = harness.controller().run("a deployment").await;

        assert_matches!(outcome, LoopOutcome::Declined);
        assert!(harness.applier.applied().is_empty());
    }

    #[tokio::test]
    async fn test_apply_uses_latest_candidate() {
        let harness = Harness::new(
            ScriptedBackend::texts(&["M1", "M2", "M3"]),
            ScriptedOperator::new(vec![reprompt("a"), reprompt("b"), OperatorDecision::Apply]),
        );
        let outcome = harness.controller().run("a deployment").await;

        assert_matches!(outcome, LoopOutcome::Applied(ref result) if result.objects.len() == 1);
        assert_eq!(harness.applier.applied(), vec!["M3"]);
    }

    #[tokio::test]
    async fn test_no_confirmation_applies_directly() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![]),
        );
        harness.options.require_confirmation = false;
        let outcome = harness.controller().run("a pod").await;

        assert_matches!(outcome, LoopOutcome::Applied(_));
        assert_eq!(harness.operator.decisions_requested(), 0);
        assert_eq!(harness.applier.applied(), vec!["M1"]);
    }

    #[tokio::test]
    async fn test_reprompt_bound_withdraws_choice() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1", "M2", "M3"]),
            ScriptedOperator::new(vec![reprompt("a"), reprompt("b"), reprompt("c")]),
        );
        harness.options.max_reprompts = 2;
        let mut controller = harness.controller();

        let outcome = controller.run("a pod").await;

        assert_matches!(
            outcome,
            LoopOutcome::Failed(AssistError::RepromptLimitReached { limit: 2 })
        );
        assert_eq!(*harness.operator.offers.lock().unwrap(), vec![true, true, false]);
        assert_eq!(harness.backend.calls(), 3);
        assert_eq!(controller.reprompts(), 2);
    }

    #[tokio::test]
    async fn test_completion_failure_is_fatal() {
        let harness = Harness::new(
            ScriptedBackend::new(vec![Err(AssistError::rejected(429, "slow down"))]),
            ScriptedOperator::new(vec![OperatorDecision::Apply]),
        );
        let outcome = harness.controller().run("a pod").await;

        assert_matches!(outcome, LoopOutcome::Failed(AssistError::BackendRejected { .. }));
        assert_eq!(harness.operator.decisions_requested(), 0);
        assert!(harness.applier.applied().is_empty());
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let harness = Harness::new(ScriptedBackend::texts(&[]), ScriptedOperator::new(vec![]));
        let outcome = harness.controller().run("   ").await;
        assert_matches!(outcome, LoopOutcome::Failed(AssistError::Config(_)));
        assert_eq!(harness.backend.calls(), 0);
    }

    // -------------------------------------------------------------------------
    // Grounding, progress and cancellation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_grounding_precedes_request() {
        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![OperatorDecision::Decline]),
        );
        harness.source = Arc::new(FixedSchema(json!({
            "definitions": {"io.k8s.api.core.v1.Pod": {"properties": {}}}
        })));
        let mut controller = harness.controller();
        controller.run("a pod named nginx").await;

        let turns = controller.transcript().turns();
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[1].role, Role::System);
        assert!(turns[1].content.contains("io.k8s.api.core.v1.Pod"));
        assert_eq!(turns[2], Turn::user("a pod named nginx"));
    }

    #[tokio::test]
    async fn test_progress_is_balanced() {
        let harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![OperatorDecision::Apply]),
        );
        harness.controller().run("a pod").await;

        let events = harness.progress.events.lock().unwrap().clone();
        let starts = events.iter().filter(|e| e.starts_with("start:")).count();
        let stops = events.iter().filter(|e| *e == "stop").count();
        assert_eq!(starts, stops);
        assert!(events.contains(&"start:Generating manifest".to_string()));
        assert!(events.contains(&"start:Applying manifest".to_string()));
    }

    #[tokio::test]
    async fn test_cancel_during_completion() {
        let harness = Harness::new(
            ScriptedBackend::texts(&["M1"]).with_delay(Duration::from_secs(10)),
            ScriptedOperator::new(vec![OperatorDecision::Apply]),
        );
        let trigger = harness.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = harness.controller().run("a pod").await;
        assert_matches!(outcome, LoopOutcome::Failed(AssistError::Cancelled(_)));
        assert!(harness.applier.applied().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_best_effort_grounding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi/v2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"definitions": {}}))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let mut harness = Harness::new(
            ScriptedBackend::texts(&["M1"]),
            ScriptedOperator::new(vec![OperatorDecision::Apply]),
        );
        let config = SchemaConfig {
            url: Some(format!("{}/openapi/v2", server.uri())),
            timeout_secs: 30,
            ..Default::default()
        };
        harness.source = Arc::new(SchemaResolver::new(&config, None).unwrap());
        let trigger = harness.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = harness.controller().run("a pod named nginx").await;

        assert_matches!(outcome, LoopOutcome::Failed(AssistError::Cancelled(_)));
        assert_eq!(harness.backend.calls(), 0);
        assert!(harness.applier.applied().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_decision() {
        let harness = Harness::new(ScriptedBackend::texts(&["M1"]), ScriptedOperator::blocking());
        let trigger = harness.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = harness.controller().run("a pod").await;
        assert_matches!(outcome, LoopOutcome::Failed(AssistError::Cancelled(ref op)) if op == "decision prompt");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_reprompts_only_grow_transcript(clarifications in prop::collection::vec("[a-z ]{1,20}", 1..5)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let texts: Vec<String> = (0..=clarifications.len()).map(|i| format!("M{}", i)).collect();
            let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let mut decisions: Vec<OperatorDecision> =
                clarifications.iter().map(|c| reprompt(c)).collect();
            decisions.push(OperatorDecision::Decline);

            let harness = Harness::new(
                ScriptedBackend::texts(&text_refs),
                ScriptedOperator::new(decisions),
            );
            let mut controller = harness.controller();
            runtime.block_on(controller.run("a pod"));

            let seen = harness.backend.seen();
            prop_assert_eq!(seen.len(), clarifications.len() + 1);
            for pair in seen.windows(2) {
                // each request extends the previous one by at least candidate + clarification
                prop_assert!(pair[1].len() >= pair[0].len() + 2);
                prop_assert_eq!(&pair[1][..pair[0].len()], &pair[0][..]);
            }
        }
    }
}
