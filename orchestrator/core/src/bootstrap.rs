// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bootstrap
//!
//! Wires a [`CognitionConfigManifest`] and the external collaborators into
//! the application services.
//!
//! # Architecture
//!
//! - **Layer:** Composition root
//! - **Purpose:** One place where concrete adapters meet the services

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::belief_store::BeliefStore;
use crate::application::capability_issuer::CapabilityIssuer;
use crate::application::critic::CriticAgent;
use crate::application::evaluation::EvaluationReporter;
use crate::application::executor::ExecutorAgent;
use crate::application::orchestrator::LoopOrchestrator;
use crate::application::planner::PlannerAgent;
use crate::application::policy_guard::PolicyGuard;
use crate::application::scheduler::AgentSchedulerService;
use crate::application::tool_invoker::ToolInvoker;
use crate::application::tool_registry::ToolRegistry;
use crate::domain::agents::{AgentStrategy, EvidenceRetriever};
use crate::domain::config::CognitionConfigManifest;
use crate::domain::llm::{GenerationOptions, JsonCompletionClient, LLMProvider};
use crate::domain::policy::RbacChecker;
use crate::domain::repository::{SessionRepository, StorageBackend, ToolCallLogRepository};
use crate::domain::self_model::SelfModelProvider;
use crate::infrastructure::audit::ToolCallAuditLogger;
use crate::infrastructure::db;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::{GatedJsonClient, ProviderGate};
use crate::infrastructure::telemetry;
use crate::infrastructure::repositories::{
    InMemoryBeliefRepository, InMemorySessionRepository, InMemoryTokenRepository,
    InMemoryToolCallLogRepository,
};

/// Adapters owned by the host system.
pub struct Collaborators {
    pub rbac: Arc<dyn RbacChecker>,
    pub evidence: Arc<dyn EvidenceRetriever>,
    pub self_models: Option<Arc<dyn SelfModelProvider>>,
    /// Provider used by the planner and critic when `agent_strategy: llm`.
    /// The name must match one of `spec.llm.gates`.
    pub llm: Option<(String, Arc<dyn LLMProvider>)>,
}

pub struct CognitionServices {
    pub event_bus: Arc<EventBus>,
    pub issuer: Arc<CapabilityIssuer>,
    pub registry: Arc<ToolRegistry>,
    pub invoker: Arc<ToolInvoker>,
    pub orchestrator: Arc<LoopOrchestrator>,
    pub reporter: Arc<EvaluationReporter>,
    pub scheduler: Arc<AgentSchedulerService>,
    pub beliefs: Arc<BeliefStore>,
    pub sessions: Arc<dyn SessionRepository>,
    pub tool_logs: Arc<dyn ToolCallLogRepository>,
}

impl CognitionServices {
    /// Validate `manifest` and build every service. Sessions, logs, tokens
    /// and beliefs are held in memory; the process queue follows `storage`.
    pub async fn build(
        manifest: &CognitionConfigManifest,
        storage: &StorageBackend,
        collaborators: Collaborators,
    ) -> anyhow::Result<Self> {
        manifest.validate().context("Configuration validation failed")?;
        let spec = &manifest.spec;

        let event_bus = Arc::new(EventBus::with_default_capacity());
        let sessions: Arc<dyn SessionRepository> = Arc::new(InMemorySessionRepository::new());
        let tool_logs: Arc<dyn ToolCallLogRepository> = Arc::new(InMemoryToolCallLogRepository::new());
        let processes = db::process_repository(storage)
            .await
            .context("Failed to initialize process queue")?;

        let issuer = Arc::new(CapabilityIssuer::new(
            Arc::new(InMemoryTokenRepository::new()),
            spec.tokens.clone(),
        ));
        let registry = Arc::new(ToolRegistry::new());
        let guard = Arc::new(PolicyGuard::new(collaborators.rbac, spec.policy.clone()));
        let audit = Arc::new(ToolCallAuditLogger::new(tool_logs.clone()).with_event_bus(event_bus.clone()));
        let invoker = Arc::new(ToolInvoker::new(registry.clone(), guard, audit));

        let loop_config = spec.cognitive_loop.clone();
        let mut planner = PlannerAgent::heuristic(loop_config.base_evidence_limit, loop_config.evidence_tool.clone());
        let mut critic = CriticAgent::heuristic();
        if let Some(client) = llm_client(manifest, collaborators.llm)? {
            planner = planner.with_llm(client.clone());
            critic = critic.with_llm(client);
        }

        let reporter = Arc::new(EvaluationReporter::new(sessions.clone(), tool_logs.clone()).with_event_bus(event_bus.clone()));
        let mut orchestrator = LoopOrchestrator::new(
            sessions.clone(),
            Arc::new(planner),
            Arc::new(ExecutorAgent::new(invoker.clone())),
            Arc::new(critic),
            reporter.clone(),
            collaborators.evidence,
            loop_config,
        )
        .with_event_bus(event_bus.clone());
        if let Some(provider) = collaborators.self_models {
            orchestrator = orchestrator.with_self_model_provider(provider);
        }

        let scheduler = AgentSchedulerService::new(processes, spec.scheduler.clone()).with_event_bus(event_bus.clone());
        let beliefs = BeliefStore::new(Arc::new(InMemoryBeliefRepository::new())).with_event_bus(event_bus.clone());

        info!(
            config = %manifest.metadata.name,
            strategy = ?spec.cognitive_loop.agent_strategy,
            max_iterations = spec.cognitive_loop.max_iterations,
            max_running_per_org = spec.scheduler.max_running_per_org,
            "Cognition services initialized"
        );

        Ok(Self {
            event_bus,
            issuer,
            registry,
            invoker,
            orchestrator: Arc::new(orchestrator),
            reporter,
            scheduler: Arc::new(scheduler),
            beliefs: Arc::new(beliefs),
            sessions,
            tool_logs,
        })
    }
}

/// Install logging from `spec.observability`. Call once, before `build`,
/// from the embedding binary.
pub fn init_logging(manifest: &CognitionConfigManifest) -> anyhow::Result<()> {
    let observability = &manifest.spec.observability;
    telemetry::init_logging(&observability.log_level, &observability.log_format)
}

fn llm_client(
    manifest: &CognitionConfigManifest,
    llm: Option<(String, Arc<dyn LLMProvider>)>,
) -> anyhow::Result<Option<Arc<dyn JsonCompletionClient>>> {
    let spec = &manifest.spec;
    if spec.cognitive_loop.agent_strategy != AgentStrategy::Llm {
        return Ok(None);
    }
    let Some((name, provider)) = llm else {
        warn!("agent_strategy is llm but no provider was supplied, using heuristic agents");
        return Ok(None);
    };

    let gate = Arc::new(ProviderGate::from_config(&spec.llm));
    if gate.capacity(&name).is_none() {
        anyhow::bail!("LLM provider '{}' has no entry in spec.llm.gates", name);
    }
    let options = GenerationOptions {
        max_tokens: spec.llm.max_tokens,
        temperature: spec.llm.temperature,
        stop_sequences: None,
    };
    let client: Arc<dyn JsonCompletionClient> = Arc::new(GatedJsonClient::new(name, provider, gate, options));
    Ok(Some(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tool_registry::handler_fn;
    use crate::domain::config::LlmGateConfig;
    use crate::domain::llm::{GenerationResponse, LLMError};
    use crate::domain::session::SessionStatus;
    use crate::domain::tenant::{OrgId, UserId};
    use crate::domain::tool::ToolSpec;
    use crate::domain::policy::ToolContext;
    use crate::infrastructure::evidence::InMemoryEvidenceRetriever;
    use crate::infrastructure::rbac::StaticRbacChecker;
    use async_trait::async_trait;
    use futures::FutureExt;
    use serde_json::json;
    use std::time::Duration;

    struct NeverCalled;

    #[async_trait]
    impl LLMProvider for NeverCalled {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
            Err(LLMError::Provider("not wired in tests".into()))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn collaborators(llm: Option<(String, Arc<dyn LLMProvider>)>) -> Collaborators {
        Collaborators {
            rbac: Arc::new(StaticRbacChecker::allow_all()),
            evidence: Arc::new(InMemoryEvidenceRetriever::new()),
            self_models: None,
            llm,
        }
    }

    #[tokio::test]
    async fn test_default_manifest_runs_heuristic_loop() {
        let manifest = CognitionConfigManifest::default();
        let services = CognitionServices::build(&manifest, &StorageBackend::InMemory, collaborators(None))
            .await
            .unwrap();
        services
            .registry
            .register(
                ToolSpec::new("memory.search", "1"),
                handler_fn(|_| async { Ok(json!({"hits": 0})) }.boxed()),
            )
            .unwrap();

        let (org, user) = (OrgId::new(), UserId::new());
        let session = services.orchestrator.submit_goal(org, user, "triage", None).await.unwrap();
        let status = services
            .orchestrator
            .run(session.id, &ToolContext::new(org, user))
            .await
            .unwrap();

        // heuristic critic never passes
        assert_eq!(status, SessionStatus::Failed);
        assert_eq!(services.sessions.list_iterations(session.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_llm_provider_must_have_a_gate() {
        let mut manifest = CognitionConfigManifest::default();
        manifest.spec.cognitive_loop.agent_strategy = AgentStrategy::Llm;
        let provider: Arc<dyn LLMProvider> = Arc::new(NeverCalled);

        let missing = CognitionServices::build(
            &manifest,
            &StorageBackend::InMemory,
            collaborators(Some(("openai".into(), provider.clone()))),
        )
        .await;
        assert!(missing.is_err());

        manifest.spec.llm.gates.push(LlmGateConfig {
            name: "openai".into(),
            max_concurrency: 2,
            timeout: Duration::from_secs(5),
        });
        assert!(CognitionServices::build(
            &manifest,
            &StorageBackend::InMemory,
            collaborators(Some(("openai".into(), provider))),
        )
        .await
        .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_manifest_rejected() {
        let mut manifest = CognitionConfigManifest::default();
        manifest.spec.scheduler.max_running_per_org = 0;
        assert!(CognitionServices::build(&manifest, &StorageBackend::InMemory, collaborators(None))
            .await
            .is_err());
    }
}
