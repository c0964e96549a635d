// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for the plan → execute → critique loop.
//!
//! The critic is driven by a scripted completion client so each test fixes
//! the verdict sequence; the planner stays heuristic and routes through a
//! registered `memory.search` tool, so every iteration also leaves a
//! tool-call log.

use aegis_cognition_core::application::critic::CriticAgent;
use aegis_cognition_core::application::evaluation::EvaluationReporter;
use aegis_cognition_core::application::executor::ExecutorAgent;
use aegis_cognition_core::application::orchestrator::{LoopOrchestrator, OrchestratorError};
use aegis_cognition_core::application::planner::PlannerAgent;
use aegis_cognition_core::application::policy_guard::PolicyGuard;
use aegis_cognition_core::application::tool_invoker::ToolInvoker;
use aegis_cognition_core::application::tool_registry::{handler_fn, ToolRegistry};
use aegis_cognition_core::domain::agents::{CriticEvaluation, EvidenceCard, EvidenceRetriever};
use aegis_cognition_core::domain::config::{LoopConfig, PolicyConfig};
use aegis_cognition_core::domain::events::SessionEvent;
use aegis_cognition_core::domain::llm::{CompletionObserver, JsonCompletionClient};
use aegis_cognition_core::domain::policy::ToolContext;
use aegis_cognition_core::domain::repository::{SessionRepository, ToolCallLogRepository};
use aegis_cognition_core::domain::self_model::SelfModel;
use aegis_cognition_core::domain::session::{
    CognitiveIteration, FinalDecision, IterationMetrics, SessionError, SessionId, SessionStatus,
};
use aegis_cognition_core::domain::tenant::{MemoryId, OrgId, UserId};
use aegis_cognition_core::domain::tool::{InvocationStatus, ToolSpec};
use aegis_cognition_core::infrastructure::audit::ToolCallAuditLogger;
use aegis_cognition_core::infrastructure::event_bus::{CognitionEvent, EventBus};
use aegis_cognition_core::infrastructure::evidence::InMemoryEvidenceRetriever;
use aegis_cognition_core::infrastructure::rbac::StaticRbacChecker;
use aegis_cognition_core::infrastructure::self_model::StaticSelfModelProvider;
use aegis_cognition_core::infrastructure::repositories::{
    InMemorySessionRepository, InMemoryToolCallLogRepository,
};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Replays canned critic replies; an exhausted script answers with an empty
/// map, which the critic treats as no usable answer.
struct ScriptedCritic {
    replies: Mutex<VecDeque<Map<String, Value>>>,
}

impl ScriptedCritic {
    fn new(verdicts: &[&str]) -> Self {
        let replies = verdicts
            .iter()
            .map(|v| {
                json!({"evaluation": v, "confidence": 0.6, "strengths": ["grounded"]})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

#[async_trait]
impl JsonCompletionClient for ScriptedCritic {
    async fn complete_json(
        &self,
        _prompt: &str,
        _schema_hint: &Value,
        _observer: Option<&dyn CompletionObserver>,
    ) -> Map<String, Value> {
        self.replies.lock().await.pop_front().unwrap_or_default()
    }
}

struct FailingEvidence;

#[async_trait]
impl EvidenceRetriever for FailingEvidence {
    async fn retrieve_evidence(&self, _org: OrgId, _goal: &str, _limit: usize) -> anyhow::Result<Vec<EvidenceCard>> {
        anyhow::bail!("search backend unavailable")
    }
}

/// Returns no cards and remembers the limit of every request.
#[derive(Default)]
struct RecordingEvidence {
    limits: std::sync::Mutex<Vec<usize>>,
}

#[async_trait]
impl EvidenceRetriever for RecordingEvidence {
    async fn retrieve_evidence(&self, _org: OrgId, _goal: &str, limit: usize) -> anyhow::Result<Vec<EvidenceCard>> {
        self.limits.lock().unwrap().push(limit);
        Ok(Vec::new())
    }
}

struct Harness {
    orchestrator: LoopOrchestrator,
    sessions: Arc<InMemorySessionRepository>,
    logs: Arc<InMemoryToolCallLogRepository>,
    bus: Arc<EventBus>,
    org: OrgId,
    user: UserId,
}

impl Harness {
    fn ctx(&self) -> ToolContext {
        ToolContext::new(self.org, self.user)
    }
}

fn card(title: &str) -> EvidenceCard {
    EvidenceCard {
        memory_id: MemoryId::new(),
        title: title.to_string(),
        excerpt: "root cause was an expired certificate".to_string(),
        score: 0.7,
        classification: None,
    }
}

fn harness_with(
    critic: CriticAgent,
    max_iterations: u32,
    evidence: Option<Arc<dyn EvidenceRetriever>>,
) -> Harness {
    let org = OrgId::new();
    let user = UserId::new();

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(
            ToolSpec::new("memory.search", "1").with_permission("memory:read"),
            handler_fn(|input| async move { Ok(json!({"hits": 1, "query": input.get("query").cloned()})) }.boxed()),
        )
        .unwrap();

    let sessions = Arc::new(InMemorySessionRepository::new());
    let logs = Arc::new(InMemoryToolCallLogRepository::new());
    let bus = Arc::new(EventBus::new(256));

    let guard = Arc::new(PolicyGuard::new(
        Arc::new(StaticRbacChecker::allow_all()),
        PolicyConfig::default(),
    ));
    let audit = Arc::new(ToolCallAuditLogger::new(logs.clone()).with_event_bus(bus.clone()));
    let invoker = Arc::new(ToolInvoker::new(registry, guard, audit));

    let config = LoopConfig {
        max_iterations,
        ..LoopConfig::default()
    };
    let evidence = evidence.unwrap_or_else(|| {
        Arc::new(InMemoryEvidenceRetriever::new().with_cards(org, vec![card("Incident 7 postmortem")]))
    });
    let reporter = Arc::new(EvaluationReporter::new(sessions.clone(), logs.clone()).with_event_bus(bus.clone()));

    let orchestrator = LoopOrchestrator::new(
        sessions.clone(),
        Arc::new(PlannerAgent::heuristic(config.base_evidence_limit, config.evidence_tool.clone())),
        Arc::new(ExecutorAgent::new(invoker)),
        Arc::new(critic),
        reporter,
        evidence,
        config,
    )
    .with_event_bus(bus.clone());

    Harness {
        orchestrator,
        sessions,
        logs,
        bus,
        org,
        user,
    }
}

fn harness(verdicts: &[&str], max_iterations: u32) -> Harness {
    harness_with(
        CriticAgent::heuristic().with_llm(Arc::new(ScriptedCritic::new(verdicts))),
        max_iterations,
        None,
    )
}

#[tokio::test]
async fn test_session_succeeds_when_critic_passes_on_last_iteration() {
    let h = harness(&["retry", "retry", "pass"], 3);
    let session = h
        .orchestrator
        .submit_goal(h.org, h.user, "Summarise incident 7", None)
        .await
        .unwrap();

    let status = h.orchestrator.run(session.id, &h.ctx()).await.unwrap();
    assert_eq!(status, SessionStatus::Succeeded);

    let iterations = h.sessions.list_iterations(session.id).await.unwrap();
    let evaluations: Vec<CriticEvaluation> = iterations.iter().map(|i| i.evaluation).collect();
    assert_eq!(
        evaluations,
        vec![CriticEvaluation::Retry, CriticEvaluation::Retry, CriticEvaluation::Pass]
    );
    assert_eq!(
        iterations.iter().map(|i| i.iteration_num).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let stored = h.sessions.find_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Succeeded);

    let report = h.sessions.find_report(session.id).await.unwrap().unwrap();
    assert_eq!(report.final_decision, FinalDecision::Pass);
    assert_eq!(report.evidence_memory_ids.len(), 1);
    assert!((report.quality_metrics.avg_confidence - 0.6).abs() < 1e-9);
}

#[tokio::test]
async fn test_session_fails_when_iterations_run_out() {
    let h = harness(&["retry", "retry", "pass"], 2);
    let session = h
        .orchestrator
        .submit_goal(h.org, h.user, "Summarise incident 7", None)
        .await
        .unwrap();

    let status = h.orchestrator.run(session.id, &h.ctx()).await.unwrap();
    assert_eq!(status, SessionStatus::Failed);
    assert_eq!(h.sessions.list_iterations(session.id).await.unwrap().len(), 2);

    let report = h.sessions.find_report(session.id).await.unwrap().unwrap();
    assert_eq!(report.final_decision, FinalDecision::Fail);
}

#[tokio::test]
async fn test_heuristic_critic_fails_closed() {
    let h = harness_with(CriticAgent::heuristic(), 2, None);
    let session = h
        .orchestrator
        .submit_goal(h.org, h.user, "Summarise incident 7", None)
        .await
        .unwrap();

    let status = h.orchestrator.run(session.id, &h.ctx()).await.unwrap();
    assert_eq!(status, SessionStatus::Failed);

    let iterations = h.sessions.list_iterations(session.id).await.unwrap();
    assert!(iterations
        .iter()
        .all(|i| i.evaluation == CriticEvaluation::NeedsEvidence));

    let report = h.sessions.find_report(session.id).await.unwrap().unwrap();
    assert_eq!(report.final_decision, FinalDecision::NeedsEvidence);
}

#[tokio::test]
async fn test_malformed_critic_reply_fails_closed() {
    let critic = ScriptedCritic {
        replies: Mutex::new(VecDeque::from(vec![json!({"evaluation": "maybe", "confidence": 3})
            .as_object()
            .cloned()
            .unwrap()])),
    };
    let h = harness_with(CriticAgent::heuristic().with_llm(Arc::new(critic)), 1, None);
    let session = h.orchestrator.submit_goal(h.org, h.user, "g", None).await.unwrap();

    assert_eq!(
        h.orchestrator.run(session.id, &h.ctx()).await.unwrap(),
        SessionStatus::Failed
    );
    let iterations = h.sessions.list_iterations(session.id).await.unwrap();
    assert_eq!(iterations[0].evaluation, CriticEvaluation::NeedsEvidence);
}

#[tokio::test]
async fn test_every_iteration_logs_its_tool_calls() {
    let h = harness(&["retry", "pass"], 3);
    let session = h
        .orchestrator
        .submit_goal(h.org, h.user, "Summarise incident 7", None)
        .await
        .unwrap();
    h.orchestrator.run(session.id, &h.ctx()).await.unwrap();

    let logs = h.logs.find_by_session(session.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.tool_name == "memory.search"));
    assert!(logs.iter().all(|l| l.status == InvocationStatus::Success));
    assert_eq!(
        logs.iter().map(|l| l.iteration_num).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn test_evidence_failure_does_not_stop_the_loop() {
    let h = harness_with(
        CriticAgent::heuristic().with_llm(Arc::new(ScriptedCritic::new(&["pass"]))),
        3,
        Some(Arc::new(FailingEvidence)),
    );
    let session = h.orchestrator.submit_goal(h.org, h.user, "g", None).await.unwrap();

    assert_eq!(
        h.orchestrator.run(session.id, &h.ctx()).await.unwrap(),
        SessionStatus::Succeeded
    );
    let iterations = h.sessions.list_iterations(session.id).await.unwrap();
    assert_eq!(iterations[0].metrics.evidence_count, 0);
    assert!(iterations[0].evidence_memory_ids.is_empty());
}

#[tokio::test]
async fn test_run_resumes_after_recorded_iterations() {
    let h = harness(&["pass"], 3);
    let session = h.orchestrator.submit_goal(h.org, h.user, "g", None).await.unwrap();

    // a previous runner recorded iteration 1 and then stopped
    h.sessions
        .insert_iteration(&CognitiveIteration {
            session_id: session.id,
            iteration_num: 1,
            plan_json: json!({}),
            execution_json: json!({}),
            critique_json: json!({}),
            evaluation: CriticEvaluation::Retry,
            metrics: IterationMetrics::default(),
            evidence_memory_ids: vec![],
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.run(session.id, &h.ctx()).await.unwrap(),
        SessionStatus::Succeeded
    );
    let iterations = h.sessions.list_iterations(session.id).await.unwrap();
    assert_eq!(
        iterations.iter().map(|i| i.iteration_num).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn test_abort_records_contested_report_and_stops_runs() {
    let h = harness(&["pass"], 3);
    let session = h.orchestrator.submit_goal(h.org, h.user, "g", None).await.unwrap();

    let aborted = h.orchestrator.abort(session.id).await.unwrap();
    assert_eq!(aborted.status, SessionStatus::Aborted);

    let report = h.sessions.find_report(session.id).await.unwrap().unwrap();
    assert_eq!(report.final_decision, FinalDecision::Contested);

    // terminal sessions are not re-run
    assert_eq!(
        h.orchestrator.run(session.id, &h.ctx()).await.unwrap(),
        SessionStatus::Aborted
    );
    assert!(h.sessions.list_iterations(session.id).await.unwrap().is_empty());

    assert!(matches!(
        h.orchestrator.abort(session.id).await,
        Err(OrchestratorError::Session(SessionError::AlreadyTerminal { .. }))
    ));
}

#[tokio::test]
async fn test_empty_goal_rejected_and_unknown_session() {
    let h = harness(&[], 1);
    assert!(matches!(
        h.orchestrator.submit_goal(h.org, h.user, "   ", None).await,
        Err(OrchestratorError::Session(_))
    ));
    assert!(matches!(
        h.orchestrator.run(SessionId::new(), &h.ctx()).await,
        Err(OrchestratorError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_lifecycle_events_published() {
    let h = harness(&["pass"], 3);
    let mut rx = h.bus.subscribe();
    let session = h.orchestrator.submit_goal(h.org, h.user, "g", None).await.unwrap();
    h.orchestrator.run(session.id, &h.ctx()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CognitionEvent::Session(event) = event {
            seen.push(match event {
                SessionEvent::SessionStarted { .. } => "started",
                SessionEvent::IterationCompleted { .. } => "iteration",
                SessionEvent::ReportGenerated { .. } => "report",
                SessionEvent::SessionFinished { .. } => "finished",
            });
        }
    }
    assert_eq!(seen, vec!["started", "iteration", "report", "finished"]);
}

#[tokio::test]
async fn test_evidence_limit_scaled_by_self_model() {
    let recorder = Arc::new(RecordingEvidence::default());
    let h = harness_with(CriticAgent::heuristic(), 2, Some(recorder.clone()));
    let (org, user) = (h.org, h.user);
    let provider = StaticSelfModelProvider::new().with_model(
        org,
        SelfModel {
            recommended_evidence_multiplier: 2.5,
            ..SelfModel::default()
        },
    );
    let orchestrator = h.orchestrator.with_self_model_provider(Arc::new(provider));

    let session = orchestrator.submit_goal(org, user, "Summarise incident 7", None).await.unwrap();
    orchestrator.run(session.id, &ToolContext::new(org, user)).await.unwrap();

    // default base limit of 10, scaled by 2.5 on every iteration
    assert_eq!(*recorder.limits.lock().unwrap(), vec![25, 25]);
}

#[tokio::test]
async fn test_evidence_limit_unscaled_without_self_model() {
    let recorder = Arc::new(RecordingEvidence::default());
    let h = harness_with(CriticAgent::heuristic(), 1, Some(recorder.clone()));
    let session = h
        .orchestrator
        .submit_goal(h.org, h.user, "Summarise incident 7", None)
        .await
        .unwrap();
    h.orchestrator.run(session.id, &h.ctx()).await.unwrap();

    assert_eq!(*recorder.limits.lock().unwrap(), vec![10]);
}
