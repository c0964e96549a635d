// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Loop Orchestrator
//!
//! Drives the plan → execute → critique loop for one [`CognitiveSession`].
//!
//! ## Loop Decision Table
//! | Critique | Iterations left | Action |
//! |----------|-----------------|--------|
//! | `pass` | any | mark `succeeded`, report, stop |
//! | other | yes | next iteration |
//! | other | no | mark `failed`, report, stop |
//!
//! Iterations are strictly sequential and each is persisted before the next
//! starts. `iteration_num` is unique per session, so `run` on a session with
//! recorded iterations resumes after the last one. An in-flight iteration
//! always completes; a session aborted meanwhile is noticed before the next
//! one starts.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::critic::CriticAgent;
use crate::application::evaluation::EvaluationReporter;
use crate::application::executor::ExecutorAgent;
use crate::application::planner::PlannerAgent;
use crate::application::tool_invoker::InvokerError;
use crate::domain::agents::{CriticEvaluation, EvidenceCard, EvidenceRetriever, StepStatus};
use crate::domain::config::LoopConfig;
use crate::domain::events::SessionEvent;
use crate::domain::policy::ToolContext;
use crate::domain::repository::{RepositoryError, SessionRepository};
use crate::domain::self_model::{evidence_limit, SelfModel, SelfModelProvider};
use crate::domain::session::{
    CognitiveIteration, CognitiveSession, IterationMetrics, SessionError, SessionId, SessionStatus,
};
use crate::domain::tenant::{OrgId, UserId};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Invoker(#[from] InvokerError),

    #[error("failed to serialize iteration record: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct LoopOrchestrator {
    sessions: Arc<dyn SessionRepository>,
    planner: Arc<PlannerAgent>,
    executor: Arc<ExecutorAgent>,
    critic: Arc<CriticAgent>,
    reporter: Arc<EvaluationReporter>,
    evidence: Arc<dyn EvidenceRetriever>,
    self_models: Option<Arc<dyn SelfModelProvider>>,
    event_bus: Option<Arc<EventBus>>,
    config: LoopConfig,
}

impl LoopOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        planner: Arc<PlannerAgent>,
        executor: Arc<ExecutorAgent>,
        critic: Arc<CriticAgent>,
        reporter: Arc<EvaluationReporter>,
        evidence: Arc<dyn EvidenceRetriever>,
        config: LoopConfig,
    ) -> Self {
        Self {
            sessions,
            planner,
            executor,
            critic,
            reporter,
            evidence,
            self_models: None,
            event_bus: None,
            config,
        }
    }

    pub fn with_self_model_provider(mut self, provider: Arc<dyn SelfModelProvider>) -> Self {
        self.self_models = Some(provider);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Create a `running` session for a goal.
    pub async fn submit_goal(
        &self,
        org_id: OrgId,
        user_id: UserId,
        goal: impl Into<String>,
        goal_id: Option<Uuid>,
    ) -> Result<CognitiveSession, OrchestratorError> {
        let session = CognitiveSession::new(org_id, user_id, goal, goal_id)?;
        self.sessions.save(&session).await?;

        info!(session_id = %session.id, org_id = %org_id, "Goal submitted");
        self.publish(SessionEvent::SessionStarted {
            session_id: session.id,
            org_id,
            goal: session.goal.clone(),
            started_at: session.created_at,
        });
        Ok(session)
    }

    /// Move a running session to `aborted` and record a report for it.
    pub async fn abort(&self, session_id: SessionId) -> Result<CognitiveSession, OrchestratorError> {
        let mut session = self.load(session_id).await?;
        session.abort()?;
        self.sessions.save(&session).await?;
        let iterations = self.sessions.list_iterations(session_id).await?.len() as u32;
        self.reporter.generate(&session, false).await?;

        info!(session_id = %session_id, "Session aborted");
        metrics::counter!("aegis_cognitive_sessions_total", "status" => SessionStatus::Aborted.as_str())
            .increment(1);
        self.publish(SessionEvent::SessionFinished {
            session_id,
            status: SessionStatus::Aborted,
            iterations,
            finished_at: session.updated_at,
        });
        Ok(session)
    }

    /// Run the session to a terminal status.
    pub async fn run(&self, session_id: SessionId, tool_ctx: &ToolContext) -> Result<SessionStatus, OrchestratorError> {
        let mut session = self.load(session_id).await?;
        if session.status.is_terminal() {
            info!(session_id = %session_id, status = session.status.as_str(), "Session already terminal");
            return Ok(session.status);
        }

        let self_model = self.self_model(session.org_id).await;
        let mut ctx = tool_ctx.clone().with_session(session_id);
        if ctx.self_model.is_none() {
            if let Some(model) = &self_model {
                ctx = ctx.with_self_model(model.clone());
            }
        }

        let recorded = self.sessions.list_iterations(session_id).await?;
        let mut completed = recorded.last().map(|i| i.iteration_num).unwrap_or(0);
        if recorded.last().map(|i| i.evaluation) == Some(CriticEvaluation::Pass) {
            // passed before the terminal transition was persisted
            return self.finish(&mut session, SessionStatus::Succeeded, completed).await;
        }
        if completed > 0 {
            info!(session_id = %session_id, completed, "Resuming session");
        }

        let max_iterations = self.config.max_iterations;
        while completed < max_iterations {
            if completed > 0 {
                let current = self.load(session_id).await?;
                if current.status.is_terminal() {
                    info!(session_id = %session_id, status = current.status.as_str(), "Session ended externally");
                    return Ok(current.status);
                }
            }

            let iteration_num = completed + 1;
            let evaluation = self
                .iterate(&session, iteration_num, &ctx, self_model.as_deref())
                .await?;
            completed = iteration_num;

            // re-read so an abort that landed mid-iteration is not overwritten
            session = self.load(session_id).await?;
            if session.status.is_terminal() {
                info!(session_id = %session_id, status = session.status.as_str(), "Session ended externally");
                return Ok(session.status);
            }
            session.touch();
            self.sessions.save(&session).await?;

            if evaluation == CriticEvaluation::Pass {
                return self.finish(&mut session, SessionStatus::Succeeded, completed).await;
            }
        }

        self.finish(&mut session, SessionStatus::Failed, completed).await
    }

    async fn iterate(
        &self,
        session: &CognitiveSession,
        iteration_num: u32,
        ctx: &ToolContext,
        self_model: Option<&SelfModel>,
    ) -> Result<CriticEvaluation, OrchestratorError> {
        let started = Instant::now();
        info!(
            session_id = %session.id,
            iteration = iteration_num,
            max_iterations = self.config.max_iterations,
            "Starting iteration"
        );

        let limit = evidence_limit(self.config.base_evidence_limit, self_model);
        let evidence = self.retrieve_evidence(session, limit).await;
        let tools = self.executor.available_tools();

        let plan = self.planner.plan(&session.goal, &evidence, &tools, self_model).await;
        let execution = self.executor.execute(session.id, iteration_num, &plan, ctx).await?;
        let critique = self
            .critic
            .critique(&session.goal, &plan, &execution, &evidence, None)
            .await;

        let iteration = CognitiveIteration {
            session_id: session.id,
            iteration_num,
            plan_json: serde_json::to_value(&plan)?,
            execution_json: serde_json::to_value(&execution)?,
            critique_json: serde_json::to_value(&critique)?,
            evaluation: critique.evaluation,
            metrics: IterationMetrics {
                confidence: critique.confidence,
                planner_confidence: plan.confidence,
                evidence_count: evidence.len(),
                denied_steps: execution.count(StepStatus::Denied),
                failed_steps: execution.count(StepStatus::Failed),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            evidence_memory_ids: evidence.iter().map(|card| card.memory_id).collect(),
            created_at: chrono::Utc::now(),
        };

        let evaluation = if self.sessions.insert_iteration(&iteration).await? {
            critique.evaluation
        } else {
            // another runner recorded this number first; its verdict stands
            warn!(session_id = %session.id, iteration = iteration_num, "Iteration already recorded");
            self.sessions
                .list_iterations(session.id)
                .await?
                .into_iter()
                .find(|i| i.iteration_num == iteration_num)
                .map(|i| i.evaluation)
                .unwrap_or(critique.evaluation)
        };

        info!(
            session_id = %session.id,
            iteration = iteration_num,
            evaluation = %evaluation,
            confidence = critique.confidence,
            "Iteration completed"
        );
        self.publish(SessionEvent::IterationCompleted {
            session_id: session.id,
            iteration_num,
            evaluation,
            confidence: critique.confidence,
            completed_at: iteration.created_at,
        });
        Ok(evaluation)
    }

    async fn finish(
        &self,
        session: &mut CognitiveSession,
        status: SessionStatus,
        iterations: u32,
    ) -> Result<SessionStatus, OrchestratorError> {
        match status {
            SessionStatus::Succeeded => session.mark_succeeded()?,
            _ => session.mark_failed()?,
        }
        self.sessions.save(session).await?;
        let report = self.reporter.generate(session, false).await?;

        info!(
            session_id = %session.id,
            status = status.as_str(),
            iterations,
            final_decision = report.final_decision.as_str(),
            "Session finished"
        );
        metrics::counter!("aegis_cognitive_sessions_total", "status" => status.as_str()).increment(1);
        self.publish(SessionEvent::SessionFinished {
            session_id: session.id,
            status,
            iterations,
            finished_at: session.updated_at,
        });
        Ok(status)
    }

    async fn retrieve_evidence(&self, session: &CognitiveSession, limit: usize) -> Vec<EvidenceCard> {
        match self
            .evidence
            .retrieve_evidence(session.org_id, &session.goal, limit)
            .await
        {
            Ok(mut cards) => {
                cards.truncate(limit);
                cards
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Evidence retrieval failed, continuing without evidence");
                Vec::new()
            }
        }
    }

    async fn self_model(&self, org_id: OrgId) -> Option<Arc<SelfModel>> {
        let provider = self.self_models.as_ref()?;
        match provider.snapshot(org_id).await {
            Ok(model) => model.map(Arc::new),
            Err(e) => {
                warn!(org_id = %org_id, error = %e, "Self-model unavailable");
                None
            }
        }
    }

    async fn load(&self, session_id: SessionId) -> Result<CognitiveSession, OrchestratorError> {
        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(session_id))
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_session_event(event);
        }
    }
}
