// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Evaluation Reporter
//!
//! Derives the terminal [`EvaluationReport`] for a session.
//!
//! | Session status | Last evaluation | Final decision |
//! |----------------|-----------------|----------------|
//! | `succeeded` | any | `pass` |
//! | `failed` | `needs_evidence` | `needs_evidence` |
//! | `failed` | other / none | `fail` |
//! | `aborted` | any | `contested` |
//! | `running` | any | `contested` |
//!
//! One report per session: `generate` returns the stored report unless
//! `force` is set.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::agents::CriticEvaluation;
use crate::domain::events::SessionEvent;
use crate::domain::repository::{RepositoryError, SessionRepository, ToolCallLogRepository};
use crate::domain::session::{
    CognitiveIteration, CognitiveSession, EvaluationReport, FinalDecision, QualityMetrics, ReportId,
    SessionStatus,
};
use crate::domain::tenant::MemoryId;
use crate::domain::tool::InvocationStatus;
use crate::infrastructure::event_bus::EventBus;

pub struct EvaluationReporter {
    sessions: Arc<dyn SessionRepository>,
    logs: Arc<dyn ToolCallLogRepository>,
    event_bus: Option<Arc<EventBus>>,
}

impl EvaluationReporter {
    pub fn new(sessions: Arc<dyn SessionRepository>, logs: Arc<dyn ToolCallLogRepository>) -> Self {
        Self {
            sessions,
            logs,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn generate(
        &self,
        session: &CognitiveSession,
        force: bool,
    ) -> Result<EvaluationReport, RepositoryError> {
        if !force {
            if let Some(existing) = self.sessions.find_report(session.id).await? {
                return Ok(existing);
            }
        }

        let iterations = self.sessions.list_iterations(session.id).await?;
        let last_evaluation = iterations.last().map(|i| i.evaluation);
        let final_decision = final_decision(session.status, last_evaluation);

        let quality_metrics = QualityMetrics {
            avg_confidence: average_confidence(&iterations),
            policy_denials: self.logs.count_by_status(session.id, InvocationStatus::Denied).await?,
            tool_failures: self.logs.count_by_status(session.id, InvocationStatus::Failed).await?,
        };

        let report = EvaluationReport {
            id: ReportId::new(),
            session_id: session.id,
            org_id: session.org_id,
            final_decision,
            evidence_memory_ids: collect_evidence(&iterations),
            summary: summarize(session.status, iterations.len(), last_evaluation, &quality_metrics),
            quality_metrics,
            created_at: Utc::now(),
        };
        self.sessions.save_report(&report).await?;

        info!(
            session_id = %session.id,
            final_decision = report.final_decision.as_str(),
            forced = force,
            "Evaluation report generated"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish_session_event(SessionEvent::ReportGenerated {
                session_id: session.id,
                final_decision: report.final_decision,
                generated_at: report.created_at,
            });
        }
        Ok(report)
    }
}

pub fn final_decision(status: SessionStatus, last_evaluation: Option<CriticEvaluation>) -> FinalDecision {
    match status {
        SessionStatus::Succeeded => FinalDecision::Pass,
        SessionStatus::Failed => match last_evaluation {
            Some(CriticEvaluation::NeedsEvidence) => FinalDecision::NeedsEvidence,
            _ => FinalDecision::Fail,
        },
        SessionStatus::Aborted | SessionStatus::Running => FinalDecision::Contested,
    }
}

fn average_confidence(iterations: &[CognitiveIteration]) -> f64 {
    if iterations.is_empty() {
        return 0.0;
    }
    iterations.iter().map(|i| i.metrics.confidence).sum::<f64>() / iterations.len() as f64
}

/// Distinct evidence ids across iterations, first occurrence order.
fn collect_evidence(iterations: &[CognitiveIteration]) -> Vec<MemoryId> {
    let mut ids: Vec<MemoryId> = Vec::new();
    for id in iterations.iter().flat_map(|i| i.evidence_memory_ids.iter()) {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

fn summarize(
    status: SessionStatus,
    iterations: usize,
    last_evaluation: Option<CriticEvaluation>,
    metrics: &QualityMetrics,
) -> String {
    let outcome = match status {
        SessionStatus::Succeeded => format!("Session passed critique after {} iteration(s).", iterations),
        SessionStatus::Failed => format!(
            "Session failed: {} iteration(s) without a passing critique; last evaluation was {}.",
            iterations,
            last_evaluation.map(|e| e.as_str()).unwrap_or("none")
        ),
        SessionStatus::Aborted => format!("Session was aborted after {} iteration(s).", iterations),
        SessionStatus::Running => format!("Session is still running after {} iteration(s).", iterations),
    };
    format!(
        "{} Average confidence {:.2}; {} policy denial(s), {} tool failure(s).",
        outcome, metrics.avg_confidence, metrics.policy_denials, metrics.tool_failures
    )
}
