// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Scheduler Service
//!
//! Priority queue of [`AgentProcess`]es with a per-org running cap.
//!
//! Every mutating call presents a [`CapabilityToken`]:
//!
//! | Operation | Scope |
//! |-----------|-------|
//! | `enqueue` | `scheduler.enqueue` |
//! | `dequeue_next` | `scheduler.dequeue` |
//! | `mark_*`, `reset_to_queue` | `scheduler.update` |
//!
//! The token must also belong to the org whose queue is touched.
//! Dispatch order is `priority DESC, created_at ASC`; the capacity check and
//! the claim are a single atomic repository operation.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::capability::{CapabilityError, CapabilityToken, Scope};
use crate::domain::config::SchedulerConfig;
use crate::domain::events::SchedulerEvent;
use crate::domain::process::{AgentProcess, ClaimOutcome, ProcessError, ProcessId, ProcessQuotas, ProcessStatus};
use crate::domain::repository::{ProcessRepository, RepositoryError};
use crate::domain::tenant::OrgId;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("permission denied: {0}")]
    Capability(#[from] CapabilityError),

    #[error("permission denied: token for org {token_org} cannot act on org {org}")]
    OrgMismatch { token_org: OrgId, org: OrgId },

    #[error("process not found: {0}")]
    ProcessNotFound(ProcessId),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct AgentSchedulerService {
    processes: Arc<dyn ProcessRepository>,
    config: SchedulerConfig,
    event_bus: Option<Arc<EventBus>>,
}

impl AgentSchedulerService {
    pub fn new(processes: Arc<dyn ProcessRepository>, config: SchedulerConfig) -> Self {
        Self {
            processes,
            config,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn max_running_per_org(&self) -> usize {
        self.config.max_running_per_org
    }

    pub async fn enqueue(
        &self,
        token: &CapabilityToken,
        org_id: OrgId,
        agent_name: &str,
        priority: i32,
        max_attempts: u32,
        quotas: ProcessQuotas,
    ) -> Result<AgentProcess, SchedulerError> {
        authorize(token, Scope::SchedulerEnqueue, org_id)?;
        let process = AgentProcess::new(org_id, agent_name, priority, max_attempts, quotas)?;
        self.processes.insert(&process).await?;

        info!(
            process_id = %process.id,
            org_id = %org_id,
            agent = %process.agent_name,
            priority,
            "Process enqueued"
        );
        self.publish(SchedulerEvent::ProcessEnqueued {
            process_id: process.id,
            org_id,
            agent_name: process.agent_name.clone(),
            priority,
            enqueued_at: process.created_at,
        });
        Ok(process)
    }

    /// Dispatch the next eligible process, or `None` when the org is at
    /// capacity or nothing is dispatchable.
    pub async fn dequeue_next(
        &self,
        token: &CapabilityToken,
        org_id: OrgId,
    ) -> Result<Option<AgentProcess>, SchedulerError> {
        authorize(token, Scope::SchedulerDequeue, org_id)?;

        let outcome = self
            .processes
            .claim_next(org_id, self.config.max_running_per_org, Utc::now())
            .await?;

        match outcome {
            ClaimOutcome::Claimed(process) => {
                metrics::counter!("aegis_scheduler_dispatch_total", "outcome" => "claimed").increment(1);
                info!(
                    process_id = %process.id,
                    org_id = %org_id,
                    attempt = process.attempts,
                    max_attempts = process.max_attempts,
                    "Process dispatched"
                );
                self.publish(SchedulerEvent::ProcessDispatched {
                    process_id: process.id,
                    org_id,
                    attempt: process.attempts,
                    dispatched_at: process.started_at.unwrap_or_else(Utc::now),
                });
                Ok(Some(process))
            }
            ClaimOutcome::AtCapacity { running } => {
                metrics::counter!("aegis_scheduler_dispatch_total", "outcome" => "at_capacity").increment(1);
                info!(
                    org_id = %org_id,
                    running,
                    max_running = self.config.max_running_per_org,
                    "Dispatch denied, org at capacity"
                );
                Ok(None)
            }
            ClaimOutcome::Empty => {
                metrics::counter!("aegis_scheduler_dispatch_total", "outcome" => "empty").increment(1);
                debug!(org_id = %org_id, "No dispatchable process");
                Ok(None)
            }
        }
    }

    pub async fn mark_succeeded(
        &self,
        token: &CapabilityToken,
        process_id: ProcessId,
        reason: Option<String>,
    ) -> Result<AgentProcess, SchedulerError> {
        self.mark_terminal(token, process_id, ProcessStatus::Succeeded, reason).await
    }

    pub async fn mark_failed(
        &self,
        token: &CapabilityToken,
        process_id: ProcessId,
        reason: Option<String>,
    ) -> Result<AgentProcess, SchedulerError> {
        self.mark_terminal(token, process_id, ProcessStatus::Failed, reason).await
    }

    pub async fn mark_blocked(
        &self,
        token: &CapabilityToken,
        process_id: ProcessId,
        reason: Option<String>,
    ) -> Result<AgentProcess, SchedulerError> {
        self.mark_terminal(token, process_id, ProcessStatus::Blocked, reason).await
    }

    /// Terminal transition. Any `status` outside succeeded / failed /
    /// blocked is rejected.
    pub async fn mark_terminal(
        &self,
        token: &CapabilityToken,
        process_id: ProcessId,
        status: ProcessStatus,
        reason: Option<String>,
    ) -> Result<AgentProcess, SchedulerError> {
        token.validate(Scope::SchedulerUpdate)?;
        if !status.is_terminal() {
            return Err(ProcessError::NotTerminalTarget(status).into());
        }
        let mut process = self.load_for(token, process_id).await?;
        let (seen_status, seen_attempts) = (process.status, process.attempts);
        process.finish(status, reason.clone(), Utc::now())?;
        self.commit(&process, seen_status, seen_attempts).await?;

        info!(process_id = %process_id, status = status.as_str(), "Process finished");
        self.publish(SchedulerEvent::ProcessFinished {
            process_id,
            org_id: process.org_id,
            status,
            reason,
            finished_at: process.finished_at.unwrap_or_else(Utc::now),
        });
        Ok(process)
    }

    /// Put a running process back in the queue. `attempts` is kept, so the
    /// requeue still counts against `max_attempts`.
    pub async fn reset_to_queue(
        &self,
        token: &CapabilityToken,
        process_id: ProcessId,
        reason: Option<String>,
    ) -> Result<AgentProcess, SchedulerError> {
        token.validate(Scope::SchedulerUpdate)?;
        let mut process = self.load_for(token, process_id).await?;
        if let Err(e) = process.requeue(reason.clone()) {
            warn!(process_id = %process_id, error = %e, "Requeue rejected");
            return Err(e.into());
        }
        self.commit(&process, ProcessStatus::Running, process.attempts).await?;

        info!(process_id = %process_id, attempts = process.attempts, "Process requeued");
        self.publish(SchedulerEvent::ProcessRequeued {
            process_id,
            org_id: process.org_id,
            reason,
            requeued_at: Utc::now(),
        });
        Ok(process)
    }

    pub async fn running_count(&self, org_id: OrgId) -> Result<usize, SchedulerError> {
        Ok(self.processes.running_count(org_id).await?)
    }

    pub async fn get(&self, process_id: ProcessId) -> Result<Option<AgentProcess>, SchedulerError> {
        Ok(self.processes.find_by_id(process_id).await?)
    }

    async fn load_for(&self, token: &CapabilityToken, process_id: ProcessId) -> Result<AgentProcess, SchedulerError> {
        let process = self
            .processes
            .find_by_id(process_id)
            .await?
            .ok_or(SchedulerError::ProcessNotFound(process_id))?;
        check_org(token, process.org_id)?;
        Ok(process)
    }

    /// Conditional write: fails with `RepositoryError::Conflict` when another
    /// caller moved the process since it was read.
    async fn commit(
        &self,
        process: &AgentProcess,
        seen_status: ProcessStatus,
        seen_attempts: u32,
    ) -> Result<(), SchedulerError> {
        if let Err(e) = self.processes.transition(process, seen_status, seen_attempts).await {
            if matches!(e, RepositoryError::Conflict(_)) {
                warn!(process_id = %process.id, error = %e, "Stale process transition rejected");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn publish(&self, event: SchedulerEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_scheduler_event(event);
        }
    }
}

fn authorize(token: &CapabilityToken, scope: Scope, org_id: OrgId) -> Result<(), SchedulerError> {
    token.validate(scope)?;
    check_org(token, org_id)
}

fn check_org(token: &CapabilityToken, org_id: OrgId) -> Result<(), SchedulerError> {
    if token.org_id() != org_id {
        return Err(SchedulerError::OrgMismatch {
            token_org: token.org_id(),
            org: org_id,
        });
    }
    Ok(())
}
