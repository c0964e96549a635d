// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod capability_issuer;
pub mod tool_registry;
pub mod policy_guard;
pub mod tool_invoker;

pub mod prompts;
pub mod structured_output;
pub mod planner;
pub mod executor;
pub mod critic;
pub mod evaluation;
pub mod orchestrator;

pub mod scheduler;
pub mod belief_store;

// Re-export services for convenience
pub use belief_store::{BeliefStore, BeliefStoreError};
pub use capability_issuer::{CapabilityIssuer, IssuerError, TokenPreset};
pub use critic::CriticAgent;
pub use evaluation::EvaluationReporter;
pub use executor::ExecutorAgent;
pub use orchestrator::{LoopOrchestrator, OrchestratorError};
pub use planner::PlannerAgent;
pub use policy_guard::PolicyGuard;
pub use scheduler::{AgentSchedulerService, SchedulerError};
pub use tool_invoker::{InvokerError, ToolInvoker};
pub use tool_registry::{handler_fn, ToolHandler, ToolRegistry};
